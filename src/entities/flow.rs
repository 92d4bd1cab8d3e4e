// 🌊 Flow Entity - canonical flow identity
//
// Three provenances share one struct:
// - Minted: created from exchange rows, written to the archive
// - Elementary: reused from the elementary flow list, never re-written here
// - Technosphere: reused from an existing database / repository

use super::{ModelType, Ref, RootEntity};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// FLOW TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowType {
    ProductFlow,
    WasteFlow,
    ElementaryFlow,
}

impl FlowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowType::ProductFlow => "PRODUCT_FLOW",
            FlowType::WasteFlow => "WASTE_FLOW",
            FlowType::ElementaryFlow => "ELEMENTARY_FLOW",
        }
    }

    pub fn is_technosphere(&self) -> bool {
        !matches!(self, FlowType::ElementaryFlow)
    }
}

impl FromStr for FlowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "PRODUCT_FLOW" => Ok(FlowType::ProductFlow),
            "WASTE_FLOW" => Ok(FlowType::WasteFlow),
            "ELEMENTARY_FLOW" => Ok(FlowType::ElementaryFlow),
            other => Err(format!("Unrecognized FlowType `{}`", other)),
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// FLOW ORIGIN
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowOrigin {
    /// Newly created from exchange data - must be serialized
    Minted,
    /// Found in the elementary flow list
    Elementary,
    /// Found among existing technosphere flows
    #[default]
    Technosphere,
}

// ============================================================================
// FLOW PROPERTY FACTOR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowPropertyFactor {
    #[serde(default)]
    pub is_ref_flow_property: bool,

    #[serde(default = "one")]
    pub conversion_factor: f64,

    pub flow_property: Ref,
}

fn one() -> f64 {
    1.0
}

impl FlowPropertyFactor {
    /// The single reference property a minted flow carries
    pub fn reference(flow_property: Ref) -> Self {
        FlowPropertyFactor {
            is_ref_flow_property: true,
            conversion_factor: 1.0,
            flow_property,
        }
    }
}

// ============================================================================
// FLOW ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    #[serde(rename = "@type", default = "flow_tag")]
    pub model_type: String,

    #[serde(rename = "@id", default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_type: Option<FlowType>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flow_properties: Vec<FlowPropertyFactor>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_change: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Where this flow came from (never serialized)
    #[serde(skip)]
    pub origin: FlowOrigin,
}

fn flow_tag() -> String {
    ModelType::Flow.as_str().to_string()
}

impl Flow {
    /// Flow with only identity set
    pub fn new(id: impl Into<String>, name: impl Into<String>, origin: FlowOrigin) -> Self {
        Flow {
            model_type: flow_tag(),
            id: id.into(),
            name: name.into(),
            category: None,
            flow_type: None,
            flow_properties: Vec::new(),
            tags: Vec::new(),
            last_change: None,
            version: None,
            origin,
        }
    }

    pub fn with_flow_type(mut self, flow_type: Option<FlowType>) -> Self {
        self.flow_type = flow_type;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        self.category = if category.is_empty() { None } else { Some(category) };
        self
    }

    pub fn needs_serialization(&self) -> bool {
        self.origin == FlowOrigin::Minted
    }
}

impl RootEntity for Flow {
    const FOLDER: &'static str = "flows";

    fn model_type() -> ModelType {
        ModelType::Flow
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn to_ref(&self) -> Ref {
        Ref::new(ModelType::Flow, &self.id, &self.name).with_category(self.category.clone())
    }
}
