// Entity Models - olca-schema 2 JSON-LD
//
// Each root entity has:
// - Stable identity (`@id`) that is either supplied or derived from its name
// - A folder inside the JSON-LD archive
// - A `Ref` form used wherever another entity points at it

pub mod documentation;
pub mod flow;
pub mod process;
pub mod reference;

pub use documentation::{ProcessDocumentation, Review};
pub use flow::{Flow, FlowOrigin, FlowPropertyFactor, FlowType};
pub use process::{AllocationType, Exchange, Process, ProcessType};
pub use reference::{Actor, DqSystem, Location, Source};

use serde::{Deserialize, Serialize};

// ============================================================================
// MODEL TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelType {
    Flow,
    Process,
    Unit,
    FlowProperty,
    Actor,
    Source,
    DqSystem,
    Location,
}

impl ModelType {
    /// The `@type` string written to JSON-LD
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Flow => "Flow",
            ModelType::Process => "Process",
            ModelType::Unit => "Unit",
            ModelType::FlowProperty => "FlowProperty",
            ModelType::Actor => "Actor",
            ModelType::Source => "Source",
            ModelType::DqSystem => "DQSystem",
            ModelType::Location => "Location",
        }
    }
}

// ============================================================================
// REF
// ============================================================================

/// Reference to another entity (by identity, not ownership)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ref {
    #[serde(rename = "@type", default, skip_serializing_if = "Option::is_none")]
    pub ref_type: Option<String>,

    #[serde(rename = "@id", default)]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Ref {
    pub fn new(model_type: ModelType, id: impl Into<String>, name: impl Into<String>) -> Self {
        Ref {
            ref_type: Some(model_type.as_str().to_string()),
            id: id.into(),
            name: Some(name.into()),
            category: None,
        }
    }

    /// Ref that only carries an id (name unknown at this point)
    pub fn bare(model_type: ModelType, id: impl Into<String>) -> Self {
        Ref {
            ref_type: Some(model_type.as_str().to_string()),
            id: id.into(),
            name: None,
            category: None,
        }
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    pub fn name_or_empty(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

// ============================================================================
// ROOT ENTITY
// ============================================================================

/// Anything written as its own file in the archive
pub trait RootEntity: Serialize {
    /// Folder inside the JSON-LD zip
    const FOLDER: &'static str;

    fn model_type() -> ModelType;

    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn to_ref(&self) -> Ref {
        Ref::new(Self::model_type(), self.id(), self.name())
    }
}

pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_serializes_json_ld_keys() {
        let r = Ref::new(ModelType::DqSystem, "abc", "US EPA - Process Pedigree Matrix");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["@type"], "DQSystem");
        assert_eq!(json["@id"], "abc");
        assert!(json.get("category").is_none());
    }

    #[test]
    fn test_ref_reads_partial_record() {
        let r: Ref = serde_json::from_str(r#"{"@id": "p1", "name": "Coal mining"}"#).unwrap();
        assert_eq!(r.id, "p1");
        assert_eq!(r.name_or_empty(), "Coal mining");
        assert!(r.ref_type.is_none());
    }
}
