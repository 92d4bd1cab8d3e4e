// 🏭 Process Entity - unit process with ordered exchanges
//
// Identity is a pure function of the name (unless a caller pins an explicit
// ProcessID), so reruns over the same table update the same datasets.

use super::{is_false, ModelType, ProcessDocumentation, Ref, RootEntity};
use crate::identity::uuid_of;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessType {
    #[default]
    UnitProcess,
    LciResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationType {
    #[default]
    PhysicalAllocation,
    EconomicAllocation,
    CausalAllocation,
    UseDefaultAllocation,
    NoAllocation,
}

// ============================================================================
// EXCHANGE
// ============================================================================

/// One input or output of a process; references (does not own) its flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    #[serde(default)]
    pub internal_id: u32,

    pub flow: Ref,

    #[serde(default, skip_serializing_if = "is_false")]
    pub is_quantitative_reference: bool,

    #[serde(default)]
    pub is_input: bool,

    #[serde(default)]
    pub amount: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<Ref>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_property: Option<Ref>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub is_avoided_product: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<Ref>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dq_entry: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ============================================================================
// PROCESS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    #[serde(rename = "@type", default = "process_tag")]
    pub model_type: String,

    #[serde(rename = "@id", default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub process_type: ProcessType,

    #[serde(default)]
    pub default_allocation_method: AllocationType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Ref>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dq_system: Option<Ref>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_dq_system: Option<Ref>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_documentation: Option<ProcessDocumentation>,

    #[serde(default)]
    pub exchanges: Vec<Exchange>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_change: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

fn process_tag() -> String {
    ModelType::Process.as_str().to_string()
}

impl Process {
    /// New unit process; id derived from the name unless `id` is given
    pub fn new(name: impl Into<String>, id: Option<String>) -> Self {
        let name = name.into();
        let id = match id {
            Some(id) if !id.trim().is_empty() => id,
            _ => uuid_of(&name),
        };

        Process {
            model_type: process_tag(),
            id,
            name,
            category: None,
            description: None,
            process_type: ProcessType::UnitProcess,
            default_allocation_method: AllocationType::PhysicalAllocation,
            location: None,
            dq_system: None,
            exchange_dq_system: None,
            process_documentation: None,
            exchanges: Vec::new(),
            tags: Vec::new(),
            last_change: None,
            version: None,
        }
    }

    pub fn reference_exchange(&self) -> Option<&Exchange> {
        self.exchanges.iter().find(|e| e.is_quantitative_reference)
    }
}

impl RootEntity for Process {
    const FOLDER: &'static str = "processes";

    fn model_type() -> ModelType {
        ModelType::Process
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn to_ref(&self) -> Ref {
        Ref::new(ModelType::Process, &self.id, &self.name).with_category(self.category.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_id_from_name() {
        let p1 = Process::new("Coal extraction", None);
        let p2 = Process::new("Coal extraction", None);
        assert_eq!(p1.id, p2.id);
        assert_eq!(p1.id, uuid_of("Coal extraction"));
        assert_eq!(p1.process_type, ProcessType::UnitProcess);
        assert_eq!(p1.default_allocation_method, AllocationType::PhysicalAllocation);
    }

    #[test]
    fn test_explicit_id_wins() {
        let p = Process::new("Coal extraction", Some("pinned-id".to_string()));
        assert_eq!(p.id, "pinned-id");

        let blank = Process::new("Coal extraction", Some("  ".to_string()));
        assert_eq!(blank.id, uuid_of("Coal extraction"));
    }

    #[test]
    fn test_every_allocation_method_parses() {
        for (raw, expected) in [
            ("NO_ALLOCATION", AllocationType::NoAllocation),
            ("USE_DEFAULT_ALLOCATION", AllocationType::UseDefaultAllocation),
            ("CAUSAL_ALLOCATION", AllocationType::CausalAllocation),
        ] {
            let p: Process = serde_json::from_value(serde_json::json!({
                "@id": "p-grid", "name": "Grid mix", "defaultAllocationMethod": raw
            }))
            .unwrap();
            assert_eq!(p.default_allocation_method, expected);
        }
    }

    #[test]
    fn test_process_json_ld_shape() {
        let mut p = Process::new("Coal extraction", None);
        p.exchanges.push(Exchange {
            internal_id: 1,
            flow: Ref::new(ModelType::Flow, "f1", "Coal"),
            is_quantitative_reference: true,
            is_input: false,
            amount: 1.0,
            unit: None,
            flow_property: None,
            is_avoided_product: false,
            default_provider: None,
            dq_entry: None,
            description: None,
        });
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["@type"], "Process");
        assert_eq!(json["processType"], "UNIT_PROCESS");
        assert_eq!(json["defaultAllocationMethod"], "PHYSICAL_ALLOCATION");
        assert_eq!(json["exchanges"][0]["isQuantitativeReference"], true);
        assert!(json["exchanges"][0].get("isAvoidedProduct").is_none());
        assert!(p.reference_exchange().is_some());
    }
}
