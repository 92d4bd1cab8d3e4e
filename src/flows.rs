// 🌊 Flow Resolver - exchange rows → canonical Flow registry
//
// Every distinct FlowUUID lands in exactly one bucket:
//   1. minted      (unknown to both lists, only when an elementary list exists)
//   2. elementary  (found in the elementary flow list)
//   3. technosphere (found among existing technosphere flows)
// or the run aborts with FlowResolution. Nothing is ever silently dropped.

use crate::entities::{Flow, FlowOrigin, FlowPropertyFactor, FlowType};
use crate::errors::{PipelineError, PipelineResult};
use crate::identity::{last_change_now, uuid_of};
use crate::schema::ExchangeRow;
use crate::units::UnitResolver;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

// ============================================================================
// ELEMENTARY FLOW SOURCE (optional capability)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ElementaryFlowRecord {
    #[serde(rename = "Flow UUID")]
    pub uuid: String,

    #[serde(rename = "Flowable")]
    pub name: String,

    #[serde(rename = "Context", default)]
    pub context: String,

    #[serde(rename = "Unit", default)]
    pub unit: String,
}

/// Elementary flow list; a run may have none
pub trait ElementaryFlowSource {
    fn get(&self, uuid: &str) -> Option<&ElementaryFlowRecord>;

    fn contains(&self, uuid: &str) -> bool {
        self.get(uuid).is_some()
    }
}

/// Elementary flow list loaded from a CSV export
#[derive(Debug, Default)]
pub struct ElementaryFlowList {
    flows: HashMap<String, ElementaryFlowRecord>,
}

impl ElementaryFlowList {
    pub fn from_records(records: impl IntoIterator<Item = ElementaryFlowRecord>) -> Self {
        ElementaryFlowList {
            flows: records.into_iter().map(|r| (r.uuid.clone(), r)).collect(),
        }
    }

    pub fn from_csv(path: &Path) -> PipelineResult<Self> {
        let mut rdr = csv::Reader::from_path(path)?;
        let mut records = Vec::new();
        for result in rdr.deserialize() {
            let record: ElementaryFlowRecord = result?;
            records.push(record);
        }
        Ok(Self::from_records(records))
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

impl ElementaryFlowSource for ElementaryFlowList {
    fn get(&self, uuid: &str) -> Option<&ElementaryFlowRecord> {
        self.flows.get(uuid)
    }
}

/// Full Flow for an elementary record (archive output)
pub fn elementary_flow(record: &ElementaryFlowRecord, units: &dyn UnitResolver) -> Flow {
    let mut flow = Flow::new(&record.uuid, &record.name, FlowOrigin::Elementary)
        .with_flow_type(Some(FlowType::ElementaryFlow))
        .with_category(format!("Elementary flows/{}", record.context));
    if let Some(property) = units.property_ref(&record.unit) {
        flow.flow_properties = vec![FlowPropertyFactor::reference(property)];
    }
    flow
}

// ============================================================================
// TECHNOSPHERE FLOW REGISTRY
// ============================================================================

#[derive(Debug, Deserialize)]
struct TechFlowRecord {
    #[serde(rename = "UUID")]
    uuid: String,
    #[serde(rename = "FlowName")]
    name: String,
}

/// Existing technosphere flows (UUID → canonical name)
#[derive(Debug, Default, Clone)]
pub struct TechFlowRegistry {
    names: HashMap<String, String>,
}

impl TechFlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_csv(path: &Path) -> PipelineResult<Self> {
        let mut rdr = csv::Reader::from_path(path)?;
        let mut registry = TechFlowRegistry::new();
        for result in rdr.deserialize() {
            let record: TechFlowRecord = result?;
            registry.insert(record.uuid, record.name);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, uuid: impl Into<String>, name: impl Into<String>) {
        self.names.insert(uuid.into(), name.into());
    }

    /// Flows fetched from a repository count as existing technosphere flows
    pub fn extend_from_flows<'a>(&mut self, flows: impl IntoIterator<Item = &'a Flow>) {
        for flow in flows {
            self.insert(flow.id.clone(), flow.name.clone());
        }
    }

    pub fn name_of(&self, uuid: &str) -> Option<&str> {
        self.names.get(uuid).map(String::as_str)
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.names.contains_key(uuid)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// ============================================================================
// FLOW REGISTRY
// ============================================================================

/// All flows of a run keyed by UUID, plus the ids that must be serialized
#[derive(Debug, Default)]
pub struct FlowRegistry {
    pub flows: BTreeMap<String, Flow>,
    pub new_flow_ids: Vec<String>,
}

impl FlowRegistry {
    pub fn get(&self, uuid: &str) -> Option<&Flow> {
        self.flows.get(uuid)
    }

    pub fn new_flows(&self) -> impl Iterator<Item = &Flow> {
        self.new_flow_ids.iter().filter_map(|id| self.flows.get(id))
    }

    pub fn count_by_origin(&self, origin: FlowOrigin) -> usize {
        self.flows.values().filter(|f| f.origin == origin).count()
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

/// Build the flow registry from exchange rows.
///
/// Rows are deduplicated by FlowUUID (first occurrence wins). A row without a
/// FlowUUID is keyed by the hash of its FlowName.
pub fn build_flow_dict(
    rows: &[ExchangeRow],
    elementary: Option<&dyn ElementaryFlowSource>,
    tech_flows: Option<&TechFlowRegistry>,
    units: &dyn UnitResolver,
) -> PipelineResult<FlowRegistry> {
    info!("Creating dictionary of flows");
    if elementary.is_none() {
        info!("Elementary flow list not available, UUIDs will not be checked against it");
    }

    let mut registry = FlowRegistry::default();
    let mut seen: HashSet<String> = HashSet::new();

    for row in rows {
        let supplied = row
            .flow_uuid
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let key = supplied
            .map(str::to_string)
            .unwrap_or_else(|| uuid_of(&row.flow_name));
        if !seen.insert(key.clone()) {
            continue;
        }

        let in_elementary = supplied.is_some_and(|u| elementary.is_some_and(|fl| fl.contains(u)));
        let in_tech = supplied.is_some_and(|u| tech_flows.is_some_and(|t| t.contains(u)));

        let flow = match (elementary, in_elementary, in_tech) {
            (Some(_), false, false) => mint_flow(row, &key, units)?,
            (Some(fl), true, _) => {
                let record = fl.get(&key);
                let name = record.map(|r| r.name.clone()).unwrap_or_else(|| row.flow_name.clone());
                Flow::new(&key, name, FlowOrigin::Elementary)
                    .with_flow_type(Some(FlowType::ElementaryFlow))
            }
            (_, _, true) => {
                let name = tech_flows
                    .and_then(|t| t.name_of(&key))
                    .unwrap_or(&row.flow_name)
                    .to_string();
                let flow_type = Some(row.flow_type).filter(FlowType::is_technosphere);
                Flow::new(&key, name, FlowOrigin::Technosphere).with_flow_type(flow_type)
            }
            (None, _, false) => {
                return Err(PipelineError::FlowResolution {
                    uuid: supplied.unwrap_or("<none>").to_string(),
                    flow_name: row.flow_name.clone(),
                });
            }
        };

        if flow.needs_serialization() {
            registry.new_flow_ids.push(flow.id.clone());
        }
        registry.flows.insert(key, flow);
    }

    info!(
        "Flows: {} new, {} elementary, {} technosphere",
        registry.count_by_origin(FlowOrigin::Minted),
        registry.count_by_origin(FlowOrigin::Elementary),
        registry.count_by_origin(FlowOrigin::Technosphere)
    );
    Ok(registry)
}

fn mint_flow(row: &ExchangeRow, id: &str, units: &dyn UnitResolver) -> PipelineResult<Flow> {
    debug!("Creating new flow: {}", row.flow_name);
    let property = units
        .property_ref(&row.unit)
        .ok_or_else(|| PipelineError::UnresolvedUnits(vec![row.unit.clone()]))?;

    let mut flow = Flow::new(id, &row.flow_name, FlowOrigin::Minted)
        .with_flow_type(Some(row.flow_type))
        .with_category(&row.context);
    flow.flow_properties = vec![FlowPropertyFactor::reference(property)];
    flow.tags = row.tags.clone();
    flow.last_change = Some(last_change_now());
    Ok(flow)
}

// ============================================================================
// TESTS
// ============================================================================
