// 🔀 Tech Flow Mapper - source flow names → target repository flows
//
// Three steps, run in order:
//   1. prepare  - one entry per SourceFlowName, resolved against the target
//                 repositories (one fetch per repository)
//   2. apply    - per-row rewrite of flow identity, unit, amount, provider
//   3. bridge   - synthesize one bridge process per bridged flow
//
// Unit conversion happens exactly once: in `apply` for direct mappings, in
// `create_bridge_processes` for bridged ones.

pub mod apply;
pub mod bridge;

pub use apply::{apply_tech_flow_mapping, default_predicate, ProcessIdLookup};
pub use bridge::{create_bridge_processes, BridgeNaming, HOME_REPOSITORY};

use crate::entities::{Flow, FlowOrigin, ModelType, Ref};
use crate::errors::PipelineResult;
use crate::identity::uuid_of;
use crate::repository::{read_repository_data, FetchRequest, ObjectType, Repository};
use crate::schema::MappingSpecRow;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

// ============================================================================
// MAPPING ENTRY
// ============================================================================

/// Resolution of one SourceFlowName
#[derive(Debug, Clone, PartialEq)]
pub struct FlowMappingEntry {
    pub is_bridge: bool,

    /// Name the mapped rows carry (BridgeFlowName for bridges, else TargetFlowName)
    pub target_name: String,

    /// Name of the flow in the target repository
    pub target_flow_name: String,

    /// Default provider; never set for bridges (they provide themselves)
    pub provider_name: Option<String>,

    pub target_repo: Option<String>,
    pub conversion_factor: f64,
    pub target_unit: Option<String>,

    /// Target flow id; `None` when a new flow is needed or the lookup failed
    pub resolved_id: Option<String>,
}

impl FlowMappingEntry {
    pub fn from_spec(row: &MappingSpecRow) -> Self {
        let is_bridge = row.is_bridge();
        let non_blank = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let target_flow_name = row.target_flow_name.trim().to_string();
        let target_name = if is_bridge {
            non_blank(&row.bridge_flow_name).unwrap_or_else(|| target_flow_name.clone())
        } else {
            target_flow_name.clone()
        };

        FlowMappingEntry {
            is_bridge,
            target_name,
            target_flow_name,
            provider_name: if is_bridge { None } else { non_blank(&row.provider) },
            target_repo: non_blank(&row.target_repo_name),
            conversion_factor: row.conversion_factor.unwrap_or(1.0),
            target_unit: non_blank(&row.target_unit),
            resolved_id: None,
        }
    }
}

// ============================================================================
// TECH FLOW MAPPING
// ============================================================================

/// Prepared mapping: entries by source name plus everything fetched for them
#[derive(Debug, Clone, Default)]
pub struct TechFlowMapping {
    pub entries: BTreeMap<String, FlowMappingEntry>,

    /// Target flows fetched from the repositories, by name
    pub flow_objs: BTreeMap<String, Flow>,

    /// Provider processes (references only), by name
    pub provider_refs: BTreeMap<String, Ref>,
}

impl TechFlowMapping {
    pub fn get(&self, source_flow_name: &str) -> Option<&FlowMappingEntry> {
        self.entries.get(source_flow_name)
    }

    /// Category of the entry's target flow, empty if it was not fetched
    pub fn target_context(&self, entry: &FlowMappingEntry) -> String {
        self.flow_objs
            .get(&entry.target_flow_name)
            .and_then(|f| f.category.clone())
            .unwrap_or_default()
    }

    pub fn target_flow(&self, entry: &FlowMappingEntry) -> Option<&Flow> {
        self.flow_objs.get(&entry.target_flow_name)
    }

    pub fn fetched_flows(&self) -> impl Iterator<Item = &Flow> {
        self.flow_objs.values()
    }

    pub fn bridge_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_bridge).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build mapping entries and resolve them with one fetch per target repository
pub fn prepare_tech_flow_mappings(
    spec: &[MappingSpecRow],
    repository: &dyn Repository,
) -> PipelineResult<TechFlowMapping> {
    info!("Preparing technosphere flow mappings");
    let mut mapping = TechFlowMapping::default();

    for row in spec {
        let source = row.source_flow_name.trim().to_string();
        if mapping.entries.contains_key(&source) {
            debug!("Duplicate mapping for {}, last row wins", source);
        }
        mapping.entries.insert(source, FlowMappingEntry::from_spec(row));
    }

    // ========================================================================
    // BATCH FETCH (one request per repository)
    // ========================================================================

    let mut requests: BTreeMap<String, FetchRequest> = BTreeMap::new();
    for entry in mapping.entries.values() {
        let Some(repo) = &entry.target_repo else {
            continue;
        };
        let request = requests.entry(repo.clone()).or_default();
        request.add_names(ObjectType::Flows, [entry.target_flow_name.clone()]);
        if let Some(provider) = &entry.provider_name {
            request.add_names(ObjectType::Process, [provider.clone()]);
        }
    }

    let data = read_repository_data(repository, &requests)?;
    for records in data.into_values() {
        for record in records {
            match record.object_type {
                ObjectType::Flows => {
                    let mut flow: Flow = record.to_entity()?;
                    flow.origin = FlowOrigin::Technosphere;
                    mapping.flow_objs.insert(flow.name.clone(), flow);
                }
                ObjectType::Process => {
                    let provider = record.to_ref(ModelType::Process)?;
                    mapping
                        .provider_refs
                        .insert(provider.name_or_empty().to_string(), provider);
                }
                _ => {}
            }
        }
    }

    // ========================================================================
    // RESOLVE IDS
    // ========================================================================

    for entry in mapping.entries.values_mut() {
        if entry.is_bridge {
            entry.resolved_id = Some(uuid_of(&entry.target_name));
            continue;
        }
        entry.resolved_id = mapping
            .flow_objs
            .get(&entry.target_name)
            .map(|f| f.id.clone());
        if entry.resolved_id.is_none() {
            match entry.target_repo {
                None => warn!("New flow needed: {}.", entry.target_name),
                Some(_) => warn!("Flow: {} not found.", entry.target_name),
            }
        }
    }

    info!(
        "Mapped {} source flows ({} bridged) against {} repositories",
        mapping.entries.len(),
        mapping.bridge_count(),
        requests.len()
    );
    Ok(mapping)
}

// ============================================================================
// TESTS
// ============================================================================
