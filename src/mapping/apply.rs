// ✏️ Mapping Application - explicit per-row rewrite
//
// Each row is either left alone (predicate false or no mapping entry),
// rewritten as a direct mapping, or rewritten to consume a bridge process.

use super::{BridgeNaming, FlowMappingEntry, TechFlowMapping};
use crate::entities::FlowType;
use crate::identity::uuid_of;
use crate::schema::{BridgeLink, ExchangeRow};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Rows whose flows are subject to technosphere mapping
pub fn default_predicate(row: &ExchangeRow) -> bool {
    row.flow_type != FlowType::ElementaryFlow
}

// ============================================================================
// PROCESS ID LOOKUP (self-referential providers)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Assigned {
    Unique(String),
    Ambiguous,
}

/// ProcessName → ProcessID for the processes created in this batch
#[derive(Debug, Default)]
pub struct ProcessIdLookup {
    ids: HashMap<String, Assigned>,
}

impl ProcessIdLookup {
    pub fn from_rows(rows: &[ExchangeRow]) -> Self {
        let mut ids: HashMap<String, Assigned> = HashMap::new();
        for row in rows {
            let id = row
                .process_id
                .clone()
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| uuid_of(&row.process_name));
            match ids.get(&row.process_name) {
                None => {
                    ids.insert(row.process_name.clone(), Assigned::Unique(id));
                }
                Some(Assigned::Unique(existing)) if *existing != id => {
                    ids.insert(row.process_name.clone(), Assigned::Ambiguous);
                }
                Some(_) => {}
            }
        }
        ProcessIdLookup { ids }
    }

    pub fn contains(&self, process_name: &str) -> bool {
        self.ids.contains_key(process_name)
    }

    /// Id of a batch process; `None` if unknown or the name maps to several ids
    pub fn id_of(&self, process_name: &str) -> Option<&str> {
        match self.ids.get(process_name) {
            Some(Assigned::Unique(id)) => Some(id),
            _ => None,
        }
    }

    pub fn is_ambiguous(&self, process_name: &str) -> bool {
        matches!(self.ids.get(process_name), Some(Assigned::Ambiguous))
    }
}

// ============================================================================
// APPLY
// ============================================================================

/// Rewrite rows matching `predicate` according to the prepared mapping.
///
/// Rows are keyed by their current FlowName. Rows with no mapping entry are
/// returned unchanged, as are rows the predicate rejects.
pub fn apply_tech_flow_mapping(
    rows: Vec<ExchangeRow>,
    mapping: &TechFlowMapping,
    naming: BridgeNaming,
    predicate: &dyn Fn(&ExchangeRow) -> bool,
) -> Vec<ExchangeRow> {
    info!("Applying technosphere flow mapping to {} rows", rows.len());
    // all batch process ids are known before any provider is resolved
    let batch = ProcessIdLookup::from_rows(&rows);

    let mut mapped = 0;
    let rows: Vec<ExchangeRow> = rows
        .into_iter()
        .map(|row| {
            if !predicate(&row) {
                return row;
            }
            match mapping.get(&row.flow_name) {
                Some(entry) => {
                    mapped += 1;
                    map_row(row, entry, mapping, &batch, naming)
                }
                None => row,
            }
        })
        .collect();

    debug!("{} rows rewritten", mapped);
    rows
}

fn map_row(
    mut row: ExchangeRow,
    entry: &FlowMappingEntry,
    mapping: &TechFlowMapping,
    batch: &ProcessIdLookup,
    naming: BridgeNaming,
) -> ExchangeRow {
    let source_flow_name = std::mem::replace(&mut row.flow_name, entry.target_name.clone());
    row.context = mapping.target_context(entry);

    if entry.is_bridge {
        let provider = naming.process_name(entry.target_repo.as_deref(), &entry.target_name);
        row.flow_uuid = Some(uuid_of(&entry.target_name));
        row.default_provider = Some(uuid_of(&provider));
        row.default_provider_process = Some(provider);
        row.bridge = Some(BridgeLink {
            source_flow_name,
            target_repo: entry.target_repo.clone(),
        });
        return row;
    }

    if let Some(id) = &entry.resolved_id {
        row.flow_uuid = Some(id.clone());
    }
    if let Some(unit) = &entry.target_unit {
        row.unit = unit.clone();
    }
    row.amount *= entry.conversion_factor;

    if let Some(provider) = &entry.provider_name {
        row.default_provider = resolve_provider(provider, mapping, batch);
        row.default_provider_process = Some(provider.clone());
    }
    row
}

fn resolve_provider(provider: &str, mapping: &TechFlowMapping, batch: &ProcessIdLookup) -> Option<String> {
    if let Some(r) = mapping.provider_refs.get(provider) {
        return Some(r.id.clone());
    }
    if batch.is_ambiguous(provider) {
        warn!("Ambiguous default provider: {} has several ProcessIDs in this batch", provider);
        return None;
    }
    match batch.id_of(provider) {
        Some(id) => Some(id.to_string()),
        None => {
            warn!("Default provider: {} not found.", provider);
            None
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::prepare_tech_flow_mappings;
    use crate::mapping::tests::{create_test_repository, create_test_spec};

    fn create_test_mapping() -> TechFlowMapping {
        prepare_tech_flow_mappings(&create_test_spec(), &create_test_repository()).unwrap()
    }

    fn create_test_row(flow_name: &str, flow_type: FlowType) -> ExchangeRow {
        ExchangeRow::new("Cement production", flow_name, flow_type, 10.0, "kWh")
            .with_category("Minerals")
            .with_context("Technosphere Flows")
            .as_input()
    }

    #[test]
    fn test_direct_mapping_converts_once() {
        let mapping = create_test_mapping();
        let rows = vec![create_test_row("electricity", FlowType::ProductFlow)];
        let out = apply_tech_flow_mapping(rows, &mapping, BridgeNaming::default(), &default_predicate);

        let row = &out[0];
        assert_eq!(row.flow_name, "Electricity, AC, 120 V");
        assert_eq!(row.flow_uuid.as_deref(), Some("f-elec"));
        assert_eq!(row.context, "Utilities");
        assert_eq!(row.unit, "MJ");
        assert!((row.amount - 36.0).abs() < 1e-12);
        assert_eq!(row.default_provider_process.as_deref(), Some("Grid mix"));
        assert_eq!(row.default_provider.as_deref(), Some("p-grid"));
        assert!(!row.is_bridged());
    }

    #[test]
    fn test_elementary_rows_untouched() {
        let mapping = create_test_mapping();
        let row = create_test_row("electricity", FlowType::ElementaryFlow);
        let out = apply_tech_flow_mapping(vec![row.clone()], &mapping, BridgeNaming::default(), &default_predicate);
        assert_eq!(out[0], row);
    }

    #[test]
    fn test_false_predicate_is_identity() {
        let mapping = create_test_mapping();
        let row = create_test_row("electricity", FlowType::ProductFlow).with_flow_uuid("f-elec");
        let out = apply_tech_flow_mapping(vec![row.clone()], &mapping, BridgeNaming::default(), &|_: &ExchangeRow| false);
        assert_eq!(out[0], row);
    }

    #[test]
    fn test_unmapped_row_keeps_values() {
        let mapping = create_test_mapping();
        let mut row = create_test_row("limestone", FlowType::ProductFlow);
        row.default_provider = Some("p-lime".to_string());
        let out = apply_tech_flow_mapping(vec![row.clone()], &mapping, BridgeNaming::default(), &default_predicate);
        assert_eq!(out[0], row);
    }

    #[test]
    fn test_unresolved_target_keeps_uuid_and_empties_context() {
        let mapping = create_test_mapping();
        let row = create_test_row("steel", FlowType::ProductFlow).with_flow_uuid("old-uuid");
        let out = apply_tech_flow_mapping(vec![row], &mapping, BridgeNaming::default(), &default_predicate);
        assert_eq!(out[0].flow_name, "Steel, hot rolled");
        assert_eq!(out[0].flow_uuid.as_deref(), Some("old-uuid"));
        assert_eq!(out[0].context, "");
    }

    #[test]
    fn test_self_referential_provider() {
        let mut mapping = create_test_mapping();
        mapping.entries.get_mut("steel").unwrap().provider_name = Some("Steel rolling".to_string());

        let producer = ExchangeRow::new("Steel rolling", "Steel, hot rolled", FlowType::ProductFlow, 1.0, "kg")
            .as_reference();
        let consumer = create_test_row("steel", FlowType::ProductFlow);
        let out = apply_tech_flow_mapping(vec![consumer, producer], &mapping, BridgeNaming::default(), &default_predicate);

        assert_eq!(out[0].default_provider, Some(uuid_of("Steel rolling")));
    }

    #[test]
    fn test_ambiguous_provider_left_unset() {
        let mut mapping = create_test_mapping();
        mapping.entries.get_mut("steel").unwrap().provider_name = Some("Steel rolling".to_string());

        let mut a = ExchangeRow::new("Steel rolling", "Steel, hot rolled", FlowType::ProductFlow, 1.0, "kg");
        a.process_id = Some("id-a".to_string());
        let mut b = a.clone();
        b.process_id = Some("id-b".to_string());
        let consumer = create_test_row("steel", FlowType::ProductFlow);

        let out = apply_tech_flow_mapping(vec![consumer, a, b], &mapping, BridgeNaming::default(), &default_predicate);
        assert_eq!(out[0].default_provider_process.as_deref(), Some("Steel rolling"));
        assert!(out[0].default_provider.is_none());
    }

    #[test]
    fn test_lookup_explicit_ids() {
        let mut row = ExchangeRow::new("Kiln", "Clinker", FlowType::ProductFlow, 1.0, "kg");
        row.process_id = Some("pinned".to_string());
        let lookup = ProcessIdLookup::from_rows(&[row.clone(), row]);
        assert_eq!(lookup.id_of("Kiln"), Some("pinned"));
        assert!(!lookup.is_ambiguous("Kiln"));
        assert!(!lookup.contains("Mill"));
    }
}
