// 🌉 Bridge Processes - 1:1 conversion between a source flow and a target flow
//
// A bridge has exactly two exchanges:
//   new side:    the bridged flow, quantitative reference, amount 1
//   target side: the repository flow, amount 1 × conversion_factor
// Name and id depend only on (target repo, bridged flow name).

use super::TechFlowMapping;
use crate::errors::{PipelineError, PipelineResult};
use crate::identity::uuid_of;
use crate::schema::ExchangeRow;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

/// Repository the bridged datasets are published into
pub const HOME_REPOSITORY: &str = "USLCI";

/// Naming convention for synthesized bridge processes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeNaming {
    /// "{flow} PROXY" in "Bridge Processes" for home-repository targets
    #[default]
    Proxy,
    /// "{flow} - PROXY" in "Proxy Processes" for home-repository targets
    ProxyHyphenated,
}

impl BridgeNaming {
    fn is_home(repo: Option<&str>) -> bool {
        repo.map_or(true, |r| r == HOME_REPOSITORY)
    }

    pub fn process_name(&self, repo: Option<&str>, flow_name: &str) -> String {
        match (Self::is_home(repo), self) {
            (true, BridgeNaming::Proxy) => format!("{} PROXY", flow_name),
            (true, BridgeNaming::ProxyHyphenated) => format!("{} - PROXY", flow_name),
            (false, _) => format!(
                "{} BRIDGE, {} to {}",
                flow_name,
                HOME_REPOSITORY,
                repo.unwrap_or_default()
            ),
        }
    }

    pub fn category(&self, repo: Option<&str>) -> String {
        match (Self::is_home(repo), self) {
            (true, BridgeNaming::Proxy) => "Bridge Processes".to_string(),
            (true, BridgeNaming::ProxyHyphenated) => "Proxy Processes".to_string(),
            (false, _) => format!(
                "Bridge Processes / {} to {}",
                HOME_REPOSITORY,
                repo.unwrap_or_default()
            ),
        }
    }
}

/// Exchange rows of one bridge process per distinct bridged flow
pub fn create_bridge_processes(
    rows: &[ExchangeRow],
    mapping: &TechFlowMapping,
    naming: BridgeNaming,
) -> PipelineResult<Vec<ExchangeRow>> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut bridge_rows = Vec::new();

    for row in rows {
        let Some(link) = &row.bridge else {
            continue;
        };
        if !seen.insert(row.flow_name.as_str()) {
            continue;
        }

        let entry = mapping.get(&link.source_flow_name).ok_or_else(|| {
            PipelineError::invalid(format!(
                "No mapping entry for bridged flow {}",
                link.source_flow_name
            ))
        })?;
        let target = mapping
            .target_flow(entry)
            .ok_or_else(|| PipelineError::BridgeTargetMissing {
                source_flow: link.source_flow_name.clone(),
                target_flow: entry.target_flow_name.clone(),
            })?;

        let repo = link.target_repo.as_deref();
        let name = naming.process_name(repo, &row.flow_name);

        let mut base = row.clone();
        base.process_id = Some(uuid_of(&name));
        base.process_category = naming.category(repo);
        base.process_name = name;
        base.default_provider = None;
        base.default_provider_process = None;
        base.bridge = None;
        base.amount = 1.0;

        let mut new_side = base.clone();
        new_side.reference = !row.reference;
        new_side.is_input = !row.is_input;
        new_side.flow_uuid = Some(uuid_of(&row.flow_name));

        let mut target_side = base;
        target_side.flow_name = entry.target_flow_name.clone();
        target_side.flow_uuid = Some(target.id.clone());
        target_side.context = target.category.clone().unwrap_or_default();
        if let Some(unit) = &entry.target_unit {
            target_side.unit = unit.clone();
        }
        target_side.amount = 1.0 * entry.conversion_factor;
        target_side.tags = link.target_repo.iter().cloned().collect();

        bridge_rows.push(new_side);
        bridge_rows.push(target_side);
    }

    info!("Created {} bridge processes", bridge_rows.len() / 2);
    Ok(bridge_rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::FlowType;
    use crate::mapping::tests::{create_test_repository, create_test_spec};
    use crate::mapping::{apply_tech_flow_mapping, default_predicate, prepare_tech_flow_mappings};

    #[test]
    fn test_naming_rules() {
        let naming = BridgeNaming::Proxy;
        assert_eq!(naming.process_name(Some("USLCI"), "Diesel, combusted"), "Diesel, combusted PROXY");
        assert_eq!(naming.category(Some("USLCI")), "Bridge Processes");
        assert_eq!(
            naming.process_name(Some("US Electricity Baseline"), "Electricity"),
            "Electricity BRIDGE, USLCI to US Electricity Baseline"
        );
        assert_eq!(
            naming.category(Some("US Electricity Baseline")),
            "Bridge Processes / USLCI to US Electricity Baseline"
        );

        let hyphenated = BridgeNaming::ProxyHyphenated;
        assert_eq!(hyphenated.process_name(Some("USLCI"), "Diesel"), "Diesel - PROXY");
        assert_eq!(hyphenated.category(Some("USLCI")), "Proxy Processes");
    }

    #[test]
    fn test_naming_is_deterministic() {
        let a = BridgeNaming::default().process_name(Some("USLCI"), "Diesel");
        let b = BridgeNaming::default().process_name(Some("USLCI"), "Diesel");
        assert_eq!(uuid_of(&a), uuid_of(&b));
    }

    #[test]
    fn test_one_bridge_per_flow() {
        let mapping = prepare_tech_flow_mappings(&create_test_spec(), &create_test_repository()).unwrap();
        let rows: Vec<ExchangeRow> = ["Truck transport", "Bus transport", "Rail transport"]
            .iter()
            .map(|p| ExchangeRow::new(*p, "Diesel fuel", FlowType::ProductFlow, 3.0, "L").as_input())
            .collect();
        let mapped = apply_tech_flow_mapping(rows, &mapping, BridgeNaming::default(), &default_predicate);
        let bridges = create_bridge_processes(&mapped, &mapping, BridgeNaming::default()).unwrap();
        assert_eq!(bridges.len(), 2);
        assert!(bridges.iter().all(|r| r.default_provider.is_none()));
        assert!(bridges.iter().all(|r| !r.is_bridged()));
    }

    #[test]
    fn test_conversion_applied_exactly_once() {
        let mut spec = create_test_spec();
        spec[0].conversion_factor = Some(0.5);
        let mapping = prepare_tech_flow_mappings(&spec, &create_test_repository()).unwrap();
        let rows = vec![ExchangeRow::new("Truck transport", "Diesel fuel", FlowType::ProductFlow, 4.0, "L").as_input()];
        let mapped = apply_tech_flow_mapping(rows, &mapping, BridgeNaming::default(), &default_predicate);
        let bridges = create_bridge_processes(&mapped, &mapping, BridgeNaming::default()).unwrap();

        assert_eq!(mapped[0].amount, 4.0);
        assert_eq!(bridges[0].amount, 1.0);
        assert_eq!(bridges[1].amount, 0.5);
    }

    #[test]
    fn test_missing_target_flow_is_fatal() {
        let mut spec = create_test_spec();
        spec[0].target_flow_name = "Diesel, not in repo".to_string();
        let mapping = prepare_tech_flow_mappings(&spec, &create_test_repository()).unwrap();
        let rows = vec![ExchangeRow::new("Truck transport", "Diesel fuel", FlowType::ProductFlow, 4.0, "L").as_input()];
        let mapped = apply_tech_flow_mapping(rows, &mapping, BridgeNaming::default(), &default_predicate);

        let err = create_bridge_processes(&mapped, &mapping, BridgeNaming::default()).unwrap_err();
        assert!(matches!(err, PipelineError::BridgeTargetMissing { .. }));
        assert!(err.is_identity_error());
    }
}
