// 🏭 Process Builder - exchange rows → Process entities with exchanges
//
// Rows are grouped by (ProcessID, ProcessCategory, ProcessName, location).
// Every exchange references a flow of the registry; a row whose flow is not
// there aborts the build instead of producing a dangling reference.

use crate::entities::{Exchange, Location, ModelType, Process, Ref, RootEntity};
use crate::errors::{PipelineError, PipelineResult};
use crate::flows::FlowRegistry;
use crate::identity::uuid_of;
use crate::metadata::{DqSystems, MetadataAssembler, ProcessMetadata};
use crate::schema::ExchangeRow;
use crate::units::UnitResolver;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

// ============================================================================
// GROUPING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ProcessKey {
    id: String,
    category: String,
    name: String,
    location: Option<String>,
}

impl ProcessKey {
    fn of(row: &ExchangeRow) -> Self {
        let id = row
            .process_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid_of(&row.process_name));
        ProcessKey {
            id,
            category: row.process_category.clone(),
            name: row.process_name.clone(),
            location: row
                .location
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        }
    }
}

/// Rows per process, in order of first appearance
fn group_rows(rows: &[ExchangeRow]) -> Vec<(ProcessKey, Vec<&ExchangeRow>)> {
    let mut groups: Vec<(ProcessKey, Vec<&ExchangeRow>)> = Vec::new();
    let mut index: HashMap<ProcessKey, usize> = HashMap::new();
    for row in rows {
        let key = ProcessKey::of(row);
        match index.get(&key) {
            Some(&i) => groups[i].1.push(row),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![row]));
            }
        }
    }
    groups
}

// ============================================================================
// EXCHANGES
// ============================================================================

/// Exchanges of one process; `internalId` counts from 1 in row order
pub fn make_exchanges(
    process: &Process,
    rows: &[&ExchangeRow],
    flows: &FlowRegistry,
    units: &dyn UnitResolver,
) -> PipelineResult<Vec<Exchange>> {
    let mut exchanges = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let uuid = row
            .flow_uuid
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid_of(&row.flow_name));
        let flow = flows
            .get(&uuid)
            .ok_or_else(|| PipelineError::UnknownProcessFlow {
                process: process.name.clone(),
                uuid: uuid.clone(),
            })?;
        let unit = units
            .unit_ref(&row.unit)
            .ok_or_else(|| PipelineError::UnresolvedUnits(vec![row.unit.clone()]))?;

        let dq_entry = row
            .exchange_dqi
            .clone()
            .filter(|dqi| !dqi.trim().is_empty() && process.exchange_dq_system.is_some());
        let default_provider = row
            .default_provider
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(|id| {
                let mut provider = Ref::bare(ModelType::Process, id);
                provider.name = row.default_provider_process.clone();
                provider
            });

        exchanges.push(Exchange {
            internal_id: (i + 1) as u32,
            flow: flow.to_ref(),
            is_quantitative_reference: row.reference,
            is_input: row.is_input,
            amount: row.amount,
            unit: Some(unit),
            flow_property: units.property_ref(&row.unit),
            is_avoided_product: row.avoided_product.unwrap_or(false),
            default_provider,
            dq_entry,
            description: row.description.clone(),
        });
    }
    Ok(exchanges)
}

// ============================================================================
// PROCESS BUILDER
// ============================================================================

pub struct ProcessBuilder<'a> {
    flows: &'a FlowRegistry,
    units: &'a dyn UnitResolver,
    metadata: Option<&'a ProcessMetadata>,
    assembler: Option<&'a MetadataAssembler>,
    locations: Option<&'a BTreeMap<String, Location>>,
    dq_systems: Option<&'a DqSystems>,
}

impl<'a> ProcessBuilder<'a> {
    pub fn new(flows: &'a FlowRegistry, units: &'a dyn UnitResolver) -> Self {
        ProcessBuilder {
            flows,
            units,
            metadata: None,
            assembler: None,
            locations: None,
            dq_systems: None,
        }
    }

    /// Builder: metadata maps and the assembler holding this run's actors / sources
    pub fn with_metadata(mut self, metadata: &'a ProcessMetadata, assembler: &'a MetadataAssembler) -> Self {
        self.metadata = Some(metadata);
        self.assembler = Some(assembler);
        self
    }

    pub fn with_locations(mut self, locations: &'a BTreeMap<String, Location>) -> Self {
        self.locations = Some(locations);
        self
    }

    pub fn with_dq_systems(mut self, dq_systems: &'a DqSystems) -> Self {
        self.dq_systems = Some(dq_systems);
        self
    }

    /// Processes keyed by id; a later group with the same id replaces an earlier one
    pub fn build_process_dict(&self, rows: &[ExchangeRow]) -> PipelineResult<BTreeMap<String, Process>> {
        info!("Creating dictionary of processes");
        let mut processes = BTreeMap::new();
        let mut errors = Vec::new();

        for (key, group) in group_rows(rows) {
            debug!("Building process {}", key.name);
            let mut process = Process::new(&key.name, Some(key.id.clone()));
            process.category = Some(key.category.clone()).filter(|c| !c.is_empty());

            if let (Some(code), Some(locations)) = (&key.location, self.locations) {
                process.location = locations.get(code).map(|l| l.to_ref());
            }
            if let Some(dq) = self.dq_systems {
                process.dq_system = dq.process.as_ref().map(|d| d.to_ref());
                process.exchange_dq_system = dq.flow.as_ref().map(|d| d.to_ref());
            }

            if let (Some(metadata), Some(assembler)) = (self.metadata, self.assembler) {
                match assembler.assemble(&mut process, &metadata.for_process(&key.name)) {
                    Ok(()) => {}
                    Err(PipelineError::Validation(messages)) => errors.extend(messages),
                    Err(e) => return Err(e),
                }
            }

            process.exchanges = make_exchanges(&process, &group, self.flows, self.units)?;
            processes.insert(process.id.clone(), process);
        }

        if !errors.is_empty() {
            return Err(PipelineError::Validation(errors));
        }
        info!("Created {} processes", processes.len());
        Ok(processes)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{DqSystem, FlowType};
    use crate::flows::{build_flow_dict, ElementaryFlowList, ElementaryFlowRecord, TechFlowRegistry};
    use crate::units::UnitTable;
    use serde_json::json;

    fn create_test_rows() -> Vec<ExchangeRow> {
        let mut coal = ExchangeRow::new("Coal extraction", "Coal", FlowType::ProductFlow, 1.0, "kg")
            .with_category("Mining")
            .with_context("Technosphere Flows/Mining")
            .with_flow_uuid("f-coal")
            .with_location("US")
            .as_reference();
        coal.exchange_dqi = Some("(1;2;3;1;2)".to_string());

        let mut diesel = ExchangeRow::new("Coal extraction", "Diesel", FlowType::ProductFlow, 0.2, "kg")
            .with_category("Mining")
            .with_flow_uuid("f-diesel")
            .with_location("US")
            .as_input();
        diesel.default_provider = Some("p-diesel".to_string());
        diesel.default_provider_process = Some("Diesel production".to_string());

        let methane = ExchangeRow::new("Coal extraction", "Methane", FlowType::ElementaryFlow, 0.01, "kg")
            .with_category("Mining")
            .with_flow_uuid("elem-ch4")
            .with_location("US");

        vec![coal, diesel, methane]
    }

    fn create_test_registry(rows: &[ExchangeRow], units: &UnitTable) -> FlowRegistry {
        let elementary = ElementaryFlowList::from_records(vec![ElementaryFlowRecord {
            uuid: "elem-ch4".to_string(),
            name: "Methane".to_string(),
            context: "emission/air".to_string(),
            unit: "kg".to_string(),
        }]);
        let mut tech = TechFlowRegistry::new();
        tech.insert("f-diesel", "Diesel");
        build_flow_dict(rows, Some(&elementary), Some(&tech), units).unwrap()
    }

    #[test]
    fn test_rows_grouped_into_one_process() {
        let units = UnitTable::new();
        let rows = create_test_rows();
        let flows = create_test_registry(&rows, &units);

        let processes = ProcessBuilder::new(&flows, &units).build_process_dict(&rows).unwrap();
        assert_eq!(processes.len(), 1);

        let process = &processes[&uuid_of("Coal extraction")];
        assert_eq!(process.category.as_deref(), Some("Mining"));
        assert_eq!(process.exchanges.len(), 3);
        let ids: Vec<u32> = process.exchanges.iter().map(|e| e.internal_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(process.exchanges[0].is_quantitative_reference);
        assert_eq!(process.exchanges[1].default_provider.as_ref().unwrap().id, "p-diesel");
        assert_eq!(process.exchanges[0].unit.as_ref().unwrap().name_or_empty(), "kg");
        // no exchange DQ system, so no DQ entry
        assert!(process.exchanges[0].dq_entry.is_none());
    }

    #[test]
    fn test_location_and_dq_attached() {
        let units = UnitTable::new();
        let rows = create_test_rows();
        let flows = create_test_registry(&rows, &units);

        let location: Location =
            serde_json::from_value(json!({"@id": "loc-us", "name": "United States", "code": "US"})).unwrap();
        let locations = BTreeMap::from([("US".to_string(), location)]);
        let dq: DqSystem = serde_json::from_value(json!({"@id": "dq-f", "name": "Flow Pedigree"})).unwrap();
        let dq_systems = DqSystems {
            process: None,
            flow: Some(dq),
        };

        let processes = ProcessBuilder::new(&flows, &units)
            .with_locations(&locations)
            .with_dq_systems(&dq_systems)
            .build_process_dict(&rows)
            .unwrap();
        let process = processes.values().next().unwrap();

        assert_eq!(process.location.as_ref().unwrap().id, "loc-us");
        assert_eq!(process.exchange_dq_system.as_ref().unwrap().id, "dq-f");
        assert_eq!(process.exchanges[0].dq_entry.as_deref(), Some("(1;2;3;1;2)"));
    }

    #[test]
    fn test_metadata_applied_per_process() {
        let units = UnitTable::new();
        let rows = create_test_rows();
        let flows = create_test_registry(&rows, &units);
        let metadata: ProcessMetadata = serde_json::from_value(json!({
            "use_advice": "General",
            "processes": {"Coal extraction": {"use_advice": "Coal only"}}
        }))
        .unwrap();
        let assembler = MetadataAssembler::new();

        let processes = ProcessBuilder::new(&flows, &units)
            .with_metadata(&metadata, &assembler)
            .build_process_dict(&rows)
            .unwrap();
        let doc = processes.values().next().unwrap().process_documentation.as_ref().unwrap();
        assert_eq!(doc.use_advice.as_deref(), Some("Coal only"));
    }

    #[test]
    fn test_location_splits_groups() {
        let units = UnitTable::new();
        let mut rows = create_test_rows();
        let mut other = rows[0].clone();
        other.location = Some("CA".to_string());
        other.process_id = Some("coal-ca".to_string());
        rows.push(other);
        let flows = create_test_registry(&rows, &units);

        let processes = ProcessBuilder::new(&flows, &units).build_process_dict(&rows).unwrap();
        assert_eq!(processes.len(), 2);
        assert_eq!(processes["coal-ca"].exchanges.len(), 1);
    }

    #[test]
    fn test_unknown_flow_is_fatal() {
        let units = UnitTable::new();
        let rows = create_test_rows();
        let flows = create_test_registry(&rows[..1], &units);

        let err = ProcessBuilder::new(&flows, &units).build_process_dict(&rows).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownProcessFlow { .. }));
    }
}
