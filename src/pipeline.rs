// 🔄 Pipeline - exchange table in, JSON-LD archive out
//
// Stages run in a fixed order and every fatal check happens before the
// archive is opened, so a failed run never leaves a partial archive behind:
//   load → tech mapping (+ bridges) → validation → flows → metadata
//   → locations → processes → archive

use crate::config::PipelineConfig;
use crate::entities::FlowOrigin;
use crate::errors::PipelineResult;
use crate::export::{write_archive, ArchiveContents};
use crate::flows::{
    build_flow_dict, elementary_flow, ElementaryFlowList, ElementaryFlowSource, FlowRegistry,
    TechFlowRegistry,
};
use crate::locations::{build_location_dict, LocationFile};
use crate::mapping::{
    apply_tech_flow_mapping, create_bridge_processes, default_predicate, prepare_tech_flow_mappings,
    TechFlowMapping,
};
use crate::metadata::{
    assign_year_to_meta, extract_actors_from_process_meta, extract_dq_systems,
    extract_sources_from_process_meta, read_tabular_metadata, BibliographyFile, DqSystems,
    MetadataAssembler, ProcessMetadata,
};
use crate::processes::ProcessBuilder;
use crate::repository::{ArchiveRepository, Repository};
use crate::schema::{validate_exchange_data, ExchangeRow, ExchangeTable, MappingTable};
use crate::units::UnitTable;
use anyhow::Context;
use std::path::PathBuf;
use tracing::info;

/// What a run produced
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub archive: Option<PathBuf>,
    pub exchanges: usize,
    pub processes: usize,
    pub bridges: usize,
    pub new_flows: usize,
    pub entities: usize,
}

pub struct Pipeline {
    config: PipelineConfig,
    repository: Box<dyn Repository>,
}

impl Pipeline {
    /// Pipeline reading repository exports from `config.repository_root`
    pub fn new(config: PipelineConfig) -> Self {
        let repository = ArchiveRepository::new(&config.repository_root, config.repositories.clone())
            .with_access(config.access());
        Pipeline {
            config,
            repository: Box::new(repository),
        }
    }

    /// Builder: swap the repository collaborator
    pub fn with_repository(mut self, repository: Box<dyn Repository>) -> Self {
        self.repository = repository;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn load_units(&self) -> anyhow::Result<UnitTable> {
        let mut units = UnitTable::new();
        if let Some(path) = &self.config.units {
            let added = units
                .extend_from_csv(path)
                .with_context(|| format!("Failed to load units: {}", path.display()))?;
            info!("Loaded {} extra units", added);
        }
        Ok(units)
    }

    /// Load, map and validate the exchange table
    fn prepare_rows(&self, units: &UnitTable) -> anyhow::Result<(Vec<ExchangeRow>, Option<TechFlowMapping>, usize)> {
        let path = &self.config.exchanges;
        info!("Loading exchanges from {}", path.display());
        let mut rows = ExchangeTable::from_csv(path)
            .with_context(|| format!("Failed to load exchanges: {}", path.display()))?;

        let mut mapping = None;
        let mut bridges = 0;
        if let Some(spec_path) = &self.config.tech_mapping {
            let spec = MappingTable::from_csv(spec_path)
                .with_context(|| format!("Failed to load tech mapping: {}", spec_path.display()))?;
            let prepared = prepare_tech_flow_mappings(&spec, self.repository.as_ref())?;
            rows = apply_tech_flow_mapping(rows, &prepared, self.config.bridge_naming, &default_predicate);
            let bridge_rows = create_bridge_processes(&rows, &prepared, self.config.bridge_naming)?;
            bridges = bridge_rows.len() / 2;
            rows.extend(bridge_rows);
            mapping = Some(prepared);
        }

        validate_exchange_data(&rows, units)?;
        Ok((rows, mapping, bridges))
    }

    /// Load + validation only; nothing is written
    pub fn validate(&self) -> anyhow::Result<RunSummary> {
        let units = self.load_units()?;
        let (rows, _, bridges) = self.prepare_rows(&units)?;
        info!("Exchange data is valid ({} rows)", rows.len());
        Ok(RunSummary {
            archive: None,
            exchanges: rows.len(),
            processes: 0,
            bridges,
            new_flows: 0,
            entities: 0,
        })
    }

    pub fn run(&self) -> anyhow::Result<RunSummary> {
        let units = self.load_units()?;
        let (rows, mapping, bridges) = self.prepare_rows(&units)?;

        // ====================================================================
        // FLOWS
        // ====================================================================

        let mut tech = match &self.config.tech_flows {
            Some(path) => TechFlowRegistry::from_csv(path)
                .with_context(|| format!("Failed to load tech flows: {}", path.display()))?,
            None => TechFlowRegistry::new(),
        };
        if let Some(mapping) = &mapping {
            tech.extend_from_flows(mapping.fetched_flows());
        }
        let elementary = match &self.config.elementary_flows {
            Some(path) => Some(
                ElementaryFlowList::from_csv(path)
                    .with_context(|| format!("Failed to load elementary flows: {}", path.display()))?,
            ),
            None => None,
        };
        let elementary_source = elementary.as_ref().map(|e| e as &dyn ElementaryFlowSource);
        let flows = build_flow_dict(&rows, elementary_source, Some(&tech), &units)?;

        // ====================================================================
        // METADATA
        // ====================================================================

        let mut metadata = match &self.config.metadata {
            Some(path) => ProcessMetadata::from_file(path)?,
            None => ProcessMetadata::default(),
        };
        if let Some(path) = &self.config.tabular_metadata {
            let sheet = read_tabular_metadata(path)
                .with_context(|| format!("Failed to load metadata sheet: {}", path.display()))?;
            metadata.merge_overrides(sheet);
        }
        if let Some((from, until)) = self.config.years {
            assign_year_to_meta(&mut metadata.shared, from, until)?;
        }

        let actors = extract_actors_from_process_meta(&mut metadata, self.repository.as_ref())?;
        let sources = match &self.config.bibliography {
            Some(path) => {
                let bibliography = BibliographyFile::from_file(path)?;
                extract_sources_from_process_meta(&mut metadata, &bibliography)?
            }
            None => Default::default(),
        };
        let dq_systems = if self.config.dq_systems.is_empty() {
            DqSystems::default()
        } else {
            extract_dq_systems(&self.config.dq_systems, self.repository.as_ref())?
        };
        let assembler = MetadataAssembler::new().with_actors(actors).with_sources(sources);

        // ====================================================================
        // LOCATIONS + PROCESSES
        // ====================================================================

        let locations = match &self.config.locations {
            Some(path) => build_location_dict(&rows, &LocationFile::from_file(path)?),
            None => Default::default(),
        };
        let processes = ProcessBuilder::new(&flows, &units)
            .with_metadata(&metadata, &assembler)
            .with_locations(&locations)
            .with_dq_systems(&dq_systems)
            .build_process_dict(&rows)?;

        // ====================================================================
        // ARCHIVE
        // ====================================================================

        let mut contents = ArchiveContents::new();
        contents.add_all(flows.new_flows())?;
        add_elementary_flows(&mut contents, &flows, elementary_source, &units)?;
        contents.add_all(processes.values())?;
        contents.add_all(locations.values())?;
        contents.add_all(assembler.sources())?;
        contents.add_all(assembler.actors())?;
        contents.add_all(dq_systems.all())?;

        let archive = write_archive(&self.config.output_dir, &self.config.name, &contents)?;
        Ok(RunSummary {
            archive: Some(archive),
            exchanges: rows.len(),
            processes: processes.len(),
            bridges,
            new_flows: flows.new_flow_ids.len(),
            entities: contents.len(),
        })
    }
}

/// Full elementary flows for every elementary UUID the exchanges use
fn add_elementary_flows(
    contents: &mut ArchiveContents,
    flows: &FlowRegistry,
    elementary: Option<&dyn ElementaryFlowSource>,
    units: &UnitTable,
) -> PipelineResult<()> {
    let Some(list) = elementary else {
        return Ok(());
    };
    for flow in flows.flows.values().filter(|f| f.origin == FlowOrigin::Elementary) {
        if let Some(record) = list.get(&flow.id) {
            contents.add(&elementary_flow(record, units))?;
        }
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PipelineError;
    use crate::identity::uuid_of;
    use crate::repository::{MemoryRepository, ObjectType};
    use serde_json::json;
    use std::io::Read;
    use std::path::Path;

    const EXCHANGES: &str = "\
ProcessCategory,ProcessName,FlowUUID,FlowName,Context,IsInput,FlowType,reference,amount,unit,location
Mining,Coal extraction,f-coal,Coal,Technosphere Flows/Mining,False,PRODUCT_FLOW,True,1.0,kg,US
Mining,Coal extraction,,Diesel fuel,Technosphere Flows/Fuels,True,PRODUCT_FLOW,False,0.2,kg,US
Mining,Coal extraction,elem-ch4,Methane,emission/air,False,ELEMENTARY_FLOW,False,0.01,kg,US
";

    const MAPPING: &str = "\
SourceFlowName,Bridge,BridgeFlowName,TargetFlowName,Provider,TargetRepoName,ConversionFactor,TargetUnit
Diesel fuel,True,\"Diesel, at refinery\",\"Diesel, combusted\",,USLCI,0.85,kg
";

    const ELEMENTARY: &str = "\
Flow UUID,Flowable,Context,Unit
elem-ch4,Methane,emission/air,kg
";

    fn write(dir: &Path, name: &str, text: &str) {
        std::fs::write(dir.join(name), text).unwrap();
    }

    fn create_test_config(dir: &Path) -> PipelineConfig {
        write(dir, "exchanges.csv", EXCHANGES);
        write(dir, "mapping.csv", MAPPING);
        write(dir, "elementary.csv", ELEMENTARY);
        write(
            dir,
            "run.json",
            r#"{
                "name": "coal",
                "exchanges": "exchanges.csv",
                "tech_mapping": "mapping.csv",
                "elementary_flows": "elementary.csv"
            }"#,
        );
        PipelineConfig::from_file(&dir.join("run.json")).unwrap()
    }

    fn create_test_repository() -> MemoryRepository {
        MemoryRepository::new().with_record(
            "USLCI",
            ObjectType::Flows,
            json!({"@type": "Flow", "@id": "f-diesel", "name": "Diesel, combusted", "category": "Fuels"}),
        )
    }

    #[test]
    fn test_end_to_end_with_bridge() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(create_test_config(dir.path()))
            .with_repository(Box::new(create_test_repository()));

        let summary = pipeline.run().unwrap();
        assert_eq!(summary.bridges, 1);
        assert_eq!(summary.processes, 2);
        // coal and the bridged diesel flow are minted
        assert_eq!(summary.new_flows, 2);

        let path = summary.archive.unwrap();
        let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();

        let bridge_id = uuid_of("Diesel, at refinery PROXY");
        let mut text = String::new();
        archive
            .by_name(&format!("processes/{}.json", bridge_id))
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        let bridge: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(bridge["name"], "Diesel, at refinery PROXY");
        assert_eq!(bridge["category"], "Bridge Processes");
        assert_eq!(bridge["exchanges"].as_array().unwrap().len(), 2);
        assert_eq!(bridge["exchanges"][1]["flow"]["@id"], "f-diesel");
        assert_eq!(bridge["exchanges"][1]["amount"], 0.85);

        assert!(archive.by_name("flows/elem-ch4.json").is_ok());
        // existing repository flows are referenced, not written
        assert!(archive.by_name("flows/f-diesel.json").is_err());
    }

    #[test]
    fn test_validate_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = create_test_config(dir.path());
        let output_dir = config.output_dir.clone();
        let pipeline = Pipeline::new(config).with_repository(Box::new(create_test_repository()));

        let summary = pipeline.validate().unwrap();
        assert!(summary.archive.is_none());
        assert_eq!(summary.exchanges, 5);
        assert!(!output_dir.exists());
    }

    #[test]
    fn test_bad_unit_aborts_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let config = create_test_config(dir.path());
        write(dir.path(), "exchanges.csv", &EXCHANGES.replace("0.01,kg", "0.01,kgg"));
        let output_dir = config.output_dir.clone();
        let pipeline = Pipeline::new(config).with_repository(Box::new(create_test_repository()));

        let err = pipeline.run().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::UnresolvedUnits(units)) if units == &vec!["kgg".to_string()]
        ));
        assert!(!output_dir.exists());
    }

    #[test]
    fn test_unresolvable_flow_aborts_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        // every row carries a FlowUUID, so only flow resolution can fail
        write(dir.path(), "exchanges.csv", &EXCHANGES.replace(",,Diesel fuel", ",f-diesel,Diesel fuel"));
        write(
            dir.path(),
            "run.json",
            r#"{"name": "coal", "exchanges": "exchanges.csv"}"#,
        );
        let config = PipelineConfig::from_file(&dir.path().join("run.json")).unwrap();
        let output_dir = config.output_dir.clone();
        let pipeline = Pipeline::new(config).with_repository(Box::new(MemoryRepository::new()));

        // no elementary list and no known technosphere flows: nothing can resolve f-coal
        let err = pipeline.run().unwrap_err();
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::FlowResolution { uuid, flow_name }) => {
                assert_eq!(uuid, "f-coal");
                assert_eq!(flow_name, "Coal");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!output_dir.exists());
    }
}
