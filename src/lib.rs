// olca-bridge - Core Library
// Exchange tables → olca-schema 2 JSON-LD archives, with technosphere flow
// mapping, bridge processes and process documentation

pub mod errors;
pub mod identity;
pub mod units;
pub mod schema;      // Shape Layer - exchange + mapping tables
pub mod entities;    // olca-schema entities
pub mod repository;  // Repository collaborator (archives, in-memory)
pub mod flows;       // FlowResolver
pub mod mapping;     // TechFlowMapper + bridge processes
pub mod metadata;    // MetadataAssembler + reference extraction
pub mod locations;
pub mod processes;   // ProcessBuilder
pub mod export;      // JSON-LD archive writer
pub mod config;
pub mod pipeline;

// Re-export commonly used types
pub use errors::{PipelineError, PipelineResult};
pub use identity::{uuid_of, uuid_of_parts};
pub use units::{round_to_sig_figs, validate_units, UnitResolver, UnitTable};
pub use schema::{
    validate_exchange_data, ExchangeRow, ExchangeTable, MappingSpecRow, MappingTable,
};
pub use entities::{
    Actor, DqSystem, Exchange, Flow, FlowOrigin, FlowType, Location, Process,
    ProcessDocumentation, Ref, RootEntity, Source,
};
pub use repository::{
    extract_bridge_process, Access, ArchiveRepository, FetchRequest, MemoryRepository,
    ObjectType, Record, RepoCatalog, Repository,
};
pub use flows::{
    build_flow_dict, ElementaryFlowList, ElementaryFlowSource, FlowRegistry, TechFlowRegistry,
};
pub use mapping::{
    apply_tech_flow_mapping, create_bridge_processes, prepare_tech_flow_mappings,
    BridgeNaming, TechFlowMapping,
};
pub use metadata::{
    assign_year_to_meta, extract_actors_from_process_meta, extract_dq_systems,
    extract_sources_from_process_meta, format_dqi_score, increment_dqi_value,
    MetadataAssembler, MetadataFieldRegistry, ProcessMetadata,
};
pub use locations::{build_location_dict, LocationFile, LocationLookup};
pub use processes::{make_exchanges, ProcessBuilder};
pub use export::{write_archive, ArchiveContents};
pub use config::PipelineConfig;
pub use pipeline::{Pipeline, RunSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
