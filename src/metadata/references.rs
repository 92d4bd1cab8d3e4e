// 🔗 Metadata References - actors, sources and DQ systems named in metadata
//
// Metadata files name their references together with where to find them:
//   data_generator: {"<repo>": "<actor name>"}  or  {"_NEW": {...actor...}}
//   sources:        {"<bib id>": "<source name>"}  or a list of those
// Extraction rewrites each field to the plain name and returns the objects
// keyed by that name.

use super::{MetadataMap, ProcessMetadata};
use crate::entities::{Actor, DqSystem, Source};
use crate::errors::{PipelineError, PipelineResult};
use crate::repository::{read_repository_data, FetchRequest, ObjectType, Repository};
use anyhow::Context;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{info, warn};

pub const ACTOR_FIELDS: [&str; 3] = ["data_set_owner", "data_generator", "data_documentor"];
pub const SOURCE_FIELDS: [&str; 2] = ["sources", "publication"];

/// Key marking an actor defined inline rather than fetched
pub const NEW_ACTOR_KEY: &str = "_NEW";

fn single_entry(map: &Map<String, Value>) -> Option<(&String, &Value)> {
    map.iter().next()
}

// ============================================================================
// ACTORS
// ============================================================================

/// Resolve actor fields of every metadata map (one fetch per repository)
pub fn extract_actors_from_process_meta(
    meta: &mut ProcessMetadata,
    repository: &dyn Repository,
) -> PipelineResult<BTreeMap<String, Actor>> {
    info!("Identifying actors from metadata");
    let mut wanted: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut new_actors: Vec<Value> = Vec::new();
    let mut errors = Vec::new();

    for fields in meta.maps_mut() {
        for field in ACTOR_FIELDS {
            let Some(value) = fields.get(field) else {
                continue;
            };
            match classify_actor(field, value) {
                Ok(None) => {}
                Ok(Some(ActorSpec::Existing { repo, name })) => {
                    wanted.entry(repo).or_default().insert(name.clone());
                    fields.insert(field.to_string(), Value::String(name));
                }
                Ok(Some(ActorSpec::New(definition))) => {
                    let name = definition
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    if !new_actors.contains(&definition) {
                        new_actors.push(definition);
                    }
                    fields.insert(field.to_string(), Value::String(name));
                }
                Err(e) => errors.push(e),
            }
        }
    }
    if !errors.is_empty() {
        return Err(PipelineError::Validation(errors));
    }

    let requests: BTreeMap<String, FetchRequest> = wanted
        .iter()
        .map(|(repo, names)| {
            let request = FetchRequest::new().with_names(ObjectType::Actors, names.iter().cloned());
            (repo.clone(), request)
        })
        .collect();

    let mut actors = BTreeMap::new();
    for records in read_repository_data(repository, &requests)?.into_values() {
        for record in records.iter().filter(|r| r.object_type == ObjectType::Actors) {
            let actor: Actor = record.to_entity()?;
            actors.insert(actor.name.clone(), actor);
        }
    }

    let requested: usize = wanted.values().map(BTreeSet::len).sum();
    if actors.len() < requested {
        warn!("Not all actors found ({} of {})", actors.len(), requested);
    }

    for definition in &new_actors {
        let actor = Actor::from_definition(definition)?;
        actors.insert(actor.name.clone(), actor);
    }
    Ok(actors)
}

enum ActorSpec {
    Existing { repo: String, name: String },
    New(Value),
}

fn classify_actor(field: &str, value: &Value) -> Result<Option<ActorSpec>, String> {
    let shape_error = || {
        format!(
            "{} must be a dictionary. For new actors, assign the key as '{}'",
            field, NEW_ACTOR_KEY
        )
    };
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::Object(map) => match single_entry(map) {
            None => Ok(None),
            Some((key, definition)) if key == NEW_ACTOR_KEY => match definition {
                Value::Object(_) => Ok(Some(ActorSpec::New(definition.clone()))),
                _ => Err(shape_error()),
            },
            Some((repo, Value::String(name))) => Ok(Some(ActorSpec::Existing {
                repo: repo.clone(),
                name: name.clone(),
            })),
            Some(_) => Err(shape_error()),
        },
        _ => Err(shape_error()),
    }
}

// ============================================================================
// SOURCES
// ============================================================================

/// Bibliography collaborator: bib id → source name in, Sources out
pub trait Bibliography {
    fn generate_sources(&self, ids: &BTreeMap<String, String>) -> PipelineResult<Vec<Source>>;
}

/// Bibliography stored as JSON: `{"<bib id>": {"year": ..., "url": ..., ...}}`
#[derive(Debug, Default)]
pub struct BibliographyFile {
    entries: Map<String, Value>,
}

impl BibliographyFile {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read bibliography: {}", path.display()))?;
        let entries: Map<String, Value> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse bibliography: {}", path.display()))?;
        Ok(BibliographyFile { entries })
    }

    pub fn from_entries(entries: Map<String, Value>) -> Self {
        BibliographyFile { entries }
    }
}

fn parse_year(value: Option<&Value>) -> Option<i32> {
    match value? {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl Bibliography for BibliographyFile {
    fn generate_sources(&self, ids: &BTreeMap<String, String>) -> PipelineResult<Vec<Source>> {
        let mut sources = Vec::new();
        for (bib_id, name) in ids {
            let Some(entry) = self.entries.get(bib_id).and_then(Value::as_object) else {
                warn!("Source: {} not found in bibliography", bib_id);
                continue;
            };
            let mut source = Source::new(name);
            source.year = parse_year(entry.get("year"));
            source.url = entry.get("url").and_then(Value::as_str).map(str::to_string);
            source.text_reference = entry
                .get("text_reference")
                .or_else(|| entry.get("title"))
                .and_then(Value::as_str)
                .map(str::to_string);
            sources.push(source);
        }
        Ok(sources)
    }
}

/// Resolve source fields of every metadata map against a bibliography
pub fn extract_sources_from_process_meta(
    meta: &mut ProcessMetadata,
    bibliography: &dyn Bibliography,
) -> PipelineResult<BTreeMap<String, Source>> {
    info!("Identifying sources from metadata");
    let mut ids: BTreeMap<String, String> = BTreeMap::new();

    for fields in meta.maps_mut() {
        for field in SOURCE_FIELDS {
            let rewritten = match fields.get(field) {
                Some(Value::Object(map)) => {
                    let names = collect_sources(map, &mut ids);
                    if field == "publication" {
                        names.into_iter().next().map(Value::String)
                    } else {
                        Some(Value::Array(names.into_iter().map(Value::String).collect()))
                    }
                }
                Some(Value::Array(items)) => {
                    let mut names = Vec::new();
                    for item in items {
                        if let Value::Object(map) = item {
                            names.extend(collect_sources(map, &mut ids));
                        }
                    }
                    Some(Value::Array(names.into_iter().map(Value::String).collect()))
                }
                _ => None,
            };
            if let Some(value) = rewritten {
                fields.insert(field.to_string(), value);
            }
        }
    }

    let sources = bibliography.generate_sources(&ids)?;
    Ok(sources.into_iter().map(|s| (s.name.clone(), s)).collect())
}

fn collect_sources(map: &Map<String, Value>, ids: &mut BTreeMap<String, String>) -> Vec<String> {
    map.iter()
        .filter_map(|(bib_id, name)| {
            let name = name.as_str()?.to_string();
            ids.insert(bib_id.clone(), name.clone());
            Some(name)
        })
        .collect()
}

// ============================================================================
// DQ SYSTEMS
// ============================================================================

/// `{"Process": {"<repo>": "<dq name>"}, "Flow": {"<repo>": "<dq name>"}}`
pub type DqSystemSpec = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone, Default)]
pub struct DqSystems {
    pub process: Option<DqSystem>,
    pub flow: Option<DqSystem>,
}

impl DqSystems {
    pub fn all(&self) -> impl Iterator<Item = &DqSystem> {
        self.process.iter().chain(self.flow.iter())
    }
}

pub fn extract_dq_systems(spec: &DqSystemSpec, repository: &dyn Repository) -> PipelineResult<DqSystems> {
    info!("Extracting DQ systems");
    let mut requests: BTreeMap<String, FetchRequest> = BTreeMap::new();
    for repo_names in spec.values() {
        for (repo, name) in repo_names {
            requests
                .entry(repo.clone())
                .or_default()
                .add_names(ObjectType::DqSystem, [name.clone()]);
        }
    }

    let wanted = |level: &str, repo: &str| spec.get(level).and_then(|m| m.get(repo)).cloned();
    let mut systems = DqSystems::default();
    for (repo, records) in read_repository_data(repository, &requests)? {
        for record in records.iter().filter(|r| r.object_type == ObjectType::DqSystem) {
            let dq: DqSystem = record.to_entity()?;
            if wanted("Process", &repo).as_deref() == Some(dq.name.as_str()) {
                systems.process = Some(dq.clone());
            }
            if wanted("Flow", &repo).as_deref() == Some(dq.name.as_str()) {
                systems.flow = Some(dq);
            }
        }
    }

    if spec.contains_key("Process") && systems.process.is_none() {
        warn!("Process DQ system not found");
    }
    if spec.contains_key("Flow") && systems.flow.is_none() {
        warn!("Flow DQ system not found");
    }
    Ok(systems)
}

// ============================================================================
// VALIDITY YEARS
// ============================================================================

/// valid_from = Jan 1 of `year1`, valid_until = Dec 31 of `year2` (or `year1`)
pub fn assign_year_to_meta(meta: &mut MetadataMap, year1: i32, year2: Option<i32>) -> PipelineResult<()> {
    let stamp = |y: i32, m: u32, d: u32| {
        chrono::NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
            .ok_or_else(|| PipelineError::invalid(format!("Invalid year {}", y)))
    };
    let from = stamp(year1, 1, 1)?;
    let until = stamp(year2.unwrap_or(year1), 12, 31)?;
    meta.insert("valid_from".to_string(), Value::String(from));
    meta.insert("valid_until".to_string(), Value::String(until));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use serde_json::json;

    fn create_test_meta(shared: Value) -> ProcessMetadata {
        serde_json::from_value(shared).unwrap()
    }

    #[test]
    fn test_actors_rewritten_and_fetched_once() {
        let repo = MemoryRepository::new()
            .with_record("USLCI", ObjectType::Actors, json!({"@type": "Actor", "@id": "a-netl", "name": "NETL"}))
            .with_record("USLCI", ObjectType::Actors, json!({"@type": "Actor", "@id": "a-nrel", "name": "NREL"}));
        let mut meta = create_test_meta(json!({
            "data_set_owner": {"USLCI": "NETL"},
            "data_generator": {"USLCI": "NREL"},
            "data_documentor": {"_NEW": {"name": "Jane Analyst", "email": "jane@example.org"}}
        }));

        let actors = extract_actors_from_process_meta(&mut meta, &repo).unwrap();

        assert_eq!(repo.fetch_count(), 1);
        assert_eq!(actors.len(), 3);
        assert_eq!(actors["NETL"].id, "a-netl");
        assert_eq!(actors["Jane Analyst"].id, crate::identity::uuid_of("Jane Analyst"));
        assert_eq!(meta.shared["data_set_owner"], "NETL");
        assert_eq!(meta.shared["data_documentor"], "Jane Analyst");
    }

    #[test]
    fn test_missing_actor_is_warning_only() {
        let repo = MemoryRepository::new().with_record("USLCI", ObjectType::Flows, json!({"name": "x"}));
        let mut meta = create_test_meta(json!({"data_set_owner": {"USLCI": "Nobody"}}));
        let actors = extract_actors_from_process_meta(&mut meta, &repo).unwrap();
        assert!(actors.is_empty());
        assert_eq!(meta.shared["data_set_owner"], "Nobody");
    }

    #[test]
    fn test_actor_field_must_be_dictionary() {
        let repo = MemoryRepository::new();
        let mut meta = create_test_meta(json!({"data_generator": "NREL"}));
        let err = extract_actors_from_process_meta(&mut meta, &repo).unwrap_err();
        assert!(err.to_string().contains("data_generator must be a dictionary"));
    }

    #[test]
    fn test_sources_from_bibliography() {
        let bib = BibliographyFile::from_entries(
            json!({
                "smith2020": {"year": "2020", "url": "https://doi.org/x", "title": "Coal LCI"},
                "epa2019": {"year": "", "title": "EPA report"}
            })
            .as_object()
            .unwrap()
            .clone(),
        );
        let mut meta = create_test_meta(json!({
            "sources": [{"smith2020": "Smith 2020"}, {"epa2019": "EPA 2019"}],
            "publication": {"smith2020": "Smith 2020"}
        }));

        let sources = extract_sources_from_process_meta(&mut meta, &bib).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources["Smith 2020"].year, Some(2020));
        assert_eq!(sources["EPA 2019"].year, None);
        assert_eq!(meta.shared["sources"], json!(["Smith 2020", "EPA 2019"]));
        assert_eq!(meta.shared["publication"], "Smith 2020");
    }

    #[test]
    fn test_dq_systems() {
        let repo = MemoryRepository::new()
            .with_record("Core", ObjectType::DqSystem, json!({"@id": "dq-p", "name": "Process Pedigree"}))
            .with_record("Core", ObjectType::DqSystem, json!({"@id": "dq-f", "name": "Flow Pedigree"}));
        let spec: DqSystemSpec = serde_json::from_value(json!({
            "Process": {"Core": "Process Pedigree"},
            "Flow": {"Core": "Flow Pedigree"}
        }))
        .unwrap();

        let systems = extract_dq_systems(&spec, &repo).unwrap();
        assert_eq!(systems.process.as_ref().unwrap().id, "dq-p");
        assert_eq!(systems.flow.as_ref().unwrap().id, "dq-f");
        assert_eq!(systems.all().count(), 2);
        assert_eq!(repo.fetch_count(), 1);
    }

    #[test]
    fn test_assign_year() {
        let mut meta = MetadataMap::new();
        assign_year_to_meta(&mut meta, 2019, None).unwrap();
        assert_eq!(meta["valid_from"], "2019-01-01T00:00:00");
        assert_eq!(meta["valid_until"], "2019-12-31T00:00:00");
        assign_year_to_meta(&mut meta, 2019, Some(2021)).unwrap();
        assert_eq!(meta["valid_until"], "2021-12-31T00:00:00");
    }
}
