// 📝 Metadata Assembler - metadata maps → Process attributes + documentation
//
// Metadata arrives as a shared map (every process) plus optional per-process
// overrides. Reference fields are resolved first (see `references`), so by the
// time a map is assembled every actor / source field holds a plain name.

pub mod dqi;
pub mod fields;
pub mod references;
pub mod tabular;

pub use dqi::{format_dqi_score, increment_dqi_value};
pub use fields::{FieldDefinition, FieldKind, FieldTarget, MetadataFieldRegistry};
pub use references::{
    assign_year_to_meta, extract_actors_from_process_meta, extract_dq_systems,
    extract_sources_from_process_meta, Bibliography, BibliographyFile, DqSystemSpec, DqSystems,
};
pub use tabular::{read_tabular_metadata, read_tabular_metadata_from};

use crate::entities::{Actor, Process, ProcessDocumentation, Ref, Review, RootEntity, Source};
use crate::errors::{PipelineError, PipelineResult};
use crate::identity::creation_date_now;
use crate::schema::parse_flag;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

pub type MetadataMap = serde_json::Map<String, Value>;

// ============================================================================
// PROCESS METADATA
// ============================================================================

/// Shared metadata plus per-process overrides (`"processes": {name: {...}}`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessMetadata {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub processes: BTreeMap<String, MetadataMap>,

    #[serde(flatten)]
    pub shared: MetadataMap,
}

impl ProcessMetadata {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read metadata: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse metadata: {}", path.display()))
    }

    /// Merge per-process fields (e.g. from a tabular sheet) over existing overrides
    pub fn merge_overrides(&mut self, overrides: BTreeMap<String, MetadataMap>) {
        for (process, fields) in overrides {
            self.processes.entry(process).or_default().extend(fields);
        }
    }

    /// Effective fields for one process: shared values, then its overrides
    pub fn for_process(&self, process_name: &str) -> MetadataMap {
        let mut fields = self.shared.clone();
        if let Some(overrides) = self.processes.get(process_name) {
            for (key, value) in overrides {
                if !is_blank(value) {
                    fields.insert(key.clone(), value.clone());
                }
            }
        }
        fields
    }

    /// Shared map first, then every override map
    pub fn maps_mut(&mut self) -> impl Iterator<Item = &mut MetadataMap> {
        std::iter::once(&mut self.shared).chain(self.processes.values_mut())
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn is_timestamp(text: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(text).is_ok()
        || chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S").is_ok()
        || chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
}

// ============================================================================
// ASSEMBLER
// ============================================================================

/// Applies metadata maps to processes using the actors / sources of this run
pub struct MetadataAssembler {
    registry: MetadataFieldRegistry,
    actors: BTreeMap<String, Actor>,
    sources: BTreeMap<String, Source>,
}

impl MetadataAssembler {
    pub fn new() -> Self {
        MetadataAssembler {
            registry: MetadataFieldRegistry::new(),
            actors: BTreeMap::new(),
            sources: BTreeMap::new(),
        }
    }

    /// Builder: actors by name
    pub fn with_actors(mut self, actors: BTreeMap<String, Actor>) -> Self {
        self.actors = actors;
        self
    }

    /// Builder: sources by name
    pub fn with_sources(mut self, sources: BTreeMap<String, Source>) -> Self {
        self.sources = sources;
        self
    }

    pub fn actors(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }

    pub fn sources(&self) -> impl Iterator<Item = &Source> {
        self.sources.values()
    }

    /// Set process attributes and documentation from a metadata map.
    ///
    /// Unknown keys and missing references are warnings; values of the wrong
    /// shape are collected and returned as one Validation error.
    pub fn assemble(&self, process: &mut Process, metadata: &MetadataMap) -> PipelineResult<()> {
        let mut doc = process.process_documentation.take().unwrap_or_default();
        let mut errors = Vec::new();

        for (key, value) in metadata {
            let Some(field) = self.registry.get(key) else {
                warn!("{} not a process doc key", key);
                continue;
            };
            if is_blank(value) {
                continue;
            }
            let applied = match field.target {
                FieldTarget::Process => self.apply_process_field(process, field, value),
                FieldTarget::Documentation => self.apply_doc_field(&mut doc, field, value),
            };
            if let Err(message) = applied {
                errors.push(format!("{}: {}", process.name, message));
            }
        }

        if doc.creation_date.is_none() {
            doc.creation_date = Some(creation_date_now());
        }
        process.process_documentation = Some(doc);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Validation(errors))
        }
    }

    fn apply_process_field(
        &self,
        process: &mut Process,
        field: &FieldDefinition,
        value: &Value,
    ) -> Result<(), String> {
        match (field.key.as_str(), field.kind) {
            (_, FieldKind::Tags) => {
                process.tags = match value {
                    Value::Array(items) => items.iter().filter_map(as_text).collect(),
                    other => vec![as_text(other).ok_or_else(|| format!("{} must be text", field.key))?],
                };
            }
            ("description", _) => process.description = as_text(value),
            ("version", _) => process.version = as_text(value),
            _ => return Err(format!("{} cannot be set on a process", field.key)),
        }
        Ok(())
    }

    fn apply_doc_field(
        &self,
        doc: &mut ProcessDocumentation,
        field: &FieldDefinition,
        value: &Value,
    ) -> Result<(), String> {
        let key = field.key.as_str();
        match field.kind {
            FieldKind::Text | FieldKind::Timestamp => {
                let text = as_text(value).ok_or_else(|| format!("{} must be text", key))?;
                if field.kind == FieldKind::Timestamp && !is_timestamp(&text) {
                    return Err(format!("{} `{}` is not a valid timestamp", key, text));
                }
                let slot = doc
                    .text_slot(key)
                    .ok_or_else(|| format!("{} is not a documentation text field", key))?;
                *slot = Some(text);
            }
            FieldKind::SourceList => {
                let names: Vec<String> = match value {
                    Value::Array(items) => items.iter().filter_map(as_text).collect(),
                    other => as_text(other).into_iter().collect(),
                };
                doc.sources = names.iter().filter_map(|n| self.source_ref(n)).collect();
            }
            FieldKind::SourceRef => {
                let name = as_text(value).ok_or_else(|| format!("{} must be a source name", key))?;
                doc.publication = self.source_ref(&name);
            }
            FieldKind::ActorRef => {
                let name = as_text(value).ok_or_else(|| format!("{} must be an actor name", key))?;
                let actor = self.actor_ref(&name);
                if let Some(slot) = doc.actor_slot(key) {
                    *slot = actor;
                }
            }
            FieldKind::Flag => {
                let flag = match value {
                    Value::Bool(b) => Some(*b),
                    other => as_text(other).as_deref().and_then(parse_flag),
                };
                doc.is_copyright_protected =
                    Some(flag.ok_or_else(|| format!("{} must be true or false", key))?);
            }
            FieldKind::Reviews => doc.reviews = self.reviews(value)?,
            FieldKind::Tags => return Err(format!("{} cannot be set on documentation", key)),
        }
        Ok(())
    }

    fn actor_ref(&self, name: &str) -> Option<Ref> {
        let found = self.actors.get(name).map(|a| a.to_ref());
        if found.is_none() {
            warn!("Actor: `{}` not found!", name);
        }
        found
    }

    fn source_ref(&self, name: &str) -> Option<Ref> {
        let found = self.sources.get(name).map(|s| s.to_ref());
        if found.is_none() {
            warn!("Source: `{}` not found!", name);
        }
        found
    }

    /// `{label: {reviewType, details, report}}`; report is a name or `{bib id: name}`
    fn reviews(&self, value: &Value) -> Result<Vec<Review>, String> {
        let entries: Vec<&Value> = match value {
            Value::Object(map) => map.values().collect(),
            Value::Array(items) => items.iter().collect(),
            _ => return Err("reviews must be a dictionary of reviews".to_string()),
        };

        let mut reviews = Vec::new();
        for entry in entries {
            let Value::Object(review) = entry else {
                return Err("each review must be a dictionary".to_string());
            };
            let report_name = match review.get("report") {
                Some(Value::Object(bib)) => bib.values().next().and_then(as_text),
                Some(other) => as_text(other),
                None => None,
            };
            reviews.push(Review {
                review_type: review.get("reviewType").and_then(as_text),
                details: review.get("details").and_then(as_text),
                report: report_name.and_then(|n| self.source_ref(&n)),
            });
        }
        Ok(reviews)
    }
}

impl Default for MetadataAssembler {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_assembler() -> MetadataAssembler {
        let actor = Actor::from_definition(&json!({"name": "NETL"})).unwrap();
        let source = Source::new("Smith 2020");
        MetadataAssembler::new()
            .with_actors(BTreeMap::from([(actor.name.clone(), actor)]))
            .with_sources(BTreeMap::from([(source.name.clone(), source)]))
    }

    fn create_test_map(value: Value) -> MetadataMap {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_process_and_doc_fields() {
        let assembler = create_test_assembler();
        let mut process = Process::new("Coal extraction", None);
        let meta = create_test_map(json!({
            "description": "Underground mining",
            "version": "01.00.000",
            "tags": ["coal", "mining"],
            "valid_from": "2019-01-01T00:00:00",
            "use_advice": "Regional data",
            "data_generator": "NETL",
            "sources": ["Smith 2020", "Unknown 1999"],
            "publication": "Smith 2020",
            "is_copyright_protected": "false"
        }));

        assembler.assemble(&mut process, &meta).unwrap();
        let doc = process.process_documentation.as_ref().unwrap();

        assert_eq!(process.description.as_deref(), Some("Underground mining"));
        assert_eq!(process.tags, vec!["coal", "mining"]);
        assert_eq!(doc.valid_from.as_deref(), Some("2019-01-01T00:00:00"));
        assert_eq!(doc.use_advice.as_deref(), Some("Regional data"));
        assert_eq!(doc.data_generator.as_ref().unwrap().name_or_empty(), "NETL");
        assert_eq!(doc.sources.len(), 1);
        assert_eq!(doc.publication.as_ref().unwrap().name_or_empty(), "Smith 2020");
        assert_eq!(doc.is_copyright_protected, Some(false));
        assert!(doc.creation_date.is_some());
    }

    #[test]
    fn test_unknown_key_and_missing_actor_are_warnings() {
        let assembler = create_test_assembler();
        let mut process = Process::new("Coal extraction", None);
        let meta = create_test_map(json!({
            "favourite_colour": "green",
            "data_set_owner": "Nobody",
            "time_description": ""
        }));

        assembler.assemble(&mut process, &meta).unwrap();
        let doc = process.process_documentation.unwrap();
        assert!(doc.data_set_owner.is_none());
        assert!(doc.time_description.is_none());
    }

    #[test]
    fn test_bad_values_aggregated() {
        let assembler = create_test_assembler();
        let mut process = Process::new("Coal extraction", None);
        let meta = create_test_map(json!({
            "valid_until": "next year",
            "is_copyright_protected": "maybe"
        }));

        match assembler.assemble(&mut process, &meta).unwrap_err() {
            PipelineError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_all_reviews_kept() {
        let assembler = create_test_assembler();
        let mut process = Process::new("Coal extraction", None);
        let meta = create_test_map(json!({
            "reviews": {
                "internal": {"reviewType": "Internal", "details": "Checked mass balance"},
                "external": {"reviewType": "External", "report": {"smith2020": "Smith 2020"}}
            }
        }));

        assembler.assemble(&mut process, &meta).unwrap();
        let reviews = &process.process_documentation.unwrap().reviews;
        assert_eq!(reviews.len(), 2);
        assert!(reviews.iter().any(|r| r.report.is_some()));
    }

    #[test]
    fn test_creation_date_kept_when_given() {
        let assembler = MetadataAssembler::new();
        let mut process = Process::new("Coal extraction", None);
        let meta = create_test_map(json!({"creation_date": "2021-06-01T12:00:00"}));
        assembler.assemble(&mut process, &meta).unwrap();
        assert_eq!(
            process.process_documentation.unwrap().creation_date.as_deref(),
            Some("2021-06-01T12:00:00")
        );
    }

    #[test]
    fn test_overrides_merge_over_shared() {
        let meta: ProcessMetadata = serde_json::from_value(json!({
            "use_advice": "General advice",
            "geography_description": "US",
            "processes": {
                "Coal extraction": {"use_advice": "Mine-specific advice", "geography_description": ""}
            }
        }))
        .unwrap();

        let coal = meta.for_process("Coal extraction");
        assert_eq!(coal["use_advice"], "Mine-specific advice");
        assert_eq!(coal["geography_description"], "US");
        assert_eq!(meta.for_process("Coal processing")["use_advice"], "General advice");
        assert!(!meta.shared.contains_key("processes"));
    }
}
