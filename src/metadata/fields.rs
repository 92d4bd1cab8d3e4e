// 🏛️ Metadata Field Registry - every accepted metadata key, explicitly
//
// A key either lands on the Process itself or on its ProcessDocumentation.
// Keys missing from the registry are reported and skipped, never guessed.

use std::collections::HashMap;

// ============================================================================
// FIELD TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTarget {
    Process,
    Documentation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Literal text
    Text,
    /// ISO date or date-time
    Timestamp,
    /// List of source names → Source refs
    SourceList,
    /// Single source name → Source ref
    SourceRef,
    /// Actor name → Actor ref
    ActorRef,
    /// `{label: {reviewType, details, report}}`
    Reviews,
    Flag,
    Tags,
}

// ============================================================================
// FIELD DEFINITION
// ============================================================================

#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub key: String,
    pub target: FieldTarget,
    pub kind: FieldKind,
    pub description: String,
}

impl FieldDefinition {
    pub fn new(key: impl Into<String>, target: FieldTarget, kind: FieldKind) -> Self {
        FieldDefinition {
            key: key.into(),
            target,
            kind,
            description: String::new(),
        }
    }

    /// Builder: add description
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Fields that hold names of other entities
    pub fn is_reference(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::SourceList | FieldKind::SourceRef | FieldKind::ActorRef
        )
    }
}

// ============================================================================
// FIELD REGISTRY
// ============================================================================

/// Catalog of metadata keys, in registration order
pub struct MetadataFieldRegistry {
    fields: HashMap<String, FieldDefinition>,
    order: Vec<String>,
}

impl MetadataFieldRegistry {
    pub fn new() -> Self {
        let mut registry = MetadataFieldRegistry {
            fields: HashMap::new(),
            order: Vec::new(),
        };
        registry.register_core_fields();
        registry
    }

    fn register_core_fields(&mut self) {
        use FieldKind::*;
        use FieldTarget::*;

        // ====================================================================
        // PROCESS ATTRIBUTES
        // ====================================================================

        self.register(
            FieldDefinition::new("description", Process, Text)
                .with_description("General process description"),
        );
        self.register(FieldDefinition::new("version", Process, Text));
        self.register(FieldDefinition::new("tags", Process, Tags));

        // ====================================================================
        // TIME / SCOPE
        // ====================================================================

        self.register(
            FieldDefinition::new("valid_until", Documentation, Timestamp)
                .with_description("End of the period the data is valid for"),
        );
        self.register(
            FieldDefinition::new("valid_from", Documentation, Timestamp)
                .with_description("Start of the period the data is valid for"),
        );
        for key in [
            "time_description",
            "geography_description",
            "technology_description",
            "inventory_method_description",
            "modeling_constants_description",
            "completeness_description",
            "data_selection_description",
            "data_treatment_description",
            "sampling_description",
            "data_collection_description",
            "use_advice",
        ] {
            self.register(FieldDefinition::new(key, Documentation, Text));
        }

        // ====================================================================
        // REFERENCES
        // ====================================================================

        self.register(
            FieldDefinition::new("sources", Documentation, SourceList)
                .with_description("Sources the process data is based on"),
        );
        self.register(FieldDefinition::new("project_description", Documentation, Text));
        self.register(FieldDefinition::new("intended_application", Documentation, Text));
        for key in ["data_set_owner", "data_generator", "data_documentor"] {
            self.register(FieldDefinition::new(key, Documentation, ActorRef));
        }
        self.register(
            FieldDefinition::new("publication", Documentation, SourceRef)
                .with_description("Publication describing the dataset"),
        );
        self.register(FieldDefinition::new("restrictions_description", Documentation, Text));

        // ====================================================================
        // ADMINISTRATIVE
        // ====================================================================

        self.register(
            FieldDefinition::new("creation_date", Documentation, Timestamp)
                .with_description("Defaults to the time of the run"),
        );
        self.register(FieldDefinition::new("is_copyright_protected", Documentation, Flag));
        self.register(FieldDefinition::new("reviews", Documentation, Reviews));
    }

    pub fn register(&mut self, field: FieldDefinition) {
        if !self.fields.contains_key(&field.key) {
            self.order.push(field.key.clone());
        }
        self.fields.insert(field.key.clone(), field);
    }

    pub fn get(&self, key: &str) -> Option<&FieldDefinition> {
        self.fields.get(key)
    }

    /// Keys in registration order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Keys a free-text metadata sheet may fill (no tags / reviews / flags)
    pub fn tabular_keys(&self) -> impl Iterator<Item = &str> {
        self.order
            .iter()
            .filter(|k| {
                self.fields.get(k.as_str()).is_some_and(|f| {
                    !matches!(f.kind, FieldKind::Tags | FieldKind::Reviews | FieldKind::Flag)
                        && f.key != "version"
                        && f.key != "creation_date"
                })
            })
            .map(String::as_str)
    }

    pub fn count(&self) -> usize {
        self.fields.len()
    }
}

impl Default for MetadataFieldRegistry {
    fn default() -> Self {
        Self::new()
    }
}
