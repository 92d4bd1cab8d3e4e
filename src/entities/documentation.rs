// 📄 Process Documentation - metadata attached 1:1 to a Process

use super::Ref;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<Ref>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDocumentation {
    // ========================================================================
    // TIME / SCOPE
    // ========================================================================
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geography_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technology_description: Option<String>,

    // ========================================================================
    // MODELING
    // ========================================================================
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory_method_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modeling_constants_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completeness_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_selection_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_treatment_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_collection_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_advice: Option<String>,

    // ========================================================================
    // ADMINISTRATIVE
    // ========================================================================
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intended_application: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrictions_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_copyright_protected: Option<bool>,

    // ========================================================================
    // REFERENCES (actors / sources)
    // ========================================================================
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Ref>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication: Option<Ref>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_set_owner: Option<Ref>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_generator: Option<Ref>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_documentor: Option<Ref>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reviews: Vec<Review>,
}

impl ProcessDocumentation {
    /// Free-text slot for a metadata key, `None` if the key is not a text field
    pub fn text_slot(&mut self, key: &str) -> Option<&mut Option<String>> {
        let slot = match key {
            "valid_from" => &mut self.valid_from,
            "valid_until" => &mut self.valid_until,
            "time_description" => &mut self.time_description,
            "geography_description" => &mut self.geography_description,
            "technology_description" => &mut self.technology_description,
            "inventory_method_description" => &mut self.inventory_method_description,
            "modeling_constants_description" => &mut self.modeling_constants_description,
            "completeness_description" => &mut self.completeness_description,
            "data_selection_description" => &mut self.data_selection_description,
            "data_treatment_description" => &mut self.data_treatment_description,
            "sampling_description" => &mut self.sampling_description,
            "data_collection_description" => &mut self.data_collection_description,
            "use_advice" => &mut self.use_advice,
            "project_description" => &mut self.project_description,
            "intended_application" => &mut self.intended_application,
            "restrictions_description" => &mut self.restrictions_description,
            "creation_date" => &mut self.creation_date,
            _ => return None,
        };
        Some(slot)
    }

    /// Actor slot for a metadata key
    pub fn actor_slot(&mut self, key: &str) -> Option<&mut Option<Ref>> {
        match key {
            "data_set_owner" => Some(&mut self.data_set_owner),
            "data_generator" => Some(&mut self.data_generator),
            "data_documentor" => Some(&mut self.data_documentor),
            _ => None,
        }
    }
}
