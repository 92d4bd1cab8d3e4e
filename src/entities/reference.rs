// 👥 Reference Entities - Actor, Source, DQSystem, Location
//
// Fetched from a repository (or a bibliography / location lookup) and cached
// by name for one run. Keys this crate does not model are kept verbatim in
// `extra` so re-serialization does not lose data.

use super::{ModelType, RootEntity};
use crate::identity::{last_change_now, uuid_of};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

macro_rules! named_entity {
    ($ty:ident, $model:expr, $folder:expr, $tag_fn:ident) => {
        fn $tag_fn() -> String {
            $model.as_str().to_string()
        }

        impl RootEntity for $ty {
            const FOLDER: &'static str = $folder;

            fn model_type() -> ModelType {
                $model
            }

            fn id(&self) -> &str {
                &self.id
            }

            fn name(&self) -> &str {
                &self.name
            }
        }
    };
}

// ============================================================================
// ACTOR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    #[serde(rename = "@type", default = "actor_tag")]
    pub model_type: String,

    #[serde(rename = "@id", default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

named_entity!(Actor, ModelType::Actor, "actors", actor_tag);

impl Actor {
    /// Build a brand-new actor from a metadata dictionary (`_NEW` entries)
    pub fn from_definition(definition: &Value) -> Result<Self, serde_json::Error> {
        let mut actor: Actor = serde_json::from_value(definition.clone())?;
        actor.model_type = actor_tag();
        if actor.id.is_empty() {
            actor.id = uuid_of(&actor.name);
        }
        actor
            .extra
            .insert("lastChange".to_string(), Value::String(last_change_now()));
        Ok(actor)
    }
}

// ============================================================================
// SOURCE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    #[serde(rename = "@type", default = "source_tag")]
    pub model_type: String,

    #[serde(rename = "@id", default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

named_entity!(Source, ModelType::Source, "sources", source_tag);

impl Source {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Source {
            model_type: source_tag(),
            id: uuid_of(&name),
            name,
            year: None,
            text_reference: None,
            url: None,
            extra: Map::new(),
        }
    }
}

// ============================================================================
// DQ SYSTEM
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DqSystem {
    #[serde(rename = "@type", default = "dq_tag")]
    pub model_type: String,

    #[serde(rename = "@id", default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

named_entity!(DqSystem, ModelType::DqSystem, "dq_systems", dq_tag);

// ============================================================================
// LOCATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(rename = "@type", default = "location_tag")]
    pub model_type: String,

    #[serde(rename = "@id", default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

named_entity!(Location, ModelType::Location, "locations", location_tag);
