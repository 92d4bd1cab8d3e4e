// 🌎 Locations - location codes in exchange rows → Location entities
//
// The lookup file is keyed by location code:
//   {"US": {"@id": "...", "name": "United States", "latitude": 39.8,
//           "longitude": -98.5, "geometry": {...GeoJSON...}}}

use crate::entities::Location;
use crate::identity::uuid_of;
use crate::schema::ExchangeRow;
use anyhow::Context;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// Location collaborator: code → Location
pub trait LocationLookup {
    fn location(&self, code: &str) -> Option<Location>;
}

/// Location records loaded from a JSON file
#[derive(Debug, Default)]
pub struct LocationFile {
    records: Map<String, Value>,
}

impl LocationFile {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read locations: {}", path.display()))?;
        let records: Map<String, Value> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse locations: {}", path.display()))?;
        Ok(LocationFile { records })
    }

    pub fn from_records(records: Map<String, Value>) -> Self {
        LocationFile { records }
    }
}

impl LocationLookup for LocationFile {
    fn location(&self, code: &str) -> Option<Location> {
        let record = self.records.get(code)?;
        let mut location: Location = serde_json::from_value(record.clone()).ok()?;
        location.code = code.to_string();
        if location.id.is_empty() {
            location.id = uuid_of(code);
        }
        if location.name.is_empty() {
            location.name = code.to_string();
        }
        Some(location)
    }
}

/// One Location per distinct non-empty location code, keyed by code
pub fn build_location_dict(rows: &[ExchangeRow], lookup: &dyn LocationLookup) -> BTreeMap<String, Location> {
    info!("Creating dictionary of locations");
    let mut locations = BTreeMap::new();
    for code in rows.iter().filter_map(|r| r.location.as_deref()).map(str::trim) {
        if code.is_empty() || locations.contains_key(code) {
            continue;
        }
        match lookup.location(code) {
            Some(location) => {
                locations.insert(code.to_string(), location);
            }
            None => warn!("Location: {} not found.", code),
        }
    }
    locations
}
