// 📋 Tabular Metadata - spreadsheet-style sheets, one column per process
//
// First column: field labels ("Use advice", "valid_from", "Time" ...)
// Other columns: one per process, header = process name

use super::fields::MetadataFieldRegistry;
use super::MetadataMap;
use crate::errors::PipelineResult;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::debug;

fn normalize(label: &str) -> String {
    label.to_lowercase().replace('_', " ").trim().to_string()
}

/// Registry key a sheet label refers to, with or without a trailing " description"
pub fn match_label(label: &str, registry: &MetadataFieldRegistry) -> Option<String> {
    let norm = normalize(label);
    let mut found = None;
    for key in registry.tabular_keys() {
        let norm_key = normalize(key);
        if norm_key == norm || norm_key.replace(" description", "") == norm {
            // later keys win, as in a sequential scan
            found = Some(key.to_string());
        }
    }
    found
}

pub fn read_tabular_metadata(path: &Path) -> PipelineResult<BTreeMap<String, MetadataMap>> {
    let rdr = csv::Reader::from_path(path)?;
    read_tabular_metadata_from(rdr)
}

/// Process name → metadata fields; unknown labels are dropped, blanks become ""
pub fn read_tabular_metadata_from<R: Read>(
    mut rdr: csv::Reader<R>,
) -> PipelineResult<BTreeMap<String, MetadataMap>> {
    let registry = MetadataFieldRegistry::new();
    let headers = rdr.headers()?.clone();
    let processes: Vec<&str> = headers.iter().skip(1).collect();

    let mut metadata: BTreeMap<String, MetadataMap> = processes
        .iter()
        .map(|p| (p.to_string(), MetadataMap::new()))
        .collect();

    for record in rdr.records() {
        let record = record?;
        let Some(label) = record.get(0) else {
            continue;
        };
        let Some(key) = match_label(label, &registry) else {
            debug!("Skipping metadata label {}", label);
            continue;
        };
        for (i, process) in processes.iter().enumerate() {
            let value = record.get(i + 1).unwrap_or("").trim().to_string();
            if let Some(fields) = metadata.get_mut(*process) {
                fields.insert(key.clone(), Value::String(value));
            }
        }
    }

    Ok(metadata)
}
