// 📦 Archive Writer - entities → olca-schema 2 JSON-LD zip
//
// Layout: `{folder}/{@id}.json` per entity plus `olca-schema.json`.
// The file name carries the run time so successive runs never collide:
//   {name}_olca2.0_{YYYYmmdd-HHMMSS}.zip

use crate::entities::RootEntity;
use crate::errors::PipelineResult;
use crate::identity::last_change_now;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use zip::write::SimpleFileOptions;

pub const DEFAULT_VERSION: &str = "00.00.001";
pub const SCHEMA_FILE: &str = "olca-schema.json";

// ============================================================================
// CONTENTS
// ============================================================================

/// Serialized entities keyed by (folder, id); re-adding an id replaces it
#[derive(Debug, Default)]
pub struct ArchiveContents {
    entries: BTreeMap<(String, String), Value>,
}

impl ArchiveContents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one entity, stamping `lastChange` and `version` when missing
    pub fn add<T: RootEntity>(&mut self, entity: &T) -> PipelineResult<()> {
        let mut value = serde_json::to_value(entity)?;
        if let Some(obj) = value.as_object_mut() {
            if !obj.get("lastChange").is_some_and(|v| !v.is_null()) {
                obj.insert("lastChange".to_string(), Value::String(last_change_now()));
            }
            if !obj.get("version").is_some_and(|v| !v.is_null()) {
                obj.insert("version".to_string(), Value::String(DEFAULT_VERSION.to_string()));
            }
        }
        self.entries
            .insert((T::FOLDER.to_string(), entity.id().to_string()), value);
        Ok(())
    }

    pub fn add_all<'a, T, I>(&mut self, entities: I) -> PipelineResult<()>
    where
        T: RootEntity + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        for entity in entities {
            self.add(entity)?;
        }
        Ok(())
    }

    pub fn count_in(&self, folder: &str) -> usize {
        self.entries.keys().filter(|(f, _)| f == folder).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// WRITER
// ============================================================================

pub fn archive_file_name(name: &str) -> String {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    format!("{}_olca2.0_{}.zip", name, stamp)
}

/// Write the archive into `dir` (created if needed); returns the file path
pub fn write_archive(dir: &Path, name: &str, contents: &ArchiveContents) -> PipelineResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(archive_file_name(name));
    // an existing file would be extended, not replaced
    if path.exists() {
        std::fs::remove_file(&path)?;
    }
    info!("Writing JSON-LD to {}", path.display());

    let mut zip = zip::ZipWriter::new(File::create(&path)?);
    let options = SimpleFileOptions::default();

    zip.start_file(SCHEMA_FILE, options)?;
    zip.write_all(serde_json::to_string(&json!({"version": 2}))?.as_bytes())?;

    for ((folder, id), value) in &contents.entries {
        zip.start_file(format!("{}/{}.json", folder, id), options)?;
        zip.write_all(serde_json::to_string_pretty(value)?.as_bytes())?;
    }
    zip.finish()?;

    info!("Wrote {} entities", contents.len());
    Ok(path)
}
