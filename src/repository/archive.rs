// 📦 Archive Repository - reads JSON-LD zip exports from disk
//
// Layout: {root}/{owner}/{repo}/{DOWNLOAD_PATH}.zip, the same exports the
// repository's download endpoint produces.

use super::{Access, FetchRequest, ObjectType, Record, RepoCatalog, RepoInfo, Repository};
use crate::errors::{PipelineError, PipelineResult};
use serde_json::Value;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::PathBuf;
use tracing::debug;

pub struct ArchiveRepository {
    root: PathBuf,
    catalog: RepoCatalog,
    access: Access,
}

impl ArchiveRepository {
    pub fn new(root: impl Into<PathBuf>, catalog: RepoCatalog) -> Self {
        ArchiveRepository {
            root: root.into(),
            catalog,
            access: Access::Public,
        }
    }

    /// Builder: authenticate with a session token
    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn archive_path(&self, info: &RepoInfo, path: ObjectType) -> PathBuf {
        self.root
            .join(&info.owner)
            .join(&info.repo)
            .join(format!("{}.zip", path.as_str()))
    }
}

impl Repository for ArchiveRepository {
    fn fetch(&self, repo: &str, request: &FetchRequest) -> PipelineResult<Vec<Record>> {
        let path_type = request.download_path();
        let info = self.catalog.resolve(repo, &self.access, path_type)?;
        let zip_path = self.archive_path(info, path_type);
        let endpoint = info.download_endpoint(path_type);
        let repo_error = |message: String| PipelineError::Repository {
            repo: repo.to_string(),
            endpoint: endpoint.clone(),
            message,
        };

        debug!("Reading {} for {}", zip_path.display(), repo);
        let file = File::open(&zip_path)
            .map_err(|e| repo_error(format!("cannot open {}: {}", zip_path.display(), e)))?;
        read_export(file, request).map_err(|e| repo_error(e.to_string()))
    }
}

/// Records of a JSON-LD export that satisfy the request; empty entries are skipped
pub fn read_export<R: Read + Seek>(reader: R, request: &FetchRequest) -> PipelineResult<Vec<Record>> {
    let mut archive = zip::ZipArchive::new(reader)?;
    let mut records = Vec::new();

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if !file.is_file() {
            continue;
        }
        let name = file.name().to_string();
        let types: Vec<ObjectType> = request
            .object_types()
            .filter(|t| t.matches_entry(&name))
            .collect();
        if types.is_empty() {
            continue;
        }

        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;
        if contents.is_empty() {
            continue;
        }
        let data: Value = serde_json::from_slice(&contents)?;
        let record_name = data.get("name").and_then(Value::as_str);

        for object_type in types {
            if request.accepts(object_type, record_name) {
                records.push(Record::new(object_type, data.clone()));
            }
        }
    }

    Ok(records)
}
