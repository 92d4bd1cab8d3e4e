// 🧪 Memory Repository - in-process records, counts round trips

use super::{FetchRequest, ObjectType, Record, Repository};
use crate::errors::{PipelineError, PipelineResult};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct MemoryRepository {
    records: BTreeMap<String, Vec<Record>>,
    requests: RefCell<Vec<(String, FetchRequest)>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_record(&mut self, repo: impl Into<String>, object_type: ObjectType, data: Value) {
        self.records
            .entry(repo.into())
            .or_default()
            .push(Record::new(object_type, data));
    }

    /// Builder form of `add_record`
    pub fn with_record(mut self, repo: impl Into<String>, object_type: ObjectType, data: Value) -> Self {
        self.add_record(repo, object_type, data);
        self
    }

    /// Number of `fetch` calls served so far
    pub fn fetch_count(&self) -> usize {
        self.requests.borrow().len()
    }

    /// Every request served, in order
    pub fn requests(&self) -> Vec<(String, FetchRequest)> {
        self.requests.borrow().clone()
    }
}

impl Repository for MemoryRepository {
    fn fetch(&self, repo: &str, request: &FetchRequest) -> PipelineResult<Vec<Record>> {
        self.requests
            .borrow_mut()
            .push((repo.to_string(), request.clone()));

        let records = self.records.get(repo).ok_or_else(|| PipelineError::Repository {
            repo: repo.to_string(),
            endpoint: "memory".to_string(),
            message: format!("{} not found in config!", repo),
        })?;

        Ok(records
            .iter()
            .filter(|r| request.accepts(r.object_type, r.name()))
            .cloned()
            .collect())
    }
}
