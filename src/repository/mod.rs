// 🗄️ Repository Layer - named-object queries against LCA repositories
//
// A repository is addressed by its label (e.g. "USLCI"). Every query for one
// repository is packed into a single FetchRequest so a run costs one round
// trip per repository, never one per row.

pub mod archive;
pub mod memory;

pub use archive::ArchiveRepository;
pub use memory::MemoryRepository;

use crate::entities::{Flow, FlowOrigin, ModelType, Process, Ref};
use crate::errors::{PipelineError, PipelineResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

// ============================================================================
// OBJECT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectType {
    Process,
    ImpactMethod,
    Actors,
    Sources,
    DqSystem,
    Flows,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Process => "PROCESS",
            ObjectType::ImpactMethod => "IMPACT_METHOD",
            ObjectType::Actors => "ACTORS",
            ObjectType::Sources => "SOURCES",
            ObjectType::DqSystem => "DQ_SYSTEM",
            ObjectType::Flows => "FLOWS",
        }
    }

    /// Folder prefixes of this type inside a JSON-LD export
    pub fn folder_prefixes(&self) -> &'static [&'static str] {
        match self {
            ObjectType::Process => &["process"],
            ObjectType::ImpactMethod => &["lcia_categories", "lcia_methods"],
            ObjectType::Actors => &["actor"],
            ObjectType::Sources => &["source"],
            ObjectType::DqSystem => &["dq_system"],
            ObjectType::Flows => &["flows"],
        }
    }

    pub fn matches_entry(&self, entry_name: &str) -> bool {
        self.folder_prefixes()
            .iter()
            .any(|prefix| entry_name.starts_with(prefix))
    }

    /// Only these types can be requested as a download path
    fn is_download_path(&self) -> bool {
        matches!(
            self,
            ObjectType::Process | ObjectType::DqSystem | ObjectType::ImpactMethod
        )
    }
}

// ============================================================================
// FETCH REQUEST
// ============================================================================

/// Object types wanted from one repository, each with an optional name filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchRequest {
    objects: BTreeMap<ObjectType, Option<BTreeSet<String>>>,
}

impl FetchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: every object of this type
    pub fn with_all(mut self, object_type: ObjectType) -> Self {
        self.objects.insert(object_type, None);
        self
    }

    /// Builder: objects of this type with one of the given names
    pub fn with_names<I, S>(mut self, object_type: ObjectType, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_names(object_type, names);
        self
    }

    pub fn add_names<I, S>(&mut self, object_type: ObjectType, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slot = self
            .objects
            .entry(object_type)
            .or_insert_with(|| Some(BTreeSet::new()));
        if let Some(set) = slot {
            set.extend(names.into_iter().map(Into::into));
        }
    }

    pub fn object_types(&self) -> impl Iterator<Item = ObjectType> + '_ {
        self.objects.keys().copied()
    }

    pub fn names_for(&self, object_type: ObjectType) -> Option<&BTreeSet<String>> {
        self.objects.get(&object_type).and_then(Option::as_ref)
    }

    /// Does a record of this type and name satisfy the request?
    pub fn accepts(&self, object_type: ObjectType, name: Option<&str>) -> bool {
        match self.objects.get(&object_type) {
            None => false,
            Some(None) => true,
            Some(Some(names)) => name.is_some_and(|n| names.contains(n)),
        }
    }

    /// Export path to download: first of PROCESS / DQ_SYSTEM / IMPACT_METHOD requested,
    /// PROCESS otherwise (the process export carries flows, actors and sources)
    pub fn download_path(&self) -> ObjectType {
        self.object_types()
            .find(ObjectType::is_download_path)
            .unwrap_or(ObjectType::Process)
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

// ============================================================================
// RECORD
// ============================================================================

/// One schema object as returned by a repository
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub object_type: ObjectType,
    pub data: Value,
}

impl Record {
    pub fn new(object_type: ObjectType, data: Value) -> Self {
        Record { object_type, data }
    }

    pub fn name(&self) -> Option<&str> {
        self.data.get("name").and_then(Value::as_str)
    }

    pub fn to_entity<T: DeserializeOwned>(&self) -> PipelineResult<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }

    /// Identity only; the rest of the record is never parsed
    pub fn to_ref(&self, model_type: ModelType) -> PipelineResult<Ref> {
        let mut reference: Ref = self.to_entity()?;
        if reference.ref_type.is_none() {
            reference.ref_type = Some(model_type.as_str().to_string());
        }
        Ok(reference)
    }
}

// ============================================================================
// REPOSITORY TRAIT
// ============================================================================

/// Query collaborator for a catalog of repositories
pub trait Repository {
    /// All records of `repo` satisfying the request (one round trip)
    fn fetch(&self, repo: &str, request: &FetchRequest) -> PipelineResult<Vec<Record>>;
}

// ============================================================================
// ACCESS + CATALOG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Access {
    /// Anonymous; only public repositories are reachable
    #[default]
    Public,
    /// Authenticated session token
    Session(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoInfo {
    pub owner: String,
    pub repo: String,
    #[serde(default)]
    pub public: bool,
}

impl RepoInfo {
    pub fn download_endpoint(&self, path: ObjectType) -> String {
        format!(
            "ws/public/download/json/prepare/{}/{}?path={}",
            self.owner,
            self.repo,
            path.as_str()
        )
    }
}

/// Repository label → location
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoCatalog {
    repos: BTreeMap<String, RepoInfo>,
}

impl RepoCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: impl Into<String>, info: RepoInfo) {
        self.repos.insert(label.into(), info);
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    /// Look up a label and check the access mode can reach it
    pub fn resolve(&self, label: &str, access: &Access, path: ObjectType) -> PipelineResult<&RepoInfo> {
        let info = self.repos.get(label).ok_or_else(|| PipelineError::Repository {
            repo: label.to_string(),
            endpoint: "catalog".to_string(),
            message: format!("{} not found in config!", label),
        })?;

        if *access == Access::Public && !info.public {
            return Err(PipelineError::Repository {
                repo: label.to_string(),
                endpoint: info.download_endpoint(path),
                message: "repository is not public; a session token is required".to_string(),
            });
        }
        Ok(info)
    }
}

// ============================================================================
// BATCH EXTRACTORS
// ============================================================================

/// One fetch per repository; records grouped by repository label
pub fn read_repository_data(
    repository: &dyn Repository,
    requests: &BTreeMap<String, FetchRequest>,
) -> PipelineResult<BTreeMap<String, Vec<Record>>> {
    let mut data = BTreeMap::new();
    for (repo, request) in requests {
        if request.is_empty() {
            continue;
        }
        info!("Accessing repository {}", repo);
        let records = repository.fetch(repo, request)?;
        data.insert(repo.clone(), records);
    }
    Ok(data)
}

fn requests_for(
    wanted: &BTreeMap<String, BTreeSet<String>>,
    object_type: ObjectType,
) -> BTreeMap<String, FetchRequest> {
    wanted
        .iter()
        .map(|(repo, names)| {
            let request = FetchRequest::new().with_names(object_type, names.iter().cloned());
            (repo.clone(), request)
        })
        .collect()
}

/// Flows by name from `{repo: [flow names]}`; optionally tagged with their repo
pub fn extract_flows(
    repository: &dyn Repository,
    wanted: &BTreeMap<String, BTreeSet<String>>,
    add_tags: bool,
) -> PipelineResult<BTreeMap<String, Flow>> {
    info!("Extracting flows");
    let data = read_repository_data(repository, &requests_for(wanted, ObjectType::Flows))?;
    let mut flows = BTreeMap::new();
    for (repo, records) in data {
        for record in records.iter().filter(|r| r.object_type == ObjectType::Flows) {
            let mut flow: Flow = record.to_entity()?;
            flow.origin = FlowOrigin::Technosphere;
            if add_tags {
                flow.tags = vec![repo.clone()];
            }
            flows.insert(flow.name.clone(), flow);
        }
    }
    Ok(flows)
}

/// Full processes by name from `{repo: [process names]}`
pub fn extract_processes(
    repository: &dyn Repository,
    wanted: &BTreeMap<String, BTreeSet<String>>,
) -> PipelineResult<BTreeMap<String, Process>> {
    info!("Extracting processes");
    let data = read_repository_data(repository, &requests_for(wanted, ObjectType::Process))?;
    let mut processes = BTreeMap::new();
    for records in data.into_values() {
        for record in records.iter().filter(|r| r.object_type == ObjectType::Process) {
            let process: Process = record.to_entity()?;
            processes.insert(process.name.clone(), process);
        }
    }
    Ok(processes)
}

/// Process references by name (providers only need identity)
pub fn extract_process_refs(
    repository: &dyn Repository,
    wanted: &BTreeMap<String, BTreeSet<String>>,
) -> PipelineResult<BTreeMap<String, Ref>> {
    info!("Extracting process references");
    let data = read_repository_data(repository, &requests_for(wanted, ObjectType::Process))?;
    let mut refs = BTreeMap::new();
    for records in data.into_values() {
        for record in records.iter().filter(|r| r.object_type == ObjectType::Process) {
            let reference = record.to_ref(ModelType::Process)?;
            refs.insert(reference.name_or_empty().to_string(), reference);
        }
    }
    Ok(refs)
}

/// Existing bridge process `name` in `repo`, with the flow of its first input
///
/// Lets a run reuse a bridge published elsewhere instead of synthesizing one.
pub fn extract_bridge_process(
    repository: &dyn Repository,
    name: &str,
    repo: &str,
) -> PipelineResult<(Process, Flow)> {
    let not_found = |message: String| PipelineError::Repository {
        repo: repo.to_string(),
        endpoint: ObjectType::Process.as_str().to_string(),
        message,
    };

    let wanted = BTreeMap::from([(repo.to_string(), BTreeSet::from([name.to_string()]))]);
    let mut processes = extract_processes(repository, &wanted)?;
    let process = processes
        .remove(name)
        .ok_or_else(|| not_found(format!("Bridge process `{}` not found", name)))?;

    let input = process
        .exchanges
        .iter()
        .find(|e| e.is_input)
        .map(|e| e.flow.clone())
        .ok_or_else(|| not_found(format!("Bridge process `{}` has no input exchange", name)))?;

    // repositories are queried by name; the id picks the exact flow
    let flow_name = input.name_or_empty().to_string();
    let request = FetchRequest::new().with_names(ObjectType::Flows, [flow_name.clone()]);
    let records = repository.fetch(repo, &request)?;
    let mut flow = records
        .iter()
        .filter(|r| r.object_type == ObjectType::Flows)
        .map(|r| r.to_entity::<Flow>())
        .collect::<PipelineResult<Vec<_>>>()?
        .into_iter()
        .find(|f| f.id == input.id)
        .ok_or_else(|| not_found(format!("Input flow {} ({}) not found", input.id, flow_name)))?;
    flow.origin = FlowOrigin::Technosphere;

    Ok((process, flow))
}

// ============================================================================
// TESTS
// ============================================================================
