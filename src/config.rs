// ⚙️ Pipeline Config - one JSON file describes a run
//
// Relative paths are resolved against the directory of the config file, so a
// config can live next to its input tables and be run from anywhere.

use crate::mapping::BridgeNaming;
use crate::metadata::DqSystemSpec;
use crate::repository::{Access, RepoCatalog};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Stub of the output archive name
    pub name: String,

    /// Exchange table (CSV)
    pub exchanges: PathBuf,

    /// Technosphere mapping spec (CSV)
    #[serde(default)]
    pub tech_mapping: Option<PathBuf>,

    /// Existing technosphere flows (CSV: UUID, FlowName)
    #[serde(default)]
    pub tech_flows: Option<PathBuf>,

    /// Elementary flow list (CSV)
    #[serde(default)]
    pub elementary_flows: Option<PathBuf>,

    /// Extra unit definitions (CSV)
    #[serde(default)]
    pub units: Option<PathBuf>,

    /// Process metadata (JSON, shared fields + per-process overrides)
    #[serde(default)]
    pub metadata: Option<PathBuf>,

    /// Per-process metadata sheet (CSV, one column per process)
    #[serde(default)]
    pub tabular_metadata: Option<PathBuf>,

    #[serde(default)]
    pub bibliography: Option<PathBuf>,

    #[serde(default)]
    pub locations: Option<PathBuf>,

    #[serde(default)]
    pub dq_systems: DqSystemSpec,

    /// Validity period written to every process (`[from, until]`)
    #[serde(default)]
    pub years: Option<(i32, Option<i32>)>,

    #[serde(default)]
    pub repositories: RepoCatalog,

    /// Directory holding `{owner}/{repo}/{PATH}.zip` exports
    #[serde(default = "default_repository_root")]
    pub repository_root: PathBuf,

    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub bridge_naming: BridgeNaming,
}

fn default_repository_root() -> PathBuf {
    PathBuf::from("repositories")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let mut config: PipelineConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Make every relative path relative to `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.exchanges);
        resolve(&mut self.repository_root);
        resolve(&mut self.output_dir);
        for p in [
            &mut self.tech_mapping,
            &mut self.tech_flows,
            &mut self.elementary_flows,
            &mut self.units,
            &mut self.metadata,
            &mut self.tabular_metadata,
            &mut self.bibliography,
            &mut self.locations,
        ]
        .into_iter()
        .flatten()
        {
            resolve(p);
        }
    }

    pub fn access(&self) -> Access {
        match &self.auth_token {
            Some(token) if !token.is_empty() => Access::Session(token.clone()),
            _ => Access::Public,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_config_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"name": "coal", "exchanges": "coal.csv"}"#).unwrap();
        assert_eq!(config.bridge_naming, BridgeNaming::Proxy);
        assert!(config.tech_mapping.is_none());
        assert_eq!(config.access(), Access::Public);
        assert_eq!(config.output_dir, PathBuf::from("output"));
    }

    #[test]
    fn test_paths_resolved_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{
                "name": "coal",
                "exchanges": "coal.csv",
                "tech_mapping": "mapping.csv",
                "auth_token": "secret",
                "bridge_naming": "proxy_hyphenated",
                "repositories": {{"USLCI": {{"owner": "lca", "repo": "uslci", "public": true}}}}
            }}"#
        )
        .unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.exchanges, dir.path().join("coal.csv"));
        assert_eq!(config.tech_mapping, Some(dir.path().join("mapping.csv")));
        assert_eq!(config.output_dir, dir.path().join("output"));
        assert_eq!(config.access(), Access::Session("secret".to_string()));
        assert_eq!(config.bridge_naming, BridgeNaming::ProxyHyphenated);
        assert_eq!(config.repositories.len(), 1);
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = PipelineConfig::from_file(Path::new("/nonexistent/run.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}
