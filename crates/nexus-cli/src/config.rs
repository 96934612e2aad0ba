//! Workspace configuration.
//!
//! A workspace is a `.nexus` directory holding `config.json` and the sled
//! store. Commands look for one under the working root and fall back to the
//! per-user data directory.

use nexus_core::DEFAULT_DEPARTMENT;
use nexus_graph::{RecommendationWeights, SledStore, SocialNetwork};
use nexus_server::DEFAULT_PORT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub const WORKSPACE_DIR: &str = ".nexus";
pub const CONFIG_FILE: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No workspace found and no user data directory available")]
    NoDataDir,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NexusConfig {
    #[serde(default = "default_version")]
    pub version: String,
    /// Store location, relative to the workspace directory.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
    /// Department for roster rows that leave it blank.
    #[serde(default = "default_department")]
    pub default_department: String,
    #[serde(default)]
    pub weights: RecommendationWeights,
    #[serde(default = "default_recommendation_limit")]
    pub recommendation_limit: usize,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("store")
}

fn default_department() -> String {
    DEFAULT_DEPARTMENT.to_string()
}

fn default_recommendation_limit() -> usize {
    4
}

fn default_server_port() -> u16 {
    DEFAULT_PORT
}

impl Default for NexusConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            store_dir: default_store_dir(),
            default_department: default_department(),
            weights: RecommendationWeights::default(),
            recommendation_limit: default_recommendation_limit(),
            server_port: default_server_port(),
        }
    }
}

/// A resolved workspace: where it lives and what it says.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub home: PathBuf,
    pub config: NexusConfig,
}

impl Workspace {
    /// Finds the workspace for `root`.
    pub fn locate(root: &Path) -> Result<Self, ConfigError> {
        let local = root.join(WORKSPACE_DIR);
        let home = if local.is_dir() {
            local
        } else {
            dirs::data_dir()
                .map(|dir| dir.join("nexus"))
                .ok_or(ConfigError::NoDataDir)?
        };
        Self::load(home)
    }

    /// Loads the workspace at `home`. A missing config file means defaults.
    pub fn load(home: PathBuf) -> Result<Self, ConfigError> {
        let path = home.join(CONFIG_FILE);
        let config = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            NexusConfig::default()
        };
        debug!("Using workspace {}", home.display());
        Ok(Self { home, config })
    }

    /// Creates `<root>/.nexus` with a default config. Returns false if it
    /// already existed.
    pub fn init(root: &Path) -> Result<bool, ConfigError> {
        let home = root.join(WORKSPACE_DIR);
        if home.exists() {
            return Ok(false);
        }
        fs::create_dir_all(&home)?;
        let config = serde_json::to_string_pretty(&NexusConfig::default())?;
        fs::write(home.join(CONFIG_FILE), config)?;
        Ok(true)
    }

    pub fn store_path(&self) -> PathBuf {
        self.home.join(&self.config.store_dir)
    }

    pub fn open_store(&self) -> Result<Arc<SledStore>, nexus_graph::StoreError> {
        Ok(Arc::new(SledStore::open(self.store_path())?))
    }

    /// Opens the store and wraps it in an engine using the configured weights.
    pub fn open_network(&self) -> Result<SocialNetwork, nexus_graph::StoreError> {
        Ok(SocialNetwork::new(self.open_store()?).with_weights(self.config.weights))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_writes_defaults() {
        let dir = tempdir().unwrap();
        assert!(Workspace::init(dir.path()).unwrap());
        assert!(!Workspace::init(dir.path()).unwrap());

        let ws = Workspace::locate(dir.path()).unwrap();
        assert_eq!(ws.home, dir.path().join(WORKSPACE_DIR));
        assert_eq!(ws.config, NexusConfig::default());
        assert_eq!(ws.store_path(), dir.path().join(".nexus").join("store"));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempdir().unwrap();
        let home = dir.path().join(WORKSPACE_DIR);
        fs::create_dir_all(&home).unwrap();
        fs::write(
            home.join(CONFIG_FILE),
            r#"{ "recommendation_limit": 10, "weights": { "same_department": 1 } }"#,
        )
        .unwrap();

        let ws = Workspace::locate(dir.path()).unwrap();
        assert_eq!(ws.config.recommendation_limit, 10);
        assert_eq!(ws.config.weights.same_department, 1);
        assert_eq!(ws.config.weights.mutual_friend, 10);
        assert_eq!(ws.config.default_department, "Agriculture");
        assert_eq!(ws.config.server_port, DEFAULT_PORT);
    }

    #[test]
    fn test_malformed_config() {
        let dir = tempdir().unwrap();
        let home = dir.path().join(WORKSPACE_DIR);
        fs::create_dir_all(&home).unwrap();
        fs::write(home.join(CONFIG_FILE), "{ nope").unwrap();

        assert!(matches!(
            Workspace::locate(dir.path()),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_open_network() {
        let dir = tempdir().unwrap();
        Workspace::init(dir.path()).unwrap();
        let ws = Workspace::locate(dir.path()).unwrap();

        let network = ws.open_network().unwrap();
        assert_eq!(network.snapshot().unwrap().graph().account_count(), 0);
    }
}
