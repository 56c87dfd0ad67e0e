//! Configuration management.

use crate::error::{BerthError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Persistent configuration for berth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Docker endpoint (`unix://...`, `tcp://...`); local defaults when unset
    pub docker_host: Option<String>,

    /// Grace period before a stopped container is killed
    pub stop_timeout_secs: u64,

    /// Pull images that are not present locally before creating containers
    pub pull_missing_images: bool,

    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            docker_host: None,
            stop_timeout_secs: 10,
            pull_missing_images: true,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        paths::config_dir().join("config.json")
    }

    /// Load configuration from disk, or defaults when no file exists.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, or defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| BerthError::InvalidConfig {
            reason: format!("Failed to read config: {}", e),
        })?;
        serde_json::from_str(&content).map_err(|e| BerthError::InvalidConfig {
            reason: format!("Failed to parse config: {}", e),
        })
    }
}
