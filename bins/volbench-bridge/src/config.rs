//! Bridge configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration, loaded from YAML. Every field has a default
/// so the bridge runs with no config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the persisted run document. Defaults to the
    /// platform data directory.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Root under which per-run scratch directories are created.
    /// Defaults to `<state_dir>/scratch`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_root: Option<PathBuf>,

    /// Explicit fio binary path, overriding discovery.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fio_binary: Option<PathBuf>,

    #[serde(default = "default_reaper_interval")]
    pub reaper_interval_seconds: u64,
}

fn default_port() -> u16 {
    4520
}

fn default_state_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("volbench")
}

fn default_reaper_interval() -> u64 {
    60
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            state_dir: default_state_dir(),
            scratch_root: None,
            fio_binary: None,
            reaper_interval_seconds: default_reaper_interval(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        Self::load_from_string(&content)
    }

    /// Load configuration from a YAML string.
    pub fn load_from_string(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse YAML configuration")
    }

    pub fn store_path(&self) -> PathBuf {
        self.state_dir.join("runs.json")
    }

    /// Scratch root, outside of which no run may write its test files.
    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_root
            .clone()
            .unwrap_or_else(|| self.state_dir.join("scratch"))
    }
}
