//! Public types for the run registry.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use volbench_common::PatternId;
use volbench_runner::{ProgressSnapshot, RunLauncher};
use volbench_state::RunRecord;

/// Parameters for admitting a new run. The pattern id has already been
/// resolved through the alias table at the API boundary.
#[derive(Debug, Clone)]
pub struct StartParams {
    pub pattern: PatternId,
    pub target_path: PathBuf,
    pub size_gb: u32,
}

/// Read-only view of one run, augmented with a live progress estimate
/// while the run is active.
#[derive(Debug, Clone, Serialize)]
pub struct RunSnapshot {
    #[serde(flatten)]
    pub record: RunRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressSnapshot>,
}

/// Free-space lookup for admission validation. The production
/// implementation consults the mounted-volume list; tests use a fixture.
pub trait VolumeCatalog: Send + Sync {
    /// Free bytes on the volume containing `path`, if the volume is known.
    fn free_space_bytes(&self, path: &Path) -> Option<u64>;
}

/// Wiring for [`crate::RunRegistry::start`].
pub struct RegistryConfig {
    /// Path of the persisted run document, outside the scratch root.
    pub store_path: PathBuf,
    /// Root under which every run's scratch directory is created.
    pub scratch_root: PathBuf,
    pub launcher: Arc<dyn RunLauncher>,
    pub volumes: Arc<dyn VolumeCatalog>,
}
