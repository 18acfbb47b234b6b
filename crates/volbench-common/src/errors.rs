//! Error types for the volbench bridge.

use thiserror::Error;

/// Result type alias for bridge operations.
pub type RunResult<T> = std::result::Result<T, RunError>;

/// Error type covering admission, launch, execution, and supervision
/// failures for benchmark runs.
///
/// Admission errors (`AlreadyRunning`, `InvalidTarget`, `InsufficientSpace`,
/// `SizeOutOfRange`, `UnknownPattern`) are returned synchronously from
/// `start` and never create a run record. Everything else is captured into
/// the record's `error_message` and observed via status polls.
#[derive(Error, Debug, Clone)]
pub enum RunError {
    #[error("A benchmark is already running: {active}")]
    AlreadyRunning { active: String },

    #[error("Run not found: {run_id}")]
    NotFound { run_id: String },

    #[error("Invalid target path '{path}': {reason}")]
    InvalidTarget { path: String, reason: String },

    #[error(
        "Insufficient free space on '{path}': need {required_bytes} bytes, {available_bytes} available"
    )]
    InsufficientSpace {
        path: String,
        required_bytes: u64,
        available_bytes: u64,
    },

    #[error("Test size {size_gb} GB is out of range ({min}-{max} GB)")]
    SizeOutOfRange { size_gb: u32, min: u32, max: u32 },

    #[error("Unknown test pattern: {id}")]
    UnknownPattern { id: String },

    #[error("fio binary not found (searched: {searched})")]
    BinaryNotFound { searched: String },

    #[error("Failed to launch benchmark process: {reason}")]
    SpawnFailed { reason: String },

    #[error("Run {run_id}: invalid status transition {from} -> {to}")]
    InvalidTransition {
        run_id: String,
        from: String,
        to: String,
    },

    #[error("State store error: {reason}")]
    StateStore { reason: String },

    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

impl RunError {
    pub fn already_running(active: impl Into<String>) -> Self {
        Self::AlreadyRunning {
            active: active.into(),
        }
    }

    pub fn not_found(run_id: impl Into<String>) -> Self {
        Self::NotFound {
            run_id: run_id.into(),
        }
    }

    pub fn invalid_target(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn insufficient_space(
        path: impl Into<String>,
        required_bytes: u64,
        available_bytes: u64,
    ) -> Self {
        Self::InsufficientSpace {
            path: path.into(),
            required_bytes,
            available_bytes,
        }
    }

    pub fn size_out_of_range(size_gb: u32, min: u32, max: u32) -> Self {
        Self::SizeOutOfRange { size_gb, min, max }
    }

    pub fn unknown_pattern(id: impl Into<String>) -> Self {
        Self::UnknownPattern { id: id.into() }
    }

    pub fn binary_not_found(searched: impl Into<String>) -> Self {
        Self::BinaryNotFound {
            searched: searched.into(),
        }
    }

    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            reason: reason.into(),
        }
    }

    pub fn invalid_transition(
        run_id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self::InvalidTransition {
            run_id: run_id.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn state_store(reason: impl Into<String>) -> Self {
        Self::StateStore {
            reason: reason.into(),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }
}
