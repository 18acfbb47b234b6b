//! Benchmark execution for the volbench bridge.
//!
//! Covers everything between "a run was admitted" and "the child is done":
//! binary discovery, the fixed pattern registry, progress estimation, and
//! the process runner itself.

pub mod discover;
pub mod patterns;
pub mod progress;
pub mod runner;

pub use discover::{discover_fio, FIO_BINARY_NAME};
pub use patterns::PatternSpec;
pub use progress::{estimate, ProgressSnapshot};
pub use runner::{
    execution_ceiling, ExitOutcome, FioLauncher, LaunchRequest, RunCompletion, RunLauncher,
    TERMINATION_GRACE,
};
