//! Run supervision for the volbench bridge.
//!
//! The [`RunRegistry`] is the single authority over benchmark runs: it
//! admits at most one concurrent run, persists every status transition
//! durably before it becomes observable, reconciles persisted state
//! against live processes at startup, and reaps orphaned fio processes.

mod actor;
mod commands;
mod handle;
mod reaper;
pub mod types;


pub use handle::RunRegistry;
pub use reaper::reap_orphans;
pub use types::{RegistryConfig, RunSnapshot, StartParams, VolumeCatalog};
