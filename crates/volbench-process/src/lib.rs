//! OS process primitives for the volbench bridge.
//!
//! Everything the supervisor needs to reason about child processes without
//! holding a `Child` handle: liveness checks, group-wide termination with
//! SIGTERM-then-SIGKILL escalation, and discovery of processes by binary
//! name for orphan reaping.

mod check;
mod scan;
mod terminate;

pub use check::process_exists;
pub use scan::{pids_matching_name, process_matches_name};
pub use terminate::{signal_group, terminate_group, TerminationOutcome};
