//! Run status enumeration and transition rules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of one benchmark run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Admitted; the child has not been launched yet.
    Starting,
    /// Child launched and believed alive.
    Running,
    /// Child exited and produced a usable result.
    Completed,
    /// Launch or execution failed.
    Failed,
    /// Terminated by user request.
    Stopped,
    /// Terminated by the runner's execution ceiling.
    Timeout,
    /// Found at startup with a live child but no supervision. Must be
    /// resolved by an explicit stop.
    Disconnected,
    /// Found at startup with no live child. Immediately finalized as Failed.
    Unknown,
}

impl RunStatus {
    /// Terminal statuses never transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Stopped | RunStatus::Timeout
        )
    }

    /// Active statuses block admission of a new run.
    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::Starting | RunStatus::Running)
    }

    /// Statuses assigned only by startup reconciliation.
    pub fn is_reconciliation(&self) -> bool {
        matches!(self, RunStatus::Disconnected | RunStatus::Unknown)
    }

    /// Whether a transition from `self` to `target` is allowed.
    ///
    /// `Disconnected` and `Unknown` are only enterable from an active
    /// status, which in practice means the reconciliation path at startup.
    /// Normal operation never produces them.
    pub fn can_transition_to(&self, target: RunStatus) -> bool {
        use RunStatus::*;
        match (*self, target) {
            (Starting, Running) => true,
            (Starting, Failed) => true,
            (Starting, Stopped) => true,

            (Running, Completed) => true,
            (Running, Failed) => true,
            (Running, Stopped) => true,
            (Running, Timeout) => true,

            // Startup reconciliation of a record that lost supervision.
            (Starting, Disconnected) | (Running, Disconnected) => true,
            (Starting, Unknown) | (Running, Unknown) => true,

            // A disconnected run is resolved by a forced stop; an unknown
            // run is finalized as failed.
            (Disconnected, Stopped) => true,
            (Disconnected, Failed) => true,
            (Unknown, Failed) => true,

            _ => false,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Starting => "starting",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Stopped => "stopped",
            RunStatus::Timeout => "timeout",
            RunStatus::Disconnected => "disconnected",
            RunStatus::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}
