//! The persisted record of one benchmark run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use volbench_common::{PatternId, RunError, RunId, RunResult};
use volbench_results::ResultSummary;

use crate::status::RunStatus;

/// Upper bound on the diagnostic output retained in a record.
///
/// The runner already caps its capture buffer; this is a second bound so a
/// record can never bloat the store regardless of what the runner hands us.
pub const MAX_RAW_OUTPUT_BYTES: usize = 64 * 1024;

/// One attempted or completed benchmark execution.
///
/// Created by the registry at admission time, mutated only through
/// [`RunRecord::transition`] and the setters below, and persisted on every
/// status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub status: RunStatus,
    pub pattern_id: PatternId,
    pub target_path: PathBuf,
    pub size_gb: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub estimated_duration_seconds: u64,
    #[serde(default)]
    pub child_pid: Option<u32>,
    pub scratch_dir: PathBuf,
    #[serde(default)]
    pub raw_output: String,
    #[serde(default)]
    pub result_summary: Option<ResultSummary>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl RunRecord {
    /// Create a freshly admitted record in `Starting` status.
    pub fn new(
        run_id: RunId,
        pattern_id: PatternId,
        target_path: PathBuf,
        size_gb: u32,
        estimated_duration_seconds: u64,
        scratch_dir: PathBuf,
    ) -> Self {
        Self {
            run_id,
            status: RunStatus::Starting,
            pattern_id,
            target_path,
            size_gb,
            started_at: Utc::now(),
            finished_at: None,
            estimated_duration_seconds,
            child_pid: None,
            scratch_dir,
            raw_output: String::new(),
            result_summary: None,
            error_message: None,
        }
    }

    /// Move to a new status, enforcing the transition table.
    ///
    /// Terminal statuses record `finished_at` on entry.
    pub fn transition(&mut self, target: RunStatus) -> RunResult<()> {
        if self.status == target {
            return Ok(());
        }
        if !self.status.can_transition_to(target) {
            return Err(RunError::invalid_transition(
                self.run_id.as_str(),
                self.status.to_string(),
                target.to_string(),
            ));
        }
        tracing::debug!(
            run_id = %self.run_id,
            from = %self.status,
            to = %target,
            "run status transition"
        );
        self.status = target;
        if target.is_terminal() && self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Record the child pid. Set exactly once, before `Running` is entered.
    pub fn set_child_pid(&mut self, pid: u32) -> RunResult<()> {
        if self.child_pid.is_some() {
            return Err(RunError::internal(format!(
                "child_pid already set for run {}",
                self.run_id
            )));
        }
        self.child_pid = Some(pid);
        Ok(())
    }

    /// Attach captured diagnostic output, truncating from the front so the
    /// tail (where fio reports errors) survives.
    pub fn set_raw_output(&mut self, output: &str) {
        if output.len() <= MAX_RAW_OUTPUT_BYTES {
            self.raw_output = output.to_string();
        } else {
            let start = output.len() - MAX_RAW_OUTPUT_BYTES;
            // Avoid splitting a UTF-8 code point.
            let start = (start..output.len())
                .find(|i| output.is_char_boundary(*i))
                .unwrap_or(output.len());
            self.raw_output = output[start..].to_string();
        }
    }
}
