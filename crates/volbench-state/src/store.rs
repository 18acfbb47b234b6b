//! Durable run store.
//!
//! All run records live in a single JSON document at a well-known path
//! outside the scratch root. Every write goes to a temp file first and is
//! renamed into place, so a crash mid-write leaves the previous document
//! intact. A corrupted or unreadable document degrades to "no prior runs
//! known" rather than failing startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use volbench_common::{RunError, RunId, RunResult};

use crate::record::RunRecord;
use crate::status::RunStatus;

/// On-disk document shape, versioned for forward compatibility.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    runs: BTreeMap<String, RunRecord>,
}

fn default_version() -> u32 {
    1
}

/// In-memory view of the persisted run document, with write-through
/// persistence. The registry actor is the only writer; reads go through
/// snapshots the actor hands out.
pub struct RunStore {
    path: PathBuf,
    doc: StoreDocument,
}

impl RunStore {
    /// Open the store at `path`, loading any existing document.
    ///
    /// Missing, unreadable, or unparsable documents all yield an empty
    /// store with a warning. Losing history is recoverable; refusing to
    /// start is not.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let doc = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<StoreDocument>(&content) {
                Ok(doc) => {
                    debug!(runs = doc.runs.len(), path = %path.display(), "loaded run store");
                    doc
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "run store unparsable, starting empty");
                    StoreDocument::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreDocument::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "run store unreadable, starting empty");
                StoreDocument::default()
            }
        };
        Self { path, doc }
    }

    /// Insert or replace a record and synchronously persist the document.
    ///
    /// The durable write completes before this returns, so a reader that
    /// observes the new state can rely on it surviving a crash.
    pub async fn upsert(&mut self, record: RunRecord) -> RunResult<()> {
        self.doc
            .runs
            .insert(record.run_id.as_str().to_string(), record);
        self.persist().await
    }

    pub fn get(&self, run_id: &RunId) -> Option<&RunRecord> {
        self.doc.runs.get(run_id.as_str())
    }

    /// Records still in an active status (admission blockers).
    pub fn active(&self) -> Vec<RunRecord> {
        self.doc
            .runs
            .values()
            .filter(|r| r.status.is_active())
            .cloned()
            .collect()
    }

    /// Records left in a reconciliation status by startup recovery.
    pub fn reconciliation_pending(&self) -> Vec<RunRecord> {
        self.doc
            .runs
            .values()
            .filter(|r| r.status.is_reconciliation())
            .cloned()
            .collect()
    }

    /// Terminal records, newest first.
    pub fn history(&self) -> Vec<RunRecord> {
        let mut records: Vec<RunRecord> = self
            .doc
            .runs
            .values()
            .filter(|r| r.status.is_terminal())
            .cloned()
            .collect();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        records
    }

    /// Child pids referenced by any record not yet terminal. Used by the
    /// orphan reaper to decide which fio processes are accounted for.
    pub fn tracked_pids(&self) -> Vec<u32> {
        self.doc
            .runs
            .values()
            .filter(|r| !r.status.is_terminal())
            .filter_map(|r| r.child_pid)
            .collect()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self) -> RunResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                RunError::state_store(format!(
                    "failed to create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.doc)
            .map_err(|e| RunError::state_store(format!("failed to serialize run store: {}", e)))?;

        // Atomic write: temp file in the same directory, then rename.
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, json).await.map_err(|e| {
            RunError::state_store(format!(
                "failed to write {}: {}",
                temp_path.display(),
                e
            ))
        })?;
        tokio::fs::rename(&temp_path, &self.path).await.map_err(|e| {
            RunError::state_store(format!(
                "failed to rename run store into place at {}: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(())
    }
}

// Convenience used by reconciliation code and tests.
impl RunStore {
    /// Apply a status transition to a stored record and persist.
    pub async fn transition(&mut self, run_id: &RunId, target: RunStatus) -> RunResult<()> {
        let mut record = self
            .get(run_id)
            .cloned()
            .ok_or_else(|| RunError::not_found(run_id.as_str()))?;
        record.transition(target)?;
        self.upsert(record).await
    }
}
