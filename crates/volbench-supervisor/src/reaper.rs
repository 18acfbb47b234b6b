//! Orphaned fio process reaping.
//!
//! A bridge crash before a record could even be persisted can leave fio
//! processes running with no record referencing them. The reaper scans for
//! processes with the fio binary name and terminates any whose pid is not
//! tracked by a non-terminal record.

use tracing::info;
use volbench_process::{pids_matching_name, terminate_group};
use volbench_runner::{FIO_BINARY_NAME, TERMINATION_GRACE};

/// Terminate every fio process not in `tracked_pids`. Returns how many
/// orphans were signaled.
pub async fn reap_orphans(tracked_pids: &[u32]) -> usize {
    let mut terminated = 0;
    for pid in pids_matching_name(FIO_BINARY_NAME) {
        if tracked_pids.contains(&pid) {
            continue;
        }
        info!(pid, "terminating orphaned fio process");
        terminate_group(pid, TERMINATION_GRACE).await;
        terminated += 1;
    }
    terminated
}
