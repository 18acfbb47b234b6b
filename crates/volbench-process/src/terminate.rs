//! Process-group termination with escalation.
//!
//! fio forks one worker per job, so stopping only the immediate child can
//! leave workers writing to the target volume. Everything here targets the
//! process group, falling back to the single pid when the group cannot be
//! resolved.

use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::{getpgid, Pid};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::check::process_exists;

/// How often the grace-period wait re-checks liveness.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Outcome of a termination attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// The process was already gone.
    AlreadyExited,
    /// Exited within the grace period after SIGTERM.
    Graceful,
    /// Required SIGKILL after the grace period lapsed.
    Forced,
}

/// Send `signal` to the process group of `pid`.
///
/// Tolerant of a vanished process: ESRCH is success, since the goal
/// (nothing left running) is already met. Falls back to signaling the
/// single pid when the group id cannot be read.
pub fn signal_group(pid: u32, signal: Signal) -> bool {
    let target = Pid::from_raw(pid as i32);
    match getpgid(Some(target)) {
        Ok(pgid) => match killpg(pgid, signal) {
            Ok(()) | Err(nix::errno::Errno::ESRCH) => true,
            Err(e) => {
                warn!(pid, %signal, error = %e, "failed to signal process group");
                false
            }
        },
        Err(nix::errno::Errno::ESRCH) => true,
        Err(e) => {
            debug!(pid, error = %e, "could not resolve process group, signaling pid directly");
            matches!(kill(target, signal), Ok(()) | Err(nix::errno::Errno::ESRCH))
        }
    }
}

/// Terminate the process group of `pid`: SIGTERM, wait up to `grace`,
/// then SIGKILL if anything in the group is still alive.
///
/// Idempotent. Calling this on an already-dead pid returns
/// [`TerminationOutcome::AlreadyExited`].
pub async fn terminate_group(pid: u32, grace: Duration) -> TerminationOutcome {
    if !process_exists(pid).unwrap_or(false) {
        return TerminationOutcome::AlreadyExited;
    }

    debug!(pid, "sending SIGTERM to process group");
    signal_group(pid, Signal::SIGTERM);

    let deadline = tokio::time::Instant::now() + grace;
    while tokio::time::Instant::now() < deadline {
        if !process_exists(pid).unwrap_or(false) {
            return TerminationOutcome::Graceful;
        }
        sleep(POLL_INTERVAL).await;
    }

    warn!(pid, grace_secs = grace.as_secs(), "grace period expired, sending SIGKILL");
    signal_group(pid, Signal::SIGKILL);
    TerminationOutcome::Forced
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_terminate_nonexistent_pid_is_noop() {
        // A pid far above normal ranges; if it happens to exist the test
        // environment is stranger than the code under test.
        let outcome = terminate_group(3_999_999, Duration::from_millis(100)).await;
        assert_eq!(outcome, TerminationOutcome::AlreadyExited);
    }

    #[tokio::test]
    async fn test_terminate_is_idempotent() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .process_group(0)
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();

        let first = terminate_group(pid, Duration::from_secs(2)).await;
        assert_ne!(first, TerminationOutcome::AlreadyExited);
        let _ = child.wait().await;

        let second = terminate_group(pid, Duration::from_millis(100)).await;
        assert_eq!(second, TerminationOutcome::AlreadyExited);
    }
}
