//! Process liveness checks.

use volbench_common::{RunError, RunResult};

/// Check whether a process with the given pid exists.
///
/// Uses `kill(pid, 0)`, which delivers no signal. A process we lack
/// permission to signal still exists.
pub fn process_exists(pid: u32) -> RunResult<bool> {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(_) => Ok(true),
        Err(nix::errno::Errno::ESRCH) => Ok(false),
        Err(nix::errno::Errno::EPERM) => Ok(true),
        Err(e) => Err(RunError::internal(format!(
            "failed to check process {}: {}",
            pid, e
        ))),
    }
}
