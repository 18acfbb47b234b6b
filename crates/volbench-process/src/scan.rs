//! Process discovery by binary name.

use sysinfo::{Pid, ProcessRefreshKind, RefreshKind, System};

/// Pids of all processes whose binary name matches `name` exactly.
pub fn pids_matching_name(name: &str) -> Vec<u32> {
    let system = System::new_with_specifics(
        RefreshKind::new().with_processes(ProcessRefreshKind::new()),
    );
    system
        .processes()
        .iter()
        .filter(|(_, process)| process.name() == name)
        .map(|(pid, _)| pid.as_u32())
        .collect()
}

/// Whether the process at `pid` is alive and runs a binary named `name`.
///
/// Used during startup reconciliation to confirm a persisted pid still
/// belongs to the tool we launched rather than a recycled pid.
pub fn process_matches_name(pid: u32, name: &str) -> bool {
    let mut system = System::new();
    let sysinfo_pid = Pid::from_u32(pid);
    if !system.refresh_process_specifics(sysinfo_pid, ProcessRefreshKind::new()) {
        return false;
    }
    system
        .process(sysinfo_pid)
        .map(|process| process.name() == name)
        .unwrap_or(false)
}
