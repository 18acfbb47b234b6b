//! fio binary discovery.

use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;
use volbench_common::{RunError, RunResult};

/// Binary name the bridge launches and the reaper scans for.
pub const FIO_BINARY_NAME: &str = "fio";

/// Fixed install locations, highest preference first. A bundled custom
/// build wins over package-manager installs, which win over the system
/// path.
const CANDIDATE_PATHS: &[&str] = &[
    "./fio/fio",
    "/opt/homebrew/bin/fio",
    "/usr/local/bin/fio",
    "/usr/bin/fio",
];

/// Resolve the fio binary to launch.
///
/// An explicit override is honored first, then the fixed candidate list,
/// then a `$PATH` scan. Missing everywhere is a fatal, user-facing
/// condition reported with the locations that were searched.
pub fn discover_fio(override_path: Option<&Path>) -> RunResult<PathBuf> {
    let mut searched: Vec<String> = Vec::new();

    if let Some(path) = override_path {
        if is_executable(path) {
            return Ok(path.to_path_buf());
        }
        searched.push(path.display().to_string());
    }

    for candidate in CANDIDATE_PATHS {
        let path = Path::new(candidate);
        if is_executable(path) {
            debug!(path = %path.display(), "resolved fio binary");
            return Ok(path.to_path_buf());
        }
        searched.push(candidate.to_string());
    }

    if let Some(path_var) = env::var_os("PATH") {
        for dir in env::split_paths(&path_var) {
            let candidate = dir.join(FIO_BINARY_NAME);
            if is_executable(&candidate) {
                debug!(path = %candidate.display(), "resolved fio binary from PATH");
                return Ok(candidate);
            }
        }
        searched.push("$PATH".to_string());
    }

    Err(RunError::binary_not_found(searched.join(", ")))
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}
