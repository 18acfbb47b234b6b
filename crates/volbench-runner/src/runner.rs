//! Child process execution for one benchmark run.
//!
//! The runner owns the entire lifetime of one fio invocation: job-file
//! rendering, launch into a fresh process group with a controlled
//! environment, bounded output capture, the hard execution ceiling, and
//! scratch cleanup. Completion is reported on a channel so the caller
//! never blocks on the child.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use volbench_common::{PatternId, RunError, RunId, RunResult};
use volbench_process::terminate_group;

use crate::discover::discover_fio;
use crate::patterns::PatternSpec;

/// Grace between SIGTERM and SIGKILL when stopping a run.
pub const TERMINATION_GRACE: Duration = Duration::from_secs(5);

/// Cap on the in-memory stdout/stderr capture. Oldest bytes are dropped
/// past this, so an hours-long run cannot grow the bridge unbounded.
const CAPTURE_CAP_BYTES: usize = 256 * 1024;

const JOB_FILE_NAME: &str = "job.fio";
const RESULT_FILE_NAME: &str = "result.json";

/// Hard ceiling for a run: double the expected duration plus startup
/// margin. Generous on purpose; the estimate drives UI display, this
/// drives safety.
pub fn execution_ceiling(estimated_duration: Duration) -> Duration {
    estimated_duration * 2 + Duration::from_secs(120)
}

/// Everything needed to launch one run. All values are validated by the
/// registry before they get here.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub run_id: RunId,
    pub pattern: PatternId,
    pub target_path: PathBuf,
    pub size_gb: u32,
    pub scratch_dir: PathBuf,
    pub timeout: Duration,
}

/// How the child finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The child exited on its own with this code.
    Completed { exit_code: i32 },
    /// The execution ceiling expired and the group was terminated.
    TimedOut,
    /// The child could not be awaited or died to an external signal.
    Failed { reason: String },
}

/// Final report for one launched run, delivered exactly once.
#[derive(Debug)]
pub struct RunCompletion {
    pub run_id: RunId,
    pub outcome: ExitOutcome,
    /// Bounded combined stdout/stderr capture, for diagnostics and as the
    /// fallback result source.
    pub stream_capture: String,
    /// Contents of the dedicated output file, the primary result source.
    pub result_payload: Option<String>,
}

/// Seam between the registry and the thing that actually runs benchmarks.
///
/// The production implementation is [`FioLauncher`]; tests substitute a
/// scripted fake.
#[async_trait]
pub trait RunLauncher: Send + Sync {
    /// Launch a run and return the child pid. The completion report is
    /// sent on `completions` when the child is done, regardless of how it
    /// ends.
    async fn launch(
        &self,
        request: LaunchRequest,
        completions: mpsc::Sender<RunCompletion>,
    ) -> RunResult<u32>;

    /// Terminate the run's process group, escalating to SIGKILL after the
    /// grace period. Idempotent and tolerant of an already-dead pid.
    async fn terminate(&self, pid: u32);
}

/// Launches real fio processes.
pub struct FioLauncher {
    binary_override: Option<PathBuf>,
}

impl FioLauncher {
    pub fn new(binary_override: Option<PathBuf>) -> Self {
        Self { binary_override }
    }
}

#[async_trait]
impl RunLauncher for FioLauncher {
    async fn launch(
        &self,
        request: LaunchRequest,
        completions: mpsc::Sender<RunCompletion>,
    ) -> RunResult<u32> {
        let binary = discover_fio(self.binary_override.as_deref())?;

        tokio::fs::create_dir_all(&request.scratch_dir)
            .await
            .map_err(|e| {
                RunError::spawn_failed(format!(
                    "failed to create scratch directory {}: {}",
                    request.scratch_dir.display(),
                    e
                ))
            })?;

        let spec = PatternSpec::for_pattern(request.pattern);
        let job_file = spec.render_job_file(&request.target_path, request.size_gb);
        let job_path = request.scratch_dir.join(JOB_FILE_NAME);
        tokio::fs::write(&job_path, job_file).await.map_err(|e| {
            RunError::spawn_failed(format!(
                "failed to write job file {}: {}",
                job_path.display(),
                e
            ))
        })?;

        let result_path = request.scratch_dir.join(RESULT_FILE_NAME);

        // Controlled environment: PATH led by the resolved binary's
        // directory, and fio's shared-memory segments disabled (they
        // misbehave under the macOS default segment limits).
        let path_value = match (binary.parent(), std::env::var("PATH")) {
            (Some(dir), Ok(existing)) => format!("{}:{}", dir.display(), existing),
            (Some(dir), Err(_)) => dir.display().to_string(),
            (None, Ok(existing)) => existing,
            (None, Err(_)) => String::from("/usr/bin:/bin"),
        };

        let mut child = Command::new(&binary)
            .arg("--output-format=json")
            .arg("--output")
            .arg(&result_path)
            .arg(&job_path)
            .current_dir(&request.scratch_dir)
            .env("PATH", path_value)
            .env("FIO_DISABLE_SHM", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .spawn()
            .map_err(|e| {
                RunError::spawn_failed(format!("failed to spawn {}: {}", binary.display(), e))
            })?;

        let pid = child.id().ok_or_else(|| {
            RunError::spawn_failed("fio exited before a pid could be observed".to_string())
        })?;

        info!(run_id = %request.run_id, pid, binary = %binary.display(), "launched fio");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        tokio::spawn(supervise(child, pid, stdout, stderr, request, completions));

        Ok(pid)
    }

    async fn terminate(&self, pid: u32) {
        terminate_group(pid, TERMINATION_GRACE).await;
    }
}

/// Drive one spawned child to completion and report it.
async fn supervise(
    mut child: tokio::process::Child,
    pid: u32,
    stdout: Option<tokio::process::ChildStdout>,
    stderr: Option<tokio::process::ChildStderr>,
    request: LaunchRequest,
    completions: mpsc::Sender<RunCompletion>,
) {
    let capture = Arc::new(Mutex::new(BoundedCapture::new(CAPTURE_CAP_BYTES)));

    let stdout_task = stdout.map(|s| tokio::spawn(drain(s, Arc::clone(&capture))));
    let stderr_task = stderr.map(|s| tokio::spawn(drain(s, Arc::clone(&capture))));

    let outcome = match tokio::time::timeout(request.timeout, child.wait()).await {
        Ok(Ok(status)) => match status.code() {
            Some(exit_code) => {
                debug!(run_id = %request.run_id, exit_code, "fio exited");
                ExitOutcome::Completed { exit_code }
            }
            None => ExitOutcome::Failed {
                reason: format!("fio terminated by signal ({})", status),
            },
        },
        Ok(Err(e)) => ExitOutcome::Failed {
            reason: format!("failed to wait for fio: {}", e),
        },
        Err(_) => {
            warn!(
                run_id = %request.run_id,
                pid,
                ceiling_secs = request.timeout.as_secs(),
                "execution ceiling expired, terminating process group"
            );
            terminate_group(pid, TERMINATION_GRACE).await;
            let _ = child.wait().await;
            ExitOutcome::TimedOut
        }
    };

    if let Some(task) = stdout_task {
        let _ = task.await;
    }
    if let Some(task) = stderr_task {
        let _ = task.await;
    }

    let stream_capture = capture.lock().await.to_string_lossy();

    let result_path = request.scratch_dir.join(RESULT_FILE_NAME);
    let result_payload = match tokio::fs::read_to_string(&result_path).await {
        Ok(content) if !content.trim().is_empty() => Some(content),
        Ok(_) => None,
        Err(_) => None,
    };

    cleanup_scratch(&request.scratch_dir).await;

    let completion = RunCompletion {
        run_id: request.run_id.clone(),
        outcome,
        stream_capture,
        result_payload,
    };
    if completions.send(completion).await.is_err() {
        // Receiver gone means the bridge is shutting down; nothing left
        // to report to.
        debug!(run_id = %request.run_id, "completion receiver dropped");
    }
}

async fn drain<R: AsyncReadExt + Unpin>(mut reader: R, capture: Arc<Mutex<BoundedCapture>>) {
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => capture.lock().await.push(&chunk[..n]),
        }
    }
}

/// Deletes the run's scratch directory. Best effort: failure is logged,
/// never escalated, since the result has already been captured.
async fn cleanup_scratch(scratch_dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(scratch_dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(scratch = %scratch_dir.display(), error = %e, "failed to clean scratch directory");
        }
    }
}

/// Ring capture that drops the oldest bytes past its cap.
struct BoundedCapture {
    buf: VecDeque<u8>,
    cap: usize,
}

impl BoundedCapture {
    fn new(cap: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(cap.min(64 * 1024)),
            cap,
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes);
        while self.buf.len() > self.cap {
            self.buf.pop_front();
        }
    }

    fn to_string_lossy(&self) -> String {
        let (a, b) = self.buf.as_slices();
        let mut bytes = Vec::with_capacity(self.buf.len());
        bytes.extend_from_slice(a);
        bytes.extend_from_slice(b);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}
