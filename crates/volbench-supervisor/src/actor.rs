//! Registry actor: owns all run state.
//!
//! The actor runs in a single task and processes commands from the handle
//! plus completion reports from launched runs. Owning the state in one
//! task makes every admission check and status transition naturally
//! serialized; concurrent HTTP pollers can never observe or produce a
//! half-applied transition.
//!
//! The actor must never await the child itself. Launch returns as soon as
//! the process is spawned, and everything slow (the run itself, group
//! termination with its grace period, orphan scans) happens in spawned
//! tasks.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use volbench_common::{RunError, RunId, RunResult, MAX_SIZE_GB, MIN_SIZE_GB};
use volbench_results::suitability::required_read_bw_kibps;
use volbench_runner::{
    estimate, execution_ceiling, ExitOutcome, LaunchRequest, PatternSpec, RunCompletion,
    RunLauncher, FIO_BINARY_NAME,
};
use volbench_state::{RunRecord, RunStatus, RunStore};

use crate::commands::RegistryCommand;
use crate::reaper::reap_orphans;
use crate::types::{RunSnapshot, StartParams, VolumeCatalog};

/// Free-space margin required beyond the working set itself.
const FREE_SPACE_MARGIN_PERCENT: u64 = 10;

/// Paths a run may never target, even indirectly through symlinks.
const DENYLISTED_PREFIXES: &[&str] = &[
    "/System",
    "/Library",
    "/usr",
    "/bin",
    "/sbin",
    "/etc",
    "/dev",
    "/private/var/db",
];

pub(crate) struct RegistryActor {
    store: RunStore,
    launcher: Arc<dyn RunLauncher>,
    volumes: Arc<dyn VolumeCatalog>,
    scratch_root: PathBuf,
    /// The single allowed concurrent run.
    active: Option<RunId>,
    /// Cloned into every launch so completions find their way back.
    completion_tx: mpsc::Sender<RunCompletion>,
}

impl RegistryActor {
    pub(crate) fn new(
        store: RunStore,
        launcher: Arc<dyn RunLauncher>,
        volumes: Arc<dyn VolumeCatalog>,
        scratch_root: PathBuf,
        completion_tx: mpsc::Sender<RunCompletion>,
    ) -> Self {
        Self {
            store,
            launcher,
            volumes,
            scratch_root,
            active: None,
            completion_tx,
        }
    }

    /// Cross-check persisted state against live processes.
    ///
    /// Runs once at startup, before the event loop. Any record persisted
    /// as active either still has a recognizable fio child (supervision
    /// was lost: `disconnected`, surfaced for an explicit stop) or does
    /// not (finalized as `failed`). Normal operation never produces these
    /// statuses.
    pub(crate) async fn reconcile(&mut self) {
        for record in self.store.active() {
            let mut record = record;
            let live_fio = record
                .child_pid
                .map(|pid| volbench_process::process_matches_name(pid, FIO_BINARY_NAME))
                .unwrap_or(false);

            if live_fio {
                info!(
                    run_id = %record.run_id,
                    pid = record.child_pid.unwrap_or(0),
                    "found unsupervised fio from a previous bridge instance, marking disconnected"
                );
                if record.transition(RunStatus::Disconnected).is_ok() {
                    self.persist(record).await;
                }
            } else {
                info!(
                    run_id = %record.run_id,
                    "persisted run has no live process, finalizing as failed"
                );
                if record.transition(RunStatus::Unknown).is_ok() {
                    self.persist(record.clone()).await;
                }
                if record.transition(RunStatus::Failed).is_ok() {
                    record.error_message = Some(
                        "bridge restarted while the run was active; the benchmark process is no longer running"
                            .to_string(),
                    );
                    let scratch = record.scratch_dir.clone();
                    self.persist(record).await;
                    if let Err(e) = tokio::fs::remove_dir_all(&scratch).await {
                        if e.kind() != std::io::ErrorKind::NotFound {
                            warn!(scratch = %scratch.display(), error = %e, "failed to clean scratch of reconciled run");
                        }
                    }
                }
            }
        }
    }

    /// Main event loop. Completion reports are biased over commands so
    /// in-flight run state is settled before new work is admitted.
    pub(crate) async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<RegistryCommand>,
        mut completion_rx: mpsc::Receiver<RunCompletion>,
    ) {
        loop {
            tokio::select! {
                biased;

                Some(completion) = completion_rx.recv() => {
                    self.handle_completion(completion).await;
                }

                maybe_cmd = cmd_rx.recv() => match maybe_cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
            }
        }
        info!("run registry actor terminated");
    }

    async fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Start { params, resp } => self.handle_start(params, resp).await,
            RegistryCommand::Status { run_id, resp } => {
                let _ = resp.send(self.snapshot_of(&run_id));
            }
            RegistryCommand::Current { resp } => {
                let _ = resp.send(self.current_snapshot());
            }
            RegistryCommand::History { resp } => {
                let _ = resp.send(self.store.history());
            }
            RegistryCommand::Stop { run_id, resp } => {
                let _ = resp.send(self.handle_stop(&run_id).await);
            }
            RegistryCommand::StopAll { resp } => {
                let _ = resp.send(self.handle_stop_all().await);
            }
            RegistryCommand::Reap { resp } => {
                // The scan and the kill escalation are slow; run them off
                // the actor. Untracked orphans are by definition not in
                // registry state, so nothing here mutates.
                let tracked = self.store.tracked_pids();
                tokio::spawn(async move {
                    let _ = resp.send(reap_orphans(&tracked).await);
                });
            }
        }
    }

    // -------------------------------------------------------------------
    // Start
    // -------------------------------------------------------------------

    async fn handle_start(&mut self, params: StartParams, resp: oneshot::Sender<RunResult<RunId>>) {
        let target = match self.check_admission(&params).await {
            Ok(canonical_target) => canonical_target,
            Err(e) => {
                debug!(error = %e, "start rejected");
                let _ = resp.send(Err(e));
                return;
            }
        };

        let run_id = RunId::generate();
        let spec = PatternSpec::for_pattern(params.pattern);
        let scratch_dir = self.scratch_root.join(run_id.as_str());

        let record = RunRecord::new(
            run_id.clone(),
            params.pattern,
            target.clone(),
            params.size_gb,
            spec.estimated_duration.as_secs(),
            scratch_dir.clone(),
        );

        // The admission record must be durable before the caller learns
        // the run id.
        if let Err(e) = self.store.upsert(record).await {
            let _ = resp.send(Err(e));
            return;
        }
        self.active = Some(run_id.clone());

        info!(run_id = %run_id, pattern = %params.pattern, target = %target.display(), "run admitted");
        let _ = resp.send(Ok(run_id.clone()));

        // Launch errors from here on are terminal run state, not a start
        // failure; callers observe them through status polls.
        let request = LaunchRequest {
            run_id: run_id.clone(),
            pattern: params.pattern,
            target_path: target,
            size_gb: params.size_gb,
            scratch_dir,
            timeout: execution_ceiling(spec.estimated_duration),
        };

        match self
            .launcher
            .launch(request, self.completion_tx.clone())
            .await
        {
            Ok(pid) => {
                if let Some(mut record) = self.store.get(&run_id).cloned() {
                    if let Err(e) = record.set_child_pid(pid) {
                        error!(run_id = %run_id, error = %e, "could not record child pid");
                    }
                    if record.transition(RunStatus::Running).is_ok() {
                        self.persist(record).await;
                    }
                }
            }
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "launch failed");
                self.finalize(&run_id, RunStatus::Failed, Some(e.to_string()), None, None)
                    .await;
            }
        }
    }

    /// Validate admission and return the canonicalized target path.
    async fn check_admission(&mut self, params: &StartParams) -> RunResult<PathBuf> {
        if let Some(active) = &self.active {
            return Err(RunError::already_running(active.as_str()));
        }
        if let Some(record) = self.store.active().first() {
            return Err(RunError::already_running(record.run_id.as_str()));
        }
        if let Some(record) = self.store.reconciliation_pending().first() {
            return Err(RunError::already_running(format!(
                "{} (disconnected; stop it before starting a new run)",
                record.run_id
            )));
        }

        if !(MIN_SIZE_GB..=MAX_SIZE_GB).contains(&params.size_gb) {
            return Err(RunError::size_out_of_range(
                params.size_gb,
                MIN_SIZE_GB,
                MAX_SIZE_GB,
            ));
        }

        let shown = params.target_path.display().to_string();
        let canonical = tokio::fs::canonicalize(&params.target_path)
            .await
            .map_err(|_| RunError::invalid_target(&shown, "path does not exist"))?;

        let meta = tokio::fs::metadata(&canonical)
            .await
            .map_err(|e| RunError::invalid_target(&shown, format!("cannot stat: {}", e)))?;
        if !meta.is_dir() {
            return Err(RunError::invalid_target(&shown, "not a directory"));
        }

        if canonical == Path::new("/") {
            return Err(RunError::invalid_target(
                &shown,
                "testing the filesystem root is not allowed; choose a volume or folder",
            ));
        }
        for prefix in DENYLISTED_PREFIXES {
            if canonical.starts_with(prefix) {
                return Err(RunError::invalid_target(
                    &shown,
                    format!("{} is a protected system location", prefix),
                ));
            }
        }

        // Writability probe: creating the test files later must succeed.
        let probe = canonical.join(".volbench-write-probe");
        match tokio::fs::write(&probe, b"probe").await {
            Ok(()) => {
                let _ = tokio::fs::remove_file(&probe).await;
            }
            Err(e) => {
                return Err(RunError::invalid_target(
                    &shown,
                    format!("not writable: {}", e),
                ));
            }
        }

        let required = params.size_gb as u64 * 1024 * 1024 * 1024;
        let required_with_margin = required + required * FREE_SPACE_MARGIN_PERCENT / 100;
        match self.volumes.free_space_bytes(&canonical) {
            Some(available) if available >= required_with_margin => {}
            Some(available) => {
                return Err(RunError::insufficient_space(
                    &shown,
                    required_with_margin,
                    available,
                ));
            }
            None => {
                return Err(RunError::invalid_target(
                    &shown,
                    "could not determine the containing volume",
                ));
            }
        }

        Ok(canonical)
    }

    // -------------------------------------------------------------------
    // Completion
    // -------------------------------------------------------------------

    async fn handle_completion(&mut self, completion: RunCompletion) {
        let run_id = completion.run_id.clone();
        let record = match self.store.get(&run_id) {
            Some(record) => record.clone(),
            None => {
                warn!(run_id = %run_id, "completion for unknown run");
                return;
            }
        };

        if record.status.is_terminal() {
            // A user stop (or reconciliation) already finalized this run;
            // the late exit report carries nothing we still need.
            debug!(run_id = %run_id, status = %record.status, "ignoring completion for terminal run");
            if self.active.as_ref() == Some(&run_id) {
                self.active = None;
            }
            return;
        }

        let (status, error_message, summary) = match completion.outcome {
            ExitOutcome::Completed { exit_code: 0 } => {
                match self.parse_result(&completion) {
                    Ok(summary) => (RunStatus::Completed, None, Some(summary)),
                    Err(e) => (
                        RunStatus::Failed,
                        Some(format!("fio produced no usable result: {}", e)),
                        None,
                    ),
                }
            }
            ExitOutcome::Completed { exit_code } => (
                RunStatus::Failed,
                Some(format!("fio exited with status {}", exit_code)),
                None,
            ),
            ExitOutcome::TimedOut => (
                RunStatus::Timeout,
                Some("run exceeded the execution ceiling and was terminated".to_string()),
                None,
            ),
            ExitOutcome::Failed { reason } => (RunStatus::Failed, Some(reason), None),
        };

        self.finalize(
            &run_id,
            status,
            error_message,
            summary,
            Some(&completion.stream_capture),
        )
        .await;
    }

    /// Parse the primary result source, falling back to the captured
    /// stream when the output file is missing or unusable.
    fn parse_result(
        &self,
        completion: &RunCompletion,
    ) -> Result<volbench_results::ResultSummary, volbench_results::ParseError> {
        if let Some(payload) = &completion.result_payload {
            if let Ok(summary) = volbench_results::parse(payload) {
                return Ok(summary);
            }
            debug!(run_id = %completion.run_id, "output file unparsable, falling back to stream capture");
        }
        volbench_results::parse(&completion.stream_capture)
    }

    /// Apply a terminal transition and persist it.
    async fn finalize(
        &mut self,
        run_id: &RunId,
        status: RunStatus,
        error_message: Option<String>,
        summary: Option<volbench_results::ResultSummary>,
        raw_output: Option<&str>,
    ) {
        let Some(mut record) = self.store.get(run_id).cloned() else {
            return;
        };
        if let Some(raw) = raw_output {
            record.set_raw_output(raw);
        }
        match record.transition(status) {
            Ok(()) => {
                if error_message.is_some() {
                    record.error_message = error_message;
                }
                if summary.is_some() {
                    record.result_summary = summary;
                }
                info!(run_id = %run_id, status = %record.status, "run finalized");
                self.persist(record).await;
            }
            Err(e) => error!(run_id = %run_id, error = %e, "refusing invalid finalization"),
        }
        if self.active.as_ref() == Some(run_id) {
            self.active = None;
        }
    }

    // -------------------------------------------------------------------
    // Stop
    // -------------------------------------------------------------------

    async fn handle_stop(&mut self, run_id: &RunId) -> RunResult<()> {
        let record = match self.store.get(run_id) {
            Some(record) => record.clone(),
            None => return Err(RunError::not_found(run_id.as_str())),
        };

        if record.status.is_terminal() {
            // Idempotent: stopping a settled run changes nothing.
            return Ok(());
        }

        self.stop_record(record).await;
        Ok(())
    }

    async fn handle_stop_all(&mut self) -> usize {
        let mut candidates = self.store.active();
        candidates.extend(self.store.reconciliation_pending());

        let mut stopped = 0;
        for record in candidates {
            self.stop_record(record).await;
            stopped += 1;
        }
        stopped
    }

    /// Transition one non-terminal record to `stopped` and terminate its
    /// process group in the background.
    ///
    /// Safe under concurrent callers: the record goes terminal here, so a
    /// racing stop observes a terminal status and no-ops, and the group
    /// termination itself is idempotent.
    async fn stop_record(&mut self, mut record: RunRecord) {
        // A disconnected run has no supervise task in this process, so
        // nobody else will delete its scratch directory.
        let orphaned_scratch = (record.status == RunStatus::Disconnected)
            .then(|| record.scratch_dir.clone());

        if let Some(pid) = record.child_pid {
            // Group termination waits out the grace period; keep that off
            // the actor so status polls stay responsive.
            let launcher = Arc::clone(&self.launcher);
            tokio::spawn(async move {
                launcher.terminate(pid).await;
                if let Some(scratch) = orphaned_scratch {
                    if let Err(e) = tokio::fs::remove_dir_all(&scratch).await {
                        if e.kind() != std::io::ErrorKind::NotFound {
                            warn!(scratch = %scratch.display(), error = %e, "failed to clean scratch of disconnected run");
                        }
                    }
                }
            });
        }

        let run_id = record.run_id.clone();
        let stopped = record.transition(RunStatus::Stopped).is_ok()
            || record.transition(RunStatus::Failed).is_ok();
        if stopped {
            info!(run_id = %run_id, status = %record.status, "run stopped by request");
            self.persist(record).await;
        }
        if self.active.as_ref() == Some(&run_id) {
            self.active = None;
        }
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    fn snapshot_of(&self, run_id: &RunId) -> RunResult<RunSnapshot> {
        self.store
            .get(run_id)
            .map(|record| self.snapshot(record.clone()))
            .ok_or_else(|| RunError::not_found(run_id.as_str()))
    }

    fn current_snapshot(&self) -> Option<RunSnapshot> {
        if let Some(run_id) = &self.active {
            if let Some(record) = self.store.get(run_id) {
                return Some(self.snapshot(record.clone()));
            }
        }
        // Reconciliation leftovers are "the current run" until resolved.
        self.store
            .reconciliation_pending()
            .into_iter()
            .next()
            .map(|record| self.snapshot(record))
    }

    fn snapshot(&self, record: RunRecord) -> RunSnapshot {
        let progress = if record.status.is_active() {
            Some(estimate(
                record.started_at,
                Utc::now(),
                Duration::from_secs(record.estimated_duration_seconds),
                required_read_bw_kibps(record.pattern_id),
            ))
        } else {
            None
        };
        RunSnapshot { record, progress }
    }

    // -------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------

    /// Write-through with one retry. A store that stays broken costs us
    /// history, not correctness of the in-memory view, so it degrades to
    /// a warning.
    async fn persist(&mut self, record: RunRecord) {
        if let Err(first) = self.store.upsert(record.clone()).await {
            warn!(run_id = %record.run_id, error = %first, "state write failed, retrying");
            if let Err(second) = self.store.upsert(record.clone()).await {
                error!(run_id = %record.run_id, error = %second, "state write failed twice, continuing with in-memory state");
            }
        }
    }
}
