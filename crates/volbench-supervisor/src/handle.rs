//! Public handle for the run registry.
//!
//! A lightweight clone-able handle; every method sends a command to the
//! actor and awaits its oneshot response.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use volbench_common::{RunError, RunId, RunResult};
use volbench_state::{RunRecord, RunStore};

use crate::actor::RegistryActor;
use crate::commands::RegistryCommand;
use crate::types::{RegistryConfig, RunSnapshot, StartParams};

/// Command channel depth between handles and the actor. Status polls are
/// cheap and frequent; this only ever backs up if the actor is wedged.
const COMMAND_QUEUE_CAPACITY: usize = 64;

/// Completion channel depth. At most one run is ever in flight.
const COMPLETION_QUEUE_CAPACITY: usize = 16;

/// Handle to the run registry actor.
#[derive(Clone)]
pub struct RunRegistry {
    cmd_tx: mpsc::Sender<RegistryCommand>,
}

impl RunRegistry {
    /// Open the persisted store, reconcile it against live processes, and
    /// spawn the registry actor.
    pub async fn start(config: RegistryConfig) -> RunResult<RunRegistry> {
        let store = RunStore::open(&config.store_path).await;

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let (completion_tx, completion_rx) = mpsc::channel(COMPLETION_QUEUE_CAPACITY);

        let mut actor = RegistryActor::new(
            store,
            Arc::clone(&config.launcher),
            Arc::clone(&config.volumes),
            config.scratch_root.clone(),
            completion_tx,
        );
        // Reconciliation runs to completion before any command can be
        // observed, so callers never see pre-recovery state.
        actor.reconcile().await;

        tokio::spawn(actor.run(cmd_rx, completion_rx));

        Ok(RunRegistry { cmd_tx })
    }

    fn unavailable(context: &str) -> RunError {
        RunError::internal(format!("{}: registry unavailable (channel closed)", context))
    }

    fn dropped(context: &str) -> RunError {
        RunError::internal(format!("{}: registry dropped response", context))
    }

    /// Admit and launch a new run. Returns the run id as soon as the run
    /// is admitted; launch and execution outcomes are observed via
    /// [`RunRegistry::status`].
    pub async fn start_run(&self, params: StartParams) -> RunResult<RunId> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(RegistryCommand::Start { params, resp: tx })
            .await
            .map_err(|_| Self::unavailable("start"))?;
        rx.await.map_err(|_| Self::dropped("start"))?
    }

    /// Snapshot one run, with live progress while it is active.
    pub async fn status(&self, run_id: &RunId) -> RunResult<RunSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(RegistryCommand::Status {
                run_id: run_id.clone(),
                resp: tx,
            })
            .await
            .map_err(|_| Self::unavailable("status"))?;
        rx.await.map_err(|_| Self::dropped("status"))?
    }

    /// The single active run, or a reconciliation leftover awaiting
    /// explicit cleanup, if any.
    pub async fn current(&self) -> RunResult<Option<RunSnapshot>> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(RegistryCommand::Current { resp: tx })
            .await
            .map_err(|_| Self::unavailable("current"))?;
        rx.await.map_err(|_| Self::dropped("current"))
    }

    /// Terminal runs, newest first.
    pub async fn history(&self) -> RunResult<Vec<RunRecord>> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(RegistryCommand::History { resp: tx })
            .await
            .map_err(|_| Self::unavailable("history"))?;
        rx.await.map_err(|_| Self::dropped("history"))
    }

    /// Stop a run. A no-op (not an error) when the run is already
    /// terminal; `NotFound` when the id is unknown.
    pub async fn stop(&self, run_id: &RunId) -> RunResult<()> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(RegistryCommand::Stop {
                run_id: run_id.clone(),
                resp: tx,
            })
            .await
            .map_err(|_| Self::unavailable("stop"))?;
        rx.await.map_err(|_| Self::dropped("stop"))?
    }

    /// Stop every non-terminal run. Returns how many were stopped.
    pub async fn stop_all(&self) -> RunResult<usize> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(RegistryCommand::StopAll { resp: tx })
            .await
            .map_err(|_| Self::unavailable("stop_all"))?;
        rx.await.map_err(|_| Self::dropped("stop_all"))
    }

    /// Scan for and terminate orphaned fio processes. Returns the count
    /// of orphans signaled.
    pub async fn reap(&self) -> RunResult<usize> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(RegistryCommand::Reap { resp: tx })
            .await
            .map_err(|_| Self::unavailable("reap"))?;
        rx.await.map_err(|_| Self::dropped("reap"))
    }
}
