//! Commands sent from the registry handle to the actor.

use tokio::sync::oneshot;
use volbench_common::{RunId, RunResult};
use volbench_state::RunRecord;

use crate::types::{RunSnapshot, StartParams};

pub(crate) enum RegistryCommand {
    Start {
        params: StartParams,
        resp: oneshot::Sender<RunResult<RunId>>,
    },
    Status {
        run_id: RunId,
        resp: oneshot::Sender<RunResult<RunSnapshot>>,
    },
    Current {
        resp: oneshot::Sender<Option<RunSnapshot>>,
    },
    History {
        resp: oneshot::Sender<Vec<RunRecord>>,
    },
    Stop {
        run_id: RunId,
        resp: oneshot::Sender<RunResult<()>>,
    },
    StopAll {
        resp: oneshot::Sender<usize>,
    },
    Reap {
        resp: oneshot::Sender<usize>,
    },
}
