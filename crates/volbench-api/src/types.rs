//! Request and response bodies for the HTTP API.

use serde::{Deserialize, Serialize};
use volbench_results::Verdict;
use volbench_supervisor::RunSnapshot;

/// `GET /api/status`
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub fio_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fio_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_run_id: Option<String>,
    pub uptime_seconds: u64,
    pub version: String,
}

/// One mounted volume, as offered to the frontend for selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskInfo {
    pub path: String,
    pub name: String,
    pub free_space_bytes: u64,
    pub total_space_bytes: u64,
}

/// `POST /api/test/start`
#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub pattern_id: String,
    pub disk_path: String,
    pub size_gb: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartResponse {
    pub run_id: String,
}

/// `POST /api/test/stop/{run_id}` and `stop-all`
#[derive(Debug, Serialize, Deserialize)]
pub struct StopResponse {
    pub stopped: usize,
}

/// One entry of `GET /api/patterns`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PatternInfo {
    pub id: String,
    pub label: String,
    pub estimated_duration_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// One run as reported over the API: the registry snapshot plus the
/// suitability verdict once the run has completed.
#[derive(Debug, Serialize)]
pub struct RunView {
    #[serde(flatten)]
    pub snapshot: RunSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
}
