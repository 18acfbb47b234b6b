//! HTTP API handlers using axum.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};
use volbench_common::{PatternId, RunError, RunId};
use volbench_results::analyze;
use volbench_runner::{discover_fio, PatternSpec};
use volbench_state::{RunRecord, RunStatus};
use volbench_supervisor::{RunRegistry, RunSnapshot, StartParams};

use crate::disks::SystemVolumes;
use crate::types::{
    DiskInfo, ErrorResponse, PatternInfo, RunView, StartRequest, StartResponse, StatusResponse,
    StopResponse,
};

/// Shared state handed to every handler.
pub struct AppState {
    pub registry: RunRegistry,
    /// Configured fio override, reported by `/api/status`.
    pub fio_override: Option<PathBuf>,
    pub started: Instant,
}

/// Creates the API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/status", get(status_handler))
        .route("/api/disks", get(disks_handler))
        .route("/api/patterns", get(patterns_handler))
        .route("/api/test/start", post(start_handler))
        .route("/api/test/current", get(current_handler))
        .route("/api/test/history", get(history_handler))
        .route("/api/test/stop-all", post(stop_all_handler))
        .route("/api/test/stop/:run_id", post(stop_handler))
        .route("/api/test/:run_id", get(run_handler))
        .with_state(state)
}

/// System and tool availability summary.
async fn status_handler(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, ApiError> {
    let fio = discover_fio(state.fio_override.as_deref());
    let active_run_id = state
        .registry
        .current()
        .await?
        .map(|snapshot| snapshot.record.run_id.to_string());

    Ok(Json(StatusResponse {
        fio_available: fio.is_ok(),
        fio_path: fio.ok().map(|p| p.display().to_string()),
        active_run_id,
        uptime_seconds: state.started.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

/// Candidate volumes for testing.
async fn disks_handler() -> Json<Vec<DiskInfo>> {
    Json(SystemVolumes::enumerate())
}

/// The fixed pattern registry, for frontend selection lists.
async fn patterns_handler() -> Json<Vec<PatternInfo>> {
    let patterns = PatternSpec::all()
        .iter()
        .map(|spec| PatternInfo {
            id: spec.id.to_string(),
            label: spec.label.to_string(),
            estimated_duration_seconds: spec.estimated_duration.as_secs(),
        })
        .collect();
    Json(patterns)
}

/// Admit and launch a new run.
///
/// Legacy pattern identifiers are resolved to their canonical form here,
/// at the boundary; the registry only ever sees canonical ids.
async fn start_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartRequest>,
) -> Result<Json<StartResponse>, ApiError> {
    let pattern = PatternId::resolve(&req.pattern_id)
        .ok_or_else(|| ApiError::from(RunError::unknown_pattern(&req.pattern_id)))?;

    info!(pattern = %pattern, disk = %req.disk_path, size_gb = req.size_gb, "start requested");

    let run_id = state
        .registry
        .start_run(StartParams {
            pattern,
            target_path: PathBuf::from(&req.disk_path),
            size_gb: req.size_gb,
        })
        .await?;

    Ok(Json(StartResponse {
        run_id: run_id.to_string(),
    }))
}

/// Snapshot of one run, with live progress while it is active and the
/// suitability verdict once it has completed.
async fn run_handler(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<RunView>, ApiError> {
    let snapshot = state.registry.status(&RunId::from(run_id)).await?;
    Ok(Json(annotate(snapshot)))
}

/// The single active run, if any.
///
/// Runs left `disconnected` or `unknown` by startup reconciliation
/// surface here so the frontend can offer an explicit cleanup action.
async fn current_handler(State(state): State<Arc<AppState>>) -> Result<Json<RunView>, ApiError> {
    match state.registry.current().await? {
        Some(snapshot) => Ok(Json(annotate(snapshot))),
        None => Err(ApiError::NotFound("no active run".to_string())),
    }
}

/// Terminal runs, newest first.
async fn history_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RunRecord>>, ApiError> {
    Ok(Json(state.registry.history().await?))
}

async fn stop_handler(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<StopResponse>, ApiError> {
    state.registry.stop(&RunId::from(run_id)).await?;
    Ok(Json(StopResponse { stopped: 1 }))
}

async fn stop_all_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StopResponse>, ApiError> {
    let stopped = state.registry.stop_all().await?;
    Ok(Json(StopResponse { stopped }))
}

/// Attach the suitability verdict to a completed run's snapshot.
fn annotate(snapshot: RunSnapshot) -> RunView {
    let verdict = match (&snapshot.record.status, &snapshot.record.result_summary) {
        (RunStatus::Completed, Some(summary)) => {
            Some(analyze(summary, snapshot.record.pattern_id))
        }
        _ => None,
    };
    RunView { snapshot, verdict }
}

/// API error type.
///
/// Admission rejections map to client-errors so the frontend can show
/// them immediately; everything else a poll can observe arrives as run
/// state, not as an HTTP error.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl From<RunError> for ApiError {
    fn from(err: RunError) -> Self {
        match &err {
            RunError::AlreadyRunning { .. } => ApiError::Conflict(err.to_string()),
            RunError::NotFound { .. } | RunError::UnknownPattern { .. } => {
                ApiError::NotFound(err.to_string())
            }
            RunError::InvalidTarget { .. }
            | RunError::InsufficientSpace { .. }
            | RunError::SizeOutOfRange { .. } => ApiError::BadRequest(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            error!("API error: {} - {}", status, message);
        } else {
            debug!("API rejection: {} - {}", status, message);
        }

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::path::Path as StdPath;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;
    use tokio::sync::mpsc;
    use tower::util::ServiceExt; // for `oneshot`
    use volbench_common::RunResult;
    use volbench_runner::{ExitOutcome, LaunchRequest, RunCompletion, RunLauncher};
    use volbench_supervisor::{RegistryConfig, VolumeCatalog};

    const GIB: u64 = 1024 * 1024 * 1024;

    /// Launcher that never touches the OS. With a payload configured it
    /// reports a successful completion as soon as the run is launched.
    struct TestLauncher {
        next_pid: AtomicU32,
        auto_complete_payload: Option<String>,
    }

    impl TestLauncher {
        fn pending() -> Arc<Self> {
            Arc::new(Self {
                next_pid: AtomicU32::new(7000),
                auto_complete_payload: None,
            })
        }

        fn completing(payload: &str) -> Arc<Self> {
            Arc::new(Self {
                next_pid: AtomicU32::new(7000),
                auto_complete_payload: Some(payload.to_string()),
            })
        }
    }

    #[async_trait]
    impl RunLauncher for TestLauncher {
        async fn launch(
            &self,
            request: LaunchRequest,
            completions: mpsc::Sender<RunCompletion>,
        ) -> RunResult<u32> {
            let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
            if let Some(payload) = &self.auto_complete_payload {
                let payload = payload.clone();
                tokio::spawn(async move {
                    let _ = completions
                        .send(RunCompletion {
                            run_id: request.run_id,
                            outcome: ExitOutcome::Completed { exit_code: 0 },
                            stream_capture: String::new(),
                            result_payload: Some(payload),
                        })
                        .await;
                });
            }
            Ok(pid)
        }

        async fn terminate(&self, _pid: u32) {}
    }

    struct FixedCatalog;

    impl VolumeCatalog for FixedCatalog {
        fn free_space_bytes(&self, _path: &StdPath) -> Option<u64> {
            Some(500 * GIB)
        }
    }

    struct Fixture {
        app: Router,
        target: PathBuf,
        _dir: TempDir,
    }

    async fn fixture(launcher: Arc<dyn RunLauncher>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        std::fs::create_dir(&target).unwrap();

        let registry = RunRegistry::start(RegistryConfig {
            store_path: dir.path().join("runs.json"),
            scratch_root: dir.path().join("scratch"),
            launcher,
            volumes: Arc::new(FixedCatalog),
        })
        .await
        .unwrap();

        let state = Arc::new(AppState {
            registry,
            fio_override: None,
            started: Instant::now(),
        });

        Fixture {
            app: create_router(state),
            target,
            _dir: dir,
        }
    }

    fn start_request(target: &StdPath, pattern_id: &str) -> Request<Body> {
        let body = serde_json::json!({
            "pattern_id": pattern_id,
            "disk_path": target.display().to_string(),
            "size_gb": 1,
        });
        Request::builder()
            .method("POST")
            .uri("/api/test/start")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let f = fixture(TestLauncher::pending()).await;

        let response = f
            .app
            .oneshot(
                Request::builder()
                    .uri("/api/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert!(body.get("fio_available").is_some());
        assert!(body.get("version").is_some());
    }

    #[tokio::test]
    async fn test_patterns_endpoint_lists_registry() {
        let f = fixture(TestLauncher::pending()).await;

        let response = f
            .app
            .oneshot(
                Request::builder()
                    .uri("/api/patterns")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let patterns = body.as_array().unwrap();
        assert_eq!(patterns.len(), PatternId::all().len());
        assert!(patterns.iter().any(|p| p["id"] == "quick"));
    }

    #[tokio::test]
    async fn test_disks_endpoint() {
        let f = fixture(TestLauncher::pending()).await;

        let response = f
            .app
            .oneshot(
                Request::builder()
                    .uri("/api/disks")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_start_and_poll_until_completed() {
        let payload = r#"{"jobs": [{"read": {"bw": 960000, "iops": 480}}]}"#;
        let f = fixture(TestLauncher::completing(payload)).await;

        let response = f
            .app
            .clone()
            .oneshot(start_request(&f.target, "quick"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let run_id = body_json(response).await["run_id"]
            .as_str()
            .unwrap()
            .to_string();

        // Poll until the auto-completion lands.
        for _ in 0..500 {
            let response = f
                .app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri(format!("/api/test/{}", run_id))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = body_json(response).await;
            if body["status"] == "completed" {
                assert!(body["result_summary"]["sequential_read_bw_kibps"].as_f64().unwrap() > 0.0);
                // Completed runs carry the suitability verdict.
                assert!(body["verdict"]["tier"].is_string());
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("run never completed");
    }

    #[tokio::test]
    async fn test_second_start_conflicts() {
        let f = fixture(TestLauncher::pending()).await;

        let first = f
            .app
            .clone()
            .oneshot(start_request(&f.target, "quick"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = f
            .app
            .clone()
            .oneshot(start_request(&f.target, "quick"))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        let body = body_json(second).await;
        assert!(body["error"].as_str().unwrap().contains("already running"));
    }

    #[tokio::test]
    async fn test_legacy_alias_is_accepted() {
        let f = fixture(TestLauncher::pending()).await;

        let response = f
            .app
            .clone()
            .oneshot(start_request(&f.target, "quicktest"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let current = f
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/test/current")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(current).await;
        assert_eq!(body["pattern_id"], "quick");
    }

    #[tokio::test]
    async fn test_unknown_pattern_is_rejected() {
        let f = fixture(TestLauncher::pending()).await;

        let response = f
            .app
            .oneshot(start_request(&f.target, "turbo-mode"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_size_is_bad_request() {
        let f = fixture(TestLauncher::pending()).await;

        let body = serde_json::json!({
            "pattern_id": "quick",
            "disk_path": f.target.display().to_string(),
            "size_gb": 5000,
        });
        let response = f
            .app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/test/start")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_current_is_404_when_idle() {
        let f = fixture(TestLauncher::pending()).await;

        let response = f
            .app
            .oneshot(
                Request::builder()
                    .uri("/api/test/current")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stop_and_stop_all() {
        let f = fixture(TestLauncher::pending()).await;

        let response = f
            .app
            .clone()
            .oneshot(start_request(&f.target, "quick"))
            .await
            .unwrap();
        let run_id = body_json(response).await["run_id"]
            .as_str()
            .unwrap()
            .to_string();

        let stop = f
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/test/stop/{}", run_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(stop.status(), StatusCode::OK);

        // Stop again: idempotent, still OK.
        let again = f
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/test/stop/{}", run_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(again.status(), StatusCode::OK);

        let all = f
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/test/stop-all")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(all.status(), StatusCode::OK);
        assert_eq!(body_json(all).await["stopped"], 0);
    }

    #[tokio::test]
    async fn test_unknown_run_is_404() {
        let f = fixture(TestLauncher::pending()).await;

        let response = f
            .app
            .oneshot(
                Request::builder()
                    .uri("/api/test/no-such-run")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_history_collects_terminal_runs() {
        let f = fixture(TestLauncher::pending()).await;

        let response = f
            .app
            .clone()
            .oneshot(start_request(&f.target, "quick"))
            .await
            .unwrap();
        let run_id = body_json(response).await["run_id"]
            .as_str()
            .unwrap()
            .to_string();

        f.app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/test/stop/{}", run_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let history = f
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/test/history")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(history.status(), StatusCode::OK);
        let body = body_json(history).await;
        let runs = body.as_array().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0]["status"], "stopped");
    }
}
