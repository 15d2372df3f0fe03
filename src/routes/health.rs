use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::services::worker::WorkerState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub worker: WorkerState,
    pub queue_depth: usize,
}

#[derive(Serialize)]
pub struct LiveResponse {
    pub status: &'static str,
}

/// GET /health — liveness plus worker and backlog status.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        worker: state.worker.state(),
        queue_depth: state.jobs.queue_depth(),
    })
}

/// GET /live — liveness check that touches no state.
pub async fn live() -> Json<LiveResponse> {
    Json(LiveResponse { status: "live" })
}
