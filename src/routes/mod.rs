use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

pub mod health;
pub mod jobs;
pub mod metrics;
pub mod ws;

/// Health, job and WebSocket routes bound to the shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/live", get(health::live))
        .route("/api/jobs", post(jobs::create_job).get(jobs::list_jobs))
        .route("/api/jobs/{job_id}", get(jobs::get_job))
        .route("/ws/jobs/{job_id}", get(ws::job_updates))
        .with_state(state)
}
