use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::models::job::JobError;
use crate::services::queue::QueueError;

/// Error type for HTTP handlers, rendered as `{ "error", "code" }` JSON.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Identifier that cannot name any job (malformed).
    #[error("Job {0} not found")]
    UnknownJob(String),

    #[error("{0}")]
    BadRequest(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Job(JobError::NotFound(_)) | AppError::UnknownJob(_) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", "Job not found".to_string())
            }
            AppError::Job(e @ JobError::InvalidTransition { .. }) => {
                tracing::error!(error = %e, "Invalid job transition");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Queue(e) => {
                tracing::error!(error = %e, "Failed to enqueue job");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
