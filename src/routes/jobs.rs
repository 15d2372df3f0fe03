use axum::extract::{Path, State};
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::models::api::{CreateJobRequest, JobDetailResponse, JobSummaryResponse};
use crate::models::job::JobId;

/// POST /api/jobs — submit C code; processing happens in the background.
pub async fn create_job(
    State(state): State<AppState>,
    Json(payload): Json<CreateJobRequest>,
) -> AppResult<Json<JobSummaryResponse>> {
    if let Err(report) = payload.validate_with(&state.limits) {
        let message = report
            .iter()
            .next()
            .map(|(_, error)| error.message().to_string())
            .unwrap_or_else(|| report.to_string());
        return Err(AppError::BadRequest(message));
    }

    let job = state.jobs.submit(payload.code).await?;
    Ok(Json(JobSummaryResponse::from(&job)))
}

/// GET /api/jobs — summaries of every job, oldest first.
pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobSummaryResponse>> {
    let jobs = state.jobs.list().await;
    Json(jobs.iter().map(JobSummaryResponse::from).collect())
}

/// GET /api/jobs/{job_id} — full detail including generated flowcharts.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<JobDetailResponse>> {
    let job = state.jobs.get(parse_job_id(&job_id)?).await?;
    Ok(Json(JobDetailResponse::from(&job)))
}

pub(crate) fn parse_job_id(raw: &str) -> AppResult<JobId> {
    raw.parse().map_err(|_| AppError::UnknownJob(raw.to_string()))
}
