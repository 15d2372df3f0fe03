use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::models::job::{FunctionResult, Job, JobId, JobStatus};

/// Limits applied to submitted source code.
#[derive(Debug, Clone)]
pub struct SubmitLimits {
    pub max_code_bytes: usize,
}

/// Request to create a flowchart job (POST /api/jobs).
#[derive(Debug, Deserialize, Validate)]
#[garde(context(SubmitLimits))]
pub struct CreateJobRequest {
    #[garde(custom(code_within_limits))]
    pub code: String,
}

fn code_within_limits(value: &str, limits: &SubmitLimits) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("Code is required"));
    }
    if value.len() > limits.max_code_bytes {
        return Err(garde::Error::new(format!(
            "Code exceeds {} bytes",
            limits.max_code_bytes
        )));
    }
    Ok(())
}

/// Job summary for list endpoints. No source code or results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummaryResponse {
    pub id: JobId,
    pub status: JobStatus,
    pub total_functions: u32,
    pub processed_functions: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full job detail including code and generated flowcharts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetailResponse {
    #[serde(flatten)]
    pub summary: JobSummaryResponse,
    pub code: String,
    pub error: Option<String>,
    pub functions: Vec<FunctionResult>,
}

impl From<&Job> for JobSummaryResponse {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            status: job.status,
            total_functions: job.total_units,
            processed_functions: job.processed_units,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

impl From<&Job> for JobDetailResponse {
    fn from(job: &Job) -> Self {
        Self {
            summary: JobSummaryResponse::from(job),
            code: job.input.clone(),
            error: job.error.clone(),
            functions: job.results.clone(),
        }
    }
}

/// Message pushed to WebSocket subscribers on every job mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    JobUpdate { job: JobDetailResponse },
}

impl JobEvent {
    pub fn update(job: &Job) -> Self {
        JobEvent::JobUpdate {
            job: JobDetailResponse::from(job),
        }
    }
}
