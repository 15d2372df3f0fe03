//! Drives one job through the stage sequence.
//!
//! Every transition goes through [`JobRegistry::update`], so each stage is
//! observable on its own while the job is in flight.

use std::sync::Arc;

use crate::models::job::{FunctionResult, JobError, JobId, JobStatus, JobUpdate};
use crate::services::generator::{self, FlowchartGenerator};
use crate::services::registry::JobRegistry;
use crate::services::validator::DiagramValidator;

pub struct StageRunner {
    registry: Arc<JobRegistry>,
    generator: Arc<dyn FlowchartGenerator>,
    validator: Arc<dyn DiagramValidator>,
}

impl StageRunner {
    pub fn new(
        registry: Arc<JobRegistry>,
        generator: Arc<dyn FlowchartGenerator>,
        validator: Arc<dyn DiagramValidator>,
    ) -> Self {
        Self {
            registry,
            generator,
            validator,
        }
    }

    /// Run all stages for a job and return the terminal status.
    ///
    /// A generator failure is recorded as `Failed` and is not an error
    /// here; `Err` means the orchestration itself broke and the caller is
    /// responsible for recording it.
    pub async fn run(&self, job_id: JobId) -> Result<JobStatus, PipelineError> {
        let job = self.registry.get(job_id).await?;

        self.transition(job_id, JobUpdate::status(JobStatus::Processing).with_total_units(1))
            .await?;
        self.transition(job_id, JobUpdate::status(JobStatus::Generating))
            .await?;

        tracing::info!(job_id = %job_id, "Generating flowchart");
        let raw = match self.generator.generate(&job.input).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Flowchart generation failed");
                self.transition(job_id, JobUpdate::failed(e.to_string()))
                    .await?;
                return Ok(JobStatus::Failed);
            }
        };
        let mermaid = generator::normalize(&raw);

        self.transition(job_id, JobUpdate::status(JobStatus::Validating))
            .await?;

        tracing::info!(job_id = %job_id, "Validating Mermaid syntax");
        let validated = self.validator.validate(&mermaid).await;
        if !validated {
            metrics::counter!("flowchart_validation_failed_total").increment(1);
        }

        self.transition(
            job_id,
            JobUpdate::status(JobStatus::Completed)
                .with_result(FunctionResult::flowchart(mermaid, validated))
                .with_processed_units(1),
        )
        .await?;

        tracing::info!(job_id = %job_id, validated, "Job completed");
        Ok(JobStatus::Completed)
    }

    async fn transition(&self, job_id: JobId, update: JobUpdate) -> Result<(), PipelineError> {
        let status = update.status;
        self.registry.update(job_id, update).await?;
        if let Some(status) = status {
            tracing::debug!(job_id = %job_id, status = %status, "Job transitioned");
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Job(#[from] JobError),
}
