use std::sync::Arc;

use crate::models::job::{Job, JobError, JobId};
use crate::services::queue::{JobQueue, QueueError};
use crate::services::registry::JobRegistry;

/// Submission side of the engine: register a job and queue it for the worker.
pub struct JobService {
    registry: Arc<JobRegistry>,
    queue: Arc<JobQueue>,
}

impl JobService {
    pub fn new(registry: Arc<JobRegistry>, queue: Arc<JobQueue>) -> Self {
        Self { registry, queue }
    }

    /// Create a job and enqueue it. The returned snapshot is always `Submitted`.
    pub async fn submit(&self, input: String) -> Result<Job, QueueError> {
        let job = self.registry.create(input).await;
        self.queue.enqueue(job.id)?;
        metrics::counter!("flowchart_jobs_submitted_total").increment(1);
        tracing::info!(job_id = %job.id, bytes = job.input.len(), "Job submitted");
        Ok(job)
    }

    pub async fn get(&self, id: JobId) -> Result<Job, JobError> {
        self.registry.get(id).await
    }

    pub async fn list(&self) -> Vec<Job> {
        self.registry.list().await
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.queue_depth()
    }
}
