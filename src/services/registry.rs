use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::models::job::{Job, JobError, JobId, JobUpdate};
use crate::services::notify::NotificationHub;

/// In-memory store of every job for the lifetime of the process.
///
/// All access goes through a single lock held only for map work; every
/// accepted update is published to the notification hub before the lock
/// is released, so observers see one job's snapshots in mutation order.
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, Job>>,
    hub: Arc<NotificationHub>,
}

impl JobRegistry {
    pub fn new(hub: Arc<NotificationHub>) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            hub,
        }
    }

    /// Insert a new job in `Submitted` state and return a snapshot.
    pub async fn create(&self, input: String) -> Job {
        let job = Job::new(input);
        self.jobs.lock().await.insert(job.id, job.clone());
        tracing::debug!(job_id = %job.id, "Job created");
        job
    }

    pub async fn get(&self, id: JobId) -> Result<Job, JobError> {
        self.jobs
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or(JobError::NotFound(id))
    }

    /// Snapshot of all jobs, oldest first.
    pub async fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.lock().await.values().cloned().collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    /// Apply a partial update atomically and publish the result.
    ///
    /// Returns `Ok(None)` for an unknown id: updates racing a job that is
    /// no longer tracked are ignored.
    pub async fn update(&self, id: JobId, update: JobUpdate) -> Result<Option<Job>, JobError> {
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs.get_mut(&id) else {
            tracing::debug!(job_id = %id, "Ignoring update for unknown job");
            return Ok(None);
        };

        job.apply(update)?;
        let snapshot = job.clone();
        self.hub.publish(Arc::new(snapshot.clone()));
        Ok(Some(snapshot))
    }
}
