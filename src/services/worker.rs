//! Single background worker that processes queued jobs one at a time.
//!
//! Each job runs on its own spawned task which the loop awaits before
//! popping the next id, so processing stays strictly sequential while a
//! panic inside a stage is contained to that job. The job task holds the
//! run gate until it finishes, so a loop started after `stop` waits for a
//! job left running by the previous loop.

use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::Serialize;
use strum::Display;
use tokio::task::JoinHandle;

use crate::models::job::{JobId, JobStatus, JobUpdate};
use crate::services::pipeline::StageRunner;
use crate::services::queue::JobQueue;
use crate::services::registry::JobRegistry;

/// Observable state of the worker task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkerState {
    Running,
    Stopped,
}

pub struct Worker {
    queue: Arc<JobQueue>,
    registry: Arc<JobRegistry>,
    runner: Arc<StageRunner>,
    gate: Arc<tokio::sync::Mutex<()>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    pub fn new(queue: Arc<JobQueue>, registry: Arc<JobRegistry>, runner: Arc<StageRunner>) -> Self {
        Self {
            queue,
            registry,
            runner,
            gate: Arc::new(tokio::sync::Mutex::new(())),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the worker loop unless it is already running.
    ///
    /// Returns `true` if a new loop was started. Must be called from within
    /// a Tokio runtime.
    pub fn start(&self) -> bool {
        let mut handle = self.lock_handle();
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }

        let queue = Arc::clone(&self.queue);
        let registry = Arc::clone(&self.registry);
        let runner = Arc::clone(&self.runner);
        let gate = Arc::clone(&self.gate);
        *handle = Some(tokio::spawn(run_loop(queue, registry, runner, gate)));
        tracing::info!("Background worker started");
        true
    }

    pub fn state(&self) -> WorkerState {
        match self.lock_handle().as_ref() {
            Some(h) if !h.is_finished() => WorkerState::Running,
            _ => WorkerState::Stopped,
        }
    }

    /// Abort the loop.
    ///
    /// A job already handed to its task runs to completion, and a restarted
    /// loop does not pop the next id until that job is done.
    pub fn stop(&self) {
        if let Some(handle) = self.lock_handle().take() {
            handle.abort();
            tracing::info!("Background worker stopped");
        }
    }

    fn lock_handle(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_handle().take() {
            handle.abort();
        }
    }
}

async fn run_loop(
    queue: Arc<JobQueue>,
    registry: Arc<JobRegistry>,
    runner: Arc<StageRunner>,
    gate: Arc<tokio::sync::Mutex<()>>,
) {
    loop {
        let permit = Arc::clone(&gate).lock_owned().await;
        let Some(job_id) = queue.dequeue().await else {
            break;
        };

        let job = {
            let registry = Arc::clone(&registry);
            let runner = Arc::clone(&runner);
            tokio::spawn(async move {
                process_job(job_id, &registry, &runner).await;
                drop(permit);
            })
        };
        if let Err(e) = job.await {
            tracing::error!(job_id = %job_id, error = %e, "Job task did not finish");
        }
    }
    tracing::info!("Job queue closed, worker exiting");
}

async fn process_job(job_id: JobId, registry: &JobRegistry, runner: &Arc<StageRunner>) {
    tracing::info!(job_id = %job_id, "Processing job");
    let start = Instant::now();

    let task = {
        let runner = Arc::clone(runner);
        tokio::spawn(async move { runner.run(job_id).await })
    };

    let outcome = match task.await {
        Ok(Ok(status)) => Ok(status),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) if e.is_panic() => Err(format!(
            "job processing panicked: {}",
            panic_message(e.into_panic())
        )),
        Err(e) => Err(e.to_string()),
    };

    metrics::histogram!("flowchart_job_processing_seconds").record(start.elapsed().as_secs_f64());

    match outcome {
        Ok(JobStatus::Completed) => {
            metrics::counter!("flowchart_jobs_completed_total").increment(1);
        }
        Ok(status) => {
            metrics::counter!("flowchart_jobs_failed_total").increment(1);
            tracing::info!(job_id = %job_id, status = %status, "Job finished");
        }
        Err(message) => {
            metrics::counter!("flowchart_jobs_failed_total").increment(1);
            tracing::error!(job_id = %job_id, error = %message, "Unexpected error processing job");
            if let Err(e) = registry.update(job_id, JobUpdate::failed(message)).await {
                tracing::warn!(job_id = %job_id, error = %e, "Could not record job failure");
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
