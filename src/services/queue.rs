use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{mpsc, Mutex};

use crate::models::job::JobId;

/// Unbounded FIFO of job ids between submission and the worker.
///
/// Holds both ends of the channel, so the queue stays usable across worker
/// restarts: the receiver is shared behind a lock and only one consumer
/// pops at a time.
pub struct JobQueue {
    sender: mpsc::UnboundedSender<JobId>,
    receiver: Mutex<mpsc::UnboundedReceiver<JobId>>,
    depth: AtomicUsize,
}

impl JobQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            depth: AtomicUsize::new(0),
        }
    }

    /// Push a job id to the tail of the queue. Never blocks.
    pub fn enqueue(&self, job_id: JobId) -> Result<(), QueueError> {
        // Count before sending: a consumer may pop the id before we return.
        let depth = self.depth.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        if self.sender.send(job_id).is_err() {
            self.decrement();
            return Err(QueueError::Closed);
        }
        metrics::gauge!("flowchart_queue_depth").set(depth as f64);
        tracing::debug!(job_id = %job_id, depth, "Job enqueued");
        Ok(())
    }

    /// Wait for the next job id.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn dequeue(&self) -> Option<JobId> {
        let job_id = self.receiver.lock().await.recv().await?;
        let depth = self.decrement();
        metrics::gauge!("flowchart_queue_depth").set(depth as f64);
        Some(job_id)
    }

    /// Decrease the depth without going below zero; returns the new depth.
    fn decrement(&self) -> usize {
        let previous = self
            .depth
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |d| Some(d.saturating_sub(1)))
            .unwrap_or_else(|d| d);
        previous.saturating_sub(1)
    }

    /// Current number of queued, not yet dequeued, job ids.
    pub fn queue_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Job queue is closed")]
    Closed,
}
