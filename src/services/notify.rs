//! Per-job fan-out of job snapshots to subscribed observers.
//!
//! Each observer is the sending half of an unbounded channel; the task that
//! owns the receiving half (usually a WebSocket connection) does the actual
//! delivery. Publishing therefore never awaits observer code and never
//! blocks the registry that triggers it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::models::job::{Job, JobId};

/// Immutable copy of a job record, cheap to hand to many observers.
pub type JobSnapshot = Arc<Job>;

/// Channel sender half for pushing snapshots to one observer.
pub type ObserverTx = mpsc::UnboundedSender<JobSnapshot>;

/// Handle identifying one subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Observers grouped by the job they watch.
///
/// Thread-safe via an interior lock that is independent of the registry's
/// lock; designed to be wrapped in `Arc` and shared.
#[derive(Default)]
pub struct NotificationHub {
    observers: Mutex<HashMap<JobId, HashMap<ObserverId, ObserverTx>>>,
    next_id: AtomicU64,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for one job.
    ///
    /// The caller is responsible for sending the initial snapshot.
    pub fn subscribe(&self, job_id: JobId, observer: ObserverTx) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().entry(job_id).or_default().insert(id, observer);
        tracing::debug!(job_id = %job_id, observer = id.0, "Observer subscribed");
        id
    }

    /// Convenience wrapper that creates the channel and subscribes its sender.
    pub fn watch(&self, job_id: JobId) -> (ObserverId, mpsc::UnboundedReceiver<JobSnapshot>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (self.subscribe(job_id, tx), rx)
    }

    /// Remove an observer. Returns whether it was registered.
    ///
    /// Once this returns, no later `publish` reaches the observer.
    pub fn unsubscribe(&self, job_id: JobId, observer: ObserverId) -> bool {
        let mut observers = self.lock();
        let Some(set) = observers.get_mut(&job_id) else {
            return false;
        };
        let removed = set.remove(&observer).is_some();
        if set.is_empty() {
            observers.remove(&job_id);
        }
        if removed {
            tracing::debug!(job_id = %job_id, observer = observer.0, "Observer unsubscribed");
        }
        removed
    }

    /// Hand a snapshot to every observer of the job.
    ///
    /// Observers whose receiving side is gone are treated as disconnected
    /// and dropped; the remaining observers still get the snapshot.
    /// Returns the number of observers the snapshot was handed to.
    pub fn publish(&self, job: JobSnapshot) -> usize {
        let mut observers = self.lock();
        let Some(set) = observers.get_mut(&job.id) else {
            return 0;
        };

        let before = set.len();
        set.retain(|_, tx| tx.send(Arc::clone(&job)).is_ok());
        let delivered = set.len();

        if delivered < before {
            tracing::debug!(
                job_id = %job.id,
                dropped = before - delivered,
                "Pruned disconnected observers"
            );
        }
        if set.is_empty() {
            observers.remove(&job.id);
        }
        delivered
    }

    /// Number of observers currently watching a job.
    pub fn observer_count(&self, job_id: JobId) -> usize {
        self.lock().get(&job_id).map_or(0, HashMap::len)
    }

    // Sends cannot panic while the lock is held, so a poisoned lock still
    // guards a consistent map.
    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, HashMap<ObserverId, ObserverTx>>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
