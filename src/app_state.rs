use std::sync::Arc;

use crate::config::AppConfig;
use crate::models::api::SubmitLimits;
use crate::services::{
    generator::FlowchartGenerator,
    jobs::JobService,
    notify::NotificationHub,
    pipeline::StageRunner,
    queue::JobQueue,
    registry::JobRegistry,
    validator::DiagramValidator,
    worker::Worker,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobService>,
    pub hub: Arc<NotificationHub>,
    pub worker: Arc<Worker>,
    pub limits: Arc<SubmitLimits>,
}

impl AppState {
    /// Wire hub, registry, queue, runner and worker together.
    ///
    /// The worker is not started; call `worker.start()` once the runtime
    /// is up.
    pub fn new(
        config: &AppConfig,
        generator: Arc<dyn FlowchartGenerator>,
        validator: Arc<dyn DiagramValidator>,
    ) -> Self {
        let hub = Arc::new(NotificationHub::new());
        let registry = Arc::new(JobRegistry::new(Arc::clone(&hub)));
        let queue = Arc::new(JobQueue::new());
        let runner = Arc::new(StageRunner::new(Arc::clone(&registry), generator, validator));
        let worker = Arc::new(Worker::new(Arc::clone(&queue), Arc::clone(&registry), runner));

        Self {
            jobs: Arc::new(JobService::new(registry, queue)),
            hub,
            worker,
            limits: Arc::new(SubmitLimits {
                max_code_bytes: config.max_code_bytes,
            }),
        }
    }
}
