//! Stub collaborators and polling helpers shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use flowchart_jobs::app_state::AppState;
use flowchart_jobs::config::AppConfig;
use flowchart_jobs::models::job::{Job, JobId};
use flowchart_jobs::services::generator::{FlowchartGenerator, GenerationError};
use flowchart_jobs::services::jobs::JobService;
use flowchart_jobs::services::validator::DiagramValidator;
use tokio::sync::Semaphore;
use tokio::time::sleep;

/// Generator that always answers with the same text
pub struct FixedGenerator(pub String);

#[async_trait]
impl FlowchartGenerator for FixedGenerator {
    async fn generate(&self, _code: &str) -> Result<String, GenerationError> {
        Ok(self.0.clone())
    }
}

/// Generator that always fails with the given message
pub struct FailingGenerator(pub String);

#[async_trait]
impl FlowchartGenerator for FailingGenerator {
    async fn generate(&self, _code: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Other(self.0.clone()))
    }
}

/// Generator that records every input it is asked about
#[derive(Default)]
pub struct RecordingGenerator {
    pub calls: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FlowchartGenerator for RecordingGenerator {
    async fn generate(&self, code: &str) -> Result<String, GenerationError> {
        self.calls.lock().unwrap().push(code.to_string());
        Ok("flowchart TD\nA-->B".to_string())
    }
}

/// Generator that panics when the input equals `trigger`
pub struct PanickingGenerator {
    pub trigger: String,
}

#[async_trait]
impl FlowchartGenerator for PanickingGenerator {
    async fn generate(&self, code: &str) -> Result<String, GenerationError> {
        if code == self.trigger {
            panic!("generator exploded");
        }
        Ok("flowchart TD\nA-->B".to_string())
    }
}

/// Generator that holds every call until `release` is called, tracking how
/// many calls are in flight at once
pub struct GatedGenerator {
    permits: Semaphore,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for GatedGenerator {
    fn default() -> Self {
        Self {
            permits: Semaphore::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

impl GatedGenerator {
    pub fn release(&self, calls: usize) {
        self.permits.add_permits(calls);
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FlowchartGenerator for GatedGenerator {
    async fn generate(&self, _code: &str) -> Result<String, GenerationError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let acquired = self.permits.acquire().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        acquired
            .map_err(|e| GenerationError::Other(e.to_string()))?
            .forget();
        Ok("flowchart TD\nA-->B".to_string())
    }
}

/// Validator with a fixed verdict
pub struct FixedValidator(pub bool);

#[async_trait]
impl DiagramValidator for FixedValidator {
    async fn validate(&self, _text: &str) -> bool {
        self.0
    }
}

/// Build application state around the given collaborators (worker not started)
pub fn test_state(
    generator: Arc<dyn FlowchartGenerator>,
    validator: Arc<dyn DiagramValidator>,
) -> AppState {
    let config = AppConfig::from_pairs([("MAX_CODE_BYTES", "4096")]).unwrap();
    AppState::new(&config, generator, validator)
}

/// Poll a job until it reaches a terminal status (with timeout)
pub async fn wait_for_terminal(jobs: &JobService, id: JobId) -> Job {
    for _ in 0..500 {
        let job = jobs.get(id).await.expect("job should exist");
        if job.status.is_terminal() {
            return job;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("Job {id} did not finish within 5 seconds");
}
