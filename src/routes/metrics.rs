use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;

/// Register descriptions for the job engine's metrics.
pub fn describe() {
    metrics::describe_counter!(
        "flowchart_jobs_submitted_total",
        "Total flowchart jobs submitted"
    );
    metrics::describe_counter!(
        "flowchart_jobs_completed_total",
        "Total flowchart jobs completed"
    );
    metrics::describe_counter!(
        "flowchart_jobs_failed_total",
        "Total flowchart jobs that failed"
    );
    metrics::describe_counter!(
        "flowchart_validation_failed_total",
        "Completed jobs whose diagram did not pass validation"
    );
    metrics::describe_gauge!(
        "flowchart_queue_depth",
        "Current number of jobs waiting for the worker"
    );
    metrics::describe_histogram!(
        "flowchart_job_processing_seconds",
        "Time to run one job through all stages"
    );
}

/// GET /metrics — Prometheus text exposition format.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
