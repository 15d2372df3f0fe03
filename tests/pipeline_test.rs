//! Job lifecycle tests: worker, stage runner, registry and notification hub
//! wired together exactly as the server wires them, with stub collaborators.

mod helpers;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use flowchart_jobs::models::job::{FunctionResult, JobStatus};
use flowchart_jobs::services::notify::JobSnapshot;
use helpers::*;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::timeout;

async fn next_snapshot(rx: &mut mpsc::UnboundedReceiver<JobSnapshot>) -> JobSnapshot {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a snapshot")
        .expect("observer channel closed")
}

#[tokio::test]
async fn test_end_to_end_flowchart_scenario() {
    let state = test_state(
        Arc::new(FixedGenerator("```mermaid\nflowchart TD\nA-->B\n```".to_string())),
        Arc::new(FixedValidator(true)),
    );
    state.worker.start();

    let job = state
        .jobs
        .submit("int main(){return 0;}".to_string())
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Submitted);

    let done = wait_for_terminal(&state.jobs, job.id).await;

    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(
        done.results,
        vec![FunctionResult {
            name: "flowchart".to_string(),
            mermaid: "flowchart TD\nA-->B".to_string(),
            validated: true,
            error: None,
        }]
    );
    assert_eq!(done.total_units, 1);
    assert_eq!(done.processed_units, 1);
    assert!(done.error.is_none());
    assert_eq!(done.input, "int main(){return 0;}");
}

#[tokio::test]
async fn test_invalid_diagram_completes_with_flagged_result() {
    let state = test_state(
        Arc::new(FixedGenerator("flowchart TD\nA-->".to_string())),
        Arc::new(FixedValidator(false)),
    );
    state.worker.start();

    let job = state.jobs.submit("int x;".to_string()).await.unwrap();
    let done = wait_for_terminal(&state.jobs, job.id).await;

    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.results.len(), 1);
    assert!(!done.results[0].validated);
    assert!(done.results[0].error.is_some());
    assert!(done.error.is_none());
}

#[tokio::test]
async fn test_generation_failure_fails_job() {
    let state = test_state(
        Arc::new(FailingGenerator("LLM call failed: timeout".to_string())),
        Arc::new(FixedValidator(true)),
    );
    state.worker.start();

    let job = state.jobs.submit("int x;".to_string()).await.unwrap();
    let done = wait_for_terminal(&state.jobs, job.id).await;

    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(done.error.as_deref(), Some("LLM call failed: timeout"));
    assert!(done.results.is_empty());
}

#[tokio::test]
async fn test_submissions_get_unique_ids() {
    let state = test_state(
        Arc::new(RecordingGenerator::default()),
        Arc::new(FixedValidator(true)),
    );

    let mut ids = HashSet::new();
    for i in 0..50 {
        let job = state.jobs.submit(format!("int v{i};")).await.unwrap();
        assert_eq!(job.status, JobStatus::Submitted);
        assert!(ids.insert(job.id));
    }
    assert_eq!(state.jobs.list().await.len(), 50);
    assert_eq!(state.jobs.queue_depth(), 50);
}

#[tokio::test]
async fn test_get_unknown_job_is_not_found() {
    let state = test_state(
        Arc::new(RecordingGenerator::default()),
        Arc::new(FixedValidator(true)),
    );
    assert!(state.jobs.get(uuid::Uuid::new_v4()).await.is_err());
}

#[tokio::test]
async fn test_jobs_processed_in_submission_order() {
    let state = test_state(
        Arc::new(RecordingGenerator::default()),
        Arc::new(FixedValidator(true)),
    );

    // One channel shared by all observers gives a single global order.
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut submitted = Vec::new();
    for i in 0..5 {
        let job = state.jobs.submit(format!("int job{i};")).await.unwrap();
        state.hub.subscribe(job.id, tx.clone());
        submitted.push(job);
    }

    state.worker.start();

    let mut processing_order = Vec::new();
    let mut last_update = HashMap::new();
    let mut completed = 0;
    while completed < submitted.len() {
        let snapshot = next_snapshot(&mut rx).await;

        let previous = last_update
            .insert(snapshot.id, snapshot.updated_at)
            .unwrap_or(submitted.iter().find(|j| j.id == snapshot.id).unwrap().updated_at);
        assert!(snapshot.updated_at > previous, "updated_at must advance");

        match snapshot.status {
            JobStatus::Processing => processing_order.push(snapshot.id),
            JobStatus::Completed => completed += 1,
            _ => {}
        }
    }

    let expected: Vec<_> = submitted.iter().map(|j| j.id).collect();
    assert_eq!(processing_order, expected);
}

#[tokio::test]
async fn test_stage_transitions_are_published_per_job() {
    let state = test_state(
        Arc::new(RecordingGenerator::default()),
        Arc::new(FixedValidator(true)),
    );
    let job = state.jobs.submit("int x;".to_string()).await.unwrap();
    let (_, mut rx) = state.hub.watch(job.id);
    state.worker.start();

    let mut statuses = Vec::new();
    loop {
        let snapshot = next_snapshot(&mut rx).await;
        statuses.push(snapshot.status);
        if snapshot.status.is_terminal() {
            break;
        }
    }

    assert_eq!(
        statuses,
        [
            JobStatus::Processing,
            JobStatus::Generating,
            JobStatus::Validating,
            JobStatus::Completed,
        ]
    );
}

#[tokio::test]
async fn test_panicking_stage_does_not_stop_worker() {
    let state = test_state(
        Arc::new(PanickingGenerator {
            trigger: "boom".to_string(),
        }),
        Arc::new(FixedValidator(true)),
    );
    state.worker.start();

    let bad = state.jobs.submit("boom".to_string()).await.unwrap();
    let good = state.jobs.submit("int ok;".to_string()).await.unwrap();

    let bad = wait_for_terminal(&state.jobs, bad.id).await;
    assert_eq!(bad.status, JobStatus::Failed);
    let error = bad.error.unwrap();
    assert!(error.contains("panicked"), "unexpected error: {error}");
    assert!(error.contains("generator exploded"));

    let good = wait_for_terminal(&state.jobs, good.id).await;
    assert_eq!(good.status, JobStatus::Completed);
    assert_eq!(state.worker.state().to_string(), "running");
}

#[tokio::test]
async fn test_broken_observers_do_not_block_other_jobs() {
    let state = test_state(
        Arc::new(RecordingGenerator::default()),
        Arc::new(FixedValidator(true)),
    );

    let job_a = state.jobs.submit("int a;".to_string()).await.unwrap();
    let job_b = state.jobs.submit("int b;".to_string()).await.unwrap();

    // A disconnected observer and one that never reads, both on job A.
    let (_, dead) = state.hub.watch(job_a.id);
    drop(dead);
    let (_, _never_read) = state.hub.watch(job_a.id);
    let (_, mut rx_b) = state.hub.watch(job_b.id);

    state.worker.start();

    loop {
        if next_snapshot(&mut rx_b).await.status == JobStatus::Completed {
            break;
        }
    }

    let a = wait_for_terminal(&state.jobs, job_a.id).await;
    assert_eq!(a.status, JobStatus::Completed);
    assert_eq!(state.hub.observer_count(job_a.id), 1);
}

#[tokio::test]
async fn test_unsubscribed_observer_gets_nothing_further() {
    let state = test_state(
        Arc::new(RecordingGenerator::default()),
        Arc::new(FixedValidator(true)),
    );
    let job = state.jobs.submit("int x;".to_string()).await.unwrap();

    let (observer, mut rx) = state.hub.watch(job.id);
    assert!(state.hub.unsubscribe(job.id, observer));

    state.worker.start();
    wait_for_terminal(&state.jobs, job.id).await;

    assert!(matches!(rx.try_recv(), Err(TryRecvError::Disconnected)));
}

#[tokio::test]
async fn test_starting_worker_twice_processes_each_job_once() {
    let generator = Arc::new(RecordingGenerator::default());
    let state = test_state(generator.clone(), Arc::new(FixedValidator(true)));

    assert!(state.worker.start());
    assert!(!state.worker.start());

    let first = state.jobs.submit("int first;".to_string()).await.unwrap();
    let second = state.jobs.submit("int second;".to_string()).await.unwrap();
    wait_for_terminal(&state.jobs, first.id).await;
    wait_for_terminal(&state.jobs, second.id).await;

    assert_eq!(generator.calls(), ["int first;", "int second;"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_restarted_worker_waits_for_running_job() {
    let generator = Arc::new(GatedGenerator::default());
    let state = test_state(generator.clone(), Arc::new(FixedValidator(true)));

    let first = state.jobs.submit("int first;".to_string()).await.unwrap();
    let (_, mut rx) = state.hub.watch(first.id);
    state.worker.start();
    while next_snapshot(&mut rx).await.status != JobStatus::Generating {}

    state.worker.stop();
    assert!(state.worker.start());
    let second = state.jobs.submit("int second;".to_string()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        state.jobs.get(second.id).await.unwrap().status,
        JobStatus::Submitted,
        "second job started while the first was still running"
    );

    generator.release(2);
    assert_eq!(wait_for_terminal(&state.jobs, first.id).await.status, JobStatus::Completed);
    assert_eq!(wait_for_terminal(&state.jobs, second.id).await.status, JobStatus::Completed);
    assert_eq!(generator.max_in_flight(), 1);
}
