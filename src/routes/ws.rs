use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Serialize;

use crate::app_state::AppState;
use crate::models::api::JobEvent;
use crate::models::job::Job;
use crate::routes::jobs::parse_job_id;

/// Close code sent when the requested job does not exist.
const CLOSE_JOB_NOT_FOUND: u16 = 4004;

/// GET /ws/jobs/{job_id} — push a snapshot of the job on every change.
pub async fn job_updates(
    ws: WebSocketUpgrade,
    Path(job_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, job_id, state))
}

/// Serve one subscriber connection.
///
/// Subscribes before reading the current record so no update falls in
/// between, then forwards only snapshots newer than the one sent first.
async fn handle_socket(mut socket: WebSocket, raw_id: String, state: AppState) {
    let Ok(job_id) = parse_job_id(&raw_id) else {
        close_not_found(&mut socket).await;
        return;
    };

    let (observer, mut rx) = state.hub.watch(job_id);
    let job = match state.jobs.get(job_id).await {
        Ok(job) => job,
        Err(_) => {
            state.hub.unsubscribe(job_id, observer);
            close_not_found(&mut socket).await;
            return;
        }
    };
    tracing::info!(job_id = %job_id, "Job subscriber connected");

    let (mut sink, mut stream) = socket.split();
    let mut last_seen = job.updated_at;

    let mut send_task = tokio::spawn(async move {
        if send_job(&mut sink, &job).await.is_err() {
            return;
        }
        while let Some(snapshot) = rx.recv().await {
            if snapshot.updated_at <= last_seen {
                continue;
            }
            last_seen = snapshot.updated_at;
            if send_job(&mut sink, &snapshot).await.is_err() {
                tracing::debug!(job_id = %snapshot.id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Server-to-client only; inbound frames just keep the connection open.
    let receive = async {
        while let Some(result) = stream.next().await {
            match result {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(job_id = %job_id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    };

    // Either side ending closes the connection.
    tokio::select! {
        _ = receive => {}
        _ = &mut send_task => {}
    }

    state.hub.unsubscribe(job_id, observer);
    send_task.abort();
    tracing::info!(job_id = %job_id, "Job subscriber disconnected");
}

async fn send_job(sink: &mut SplitSink<WebSocket, Message>, job: &Job) -> Result<(), axum::Error> {
    let message = text_message(&JobEvent::update(job)).inspect_err(|e| {
        tracing::error!(job_id = %job.id, error = %e, "Failed to serialize job update");
    })?;
    sink.send(message).await
}

/// Encode an event as a text frame. A serialization failure ends the
/// connection instead of silently skipping the snapshot.
fn text_message<T: Serialize>(event: &T) -> Result<Message, axum::Error> {
    let payload = serde_json::to_string(event).map_err(axum::Error::new)?;
    Ok(Message::Text(payload.into()))
}

async fn close_not_found(socket: &mut WebSocket) {
    let frame = CloseFrame {
        code: CLOSE_JOB_NOT_FOUND,
        reason: "Job not found".into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}
