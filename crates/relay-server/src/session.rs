//! One avatar connection: strictly sequential request handling with a
//! recorder attached for the lifetime of the socket.

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use dashmap::DashMap;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use relay_core::{ConnectionId, SessionId};
use relay_rules::RuleEngine;
use relay_trace::{Direction, SessionRecording, TraceError};
use tracing::{debug, error, info, warn};

use crate::server::AppState;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("trace write failed: {0}")]
    Trace(#[from] TraceError),

    #[error("socket send failed: {0}")]
    Send(#[from] axum::Error),
}

/// Removes the connection from the live-session map however the task ends.
struct Registration {
    sessions: Arc<DashMap<ConnectionId, SessionId>>,
    connection_id: ConnectionId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let _ = self.sessions.remove(&self.connection_id);
    }
}

/// Serve one WebSocket until the client leaves or a fault occurs.
///
/// Each text frame is recorded, answered by the rule engine, and the answer
/// recorded after it is sent. The recording is finalized exactly once on
/// every exit path.
pub async fn run_session(socket: WebSocket, state: AppState) {
    let connection_id = ConnectionId::new();
    let mut recording = match state.recorder.start() {
        Ok(recording) => recording,
        Err(e) => {
            error!(connection_id = %connection_id, error = %e, "failed to start recording");
            return;
        }
    };
    let session_id = recording.session_id().clone();

    let _ = state.sessions.insert(connection_id.clone(), session_id.clone());
    let _registration = Registration {
        sessions: Arc::clone(&state.sessions),
        connection_id: connection_id.clone(),
    };
    info!(connection_id = %connection_id, session_id = %session_id, "session started");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut heartbeat = tokio::time::interval(state.heartbeat_interval);
    heartbeat.tick().await; // consume first immediate tick

    loop {
        tokio::select! {
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        let handled =
                            handle_text(&state.engine, &mut recording, &mut ws_tx, text.as_str()).await;
                        if let Err(e) = handled {
                            error!(session_id = %session_id, error = %e, "terminating session");
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Binary(bytes))) => {
                        warn!(session_id = %session_id, len = bytes.len(), "ignoring binary frame");
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        debug!(session_id = %session_id, "client closed");
                        break;
                    }
                    Some(Ok(_)) => {} // ping/pong; axum answers pings itself
                    Some(Err(e)) => {
                        warn!(session_id = %session_id, error = %e, "socket error");
                        break;
                    }
                }
            }
            _ = heartbeat.tick() => {
                if ws_tx.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
                tracing::trace!(session_id = %session_id, "sent ping");
            }
        }
    }

    let entries = recording.entries().len();
    match recording.stop() {
        Ok(Some(path)) => info!(session_id = %session_id, entries, report = ?path, "session finished"),
        Ok(None) => info!(session_id = %session_id, entries, "session finished"),
        Err(e) => error!(session_id = %session_id, error = %e, "failed to finalize session"),
    }
}

async fn handle_text(
    engine: &RuleEngine,
    recording: &mut SessionRecording,
    ws_tx: &mut SplitSink<WebSocket, WsMessage>,
    raw: &str,
) -> Result<(), SessionError> {
    recording.record(Direction::Received, raw)?;

    let Some(reply) = engine.handle_raw(raw) else {
        return Ok(());
    };
    ws_tx.send(WsMessage::Text(reply.clone().into())).await?;
    recording.record(Direction::Sent, &reply)?;
    Ok(())
}
