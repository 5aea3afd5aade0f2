//! `WebSocket` endpoint for interactive sessions.
//!
//! Each connection registers a session with the hub, then runs two halves:
//! a writer draining the session's outbox into the socket, and a reader
//! forwarding text frames to the hub. When either half ends the other is
//! stopped and the session is removed.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` session.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_session(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let hub = state.hub.clone();
    let (id, mut outbox) = match hub.connect().await {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "Rejecting WebSocket session");
            return;
        }
    };
    debug!(session = %id, "WebSocket session opened");

    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = outbox.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                debug!(session = %id, "WebSocket send failed");
                return;
            }
        }
        // The hub dropped this session or is shutting down.
        if let Err(e) = sink.send(Message::Close(None)).await {
            debug!(session = %id, error = %e, "WebSocket close failed");
        }
    });

    let reader_hub = hub.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    if reader_hub.client_message(id, text).await.is_err() {
                        return;
                    }
                }
                Ok(Message::Close(_)) => return,
                Err(e) => {
                    debug!(session = %id, error = %e, "WebSocket error");
                    return;
                }
                // Pings are answered by axum; binary frames are not part
                // of the protocol.
                Ok(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    if hub.disconnect(id).await.is_err() {
        debug!(session = %id, "Hub already stopped");
    }
    debug!(session = %id, "WebSocket session closed");
}
