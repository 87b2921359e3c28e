// SPDX-FileCopyrightText: 2026 Intervo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket handler for the realtime channel.
//!
//! Client -> Server (JSON):
//! ```json
//! {"action": "join", "session_id": "..."}
//! {"action": "leave", "session_id": "..."}
//! ```
//!
//! Server -> Client: event envelopes as produced by the bus,
//! `{"type": ..., "payload": {...}, "session_id": ..., "server_time": ...}`,
//! starting with a `snapshot` for each joined session. One connection may
//! join any number of sessions; delivery stays ordered per session.

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use intervo_core::types::SessionId;

use crate::server::GatewayState;

/// Client -> server control message.
#[derive(Debug, Deserialize)]
struct WsCommand {
    action: WsAction,
    session_id: String,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
enum WsAction {
    Join,
    Leave,
}

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<GatewayState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Drive one WebSocket connection.
///
/// A sender task serializes all outbound traffic; each joined session gets a
/// forwarder task draining its bus subscription into the shared sender.
async fn handle_socket(socket: WebSocket, state: GatewayState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::channel::<String>(64);
    let sender_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    let mut joined: HashMap<String, JoinHandle<()>> = HashMap::new();

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => {
                let command: WsCommand = match serde_json::from_str(&text) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!("invalid WebSocket message: {e}");
                        let _ = tx
                            .send(
                                serde_json::json!({
                                    "type": "error",
                                    "payload": {"error": format!("invalid message: {e}")}
                                })
                                .to_string(),
                            )
                            .await;
                        continue;
                    }
                };

                match command.action {
                    WsAction::Join => {
                        if joined.contains_key(&command.session_id) {
                            continue;
                        }
                        let session_id = SessionId(command.session_id.clone());
                        match state.orchestrator.subscribe(&session_id).await {
                            Ok(mut subscription) => {
                                let tx = tx.clone();
                                let handle = tokio::spawn(async move {
                                    while let Some(envelope) = subscription.recv().await {
                                        let Ok(json) = serde_json::to_string(&envelope) else {
                                            continue;
                                        };
                                        if tx.send(json).await.is_err() {
                                            break;
                                        }
                                    }
                                });
                                joined.insert(command.session_id, handle);
                            }
                            Err(e) => {
                                let _ = tx
                                    .send(
                                        serde_json::json!({
                                            "type": "error",
                                            "session_id": command.session_id,
                                            "payload": {"error": e.to_string()}
                                        })
                                        .to_string(),
                                    )
                                    .await;
                            }
                        }
                    }
                    WsAction::Leave => {
                        if let Some(handle) = joined.remove(&command.session_id) {
                            handle.abort();
                        }
                    }
                }
            }
            Message::Close(_) => break,
            _ => {} // Binary, ping, pong: handled by the protocol layer.
        }
    }

    for handle in joined.into_values() {
        handle.abort();
    }
    sender_task.abort();
}
