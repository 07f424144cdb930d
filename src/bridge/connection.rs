//! Per-connection WebSocket handling

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::host::{HostCommand, HostEvent};

use super::BridgeState;

/// Pump one shim connection until it closes.
pub async fn handle_socket(socket: WebSocket, state: Arc<BridgeState>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!("Browser shim connected: {conn_id}");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<HostCommand>();
    state.register(conn_id.clone(), tx).await;

    let writer = tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            let payload = match serde_json::to_string(&command) {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::error!("Failed to encode host command: {err}");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = ws_rx.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<HostEvent>(text.as_str()) {
                Ok(event) => state.forward_event(event),
                Err(err) => {
                    tracing::debug!("Ignoring malformed host event: {err}");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                tracing::debug!("Connection {conn_id} errored: {err}");
                break;
            }
        }
    }

    state.unregister(&conn_id).await;
    writer.abort();
    tracing::info!("Browser shim disconnected: {conn_id}");
}
