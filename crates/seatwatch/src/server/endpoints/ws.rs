use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::broadcast::Broadcaster;
use crate::types::AppState;

/// GET /ws
/// Upgrades to a WebSocket that receives every broadcast event
pub async fn get_ws(ws: WebSocketUpgrade, State(s): State<Arc<AppState>>) -> impl IntoResponse {
    info!("GET /ws");
    let broadcaster = s.broadcaster.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, broadcaster))
}

async fn handle_socket(socket: WebSocket, broadcaster: Broadcaster) {
    let mut rx = broadcaster.subscribe();
    info!("Client connected, total clients: {}", broadcaster.client_count());

    let (mut sink, mut stream) = socket.split();

    let send_task = tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Client lagged, {skipped} events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let text = match event.to_json() {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to encode broadcast event: {e}");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                debug!("Client sink closed");
                break;
            }
        }
    });

    // Inbound messages are ignored; the loop only watches for disconnects.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("WebSocket receive error: {e}");
                break;
            }
        }
    }

    send_task.abort();
    info!("Client disconnected");
}
