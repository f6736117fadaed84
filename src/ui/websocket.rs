//! WebSocket handler for real-time snapshot streaming

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::monitor::SoundLevelMonitor;
use crate::protocol::{ClientCommand, ServerMessage};
use crate::ui::server::AppState;

/// WebSocket upgrade handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut snapshots = state.monitor.subscribe();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Push the current snapshot, then every change, plus command replies
    let mut send_task = tokio::spawn(async move {
        let snapshot = snapshots.borrow_and_update().clone();
        let initial = ServerMessage::Status(snapshot);
        if send_json(&mut sender, &initial).await.is_err() {
            return;
        }

        loop {
            let msg = tokio::select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = snapshots.borrow_and_update().clone();
                    ServerMessage::Status(snapshot)
                }
                reply = reply_rx.recv() => match reply {
                    Some(reply) => reply,
                    None => break,
                },
            };

            if send_json(&mut sender, &msg).await.is_err() {
                break;
            }
        }
    });

    let monitor = state.monitor.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(command) => {
                        if let Some(reply) = handle_command(command, &monitor).await {
                            if reply_tx.send(reply).is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = reply_tx.send(ServerMessage::Error {
                            message: format!("Invalid command: {}", e),
                        });
                    }
                },
                Message::Close(_) => break,
                // Pong is handled automatically by axum; binary is not supported
                _ => {}
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }
}

async fn send_json(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json)).await,
        Err(e) => {
            tracing::warn!("Failed to encode message: {}", e);
            Ok(())
        }
    }
}

/// Apply an observer command. State changes reach the client through the
/// snapshot stream, so only failures and explicit queries produce a reply.
async fn handle_command(
    command: ClientCommand,
    monitor: &Arc<SoundLevelMonitor>,
) -> Option<ServerMessage> {
    let monitor = monitor.clone();
    let result = tokio::task::spawn_blocking(move || match command {
        ClientCommand::Start => monitor.start().err().map(|e| ServerMessage::Error {
            message: e.to_string(),
        }),
        ClientCommand::Stop => {
            monitor.stop();
            None
        }
        ClientCommand::SetPermission { granted } => {
            monitor.check_permission(granted);
            None
        }
        ClientCommand::GetStatus => Some(ServerMessage::Status(monitor.snapshot())),
    })
    .await;

    match result {
        Ok(reply) => reply,
        Err(e) => Some(ServerMessage::Error {
            message: e.to_string(),
        }),
    }
}
