// WebSocket lifecycle for dashboard clients
// Greets the client, registers it for broadcasts, and unregisters it when the
// socket closes or fails.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use super::connection::{Connection, DeliveryError};
use super::models::WelcomeMessage;
use super::server::AppState;

/// Handle dashboard WebSocket upgrades on `/ws`
pub async fn handle_ws(
    ws: WebSocketUpgrade,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let label = connect_info
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    ws.on_upgrade(move |socket| handle_socket(socket, state, label))
}

async fn handle_socket(socket: WebSocket, state: AppState, label: String) {
    let (mut sender, mut receiver) = socket.split();

    // Welcome goes straight to the socket, before the client is registered
    let welcome = match serde_json::to_string(&WelcomeMessage::default()) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(client = %label, error = %e, "Failed to encode welcome message");
            return;
        },
    };
    if let Err(e) = sender.send(Message::Text(welcome)).await {
        tracing::debug!(client = %label, error = %e, "Client left before welcome");
        return;
    }

    let (connection, mut rx) = Connection::channel(label.clone());
    let connection = Arc::new(connection);
    let connection_id = connection.id();
    state.registry.add(connection.clone()).await;

    // Forward queued frames to the socket
    let send_label = label.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = sender.send(msg).await {
                tracing::debug!(client = %send_label, error = %e, "WebSocket write failed");
                break;
            }
        }
    });

    let mut heartbeat_task = tokio::spawn(heartbeat(connection, state.heartbeat_interval));

    // Client messages are logged only
    let recv_label = label.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = receiver.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    tracing::debug!(client = %recv_label, "Received from client: {}", text);
                },
                Ok(Message::Binary(data)) => {
                    tracing::debug!(client = %recv_label, bytes = data.len(), "Received binary frame");
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {},
                Err(e) => {
                    tracing::warn!(client = %recv_label, error = %e, "WebSocket error");
                    break;
                },
            }
        }
    });

    // Wait for any task to finish
    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
            heartbeat_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
            heartbeat_task.abort();
        }
        _ = (&mut heartbeat_task) => {
            send_task.abort();
            recv_task.abort();
        }
    }

    state.registry.remove(connection_id).await;
}

/// Periodic ping through the connection's own queue. Ends once the writer is gone.
async fn heartbeat(connection: Arc<Connection>, interval: Option<Duration>) {
    let Some(period) = interval else {
        return std::future::pending::<()>().await;
    };

    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match connection.send(Message::Ping(Vec::new()), Some(period)).await {
            Ok(()) => tracing::trace!(client = connection.label(), "Sent heartbeat ping"),
            Err(DeliveryError::Closed) => break,
            Err(e) => {
                tracing::warn!(client = connection.label(), error = %e, "Heartbeat not sent");
            },
        }
    }
}
