//! Live set of dashboard connections and broadcast fan-out
//!
//! Structural changes (add/remove) and snapshots go through one lock. Sends
//! happen after the snapshot guard is released, so a slow client can neither
//! block registry mutation nor delay delivery to its siblings.

use axum::extract::ws::Message;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::connection::{Connection, ConnectionId};

/// Default upper bound for one delivery attempt
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Aggregate outcome of one broadcast pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastSummary {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

pub struct ConnectionRegistry {
    connections: RwLock<Vec<Arc<Connection>>>,
    send_timeout: Option<Duration>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::with_send_timeout(Some(DEFAULT_SEND_TIMEOUT))
    }

    /// `None` lets a send wait indefinitely for a stalled client
    pub fn with_send_timeout(send_timeout: Option<Duration>) -> Self {
        Self {
            connections: RwLock::new(Vec::new()),
            send_timeout,
        }
    }

    /// Register a connection for future broadcasts
    pub async fn add(&self, connection: Arc<Connection>) {
        let mut connections = self.connections.write().await;
        if connections.iter().any(|c| c.id() == connection.id()) {
            tracing::debug!(connection_id = connection.id(), "Connection already registered");
            return;
        }

        tracing::info!(
            connection_id = connection.id(),
            client = connection.label(),
            "Client connected"
        );
        connections.push(connection);
    }

    /// Unregister a connection. Returns `true` only for the call that removed it.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        let mut connections = self.connections.write().await;
        match connections.iter().position(|c| c.id() == id) {
            Some(index) => {
                let connection = connections.remove(index);
                let connected_for = chrono::Utc::now() - connection.connected_at();
                tracing::info!(
                    connection_id = id,
                    client = connection.label(),
                    connected_secs = connected_for.num_seconds(),
                    "Client disconnected"
                );
                true
            },
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Labels of registered clients, in registration order
    pub async fn labels(&self) -> Vec<String> {
        self.snapshot()
            .await
            .iter()
            .map(|c| c.label().to_string())
            .collect()
    }

    async fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.read().await.clone()
    }

    /// Send a text frame to every connection registered at call time.
    ///
    /// All sends run concurrently and are joined before returning. A failed
    /// send is logged and counted; it never cancels the others and does not
    /// unregister the connection.
    pub async fn broadcast(&self, text: &str) -> BroadcastSummary {
        let targets = self.snapshot().await;
        if targets.is_empty() {
            tracing::debug!("No active WebSocket connections to broadcast to");
            return BroadcastSummary::default();
        }

        let timeout = self.send_timeout;
        let sends = targets.iter().map(|connection| async move {
            let result = connection
                .send(Message::Text(text.to_string()), timeout)
                .await;
            (connection, result)
        });

        let mut summary = BroadcastSummary {
            attempted: targets.len(),
            ..Default::default()
        };
        for (connection, result) in join_all(sends).await {
            match result {
                Ok(()) => summary.delivered += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(
                        connection_id = connection.id(),
                        client = connection.label(),
                        error = %e,
                        "Error sending to client"
                    );
                },
            }
        }

        summary
    }
}
