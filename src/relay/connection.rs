//! Push-channel connection handle owned by the registry

use axum::extract::ws::Message;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Outbound frames buffered per client before `send` starts waiting.
pub const OUTBOUND_BUFFER: usize = 32;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection identifier
pub type ConnectionId = u64;

/// Why a single delivery attempt failed. Never leaves the registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("connection closed")]
    Closed,

    #[error("send timed out after {0:?}")]
    TimedOut(Duration),
}

/// One live dashboard client.
///
/// Frames are handed to the connection's writer task through a bounded
/// queue; the writer owns the socket sink. When the writer exits, the queue
/// closes and every later `send` fails with [`DeliveryError::Closed`].
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    label: String,
    connected_at: chrono::DateTime<chrono::Utc>,
    tx: mpsc::Sender<Message>,
}

impl Connection {
    pub fn new(label: impl Into<String>, tx: mpsc::Sender<Message>) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            label: label.into(),
            connected_at: chrono::Utc::now(),
            tx,
        }
    }

    /// Create a connection together with the receiving end of its queue
    pub fn channel(label: impl Into<String>) -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        (Self::new(label, tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn connected_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.connected_at
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Queue a frame for this client, waiting for buffer space if needed
    pub async fn send(
        &self,
        message: Message,
        timeout: Option<Duration>,
    ) -> Result<(), DeliveryError> {
        let send = self.tx.send(message);

        let result = match timeout {
            Some(limit) => tokio::time::timeout(limit, send)
                .await
                .map_err(|_| DeliveryError::TimedOut(limit))?,
            None => send.await,
        };

        result.map_err(|_| DeliveryError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let (a, _rx_a) = Connection::channel("a");
        let (b, _rx_b) = Connection::channel("b");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.label(), "a");
    }

    #[test]
    fn test_connected_at_is_stamped_on_creation() {
        let before = chrono::Utc::now();
        let (conn, _rx) = Connection::channel("dashboard");
        assert!(conn.connected_at() >= before);
        assert!(conn.connected_at() <= chrono::Utc::now());
    }

    #[tokio::test]
    async fn test_send_reaches_receiver() {
        let (conn, mut rx) = Connection::channel("client");
        conn.send(Message::Text("hello".to_string()), None)
            .await
            .unwrap();

        assert!(matches!(rx.recv().await, Some(Message::Text(t)) if t == "hello"));
    }

    #[tokio::test]
    async fn test_send_after_writer_gone_is_closed() {
        let (conn, rx) = Connection::channel("gone");
        drop(rx);

        assert!(conn.is_closed());
        let err = conn
            .send(Message::Text("x".to_string()), None)
            .await
            .unwrap_err();
        assert_eq!(err, DeliveryError::Closed);
    }

    #[tokio::test]
    async fn test_send_times_out_when_buffer_full() {
        let (tx, _rx) = mpsc::channel(1);
        let conn = Connection::new("stalled", tx);
        conn.send(Message::Text("fills buffer".to_string()), None)
            .await
            .unwrap();

        let limit = Duration::from_millis(20);
        let err = conn
            .send(Message::Text("blocked".to_string()), Some(limit))
            .await
            .unwrap_err();
        assert_eq!(err, DeliveryError::TimedOut(limit));
    }
}
