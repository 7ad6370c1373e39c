use axum::extract::ws::Message;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::relay::connection::Connection;
use crate::relay::registry::ConnectionRegistry;

/// Register a fresh connection and hand back the receiving end of its queue
pub async fn registered(
    registry: &ConnectionRegistry,
    label: &str,
) -> (Arc<Connection>, mpsc::Receiver<Message>) {
    let (connection, rx) = Connection::channel(label);
    let connection = Arc::new(connection);
    registry.add(connection.clone()).await;
    (connection, rx)
}

/// Next queued frame as text, failing the test if none arrives promptly
pub async fn expect_text(rx: &mut mpsc::Receiver<Message>) -> String {
    match tokio::time::timeout(Duration::from_secs(1), rx.recv()).await {
        Ok(Some(Message::Text(text))) => text,
        Ok(Some(other)) => panic!("expected text frame, got {:?}", other),
        Ok(None) => panic!("connection queue closed"),
        Err(_) => panic!("no frame received within 1s"),
    }
}
