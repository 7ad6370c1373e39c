use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frames pushed to dashboard clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    /// A decoded uplink payload from The Things Network
    TtnData { payload: Value },
}

impl Envelope {
    pub fn ttn_data(payload: Value) -> Self {
        Envelope::TtnData { payload }
    }
}

/// Greeting sent once, right after the push channel opens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeMessage {
    pub message: String,
}

impl Default for WelcomeMessage {
    fn default() -> Self {
        Self {
            message: "Welcome to the WebSocket server!".to_string(),
        }
    }
}

/// Acknowledgement returned to the webhook sender
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: String,
    pub data_broadcasted: bool,
}

impl WebhookResponse {
    pub fn broadcasted() -> Self {
        Self {
            status: "Webhook received successfully".to_string(),
            data_broadcasted: true,
        }
    }

    pub fn no_payload() -> Self {
        Self {
            status: "Webhook received, but no relevant decoded payload found".to_string(),
            data_broadcasted: false,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub connections: usize,
    /// Peer addresses of connected dashboards
    pub clients: Vec<String>,
}
