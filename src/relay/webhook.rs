//! The Things Network webhook ingress
//!
//! Pulls `uplink_message.decoded_payload` out of an uplink event and fans it
//! out to every dashboard client as a `ttn_data` envelope.

use axum::{body::Bytes, extract::State, response::Json};
use serde_json::{Map, Value};

use super::models::{Envelope, WebhookResponse};
use super::registry::{BroadcastSummary, ConnectionRegistry};
use super::server::AppState;
use crate::error::{RelayError, Result};

/// What happened to an accepted webhook event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Broadcasted(BroadcastSummary),
    /// Accepted, but there was nothing to forward
    NoRelevantPayload,
}

impl WebhookOutcome {
    pub fn data_broadcasted(&self) -> bool {
        matches!(self, WebhookOutcome::Broadcasted(_))
    }
}

/// `uplink_message.decoded_payload`, if present and not null.
///
/// An empty object is a valid payload. An `uplink_message` that exists but is
/// not an object (including `null`) cannot be navigated and is an internal
/// fault, not an empty event.
pub fn extract_decoded_payload(mut event: Map<String, Value>) -> Result<Option<Value>> {
    match event.remove("uplink_message") {
        None => Ok(None),
        Some(Value::Object(mut uplink)) => {
            Ok(uplink.remove("decoded_payload").filter(|v| !v.is_null()))
        },
        Some(other) => Err(RelayError::Internal(format!(
            "uplink_message is not an object: {}",
            other
        ))),
    }
}

/// Accept one raw webhook body and broadcast its decoded payload
pub async fn handle_webhook(registry: &ConnectionRegistry, body: &[u8]) -> Result<WebhookOutcome> {
    let event: Value =
        serde_json::from_slice(body).map_err(|e| RelayError::InvalidPayload(e.to_string()))?;
    tracing::debug!(event = %event, "TTN webhook received");

    let Value::Object(event) = event else {
        return Err(RelayError::InvalidPayload(
            "expected a JSON object at the top level".to_string(),
        ));
    };

    let Some(payload) = extract_decoded_payload(event)? else {
        tracing::info!("No decoded payload found or payload is null");
        return Ok(WebhookOutcome::NoRelevantPayload);
    };

    let text = serde_json::to_string(&Envelope::ttn_data(payload))?;
    let summary = registry.broadcast(&text).await;
    tracing::info!(
        attempted = summary.attempted,
        delivered = summary.delivered,
        failed = summary.failed,
        "Broadcast decoded payload"
    );

    Ok(WebhookOutcome::Broadcasted(summary))
}

/// `POST /webhook/ttn`
pub async fn ttn_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> std::result::Result<Json<WebhookResponse>, RelayError> {
    let response = match handle_webhook(&state.registry, &body).await? {
        WebhookOutcome::Broadcasted(_) => WebhookResponse::broadcasted(),
        WebhookOutcome::NoRelevantPayload => WebhookResponse::no_payload(),
    };

    Ok(Json(response))
}
