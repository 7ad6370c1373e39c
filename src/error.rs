use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    /// Webhook body is not a JSON object. The client's fault.
    #[error("Invalid JSON payload: {0}")]
    InvalidPayload(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Error body returned to HTTP callers
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(detail: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            code: code.into(),
        }
    }
}

impl RelayError {
    pub fn to_error_code(&self) -> &'static str {
        match self {
            RelayError::InvalidPayload(_) => "INVALID_PAYLOAD",
            _ => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing body. Internal causes stay in the log.
    pub fn to_error_response(&self) -> ErrorResponse {
        let detail = match self {
            RelayError::InvalidPayload(_) => "Invalid JSON payload",
            _ => "Internal server error",
        };
        ErrorResponse::new(detail, self.to_error_code())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match &self {
            RelayError::InvalidPayload(reason) => {
                tracing::warn!(reason = %reason, "Rejected webhook payload");
            },
            other => {
                tracing::error!(error = %other, "Webhook processing failed");
            },
        }

        (self.status_code(), Json(self.to_error_response())).into_response()
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
