use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::{Html, IntoResponse, Json},
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use super::models::HealthResponse;
use super::registry::{ConnectionRegistry, DEFAULT_SEND_TIMEOUT};
use super::{webhook, websocket};
use crate::error::ErrorResponse;

/// Default WebSocket heartbeat period
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Relay server state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
    pub static_dir: PathBuf,
    pub heartbeat_interval: Option<Duration>,
}

impl AppState {
    pub fn new(registry: Arc<ConnectionRegistry>, static_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            static_dir: static_dir.into(),
            heartbeat_interval: Some(DEFAULT_HEARTBEAT_INTERVAL),
        }
    }

    pub fn with_heartbeat(mut self, interval: Option<Duration>) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}

/// Settings for one relay server instance
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
    /// Upper bound for one delivery attempt; `None` waits indefinitely
    pub send_timeout: Option<Duration>,
    /// WebSocket ping period; `None` disables heartbeats
    pub heartbeat_interval: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            static_dir: PathBuf::from("static"),
            send_timeout: Some(DEFAULT_SEND_TIMEOUT),
            heartbeat_interval: Some(DEFAULT_HEARTBEAT_INTERVAL),
        }
    }
}

/// Relay server instance
pub struct RelayServer {
    config: ServerConfig,
}

impl RelayServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Bind and run until Ctrl-C / SIGTERM
    pub async fn run(self) -> Result<()> {
        let registry = Arc::new(ConnectionRegistry::with_send_timeout(
            self.config.send_timeout,
        ));
        let state = AppState::new(registry, self.config.static_dir.clone())
            .with_heartbeat(self.config.heartbeat_interval);

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;

        tracing::info!("Relay server listening on {}", addr);
        tracing::info!("Static files: {}", self.config.static_dir.display());

        serve(listener, state, shutdown_signal()).await
    }
}

/// Serve the relay on an already-bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .context("Server error")?;

    tracing::info!("Relay server stopped");
    Ok(())
}

/// Create the Axum router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let static_service = ServeDir::new(&state.static_dir);

    Router::new()
        .route("/", get(serve_index))
        .route("/health", get(health_handler))
        .route("/webhook/ttn", post(webhook::ttn_webhook))
        .route("/ws", get(websocket::handle_ws))
        .nest_service("/static", static_service)
        .fallback(not_found_handler)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Serve the dashboard's index.html
async fn serve_index(State(state): State<AppState>) -> impl IntoResponse {
    let path = state.static_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => Html(content).into_response(),
        Err(e) => {
            tracing::warn!("Cannot read {}: {}", path.display(), e);
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("index.html not found", "NOT_FOUND")),
            )
                .into_response()
        },
    }
}

/// Health check handler
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let clients = state.registry.labels().await;
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "ttn-relay".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connections: clients.len(),
        clients,
    })
}

/// 404 Not Found handler
async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("Not found", "NOT_FOUND")),
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{expect_text, registered};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    fn test_state(static_dir: &std::path::Path) -> AppState {
        AppState::new(Arc::new(ConnectionRegistry::new()), static_dir).with_heartbeat(None)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn webhook_request(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/webhook/ttn")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_webhook_with_payload() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let (_conn, mut rx) = registered(&state.registry, "dashboard").await;
        let app = create_router(state);

        let response = app
            .oneshot(webhook_request(
                r#"{"uplink_message":{"decoded_payload":{"temp":21.5}}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"status": "Webhook received successfully", "data_broadcasted": true})
        );
        let frame: Value = serde_json::from_str(&expect_text(&mut rx).await).unwrap();
        assert_eq!(frame, json!({"type": "ttn_data", "payload": {"temp": 21.5}}));
    }

    #[tokio::test]
    async fn test_webhook_without_payload() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(test_state(dir.path()));

        let response = app
            .oneshot(webhook_request(r#"{"uplink_message":{}}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data_broadcasted"], json!(false));
    }

    #[tokio::test]
    async fn test_webhook_malformed_json_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let (_conn, mut rx) = registered(&state.registry, "dashboard").await;
        let app = create_router(state);

        let response = app.oneshot(webhook_request("not json")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["detail"], json!("Invalid JSON payload"));
        assert_eq!(body["code"], json!("INVALID_PAYLOAD"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_webhook_non_object_uplink_is_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(test_state(dir.path()));

        let response = app
            .oneshot(webhook_request(r#"{"uplink_message":"x"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(
            body,
            json!({"detail": "Internal server error", "code": "INTERNAL_ERROR"})
        );
    }

    #[tokio::test]
    async fn test_webhook_accepts_missing_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(test_state(dir.path()));

        let request = Request::builder()
            .method("POST")
            .uri("/webhook/ttn")
            .body(Body::from(r#"{"uplink_message":{"decoded_payload":{}}}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data_broadcasted"], json!(true));
    }

    #[tokio::test]
    async fn test_index_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(test_state(dir.path()));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["detail"], json!("index.html not found"));
    }

    #[tokio::test]
    async fn test_index_served_from_static_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>Sensors</h1>").unwrap();
        let app = create_router(test_state(dir.path()));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<h1>Sensors</h1>");
    }

    #[tokio::test]
    async fn test_static_assets_served() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("script.js"), "console.log('hi');").unwrap();
        let app = create_router(test_state(dir.path()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/static/script.js")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_reports_connections() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let (_conn, _rx) = registered(&state.registry, "dashboard").await;
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], json!("healthy"));
        assert_eq!(body["connections"], json!(1));
        assert_eq!(body["clients"], json!(["dashboard"]));
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(test_state(dir.path()));

        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
