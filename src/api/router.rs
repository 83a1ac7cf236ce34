//! API router configuration.

use axum::{
    routing::{any, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_session, root, scan_page, send_bulk_messages, send_message, AppState,
};
use super::websocket::ws_handler;

/// Create the API router with the given state.
pub fn create_router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/scan", get(scan_page))
        .route("/send-message", post(send_message))
        .route("/delete-session", post(delete_session))
        .route("/send-bulk-messages", post(send_bulk_messages))
        .route("/ws", any(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// Start the API server.
pub async fn serve_with_state(config: ServerConfig, state: AppState) -> crate::Result<()> {
    let addr = config.bind_address();
    let router = create_router_with_state(state);

    tracing::info!("Starting chat-bridge API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(crate::error::BridgeError::Io)?;

    axum::serve(listener, router)
        .await
        .map_err(|e| crate::error::BridgeError::Io(std::io::Error::other(e.to_string())))?;

    Ok(())
}
