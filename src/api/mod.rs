//! API layer for chat-bridge.
//!
//! This module provides the HTTP endpoints and the realtime WebSocket
//! channel for interacting with bridged sessions.
//!
//! ## Endpoints
//!
//! - `GET /` - Liveness probe
//! - `GET /scan` - Static QR scan page
//! - `POST /send-message` - Send one message through a session
//! - `POST /delete-session` - Delete a session and its credentials
//! - `POST /send-bulk-messages` - Send a message to every row of a CSV file
//! - `WS /ws` - Realtime channel: session snapshot on join, lifecycle
//!   events, and `start-session` / `get-qr` / `check-status` commands

pub mod handlers;
pub mod router;
pub mod types;
pub mod websocket;

// Re-export commonly used types
pub use handlers::AppState;
pub use router::{create_router_with_state, serve_with_state, ServerConfig};
pub use types::{
    BulkSendRequest, DeleteSessionRequest, SendMessageRequest, StatusResponse, WsClientMessage,
};
