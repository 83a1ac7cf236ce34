//! # chat-bridge
//!
//! Multi-session HTTP/WebSocket bridge for a chat protocol client.
//!
//! This crate manages many independently-authenticated protocol sessions
//! concurrently: it persists and restores their credentials, reacts to
//! asynchronous connection-state events (QR challenge, connected,
//! disconnected-with-reason), applies a bounded reconnect policy, and
//! exposes a race-free view of session liveness to concurrent HTTP
//! callers. The wire protocol itself is delegated to an external client
//! capability behind the [`protocol::ChatClient`] trait.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use chat_bridge::api::{serve_with_state, AppState, ServerConfig};
//! use chat_bridge::dispatch::BulkConfig;
//! use chat_bridge::protocol::sim::SimulatedClient;
//! use chat_bridge::session::{LoggedOutPolicy, ReconnectPolicy};
//! use chat_bridge::store::{CredentialStore, Database};
//!
//! #[tokio::main]
//! async fn main() -> chat_bridge::Result<()> {
//!     chat_bridge::logging::try_init().ok();
//!
//!     let store = CredentialStore::new(Database::in_memory()?);
//!     let state = AppState::new(
//!         Arc::new(SimulatedClient::default()),
//!         store,
//!         ReconnectPolicy::default(),
//!         LoggedOutPolicy::default(),
//!         BulkConfig::default(),
//!     );
//!
//!     state.supervisor.restore_all()?;
//!     serve_with_state(ServerConfig::default(), state).await
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod notify;
pub mod protocol;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use dispatch::{Dispatcher, MessagePayload, OutboundRequest};
pub use error::{BridgeError, Result};
pub use notify::{BridgeEvent, EventBus};
pub use protocol::{ChatClient, ClientEvent, ConnectionHandle, CredentialBlob, Identity};
pub use session::{LifecycleState, SessionRegistry, Supervisor};
pub use store::{CredentialStore, Database};
