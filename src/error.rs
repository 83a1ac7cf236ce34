//! Error types for chat-bridge.

use thiserror::Error;

/// Main error type for chat-bridge operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Request carried bad or missing fields.
    #[error("validation error: {0}")]
    Validation(String),

    /// Session with the given ID was not found.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Session exists but has no usable connection.
    #[error("session not connected: {0}")]
    SessionNotConnected(String),

    /// The protocol client rejected or timed out a send.
    #[error("upstream send failure: {0}")]
    UpstreamSend(String),

    /// Fetching remote media for an image message failed.
    #[error("media fetch failed: {0}")]
    MediaFetch(String),

    /// Credential or identity write failed. Callers log this and keep
    /// in-memory state authoritative.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Credential store error.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bulk import file could not be parsed.
    #[error("bulk file error: {0}")]
    BulkFile(String),

    /// QR challenge could not be rendered.
    #[error("QR render error: {0}")]
    QrRender(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience Result type for chat-bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
