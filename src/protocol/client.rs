//! Black-box chat client capability.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::reason::DisconnectReason;
use crate::Result;

/// Resolved protocol identity for an authenticated session.
///
/// Populated once the client reports an open connection; retained across
/// later disconnects for display purposes only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Primary protocol user id (e.g. `1234@x`).
    pub id: String,
    /// Secondary id assigned by the protocol.
    pub lid: String,
}

/// Opaque multi-file authentication state owned by the protocol client.
///
/// The bridge never looks inside the files; it persists them verbatim and
/// hands them back on the next connect so the client can resume without a
/// new QR scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialBlob {
    files: BTreeMap<String, Vec<u8>>,
}

impl CredentialBlob {
    /// An empty blob, used for a session's first connection attempt.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_files(files: BTreeMap<String, Vec<u8>>) -> Self {
        Self { files }
    }

    /// Insert or replace one credential file.
    pub fn insert(&mut self, name: impl Into<String>, contents: Vec<u8>) {
        self.files.insert(name.into(), contents);
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }
}

/// Connection-state events emitted by the protocol client.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A QR challenge was issued. Each challenge replaces the prior one.
    Qr(String),
    /// The connection is open and the identity is resolved.
    Open(Identity),
    /// The client rotated its credential material; the new blob must be
    /// persisted so the session can resume later.
    CredentialsRotated(CredentialBlob),
    /// The connection closed with a protocol reason code. Always the last
    /// event on the channel.
    Closed(DisconnectReason),
}

/// Live connection returned by a successful connect call.
#[async_trait]
pub trait ConnectionHandle: Send + Sync {
    /// Whether the underlying socket is still open.
    fn is_open(&self) -> bool;

    /// Send a plain text message to a resolved protocol address.
    async fn send_text(&self, address: &str, text: &str) -> Result<()>;

    /// Send an image with an optional caption.
    async fn send_image(&self, address: &str, image: Vec<u8>, caption: Option<&str>)
        -> Result<()>;

    /// Log out, invalidating the stored credentials remotely.
    async fn logout(&self) -> Result<()>;
}

/// The chat protocol capability.
///
/// `connect` opens one authentication/connection attempt for a session.
/// Events arrive on the returned receiver in emission order; the handle
/// accepts outbound sends once the client has reported [`ClientEvent::Open`].
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn connect(
        &self,
        session_id: &str,
        credentials: CredentialBlob,
    ) -> Result<(Arc<dyn ConnectionHandle>, mpsc::Receiver<ClientEvent>)>;
}
