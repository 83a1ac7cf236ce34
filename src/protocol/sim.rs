//! Simulated protocol client for development and demos.
//!
//! Stands in for the real protocol library: fresh sessions get a QR
//! challenge and "scan" themselves after a short pause, restored sessions
//! resume directly. Sends are logged instead of hitting a network.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

use crate::error::BridgeError;
use crate::Result;

use super::client::{ChatClient, ClientEvent, ConnectionHandle, CredentialBlob, Identity};

static CHALLENGE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Development stand-in for the external chat client.
pub struct SimulatedClient {
    /// Pause before the simulated operator scans a fresh QR challenge.
    scan_after: Duration,
}

impl SimulatedClient {
    pub fn new(scan_after: Duration) -> Self {
        Self { scan_after }
    }
}

impl Default for SimulatedClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}

struct SimulatedHandle {
    session_id: String,
    open: AtomicBool,
    events: mpsc::Sender<ClientEvent>,
}

impl SimulatedHandle {
    fn ensure_open(&self) -> Result<()> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BridgeError::UpstreamSend("connection not open".into()))
        }
    }
}

#[async_trait]
impl ConnectionHandle for SimulatedHandle {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send_text(&self, address: &str, text: &str) -> Result<()> {
        self.ensure_open()?;
        info!(
            session_id = %self.session_id,
            address,
            chars = text.chars().count(),
            "simulated text send"
        );
        Ok(())
    }

    async fn send_image(
        &self,
        address: &str,
        image: Vec<u8>,
        caption: Option<&str>,
    ) -> Result<()> {
        self.ensure_open()?;
        info!(
            session_id = %self.session_id,
            address,
            bytes = image.len(),
            caption = caption.unwrap_or(""),
            "simulated image send"
        );
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        self.open.store(false, Ordering::SeqCst);
        let _ = self
            .events
            .send(ClientEvent::Closed(super::DisconnectReason::LoggedOut))
            .await;
        Ok(())
    }
}

/// Derive a stable fake phone number from the session id.
fn fake_identity(session_id: &str) -> Identity {
    let digits = session_id
        .bytes()
        .fold(7u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64))
        % 1_000_000_0000;
    Identity {
        id: format!("{digits}@sim"),
        lid: format!("{digits}:1@sim"),
    }
}

#[async_trait]
impl ChatClient for SimulatedClient {
    async fn connect(
        &self,
        session_id: &str,
        credentials: CredentialBlob,
    ) -> Result<(Arc<dyn ConnectionHandle>, mpsc::Receiver<ClientEvent>)> {
        let (tx, rx) = mpsc::channel(16);
        let handle = Arc::new(SimulatedHandle {
            session_id: session_id.to_string(),
            open: AtomicBool::new(false),
            events: tx.clone(),
        });

        let driver = Arc::clone(&handle);
        let scan_after = self.scan_after;
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            if credentials.is_empty() {
                let challenge = format!(
                    "sim://{}/{}",
                    session_id,
                    CHALLENGE_COUNTER.fetch_add(1, Ordering::Relaxed)
                );
                if tx.send(ClientEvent::Qr(challenge)).await.is_err() {
                    return;
                }
                // The "operator" scans after a pause
                tokio::time::sleep(scan_after).await;

                let mut blob = CredentialBlob::new();
                blob.insert(
                    "creds.json",
                    format!("{{\"session\":\"{session_id}\"}}").into_bytes(),
                );
                if tx.send(ClientEvent::CredentialsRotated(blob)).await.is_err() {
                    return;
                }
            }

            driver.open.store(true, Ordering::SeqCst);
            let _ = tx
                .send(ClientEvent::Open(fake_identity(&session_id)))
                .await;
        });

        Ok((handle, rx))
    }
}
