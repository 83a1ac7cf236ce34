//! Outbound message dispatcher.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::BridgeError;
use crate::protocol::{resolve_address, ContactType};
use crate::session::{SessionRegistry, Supervisor};
use crate::Result;

use super::template::render;

/// Payload of an outbound message request.
#[derive(Debug, Clone)]
pub enum MessagePayload {
    /// Verbatim text.
    Static { text: String },
    /// `{key}` template rendered against a key/value map.
    Template {
        template: String,
        data: HashMap<String, String>,
    },
    /// Image fetched from a remote URL, forwarded with an optional caption.
    Image { url: String, caption: Option<String> },
}

/// Transient outbound request. Never persisted.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub session_id: String,
    pub contact_type: ContactType,
    pub contact_id: String,
    pub payload: MessagePayload,
}

/// Validates a request against registry state and forwards exactly one
/// send to the live connection handle.
pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    supervisor: Arc<Supervisor>,
    http: reqwest::Client,
}

impl Dispatcher {
    pub fn new(registry: Arc<SessionRegistry>, supervisor: Arc<Supervisor>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            registry,
            supervisor,
            http,
        }
    }

    /// Send one message.
    ///
    /// If the session has no usable connection, a lazy connect is kicked
    /// off and the call fails with `SessionNotConnected`: authentication
    /// is asynchronous (QR scan), so the caller polls or subscribes for
    /// connected status and retries.
    pub async fn send(&self, request: OutboundRequest) -> Result<()> {
        let handle = match self.registry.live_handle(&request.session_id) {
            Some(handle) => handle,
            None => {
                let started = self.supervisor.start(&request.session_id);
                debug!(
                    session_id = %request.session_id,
                    lazy_connect = started,
                    "send rejected, session not connected"
                );
                return Err(BridgeError::SessionNotConnected(request.session_id));
            }
        };

        let address = resolve_address(request.contact_type, &request.contact_id);

        match request.payload {
            MessagePayload::Static { text } => handle.send_text(&address, &text).await?,
            MessagePayload::Template { template, data } => {
                let text = render(&template, &data);
                handle.send_text(&address, &text).await?
            }
            MessagePayload::Image { url, caption } => {
                let image = self.fetch_image(&url).await?;
                handle
                    .send_image(&address, image, caption.as_deref())
                    .await?
            }
        }

        info!(session_id = %request.session_id, address, "message dispatched");
        Ok(())
    }

    /// Download image bytes for a media message. A failed fetch fails the
    /// dispatch; nothing is sent.
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| BridgeError::MediaFetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| BridgeError::MediaFetch(e.to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BridgeError::MediaFetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
