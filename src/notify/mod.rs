//! Lifecycle event fan-out.
//!
//! Every lifecycle transition is broadcast to all connected realtime
//! subscribers. Delivery is best-effort: the channel is a bounded ring and
//! a lagging subscriber loses the oldest events, never blocks a publisher.
//! Per-session ordering follows the supervisor's emission order.

mod qr;

pub use qr::challenge_to_data_url;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::protocol::Identity;

/// Status icon reported once a session's QR has been scanned.
pub const QR_STATUS_CONNECTED: &str = "./assets/check.svg";
/// Status icon reported while a session is loading or waiting for a scan.
pub const QR_STATUS_LOADING: &str = "./assets/loader.gif";

/// One entry of a `sessions` snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SessionEntry {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub user: Option<Identity>,
}

/// Event pushed to realtime subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BridgeEvent {
    /// Snapshot of all known sessions, sent to a subscriber on join.
    Sessions { sessions: Vec<SessionEntry> },
    /// A QR challenge is ready to scan, rendered as an image data URL.
    Qr {
        #[serde(rename = "sessionId")]
        session_id: String,
        url: String,
    },
    /// Scan status change for a session.
    #[serde(rename = "qrstatus")]
    QrStatus {
        #[serde(rename = "sessionId")]
        session_id: String,
        status: String,
    },
    /// A session resolved its identity.
    User {
        #[serde(rename = "sessionId")]
        session_id: String,
        user: Identity,
    },
    /// Operator-visible log line.
    Log { message: String },
}

/// Broadcast bus for [`BridgeEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BridgeEvent>,
}

impl EventBus {
    /// Create a bus with the given ring capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to every current subscriber.
    ///
    /// A send with no subscribers is not an error; events are best-effort.
    pub fn emit(&self, event: BridgeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn qr(&self, session_id: &str, url: String) {
        self.emit(BridgeEvent::Qr {
            session_id: session_id.to_string(),
            url,
        });
    }

    pub fn qr_status(&self, session_id: &str, status: &str) {
        self.emit(BridgeEvent::QrStatus {
            session_id: session_id.to_string(),
            status: status.to_string(),
        });
    }

    pub fn user(&self, session_id: &str, user: Identity) {
        self.emit(BridgeEvent::User {
            session_id: session_id.to_string(),
            user,
        });
    }

    pub fn log(&self, message: impl Into<String>) {
        self.emit(BridgeEvent::Log {
            message: message.into(),
        });
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
