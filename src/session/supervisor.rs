//! Per-session connection supervisor.
//!
//! One supervisor task per session drives the lifecycle: open a connection
//! attempt, react to QR / open / close events from the protocol client,
//! persist identity and rotated credentials, and apply the reconnect
//! policy. A delete request races any in-flight attempt and wins by
//! removing the registry entry; every event handler checks for presence
//! first and treats absence as "operation superseded".

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::error::BridgeError;
use crate::notify::{self, challenge_to_data_url, EventBus};
use crate::protocol::{ChatClient, ClientEvent, DisconnectClass};
use crate::store::CredentialStore;
use crate::Result;

use super::registry::SessionRegistry;

/// Bounded retry policy for recoverable disconnects.
///
/// Delays grow as `base_delay * 2^attempt`, clamped to `max_delay`. The
/// attempt counter resets whenever a connection reaches `Connected`.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Consecutive failed attempts before the supervisor gives up.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    /// Backoff delay before the given zero-based retry attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// What to do when the remote end reports a user-initiated logout.
///
/// Source deployments disagree on this, so it is policy, not hardcoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoggedOutPolicy {
    /// Reconnect like any transient drop.
    #[default]
    Reconnect,
    /// Leave the session closed until an operator restarts it.
    Manual,
}

impl FromStr for LoggedOutPolicy {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "reconnect" => Ok(Self::Reconnect),
            "manual" => Ok(Self::Manual),
            other => Err(BridgeError::Config(format!(
                "invalid logged_out policy: {other}"
            ))),
        }
    }
}

/// Outcome of one connection attempt, as seen by the retry loop.
enum AttemptOutcome {
    /// Recoverable close. `connected` is whether this attempt reached
    /// `Connected` before closing (resets the backoff sequence).
    Retry { connected: bool },
    /// Terminal close, unrecognized reason, or policy says stop.
    Stop,
    /// The registry entry vanished mid-flight; a delete won the race.
    Superseded,
}

/// Drives connection attempts for all sessions.
pub struct Supervisor {
    registry: Arc<SessionRegistry>,
    store: CredentialStore,
    bus: EventBus,
    client: Arc<dyn ChatClient>,
    policy: ReconnectPolicy,
    logged_out: LoggedOutPolicy,
}

impl Supervisor {
    pub fn new(
        registry: Arc<SessionRegistry>,
        store: CredentialStore,
        bus: EventBus,
        client: Arc<dyn ChatClient>,
        policy: ReconnectPolicy,
        logged_out: LoggedOutPolicy,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            store,
            bus,
            client,
            policy,
            logged_out,
        })
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Start a connection attempt for a session.
    ///
    /// Claims the connecting slot atomically; returns false when an
    /// attempt is already active, so concurrent start requests for the
    /// same id collapse to one supervisor task.
    pub fn start(self: &Arc<Self>, session_id: &str) -> bool {
        if !self.registry.begin_connect(session_id) {
            return false;
        }
        let supervisor = Arc::clone(self);
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            supervisor.run(session_id).await;
        });
        true
    }

    /// Restore every persisted session and start its supervisor.
    ///
    /// Identities are preloaded into the registry so `list()` shows them
    /// before the first reconnect completes.
    pub fn restore_all(self: &Arc<Self>) -> Result<usize> {
        let identities = self.store.list_identities()?;
        let count = identities.len();
        for (session_id, identity) in identities {
            self.registry.upsert(&session_id, Some(identity));
            self.start(&session_id);
        }
        if count > 0 {
            info!(count, "restored sessions from credential store");
        }
        Ok(count)
    }

    /// Delete a session: log out the live connection if present, remove
    /// the registry entry, and delete the stored credentials.
    ///
    /// Removing the registry entry first is what makes this win the race
    /// against any in-flight reconnect for the same id.
    pub async fn delete(&self, session_id: &str) -> Result<()> {
        let removed = self
            .registry
            .remove(session_id)
            .ok_or_else(|| BridgeError::SessionNotFound(session_id.to_string()))?;

        if let Some(handle) = removed.handle {
            if let Err(e) = handle.logout().await {
                warn!(session_id, error = %e, "logout during delete failed");
            }
        }

        if let Err(e) = self.store.delete(session_id) {
            // In-memory removal already happened; surface but don't undo.
            error!(session_id, error = %e, "failed to delete stored credentials");
        }

        self.bus.log(format!("session {session_id} deleted"));
        info!(session_id, "session deleted");
        Ok(())
    }

    /// Retry loop for one session.
    async fn run(self: Arc<Self>, session_id: String) {
        let mut attempt: u32 = 0;
        loop {
            match self.connect_once(&session_id).await {
                AttemptOutcome::Retry { connected } => {
                    if connected {
                        attempt = 0;
                    }
                    if attempt >= self.policy.max_attempts {
                        warn!(
                            session_id,
                            attempts = attempt,
                            "reconnect attempts exhausted, leaving session closed"
                        );
                        self.bus.log(format!(
                            "session {session_id}: reconnect attempts exhausted"
                        ));
                        return;
                    }
                    if !self.registry.mark_reconnecting(&session_id) {
                        return;
                    }
                    let delay = self.policy.delay_for(attempt);
                    let delay_ms = delay.as_millis() as u64;
                    attempt += 1;
                    info!(session_id, attempt, delay_ms, "reconnecting");
                    tokio::time::sleep(delay).await;
                }
                AttemptOutcome::Stop | AttemptOutcome::Superseded => return,
            }
        }
    }

    /// One full connection attempt: connect, then consume client events
    /// until the connection closes or the session is deleted.
    async fn connect_once(&self, session_id: &str) -> AttemptOutcome {
        if !self.registry.mark_connecting(session_id) {
            return AttemptOutcome::Superseded;
        }

        let credentials = match self.store.load_blob(session_id) {
            Ok(blob) => blob,
            Err(e) => {
                // Fall back to a fresh QR handshake rather than failing the
                // whole session.
                error!(session_id, error = %e, "failed to load credentials");
                Default::default()
            }
        };

        self.bus
            .qr_status(session_id, notify::QR_STATUS_LOADING);
        self.bus.log(format!("loading session {session_id}..."));

        let (handle, mut events) = match self.client.connect(session_id, credentials).await {
            Ok(pair) => pair,
            Err(e) => {
                error!(session_id, error = %e, "connect attempt failed");
                self.registry.mark_closed(session_id);
                return AttemptOutcome::Retry { connected: false };
            }
        };

        if !self.registry.attach_handle(session_id, Arc::clone(&handle)) {
            // Deleted while the connect call was in flight.
            return AttemptOutcome::Superseded;
        }

        let mut connected = false;

        while let Some(event) = events.recv().await {
            if !self.registry.contains(session_id) {
                return AttemptOutcome::Superseded;
            }

            match event {
                ClientEvent::Qr(challenge) => {
                    self.registry.set_qr(session_id, &challenge);
                    match challenge_to_data_url(&challenge) {
                        Ok(url) => {
                            self.bus.qr(session_id, url);
                            self.bus.log(format!(
                                "QR received for session {session_id}, scan to authenticate"
                            ));
                        }
                        Err(e) => warn!(session_id, error = %e, "failed to render QR challenge"),
                    }
                }
                ClientEvent::CredentialsRotated(blob) => {
                    if let Err(e) = self.store.save_blob(session_id, &blob) {
                        error!(session_id, error = %e, "failed to persist rotated credentials");
                    }
                }
                ClientEvent::Open(identity) => {
                    connected = true;
                    self.registry.mark_connected(session_id, identity.clone());
                    // Durability lags availability here: a failed write is
                    // logged, the in-memory Connected state stands.
                    if let Err(e) = self.store.save_identity(session_id, &identity) {
                        error!(session_id, error = %e, "failed to persist identity");
                    }
                    self.bus
                        .qr_status(session_id, notify::QR_STATUS_CONNECTED);
                    self.bus.user(session_id, identity.clone());
                    self.bus
                        .log(format!("user connected on session {session_id}"));
                    info!(session_id, user = %identity.id, "connection open");
                }
                ClientEvent::Closed(reason) => {
                    self.registry.mark_closed(session_id);
                    info!(session_id, %reason, code = reason.code(), "connection closed");

                    return match reason.classify() {
                        DisconnectClass::Fatal => {
                            error!(
                                session_id,
                                "bad session file; delete stored credentials and scan again"
                            );
                            self.bus.log(format!(
                                "session {session_id}: bad session file, delete credentials and scan again"
                            ));
                            if let Err(e) = handle.logout().await {
                                warn!(session_id, error = %e, "logout after bad session failed");
                            }
                            AttemptOutcome::Stop
                        }
                        DisconnectClass::Recoverable => AttemptOutcome::Retry { connected },
                        DisconnectClass::LoggedOut => match self.logged_out {
                            LoggedOutPolicy::Reconnect => AttemptOutcome::Retry { connected },
                            LoggedOutPolicy::Manual => {
                                warn!(session_id, "remote logout, waiting for operator restart");
                                AttemptOutcome::Stop
                            }
                        },
                        DisconnectClass::Unrecognized => {
                            warn!(
                                session_id,
                                code = reason.code(),
                                "unrecognized disconnect reason, no automatic action"
                            );
                            AttemptOutcome::Stop
                        }
                    };
                }
            }
        }

        // Event channel closed without a Closed event: the client went
        // away. Treat like a lost connection.
        self.registry.mark_closed(session_id);
        AttemptOutcome::Retry { connected }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_clamps() {
        let policy = ReconnectPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        };

        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(6), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_survives_large_attempts() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(u32::MAX), policy.max_delay);
    }

    #[test]
    fn test_logged_out_policy_parse() {
        assert_eq!(
            "reconnect".parse::<LoggedOutPolicy>().unwrap(),
            LoggedOutPolicy::Reconnect
        );
        assert_eq!(
            "manual".parse::<LoggedOutPolicy>().unwrap(),
            LoggedOutPolicy::Manual
        );
        assert!("never".parse::<LoggedOutPolicy>().is_err());
    }
}
