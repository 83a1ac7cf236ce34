//! In-memory session registry.
//!
//! Single source of truth for what sessions exist and their current
//! state. Entries are partitioned by session id; every mutation happens
//! under one entry guard with no suspension point inside, so concurrent
//! readers never observe a half-updated session.

use std::sync::Arc;

use dashmap::DashMap;

use super::state::LifecycleState;
use crate::protocol::{ConnectionHandle, Identity};

/// Registry entry for one session.
pub struct Session {
    /// Externally assigned unique id.
    pub session_id: String,
    /// Resolved identity, retained across disconnects for display.
    pub identity: Option<Identity>,
    /// Current lifecycle state.
    pub lifecycle: LifecycleState,
    /// Latest QR challenge; replaced on regeneration, cleared on connect.
    pub last_qr: Option<String>,
    /// Live connection handle, present only while an attempt exists.
    pub handle: Option<Arc<dyn ConnectionHandle>>,
}

impl Session {
    fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            identity: None,
            lifecycle: LifecycleState::Idle,
            last_qr: None,
            handle: None,
        }
    }
}

/// Read-only snapshot of a session.
#[derive(Clone)]
pub struct SessionView {
    pub session_id: String,
    pub identity: Option<Identity>,
    pub lifecycle: LifecycleState,
    pub last_qr: Option<String>,
    pub handle: Option<Arc<dyn ConnectionHandle>>,
}

impl SessionView {
    fn of(session: &Session) -> Self {
        Self {
            session_id: session.session_id.clone(),
            identity: session.identity.clone(),
            lifecycle: session.lifecycle,
            last_qr: session.last_qr.clone(),
            handle: session.handle.clone(),
        }
    }
}

/// Thread-safe registry of sessions, keyed by session id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session if absent, updating its identity if one is given.
    ///
    /// Used at startup to preload sessions restored from the credential
    /// store before their supervisors are started.
    pub fn upsert(&self, session_id: &str, identity: Option<Identity>) {
        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id));
        if identity.is_some() {
            entry.identity = identity;
        }
    }

    /// Get a snapshot of the session with the given id.
    pub fn get(&self, session_id: &str) -> Option<SessionView> {
        self.sessions.get(session_id).map(|s| SessionView::of(&s))
    }

    /// Check if a session exists.
    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Remove a session, returning its last snapshot.
    ///
    /// The returned view carries the live handle (if any) so the caller
    /// can log it out. After this returns, in-flight supervisor handlers
    /// for the id observe absence and no-op.
    pub fn remove(&self, session_id: &str) -> Option<SessionView> {
        self.sessions.remove(session_id).map(|(_, mut session)| {
            session.lifecycle = LifecycleState::Terminated;
            SessionView::of(&session)
        })
    }

    /// Snapshot of all sessions. Order is unspecified.
    pub fn list(&self) -> Vec<SessionView> {
        self.sessions.iter().map(|s| SessionView::of(&s)).collect()
    }

    /// Number of sessions in the registry.
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the session currently has a usable, open connection.
    ///
    /// True iff the lifecycle is `Connected` and the handle is present and
    /// still reporting open. Never inferred from a persisted identity.
    pub fn is_live(&self, session_id: &str) -> bool {
        self.sessions
            .get(session_id)
            .map(|s| {
                s.lifecycle == LifecycleState::Connected
                    && s.handle.as_ref().is_some_and(|h| h.is_open())
            })
            .unwrap_or(false)
    }

    /// Return the connection handle iff the session is live.
    pub fn live_handle(&self, session_id: &str) -> Option<Arc<dyn ConnectionHandle>> {
        self.sessions.get(session_id).and_then(|s| {
            if s.lifecycle == LifecycleState::Connected {
                s.handle.as_ref().filter(|h| h.is_open()).cloned()
            } else {
                None
            }
        })
    }

    /// Atomically claim the connecting slot for a session.
    ///
    /// Inserts the entry if absent. Returns false when an attempt is
    /// already active for the id, which is what collapses concurrent
    /// start requests into exactly one connection attempt.
    pub fn begin_connect(&self, session_id: &str) -> bool {
        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id));
        if entry.lifecycle.attempt_active() {
            return false;
        }
        entry.lifecycle = LifecycleState::Connecting;
        entry.handle = None;
        true
    }

    /// Attach the handle of a freshly opened connection attempt.
    ///
    /// Returns false if the session no longer exists (deleted mid-flight).
    pub fn attach_handle(&self, session_id: &str, handle: Arc<dyn ConnectionHandle>) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(mut session) => {
                session.handle = Some(handle);
                true
            }
            None => false,
        }
    }

    /// Move a session (back) into `Connecting` at the start of an attempt.
    ///
    /// Re-entrant for `Connecting` itself; used by the supervisor when it
    /// re-enters the connect procedure after a backoff.
    pub fn mark_connecting(&self, session_id: &str) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(mut session) => {
                if session.lifecycle == LifecycleState::Connecting
                    || session.lifecycle.can_transition_to(LifecycleState::Connecting)
                {
                    session.lifecycle = LifecycleState::Connecting;
                }
                true
            }
            None => false,
        }
    }

    /// Store the latest QR challenge and move to `QrPending`.
    ///
    /// Re-entrant: protocol clients rotate challenges periodically and
    /// each replaces the prior one. A stale challenge arriving in any
    /// other state is ignored.
    pub fn set_qr(&self, session_id: &str, challenge: &str) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(mut session) => {
                if session.lifecycle == LifecycleState::QrPending
                    || session.lifecycle.can_transition_to(LifecycleState::QrPending)
                {
                    session.last_qr = Some(challenge.to_string());
                    session.lifecycle = LifecycleState::QrPending;
                }
                true
            }
            None => false,
        }
    }

    /// Record a successful connection: identity set, QR cleared, state
    /// `Connected`. One atomic update as far as readers are concerned.
    pub fn mark_connected(&self, session_id: &str, identity: Identity) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(mut session) => {
                if session.lifecycle.can_transition_to(LifecycleState::Connected) {
                    session.identity = Some(identity);
                    session.last_qr = None;
                    session.lifecycle = LifecycleState::Connected;
                }
                true
            }
            None => false,
        }
    }

    /// Record a closed connection and drop the handle. Idempotent.
    pub fn mark_closed(&self, session_id: &str) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(mut session) => {
                if session.lifecycle == LifecycleState::Closed
                    || session.lifecycle.can_transition_to(LifecycleState::Closed)
                {
                    session.lifecycle = LifecycleState::Closed;
                    session.handle = None;
                }
                true
            }
            None => false,
        }
    }

    /// Mark a session as waiting out its reconnect backoff.
    pub fn mark_reconnecting(&self, session_id: &str) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(mut session) => {
                if session
                    .lifecycle
                    .can_transition_to(LifecycleState::Reconnecting)
                {
                    session.lifecycle = LifecycleState::Reconnecting;
                }
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeHandle {
        open: AtomicBool,
    }

    impl FakeHandle {
        fn new(open: bool) -> Arc<Self> {
            Arc::new(Self {
                open: AtomicBool::new(open),
            })
        }
    }

    #[async_trait]
    impl ConnectionHandle for FakeHandle {
        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        async fn send_text(&self, _address: &str, _text: &str) -> Result<()> {
            Ok(())
        }

        async fn send_image(
            &self,
            _address: &str,
            _image: Vec<u8>,
            _caption: Option<&str>,
        ) -> Result<()> {
            Ok(())
        }

        async fn logout(&self) -> Result<()> {
            self.open.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    fn identity() -> Identity {
        Identity {
            id: "1234@x".into(),
            lid: "1234:5@x".into(),
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let registry = SessionRegistry::new();
        registry.upsert("s1", None);

        let view = registry.get("s1").unwrap();
        assert_eq!(view.session_id, "s1");
        assert_eq!(view.lifecycle, LifecycleState::Idle);
        assert!(view.identity.is_none());
    }

    #[test]
    fn test_upsert_preserves_identity() {
        let registry = SessionRegistry::new();
        registry.upsert("s1", Some(identity()));
        registry.upsert("s1", None);

        let view = registry.get("s1").unwrap();
        assert_eq!(view.identity, Some(identity()));
    }

    #[test]
    fn test_begin_connect_claims_slot_once() {
        let registry = SessionRegistry::new();

        assert!(registry.begin_connect("s1"));
        // Second claim while the attempt is active must fail
        assert!(!registry.begin_connect("s1"));

        let view = registry.get("s1").unwrap();
        assert_eq!(view.lifecycle, LifecycleState::Connecting);
    }

    #[test]
    fn test_begin_connect_after_close() {
        let registry = SessionRegistry::new();
        assert!(registry.begin_connect("s1"));
        registry.mark_closed("s1");
        assert!(registry.begin_connect("s1"));
    }

    #[test]
    fn test_is_live_requires_connected_and_open_handle() {
        let registry = SessionRegistry::new();
        registry.begin_connect("s1");
        assert!(!registry.is_live("s1"));

        registry.attach_handle("s1", FakeHandle::new(true));
        // Connecting with a handle is still not live
        assert!(!registry.is_live("s1"));

        registry.mark_connected("s1", identity());
        assert!(registry.is_live("s1"));

        // A handle that reports closed makes the session not live even
        // though the lifecycle has not caught up yet
        let closed = FakeHandle::new(false);
        registry.attach_handle("s1", closed);
        assert!(!registry.is_live("s1"));
    }

    #[test]
    fn test_identity_alone_is_not_liveness() {
        let registry = SessionRegistry::new();
        registry.upsert("s1", Some(identity()));
        assert!(!registry.is_live("s1"));
        assert!(registry.live_handle("s1").is_none());
    }

    #[test]
    fn test_connect_clears_qr() {
        let registry = SessionRegistry::new();
        registry.begin_connect("s1");
        registry.set_qr("s1", "challenge-1");
        registry.set_qr("s1", "challenge-2");

        let view = registry.get("s1").unwrap();
        assert_eq!(view.lifecycle, LifecycleState::QrPending);
        assert_eq!(view.last_qr.as_deref(), Some("challenge-2"));

        registry.mark_connected("s1", identity());
        let view = registry.get("s1").unwrap();
        assert!(view.last_qr.is_none());
        assert_eq!(view.lifecycle, LifecycleState::Connected);
    }

    #[test]
    fn test_remove_returns_handle_and_mutations_noop() {
        let registry = SessionRegistry::new();
        registry.begin_connect("s1");
        registry.attach_handle("s1", FakeHandle::new(true));

        let removed = registry.remove("s1").unwrap();
        assert!(removed.handle.is_some());
        assert_eq!(removed.lifecycle, LifecycleState::Terminated);

        // Stale supervisor updates after a delete must report absence
        assert!(!registry.set_qr("s1", "late"));
        assert!(!registry.mark_connected("s1", identity()));
        assert!(!registry.mark_closed("s1"));
        assert!(!registry.contains("s1"));
    }

    #[test]
    fn test_list_snapshot() {
        let registry = SessionRegistry::new();
        registry.upsert("a", None);
        registry.upsert("b", Some(identity()));

        let mut ids: Vec<String> = registry.list().into_iter().map(|v| v.session_id).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn test_concurrent_begin_connect_single_winner() {
        use std::thread;

        let registry = Arc::new(SessionRegistry::new());
        let mut handles = vec![];
        for _ in 0..32 {
            let registry = Arc::clone(&registry);
            handles.push(thread::spawn(move || registry.begin_connect("s1")));
        }

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|claimed| *claimed)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(registry.count(), 1);
    }
}
