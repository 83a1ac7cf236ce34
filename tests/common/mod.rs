//! Shared test doubles: a scripted protocol client driving the session
//! lifecycle without any real network.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use chat_bridge::error::BridgeError;
use chat_bridge::protocol::{ChatClient, ClientEvent, ConnectionHandle, CredentialBlob, Identity};
use chat_bridge::Result;

pub fn identity() -> Identity {
    Identity {
        id: "1234@x".into(),
        lid: "1234:5@x".into(),
    }
}

/// One message captured by a mock handle.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub address: String,
    pub text: String,
}

/// Connection handle that records sends instead of hitting a network.
pub struct MockHandle {
    open: AtomicBool,
    fail_sends: bool,
    pub sent: Mutex<Vec<SentMessage>>,
    /// Keeps the event channel open while the connection is "live".
    keep: Mutex<Option<mpsc::Sender<ClientEvent>>>,
}

impl MockHandle {
    fn new(fail_sends: bool) -> Self {
        Self {
            open: AtomicBool::new(false),
            fail_sends,
            sent: Mutex::new(Vec::new()),
            keep: Mutex::new(None),
        }
    }

    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConnectionHandle for MockHandle {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send_text(&self, address: &str, text: &str) -> Result<()> {
        if self.fail_sends {
            return Err(BridgeError::UpstreamSend("scripted send failure".into()));
        }
        self.sent.lock().unwrap().push(SentMessage {
            address: address.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_image(
        &self,
        address: &str,
        _image: Vec<u8>,
        caption: Option<&str>,
    ) -> Result<()> {
        if self.fail_sends {
            return Err(BridgeError::UpstreamSend("scripted send failure".into()));
        }
        self.sent.lock().unwrap().push(SentMessage {
            address: address.to_string(),
            text: format!("[image] {}", caption.unwrap_or("")),
        });
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        self.open.store(false, Ordering::SeqCst);
        // Dropping the kept sender closes the event channel.
        self.keep.lock().unwrap().take();
        Ok(())
    }
}

/// Protocol client whose connect attempts replay pre-scripted events.
///
/// Each `connect` call consumes the next script; a script with no
/// terminating `Closed` event leaves the connection open. A connect past
/// the end of the scripts yields a silent, never-opening attempt, which
/// makes unexpected reconnects visible through `connect_count`.
pub struct ScriptedClient {
    attempts: Mutex<VecDeque<Vec<ClientEvent>>>,
    fail_sends: bool,
    connects: AtomicUsize,
    pub handles: Mutex<Vec<Arc<MockHandle>>>,
    pub seen_credentials: Mutex<Vec<CredentialBlob>>,
}

impl ScriptedClient {
    pub fn new(attempts: Vec<Vec<ClientEvent>>) -> Arc<Self> {
        Arc::new(Self {
            attempts: Mutex::new(attempts.into()),
            fail_sends: false,
            connects: AtomicUsize::new(0),
            handles: Mutex::new(Vec::new()),
            seen_credentials: Mutex::new(Vec::new()),
        })
    }

    pub fn failing_sends(attempts: Vec<Vec<ClientEvent>>) -> Arc<Self> {
        Arc::new(Self {
            attempts: Mutex::new(attempts.into()),
            fail_sends: true,
            connects: AtomicUsize::new(0),
            handles: Mutex::new(Vec::new()),
            seen_credentials: Mutex::new(Vec::new()),
        })
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// The handle of the most recent connect attempt.
    pub fn last_handle(&self) -> Option<Arc<MockHandle>> {
        self.handles.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn connect(
        &self,
        _session_id: &str,
        credentials: CredentialBlob,
    ) -> Result<(Arc<dyn ConnectionHandle>, mpsc::Receiver<ClientEvent>)> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.seen_credentials.lock().unwrap().push(credentials);

        let script = self
            .attempts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();

        let (tx, rx) = mpsc::channel(32);
        let handle = Arc::new(MockHandle::new(self.fail_sends));
        *handle.keep.lock().unwrap() = Some(tx.clone());
        self.handles.lock().unwrap().push(Arc::clone(&handle));

        let driver = Arc::clone(&handle);
        tokio::spawn(async move {
            let mut closed = false;
            for event in script {
                match &event {
                    ClientEvent::Open(_) => driver.open.store(true, Ordering::SeqCst),
                    ClientEvent::Closed(_) => {
                        driver.open.store(false, Ordering::SeqCst);
                        closed = true;
                    }
                    _ => {}
                }
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            if closed {
                // Attempt over; let the channel close.
                driver.keep.lock().unwrap().take();
            }
        });

        Ok((handle, rx))
    }
}

/// Poll until `predicate` holds, failing the test after two seconds.
pub async fn wait_until<F>(what: &str, predicate: F)
where
    F: Fn() -> bool,
{
    for _ in 0..200 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {what}");
}

/// Give in-flight supervisor tasks a moment to do anything they were
/// (wrongly) going to do.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
