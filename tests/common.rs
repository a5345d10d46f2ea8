//! Test utilities & fixtures.
//! A push sender that records every dispatch, a short-window config, and
//! helpers for driving a [`GameServer`] without a socket.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use heistline::config::Config;
use heistline::game::{MemoryProfileStore, ProfileStore};
use heistline::server::{
    ClientEvent, GameServer, PushError, PushPayload, PushSender, ServerEvent, Session,
};
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Debug, Clone)]
pub struct Dispatch {
    pub tokens: Vec<String>,
    pub payload: PushPayload,
}

/// Records dispatches; optionally reports every one as failed.
#[derive(Default)]
pub struct RecordingPushSender {
    sent: Mutex<Vec<Dispatch>>,
    fail: bool,
}

impl RecordingPushSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn dispatches(&self) -> Vec<Dispatch> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushSender for RecordingPushSender {
    async fn send(&self, tokens: &[String], payload: &PushPayload) -> Result<(), PushError> {
        self.sent.lock().unwrap().push(Dispatch {
            tokens: tokens.to_vec(),
            payload: payload.clone(),
        });
        if self.fail {
            Err(PushError::Rejected { status: 500 })
        } else {
            Ok(())
        }
    }
}

/// Default config with a notification window short enough for tests.
pub fn fast_config(debounce_ms: u64) -> Config {
    let mut config = Config::default();
    config.notifications.debounce_ms = debounce_ms;
    config
}

pub struct Harness {
    pub server: Arc<GameServer>,
    pub store: Arc<MemoryProfileStore>,
    pub push: Arc<RecordingPushSender>,
}

impl Harness {
    pub fn new(debounce_ms: u64) -> Self {
        Self::with_push(debounce_ms, RecordingPushSender::new())
    }

    pub fn with_push(debounce_ms: u64, push: Arc<RecordingPushSender>) -> Self {
        let store = Arc::new(MemoryProfileStore::new());
        let server = GameServer::new(
            fast_config(debounce_ms),
            store.clone() as Arc<dyn ProfileStore>,
            push.clone() as Arc<dyn PushSender>,
        )
        .expect("server");
        Self {
            server: Arc::new(server),
            store,
            push,
        }
    }

    /// Connect and register `name` under account key `key`, discarding the
    /// events produced by the registration itself.
    pub async fn player(&self, key: &str, name: &str) -> Client {
        let (mut session, mut rx) = self.server.connect(None);
        self.server
            .handle_event(
                &mut session,
                ClientEvent::Register {
                    account_key: key.to_string(),
                    display_name: name.to_string(),
                },
            )
            .await
            .expect("register");
        drain(&mut rx);
        Client { session, rx }
    }
}

pub struct Client {
    pub session: Session,
    pub rx: UnboundedReceiver<ServerEvent>,
}

impl Client {
    pub async fn send(&mut self, harness: &Harness, event: ClientEvent) {
        harness
            .server
            .handle_event(&mut self.session, event)
            .await
            .expect("handle_event");
    }

    pub async fn whisper(&mut self, harness: &Harness, to: &str, msg: &str) {
        self.send(
            harness,
            ClientEvent::PrivateMessage {
                to: to.to_string(),
                msg: msg.to_string(),
                id: None,
            },
        )
        .await;
    }

    pub fn drain(&mut self) -> Vec<ServerEvent> {
        drain(&mut self.rx)
    }
}

/// Everything already queued on `rx`.
pub fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

/// Poll `check` until it holds or `within` elapses.
pub async fn eventually<F: Fn() -> bool>(within: Duration, check: F) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
