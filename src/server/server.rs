//! The game server: routes client events through the action engine, the
//! presence registry and the notification batcher.
//!
//! Transports create a [`Session`] per connection with [`GameServer::connect`],
//! feed decoded [`ClientEvent`]s to [`GameServer::handle_event`] and call
//! [`GameServer::disconnect`] when the peer goes away. Everything a client is
//! told arrives on the receiver returned by `connect`.
//!
//! Requests whose preconditions fail get no reply at all; the reason is only
//! visible in debug logs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::game::{ActionEngine, MemoryProfileStore, Outcome, ProfileStore, Rejection, SledProfileStore};
use crate::logutil::{escape_log, short_key};
use crate::metrics;
use crate::server::clock::{spawn_clock, zone_from_name};
use crate::server::notify::{start_notifier, NotifierConfig, NotifierHandle};
use crate::server::presence::{ConnectionHandle, PresenceRegistry};
use crate::server::protocol::{ClientEvent, ServerEvent};
use crate::server::push::{sender_from_config, PushPayload, PushSender};
use crate::server::session::Session;
use crate::validation::{sanitize_message_content, truncate_preview};

pub struct GameServer {
    config: Config,
    engine: ActionEngine,
    presence: Mutex<PresenceRegistry>,
    notifier: NotifierHandle,
    push: Arc<dyn PushSender>,
    next_conn_id: AtomicU64,
}

impl GameServer {
    /// Build a server over an existing store and push sender.
    ///
    /// Must be called inside a Tokio runtime: the notification batcher task
    /// is spawned here.
    pub fn new(
        config: Config,
        store: Arc<dyn ProfileStore>,
        push: Arc<dyn PushSender>,
    ) -> Result<Self> {
        let engine = ActionEngine::new(store.clone(), &config.game)
            .context("invalid [game] configuration")?;
        let notifier = start_notifier(
            NotifierConfig::from_config(&config.notifications),
            store,
            push.clone(),
        );
        Ok(Self {
            config,
            engine,
            presence: Mutex::new(PresenceRegistry::new()),
            notifier,
            push,
            next_conn_id: AtomicU64::new(1),
        })
    }

    /// Build a server from configuration alone: sled store under
    /// `[storage].data_dir` (or an in-memory store) and the configured push sender.
    pub fn from_config(config: Config, in_memory: bool) -> Result<Self> {
        let store: Arc<dyn ProfileStore> = if in_memory {
            Arc::new(MemoryProfileStore::new())
        } else {
            let path = std::path::Path::new(&config.storage.data_dir).join("profiles");
            Arc::new(
                SledProfileStore::open(&path)
                    .with_context(|| format!("failed to open profile store at {}", path.display()))?,
            )
        };
        let push = sender_from_config(&config.push).context("invalid [push] configuration")?;
        Self::new(config, store, push)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &ActionEngine {
        &self.engine
    }

    pub fn notifier(&self) -> &NotifierHandle {
        &self.notifier
    }

    fn presence(&self) -> MutexGuard<'_, PresenceRegistry> {
        // Registry updates never panic midway; a poisoned lock still holds consistent maps.
        self.presence.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open a new anonymous connection.
    pub fn connect(&self, peer: Option<String>) -> (Session, mpsc::UnboundedReceiver<ServerEvent>) {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.presence().connect(ConnectionHandle::new(conn_id, tx));
        let mut session = Session::new(conn_id);
        if let Some(peer) = peer {
            session = session.with_peer(peer);
        }
        debug!("connection {} opened", session.label());
        (session, rx)
    }

    /// Tear down a connection. Its display name leaves presence only if no
    /// newer connection has claimed it.
    pub fn disconnect(&self, session: &Session) {
        let mut presence = self.presence();
        let dropped = presence.disconnect(session.conn_id);
        if !dropped.is_empty() {
            presence.broadcast(&ServerEvent::OnlinePlayers {
                players: presence.names(),
            });
        }
        info!("connection {} closed", session.label());
    }

    /// Send `event` to every live connection.
    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        self.presence().broadcast(event)
    }

    /// Display names with a live connection, sorted.
    pub fn online_players(&self) -> Vec<String> {
        self.presence().names()
    }

    fn send_to(&self, conn_id: u64, event: ServerEvent) {
        let presence = self.presence();
        if let Some(handle) = presence.get(conn_id) {
            if !handle.send(event) {
                debug!("connection #{} gone; event dropped", conn_id);
            }
        }
    }

    fn dropped(&self, session: &Session, what: &str, why: &Rejection) {
        debug!("{} from {} dropped: {:?}", what, session.label(), why);
    }

    /// Handle one inbound event. Store failures are returned; rejected
    /// requests are not errors and produce no reply.
    pub async fn handle_event(&self, session: &mut Session, event: ClientEvent) -> Result<()> {
        session.update_activity();
        match event {
            ClientEvent::Register {
                account_key,
                display_name,
            } => self.handle_register(session, &account_key, &display_name).await,
            ClientEvent::Message { text } => {
                self.handle_chat(session, &text);
                Ok(())
            }
            ClientEvent::RobBank => self.handle_rob(session).await,
            ClientEvent::Travel { destination } => self.handle_travel(session, &destination).await,
            ClientEvent::PrivateMessage { to, msg, id } => {
                self.handle_private_message(session, &to, &msg, id.as_deref())
                    .await
            }
            ClientEvent::Announcement { text } => {
                self.announce(&text);
                Ok(())
            }
            ClientEvent::RegisterPushToken { token } => {
                let Some((key, _)) = session.identity() else {
                    return Ok(());
                };
                let outcome = self.engine.add_push_token(key, &token).await?;
                self.reply_stats(session, outcome, "register-push-token");
                Ok(())
            }
            ClientEvent::MarkRead { ids } => {
                let Some((key, _)) = session.identity() else {
                    return Ok(());
                };
                let outcome = self.engine.mark_read(key, &ids).await?;
                self.reply_stats(session, outcome, "mark-read");
                Ok(())
            }
        }
    }

    fn reply_stats(&self, session: &Session, outcome: Outcome<crate::game::PlayerProfile>, what: &str) {
        match outcome {
            Outcome::Applied(profile) => {
                self.send_to(session.conn_id, ServerEvent::UpdateStats { profile })
            }
            Outcome::Rejected(why) => self.dropped(session, what, &why),
        }
    }

    async fn handle_register(
        &self,
        session: &mut Session,
        account_key: &str,
        display_name: &str,
    ) -> Result<()> {
        let conn_id = session.conn_id;
        let previous_name = session.display_name.clone();
        let world = self.engine.world();

        let outcome = self
            .engine
            .register(account_key, display_name, |profile| {
                let mut presence = self.presence();
                if let Some(old) = previous_name.as_deref() {
                    if old != profile.display_name {
                        presence.remove(old, conn_id);
                    }
                }
                presence.add(&profile.display_name, conn_id);
                if let Some(handle) = presence.get(conn_id) {
                    handle.send(ServerEvent::Init {
                        profile: profile.clone(),
                        locations: world.names(),
                        travel_costs: world.travel_costs(),
                    });
                }
                presence.broadcast(&ServerEvent::OnlinePlayers {
                    players: presence.names(),
                });
            })
            .await?;

        match outcome {
            Outcome::Applied(reg) => {
                session.bind(account_key, &reg.profile.display_name);
                info!(
                    "{} registered as {}{}",
                    short_key(account_key),
                    escape_log(&reg.profile.display_name),
                    if reg.created { " (new profile)" } else { "" }
                );
            }
            Outcome::Rejected(why) => self.dropped(session, "register", &why),
        }
        Ok(())
    }

    fn handle_chat(&self, session: &Session, text: &str) {
        let Some((_, name)) = session.identity() else {
            return;
        };
        let text = match sanitize_message_content(text, self.config.server.max_message_bytes) {
            Ok(text) => text,
            Err(e) => {
                debug!("chat from {} dropped: {}", session.label(), e);
                return;
            }
        };
        debug!("chat {}: {}", escape_log(name), escape_log(&text));
        self.broadcast(&ServerEvent::Message {
            text: format!("{}: {}", name, text),
        });
    }

    async fn handle_rob(&self, session: &Session) -> Result<()> {
        let Some((key, _)) = session.identity() else {
            return Ok(());
        };
        match self.engine.rob_bank(key).await? {
            Outcome::Applied(report) => {
                self.send_to(
                    session.conn_id,
                    ServerEvent::UpdateStats {
                        profile: report.profile,
                    },
                );
            }
            Outcome::Rejected(why) => self.dropped(session, "rob-bank", &why),
        }
        Ok(())
    }

    async fn handle_travel(&self, session: &Session, destination: &str) -> Result<()> {
        let Some((key, _)) = session.identity() else {
            return Ok(());
        };
        let outcome = self.engine.travel(key, destination).await?;
        self.reply_stats(session, outcome, "travel");
        Ok(())
    }

    async fn handle_private_message(
        &self,
        session: &Session,
        to: &str,
        msg: &str,
        client_id: Option<&str>,
    ) -> Result<()> {
        let Some((key, name)) = session.identity() else {
            return Ok(());
        };
        let body = match sanitize_message_content(msg, self.config.server.max_message_bytes) {
            Ok(body) => body,
            Err(e) => {
                debug!("private message from {} dropped: {}", session.label(), e);
                return Ok(());
            }
        };
        let record = match self
            .engine
            .record_private_message(key, name, to, &body, client_id)
            .await?
        {
            Outcome::Applied(record) => record,
            Outcome::Rejected(why) => {
                self.dropped(session, "private-message", &why);
                return Ok(());
            }
        };

        let delivered_live = {
            let presence = self.presence();
            presence.lookup(&record.to).is_some_and(|handle| {
                handle.send(ServerEvent::PrivateMessage {
                    from: record.from.clone(),
                    msg: record.body.clone(),
                    id: record.id.clone(),
                    to: None,
                    is_from_me: None,
                })
            })
        };
        if delivered_live {
            metrics::inc_private_live();
        } else {
            self.notifier.enqueue(&record.to, &record.from, &record.body);
        }
        debug!(
            "private message {} {} -> {} ({})",
            escape_log(&record.id),
            escape_log(&record.from),
            escape_log(&record.to),
            if delivered_live { "live" } else { "buffered" }
        );

        self.send_to(
            session.conn_id,
            ServerEvent::PrivateMessage {
                from: record.from,
                msg: record.body,
                id: record.id,
                to: Some(record.to),
                is_from_me: Some(true),
            },
        );
        Ok(())
    }

    /// Broadcast an announcement now, then push it to every token holder in
    /// the background, one dispatch per profile.
    pub fn announce(&self, text: &str) {
        let text = match sanitize_message_content(text, self.config.server.max_message_bytes) {
            Ok(text) => text,
            Err(e) => {
                debug!("announcement dropped: {}", e);
                return;
            }
        };
        let id = uuid::Uuid::new_v4().to_string();
        let reached = self.broadcast(&ServerEvent::Announcement {
            text: text.clone(),
            id: Some(id.clone()),
        });
        info!("announcement {} sent to {} connection(s)", id, reached);

        let store = self.engine.store().clone();
        let push = self.push.clone();
        let payload = PushPayload::new(
            "Announcement",
            truncate_preview(&text, self.config.notifications.preview_chars),
        )
        .with_kind("announcement");
        tokio::spawn(async move {
            let profiles = match store.list_profiles() {
                Ok(profiles) => profiles,
                Err(e) => {
                    warn!("announcement push skipped: cannot list profiles: {}", e);
                    return;
                }
            };
            for (key, profile) in profiles {
                if profile.push_tokens.is_empty() {
                    continue;
                }
                let tokens: Vec<String> = profile.push_tokens.into_iter().collect();
                match push.send(&tokens, &payload).await {
                    Ok(()) => metrics::inc_push_sent(),
                    Err(e) => {
                        metrics::inc_push_failed();
                        warn!(
                            target: "heistline::push",
                            "announcement push to {} failed: {}",
                            short_key(&key),
                            e
                        );
                    }
                }
            }
        });
    }

    /// Run the clock and the TCP gateway until Ctrl-C, then flush pending
    /// notifications.
    pub async fn run(self: Arc<Self>, bind_addr: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("failed to bind {}", bind_addr))?;
        info!(
            "{} listening on {}",
            self.config.server.name,
            listener.local_addr().map(|a| a.to_string()).unwrap_or_else(|_| bind_addr.to_string())
        );

        let clock = spawn_clock(
            self.clone(),
            std::time::Duration::from_secs(self.config.server.clock_interval_secs.max(1)),
            zone_from_name(&self.config.server.clock_timezone),
        );
        let gateway = tokio::spawn(crate::server::gateway::serve(self.clone(), listener));

        tokio::select! {
            res = gateway => {
                match res {
                    Ok(Ok(())) => info!("gateway stopped"),
                    Ok(Err(e)) => warn!("gateway failed: {}", e),
                    Err(e) => warn!("gateway task aborted: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
            }
        }

        clock.abort();
        self.shutdown().await;
        Ok(())
    }

    pub async fn shutdown(&self) {
        info!("Shutting down game server...");
        self.notifier.shutdown().await;
        info!("Final counters: {}", metrics::snapshot());
        info!("Game server shutdown complete");
    }
}
