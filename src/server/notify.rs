//! Offline private-message notification batching.
//!
//! Messages for a recipient without a live connection are buffered per
//! recipient display name. Each recipient is either idle (no entry) or
//! buffering with a fixed deadline:
//!
//! ```text
//! Idle --enqueue--> Buffering(now + window) --deadline--> flush --> Idle
//!                         ^          |
//!                         +-enqueue--+   (appends; deadline unchanged)
//! ```
//!
//! The deadline is set by the first message and never extended, so a
//! steady trickle of messages still produces one push per window. Flushing
//! composes a single payload from the buffer and hands it to the
//! [`PushSender`] on a separate task; the buffer is cleared before dispatch
//! whatever the outcome. A reconnect does not cancel a pending flush.
//!
//! Like the rest of the server, the batcher is an actor: callers hold a
//! cheap [`NotifierHandle`] and talk to a single task over a channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::game::ProfileStore;
use crate::logutil::escape_log;
use crate::metrics;
use crate::server::push::{PushPayload, PushSender};
use crate::validation::truncate_preview;

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub debounce: Duration,
    pub preview_chars: usize,
}

impl NotifierConfig {
    pub fn from_config(cfg: &crate::config::NotificationConfig) -> Self {
        Self {
            debounce: cfg.debounce(),
            preview_chars: cfg.preview_chars,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub sender: String,
    pub body: String,
}

#[derive(Debug)]
struct PendingBatch {
    entries: Vec<PendingEntry>,
    deadline: Instant,
}

pub enum NotifyCommand {
    Enqueue {
        recipient: String,
        entry: PendingEntry,
    },
    Snapshot(oneshot::Sender<NotifierStats>),
    Shutdown(oneshot::Sender<()>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifierStats {
    /// Recipients currently buffering.
    pub buffering: usize,
    /// Entries waiting across all buffers.
    pub buffered_entries: usize,
    pub enqueued_total: u64,
    pub batches_flushed: u64,
}

#[derive(Clone, Debug)]
pub struct NotifierHandle {
    tx: mpsc::UnboundedSender<NotifyCommand>,
}

impl NotifierHandle {
    pub fn enqueue(&self, recipient: &str, sender: &str, body: &str) {
        let _ = self.tx.send(NotifyCommand::Enqueue {
            recipient: recipient.to_string(),
            entry: PendingEntry {
                sender: sender.to_string(),
                body: body.to_string(),
            },
        });
    }

    pub async fn snapshot(&self) -> Option<NotifierStats> {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(NotifyCommand::Snapshot(tx)).is_ok() {
            rx.await.ok()
        } else {
            None
        }
    }

    /// Flush everything still buffered, then stop the actor.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        let _ = self.tx.send(NotifyCommand::Shutdown(tx));
        let _ = rx.await;
    }
}

/// Build the single push for a flushed buffer. `None` for an empty buffer.
///
/// One entry: the title names the sender and the body is the message
/// preview. Several entries: the title gives the count and the body lists
/// the distinct senders in arrival order.
pub fn compose_batch(entries: &[PendingEntry], preview_chars: usize) -> Option<PushPayload> {
    match entries {
        [] => None,
        [only] => Some(
            PushPayload::new(
                format!("New message from {}", only.sender),
                truncate_preview(&only.body, preview_chars),
            )
            .with_kind("private-message"),
        ),
        many => {
            let mut senders: Vec<&str> = Vec::new();
            for entry in many {
                if !senders.contains(&entry.sender.as_str()) {
                    senders.push(&entry.sender);
                }
            }
            Some(
                PushPayload::new(
                    format!("You have {} new messages", many.len()),
                    format!("From: {}", senders.join(", ")),
                )
                .with_kind("private-message"),
            )
        }
    }
}

async fn flush_batch(
    store: Arc<dyn ProfileStore>,
    push: Arc<dyn PushSender>,
    recipient: String,
    entries: Vec<PendingEntry>,
    preview_chars: usize,
) {
    let Some(payload) = compose_batch(&entries, preview_chars) else {
        return;
    };
    let tokens: Vec<String> = match store.find_by_display_name(&recipient) {
        Ok(Some((_, profile))) => profile.push_tokens.into_iter().collect(),
        Ok(None) => {
            debug!(
                "notify: recipient {} vanished before flush; {} message(s) not pushed",
                escape_log(&recipient),
                entries.len()
            );
            return;
        }
        Err(e) => {
            warn!(
                "notify: token lookup for {} failed: {}",
                escape_log(&recipient),
                e
            );
            return;
        }
    };
    if tokens.is_empty() {
        debug!(
            "notify: {} has no push tokens; skipping dispatch",
            escape_log(&recipient)
        );
        return;
    }
    match push.send(&tokens, &payload).await {
        Ok(()) => {
            metrics::inc_push_sent();
            debug!(
                target: "heistline::push",
                "notify: pushed {} message(s) to {} ({} token(s))",
                entries.len(),
                escape_log(&recipient),
                tokens.len()
            );
        }
        Err(e) => {
            metrics::inc_push_failed();
            warn!(
                target: "heistline::push",
                "notify: push to {} failed: {}",
                escape_log(&recipient),
                e
            );
        }
    }
}

pub fn start_notifier(
    cfg: NotifierConfig,
    store: Arc<dyn ProfileStore>,
    push: Arc<dyn PushSender>,
) -> NotifierHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<NotifyCommand>();
    let handle = NotifierHandle { tx };

    tokio::spawn(async move {
        let mut batches: HashMap<String, PendingBatch> = HashMap::new();
        let mut stats = NotifierStats::default();
        loop {
            let next_deadline = batches.values().map(|b| b.deadline).min();
            let wake_at = next_deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));
            tokio::select! {
                cmd = rx.recv() => {
                    match cmd {
                        Some(NotifyCommand::Enqueue { recipient, entry }) => {
                            stats.enqueued_total += 1;
                            metrics::inc_private_buffered();
                            let window = cfg.debounce;
                            let batch = batches.entry(recipient).or_insert_with(|| PendingBatch {
                                entries: Vec::new(),
                                deadline: Instant::now() + window,
                            });
                            batch.entries.push(entry);
                        }
                        Some(NotifyCommand::Snapshot(resp)) => {
                            let _ = resp.send(NotifierStats {
                                buffering: batches.len(),
                                buffered_entries: batches.values().map(|b| b.entries.len()).sum(),
                                ..stats.clone()
                            });
                        }
                        Some(NotifyCommand::Shutdown(done)) => {
                            for (recipient, batch) in batches.drain() {
                                stats.batches_flushed += 1;
                                metrics::inc_batches_flushed();
                                flush_batch(store.clone(), push.clone(), recipient, batch.entries, cfg.preview_chars).await;
                            }
                            let _ = done.send(());
                            break;
                        }
                        None => break,
                    }
                }
                _ = tokio::time::sleep_until(wake_at), if next_deadline.is_some() => {
                    let now = Instant::now();
                    let due: Vec<String> = batches
                        .iter()
                        .filter(|(_, b)| b.deadline <= now)
                        .map(|(name, _)| name.clone())
                        .collect();
                    for recipient in due {
                        if let Some(batch) = batches.remove(&recipient) {
                            stats.batches_flushed += 1;
                            metrics::inc_batches_flushed();
                            tokio::spawn(flush_batch(
                                store.clone(),
                                push.clone(),
                                recipient,
                                batch.entries,
                                cfg.preview_chars,
                            ));
                        }
                    }
                }
            }
        }
        debug!(
            "notifier loop terminated; {} message(s) buffered, {} batch(es) flushed",
            stats.enqueued_total, stats.batches_flushed
        );
    });

    handle
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(sender: &str, body: &str) -> PendingEntry {
        PendingEntry {
            sender: sender.to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn single_entry_names_sender() {
        let payload = compose_batch(&[entry("Bob", "see you at the bank")], 50).unwrap();
        assert_eq!(payload.title, "New message from Bob");
        assert_eq!(payload.body, "see you at the bank");
    }

    #[test]
    fn single_long_entry_is_truncated() {
        let body = "a".repeat(80);
        let payload = compose_batch(&[entry("Bob", &body)], 50).unwrap();
        assert_eq!(payload.body, format!("{}...", "a".repeat(47)));
    }

    #[test]
    fn many_entries_count_and_dedupe_senders() {
        let payload = compose_batch(
            &[entry("Bob", "1"), entry("Alice", "2"), entry("Bob", "3")],
            50,
        )
        .unwrap();
        assert_eq!(payload.title, "You have 3 new messages");
        assert_eq!(payload.body, "From: Bob, Alice");
    }

    #[test]
    fn empty_buffer_composes_nothing() {
        assert!(compose_batch(&[], 50).is_none());
    }
}
