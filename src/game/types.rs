use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};

pub const PROFILE_SCHEMA_VERSION: u8 = 1;

/// Upper bound for [`PlayerProfile::health`].
pub const MAX_HEALTH: u8 = 100;

/// Milliseconds since the Unix epoch, wall clock.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Which side of a private conversation a stored [`MessageRecord`] belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

/// One private message as kept in a player's history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: String,
    pub from: String,
    pub to: String,
    pub body: String,
    /// Epoch milliseconds when the server accepted the message.
    pub timestamp: i64,
    pub read: bool,
    pub direction: Direction,
}

impl MessageRecord {
    /// Build the sender-side and recipient-side copies of one message.
    ///
    /// Both copies share the id and timestamp. The sender's copy is already
    /// read; the recipient's is not.
    pub fn pair(id: &str, from: &str, to: &str, body: &str, timestamp: i64) -> (Self, Self) {
        let sent = Self {
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            body: body.to_string(),
            timestamp,
            read: true,
            direction: Direction::Sent,
        };
        let received = Self {
            read: false,
            direction: Direction::Received,
            ..sent.clone()
        };
        (sent, received)
    }
}

/// Mutable per-account game state.
///
/// `balance` is unsigned so it can never go negative; `health` stays in
/// `0..=MAX_HEALTH` through [`PlayerProfile::apply_damage`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    pub display_name: String,
    pub balance: u64,
    pub health: u8,
    /// Epoch milliseconds of the last successful robbery; 0 when never robbed.
    pub last_rob: i64,
    pub location: String,
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
    #[serde(default)]
    pub push_tokens: BTreeSet<String>,
}

impl PlayerProfile {
    pub fn new(display_name: &str, balance: u64, health: u8, location: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            balance,
            health: health.min(MAX_HEALTH),
            last_rob: 0,
            location: location.to_string(),
            messages: Vec::new(),
            push_tokens: BTreeSet::new(),
        }
    }

    /// Subtract `amount` health, flooring at zero. Returns the health actually lost.
    pub fn apply_damage(&mut self, amount: u8) -> u8 {
        let before = self.health;
        self.health = self.health.saturating_sub(amount);
        before - self.health
    }

    pub fn is_dead(&self) -> bool {
        self.health == 0
    }

    pub fn unread_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| !m.read && m.direction == Direction::Received)
            .count()
    }

    /// Flag the given message ids as read. Returns how many records changed.
    pub fn mark_read(&mut self, ids: &[String]) -> usize {
        let mut changed = 0;
        for record in self.messages.iter_mut() {
            if !record.read && ids.iter().any(|id| *id == record.id) {
                record.read = true;
                changed += 1;
            }
        }
        changed
    }
}
