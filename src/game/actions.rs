//! Profile mutations: registration, bank robbery and travel.
//!
//! Every operation that reads, changes and writes a profile holds the
//! account's [`AccountLocks`] guard for the whole sequence, so two requests
//! for the same account can never interleave between the read and the write.
//! Requests that fail a precondition come back as [`Outcome::Rejected`]; the
//! server turns those into silent drops.

use std::ops::RangeInclusive;
use std::sync::Arc;

use log::{debug, info};
use rand::Rng;

use crate::config::GameConfig;
use crate::game::errors::GameError;
use crate::game::locks::AccountLocks;
use crate::game::storage::ProfileStore;
use crate::game::types::{now_millis, MessageRecord, PlayerProfile};
use crate::game::world::WorldMap;
use crate::logutil::{escape_log, short_key};
use crate::metrics;
use crate::validation::{validate_display_name, validate_push_token};

/// Why a request changed nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// No profile under this account key (never registered, or dead).
    UnknownAccount,
    InvalidAccountKey,
    InvalidDisplayName(String),
    Cooldown { remaining_ms: i64 },
    UnknownDestination(String),
    /// No profile carries this display name.
    UnknownRecipient(String),
    AlreadyThere,
    InsufficientFunds { cost: u64, balance: u64 },
    InvalidPushToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Applied(T),
    Rejected(Rejection),
}

impl<T> Outcome<T> {
    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(v) => Some(v),
            Outcome::Rejected(_) => None,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Outcome::Applied(_) => None,
            Outcome::Rejected(r) => Some(r),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub profile: PlayerProfile,
    /// True when this call created the profile.
    pub created: bool,
}

#[derive(Debug, Clone)]
pub struct RobReport {
    /// Stats after the robbery. When `died` is set this is the last view of
    /// a profile that no longer exists in the store.
    pub profile: PlayerProfile,
    pub reward: u64,
    pub health_lost: u8,
    pub died: bool,
}

#[derive(Debug, Clone)]
pub struct RobRules {
    pub cooldown_ms: i64,
    pub reward: RangeInclusive<u64>,
    pub health_loss: RangeInclusive<u8>,
}

impl RobRules {
    pub fn from_config(game: &GameConfig) -> Self {
        Self {
            cooldown_ms: game.rob_cooldown_ms,
            reward: game.rob_reward_min..=game.rob_reward_max,
            health_loss: game.rob_health_loss_min..=game.rob_health_loss_max,
        }
    }
}

pub struct ActionEngine {
    store: Arc<dyn ProfileStore>,
    world: WorldMap,
    rules: RobRules,
    starting_balance: u64,
    starting_health: u8,
    locks: AccountLocks,
}

impl ActionEngine {
    pub fn new(store: Arc<dyn ProfileStore>, game: &GameConfig) -> Result<Self, GameError> {
        Ok(Self {
            store,
            world: WorldMap::from_config(&game.locations)?,
            rules: RobRules::from_config(game),
            starting_balance: game.starting_balance,
            starting_health: game.starting_health,
            locks: AccountLocks::new(),
        })
    }

    pub fn world(&self) -> &WorldMap {
        &self.world
    }

    pub fn store(&self) -> &Arc<dyn ProfileStore> {
        &self.store
    }

    pub fn rules(&self) -> &RobRules {
        &self.rules
    }

    /// Current stored profile, read without taking the account lock.
    pub fn profile(&self, key: &str) -> Result<Option<PlayerProfile>, GameError> {
        self.store.get(key)
    }

    fn fresh_profile(&self, display_name: &str) -> PlayerProfile {
        let mut rng = rand::thread_rng();
        let location = self.world.random_location(&mut rng).to_string();
        PlayerProfile::new(
            display_name,
            self.starting_balance,
            self.starting_health,
            &location,
        )
    }

    /// Load or create the profile for `key`.
    ///
    /// `on_registered` runs while the account lock is still held, so callers
    /// can publish presence for the account without racing a second
    /// registration of the same key.
    pub async fn register<F>(
        &self,
        key: &str,
        display_name: &str,
        on_registered: F,
    ) -> Result<Outcome<Registration>, GameError>
    where
        F: FnOnce(&PlayerProfile),
    {
        if key.trim().is_empty() {
            return Ok(Outcome::Rejected(Rejection::InvalidAccountKey));
        }
        let display_name = match validate_display_name(display_name) {
            Ok(name) => name,
            Err(e) => return Ok(Outcome::Rejected(Rejection::InvalidDisplayName(e.to_string()))),
        };

        let _guard = self.locks.lock(key).await;
        let (profile, created) = match self.store.get(key)? {
            Some(mut existing) => {
                if existing.display_name != display_name {
                    info!(
                        target: "heistline::actions",
                        "account {} renamed {} -> {}",
                        short_key(key),
                        escape_log(&existing.display_name),
                        escape_log(&display_name)
                    );
                    existing.display_name = display_name;
                    self.store.put(key, &existing)?;
                }
                (existing, false)
            }
            None => {
                let fresh = self.fresh_profile(&display_name);
                self.store.put(key, &fresh)?;
                info!(
                    target: "heistline::actions",
                    "new profile for {} ({}) starting in {}",
                    short_key(key),
                    escape_log(&fresh.display_name),
                    fresh.location
                );
                (fresh, true)
            }
        };
        on_registered(&profile);
        Ok(Outcome::Applied(Registration { profile, created }))
    }

    pub async fn rob_bank(&self, key: &str) -> Result<Outcome<RobReport>, GameError> {
        self.rob_bank_at(key, now_millis()).await
    }

    /// Robbery evaluated against an explicit wall-clock time in epoch milliseconds.
    pub async fn rob_bank_at(&self, key: &str, now: i64) -> Result<Outcome<RobReport>, GameError> {
        let _guard = self.locks.lock(key).await;
        let Some(mut profile) = self.store.get(key)? else {
            return Ok(Outcome::Rejected(Rejection::UnknownAccount));
        };

        // A clock that moved backwards also lands here, keeping last_rob monotonic.
        let elapsed = now - profile.last_rob;
        if elapsed < self.rules.cooldown_ms {
            metrics::inc_robs_rejected();
            return Ok(Outcome::Rejected(Rejection::Cooldown {
                remaining_ms: self.rules.cooldown_ms - elapsed,
            }));
        }

        let (reward, loss) = {
            let mut rng = rand::thread_rng();
            (
                rng.gen_range(self.rules.reward.clone()),
                rng.gen_range(self.rules.health_loss.clone()),
            )
        };
        profile.balance = profile.balance.saturating_add(reward);
        let health_lost = profile.apply_damage(loss);
        profile.last_rob = now;
        self.store.put(key, &profile)?;
        metrics::inc_robs_applied();

        let died = profile.is_dead();
        if died {
            self.store.delete(key)?;
            metrics::inc_deaths();
            info!(
                target: "heistline::actions",
                "{} died robbing a bank; profile {} deleted",
                escape_log(&profile.display_name),
                short_key(key)
            );
        } else {
            debug!(
                target: "heistline::actions",
                "{} robbed: +${} -{} HP",
                short_key(key),
                reward,
                health_lost
            );
        }

        Ok(Outcome::Applied(RobReport {
            profile,
            reward,
            health_lost,
            died,
        }))
    }

    pub async fn travel(
        &self,
        key: &str,
        destination: &str,
    ) -> Result<Outcome<PlayerProfile>, GameError> {
        let outcome = self.travel_inner(key, destination).await?;
        match &outcome {
            Outcome::Applied(_) => metrics::inc_travels_applied(),
            Outcome::Rejected(_) => metrics::inc_travels_rejected(),
        }
        Ok(outcome)
    }

    async fn travel_inner(
        &self,
        key: &str,
        destination: &str,
    ) -> Result<Outcome<PlayerProfile>, GameError> {
        let Some(cost) = self.world.cost(destination) else {
            return Ok(Outcome::Rejected(Rejection::UnknownDestination(
                destination.to_string(),
            )));
        };

        let _guard = self.locks.lock(key).await;
        let Some(mut profile) = self.store.get(key)? else {
            return Ok(Outcome::Rejected(Rejection::UnknownAccount));
        };
        if profile.location == destination {
            return Ok(Outcome::Rejected(Rejection::AlreadyThere));
        }
        if profile.balance < cost {
            return Ok(Outcome::Rejected(Rejection::InsufficientFunds {
                cost,
                balance: profile.balance,
            }));
        }

        profile.balance -= cost;
        profile.location = destination.to_string();
        self.store.put(key, &profile)?;
        debug!(
            target: "heistline::actions",
            "{} travelled to {} for ${}",
            short_key(key),
            destination,
            cost
        );
        Ok(Outcome::Applied(profile))
    }

    /// Append one record to the history of `key`. Returns false when the
    /// account has no profile.
    pub async fn append_message(&self, key: &str, record: MessageRecord) -> Result<bool, GameError> {
        let _guard = self.locks.lock(key).await;
        let Some(mut profile) = self.store.get(key)? else {
            return Ok(false);
        };
        profile.messages.push(record);
        self.store.put(key, &profile)?;
        Ok(true)
    }

    pub async fn mark_read(
        &self,
        key: &str,
        ids: &[String],
    ) -> Result<Outcome<PlayerProfile>, GameError> {
        let _guard = self.locks.lock(key).await;
        let Some(mut profile) = self.store.get(key)? else {
            return Ok(Outcome::Rejected(Rejection::UnknownAccount));
        };
        if profile.mark_read(ids) > 0 {
            self.store.put(key, &profile)?;
        }
        Ok(Outcome::Applied(profile))
    }

    pub async fn add_push_token(
        &self,
        key: &str,
        token: &str,
    ) -> Result<Outcome<PlayerProfile>, GameError> {
        let Some(token) = validate_push_token(token) else {
            return Ok(Outcome::Rejected(Rejection::InvalidPushToken));
        };
        let _guard = self.locks.lock(key).await;
        let Some(mut profile) = self.store.get(key)? else {
            return Ok(Outcome::Rejected(Rejection::UnknownAccount));
        };
        if profile.push_tokens.insert(token) {
            self.store.put(key, &profile)?;
        }
        Ok(Outcome::Applied(profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::game::storage::MemoryProfileStore;

    fn engine() -> ActionEngine {
        let store: Arc<dyn ProfileStore> = Arc::new(MemoryProfileStore::new());
        ActionEngine::new(store, &Config::default().game).unwrap()
    }

    #[tokio::test]
    async fn register_rejects_blank_key_and_bad_name() {
        let engine = engine();
        let out = engine.register("  ", "Alice", |_| {}).await.unwrap();
        assert_eq!(out.rejection(), Some(&Rejection::InvalidAccountKey));
        let out = engine.register("k", "x", |_| {}).await.unwrap();
        assert!(matches!(
            out.rejection(),
            Some(Rejection::InvalidDisplayName(_))
        ));
        assert!(engine.profile("k").unwrap().is_none());
    }

    #[tokio::test]
    async fn register_runs_callback_once_with_profile() {
        let engine = engine();
        let mut seen = None;
        let reg = engine
            .register("k", "Alice", |p| seen = Some(p.display_name.clone()))
            .await
            .unwrap()
            .applied()
            .unwrap();
        assert!(reg.created);
        assert_eq!(seen.as_deref(), Some("Alice"));
        let again = engine
            .register("k", "Alice", |_| {})
            .await
            .unwrap()
            .applied()
            .unwrap();
        assert!(!again.created);
        assert_eq!(again.profile, reg.profile);
    }

    #[tokio::test]
    async fn unknown_destination_is_checked_before_account() {
        let engine = engine();
        let out = engine.travel("nobody", "Atlantis").await.unwrap();
        assert_eq!(
            out.rejection(),
            Some(&Rejection::UnknownDestination("Atlantis".to_string()))
        );
    }

    #[tokio::test]
    async fn push_tokens_are_a_set() {
        let engine = engine();
        engine.register("k", "Alice", |_| {}).await.unwrap();
        engine.add_push_token("k", "tok-1").await.unwrap();
        let p = engine
            .add_push_token("k", " tok-1 ")
            .await
            .unwrap()
            .applied()
            .unwrap();
        assert_eq!(p.push_tokens.len(), 1);
        let out = engine.add_push_token("k", "").await.unwrap();
        assert_eq!(out.rejection(), Some(&Rejection::InvalidPushToken));
    }
}
