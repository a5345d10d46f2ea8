//! # Heistline - a small multiplayer text game server
//!
//! Players register with an account key and a display name, rob banks for
//! cash at the cost of health, travel between cities, chat in public and
//! send each other private messages. Offline recipients get their private
//! messages batched into a single push notification per window.
//!
//! ## Features
//!
//! - **Action Engine**: registration, bank robbery with a hard cooldown,
//!   priced travel, and permadeath when health reaches zero.
//! - **Per-account serialization**: every read-modify-write on a profile runs
//!   under that account's lock, so concurrent requests cannot double-apply.
//! - **Presence**: last-connect-wins routing by display name with
//!   stale-disconnect protection and an `online-players` broadcast.
//! - **Notification batching**: fixed-window debounce per offline recipient,
//!   one aggregated push per window.
//! - **Persistence**: sled-backed profile store with a display-name index.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use heistline::config::Config;
//! use heistline::server::GameServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let bind = config.server.bind_addr.clone();
//!     let server = Arc::new(GameServer::from_config(config, false)?);
//!     server.run(&bind).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`game`] - profiles, world map, profile store and the action engine
//! - [`server`] - wire protocol, presence, notifications, push and the TCP gateway
//! - [`config`] - configuration management and validation
//! - [`validation`] - input validation and sanitization utilities
//! - [`metrics`] - process-wide counters
//! - [`logutil`] - helpers for safe log lines
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  TCP Gateway    │ ← JSON lines in/out
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │  GameServer     │ ← presence, notifier, clock
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │  ActionEngine   │ ← game rules, per-account locks
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │  ProfileStore   │ ← sled persistence
//! └─────────────────┘
//! ```

pub mod config;
pub mod game;
pub mod logutil;
pub mod metrics;
pub mod server;
pub mod validation;
