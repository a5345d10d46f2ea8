//! # Configuration Management Module
//!
//! All tunables of the server live in one TOML file. Every section has a
//! `Default` so `heistline init` can write a complete starter file, and
//! [`Config::validate`] rejects combinations the game engine cannot honour.
//!
//! ## Configuration Structure
//!
//! - [`ServerConfig`] - listener address, clock broadcast, message limits
//! - [`GameConfig`] - starting stats, robbery rules, the location/cost table
//! - [`NotificationConfig`] - offline message batching window and preview size
//! - [`PushConfig`] - push notification endpoint
//! - [`StorageConfig`] - profile database location
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use heistline::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Listening on {}", config.server.bind_addr);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [server]
//! name = "Heistline"
//! bind_addr = "0.0.0.0:3000"
//! clock_interval_secs = 30
//! clock_timezone = "Europe/London"
//!
//! [game]
//! rob_cooldown_ms = 60000
//!
//! [[game.locations]]
//! name = "London"
//! cost = 50
//!
//! [notifications]
//! debounce_ms = 5000
//! ```

use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub bind_addr: String,
    /// Seconds between `time` broadcasts.
    #[serde(default = "default_clock_interval_secs")]
    pub clock_interval_secs: u64,
    /// IANA zone name used to render the broadcast clock.
    #[serde(default = "default_clock_timezone")]
    pub clock_timezone: String,
    /// Upper bound on chat and private message bodies, in bytes.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

fn default_clock_interval_secs() -> u64 {
    30
}

fn default_clock_timezone() -> String {
    "Europe/London".to_string()
}

fn default_max_message_bytes() -> usize {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocationConfig {
    pub name: String,
    pub cost: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub starting_balance: u64,
    pub starting_health: u8,
    pub rob_cooldown_ms: i64,
    pub rob_reward_min: u64,
    pub rob_reward_max: u64,
    pub rob_health_loss_min: u8,
    pub rob_health_loss_max: u8,
    pub locations: Vec<LocationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Fixed batching window opened by the first buffered message.
    pub debounce_ms: u64,
    /// Bodies longer than this many characters are cut to `preview_chars - 3` plus "...".
    pub preview_chars: usize,
}

impl NotificationConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    pub enabled: bool,
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub game: GameConfig,
    pub notifications: NotificationConfig,
    pub push: PushConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let game = &self.game;
        if game.locations.is_empty() {
            return Err(anyhow!("[game] needs at least one location"));
        }
        for (i, loc) in game.locations.iter().enumerate() {
            let name = loc.name.trim();
            if name.is_empty() {
                return Err(anyhow!("[game] location #{} has a blank name", i + 1));
            }
            if game.locations[..i].iter().any(|o| o.name.trim() == name) {
                return Err(anyhow!("[game] duplicate location '{}'", name));
            }
        }
        if game.rob_reward_min > game.rob_reward_max {
            return Err(anyhow!("[game] rob_reward_min exceeds rob_reward_max"));
        }
        if game.rob_health_loss_min > game.rob_health_loss_max {
            return Err(anyhow!(
                "[game] rob_health_loss_min exceeds rob_health_loss_max"
            ));
        }
        if game.starting_health == 0 || game.starting_health > 100 {
            return Err(anyhow!("[game] starting_health must be within 1..=100"));
        }
        if game.rob_cooldown_ms < 0 {
            return Err(anyhow!("[game] rob_cooldown_ms cannot be negative"));
        }
        if self.notifications.debounce_ms == 0 {
            return Err(anyhow!("[notifications] debounce_ms must be positive"));
        }
        if self.notifications.preview_chars < 4 {
            return Err(anyhow!("[notifications] preview_chars must be at least 4"));
        }
        if self.server.clock_interval_secs == 0 {
            return Err(anyhow!("[server] clock_interval_secs must be positive"));
        }
        if self.server.clock_timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(anyhow!(
                "[server] unknown clock_timezone '{}'",
                self.server.clock_timezone
            ));
        }
        Ok(())
    }
}

fn default_locations() -> Vec<LocationConfig> {
    [
        ("London", 50),
        ("Paris", 60),
        ("New York", 100),
        ("Dubai", 120),
        ("Tokyo", 150),
    ]
    .into_iter()
    .map(|(name, cost)| LocationConfig {
        name: name.to_string(),
        cost,
    })
    .collect()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                name: "Heistline".to_string(),
                bind_addr: "0.0.0.0:3000".to_string(),
                clock_interval_secs: default_clock_interval_secs(),
                clock_timezone: default_clock_timezone(),
                max_message_bytes: default_max_message_bytes(),
            },
            game: GameConfig {
                starting_balance: 0,
                starting_health: 100,
                rob_cooldown_ms: 60_000,
                rob_reward_min: 10,
                rob_reward_max: 100,
                rob_health_loss_min: 10,
                rob_health_loss_max: 20,
                locations: default_locations(),
            },
            notifications: NotificationConfig {
                debounce_ms: 5000,
                preview_chars: 50,
            },
            push: PushConfig {
                enabled: false,
                endpoint: "https://exp.host/--/api/v2/push/send".to_string(),
                access_token: None,
                timeout_seconds: 10,
            },
            storage: StorageConfig {
                data_dir: "./data".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("heistline.log".to_string()),
            },
        }
    }
}
