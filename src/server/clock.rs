//! Periodic wall-clock broadcast.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use log::{trace, warn};
use tokio::task::JoinHandle;

use crate::server::protocol::ServerEvent;
use crate::server::GameServer;

/// Zone for an IANA `name`, falling back to UTC when the name is unknown.
pub fn zone_from_name(name: &str) -> Tz {
    name.trim().parse::<Tz>().unwrap_or_else(|e| {
        warn!("clock timezone '{}' not recognised ({}); using UTC", name, e);
        Tz::UTC
    })
}

/// 24-hour `HH:MM` for `now` in `zone`, daylight saving included.
pub fn format_clock(now: DateTime<Utc>, zone: Tz) -> String {
    now.with_timezone(&zone).format("%H:%M").to_string()
}

/// Broadcast `time` to every connection every `interval`, starting immediately.
pub fn spawn_clock(server: Arc<GameServer>, interval: Duration, zone: Tz) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let time = format_clock(Utc::now(), zone);
            let reached = server.broadcast(&ServerEvent::Time { time: time.clone() });
            trace!("clock {} sent to {} connection(s)", time, reached);
        }
    })
}
