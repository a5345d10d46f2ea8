//! Process-wide counters for game actions and the messaging pipeline.
use std::sync::atomic::{AtomicU64, Ordering};

static ROBS_APPLIED: AtomicU64 = AtomicU64::new(0);
static ROBS_REJECTED: AtomicU64 = AtomicU64::new(0);
static TRAVELS_APPLIED: AtomicU64 = AtomicU64::new(0);
static TRAVELS_REJECTED: AtomicU64 = AtomicU64::new(0);
static DEATHS: AtomicU64 = AtomicU64::new(0);
static PRIVATE_LIVE: AtomicU64 = AtomicU64::new(0);
static PRIVATE_BUFFERED: AtomicU64 = AtomicU64::new(0);
static BATCHES_FLUSHED: AtomicU64 = AtomicU64::new(0);
static PUSH_SENT: AtomicU64 = AtomicU64::new(0);
static PUSH_FAILED: AtomicU64 = AtomicU64::new(0);

pub fn inc_robs_applied() {
    ROBS_APPLIED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_robs_rejected() {
    ROBS_REJECTED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_travels_applied() {
    TRAVELS_APPLIED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_travels_rejected() {
    TRAVELS_REJECTED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_deaths() {
    DEATHS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_private_live() {
    PRIVATE_LIVE.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_private_buffered() {
    PRIVATE_BUFFERED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_batches_flushed() {
    BATCHES_FLUSHED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_push_sent() {
    PUSH_SENT.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_push_failed() {
    PUSH_FAILED.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub robs_applied: u64,
    pub robs_rejected: u64,
    pub travels_applied: u64,
    pub travels_rejected: u64,
    pub deaths: u64,
    pub private_live: u64,
    pub private_buffered: u64,
    pub batches_flushed: u64,
    pub push_sent: u64,
    pub push_failed: u64,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        robs_applied: ROBS_APPLIED.load(Ordering::Relaxed),
        robs_rejected: ROBS_REJECTED.load(Ordering::Relaxed),
        travels_applied: TRAVELS_APPLIED.load(Ordering::Relaxed),
        travels_rejected: TRAVELS_REJECTED.load(Ordering::Relaxed),
        deaths: DEATHS.load(Ordering::Relaxed),
        private_live: PRIVATE_LIVE.load(Ordering::Relaxed),
        private_buffered: PRIVATE_BUFFERED.load(Ordering::Relaxed),
        batches_flushed: BATCHES_FLUSHED.load(Ordering::Relaxed),
        push_sent: PUSH_SENT.load(Ordering::Relaxed),
        push_failed: PUSH_FAILED.load(Ordering::Relaxed),
    }
}

impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "robs={}/{} travels={}/{} deaths={} private live={} buffered={} batches={} push ok={} failed={}",
            self.robs_applied,
            self.robs_rejected,
            self.travels_applied,
            self.travels_rejected,
            self.deaths,
            self.private_live,
            self.private_buffered,
            self.batches_flushed,
            self.push_sent,
            self.push_failed
        )
    }
}
