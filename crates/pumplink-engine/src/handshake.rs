//! Handshake gate and heartbeat bookkeeping.
//!
//! The gate opens on the first CRC-valid status-bearing frame and stays
//! open until the link is closed. The heartbeat only decides *whether* a
//! tick sends a poll; the timer itself belongs to whoever drives the
//! engine.

use chrono::{DateTime, Utc};
use pumplink_core::constants::MIN_POLL_INTERVAL_MS;
use std::time::Duration;

/// Ticks between heartbeat log lines.
const LOG_EVERY_N_TICKS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandshakeState {
    ok: bool,
    ever_ok: bool,
    last_ok_at: Option<DateTime<Utc>>,
}

impl HandshakeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a CRC-valid status-bearing frame.
    ///
    /// Returns `true` only when this frame opened the gate.
    pub fn observe(&mut self) -> bool {
        self.last_ok_at = Some(Utc::now());
        let opened = !self.ok;
        self.ok = true;
        self.ever_ok = true;
        opened
    }

    pub fn is_open(&self) -> bool {
        self.ok
    }

    /// Whether the gate was open at any point, across resets.
    pub fn ever_open(&self) -> bool {
        self.ever_ok
    }

    pub fn last_ok_at(&self) -> Option<DateTime<Utc>> {
        self.last_ok_at
    }

    /// Close the gate for a new session.
    pub fn reset(&mut self) {
        self.ok = false;
    }
}

/// Liveness poll settings and tick counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    enabled: bool,
    interval: Duration,
    ticks: u64,
}

impl Heartbeat {
    pub fn new(enabled: bool, interval: Duration) -> Self {
        Self {
            enabled,
            interval: clamp_interval(interval),
            ticks: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn configure(&mut self, enabled: bool, interval: Duration) {
        self.enabled = enabled;
        self.interval = clamp_interval(interval);
        self.ticks = 0;
    }

    /// Count a tick. Returns `true` when this tick should be logged.
    pub fn tick(&mut self) -> bool {
        self.ticks += 1;
        self.ticks % LOG_EVERY_N_TICKS == 0
    }
}

fn clamp_interval(interval: Duration) -> Duration {
    interval.max(Duration::from_millis(MIN_POLL_INTERVAL_MS))
}
