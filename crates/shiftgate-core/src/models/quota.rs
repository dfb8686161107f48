//! Per-IP quota and ban-state domain model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Kind of governed action charged against a quota window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Request,
    Train,
    Predict,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Request => "request",
            ActionKind::Train => "train",
            ActionKind::Predict => "predict",
        }
    }
}

/// Per-IP counters and ban state gating resource-consuming
/// operations. One record per IP, created lazily on first use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaRecord {
    pub ip_address: String,
    /// Live session count for this IP. Incremented on session
    /// creation, floor-0 decremented on deletion.
    pub models_count: u32,
    pub storage_used_mb: f64,
    pub requests_count: u32,
    pub train_count: u32,
    pub predictions_count: u32,
    /// Monotonically non-decreasing except on administrative reset.
    pub violations_count: u32,
    pub is_banned: bool,
    /// Meaningful only while `is_banned` is true.
    pub banned_until: Option<DateTime<Utc>>,
    pub last_reset: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl QuotaRecord {
    /// Whether the IP is banned as of `now`. A ban with no recorded
    /// end is treated as still in force.
    pub fn is_banned_at(&self, now: DateTime<Utc>) -> bool {
        if !self.is_banned {
            return false;
        }
        match self.banned_until {
            Some(until) => now < until,
            None => true,
        }
    }

    /// Zero the windowed counters if the reset window has elapsed.
    /// Returns true when a reset was applied.
    pub fn reset_window_if_elapsed(&mut self, now: DateTime<Utc>, window: Duration) -> bool {
        if now - self.last_reset <= window {
            return false;
        }
        self.requests_count = 0;
        self.train_count = 0;
        self.predictions_count = 0;
        self.last_reset = now;
        true
    }

    /// Current value of the windowed counter for `kind`.
    pub fn counter_for(&self, kind: ActionKind) -> u32 {
        match kind {
            ActionKind::Request => self.requests_count,
            ActionKind::Train => self.train_count,
            ActionKind::Predict => self.predictions_count,
        }
    }

    /// Charge one `kind` action. Every charge also bumps the generic
    /// request counter; train/predict additionally bump their own.
    pub fn charge(&mut self, kind: ActionKind) {
        self.requests_count += 1;
        match kind {
            ActionKind::Request => {}
            ActionKind::Train => self.train_count += 1,
            ActionKind::Predict => self.predictions_count += 1,
        }
    }
}
