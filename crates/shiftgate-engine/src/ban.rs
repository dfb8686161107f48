//! Ban duration policy.

use chrono::Duration;

/// Decides how long a ban lasts given the violation history.
pub trait BanPolicy: Send + Sync {
    /// Ban duration for an IP that has accumulated
    /// `violations_count` violations.
    fn ban_duration(&self, violations_count: u32) -> Duration;
}

/// Exponential backoff: the base duration doubles (by the configured
/// multiplier) for each completed violation threshold beyond the
/// first, capped at a maximum.
pub struct EscalatingBanPolicy {
    base: Duration,
    multiplier: f64,
    max: Duration,
    threshold: u32,
}

impl EscalatingBanPolicy {
    pub fn new(base: Duration, multiplier: f64, max: Duration, threshold: u32) -> Self {
        Self {
            base,
            multiplier,
            max,
            threshold,
        }
    }

    pub fn from_config(config: &crate::config::GovernanceConfig) -> Self {
        Self::new(
            Duration::seconds(config.ban_duration_secs as i64),
            config.ban_backoff_multiplier,
            Duration::seconds(config.max_ban_duration_secs as i64),
            config.ban_after_violations,
        )
    }
}

impl BanPolicy for EscalatingBanPolicy {
    fn ban_duration(&self, violations_count: u32) -> Duration {
        let threshold = self.threshold.max(1);
        // First ban fires at `threshold` violations; each further full
        // threshold escalates one step.
        let steps = violations_count.saturating_sub(threshold) / threshold;
        let factor = self.multiplier.powi(steps as i32);
        let secs = (self.base.num_seconds() as f64 * factor) as i64;
        Duration::seconds(secs).min(self.max)
    }
}
