//! Governance configuration.

/// Configuration for the governance engine.
#[derive(Debug, Clone)]
pub struct GovernanceConfig {
    /// Session lifetime in seconds (default: 604_800 = 7 days).
    pub session_ttl_secs: u64,
    /// Max live sessions per IP (default: 3).
    pub max_sessions_per_ip: u32,
    /// Max training-data storage per IP in megabytes (default: 100).
    pub max_storage_per_ip_mb: f64,
    /// Max generic requests per quota window (default: 100).
    pub requests_per_window: u32,
    /// Max training runs per quota window (default: 10).
    pub trains_per_window: u32,
    /// Max predictions per quota window (default: 200).
    pub predictions_per_window: u32,
    /// Quota window length in seconds (default: 3600 = 1 hour).
    pub quota_window_secs: u64,
    /// Violations before an automatic ban (default: 5).
    pub ban_after_violations: u32,
    /// Initial ban duration in seconds (default: 86_400 = 24 hours).
    pub ban_duration_secs: u64,
    /// Exponential backoff multiplier for repeat bans (default: 2.0).
    pub ban_backoff_multiplier: f64,
    /// Maximum ban duration in seconds (default: 604_800 = 7 days).
    pub max_ban_duration_secs: u64,
    /// Background sweep interval in seconds (default: 300 = 5 min).
    pub sweep_interval_secs: u64,
    /// Audit log size ceiling before retention kicks in
    /// (default: 100_000 entries).
    pub audit_max_entries: u64,
    /// Audit retention horizon in days (default: 30).
    pub audit_retention_days: u32,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 604_800,
            max_sessions_per_ip: 3,
            max_storage_per_ip_mb: 100.0,
            requests_per_window: 100,
            trains_per_window: 10,
            predictions_per_window: 200,
            quota_window_secs: 3600,
            ban_after_violations: 5,
            ban_duration_secs: 86_400,
            ban_backoff_multiplier: 2.0,
            max_ban_duration_secs: 604_800,
            sweep_interval_secs: 300,
            audit_max_entries: 100_000,
            audit_retention_days: 30,
        }
    }
}
