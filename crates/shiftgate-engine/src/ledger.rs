//! Per-IP quota ledger — windowed counters, violation escalation, and
//! ban bookkeeping.
//!
//! All writes for one IP are serialized through a keyed lock, then
//! persisted as whole records, except `models_count`, which only the
//! session create/delete transactions write. Events that describe a
//! state change commit atomically with the record; pure denials go
//! through the best-effort audit log.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use shiftgate_core::error::{GateError, GateResult};
use shiftgate_core::models::event::{CreateSecurityEvent, EventType, Severity};
use shiftgate_core::models::quota::{ActionKind, QuotaRecord};
use shiftgate_core::repository::{AuditRepository, QuotaRepository};
use tracing::{info, warn};

use crate::audit::AuditLog;
use crate::ban::BanPolicy;
use crate::config::GovernanceConfig;
use crate::locks::KeyedLocks;

pub struct QuotaLedger<Q: QuotaRepository, A: AuditRepository> {
    repo: Q,
    audit: Arc<AuditLog<A>>,
    policy: Box<dyn BanPolicy>,
    locks: KeyedLocks,
    window: Duration,
    requests_per_window: u32,
    trains_per_window: u32,
    predictions_per_window: u32,
    max_storage_mb: f64,
    ban_threshold: u32,
}

impl<Q: QuotaRepository, A: AuditRepository> QuotaLedger<Q, A> {
    pub fn new(
        repo: Q,
        audit: Arc<AuditLog<A>>,
        policy: Box<dyn BanPolicy>,
        config: &GovernanceConfig,
    ) -> Self {
        Self {
            repo,
            audit,
            policy,
            locks: KeyedLocks::new(),
            window: Duration::seconds(config.quota_window_secs as i64),
            requests_per_window: config.requests_per_window,
            trains_per_window: config.trains_per_window,
            predictions_per_window: config.predictions_per_window,
            max_storage_mb: config.max_storage_per_ip_mb,
            ban_threshold: config.ban_after_violations.max(1),
        }
    }

    fn limit_for(&self, kind: ActionKind) -> u32 {
        match kind {
            ActionKind::Request => self.requests_per_window,
            ActionKind::Train => self.trains_per_window,
            ActionKind::Predict => self.predictions_per_window,
        }
    }

    pub async fn get(&self, ip_address: &str) -> GateResult<Option<QuotaRecord>> {
        self.repo.get(ip_address).await
    }

    pub async fn list_suspicious(&self, min_violations: u32) -> GateResult<Vec<QuotaRecord>> {
        self.repo.list_suspicious(min_violations).await
    }

    /// Fail with `Banned` when the IP is under an active ban.
    pub async fn assert_not_banned(&self, ip_address: &str, now: DateTime<Utc>) -> GateResult<()> {
        let Some(record) = self.repo.get(ip_address).await? else {
            return Ok(());
        };
        if record.is_banned_at(now) {
            let until = record.banned_until.unwrap_or(DateTime::<Utc>::MAX_UTC);
            self.audit
                .record(
                    CreateSecurityEvent::new(
                        ip_address,
                        EventType::QuotaExceeded,
                        Severity::Warning,
                    )
                    .with_data(json!({"reason": "banned", "until": until.to_rfc3339()})),
                )
                .await;
            return Err(GateError::Banned {
                ip_address: ip_address.to_string(),
                until,
            });
        }
        Ok(())
    }

    /// Charge one `kind` action against the window, or record a
    /// violation and deny when the window is full.
    ///
    /// Both outcomes persist atomically with their events.
    pub async fn charge(
        &self,
        ip_address: &str,
        kind: ActionKind,
        now: DateTime<Utc>,
    ) -> GateResult<()> {
        let _guard = self.locks.acquire(ip_address).await;
        let mut record = self.repo.ensure(ip_address).await?;

        if record.is_banned_at(now) {
            let until = record.banned_until.unwrap_or(DateTime::<Utc>::MAX_UTC);
            return Err(GateError::Banned {
                ip_address: ip_address.to_string(),
                until,
            });
        }

        record.reset_window_if_elapsed(now, self.window);

        let limit = self.limit_for(kind);
        if record.counter_for(kind) >= limit {
            let events = self.apply_violation(
                &mut record,
                &format!("{} quota exceeded", kind.as_str()),
                now,
            );
            self.repo.store(&record, events).await?;
            return Err(GateError::QuotaExceeded {
                kind: kind.as_str().to_string(),
                limit: limit as u64,
            });
        }

        record.charge(kind);
        self.repo.store(&record, Vec::new()).await?;
        Ok(())
    }

    /// Record a violation that did not come from a windowed counter,
    /// e.g. a session-capacity or storage denial.
    pub async fn record_violation(
        &self,
        ip_address: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> GateResult<()> {
        let _guard = self.locks.acquire(ip_address).await;
        let mut record = self.repo.ensure(ip_address).await?;
        let events = self.apply_violation(&mut record, reason, now);
        self.repo.store(&record, events).await
    }

    /// Fail with `QuotaExceeded` when the IP's stored training data
    /// already meets the storage ceiling.
    pub async fn assert_storage_available(&self, ip_address: &str) -> GateResult<()> {
        let used = self
            .repo
            .get(ip_address)
            .await?
            .map(|r| r.storage_used_mb)
            .unwrap_or(0.0);
        if used >= self.max_storage_mb {
            return Err(GateError::QuotaExceeded {
                kind: "storage".into(),
                limit: self.max_storage_mb as u64,
            });
        }
        Ok(())
    }

    /// Apply a storage delta in megabytes, floored at zero.
    pub async fn adjust_storage(&self, ip_address: &str, delta_mb: f64) -> GateResult<()> {
        let _guard = self.locks.acquire(ip_address).await;
        let mut record = self.repo.ensure(ip_address).await?;
        record.storage_used_mb = (record.storage_used_mb + delta_mb).max(0.0);
        self.repo.store(&record, Vec::new()).await
    }

    /// Clear bans whose end has passed. Violation counts persist, so
    /// the next ban escalates. Returns the number of bans lifted.
    pub async fn lift_expired_bans(&self, now: DateTime<Utc>) -> GateResult<u64> {
        let lapsed = self.repo.list_banned_lapsed(now).await?;
        let mut lifted = 0u64;

        for stale in lapsed {
            let _guard = self.locks.acquire(&stale.ip_address).await;
            // Re-read under the lock; the ban may have been extended.
            let Some(mut record) = self.repo.get(&stale.ip_address).await? else {
                continue;
            };
            if !record.is_banned || record.is_banned_at(now) {
                continue;
            }

            record.is_banned = false;
            record.banned_until = None;
            let event = CreateSecurityEvent::new(
                record.ip_address.clone(),
                EventType::IpUnbanned,
                Severity::Info,
            )
            .with_data(json!({"violations_count": record.violations_count}));

            self.repo.store(&record, vec![event]).await?;
            info!(ip_address = %record.ip_address, "ban lifted");
            lifted += 1;
        }

        Ok(lifted)
    }

    /// Administrative reset: lift any ban and zero the violation
    /// history for an IP.
    pub async fn reset(&self, ip_address: &str) -> GateResult<QuotaRecord> {
        let _guard = self.locks.acquire(ip_address).await;
        let mut record = self.repo.ensure(ip_address).await?;

        let was_banned = record.is_banned;
        record.is_banned = false;
        record.banned_until = None;
        record.violations_count = 0;

        let mut events = Vec::new();
        if was_banned {
            events.push(
                CreateSecurityEvent::new(ip_address, EventType::IpUnbanned, Severity::Info)
                    .with_data(json!({"admin_reset": true})),
            );
        }
        self.repo.store(&record, events).await?;

        info!(ip_address, was_banned, "quota reset");
        Ok(record)
    }

    /// Bump the violation count and, on a full threshold, open a ban
    /// with a policy-decided duration.
    fn apply_violation(
        &self,
        record: &mut QuotaRecord,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Vec<CreateSecurityEvent> {
        record.violations_count += 1;

        let mut events = vec![
            CreateSecurityEvent::new(
                record.ip_address.clone(),
                EventType::ViolationRecorded,
                Severity::Warning,
            )
            .with_data(json!({
                "reason": reason,
                "violations_count": record.violations_count,
            })),
        ];

        let at_threshold = record.violations_count % self.ban_threshold == 0;
        if at_threshold && !record.is_banned_at(now) {
            let duration = self.policy.ban_duration(record.violations_count);
            let until = now + duration;
            record.is_banned = true;
            record.banned_until = Some(until);

            warn!(
                ip_address = %record.ip_address,
                violations = record.violations_count,
                until = %until,
                "IP banned"
            );
            events.push(
                CreateSecurityEvent::new(
                    record.ip_address.clone(),
                    EventType::IpBanned,
                    Severity::Critical,
                )
                .with_data(json!({
                    "violations_count": record.violations_count,
                    "banned_until": until.to_rfc3339(),
                })),
            );
        }

        events
    }
}
