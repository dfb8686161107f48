//! Best-effort audit log service.
//!
//! Governed operations must not fail because the audit store is
//! briefly unavailable. A failed append sets a degraded flag; the
//! next successful write is preceded by an `audit_degraded` marker so
//! the gap is visible in the log itself.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{Duration, Utc};
use serde_json::json;
use shiftgate_core::error::GateResult;
use shiftgate_core::models::event::{CreateSecurityEvent, EventType, SecurityEvent, Severity};
use shiftgate_core::repository::{AuditRepository, EventFilter};
use tracing::{debug, warn};

use crate::config::GovernanceConfig;

/// How many appends between retention checks.
const RETENTION_CHECK_INTERVAL: u64 = 256;

pub struct AuditLog<A: AuditRepository> {
    repo: A,
    degraded: AtomicBool,
    appends: AtomicU64,
    max_entries: u64,
    retention: Duration,
}

impl<A: AuditRepository> AuditLog<A> {
    pub fn new(repo: A, config: &GovernanceConfig) -> Self {
        Self {
            repo,
            degraded: AtomicBool::new(false),
            appends: AtomicU64::new(0),
            max_entries: config.audit_max_entries,
            retention: Duration::days(config.audit_retention_days as i64),
        }
    }

    /// Append `event`, best-effort. A store failure is logged and
    /// flagged, never propagated.
    pub async fn record(&self, event: CreateSecurityEvent) {
        if self.degraded.swap(false, Ordering::AcqRel) {
            let marker = CreateSecurityEvent::new(
                event.ip_address.clone(),
                EventType::AuditDegraded,
                Severity::Critical,
            )
            .with_data(json!({"reason": "one or more prior events were lost"}));

            if self.repo.append(marker).await.is_err() {
                // Still down. Keep the flag set and drop this event too.
                self.degraded.store(true, Ordering::Release);
                warn!(
                    event_type = event.event_type.as_str(),
                    "audit store unavailable, event dropped"
                );
                return;
            }
        }

        let event_type = event.event_type.as_str();
        match self.repo.append(event).await {
            Ok(_) => {
                self.enforce_retention().await;
            }
            Err(e) => {
                self.degraded.store(true, Ordering::Release);
                warn!(event_type, error = %e, "failed to append audit event");
            }
        }
    }

    /// Whether any append has failed since the last successful
    /// degraded marker.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    pub async fn query(&self, filter: EventFilter) -> GateResult<Vec<SecurityEvent>> {
        self.repo.query(filter).await
    }

    pub async fn count(&self) -> GateResult<u64> {
        self.repo.count().await
    }

    async fn enforce_retention(&self) {
        let appends = self.appends.fetch_add(1, Ordering::Relaxed) + 1;
        if appends % RETENTION_CHECK_INTERVAL != 0 {
            return;
        }
        let total = match self.repo.count().await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "audit retention check failed");
                return;
            }
        };
        if total <= self.max_entries {
            return;
        }
        match self.repo.purge_before(Utc::now() - self.retention).await {
            Ok(purged) => debug!(purged, "purged expired audit events"),
            Err(e) => warn!(error = %e, "audit retention purge failed"),
        }
    }
}
