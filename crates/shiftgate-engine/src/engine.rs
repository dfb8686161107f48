//! Governance engine — the single entry point gating session, quota,
//! training, and prediction operations.
//!
//! Generic over repository and estimator implementations so that the
//! engine layer has no dependency on the database crate.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::json;
use shiftgate_core::error::{GateError, GateResult};
use shiftgate_core::estimator::{Predictor, TrainedModel, Trainer};
use shiftgate_core::models::event::{CreateSecurityEvent, EventType, SecurityEvent, Severity};
use shiftgate_core::models::quota::{ActionKind, QuotaRecord};
use shiftgate_core::models::schedule::{EmployeeRecord, PredictedDay};
use shiftgate_core::models::session::Session;
use shiftgate_core::repository::{
    AuditRepository, EventFilter, QuotaRepository, SessionRepository,
};
use tracing::info;

use crate::audit::AuditLog;
use crate::ban::EscalatingBanPolicy;
use crate::config::GovernanceConfig;
use crate::ledger::QuotaLedger;
use crate::locks::KeyedLocks;
use crate::store::SessionStore;

/// Outcome of one background sweep pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepReport {
    pub sessions_removed: u64,
    pub bans_lifted: u64,
}

pub struct GovernanceEngine<S, Q, A, T, P>
where
    S: SessionRepository,
    Q: QuotaRepository,
    A: AuditRepository,
    T: Trainer,
    P: Predictor,
{
    store: SessionStore<S>,
    ledger: QuotaLedger<Q, A>,
    audit: Arc<AuditLog<A>>,
    trainer: T,
    predictor: P,
    config: GovernanceConfig,
    // Serializes the capacity check against the create it guards.
    create_locks: KeyedLocks,
}

impl<S, Q, A, T, P> GovernanceEngine<S, Q, A, T, P>
where
    S: SessionRepository,
    Q: QuotaRepository,
    A: AuditRepository,
    T: Trainer,
    P: Predictor,
{
    pub fn new(
        session_repo: S,
        quota_repo: Q,
        audit_repo: A,
        trainer: T,
        predictor: P,
        config: GovernanceConfig,
    ) -> Self {
        let audit = Arc::new(AuditLog::new(audit_repo, &config));
        let policy = Box::new(EscalatingBanPolicy::from_config(&config));
        let ledger = QuotaLedger::new(quota_repo, audit.clone(), policy, &config);

        Self {
            store: SessionStore::new(session_repo),
            ledger,
            audit,
            trainer,
            predictor,
            config,
            create_locks: KeyedLocks::new(),
        }
    }

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    /// Create a session for `ip_address`. `ttl` defaults to the
    /// configured session lifetime.
    pub async fn create_session(
        &self,
        ip_address: &str,
        metadata: &serde_json::Value,
        ttl: Option<Duration>,
    ) -> GateResult<Session> {
        let now = Utc::now();
        self.ledger.assert_not_banned(ip_address, now).await?;

        // Concurrent creates for one IP must not both pass the
        // capacity check.
        let _guard = self.create_locks.acquire(ip_address).await;

        let live = self.store.list_by_ip(ip_address, now).await?;
        let limit = self.config.max_sessions_per_ip;
        if live.len() as u32 >= limit {
            self.ledger
                .record_violation(ip_address, "session capacity exceeded", now)
                .await?;
            return Err(GateError::QuotaExceeded {
                kind: "sessions".into(),
                limit: limit as u64,
            });
        }

        self.ledger
            .charge(ip_address, ActionKind::Request, now)
            .await?;

        let ttl = ttl.unwrap_or(Duration::seconds(self.config.session_ttl_secs as i64));
        self.store.create(ip_address, ttl, metadata).await
    }

    /// Fetch a live session owned by the caller, refreshing its
    /// last-access time. A rejected request consumes no quota.
    pub async fn session_info(&self, session_id: &str, ip_address: &str) -> GateResult<Session> {
        let now = Utc::now();
        let session = self.resolve_session(session_id, ip_address, now).await?;
        self.ledger.assert_not_banned(ip_address, now).await?;
        self.ledger
            .charge(ip_address, ActionKind::Request, now)
            .await?;

        self.store.touch(session_id, now).await?;
        self.audit
            .record(
                CreateSecurityEvent::new(ip_address, EventType::SessionAccessed, Severity::Info)
                    .with_session(session_id),
            )
            .await;
        Ok(session)
    }

    /// All live sessions owned by `ip_address`, most recently
    /// accessed first.
    pub async fn list_sessions(&self, ip_address: &str) -> GateResult<Vec<Session>> {
        let now = Utc::now();
        self.ledger.assert_not_banned(ip_address, now).await?;
        self.ledger
            .charge(ip_address, ActionKind::Request, now)
            .await?;
        self.store.list_by_ip(ip_address, now).await
    }

    /// Explicitly delete a session owned by the caller. Unknown and
    /// already-expired sessions are both `NotFound`; neither consumes
    /// quota.
    pub async fn delete_session(&self, session_id: &str, ip_address: &str) -> GateResult<()> {
        let now = Utc::now();
        let session = match self.store.get(session_id, now).await {
            Ok(s) => s,
            Err(GateError::SessionInvalid { .. }) => {
                return Err(GateError::NotFound {
                    entity: "session".into(),
                    id: session_id.to_string(),
                });
            }
            Err(e) => return Err(e),
        };
        if session.ip_address != ip_address {
            return Err(GateError::SessionInvalid {
                reason: "unknown session".into(),
            });
        }

        self.ledger.assert_not_banned(ip_address, now).await?;
        self.ledger
            .charge(ip_address, ActionKind::Request, now)
            .await?;

        self.store.delete(session_id, now).await
    }

    /// Train the session's model on `records`, charging the train
    /// quota and the reported storage footprint.
    pub async fn train(
        &self,
        session_id: &str,
        ip_address: &str,
        records: &[EmployeeRecord],
    ) -> GateResult<TrainedModel> {
        let now = Utc::now();
        let session = self.resolve_session(session_id, ip_address, now).await?;
        self.ledger.assert_not_banned(ip_address, now).await?;

        if let Err(e) = self.ledger.assert_storage_available(ip_address).await {
            if matches!(e, GateError::QuotaExceeded { .. }) {
                self.ledger
                    .record_violation(ip_address, "storage quota exceeded", now)
                    .await?;
            }
            return Err(e);
        }

        self.ledger
            .charge(ip_address, ActionKind::Train, now)
            .await?;
        self.store.touch(session_id, now).await?;
        self.audit
            .record(
                CreateSecurityEvent::new(ip_address, EventType::TrainRequested, Severity::Info)
                    .with_session(session_id)
                    .with_data(json!({
                        "model_id": session.model_id,
                        "data_rows": records.len(),
                    })),
            )
            .await;

        // Collaborator failures surface verbatim and never count as
        // violations; the quota charge above stands.
        let trained = self
            .trainer
            .train(&session.model_id, records)
            .await
            .map_err(|e| GateError::Training(e.to_string()))?;

        self.ledger
            .adjust_storage(ip_address, trained.storage_mb)
            .await?;

        info!(
            session_id,
            ip_address,
            data_rows = trained.data_row_count,
            employees = trained.employee_count,
            "model trained"
        );
        Ok(trained)
    }

    /// Predict shift intervals for `employee_id` over a window of
    /// dates centered on `target_date`.
    pub async fn predict(
        &self,
        session_id: &str,
        ip_address: &str,
        employee_id: &str,
        target_date: NaiveDate,
        window_size: u32,
    ) -> GateResult<Vec<PredictedDay>> {
        let now = Utc::now();
        let session = self.resolve_session(session_id, ip_address, now).await?;
        self.ledger.assert_not_banned(ip_address, now).await?;
        self.ledger
            .charge(ip_address, ActionKind::Predict, now)
            .await?;
        self.store.touch(session_id, now).await?;
        self.audit
            .record(
                CreateSecurityEvent::new(ip_address, EventType::PredictRequested, Severity::Info)
                    .with_session(session_id)
                    .with_data(json!({
                        "model_id": session.model_id,
                        "employee_id": employee_id,
                        "target_date": target_date.to_string(),
                        "window_size": window_size,
                    })),
            )
            .await;

        self.predictor
            .predict(&session.model_id, employee_id, target_date, window_size)
            .await
            .map_err(|e| GateError::Prediction(e.to_string()))
    }

    /// One maintenance pass: collect expired sessions and lift lapsed
    /// bans.
    pub async fn sweep(&self, now: DateTime<Utc>) -> GateResult<SweepReport> {
        let sessions_removed = self.store.sweep_expired(now).await?;
        let bans_lifted = self.ledger.lift_expired_bans(now).await?;
        Ok(SweepReport {
            sessions_removed,
            bans_lifted,
        })
    }

    /// Quota and ban state for one IP, if any activity was recorded.
    pub async fn ip_statistics(&self, ip_address: &str) -> GateResult<Option<QuotaRecord>> {
        self.ledger.get(ip_address).await
    }

    /// IPs with at least `min_violations` violations, worst first.
    pub async fn suspicious_ips(&self, min_violations: u32) -> GateResult<Vec<QuotaRecord>> {
        self.ledger.list_suspicious(min_violations).await
    }

    /// Audit trail query, newest first.
    pub async fn recent_events(&self, filter: EventFilter) -> GateResult<Vec<SecurityEvent>> {
        self.audit.query(filter).await
    }

    /// Administrative unban and violation reset for an IP.
    pub async fn reset_quota(&self, ip_address: &str) -> GateResult<QuotaRecord> {
        self.ledger.reset(ip_address).await
    }

    /// Session lookup that also enforces ownership: a session fetched
    /// with the wrong IP is indistinguishable from an unknown one.
    async fn resolve_session(
        &self,
        session_id: &str,
        ip_address: &str,
        now: DateTime<Utc>,
    ) -> GateResult<Session> {
        let session = self.store.get(session_id, now).await?;
        if session.ip_address != ip_address {
            return Err(GateError::SessionInvalid {
                reason: "unknown session".into(),
            });
        }
        Ok(session)
    }
}
