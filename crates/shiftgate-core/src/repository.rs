//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Compound mutations that must
//! appear atomic together — a session insert plus its quota increment
//! plus the lifecycle event — are single trait methods, so every
//! implementation commits them as one unit instead of hiding the
//! invariant in store-side triggers.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::error::GateResult;
use crate::models::{
    event::{CreateSecurityEvent, EventType, SecurityEvent, Severity},
    quota::QuotaRecord,
    session::{CreateSession, Session},
};

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

pub trait SessionRepository: Send + Sync {
    /// Atomically: insert the session, ensure the owning IP's quota
    /// record exists, increment its `models_count`, and append
    /// `event`. Either all four are visible or none are.
    ///
    /// Fails with `InvalidTtl` when the TTL is not strictly positive.
    fn create(
        &self,
        input: CreateSession,
        event: CreateSecurityEvent,
    ) -> impl Future<Output = GateResult<Session>> + Send;

    /// Point read by id. Does not refresh `last_accessed_at` and does
    /// not filter expired rows; logical expiry is the caller's
    /// concern.
    fn get(&self, session_id: &str) -> impl Future<Output = GateResult<Session>> + Send;

    /// Set `last_accessed_at` to `now`. Idempotent under rapid
    /// repeated calls; emits no event.
    fn touch(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = GateResult<()>> + Send;

    /// Non-expired sessions owned by `ip_address`, ordered by
    /// `last_accessed_at` descending.
    fn list_by_ip(
        &self,
        ip_address: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = GateResult<Vec<Session>>> + Send;

    /// Sessions whose expiry has passed as of `now`, for the sweeper.
    fn list_expired(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = GateResult<Vec<Session>>> + Send;

    /// Atomically: remove the session, decrement the owning IP's
    /// `models_count` (floored at zero), and append `event`. Fails
    /// with `NotFound` when the session is absent.
    fn delete(
        &self,
        session_id: &str,
        event: CreateSecurityEvent,
    ) -> impl Future<Output = GateResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Per-IP quotas
// ---------------------------------------------------------------------------

pub trait QuotaRepository: Send + Sync {
    /// Create a zeroed quota record for `ip_address` if none exists.
    /// Idempotent; returns the current record either way.
    fn ensure(&self, ip_address: &str) -> impl Future<Output = GateResult<QuotaRecord>> + Send;

    fn get(
        &self,
        ip_address: &str,
    ) -> impl Future<Output = GateResult<Option<QuotaRecord>>> + Send;

    /// Atomically persist the ledger-owned fields of `record` and
    /// append `events` in the same commit. `models_count` is excluded:
    /// the session create/delete transactions own it, and they commit
    /// outside the caller's per-IP serialization.
    fn store(
        &self,
        record: &QuotaRecord,
        events: Vec<CreateSecurityEvent>,
    ) -> impl Future<Output = GateResult<()>> + Send;

    /// Banned IPs whose `banned_until` has passed as of `now`.
    fn list_banned_lapsed(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = GateResult<Vec<QuotaRecord>>> + Send;

    /// IPs with at least `min_violations` recorded violations,
    /// ordered by violation count descending.
    fn list_suspicious(
        &self,
        min_violations: u32,
    ) -> impl Future<Output = GateResult<Vec<QuotaRecord>>> + Send;
}

// ---------------------------------------------------------------------------
// Audit log
// ---------------------------------------------------------------------------

/// Restartable query cursor: events strictly older than this
/// position, by `(created_at, seq)`.
#[derive(Debug, Clone, Copy)]
pub struct EventCursor {
    pub created_at: DateTime<Utc>,
    pub seq: u64,
}

/// Filter for audit queries. Results are newest-first and finite.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub ip_address: Option<String>,
    pub session_id: Option<String>,
    pub event_type: Option<EventType>,
    pub min_severity: Option<Severity>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub before: Option<EventCursor>,
    pub limit: Option<u64>,
}

pub trait AuditRepository: Send + Sync {
    /// Append one event. The sole write operation on the log.
    fn append(
        &self,
        event: CreateSecurityEvent,
    ) -> impl Future<Output = GateResult<SecurityEvent>> + Send;

    /// Newest-first, cursor-restartable query.
    fn query(
        &self,
        filter: EventFilter,
    ) -> impl Future<Output = GateResult<Vec<SecurityEvent>>> + Send;

    fn count(&self) -> impl Future<Output = GateResult<u64>> + Send;

    /// Delete events strictly older than `horizon`. Returns the
    /// number of deleted rows.
    fn purge_before(
        &self,
        horizon: DateTime<Utc>,
    ) -> impl Future<Output = GateResult<u64>> + Send;
}
