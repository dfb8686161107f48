//! Session lifecycle on top of the session repository.
//!
//! The repository stores rows; this layer owns token generation,
//! logical expiry, and the lifecycle events that accompany every
//! create and delete.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use shiftgate_core::error::{GateError, GateResult};
use shiftgate_core::models::event::{CreateSecurityEvent, EventType, Severity};
use shiftgate_core::models::session::{CreateSession, Session, validate_metadata};
use shiftgate_core::repository::SessionRepository;
use tracing::info;

use crate::locks::KeyedLocks;
use crate::token;

pub struct SessionStore<S: SessionRepository> {
    repo: S,
    // Serializes delete against the sweeper for the same session, so
    // the models_count decrement cannot fire twice.
    delete_locks: KeyedLocks,
}

impl<S: SessionRepository> SessionStore<S> {
    pub fn new(repo: S) -> Self {
        Self {
            repo,
            delete_locks: KeyedLocks::new(),
        }
    }

    /// Create a session for `ip_address` with freshly generated
    /// session and model IDs.
    pub async fn create(
        &self,
        ip_address: &str,
        ttl: Duration,
        metadata: &serde_json::Value,
    ) -> GateResult<Session> {
        if ttl <= Duration::zero() {
            return Err(GateError::InvalidTtl);
        }
        let metadata = validate_metadata(metadata)?;

        let session_id = token::generate_session_id();
        let model_id = token::generate_model_id();

        let event =
            CreateSecurityEvent::new(ip_address, EventType::SessionCreated, Severity::Info)
                .with_session(session_id.clone())
                .with_data(json!({
                    "model_id": model_id,
                    "ttl_secs": ttl.num_seconds(),
                }));

        let session = self
            .repo
            .create(
                CreateSession {
                    session_id,
                    model_id,
                    ip_address: ip_address.to_string(),
                    ttl,
                    metadata,
                },
                event,
            )
            .await?;

        info!(
            session_id = %session.session_id,
            ip_address = %session.ip_address,
            "session created"
        );
        Ok(session)
    }

    /// Fetch a live session. Expired or malformed IDs are reported as
    /// invalid, indistinguishable from never having existed.
    pub async fn get(&self, session_id: &str, now: DateTime<Utc>) -> GateResult<Session> {
        if !token::is_valid_session_id(session_id) {
            return Err(GateError::SessionInvalid {
                reason: "malformed session id".into(),
            });
        }
        let session = match self.repo.get(session_id).await {
            Ok(s) => s,
            Err(GateError::NotFound { .. }) => {
                return Err(GateError::SessionInvalid {
                    reason: "unknown session".into(),
                });
            }
            Err(e) => return Err(e),
        };
        if session.is_expired_at(now) {
            return Err(GateError::SessionInvalid {
                reason: "session expired".into(),
            });
        }
        Ok(session)
    }

    pub async fn touch(&self, session_id: &str, now: DateTime<Utc>) -> GateResult<()> {
        self.repo.touch(session_id, now).await
    }

    pub async fn list_by_ip(
        &self,
        ip_address: &str,
        now: DateTime<Utc>,
    ) -> GateResult<Vec<Session>> {
        self.repo.list_by_ip(ip_address, now).await
    }

    /// Explicitly delete a live session. Expired sessions are
    /// `NotFound` here even before the sweeper has collected them.
    pub async fn delete(&self, session_id: &str, now: DateTime<Utc>) -> GateResult<()> {
        let _guard = self.delete_locks.acquire(session_id).await;

        let session = self.repo.get(session_id).await?;
        if session.is_expired_at(now) {
            return Err(GateError::NotFound {
                entity: "session".into(),
                id: session_id.to_string(),
            });
        }

        let event = deletion_event(&session, false);
        self.repo.delete(session_id, event).await?;

        info!(session_id, ip_address = %session.ip_address, "session deleted");
        Ok(())
    }

    /// Collect sessions whose expiry has passed. Each removal goes
    /// through the same atomic delete as a manual deletion, so counts
    /// and events stay consistent.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> GateResult<u64> {
        let expired = self.repo.list_expired(now).await?;
        let mut removed = 0u64;

        for session in expired {
            let _guard = self.delete_locks.acquire(&session.session_id).await;
            let event = deletion_event(&session, true);
            match self.repo.delete(&session.session_id, event).await {
                Ok(()) => removed += 1,
                // Deleted concurrently between list and delete.
                Err(GateError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(removed)
    }
}

/// Lifecycle event for a session removal, snapshotting timestamps
/// before the row disappears.
fn deletion_event(session: &Session, expired: bool) -> CreateSecurityEvent {
    CreateSecurityEvent::new(
        session.ip_address.clone(),
        EventType::SessionDeleted,
        Severity::Info,
    )
    .with_session(session.session_id.clone())
    .with_data(json!({
        "model_id": session.model_id,
        "created_at": session.created_at.to_rfc3339(),
        "last_accessed_at": session.last_accessed_at.to_rfc3339(),
        "expires_at": session.expires_at.to_rfc3339(),
        "expired": expired,
    }))
}
