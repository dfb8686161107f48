//! SurrealDB implementation of [`SessionRepository`].
//!
//! The session insert and delete are compound mutations: the row
//! change, the owning IP's `models_count` adjustment, and the
//! lifecycle event are issued as one multi-statement query, which
//! SurrealDB commits as a single transaction.

use chrono::{DateTime, Duration, Utc};
use shiftgate_core::error::{GateError, GateResult};
use shiftgate_core::models::event::CreateSecurityEvent;
use shiftgate_core::models::session::{CreateSession, Session, SessionMetadata};
use shiftgate_core::repository::SessionRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use crate::error::{DbError, bounded};
use crate::repository::{event_sql, severity_to_string};

#[derive(Debug, SurrealValue)]
struct SessionRow {
    model_id: String,
    ip_address: String,
    created_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    metadata: serde_json::Value,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct SessionRowWithId {
    record_id: String,
    model_id: String,
    ip_address: String,
    created_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    metadata: serde_json::Value,
}

fn parse_metadata(raw: serde_json::Value) -> Result<SessionMetadata, DbError> {
    serde_json::from_value(raw)
        .map_err(|e| DbError::Migration(format!("invalid session metadata: {e}")))
}

impl SessionRow {
    fn into_session(self, session_id: String) -> Result<Session, DbError> {
        Ok(Session {
            session_id,
            model_id: self.model_id,
            ip_address: self.ip_address,
            created_at: self.created_at,
            last_accessed_at: self.last_accessed_at,
            expires_at: self.expires_at,
            metadata: parse_metadata(self.metadata)?,
        })
    }
}

impl SessionRowWithId {
    fn try_into_session(self) -> Result<Session, DbError> {
        Ok(Session {
            session_id: self.record_id,
            model_id: self.model_id,
            ip_address: self.ip_address,
            created_at: self.created_at,
            last_accessed_at: self.last_accessed_at,
            expires_at: self.expires_at,
            metadata: parse_metadata(self.metadata)?,
        })
    }
}

/// SurrealDB implementation of the session repository.
#[derive(Clone)]
pub struct SurrealSessionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSessionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> SessionRepository for SurrealSessionRepository<C> {
    async fn create(
        &self,
        input: CreateSession,
        event: CreateSecurityEvent,
    ) -> GateResult<Session> {
        if input.ttl <= Duration::zero() {
            return Err(GateError::InvalidTtl);
        }
        let now = Utc::now();
        let expires_at = now + input.ttl;

        let metadata = serde_json::to_value(&input.metadata)
            .map_err(|e| GateError::InvalidMetadata {
                reason: e.to_string(),
            })?;

        bounded(async {
            let sql = format!(
                "CREATE type::record('session', $id) SET \
                 model_id = $model_id, \
                 ip_address = $ip_address, \
                 created_at = $created_at, \
                 last_accessed_at = $created_at, \
                 expires_at = $expires_at, \
                 metadata = $metadata; \
                 UPSERT type::record('ip_quota', $ip_address) \
                 SET models_count += 1; \
                 {}",
                event_sql(0)
            );

            let result = self
                .db
                .query(sql)
                .bind(("id", input.session_id.clone()))
                .bind(("model_id", input.model_id))
                .bind(("ip_address", input.ip_address))
                .bind(("created_at", now))
                .bind(("expires_at", expires_at))
                .bind(("metadata", metadata))
                .bind(("ev0_session_id", event.session_id))
                .bind(("ev0_ip_address", event.ip_address))
                .bind(("ev0_event_type", event.event_type.as_str().to_string()))
                .bind(("ev0_event_data", event.event_data))
                .bind((
                    "ev0_severity",
                    severity_to_string(event.severity).to_string(),
                ))
                .await
                .map_err(DbError::from)?;

            let mut result = result.check().map_err(DbError::from)?;

            let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
            let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
                entity: "session".into(),
                id: input.session_id.clone(),
            })?;

            row.into_session(input.session_id)
        })
        .await
        .map_err(Into::into)
    }

    async fn get(&self, session_id: &str) -> GateResult<Session> {
        let id = session_id.to_string();

        bounded(async {
            let mut result = self
                .db
                .query("SELECT * FROM type::record('session', $id)")
                .bind(("id", id.clone()))
                .await
                .map_err(DbError::from)?;

            let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
            let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
                entity: "session".into(),
                id: id.clone(),
            })?;

            row.into_session(id)
        })
        .await
        .map_err(Into::into)
    }

    async fn touch(&self, session_id: &str, now: DateTime<Utc>) -> GateResult<()> {
        let id = session_id.to_string();

        bounded(async {
            let mut result = self
                .db
                .query("UPDATE type::record('session', $id) SET last_accessed_at = $now")
                .bind(("id", id.clone()))
                .bind(("now", now))
                .await
                .map_err(DbError::from)?;

            let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
            if rows.is_empty() {
                return Err(DbError::NotFound {
                    entity: "session".into(),
                    id,
                });
            }
            Ok(())
        })
        .await
        .map_err(Into::into)
    }

    async fn list_by_ip(&self, ip_address: &str, now: DateTime<Utc>) -> GateResult<Vec<Session>> {
        let ip = ip_address.to_string();

        bounded(async {
            let mut result = self
                .db
                .query(
                    "SELECT meta::id(id) AS record_id, * FROM session \
                     WHERE ip_address = $ip_address AND expires_at > $now \
                     ORDER BY last_accessed_at DESC",
                )
                .bind(("ip_address", ip))
                .bind(("now", now))
                .await
                .map_err(DbError::from)?;

            let rows: Vec<SessionRowWithId> = result.take(0).map_err(DbError::from)?;
            rows.into_iter().map(|r| r.try_into_session()).collect()
        })
        .await
        .map_err(Into::into)
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> GateResult<Vec<Session>> {
        bounded(async {
            let mut result = self
                .db
                .query(
                    "SELECT meta::id(id) AS record_id, * FROM session \
                     WHERE expires_at <= $now",
                )
                .bind(("now", now))
                .await
                .map_err(DbError::from)?;

            let rows: Vec<SessionRowWithId> = result.take(0).map_err(DbError::from)?;
            rows.into_iter().map(|r| r.try_into_session()).collect()
        })
        .await
        .map_err(Into::into)
    }

    async fn delete(&self, session_id: &str, event: CreateSecurityEvent) -> GateResult<()> {
        // Absence check first, so a missing row can never trigger the
        // counter decrement inside the compound mutation.
        let session = self.get(session_id).await?;
        let id = session_id.to_string();

        bounded(async {
            let sql = format!(
                "DELETE type::record('session', $id); \
                 UPDATE type::record('ip_quota', $ip_address) \
                 SET models_count = math::max([models_count - 1, 0]); \
                 {}",
                event_sql(0)
            );

            self.db
                .query(sql)
                .bind(("id", id))
                .bind(("ip_address", session.ip_address))
                .bind(("ev0_session_id", event.session_id))
                .bind(("ev0_ip_address", event.ip_address))
                .bind(("ev0_event_type", event.event_type.as_str().to_string()))
                .bind(("ev0_event_data", event.event_data))
                .bind((
                    "ev0_severity",
                    severity_to_string(event.severity).to_string(),
                ))
                .await
                .map_err(DbError::from)?
                .check()
                .map_err(DbError::from)?;

            Ok(())
        })
        .await
        .map_err(Into::into)
    }
}
