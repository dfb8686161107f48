//! SurrealDB implementation of [`AuditRepository`].
//!
//! Events are append-only. Each append draws a sequence number from
//! the `gate_counter` record inside the same query, so `(created_at,
//! seq)` orders the log totally even when wall clocks collide.

use chrono::{DateTime, Utc};
use shiftgate_core::error::GateResult;
use shiftgate_core::models::event::{CreateSecurityEvent, SecurityEvent, Severity};
use shiftgate_core::repository::{AuditRepository, EventFilter};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use crate::error::{DbError, bounded};
use crate::repository::{event_sql, parse_event_type, parse_severity, severity_to_string};

#[derive(Debug, SurrealValue)]
struct EventRow {
    seq: u64,
    session_id: Option<String>,
    ip_address: String,
    event_type: String,
    event_data: serde_json::Value,
    severity: String,
    created_at: DateTime<Utc>,
}

impl EventRow {
    fn try_into_event(self) -> Result<SecurityEvent, DbError> {
        Ok(SecurityEvent {
            seq: self.seq,
            session_id: self.session_id,
            ip_address: self.ip_address,
            event_type: parse_event_type(&self.event_type)?,
            event_data: self.event_data,
            severity: parse_severity(&self.severity)?,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// Severity levels at or above `min`, as stored strings.
fn severities_at_least(min: Severity) -> Vec<String> {
    [Severity::Info, Severity::Warning, Severity::Critical]
        .into_iter()
        .filter(|s| *s >= min)
        .map(|s| severity_to_string(s).to_string())
        .collect()
}

/// SurrealDB implementation of the append-only audit log.
#[derive(Clone)]
pub struct SurrealAuditRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

const DEFAULT_QUERY_LIMIT: u64 = 100;

impl<C: Connection> AuditRepository for SurrealAuditRepository<C> {
    async fn append(&self, event: CreateSecurityEvent) -> GateResult<SecurityEvent> {
        bounded(async {
            let result = self
                .db
                .query(event_sql(0))
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

            // Statement 0 is the LET; the CREATE is statement 1.
            let rows: Vec<EventRow> = result.take(1).map_err(DbError::from)?;
            let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
                entity: "security_event".into(),
                id: "appended".into(),
            })?;

            row.try_into_event()
        })
        .await
        .map_err(Into::into)
    }

    async fn query(&self, filter: EventFilter) -> GateResult<Vec<SecurityEvent>> {
        bounded(async {
            let mut conditions: Vec<&str> = Vec::new();
            if filter.ip_address.is_some() {
                conditions.push("ip_address = $ip_address");
            }
            if filter.session_id.is_some() {
                conditions.push("session_id = $session_id");
            }
            if filter.event_type.is_some() {
                conditions.push("event_type = $event_type");
            }
            if filter.min_severity.is_some() {
                conditions.push("severity IN $severities");
            }
            if filter.since.is_some() {
                conditions.push("created_at >= $since");
            }
            if filter.until.is_some() {
                conditions.push("created_at <= $until");
            }
            if filter.before.is_some() {
                conditions.push(
                    "(created_at < $before_at \
                     OR (created_at = $before_at AND seq < $before_seq))",
                );
            }

            let mut sql = String::from("SELECT * FROM security_event");
            if !conditions.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&conditions.join(" AND "));
            }
            sql.push_str(" ORDER BY created_at DESC, seq DESC LIMIT $limit");

            let mut query = self
                .db
                .query(sql)
                .bind(("limit", filter.limit.unwrap_or(DEFAULT_QUERY_LIMIT)));

            if let Some(ip) = filter.ip_address {
                query = query.bind(("ip_address", ip));
            }
            if let Some(session_id) = filter.session_id {
                query = query.bind(("session_id", session_id));
            }
            if let Some(event_type) = filter.event_type {
                query = query.bind(("event_type", event_type.as_str().to_string()));
            }
            if let Some(min) = filter.min_severity {
                query = query.bind(("severities", severities_at_least(min)));
            }
            if let Some(since) = filter.since {
                query = query.bind(("since", since));
            }
            if let Some(until) = filter.until {
                query = query.bind(("until", until));
            }
            if let Some(cursor) = filter.before {
                query = query
                    .bind(("before_at", cursor.created_at))
                    .bind(("before_seq", cursor.seq));
            }

            let mut result = query.await.map_err(DbError::from)?;
            let rows: Vec<EventRow> = result.take(0).map_err(DbError::from)?;
            rows.into_iter().map(EventRow::try_into_event).collect()
        })
        .await
        .map_err(Into::into)
    }

    async fn count(&self) -> GateResult<u64> {
        bounded(async {
            let mut result = self
                .db
                .query("SELECT count() AS total FROM security_event GROUP ALL")
                .await
                .map_err(DbError::from)?;

            let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
            Ok(rows.into_iter().next().map(|r| r.total).unwrap_or(0))
        })
        .await
        .map_err(Into::into)
    }

    async fn purge_before(&self, horizon: DateTime<Utc>) -> GateResult<u64> {
        bounded(async {
            let mut result = self
                .db
                .query(
                    "SELECT count() AS total FROM security_event \
                     WHERE created_at < $horizon GROUP ALL; \
                     DELETE security_event WHERE created_at < $horizon",
                )
                .bind(("horizon", horizon))
                .await
                .map_err(DbError::from)?;

            let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
            Ok(rows.into_iter().next().map(|r| r.total).unwrap_or(0))
        })
        .await
        .map_err(Into::into)
    }
}
