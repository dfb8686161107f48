//! SurrealDB implementation of [`QuotaRepository`].
//!
//! The quota record id is the IP address itself, so every lookup is a
//! point read. `store` writes the ledger-owned fields as one record;
//! callers serialize writes per IP, and the write plus any
//! accompanying events commit as one query. `models_count` is never
//! written here, only by the session create/delete transactions.

use chrono::{DateTime, Utc};
use shiftgate_core::error::GateResult;
use shiftgate_core::models::event::CreateSecurityEvent;
use shiftgate_core::models::quota::QuotaRecord;
use shiftgate_core::repository::QuotaRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use crate::error::{DbError, bounded};
use crate::repository::{event_sql, severity_to_string};

#[derive(Debug, SurrealValue)]
struct QuotaRow {
    record_id: String,
    models_count: u32,
    storage_used_mb: f64,
    requests_count: u32,
    train_count: u32,
    predictions_count: u32,
    violations_count: u32,
    is_banned: bool,
    banned_until: Option<DateTime<Utc>>,
    last_reset: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl QuotaRow {
    fn into_record(self) -> QuotaRecord {
        QuotaRecord {
            ip_address: self.record_id,
            models_count: self.models_count,
            storage_used_mb: self.storage_used_mb,
            requests_count: self.requests_count,
            train_count: self.train_count,
            predictions_count: self.predictions_count,
            violations_count: self.violations_count,
            is_banned: self.is_banned,
            banned_until: self.banned_until,
            last_reset: self.last_reset,
            created_at: self.created_at,
        }
    }
}

/// SurrealDB implementation of the per-IP quota repository.
#[derive(Clone)]
pub struct SurrealQuotaRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealQuotaRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> QuotaRepository for SurrealQuotaRepository<C> {
    async fn ensure(&self, ip_address: &str) -> GateResult<QuotaRecord> {
        let ip = ip_address.to_string();

        bounded(async {
            let mut result = self
                .db
                .query(
                    "UPSERT type::record('ip_quota', $ip_address); \
                     SELECT meta::id(id) AS record_id, * \
                     FROM type::record('ip_quota', $ip_address)",
                )
                .bind(("ip_address", ip.clone()))
                .await
                .map_err(DbError::from)?;

            let rows: Vec<QuotaRow> = result.take(1).map_err(DbError::from)?;
            let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
                entity: "ip_quota".into(),
                id: ip,
            })?;

            Ok(row.into_record())
        })
        .await
        .map_err(Into::into)
    }

    async fn get(&self, ip_address: &str) -> GateResult<Option<QuotaRecord>> {
        let ip = ip_address.to_string();

        bounded(async {
            let mut result = self
                .db
                .query(
                    "SELECT meta::id(id) AS record_id, * \
                     FROM type::record('ip_quota', $ip_address)",
                )
                .bind(("ip_address", ip))
                .await
                .map_err(DbError::from)?;

            let rows: Vec<QuotaRow> = result.take(0).map_err(DbError::from)?;
            Ok(rows.into_iter().next().map(QuotaRow::into_record))
        })
        .await
        .map_err(Into::into)
    }

    async fn store(
        &self,
        record: &QuotaRecord,
        events: Vec<CreateSecurityEvent>,
    ) -> GateResult<()> {
        let record = record.clone();

        bounded(async {
            // models_count is deliberately absent from the SET list:
            // session create/delete transactions own that field, and
            // writing a value read before they committed would lose
            // their update.
            let mut sql = String::from(
                "UPSERT type::record('ip_quota', $ip_address) SET \
                 storage_used_mb = $storage_used_mb, \
                 requests_count = $requests_count, \
                 train_count = $train_count, \
                 predictions_count = $predictions_count, \
                 violations_count = $violations_count, \
                 is_banned = $is_banned, \
                 banned_until = $banned_until, \
                 last_reset = $last_reset; ",
            );
            for i in 0..events.len() {
                sql.push_str(&event_sql(i));
            }

            let mut query = self
                .db
                .query(sql)
                .bind(("ip_address", record.ip_address))
                .bind(("storage_used_mb", record.storage_used_mb))
                .bind(("requests_count", record.requests_count))
                .bind(("train_count", record.train_count))
                .bind(("predictions_count", record.predictions_count))
                .bind(("violations_count", record.violations_count))
                .bind(("is_banned", record.is_banned))
                .bind(("banned_until", record.banned_until))
                .bind(("last_reset", record.last_reset));

            for (i, event) in events.into_iter().enumerate() {
                query = query
                    .bind((format!("ev{i}_session_id"), event.session_id))
                    .bind((format!("ev{i}_ip_address"), event.ip_address))
                    .bind((
                        format!("ev{i}_event_type"),
                        event.event_type.as_str().to_string(),
                    ))
                    .bind((format!("ev{i}_event_data"), event.event_data))
                    .bind((
                        format!("ev{i}_severity"),
                        severity_to_string(event.severity).to_string(),
                    ));
            }

            query
                .await
                .map_err(DbError::from)?
                .check()
                .map_err(DbError::from)?;

            Ok(())
        })
        .await
        .map_err(Into::into)
    }

    async fn list_banned_lapsed(&self, now: DateTime<Utc>) -> GateResult<Vec<QuotaRecord>> {
        bounded(async {
            let mut result = self
                .db
                .query(
                    "SELECT meta::id(id) AS record_id, * FROM ip_quota \
                     WHERE is_banned = true \
                     AND banned_until != NONE \
                     AND banned_until <= $now",
                )
                .bind(("now", now))
                .await
                .map_err(DbError::from)?;

            let rows: Vec<QuotaRow> = result.take(0).map_err(DbError::from)?;
            Ok(rows.into_iter().map(QuotaRow::into_record).collect())
        })
        .await
        .map_err(Into::into)
    }

    async fn list_suspicious(&self, min_violations: u32) -> GateResult<Vec<QuotaRecord>> {
        bounded(async {
            let mut result = self
                .db
                .query(
                    "SELECT meta::id(id) AS record_id, * FROM ip_quota \
                     WHERE violations_count >= $min_violations \
                     ORDER BY violations_count DESC",
                )
                .bind(("min_violations", min_violations))
                .await
                .map_err(DbError::from)?;

            let rows: Vec<QuotaRow> = result.take(0).map_err(DbError::from)?;
            Ok(rows.into_iter().map(QuotaRow::into_record).collect())
        })
        .await
        .map_err(Into::into)
    }
}
