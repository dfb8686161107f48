//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! Enums are stored as strings with ASSERT constraints. Session and
//! quota record ids carry the session token / IP address directly, so
//! lookups are point reads.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info};

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 — initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Sessions (record id = opaque session token)
-- =======================================================================
DEFINE TABLE session SCHEMAFULL;
DEFINE FIELD model_id ON TABLE session TYPE string;
DEFINE FIELD ip_address ON TABLE session TYPE string;
DEFINE FIELD created_at ON TABLE session TYPE datetime;
DEFINE FIELD last_accessed_at ON TABLE session TYPE datetime;
DEFINE FIELD expires_at ON TABLE session TYPE datetime;
DEFINE FIELD metadata ON TABLE session TYPE object FLEXIBLE DEFAULT {};
DEFINE INDEX idx_session_ip ON TABLE session COLUMNS ip_address;
DEFINE INDEX idx_session_expires ON TABLE session COLUMNS expires_at;
DEFINE INDEX idx_session_ip_expires ON TABLE session \
    COLUMNS ip_address, expires_at;

-- =======================================================================
-- Per-IP quotas (record id = IP address)
-- =======================================================================
DEFINE TABLE ip_quota SCHEMAFULL;
DEFINE FIELD models_count ON TABLE ip_quota TYPE int DEFAULT 0;
DEFINE FIELD storage_used_mb ON TABLE ip_quota TYPE float DEFAULT 0.0;
DEFINE FIELD requests_count ON TABLE ip_quota TYPE int DEFAULT 0;
DEFINE FIELD train_count ON TABLE ip_quota TYPE int DEFAULT 0;
DEFINE FIELD predictions_count ON TABLE ip_quota TYPE int DEFAULT 0;
DEFINE FIELD violations_count ON TABLE ip_quota TYPE int DEFAULT 0;
DEFINE FIELD is_banned ON TABLE ip_quota TYPE bool DEFAULT false;
DEFINE FIELD banned_until ON TABLE ip_quota TYPE option<datetime>;
DEFINE FIELD last_reset ON TABLE ip_quota TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD created_at ON TABLE ip_quota TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_ip_quota_banned ON TABLE ip_quota COLUMNS is_banned;
DEFINE INDEX idx_ip_quota_violations ON TABLE ip_quota \
    COLUMNS violations_count;

-- =======================================================================
-- Security events (append-only audit trail)
-- =======================================================================
DEFINE TABLE security_event SCHEMAFULL;
DEFINE FIELD seq ON TABLE security_event TYPE int;
DEFINE FIELD session_id ON TABLE security_event TYPE option<string>;
DEFINE FIELD ip_address ON TABLE security_event TYPE string;
DEFINE FIELD event_type ON TABLE security_event TYPE string \
    ASSERT $value IN ['session_created', 'session_deleted', \
    'session_accessed', 'quota_exceeded', 'violation_recorded', \
    'ip_banned', 'ip_unbanned', 'train_requested', \
    'predict_requested', 'audit_degraded'];
DEFINE FIELD event_data ON TABLE security_event TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD severity ON TABLE security_event TYPE string \
    ASSERT $value IN ['INFO', 'WARNING', 'CRITICAL'];
DEFINE FIELD created_at ON TABLE security_event TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_event_seq ON TABLE security_event COLUMNS seq UNIQUE;
DEFINE INDEX idx_event_ip_date ON TABLE security_event \
    COLUMNS ip_address, created_at;
DEFINE INDEX idx_event_type ON TABLE security_event COLUMNS event_type;
DEFINE INDEX idx_event_session ON TABLE security_event \
    COLUMNS session_id;

-- =======================================================================
-- Monotonic counters (event sequence numbers)
-- =======================================================================
DEFINE TABLE gate_counter SCHEMAFULL;
DEFINE FIELD value ON TABLE gate_counter TYPE int DEFAULT 0;
";

// -----------------------------------------------------------------------
// Migration runner
// -----------------------------------------------------------------------

/// Apply all pending migrations to the given database. Idempotent.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let current = current_version(db).await?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();
    if pending.is_empty() {
        debug!(version = current, "schema is up to date");
        return Ok(());
    }

    for migration in pending {
        info!(
            version = migration.version,
            name = migration.name,
            "applying migration"
        );
        apply(db, migration).await?;
    }

    Ok(())
}

async fn current_version<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let rows: Vec<MigrationRecord> = result.take(0)?;
    Ok(rows.first().map(|m| m.version).unwrap_or(0))
}

async fn apply<C: Connection>(db: &Surreal<C>, migration: &Migration) -> Result<(), DbError> {
    db.query(migration.sql).await?.check().map_err(|e| {
        DbError::Migration(format!(
            "v{} '{}' failed: {e}",
            migration.version, migration.name,
        ))
    })?;

    db.query("CREATE _migration SET version = $version, name = $name")
        .bind(("version", migration.version))
        .bind(("name", migration.name))
        .await?
        .check()
        .map_err(|e| {
            DbError::Migration(format!(
                "recording v{} failed: {e}",
                migration.version,
            ))
        })?;

    Ok(())
}

/// Returns the raw schema DDL for version 1.
///
/// Exposed for testing with in-memory SurrealDB instances that
/// bypass the migration runner.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
