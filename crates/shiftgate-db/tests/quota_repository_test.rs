//! Integration tests for the per-IP quota repository against
//! in-memory SurrealDB.

use chrono::{Duration, Utc};
use shiftgate_core::models::event::{CreateSecurityEvent, EventType, Severity};
use shiftgate_core::models::quota::ActionKind;
use shiftgate_core::repository::{AuditRepository, QuotaRepository, SessionRepository};
use shiftgate_db::repository::{SurrealAuditRepository, SurrealQuotaRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    shiftgate_db::run_migrations(&db).await.unwrap();
    db
}

#[tokio::test]
async fn ensure_creates_zeroed_record_and_is_idempotent() {
    let db = setup().await;
    let quotas = SurrealQuotaRepository::new(db);

    let first = quotas.ensure("10.0.0.1").await.unwrap();
    assert_eq!(first.ip_address, "10.0.0.1");
    assert_eq!(first.models_count, 0);
    assert_eq!(first.requests_count, 0);
    assert_eq!(first.violations_count, 0);
    assert!(!first.is_banned);
    assert!(first.banned_until.is_none());

    let second = quotas.ensure("10.0.0.1").await.unwrap();
    assert_eq!(second.created_at, first.created_at);
}

#[tokio::test]
async fn get_returns_none_for_unknown_ip() {
    let db = setup().await;
    let quotas = SurrealQuotaRepository::new(db);

    assert!(quotas.get("192.168.0.9").await.unwrap().is_none());
}

#[tokio::test]
async fn store_round_trips_full_record() {
    let db = setup().await;
    let quotas = SurrealQuotaRepository::new(db);

    let mut record = quotas.ensure("10.0.0.1").await.unwrap();
    record.charge(ActionKind::Train);
    record.charge(ActionKind::Predict);
    record.storage_used_mb = 12.5;
    record.violations_count = 2;

    quotas.store(&record, Vec::new()).await.unwrap();

    let fetched = quotas.get("10.0.0.1").await.unwrap().unwrap();
    assert_eq!(fetched.requests_count, 2);
    assert_eq!(fetched.train_count, 1);
    assert_eq!(fetched.predictions_count, 1);
    assert_eq!(fetched.storage_used_mb, 12.5);
    assert_eq!(fetched.violations_count, 2);
}

#[tokio::test]
async fn store_appends_events_in_same_commit() {
    let db = setup().await;
    let quotas = SurrealQuotaRepository::new(db.clone());
    let audit = SurrealAuditRepository::new(db);

    let mut record = quotas.ensure("10.0.0.1").await.unwrap();
    record.violations_count = 5;
    record.is_banned = true;
    record.banned_until = Some(Utc::now() + Duration::hours(24));

    let events = vec![
        CreateSecurityEvent::new("10.0.0.1", EventType::ViolationRecorded, Severity::Warning),
        CreateSecurityEvent::new("10.0.0.1", EventType::IpBanned, Severity::Critical),
    ];
    quotas.store(&record, events).await.unwrap();

    let fetched = quotas.get("10.0.0.1").await.unwrap().unwrap();
    assert!(fetched.is_banned);
    assert!(fetched.banned_until.is_some());

    let logged = audit.query(Default::default()).await.unwrap();
    assert_eq!(logged.len(), 2);
    // Newest first.
    assert_eq!(logged[0].event_type, EventType::IpBanned);
    assert_eq!(logged[1].event_type, EventType::ViolationRecorded);
    assert!(logged[0].seq > logged[1].seq);
}

#[tokio::test]
async fn store_does_not_clobber_session_owned_models_count() {
    let db = setup().await;
    let quotas = SurrealQuotaRepository::new(db.clone());
    let sessions = shiftgate_db::repository::SurrealSessionRepository::new(db);

    // Read the record before any session exists.
    let mut stale = quotas.ensure("10.0.0.1").await.unwrap();
    assert_eq!(stale.models_count, 0);

    // A session create commits models_count = 1 in its own
    // transaction, outside the ledger's serialization.
    sessions
        .create(
            shiftgate_core::models::session::CreateSession {
                session_id: "sess-x".into(),
                model_id: "a1b2c3d4e5f60718".into(),
                ip_address: "10.0.0.1".into(),
                ttl: Duration::hours(1),
                metadata: Default::default(),
            },
            CreateSecurityEvent::new("10.0.0.1", EventType::SessionCreated, Severity::Info)
                .with_session("sess-x"),
        )
        .await
        .unwrap();

    // Writing back the stale record must not undo the increment.
    stale.charge(ActionKind::Request);
    quotas.store(&stale, Vec::new()).await.unwrap();

    let fetched = quotas.get("10.0.0.1").await.unwrap().unwrap();
    assert_eq!(fetched.models_count, 1);
    assert_eq!(fetched.requests_count, 1);
}

#[tokio::test]
async fn list_banned_lapsed_only_returns_elapsed_bans() {
    let db = setup().await;
    let quotas = SurrealQuotaRepository::new(db);
    let now = Utc::now();

    let mut lapsed = quotas.ensure("10.0.0.1").await.unwrap();
    lapsed.is_banned = true;
    lapsed.banned_until = Some(now - Duration::minutes(1));
    quotas.store(&lapsed, Vec::new()).await.unwrap();

    let mut active = quotas.ensure("10.0.0.2").await.unwrap();
    active.is_banned = true;
    active.banned_until = Some(now + Duration::hours(1));
    quotas.store(&active, Vec::new()).await.unwrap();

    quotas.ensure("10.0.0.3").await.unwrap();

    let rows = quotas.list_banned_lapsed(now).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].ip_address, "10.0.0.1");
}

#[tokio::test]
async fn list_suspicious_orders_by_violations_descending() {
    let db = setup().await;
    let quotas = SurrealQuotaRepository::new(db);

    for (ip, violations) in [("10.0.0.1", 2u32), ("10.0.0.2", 7), ("10.0.0.3", 4)] {
        let mut record = quotas.ensure(ip).await.unwrap();
        record.violations_count = violations;
        quotas.store(&record, Vec::new()).await.unwrap();
    }

    let rows = quotas.list_suspicious(3).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].ip_address, "10.0.0.2");
    assert_eq!(rows[1].ip_address, "10.0.0.3");
}
