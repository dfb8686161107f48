//! Integration tests for the session repository against in-memory
//! SurrealDB.

use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use shiftgate_core::error::GateError;
use shiftgate_core::models::event::{CreateSecurityEvent, EventType, Severity};
use shiftgate_core::models::session::{CreateSession, MetadataValue};
use shiftgate_core::repository::{AuditRepository, QuotaRepository, SessionRepository};
use shiftgate_db::repository::{
    SurrealAuditRepository, SurrealQuotaRepository, SurrealSessionRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    shiftgate_db::run_migrations(&db).await.unwrap();
    db
}

fn create_input(session_id: &str, ip: &str, ttl: Duration) -> CreateSession {
    let mut metadata = BTreeMap::new();
    metadata.insert("client".to_string(), MetadataValue::String("test".into()));
    CreateSession {
        session_id: session_id.to_string(),
        model_id: "a1b2c3d4e5f60718".to_string(),
        ip_address: ip.to_string(),
        ttl,
        metadata,
    }
}

fn created_event(session_id: &str, ip: &str) -> CreateSecurityEvent {
    CreateSecurityEvent::new(ip, EventType::SessionCreated, Severity::Info)
        .with_session(session_id)
}

fn deleted_event(session_id: &str, ip: &str) -> CreateSecurityEvent {
    CreateSecurityEvent::new(ip, EventType::SessionDeleted, Severity::Info)
        .with_session(session_id)
}

#[tokio::test]
async fn create_persists_session_and_increments_models_count() {
    let db = setup().await;
    let sessions = SurrealSessionRepository::new(db.clone());
    let quotas = SurrealQuotaRepository::new(db.clone());
    let audit = SurrealAuditRepository::new(db);

    let session = sessions
        .create(
            create_input("sess-a", "10.0.0.1", Duration::hours(1)),
            created_event("sess-a", "10.0.0.1"),
        )
        .await
        .unwrap();

    assert_eq!(session.session_id, "sess-a");
    assert_eq!(session.ip_address, "10.0.0.1");
    assert!(session.expires_at > session.created_at);
    assert_eq!(session.created_at, session.last_accessed_at);

    let quota = quotas.get("10.0.0.1").await.unwrap().unwrap();
    assert_eq!(quota.models_count, 1);

    let events = audit.query(Default::default()).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::SessionCreated);
    assert_eq!(events[0].session_id.as_deref(), Some("sess-a"));
}

#[tokio::test]
async fn create_rejects_non_positive_ttl() {
    let db = setup().await;
    let sessions = SurrealSessionRepository::new(db);

    let err = sessions
        .create(
            create_input("sess-b", "10.0.0.1", Duration::zero()),
            created_event("sess-b", "10.0.0.1"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GateError::InvalidTtl));
}

#[tokio::test]
async fn get_unknown_session_is_not_found() {
    let db = setup().await;
    let sessions = SurrealSessionRepository::new(db);

    let err = sessions.get("no-such-session").await.unwrap_err();
    assert!(matches!(err, GateError::NotFound { .. }));
}

#[tokio::test]
async fn touch_updates_last_accessed_at() {
    let db = setup().await;
    let sessions = SurrealSessionRepository::new(db);

    let session = sessions
        .create(
            create_input("sess-c", "10.0.0.1", Duration::hours(1)),
            created_event("sess-c", "10.0.0.1"),
        )
        .await
        .unwrap();

    let later = Utc::now() + Duration::seconds(30);
    sessions.touch("sess-c", later).await.unwrap();

    let fetched = sessions.get("sess-c").await.unwrap();
    assert!(fetched.last_accessed_at > session.last_accessed_at);
    assert_eq!(fetched.created_at, session.created_at);
}

#[tokio::test]
async fn repeated_touch_is_last_value_wins_and_emits_no_events() {
    let db = setup().await;
    let sessions = SurrealSessionRepository::new(db.clone());
    let audit = SurrealAuditRepository::new(db);

    sessions
        .create(
            create_input("sess-t", "10.0.0.1", Duration::hours(1)),
            created_event("sess-t", "10.0.0.1"),
        )
        .await
        .unwrap();
    let events_after_create = audit.count().await.unwrap();

    let base = Utc::now();
    for step in 1..=3 {
        sessions
            .touch("sess-t", base + Duration::seconds(step * 10))
            .await
            .unwrap();
    }

    let fetched = sessions.get("sess-t").await.unwrap();
    assert_eq!(fetched.last_accessed_at, base + Duration::seconds(30));
    assert_eq!(audit.count().await.unwrap(), events_after_create);
}

#[tokio::test]
async fn list_by_ip_excludes_expired_and_foreign_sessions() {
    let db = setup().await;
    let sessions = SurrealSessionRepository::new(db);

    sessions
        .create(
            create_input("sess-live", "10.0.0.1", Duration::hours(1)),
            created_event("sess-live", "10.0.0.1"),
        )
        .await
        .unwrap();
    sessions
        .create(
            create_input("sess-short", "10.0.0.1", Duration::milliseconds(5)),
            created_event("sess-short", "10.0.0.1"),
        )
        .await
        .unwrap();
    sessions
        .create(
            create_input("sess-other", "10.0.0.2", Duration::hours(1)),
            created_event("sess-other", "10.0.0.2"),
        )
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let live = sessions.list_by_ip("10.0.0.1", Utc::now()).await.unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].session_id, "sess-live");

    let expired = sessions.list_expired(Utc::now()).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].session_id, "sess-short");
}

#[tokio::test]
async fn delete_removes_session_and_decrements_models_count() {
    let db = setup().await;
    let sessions = SurrealSessionRepository::new(db.clone());
    let quotas = SurrealQuotaRepository::new(db.clone());
    let audit = SurrealAuditRepository::new(db);

    sessions
        .create(
            create_input("sess-d", "10.0.0.1", Duration::hours(1)),
            created_event("sess-d", "10.0.0.1"),
        )
        .await
        .unwrap();

    sessions
        .delete("sess-d", deleted_event("sess-d", "10.0.0.1"))
        .await
        .unwrap();

    let err = sessions.get("sess-d").await.unwrap_err();
    assert!(matches!(err, GateError::NotFound { .. }));

    let quota = quotas.get("10.0.0.1").await.unwrap().unwrap();
    assert_eq!(quota.models_count, 0);

    let events = audit.query(Default::default()).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_type, EventType::SessionDeleted);
}

#[tokio::test]
async fn delete_of_missing_session_does_not_decrement() {
    let db = setup().await;
    let sessions = SurrealSessionRepository::new(db.clone());
    let quotas = SurrealQuotaRepository::new(db);

    sessions
        .create(
            create_input("sess-e", "10.0.0.1", Duration::hours(1)),
            created_event("sess-e", "10.0.0.1"),
        )
        .await
        .unwrap();
    sessions
        .delete("sess-e", deleted_event("sess-e", "10.0.0.1"))
        .await
        .unwrap();

    let err = sessions
        .delete("sess-e", deleted_event("sess-e", "10.0.0.1"))
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::NotFound { .. }));

    let quota = quotas.get("10.0.0.1").await.unwrap().unwrap();
    assert_eq!(quota.models_count, 0);
}
