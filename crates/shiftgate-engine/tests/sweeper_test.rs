//! Sweep and background sweeper behavior against in-memory SurrealDB.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use shiftgate_core::error::GateError;
use shiftgate_core::models::event::EventType;
use shiftgate_db::repository::{
    SurrealAuditRepository, SurrealQuotaRepository, SurrealSessionRepository,
};
use shiftgate_engine::{GovernanceConfig, GovernanceEngine, MeanEstimator, sweeper};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

type TestEngine = GovernanceEngine<
    SurrealSessionRepository<Db>,
    SurrealQuotaRepository<Db>,
    SurrealAuditRepository<Db>,
    Arc<MeanEstimator>,
    Arc<MeanEstimator>,
>;

async fn setup(config: GovernanceConfig) -> TestEngine {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    shiftgate_db::run_migrations(&db).await.unwrap();

    let estimator = Arc::new(MeanEstimator::new());
    GovernanceEngine::new(
        SurrealSessionRepository::new(db.clone()),
        SurrealQuotaRepository::new(db.clone()),
        SurrealAuditRepository::new(db),
        estimator.clone(),
        estimator,
        config,
    )
}

const IP: &str = "10.0.0.1";

#[tokio::test]
async fn sweep_removes_expired_sessions_and_frees_slots() {
    let engine = setup(Default::default()).await;

    let short = engine
        .create_session(IP, &json!({}), Some(Duration::milliseconds(5)))
        .await
        .unwrap();
    let long = engine.create_session(IP, &json!({}), None).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    let report = engine.sweep(Utc::now()).await.unwrap();
    assert_eq!(report.sessions_removed, 1);
    assert_eq!(report.bans_lifted, 0);

    let stats = engine.ip_statistics(IP).await.unwrap().unwrap();
    assert_eq!(stats.models_count, 1);
    engine.session_info(&long.session_id, IP).await.unwrap();

    // Swept removal leaves the same audit trail as a manual delete.
    let events = engine.recent_events(Default::default()).await.unwrap();
    let deleted: Vec<_> = events
        .iter()
        .filter(|e| e.event_type == EventType::SessionDeleted)
        .collect();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].session_id.as_deref(), Some(short.session_id.as_str()));

    // A second sweep finds nothing.
    let report = engine.sweep(Utc::now()).await.unwrap();
    assert_eq!(report.sessions_removed, 0);
}

#[tokio::test]
async fn sweep_lifts_lapsed_bans_but_keeps_violations() {
    let config = GovernanceConfig {
        max_sessions_per_ip: 1,
        ban_after_violations: 2,
        ..Default::default()
    };
    let engine = setup(config).await;

    engine.create_session(IP, &json!({}), None).await.unwrap();
    for _ in 0..2 {
        let _ = engine.create_session(IP, &json!({}), None).await;
    }
    assert!(engine.ip_statistics(IP).await.unwrap().unwrap().is_banned);

    // Not lapsed yet.
    let report = engine.sweep(Utc::now()).await.unwrap();
    assert_eq!(report.bans_lifted, 0);

    // Past the 24h default ban duration.
    let report = engine.sweep(Utc::now() + Duration::days(2)).await.unwrap();
    assert_eq!(report.bans_lifted, 1);

    let stats = engine.ip_statistics(IP).await.unwrap().unwrap();
    assert!(!stats.is_banned);
    assert!(stats.banned_until.is_none());
    assert_eq!(stats.violations_count, 2);

    let events = engine.recent_events(Default::default()).await.unwrap();
    assert!(events.iter().any(|e| e.event_type == EventType::IpUnbanned));
}

#[tokio::test]
async fn background_sweeper_collects_on_its_own() {
    let engine = Arc::new(setup(Default::default()).await);

    engine
        .create_session(IP, &json!({}), Some(Duration::milliseconds(5)))
        .await
        .unwrap();

    let handle = sweeper::spawn(engine.clone(), std::time::Duration::from_millis(50));
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    handle.shutdown().await;

    let stats = engine.ip_statistics(IP).await.unwrap().unwrap();
    assert_eq!(stats.models_count, 0);
}

#[tokio::test]
async fn sweeper_shutdown_is_prompt() {
    let engine = Arc::new(setup(Default::default()).await);

    // A long interval must not delay shutdown.
    let handle = sweeper::spawn(engine, std::time::Duration::from_secs(3600));
    tokio::time::timeout(std::time::Duration::from_secs(1), handle.shutdown())
        .await
        .expect("shutdown should not wait for the next tick");
}

#[tokio::test]
async fn sweep_with_nothing_to_do_reports_zero() {
    let engine = setup(Default::default()).await;
    let report = engine.sweep(Utc::now()).await.unwrap();
    assert_eq!(report.sessions_removed, 0);
    assert_eq!(report.bans_lifted, 0);

    let err = engine
        .session_info(&"0".repeat(64), IP)
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::SessionInvalid { .. }));
}
