//! Unit tests for the pure domain logic: metadata validation, quota
//! window resets, and the ban predicate.

use chrono::{Duration, Utc};
use serde_json::json;
use shiftgate_core::error::GateError;
use shiftgate_core::models::quota::{ActionKind, QuotaRecord};
use shiftgate_core::models::session::{MetadataValue, validate_metadata};

fn quota(ip: &str) -> QuotaRecord {
    let now = Utc::now();
    QuotaRecord {
        ip_address: ip.into(),
        models_count: 0,
        storage_used_mb: 0.0,
        requests_count: 0,
        train_count: 0,
        predictions_count: 0,
        violations_count: 0,
        is_banned: false,
        banned_until: None,
        last_reset: now,
        created_at: now,
    }
}

#[test]
fn metadata_accepts_scalar_values() {
    let metadata = validate_metadata(&json!({
        "user_agent": "curl/8.0",
        "retries": 3,
        "ratio": 0.5,
        "trusted": false,
    }))
    .unwrap();

    assert_eq!(
        metadata.get("user_agent"),
        Some(&MetadataValue::String("curl/8.0".into()))
    );
    assert_eq!(metadata.get("retries"), Some(&MetadataValue::Integer(3)));
    assert_eq!(metadata.get("ratio"), Some(&MetadataValue::Float(0.5)));
    assert_eq!(metadata.get("trusted"), Some(&MetadataValue::Bool(false)));
}

#[test]
fn metadata_null_is_empty() {
    let metadata = validate_metadata(&serde_json::Value::Null).unwrap();
    assert!(metadata.is_empty());
}

#[test]
fn metadata_rejects_non_object() {
    let err = validate_metadata(&json!([1, 2, 3])).unwrap_err();
    assert!(matches!(err, GateError::InvalidMetadata { .. }));
}

#[test]
fn metadata_rejects_nested_values() {
    let err = validate_metadata(&json!({"nested": {"a": 1}})).unwrap_err();
    match err {
        GateError::InvalidMetadata { reason } => assert!(reason.contains("nested")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn window_reset_zeroes_counters_after_elapse() {
    let now = Utc::now();
    let mut record = quota("10.0.0.1");
    record.requests_count = 10;
    record.train_count = 2;
    record.predictions_count = 5;
    record.violations_count = 3;
    record.last_reset = now - Duration::hours(2);

    assert!(record.reset_window_if_elapsed(now, Duration::hours(1)));
    assert_eq!(record.requests_count, 0);
    assert_eq!(record.train_count, 0);
    assert_eq!(record.predictions_count, 0);
    // Violations are not windowed; they persist across resets.
    assert_eq!(record.violations_count, 3);
    assert_eq!(record.last_reset, now);
}

#[test]
fn window_reset_is_a_noop_within_window() {
    let now = Utc::now();
    let mut record = quota("10.0.0.1");
    record.requests_count = 10;
    record.last_reset = now - Duration::minutes(10);

    assert!(!record.reset_window_if_elapsed(now, Duration::hours(1)));
    assert_eq!(record.requests_count, 10);
}

#[test]
fn charge_always_bumps_generic_counter() {
    let mut record = quota("10.0.0.1");
    record.charge(ActionKind::Request);
    record.charge(ActionKind::Train);
    record.charge(ActionKind::Predict);

    assert_eq!(record.requests_count, 3);
    assert_eq!(record.train_count, 1);
    assert_eq!(record.predictions_count, 1);
    assert_eq!(record.counter_for(ActionKind::Train), 1);
}

#[test]
fn ban_predicate_respects_banned_until() {
    let now = Utc::now();
    let mut record = quota("10.0.0.1");
    assert!(!record.is_banned_at(now));

    record.is_banned = true;
    record.banned_until = Some(now + Duration::hours(1));
    assert!(record.is_banned_at(now));
    assert!(!record.is_banned_at(now + Duration::hours(2)));

    // A ban without an end date is still in force.
    record.banned_until = None;
    assert!(record.is_banned_at(now));
}
