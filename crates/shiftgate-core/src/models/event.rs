//! Security event domain model — the append-only audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    SessionCreated,
    SessionDeleted,
    SessionAccessed,
    QuotaExceeded,
    ViolationRecorded,
    IpBanned,
    IpUnbanned,
    TrainRequested,
    PredictRequested,
    /// Self-referential marker: a prior audit append failed and the
    /// log is known to have a gap.
    AuditDegraded,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::SessionCreated => "session_created",
            EventType::SessionDeleted => "session_deleted",
            EventType::SessionAccessed => "session_accessed",
            EventType::QuotaExceeded => "quota_exceeded",
            EventType::ViolationRecorded => "violation_recorded",
            EventType::IpBanned => "ip_banned",
            EventType::IpUnbanned => "ip_unbanned",
            EventType::TrainRequested => "train_requested",
            EventType::PredictRequested => "predict_requested",
            EventType::AuditDegraded => "audit_degraded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// One immutable entry in the audit trail. `session_id` may reference
/// a since-deleted session; nothing holds a strong reference back to
/// an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// Monotonic sequence number assigned at append time.
    pub seq: u64,
    pub session_id: Option<String>,
    pub ip_address: String,
    pub event_type: EventType,
    pub event_data: serde_json::Value,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

/// Input for appending an event.
#[derive(Debug, Clone)]
pub struct CreateSecurityEvent {
    pub session_id: Option<String>,
    pub ip_address: String,
    pub event_type: EventType,
    pub event_data: serde_json::Value,
    pub severity: Severity,
}

impl CreateSecurityEvent {
    pub fn new(ip_address: impl Into<String>, event_type: EventType, severity: Severity) -> Self {
        Self {
            session_id: None,
            ip_address: ip_address.into(),
            event_type,
            event_data: serde_json::Value::Object(serde_json::Map::new()),
            severity,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_data(mut self, event_data: serde_json::Value) -> Self {
        self.event_data = event_data;
        self
    }
}
