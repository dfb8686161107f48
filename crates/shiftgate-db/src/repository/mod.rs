//! SurrealDB repository implementations.

mod audit;
mod quota;
mod session;

pub use audit::SurrealAuditRepository;
pub use quota::SurrealQuotaRepository;
pub use session::SurrealSessionRepository;

use shiftgate_core::models::event::{EventType, Severity};

use crate::error::DbError;

pub(crate) fn severity_to_string(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "INFO",
        Severity::Warning => "WARNING",
        Severity::Critical => "CRITICAL",
    }
}

pub(crate) fn parse_severity(s: &str) -> Result<Severity, DbError> {
    match s {
        "INFO" => Ok(Severity::Info),
        "WARNING" => Ok(Severity::Warning),
        "CRITICAL" => Ok(Severity::Critical),
        other => Err(DbError::Migration(format!("unknown severity: {other}"))),
    }
}

pub(crate) fn parse_event_type(s: &str) -> Result<EventType, DbError> {
    match s {
        "session_created" => Ok(EventType::SessionCreated),
        "session_deleted" => Ok(EventType::SessionDeleted),
        "session_accessed" => Ok(EventType::SessionAccessed),
        "quota_exceeded" => Ok(EventType::QuotaExceeded),
        "violation_recorded" => Ok(EventType::ViolationRecorded),
        "ip_banned" => Ok(EventType::IpBanned),
        "ip_unbanned" => Ok(EventType::IpUnbanned),
        "train_requested" => Ok(EventType::TrainRequested),
        "predict_requested" => Ok(EventType::PredictRequested),
        "audit_degraded" => Ok(EventType::AuditDegraded),
        other => Err(DbError::Migration(format!("unknown event type: {other}"))),
    }
}

/// Statements appending one audit event with a monotonic sequence
/// number drawn from the `gate_counter` record. Appended to compound
/// mutation queries so the event commits in the same transaction.
pub(crate) fn event_sql(i: usize) -> String {
    format!(
        "LET $seq{i} = (UPSERT ONLY gate_counter:security_event \
         SET value += 1 RETURN AFTER).value; \
         CREATE security_event SET \
         seq = $seq{i}, \
         session_id = $ev{i}_session_id, \
         ip_address = $ev{i}_ip_address, \
         event_type = $ev{i}_event_type, \
         event_data = $ev{i}_event_data, \
         severity = $ev{i}_severity;"
    )
}
