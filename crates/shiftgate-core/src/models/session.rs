//! Session domain model.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GateError;

/// Permitted metadata value shapes.
///
/// The metadata map is schemaless by design, but values are
/// restricted to scalars so validation stays checkable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

pub type SessionMetadata = BTreeMap<String, MetadataValue>;

/// Validate raw JSON as session metadata.
///
/// Accepts a JSON object (or null, treated as empty) whose values are
/// strings, booleans, integers, or floats. Anything else fails with
/// [`GateError::InvalidMetadata`].
pub fn validate_metadata(raw: &serde_json::Value) -> Result<SessionMetadata, GateError> {
    let object = match raw {
        serde_json::Value::Null => return Ok(SessionMetadata::new()),
        serde_json::Value::Object(map) => map,
        other => {
            return Err(GateError::InvalidMetadata {
                reason: format!("expected an object, got {other}"),
            });
        }
    };

    let mut metadata = SessionMetadata::new();
    for (key, value) in object {
        let value = match value {
            serde_json::Value::Bool(b) => MetadataValue::Bool(*b),
            serde_json::Value::String(s) => MetadataValue::String(s.clone()),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    MetadataValue::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    MetadataValue::Float(f)
                } else {
                    return Err(GateError::InvalidMetadata {
                        reason: format!("key '{key}' holds an unrepresentable number"),
                    });
                }
            }
            _ => {
                return Err(GateError::InvalidMetadata {
                    reason: format!("key '{key}' must hold a scalar value"),
                });
            }
        };
        metadata.insert(key.clone(), value);
    }
    Ok(metadata)
}

/// Ephemeral capability token scoping a caller's access to governed
/// operations, owned by one IP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque unique token, generated at creation, never reused.
    pub session_id: String,
    /// Identifier of the model slot this session owns.
    pub model_id: String,
    pub ip_address: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub metadata: SessionMetadata,
}

impl Session {
    /// Logical expiry. Read paths treat an expired session as absent
    /// even before the sweeper has physically removed the row.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Input for session creation. Identifiers are generated by the
/// caller (session store); timestamps are assigned by the repository
/// at commit time.
#[derive(Debug, Clone)]
pub struct CreateSession {
    pub session_id: String,
    pub model_id: String,
    pub ip_address: String,
    /// Must be strictly positive; the resulting expiry must lie in
    /// the future.
    pub ttl: Duration,
    pub metadata: SessionMetadata,
}
