//! Error types for the SHIFTGATE system.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    /// Missing, expired, malformed, or foreign session identifier.
    /// Recoverable: the caller may create a fresh session.
    #[error("Session invalid: {reason}")]
    SessionInvalid { reason: String },

    /// The caller's IP is temporarily banned. Recoverable once the
    /// ban lapses.
    #[error("IP {ip_address} is banned until {until}")]
    Banned {
        ip_address: String,
        until: DateTime<Utc>,
    },

    /// A per-IP quota ceiling was hit. Recoverable after the quota
    /// window resets.
    #[error("Quota exceeded for {kind}: limit is {limit}")]
    QuotaExceeded { kind: String, limit: u64 },

    #[error("Invalid TTL: session expiry must be strictly in the future")]
    InvalidTtl,

    #[error("Invalid metadata: {reason}")]
    InvalidMetadata { reason: String },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// Infrastructure fault talking to the store. Callers retry with
    /// backoff; never silently swallowed.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Reported by the training collaborator, surfaced verbatim.
    /// Never counted as a quota violation.
    #[error("Training failed: {0}")]
    Training(String),

    /// Reported by the prediction collaborator, surfaced verbatim.
    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("Database error: {0}")]
    Database(String),
}

pub type GateResult<T> = Result<T, GateError>;
