//! Database-specific error types and conversions.

use std::future::Future;
use std::time::Duration;

use shiftgate_core::error::GateError;

/// Upper bound on any single store call. Exceeding it surfaces as
/// `StoreUnavailable` instead of hanging a request.
pub(crate) const STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("store call exceeded {STORE_TIMEOUT:?}")]
    Timeout,
}

impl From<DbError> for GateError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => GateError::NotFound { entity, id },
            DbError::Timeout => GateError::StoreUnavailable(err.to_string()),
            other => GateError::Database(other.to_string()),
        }
    }
}

/// Run a store call under the bounded timeout.
pub(crate) async fn bounded<T>(
    fut: impl Future<Output = Result<T, DbError>>,
) -> Result<T, DbError> {
    match tokio::time::timeout(STORE_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(DbError::Timeout),
    }
}
