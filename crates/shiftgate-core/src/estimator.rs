//! Trait boundaries for the external training and prediction
//! collaborators.
//!
//! The governance engine never looks inside a model. It authorizes
//! the call, charges the quota at authorization time, and records the
//! storage footprint the trainer reports back. Collaborator failures
//! are surfaced verbatim and never counted as quota violations.

use std::future::Future;

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::schedule::{EmployeeRecord, PredictedDay};

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("training data contains no valid rows")]
    EmptyDataset,

    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("model is not trained yet")]
    ModelNotTrained,

    #[error("employee '{0}' not found in historical data")]
    EmployeeNotFound(String),

    #[error("{0}")]
    Failed(String),
}

/// Outcome of a successful training run.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    /// Model slot the artifacts were stored under.
    pub handle: String,
    /// Storage footprint written by this run, in megabytes. Reported
    /// back so the quota ledger can charge it.
    pub storage_mb: f64,
    pub data_row_count: usize,
    pub employee_count: usize,
}

/// Black-box trainable estimator keyed by employee id.
pub trait Trainer: Send + Sync {
    fn train(
        &self,
        model_id: &str,
        records: &[EmployeeRecord],
    ) -> impl Future<Output = Result<TrainedModel, TrainingError>> + Send;
}

/// Prediction side of the estimator: start/end interval estimates for
/// a window of dates centered on a target date.
pub trait Predictor: Send + Sync {
    fn predict(
        &self,
        model_id: &str,
        employee_id: &str,
        target_date: NaiveDate,
        window_size: u32,
    ) -> impl Future<Output = Result<Vec<PredictedDay>, PredictionError>> + Send;
}

// One estimator instance commonly serves as both collaborators, so
// both traits forward through Arc.

impl<T: Trainer> Trainer for std::sync::Arc<T> {
    fn train(
        &self,
        model_id: &str,
        records: &[EmployeeRecord],
    ) -> impl Future<Output = Result<TrainedModel, TrainingError>> + Send {
        T::train(self, model_id, records)
    }
}

impl<P: Predictor> Predictor for std::sync::Arc<P> {
    fn predict(
        &self,
        model_id: &str,
        employee_id: &str,
        target_date: NaiveDate,
        window_size: u32,
    ) -> impl Future<Output = Result<Vec<PredictedDay>, PredictionError>> + Send {
        P::predict(self, model_id, employee_id, target_date, window_size)
    }
}
