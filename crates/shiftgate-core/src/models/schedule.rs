//! Historical schedule records and prediction outputs exchanged with
//! the external estimator.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One normalized historical punch record for an employee. Produced
/// by the (out-of-scope) CSV ingestion layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub employee_id: String,
    pub date: NaiveDate,
    /// First punch, minutes after midnight.
    pub start_minutes: u32,
    /// Last punch, minutes after midnight.
    pub end_minutes: u32,
}

/// Predicted start/end interval for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedDay {
    pub date: NaiveDate,
    pub predicted_start_minutes: u32,
    pub predicted_end_minutes: u32,
}
