//! Baseline in-memory estimator: per-employee weekday mean profiles.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{Datelike, Duration, NaiveDate};
use shiftgate_core::estimator::{
    PredictionError, Predictor, TrainedModel, Trainer, TrainingError,
};
use shiftgate_core::models::schedule::{EmployeeRecord, PredictedDay};

// Rough per-row footprint of the stored profile, used to report a
// storage charge back to the ledger.
const BYTES_PER_ROW: f64 = 64.0;

#[derive(Debug, Clone, Default)]
struct WeekdayMean {
    start_sum: f64,
    end_sum: f64,
    count: u32,
}

impl WeekdayMean {
    fn mean(&self) -> Option<(f64, f64)> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some((self.start_sum / n, self.end_sum / n))
    }
}

#[derive(Debug, Clone)]
struct EmployeeProfile {
    // Indexed by weekday, Monday = 0.
    weekdays: [WeekdayMean; 7],
    overall: WeekdayMean,
}

impl EmployeeProfile {
    fn new() -> Self {
        Self {
            weekdays: Default::default(),
            overall: WeekdayMean::default(),
        }
    }

    fn observe(&mut self, record: &EmployeeRecord) {
        let day = &mut self.weekdays[record.date.weekday().num_days_from_monday() as usize];
        day.start_sum += record.start_minutes as f64;
        day.end_sum += record.end_minutes as f64;
        day.count += 1;
        self.overall.start_sum += record.start_minutes as f64;
        self.overall.end_sum += record.end_minutes as f64;
        self.overall.count += 1;
    }

    /// Weekday mean for `date`, falling back to the overall mean when
    /// that weekday was never observed.
    fn estimate(&self, date: NaiveDate) -> (f64, f64) {
        let weekday = date.weekday().num_days_from_monday() as usize;
        self.weekdays[weekday]
            .mean()
            .or_else(|| self.overall.mean())
            .unwrap_or((0.0, 0.0))
    }
}

struct ModelData {
    employees: HashMap<String, EmployeeProfile>,
}

/// Trains per-employee weekday mean profiles and predicts shift
/// intervals from them. Models live in process memory, keyed by the
/// session's model handle.
#[derive(Default)]
pub struct MeanEstimator {
    models: RwLock<HashMap<String, ModelData>>,
}

impl MeanEstimator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Trainer for MeanEstimator {
    async fn train(
        &self,
        model_id: &str,
        records: &[EmployeeRecord],
    ) -> Result<TrainedModel, TrainingError> {
        if records.is_empty() {
            return Err(TrainingError::EmptyDataset);
        }

        let mut employees: HashMap<String, EmployeeProfile> = HashMap::new();
        for record in records {
            employees
                .entry(record.employee_id.clone())
                .or_insert_with(EmployeeProfile::new)
                .observe(record);
        }

        let employee_count = employees.len();
        let storage_mb = records.len() as f64 * BYTES_PER_ROW / (1024.0 * 1024.0);

        self.models
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(model_id.to_string(), ModelData { employees });

        Ok(TrainedModel {
            handle: model_id.to_string(),
            storage_mb,
            data_row_count: records.len(),
            employee_count,
        })
    }
}

impl Predictor for MeanEstimator {
    async fn predict(
        &self,
        model_id: &str,
        employee_id: &str,
        target_date: NaiveDate,
        window_size: u32,
    ) -> Result<Vec<PredictedDay>, PredictionError> {
        let models = self.models.read().unwrap_or_else(|e| e.into_inner());
        let model = models
            .get(model_id)
            .ok_or(PredictionError::ModelNotTrained)?;
        let profile = model
            .employees
            .get(employee_id)
            .ok_or_else(|| PredictionError::EmployeeNotFound(employee_id.to_string()))?;

        // Window of dates centered on the target, inclusive.
        let half = (window_size / 2) as i64;
        let mut days = Vec::with_capacity(window_size.max(1) as usize);
        for offset in -half..=half {
            let date = target_date + Duration::days(offset);
            let (start, end) = profile.estimate(date);
            days.push(PredictedDay {
                date,
                predicted_start_minutes: start.round() as u32,
                predicted_end_minutes: end.round() as u32,
            });
        }

        Ok(days)
    }
}
