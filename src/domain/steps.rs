// Daily step-count records and the sync decision logic. One record per
// (user, date); mutations go through the sync protocol only.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::{current_time_millis, TimestampMs, UserId};
use crate::error::{AppError, AppResult};

pub const MAX_STEPS: i32 = 100_000;

// Fixed stride/MET model for derived metrics.
const STEP_LENGTH_METERS: f64 = 0.7;
const STEPS_PER_ACTIVE_MINUTE: i32 = 100;
const KCAL_PER_STEP: f64 = 0.04;

pub const DEFAULT_DATA_SOURCE: &str = "Sensor";

/// Outcome of a sync attempt. REJECTED and CONFLICT are normal response
/// variants the client branches on, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Accepted,
    Rejected,
    Conflict,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepCount {
    pub user_id: UserId,
    pub record_date: NaiveDate,
    pub steps: i32,
    pub distance_km: f64,
    pub kcal: i32,
    pub active_minutes: i32,
    pub data_source: String,
    /// Client-assigned monotonic ordering key; submissions at or below the
    /// stored value are stale.
    pub sync_sequence: i64,
    /// Optimistic counter, bumped on every accepted sync.
    pub version: i32,
    pub updated_at: TimestampMs,
}

impl StepCount {
    /// First record for a (user, date).
    pub fn create(
        user_id: UserId,
        record_date: NaiveDate,
        steps: i32,
        sync_sequence: i64,
        data_source: Option<String>,
    ) -> AppResult<Self> {
        validate_steps(steps)?;
        let mut record = StepCount {
            user_id,
            record_date,
            steps,
            distance_km: 0.0,
            kcal: 0,
            active_minutes: 0,
            data_source: data_source.unwrap_or_else(|| DEFAULT_DATA_SOURCE.to_string()),
            sync_sequence,
            version: 1,
            updated_at: current_time_millis(),
        };
        record.recompute_metrics();
        Ok(record)
    }

    /// Placeholder row for a day with no record, used when zero-filling
    /// range and day reads. `version` 0 marks it as never synced.
    pub fn zeroed(user_id: UserId, record_date: NaiveDate) -> Self {
        StepCount {
            user_id,
            record_date,
            steps: 0,
            distance_km: 0.0,
            kcal: 0,
            active_minutes: 0,
            data_source: DEFAULT_DATA_SOURCE.to_string(),
            sync_sequence: 0,
            version: 0,
            updated_at: 0,
        }
    }

    /// Whether a submission with this sequence is fresher than the record.
    pub fn should_accept(&self, sync_sequence: i64) -> bool {
        sync_sequence > self.sync_sequence
    }

    /// Apply an accepted sync. The persisted step count never regresses: a
    /// fresher submission with fewer steps (device resync) keeps the maximum.
    pub fn accept(&mut self, steps: i32, sync_sequence: i64, data_source: Option<String>) {
        self.steps = self.steps.max(steps);
        self.sync_sequence = sync_sequence;
        self.version += 1;
        if let Some(source) = data_source {
            self.data_source = source;
        }
        self.updated_at = current_time_millis();
        self.recompute_metrics();
    }

    /// Recompute distance, calories and active minutes from the step count.
    pub fn recompute_metrics(&mut self) {
        let distance_m = f64::from(self.steps) * STEP_LENGTH_METERS;
        self.distance_km = round2(distance_m / 1000.0);
        self.active_minutes = self.steps / STEPS_PER_ACTIVE_MINUTE;
        self.kcal = (f64::from(self.steps) * KCAL_PER_STEP).round() as i32;
    }
}

pub fn validate_steps(steps: i32) -> AppResult<()> {
    if !(0..=MAX_STEPS).contains(&steps) {
        return Err(AppError::InvalidParam(format!(
            "steps must be between 0 and {}",
            MAX_STEPS
        )));
    }
    Ok(())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn derived_metrics() {
        let record = StepCount::create(1, date("2025-01-10"), 3000, 100, None).unwrap();
        assert_eq!(record.distance_km, 2.1);
        assert_eq!(record.active_minutes, 30);
        assert_eq!(record.kcal, 120);
        assert_eq!(record.data_source, "Sensor");
        assert_eq!(record.version, 1);
    }

    #[test]
    fn accept_keeps_max_steps() {
        let mut record = StepCount::create(1, date("2025-01-10"), 3000, 100, None).unwrap();
        record.accept(2000, 150, None);
        assert_eq!(record.steps, 3000);
        assert_eq!(record.sync_sequence, 150);
        assert_eq!(record.version, 2);

        record.accept(5000, 200, Some("GoogleFit".to_string()));
        assert_eq!(record.steps, 5000);
        assert_eq!(record.version, 3);
        assert_eq!(record.data_source, "GoogleFit");
    }

    #[test]
    fn stale_sequence_is_not_accepted() {
        let record = StepCount::create(1, date("2025-01-10"), 3000, 100, None).unwrap();
        assert!(!record.should_accept(100));
        assert!(!record.should_accept(50));
        assert!(record.should_accept(101));
    }

    #[test]
    fn step_bounds() {
        assert!(validate_steps(0).is_ok());
        assert!(validate_steps(MAX_STEPS).is_ok());
        assert!(validate_steps(-1).is_err());
        assert!(validate_steps(MAX_STEPS + 1).is_err());
    }
}
