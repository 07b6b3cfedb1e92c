// Step-count synchronization: sequence-ordered, idempotent ingestion of
// per-day telemetry plus incremental pull and range reads.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{current_time_millis, TimestampMs, UserId};
use crate::domain::{validate_steps, StepCount, SyncStatus};
use crate::error::{AppError, AppResult};
use crate::store::StepStore;

pub const MAX_BATCH_SIZE: usize = 30;
pub const PULL_CAP: usize = 100;
const MAX_RANGE_DAYS: i64 = 31;
const DEFAULT_PULL_WINDOW_DAYS: i64 = 30;
const DEFAULT_RANGE_DAYS: i64 = 7;

// Two concurrent syncs for the same day can race between read and
// compare-and-swap write; the loser re-reads and re-decides.
const SYNC_RETRY_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct StepSyncReq {
    pub steps: i32,
    /// "YYYY-MM-DD"; defaults to today, must not be in the future.
    #[serde(default)]
    pub date: Option<String>,
    /// Client-assigned monotonic ordering key, typically a client timestamp.
    pub sync_sequence: i64,
    /// Last version the client saw; a mismatch signals a concurrent
    /// multi-device write.
    #[serde(default)]
    pub known_version: Option<i32>,
    #[serde(default)]
    pub data_source: Option<String>,
    #[serde(default)]
    pub client_timestamp: Option<TimestampMs>,
}

/// Always reports the persisted state, whatever the outcome.
#[derive(Debug, Clone, Serialize)]
pub struct StepSyncResp {
    pub date: NaiveDate,
    pub status: SyncStatus,
    pub steps: i32,
    pub version: i32,
    pub sync_sequence: i64,
    pub distance_km: f64,
    pub kcal: i32,
    pub active_minutes: i32,
    pub data_source: String,
    pub message: String,
}

impl StepSyncResp {
    fn of(record: &StepCount, status: SyncStatus, message: &str) -> Self {
        StepSyncResp {
            date: record.record_date,
            status,
            steps: record.steps,
            version: record.version,
            sync_sequence: record.sync_sequence,
            distance_km: record.distance_km,
            kcal: record.kcal,
            active_minutes: record.active_minutes,
            data_source: record.data_source.clone(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchSyncReq {
    pub items: Vec<StepSyncReq>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSyncResp {
    pub success_count: usize,
    pub failed_count: usize,
    pub results: Vec<StepSyncResp>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepDayResp {
    pub date: NaiveDate,
    pub steps: i32,
    pub distance_km: f64,
    pub kcal: i32,
    pub active_minutes: i32,
    pub data_source: String,
    pub version: i32,
    pub updated_at: TimestampMs,
}

impl From<StepCount> for StepDayResp {
    fn from(r: StepCount) -> Self {
        StepDayResp {
            date: r.record_date,
            steps: r.steps,
            distance_km: r.distance_km,
            kcal: r.kcal,
            active_minutes: r.active_minutes,
            data_source: r.data_source,
            version: r.version,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PullStepsResp {
    pub updates: Vec<StepDayResp>,
    /// Max updatedAt seen; the client's `since` for its next pull.
    pub latest_timestamp: TimestampMs,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRangeResp {
    pub items: Vec<StepDayResp>,
    pub total_steps: i64,
    pub total_distance_km: f64,
    pub total_kcal: i64,
    pub avg_daily_steps: i64,
}

pub struct StepService {
    steps: Arc<dyn StepStore>,
}

impl StepService {
    pub fn new(steps: Arc<dyn StepStore>) -> Self {
        Self { steps }
    }

    /// One sync decision: REJECTED for a stale sequence, CONFLICT for a
    /// version mismatch, otherwise ACCEPTED with `steps = max(old, new)` and
    /// a version bump. The write is guarded on the previously observed
    /// sequence so racing syncs cannot both win.
    pub async fn sync_steps(&self, user_id: UserId, req: &StepSyncReq) -> AppResult<StepSyncResp> {
        validate_steps(req.steps)?;
        let date = parse_date_not_future(req.date.as_deref())?;

        for _ in 0..SYNC_RETRY_ATTEMPTS {
            match self.steps.get_step_day(user_id, date).await? {
                None => {
                    let record = StepCount::create(
                        user_id,
                        date,
                        req.steps,
                        req.sync_sequence,
                        req.data_source.clone(),
                    )?;
                    if self.steps.insert_step_day(&record).await? {
                        return Ok(StepSyncResp::of(&record, SyncStatus::Accepted, "synced"));
                    }
                }
                Some(mut existing) => {
                    if !existing.should_accept(req.sync_sequence) {
                        return Ok(StepSyncResp::of(
                            &existing,
                            SyncStatus::Rejected,
                            "stale sync sequence",
                        ));
                    }
                    if let Some(known) = req.known_version {
                        if known != existing.version {
                            return Ok(StepSyncResp::of(
                                &existing,
                                SyncStatus::Conflict,
                                "version mismatch",
                            ));
                        }
                    }
                    let previous_sequence = existing.sync_sequence;
                    existing.accept(req.steps, req.sync_sequence, req.data_source.clone());
                    if self
                        .steps
                        .update_step_day(&existing, previous_sequence)
                        .await?
                    {
                        return Ok(StepSyncResp::of(&existing, SyncStatus::Accepted, "synced"));
                    }
                }
            }
            tracing::debug!(user_id, %date, "step sync lost a write race, retrying");
        }
        Err(AppError::Internal(
            "step sync contention not resolved".to_string(),
        ))
    }

    /// Items are applied independently: one rejection or bad item never rolls
    /// back the others.
    pub async fn batch_sync(&self, user_id: UserId, req: BatchSyncReq) -> AppResult<BatchSyncResp> {
        if req.items.len() > MAX_BATCH_SIZE {
            return Err(AppError::InvalidParam(format!(
                "batch exceeds {} items",
                MAX_BATCH_SIZE
            )));
        }

        let mut results = Vec::with_capacity(req.items.len());
        let mut success_count = 0;
        let mut failed_count = 0;
        for item in &req.items {
            match self.sync_steps(user_id, item).await {
                Ok(resp) => {
                    success_count += 1;
                    results.push(resp);
                }
                Err(err) => {
                    failed_count += 1;
                    tracing::warn!(user_id, "batch sync item failed: {}", err);
                }
            }
        }
        Ok(BatchSyncResp {
            success_count,
            failed_count,
            results,
        })
    }

    /// Incremental pull: every record updated after `since` (default: 30 days
    /// ago), newest first, truncated at an internal cap.
    pub async fn pull_steps(
        &self,
        user_id: UserId,
        since: Option<TimestampMs>,
    ) -> AppResult<PullStepsResp> {
        let since = since.unwrap_or_else(|| {
            current_time_millis() - Duration::days(DEFAULT_PULL_WINDOW_DAYS).num_milliseconds()
        });

        let mut records = self
            .steps
            .list_updated_after(user_id, since, PULL_CAP + 1)
            .await?;
        let has_more = records.len() > PULL_CAP;
        if has_more {
            records.truncate(PULL_CAP);
        }

        let latest_timestamp = records
            .iter()
            .map(|r| r.updated_at)
            .max()
            .unwrap_or(since);
        Ok(PullStepsResp {
            updates: records.into_iter().map(Into::into).collect(),
            latest_timestamp,
            has_more,
        })
    }

    /// Single day, zero-filled when no record exists.
    pub async fn get_step_day(
        &self,
        user_id: UserId,
        date: Option<&str>,
    ) -> AppResult<StepDayResp> {
        let date = parse_date_not_future(date)?;
        let record = self
            .steps
            .get_step_day(user_id, date)
            .await?
            .unwrap_or_else(|| StepCount::zeroed(user_id, date));
        Ok(record.into())
    }

    /// Inclusive date range, at most 31 days, missing days zero-filled.
    /// Defaults to the trailing week; reversed bounds are swapped.
    pub async fn get_range(
        &self,
        user_id: UserId,
        from: Option<&str>,
        to: Option<&str>,
    ) -> AppResult<StepRangeResp> {
        let today = Utc::now().date_naive();
        let to = match to {
            Some(s) => parse_date(s)?,
            None => today,
        };
        let from = match from {
            Some(s) => parse_date(s)?,
            None => to - Duration::days(DEFAULT_RANGE_DAYS - 1),
        };
        let (from, to) = if from > to { (to, from) } else { (from, to) };
        if (to - from).num_days() + 1 > MAX_RANGE_DAYS {
            return Err(AppError::RangeTooLarge);
        }

        let records = self.steps.list_range(user_id, from, to).await?;
        let mut by_date = records
            .into_iter()
            .map(|r| (r.record_date, r))
            .collect::<std::collections::HashMap<_, _>>();

        let mut items = Vec::new();
        let mut day = from;
        while day <= to {
            let record = by_date
                .remove(&day)
                .unwrap_or_else(|| StepCount::zeroed(user_id, day));
            items.push(StepDayResp::from(record));
            day = day + Duration::days(1);
        }

        let total_steps: i64 = items.iter().map(|d| i64::from(d.steps)).sum();
        let total_distance_km: f64 = items.iter().map(|d| d.distance_km).sum();
        let total_kcal: i64 = items.iter().map(|d| i64::from(d.kcal)).sum();
        let avg_daily_steps = total_steps / items.len() as i64;
        Ok(StepRangeResp {
            items,
            total_steps,
            total_distance_km: (total_distance_km * 100.0).round() / 100.0,
            total_kcal,
            avg_daily_steps,
        })
    }
}

fn parse_date(s: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::InvalidParam(format!("invalid date: {}", s)))
}

fn parse_date_not_future(s: Option<&str>) -> AppResult<NaiveDate> {
    let today = Utc::now().date_naive();
    let date = match s {
        Some(s) if !s.trim().is_empty() => parse_date(s)?,
        _ => today,
    };
    if date > today {
        return Err(AppError::InvalidParam(
            "date must not be in the future".to_string(),
        ));
    }
    Ok(date)
}
