//! Cycle prediction engine.
//!
//! Turns a snapshot of period records into:
//! - an average cycle length (with a 28-day fallback for sparse data)
//! - the predicted start of the next period
//! - the predicted start of the pre-menstrual window
//!
//! Nothing here fails: insufficient data and calendar overflow both come back
//! as `None`. The engine never trusts the order of the slice it is given.

use crate::PeriodRecord;
use chrono::{Days, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Cycle length used when there is too little data for a real mean.
pub const FALLBACK_CYCLE_DAYS: i64 = 28;

/// Gaps at or below this many days are treated as entry mistakes.
pub const MIN_GAP_EXCLUSIVE: i64 = 1;

/// Gaps above this many days are treated as missed logging.
pub const MAX_GAP_INCLUSIVE: i64 = 59;

pub const DEFAULT_PERIOD_DURATION: u32 = 5;
pub const DEFAULT_PMS_DURATION: u32 = 7;
pub const DEFAULT_PMS_DAYS_BEFORE: u32 = 7;

/// Window sizes used when turning predictions into calendar marks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastSettings {
    /// Length of the predicted period window, in days
    #[serde(default = "default_period_duration")]
    pub period_duration: u32,

    /// Length of the predicted PMS window, in days
    #[serde(default = "default_pms_duration")]
    pub pms_duration: u32,

    /// How many days before the predicted period the PMS window opens
    #[serde(default = "default_pms_days_before")]
    pub pms_days_before: u32,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            period_duration: DEFAULT_PERIOD_DURATION,
            pms_duration: DEFAULT_PMS_DURATION,
            pms_days_before: DEFAULT_PMS_DAYS_BEFORE,
        }
    }
}

fn default_period_duration() -> u32 {
    DEFAULT_PERIOD_DURATION
}

fn default_pms_duration() -> u32 {
    DEFAULT_PMS_DURATION
}

fn default_pms_days_before() -> u32 {
    DEFAULT_PMS_DAYS_BEFORE
}

/// Whole-day gaps between consecutive start dates, oldest first.
///
/// Includes gaps that `average_cycle_length` would discard.
pub fn cycle_gaps(history: &[PeriodRecord]) -> Vec<i64> {
    let mut starts: Vec<NaiveDateTime> = history.iter().map(|p| p.start_date).collect();
    starts.sort();

    starts
        .windows(2)
        .map(|w| (w[1] - w[0]).num_days())
        .collect()
}

/// Whether a gap is plausible enough to count towards the mean
pub fn is_valid_gap(days: i64) -> bool {
    days > MIN_GAP_EXCLUSIVE && days <= MAX_GAP_INCLUSIVE
}

/// Average cycle length in days
///
/// ## Rules
///
/// 1. Empty history → `None`
/// 2. One record → 28
/// 3. Otherwise the floor of the mean of the valid gaps between consecutive
///    start dates, or 28 if no gap is valid
pub fn average_cycle_length(history: &[PeriodRecord]) -> Option<i64> {
    match history.len() {
        0 => return None,
        1 => {
            tracing::debug!("Single period logged, using {}-day fallback", FALLBACK_CYCLE_DAYS);
            return Some(FALLBACK_CYCLE_DAYS);
        }
        _ => {}
    }

    let gaps = cycle_gaps(history);
    let valid: Vec<i64> = gaps.iter().copied().filter(|&g| is_valid_gap(g)).collect();

    if valid.is_empty() {
        tracing::debug!(
            "All {} cycle gaps out of range {:?}, using {}-day fallback",
            gaps.len(),
            gaps,
            FALLBACK_CYCLE_DAYS
        );
        return Some(FALLBACK_CYCLE_DAYS);
    }

    if valid.len() < gaps.len() {
        tracing::debug!("Discarded {} outlier gap(s)", gaps.len() - valid.len());
    }

    // Valid gaps are positive, so integer division is the floor
    Some(valid.iter().sum::<i64>() / valid.len() as i64)
}

/// The record with the latest start date
pub fn most_recent(history: &[PeriodRecord]) -> Option<&PeriodRecord> {
    history.iter().max_by_key(|p| p.start_date)
}

/// Predicted start of the next period
///
/// Most recent start date plus the average cycle length. `None` when the
/// history is empty or the date would overflow the calendar.
pub fn next_predicted_period(history: &[PeriodRecord]) -> Option<NaiveDateTime> {
    let last = most_recent(history)?;
    let avg = average_cycle_length(history)?;

    let predicted = u64::try_from(avg)
        .ok()
        .and_then(|days| last.start_date.checked_add_days(Days::new(days)));

    if predicted.is_none() {
        tracing::debug!("Prediction overflowed the calendar from {}", last.start_date);
    }
    predicted
}

/// Predicted start of the PMS window, `days_before` days ahead of the period
pub fn next_predicted_pms(history: &[PeriodRecord], days_before: u32) -> Option<NaiveDateTime> {
    next_predicted_period(history)?.checked_sub_days(Days::new(u64::from(days_before)))
}
