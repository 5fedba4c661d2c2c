#![forbid(unsafe_code)]

//! Core domain model and prediction logic for the cycle tracker.
//!
//! This crate provides:
//! - Domain types (period records, flow levels, symptoms)
//! - Prediction engine (average cycle length, next period, PMS window)
//! - Day classification for calendar rendering
//! - Month grid construction
//! - Reminder planning
//! - Persistence (history store) and configuration

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod prediction;
pub mod classify;
pub mod calendar;
pub mod reminders;
pub mod store;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use prediction::{
    average_cycle_length, next_predicted_pms, next_predicted_period, ForecastSettings,
};
pub use classify::{
    classify_day, is_date_in_actual_period, is_date_in_predicted_period, is_date_in_predicted_pms,
    periods_covering, DayMark, DayWindow, Forecast,
};
pub use calendar::build_month_grid;
pub use reminders::{apply_plan, plan_reminders, JsonReminderSink, Reminder, ReminderPlan, ReminderSink};
pub use store::PeriodLog;
