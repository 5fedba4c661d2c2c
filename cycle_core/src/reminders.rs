//! Reminder planning for predicted periods.
//!
//! The planner turns a history snapshot into a `ReminderPlan`: which
//! previously scheduled reminders to drop and which new ones to schedule.
//! Delivery is someone else's job; anything implementing `ReminderSink`
//! can receive the plan. `JsonReminderSink` keeps pending reminders in a
//! JSON file, which is what the CLI uses.

use crate::{prediction, PeriodRecord, Result};
use chrono::{Days, NaiveDateTime};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Every prediction reminder id starts with this
pub const PREDICTION_ID_PREFIX: &str = "period-prediction-";

pub const TWO_DAY_REMINDER_ID: &str = "period-prediction-2day";
pub const ONE_DAY_REMINDER_ID: &str = "period-prediction-1day";

/// Default lead times, in days before the predicted start
pub const DEFAULT_LEAD_DAYS: [u32; 2] = [2, 1];

/// A reminder to fire at a specific local time
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub title: String,
    pub body: String,
    pub fire_at: NaiveDateTime,
}

/// What a sink has to do to reflect the current prediction
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReminderPlan {
    /// Reminder ids tied to earlier predictions; always cleared first
    pub clear: Vec<String>,
    pub schedule: Vec<Reminder>,
}

/// Reminder id for a lead time
pub fn reminder_id(lead_days: u32) -> String {
    match lead_days {
        2 => TWO_DAY_REMINDER_ID.to_string(),
        1 => ONE_DAY_REMINDER_ID.to_string(),
        n => format!("{}{}day", PREDICTION_ID_PREFIX, n),
    }
}

fn reminder_text(lead_days: u32) -> (String, String) {
    match lead_days {
        1 => (
            "Period Tomorrow".to_string(),
            "Your period is predicted to start tomorrow. Time to prepare!".to_string(),
        ),
        2 => (
            "Period Coming Soon".to_string(),
            "Your period is predicted to start in 2 days".to_string(),
        ),
        0 => (
            "Period Today".to_string(),
            "Your period is predicted to start today".to_string(),
        ),
        n => (
            format!("Period in {} days", n),
            format!("Your period is predicted to start in {} days", n),
        ),
    }
}

/// Plan reminders for the next predicted period.
///
/// The default reminder ids and the ids for `lead_days` are all cleared, so
/// reminders from an earlier lead-day setting don't linger. If there is a prediction, one
/// reminder per lead time is scheduled at `predicted - lead` days; reminders
/// whose time is not after `now` are skipped.
pub fn plan_reminders(
    history: &[PeriodRecord],
    now: NaiveDateTime,
    lead_days: &[u32],
) -> ReminderPlan {
    let mut clear: Vec<String> = vec![TWO_DAY_REMINDER_ID.to_string(), ONE_DAY_REMINDER_ID.to_string()];
    for &lead in lead_days {
        let id = reminder_id(lead);
        if !clear.contains(&id) {
            clear.push(id);
        }
    }

    let Some(predicted) = prediction::next_predicted_period(history) else {
        tracing::info!("No predicted period, clearing prediction reminders");
        return ReminderPlan {
            clear,
            schedule: Vec::new(),
        };
    };

    let schedule = lead_days
        .iter()
        .filter_map(|&lead| {
            let fire_at = predicted.checked_sub_days(Days::new(u64::from(lead)))?;
            if fire_at <= now {
                tracing::debug!("Skipping {}-day reminder, {} is not in the future", lead, fire_at);
                return None;
            }
            let (title, body) = reminder_text(lead);
            Some(Reminder {
                id: reminder_id(lead),
                title,
                body,
                fire_at,
            })
        })
        .collect();

    ReminderPlan { clear, schedule }
}

/// Receiver of reminder plans (notification center, file, test double)
pub trait ReminderSink {
    fn clear(&mut self, ids: &[String]) -> Result<()>;
    fn schedule(&mut self, reminder: &Reminder) -> Result<()>;
}

/// Clear stale reminders, then schedule the new ones.
pub fn apply_plan<S: ReminderSink + ?Sized>(sink: &mut S, plan: &ReminderPlan) -> Result<()> {
    sink.clear(&plan.clear)?;
    for reminder in &plan.schedule {
        sink.schedule(reminder)?;
    }
    tracing::info!(
        cleared = plan.clear.len(),
        scheduled = plan.schedule.len(),
        "Applied reminder plan"
    );
    Ok(())
}

/// Pending reminders kept in a JSON file
pub struct JsonReminderSink {
    path: PathBuf,
    pending: Vec<Reminder>,
}

impl JsonReminderSink {
    /// Open the sink, reading any reminders already pending at `path`.
    ///
    /// A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let pending = read_pending(&path);
        Ok(Self { path, pending })
    }

    pub fn pending(&self) -> &[Reminder] {
        &self.pending
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        let parent = self.path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "reminder path missing parent")
        })?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, &self.pending)?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;
        temp.persist(&self.path).map_err(|e| crate::Error::Io(e.error))?;
        Ok(())
    }
}

fn read_pending(path: &Path) -> Vec<Reminder> {
    let mut contents = String::new();
    let read = File::open(path).and_then(|mut f| f.read_to_string(&mut contents));
    if let Err(e) = read {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Unable to read reminders {:?}: {}. Starting empty.", path, e);
        }
        return Vec::new();
    }

    serde_json::from_str(&contents).unwrap_or_else(|e| {
        tracing::warn!("Failed to parse reminders {:?}: {}. Starting empty.", path, e);
        Vec::new()
    })
}

impl ReminderSink for JsonReminderSink {
    /// Clearing any prediction id sweeps every pending prediction reminder,
    /// including ids no current lead time produces.
    fn clear(&mut self, ids: &[String]) -> Result<()> {
        let sweep = ids.iter().any(|id| id.starts_with(PREDICTION_ID_PREFIX));
        self.pending
            .retain(|r| !ids.contains(&r.id) && !(sweep && r.id.starts_with(PREDICTION_ID_PREFIX)));
        self.persist()
    }

    fn schedule(&mut self, reminder: &Reminder) -> Result<()> {
        self.pending.retain(|r| r.id != reminder.id);
        self.pending.push(reminder.clone());
        self.pending.sort_by_key(|r| r.fire_at);
        self.persist()?;
        tracing::debug!("Scheduled reminder {} for {}", reminder.id, reminder.fire_at);
        Ok(())
    }
}
