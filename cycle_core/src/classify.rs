//! Day classification against logged and predicted periods.
//!
//! Membership queries answer one question each (is this day inside an
//! actual period, the predicted period window, the predicted PMS window).
//! `classify_day` and `Forecast::classify` combine them into a single
//! `DayMark` using a fixed priority:
//!
//! 1. actual period
//! 2. predicted period
//! 3. predicted PMS
//! 4. today
//! 5. unmarked

use crate::prediction::{self, ForecastSettings};
use crate::{CalendarDay, PeriodRecord};
use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::Serialize;

/// Inclusive range of calendar days
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DayWindow {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl DayWindow {
    /// Window of `duration` days beginning on `start`'s day.
    ///
    /// A zero duration is an empty window and yields `None`, as does a window
    /// running off the end of the calendar.
    pub fn starting_at(start: impl CalendarDay, duration: u32) -> Option<Self> {
        let first = start.to_day();
        let span = duration.checked_sub(1)?;
        let last = first.checked_add_days(Days::new(u64::from(span)))?;
        Some(Self { first, last })
    }

    pub fn contains(&self, date: impl CalendarDay) -> bool {
        let day = date.to_day();
        day >= self.first && day <= self.last
    }

    /// Number of days in the window
    pub fn num_days(&self) -> i64 {
        (self.last - self.first).num_days() + 1
    }
}

/// Visual state of a single calendar day. Variants are in priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayMark {
    /// A logged period covers the day (solid fill)
    ActualPeriod,
    /// Inside the predicted period window (outlined ring)
    PredictedPeriod,
    /// Inside the predicted PMS window (alternate ring)
    PredictedPms,
    /// The current day, with nothing else to show (plain ring)
    Today,
    Unmarked,
}

impl DayMark {
    /// Resolve overlapping states; the first true flag wins.
    pub fn resolve(actual: bool, predicted_period: bool, predicted_pms: bool, today: bool) -> Self {
        if actual {
            DayMark::ActualPeriod
        } else if predicted_period {
            DayMark::PredictedPeriod
        } else if predicted_pms {
            DayMark::PredictedPms
        } else if today {
            DayMark::Today
        } else {
            DayMark::Unmarked
        }
    }
}

/// Is `date` inside the predicted period window?
///
/// The window starts on the predicted start day and spans `predicted_duration`
/// days inclusive. No prediction means `false`.
pub fn is_date_in_predicted_period(
    date: impl CalendarDay,
    history: &[PeriodRecord],
    predicted_duration: u32,
) -> bool {
    prediction::next_predicted_period(history)
        .and_then(|start| DayWindow::starting_at(start, predicted_duration))
        .is_some_and(|window| window.contains(date))
}

/// Is `date` inside the predicted PMS window?
pub fn is_date_in_predicted_pms(
    date: impl CalendarDay,
    history: &[PeriodRecord],
    pms_duration: u32,
    days_before: u32,
) -> bool {
    prediction::next_predicted_pms(history, days_before)
        .and_then(|start| DayWindow::starting_at(start, pms_duration))
        .is_some_and(|window| window.contains(date))
}

/// Every record covering `date`, in input order. Overlapping records all match.
pub fn periods_covering(date: impl CalendarDay, history: &[PeriodRecord]) -> Vec<&PeriodRecord> {
    let day = date.to_day();
    history.iter().filter(|p| p.covers(day)).collect()
}

/// Does any logged period cover `date`?
pub fn is_date_in_actual_period(date: impl CalendarDay, history: &[PeriodRecord]) -> bool {
    let day = date.to_day();
    history.iter().any(|p| p.covers(day))
}

/// Classify one day from scratch.
///
/// Recomputes the prediction on every call; use `Forecast` when classifying
/// many days against the same history.
pub fn classify_day(
    date: impl CalendarDay,
    today: impl CalendarDay,
    history: &[PeriodRecord],
    settings: &ForecastSettings,
) -> DayMark {
    let day = date.to_day();
    DayMark::resolve(
        is_date_in_actual_period(day, history),
        is_date_in_predicted_period(day, history, settings.period_duration),
        is_date_in_predicted_pms(
            day,
            history,
            settings.pms_duration,
            settings.pms_days_before,
        ),
        day == today.to_day(),
    )
}

/// Predictions for one history snapshot, computed once.
#[derive(Clone, Debug)]
pub struct Forecast<'a> {
    history: &'a [PeriodRecord],
    average_cycle_length: Option<i64>,
    next_period: Option<NaiveDateTime>,
    next_pms: Option<NaiveDateTime>,
    period_window: Option<DayWindow>,
    pms_window: Option<DayWindow>,
}

impl<'a> Forecast<'a> {
    pub fn new(history: &'a [PeriodRecord], settings: &ForecastSettings) -> Self {
        let average_cycle_length = prediction::average_cycle_length(history);
        let next_period = prediction::next_predicted_period(history);
        let next_pms = next_period.and_then(|p| {
            p.checked_sub_days(Days::new(u64::from(settings.pms_days_before)))
        });

        let period_window =
            next_period.and_then(|p| DayWindow::starting_at(p, settings.period_duration));
        let pms_window = next_pms.and_then(|p| DayWindow::starting_at(p, settings.pms_duration));

        tracing::debug!(
            records = history.len(),
            ?average_cycle_length,
            ?next_period,
            "Built forecast"
        );

        Self {
            history,
            average_cycle_length,
            next_period,
            next_pms,
            period_window,
            pms_window,
        }
    }

    pub fn history(&self) -> &'a [PeriodRecord] {
        self.history
    }

    pub fn average_cycle_length(&self) -> Option<i64> {
        self.average_cycle_length
    }

    pub fn next_period(&self) -> Option<NaiveDateTime> {
        self.next_period
    }

    pub fn next_pms(&self) -> Option<NaiveDateTime> {
        self.next_pms
    }

    pub fn period_window(&self) -> Option<DayWindow> {
        self.period_window
    }

    pub fn pms_window(&self) -> Option<DayWindow> {
        self.pms_window
    }

    /// Calendar days from `today` to the predicted start; negative when overdue
    pub fn days_until_next_period(&self, today: impl CalendarDay) -> Option<i64> {
        let start = self.next_period?.to_day();
        Some((start - today.to_day()).num_days())
    }

    pub fn periods_covering(&self, date: impl CalendarDay) -> Vec<&'a PeriodRecord> {
        periods_covering(date, self.history)
    }

    pub fn classify(&self, date: impl CalendarDay, today: impl CalendarDay) -> DayMark {
        let day = date.to_day();
        DayMark::resolve(
            is_date_in_actual_period(day, self.history),
            self.period_window.is_some_and(|w| w.contains(day)),
            self.pms_window.is_some_and(|w| w.contains(day)),
            day == today.to_day(),
        )
    }
}
