//! Core domain types for the cycle tracker.
//!
//! This module defines:
//! - Flow levels and symptom tags, with the lenient parsing used for stored data
//! - The period record, the only entity the engine reads
//! - The `CalendarDay` trait used to compare anything date-like at day granularity

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

// ============================================================================
// Day granularity
// ============================================================================

/// Anything that can be reduced to a calendar day.
///
/// All range checks in the engine go through this trait, so time of day is
/// discarded before any comparison.
pub trait CalendarDay {
    fn to_day(&self) -> NaiveDate;
}

impl CalendarDay for NaiveDate {
    fn to_day(&self) -> NaiveDate {
        *self
    }
}

impl CalendarDay for NaiveDateTime {
    fn to_day(&self) -> NaiveDate {
        self.date()
    }
}

impl<Tz: TimeZone> CalendarDay for DateTime<Tz> {
    fn to_day(&self) -> NaiveDate {
        self.date_naive()
    }
}

impl<T: CalendarDay + ?Sized> CalendarDay for &T {
    fn to_day(&self) -> NaiveDate {
        (**self).to_day()
    }
}

// ============================================================================
// Flow level
// ============================================================================

/// Menstrual flow intensity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FlowLevel {
    Light,
    #[default]
    Medium,
    Heavy,
}

impl FlowLevel {
    pub const ALL: [FlowLevel; 3] = [FlowLevel::Light, FlowLevel::Medium, FlowLevel::Heavy];

    /// Label used in stored data and in output
    pub fn label(self) -> &'static str {
        match self {
            FlowLevel::Light => "Light",
            FlowLevel::Medium => "Medium",
            FlowLevel::Heavy => "Heavy",
        }
    }

    /// Strict parse (case-insensitive). Returns None for unknown values.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "light" => Some(FlowLevel::Light),
            "medium" => Some(FlowLevel::Medium),
            "heavy" => Some(FlowLevel::Heavy),
            _ => None,
        }
    }

    /// Parse a stored value. Unknown values fall back to `Medium`.
    pub fn from_stored(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|| {
            tracing::debug!("Unknown stored flow level {:?}, using Medium", raw);
            FlowLevel::Medium
        })
    }
}

impl fmt::Display for FlowLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FlowLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            Error::InvalidInput(format!(
                "unknown flow level '{}' (expected light, medium or heavy)",
                s
            ))
        })
    }
}

impl Serialize for FlowLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for FlowLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Any shape is accepted; only a string can name a level
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(raw) => Ok(FlowLevel::from_stored(&raw)),
            other => {
                tracing::debug!("Stored flow {} is not a string, using Medium", other);
                Ok(FlowLevel::default())
            }
        }
    }
}

// ============================================================================
// Symptoms
// ============================================================================

/// Symptom tags that can be attached to a period record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symptom {
    Cramps,
    Headache,
    BackPain,
    Mood,
    Fatigue,
    Bloating,
}

impl Symptom {
    pub const ALL: [Symptom; 6] = [
        Symptom::Cramps,
        Symptom::Headache,
        Symptom::BackPain,
        Symptom::Mood,
        Symptom::Fatigue,
        Symptom::Bloating,
    ];

    /// Label used in stored data and in output
    pub fn label(self) -> &'static str {
        match self {
            Symptom::Cramps => "Cramps",
            Symptom::Headache => "Headache",
            Symptom::BackPain => "Back Pain",
            Symptom::Mood => "Mood Changes",
            Symptom::Fatigue => "Fatigue",
            Symptom::Bloating => "Bloating",
        }
    }

    /// Parse a stored tag. Accepts the label or the snake_case name,
    /// case-insensitively. Unknown tags return None.
    pub fn from_stored(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "cramps" => Some(Symptom::Cramps),
            "headache" => Some(Symptom::Headache),
            "back pain" => Some(Symptom::BackPain),
            "mood" | "mood changes" => Some(Symptom::Mood),
            "fatigue" => Some(Symptom::Fatigue),
            "bloating" => Some(Symptom::Bloating),
            _ => None,
        }
    }
}

impl fmt::Display for Symptom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Symptom {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_stored(s).ok_or_else(|| Error::InvalidInput(format!("unknown symptom '{}'", s)))
    }
}

impl Serialize for Symptom {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Deserialize a stored tag list, silently dropping tags we don't know.
///
/// Anything that isn't a list reads as no symptoms, and non-string items are
/// skipped.
fn symptoms_from_stored<'de, D>(deserializer: D) -> Result<BTreeSet<Symptom>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Null => Vec::new(),
        other => {
            tracing::debug!("Stored symptoms {} are not a list, ignoring", other);
            Vec::new()
        }
    };

    Ok(items
        .iter()
        .filter_map(|item| {
            let parsed = item.as_str().and_then(Symptom::from_stored);
            if parsed.is_none() {
                tracing::debug!("Dropping unknown stored symptom {}", item);
            }
            parsed
        })
        .collect())
}

// ============================================================================
// Period record
// ============================================================================

/// One logged period
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeriodRecord {
    pub id: Uuid,
    pub start_date: NaiveDateTime,
    #[serde(default)]
    pub end_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub flow: FlowLevel,
    #[serde(default, deserialize_with = "symptoms_from_stored")]
    pub symptoms: BTreeSet<Symptom>,
    #[serde(default)]
    pub notes: String,
}

impl PeriodRecord {
    /// New ongoing record with medium flow and no symptoms
    pub fn new(start_date: NaiveDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            start_date,
            end_date: None,
            flow: FlowLevel::default(),
            symptoms: BTreeSet::new(),
            notes: String::new(),
        }
    }

    pub fn with_end(mut self, end_date: NaiveDateTime) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn with_flow(mut self, flow: FlowLevel) -> Self {
        self.flow = flow;
        self
    }

    pub fn with_symptoms(mut self, symptoms: impl IntoIterator<Item = Symptom>) -> Self {
        self.symptoms = symptoms.into_iter().collect();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Still running (no end date logged yet)
    pub fn is_ongoing(&self) -> bool {
        self.end_date.is_none()
    }

    pub fn start_day(&self) -> NaiveDate {
        self.start_date.to_day()
    }

    /// Last day covered by the record; the start day when no end is logged
    pub fn end_day(&self) -> NaiveDate {
        self.end_date.unwrap_or(self.start_date).to_day()
    }

    /// Inclusive day-range membership.
    ///
    /// A record whose end precedes its start covers nothing.
    pub fn covers(&self, date: impl CalendarDay) -> bool {
        let day = date.to_day();
        day >= self.start_day() && day <= self.end_day()
    }

    /// Whole days from start to end, or to `now` while ongoing. Never negative.
    pub fn duration_days(&self, now: NaiveDateTime) -> i64 {
        let end = self.end_date.unwrap_or(now);
        (end - self.start_date).num_days().max(0)
    }
}
