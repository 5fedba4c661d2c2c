//! Month grid construction for calendar rendering.
//!
//! A grid is a flat list of cells read row by row, seven per week. Leading
//! cells before the first of the month are `None`; there is no trailing
//! padding unless the caller asks for it with `pad_to_full_weeks`.

use crate::CalendarDay;
use chrono::{Datelike, Months, NaiveDate, Weekday};

/// Weekday distance from `first_weekday` to `day`, in 0..=6
pub fn weekday_offset(day: Weekday, first_weekday: Weekday) -> u32 {
    (day.num_days_from_monday() + 7 - first_weekday.num_days_from_monday()) % 7
}

/// First day of the month containing `anchor`
pub fn first_of_month(anchor: impl CalendarDay) -> NaiveDate {
    let day = anchor.to_day();
    // Day 1 exists in every month chrono can represent
    day - chrono::Duration::days(i64::from(day.day0()))
}

/// Number of days in the month containing `anchor`
pub fn days_in_month(anchor: impl CalendarDay) -> u32 {
    let first = first_of_month(anchor);
    first
        .iter_days()
        .take_while(|d| d.month() == first.month())
        .count() as u32
}

/// Leading blanks followed by every day of `anchor`'s month, ascending.
pub fn build_month_grid(anchor: impl CalendarDay, first_weekday: Weekday) -> Vec<Option<NaiveDate>> {
    let first = first_of_month(anchor);
    let offset = weekday_offset(first.weekday(), first_weekday) as usize;

    let mut cells: Vec<Option<NaiveDate>> = vec![None; offset];
    cells.extend(
        first
            .iter_days()
            .take_while(|d| d.month() == first.month())
            .map(Some),
    );

    tracing::trace!(month = %first.format("%Y-%m"), offset, cells = cells.len(), "Built month grid");
    cells
}

/// Append blank cells until the grid fills whole weeks.
pub fn pad_to_full_weeks(mut grid: Vec<Option<NaiveDate>>) -> Vec<Option<NaiveDate>> {
    while grid.len() % 7 != 0 {
        grid.push(None);
    }
    grid
}

/// Move `anchor` by a number of months, clamping the day of month.
///
/// Returns `None` past the representable calendar range.
pub fn shift_month(anchor: NaiveDate, months: i32) -> Option<NaiveDate> {
    let delta = Months::new(months.unsigned_abs());
    if months >= 0 {
        anchor.checked_add_months(delta)
    } else {
        anchor.checked_sub_months(delta)
    }
}

/// Short weekday names in display order, starting at `first_weekday`
pub fn weekday_headers(first_weekday: Weekday) -> [&'static str; 7] {
    let mut headers = [""; 7];
    let mut weekday = first_weekday;
    for header in headers.iter_mut() {
        *header = short_name(weekday);
        weekday = weekday.succ();
    }
    headers
}

fn short_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

/// "February 2024"
pub fn month_title(anchor: impl CalendarDay) -> String {
    first_of_month(anchor).format("%B %Y").to_string()
}
