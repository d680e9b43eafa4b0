//! Work-calendar generation.

use chrono::{Datelike, NaiveDate, Weekday};

use crate::model::WorkCalendarDay;
use crate::types::ValidationError;

/// Generates the default calendar for a year: Monday to Friday working with
/// a full unit, weekends off.
pub fn generate_year(year: i32) -> Result<Vec<WorkCalendarDay>, ValidationError> {
    let invalid = || ValidationError::InvalidMonth { year, month: 1 };
    let start = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(invalid)?;
    let end = NaiveDate::from_ymd_opt(year + 1, 1, 1).ok_or_else(invalid)?;

    Ok(start
        .iter_days()
        .take_while(|d| *d < end)
        .map(default_day)
        .collect())
}

/// The default definition of a single date.
#[must_use]
pub fn default_day(date: NaiveDate) -> WorkCalendarDay {
    let is_working_day = !matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
    WorkCalendarDay {
        date,
        is_working_day,
        work_unit: if is_working_day { 1.0 } else { 0.0 },
        note: None,
    }
}
