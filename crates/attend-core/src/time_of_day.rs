//! Time-of-day normalization.
//!
//! Every threshold comparison in the engine works on minutes since local
//! midnight. This module turns the representations sessions arrive in
//! (RFC 3339 timestamps, zone-less datetimes, bare `HH:MM[:SS]` clock times)
//! into that scale, and builds timestamps back from admin-entered `HH:MM`.
//!
//! Parsing here is lenient: anything unparseable becomes `None` and is treated
//! as absent by callers. The strict parser [`parse_clock_time`] is reserved for
//! human input at the mutation boundary.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};

use crate::types::ValidationError;

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Builds minutes since midnight from an hour and minute.
#[must_use]
pub const fn hm(hour: u32, minute: u32) -> u32 {
    hour * 60 + minute
}

/// Minutes since midnight of a timestamp, on its own wall clock.
#[must_use]
pub fn minutes_of_day(at: &DateTime<FixedOffset>) -> u32 {
    hm(at.hour(), at.minute())
}

/// Converts a heterogeneous time representation into minutes since midnight.
///
/// Zoned timestamps are shifted into `offset` first; zone-less values are taken
/// as already local. Returns `None` for anything unparseable.
#[must_use]
pub fn minutes_since_midnight(input: &str, offset: FixedOffset) -> Option<u32> {
    let input = input.trim();
    if let Some(time) = parse_bare_time(input) {
        return Some(hm(time.hour(), time.minute()));
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(input) {
        return Some(minutes_of_day(&at.with_timezone(&offset)));
    }
    parse_naive_datetime(input).map(|naive| hm(naive.hour(), naive.minute()))
}

/// Parses a timestamp belonging to `work_date`.
///
/// Bare clock times are placed on `work_date`; zone-less datetimes and clock
/// times are interpreted in `offset`. Returns `None` when nothing matches.
#[must_use]
pub fn parse_timestamp(
    input: &str,
    work_date: NaiveDate,
    offset: FixedOffset,
) -> Option<DateTime<FixedOffset>> {
    let input = input.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(input) {
        return Some(at.with_timezone(&offset));
    }
    if let Some(naive) = parse_naive_datetime(input) {
        return Some(localize(naive, offset));
    }
    parse_bare_time(input).map(|time| at_clock_time(work_date, time, offset))
}

/// Strictly parses a 24-hour `HH:MM` entered by a human.
pub fn parse_clock_time(input: &str) -> Result<NaiveTime, ValidationError> {
    let invalid = || ValidationError::InvalidClockTime {
        value: input.to_string(),
    };
    let bytes = input.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return Err(invalid());
    }
    if !bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == 2 || b.is_ascii_digit())
    {
        return Err(invalid());
    }
    NaiveTime::parse_from_str(input, "%H:%M").map_err(|_| invalid())
}

/// Places a clock time on a date in the given offset.
#[must_use]
pub fn at_clock_time(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> DateTime<FixedOffset> {
    localize(date.and_time(time), offset)
}

/// Parses a UTC offset such as `+07:00`.
pub fn parse_offset(input: &str) -> Result<FixedOffset, ValidationError> {
    input
        .trim()
        .parse::<FixedOffset>()
        .map_err(|_| ValidationError::InvalidValue {
            field: "utc offset",
            value: input.to_string(),
        })
}

fn localize(local: NaiveDateTime, offset: FixedOffset) -> DateTime<FixedOffset> {
    let utc = local - TimeDelta::seconds(i64::from(offset.local_minus_utc()));
    DateTime::from_naive_utc_and_offset(utc, offset)
}

fn parse_bare_time(input: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(input, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(input, "%H:%M"))
        .ok()
}

fn parse_naive_datetime(input: &str) -> Option<NaiveDateTime> {
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
}
