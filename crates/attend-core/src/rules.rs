//! Fixed business-policy thresholds and the per-session unit rules.
//!
//! All values are minutes since local midnight.

use crate::time_of_day::hm;

/// On-time reference for morning lateness.
pub const MORNING_START: u32 = hm(8, 30);
/// First minute counted as late in the morning.
pub const MORNING_LATE_FROM: u32 = hm(8, 31);
/// Check-in later than this is a morning absence, not lateness.
pub const MORNING_ABSENT_AFTER: u32 = hm(9, 30);
/// Check-out before noon is an afternoon absence plus morning early leave.
pub const NOON: u32 = hm(12, 0);
/// On-time reference for afternoon lateness.
pub const AFTERNOON_START: u32 = hm(13, 30);
/// Check-in later than this (after a morning absence) is afternoon lateness.
pub const AFTERNOON_LATE_AFTER: u32 = hm(13, 31);
/// Check-out before this is an afternoon absence.
pub const AFTERNOON_ABSENT_BEFORE: u32 = hm(15, 30);
/// End of the working day; earlier check-out is afternoon early leave.
pub const DAY_END: u32 = hm(18, 0);

const LUNCH_START: u32 = NOON;
const LUNCH_END: u32 = AFTERNOON_START;
const FULL_DAY_MINUTES: u32 = 480;

/// Half-day unit earned by a session, before the calendar caps it.
///
/// The morning half needs a check-in no later than 09:30. The afternoon half
/// needs a check-out at or after 15:30 from a check-in no later than 15:30.
#[must_use]
pub fn session_day_unit(check_in: Option<u32>, check_out: Option<u32>) -> f64 {
    let Some(check_in) = check_in else {
        return 0.0;
    };
    let morning = check_in <= MORNING_ABSENT_AFTER;
    let afternoon = check_in <= AFTERNOON_ABSENT_BEFORE
        && check_out.is_some_and(|out| out >= AFTERNOON_ABSENT_BEFORE);
    match (morning, afternoon) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.5,
        (false, false) => 0.0,
    }
}

/// Minutes worked inside 08:30–18:00, excluding the 12:00–13:30 lunch break.
///
/// A check-in by 08:31 with a check-out at or after 18:00 counts as a full
/// 480-minute day.
#[must_use]
pub fn worked_minutes(check_in: u32, check_out: u32) -> u32 {
    if check_out < check_in {
        return 0;
    }
    if check_in <= MORNING_LATE_FROM && check_out >= DAY_END {
        return FULL_DAY_MINUTES;
    }
    let start = check_in.max(MORNING_START);
    let end = check_out.min(DAY_END);
    if end <= start {
        return 0;
    }
    let lunch = overlap(start, end, LUNCH_START, LUNCH_END);
    (end - start).saturating_sub(lunch)
}

fn overlap(a_start: u32, a_end: u32, b_start: u32, b_end: u32) -> u32 {
    let start = a_start.max(b_start);
    let end = a_end.min(b_end);
    end.saturating_sub(start)
}
