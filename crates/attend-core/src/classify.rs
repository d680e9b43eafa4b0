//! Day status classification.
//!
//! Turns one session plus its work-calendar day into a [`DayClassification`].
//! This is the only implementation of the rules; the calendar view, the CSV
//! export and the monthly aggregation all call [`classify`].
//!
//! # Rules
//!
//! 1. Morning: no check-in, or check-in after 09:30, is a morning absence.
//!    A check-in in 08:31–09:30 is morning lateness, counted from 08:30.
//! 2. Afternoon (needs a check-out): before 12:00 is an afternoon absence and
//!    morning early leave counted to 12:00; 12:00–15:29 is an afternoon
//!    absence only; 15:30–17:59 is afternoon early leave counted to 18:00.
//! 3. After a morning absence, a check-in after 13:31 is afternoon lateness
//!    counted from 13:30, unless the check-out falls before 15:30.
//! 4. The flags are composed into one [`DayStatus`] by a fixed priority.
//! 5. A calendar unit of zero, or a `MISSING` session, always yields `missing`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::credit::DayCredit;
use crate::model::{AttendanceSession, WorkCalendarDay};
use crate::rules::{
    AFTERNOON_ABSENT_BEFORE, AFTERNOON_LATE_AFTER, AFTERNOON_START, DAY_END, MORNING_ABSENT_AFTER,
    MORNING_LATE_FROM, MORNING_START, NOON, session_day_unit,
};
use crate::types::SessionStatus;

/// Fine-grained attendance status of one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DayStatus {
    #[serde(rename = "present")]
    Present,
    #[serde(rename = "working")]
    Working,
    #[serde(rename = "lateMorning")]
    LateMorning,
    #[serde(rename = "absentMorning")]
    AbsentMorning,
    #[serde(rename = "earlyLeaveMorning")]
    EarlyLeaveMorning,
    #[serde(rename = "lateAfternoon")]
    LateAfternoon,
    #[serde(rename = "absentAfternoon")]
    AbsentAfternoon,
    #[serde(rename = "earlyLeaveAfternoon")]
    EarlyLeaveAfternoon,
    #[serde(rename = "lateMorning_earlyLeaveAfternoon")]
    LateMorningEarlyLeaveAfternoon,
    #[serde(rename = "lateMorning_absentAfternoon")]
    LateMorningAbsentAfternoon,
    #[serde(rename = "absentMorning_lateAfternoon")]
    AbsentMorningLateAfternoon,
    #[serde(rename = "absentMorning_earlyLeaveAfternoon")]
    AbsentMorningEarlyLeaveAfternoon,
    #[serde(rename = "absentAfternoon_earlyLeaveMorning")]
    AbsentAfternoonEarlyLeaveMorning,
    #[serde(rename = "lateAfternoon_earlyLeaveAfternoon")]
    LateAfternoonEarlyLeaveAfternoon,
    #[serde(rename = "missing")]
    Missing,
    #[serde(rename = "absent")]
    Absent,
}

impl DayStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Working => "working",
            Self::LateMorning => "lateMorning",
            Self::AbsentMorning => "absentMorning",
            Self::EarlyLeaveMorning => "earlyLeaveMorning",
            Self::LateAfternoon => "lateAfternoon",
            Self::AbsentAfternoon => "absentAfternoon",
            Self::EarlyLeaveAfternoon => "earlyLeaveAfternoon",
            Self::LateMorningEarlyLeaveAfternoon => "lateMorning_earlyLeaveAfternoon",
            Self::LateMorningAbsentAfternoon => "lateMorning_absentAfternoon",
            Self::AbsentMorningLateAfternoon => "absentMorning_lateAfternoon",
            Self::AbsentMorningEarlyLeaveAfternoon => "absentMorning_earlyLeaveAfternoon",
            Self::AbsentAfternoonEarlyLeaveMorning => "absentAfternoon_earlyLeaveMorning",
            Self::LateAfternoonEarlyLeaveAfternoon => "lateAfternoon_earlyLeaveAfternoon",
            Self::Missing => "missing",
            Self::Absent => "absent",
        }
    }

    /// Whether the day earns any worked credit at all.
    #[must_use]
    pub const fn earns_credit(self) -> bool {
        !matches!(self, Self::Missing | Self::Absent)
    }
}

impl fmt::Display for DayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classifier output for one (session, calendar day) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayClassification {
    pub status: DayStatus,
    pub late_minutes: u32,
    pub early_leave_minutes: u32,
    pub day_credit: DayCredit,
}

/// Half-day signals derived from the raw times.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct HalfDayFlags {
    absent_morning: bool,
    late_morning: bool,
    early_leave_morning: bool,
    absent_afternoon: bool,
    late_afternoon: bool,
    early_leave_afternoon: bool,
    late_minutes: u32,
    early_leave_minutes: u32,
}

impl HalfDayFlags {
    fn detect(check_in: Option<u32>, check_out: Option<u32>) -> Self {
        let mut flags = Self::default();

        match check_in {
            None => flags.absent_morning = true,
            Some(ci) if ci > MORNING_ABSENT_AFTER => flags.absent_morning = true,
            Some(ci) if ci >= MORNING_LATE_FROM => {
                flags.late_morning = true;
                flags.late_minutes = ci - MORNING_START;
            }
            Some(_) => {}
        }

        if let Some(co) = check_out {
            if co < NOON {
                flags.absent_afternoon = true;
                flags.early_leave_morning = true;
                flags.early_leave_minutes = NOON - co;
            } else if co < AFTERNOON_ABSENT_BEFORE {
                flags.absent_afternoon = true;
            } else if co < DAY_END {
                flags.early_leave_afternoon = true;
                flags.early_leave_minutes = DAY_END - co;
            }
        }

        if let Some(ci) = check_in.filter(|ci| flags.absent_morning && *ci > AFTERNOON_LATE_AFTER) {
            if check_out.is_some_and(|co| co < AFTERNOON_ABSENT_BEFORE) {
                flags.absent_afternoon = true;
            } else {
                flags.late_afternoon = true;
                flags.late_minutes = ci - AFTERNOON_START;
            }
        }

        flags
    }

    /// Picks the most specific status; `fallback` applies when nothing fired.
    fn compose(&self, fallback: DayStatus) -> DayStatus {
        let f = self;
        if f.absent_morning && f.absent_afternoon {
            DayStatus::Absent
        } else if f.absent_morning && f.late_afternoon {
            DayStatus::AbsentMorningLateAfternoon
        } else if f.absent_morning && f.early_leave_afternoon {
            DayStatus::AbsentMorningEarlyLeaveAfternoon
        } else if f.late_morning && f.absent_afternoon {
            DayStatus::LateMorningAbsentAfternoon
        } else if f.absent_afternoon && f.early_leave_morning {
            DayStatus::AbsentAfternoonEarlyLeaveMorning
        } else if f.late_morning && f.early_leave_afternoon {
            DayStatus::LateMorningEarlyLeaveAfternoon
        } else if f.late_afternoon && f.early_leave_afternoon {
            DayStatus::LateAfternoonEarlyLeaveAfternoon
        } else if f.late_morning {
            DayStatus::LateMorning
        } else if f.absent_morning {
            DayStatus::AbsentMorning
        } else if f.absent_afternoon {
            DayStatus::AbsentAfternoon
        } else if f.late_afternoon {
            DayStatus::LateAfternoon
        } else if f.early_leave_morning {
            DayStatus::EarlyLeaveMorning
        } else if f.early_leave_afternoon {
            DayStatus::EarlyLeaveAfternoon
        } else {
            fallback
        }
    }
}

/// Classifies one session against its work-calendar day.
///
/// Total over all inputs: absent or unparseable times simply count as absent.
#[must_use]
pub fn classify(session: &AttendanceSession, day: &WorkCalendarDay) -> DayClassification {
    let check_in = session.check_in_minutes();
    let check_out = session.check_out_minutes();
    let flags = HalfDayFlags::detect(check_in, check_out);

    let status = if session.status == SessionStatus::Missing || day.expected_unit() <= 0.0 {
        DayStatus::Missing
    } else if check_in.is_none() || session.status == SessionStatus::NotCheckedIn {
        DayStatus::Absent
    } else {
        match session.status {
            // An open session cannot already be checked out.
            SessionStatus::Open if check_out.is_some() => DayStatus::Missing,
            SessionStatus::Open => flags.compose(DayStatus::Working),
            _ => flags.compose(DayStatus::Present),
        }
    };

    let late_minutes = if check_in.is_some() { flags.late_minutes } else { 0 };
    let early_leave_minutes = if session.status == SessionStatus::Closed && check_out.is_some() {
        flags.early_leave_minutes
    } else {
        0
    };

    let day_credit = if status.earns_credit() {
        DayCredit::from_work_unit(day.expected_unit().min(session_day_unit(check_in, check_out)))
    } else {
        DayCredit::None
    };

    DayClassification {
        status,
        late_minutes,
        early_leave_minutes,
        day_credit,
    }
}
