//! Records supplied by the external session, calendar and leave-grant sources.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::rules;
use crate::time_of_day::minutes_of_day;
use crate::types::{SessionId, SessionStatus, UserId, ValidationError, YearMonth};

/// One check-in/check-out cycle for one user on one calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSession {
    pub id: SessionId,
    pub user_id: UserId,
    pub work_date: NaiveDate,
    pub check_in_at: Option<DateTime<FixedOffset>>,
    pub check_out_at: Option<DateTime<FixedOffset>>,
    pub status: SessionStatus,
    pub worked_minutes: u32,
    /// Free-form note recorded by the last close or edit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout_reason: Option<String>,
}

impl AttendanceSession {
    /// A placeholder for a date with no session row at all.
    #[must_use]
    pub fn not_checked_in(user_id: UserId, work_date: NaiveDate) -> Self {
        Self {
            id: SessionId::placeholder(&user_id, work_date),
            user_id,
            work_date,
            check_in_at: None,
            check_out_at: None,
            status: SessionStatus::NotCheckedIn,
            worked_minutes: 0,
            checkout_reason: None,
        }
    }

    /// Check-in as minutes since local midnight.
    #[must_use]
    pub fn check_in_minutes(&self) -> Option<u32> {
        self.check_in_at.as_ref().map(minutes_of_day)
    }

    /// Check-out as minutes since local midnight.
    #[must_use]
    pub fn check_out_minutes(&self) -> Option<u32> {
        self.check_out_at.as_ref().map(minutes_of_day)
    }

    /// Derives status and worked minutes from the timestamps.
    ///
    /// `MISSING` is kept only while no check-in exists.
    pub fn refresh_derived(&mut self) {
        self.status = match (&self.check_in_at, &self.check_out_at) {
            (Some(_), Some(_)) => SessionStatus::Closed,
            (Some(_), None) => SessionStatus::Open,
            (None, _) if self.status == SessionStatus::Missing => SessionStatus::Missing,
            (None, _) => SessionStatus::NotCheckedIn,
        };
        self.worked_minutes = match (self.check_in_minutes(), self.check_out_minutes()) {
            (Some(check_in), Some(check_out)) => rules::worked_minutes(check_in, check_out),
            _ => 0,
        };
    }

    /// Checks the timestamp invariants of a session.
    ///
    /// Both timestamps must fall on `work_date` on their own wall clock, and
    /// check-out needs a check-in no later than itself.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, at) in [("check-in", &self.check_in_at), ("check-out", &self.check_out_at)] {
            if let Some(at) = at.as_ref().filter(|at| at.date_naive() != self.work_date) {
                return Err(ValidationError::OutsideWorkDate {
                    field,
                    at: at.to_rfc3339(),
                    work_date: self.work_date,
                });
            }
        }
        match (&self.check_in_at, &self.check_out_at) {
            (None, Some(_)) => Err(ValidationError::CheckOutWithoutCheckIn),
            (Some(check_in), Some(check_out)) if check_out < check_in => {
                Err(ValidationError::CheckOutBeforeCheckIn {
                    check_in: check_in.format("%H:%M").to_string(),
                    check_out: check_out.format("%H:%M").to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// The organization's definition of one calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkCalendarDay {
    pub date: NaiveDate,
    pub is_working_day: bool,
    pub work_unit: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl WorkCalendarDay {
    /// A day the calendar has no row for: non-working.
    #[must_use]
    pub const fn undefined(date: NaiveDate) -> Self {
        Self {
            date,
            is_working_day: false,
            work_unit: 0.0,
            note: None,
        }
    }

    /// The unit this day contributes to expected units.
    #[must_use]
    pub fn expected_unit(&self) -> f64 {
        if self.is_working_day {
            self.work_unit.max(0.0)
        } else {
            0.0
        }
    }

    /// Validates an admin-authored day: unit in {0, 0.5, 1} and zero when off.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let allowed = [0.0, 0.5, 1.0];
        if !allowed.iter().any(|u| (self.work_unit - u).abs() < f64::EPSILON) {
            return Err(ValidationError::InvalidUnits {
                field: "work unit",
                value: self.work_unit,
            });
        }
        if !self.is_working_day && self.work_unit.abs() > f64::EPSILON {
            return Err(ValidationError::InvalidUnits {
                field: "work unit of a non-working day",
                value: self.work_unit,
            });
        }
        Ok(())
    }
}

/// Leave-relevant facts about an employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthday: Option<NaiveDate>,
    /// Remaining paid-leave balance in work-units.
    #[serde(default)]
    pub paid_leave_balance: f64,
}

impl Employee {
    /// Whether `period` is this employee's birthday month.
    ///
    /// Matches on month with a birth-year guard only, so every later year's
    /// same month also qualifies.
    #[must_use]
    pub fn has_birthday_in(&self, period: YearMonth) -> bool {
        self.birthday
            .is_some_and(|b| b.month() == period.month() && b.year() <= period.year())
    }
}

/// An approved paid-leave allotment for one user and month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveGrant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub user_id: UserId,
    pub period: YearMonth,
    pub units: f64,
}
