//! Monthly aggregation of classified days into a leave summary.
//!
//! # Accounting
//!
//! - expected = sum of calendar units over working days of the month
//! - worked = sum of day credits over days that are neither `missing` nor `absent`
//! - missing = expected - worked, floored at zero
//! - birthday used = up to one unit of missing in the birthday month, free of
//!   charge and outside paid used
//! - paid used = the rest of missing covered by the month's approved grants,
//!   capped at the remaining balance
//! - unpaid = missing - birthday used - paid used, floored at zero
//!
//! Every figure is rounded to one decimal. The computation is a pure function
//! of [`MonthInputs`]; rerunning it on the same snapshot yields an identical
//! summary.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::{DayClassification, classify};
use crate::model::{AttendanceSession, Employee, LeaveGrant, WorkCalendarDay};
use crate::types::{SessionId, SummaryKey, UserId, YearMonth, round_units};

/// Free leave in a birthday month, consumed before paid leave and never
/// charged to the balance.
pub const BIRTHDAY_LEAVE_UNITS: f64 = 1.0;

/// Snapshot of everything one (user, month) aggregation reads.
#[derive(Debug, Clone)]
pub struct MonthInputs {
    pub employee: Employee,
    pub period: YearMonth,
    pub sessions: Vec<AttendanceSession>,
    pub calendar: Vec<WorkCalendarDay>,
    pub grants: Vec<LeaveGrant>,
    /// Last date to count, for months still in progress.
    pub as_of: Option<NaiveDate>,
}

impl MonthInputs {
    /// Inputs with no source data beyond the employee.
    #[must_use]
    pub const fn empty(employee: Employee, period: YearMonth) -> Self {
        Self {
            employee,
            period,
            sessions: Vec::new(),
            calendar: Vec::new(),
            grants: Vec::new(),
            as_of: None,
        }
    }

    #[must_use]
    pub fn key(&self) -> SummaryKey {
        SummaryKey::new(self.employee.user_id.clone(), self.period)
    }
}

/// Whether a summary is purely derived or carries a manual override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryState {
    Computed,
    Adjusted,
}

impl SummaryState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Computed => "computed",
            Self::Adjusted => "adjusted",
        }
    }
}

impl fmt::Display for SummaryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SummaryState {
    type Err = crate::types::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "computed" => Ok(Self::Computed),
            "adjusted" => Ok(Self::Adjusted),
            _ => Err(crate::types::ValidationError::InvalidValue {
                field: "summary state",
                value: s.to_string(),
            }),
        }
    }
}

/// Leave accounting for one user and month. All figures are in work-units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveMonthlySummary {
    pub user_id: UserId,
    pub period: YearMonth,
    pub expected_units: f64,
    pub worked_units: f64,
    pub missing_units: f64,
    pub paid_used_units: f64,
    pub unpaid_units: f64,
    pub is_birthday: bool,
    pub state: SummaryState,
}

impl LeaveMonthlySummary {
    /// A summary with every figure at zero.
    #[must_use]
    pub const fn zeroed(user_id: UserId, period: YearMonth) -> Self {
        Self {
            user_id,
            period,
            expected_units: 0.0,
            worked_units: 0.0,
            missing_units: 0.0,
            paid_used_units: 0.0,
            unpaid_units: 0.0,
            is_birthday: false,
            state: SummaryState::Computed,
        }
    }

    #[must_use]
    pub fn key(&self) -> SummaryKey {
        SummaryKey::new(self.user_id.clone(), self.period)
    }

    /// Missing units absorbed by the free birthday leave.
    #[must_use]
    pub fn birthday_used_units(&self) -> f64 {
        birthday_used(self.missing_units, self.is_birthday)
    }

    /// Overrides the paid-leave figure, leaving the attendance figures alone.
    #[must_use]
    pub fn with_paid_leave(&self, paid_used_units: f64) -> Self {
        let paid_used_units = round_units(paid_used_units);
        let uncovered = self.missing_units - self.birthday_used_units() - paid_used_units;
        Self {
            paid_used_units,
            unpaid_units: round_units(uncovered.max(0.0)),
            state: SummaryState::Adjusted,
            ..self.clone()
        }
    }
}

/// Advisory data-quality issue found while aggregating. Never fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InconsistentData {
    /// The calendar has no row for a date; it is treated as non-working.
    #[error("no work-calendar entry for {date}; treating as non-working")]
    MissingCalendarDay { date: NaiveDate },

    /// A non-working day carries a non-zero unit; the unit is ignored.
    #[error("{date} is non-working but has work unit {work_unit}")]
    NonWorkingDayWithUnit { date: NaiveDate, work_unit: f64 },

    /// More than one session for the same date; only the first is used.
    #[error("duplicate session {dropped} on {date}; keeping {kept}")]
    DuplicateSession {
        date: NaiveDate,
        kept: SessionId,
        dropped: SessionId,
    },

    /// A session of another user or another month was supplied.
    #[error("session {session_id} does not belong to {key}")]
    ForeignSession { session_id: SessionId, key: SummaryKey },
}

/// One day of the aggregated month.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayRecord {
    pub date: NaiveDate,
    pub expected_unit: f64,
    #[serde(flatten)]
    pub classification: DayClassification,
}

/// Summary plus the per-day detail and the issues found on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub summary: LeaveMonthlySummary,
    pub days: Vec<DayRecord>,
    pub issues: Vec<InconsistentData>,
}

/// Folds a month of sessions, calendar days and grants into a summary.
#[must_use]
pub fn aggregate(inputs: &MonthInputs) -> LeaveMonthlySummary {
    aggregate_detailed(inputs).summary
}

/// Like [`aggregate`], keeping the per-day classifications and issues.
#[must_use]
pub fn aggregate_detailed(inputs: &MonthInputs) -> Aggregation {
    let key = inputs.key();
    let period = inputs.period;
    let mut issues = Vec::new();

    let calendar: HashMap<NaiveDate, &WorkCalendarDay> = inputs
        .calendar
        .iter()
        .filter(|d| period.contains(d.date))
        .map(|d| (d.date, d))
        .collect();

    let mut sessions: BTreeMap<NaiveDate, &AttendanceSession> = BTreeMap::new();
    for session in &inputs.sessions {
        if session.user_id != key.user_id || !period.contains(session.work_date) {
            issues.push(InconsistentData::ForeignSession {
                session_id: session.id.clone(),
                key: key.clone(),
            });
            continue;
        }
        if let Some(kept) = sessions.get(&session.work_date) {
            issues.push(InconsistentData::DuplicateSession {
                date: session.work_date,
                kept: kept.id.clone(),
                dropped: session.id.clone(),
            });
            continue;
        }
        sessions.insert(session.work_date, session);
    }

    let last = inputs
        .as_of
        .map_or_else(|| period.last_day(), |as_of| as_of.min(period.last_day()));

    let mut expected = 0.0;
    let mut worked = 0.0;
    let mut days = Vec::new();
    for date in period.days().take_while(|d| *d <= last) {
        let undefined;
        let day = if let Some(day) = calendar.get(&date).copied() {
            day
        } else {
            issues.push(InconsistentData::MissingCalendarDay { date });
            undefined = WorkCalendarDay::undefined(date);
            &undefined
        };
        if !day.is_working_day && day.work_unit.abs() > f64::EPSILON {
            issues.push(InconsistentData::NonWorkingDayWithUnit {
                date,
                work_unit: day.work_unit,
            });
        }

        let placeholder;
        let session = if let Some(session) = sessions.get(&date).copied() {
            session
        } else {
            placeholder = AttendanceSession::not_checked_in(key.user_id.clone(), date);
            &placeholder
        };

        let classification = classify(session, day);
        expected += day.expected_unit();
        if classification.status.earns_credit() {
            worked += classification.day_credit.units();
        }
        days.push(DayRecord {
            date,
            expected_unit: day.expected_unit(),
            classification,
        });
    }

    let expected_units = round_units(expected);
    let worked_units = round_units(worked);
    let missing_units = round_units((expected_units - worked_units).max(0.0));

    let granted: f64 = inputs
        .grants
        .iter()
        .filter(|g| g.user_id == key.user_id && g.period == period)
        .map(|g| g.units.max(0.0))
        .sum();
    let balance = inputs.employee.paid_leave_balance.max(0.0);
    let is_birthday = inputs.employee.has_birthday_in(period);
    let birthday_used = birthday_used(missing_units, is_birthday);
    let paid_used_units = round_units((missing_units - birthday_used).min(granted.min(balance)));
    let unpaid_units = round_units((missing_units - birthday_used - paid_used_units).max(0.0));

    for issue in &issues {
        tracing::warn!(%key, %issue, "inconsistent attendance data");
    }

    let summary = LeaveMonthlySummary {
        user_id: key.user_id.clone(),
        period,
        expected_units,
        worked_units,
        missing_units,
        paid_used_units,
        unpaid_units,
        is_birthday,
        state: SummaryState::Computed,
    };
    tracing::debug!(
        %key,
        expected = summary.expected_units,
        worked = summary.worked_units,
        missing = summary.missing_units,
        paid = summary.paid_used_units,
        unpaid = summary.unpaid_units,
        "aggregated month"
    );

    Aggregation {
        summary,
        days,
        issues,
    }
}

/// Aggregates independent (user, month) snapshots in parallel.
///
/// Output order matches input order.
#[must_use]
pub fn aggregate_many(inputs: &[MonthInputs]) -> Vec<LeaveMonthlySummary> {
    inputs.par_iter().map(aggregate).collect()
}

fn birthday_used(missing_units: f64, is_birthday: bool) -> f64 {
    if is_birthday {
        round_units(missing_units.min(BIRTHDAY_LEAVE_UNITS))
    } else {
        0.0
    }
}
