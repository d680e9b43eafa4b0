//! Import command for loading source records into the local `SQLite` store.
//!
//! Reads JSON Lines where each object carries a `kind` of `employee`,
//! `session`, `calendar_day` or `grant`. Employees, sessions and calendar days
//! are upserted as-is; grants go through the audited grant workflow.
//! Malformed lines are skipped and counted.

use std::fmt;
use std::io::BufRead;

use anyhow::{Context, Result};
use attend_core::time_of_day::parse_timestamp;
use attend_core::{
    AdminId, AttendanceSession, EngineError, Employee, SessionId, SessionStatus, UserId,
    ValidationError, WorkCalendarDay, YearMonth,
};
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Deserialize;
use uuid::Uuid;

use crate::Engine;

/// Counts of what an import wrote and skipped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportStats {
    pub employees: usize,
    pub sessions: usize,
    pub calendar_days: usize,
    pub grants: usize,
    pub malformed: usize,
}

impl ImportStats {
    pub const fn total(&self) -> usize {
        self.employees + self.sessions + self.calendar_days + self.grants
    }
}

impl fmt::Display for ImportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Imported {} new records ({} employees, {} sessions, {} calendar days, {} grants)",
            self.total(),
            self.employees,
            self.sessions,
            self.calendar_days,
            self.grants,
        )?;
        if self.malformed > 0 {
            write!(f, "; skipped {} malformed lines", self.malformed)?;
        }
        Ok(())
    }
}

pub fn run<R: BufRead>(reader: R, engine: &mut Engine, admin: &AdminId) -> Result<ImportStats> {
    let offset = engine.offset();
    let mut stats = ImportStats::default();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("failed to read line {line_no}"))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record: ImportRecord = match serde_json::from_str(trimmed) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(line = line_no, %err, "malformed import line");
                stats.malformed += 1;
                continue;
            }
        };

        match apply(record, engine, admin, offset) {
            Ok(kind) => match kind {
                Kind::Employee => stats.employees += 1,
                Kind::Session => stats.sessions += 1,
                Kind::CalendarDay => stats.calendar_days += 1,
                Kind::Grant => stats.grants += 1,
            },
            Err(Rejected::Invalid(err)) => {
                tracing::warn!(line = line_no, %err, "rejected import record");
                stats.malformed += 1;
            }
            Err(Rejected::Fatal(err)) => {
                return Err(err.context(format!("failed to import line {line_no}")));
            }
        }
    }

    tracing::info!(?stats, "import finished");
    Ok(stats)
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ImportRecord {
    Employee(Employee),
    Session(SessionRecord),
    CalendarDay(WorkCalendarDay),
    Grant(GrantRecord),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord {
    /// Sessions without an id get a fresh UUID.
    #[serde(default)]
    id: Option<String>,
    user_id: UserId,
    work_date: NaiveDate,
    #[serde(default)]
    check_in: Option<String>,
    #[serde(default)]
    check_out: Option<String>,
    /// Only `MISSING` is taken from the source; other states are derived.
    #[serde(default)]
    status: Option<SessionStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrantRecord {
    user_id: UserId,
    period: YearMonth,
    units: f64,
    #[serde(default)]
    reason: Option<String>,
}

enum Kind {
    Employee,
    Session,
    CalendarDay,
    Grant,
}

enum Rejected {
    Invalid(String),
    Fatal(anyhow::Error),
}

impl From<ValidationError> for Rejected {
    fn from(err: ValidationError) -> Self {
        Self::Invalid(err.to_string())
    }
}

fn apply(
    record: ImportRecord,
    engine: &mut Engine,
    admin: &AdminId,
    offset: FixedOffset,
) -> Result<Kind, Rejected> {
    let fatal = |err: attend_db::DbError| Rejected::Fatal(err.into());
    match record {
        ImportRecord::Employee(employee) => {
            engine.store_mut().upsert_employee(&employee).map_err(fatal)?;
            Ok(Kind::Employee)
        }
        ImportRecord::Session(record) => {
            let session = record.into_session(offset)?;
            engine.store_mut().upsert_session(&session).map_err(fatal)?;
            Ok(Kind::Session)
        }
        ImportRecord::CalendarDay(day) => {
            day.validate()?;
            engine.store_mut().upsert_calendar_day(&day).map_err(fatal)?;
            Ok(Kind::CalendarDay)
        }
        ImportRecord::Grant(grant) => {
            let reason = grant.reason.as_deref().unwrap_or("imported grant");
            match engine.grant_paid_leave(admin, &grant.user_id, grant.period, grant.units, reason) {
                Ok(_) => Ok(Kind::Grant),
                Err(err @ (EngineError::Validation(_) | EngineError::NotFound { .. })) => {
                    Err(Rejected::Invalid(err.to_string()))
                }
                Err(err) => Err(Rejected::Fatal(err.into())),
            }
        }
    }
}

impl SessionRecord {
    fn into_session(self, offset: FixedOffset) -> Result<AttendanceSession, ValidationError> {
        let id = match self.id {
            Some(id) => SessionId::new(id)?,
            None => SessionId::new(Uuid::new_v4().to_string())?,
        };
        let work_date = self.work_date;
        let parse = |field: &'static str, value: Option<String>| -> Option<DateTime<FixedOffset>> {
            let value = value?;
            let parsed = parse_timestamp(&value, work_date, offset);
            if parsed.is_none() {
                tracing::warn!(session = %id, field, %value, "unparseable timestamp treated as absent");
            }
            parsed
        };
        let check_in_at = parse("checkIn", self.check_in);
        let mut check_out_at = parse("checkOut", self.check_out);
        if check_in_at.is_none() && check_out_at.take().is_some() {
            tracing::warn!(session = %id, "check-out without check-in dropped");
        }

        let mut session = AttendanceSession {
            id,
            user_id: self.user_id,
            work_date,
            check_in_at,
            check_out_at,
            status: match self.status {
                Some(SessionStatus::Missing) => SessionStatus::Missing,
                _ => SessionStatus::NotCheckedIn,
            },
            worked_minutes: 0,
            checkout_reason: None,
        };
        session.validate()?;
        session.refresh_derived();
        Ok(session)
    }
}
