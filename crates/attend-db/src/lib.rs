//! Storage layer for the attendance engine.
//!
//! Provides persistence for employees, attendance sessions, the work
//! calendar, leave grants, monthly summaries and the audit log using
//! `rusqlite`, and implements [`AttendanceStore`] on top of it.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Give each worker its own `Database` and share one
//! [`SummaryLocks`](attend_core::SummaryLocks) registry between their workflows.
//!
//! # Schema
//!
//! ## Dates and timestamps
//!
//! Calendar dates are TEXT `YYYY-MM-DD` and months are TEXT `YYYY-MM`, so
//! range filters are plain string comparisons. Session timestamps are RFC 3339
//! with their original offset (e.g. `2025-03-05T08:10:00+07:00`); audit and
//! bookkeeping timestamps are UTC with millisecond precision.
//!
//! A session timestamp that no longer parses is read back as `None` and the
//! day classifies as absent.
//!
//! ## Atomicity
//!
//! Every `commit_*` writes the record and its audit entry in one transaction.

use std::fmt::Display;
use std::path::Path;

use attend_core::{
    AdminId, AttendanceSession, AttendanceStore, AuditLogEntry, Employee, EntityType, LeaveGrant,
    LeaveMonthlySummary, SessionId, SummaryKey, UserId, WorkCalendarDay, YearMonth,
    generate_year,
};
use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// An audit snapshot could not be encoded or decoded.
    #[error("invalid audit snapshot: {0}")]
    Json(#[from] serde_json::Error),
    /// A stored row does not map back onto the domain model.
    #[error("invalid row in {table}: {message}")]
    InvalidRow { table: &'static str, message: String },
}

fn invalid(table: &'static str, err: impl Display) -> DbError {
    DbError::InvalidRow {
        table,
        message: err.to_string(),
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// Narrows an audit listing to one entity type and/or id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<String>,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS employees (
                user_id TEXT PRIMARY KEY,
                name TEXT,
                birthday TEXT,
                paid_leave_balance REAL NOT NULL DEFAULT 0
            );

            -- check_in_at / check_out_at: RFC 3339 with offset, NULL when absent
            -- status: NOT_CHECKED_IN | OPEN | CLOSED | MISSING
            CREATE TABLE IF NOT EXISTS attendance_sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                work_date TEXT NOT NULL,
                check_in_at TEXT,
                check_out_at TEXT,
                status TEXT NOT NULL,
                worked_minutes INTEGER NOT NULL DEFAULT 0,
                checkout_reason TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_user_date
                ON attendance_sessions(user_id, work_date);

            CREATE TABLE IF NOT EXISTS work_calendar (
                date TEXT PRIMARY KEY,
                is_working_day INTEGER NOT NULL,
                work_unit REAL NOT NULL,
                note TEXT
            );

            CREATE TABLE IF NOT EXISTS leave_grants (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                period TEXT NOT NULL,
                units REAL NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_grants_user_period ON leave_grants(user_id, period);

            CREATE TABLE IF NOT EXISTS leave_monthly_summary (
                user_id TEXT NOT NULL,
                period TEXT NOT NULL,
                expected_units REAL NOT NULL,
                worked_units REAL NOT NULL,
                missing_units REAL NOT NULL,
                paid_used_units REAL NOT NULL,
                unpaid_units REAL NOT NULL,
                is_birthday INTEGER NOT NULL,
                state TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, period)
            );

            -- Append-only; before_json / after_json hold full snapshots
            CREATE TABLE IF NOT EXISTS audit_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                admin_user_id TEXT NOT NULL,
                action_type TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                before_json TEXT,
                after_json TEXT,
                reason TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_entity ON audit_logs(entity_type, entity_id);
            ",
        )?;
        Ok(())
    }

    /// Inserts or replaces an employee.
    pub fn upsert_employee(&mut self, employee: &Employee) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO employees (user_id, name, birthday, paid_leave_balance)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id) DO UPDATE SET
                name = excluded.name,
                birthday = excluded.birthday,
                paid_leave_balance = excluded.paid_leave_balance
            ",
            params![
                employee.user_id.as_str(),
                employee.name,
                employee.birthday.map(|d| d.to_string()),
                employee.paid_leave_balance,
            ],
        )?;
        Ok(())
    }

    /// Lists employees ordered by user id.
    pub fn list_employees(&self) -> Result<Vec<Employee>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, name, birthday, paid_leave_balance FROM employees ORDER BY user_id ASC",
        )?;
        let rows = stmt.query_map([], EmployeeRow::read)?;
        let mut employees = Vec::new();
        for row in rows {
            employees.push(row?.into_employee()?);
        }
        Ok(employees)
    }

    /// Inserts or replaces a session imported from the attendance source.
    pub fn upsert_session(&mut self, session: &AttendanceSession) -> Result<(), DbError> {
        write_session(&self.conn, session)
    }

    /// Inserts or replaces one calendar day.
    pub fn upsert_calendar_day(&mut self, day: &WorkCalendarDay) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO work_calendar (date, is_working_day, work_unit, note)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(date) DO UPDATE SET
                is_working_day = excluded.is_working_day,
                work_unit = excluded.work_unit,
                note = excluded.note
            ",
            params![day.date.to_string(), day.is_working_day, day.work_unit, day.note],
        )?;
        Ok(())
    }

    /// Generates the default calendar for `year` unless the year already has rows.
    ///
    /// Returns the number of days inserted.
    pub fn ensure_year(&mut self, year: i32) -> Result<usize, DbError> {
        let days = generate_year(year).map_err(|e| invalid("work_calendar", e))?;
        let (Some(first), Some(last)) = (days.first(), days.last()) else {
            return Ok(0);
        };
        let existing: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM work_calendar WHERE date >= ?1 AND date <= ?2",
            params![first.date.to_string(), last.date.to_string()],
            |row| row.get(0),
        )?;
        if existing > 0 {
            tracing::debug!(year, existing, "calendar year already present");
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO work_calendar (date, is_working_day, work_unit, note)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )?;
            for day in &days {
                inserted += stmt.execute(params![
                    day.date.to_string(),
                    day.is_working_day,
                    day.work_unit,
                    day.note,
                ])?;
            }
        }
        tx.commit()?;
        tracing::info!(year, inserted, "generated calendar year");
        Ok(inserted)
    }

    /// Lists stored summaries, optionally for one month, ordered by month then user.
    pub fn list_summaries(
        &self,
        period: Option<YearMonth>,
    ) -> Result<Vec<LeaveMonthlySummary>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT user_id, period, expected_units, worked_units, missing_units,
                   paid_used_units, unpaid_units, is_birthday, state
            FROM leave_monthly_summary
            WHERE ?1 IS NULL OR period = ?1
            ORDER BY period ASC, user_id ASC
            ",
        )?;
        let rows = stmt.query_map([period.map(|p| p.to_string())], SummaryRow::read)?;
        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?.into_summary()?);
        }
        Ok(summaries)
    }

    /// Lists audit entries oldest first.
    pub fn list_audit(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, admin_user_id, action_type, entity_type, entity_id,
                   before_json, after_json, reason, created_at
            FROM audit_logs
            WHERE (?1 IS NULL OR entity_type = ?1) AND (?2 IS NULL OR entity_id = ?2)
            ORDER BY id ASC
            ",
        )?;
        let rows = stmt.query_map(
            params![
                filter.entity_type.map(|t| t.as_str()),
                filter.entity_id.as_deref(),
            ],
            AuditRow::read,
        )?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.into_entry()?);
        }
        Ok(entries)
    }
}

impl AttendanceStore for Database {
    type Error = DbError;

    fn employee(&self, user_id: &UserId) -> Result<Option<Employee>, DbError> {
        self.conn
            .query_row(
                "SELECT user_id, name, birthday, paid_leave_balance FROM employees WHERE user_id = ?1",
                [user_id.as_str()],
                EmployeeRow::read,
            )
            .optional()?
            .map(EmployeeRow::into_employee)
            .transpose()
    }

    fn session(&self, id: &SessionId) -> Result<Option<AttendanceSession>, DbError> {
        self.conn
            .query_row(
                "
                SELECT id, user_id, work_date, check_in_at, check_out_at, status,
                       worked_minutes, checkout_reason
                FROM attendance_sessions
                WHERE id = ?1
                ",
                [id.as_str()],
                SessionRow::read,
            )
            .optional()?
            .map(SessionRow::into_session)
            .transpose()
    }

    fn sessions_in(
        &self,
        user_id: &UserId,
        period: YearMonth,
    ) -> Result<Vec<AttendanceSession>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, user_id, work_date, check_in_at, check_out_at, status,
                   worked_minutes, checkout_reason
            FROM attendance_sessions
            WHERE user_id = ?1 AND work_date >= ?2 AND work_date <= ?3
            ORDER BY work_date ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map(
            params![
                user_id.as_str(),
                period.first_day().to_string(),
                period.last_day().to_string(),
            ],
            SessionRow::read,
        )?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?.into_session()?);
        }
        Ok(sessions)
    }

    fn calendar_day(&self, date: NaiveDate) -> Result<Option<WorkCalendarDay>, DbError> {
        self.conn
            .query_row(
                "SELECT date, is_working_day, work_unit, note FROM work_calendar WHERE date = ?1",
                [date.to_string()],
                CalendarRow::read,
            )
            .optional()?
            .map(CalendarRow::into_day)
            .transpose()
    }

    fn calendar_in(&self, period: YearMonth) -> Result<Vec<WorkCalendarDay>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT date, is_working_day, work_unit, note
            FROM work_calendar
            WHERE date >= ?1 AND date <= ?2
            ORDER BY date ASC
            ",
        )?;
        let rows = stmt.query_map(
            params![period.first_day().to_string(), period.last_day().to_string()],
            CalendarRow::read,
        )?;
        let mut days = Vec::new();
        for row in rows {
            days.push(row?.into_day()?);
        }
        Ok(days)
    }

    fn grants_in(&self, user_id: &UserId, period: YearMonth) -> Result<Vec<LeaveGrant>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, units
            FROM leave_grants
            WHERE user_id = ?1 AND period = ?2
            ORDER BY id ASC
            ",
        )?;
        let rows = stmt.query_map(params![user_id.as_str(), period.to_string()], |row| {
            Ok(LeaveGrant {
                id: Some(row.get(0)?),
                user_id: user_id.clone(),
                period,
                units: row.get(1)?,
            })
        })?;
        let mut grants = Vec::new();
        for row in rows {
            grants.push(row?);
        }
        Ok(grants)
    }

    fn summary(&self, key: &SummaryKey) -> Result<Option<LeaveMonthlySummary>, DbError> {
        self.conn
            .query_row(
                "
                SELECT user_id, period, expected_units, worked_units, missing_units,
                       paid_used_units, unpaid_units, is_birthday, state
                FROM leave_monthly_summary
                WHERE user_id = ?1 AND period = ?2
                ",
                params![key.user_id.as_str(), key.period.to_string()],
                SummaryRow::read,
            )
            .optional()?
            .map(SummaryRow::into_summary)
            .transpose()
    }

    fn commit_summary(
        &mut self,
        summary: &LeaveMonthlySummary,
        audit: &AuditLogEntry,
    ) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "
            INSERT INTO leave_monthly_summary
            (user_id, period, expected_units, worked_units, missing_units,
             paid_used_units, unpaid_units, is_birthday, state, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(user_id, period) DO UPDATE SET
                expected_units = excluded.expected_units,
                worked_units = excluded.worked_units,
                missing_units = excluded.missing_units,
                paid_used_units = excluded.paid_used_units,
                unpaid_units = excluded.unpaid_units,
                is_birthday = excluded.is_birthday,
                state = excluded.state,
                updated_at = excluded.updated_at
            ",
            params![
                summary.user_id.as_str(),
                summary.period.to_string(),
                summary.expected_units,
                summary.worked_units,
                summary.missing_units,
                summary.paid_used_units,
                summary.unpaid_units,
                summary.is_birthday,
                summary.state.as_str(),
                format_timestamp(Utc::now()),
            ],
        )?;
        insert_audit(&tx, audit)?;
        tx.commit()?;
        Ok(())
    }

    fn commit_session(
        &mut self,
        session: &AttendanceSession,
        audit: &AuditLogEntry,
    ) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        write_session(&tx, session)?;
        insert_audit(&tx, audit)?;
        tx.commit()?;
        Ok(())
    }

    fn commit_grant(
        &mut self,
        grant: &LeaveGrant,
        audit: &AuditLogEntry,
    ) -> Result<LeaveGrant, DbError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "
            INSERT INTO leave_grants (user_id, period, units, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
            params![
                grant.user_id.as_str(),
                grant.period.to_string(),
                grant.units,
                format_timestamp(audit.created_at),
            ],
        )?;
        let id = tx.last_insert_rowid();
        insert_audit(&tx, audit)?;
        tx.commit()?;
        Ok(LeaveGrant {
            id: Some(id),
            ..grant.clone()
        })
    }
}

fn write_session(conn: &Connection, session: &AttendanceSession) -> Result<(), DbError> {
    conn.execute(
        "
        INSERT INTO attendance_sessions
        (id, user_id, work_date, check_in_at, check_out_at, status, worked_minutes, checkout_reason)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(id) DO UPDATE SET
            user_id = excluded.user_id,
            work_date = excluded.work_date,
            check_in_at = excluded.check_in_at,
            check_out_at = excluded.check_out_at,
            status = excluded.status,
            worked_minutes = excluded.worked_minutes,
            checkout_reason = excluded.checkout_reason
        ",
        params![
            session.id.as_str(),
            session.user_id.as_str(),
            session.work_date.to_string(),
            session.check_in_at.map(format_offset_timestamp),
            session.check_out_at.map(format_offset_timestamp),
            session.status.as_str(),
            session.worked_minutes,
            session.checkout_reason,
        ],
    )?;
    Ok(())
}

fn insert_audit(conn: &Connection, entry: &AuditLogEntry) -> Result<i64, DbError> {
    let before = entry.before_json.as_ref().map(serde_json::to_string).transpose()?;
    let after = entry.after_json.as_ref().map(serde_json::to_string).transpose()?;
    conn.execute(
        "
        INSERT INTO audit_logs
        (admin_user_id, action_type, entity_type, entity_id, before_json, after_json, reason, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ",
        params![
            entry.admin_user_id.as_str(),
            entry.action_type.as_str(),
            entry.entity_type.as_str(),
            entry.entity_id,
            before,
            after,
            entry.reason,
            format_timestamp(entry.created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn format_offset_timestamp(timestamp: DateTime<FixedOffset>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, false)
}

fn parse_date(table: &'static str, value: &str) -> Result<NaiveDate, DbError> {
    value
        .parse::<NaiveDate>()
        .map_err(|e| invalid(table, format_args!("date {value:?}: {e}")))
}

/// Lenient: a corrupt timestamp reads as no timestamp.
fn parse_session_timestamp(session_id: &str, value: Option<String>) -> Option<DateTime<FixedOffset>> {
    let value = value?;
    match DateTime::parse_from_rfc3339(&value) {
        Ok(at) => Some(at),
        Err(err) => {
            tracing::warn!(session = session_id, %value, %err, "unparseable session timestamp");
            None
        }
    }
}

struct EmployeeRow {
    user_id: String,
    name: Option<String>,
    birthday: Option<String>,
    paid_leave_balance: f64,
}

impl EmployeeRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            user_id: row.get(0)?,
            name: row.get(1)?,
            birthday: row.get(2)?,
            paid_leave_balance: row.get(3)?,
        })
    }

    fn into_employee(self) -> Result<Employee, DbError> {
        Ok(Employee {
            user_id: UserId::new(self.user_id).map_err(|e| invalid("employees", e))?,
            name: self.name,
            birthday: self
                .birthday
                .as_deref()
                .map(|b| parse_date("employees", b))
                .transpose()?,
            paid_leave_balance: self.paid_leave_balance,
        })
    }
}

struct SessionRow {
    id: String,
    user_id: String,
    work_date: String,
    check_in_at: Option<String>,
    check_out_at: Option<String>,
    status: String,
    worked_minutes: u32,
    checkout_reason: Option<String>,
}

impl SessionRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            work_date: row.get(2)?,
            check_in_at: row.get(3)?,
            check_out_at: row.get(4)?,
            status: row.get(5)?,
            worked_minutes: row.get(6)?,
            checkout_reason: row.get(7)?,
        })
    }

    fn into_session(self) -> Result<AttendanceSession, DbError> {
        const TABLE: &str = "attendance_sessions";
        let check_in_at = parse_session_timestamp(&self.id, self.check_in_at);
        let check_out_at = parse_session_timestamp(&self.id, self.check_out_at);
        Ok(AttendanceSession {
            id: SessionId::new(self.id).map_err(|e| invalid(TABLE, e))?,
            user_id: UserId::new(self.user_id).map_err(|e| invalid(TABLE, e))?,
            work_date: parse_date(TABLE, &self.work_date)?,
            check_in_at,
            check_out_at,
            status: self.status.parse().map_err(|e| invalid(TABLE, e))?,
            worked_minutes: self.worked_minutes,
            checkout_reason: self.checkout_reason,
        })
    }
}

struct CalendarRow {
    date: String,
    is_working_day: bool,
    work_unit: f64,
    note: Option<String>,
}

impl CalendarRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            date: row.get(0)?,
            is_working_day: row.get(1)?,
            work_unit: row.get(2)?,
            note: row.get(3)?,
        })
    }

    fn into_day(self) -> Result<WorkCalendarDay, DbError> {
        Ok(WorkCalendarDay {
            date: parse_date("work_calendar", &self.date)?,
            is_working_day: self.is_working_day,
            work_unit: self.work_unit,
            note: self.note,
        })
    }
}

struct SummaryRow {
    user_id: String,
    period: String,
    expected_units: f64,
    worked_units: f64,
    missing_units: f64,
    paid_used_units: f64,
    unpaid_units: f64,
    is_birthday: bool,
    state: String,
}

impl SummaryRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            user_id: row.get(0)?,
            period: row.get(1)?,
            expected_units: row.get(2)?,
            worked_units: row.get(3)?,
            missing_units: row.get(4)?,
            paid_used_units: row.get(5)?,
            unpaid_units: row.get(6)?,
            is_birthday: row.get(7)?,
            state: row.get(8)?,
        })
    }

    fn into_summary(self) -> Result<LeaveMonthlySummary, DbError> {
        const TABLE: &str = "leave_monthly_summary";
        Ok(LeaveMonthlySummary {
            user_id: UserId::new(self.user_id).map_err(|e| invalid(TABLE, e))?,
            period: self.period.parse().map_err(|e| invalid(TABLE, e))?,
            expected_units: self.expected_units,
            worked_units: self.worked_units,
            missing_units: self.missing_units,
            paid_used_units: self.paid_used_units,
            unpaid_units: self.unpaid_units,
            is_birthday: self.is_birthday,
            state: self.state.parse().map_err(|e| invalid(TABLE, e))?,
        })
    }
}

struct AuditRow {
    id: i64,
    admin_user_id: String,
    action_type: String,
    entity_type: String,
    entity_id: String,
    before_json: Option<String>,
    after_json: Option<String>,
    reason: Option<String>,
    created_at: String,
}

impl AuditRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            admin_user_id: row.get(1)?,
            action_type: row.get(2)?,
            entity_type: row.get(3)?,
            entity_id: row.get(4)?,
            before_json: row.get(5)?,
            after_json: row.get(6)?,
            reason: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_entry(self) -> Result<AuditLogEntry, DbError> {
        const TABLE: &str = "audit_logs";
        Ok(AuditLogEntry {
            id: Some(self.id),
            admin_user_id: AdminId::new(self.admin_user_id).map_err(|e| invalid(TABLE, e))?,
            action_type: self.action_type.parse().map_err(|e| invalid(TABLE, e))?,
            entity_type: self.entity_type.parse().map_err(|e| invalid(TABLE, e))?,
            entity_id: self.entity_id,
            before_json: self.before_json.as_deref().map(serde_json::from_str).transpose()?,
            after_json: self.after_json.as_deref().map(serde_json::from_str).transpose()?,
            reason: self.reason,
            created_at: DateTime::parse_from_rfc3339(&self.created_at)
                .map_err(|e| invalid(TABLE, e))?
                .with_timezone(&Utc),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    use attend_core::{
        AuditAction, EngineError, SessionStatus, SummaryLocks, SummaryState, Workflow,
    };
    use chrono::NaiveTime;

    fn offset() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    fn march() -> YearMonth {
        YearMonth::new(2025, 3).unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn at(day: u32, time: &str) -> DateTime<FixedOffset> {
        date(day)
            .and_time(NaiveTime::parse_from_str(time, "%H:%M").unwrap())
            .and_local_timezone(offset())
            .unwrap()
    }

    fn employee(id: &str) -> Employee {
        Employee {
            user_id: UserId::new(id).unwrap(),
            name: Some("Binh".to_string()),
            birthday: NaiveDate::from_ymd_opt(1990, 3, 14),
            paid_leave_balance: 5.0,
        }
    }

    fn session(id: &str, day: u32, check_in: Option<&str>, check_out: Option<&str>) -> AttendanceSession {
        let mut s = AttendanceSession {
            id: SessionId::new(id).unwrap(),
            user_id: UserId::new("u-1").unwrap(),
            work_date: date(day),
            check_in_at: check_in.map(|t| at(day, t)),
            check_out_at: check_out.map(|t| at(day, t)),
            status: SessionStatus::NotCheckedIn,
            worked_minutes: 0,
            checkout_reason: None,
        };
        s.refresh_derived();
        s
    }

    fn seeded() -> Database {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        db.upsert_employee(&employee("u-1")).unwrap();
        db.ensure_year(2025).unwrap();
        for day in 3..=7 {
            db.upsert_session(&session(&format!("s-{day}"), day, Some("08:20"), Some("18:00")))
                .unwrap();
        }
        db
    }

    fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .unwrap();
        stmt.query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn open_in_memory_database() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn schema_matches_data_model() {
        let db = Database::open_in_memory().expect("open in-memory db");
        assert_eq!(
            table_columns(&db.conn, "leave_monthly_summary"),
            vec![
                "user_id",
                "period",
                "expected_units",
                "worked_units",
                "missing_units",
                "paid_used_units",
                "unpaid_units",
                "is_birthday",
                "state",
                "updated_at",
            ]
        );
        assert_eq!(
            table_columns(&db.conn, "audit_logs"),
            vec![
                "id",
                "admin_user_id",
                "action_type",
                "entity_type",
                "entity_id",
                "before_json",
                "after_json",
                "reason",
                "created_at",
            ]
        );
        let tables: HashSet<String> = db
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        for table in ["employees", "attendance_sessions", "work_calendar", "leave_grants"] {
            assert!(tables.contains(table), "missing table {table}");
        }
    }

    #[test]
    fn reopening_a_file_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attend.db");
        {
            let mut db = Database::open(&path).unwrap();
            db.upsert_employee(&employee("u-1")).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.list_employees().unwrap(), vec![employee("u-1")]);
    }

    #[test]
    fn employee_upsert_replaces_fields() {
        let mut db = Database::open_in_memory().unwrap();
        db.upsert_employee(&employee("u-1")).unwrap();
        let mut updated = employee("u-1");
        updated.paid_leave_balance = 2.5;
        updated.birthday = None;
        db.upsert_employee(&updated).unwrap();

        let stored = db.employee(&updated.user_id).unwrap();
        assert_eq!(stored, Some(updated));
        assert_eq!(db.employee(&UserId::new("nobody").unwrap()).unwrap(), None);
    }

    #[test]
    fn session_round_trip_keeps_offset() {
        let db = seeded();
        let stored = db.session(&SessionId::new("s-3").unwrap()).unwrap().unwrap();
        assert_eq!(stored, session("s-3", 3, Some("08:20"), Some("18:00")));
        assert_eq!(stored.check_in_at.unwrap().offset(), &offset());
        assert_eq!(stored.status, SessionStatus::Closed);
        assert_eq!(stored.worked_minutes, 480);
    }

    #[test]
    fn corrupt_session_timestamp_reads_as_absent() {
        let db = seeded();
        db.conn
            .execute(
                "UPDATE attendance_sessions SET check_in_at = 'not a time' WHERE id = 's-4'",
                [],
            )
            .unwrap();
        let stored = db.session(&SessionId::new("s-4").unwrap()).unwrap().unwrap();
        assert_eq!(stored.check_in_at, None);
        assert!(stored.check_out_at.is_some());
    }

    #[test]
    fn sessions_in_filters_by_user_and_month() {
        let mut db = seeded();
        let mut other = session("other", 5, Some("08:00"), None);
        other.user_id = UserId::new("u-2").unwrap();
        db.upsert_session(&other).unwrap();
        let mut april = session("april", 5, Some("08:00"), None);
        april.work_date = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        db.upsert_session(&april).unwrap();

        let ids: Vec<String> = db
            .sessions_in(&UserId::new("u-1").unwrap(), march())
            .unwrap()
            .into_iter()
            .map(|s| s.id.to_string())
            .collect();
        assert_eq!(ids, vec!["s-3", "s-4", "s-5", "s-6", "s-7"]);
    }

    #[test]
    fn ensure_year_generates_once() {
        let mut db = Database::open_in_memory().unwrap();
        assert_eq!(db.ensure_year(2024).unwrap(), 366);
        assert_eq!(db.ensure_year(2024).unwrap(), 0);

        let march_2024 = YearMonth::new(2024, 3).unwrap();
        let days = db.calendar_in(march_2024).unwrap();
        assert_eq!(days.len(), 31);
        assert_eq!(days.iter().filter(|d| d.is_working_day).count(), 21);
    }

    #[test]
    fn ensure_year_skips_partially_defined_year() {
        let mut db = Database::open_in_memory().unwrap();
        db.upsert_calendar_day(&WorkCalendarDay {
            date: date(8),
            is_working_day: true,
            work_unit: 0.5,
            note: Some("Saturday make-up".to_string()),
        })
        .unwrap();
        assert_eq!(db.ensure_year(2025).unwrap(), 0);
        let day = db.calendar_day(date(8)).unwrap().unwrap();
        assert!(day.is_working_day);
        assert_eq!(day.note.as_deref(), Some("Saturday make-up"));
        assert_eq!(db.calendar_day(date(9)).unwrap(), None);
    }

    #[test]
    fn calendar_day_upsert_overrides_generated_default() {
        let mut db = seeded();
        db.upsert_calendar_day(&WorkCalendarDay {
            date: date(5),
            is_working_day: false,
            work_unit: 0.0,
            note: Some("holiday".to_string()),
        })
        .unwrap();
        let day = db.calendar_day(date(5)).unwrap().unwrap();
        assert!(!day.is_working_day);
        assert_eq!(db.calendar_in(march()).unwrap().len(), 31);
    }

    #[test]
    fn workflow_persists_summary_and_audit() {
        let db = seeded();
        let admin = AdminId::new("admin").unwrap();
        let user = UserId::new("u-1").unwrap();
        let mut wf = Workflow::new(db, Arc::new(SummaryLocks::new()), offset());

        let summary = wf.recalculate(&admin, &user, march()).unwrap();
        assert!(summary.is_birthday);
        assert!((summary.worked_units - 5.0).abs() < 1e-9);
        assert!((summary.missing_units - 16.0).abs() < 1e-9);
        // Birthday leave is free: with no grants nothing is paid.
        assert!((summary.birthday_used_units() - 1.0).abs() < 1e-9);
        assert!(summary.paid_used_units.abs() < 1e-9);
        assert!((summary.unpaid_units - 15.0).abs() < 1e-9);

        let err = wf
            .adjust_paid_leave(&admin, &user, march(), 3.0, "")
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        wf.adjust_paid_leave(&admin, &user, march(), 3.0, "carry-over")
            .unwrap();

        let db = wf.into_store();
        let stored = db.summary(&SummaryKey::new(user, march())).unwrap().unwrap();
        assert_eq!(stored.state, SummaryState::Adjusted);
        assert!((stored.unpaid_units - 12.0).abs() < 1e-9);

        let audit = db.list_audit(&AuditFilter::default()).unwrap();
        let actions: Vec<AuditAction> = audit.iter().map(|e| e.action_type).collect();
        assert_eq!(actions, vec![AuditAction::Recalculate, AuditAction::Adjust]);
        assert_eq!(audit[1].before_json, audit[0].after_json);
        assert_eq!(
            audit[1].after_json.as_ref().unwrap()["paidUsedUnits"],
            serde_json::json!(3.0)
        );
        assert_eq!(audit[1].reason.as_deref(), Some("carry-over"));
    }

    #[test]
    fn grants_are_numbered_and_listed_per_month() {
        let db = seeded();
        let admin = AdminId::new("admin").unwrap();
        let user = UserId::new("u-1").unwrap();
        let mut wf = Workflow::new(db, Arc::new(SummaryLocks::new()), offset());
        let first = wf
            .grant_paid_leave(&admin, &user, march(), 2.0, "annual")
            .unwrap();
        let second = wf
            .grant_paid_leave(&admin, &user, march(), 1.0, "bonus")
            .unwrap();
        assert!(first.id < second.id);

        let db = wf.into_store();
        let grants = db.grants_in(&user, march()).unwrap();
        assert_eq!(grants, vec![first, second]);
        assert!(db.grants_in(&user, YearMonth::new(2025, 4).unwrap()).unwrap().is_empty());
    }

    #[test]
    fn failed_audit_insert_rolls_back_the_mutation() {
        let db = seeded();
        db.conn
            .execute_batch(
                "CREATE TRIGGER reject_audit BEFORE INSERT ON audit_logs
                 BEGIN SELECT RAISE(ABORT, 'audit unavailable'); END;",
            )
            .unwrap();
        let admin = AdminId::new("admin").unwrap();
        let user = UserId::new("u-1").unwrap();
        let mut wf = Workflow::new(db, Arc::new(SummaryLocks::new()), offset());

        let err = wf.recalculate(&admin, &user, march()).unwrap_err();
        assert!(matches!(err, EngineError::Store(_)));
        let err = wf
            .edit_session(&admin, &SessionId::new("s-3").unwrap(), Some("09:00"), None, "fix")
            .unwrap_err();
        assert!(matches!(err, EngineError::Store(_)));

        let db = wf.into_store();
        assert!(db.list_summaries(None).unwrap().is_empty());
        let unchanged = db.session(&SessionId::new("s-3").unwrap()).unwrap().unwrap();
        assert_eq!(unchanged.check_in_at, Some(at(3, "08:20")));
    }

    #[test]
    fn audit_filter_narrows_by_entity() {
        let db = seeded();
        let admin = AdminId::new("admin").unwrap();
        let user = UserId::new("u-1").unwrap();
        let mut wf = Workflow::new(db, Arc::new(SummaryLocks::new()), offset());
        wf.recalculate(&admin, &user, march()).unwrap();
        wf.edit_session(&admin, &SessionId::new("s-4").unwrap(), None, Some("17:00"), "left early")
            .unwrap();
        wf.edit_session(&admin, &SessionId::new("s-5").unwrap(), Some("08:45"), None, "late")
            .unwrap();

        let db = wf.into_store();
        let sessions = db
            .list_audit(&AuditFilter {
                entity_type: Some(EntityType::AttendanceSession),
                entity_id: None,
            })
            .unwrap();
        assert_eq!(sessions.len(), 2);
        let one = db
            .list_audit(&AuditFilter {
                entity_type: None,
                entity_id: Some("s-5".to_string()),
            })
            .unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].action_type, AuditAction::Update);
        assert_eq!(one[0].after_json.as_ref().unwrap()["checkoutReason"], "late");

        let edited = db.session(&SessionId::new("s-4").unwrap()).unwrap().unwrap();
        assert_eq!(edited.worked_minutes, 420);
    }
}
