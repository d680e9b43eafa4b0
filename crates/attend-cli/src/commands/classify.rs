//! Classify command for showing how each day of a month was judged.
//!
//! Read-only: nothing is stored, so it can be run freely before a
//! `recalculate`.

use std::io::Write;

use anyhow::Result;
use attend_core::{DayRecord, LeaveMonthlySummary, UserId, YearMonth};
use serde_json::json;

use crate::Engine;

pub fn run<W: Write>(
    writer: &mut W,
    engine: &Engine,
    user: &UserId,
    period: YearMonth,
    json: bool,
) -> Result<()> {
    let report = engine.month_report(user, period)?;

    if json {
        let issues: Vec<String> = report.issues.iter().map(ToString::to_string).collect();
        let value = json!({
            "summary": report.summary,
            "days": report.days,
            "issues": issues,
        });
        writeln!(writer, "{}", serde_json::to_string_pretty(&value)?)?;
        return Ok(());
    }

    writeln!(writer, "CLASSIFICATION {user} {period}")?;
    writeln!(writer)?;
    write_days(writer, &report.days)?;
    writeln!(writer)?;
    write_totals(writer, &report.summary)?;
    for issue in &report.issues {
        writeln!(writer, "warning: {issue}")?;
    }
    Ok(())
}

/// Writes one line per day.
pub fn write_days<W: Write>(writer: &mut W, days: &[DayRecord]) -> Result<()> {
    writeln!(
        writer,
        "{:<10}  {:<33}  {:>4}  {:>5}  Credit",
        "Date", "Status", "Late", "Early"
    )?;
    writeln!(
        writer,
        "──────────  ─────────────────────────────────  ────  ─────  ──────"
    )?;
    for day in days {
        let c = &day.classification;
        writeln!(
            writer,
            "{:<10}  {:<33}  {:>4}  {:>5}  {}",
            day.date.to_string(),
            c.status.as_str(),
            c.late_minutes,
            c.early_leave_minutes,
            c.day_credit,
        )?;
    }
    Ok(())
}

fn write_totals<W: Write>(writer: &mut W, summary: &LeaveMonthlySummary) -> Result<()> {
    writeln!(
        writer,
        "Expected {:.1} | Worked {:.1} | Missing {:.1} | Paid {:.1} | Unpaid {:.1}",
        summary.expected_units,
        summary.worked_units,
        summary.missing_units,
        summary.paid_used_units,
        summary.unpaid_units,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use attend_core::{AttendanceSession, SessionId, SessionStatus, SummaryLocks, Workflow};
    use attend_db::Database;
    use chrono::{FixedOffset, NaiveDate, NaiveTime};
    use insta::assert_snapshot;

    fn offset() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    fn session(day: u32, check_in: &str, check_out: &str) -> AttendanceSession {
        let date = NaiveDate::from_ymd_opt(2025, 3, day).unwrap();
        let at = |t: &str| {
            Some(attend_core::time_of_day::at_clock_time(
                date,
                NaiveTime::parse_from_str(t, "%H:%M").unwrap(),
                offset(),
            ))
        };
        let mut s = AttendanceSession {
            id: SessionId::new(format!("s-{day}")).unwrap(),
            user_id: UserId::new("u-1").unwrap(),
            work_date: date,
            check_in_at: at(check_in),
            check_out_at: at(check_out),
            status: SessionStatus::NotCheckedIn,
            worked_minutes: 0,
            checkout_reason: None,
        };
        s.refresh_derived();
        s
    }

    fn engine() -> Engine {
        let mut db = Database::open_in_memory().unwrap();
        db.upsert_employee(&attend_core::Employee {
            user_id: UserId::new("u-1").unwrap(),
            name: None,
            birthday: None,
            paid_leave_balance: 0.0,
        })
        .unwrap();
        db.ensure_year(2025).unwrap();
        db.upsert_session(&session(3, "08:10", "18:00")).unwrap();
        db.upsert_session(&session(4, "09:00", "17:45")).unwrap();
        Workflow::new(db, Arc::new(SummaryLocks::new()), offset())
    }

    #[test]
    fn day_table_shows_status_minutes_and_credit() {
        let engine = engine();
        let report = engine
            .month_report(&UserId::new("u-1").unwrap(), YearMonth::new(2025, 3).unwrap())
            .unwrap();
        let mut output = Vec::new();
        write_days(&mut output, &report.days[1..5]).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Date        Status                             Late  Early  Credit
        ──────────  ─────────────────────────────────  ────  ─────  ──────
        2025-03-02  missing                               0      0  NONE
        2025-03-03  present                               0      0  FULL
        2025-03-04  lateMorning_earlyLeaveAfternoon      30     15  FULL
        2025-03-05  absent                                0      0  NONE
        ");
    }

    #[test]
    fn json_output_lists_every_day() {
        let engine = engine();
        let mut output = Vec::new();
        run(
            &mut output,
            &engine,
            &UserId::new("u-1").unwrap(),
            YearMonth::new(2025, 3).unwrap(),
            true,
        )
        .unwrap();

        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["days"].as_array().unwrap().len(), 31);
        assert_eq!(value["days"][3]["status"], "lateMorning_earlyLeaveAfternoon");
        assert_eq!(value["days"][3]["lateMinutes"], 30);
        assert_eq!(value["summary"]["workedUnits"], 2.0);
        assert!(value["issues"].as_array().unwrap().is_empty());
    }

    #[test]
    fn unknown_user_is_an_error() {
        let engine = engine();
        let mut output = Vec::new();
        let err = run(
            &mut output,
            &engine,
            &UserId::new("ghost").unwrap(),
            YearMonth::new(2025, 3).unwrap(),
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
