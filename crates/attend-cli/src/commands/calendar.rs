//! Calendar commands for generating and editing the work calendar.

use std::io::Write;

use anyhow::Result;
use attend_core::WorkCalendarDay;
use attend_db::Database;
use chrono::NaiveDate;

pub fn generate<W: Write>(writer: &mut W, db: &mut Database, year: i32) -> Result<()> {
    let inserted = db.ensure_year(year)?;
    if inserted == 0 {
        writeln!(writer, "Calendar for {year} already exists; nothing generated.")?;
    } else {
        writeln!(writer, "Generated {inserted} calendar days for {year}.")?;
    }
    Ok(())
}

pub fn set<W: Write>(
    writer: &mut W,
    db: &mut Database,
    date: NaiveDate,
    off: bool,
    unit: f64,
    note: Option<String>,
) -> Result<()> {
    let day = WorkCalendarDay {
        date,
        is_working_day: !off && unit > 0.0,
        work_unit: if off { 0.0 } else { unit },
        note,
    };
    day.validate()?;
    db.upsert_calendar_day(&day)?;
    tracing::info!(%date, working = day.is_working_day, unit = day.work_unit, "calendar day set");

    let kind = if day.is_working_day { "working" } else { "non-working" };
    write!(writer, "{date}: {kind}, unit {:.1}", day.work_unit)?;
    if let Some(note) = &day.note {
        write!(writer, " ({note})")?;
    }
    writeln!(writer)?;
    Ok(())
}
