//! Session commands for correcting and closing attendance sessions.
//!
//! Neither command touches the monthly summary; the output names the
//! `recalculate` call that refreshes it.

use std::io::Write;

use anyhow::Result;
use attend_core::{AdminId, SessionChange, SessionId};

use crate::Engine;

pub fn edit<W: Write>(
    writer: &mut W,
    engine: &mut Engine,
    admin: &AdminId,
    session: &SessionId,
    check_in: Option<&str>,
    check_out: Option<&str>,
    reason: &str,
) -> Result<()> {
    let change = engine.edit_session(admin, session, check_in, check_out, reason)?;
    write_change(writer, &change)
}

pub fn close<W: Write>(
    writer: &mut W,
    engine: &mut Engine,
    admin: &AdminId,
    session: &SessionId,
    check_out: &str,
    reason: &str,
) -> Result<()> {
    let change = engine.close_session(admin, session, check_out, reason)?;
    write_change(writer, &change)
}

fn write_change<W: Write>(writer: &mut W, change: &SessionChange) -> Result<()> {
    let s = &change.session;
    let c = &change.classification;
    let time = |at: Option<chrono::DateTime<chrono::FixedOffset>>| {
        at.map_or_else(|| "--:--".to_string(), |at| at.format("%H:%M").to_string())
    };
    writeln!(
        writer,
        "Session {} ({} {}): {}-{} {}, {} minutes worked",
        s.id,
        s.user_id,
        s.work_date,
        time(s.check_in_at),
        time(s.check_out_at),
        s.status,
        s.worked_minutes,
    )?;
    writeln!(
        writer,
        "Classified {} (late {}m, early leave {}m, credit {})",
        c.status, c.late_minutes, c.early_leave_minutes, c.day_credit,
    )?;
    writeln!(
        writer,
        "Run 'attend recalculate {} --month {}' to refresh the summary.",
        change.affected.user_id, change.affected.period
    )?;
    Ok(())
}
