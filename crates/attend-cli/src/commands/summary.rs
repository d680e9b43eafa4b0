//! Summary command for listing stored monthly leave summaries.

use std::io::Write;

use anyhow::Result;
use attend_core::{LeaveMonthlySummary, UserId, YearMonth};
use attend_db::Database;

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    user: Option<&UserId>,
    period: Option<YearMonth>,
    json: bool,
) -> Result<()> {
    let summaries: Vec<LeaveMonthlySummary> = db
        .list_summaries(period)?
        .into_iter()
        .filter(|s| user.is_none_or(|u| &s.user_id == u))
        .collect();

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&summaries)?)?;
        return Ok(());
    }
    if summaries.is_empty() {
        writeln!(writer, "No summaries stored.")?;
        writeln!(writer)?;
        writeln!(
            writer,
            "Hint: Run 'attend recalculate <user> --month YYYY-MM' to compute one."
        )?;
        return Ok(());
    }
    write_summaries(writer, &summaries)
}

/// Writes summaries as an aligned table.
pub fn write_summaries<W: Write>(writer: &mut W, summaries: &[LeaveMonthlySummary]) -> Result<()> {
    writeln!(
        writer,
        "{:<12}  {:<7}  {:>8}  {:>6}  {:>7}  {:>4}  {:>6}  {:<8}  State",
        "User", "Month", "Expected", "Worked", "Missing", "Paid", "Unpaid", "Birthday"
    )?;
    writeln!(
        writer,
        "────────────  ───────  ────────  ──────  ───────  ────  ──────  ────────  ────────"
    )?;
    for s in summaries {
        writeln!(
            writer,
            "{:<12}  {:<7}  {:>8.1}  {:>6.1}  {:>7.1}  {:>4.1}  {:>6.1}  {:<8}  {}",
            s.user_id.as_str(),
            s.period.to_string(),
            s.expected_units,
            s.worked_units,
            s.missing_units,
            s.paid_used_units,
            s.unpaid_units,
            if s.is_birthday { "yes" } else { "no" },
            s.state,
        )?;
    }
    Ok(())
}
