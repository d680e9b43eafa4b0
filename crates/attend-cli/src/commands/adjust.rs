//! Adjust command for overriding the paid leave of a stored summary.

use std::io::Write;

use anyhow::Result;
use attend_core::{AdminId, UserId, YearMonth};

use super::summary::write_summaries;
use crate::Engine;

pub fn run<W: Write>(
    writer: &mut W,
    engine: &mut Engine,
    admin: &AdminId,
    user: &UserId,
    period: YearMonth,
    units: f64,
    reason: &str,
) -> Result<()> {
    let adjusted = engine.adjust_paid_leave(admin, user, period, units, reason)?;
    write_summaries(writer, std::slice::from_ref(&adjusted))
}
