//! Grant command for recording approved paid-leave allotments.

use std::io::Write;

use anyhow::Result;
use attend_core::{AdminId, UserId, YearMonth};

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
    let grant = engine.grant_paid_leave(admin, user, period, units, reason)?;
    writeln!(
        writer,
        "Granted {:.1} units to {} for {} (grant #{})",
        grant.units,
        grant.user_id,
        grant.period,
        grant.id.unwrap_or_default(),
    )?;
    writeln!(
        writer,
        "Run 'attend recalculate {} --month {}' to apply it to the summary.",
        grant.user_id, grant.period
    )?;
    Ok(())
}
