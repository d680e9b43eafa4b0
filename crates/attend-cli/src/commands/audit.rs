//! Audit command for listing the audit trail of admin mutations.

use std::io::Write;

use anyhow::Result;
use attend_core::AuditLogEntry;
use attend_db::{AuditFilter, Database};
use chrono::SecondsFormat;

pub fn run<W: Write>(writer: &mut W, db: &Database, filter: &AuditFilter, json: bool) -> Result<()> {
    let entries = db.list_audit(filter)?;

    if json {
        for entry in &entries {
            writeln!(writer, "{}", serde_json::to_string(entry)?)?;
        }
        return Ok(());
    }
    if entries.is_empty() {
        writeln!(writer, "No audit entries.")?;
        return Ok(());
    }
    for entry in &entries {
        write_entry(writer, entry)?;
    }
    Ok(())
}

fn write_entry<W: Write>(writer: &mut W, entry: &AuditLogEntry) -> Result<()> {
    writeln!(
        writer,
        "#{} {} {} {} {} by {}",
        entry.id.unwrap_or_default(),
        entry.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        entry.action_type,
        entry.entity_type,
        entry.entity_id,
        entry.admin_user_id,
    )?;
    if let Some(reason) = &entry.reason {
        writeln!(writer, "    reason: {reason}")?;
    }
    for (label, snapshot) in [("before", &entry.before_json), ("after", &entry.after_json)] {
        if let Some(value) = snapshot {
            writeln!(writer, "    {label}: {value}")?;
        }
    }
    Ok(())
}
