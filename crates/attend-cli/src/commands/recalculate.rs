//! Recalculate command for recomputing monthly summaries from source data.

use std::io::Write;

use anyhow::Result;
use attend_core::{AdminId, SummaryKey, UserId, YearMonth};

use super::summary::write_summaries;
use crate::Engine;

/// Which summaries to recompute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    User(UserId),
    /// Every known employee.
    All,
}

pub fn run<W: Write>(
    writer: &mut W,
    engine: &mut Engine,
    admin: &AdminId,
    target: Target,
    period: YearMonth,
) -> Result<()> {
    let summaries = match target {
        Target::User(user) => vec![engine.recalculate(admin, &user, period)?],
        Target::All => {
            let keys: Vec<SummaryKey> = engine
                .store()
                .list_employees()?
                .into_iter()
                .map(|e| SummaryKey::new(e.user_id, period))
                .collect();
            if keys.is_empty() {
                writeln!(writer, "No employees to recalculate.")?;
                return Ok(());
            }
            engine.recalculate_many(admin, &keys)?
        }
    };
    write_summaries(writer, &summaries)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use attend_core::{AttendanceStore, Employee, SummaryLocks, SummaryState, Workflow};
    use attend_db::{AuditFilter, Database};
    use chrono::FixedOffset;

    fn engine(users: &[&str]) -> Engine {
        let mut db = Database::open_in_memory().unwrap();
        for user in users {
            db.upsert_employee(&Employee {
                user_id: UserId::new(*user).unwrap(),
                name: None,
                birthday: None,
                paid_leave_balance: 0.0,
            })
            .unwrap();
        }
        db.ensure_year(2025).unwrap();
        Workflow::new(
            db,
            Arc::new(SummaryLocks::new()),
            FixedOffset::east_opt(7 * 3600).unwrap(),
        )
    }

    #[test]
    fn all_recalculates_every_employee() {
        let mut engine = engine(&["u-1", "u-2", "u-3"]);
        let admin = AdminId::new("admin").unwrap();
        let period = YearMonth::new(2025, 2).unwrap();
        let mut output = Vec::new();
        run(&mut output, &mut engine, &admin, Target::All, period).unwrap();

        let stored = engine.store().list_summaries(Some(period)).unwrap();
        assert_eq!(stored.len(), 3);
        assert!(stored.iter().all(|s| (s.missing_units - 20.0).abs() < 1e-9));
        assert!(stored.iter().all(|s| s.state == SummaryState::Computed));
        assert_eq!(engine.store().list_audit(&AuditFilter::default()).unwrap().len(), 3);

        let output = String::from_utf8(output).unwrap();
        assert_eq!(output.lines().count(), 5);
    }

    #[test]
    fn unknown_user_writes_nothing() {
        let mut engine = engine(&["u-1"]);
        let admin = AdminId::new("admin").unwrap();
        let period = YearMonth::new(2025, 2).unwrap();
        let mut output = Vec::new();
        let target = Target::User(UserId::new("ghost").unwrap());
        assert!(run(&mut output, &mut engine, &admin, target, period).is_err());
        assert!(engine.store().list_summaries(None).unwrap().is_empty());
        assert!(
            engine
                .store()
                .summary(&SummaryKey::new(UserId::new("u-1").unwrap(), period))
                .unwrap()
                .is_none()
        );
    }
}
