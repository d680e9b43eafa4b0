//! Command-line argument definitions.

use std::path::PathBuf;

use attend_core::{EntityType, YearMonth};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Attendance classification and leave accrual.
///
/// Classifies each working day from check-in/check-out times, rolls months up
/// into leave summaries and keeps an audit trail of every admin correction.
#[derive(Debug, Parser)]
#[command(name = "attend", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Admin recorded in audit entries (defaults to `admin_user_id`).
    #[arg(long, global = true)]
    pub admin: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import employees, sessions, calendar days and grants as JSON Lines from stdin.
    Import,

    /// Show the per-day classification of one user's month.
    Classify {
        /// The employee's user ID.
        user: String,

        /// Month to classify (YYYY-MM).
        #[arg(long)]
        month: YearMonth,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Recompute monthly summaries from source data, discarding manual adjustments.
    Recalculate {
        /// The employee's user ID.
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        user: Option<String>,

        /// Month to recompute (YYYY-MM).
        #[arg(long)]
        month: YearMonth,

        /// Recompute every employee's summary for the month.
        #[arg(long)]
        all: bool,
    },

    /// Show stored monthly summaries.
    Summary {
        /// Only this employee.
        user: Option<String>,

        /// Only this month (YYYY-MM).
        #[arg(long)]
        month: Option<YearMonth>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Override the paid leave used in a stored summary.
    AdjustPaid {
        /// The employee's user ID.
        user: String,

        /// Month of the summary (YYYY-MM).
        #[arg(long)]
        month: YearMonth,

        /// New paid-leave units.
        #[arg(long)]
        units: f64,

        /// Why the adjustment is made (required).
        #[arg(long)]
        reason: String,
    },

    /// Correct the check-in and/or check-out of a session.
    EditSession {
        /// The session ID.
        session: String,

        /// New check-in time (HH:MM).
        #[arg(long)]
        check_in: Option<String>,

        /// New check-out time (HH:MM).
        #[arg(long)]
        check_out: Option<String>,

        /// Why the session is edited (required).
        #[arg(long)]
        reason: String,
    },

    /// Close an open session whose check-out was never recorded.
    CloseSession {
        /// The session ID.
        session: String,

        /// Check-out time (HH:MM).
        #[arg(long)]
        check_out: String,

        /// Why the session is closed (required).
        #[arg(long)]
        reason: String,
    },

    /// Record an approved paid-leave allotment.
    Grant {
        /// The employee's user ID.
        user: String,

        /// Month the allotment applies to (YYYY-MM).
        #[arg(long)]
        month: YearMonth,

        /// Granted units.
        #[arg(long)]
        units: f64,

        /// Why the leave is granted (required).
        #[arg(long)]
        reason: String,
    },

    /// Manage the work calendar.
    #[command(subcommand)]
    Calendar(CalendarAction),

    /// List audit log entries.
    Audit {
        /// Only entries for this entity type.
        #[arg(long, value_parser = parse_entity_type)]
        entity_type: Option<EntityType>,

        /// Only entries for this entity ID (e.g. `u-1/2025-03` or a session ID).
        #[arg(long)]
        entity_id: Option<String>,

        /// Output as JSON Lines.
        #[arg(long)]
        json: bool,
    },
}

/// Work-calendar subcommands.
#[derive(Debug, Subcommand)]
pub enum CalendarAction {
    /// Generate the default Monday-Friday calendar for a year.
    Generate {
        /// The year to generate.
        year: i32,
    },

    /// Define a single date.
    Set {
        /// The date (YYYY-MM-DD).
        date: NaiveDate,

        /// Mark the date as a non-working day.
        #[arg(long)]
        off: bool,

        /// Work unit of a working day: 1, 0.5 or 0.
        #[arg(long, default_value_t = 1.0, conflicts_with = "off")]
        unit: f64,

        /// Free-form note (e.g. a holiday name).
        #[arg(long)]
        note: Option<String>,
    },
}

fn parse_entity_type(value: &str) -> Result<EntityType, String> {
    value.parse().map_err(|e: attend_core::ValidationError| e.to_string())
}
