//! Core domain logic for attendance tracking.
//!
//! This crate contains the fundamental types and logic for:
//! - Classification: turning one day's check-in/check-out into a status,
//!   lateness, early leave and a work-unit credit
//! - Aggregation: rolling a month of classified days into a leave summary
//! - Workflow: audited adjustments, session edits and recalculation under
//!   per-(user, month) locks
//!
//! Storage is abstracted behind [`AttendanceStore`]; nothing here performs I/O.

mod aggregate;
pub mod audit;
pub mod calendar;
mod classify;
mod credit;
pub mod lock;
pub mod model;
pub mod rules;
pub mod time_of_day;
pub mod types;
mod workflow;

pub use aggregate::{
    Aggregation, BIRTHDAY_LEAVE_UNITS, DayRecord, InconsistentData, LeaveMonthlySummary,
    MonthInputs, SummaryState, aggregate, aggregate_detailed, aggregate_many,
};
pub use audit::{AuditAction, AuditLogEntry, EntityType};
pub use calendar::generate_year;
pub use classify::{DayClassification, DayStatus, classify};
pub use credit::DayCredit;
pub use lock::SummaryLocks;
pub use model::{AttendanceSession, Employee, LeaveGrant, WorkCalendarDay};
pub use types::{
    AdminId, SessionId, SessionStatus, SummaryKey, UserId, ValidationError, YearMonth,
};
pub use workflow::{AttendanceStore, EngineError, SessionChange, Workflow};
