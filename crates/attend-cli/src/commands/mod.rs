//! CLI subcommand implementations.

pub mod adjust;
pub mod audit;
pub mod calendar;
pub mod classify;
pub mod grant;
pub mod import;
pub mod recalculate;
pub mod session;
pub mod summary;
