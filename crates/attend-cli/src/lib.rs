//! Attendance CLI library.
//!
//! This crate provides the CLI interface for the attendance engine.

mod cli;
pub mod commands;
mod config;

pub use cli::{CalendarAction, Cli, Commands};
pub use config::Config;

/// The workflow every command runs against.
pub type Engine = attend_core::Workflow<attend_db::Database>;
