use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use attend_core::{AdminId, SessionId, SummaryLocks, UserId, Workflow};
use attend_db::AuditFilter;
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use attend_cli::commands::{
    adjust, audit, calendar, classify, grant, import, recalculate, session, summary,
};
use attend_cli::{CalendarAction, Cli, Commands, Config, Engine};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(attend_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = attend_db::Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    Ok((db, config))
}

/// Open the database and wrap it in a workflow clocked to the configured offset.
fn open_engine(cli: &Cli) -> Result<(Engine, AdminId)> {
    let (db, config) = open_database(cli.config.as_deref())?;
    let offset = config.offset().context("invalid utc_offset in configuration")?;
    let admin = AdminId::new(cli.admin.as_deref().unwrap_or(&config.admin_user_id))
        .context("invalid admin ID")?;
    let today = Utc::now().with_timezone(&offset).date_naive();
    let engine = Workflow::new(db, Arc::new(SummaryLocks::new()), offset).with_today(today);
    Ok((engine, admin))
}

fn user_id(raw: &str) -> Result<UserId> {
    UserId::new(raw).context("invalid user ID")
}

fn session_id(raw: &str) -> Result<SessionId> {
    SessionId::new(raw).context("invalid session ID")
}

#[expect(
    clippy::too_many_lines,
    reason = "CLI command dispatch is inherently verbose"
)]
fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let mut stdout = io::stdout().lock();

    match &cli.command {
        Some(Commands::Import) => {
            let (mut engine, admin) = open_engine(&cli)?;
            let stats = import::run(io::stdin().lock(), &mut engine, &admin)?;
            eprintln!("{stats}");
        }
        Some(Commands::Classify { user, month, json }) => {
            let (engine, _admin) = open_engine(&cli)?;
            classify::run(&mut stdout, &engine, &user_id(user)?, *month, *json)?;
        }
        Some(Commands::Recalculate { user, month, all }) => {
            let (mut engine, admin) = open_engine(&cli)?;
            let target = match user {
                Some(user) if !*all => recalculate::Target::User(user_id(user)?),
                _ => recalculate::Target::All,
            };
            recalculate::run(&mut stdout, &mut engine, &admin, target, *month)?;
        }
        Some(Commands::Summary { user, month, json }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            let user = user.as_deref().map(user_id).transpose()?;
            summary::run(&mut stdout, &db, user.as_ref(), *month, *json)?;
        }
        Some(Commands::AdjustPaid {
            user,
            month,
            units,
            reason,
        }) => {
            let (mut engine, admin) = open_engine(&cli)?;
            adjust::run(
                &mut stdout,
                &mut engine,
                &admin,
                &user_id(user)?,
                *month,
                *units,
                reason,
            )?;
        }
        Some(Commands::EditSession {
            session: id,
            check_in,
            check_out,
            reason,
        }) => {
            let (mut engine, admin) = open_engine(&cli)?;
            session::edit(
                &mut stdout,
                &mut engine,
                &admin,
                &session_id(id)?,
                check_in.as_deref(),
                check_out.as_deref(),
                reason,
            )?;
        }
        Some(Commands::CloseSession {
            session: id,
            check_out,
            reason,
        }) => {
            let (mut engine, admin) = open_engine(&cli)?;
            session::close(
                &mut stdout,
                &mut engine,
                &admin,
                &session_id(id)?,
                check_out,
                reason,
            )?;
        }
        Some(Commands::Grant {
            user,
            month,
            units,
            reason,
        }) => {
            let (mut engine, admin) = open_engine(&cli)?;
            grant::run(
                &mut stdout,
                &mut engine,
                &admin,
                &user_id(user)?,
                *month,
                *units,
                reason,
            )?;
        }
        Some(Commands::Calendar(action)) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            match action {
                CalendarAction::Generate { year } => calendar::generate(&mut stdout, &mut db, *year)?,
                CalendarAction::Set {
                    date,
                    off,
                    unit,
                    note,
                } => calendar::set(&mut stdout, &mut db, *date, *off, *unit, note.clone())?,
            }
        }
        Some(Commands::Audit {
            entity_type,
            entity_id,
            json,
        }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            let filter = AuditFilter {
                entity_type: *entity_type,
                entity_id: entity_id.clone(),
            };
            audit::run(&mut stdout, &db, &filter, *json)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
