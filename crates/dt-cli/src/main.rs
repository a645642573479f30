use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::{CommandFactory, Parser};
use dt_core::SystemClock;
use dt_db::{Database, SharedDatabase};
use tracing_subscriber::EnvFilter;

use dt_cli::commands::util::{local_day, resolve_at};
use dt_cli::commands::{guesses, ingest, run, slots, status, watch};
use dt_cli::{Cli, Commands, Config, IngestSignal};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let mut stdout = io::stdout();
    match &cli.command {
        Some(Commands::Ingest { signal }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            let now = Utc::now();
            match signal {
                IngestSignal::Motion {
                    motion,
                    confidence,
                    at,
                } => {
                    let at = resolve_at(at.as_deref(), now)?;
                    ingest::motion(&mut stdout, &mut db, *motion, *confidence, at)?;
                }
                IngestSignal::Location {
                    lat,
                    lon,
                    accuracy,
                    at,
                } => {
                    let at = resolve_at(at.as_deref(), now)?;
                    ingest::location(&mut stdout, &mut db, *lat, *lon, *accuracy, at)?;
                }
                IngestSignal::Track {
                    action,
                    category,
                    at,
                } => {
                    let at = resolve_at(at.as_deref(), now)?;
                    ingest::track(&mut stdout, &mut db, *action, *category, at)?;
                }
                IngestSignal::MotionAccess { granted, .. } => {
                    ingest::motion_access(&mut stdout, &mut db, *granted)?;
                }
            }
        }
        Some(Commands::Run { json }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            let db = SharedDatabase::new(db);
            run::run(&mut stdout, &db, SystemClock, config.pipeline, *json).await?;
        }
        Some(Commands::Slots { day, json }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            let db = SharedDatabase::new(db);
            let day = local_day(*day, Utc::now());
            slots::run(&mut stdout, &db, &SystemClock, &day, &Local, *json).await?;
        }
        Some(Commands::Guesses { json }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            guesses::run(&mut stdout, &db, *json)?;
        }
        Some(Commands::Status) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            let timezone = iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string());
            status::run(&mut stdout, &db, &config.database_path, &timezone)?;
        }
        Some(Commands::Watch) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            watch::run(SharedDatabase::new(db), &config).await?;
        }
        None => {
            Cli::command().print_help()?;
        }
    }

    Ok(())
}
