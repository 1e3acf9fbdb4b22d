//! `purge`: bulk-deletes old items from a remote account, partition by
//! partition, resuming where it left off after an interruption.
//!
//! ## Commands
//!
//! - `run`: start a run, or resume the one recorded in the cursor file
//! - `status`: show the recorded cursor
//! - `reset`: forget the recorded cursor

mod config;
mod logging;
mod report;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use engine_logging::engine_error;
use log::LevelFilter;
use purge_engine::{CursorStore, FileCursorStore, RunEnd};

use crate::config::AppConfig;
use crate::logging::LogDestination;

#[derive(Parser)]
#[command(name = "purge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deletes everything older than a preserve window", long_about = None)]
struct Cli {
    /// Config file (default: ./purge.ron if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Where log lines go
    #[arg(long, value_enum, default_value_t = LogDestination::File, global = true)]
    log: LogDestination,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a run, or resume the interrupted one
    Run {
        /// Keep items younger than this many days
        #[arg(long)]
        preserve_days: Option<u32>,

        /// Base URL of the remote API
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Show where the recorded run stands
    Status,

    /// Forget the recorded run
    Reset,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    logging::initialize(cli.log, level);

    match execute(cli) {
        Ok(code) => code,
        Err(err) => {
            engine_error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<ExitCode> {
    let mut config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            preserve_days,
            base_url,
        } => {
            if let Some(days) = preserve_days {
                config.preserve_days = days;
            }
            if let Some(url) = base_url {
                config.base_url = url;
            }
            let end = run::run(&config)?;
            Ok(match end {
                RunEnd::Complete => ExitCode::SUCCESS,
                RunEnd::Stopped => ExitCode::from(130),
            })
        }
        Commands::Status => {
            let plan = config.plan().context("invalid partition list")?;
            let store = FileCursorStore::new(config.cursor_path.clone(), plan.clone());
            let state = store
                .load()
                .with_context(|| format!("failed to read cursor {}", store.path().display()))?;
            println!("{}", report::describe_cursor(state.as_ref(), &plan));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Reset => {
            let plan = config.plan().context("invalid partition list")?;
            let mut store = FileCursorStore::new(config.cursor_path.clone(), plan);
            store
                .clear()
                .with_context(|| format!("failed to remove cursor {}", store.path().display()))?;
            println!("cursor cleared");
            Ok(ExitCode::SUCCESS)
        }
    }
}
