//! # Tally CLI Library
//!
//! Command line front end for the Tally point of sale.
//!
//! ## Module Organization
//! ```text
//! tally_cli/
//! ├── lib.rs          ◄─── You are here (Cli, run, logging)
//! ├── commands/       ◄─── clap subcommands and their handlers
//! ├── services/
//! │   └── checkout.rs ◄─── price → stock check → save → loyalty
//! ├── transfer/       ◄─── CSV import/export of products, customers, invoices
//! ├── state/
//! │   ├── mod.rs      ◄─── AppState (Database + SettingsStore)
//! │   └── settings.rs ◄─── settings.json, reloaded on every access
//! └── error.rs        ◄─── AppError / ErrorCode / exit codes
//! ```
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Parse arguments (clap)                                              │
//! │  2. Initialize logging                                                  │
//! │     • RUST_LOG wins; otherwise info,tally=debug,sqlx=warn               │
//! │     • -v / -vv raise the level                                          │
//! │  3. Locate settings                                                     │
//! │     • --settings, TALLY_SETTINGS, <config dir>/settings.json            │
//! │  4. settings commands: edit the file and stop                           │
//! │  5. Resolve the database path                                           │
//! │     • --db, TALLY_DB_PATH, settings, <data dir>/tally.db                │
//! │  6. Connect, run migrations, dispatch the command                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod commands;
pub mod error;
pub mod services;
pub mod state;
pub mod transfer;

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use commands::{Command, Output};
use error::AppResult;
use state::{AppState, SettingsStore};

#[derive(Debug, Parser)]
#[command(name = "tally", version, about = "Point of sale: invoices, loyalty tiers and CSV transfer")]
pub struct Cli {
    /// Database file (overrides settings and TALLY_DB_PATH)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Settings file (overrides TALLY_SETTINGS)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Runs one parsed command line to completion.
pub async fn run(cli: Cli) -> AppResult<()> {
    let output = Output { json: cli.json };

    let command = match cli.command {
        Command::Settings(command) => {
            let store = SettingsStore::locate(cli.settings)?;
            return commands::settings::run_settings(&store, command, output);
        }
        other => other,
    };

    let state = AppState::open(cli.settings, cli.db).await?;
    debug!(command = ?command, "Dispatching");
    let result = commands::dispatch(&state, command, output).await;
    state.db().close().await;
    result
}

/// Installs the tracing subscriber. Logs go to stderr so `--json` output
/// stays parseable.
///
/// ## Log Levels
/// - `RUST_LOG=...` - used as given
/// - `-v` - `debug`
/// - `-vv` - `trace`
/// - Default: `info,tally=debug,sqlx=warn`
pub fn init_tracing(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbosity {
            0 => "info,tally=debug,sqlx=warn",
            1 => "debug,sqlx=info",
            _ => "trace",
        })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
