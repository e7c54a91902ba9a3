//! Shelf: mirror a local code library into a GitHub repository.
//!
//! # Usage
//!
//! ```text
//! shelf setup [--token T --owner O --repo R --library PATH --branch B --private]
//! shelf run [--dry-run] [--config PATH]
//! shelf schedule install|show [--hour H --minute M]
//! shelf schedule uninstall
//! shelf status [--recent N] [--json]
//! ```
//!
//! `shelf run` exits 0 when every file synced, 1 when some files failed, and
//! 2 when the run could not complete.

mod commands;
mod logging;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{run::RunArgs, schedule::ScheduleCommand, setup::SetupArgs, status::StatusArgs};

/// Exit status for errors that stop a command outright.
const EXIT_FATAL: u8 = 2;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "shelf",
    version,
    about = "Mirror a local code library into a GitHub repository",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload new and changed files (or preview them with --dry-run).
    Run(RunArgs),

    /// Create or edit ~/.shelf/config.yaml.
    Setup(SetupArgs),

    /// Manage the daily scheduled run.
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommand,
    },

    /// Summarize the sync cache.
    Status(StatusArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    match dispatch(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn dispatch(cli: Cli) -> Result<ExitCode> {
    let home = commands::home_dir()?;
    match cli.command {
        Commands::Run(args) => args.run(&home),
        Commands::Setup(args) => args.run(&home),
        Commands::Schedule { command } => commands::schedule::run(command, &home),
        Commands::Status(args) => args.run(&home),
    }
}
