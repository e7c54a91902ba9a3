//! `shelf schedule`: register the daily run with cron, launchd, or schtasks.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use shelf_scheduler::schedule::{DEFAULT_HOUR, DEFAULT_MINUTE};
use shelf_scheduler::{DailyTime, Invocation, Platform};

#[derive(Subcommand, Debug)]
pub enum ScheduleCommand {
    /// Install (or replace) the daily run for this OS.
    Install(TimeArgs),
    /// Remove the daily run.
    Uninstall,
    /// Print cron, systemd, launchd and schtasks variants without installing.
    Show(TimeArgs),
}

#[derive(Args, Debug)]
pub struct TimeArgs {
    /// Hour of day, 0-23, local time.
    #[arg(long, default_value_t = DEFAULT_HOUR)]
    pub hour: u8,

    /// Minute, 0-59.
    #[arg(long, default_value_t = DEFAULT_MINUTE)]
    pub minute: u8,
}

impl TimeArgs {
    fn invocation(&self, home: &Path) -> Result<Invocation> {
        let time = DailyTime::new(self.hour, self.minute)?;
        let binary = std::env::current_exe().context("could not resolve the shelf binary path")?;
        Ok(Invocation::new(home, binary, time))
    }
}

pub fn run(command: ScheduleCommand, home: &Path) -> Result<ExitCode> {
    match command {
        ScheduleCommand::Install(args) => {
            let inv = args.invocation(home)?;
            let platform = Platform::current()?;
            let installed = shelf_scheduler::install(home, &inv)
                .with_context(|| format!("failed to install {platform} schedule"))?;
            println!("{} {installed}", "✓".green().bold());
            println!("runs daily at {} (local time)", inv.time);
        }
        ScheduleCommand::Uninstall => {
            if shelf_scheduler::uninstall(home).context("failed to remove schedule")? {
                println!("{} schedule removed", "✓".green().bold());
            } else {
                println!("no schedule installed");
            }
        }
        ScheduleCommand::Show(args) => {
            let inv = args.invocation(home)?;
            print!("{}", shelf_scheduler::render_all(&inv));
        }
    }
    Ok(ExitCode::SUCCESS)
}
