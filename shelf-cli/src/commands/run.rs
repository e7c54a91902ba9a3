//! `shelf run`: sync the library, or preview the plan with `--dry-run`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use shelf_core::config::{self, TOKEN_ENV};
use shelf_core::{paths, PlanEntry, SyncConfig, UploadAction};
use shelf_github::GitHubClient;
use shelf_scheduler::rotate_sync_log;
use shelf_sync::pipeline::{self, Outcome, RunMode};
use shelf_sync::{PlanReport, SyncReport};

use crate::logging;

/// Exit status when at least one file failed to upload.
pub const EXIT_PARTIAL: u8 = 1;

/// Arguments for `shelf run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Show what would be uploaded without contacting GitHub or touching the cache.
    #[arg(long)]
    pub dry_run: bool,

    /// Read configuration from this file instead of ~/.shelf/config.yaml.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl RunArgs {
    pub fn run(self, home: &Path) -> Result<ExitCode> {
        rotate_sync_log(home);
        logging::init(Some(&paths::sync_log_path(home)))?;

        let config = self.load_config(home)?;
        let cancel = install_interrupt_flag();
        let client = GitHubClient::new(&config);
        let mode = if self.dry_run {
            RunMode::DryRun
        } else {
            RunMode::Run
        };

        let outcome = pipeline::run(home, &config, &client, mode, Some(cancel))
            .inspect_err(|err| tracing::error!("run failed: {err}"))
            .context("sync run failed")?;

        match outcome {
            Outcome::Planned(report) => {
                print_plan(&report);
                Ok(ExitCode::SUCCESS)
            }
            Outcome::Synced(report) => {
                print_summary(&report);
                if report.result.failed.is_empty() {
                    Ok(ExitCode::SUCCESS)
                } else {
                    Ok(ExitCode::from(EXIT_PARTIAL))
                }
            }
        }
    }

    fn load_config(&self, home: &Path) -> Result<SyncConfig> {
        match &self.config {
            Some(path) => Ok(config::load_from(path)
                .with_context(|| format!("failed to load {}", path.display()))?
                .with_token_override(std::env::var(TOKEN_ENV).ok())),
            None => config::load_at(home).context("failed to load configuration"),
        }
    }
}

/// Ctrl-C stops the run before the next file; the cache is still persisted.
fn install_interrupt_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = flag.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        tracing::warn!("interrupt received; stopping after the current file");
        handler_flag.store(true, Ordering::SeqCst);
    }) {
        tracing::warn!("could not install Ctrl-C handler: {err}");
    }
    flag
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "action")]
    action: &'static str,
    #[tabled(rename = "path")]
    path: String,
    #[tabled(rename = "size")]
    size: String,
}

fn plan_rows(report: &PlanReport) -> Vec<PlanRow> {
    report
        .plan
        .entries
        .iter()
        .map(|entry| match entry {
            PlanEntry::Create(r) => PlanRow {
                action: "create",
                path: r.path.to_string(),
                size: format_size(r.size),
            },
            PlanEntry::Update(r) => PlanRow {
                action: "update",
                path: r.path.to_string(),
                size: format_size(r.size),
            },
            PlanEntry::Unchanged(p) => PlanRow {
                action: "unchanged",
                path: p.to_string(),
                size: String::new(),
            },
        })
        .collect()
}

fn print_plan(report: &PlanReport) {
    let plan = &report.plan;
    println!(
        "[dry-run] {} to create, {} to update, {} unchanged, {} skipped",
        plan.to_create().count(),
        plan.to_update().count(),
        plan.unchanged().count(),
        report.warnings.len(),
    );
    if report.cache_corrupt {
        println!("{}", "cache was unreadable; every file counts as new".yellow());
    }
    if !plan.entries.is_empty() {
        let mut table = Table::new(plan_rows(report));
        table.with(Style::rounded());
        println!("{table}");
    }
    for warning in &report.warnings {
        println!(
            "  {} {} ({}): {}",
            "!".yellow(),
            warning.path.display(),
            warning.kind,
            warning.detail
        );
    }
}

fn print_summary(report: &SyncReport) {
    let result = &report.result;
    if report.repository_created {
        println!("{} created remote repository", "+".green());
    }
    let line = format!(
        "{} created, {} updated, {} unchanged, {} failed, {} skipped",
        result.count(UploadAction::Created),
        result.count(UploadAction::Updated),
        report.plan.unchanged().count(),
        result.failed.len(),
        report.warnings.len(),
    );
    if result.failed.is_empty() {
        println!("{} {line}", "✓".green().bold());
    } else {
        println!("{} {line}", "✗".red().bold());
        for failed in &result.failed {
            println!(
                "  {} {} ({}): {}",
                "✗".red(),
                failed.path,
                failed.kind,
                failed.message
            );
        }
    }
    if !result.not_attempted.is_empty() {
        println!(
            "{} interrupted; {} file(s) left for the next run",
            "~".yellow(),
            result.not_attempted.len()
        );
    }
}

fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    if bytes < KIB {
        return format!("{bytes} B");
    }
    if bytes < KIB * KIB {
        return format!("{:.1} KiB", bytes as f64 / KIB as f64);
    }
    format!("{:.1} MiB", bytes as f64 / (KIB * KIB) as f64)
}
