//! `shelf status`: what the cache says about the last runs.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use shelf_core::{config, CacheEntry, RepoPath};
use shelf_sync::{ChangeCache, LoadStatus};

/// Arguments for `shelf status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Number of most recently synced files to list.
    #[arg(long, default_value_t = 10)]
    pub recent: usize,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    remote: Option<String>,
    cache_path: String,
    cache_state: &'static str,
    files: usize,
    last_sync_at: Option<DateTime<Utc>>,
    recent: Vec<RecentFile>,
}

#[derive(Debug, Serialize)]
struct RecentFile {
    path: String,
    synced_at: DateTime<Utc>,
}

#[derive(Tabled)]
struct RecentRow {
    #[tabled(rename = "file")]
    path: String,
    #[tabled(rename = "synced")]
    age: String,
}

impl StatusArgs {
    pub fn run(self, home: &Path) -> Result<ExitCode> {
        let config =
            config::load_or_default_at(home).context("failed to read configuration")?;
        let cache = ChangeCache::load(config.cache_path_at(home));

        let remote = (!config.owner.is_empty() && !config.repo.is_empty())
            .then(|| format!("{}/{}@{}", config.owner, config.repo, config.branch));
        let report = StatusReport {
            remote,
            cache_path: cache.path().display().to_string(),
            cache_state: state_label(cache.status()),
            files: cache.len(),
            last_sync_at: cache.synced_at(),
            recent: most_recent(cache.entries().iter(), self.recent),
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
        } else {
            print_report(&report);
        }
        Ok(ExitCode::SUCCESS)
    }
}

fn state_label(status: &LoadStatus) -> &'static str {
    match status {
        LoadStatus::Missing => "missing",
        LoadStatus::Loaded => "ok",
        LoadStatus::Migrated => "migrated",
        LoadStatus::Corrupt(_) => "corrupt",
    }
}

/// Newest first; ties broken by path so output is stable.
fn most_recent<'a>(
    entries: impl Iterator<Item = (&'a RepoPath, &'a CacheEntry)>,
    limit: usize,
) -> Vec<RecentFile> {
    let mut files: Vec<RecentFile> = entries
        .map(|(path, entry)| RecentFile {
            path: path.to_string(),
            synced_at: entry.synced_at,
        })
        .collect();
    files.sort_by(|a, b| b.synced_at.cmp(&a.synced_at).then_with(|| a.path.cmp(&b.path)));
    files.truncate(limit);
    files
}

fn print_report(report: &StatusReport) {
    println!(
        "Shelf v{} | {} | {} files tracked",
        env!("CARGO_PKG_VERSION"),
        report.remote.as_deref().unwrap_or("not configured"),
        report.files,
    );
    println!("cache: {} ({})", report.cache_path, report.cache_state);

    match report.last_sync_at {
        Some(at) => println!("last sync: {} ({} ago)", at.to_rfc3339(), format_age(at)),
        None => {
            println!("last sync: {}", "never".bright_black());
            println!("Run 'shelf run --dry-run' to preview the first sync.");
            return;
        }
    }

    if report.recent.is_empty() {
        return;
    }
    let rows: Vec<RecentRow> = report
        .recent
        .iter()
        .map(|f| RecentRow {
            path: f.path.clone(),
            age: format!("{} ago", format_age(f.synced_at)),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

pub fn format_age(timestamp: DateTime<Utc>) -> String {
    let seconds = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0) as u64;
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use shelf_core::Fingerprint;

    fn entry(minutes_ago: i64) -> CacheEntry {
        CacheEntry {
            fingerprint: Fingerprint("f".into()),
            synced_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn most_recent_is_newest_first_and_limited() {
        let a = RepoPath::from("a.py");
        let b = RepoPath::from("b.py");
        let c = RepoPath::from("c.py");
        let (ea, eb, ec) = (entry(30), entry(1), entry(10));
        let entries = vec![(&a, &ea), (&b, &eb), (&c, &ec)];

        let recent = most_recent(entries.into_iter(), 2);
        let paths: Vec<_> = recent.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["b.py", "c.py"]);
    }

    #[test]
    fn age_buckets() {
        assert_eq!(format_age(Utc::now() - Duration::seconds(5)), "5s");
        assert_eq!(format_age(Utc::now() - Duration::minutes(3)), "3m");
        assert_eq!(format_age(Utc::now() - Duration::hours(5)), "5h");
        assert_eq!(format_age(Utc::now() - Duration::days(2)), "2d");
        assert_eq!(format_age(Utc::now() + Duration::hours(1)), "0s");
    }
}
