//! Daily-run registration with the host scheduler, plus run-log rotation.

mod cron;
mod error;
pub mod launchd;
pub mod log_rotation;
pub mod paths;
pub mod schedule;
mod windows;

use std::fmt;
use std::path::{Path, PathBuf};

pub use error::ScheduleError;
pub use log_rotation::{rotate_if_needed, rotate_sync_log};
pub use schedule::{DailyTime, Invocation};

/// Scheduler backend for the host OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// crontab (Linux and other Unix).
    Cron,
    Launchd,
    TaskScheduler,
}

impl Platform {
    pub fn current() -> Result<Self, ScheduleError> {
        match std::env::consts::OS {
            "macos" => Ok(Platform::Launchd),
            "windows" => Ok(Platform::TaskScheduler),
            "linux" | "freebsd" | "netbsd" | "openbsd" | "dragonfly" => Ok(Platform::Cron),
            _ => Err(ScheduleError::Unsupported(std::env::consts::OS)),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Cron => write!(f, "cron"),
            Platform::Launchd => write!(f, "launchd"),
            Platform::TaskScheduler => write!(f, "Windows Task Scheduler"),
        }
    }
}

/// What `install` registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Installed {
    Cron { line: String },
    Launchd { plist: PathBuf },
    TaskScheduler { task: &'static str },
}

impl fmt::Display for Installed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Installed::Cron { line } => write!(f, "crontab entry: {line}"),
            Installed::Launchd { plist } => write!(f, "launchd agent: {}", plist.display()),
            Installed::TaskScheduler { task } => write!(f, "scheduled task: {task}"),
        }
    }
}

/// Register a daily run of `inv` with the host scheduler.
pub fn install(home: &Path, inv: &Invocation) -> Result<Installed, ScheduleError> {
    let platform = Platform::current()?;
    let logs = paths::logs_dir(home);
    std::fs::create_dir_all(&logs).map_err(|e| error::io_err(&logs, e))?;

    let installed = match platform {
        Platform::Cron => Installed::Cron {
            line: cron::install(inv)?,
        },
        Platform::Launchd => Installed::Launchd {
            plist: launchd::install(home, inv)?,
        },
        Platform::TaskScheduler => {
            windows::install(inv)?;
            Installed::TaskScheduler {
                task: paths::WINDOWS_TASK_NAME,
            }
        }
    };
    tracing::info!(platform = %platform, time = %inv.time, "daily run installed");
    Ok(installed)
}

/// Remove the daily run. Returns whether anything was removed.
pub fn uninstall(home: &Path) -> Result<bool, ScheduleError> {
    let removed = match Platform::current()? {
        Platform::Cron => cron::uninstall()?,
        Platform::Launchd => launchd::uninstall(home)?,
        Platform::TaskScheduler => {
            windows::uninstall()?;
            true
        }
    };
    Ok(removed)
}

/// Every scheduler variant for `inv`, for manual installation.
pub fn render_all(inv: &Invocation) -> String {
    let rule = |title: &str| format!("── {title} {}\n", "─".repeat(60 - title.len().min(56)));
    let mut out = String::new();

    out.push_str(&rule("cron (crontab -e)"));
    out.push_str(&schedule::cron_line(inv));
    out.push_str("\n\n");

    out.push_str(&rule(&format!("systemd: {}.service", paths::SYSTEMD_UNIT)));
    out.push_str(&schedule::systemd_service(inv));
    out.push('\n');
    out.push_str(&rule(&format!("systemd: {}.timer", paths::SYSTEMD_UNIT)));
    out.push_str(&schedule::systemd_timer(inv));
    out.push_str(&format!(
        "\n# systemctl --user daemon-reload && systemctl --user enable --now {}.timer\n\n",
        paths::SYSTEMD_UNIT
    ));

    out.push_str(&rule(&format!("launchd: {}.plist", paths::LAUNCHD_LABEL)));
    out.push_str(&launchd::generate_plist(inv));
    out.push('\n');

    out.push_str(&rule("Windows Task Scheduler"));
    out.push_str("schtasks ");
    out.push_str(&schedule::schtasks_create_args(inv).join(" "));
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_all_lists_every_backend() {
        let inv = Invocation::new(Path::new("/home/t"), "/bin/shelf", DailyTime::default());
        let text = render_all(&inv);
        for needle in [
            "0 9 * * *",
            "[Service]",
            "OnCalendar=*-*-* 09:00:00",
            "StartCalendarInterval",
            "schtasks /create",
        ] {
            assert!(text.contains(needle), "missing {needle}");
        }
    }

    #[test]
    fn current_platform_is_known_on_test_hosts() {
        let platform = Platform::current().expect("supported host");
        if cfg!(target_os = "linux") {
            assert_eq!(platform, Platform::Cron);
        }
    }
}
