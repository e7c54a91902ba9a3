//! Daily-run descriptions rendered for each platform scheduler.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ScheduleError;
use crate::paths::{scheduler_err_log_path, CRON_MARKER, SYSTEMD_UNIT, WINDOWS_TASK_NAME};

pub const DEFAULT_HOUR: u8 = 9;
pub const DEFAULT_MINUTE: u8 = 0;

/// Local wall-clock time of the daily run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTime {
    hour: u8,
    minute: u8,
}

impl DailyTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, ScheduleError> {
        if hour > 23 || minute > 59 {
            return Err(ScheduleError::InvalidTime { hour, minute });
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl Default for DailyTime {
    fn default() -> Self {
        Self {
            hour: DEFAULT_HOUR,
            minute: DEFAULT_MINUTE,
        }
    }
}

impl fmt::Display for DailyTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// What the scheduler runs: `<binary> run`, stderr appended to `err_log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub binary: PathBuf,
    pub err_log: PathBuf,
    pub time: DailyTime,
}

impl Invocation {
    pub fn new(home: &Path, binary: impl Into<PathBuf>, time: DailyTime) -> Self {
        Self {
            binary: binary.into(),
            err_log: scheduler_err_log_path(home),
            time,
        }
    }
}

// ---------------------------------------------------------------------------
// cron
// ---------------------------------------------------------------------------

pub fn cron_line(inv: &Invocation) -> String {
    format!(
        "{} {} * * * \"{}\" run >/dev/null 2>>\"{}\"  {CRON_MARKER}",
        inv.time.minute,
        inv.time.hour,
        inv.binary.display(),
        inv.err_log.display(),
    )
}

/// Remove any previous shelf entry from `current`.
pub fn strip_crontab(current: &str) -> String {
    let kept: Vec<&str> = current
        .lines()
        .filter(|line| !line.contains(CRON_MARKER))
        .collect();
    if kept.is_empty() {
        String::new()
    } else {
        format!("{}\n", kept.join("\n"))
    }
}

/// Replace (or add) the shelf entry in `current`, keeping every other line.
pub fn merge_crontab(current: &str, line: &str) -> String {
    let mut merged = strip_crontab(current);
    merged.push_str(line);
    merged.push('\n');
    merged
}

// ---------------------------------------------------------------------------
// systemd
// ---------------------------------------------------------------------------

pub fn systemd_service(inv: &Invocation) -> String {
    format!(
        "[Unit]\n\
         Description=Shelf library sync\n\
         \n\
         [Service]\n\
         Type=oneshot\n\
         ExecStart=\"{binary}\" run\n\
         StandardOutput=null\n\
         StandardError=append:{err}\n",
        binary = inv.binary.display(),
        err = inv.err_log.display(),
    )
}

pub fn systemd_timer(inv: &Invocation) -> String {
    format!(
        "[Unit]\n\
         Description=Run shelf library sync daily\n\
         \n\
         [Timer]\n\
         OnCalendar=*-*-* {time}:00\n\
         Persistent=true\n\
         Unit={SYSTEMD_UNIT}.service\n\
         \n\
         [Install]\n\
         WantedBy=timers.target\n",
        time = inv.time,
    )
}

// ---------------------------------------------------------------------------
// Windows Task Scheduler
// ---------------------------------------------------------------------------

pub fn schtasks_create_args(inv: &Invocation) -> Vec<String> {
    vec![
        "/create".to_string(),
        "/f".to_string(),
        "/tn".to_string(),
        WINDOWS_TASK_NAME.to_string(),
        "/tr".to_string(),
        format!("\"{}\" run", inv.binary.display()),
        "/sc".to_string(),
        "daily".to_string(),
        "/st".to_string(),
        inv.time.to_string(),
    ]
}

pub fn schtasks_delete_args() -> Vec<String> {
    vec![
        "/delete".to_string(),
        "/f".to_string(),
        "/tn".to_string(),
        WINDOWS_TASK_NAME.to_string(),
    ]
}
