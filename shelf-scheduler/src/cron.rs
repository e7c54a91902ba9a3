//! crontab installation for Linux and other Unix hosts.

use std::io::Write;
use std::process::{Command, Stdio};

use crate::error::{io_err, ScheduleError};
use crate::schedule::{cron_line, merge_crontab, strip_crontab, Invocation};

/// Replace the shelf line in the user's crontab. Returns the installed line.
pub fn install(inv: &Invocation) -> Result<String, ScheduleError> {
    let line = cron_line(inv);
    let current = read_crontab()?;
    write_crontab(&merge_crontab(&current, &line))?;
    Ok(line)
}

/// Drop the shelf line. Returns whether one was present.
pub fn uninstall() -> Result<bool, ScheduleError> {
    let current = read_crontab()?;
    let stripped = strip_crontab(&current);
    if stripped.lines().count() == current.lines().count() {
        return Ok(false);
    }
    write_crontab(&stripped)?;
    Ok(true)
}

fn read_crontab() -> Result<String, ScheduleError> {
    let output = Command::new("crontab")
        .arg("-l")
        .output()
        .map_err(|e| io_err("crontab -l", e))?;
    // Exit status 1 with "no crontab for <user>" just means empty.
    if !output.status.success() {
        return Ok(String::new());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn write_crontab(content: &str) -> Result<(), ScheduleError> {
    let mut child = Command::new("crontab")
        .arg("-")
        .stdin(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| io_err("crontab -", e))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(content.as_bytes())
            .map_err(|e| io_err("crontab -", e))?;
    }
    let output = child
        .wait_with_output()
        .map_err(|e| io_err("crontab -", e))?;
    if output.status.success() {
        return Ok(());
    }
    Err(ScheduleError::Command {
        program: "crontab",
        status: output.status.to_string(),
        output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}
