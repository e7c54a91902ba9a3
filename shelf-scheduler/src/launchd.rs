use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{io_err, ScheduleError};
use crate::paths::{launch_agents_dir, launchd_plist_path, logs_dir, LAUNCHD_LABEL};
use crate::schedule::Invocation;

/// Generate a launchd agent that runs `shelf run` once a day.
pub fn generate_plist(inv: &Invocation) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
  <key>Label</key>
  <string>{label}</string>
  <key>ProgramArguments</key>
  <array>
    <string>{binary}</string>
    <string>run</string>
  </array>
  <key>StartCalendarInterval</key>
  <dict>
    <key>Hour</key>
    <integer>{hour}</integer>
    <key>Minute</key>
    <integer>{minute}</integer>
  </dict>
  <key>RunAtLoad</key>
  <false/>
  <key>StandardOutPath</key>
  <string>/dev/null</string>
  <key>StandardErrorPath</key>
  <string>{stderr}</string>
</dict>
</plist>
"#,
        label = LAUNCHD_LABEL,
        binary = xml_escape(&inv.binary.display().to_string()),
        hour = inv.time.hour(),
        minute = inv.time.minute(),
        stderr = xml_escape(&inv.err_log.display().to_string()),
    )
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Write the agent plist and load it for the current user.
pub fn install(home: &Path, inv: &Invocation) -> Result<PathBuf, ScheduleError> {
    ensure_macos()?;

    for dir in [launch_agents_dir(home), logs_dir(home)] {
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
    }

    let plist = launchd_plist_path(home);
    fs::write(&plist, generate_plist(inv)).map_err(|e| io_err(&plist, e))?;

    let domain = launchctl_domain()?;
    let service = format!("{domain}/{LAUNCHD_LABEL}");

    // A previous version may still be loaded.
    let _ = run_launchctl(&["bootout", &service], true);
    run_launchctl(&["bootstrap", &domain, &plist.display().to_string()], false)?;

    Ok(plist)
}

/// Unload the agent and remove its plist. Missing agents are not an error.
pub fn uninstall(home: &Path) -> Result<bool, ScheduleError> {
    ensure_macos()?;

    let plist = launchd_plist_path(home);
    if !plist.exists() {
        return Ok(false);
    }
    let domain = launchctl_domain()?;
    let _ = run_launchctl(&["bootout", &format!("{domain}/{LAUNCHD_LABEL}")], true);
    fs::remove_file(&plist).map_err(|e| io_err(&plist, e))?;
    Ok(true)
}

#[cfg(target_os = "macos")]
fn ensure_macos() -> Result<(), ScheduleError> {
    Ok(())
}

#[cfg(not(target_os = "macos"))]
fn ensure_macos() -> Result<(), ScheduleError> {
    Err(ScheduleError::Unsupported("launchd outside macOS"))
}

fn run_launchctl(args: &[&str], ignore_failure: bool) -> Result<(), ScheduleError> {
    let output = Command::new("launchctl")
        .args(args)
        .output()
        .map_err(|e| io_err("launchctl", e))?;

    if output.status.success() || ignore_failure {
        return Ok(());
    }

    Err(ScheduleError::Command {
        program: "launchctl",
        status: output.status.to_string(),
        output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

fn launchctl_domain() -> Result<String, ScheduleError> {
    let output = Command::new("id")
        .arg("-u")
        .output()
        .map_err(|e| io_err("id -u", e))?;
    let uid = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !output.status.success() || uid.is_empty() {
        return Err(ScheduleError::Command {
            program: "id",
            status: output.status.to_string(),
            output: "could not resolve current uid".to_string(),
        });
    }
    Ok(format!("gui/{uid}"))
}
