//! Windows Task Scheduler registration through `schtasks`.

use std::process::Command;

use crate::error::{io_err, ScheduleError};
use crate::schedule::{schtasks_create_args, schtasks_delete_args, Invocation};

pub fn install(inv: &Invocation) -> Result<(), ScheduleError> {
    schtasks(&schtasks_create_args(inv))
}

pub fn uninstall() -> Result<(), ScheduleError> {
    schtasks(&schtasks_delete_args())
}

fn schtasks(args: &[String]) -> Result<(), ScheduleError> {
    let output = Command::new("schtasks")
        .args(args)
        .output()
        .map_err(|e| io_err("schtasks", e))?;
    if output.status.success() {
        return Ok(());
    }
    Err(ScheduleError::Command {
        program: "schtasks",
        status: output.status.to_string(),
        output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}
