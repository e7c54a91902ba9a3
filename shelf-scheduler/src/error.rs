use std::path::PathBuf;

use thiserror::Error;

/// Error surface for schedule installation and log maintenance.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid run time {hour:02}:{minute:02} (expected 00:00 to 23:59)")]
    InvalidTime { hour: u8, minute: u8 },

    #[error("`{program}` failed (status {status}): {output}")]
    Command {
        program: &'static str,
        status: String,
        output: String,
    },

    #[error("scheduling is not supported on {0}")]
    Unsupported(&'static str),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ScheduleError {
    ScheduleError::Io {
        path: path.into(),
        source,
    }
}
