//! Error types for shelf-sync.

use std::path::PathBuf;

use thiserror::Error;

use shelf_core::ConfigError;

use crate::remote::RemoteError;

/// Errors that end a sync run. Per-file problems never surface here; they are
/// collected into the run's `SyncResult` or scan warnings instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid or incomplete configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The library root is missing or not a directory.
    #[error("library root is not a directory: {path}")]
    ScanRoot { path: PathBuf },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (cache document).
    #[error("cache JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The remote rejected the credential; every later call would fail too.
    #[error("remote authentication failed: {0}")]
    Auth(#[source] RemoteError),

    /// The target repository could not be read or created.
    #[error("cannot access or create remote repository: {0}")]
    Repository(#[source] RemoteError),

    /// The cache could not be written after uploads were attempted.
    #[error("failed to persist cache at {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: Box<SyncError>,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
