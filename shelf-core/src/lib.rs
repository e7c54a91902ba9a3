//! Shelf core library: domain types, configuration persistence, errors.
//!
//! - [`types`]: newtypes and the scan / plan / result structs
//! - [`config`]: [`SyncConfig`] load / save / validate
//! - [`paths`]: `~/.shelf/` layout
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use config::{RetryConfig, SyncConfig};
pub use error::ConfigError;
pub use types::{
    CacheEntry, CacheMap, FailedFile, FailureKind, FileRecord, Fingerprint, PlanEntry, RepoPath,
    ScanWarning, ScanWarningKind, SyncPlan, SyncResult, SyncedFile, UploadAction,
};
