//! # shelf-sync
//!
//! Change detection and upload orchestration for a local library.
//!
//! [`scanner`] walks the library, [`cache`] decides what changed, and
//! [`orchestrator`] uploads the difference through any [`RemoteRepository`].
//! [`pipeline::run`] is the entrypoint shared by the CLI and scheduled runs.

pub mod cache;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod pipeline;
pub mod remote;
pub mod retry;
pub mod scanner;

pub use cache::{fingerprint_of, ChangeCache, LoadStatus};
pub use error::SyncError;
pub use orchestrator::{Orchestrator, PlanReport, RunPhase, SyncReport};
pub use remote::{RemoteError, RemoteRepository};
pub use scanner::{ScanItem, ScanRules, Scanner};
