//! Sync orchestrator: one run of scan, plan, upload, persist.
//!
//! ```text
//! INIT → SCAN → PLAN → UPLOAD(1..N) → PERSIST → DONE
//!   └──────────┴──────┴──────────────┴─────────→ FAILED
//! ```
//!
//! The cache is only advanced for files whose remote write was confirmed,
//! and it is written once, after every upload has been attempted.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;

use shelf_core::config::COMMIT_DATE_FORMAT;
use shelf_core::{
    FailedFile, FailureKind, FileRecord, PlanEntry, RepoPath, ScanWarning, SyncConfig, SyncPlan,
    SyncResult, SyncedFile, UploadAction,
};

use crate::cache::{fingerprint_of, ChangeCache, LoadStatus};
use crate::error::SyncError;
use crate::remote::{RemoteError, RemoteRepository};
use crate::retry::with_retry;
use crate::scanner::{ScanRules, Scanner};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Init,
    Scan,
    Plan,
    /// Uploading file `index` (1-based) of `total`.
    Upload { index: usize, total: usize },
    Persist,
    Done,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Init => write!(f, "init"),
            RunPhase::Scan => write!(f, "scan"),
            RunPhase::Plan => write!(f, "plan"),
            RunPhase::Upload { index, total } => write!(f, "upload {index}/{total}"),
            RunPhase::Persist => write!(f, "persist"),
            RunPhase::Done => write!(f, "done"),
            RunPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Output of the read-only half of a run.
#[derive(Debug, Clone)]
pub struct PlanReport {
    pub plan: SyncPlan,
    pub warnings: Vec<ScanWarning>,
    /// Set when the cache on disk could not be used.
    pub cache_corrupt: bool,
}

/// Output of a full run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub plan: SyncPlan,
    pub warnings: Vec<ScanWarning>,
    pub cache_corrupt: bool,
    pub result: SyncResult,
    /// The remote repository did not exist and was created by this run.
    pub repository_created: bool,
}

/// Per-file upload outcome, accumulated into [`SyncResult`].
enum UploadOutcome {
    Synced(UploadAction),
    Failed(FailureKind, String),
    /// The credential was rejected; the run cannot continue.
    Fatal(RemoteError),
}

type Sleeper<'a> = Box<dyn FnMut(Duration) + 'a>;

pub struct Orchestrator<'a> {
    config: &'a SyncConfig,
    root: PathBuf,
    cache_path: PathBuf,
    remote: &'a dyn RemoteRepository,
    cancel: Option<Arc<AtomicBool>>,
    sleep: Sleeper<'a>,
    phase: RunPhase,
}

impl<'a> Orchestrator<'a> {
    /// `root` is the resolved library directory; `cache_path` the cache document.
    pub fn new(
        config: &'a SyncConfig,
        root: impl Into<PathBuf>,
        cache_path: impl Into<PathBuf>,
        remote: &'a dyn RemoteRepository,
    ) -> Self {
        Self {
            config,
            root: root.into(),
            cache_path: cache_path.into(),
            remote,
            cancel: None,
            sleep: Box::new(std::thread::sleep),
            phase: RunPhase::Init,
        }
    }

    /// Stop before the next file once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Replace the backoff sleep (tests record delays instead of waiting).
    pub fn with_sleeper(mut self, sleep: impl FnMut(Duration) + 'a) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Dry run: INIT → SCAN → PLAN. No remote calls, no cache writes.
    pub fn plan(&mut self) -> Result<PlanReport, SyncError> {
        self.phase = RunPhase::Init;
        let cache = ChangeCache::load(&self.cache_path);
        let (plan, warnings) = self.scan_and_plan(&cache).inspect_err(|_| self.fail())?;

        for entry in &plan.entries {
            match entry {
                PlanEntry::Create(r) => tracing::info!("[dry-run] would create: {}", r.path),
                PlanEntry::Update(r) => tracing::info!("[dry-run] would update: {}", r.path),
                PlanEntry::Unchanged(p) => tracing::info!("[dry-run] unchanged: {p}"),
            }
        }
        tracing::info!(
            "[dry-run] plan: {} to create, {} to update, {} unchanged, {} skipped",
            plan.to_create().count(),
            plan.to_update().count(),
            plan.unchanged().count(),
            warnings.len(),
        );

        self.phase = RunPhase::Done;
        Ok(PlanReport {
            plan,
            warnings,
            cache_corrupt: matches!(cache.status(), LoadStatus::Corrupt(_)),
        })
    }

    /// Full run. Per-file failures land in `result.failed`; only fatal errors
    /// return `Err`.
    pub fn run(&mut self) -> Result<SyncReport, SyncError> {
        self.phase = RunPhase::Init;
        let mut cache = ChangeCache::load(&self.cache_path);
        let cache_corrupt = matches!(cache.status(), LoadStatus::Corrupt(_));

        let repository_created = self.ensure_repository().inspect_err(|_| self.fail())?;
        let (plan, warnings) = self.scan_and_plan(&cache).inspect_err(|_| self.fail())?;

        let result = match self.upload(&plan, &mut cache) {
            Ok(result) => result,
            Err(err) => {
                // Keep what was confirmed before the credential was rejected.
                self.phase = RunPhase::Persist;
                if let Err(persist) = cache.save() {
                    tracing::error!("failed to persist cache after abort: {persist}");
                }
                self.fail();
                return Err(err);
            }
        };

        self.phase = RunPhase::Persist;
        cache.save().map_err(|e| {
            self.fail();
            SyncError::Persist {
                path: self.cache_path.clone(),
                source: Box::new(e),
            }
        })?;

        tracing::info!(
            "sync complete: {} created, {} updated, {} unchanged, {} failed, {} skipped",
            result.count(UploadAction::Created),
            result.count(UploadAction::Updated),
            plan.unchanged().count(),
            result.failed.len(),
            warnings.len(),
        );

        self.phase = RunPhase::Done;
        Ok(SyncReport {
            plan,
            warnings,
            cache_corrupt,
            result,
            repository_created,
        })
    }

    fn fail(&mut self) {
        self.phase = RunPhase::Failed;
    }

    fn ensure_repository(&mut self) -> Result<bool, SyncError> {
        let remote = self.remote;
        let created = with_retry(
            &self.config.retry,
            "ensure repository",
            &mut *self.sleep,
            || remote.ensure_repository(),
        )
        .map_err(|err| match err {
            RemoteError::Auth(_) => SyncError::Auth(err),
            other => SyncError::Repository(other),
        })?;
        if created {
            tracing::info!(
                "created remote repository {}/{}",
                self.config.owner,
                self.config.repo
            );
        }
        Ok(created)
    }

    fn scan_and_plan(
        &mut self,
        cache: &ChangeCache,
    ) -> Result<(SyncPlan, Vec<ScanWarning>), SyncError> {
        self.phase = RunPhase::Scan;
        let scanner = Scanner::new(&self.root, ScanRules::from_config(self.config))?;
        let (records, warnings) = scanner.scan();

        self.phase = RunPhase::Plan;
        Ok((build_plan(cache, records), warnings))
    }

    fn upload(
        &mut self,
        plan: &SyncPlan,
        cache: &mut ChangeCache,
    ) -> Result<SyncResult, SyncError> {
        let date = Local::now().format(COMMIT_DATE_FORMAT).to_string();
        let total = plan.pending();
        let mut result = SyncResult::default();
        let mut index = 0;

        for entry in &plan.entries {
            let (record, planned) = match entry {
                PlanEntry::Create(r) => (r, UploadAction::Created),
                PlanEntry::Update(r) => (r, UploadAction::Updated),
                PlanEntry::Unchanged(path) => {
                    tracing::info!("unchanged: {path}");
                    continue;
                }
            };

            if self.cancelled() {
                result.not_attempted.push(record.path.clone());
                continue;
            }

            index += 1;
            self.phase = RunPhase::Upload { index, total };

            match self.upload_one(record, planned, &date, cache) {
                UploadOutcome::Synced(action) => {
                    tracing::info!("{action}: {}", record.path);
                    result.succeeded.push(SyncedFile {
                        path: record.path.clone(),
                        action,
                    });
                }
                UploadOutcome::Failed(kind, message) => {
                    tracing::warn!("failed: {} ({kind}): {message}", record.path);
                    result.failed.push(FailedFile {
                        path: record.path.clone(),
                        kind,
                        message,
                    });
                }
                UploadOutcome::Fatal(err) => {
                    tracing::error!("aborting run at {}: {err}", record.path);
                    return Err(SyncError::Auth(err));
                }
            }
        }

        if !result.not_attempted.is_empty() {
            tracing::warn!(
                "run cancelled; {} file(s) left for the next run",
                result.not_attempted.len()
            );
        }
        Ok(result)
    }

    fn upload_one(
        &mut self,
        record: &FileRecord,
        planned: UploadAction,
        date: &str,
        cache: &mut ChangeCache,
    ) -> UploadOutcome {
        // Read again: the committed fingerprint must describe the bytes sent.
        let content = match std::fs::read(&record.absolute_path) {
            Ok(content) => content,
            Err(err) => return UploadOutcome::Failed(FailureKind::Read, err.to_string()),
        };
        let fingerprint = fingerprint_of(&content);
        let message = self.config.commit_message(date, record.path.as_str());
        let remote = self.remote;
        let retry = &self.config.retry;

        // Creates read remote state too: a path that already exists remotely
        // (lost cache, upload never persisted) is overwritten, not stuck.
        let label = format!("get {}", record.path);
        let previous = match with_retry(retry, &label, &mut *self.sleep, || {
            remote.current_hash(&record.path)
        }) {
            Ok(hash) => hash,
            Err(err) => return remote_failure(err),
        };
        let action = match (planned, &previous) {
            (UploadAction::Updated, None) => {
                tracing::info!("{} missing remotely; recreating", record.path);
                UploadAction::Created
            }
            _ => planned,
        };

        let label = format!("put {}", record.path);
        match with_retry(retry, &label, &mut *self.sleep, || {
            remote.put_file(&record.path, &content, previous.as_deref(), &message)
        }) {
            Ok(_) => {
                cache.commit(record.path.clone(), fingerprint);
                UploadOutcome::Synced(action)
            }
            Err(err) => remote_failure(err),
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

fn remote_failure(err: RemoteError) -> UploadOutcome {
    match err {
        RemoteError::Auth(_) => UploadOutcome::Fatal(err),
        other => UploadOutcome::Failed(other.kind(), other.to_string()),
    }
}

/// Partition scanned records against the cache, preserving scan order.
pub fn build_plan(cache: &ChangeCache, records: Vec<FileRecord>) -> SyncPlan {
    let entries = records
        .into_iter()
        .map(|record| {
            if !cache.is_changed(&record) {
                PlanEntry::Unchanged(record.path)
            } else if cache.get(&record.path).is_some() {
                PlanEntry::Update(record)
            } else {
                PlanEntry::Create(record)
            }
        })
        .collect();
    SyncPlan { entries }
}

/// Paths of a plan partition, for reporting.
pub fn paths<'p>(records: impl Iterator<Item = &'p FileRecord>) -> Vec<RepoPath> {
    records.map(|r| r.path.clone()).collect()
}
