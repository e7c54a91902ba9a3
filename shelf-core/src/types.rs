//! Domain types shared by the scanner, cache, and orchestrator.
//!
//! Filesystem locations use `PathBuf`; repository-relative locations use
//! [`RepoPath`], which is always `/`-separated regardless of platform.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A file location relative to the library root, `/`-separated.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RepoPath(pub String);

impl RepoPath {
    /// Build a repository path from a relative filesystem path.
    ///
    /// Components are joined with `/` so Windows paths map onto the same keys.
    /// Returns `None` when a component is not valid UTF-8: a lossy mapping
    /// could give two distinct files the same key.
    pub fn from_relative(relative: &Path) -> Option<Self> {
        let parts = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?;
        Some(Self(parts.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RepoPath {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RepoPath {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Hex-encoded content digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Scan output
// ---------------------------------------------------------------------------

/// A file discovered by one scan pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: RepoPath,
    pub absolute_path: PathBuf,
    pub size: u64,
    pub fingerprint: Fingerprint,
}

/// Why a scanned entry was left out of the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanWarningKind {
    Unreadable,
    Oversized,
    SymlinkCycle,
}

impl fmt::Display for ScanWarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanWarningKind::Unreadable => write!(f, "unreadable"),
            ScanWarningKind::Oversized => write!(f, "oversized"),
            ScanWarningKind::SymlinkCycle => write!(f, "symlink cycle"),
        }
    }
}

/// A skipped entry, recorded instead of aborting the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanWarning {
    pub path: PathBuf,
    pub kind: ScanWarningKind,
    pub detail: String,
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// Last confirmed upload of a single path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub synced_at: DateTime<Utc>,
}

/// In-memory cache mapping, sorted by path so the persisted document is stable.
pub type CacheMap = BTreeMap<RepoPath, CacheEntry>;

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Classification of one scanned file against the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanEntry {
    /// No cache entry exists for the path.
    Create(FileRecord),
    /// A cache entry exists with a different fingerprint.
    Update(FileRecord),
    /// The cached fingerprint matches.
    Unchanged(RepoPath),
}

impl PlanEntry {
    pub fn path(&self) -> &RepoPath {
        match self {
            PlanEntry::Create(record) | PlanEntry::Update(record) => &record.path,
            PlanEntry::Unchanged(path) => path,
        }
    }
}

/// Partition of one run's candidates, kept in scan order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub entries: Vec<PlanEntry>,
}

impl SyncPlan {
    pub fn to_create(&self) -> impl Iterator<Item = &FileRecord> {
        self.entries.iter().filter_map(|e| match e {
            PlanEntry::Create(record) => Some(record),
            _ => None,
        })
    }

    pub fn to_update(&self) -> impl Iterator<Item = &FileRecord> {
        self.entries.iter().filter_map(|e| match e {
            PlanEntry::Update(record) => Some(record),
            _ => None,
        })
    }

    pub fn unchanged(&self) -> impl Iterator<Item = &RepoPath> {
        self.entries.iter().filter_map(|e| match e {
            PlanEntry::Unchanged(path) => Some(path),
            _ => None,
        })
    }

    /// Number of files that need an upload.
    pub fn pending(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| !matches!(e, PlanEntry::Unchanged(_)))
            .count()
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Remote write that was performed for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadAction {
    Created,
    Updated,
}

impl fmt::Display for UploadAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadAction::Created => write!(f, "created"),
            UploadAction::Updated => write!(f, "updated"),
        }
    }
}

/// Category of a per-file failure, surfaced in the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Local content could not be read at upload time.
    Read,
    Conflict,
    RateLimited,
    Timeout,
    Transport,
    NotFound,
    Auth,
    Api,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Read => "read",
            FailureKind::Conflict => "conflict",
            FailureKind::RateLimited => "rate-limited",
            FailureKind::Timeout => "timeout",
            FailureKind::Transport => "transport",
            FailureKind::NotFound => "not-found",
            FailureKind::Auth => "auth",
            FailureKind::Api => "api",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedFile {
    pub path: RepoPath,
    pub action: UploadAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    pub path: RepoPath,
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome of the upload phase of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    pub succeeded: Vec<SyncedFile>,
    pub failed: Vec<FailedFile>,
    /// Files left for the next run because the run was cancelled.
    pub not_attempted: Vec<RepoPath>,
}

impl SyncResult {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn count(&self, action: UploadAction) -> usize {
        self.succeeded.iter().filter(|s| s.action == action).count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str) -> FileRecord {
        FileRecord {
            path: RepoPath::from(path),
            absolute_path: PathBuf::from("/lib").join(path),
            size: 1,
            fingerprint: Fingerprint::from("00"),
        }
    }

    #[test]
    fn repo_path_uses_forward_slashes() {
        let rel = Path::new("algos").join("sort").join("quick.py");
        assert_eq!(
            RepoPath::from_relative(&rel).unwrap().as_str(),
            "algos/sort/quick.py"
        );
    }

    #[test]
    fn plan_partitions_preserve_scan_order() {
        let plan = SyncPlan {
            entries: vec![
                PlanEntry::Update(record("z.py")),
                PlanEntry::Unchanged(RepoPath::from("m.py")),
                PlanEntry::Create(record("a.py")),
                PlanEntry::Create(record("b.py")),
            ],
        };
        let created: Vec<_> = plan.to_create().map(|r| r.path.as_str()).collect();
        assert_eq!(created, vec!["a.py", "b.py"]);
        assert_eq!(plan.to_update().count(), 1);
        assert_eq!(plan.unchanged().count(), 1);
        assert_eq!(plan.pending(), 3);
        assert_eq!(plan.entries[0].path().as_str(), "z.py");
    }

    #[test]
    fn result_counts_by_action() {
        let result = SyncResult {
            succeeded: vec![
                SyncedFile {
                    path: RepoPath::from("a"),
                    action: UploadAction::Created,
                },
                SyncedFile {
                    path: RepoPath::from("b"),
                    action: UploadAction::Updated,
                },
            ],
            failed: vec![],
            not_attempted: vec![],
        };
        assert!(result.is_success());
        assert_eq!(result.count(UploadAction::Created), 1);
        assert_eq!(result.count(UploadAction::Updated), 1);
    }

    #[test]
    fn failure_kind_display() {
        assert_eq!(FailureKind::RateLimited.to_string(), "rate-limited");
        assert_eq!(ScanWarningKind::SymlinkCycle.to_string(), "symlink cycle");
    }
}
