//! Content scanner: walks the library root and yields candidate files.
//!
//! Traversal is depth-first with entries sorted by file name, so the order is
//! stable across runs. Excluded directory names are pruned before descending.
//! Nothing inside the walk is fatal: unreadable entries, oversized files, and
//! symlink cycles come out as [`ScanItem::Skipped`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use shelf_core::{FileRecord, RepoPath, ScanWarning, ScanWarningKind, SyncConfig};

use crate::cache::fingerprint_file;
use crate::error::SyncError;

/// Include/exclude rules for one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRules {
    /// Lowercase extensions without the leading dot. Empty = allow all.
    extensions: BTreeSet<String>,
    ignore_dirs: BTreeSet<String>,
    max_file_size: u64,
}

impl ScanRules {
    pub fn new<E, D>(extensions: E, ignore_dirs: D, max_file_size: u64) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        let ignore_dirs = ignore_dirs
            .into_iter()
            .map(|d| d.as_ref().trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();
        Self {
            extensions,
            ignore_dirs,
            max_file_size,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            &config.extensions,
            &config.ignore_dirs,
            config.max_file_size_bytes,
        )
    }

    /// Whether a file name passes the extension allow-list.
    pub fn allows_extension(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.contains(&e.to_ascii_lowercase()))
            .unwrap_or(false)
    }

    pub fn is_ignored_dir(&self, name: &str) -> bool {
        self.ignore_dirs.contains(name)
    }
}

/// One scanned entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanItem {
    File(FileRecord),
    Skipped(ScanWarning),
}

/// Walks a library root under a set of [`ScanRules`].
#[derive(Debug, Clone)]
pub struct Scanner {
    root: PathBuf,
    rules: ScanRules,
}

impl Scanner {
    /// Fails only when `root` is not a directory.
    pub fn new(root: impl Into<PathBuf>, rules: ScanRules) -> Result<Self, SyncError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(SyncError::ScanRoot { path: root });
        }
        Ok(Self { root, rules })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily walk the tree. Each file is hashed as it is yielded.
    pub fn iter(&self) -> impl Iterator<Item = ScanItem> + '_ {
        let rules = &self.rules;
        WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |e| {
                // Prune excluded directories by name at any depth (never the root).
                !(e.depth() > 0
                    && e.file_type().is_dir()
                    && e.file_name().to_str().is_some_and(|n| rules.is_ignored_dir(n)))
            })
            .filter_map(move |entry| match entry {
                Ok(entry) if entry.file_type().is_file() => self.record(entry.path()),
                Ok(_) => None,
                Err(err) => Some(ScanItem::Skipped(walk_warning(&self.root, err))),
            })
    }

    /// Walk everything, splitting records from warnings.
    pub fn scan(&self) -> (Vec<FileRecord>, Vec<ScanWarning>) {
        let mut records = Vec::new();
        let mut warnings = Vec::new();
        for item in self.iter() {
            match item {
                ScanItem::File(record) => records.push(record),
                ScanItem::Skipped(warning) => {
                    tracing::warn!(
                        "skipping {} ({}): {}",
                        warning.path.display(),
                        warning.kind,
                        warning.detail
                    );
                    warnings.push(warning);
                }
            }
        }
        (records, warnings)
    }

    fn record(&self, path: &Path) -> Option<ScanItem> {
        if !self.rules.allows_extension(path) {
            return None;
        }

        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let Some(repo_path) = RepoPath::from_relative(relative) else {
            return Some(skipped(
                path,
                ScanWarningKind::Unreadable,
                "file name is not valid UTF-8".to_string(),
            ));
        };

        let size = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(err) => return Some(skipped(path, ScanWarningKind::Unreadable, err.to_string())),
        };
        if size > self.rules.max_file_size {
            return Some(skipped(
                path,
                ScanWarningKind::Oversized,
                format!("{size} bytes exceeds limit of {}", self.rules.max_file_size),
            ));
        }

        let fingerprint = match fingerprint_file(path) {
            Ok(fp) => fp,
            Err(err) => return Some(skipped(path, ScanWarningKind::Unreadable, err.to_string())),
        };

        Some(ScanItem::File(FileRecord {
            path: repo_path,
            absolute_path: path.to_path_buf(),
            size,
            fingerprint,
        }))
    }
}

fn skipped(path: &Path, kind: ScanWarningKind, detail: String) -> ScanItem {
    ScanItem::Skipped(ScanWarning {
        path: path.to_path_buf(),
        kind,
        detail,
    })
}

fn walk_warning(root: &Path, err: walkdir::Error) -> ScanWarning {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    let kind = if err.loop_ancestor().is_some() {
        ScanWarningKind::SymlinkCycle
    } else {
        ScanWarningKind::Unreadable
    };
    ScanWarning {
        path,
        kind,
        detail: err.to_string(),
    }
}
