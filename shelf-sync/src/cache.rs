//! Change cache: SHA-256 fingerprints of the last confirmed upload per path.
//!
//! Persists a JSON document (default `~/.shelf/cache.json`):
//!
//! ```json
//! { "version": 1, "synced_at": "…", "files": { "a.py": { "fingerprint": "…", "synced_at": "…" } } }
//! ```
//!
//! Loading never fails: a missing or corrupt document yields an empty cache,
//! which means "sync everything". Saves use the `.tmp` + rename pattern so a
//! crash mid-write leaves the previous document intact.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use shelf_core::{CacheEntry, CacheMap, FileRecord, Fingerprint, RepoPath};

use crate::error::{io_err, SyncError};

pub const CACHE_VERSION: u32 = 1;

/// On-disk cache payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheFile {
    pub version: u32,
    pub synced_at: DateTime<Utc>,
    pub files: CacheMap,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CacheCompat {
    Structured(CacheStructuredCompat),
    /// Flat `{ "path": "digest" }` map written by earlier releases.
    Legacy(std::collections::BTreeMap<String, String>),
}

#[derive(Debug, Deserialize)]
struct CacheStructuredCompat {
    #[allow(dead_code)]
    pub version: Option<u32>,
    pub synced_at: Option<DateTime<Utc>>,
    pub files: CacheMap,
}

/// How the in-memory cache was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// No document on disk yet.
    Missing,
    Loaded,
    /// A legacy flat map was read and upgraded in memory.
    Migrated,
    /// The document could not be read or parsed; the cache starts empty.
    Corrupt(String),
}

// ---------------------------------------------------------------------------
// Fingerprints
// ---------------------------------------------------------------------------

/// SHA-256 of `content`, hex-encoded.
pub fn fingerprint_of(content: &[u8]) -> Fingerprint {
    let mut h = Sha256::new();
    h.update(content);
    Fingerprint(hex::encode(h.finalize()))
}

/// Streaming variant of [`fingerprint_of`] for files on disk.
pub fn fingerprint_file(path: &Path) -> io::Result<Fingerprint> {
    let mut file = File::open(path)?;
    let mut h = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        h.update(&buf[..n]);
    }
    Ok(Fingerprint(hex::encode(h.finalize())))
}

// ---------------------------------------------------------------------------
// ChangeCache
// ---------------------------------------------------------------------------

/// The single source of truth for "was this content already synced".
#[derive(Debug, Clone)]
pub struct ChangeCache {
    path: PathBuf,
    synced_at: Option<DateTime<Utc>>,
    files: CacheMap,
    status: LoadStatus,
}

impl ChangeCache {
    /// An empty cache that will persist to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            synced_at: None,
            files: CacheMap::new(),
            status: LoadStatus::Missing,
        }
    }

    /// Load the cache at `path`, degrading to empty on any problem.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Self::empty(path),
            Err(err) => return Self::corrupt(path, format!("unreadable: {err}")),
        };

        match serde_json::from_str::<CacheCompat>(&contents) {
            Ok(CacheCompat::Structured(doc)) => Self {
                path,
                synced_at: doc.synced_at,
                files: doc.files,
                status: LoadStatus::Loaded,
            },
            Ok(CacheCompat::Legacy(flat)) => {
                let now = Utc::now();
                let files = flat
                    .into_iter()
                    .map(|(key, digest)| {
                        (
                            RepoPath(key),
                            CacheEntry {
                                fingerprint: Fingerprint(digest),
                                synced_at: now,
                            },
                        )
                    })
                    .collect();
                tracing::info!("migrated legacy cache at {}", path.display());
                Self {
                    path,
                    synced_at: None,
                    files,
                    status: LoadStatus::Migrated,
                }
            }
            Err(err) => Self::corrupt(path, err.to_string()),
        }
    }

    fn corrupt(path: PathBuf, reason: String) -> Self {
        tracing::warn!(
            "cache at {} is corrupt ({reason}); treating every file as new",
            path.display()
        );
        Self {
            status: LoadStatus::Corrupt(reason),
            ..Self::empty(path)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    /// Time of the last successful persist, if any.
    pub fn synced_at(&self) -> Option<DateTime<Utc>> {
        self.synced_at
    }

    pub fn entries(&self) -> &CacheMap {
        &self.files
    }

    pub fn get(&self, path: &RepoPath) -> Option<&CacheEntry> {
        self.files.get(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// True when the path has never been synced or its content moved on.
    pub fn is_changed(&self, record: &FileRecord) -> bool {
        match self.files.get(&record.path) {
            Some(entry) => entry.fingerprint != record.fingerprint,
            None => true,
        }
    }

    /// Record a confirmed remote write. Only call after the remote accepted it.
    pub fn commit(&mut self, path: RepoPath, fingerprint: Fingerprint) {
        self.files.insert(
            path,
            CacheEntry {
                fingerprint,
                synced_at: Utc::now(),
            },
        );
    }

    /// Persist the full mapping atomically.
    ///
    /// Writes `<file>.tmp` in the same directory, then renames over the target.
    pub fn save(&mut self) -> Result<(), SyncError> {
        let Some(dir) = self.path.parent() else {
            return Err(io_err(
                &self.path,
                io::Error::other("invalid cache path"),
            ));
        };
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }

        let synced_at = Utc::now();
        let doc = CacheFile {
            version: CACHE_VERSION,
            synced_at,
            files: self.files.clone(),
        };
        let json = serde_json::to_string_pretty(&doc)?;

        let tmp = tmp_path(&self.path);
        std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&self.path, e));
        }

        self.synced_at = Some(synced_at);
        Ok(())
    }
}

/// `<path>.tmp`, a sibling of the cache document.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(path: &str, content: &[u8]) -> FileRecord {
        FileRecord {
            path: RepoPath::from(path),
            absolute_path: PathBuf::from(path),
            size: content.len() as u64,
            fingerprint: fingerprint_of(content),
        }
    }

    #[test]
    fn fingerprint_is_stable_and_byte_sensitive() {
        assert_eq!(fingerprint_of(b"hello"), fingerprint_of(b"hello"));
        assert_ne!(fingerprint_of(b"hello"), fingerprint_of(b"hellp"));
        assert_ne!(fingerprint_of(b"a\n"), fingerprint_of(b"a\r\n"));
        assert_eq!(fingerprint_of(b"").0.len(), 64);
        assert_eq!(
            fingerprint_of(b"").0,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn fingerprint_file_matches_in_memory_digest() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("big.bin");
        let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &content).unwrap();
        assert_eq!(fingerprint_file(&path).unwrap(), fingerprint_of(&content));
    }

    #[test]
    fn empty_cache_when_file_missing() {
        let tmp = TempDir::new().unwrap();
        let cache = ChangeCache::load(tmp.path().join("cache.json"));
        assert!(cache.is_empty());
        assert_eq!(cache.status(), &LoadStatus::Missing);
        assert!(cache.synced_at().is_none());
    }

    #[test]
    fn is_changed_tracks_commits() {
        let tmp = TempDir::new().unwrap();
        let mut cache = ChangeCache::empty(tmp.path().join("cache.json"));
        let v1 = record("a.py", b"v1");
        assert!(cache.is_changed(&v1), "unknown path counts as changed");

        cache.commit(v1.path.clone(), v1.fingerprint.clone());
        assert!(!cache.is_changed(&v1));

        let v2 = record("a.py", b"v2");
        assert!(cache.is_changed(&v2));
    }

    #[test]
    fn roundtrip_save_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state").join("cache.json");
        let mut cache = ChangeCache::empty(&path);
        cache.commit(RepoPath::from("a.py"), fingerprint_of(b"a"));
        cache.commit(RepoPath::from("dir/b.rs"), fingerprint_of(b"b"));
        cache.save().unwrap();

        let loaded = ChangeCache::load(&path);
        assert_eq!(loaded.status(), &LoadStatus::Loaded);
        assert_eq!(loaded.entries(), cache.entries());
        assert_eq!(loaded.synced_at(), cache.synced_at());
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cache.json");
        let mut cache = ChangeCache::empty(&path);
        cache.save().unwrap();
        assert!(path.exists());
        assert!(
            !tmp_path(&path).exists(),
            "tmp file should be removed after atomic rename"
        );
    }

    #[test]
    fn corrupt_document_degrades_to_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cache.json");
        std::fs::write(&path, "{ not json").unwrap();

        let cache = ChangeCache::load(&path);
        assert!(cache.is_empty());
        assert!(matches!(cache.status(), LoadStatus::Corrupt(_)));
    }

    #[test]
    fn wrong_shape_counts_as_corrupt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cache.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(matches!(
            ChangeCache::load(&path).status(),
            LoadStatus::Corrupt(_)
        ));
    }

    #[test]
    fn load_legacy_flat_map_migrates_entries() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cache.json");
        std::fs::write(
            &path,
            r#"{"a.py":"0cc175b9c0f1b6a831c399e269772661","dir/b.rs":"92eb5ffee6ae2fec3ad71c777531578f"}"#,
        )
        .unwrap();

        let before = Utc::now();
        let cache = ChangeCache::load(&path);
        let after = Utc::now();

        assert_eq!(cache.status(), &LoadStatus::Migrated);
        assert_eq!(cache.len(), 2);
        let entry = cache.get(&RepoPath::from("a.py")).expect("entry");
        assert_eq!(entry.fingerprint.0, "0cc175b9c0f1b6a831c399e269772661");
        assert!(entry.synced_at >= before && entry.synced_at <= after);

        // A digest from another algorithm never matches, so the file re-syncs.
        assert!(cache.is_changed(&record("a.py", b"a")));
    }

    #[test]
    fn structured_without_synced_at_is_accepted() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cache.json");
        std::fs::write(
            &path,
            r#"{"files":{"a.py":{"fingerprint":"ff","synced_at":"2026-01-01T00:00:00Z"}}}"#,
        )
        .unwrap();

        let cache = ChangeCache::load(&path);
        assert_eq!(cache.status(), &LoadStatus::Loaded);
        assert!(cache.synced_at().is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    #[cfg(unix)]
    fn failed_save_leaves_previous_document() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("locked");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cache.json");

        let mut cache = ChangeCache::empty(&path);
        cache.commit(RepoPath::from("a.py"), fingerprint_of(b"a"));
        cache.save().unwrap();
        let original = std::fs::read(&path).unwrap();

        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o555)).unwrap();
        cache.commit(RepoPath::from("b.py"), fingerprint_of(b"b"));
        let result = cache.save();
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o755)).unwrap();

        // Root ignores directory permissions; only assert when the write was refused.
        if result.is_err() {
            assert_eq!(std::fs::read(&path).unwrap(), original);
            assert!(!tmp_path(&path).exists());
        }
    }
}
