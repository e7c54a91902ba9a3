//! Size-based rotation of the run log.
//!
//! `sync.log` is rotated once it reaches 10 MiB, keeping at most five
//! copies: `sync.log` → `sync.log.1` → … → `sync.log.5`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Rotate once the live log reaches this size (10 MiB).
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Rotated copies kept next to the live log.
pub const MAX_ROTATED_FILES: usize = 5;

/// Rotate `log_path` when it is at least `max_bytes` long.
///
/// The oldest copy is dropped, each `<name>.<n>` moves to `<name>.<n+1>`,
/// and the live file becomes `<name>.1`. A fresh empty log is left behind.
///
/// Returns `Ok(false)` when no rotation was needed, including when the log
/// does not exist yet.
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, max_files: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if size < max_bytes || max_files == 0 {
        return Ok(false);
    }

    let oldest = numbered_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for n in (1..max_files).rev() {
        let src = numbered_path(log_path, n);
        if src.exists() {
            fs::rename(&src, numbered_path(log_path, n + 1))?;
        }
    }
    fs::rename(log_path, numbered_path(log_path, 1))?;

    fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(log_path)?;
    Ok(true)
}

/// Rotate `~/.shelf/logs/sync.log` with the default limits. Failures are
/// logged; a run never aborts because its log could not be rotated.
pub fn rotate_sync_log(home: &Path) -> bool {
    let log_path = crate::paths::sync_log_path(home);
    match rotate_if_needed(&log_path, MAX_LOG_BYTES, MAX_ROTATED_FILES) {
        Ok(rotated) => {
            if rotated {
                tracing::info!(path = %log_path.display(), "log file rotated");
            }
            rotated
        }
        Err(err) => {
            tracing::warn!(path = %log_path.display(), error = %err, "log rotation failed");
            false
        }
    }
}

/// `sync.log` + 2 → `sync.log.2`.
pub fn numbered_path(base: &Path, n: usize) -> PathBuf {
    let name = base
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(shelf_core::paths::SYNC_LOG);
    base.with_file_name(format!("{name}.{n}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fill(path: &Path, len: u64) {
        let file = fs::File::create(path).unwrap();
        file.set_len(len).unwrap();
    }

    #[test]
    fn small_log_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("sync.log");
        fill(&log, 1024);
        assert!(!rotate_if_needed(&log, MAX_LOG_BYTES, MAX_ROTATED_FILES).unwrap());
        assert!(!numbered_path(&log, 1).exists());
    }

    #[test]
    fn oversized_log_moves_to_dot_one() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("sync.log");
        fill(&log, 64);

        assert!(rotate_if_needed(&log, 64, MAX_ROTATED_FILES).unwrap());
        assert_eq!(fs::metadata(&log).unwrap().len(), 0);
        assert_eq!(fs::metadata(numbered_path(&log, 1)).unwrap().len(), 64);
    }

    #[test]
    fn copies_are_capped_and_shifted() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("sync.log");
        for n in 1..=3 {
            fs::write(numbered_path(&log, n), format!("copy-{n}")).unwrap();
        }
        fill(&log, 10);

        assert!(rotate_if_needed(&log, 10, 3).unwrap());
        assert_eq!(fs::read_to_string(numbered_path(&log, 2)).unwrap(), "copy-1");
        assert_eq!(fs::read_to_string(numbered_path(&log, 3)).unwrap(), "copy-2");
        assert!(!numbered_path(&log, 4).exists());
    }

    #[test]
    fn missing_log_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(!rotate_sync_log(dir.path()));
    }

    #[test]
    fn sync_log_under_home_is_rotated() {
        let home = TempDir::new().unwrap();
        let log = crate::paths::sync_log_path(home.path());
        fs::create_dir_all(log.parent().unwrap()).unwrap();
        fill(&log, MAX_LOG_BYTES);

        assert!(rotate_sync_log(home.path()));
        assert!(numbered_path(&log, 1).exists());
    }
}
