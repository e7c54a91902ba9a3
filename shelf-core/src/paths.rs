//! Well-known locations under `~/.shelf/`.
//!
//! ```text
//! ~/.shelf/
//!   config.yaml   (mode 0600, holds the API token)
//!   cache.json    (last-synced fingerprints)
//!   logs/
//!     sync.log
//! ```

use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.yaml";
pub const CACHE_FILE: &str = "cache.json";
pub const SYNC_LOG: &str = "sync.log";

pub fn shelf_root(home: &Path) -> PathBuf {
    home.join(".shelf")
}

pub fn config_path(home: &Path) -> PathBuf {
    shelf_root(home).join(CONFIG_FILE)
}

pub fn default_cache_path(home: &Path) -> PathBuf {
    shelf_root(home).join(CACHE_FILE)
}

pub fn logs_dir(home: &Path) -> PathBuf {
    shelf_root(home).join("logs")
}

pub fn sync_log_path(home: &Path) -> PathBuf {
    logs_dir(home).join(SYNC_LOG)
}

/// Expand a leading `~` against `home`. Other paths are returned unchanged.
pub fn expand_home(path: &Path, home: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}
