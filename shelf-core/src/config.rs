//! Sync configuration, persisted as YAML at `~/.shelf/config.yaml`.
//!
//! # API pattern
//!
//! Every path-dependent function takes an explicit `home` (`fn_at(home, …)`).
//! The binary resolves it once through [`home`]; tests pass a `TempDir`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::paths;

/// Environment variable that overrides `github_token` from the file.
pub const TOKEN_ENV: &str = "SHELF_GITHUB_TOKEN";

/// `strftime` format substituted for `{date}` in commit messages.
pub const COMMIT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

const DEFAULT_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".ts", ".java", ".c", ".cpp", ".go", ".rs", ".rb", ".sh", ".html", ".css",
    ".md", ".json", ".yaml", ".yml", ".toml", ".r", ".sql", ".swift", ".kt", ".cs",
];

const DEFAULT_IGNORE_DIRS: &[&str] = &[
    ".git",
    "__pycache__",
    "node_modules",
    ".venv",
    "venv",
    "env",
    ".idea",
    ".vscode",
    "dist",
    "build",
];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Retry policy for retryable remote failures (rate limits, timeouts).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per remote call, including the first.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 60_000,
        }
    }
}

impl RetryConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

/// Everything a sync run needs. Passed explicitly into the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub github_token: String,
    /// Account or organisation that owns the target repository.
    pub owner: String,
    pub repo: String,
    pub library_path: PathBuf,
    pub branch: String,
    /// Template; `{date}` and `{path}` are substituted per upload.
    pub commit_message: String,
    /// Allowed extensions, with or without the leading dot. Empty = all.
    pub extensions: Vec<String>,
    /// Directory names pruned at any depth.
    pub ignore_dirs: Vec<String>,
    pub max_file_size_bytes: u64,
    /// Visibility used when the repository has to be created.
    pub create_private: bool,
    pub request_timeout_secs: u64,
    pub retry: RetryConfig,
    /// Overrides `~/.shelf/cache.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            github_token: String::new(),
            owner: String::new(),
            repo: String::new(),
            library_path: PathBuf::new(),
            branch: "main".to_string(),
            commit_message: "Auto-sync: {date}".to_string(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            ignore_dirs: DEFAULT_IGNORE_DIRS.iter().map(|s| s.to_string()).collect(),
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE,
            create_private: false,
            request_timeout_secs: 30,
            retry: RetryConfig::default(),
            cache_path: None,
        }
    }
}

impl SyncConfig {
    /// Check required fields. Returns the first problem found.
    ///
    /// Does not touch the filesystem; see [`SyncConfig::library_root`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.github_token.trim().is_empty() {
            return Err(ConfigError::MissingField("github_token"));
        }
        if self.owner.trim().is_empty() {
            return Err(ConfigError::MissingField("owner"));
        }
        if self.repo.trim().is_empty() {
            return Err(ConfigError::MissingField("repo"));
        }
        if self.library_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("library_path"));
        }
        Ok(())
    }

    /// Resolve `library_path` (expanding `~`) and require it to be a directory.
    pub fn library_root(&self, home: &Path) -> Result<PathBuf, ConfigError> {
        if self.library_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("library_path"));
        }
        let path = paths::expand_home(&self.library_path, home);
        if !path.is_dir() {
            return Err(ConfigError::LibraryNotFound { path });
        }
        path.canonicalize().map_err(|e| io_err(&path, e))
    }

    /// Where the change cache lives for this configuration.
    pub fn cache_path_at(&self, home: &Path) -> PathBuf {
        match &self.cache_path {
            Some(path) => paths::expand_home(path, home),
            None => paths::default_cache_path(home),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Render the commit message template for one file.
    pub fn commit_message(&self, date: &str, path: &str) -> String {
        self.commit_message
            .replace("{date}", date)
            .replace("{path}", path)
    }

    /// Replace the token when `value` is set and non-empty.
    pub fn with_token_override(mut self, value: Option<String>) -> Self {
        if let Some(token) = value.filter(|t| !t.trim().is_empty()) {
            self.github_token = token;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load a config file from an explicit path.
///
/// Returns `ConfigError::ConfigNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_from(path: &Path) -> Result<SyncConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Load `<home>/.shelf/config.yaml`, then apply the token environment override.
pub fn load_at(home: &Path) -> Result<SyncConfig, ConfigError> {
    let config = load_from(&paths::config_path(home))?;
    Ok(config.with_token_override(std::env::var(TOKEN_ENV).ok()))
}

/// Load the existing config for editing, or defaults when there is none yet.
pub fn load_or_default_at(home: &Path) -> Result<SyncConfig, ConfigError> {
    match load_from(&paths::config_path(home)) {
        Ok(config) => Ok(config),
        Err(ConfigError::ConfigNotFound { .. }) => Ok(SyncConfig::default()),
        Err(err) => Err(err),
    }
}

// ---------------------------------------------------------------------------
// Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save a config to `path`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
/// `.tmp` is always in the same directory as the target (same filesystem, so no EXDEV on macOS).
pub fn save_to(path: &Path, config: &SyncConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
            set_dir_permissions(dir)?;
        }
    }
    let tmp_path = path.with_extension("yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml).map_err(|e| io_err(&tmp_path, e))?;
    set_file_permissions(&tmp_path)?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(io_err(path, e));
    }
    Ok(())
}

/// Save to `<home>/.shelf/config.yaml`. Returns the path written.
pub fn save_at(home: &Path, config: &SyncConfig) -> Result<PathBuf, ConfigError> {
    let path = paths::config_path(home);
    save_to(&path, config)?;
    Ok(path)
}

/// The current user's home directory, the root every `_at` function expects.
pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
