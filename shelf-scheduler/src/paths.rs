use std::path::{Path, PathBuf};

pub use shelf_core::paths::{logs_dir, sync_log_path};

pub const LAUNCHD_LABEL: &str = "dev.shelf.sync";
pub const CRON_MARKER: &str = "# shelf-sync";
pub const WINDOWS_TASK_NAME: &str = "ShelfLibrarySync";
pub const SYSTEMD_UNIT: &str = "shelf-sync";

/// Scheduled runs log through `sync.log` themselves; this only catches
/// whatever escapes to stderr (panics, early startup failures).
pub const SCHEDULER_ERR_LOG: &str = "scheduler-err.log";

pub fn scheduler_err_log_path(home: &Path) -> PathBuf {
    logs_dir(home).join(SCHEDULER_ERR_LOG)
}

pub fn launch_agents_dir(home: &Path) -> PathBuf {
    home.join("Library").join("LaunchAgents")
}

pub fn launchd_plist_path(home: &Path) -> PathBuf {
    launch_agents_dir(home).join(format!("{LAUNCHD_LABEL}.plist"))
}
