//! Shared sync pipeline entrypoint used by the CLI and scheduled runs.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use shelf_core::SyncConfig;

use crate::orchestrator::{Orchestrator, PlanReport, SyncReport};
use crate::remote::RemoteRepository;
use crate::SyncError;

/// What a pipeline invocation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Compute and report the plan only.
    DryRun,
    /// Execute the full state machine.
    Run,
}

/// Result of a pipeline invocation.
#[derive(Debug, Clone)]
pub enum Outcome {
    Planned(PlanReport),
    Synced(SyncReport),
}

/// Run the sync pipeline for `config`.
///
/// Resolves the library root and cache path relative to `home`. Dry runs only
/// require the library path to be valid; full runs validate the whole config.
pub fn run(
    home: &Path,
    config: &SyncConfig,
    remote: &dyn RemoteRepository,
    mode: RunMode,
    cancel: Option<Arc<AtomicBool>>,
) -> Result<Outcome, SyncError> {
    if mode == RunMode::Run {
        config.validate()?;
    }
    let root = config.library_root(home)?;
    let cache_path = config.cache_path_at(home);

    tracing::info!(
        "starting {}: {} -> {}/{} @ {}",
        if mode == RunMode::DryRun { "dry run" } else { "sync" },
        root.display(),
        config.owner,
        config.repo,
        config.branch,
    );

    let mut orchestrator = Orchestrator::new(config, root, cache_path, remote);
    if let Some(flag) = cancel {
        orchestrator = orchestrator.with_cancel_flag(flag);
    }

    match mode {
        RunMode::DryRun => orchestrator.plan().map(Outcome::Planned),
        RunMode::Run => orchestrator.run().map(Outcome::Synced),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use shelf_core::ConfigError;
    use tempfile::TempDir;

    use super::*;
    use crate::memory::MemoryRemote;

    fn config_for(library: PathBuf) -> SyncConfig {
        SyncConfig {
            github_token: "t".into(),
            owner: "octo".into(),
            repo: "library".into(),
            library_path: library,
            extensions: vec![],
            ..SyncConfig::default()
        }
    }

    #[test]
    fn run_requires_complete_config() {
        let home = TempDir::new().expect("home");
        let mut config = config_for(home.path().to_path_buf());
        config.github_token.clear();
        let remote = MemoryRemote::new();

        let err = run(home.path(), &config, &remote, RunMode::Run, None).unwrap_err();
        assert!(matches!(
            err,
            SyncError::Config(ConfigError::MissingField("github_token"))
        ));
        assert!(remote.calls().is_empty());
    }

    #[test]
    fn dry_run_tolerates_missing_credentials() {
        let home = TempDir::new().expect("home");
        let library = home.path().join("code");
        fs::create_dir_all(&library).expect("mkdir");
        fs::write(library.join("a.py"), "a").expect("write");
        let mut config = config_for(library);
        config.github_token.clear();
        let remote = MemoryRemote::new();

        let outcome = run(home.path(), &config, &remote, RunMode::DryRun, None).expect("run");
        match outcome {
            Outcome::Planned(report) => assert_eq!(report.plan.to_create().count(), 1),
            other => panic!("expected plan, got {other:?}"),
        }
        assert!(remote.calls().is_empty());
    }

    #[test]
    fn cache_lands_under_home_by_default() {
        let home = TempDir::new().expect("home");
        let library = home.path().join("code");
        fs::create_dir_all(&library).expect("mkdir");
        fs::write(library.join("a.py"), "a").expect("write");
        let remote = MemoryRemote::new();

        run(home.path(), &config_for(library), &remote, RunMode::Run, None).expect("run");
        assert!(shelf_core::paths::default_cache_path(home.path()).exists());
    }
}
