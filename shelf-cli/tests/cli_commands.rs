use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use shelf_core::{config, paths, RepoPath, SyncConfig};
use shelf_sync::{fingerprint_of, ChangeCache};

fn shelf(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("shelf").expect("shelf binary");
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1")
        .env_remove("SHELF_GITHUB_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

fn library(home: &Path) -> PathBuf {
    let dir = home.join("code");
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_config(home: &Path, library: &Path, token: &str) {
    let config = SyncConfig {
        github_token: token.to_string(),
        owner: "octo".into(),
        repo: "library".into(),
        library_path: library.to_path_buf(),
        ..SyncConfig::default()
    };
    config::save_at(home, &config).expect("save config");
}

#[test]
fn dry_run_prints_plan_and_writes_nothing() {
    let home = TempDir::new().unwrap();
    let lib = library(home.path());
    fs::write(lib.join("a.py"), "new").unwrap();
    fs::write(lib.join("b.py"), "same").unwrap();
    fs::write(lib.join("c.py"), "edited").unwrap();
    write_config(home.path(), &lib, "");

    let cache_path = paths::default_cache_path(home.path());
    let mut cache = ChangeCache::load(&cache_path);
    cache.commit(RepoPath::from("b.py"), fingerprint_of(b"same"));
    cache.commit(RepoPath::from("c.py"), fingerprint_of(b"original"));
    cache.save().unwrap();
    let before = fs::read(&cache_path).unwrap();

    shelf(home.path())
        .args(["run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "[dry-run] 1 to create, 1 to update, 1 unchanged, 0 skipped",
        ))
        .stdout(predicate::str::contains("a.py"))
        .stdout(predicate::str::contains("unchanged"));

    assert_eq!(fs::read(&cache_path).unwrap(), before, "cache must be untouched");
    let log = fs::read_to_string(paths::sync_log_path(home.path())).expect("sync.log");
    assert!(log.contains("would create: a.py"), "log was: {log}");
    assert!(log.contains("would update: c.py"));
}

#[test]
fn dry_run_with_explicit_config_path() {
    let home = TempDir::new().unwrap();
    let lib = library(home.path());
    fs::write(lib.join("only.rs"), "fn main() {}").unwrap();
    let elsewhere = home.path().join("alt.yaml");
    let config = SyncConfig {
        library_path: lib,
        ..SyncConfig::default()
    };
    config::save_to(&elsewhere, &config).unwrap();

    shelf(home.path())
        .args(["run", "--dry-run", "--config"])
        .arg(&elsewhere)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 to create"));
}

#[test]
fn run_without_config_is_fatal() {
    let home = TempDir::new().unwrap();
    shelf(home.path())
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("shelf setup"));
}

#[test]
fn run_with_missing_token_is_fatal() {
    let home = TempDir::new().unwrap();
    let lib = library(home.path());
    write_config(home.path(), &lib, "");

    shelf(home.path())
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("github_token"));
}

#[test]
fn setup_with_flags_writes_private_config() {
    let home = TempDir::new().unwrap();
    let lib = library(home.path());

    shelf(home.path())
        .args(["setup", "--token", "ghp_x", "--owner", "octo", "--repo", "notes", "--library"])
        .arg(&lib)
        .assert()
        .success()
        .stdout(predicate::str::contains("saved"));

    let saved = config::load_from(&paths::config_path(home.path())).unwrap();
    assert_eq!(saved.owner, "octo");
    assert_eq!(saved.repo, "notes");
    assert_eq!(saved.library_path, lib);
    assert_eq!(saved.branch, "main");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(paths::config_path(home.path()))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[test]
fn setup_prompts_on_stdin() {
    let home = TempDir::new().unwrap();
    let lib = library(home.path());

    shelf(home.path())
        .arg("setup")
        .write_stdin(format!("ghp_y\nocto\nrepo\n{}\n\n", lib.display()))
        .assert()
        .success();

    let saved = config::load_from(&paths::config_path(home.path())).unwrap();
    assert_eq!(saved.github_token, "ghp_y");
    assert_eq!(saved.library_path, lib);
}

#[test]
fn status_reports_tracked_files_as_json() {
    let home = TempDir::new().unwrap();
    let mut cache = ChangeCache::load(paths::default_cache_path(home.path()));
    cache.commit(RepoPath::from("a.py"), fingerprint_of(b"a"));
    cache.commit(RepoPath::from("b.py"), fingerprint_of(b"b"));
    cache.save().unwrap();

    let output = shelf(home.path())
        .args(["status", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["files"], 2);
    assert_eq!(report["cache_state"], "ok");
    assert_eq!(report["recent"].as_array().unwrap().len(), 2);
}

#[test]
fn status_without_history_says_never() {
    let home = TempDir::new().unwrap();
    shelf(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("never"));
}

#[test]
fn schedule_show_renders_every_backend() {
    let home = TempDir::new().unwrap();
    shelf(home.path())
        .args(["schedule", "show", "--hour", "6", "--minute", "30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("30 6 * * *"))
        .stdout(predicate::str::contains("OnCalendar=*-*-* 06:30:00"))
        .stdout(predicate::str::contains("StartCalendarInterval"))
        .stdout(predicate::str::contains("/sc daily /st 06:30"));
}

#[test]
fn schedule_rejects_invalid_time() {
    let home = TempDir::new().unwrap();
    shelf(home.path())
        .args(["schedule", "show", "--hour", "24"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid run time"));
}
