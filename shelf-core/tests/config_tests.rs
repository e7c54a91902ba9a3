//! Config error-message, atomic-write-safety, and layering integration tests.

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use rstest::rstest;
use shelf_core::{config, paths, ConfigError, SyncConfig};
use std::fs;
use std::path::PathBuf;

fn complete() -> SyncConfig {
    SyncConfig {
        github_token: "ghp_test".to_string(),
        owner: "octo".to_string(),
        repo: "library".to_string(),
        library_path: PathBuf::from("/code"),
        ..SyncConfig::default()
    }
}

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_missing_config_points_at_setup() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = config::load_from(&paths::config_path(home.path())).unwrap_err();
    assert!(matches!(err, ConfigError::ConfigNotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("shelf setup"));
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let file = home.child(".shelf").child("config.yaml");
    file.write_binary(b": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = config::load_from(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn load_wrong_type_yaml_returns_parse_error() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let file = home.child(".shelf").child("config.yaml");
    file.write_str("- this is a list, not a mapping\n").expect("write");

    let err = config::load_from(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

#[rstest]
#[case::token("github_token")]
#[case::owner("owner")]
#[case::repo("repo")]
#[case::library("library_path")]
fn validate_names_missing_field(#[case] field: &'static str) {
    let mut cfg = complete();
    match field {
        "github_token" => cfg.github_token.clear(),
        "owner" => cfg.owner.clear(),
        "repo" => cfg.repo.clear(),
        _ => cfg.library_path = PathBuf::new(),
    }
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains(field), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Atomic write safety
// ---------------------------------------------------------------------------

#[test]
fn save_writes_yaml_and_cleans_up_tmp() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    config::save_at(home.path(), &complete()).expect("save");

    let file = home.child(".shelf").child("config.yaml");
    file.assert(predicate::path::exists());
    file.assert(predicate::str::contains("owner: octo"));
    home.child(".shelf")
        .child("config.yaml.tmp")
        .assert(predicate::path::missing());
}

#[test]
fn mid_write_crash_leaves_original_intact() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = config::save_at(home.path(), &complete()).expect("save");
    let original_bytes = fs::read(&path).expect("read original");

    // Simulate crash: .tmp written but process died before rename
    let tmp = path.with_extension("yaml.tmp");
    fs::write(&tmp, b"CRASH - INCOMPLETE WRITE").expect("write crash tmp");

    let loaded = config::load_from(&path).expect("load after crash");
    assert_eq!(loaded, complete());
    assert_eq!(fs::read(&path).expect("read"), original_bytes);
}

#[test]
fn resave_overwrites_previous_values() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    config::save_at(home.path(), &complete()).expect("first save");

    let mut edited = config::load_or_default_at(home.path()).expect("load");
    edited.branch = "archive".to_string();
    edited.extensions.clear();
    config::save_at(home.path(), &edited).expect("second save");

    let loaded = config::load_or_default_at(home.path()).expect("reload");
    assert_eq!(loaded.branch, "archive");
    assert!(loaded.extensions.is_empty(), "empty allow-list must survive a roundtrip");
}
