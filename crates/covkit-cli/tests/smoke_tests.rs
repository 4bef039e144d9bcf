//! Smoke tests for the covkit CLI
//!
//! These tests verify basic CLI functionality works correctly.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Get a command for the covkit binary
fn covkit() -> Command {
    Command::cargo_bin("covkit").expect("covkit binary should exist")
}

fn raw_artifact(path: &str, counts: [u64; 2]) -> String {
    let record = serde_json::json!({
        "path": path,
        "statementMap": {
            "0": { "start": { "line": 1, "column": 0 }, "end": { "line": 1, "column": 6 } },
            "1": { "start": { "line": 2, "column": 0 }, "end": { "line": 2, "column": 6 } }
        },
        "fnMap": {},
        "branchMap": {},
        "s": { "0": counts[0], "1": counts[1] },
        "f": {},
        "b": {}
    });
    let mut map = serde_json::Map::new();
    let _ = map.insert(path.to_string(), record);
    serde_json::Value::Object(map).to_string()
}

fn write_raw(root: &Path, name: &str, body: &str) {
    let raw = root.join("coverage/raw");
    fs::create_dir_all(&raw).unwrap();
    fs::write(raw.join(name), body).unwrap();
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    covkit()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_flag() {
    covkit()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("merge"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn test_no_args_fails() {
    covkit().assert().failure();
}

// ============================================================================
// Merge
// ============================================================================

#[test]
fn test_merge_sums_artifacts() {
    let dir = TempDir::new().unwrap();
    write_raw(dir.path(), "a.json", &raw_artifact("/proj/x.js", [1, 0]));
    write_raw(dir.path(), "b.json", &raw_artifact("/proj/x.js", [2, 0]));
    fs::write(
        dir.path().join("coverage.config.json"),
        r#"{"reporter": ["json", "text-summary"]}"#,
    )
    .unwrap();

    covkit()
        .args(["merge", "--root"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Statements   : 50% ( 1/2 )"));

    let merged = fs::read_to_string(dir.path().join("coverage/merged/coverage-final.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&merged).unwrap();
    assert_eq!(value["/proj/x.js"]["s"]["0"], 3);
}

#[test]
fn test_merge_custom_name_and_malformed_artifact() {
    let dir = TempDir::new().unwrap();
    write_raw(dir.path(), "good.json", &raw_artifact("/proj/x.js", [1, 1]));
    write_raw(dir.path(), "bad.json", "{ truncated");

    covkit()
        .args(["merge", "--name", "ci", "--color", "never", "--root"])
        .arg(dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("bad.json"));

    assert!(dir.path().join("coverage/ci/text-summary.txt").exists());
}

#[test]
fn test_merge_unknown_reporter_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("coverage.config.json"),
        r#"{"reporter": ["clover"]}"#,
    )
    .unwrap();

    covkit()
        .args(["merge", "--root"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown reporter: clover"));
}

#[test]
fn test_merge_into_raw_dir_is_refused() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("coverage.config.json"),
        r#"{"reporter": ["json"]}"#,
    )
    .unwrap();
    write_raw(dir.path(), "p1.json", &raw_artifact("/proj/x.js", [1, 0]));

    covkit()
        .args(["-q", "merge", "--name", "raw", "--color", "never", "--root"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("FAIL"))
        .stderr(predicate::str::contains("reserved for raw coverage artifacts"));
    assert!(!dir.path().join("coverage/raw/coverage-final.json").exists());
}

#[test]
fn test_merge_malformed_config_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("coverage.config.json"), "{ nope").unwrap();

    covkit()
        .args(["merge", "--root"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config"));
}

// ============================================================================
// Config and check
// ============================================================================

#[test]
fn test_config_shows_defaults() {
    let dir = TempDir::new().unwrap();
    covkit()
        .args(["config", "--root"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"exclude-node-modules\": true"))
        .stdout(predicate::str::contains("\"all\": false"));
}

#[test]
fn test_check_reports_each_path() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("coverage.config.json"),
        r#"{"include": ["src/**/*.js"], "exclude": ["src/**/*.test.js"]}"#,
    )
    .unwrap();

    covkit()
        .args(["check", "--root"])
        .arg(dir.path())
        .args(["src/a.js", "src/a.test.js"])
        .assert()
        .success()
        .stdout(predicate::str::contains("instrument src/a.js"))
        .stdout(predicate::str::contains("skip       src/a.test.js"));
}
