//! Integration tests for the `segments` CLI binary.
//!
//! These tests use `assert_cmd` and `predicates` to drive the binary against a
//! schedule file in the temp directory, covering mutation, resolution, JSON
//! output and error exits.

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

/// Helper: a fresh schedule file path unique to one test.
fn schedule_path(test: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "segments-cli-{}-{}.json",
        test,
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    path
}

/// Helper: `segments --file <path> <args...>`.
fn segments(path: &PathBuf, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("segments").unwrap();
    cmd.arg("--file").arg(path).args(args);
    cmd
}

/// Helper: hourly segment 1 plus segment 2 with an override, under `defer`.
fn seed_example(path: &PathBuf) {
    segments(
        path,
        &["create", "--name", "hourly", "--start", "1000", "--period", "3600"],
    )
    .assert()
    .success()
    .stdout(predicate::str::contains("created segment 1"));
    segments(
        path,
        &[
            "--policy", "defer", "create", "--name", "other", "--start", "1000000", "--period",
            "60",
        ],
    )
    .assert()
    .success();
    segments(path, &["--policy", "defer", "override", "add", "2", "2000", "2500"])
        .assert()
        .success();
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolution
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn resolve_follows_recurrence_and_overrides() {
    let path = schedule_path("resolve");
    seed_example(&path);

    for (instant, expected) in [("999", "unassigned"), ("1000", "1"), ("2200", "2"), ("2600", "1")] {
        segments(&path, &["--policy", "defer", "resolve", instant])
            .assert()
            .success()
            .stdout(predicate::eq(format!("{}\n", expected)));
    }
    let _ = std::fs::remove_file(&path);
}

#[test]
fn resolve_accepts_rfc3339() {
    let path = schedule_path("rfc3339");
    segments(&path, &["create", "--name", "h", "--start", "0", "--period", "3600"])
        .assert()
        .success();
    segments(&path, &["resolve", "1970-01-01T05:00:00Z"])
        .assert()
        .success()
        .stdout(predicate::eq("1\n"));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn resolve_json_output() {
    let path = schedule_path("resolve-json");
    seed_example(&path);
    let output = segments(&path, &["--policy", "defer", "--json", "resolve", "2200"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(value, serde_json::json!({"kind": "segment", "segment": 2}));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn timetable_lists_spans() {
    let path = schedule_path("timetable");
    seed_example(&path);
    let output = segments(&path, &["--policy", "defer", "--json", "timetable", "500", "3000"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let spans: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let spans = spans.as_array().unwrap();
    assert_eq!(spans.len(), 4);
    assert_eq!(spans[0]["interval"], serde_json::json!({"start": 500, "end": 1000}));
    assert_eq!(spans[0]["resolution"]["kind"], "unassigned");
    assert_eq!(spans[2]["resolution"]["segments"], 2);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn instances_are_limited() {
    let path = schedule_path("instances");
    segments(&path, &["create", "--name", "s", "--start", "0", "--period", "10"])
        .assert()
        .success();
    segments(&path, &["instances", "1", "0", "1000000000", "--limit", "3"])
        .assert()
        .success()
        .stdout(predicate::eq("#0\t[0, 10)\n#1\t[10, 20)\n#2\t[20, 30)\n"));
    let _ = std::fs::remove_file(&path);
}

// ─────────────────────────────────────────────────────────────────────────────
// Conflicts
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn overlapping_create_rejected_by_default() {
    let path = schedule_path("reject");
    segments(&path, &["create", "--name", "X", "--start", "0", "--period", "10"])
        .assert()
        .success();
    segments(&path, &["create", "--name", "Y", "--start", "5", "--period", "10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Ambiguous schedule at 5"));
    segments(&path, &["check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no ambiguities"));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn deferred_conflict_surfaces_at_resolution_and_check() {
    let path = schedule_path("defer");
    segments(&path, &["create", "--name", "X", "--start", "0", "--period", "10"])
        .assert()
        .success();
    segments(
        &path,
        &["--policy", "defer", "create", "--name", "Y", "--start", "5", "--period", "10"],
    )
    .assert()
    .success();
    segments(&path, &["--policy", "defer", "resolve", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("segments 1, 2"));
    segments(&path, &["--policy", "defer", "check"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("1 and 2 overlap"));
    // The default policy still loads the file and audits it.
    segments(&path, &["check"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("1 and 2 overlap"));
    segments(&path, &["resolve", "4"])
        .assert()
        .success()
        .stdout(predicate::eq("1\n"));
    segments(&path, &["validate", "1"]).assert().success();
    // New overlapping mutations are still refused.
    segments(&path, &["create", "--name", "Z", "--start", "100", "--period", "10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Ambiguous schedule"));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn deleted_id_is_not_reissued_by_later_calls() {
    let path = schedule_path("reissue");
    segments(&path, &["create", "--name", "a", "--start", "0", "--period", "10"])
        .assert()
        .success();
    segments(&path, &["retire", "1", "100"]).assert().success();
    segments(&path, &["create", "--name", "b", "--start", "100", "--period", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created segment 2"));
    segments(&path, &["delete", "2"]).assert().success();
    segments(&path, &["create", "--name", "c", "--start", "100", "--period", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created segment 3"));
    segments(&path, &["validate", "2"]).assert().failure();
    let _ = std::fs::remove_file(&path);
}

#[test]
fn overlapping_override_rejected() {
    let path = schedule_path("override-conflict");
    seed_example(&path);
    segments(&path, &["--policy", "defer", "override", "add", "1", "2400", "2600"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("overlaps"));
    let _ = std::fs::remove_file(&path);
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle and bindings
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn delete_requires_clearing_dependents() {
    let path = schedule_path("delete");
    seed_example(&path);
    segments(&path, &["--policy", "defer", "delete", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("in use"));
    segments(&path, &["--policy", "defer", "override", "clear", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("removed 1"));
    segments(&path, &["--policy", "defer", "delete", "2", "--bound", "0,2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 task binding"));
    segments(&path, &["--policy", "defer", "delete", "2", "--bound", "0,1"])
        .assert()
        .success();
    segments(&path, &["validate", "2"]).assert().failure();
    segments(&path, &["validate", "1"]).assert().success();
    segments(&path, &["validate", "0"]).assert().success();
    let _ = std::fs::remove_file(&path);
}

#[test]
fn retire_and_redefine_persist_versions() {
    let path = schedule_path("versions");
    segments(&path, &["create", "--name", "day", "--start", "0", "--period", "100"])
        .assert()
        .success();
    segments(&path, &["redefine", "1", "--start", "500", "--period", "50"])
        .assert()
        .success();
    segments(&path, &["retire", "1", "1000"]).assert().success();
    segments(&path, &["resolve", "1000"])
        .assert()
        .success()
        .stdout(predicate::eq("unassigned\n"));

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved["segments"].as_array().unwrap().len(), 2);
    assert_eq!(saved["segments"][1]["until"], 1000);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn invalid_period_fails_without_writing() {
    let path = schedule_path("bad-period");
    segments(&path, &["create", "--name", "x", "--start", "0", "--period", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid period 0"));
    assert!(!path.exists());
}

#[test]
fn malformed_instant_is_reported() {
    let path = schedule_path("bad-instant");
    segments(&path, &["resolve", "tomorrow"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("RFC 3339"));
}
