//! E2E tests for `dfr` over a snapshot file in a temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn dfr_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("dfr"));
    cmd.current_dir(dir);
    cmd.env("XDG_CONFIG_HOME", dir.join("xdg"));
    cmd.env("HOME", dir);
    cmd.env("DEFER_LOG", "error");
    cmd.env_remove("FORMAT");
    cmd.env_remove("DEFER_SNAPSHOT");
    cmd
}

fn snapshot_path(dir: &Path) -> PathBuf {
    dir.join(".defer").join("snapshot.json")
}

fn json_of(dir: &Path, args: &[&str]) -> Value {
    let output = dfr_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("dfr should not crash");
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON")
}

fn ids(value: &Value) -> Vec<u64> {
    value
        .as_array()
        .expect("array")
        .iter()
        .map(|v| v.as_u64().expect("numeric id"))
        .collect()
}

/// Records 1..=3 with 2 waiting on 1 and 3 waiting on 2.
fn chain_project() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    for id in ["1", "2", "3"] {
        dfr_cmd(dir.path())
            .args(["add", id, "--title", "item"])
            .assert()
            .success();
    }
    dfr_cmd(dir.path()).args(["link", "2", "1"]).assert().success();
    dfr_cmd(dir.path()).args(["link", "3", "2"]).assert().success();
    dir
}

#[test]
fn add_creates_snapshot_under_project_dir() {
    let dir = TempDir::new().expect("tempdir");
    dfr_cmd(dir.path())
        .args(["add", "7", "-t", "first"])
        .assert()
        .success()
        .stdout(predicate::str::contains("added: 7"));
    assert!(snapshot_path(dir.path()).exists());
}

#[test]
fn order_lists_dependencies_first() {
    let dir = chain_project();
    let json = json_of(dir.path(), &["order"]);
    assert_eq!(ids(&json["order"]), vec![1, 2, 3]);
    assert!(json["unresolved"].as_array().expect("array").is_empty());
}

#[test]
fn closing_a_loop_is_rejected_with_path() {
    let dir = chain_project();
    let output = dfr_cmd(dir.path())
        .args(["link", "1", "3", "--json"])
        .output()
        .expect("dfr should not crash");
    assert!(!output.status.success());

    let err: Value = serde_json::from_slice(&output.stderr).expect("JSON error on stderr");
    assert_eq!(err["error"]["error_code"], "E2004");
    assert_eq!(ids(&err["error"]["path"]), vec![1, 2, 3, 1]);

    // Nothing persisted.
    let stats = json_of(dir.path(), &["stats"]);
    assert_eq!(stats["edge_count"], 2);
}

#[test]
fn check_reports_verdict_and_exit_status() {
    let dir = chain_project();
    dfr_cmd(dir.path())
        .args(["check", "3", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok: 3 may depend on 1"));

    dfr_cmd(dir.path())
        .args(["check", "1", "3"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("1 → 2 → 3 → 1"));

    dfr_cmd(dir.path())
        .args(["check", "2", "2"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("cannot depend on itself"));
}

#[test]
fn completing_a_blocker_reports_unblocked_records() {
    let dir = chain_project();
    assert_eq!(ids(&json_of(dir.path(), &["unblocks", "1"])["unblocks"]), vec![2]);

    dfr_cmd(dir.path())
        .args(["status", "1", "done"])
        .assert()
        .success()
        .stdout(predicate::str::contains("now unblocked: 2"));

    let blocked = json_of(dir.path(), &["blocked"]);
    let blocked = blocked.as_array().expect("array");
    assert_eq!(blocked.len(), 1);
    assert_eq!(blocked[0]["id"], 3);
}

#[test]
fn non_blocking_links_do_not_constrain_order() {
    let dir = chain_project();
    dfr_cmd(dir.path())
        .args(["link", "1", "3", "--kind", "relates-to"])
        .assert()
        .success();
    let json = json_of(dir.path(), &["order"]);
    assert_eq!(ids(&json["order"]), vec![1, 2, 3]);
}

#[test]
fn hand_edited_cycle_is_listed_by_cycles() {
    let dir = TempDir::new().expect("tempdir");
    let path = snapshot_path(dir.path());
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(
        &path,
        r#"{"version":1,"records":[{"id":1},{"id":2},{"id":3}],
            "relationships":[
              {"source":1,"target":2,"kind":"blocks"},
              {"source":2,"target":1,"kind":"blocks"}]}"#,
    )
    .expect("write snapshot");

    let order = json_of(dir.path(), &["order"]);
    assert_eq!(ids(&order["order"]), vec![3, 1, 2]);
    assert_eq!(ids(&order["unresolved"]), vec![1, 2]);

    dfr_cmd(dir.path())
        .args(["cycles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1").and(predicate::str::contains("2")));
}

#[test]
fn explicit_snapshot_flag_overrides_project_dir() {
    let dir = TempDir::new().expect("tempdir");
    let custom = dir.path().join("elsewhere.json");
    let custom_str = custom.to_str().expect("utf-8 path");
    dfr_cmd(dir.path())
        .args(["--snapshot", custom_str, "add", "1"])
        .assert()
        .success();
    assert!(custom.exists());
    assert!(!snapshot_path(dir.path()).exists());
}

#[test]
fn missing_snapshot_is_a_coded_error() {
    let dir = TempDir::new().expect("tempdir");
    dfr_cmd(dir.path())
        .args(["order"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1002"));
}

#[test]
fn unknown_status_is_rejected_by_parser() {
    let dir = chain_project();
    dfr_cmd(dir.path())
        .args(["status", "1", "finished"])
        .assert()
        .failure();
}
