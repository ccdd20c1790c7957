//! End-to-end CLI integration tests.

use assert_cmd::Command;
use predicates::prelude::*;

fn segpool() -> Command {
    Command::cargo_bin("segpool").expect("binary not found")
}

#[test]
fn help_flag() {
    segpool()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("free stores"));
}

#[test]
fn version_flag() {
    segpool()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("segpool"));
}

#[test]
fn small_run_reports_conservation() {
    segpool()
        .args(["-t", "2", "-c", "2000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("conservation:"))
        .stdout(predicate::str::contains("policy lifo"));
}

#[test]
fn json_report() {
    let output = segpool()
        .args(["-t", "2", "-c", "1000", "--json", "--policy", "fifo"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["threads"], 2);
    assert!(summary["version"].as_str().unwrap().starts_with("segpool "));
    assert_eq!(summary["policy"], "fifo");
    assert_eq!(summary["totals"]["allocations"], summary["totals"]["frees"]);

    let classes = summary["pool"]["classes"].as_array().unwrap();
    assert_eq!(classes.len(), 14);
    for class in classes {
        assert_eq!(class["outstanding"], 0);
    }
}

#[test]
fn env_sets_threads() {
    segpool()
        .env("SEGPOOL_THREADS", "3")
        .args(["-c", "100", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"threads\": 3"));
}

#[test]
fn custom_classes() {
    let output = segpool()
        .args(["-t", "1", "-c", "500", "--classes", "32,128", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let sizes: Vec<u64> = summary["pool"]["classes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["block_size"].as_u64().unwrap())
        .collect();
    assert_eq!(sizes, vec![32, 128]);
}

#[test]
fn verbose_mode() {
    segpool().args(["-t", "1", "-c", "100", "-v"]).assert().success();
}

#[test]
fn invalid_policy_fails() {
    segpool()
        .args(["--policy", "random"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown reuse policy"));
}

#[test]
fn invalid_block_size_exits_with_config_code() {
    segpool()
        .args(["-c", "10", "--classes", "12"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("12"));
}

#[test]
fn tiny_memory_limit_exits_with_oom_code() {
    segpool()
        .args(["-t", "1", "--classes", "4096", "--memory-limit", "1K"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("out of memory"));
}
