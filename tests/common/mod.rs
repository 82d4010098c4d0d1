//! Shared test helpers for integration tests

#![allow(dead_code)]

use assert_cmd::cargo;
use assert_cmd::Command;
use std::path::Path;
use tempfile::TempDir;

/// Helper to get a calcert command, isolated from the user's global config
pub fn calcert() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("calcert"));
    cmd.env("CALCERT_CONFIG_DIR", std::env::temp_dir().join("calcert-tests-no-config"))
        .env_remove("CALCERT_SEED")
        .env_remove("CALCERT_LOG");
    cmd
}

/// Helper to create a test project in a temp directory
pub fn setup_test_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    calcert().current_dir(tmp.path()).arg("init").assert().success();
    tmp
}

/// Run calcert in the project and return stdout, asserting success
pub fn run_ok(tmp: &TempDir, args: &[&str]) -> String {
    let output = calcert().current_dir(tmp.path()).args(args).output().unwrap();
    assert!(
        output.status.success(),
        "calcert {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Create a draft and return its id
pub fn create_test_draft(tmp: &TempDir, extra: &[&str]) -> String {
    let mut args = vec!["draft", "new", "--format", "id", "--seed", "1"];
    args.extend_from_slice(extra);
    let stdout = run_ok(tmp, &args);
    stdout
        .lines()
        .find(|l| l.starts_with("CAL-"))
        .map(|l| l.trim().to_string())
        .unwrap_or_default()
}

/// Micropipette at 26 °C (Z = 1.0043) with automation off
pub fn create_manual_draft(tmp: &TempDir) -> String {
    let id = create_test_draft(
        tmp,
        &[
            "--number",
            "123.45",
            "--serial",
            "SN-42",
            "--manufacturer",
            "Eppendorf",
            "--capacity",
            "1000uL",
            "--temperature",
            "26",
        ],
    );
    run_ok(tmp, &["draft", "set", &id, "--automation", "false"]);
    id
}

/// Compute results of a draft as JSON
pub fn compute_json(tmp: &TempDir, id: &str) -> serde_json::Value {
    let stdout = run_ok(tmp, &["compute", id, "--all", "--format", "json"]);
    serde_json::from_str(&stdout).unwrap()
}

/// Draft file as parsed YAML
pub fn read_draft(tmp: &TempDir, id: &str) -> serde_json::Value {
    let path = draft_path(tmp.path(), id);
    let content = std::fs::read_to_string(path).unwrap();
    serde_yml::from_str(&content).unwrap()
}

pub fn draft_path(root: &Path, id: &str) -> std::path::PathBuf {
    root.join("drafts").join(format!("{}.calcert.yaml", id))
}

pub fn approx(actual: &serde_json::Value, expected: f64) -> bool {
    actual
        .as_f64()
        .map(|v| (v - expected).abs() < 0.006)
        .unwrap_or(false)
}
