//! Integration tests for `pmo config` and the action log.

mod common;

use common::TestEnv;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

fn data_root(env: &TestEnv) -> PathBuf {
    PathBuf::from(env.json(&["system", "init"])["data_dir"].as_str().unwrap())
}

fn log_entries(path: &std::path::Path) -> Vec<Value> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn test_config_set_get_list() {
    let env = TestEnv::init();

    let set = env.json(&["config", "set", "output-format", "human"]);
    assert_eq!(set["value"], "human");

    // Output format now defaults to human text
    env.pmo()
        .args(["config", "get", "output-format"])
        .assert()
        .success()
        .stdout(predicate::str::contains("output-format = human"));

    env.pmo()
        .args(["config", "set", "output-format", "json"])
        .assert()
        .success();
    let list = env.json(&["config", "list"]);
    let entries = list["entries"].as_array().unwrap();
    let format = entries
        .iter()
        .find(|e| e["key"] == "output-format")
        .unwrap();
    assert_eq!(format["value"], "json");
    assert_eq!(format["source"], "workspace");
}

#[test]
fn test_cli_flag_overrides_config() {
    let env = TestEnv::init();
    let list = env.json(&["config", "list"]);
    let format = list["entries"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["key"] == "output-format")
        .unwrap()
        .clone();
    assert_eq!(format["source"], "default");

    env.pmo()
        .args(["config", "list", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(cli)"));
}

#[test]
fn test_system_config_layer() {
    let env = TestEnv::init();
    fs::write(
        env.config_dir.path().join("config.kdl"),
        "output-format \"human\"\n",
    )
    .unwrap();

    env.pmo()
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(system)"));
}

#[test]
fn test_config_rejects_bad_values() {
    let env = TestEnv::init();
    env.pmo()
        .args(["config", "set", "colour", "blue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown config key"));

    env.pmo()
        .args(["config", "set", "output-format", "yaml"])
        .assert()
        .failure();

    env.pmo()
        .args(["config", "set", "default-user", "usr-ffff"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_action_log_records_commands() {
    let env = TestEnv::new();
    let root = data_root(&env);
    let log = root.join("action.log");

    env.create(&["user", "create", "Ada", "--email", "ada@agency.gov", "--role", "executive"]);
    env.pmo()
        .args(["project", "show", "prj-ffff"])
        .assert()
        .failure();

    let entries = log_entries(&log);
    let create = entries
        .iter()
        .find(|e| e["command"] == "user create")
        .unwrap();
    assert_eq!(create["success"], true);
    assert_eq!(create["args"]["name"], "Ada");
    assert_eq!(create["args"]["email"], "a***@agency.gov");

    let failed = entries.last().unwrap();
    assert_eq!(failed["command"], "project show");
    assert_eq!(failed["success"], false);
    assert!(failed["error"].as_str().unwrap().contains("not found"));
}

#[test]
fn test_action_log_records_actor() {
    let env = TestEnv::new();
    let log = data_root(&env).join("action.log");
    let exec = env.user("Ada Byron", "executive");

    env.json_as(&exec, &["dashboard"]);
    let entries = log_entries(&log);
    let last = entries.last().unwrap();
    assert_eq!(last["command"], "dashboard");
    assert_eq!(last["actor"], exec.as_str());
}

#[test]
fn test_action_log_can_be_disabled_or_moved() {
    let env = TestEnv::new();
    let root = data_root(&env);
    let moved = env.data_path().join("audit").join("pmo.log");

    env.json(&["config", "set", "action-log-path", moved.to_str().unwrap()]);
    env.json(&["project", "list"]);
    assert_eq!(log_entries(&moved).len(), 1);

    env.json(&["config", "set", "action-log", "false"]);
    let before = log_entries(&moved).len();
    env.json(&["project", "list"]);
    assert_eq!(log_entries(&moved).len(), before);
    assert!(log_entries(&root.join("action.log")).len() >= 2);
}
