//! Integration tests for `pmo project` commands.

mod common;

use common::TestEnv;
use predicates::prelude::*;
use serde_json::json;

#[test]
fn test_project_create_defaults() {
    let env = TestEnv::init();
    let id = env.create(&["project", "create", "Bridge"]);
    assert!(id.starts_with("prj-"));

    let project = env.json(&["project", "show", &id]);
    assert_eq!(project["status"], "planned");
    assert_eq!(project["health_score"], 100.0);
    assert_eq!(project["risk_level"], "low");
    assert_eq!(project["budget"], 0.0);
}

#[test]
fn test_project_create_full() {
    let env = TestEnv::init();
    let owner = env.user("Olu Officer", "officer");
    let id = env.create(&[
        "project",
        "create",
        "Bridge",
        "--status",
        "active",
        "--budget",
        "2500",
        "--spent",
        "500",
        "--start",
        "2026-01-01",
        "--end",
        "2026-12-31",
        "--owner",
        &owner,
        "--risk-level",
        "high",
        "-t",
        "Roads",
        "-t",
        "capital",
    ]);

    let project = env.json(&["project", "show", &id]);
    assert_eq!(project["status"], "active");
    assert_eq!(project["spent_budget"], 500.0);
    assert_eq!(project["timeline"]["start"], "2026-01-01");
    assert_eq!(project["owner_id"], owner.as_str());
    assert_eq!(project["risk_level"], "high");
    assert_eq!(project["tags"], json!(["capital", "roads"]));
}

#[test]
fn test_project_create_validation() {
    let env = TestEnv::init();
    env.pmo()
        .args(["project", "create", "Bridge", "--health-score", "101"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("health_score"));

    env.pmo()
        .args(["project", "create", "Bridge", "--start", "2026-06-01", "--end", "2026-01-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("before start"));

    env.pmo()
        .args(["project", "create", "Bridge", "--start", "01/06/2026"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("YYYY-MM-DD"));

    env.pmo()
        .args(["project", "create", "Bridge", "--status", "paused"])
        .assert()
        .failure();

    env.pmo()
        .args(["project", "create", "Bridge", "--portfolio", "pf-ffff"])
        .assert()
        .failure();
}

#[test]
fn test_project_list_filters() {
    let env = TestEnv::init();
    let owner = env.user("Max Manager", "manager");
    let pf = env.create(&["portfolio", "create", "Transport", "--owner", &owner]);
    env.create(&["project", "create", "Bridge", "--portfolio", &pf, "-t", "roads"]);
    env.create(&["project", "create", "Tunnel", "--status", "delayed"]);

    assert_eq!(env.json(&["project", "list"])["count"], 2);
    assert_eq!(env.json(&["project", "list", "--portfolio", &pf])["count"], 1);
    assert_eq!(env.json(&["project", "list", "--tag", "roads"])["count"], 1);
    assert_eq!(env.json(&["project", "list", "--tag", "Roads"])["count"], 1);
    let delayed = env.json(&["project", "list", "--status", "delayed"]);
    assert_eq!(delayed["count"], 1);
    assert_eq!(delayed["projects"][0]["name"], "Tunnel");
}

#[test]
fn test_officer_only_sees_own_projects() {
    let env = TestEnv::init();
    let officer = env.user("Olu Officer", "officer");
    let own = env.create(&["project", "create", "Bridge", "--owner", &officer]);
    let other = env.create(&["project", "create", "Tunnel"]);

    let list = env.json_as(&officer, &["project", "list"]);
    assert_eq!(list["count"], 1);
    assert_eq!(list["projects"][0]["id"], own.as_str());

    env.pmo_as(&officer)
        .args(["project", "show", &other])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Permission denied"));

    // Officers may edit their own projects but not delete them
    env.json_as(&officer, &["project", "update", &own, "--status", "active"]);
    env.pmo_as(&officer)
        .args(["project", "delete", &own])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Permission denied"));

    env.pmo_as(&officer)
        .args(["project", "create", "Canal"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Permission denied"));
}

#[test]
fn test_project_update_fields_and_tags() {
    let env = TestEnv::init();
    let id = env.create(&["project", "create", "Bridge", "-t", "roads", "-t", "legacy"]);

    let updated = env.json(&[
        "project",
        "update",
        &id,
        "--status",
        "at-risk",
        "--health-score",
        "55.5",
        "--add-tag",
        "Priority",
        "--remove-tag",
        "legacy",
    ]);
    let fields = updated["updated_fields"].as_array().unwrap();
    assert!(fields.contains(&json!("status")));
    assert!(fields.contains(&json!("health_score")));
    assert!(fields.contains(&json!("tags")));

    let project = env.json(&["project", "show", &id]);
    assert_eq!(project["status"], "at-risk");
    assert_eq!(project["health_score"], 55.5);
    assert_eq!(project["tags"], json!(["priority", "roads"]));

    let noop = env.json(&["project", "update", &id]);
    assert_eq!(noop["updated_fields"], json!([]));
}

#[test]
fn test_project_update_clears_optional_fields() {
    let env = TestEnv::init();
    let owner = env.user("Max Manager", "manager");
    let pf = env.create(&["portfolio", "create", "Transport", "--owner", &owner]);
    let id = env.create(&[
        "project",
        "create",
        "Bridge",
        "--portfolio",
        &pf,
        "--description",
        "Crossing",
    ]);

    env.json(&["project", "update", &id, "--portfolio", "", "--description", ""]);
    let project = env.json(&["project", "show", &id]);
    assert!(project.get("portfolio_id").is_none());
    assert!(project.get("description").is_none());
}

#[test]
fn test_project_delete_cascades() {
    let env = TestEnv::init();
    let id = env.create(&["project", "create", "Bridge"]);
    let std = env.create(&["standard", "create", "PMBOK"]);
    env.create(&[
        "risk", "create", "Flooding", "--project", &id, "--probability", "40", "--impact", "50",
    ]);
    env.create(&["compliance", "evaluate", "--project", &id, "--standard", &std, "--score", "80"]);

    let deleted = env.json(&["project", "delete", &id]);
    assert_eq!(deleted["cascaded"]["risk"], 1);
    assert_eq!(deleted["cascaded"]["evaluation"], 1);

    assert_eq!(env.json(&["risk", "list"])["count"], 0);
    assert_eq!(env.json(&["compliance", "list"])["count"], 0);
    env.pmo()
        .args(["project", "show", &id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_milestones() {
    let env = TestEnv::init();
    let id = env.create(&["project", "create", "Bridge"]);

    env.json(&["project", "milestone-add", &id, "Design", "--date", "2026-03-01"]);
    env.json(&["project", "milestone-add", &id, "Kickoff", "--date", "2026-01-15"]);
    let added = env.json(&[
        "project",
        "milestone-add",
        &id,
        "Build",
        "--date",
        "2026-06-01",
        "--status",
        "in-progress",
    ]);
    assert_eq!(added["milestones"], 3);
    assert_eq!(added["milestone"]["status"], "in-progress");

    let project = env.json(&["project", "show", &id]);
    let names: Vec<&str> = project["timeline"]["milestones"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Kickoff", "Design", "Build"]);

    env.pmo()
        .args(["project", "milestone-add", &id, "design", "--date", "2026-04-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Conflict"));

    let changed = env.json(&["project", "milestone-status", &id, "Design", "completed"]);
    assert_eq!(changed["milestone"]["status"], "completed");

    env.pmo()
        .args(["project", "milestone-status", &id, "Launch", "completed"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_project_human_output() {
    let env = TestEnv::init();
    env.create(&["project", "create", "Bridge"]);
    env.pmo()
        .args(["project", "list", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 project(s):"))
        .stdout(predicate::str::contains("Bridge [planned]"));
}
