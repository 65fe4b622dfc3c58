//! Integration tests for `pmo portfolio` commands.

mod common;

use common::TestEnv;
use predicates::prelude::*;

#[test]
fn test_portfolio_create_and_show() {
    let env = TestEnv::init();
    let owner = env.user("Max Manager", "manager");
    let id = env.create(&[
        "portfolio",
        "create",
        "Transport",
        "--owner",
        &owner,
        "--total-budget",
        "1000000",
        "--team-size",
        "12",
    ]);
    assert!(id.starts_with("pf-"));

    let portfolio = env.json(&["portfolio", "show", &id]);
    assert_eq!(portfolio["name"], "Transport");
    assert_eq!(portfolio["owner_id"], owner.as_str());
    assert_eq!(portfolio["health_score"], 100.0);
    assert_eq!(portfolio["total_budget"], 1000000.0);
    assert_eq!(portfolio["project_ids"], serde_json::json!([]));
}

#[test]
fn test_operator_must_name_owner() {
    let env = TestEnv::init();
    env.pmo()
        .args(["portfolio", "create", "Transport"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("owner"));
}

#[test]
fn test_owner_defaults_to_actor() {
    let env = TestEnv::init();
    let manager = env.user("Max Manager", "manager");
    let id = env.json_as(&manager, &["portfolio", "create", "Transport"])["id"]
        .as_str()
        .unwrap()
        .to_string();
    let portfolio = env.json(&["portfolio", "show", &id]);
    assert_eq!(portfolio["owner_id"], manager.as_str());
}

#[test]
fn test_manager_cannot_create_for_someone_else() {
    let env = TestEnv::init();
    let manager = env.user("Max Manager", "manager");
    let exec = env.user("Ada Byron", "executive");

    env.pmo_as(&manager)
        .args(["portfolio", "create", "Transport", "--owner", &exec])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Permission denied"));
}

#[test]
fn test_officer_cannot_see_portfolios() {
    let env = TestEnv::init();
    let manager = env.user("Max Manager", "manager");
    let officer = env.user("Olu Officer", "officer");
    let id = env.create(&["portfolio", "create", "Transport", "--owner", &manager]);

    let list = env.json_as(&officer, &["portfolio", "list"]);
    assert_eq!(list["count"], 0);
    env.pmo_as(&officer)
        .args(["portfolio", "show", &id])
        .assert()
        .failure();
}

#[test]
fn test_health_is_recomputed_explicitly() {
    let env = TestEnv::init();
    let owner = env.user("Max Manager", "manager");
    let pf = env.create(&["portfolio", "create", "Transport", "--owner", &owner]);
    env.create(&[
        "project",
        "create",
        "Bridge",
        "--portfolio",
        &pf,
        "--budget",
        "3000",
        "--health-score",
        "80",
    ]);
    env.create(&[
        "project",
        "create",
        "Tunnel",
        "--portfolio",
        &pf,
        "--budget",
        "1000",
        "--health-score",
        "40",
        "--status",
        "at-risk",
    ]);

    // Project writes do not touch the stored score
    let stats = env.json(&["portfolio", "stats", &pf]);
    assert_eq!(stats["stored_health_score"], 100.0);
    assert_eq!(stats["computed_health_score"], 70.0);
    assert_eq!(stats["stale"], true);
    assert_eq!(stats["project_count"], 2);
    assert_eq!(stats["status"]["at_risk"], 1);
    assert_eq!(stats["budget"]["total_budget"], 4000.0);

    let recomputed = env.json(&["portfolio", "recompute-health", &pf]);
    assert_eq!(recomputed["previous_health_score"], 100.0);
    assert_eq!(recomputed["health_score"], 70.0);
    assert_eq!(recomputed["project_count"], 2);

    let stats = env.json(&["portfolio", "stats", &pf]);
    assert_eq!(stats["stale"], false);
}

#[test]
fn test_empty_portfolio_is_fully_healthy() {
    let env = TestEnv::init();
    let owner = env.user("Max Manager", "manager");
    let pf = env.create(&["portfolio", "create", "Transport", "--owner", &owner]);

    let recomputed = env.json(&["portfolio", "recompute-health", &pf]);
    assert_eq!(recomputed["health_score"], 100.0);
    assert_eq!(recomputed["project_count"], 0);
}

#[test]
fn test_portfolio_update() {
    let env = TestEnv::init();
    let owner = env.user("Max Manager", "manager");
    let pf = env.create(&["portfolio", "create", "Transport", "--owner", &owner]);

    let updated = env.json(&[
        "portfolio",
        "update",
        &pf,
        "--utilization",
        "85",
        "--description",
        "Roads and rail",
    ]);
    assert_eq!(updated["updated_fields"].as_array().unwrap().len(), 2);

    let portfolio = env.json(&["portfolio", "show", &pf]);
    assert_eq!(portfolio["description"], "Roads and rail");
    assert_eq!(portfolio["resource_allocation"]["utilization"], 85.0);

    env.pmo()
        .args(["portfolio", "update", &pf, "--utilization", "120"])
        .assert()
        .failure();
}

#[test]
fn test_portfolio_delete() {
    let env = TestEnv::init();
    let owner = env.user("Max Manager", "manager");
    let exec = env.user("Ada Byron", "executive");
    let pf = env.create(&["portfolio", "create", "Transport", "--owner", &owner]);
    let project = env.create(&["project", "create", "Bridge", "--portfolio", &pf]);

    env.pmo()
        .args(["portfolio", "delete", &pf])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Referential integrity"));

    env.json(&["project", "delete", &project]);

    // Only executives may delete portfolios
    env.pmo_as(&owner)
        .args(["portfolio", "delete", &pf])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Permission denied"));
    env.json_as(&exec, &["portfolio", "delete", &pf]);
    assert_eq!(env.json(&["portfolio", "list"])["count"], 0);
}
