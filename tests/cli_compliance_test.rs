//! Integration tests for `pmo standard` and `pmo compliance` commands.

mod common;

use common::TestEnv;
use predicates::prelude::*;

/// Create a standard with weighted criteria Scope (3) and Schedule (1).
fn pmbok(env: &TestEnv) -> String {
    let id = env.create(&["standard", "create", "PMBOK", "--version", "7"]);
    env.json(&["standard", "criterion-add", &id, "Scope", "--weight", "3", "--category", "planning"]);
    env.json(&["standard", "criterion-add", &id, "Schedule"]);
    id
}

fn evaluate(env: &TestEnv, project: &str, standard: &str, score: &str) -> String {
    env.create(&[
        "compliance",
        "evaluate",
        "--project",
        project,
        "--standard",
        standard,
        "--score",
        score,
    ])
}

#[test]
fn test_standard_create_and_criteria() {
    let env = TestEnv::init();
    let id = pmbok(&env);
    assert!(id.starts_with("std-"));

    let standard = env.json(&["standard", "show", &id]);
    assert_eq!(standard["version"], "7");
    let criteria = standard["criteria"].as_array().unwrap();
    assert_eq!(criteria.len(), 2);
    assert_eq!(criteria[0]["weight"], 3.0);
    assert_eq!(criteria[0]["category"], "planning");
    assert_eq!(criteria[1]["weight"], 1.0);

    env.pmo()
        .args(["standard", "criterion-add", &id, "scope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Conflict"));

    assert_eq!(env.json(&["standard", "list"])["count"], 1);
}

#[test]
fn test_standards_are_admin_managed() {
    let env = TestEnv::init();
    let manager = env.user("Max Manager", "manager");
    let id = pmbok(&env);

    env.pmo_as(&manager)
        .args(["standard", "create", "PRINCE2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Permission denied"));

    // Anyone with dashboard access may read them
    let standard = env.json_as(&manager, &["standard", "show", &id]);
    assert_eq!(standard["name"], "PMBOK");
}

#[test]
fn test_evaluate_with_weighted_criteria() {
    let env = TestEnv::init();
    let project = env.create(&["project", "create", "Bridge"]);
    let standard = pmbok(&env);

    let id = env.create(&[
        "compliance",
        "evaluate",
        "--project",
        &project,
        "--standard",
        &standard,
        "--criterion",
        "Scope=80",
        "--criterion",
        "Schedule=40",
        "--notes",
        "First review",
    ]);
    assert!(id.starts_with("cev-"));

    let evaluation = env.json(&["compliance", "show", &id]);
    assert_eq!(evaluation["overall_score"], 70.0);
    assert_eq!(evaluation["level"], "fair");
    assert_eq!(evaluation["criterion_scores"].as_array().unwrap().len(), 2);
    assert_eq!(evaluation["notes"], "First review");
}

#[test]
fn test_evaluate_validation() {
    let env = TestEnv::init();
    let project = env.create(&["project", "create", "Bridge"]);
    let standard = pmbok(&env);

    env.pmo()
        .args(["compliance", "evaluate", "--project", &project, "--standard", &standard, "--criterion", "Budget=50"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no criterion named"));

    env.pmo()
        .args(["compliance", "evaluate", "--project", &project, "--standard", &standard, "--criterion", "Scope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("<criterion>=<score>"));

    env.pmo()
        .args(["compliance", "evaluate", "--project", &project, "--standard", &standard, "--criterion", "Scope=100", "--criterion", "scope=100", "--criterion", "Schedule=0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("more than once"));

    env.pmo()
        .args(["compliance", "evaluate", "--project", &project, "--standard", &standard])
        .assert()
        .failure()
        .stderr(predicate::str::contains("criterion score is required"));

    env.pmo()
        .args(["compliance", "evaluate", "--project", &project, "--standard", &standard, "--score", "150"])
        .assert()
        .failure();
}

#[test]
fn test_compliance_summary() {
    let env = TestEnv::init();
    let project = env.create(&["project", "create", "Bridge"]);
    let other = env.create(&["project", "create", "Tunnel"]);
    let standard = pmbok(&env);

    evaluate(&env, &project, &standard, "70");
    evaluate(&env, &project, &standard, "60");
    evaluate(&env, &project, &standard, "90");

    let summary = env.json(&["compliance", "summary", "--project", &project]);
    assert_eq!(summary["scope"], "project");
    assert_eq!(summary["evaluations"], 3);
    assert_eq!(summary["average_score"], 73.33);
    assert_eq!(summary["level"], "fair");
    assert_eq!(summary["trend"], "improving");
    assert_eq!(summary["latest_score"], 90.0);
    assert_eq!(summary["compliance_rate"], 33.33);

    let empty = env.json(&["compliance", "summary", "--project", &other]);
    assert_eq!(empty["evaluations"], 0);
    assert_eq!(empty["average_score"], 0.0);
    assert_eq!(empty["level"], "poor");
    assert_eq!(empty["trend"], "stable");
    assert_eq!(empty["compliance_rate"], 0.0);

    let by_standard = env.json(&["compliance", "summary", "--standard", &standard]);
    assert_eq!(by_standard["scope"], "standard");
    assert_eq!(by_standard["evaluations"], 3);
}

#[test]
fn test_compliance_list_and_officer_scope() {
    let env = TestEnv::init();
    let officer = env.user("Olu Officer", "officer");
    let own = env.create(&["project", "create", "Bridge", "--owner", &officer]);
    let other = env.create(&["project", "create", "Tunnel"]);
    let standard = pmbok(&env);
    evaluate(&env, &other, &standard, "50");

    let created = env.json_as(
        &officer,
        &["compliance", "evaluate", "--project", &own, "--standard", &standard, "--score", "85"],
    );
    let evaluation = env.json(&["compliance", "show", created["id"].as_str().unwrap()]);
    assert_eq!(evaluation["evaluator_id"], officer.as_str());

    assert_eq!(env.json(&["compliance", "list"])["count"], 2);
    assert_eq!(env.json_as(&officer, &["compliance", "list"])["count"], 1);
    assert_eq!(
        env.json(&["compliance", "list", "--project", &other])["evaluations"][0]["overall_score"],
        50.0
    );
}

#[test]
fn test_standard_delete_refused_while_referenced() {
    let env = TestEnv::init();
    let project = env.create(&["project", "create", "Bridge"]);
    let standard = pmbok(&env);
    let unused = env.create(&["standard", "create", "PRINCE2"]);
    evaluate(&env, &project, &standard, "80");

    env.pmo()
        .args(["standard", "delete", &standard])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Referential integrity"));

    env.json(&["standard", "delete", &unused]);
    assert_eq!(env.json(&["standard", "list"])["count"], 1);
}
