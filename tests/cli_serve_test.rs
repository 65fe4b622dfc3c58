//! Integration tests for the `serve` command line surface.

mod common;

#[cfg(feature = "serve")]
mod serve_enabled {
    use super::common::TestEnv;
    use predicates::prelude::*;

    #[test]
    fn test_serve_help() {
        let env = TestEnv::new();
        env.pmo()
            .args(["serve", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--port"));
    }

    #[test]
    fn test_serve_requires_init() {
        let env = TestEnv::new();
        env.pmo()
            .arg("serve")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Not initialized"));
    }

    #[test]
    fn test_serve_rejects_bad_host() {
        let env = TestEnv::init();
        env.pmo()
            .args(["serve", "--host", "not-an-address", "--port", "0"])
            .assert()
            .failure();
    }
}

#[cfg(not(feature = "serve"))]
mod serve_disabled {
    use super::common::TestEnv;

    #[test]
    fn test_serve_unavailable() {
        let env = TestEnv::new();
        env.pmo().arg("serve").assert().failure();
    }
}
