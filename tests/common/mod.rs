//! Common test utilities for pmo integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't pollute
//! the user's data or config directories.

#![allow(dead_code)]

use assert_cmd::Command;
use serde_json::Value;
pub use tempfile::TempDir;

/// A test environment with isolated data storage.
///
/// Each `TestEnv` creates three temporary directories:
/// - `workspace_dir`: the workspace pmo runs in
/// - `data_dir`: pmo's data (via `PMO_DATA_DIR`)
/// - `config_dir`: system-level config (via `PMO_CONFIG_DIR`)
///
/// The `pmo()` method returns a `Command` with these set per-invocation,
/// making tests parallel-safe.
pub struct TestEnv {
    pub workspace_dir: TempDir,
    pub data_dir: TempDir,
    pub config_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            workspace_dir: TempDir::new().unwrap(),
            data_dir: TempDir::new().unwrap(),
            config_dir: TempDir::new().unwrap(),
        }
    }

    /// Create a new test environment and initialize pmo.
    pub fn init() -> Self {
        let env = Self::new();
        env.pmo().args(["system", "init"]).assert().success();
        env
    }

    /// Get a Command for the pmo binary, acting as the local operator.
    pub fn pmo(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_pmo"));
        cmd.current_dir(self.workspace_dir.path());
        cmd.env("PMO_DATA_DIR", self.data_dir.path());
        cmd.env("PMO_CONFIG_DIR", self.config_dir.path());
        cmd.env_remove("PMO_USER");
        cmd.env_remove("PMO_WORKSPACE");
        cmd.env_remove("PMO_LOG");
        cmd.env_remove("PMO_LOG_FORMAT");
        cmd
    }

    /// Get a Command for the pmo binary acting as `user`.
    pub fn pmo_as(&self, user: &str) -> Command {
        let mut cmd = self.pmo();
        cmd.args(["--as", user]);
        cmd
    }

    pub fn path(&self) -> &std::path::Path {
        self.workspace_dir.path()
    }

    pub fn data_path(&self) -> &std::path::Path {
        self.data_dir.path()
    }

    /// Run a command that must succeed and parse its JSON output.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self.pmo().args(args).assert().success().get_output().clone();
        parse_json(&output.stdout)
    }

    /// Like [`TestEnv::json`], acting as `user`.
    pub fn json_as(&self, user: &str, args: &[&str]) -> Value {
        let output = self
            .pmo_as(user)
            .args(args)
            .assert()
            .success()
            .get_output()
            .clone();
        parse_json(&output.stdout)
    }

    /// Run a create command and return the new record's ID.
    pub fn create(&self, args: &[&str]) -> String {
        self.json(args)["id"]
            .as_str()
            .expect("create output has an id")
            .to_string()
    }

    /// Create a user with the given role and return its ID.
    pub fn user(&self, name: &str, role: &str) -> String {
        let email = format!("{}@agency.gov", name.to_lowercase().replace(' ', "."));
        self.create(&["user", "create", name, "--email", &email, "--role", role])
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse JSON output from a command.
pub fn parse_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("Failed to parse JSON output")
}
