//! Audit trail of CLI invocations.
//!
//! Every command run through the `pmo` binary is appended as one JSON line
//! to `<data dir>/<workspace-hash>/action.log`, or to the configured
//! `action-log-path`. Logging never fails the command it records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default log file name under the workspace data directory.
pub const ACTION_LOG_FILE: &str = "action.log";

const MAX_STRING_LEN: usize = 100;
const MAX_ARRAY_LEN: usize = 10;

/// A single action log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLog {
    pub timestamp: DateTime<Utc>,

    /// Workspace the command ran against
    pub workspace: String,

    /// Command name (e.g., "project create", "dashboard")
    pub command: String,

    /// Command arguments, sanitized
    pub args: Value,

    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub duration_ms: u64,

    /// OS account that ran the command
    pub user: String,

    /// pmo user ID the command acted as, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

impl ActionLog {
    /// Build an entry for `command`, sanitizing `args`.
    pub fn new(workspace: &Path, command: &str, args: &Value) -> Self {
        Self {
            timestamp: Utc::now(),
            workspace: workspace.to_string_lossy().to_string(),
            command: command.to_string(),
            args: sanitize_args(args),
            success: true,
            error: None,
            duration_ms: 0,
            user: get_current_user(),
            actor: None,
        }
    }
}

/// Pick the log file: the configured path (with `~` expanded) or the
/// default under `data_root`.
pub fn log_path(configured: Option<&str>, data_root: &Path) -> PathBuf {
    match configured {
        Some(path) => expand_home(Path::new(path)),
        None => data_root.join(ACTION_LOG_FILE),
    }
}

/// Append `entry` to the log at `path`. Failures are reported as warnings.
pub fn log_action(path: &Path, entry: &ActionLog) {
    if let Err(e) = write_log_entry(path, entry) {
        warn!(path = %path.display(), error = %e, "failed to write action log");
    }
}

fn expand_home(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

fn write_log_entry(path: &Path, entry: &ActionLog) -> crate::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string(entry)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", json)?;
    Ok(())
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_lowercase();
    ["password", "token", "secret"]
        .iter()
        .any(|word| key.contains(word))
}

/// Keep the first character of the local part: `alice@agency.gov` becomes
/// `a***@agency.gov`.
fn mask_email(s: &str) -> Option<String> {
    let (local, domain) = s.split_once('@')?;
    if local.is_empty() || domain.is_empty() || s.contains(char::is_whitespace) {
        return None;
    }
    let first = local.chars().next()?;
    Some(format!("{}***@{}", first, domain))
}

/// Remove sensitive data from logged arguments.
///
/// Secrets are redacted, email addresses masked, paths reduced to their
/// basename, and long strings and arrays summarized.
pub fn sanitize_args(args: &Value) -> Value {
    match args {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, value) in map {
                if is_sensitive_key(key) {
                    sanitized.insert(key.clone(), Value::String("[REDACTED]".to_string()));
                } else {
                    sanitized.insert(key.clone(), sanitize_args(value));
                }
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) => {
            if arr.len() > MAX_ARRAY_LEN {
                Value::String(format!("[Array with {} items]", arr.len()))
            } else {
                Value::Array(arr.iter().map(sanitize_args).collect())
            }
        }
        Value::String(s) => {
            if let Some(masked) = mask_email(s) {
                return Value::String(masked);
            }
            let sanitized = if s.contains('/') || s.contains('\\') {
                s.rsplit(['/', '\\']).next().unwrap_or(s).to_string()
            } else {
                s.clone()
            };

            let len = sanitized.chars().count();
            if len > MAX_STRING_LEN {
                let head: String = sanitized.chars().take(MAX_STRING_LEN - 3).collect();
                Value::String(format!("{}... ({} chars)", head, len))
            } else {
                Value::String(sanitized)
            }
        }
        _ => args.clone(),
    }
}

/// Get the current OS user's name.
fn get_current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_simple_string() {
        assert_eq!(sanitize_args(&json!("hello")), json!("hello"));
    }

    #[test]
    fn test_sanitize_file_path() {
        assert_eq!(
            sanitize_args(&json!("/very/long/path/to/report.csv")),
            json!("report.csv")
        );
    }

    #[test]
    fn test_sanitize_long_string() {
        let sanitized = sanitize_args(&json!("é".repeat(150)));
        let Value::String(s) = sanitized else {
            panic!("Expected string value");
        };
        assert!(s.ends_with("... (150 chars)"));
    }

    #[test]
    fn test_sanitize_masks_email() {
        let value = json!({ "name": "Alice", "email": "alice@agency.gov" });
        let sanitized = sanitize_args(&value);
        assert_eq!(sanitized["name"], "Alice");
        assert_eq!(sanitized["email"], "a***@agency.gov");
    }

    #[test]
    fn test_sanitize_sensitive_keys() {
        let value = json!({
            "api_token": "abc123",
            "password": "hunter2",
            "title": "Vendor exit"
        });
        let sanitized = sanitize_args(&value);
        assert_eq!(sanitized["api_token"], "[REDACTED]");
        assert_eq!(sanitized["password"], "[REDACTED]");
        assert_eq!(sanitized["title"], "Vendor exit");
    }

    #[test]
    fn test_sanitize_arrays() {
        let big: Vec<i32> = (0..15).collect();
        assert_eq!(sanitize_args(&json!(big)), json!("[Array with 15 items]"));
        assert_eq!(sanitize_args(&json!([1, 2, 3])), json!([1, 2, 3]));
    }

    #[test]
    fn test_log_path_default_and_configured() {
        let root = Path::new("/data/pmo/abc");
        assert_eq!(log_path(None, root), root.join("action.log"));
        assert_eq!(
            log_path(Some("/var/log/pmo.log"), root),
            PathBuf::from("/var/log/pmo.log")
        );
    }

    #[test]
    fn test_log_action_appends_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("action.log");

        let mut entry = ActionLog::new(dir.path(), "project create", &json!({"name": "Bridge"}));
        entry.actor = Some("usr-a1b2".to_string());
        log_action(&path, &entry);
        entry.success = false;
        entry.error = Some("Permission denied".to_string());
        log_action(&path, &entry);

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: ActionLog = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed.command, "project create");
        assert!(!parsed.success);
        assert_eq!(parsed.actor.as_deref(), Some("usr-a1b2"));
    }
}
