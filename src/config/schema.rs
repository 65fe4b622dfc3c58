//! KDL schema for config.kdl.
//!
//! ```kdl
//! output-format "human"  // or "json"
//! default-user "usr-a1b2"
//! action-log #true
//! action-log-path "/var/log/pmo/actions.log"
//! ```

use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};

use crate::storage::validate_id;

/// Output format preference for CLI commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON output (default, machine-readable)
    #[default]
    Json,
    /// Human-readable output
    Human,
}

impl OutputFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "human" => Some(OutputFormat::Human),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Human => "human",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Keys accepted in config.kdl, in display order.
pub const CONFIG_KEYS: [&str; 4] = [
    "output-format",
    "default-user",
    "action-log",
    "action-log-path",
];

/// Preferences stored in config.kdl. Unset keys fall through to the next
/// level of precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PmoConfig {
    /// Default output format for CLI commands
    pub output_format: Option<OutputFormat>,

    /// User ID to act as when `--as` is not given
    pub default_user: Option<String>,

    /// Whether CLI invocations are written to the action log
    pub action_log: Option<bool>,

    /// Override for the action log location
    pub action_log_path: Option<String>,
}

fn first_value<'a>(doc: &'a KdlDocument, name: &str) -> Option<&'a KdlValue> {
    doc.get(name)
        .and_then(|node| node.entries().first())
        .map(|entry| entry.value())
}

fn string_node(name: &str, value: &str) -> KdlNode {
    let mut node = KdlNode::new(name);
    node.push(KdlEntry::new(KdlValue::String(value.to_string())));
    node
}

impl PmoConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config values.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ref user) = self.default_user {
            validate_id(user, "usr").map_err(|e| format!("default-user: {}", e))?;
        }
        if let Some(ref path) = self.action_log_path {
            if path.trim().is_empty() {
                return Err("action-log-path cannot be empty".to_string());
            }
        }
        Ok(())
    }

    /// Parse config from a KDL document. Unknown nodes and mistyped values
    /// are ignored.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        let mut config = Self::new();

        if let Some(s) = first_value(doc, "output-format").and_then(|v| v.as_string()) {
            config.output_format = OutputFormat::parse(s);
        }
        if let Some(s) = first_value(doc, "default-user").and_then(|v| v.as_string()) {
            config.default_user = Some(s.to_string());
        }
        if let Some(b) = first_value(doc, "action-log").and_then(|v| v.as_bool()) {
            config.action_log = Some(b);
        }
        if let Some(s) = first_value(doc, "action-log-path").and_then(|v| v.as_string()) {
            config.action_log_path = Some(s.to_string());
        }

        config
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();

        if let Some(format) = self.output_format {
            doc.nodes_mut()
                .push(string_node("output-format", format.as_str()));
        }
        if let Some(ref user) = self.default_user {
            doc.nodes_mut().push(string_node("default-user", user));
        }
        if let Some(enabled) = self.action_log {
            let mut node = KdlNode::new("action-log");
            node.push(KdlEntry::new(KdlValue::Bool(enabled)));
            doc.nodes_mut().push(node);
        }
        if let Some(ref path) = self.action_log_path {
            doc.nodes_mut().push(string_node("action-log-path", path));
        }

        doc
    }

    /// Merge another config into this one; set values in `other` win.
    pub fn merge(&mut self, other: &PmoConfig) {
        if other.output_format.is_some() {
            self.output_format = other.output_format;
        }
        if other.default_user.is_some() {
            self.default_user = other.default_user.clone();
        }
        if other.action_log.is_some() {
            self.action_log = other.action_log;
        }
        if other.action_log_path.is_some() {
            self.action_log_path = other.action_log_path.clone();
        }
    }

    /// Current value of `key` as a string, if set.
    pub fn get(&self, key: &str) -> Result<Option<String>, String> {
        match key {
            "output-format" => Ok(self.output_format.map(|f| f.as_str().to_string())),
            "default-user" => Ok(self.default_user.clone()),
            "action-log" => Ok(self.action_log.map(|b| b.to_string())),
            "action-log-path" => Ok(self.action_log_path.clone()),
            _ => Err(unknown_key(key)),
        }
    }

    /// Set `key` from its string form. An empty value unsets the key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        let value = value.trim();
        let unset = value.is_empty();
        match key {
            "output-format" => {
                self.output_format = if unset {
                    None
                } else {
                    Some(OutputFormat::parse(value).ok_or_else(|| {
                        format!("output-format must be 'json' or 'human', got '{}'", value)
                    })?)
                };
            }
            "default-user" => {
                self.default_user = (!unset).then(|| value.to_string());
            }
            "action-log" => {
                self.action_log = if unset {
                    None
                } else {
                    Some(parse_bool(value).ok_or_else(|| {
                        format!("action-log must be true or false, got '{}'", value)
                    })?)
                };
            }
            "action-log-path" => {
                self.action_log_path = (!unset).then(|| value.to_string());
            }
            _ => return Err(unknown_key(key)),
        }
        self.validate()
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn unknown_key(key: &str) -> String {
    format!(
        "Unknown config key '{}' (expected one of: {})",
        key,
        CONFIG_KEYS.join(", ")
    )
}
