//! Config commands: read and write the workspace `config.kdl`.

use serde::Serialize;
use tracing::info;

use super::{Output, json};
use crate::config::{
    CONFIG_KEYS, ConfigOverrides, PmoConfig, Resolved, load_config, resolve_config, save_config,
    workspace_config_path,
};
use crate::storage::{Storage, validate_id};
use crate::{Error, Result};

/// One config key with its value in the workspace file.
#[derive(Serialize)]
pub struct ConfigValue {
    pub key: String,
    pub value: Option<String>,
}

impl Output for ConfigValue {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        match self.value {
            Some(ref v) => format!("{} = {}", self.key, v),
            None => format!("{} is not set", self.key),
        }
    }
}

/// Resolved value of one key and the layer it came from.
#[derive(Serialize)]
pub struct ConfigEntry {
    pub key: &'static str,
    pub value: Option<String>,
    pub source: String,
}

#[derive(Serialize)]
pub struct ConfigList {
    pub path: String,
    pub entries: Vec<ConfigEntry>,
}

impl Output for ConfigList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!("Workspace config: {}", self.path)];
        for e in &self.entries {
            lines.push(format!(
                "  {:<16} {:<24} ({})",
                e.key,
                e.value.as_deref().unwrap_or("-"),
                e.source
            ));
        }
        lines.join("\n")
    }
}

fn check_key(key: &str) -> Result<()> {
    if CONFIG_KEYS.contains(&key) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "Unknown config key '{}'. Valid keys: {}",
            key,
            CONFIG_KEYS.join(", ")
        )))
    }
}

/// Read a key from the workspace config file.
pub fn config_get(storage: &Storage, key: &str) -> Result<ConfigValue> {
    check_key(key)?;
    let config = load_config(&workspace_config_path(storage))?;
    let value = config.get(key).map_err(Error::InvalidInput)?;
    Ok(ConfigValue {
        key: key.to_string(),
        value,
    })
}

/// Set a key in the workspace config file. An empty value unsets it.
pub fn config_set(storage: &Storage, key: &str, value: &str) -> Result<ConfigValue> {
    check_key(key)?;
    let path = workspace_config_path(storage);
    let mut config: PmoConfig = load_config(&path)?;
    config.set(key, value).map_err(Error::InvalidInput)?;

    if key == "default-user" {
        if let Some(ref user) = config.default_user {
            validate_id(user, "usr")?;
            storage.get_user(user)?;
        }
    }
    save_config(&path, &config)?;
    info!(key, "updated workspace config");

    Ok(ConfigValue {
        key: key.to_string(),
        value: config.get(key).map_err(Error::InvalidInput)?,
    })
}

fn entry<T>(
    key: &'static str,
    resolved: Option<&Resolved<T>>,
    show: impl Fn(&T) -> String,
) -> ConfigEntry {
    match resolved {
        Some(r) => ConfigEntry {
            key,
            value: Some(show(&r.value)),
            source: r.source.to_string(),
        },
        None => ConfigEntry {
            key,
            value: None,
            source: "unset".to_string(),
        },
    }
}

/// Every key's effective value and where it came from.
pub fn config_list(storage: &Storage, overrides: &ConfigOverrides) -> Result<ConfigList> {
    let resolved = resolve_config(storage, overrides)?;
    let entries = vec![
        entry("output-format", Some(&resolved.output_format), |f| {
            f.as_str().to_string()
        }),
        entry("default-user", resolved.default_user.as_ref(), String::clone),
        entry("action-log", Some(&resolved.action_log), |b| b.to_string()),
        entry(
            "action-log-path",
            resolved.action_log_path.as_ref(),
            String::clone,
        ),
    ];
    Ok(ConfigList {
        path: workspace_config_path(storage).display().to_string(),
        entries,
    })
}
