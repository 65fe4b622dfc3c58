//! Configuration for pmo.
//!
//! Preferences live in `config.kdl` at two levels:
//! - System: `<config dir>/pmo/config.kdl` (or `$PMO_CONFIG_DIR/config.kdl`)
//! - Workspace: `<data dir>/<workspace-hash>/config.kdl`
//!
//! Keys:
//! - `output-format` - "json" or "human"
//! - `default-user` - user ID to act as when `--as` is absent
//! - `action-log` - whether to record CLI invocations (default true)
//! - `action-log-path` - where to record them
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    ConfigOverrides, Resolved, ResolvedConfig, ValueSource, resolve_config, resolve_layers,
};
pub use schema::{CONFIG_KEYS, OutputFormat, PmoConfig};

use kdl::KdlDocument;
use std::fs;
use std::path::{Path, PathBuf};

use crate::storage::Storage;
use crate::{Error, Result};

/// Environment variable overriding the system config directory.
pub const CONFIG_DIR_ENV: &str = "PMO_CONFIG_DIR";

/// File name used at both config levels.
pub const CONFIG_FILE: &str = "config.kdl";

/// Path to the system-level config file, if a config directory is known.
pub fn system_config_path() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir).join(CONFIG_FILE)),
        _ => dirs::config_dir().map(|dir| dir.join("pmo").join(CONFIG_FILE)),
    }
}

/// Path to the workspace-level config file.
pub fn workspace_config_path(storage: &Storage) -> PathBuf {
    storage.root().join(CONFIG_FILE)
}

/// Load a config file. A missing file is an empty config.
pub fn load_config(path: &Path) -> Result<PmoConfig> {
    if !path.exists() {
        return Ok(PmoConfig::default());
    }
    let content = fs::read_to_string(path)?;
    let doc: KdlDocument = content.parse()?;
    Ok(PmoConfig::from_kdl(&doc))
}

/// Validate and write a config file, creating its directory if needed.
pub fn save_config(path: &Path, config: &PmoConfig) -> Result<()> {
    config.validate().map_err(Error::InvalidInput)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut doc = config.to_kdl();
    doc.autoformat();
    fs::write(path, doc.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("config.kdl")).unwrap();
        assert_eq!(config, PmoConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.kdl");
        let config = PmoConfig {
            output_format: Some(OutputFormat::Human),
            action_log: Some(false),
            ..PmoConfig::default()
        };
        save_config(&path, &config).unwrap();
        assert_eq!(load_config(&path).unwrap(), config);
    }

    #[test]
    fn test_save_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        let config = PmoConfig {
            default_user: Some("nobody".to_string()),
            ..PmoConfig::default()
        };
        assert!(save_config(&dir.path().join("config.kdl"), &config).is_err());
    }

    #[test]
    fn test_load_rejects_malformed_kdl() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.kdl");
        fs::write(&path, "output-format \"json").unwrap();
        assert!(matches!(load_config(&path), Err(Error::Config(_))));
    }
}
