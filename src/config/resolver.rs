//! Precedence resolution for configuration.
//!
//! Precedence (highest to lowest):
//!
//! 1. CLI flags and their environment variables
//! 2. Workspace config.kdl (`<data dir>/<workspace-hash>/config.kdl`)
//! 3. System config.kdl (`<config dir>/pmo/config.kdl`)
//! 4. Built-in defaults

use super::{OutputFormat, PmoConfig, load_config, system_config_path, workspace_config_path};
use crate::Result;
use crate::storage::Storage;

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from CLI flag (or the flag's environment variable)
    CliFlag,
    /// Value from workspace-level config
    Workspace,
    /// Value from system-level config
    System,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::Workspace => write!(f, "workspace"),
            ValueSource::System => write!(f, "system"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub output_format: Resolved<OutputFormat>,
    /// Acting user; `None` means the local operator
    pub default_user: Option<Resolved<String>>,
    pub action_log: Resolved<bool>,
    pub action_log_path: Option<Resolved<String>>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            output_format: Resolved::new(OutputFormat::Json, ValueSource::Default),
            default_user: None,
            action_log: Resolved::new(true, ValueSource::Default),
            action_log_path: None,
        }
    }
}

impl ResolvedConfig {
    pub fn output_format(&self) -> OutputFormat {
        self.output_format.value
    }

    pub fn default_user(&self) -> Option<&str> {
        self.default_user.as_ref().map(|r| r.value.as_str())
    }

    pub fn action_log_enabled(&self) -> bool {
        self.action_log.value
    }

    pub fn action_log_path(&self) -> Option<&str> {
        self.action_log_path.as_ref().map(|r| r.value.as_str())
    }
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub output_format: Option<OutputFormat>,
    pub acting_user: Option<String>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn with_acting_user(mut self, user: impl Into<String>) -> Self {
        self.acting_user = Some(user.into());
        self
    }
}

/// Pick the highest-precedence value among the three layers.
fn pick<T: Clone>(
    cli: Option<&T>,
    workspace: Option<&T>,
    system: Option<&T>,
) -> Option<Resolved<T>> {
    if let Some(v) = cli {
        Some(Resolved::new(v.clone(), ValueSource::CliFlag))
    } else if let Some(v) = workspace {
        Some(Resolved::new(v.clone(), ValueSource::Workspace))
    } else {
        system.map(|v| Resolved::new(v.clone(), ValueSource::System))
    }
}

/// Resolve already-loaded config layers.
pub fn resolve_layers(
    system: &PmoConfig,
    workspace: &PmoConfig,
    overrides: &ConfigOverrides,
) -> ResolvedConfig {
    let mut result = ResolvedConfig::default();

    if let Some(format) = pick(
        overrides.output_format.as_ref(),
        workspace.output_format.as_ref(),
        system.output_format.as_ref(),
    ) {
        result.output_format = format;
    }

    result.default_user = pick(
        overrides.acting_user.as_ref(),
        workspace.default_user.as_ref(),
        system.default_user.as_ref(),
    );

    if let Some(enabled) = pick(
        None,
        workspace.action_log.as_ref(),
        system.action_log.as_ref(),
    ) {
        result.action_log = enabled;
    }

    result.action_log_path = pick(
        None,
        workspace.action_log_path.as_ref(),
        system.action_log_path.as_ref(),
    );

    result
}

/// Resolve configuration for a workspace with full precedence chain.
pub fn resolve_config(storage: &Storage, overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    let system = match system_config_path() {
        Some(path) => load_config(&path)?,
        None => PmoConfig::default(),
    };
    let workspace = load_config(&workspace_config_path(storage))?;
    Ok(resolve_layers(&system, &workspace, overrides))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CONFIG_DIR_ENV, save_config};
    use crate::test_utils::TestEnv;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_value_source_display() {
        assert_eq!(ValueSource::CliFlag.to_string(), "cli");
        assert_eq!(ValueSource::Workspace.to_string(), "workspace");
        assert_eq!(ValueSource::System.to_string(), "system");
        assert_eq!(ValueSource::Default.to_string(), "default");
    }

    #[test]
    fn test_resolve_defaults() {
        let config = resolve_layers(
            &PmoConfig::default(),
            &PmoConfig::default(),
            &ConfigOverrides::default(),
        );
        assert_eq!(config.output_format(), OutputFormat::Json);
        assert_eq!(config.output_format.source, ValueSource::Default);
        assert_eq!(config.default_user(), None);
        assert!(config.action_log_enabled());
        assert_eq!(config.action_log_path(), None);
    }

    #[test]
    fn test_workspace_overrides_system() {
        let system = PmoConfig {
            output_format: Some(OutputFormat::Human),
            default_user: Some("usr-0001".to_string()),
            action_log: Some(false),
            ..PmoConfig::default()
        };
        let workspace = PmoConfig {
            default_user: Some("usr-0002".to_string()),
            ..PmoConfig::default()
        };

        let config = resolve_layers(&system, &workspace, &ConfigOverrides::default());
        assert_eq!(config.output_format(), OutputFormat::Human);
        assert_eq!(config.output_format.source, ValueSource::System);
        assert_eq!(config.default_user(), Some("usr-0002"));
        assert_eq!(
            config.default_user.as_ref().unwrap().source,
            ValueSource::Workspace
        );
        assert!(!config.action_log_enabled());
    }

    #[test]
    fn test_cli_overrides_everything() {
        let workspace = PmoConfig {
            output_format: Some(OutputFormat::Json),
            default_user: Some("usr-0002".to_string()),
            ..PmoConfig::default()
        };
        let overrides = ConfigOverrides::new()
            .with_output_format(OutputFormat::Human)
            .with_acting_user("usr-0003");

        let config = resolve_layers(&PmoConfig::default(), &workspace, &overrides);
        assert_eq!(config.output_format(), OutputFormat::Human);
        assert_eq!(config.output_format.source, ValueSource::CliFlag);
        assert_eq!(config.default_user(), Some("usr-0003"));
    }

    #[test]
    #[serial]
    fn test_resolve_config_reads_files() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        let system_dir = TempDir::new().unwrap();

        save_config(
            &system_dir.path().join("config.kdl"),
            &PmoConfig {
                output_format: Some(OutputFormat::Human),
                ..PmoConfig::default()
            },
        )
        .unwrap();
        save_config(
            &workspace_config_path(&storage),
            &PmoConfig {
                default_user: Some("usr-0009".to_string()),
                ..PmoConfig::default()
            },
        )
        .unwrap();

        // SAFETY: serialized with other env-mutating tests.
        unsafe { std::env::set_var(CONFIG_DIR_ENV, system_dir.path()) };
        let config = resolve_config(&storage, &ConfigOverrides::default());
        unsafe { std::env::remove_var(CONFIG_DIR_ENV) };

        let config = config.unwrap();
        assert_eq!(config.output_format(), OutputFormat::Human);
        assert_eq!(config.output_format.source, ValueSource::System);
        assert_eq!(config.default_user(), Some("usr-0009"));
    }
}
