//! Engine configuration.
//!
//! Loaded from YAML files and environment variables with the `config` crate.
//! Every field has a default, so an absent file means default behavior.

use std::time::Duration;

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "entity.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "ENTITY_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "ENTITY";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "ENTITY_LOG";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(#[from] ::config::ConfigError),
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub replay: ReplayConfig,
    pub entity: EntityDefaults,
}

/// Event replay settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Reject stored events whose sequence number is not exactly one past the
    /// last applied event.
    pub enforce_sequence: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            enforce_sequence: true,
        }
    }
}

/// Defaults applied to entities that don't set their own.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EntityDefaults {
    pub passivation_timeout_secs: Option<u64>,
}

impl EntityDefaults {
    pub fn passivation_timeout(&self) -> Option<Duration> {
        self.passivation_timeout_secs.map(Duration::from_secs)
    }
}

impl EngineConfig {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `entity.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix, e.g.
    ///    `ENTITY__REPLAY__ENFORCE_SEQUENCE=false`
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config, Environment, File, FileFormat};

        let mut builder = Config::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        use ::config::{Config, File, FileFormat};

        let config = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_config_default() {
        let config = EngineConfig::default();
        assert!(config.replay.enforce_sequence);
        assert!(config.entity.passivation_timeout().is_none());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
replay:
  enforce_sequence: false
entity:
  passivation_timeout_secs: 90
"#;
        let config = EngineConfig::from_yaml(yaml).unwrap();
        assert!(!config.replay.enforce_sequence);
        assert_eq!(
            config.entity.passivation_timeout(),
            Some(Duration::from_secs(90))
        );
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = EngineConfig::from_yaml("entity:\n  passivation_timeout_secs: 5\n").unwrap();
        assert!(config.replay.enforce_sequence);
        assert_eq!(config.entity.passivation_timeout_secs, Some(5));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "replay:\n  enforce_sequence: false").unwrap();

        let config = EngineConfig::load(file.path().to_str()).unwrap();
        assert!(!config.replay.enforce_sequence);
    }

    #[test]
    fn test_load_missing_path_fails() {
        let result = EngineConfig::load(Some("/nonexistent/entity-dispatch.yaml"));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_malformed_yaml_fails() {
        let result = EngineConfig::from_yaml("replay:\n  enforce_sequence: [not, a, bool]\n");
        assert!(result.is_err());
    }
}
