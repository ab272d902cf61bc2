use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Layer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub bridge: BridgeConfig,
    pub commands: CommandConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// `listenerID` used by the registry's own store bindings
    pub state_listener_id: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            state_listener_id: "liveroom-state".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Seat application timeout when the caller does not pass one
    pub default_apply_timeout_secs: u64,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            default_apply_timeout_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // LIVEROOM_LOGGING__LEVEL, LIVEROOM_COMMANDS__DEFAULT_APPLY_TIMEOUT_SECS, ...
        builder = builder.add_source(
            Environment::with_prefix("LIVEROOM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Check values that deserialize fine but cannot work
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!(
                "logging.format must be \"json\" or \"pretty\", got \"{}\"",
                self.logging.format
            ));
        }

        if self.bridge.state_listener_id.trim().is_empty() {
            errors.push("bridge.state_listener_id must not be empty".to_string());
        }

        if self.commands.default_apply_timeout_secs == 0 {
            errors.push("commands.default_apply_timeout_secs must be greater than zero".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bridge.state_listener_id, "liveroom-state");
        assert_eq!(config.commands.default_apply_timeout_secs, 60);
    }

    #[test]
    fn test_validate_collects_every_error() {
        let config = Config {
            logging: LoggingConfig {
                format: "xml".to_string(),
                ..LoggingConfig::default()
            },
            bridge: BridgeConfig {
                state_listener_id: " ".to_string(),
            },
            commands: CommandConfig {
                default_apply_timeout_secs: 0,
            },
        };

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[logging]\nlevel = \"debug\"\n\n[commands]\ndefault_apply_timeout_secs = 15"
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = Config::from_file(&path).unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.commands.default_apply_timeout_secs, 15);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load(Some("/nonexistent/liveroom.toml")).unwrap();
        assert_eq!(config.bridge.state_listener_id, "liveroom-state");
    }
}
