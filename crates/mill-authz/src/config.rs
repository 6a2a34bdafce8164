//! Configuration for the decision service
//!
//! Loads configuration from:
//! 1. config.yaml - policy file location and logging settings
//! 2. .env file - local overrides for the variables below
//!
//! Environment variables always override config.yaml values.

use mill_policy::PolicyFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Policy document location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub path: String,

    /// Document format: "json", "yaml" or "auto" (by file extension)
    pub format: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            path: "policies.yaml".to_string(),
            format: "auto".to_string(),
        }
    }
}

impl PolicyConfig {
    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }

    pub fn resolve_format(&self) -> Result<PolicyFormat, ConfigError> {
        match self.format.to_ascii_lowercase().as_str() {
            "json" => Ok(PolicyFormat::Json),
            "yaml" | "yml" => Ok(PolicyFormat::Yaml),
            "auto" => PolicyFormat::from_path(&self.path).ok_or_else(|| ConfigError::InvalidValue {
                key: "policy.path",
                value: self.path.clone(),
            }),
            _ => Err(ConfigError::InvalidValue {
                key: "policy.format",
                value: self.format.clone(),
            }),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific
    pub level: String,

    /// Output format: pretty, json, compact
    pub format: String,

    /// Output destination: stderr, file, both
    pub output: String,

    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
            output: "stderr".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub policy: PolicyConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from YAML file with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file means defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            return Self::load(path);
        }
        let mut config = Config::default();
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("MILL_POLICY_PATH") {
            self.policy.path = path;
        }
        if let Ok(format) = std::env::var("MILL_POLICY_FORMAT") {
            self.policy.format = format;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            self.logging.output = output;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.logging.directory = dir;
        }
    }

    /// Set logging environment variables for the logging module
    pub fn apply_logging_env(&self) {
        std::env::set_var("RUST_LOG", &self.logging.level);
        std::env::set_var("LOG_FORMAT", &self.logging.format);
        std::env::set_var("LOG_OUTPUT", &self.logging.output);
        std::env::set_var("LOG_DIR", &self.logging.directory);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.policy.path, "policies.yaml");
        assert_eq!(config.policy.format, "auto");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "compact");
        assert_eq!(config.logging.output, "stderr");
    }

    #[test]
    fn test_resolve_format() {
        let mut policy = PolicyConfig::default();
        assert_eq!(policy.resolve_format().unwrap(), PolicyFormat::Yaml);

        policy.path = "rules.json".to_string();
        assert_eq!(policy.resolve_format().unwrap(), PolicyFormat::Json);

        policy.path = "rules.txt".to_string();
        assert!(policy.resolve_format().is_err());

        policy.format = "YAML".to_string();
        assert_eq!(policy.resolve_format().unwrap(), PolicyFormat::Yaml);

        policy.format = "toml".to_string();
        assert!(matches!(
            policy.resolve_format(),
            Err(ConfigError::InvalidValue { key: "policy.format", .. })
        ));
    }

    #[test]
    fn test_env_var_override() {
        std::env::set_var("MILL_POLICY_PATH", "/etc/mill/policies.json");
        std::env::set_var("MILL_POLICY_FORMAT", "json");

        let config_yaml = r#"
policy:
  path: "policies.yaml"
  format: "auto"
logging:
  level: "info"
  format: "pretty"
  output: "stderr"
  directory: "./logs"
"#;
        let temp_file = std::env::temp_dir().join("mill_authz_test_config.yaml");
        std::fs::write(&temp_file, config_yaml).unwrap();

        let config = Config::load(&temp_file).unwrap();
        assert_eq!(config.policy.path, "/etc/mill/policies.json"); // Overridden
        assert_eq!(config.policy.format, "json"); // Overridden

        std::env::remove_var("MILL_POLICY_PATH");
        std::env::remove_var("MILL_POLICY_FORMAT");
        std::fs::remove_file(temp_file).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_yaml::from_str("logging:\n  level: debug\n").unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.output, "stderr");
        assert_eq!(config.policy.format, "auto");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("mill_authz_no_such_config.yaml");
        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config.logging.directory, "./logs");
    }
}
