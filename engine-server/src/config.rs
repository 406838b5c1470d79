use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use engine_dispatch::{DispatcherConfig, GroupConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub dispatch: DispatchConfig,
    pub groups: GroupsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DispatchConfig {
    /// Seconds before an executing leaf task is forcibly terminated.
    pub default_task_timeout_secs: u64,
    /// Milliseconds between a parent's polls of its running children.
    pub queue_poll_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GroupsConfig {
    /// `max_parallelism` for groups not named in `overrides`.
    pub default_max_parallelism: usize,
    /// Per-group `max_parallelism`, keyed by group id.
    #[serde(default)]
    pub overrides: HashMap<String, usize>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (pretty, json, compact)
    pub format: LogFormat,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

impl Config {
    /// Load configuration from the built-in defaults, an optional
    /// `CONFIG_FILE`, and `ENGINE_`-prefixed environment overrides.
    pub fn from_env() -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        builder = builder.add_source(File::from_str(
            include_str!("../config/default.toml"),
            FileFormat::Toml,
        ));

        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(
                File::with_name(&config_file)
                    .required(false)
                    .format(FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("ENGINE")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build().context("failed to build configuration")?;

        let mut result: Config = config
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        if let Ok(log_level) = env::var("LOG_LEVEL") {
            result.logging.level = log_level;
        }

        Ok(result)
    }

    /// Load configuration from a specific file path.
    pub fn from_file(path: &str) -> Result<Self> {
        let builder = ConfigBuilder::builder()
            .add_source(File::with_name(path).format(FileFormat::Toml))
            .add_source(
                Environment::with_prefix("ENGINE")
                    .separator("_")
                    .try_parsing(true),
            );

        let config = builder
            .build()
            .context("failed to build configuration from file")?;

        config
            .try_deserialize()
            .context("failed to deserialize configuration from file")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(anyhow::anyhow!(
                    "invalid log level: {}. must be one of: trace, debug, info, warn, error",
                    self.logging.level
                ));
            }
        }

        if self.dispatch.default_task_timeout_secs == 0 {
            return Err(anyhow::anyhow!("dispatch.default_task_timeout_secs must be greater than 0"));
        }

        if self.dispatch.queue_poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("dispatch.queue_poll_interval_ms must be greater than 0"));
        }

        if self.groups.default_max_parallelism == 0 {
            return Err(anyhow::anyhow!("groups.default_max_parallelism must be greater than 0"));
        }

        for (group_id, cap) in &self.groups.overrides {
            if *cap == 0 {
                return Err(anyhow::anyhow!("groups.overrides[{group_id}] must be greater than 0"));
            }
        }

        Ok(())
    }

    /// Build a [`DispatcherConfig`] from the `[dispatch]` table.
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            default_task_timeout: Duration::from_secs(self.dispatch.default_task_timeout_secs),
            queue_poll_interval: Duration::from_millis(self.dispatch.queue_poll_interval_ms),
        }
    }

    /// Build a [`GroupConfig`] from the `[groups]` table.
    pub fn group_config(&self) -> GroupConfig {
        let mut config = GroupConfig::new(self.groups.default_max_parallelism);
        for (group_id, cap) in &self.groups.overrides {
            config = config.with_cap(group_id.clone(), *cap);
        }
        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dispatch: DispatchConfig {
                default_task_timeout_secs: 3600,
                queue_poll_interval_ms: 100,
            },
            groups: GroupsConfig {
                default_max_parallelism: 32,
                overrides: HashMap::new(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.dispatch.default_task_timeout_secs, 3600);
        assert_eq!(config.dispatch.queue_poll_interval_ms, 100);
        assert_eq!(config.groups.default_max_parallelism, 32);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());

        let mut invalid_config = Config::default();
        invalid_config.logging.level = "invalid".to_string();
        assert!(invalid_config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.dispatch.default_task_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_group_override_rejected() {
        let mut config = Config::default();
        config.groups.overrides.insert("batch".to_string(), 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dispatcher_config_conversion() {
        let config = Config::default();
        let dispatcher_config = config.dispatcher_config();
        assert_eq!(dispatcher_config.default_task_timeout, Duration::from_secs(3600));
        assert_eq!(dispatcher_config.queue_poll_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_group_config_applies_overrides() {
        let mut config = Config::default();
        config.groups.overrides.insert("batch".to_string(), 4);
        let group_config = config.group_config();
        let _ = group_config;
    }
}
