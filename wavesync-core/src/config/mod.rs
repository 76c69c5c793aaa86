//! Configuration for wavesync
//!
//! Defaults, a TOML file, and `WAVESYNC_*` environment overrides, validated
//! before use.

use crate::core_channel::ReturnCode;
use crate::logging::{LogConfig, LogLevel};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;

mod error;

pub use error::ConfigError;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub channel: ChannelConfig,
    pub driver: DriverConfig,
    pub logging: LoggingConfig,
}

/// Delta channel settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Nack codes that call for a resync instead of a receiver nack
    pub recoverable_codes: Vec<ReturnCode>,

    /// Upper bound on server input held back behind an outstanding
    /// submission; exceeding it fails the channel
    pub max_deferred: usize,
}

/// Event-loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Faults buffered for the owner before new ones are dropped
    pub fault_capacity: usize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            recoverable_codes: vec![ReturnCode::TooOld],
            max_deferred: 1024,
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { fault_capacity: 64 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    /// Settings for `logging::init_logging_with_config`
    pub fn to_log_config(&self) -> Result<LogConfig, ConfigError> {
        let level = LogLevel::from_str(&self.level).ok_or_else(|| {
            ConfigError::ValidationFailed(format!("Invalid log level: {}", self.level))
        })?;
        Ok(LogConfig::new(level)
            .with_timestamp(self.with_timestamp)
            .with_target(self.with_target)
            .json_format(self.json_format))
    }
}

fn parse_var<T>(var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                var,
                reason: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

fn parse_codes(var: &'static str, raw: &str) -> Result<Vec<ReturnCode>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            ReturnCode::from_str(s).ok_or_else(|| ConfigError::InvalidValue {
                var,
                reason: format!("unknown return code {}", s),
            })
        })
        .collect()
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Variables follow the pattern WAVESYNC_<SECTION>_<KEY>, for example
    /// `WAVESYNC_CHANNEL_MAX_DEFERRED=256` or
    /// `WAVESYNC_CHANNEL_RECOVERABLE_CODES=TOO_OLD,VERSION_ERROR`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `WAVESYNC_*` variables on top of this configuration
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        const CODES: &str = "WAVESYNC_CHANNEL_RECOVERABLE_CODES";
        if let Ok(raw) = env::var(CODES) {
            self.channel.recoverable_codes = parse_codes(CODES, &raw)?;
        }
        if let Some(max) = parse_var("WAVESYNC_CHANNEL_MAX_DEFERRED")? {
            self.channel.max_deferred = max;
        }
        if let Some(capacity) = parse_var("WAVESYNC_DRIVER_FAULT_CAPACITY")? {
            self.driver.fault_capacity = capacity;
        }
        if let Ok(level) = env::var("WAVESYNC_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = parse_var("WAVESYNC_LOG_JSON")? {
            self.logging.json_format = json;
        }
        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel.max_deferred == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_deferred must be greater than 0".to_string(),
            ));
        }

        if self.channel.recoverable_codes.contains(&ReturnCode::Ok) {
            return Err(ConfigError::ValidationFailed(
                "OK cannot be a recoverable nack code".to_string(),
            ));
        }

        if self.driver.fault_capacity == 0 {
            return Err(ConfigError::ValidationFailed(
                "fault_capacity must be greater than 0".to_string(),
            ));
        }

        self.logging.to_log_config()?;
        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;

        std::fs::write(path, contents).map_err(|source| ConfigError::FileWrite {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.channel.recoverable_codes, vec![ReturnCode::TooOld]);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.channel.max_deferred = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.channel.recoverable_codes.push(ReturnCode::Ok);
        assert!(config.validate().is_err());

        config = Config::default();
        config.driver.fault_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_validation() {
        let mut config = Config::default();

        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [channel]
            recoverable_codes = ["TOO_OLD", "VERSION_ERROR"]
            "#,
        )
        .unwrap();

        assert_eq!(
            config.channel.recoverable_codes,
            vec![ReturnCode::TooOld, ReturnCode::VersionError]
        );
        assert_eq!(config.channel.max_deferred, 1024);
        assert_eq!(config.driver, DriverConfig::default());
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wavesync.toml");

        let mut config = Config::default();
        config.channel.max_deferred = 16;
        config.logging.json_format = true;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = Config::from_file("/nonexistent/wavesync.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }

    #[test]
    fn test_parse_codes() {
        assert_eq!(
            parse_codes("X", "too_old, VERSION_ERROR,").unwrap(),
            vec![ReturnCode::TooOld, ReturnCode::VersionError]
        );
        assert!(matches!(
            parse_codes("X", "TOO_OLD,BOGUS"),
            Err(ConfigError::InvalidValue { var: "X", .. })
        ));
    }
}
