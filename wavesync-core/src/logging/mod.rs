//! Logging setup
//!
//! Everything in the crate logs through `tracing`. Binaries call
//! [`init_logging_with_config`] once at startup; output goes to stderr so
//! that stdout stays free for command results. `WAVESYNC_LOG` (an
//! `EnvFilter` directive string) overrides the configured level.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

mod error;
mod level;

pub use error::LoggingError;
pub use level::LogLevel;

/// Environment variable holding filter directives
pub const LOG_FILTER_ENV: &str = "WAVESYNC_LOG";

/// Configuration for the logging subsystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LogLevel,
    pub with_timestamp: bool,
    pub with_target: bool,
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            with_timestamp: true,
            with_target: true,
            json_format: false,
        }
    }
}

impl LogConfig {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    pub fn with_timestamp(mut self, enabled: bool) -> Self {
        self.with_timestamp = enabled;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }

    fn filter(&self) -> Result<EnvFilter, LoggingError> {
        match std::env::var(LOG_FILTER_ENV) {
            Ok(directives) => EnvFilter::try_new(&directives).map_err(|e| {
                LoggingError::InvalidConfiguration(format!("{}: {}", LOG_FILTER_ENV, e))
            }),
            Err(_) => Ok(EnvFilter::default().add_directive(self.level.to_level_filter().into())),
        }
    }

    fn layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let base = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(self.with_target);

        match (self.json_format, self.with_timestamp) {
            (true, true) => base.json().boxed(),
            (true, false) => base.json().without_time().boxed(),
            (false, true) => base.boxed(),
            (false, false) => base.without_time().boxed(),
        }
    }
}

/// Initialize logging with the default configuration
///
/// # Example
/// ```
/// use wavesync_core::logging::init_logging;
///
/// init_logging().expect("Failed to initialize logging");
/// ```
pub fn init_logging() -> Result<(), LoggingError> {
    init_logging_with_config(LogConfig::default())
}

/// Initialize logging with a custom configuration
///
/// # Example
/// ```
/// use wavesync_core::logging::{init_logging_with_config, LogConfig, LogLevel};
///
/// let config = LogConfig::new(LogLevel::Debug)
///     .with_timestamp(false)
///     .with_target(false);
///
/// init_logging_with_config(config).expect("Failed to initialize logging");
/// ```
pub fn init_logging_with_config(config: LogConfig) -> Result<(), LoggingError> {
    let filter = config.filter()?;

    tracing_subscriber::registry()
        .with(config.layer())
        .with(filter)
        .try_init()
        .map_err(|e| LoggingError::InitializationFailed(e.to_string()))
}
