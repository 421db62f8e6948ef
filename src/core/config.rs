//! Process-wide tunables for the log manager

use super::error::{LoggerError, Result};
use super::log_level::LogLevel;
use super::ring_buffer::MAX_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tunables shared by every logger a [`LogManager`](super::LogManager) creates
///
/// `log_directory`, `max_queue_size` and the buffer capacities are read when
/// a logger is created. `max_log_age_ms` is re-read by the scheduler at the
/// start of every cycle.
///
/// # Example
///
/// ```
/// use rust_log_dispatch::LogManagerConfig;
/// use std::time::Duration;
///
/// let config = LogManagerConfig::from_json_str(
///     r#"{ "log_directory": "logs", "max_log_age_ms": 2000 }"#,
/// ).unwrap();
///
/// assert_eq!(config.max_log_age(), Duration::from_secs(2));
/// assert_eq!(config.max_queue_size, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogManagerConfig {
    /// Directory the daily log files are created in
    pub log_directory: PathBuf,
    /// Longest time a buffered record may wait before a forced flush
    pub max_log_age_ms: u64,
    /// Queued record count that triggers an early flush
    pub max_queue_size: usize,
    /// Initial slot count of each file appender's ring buffer
    pub initial_buffer_capacity: usize,
    /// Slot count a file appender's ring buffer may never grow past
    pub max_buffer_capacity: usize,
    /// Records below this level are discarded by the logger
    pub min_level: LogLevel,
    /// Color console output by severity
    pub console_colors: bool,
    /// Gzip the previous day's file after rotating away from it
    pub compress_rotated: bool,
}

impl Default for LogManagerConfig {
    fn default() -> Self {
        Self {
            log_directory: PathBuf::from("./"),
            max_log_age_ms: 5_000,
            max_queue_size: 100,
            initial_buffer_capacity: 32,
            max_buffer_capacity: MAX_CAPACITY,
            min_level: LogLevel::Trace,
            console_colors: true,
            compress_rotated: false,
        }
    }
}

impl LogManagerConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document; missing fields take their defaults
    ///
    /// # Errors
    ///
    /// Returns `JsonError` for malformed input and `InvalidConfiguration`
    /// if the parsed values fail [`validate`](Self::validate).
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    ///
    /// # Errors
    ///
    /// Returns `IoOperation` if the file cannot be read, otherwise the same
    /// errors as [`from_json_str`](Self::from_json_str).
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LoggerError::io_operation(
                "reading logger configuration",
                format!("Failed to read '{}'", path.display()),
                e,
            )
        })?;
        Self::from_json_str(&content)
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_log_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_directory = dir.into();
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_log_age(mut self, age: Duration) -> Self {
        self.max_log_age_ms = u64::try_from(age.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_buffer_capacity(mut self, initial: usize, max: usize) -> Self {
        self.initial_buffer_capacity = initial;
        self.max_buffer_capacity = max;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_console_colors(mut self, enabled: bool) -> Self {
        self.console_colors = enabled;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress_rotated = enabled;
        self
    }

    #[must_use]
    pub fn max_log_age(&self) -> Duration {
        Duration::from_millis(self.max_log_age_ms)
    }

    /// Check that the tunables describe a working configuration
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.max_log_age_ms == 0 {
            return Err(LoggerError::config(
                "LogManagerConfig",
                "max_log_age_ms must be greater than zero",
            ));
        }
        if self.max_queue_size == 0 {
            return Err(LoggerError::config(
                "LogManagerConfig",
                "max_queue_size must be greater than zero",
            ));
        }
        if self.max_buffer_capacity == 0 || self.max_buffer_capacity > MAX_CAPACITY {
            return Err(LoggerError::config(
                "LogManagerConfig",
                format!(
                    "max_buffer_capacity must be between 1 and {}, got {}",
                    MAX_CAPACITY, self.max_buffer_capacity
                ),
            ));
        }
        if self.initial_buffer_capacity > self.max_buffer_capacity {
            return Err(LoggerError::config(
                "LogManagerConfig",
                format!(
                    "initial_buffer_capacity {} exceeds max_buffer_capacity {}",
                    self.initial_buffer_capacity, self.max_buffer_capacity
                ),
            ));
        }
        if self.log_directory.as_os_str().is_empty() {
            return Err(LoggerError::config(
                "LogManagerConfig",
                "log_directory must not be empty",
            ));
        }
        Ok(())
    }
}
