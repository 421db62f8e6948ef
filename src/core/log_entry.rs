//! Log entry structure

use super::log_level::LogLevel;
use chrono::{DateTime, Local};
use std::fmt;

/// Call site a record was emitted from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    pub module_path: &'static str,
    pub file: &'static str,
    pub line: u32,
}

impl Origin {
    pub const fn new(module_path: &'static str, file: &'static str, line: u32) -> Self {
        Self {
            module_path,
            file,
            line,
        }
    }
}

/// Expands to the [`Origin`] of the invoking line.
#[macro_export]
macro_rules! origin {
    () => {
        $crate::core::Origin::new(module_path!(), file!(), line!())
    };
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Local>,
    pub logger: String,
    pub origin: Option<Origin>,
}

impl LogEntry {
    /// Sanitize log message to prevent log injection attacks
    ///
    /// Replaces newlines, carriage returns, and tabs with escape sequences
    /// so a record always occupies exactly one line of output.
    fn sanitize_message(message: &str) -> String {
        message
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }

    pub fn new(level: LogLevel, logger: impl Into<String>, message: &str) -> Self {
        Self {
            level,
            message: Self::sanitize_message(message),
            timestamp: Local::now(),
            logger: logger.into(),
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// `YYYY-MM-DD HH:MM:SS|logger|LEVEL [module|file:line] message`
impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.logger,
            self.level
        )?;
        if let Some(origin) = &self.origin {
            write!(f, " [{}|{}:{}]", origin.module_path, origin.file, origin.line)?;
        }
        write!(f, " {}", self.message)
    }
}
