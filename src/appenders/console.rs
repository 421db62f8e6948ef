//! Console appender implementation

use crate::core::{Appender, LogEntry, LoggerError, Result};
use chrono::{DateTime, Local};
use colored::Colorize;
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

/// Unbuffered appender that writes each record to a terminal stream as soon
/// as it is logged, colored by severity.
pub struct ConsoleAppender {
    name: String,
    use_colors: bool,
    writer: Mutex<Box<dyn Write + Send>>,
    disposed: AtomicBool,
}

impl ConsoleAppender {
    /// Console appender for logger `name` writing to stdout
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_writer(name, Box::new(io::stdout()))
    }

    /// Console appender writing to an arbitrary stream
    ///
    /// # Example
    ///
    /// ```
    /// use rust_log_dispatch::appenders::ConsoleAppender;
    ///
    /// let appender = ConsoleAppender::with_writer("Worker", Box::new(std::io::stderr()))
    ///     .with_colors(false);
    /// ```
    pub fn with_writer(name: impl Into<String>, writer: Box<dyn Write + Send>) -> Self {
        Self {
            name: name.into(),
            use_colors: true,
            writer: Mutex::new(writer),
            disposed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    fn write_line(&self, line: &str) -> Result<()> {
        let mut writer = self.writer.lock();
        writeln!(writer, "{}", line).map_err(|e| {
            LoggerError::io_operation("writing to console", format!("logger '{}'", self.name), e)
        })
    }
}

impl Appender for ConsoleAppender {
    fn enqueue(&self, entry: &LogEntry) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(LoggerError::disposed(self.name.clone()));
        }

        let line = entry.to_string();
        if self.use_colors {
            // The escape sequence is reset at the end of the line, so the
            // stream's prior color is restored.
            self.write_line(&line.color(entry.level.color_code()).to_string())
        } else {
            self.write_line(&line)
        }
    }

    fn flush(&self, force: bool) -> Result<()> {
        if force {
            self.writer.lock().flush()?;
        }
        Ok(())
    }

    fn prepare_logging(&self, now: DateTime<Local>) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Ok(());
        }
        self.write_line(&format!(
            "== log started {} {} ==",
            self.name,
            now.format("%Y-%m-%d %H:%M:%S")
        ))
    }

    fn dispose(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.flush(true)
    }

    fn name(&self) -> &str {
        "console"
    }
}
