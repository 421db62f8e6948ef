//! Fan-out logger over a fixed set of appenders

use super::{
    appender::Appender,
    error::{LoggerError, Result},
    log_entry::{LogEntry, Origin},
    log_level::LogLevel,
    metrics::LoggerMetrics,
};
use chrono::{DateTime, Local};
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

/// Handle producers log through
///
/// Every operation is broadcast to the appenders in the order they were
/// added. A failing or panicking appender never keeps the others from
/// receiving the call.
pub struct Logger {
    name: String,
    min_level: RwLock<LogLevel>,
    appenders: Vec<Box<dyn Appender>>,
    metrics: LoggerMetrics,
    disposed: AtomicBool,
}

impl Logger {
    #[must_use]
    pub fn new(name: impl Into<String>, appenders: Vec<Box<dyn Appender>>) -> Self {
        Self {
            name: name.into(),
            min_level: RwLock::new(LogLevel::Trace),
            appenders,
            metrics: LoggerMetrics::new(),
            disposed: AtomicBool::new(false),
        }
    }

    /// Create a builder for Logger
    ///
    /// # Example
    /// ```
    /// use rust_log_dispatch::prelude::*;
    ///
    /// let logger = Logger::builder("Worker")
    ///     .min_level(LogLevel::Debug)
    ///     .appender(ConsoleAppender::new("Worker"))
    ///     .build();
    /// assert_eq!(logger.appender_count(), 1);
    /// ```
    #[must_use]
    pub fn builder(name: impl Into<String>) -> LoggerBuilder {
        LoggerBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn appender_count(&self) -> usize {
        self.appenders.len()
    }

    /// Names of the appenders, in dispatch order
    pub fn appender_names(&self) -> Vec<&str> {
        self.appenders.iter().map(|a| a.name()).collect()
    }

    pub fn set_min_level(&self, level: LogLevel) {
        *self.min_level.write() = level;
    }

    pub fn min_level(&self) -> LogLevel {
        *self.min_level.read()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Records buffered across all appenders
    pub fn queued(&self) -> usize {
        self.appenders.iter().map(|a| a.queued()).sum()
    }

    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }

    /// Records rejected by at least one appender, or logged after dispose
    ///
    /// A record counted here may still have reached the other appenders.
    pub fn dropped_count(&self) -> u64 {
        self.metrics.dropped_count()
    }

    pub fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        let _ = self.try_log(level, message.as_ref(), None);
    }

    /// Log with the call site attached; used by the crate's macros
    pub fn log_with_origin(&self, level: LogLevel, message: impl AsRef<str>, origin: Origin) {
        let _ = self.try_log(level, message.as_ref(), Some(origin));
    }

    /// Log and report the first appender that rejected the record
    ///
    /// The record is still offered to every appender.
    ///
    /// # Errors
    ///
    /// Returns the first enqueue error (for example `CapacityExceeded`), or
    /// `LoggerDisposed` once the logger has been disposed.
    pub fn try_log(&self, level: LogLevel, message: &str, origin: Option<Origin>) -> Result<()> {
        if level < self.min_level() {
            return Ok(());
        }
        if self.is_disposed() {
            self.metrics.record_dropped();
            return Err(LoggerError::logger_disposed(self.name.clone()));
        }

        let mut entry = LogEntry::new(level, self.name.as_str(), message);
        entry.origin = origin;
        self.dispatch(&entry)
    }

    fn dispatch(&self, entry: &LogEntry) -> Result<()> {
        let result = self.for_each_appender("enqueue", |appender| appender.enqueue(entry));
        if result.is_err() {
            self.metrics.record_dropped();
        } else {
            self.metrics.record_logged();
        }
        result
    }

    /// Flush every appender; see [`Appender::flush`]
    ///
    /// # Errors
    ///
    /// Returns the first appender error after all appenders were flushed.
    pub fn flush(&self, force: bool) -> Result<()> {
        let result = self.for_each_appender("flush", |appender| appender.flush(force));
        if result.is_err() {
            self.metrics.record_flush_failure();
        }
        result
    }

    /// Rotate every appender to the day of `now`
    ///
    /// # Errors
    ///
    /// Returns the first appender error after all appenders were prepared.
    pub fn prepare_logging(&self, now: DateTime<Local>) -> Result<()> {
        if self.is_disposed() {
            return Ok(());
        }
        let result = self.for_each_appender("prepare_logging", |appender| {
            appender.prepare_logging(now)
        });
        if result.is_err() {
            self.metrics.record_rotation_failure();
        }
        result
    }

    /// Final flush and release of every appender. A second call is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the first appender error after all appenders were disposed.
    pub fn dispose(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.for_each_appender("dispose", |appender| appender.dispose())
    }

    /// Run `op` on every appender with per-appender panic isolation
    fn for_each_appender<F>(&self, op_name: &str, mut op: F) -> Result<()>
    where
        F: FnMut(&dyn Appender) -> Result<()>,
    {
        let mut first_error = None;

        for (idx, appender) in self.appenders.iter().enumerate() {
            let outcome = catch_unwind(AssertUnwindSafe(|| op(appender.as_ref())));

            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => {
                    eprintln!(
                        "[LOGGER ERROR] {} appender #{} ({}) {} failed: {}",
                        self.name,
                        idx,
                        appender.name(),
                        op_name,
                        e
                    );
                    e
                }
                Err(panic_info) => {
                    let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        s.to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "Unknown panic".to_string()
                    };
                    eprintln!(
                        "[LOGGER CRITICAL] {} appender #{} ({}) panicked during {}: {}. \
                         Other appenders continue to function.",
                        self.name,
                        idx,
                        appender.name(),
                        op_name,
                        panic_msg
                    );
                    LoggerError::other(format!("appender panicked: {}", panic_msg))
                }
            };

            first_error.get_or_insert(error);
        }

        first_error.map_or(Ok(()), Err)
    }

    #[inline]
    pub fn trace(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Trace, message);
    }

    #[inline]
    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, message);
    }

    #[inline]
    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warn, message);
    }

    #[inline]
    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message);
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            eprintln!("[LOGGER ERROR] Failed to dispose logger '{}': {}", self.name, e);
        }

        let dropped = self.metrics.dropped_count();
        if dropped > 0 {
            eprintln!(
                "[LOGGER WARNING] Logger '{}' shutting down with {} dropped logs (drop rate: {:.2}%)",
                self.name,
                dropped,
                self.metrics.drop_rate()
            );
        }
    }
}

/// Builder for constructing Logger with a fluent API
pub struct LoggerBuilder {
    name: String,
    min_level: LogLevel,
    appenders: Vec<Box<dyn Appender>>,
}

impl LoggerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min_level: LogLevel::Trace,
            appenders: Vec::new(),
        }
    }

    /// Set minimum log level
    #[must_use = "builder methods return a new value"]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Add an appender; dispatch follows insertion order
    #[must_use = "builder methods return a new value"]
    pub fn appender<A: Appender + 'static>(mut self, appender: A) -> Self {
        self.appenders.push(Box::new(appender));
        self
    }

    pub fn build(self) -> Logger {
        let logger = Logger::new(self.name, self.appenders);
        logger.set_min_level(self.min_level);
        logger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Appender that records every call it receives
    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<String>>>,
        fail: bool,
        panic: bool,
    }

    impl Appender for Recorder {
        fn enqueue(&self, entry: &LogEntry) -> Result<()> {
            if self.panic {
                panic!("recorder exploded");
            }
            self.calls.lock().push(format!("enqueue:{}", entry.message));
            if self.fail {
                Err(LoggerError::other("simulated failure"))
            } else {
                Ok(())
            }
        }

        fn flush(&self, force: bool) -> Result<()> {
            self.calls.lock().push(format!("flush:{}", force));
            if self.fail {
                Err(LoggerError::other("simulated flush failure"))
            } else {
                Ok(())
            }
        }

        fn prepare_logging(&self, _now: DateTime<Local>) -> Result<()> {
            self.calls.lock().push("prepare".to_string());
            Ok(())
        }

        fn dispose(&self) -> Result<()> {
            self.calls.lock().push("dispose".to_string());
            Ok(())
        }

        fn name(&self) -> &str {
            "recorder"
        }
    }

    #[test]
    fn test_broadcasts_to_all_appenders() {
        let first = Recorder::default();
        let second = Recorder::default();
        let logger = Logger::builder("Fan")
            .appender(first.clone())
            .appender(second.clone())
            .build();

        logger.info("hello");
        logger.flush(true).unwrap();
        logger.prepare_logging(Local::now()).unwrap();

        let expected = vec!["enqueue:hello", "flush:true", "prepare"];
        assert_eq!(*first.calls.lock(), expected);
        assert_eq!(*second.calls.lock(), expected);
        assert_eq!(logger.metrics().total_logged(), 1);
    }

    #[test]
    fn test_failure_does_not_short_circuit() {
        let failing = Recorder {
            fail: true,
            ..Recorder::default()
        };
        let healthy = Recorder::default();
        let logger = Logger::builder("Fan")
            .appender(failing.clone())
            .appender(healthy.clone())
            .build();

        assert!(logger.try_log(LogLevel::Info, "x", None).is_err());
        assert!(logger.flush(true).is_err());

        assert_eq!(*healthy.calls.lock(), vec!["enqueue:x", "flush:true"]);
        // Delivered by one appender, still counted as dropped
        assert_eq!(logger.dropped_count(), 1);
        assert_eq!(logger.metrics().total_logged(), 0);
        assert_eq!(logger.metrics().flush_failures(), 1);
    }

    #[test]
    fn test_panicking_appender_is_isolated() {
        let exploding = Recorder {
            panic: true,
            ..Recorder::default()
        };
        let healthy = Recorder::default();
        let logger = Logger::builder("Fan")
            .appender(exploding)
            .appender(healthy.clone())
            .build();

        logger.warn("still delivered");
        assert_eq!(*healthy.calls.lock(), vec!["enqueue:still delivered"]);
        assert_eq!(logger.dropped_count(), 1);
    }

    #[test]
    fn test_min_level_filters() {
        let recorder = Recorder::default();
        let logger = Logger::builder("Fan")
            .min_level(LogLevel::Warn)
            .appender(recorder.clone())
            .build();

        logger.debug("hidden");
        logger.error("shown");
        assert_eq!(*recorder.calls.lock(), vec!["enqueue:shown"]);

        logger.set_min_level(LogLevel::Trace);
        logger.trace("now shown");
        assert_eq!(recorder.calls.lock().len(), 2);
    }

    #[test]
    fn test_dispose_once_then_reject() {
        let recorder = Recorder::default();
        let logger = Logger::builder("Fan").appender(recorder.clone()).build();

        logger.dispose().unwrap();
        logger.dispose().unwrap();
        assert!(logger.is_disposed());
        assert!(matches!(
            logger.try_log(LogLevel::Info, "late", None),
            Err(LoggerError::LoggerDisposed { .. })
        ));
        assert_eq!(logger.dropped_count(), 1);

        drop(logger);
        assert_eq!(*recorder.calls.lock(), vec!["dispose"]);
    }

    #[test]
    fn test_origin_is_attached() {
        #[derive(Default, Clone)]
        struct OriginProbe(Arc<Mutex<Option<Origin>>>);

        impl Appender for OriginProbe {
            fn enqueue(&self, entry: &LogEntry) -> Result<()> {
                *self.0.lock() = entry.origin;
                Ok(())
            }
            fn flush(&self, _force: bool) -> Result<()> {
                Ok(())
            }
            fn prepare_logging(&self, _now: DateTime<Local>) -> Result<()> {
                Ok(())
            }
            fn dispose(&self) -> Result<()> {
                Ok(())
            }
            fn name(&self) -> &str {
                "probe"
            }
        }

        let probe = OriginProbe::default();
        let logger = Logger::builder("Fan").appender(probe.clone()).build();
        logger.log_with_origin(LogLevel::Info, "here", Origin::new("m", "f.rs", 7));

        assert_eq!(*probe.0.lock(), Some(Origin::new("m", "f.rs", 7)));
    }
}
