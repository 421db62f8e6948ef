//! Logger registry and scheduler lifecycle

use super::{
    clock::{Clock, SystemClock},
    config::LogManagerConfig,
    error::{LoggerError, Result},
    logger::Logger,
    scheduler::{PressureNotifier, Scheduler},
};
use crate::appenders::{ConsoleAppender, FileAppender};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Lifecycle of a [`LogManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// Created, scheduler not started yet
    Uninitialized,
    /// Scheduler thread is flushing and rotating
    Running,
    /// Loggers are being disposed
    Draining,
    /// Every logger disposed; no new loggers are created
    Stopped,
}

/// Which backends a newly created logger writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppenderSelection {
    File,
    Console,
    #[default]
    Both,
}

impl AppenderSelection {
    pub fn includes_file(self) -> bool {
        matches!(self, AppenderSelection::File | AppenderSelection::Both)
    }

    pub fn includes_console(self) -> bool {
        matches!(self, AppenderSelection::Console | AppenderSelection::Both)
    }
}

#[derive(Default)]
struct Registry {
    by_key: HashMap<String, Arc<Logger>>,
    /// Registration order; the scheduler sweeps it newest-first
    live: Vec<Arc<Logger>>,
}

/// State shared between the manager handle and the scheduler thread
pub(crate) struct Shared {
    pub(crate) config: RwLock<LogManagerConfig>,
    pub(crate) clock: Arc<dyn Clock>,
    registry: Mutex<Registry>,
    state: Mutex<ManagerState>,
}

impl Shared {
    pub(crate) fn state(&self) -> ManagerState {
        *self.state.lock()
    }

    fn set_state(&self, state: ManagerState) {
        *self.state.lock() = state;
    }

    /// Snapshot of the live loggers so I/O happens outside the registry lock
    pub(crate) fn live_loggers(&self) -> Vec<Arc<Logger>> {
        self.registry.lock().live.clone()
    }

    /// Dispose every logger newest-first and clear the registry
    pub(crate) fn drain_and_dispose(&self) {
        self.set_state(ManagerState::Draining);

        let loggers = {
            let mut registry = self.registry.lock();
            registry.by_key.clear();
            std::mem::take(&mut registry.live)
        };

        for logger in loggers.iter().rev() {
            if let Err(e) = logger.dispose() {
                eprintln!("[LOGGER ERROR] Failed to dispose logger '{}': {}", logger.name(), e);
            }
        }

        self.set_state(ManagerState::Stopped);
    }
}

struct Lifecycle {
    handle: Option<JoinHandle<()>>,
    shutdown: Option<Sender<()>>,
    pressure: Option<Receiver<()>>,
}

/// Registry of loggers plus the background thread that flushes and rotates them
///
/// The scheduler starts on first use ([`get_or_create`](Self::get_or_create)
/// or [`start`](Self::start)) and stops on [`shutdown`](Self::shutdown) or drop,
/// disposing every logger it owns.
///
/// # Example
///
/// ```no_run
/// use rust_log_dispatch::prelude::*;
///
/// let manager = LogManager::new(LogManagerConfig::new().with_log_directory("logs")).unwrap();
/// let logger = manager.get_or_create("server", AppenderSelection::Both, Some("Server")).unwrap();
///
/// logger.info("listening");
/// manager.shutdown().unwrap();
/// ```
pub struct LogManager {
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle>,
    pressure: PressureNotifier,
}

impl LogManager {
    /// Create a manager using the system clock
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `config` fails validation.
    pub fn new(config: LogManagerConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a manager reading dates from `clock`
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `config` fails validation.
    pub fn with_clock(config: LogManagerConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let (pressure, pressure_rx) = PressureNotifier::channel();

        Ok(Self {
            shared: Arc::new(Shared {
                config: RwLock::new(config),
                clock,
                registry: Mutex::new(Registry::default()),
                state: Mutex::new(ManagerState::Uninitialized),
            }),
            lifecycle: Mutex::new(Lifecycle {
                handle: None,
                shutdown: None,
                pressure: Some(pressure_rx),
            }),
            pressure,
        })
    }

    pub fn state(&self) -> ManagerState {
        self.shared.state()
    }

    /// Start the scheduler thread. Calling it again while running is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `LoggerStopped` after shutdown, or `IoOperation` if the thread
    /// cannot be spawned.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        match self.shared.state() {
            ManagerState::Running => return Ok(()),
            ManagerState::Draining | ManagerState::Stopped => return Err(LoggerError::LoggerStopped),
            ManagerState::Uninitialized => {}
        }

        let pressure_rx = lifecycle
            .pressure
            .take()
            .ok_or_else(|| LoggerError::other("scheduler pressure channel already taken"))?;
        let (shutdown_tx, shutdown_rx) = bounded(1);
        let scheduler = Scheduler::new(Arc::clone(&self.shared), shutdown_rx, pressure_rx);

        let handle = thread::Builder::new()
            .name("log-dispatch-scheduler".to_string())
            .spawn(move || scheduler.run())
            .map_err(|e| {
                LoggerError::io_operation("starting scheduler", "Failed to spawn thread", e)
            })?;

        lifecycle.handle = Some(handle);
        lifecycle.shutdown = Some(shutdown_tx);
        self.shared.set_state(ManagerState::Running);
        Ok(())
    }

    /// Stop the scheduler and dispose every logger, newest first
    ///
    /// Waits for the scheduler to finish its current step. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler thread panicked; the loggers are
    /// still disposed in that case.
    pub fn shutdown(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        if self.shared.state() == ManagerState::Stopped {
            return Ok(());
        }

        drop(lifecycle.shutdown.take());
        let joined = match lifecycle.handle.take() {
            Some(handle) => handle.join().map_err(|e| {
                eprintln!("[LOGGER ERROR] Scheduler thread panicked during shutdown: {:?}", e);
                LoggerError::other("scheduler thread panicked")
            }),
            None => Ok(()),
        };

        // Never started, or the scheduler died before draining
        if self.shared.state() != ManagerState::Stopped {
            self.shared.drain_and_dispose();
        }
        joined
    }

    /// Look up the logger for `key`, creating it with `selection` on first use
    ///
    /// `name` defaults to `key` and determines file names
    /// (`<dir>/<name>_<YYYY-MM-DD>.log`).
    ///
    /// # Errors
    ///
    /// Returns `LoggerStopped` after shutdown, or a configuration error if
    /// the file appender cannot be built.
    pub fn get_or_create(
        &self,
        key: &str,
        selection: AppenderSelection,
        name: Option<&str>,
    ) -> Result<Arc<Logger>> {
        let name = name.filter(|n| !n.is_empty()).unwrap_or(key).to_string();

        self.get_or_insert_with(key, move |config, pressure| {
            let mut builder = Logger::builder(name.clone()).min_level(config.min_level);
            if selection.includes_file() {
                builder = builder.appender(
                    FileAppender::from_config(name.clone(), config)?
                        .with_pressure_notifier(pressure.clone()),
                );
            }
            if selection.includes_console() {
                builder = builder
                    .appender(ConsoleAppender::new(name.clone()).with_colors(config.console_colors));
            }
            Ok(builder.build())
        })
    }

    /// Logger keyed by the type `T`, named after its short type name
    ///
    /// # Errors
    ///
    /// Same as [`get_or_create`](Self::get_or_create).
    pub fn get_logger<T: ?Sized>(&self, selection: AppenderSelection) -> Result<Arc<Logger>> {
        let key = std::any::type_name::<T>();
        self.get_or_create(key, selection, Some(&short_type_name(key)))
    }

    /// Register a logger built by `build` under `key` unless one exists
    ///
    /// `build` receives the current tunables and the scheduler's
    /// [`PressureNotifier`]; buffered appenders that should be flushed early
    /// at their size threshold must be given a clone of it (see
    /// [`FileAppender::with_pressure_notifier`]).
    ///
    /// `build` runs without the registry lock held. If another thread
    /// registers `key` first, its logger is returned and ours is discarded
    /// unprepared. A newly registered logger is prepared for the current day
    /// before it is returned.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_log_dispatch::prelude::*;
    ///
    /// let manager = LogManager::new(LogManagerConfig::new()).unwrap();
    /// let logger = manager
    ///     .get_or_insert_with("audit", |config, pressure| {
    ///         let file = FileAppender::new("Audit", config.log_directory.join("audit"))
    ///             .with_max_queue_size(10)
    ///             .with_pressure_notifier(pressure.clone());
    ///         Ok(Logger::builder("Audit").appender(file).build())
    ///     })
    ///     .unwrap();
    /// logger.warn("login failed");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `LoggerStopped` after shutdown, or whatever `build` returns.
    pub fn get_or_insert_with<F>(&self, key: &str, build: F) -> Result<Arc<Logger>>
    where
        F: FnOnce(&LogManagerConfig, &PressureNotifier) -> Result<Logger>,
    {
        self.start()?;

        if let Some(logger) = self.get(key) {
            return Ok(logger);
        }

        let config = self.shared.config.read().clone();
        let candidate = Arc::new(build(&config, &self.pressure)?);

        let logger = {
            let mut registry = self.shared.registry.lock();
            if self.shared.state() != ManagerState::Running {
                return Err(LoggerError::LoggerStopped);
            }
            if let Some(existing) = registry.by_key.get(key) {
                return Ok(Arc::clone(existing));
            }
            registry.by_key.insert(key.to_string(), Arc::clone(&candidate));
            registry.live.push(Arc::clone(&candidate));
            candidate
        };

        // Errors are reported and counted by the logger; the scheduler
        // retries on the next flush or rotation.
        let _ = logger.prepare_logging(self.shared.clock.now());
        Ok(logger)
    }

    /// Registered logger for `key`, if any
    pub fn get(&self, key: &str) -> Option<Arc<Logger>> {
        self.shared.registry.lock().by_key.get(key).cloned()
    }

    pub fn logger_count(&self) -> usize {
        self.shared.registry.lock().live.len()
    }

    /// Flush every registered logger from the calling thread
    ///
    /// # Errors
    ///
    /// Returns the first error after every logger was flushed.
    pub fn flush_all(&self, force: bool) -> Result<()> {
        let mut first_error = None;
        for logger in self.shared.live_loggers().iter().rev() {
            if let Err(e) = logger.flush(force) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Snapshot of the current tunables
    pub fn config(&self) -> LogManagerConfig {
        self.shared.config.read().clone()
    }

    /// Directory for loggers created from now on
    pub fn set_log_directory(&self, dir: impl Into<PathBuf>) {
        self.shared.config.write().log_directory = dir.into();
    }

    /// Interval between forced flushes, effective from the next cycle
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for a zero interval.
    pub fn set_max_log_age(&self, age: Duration) -> Result<()> {
        let mut config = self.shared.config.write();
        let updated = config.clone().with_max_log_age(age);
        updated.validate()?;
        *config = updated;
        Ok(())
    }

    /// Early-flush threshold for loggers created from now on
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for a zero threshold.
    pub fn set_max_queue_size(&self, size: usize) -> Result<()> {
        let mut config = self.shared.config.write();
        let updated = config.clone().with_max_queue_size(size);
        updated.validate()?;
        *config = updated;
        Ok(())
    }
}

impl Drop for LogManager {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            eprintln!("[LOGGER ERROR] Log manager shutdown failed: {}", e);
        }
    }
}

/// Strip module paths from a type name, keeping generic arguments
///
/// ```
/// use rust_log_dispatch::core::short_type_name;
///
/// assert_eq!(short_type_name("alloc::vec::Vec<core::option::Option<u8>>"), "Vec<Option<u8>>");
/// assert_eq!(short_type_name("my_app::net::Server"), "Server");
/// ```
pub fn short_type_name(full: &str) -> String {
    let mut short = String::with_capacity(full.len());
    for part in full.split_inclusive(|c: char| "<>,;()[]& ".contains(c)) {
        let (path, delimiter) = match part.char_indices().last() {
            Some((idx, c)) if "<>,;()[]& ".contains(c) => part.split_at(idx),
            _ => (part, ""),
        };
        short.push_str(path.rsplit("::").next().unwrap_or(path));
        short.push_str(delimiter);
    }
    short
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Appender, LogEntry, LogLevel};
    use chrono::{DateTime, Local};
    use tempfile::TempDir;

    /// Appender that records the calls it receives
    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<String>>>,
        fail_flush: bool,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn count(&self, call: &str) -> usize {
            self.calls.lock().iter().filter(|c| *c == call).count()
        }
    }

    impl Appender for Recorder {
        fn enqueue(&self, entry: &LogEntry) -> Result<()> {
            self.calls.lock().push(format!("enqueue:{}", entry.message));
            Ok(())
        }

        fn flush(&self, force: bool) -> Result<()> {
            self.calls.lock().push(format!("flush:{}", force));
            if self.fail_flush {
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

    fn manager(dir: &TempDir) -> LogManager {
        LogManager::new(
            LogManagerConfig::new()
                .with_log_directory(dir.path())
                .with_max_log_age(Duration::from_millis(50)),
        )
        .unwrap()
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("u32"), "u32");
        assert_eq!(
            short_type_name("std::collections::HashMap<alloc::string::String, a::B>"),
            "HashMap<String, B>"
        );
        assert_eq!(short_type_name("&[app::Item]"), "&[Item]");
    }

    #[test]
    fn test_selection_flags() {
        assert!(AppenderSelection::Both.includes_file());
        assert!(AppenderSelection::Both.includes_console());
        assert!(!AppenderSelection::File.includes_console());
        assert!(!AppenderSelection::Console.includes_file());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = LogManager::new(LogManagerConfig::new().with_max_queue_size(0));
        assert!(matches!(result, Err(LoggerError::InvalidConfiguration { .. })));
    }

    #[test]
    fn test_first_use_starts_scheduler() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        assert_eq!(manager.state(), ManagerState::Uninitialized);

        manager.get_or_create("worker", AppenderSelection::File, None).unwrap();
        assert_eq!(manager.state(), ManagerState::Running);
        manager.start().unwrap();
        assert_eq!(manager.state(), ManagerState::Running);
    }

    #[test]
    fn test_same_key_returns_same_logger() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        let a = manager.get_or_create("worker", AppenderSelection::File, Some("Worker")).unwrap();
        let b = manager.get_or_create("worker", AppenderSelection::Console, None).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name(), "Worker");
        assert_eq!(a.appender_names(), vec!["file"]);
        assert_eq!(manager.logger_count(), 1);
    }

    #[test]
    fn test_logger_file_is_created_on_registration() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        manager.get_or_create("worker", AppenderSelection::File, Some("Worker")).unwrap();
        let today = chrono::Local::now();
        let expected = dir.path().join(FileAppender::file_name_for("Worker", today));
        assert!(expected.exists(), "missing {}", expected.display());
    }

    #[test]
    fn test_typed_logger_uses_short_name() {
        struct Renderer;

        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let logger = manager.get_logger::<Renderer>(AppenderSelection::File).unwrap();
        assert_eq!(logger.name(), "Renderer");

        let again = manager.get_logger::<Renderer>(AppenderSelection::Both).unwrap();
        assert!(Arc::ptr_eq(&logger, &again));
    }

    #[test]
    fn test_shutdown_disposes_and_stops() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let logger = manager.get_or_create("worker", AppenderSelection::File, None).unwrap();
        logger.info("bye");

        manager.shutdown().unwrap();
        manager.shutdown().unwrap();

        assert_eq!(manager.state(), ManagerState::Stopped);
        assert!(logger.is_disposed());
        assert_eq!(manager.logger_count(), 0);
        assert!(matches!(
            manager.get_or_create("other", AppenderSelection::File, None),
            Err(LoggerError::LoggerStopped)
        ));
        assert!(matches!(manager.start(), Err(LoggerError::LoggerStopped)));
    }

    #[test]
    fn test_shutdown_without_start() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        manager.shutdown().unwrap();
        assert_eq!(manager.state(), ManagerState::Stopped);
    }

    #[test]
    fn test_tunables() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        manager.set_max_queue_size(7).unwrap();
        manager.set_max_log_age(Duration::from_millis(20)).unwrap();
        assert!(manager.set_max_queue_size(0).is_err());
        assert!(manager.set_max_log_age(Duration::ZERO).is_err());

        let nested = dir.path().join("nested");
        manager.set_log_directory(&nested);

        let config = manager.config();
        assert_eq!(config.max_queue_size, 7);
        assert_eq!(config.max_log_age_ms, 20);
        assert_eq!(config.log_directory, nested);

        manager.get_or_create("late", AppenderSelection::File, None).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_min_level_comes_from_config() {
        let dir = TempDir::new().unwrap();
        let manager = LogManager::new(
            LogManagerConfig::new()
                .with_log_directory(dir.path())
                .with_min_level(LogLevel::Error),
        )
        .unwrap();

        let logger = manager.get_or_create("quiet", AppenderSelection::File, None).unwrap();
        assert_eq!(logger.min_level(), LogLevel::Error);
    }

    #[test]
    fn test_custom_logger_is_registered_prepared_and_swept() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let recorder = Recorder::default();

        let built = recorder.clone();
        let logger = manager
            .get_or_insert_with("custom", move |_, _| {
                Ok(Logger::builder("Custom").appender(built).build())
            })
            .unwrap();
        assert_eq!(recorder.count("prepare"), 1);

        let again = manager
            .get_or_insert_with("custom", |_, _| panic!("existing logger must be reused"))
            .unwrap();
        assert!(Arc::ptr_eq(&logger, &again));
        assert_eq!(manager.logger_count(), 1);

        // max_log_age is 50ms: the scheduler force-flushes every cycle
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while recorder.count("flush:true") == 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(recorder.count("flush:true") > 0, "scheduler never swept the logger");
        assert_eq!(recorder.count("prepare"), 1);
    }

    #[test]
    fn test_losing_candidate_is_not_prepared() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let winner = Recorder::default();
        let loser = Recorder::default();

        let winner_appender = winner.clone();
        let loser_appender = loser.clone();
        let logger = manager
            .get_or_insert_with("contested", |_, _| {
                // Another registration for the same key completes while this
                // candidate is still being built.
                manager.get_or_insert_with("contested", move |_, _| {
                    Ok(Logger::builder("Winner").appender(winner_appender).build())
                })?;
                Ok(Logger::builder("Loser").appender(loser_appender).build())
            })
            .unwrap();

        assert_eq!(logger.name(), "Winner");
        assert_eq!(manager.logger_count(), 1);
        assert_eq!(winner.count("prepare"), 1);
        assert_eq!(loser.count("prepare"), 0);
        // The discarded candidate is released on drop
        assert_eq!(loser.calls(), vec!["dispose"]);
    }

    #[test]
    fn test_flush_all_visits_every_logger_and_reports_first_error() {
        let dir = TempDir::new().unwrap();
        let manager = LogManager::new(
            LogManagerConfig::new()
                .with_log_directory(dir.path())
                .with_max_log_age(Duration::from_secs(600)),
        )
        .unwrap();

        let healthy = Recorder::default();
        let failing = Recorder {
            fail_flush: true,
            ..Recorder::default()
        };
        let healthy_appender = healthy.clone();
        manager
            .get_or_insert_with("healthy", move |_, _| {
                Ok(Logger::builder("Healthy").appender(healthy_appender).build())
            })
            .unwrap();
        let failing_appender = failing.clone();
        let broken = manager
            .get_or_insert_with("failing", move |_, _| {
                Ok(Logger::builder("Failing").appender(failing_appender).build())
            })
            .unwrap();

        let file_logger = manager.get_or_create("file", AppenderSelection::File, None).unwrap();
        file_logger.info("pending");
        assert_eq!(file_logger.queued(), 1);

        // Newest first: the file logger, then the failing one, then the healthy one
        let err = manager.flush_all(true).unwrap_err();
        assert!(err.to_string().contains("simulated flush failure"));
        assert_eq!(file_logger.queued(), 0);
        assert_eq!(failing.count("flush:true"), 1);
        assert_eq!(healthy.count("flush:true"), 1);
        assert_eq!(broken.metrics().flush_failures(), 1);
    }
}
