//! # Rust Log Dispatch
//!
//! In-process log buffering and dispatch engine. Producers on any thread log
//! through a shared [`Logger`]; records are buffered per appender and written
//! by a single background scheduler owned by a [`LogManager`].
//!
//! ## Features
//!
//! - **Non-blocking producers**: file records are queued in a growable ring
//!   buffer, never written on the calling thread
//! - **Fan-out**: one logger writes to a daily rotating file and a colored console
//! - **Bounded latency**: records reach disk within `max_log_age`, earlier under
//!   queue pressure
//! - **Daily rotation**: `<dir>/<name>_<YYYY-MM-DD>.log`, optionally gzipped
//!   after the day ends

pub mod appenders;
pub mod core;
pub mod macros;

pub mod prelude {
    pub use crate::appenders::{ConsoleAppender, FileAppender};
    pub use crate::core::{
        Appender, AppenderSelection, Clock, LogEntry, LogLevel, LogManager, LogManagerConfig,
        Logger, LoggerBuilder, LoggerError, LoggerMetrics, ManagerState, Origin,
        PressureNotifier, Result, RingBuffer, SystemClock,
    };
}

pub use appenders::{ConsoleAppender, FileAppender};
pub use core::{
    Appender, AppenderSelection, Clock, LogEntry, LogLevel, LogManager, LogManagerConfig, Logger,
    LoggerBuilder, LoggerError, LoggerMetrics, ManagerState, Origin, PressureNotifier, Result,
    RingBuffer, SystemClock,
};
