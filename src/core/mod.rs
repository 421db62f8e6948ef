//! Core logger types and traits

pub mod appender;
pub mod clock;
pub mod config;
pub mod error;
pub mod log_entry;
pub mod log_level;
pub mod logger;
pub mod manager;
pub mod metrics;
pub mod ring_buffer;
pub mod scheduler;

pub use appender::Appender;
pub use clock::{Clock, SystemClock};
pub use config::LogManagerConfig;
pub use error::{LoggerError, Result};
pub use log_entry::{LogEntry, Origin};
pub use log_level::LogLevel;
pub use logger::{Logger, LoggerBuilder};
pub use manager::{short_type_name, AppenderSelection, LogManager, ManagerState};
pub use metrics::LoggerMetrics;
pub use ring_buffer::RingBuffer;
pub use scheduler::PressureNotifier;
