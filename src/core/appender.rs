//! Appender trait for log output destinations

use super::{error::Result, log_entry::LogEntry};
use chrono::{DateTime, Local};

/// A single backend sink owned by a [`Logger`](super::Logger)
///
/// Appenders are shared between producer threads and the scheduler, so every
/// operation takes `&self` and implementations guard their state internally.
pub trait Appender: Send + Sync {
    /// Hand a record to the appender. Buffered appenders must not do I/O here.
    fn enqueue(&self, entry: &LogEntry) -> Result<()>;

    /// Write out buffered records. Without `force`, buffered appenders only
    /// write once their queue has reached its size threshold.
    fn flush(&self, force: bool) -> Result<()>;

    /// Open (or reopen) the backend for the calendar day of `now`.
    fn prepare_logging(&self, now: DateTime<Local>) -> Result<()>;

    /// Final flush and release of the backend. Calling it twice is a no-op.
    fn dispose(&self) -> Result<()>;

    fn name(&self) -> &str;

    /// Records waiting to be written
    fn queued(&self) -> usize {
        0
    }
}
