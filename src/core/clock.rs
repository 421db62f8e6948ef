//! Wall-clock source for rotation decisions

use chrono::{DateTime, Local};

/// Source of the current local time
///
/// The manager asks its clock for `now` when naming files and when checking
/// for a day change, so tests can move time forward without waiting.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}
