//! Background flush and rotation scheduler
//!
//! One thread per [`LogManager`](super::LogManager). Each cycle it rotates
//! every logger if the calendar day changed, then waits up to `max_log_age`
//! for size-pressure signals (answered with non-forced flushes), and ends the
//! cycle with a forced flush so no record waits longer than `max_log_age`.

use super::manager::Shared;
use chrono::NaiveDate;
use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::time::Instant;

/// Wakes the scheduler when an appender's queue reaches its size threshold
///
/// Signals coalesce: while one is pending, further notifications are no-ops.
#[derive(Debug, Clone)]
pub struct PressureNotifier {
    sender: Sender<()>,
}

impl PressureNotifier {
    /// Create a notifier and the receiving end the scheduler listens on
    pub fn channel() -> (Self, Receiver<()>) {
        let (sender, receiver) = bounded(1);
        (Self { sender }, receiver)
    }

    #[inline]
    pub fn notify(&self) {
        let _ = self.sender.try_send(());
    }
}

pub(crate) struct Scheduler {
    shared: Arc<Shared>,
    shutdown: Receiver<()>,
    pressure: Receiver<()>,
    current_day: NaiveDate,
}

impl Scheduler {
    pub(crate) fn new(shared: Arc<Shared>, shutdown: Receiver<()>, pressure: Receiver<()>) -> Self {
        let current_day = shared.clock.now().date_naive();
        Self {
            shared,
            shutdown,
            pressure,
            current_day,
        }
    }

    /// Scheduler thread body; returns after draining every logger
    pub(crate) fn run(mut self) {
        while !self.shutdown_requested() {
            self.rotate_if_new_day();

            let max_log_age = self.shared.config.read().max_log_age();
            let deadline = Instant::now() + max_log_age;

            let cancelled = loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break false;
                }
                select! {
                    recv(self.shutdown) -> _ => break true,
                    recv(self.pressure) -> _ => self.sweep(false),
                    default(remaining) => break false,
                }
            };
            if cancelled {
                break;
            }

            self.sweep(true);
        }

        self.shared.drain_and_dispose();
    }

    /// A message or a dropped sender both mean stop
    fn shutdown_requested(&self) -> bool {
        !matches!(self.shutdown.try_recv(), Err(TryRecvError::Empty))
    }

    fn rotate_if_new_day(&mut self) {
        let now = self.shared.clock.now();
        if now.date_naive() == self.current_day {
            return;
        }
        self.current_day = now.date_naive();

        // Drain before the handle is replaced so nothing lands in the new day's file.
        // Failures are reported and counted by each logger.
        for logger in self.shared.live_loggers().iter().rev() {
            if self.shutdown_requested() {
                return;
            }
            let _ = logger.flush(true);
            let _ = logger.prepare_logging(now);
        }
    }

    fn sweep(&self, force: bool) {
        for logger in self.shared.live_loggers().iter().rev() {
            if self.shutdown_requested() {
                return;
            }
            let _ = logger.flush(force);
        }
    }
}
