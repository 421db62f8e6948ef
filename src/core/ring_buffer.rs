//! Growable circular buffer used as the per-appender record queue
//!
//! The buffer is not synchronized. Owners wrap it in a single lock and hold
//! that lock only for queue operations, never across I/O.

use super::error::{LoggerError, Result};
use std::ops::Range;

/// Capacity the first growth of an unallocated buffer jumps to
pub const DEFAULT_CAPACITY: usize = 8;

/// Hard upper bound on the number of slots a buffer may grow to
pub const MAX_CAPACITY: usize = 0x7FEF_FFFF;

/// FIFO queue over a circular array that doubles when full
///
/// # Example
///
/// ```
/// use rust_log_dispatch::RingBuffer;
///
/// let mut buffer = RingBuffer::new(2);
/// buffer.enqueue("a").unwrap();
/// buffer.enqueue("b").unwrap();
/// buffer.enqueue("c").unwrap(); // grows to 4 slots
///
/// assert_eq!(buffer.capacity(), 4);
/// assert_eq!(buffer.dequeue().unwrap(), "a");
/// assert_eq!(buffer.snapshot_and_clear(), vec!["b", "c"]);
/// assert!(buffer.is_empty());
/// ```
#[derive(Debug)]
pub struct RingBuffer<T> {
    slots: Vec<Option<T>>,
    head: usize,
    tail: usize,
    count: usize,
    max_capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Create a buffer with `capacity` slots, clamped to [`MAX_CAPACITY`]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(MAX_CAPACITY);
        Self {
            slots: Self::empty_slots(capacity),
            head: 0,
            tail: 0,
            count: 0,
            max_capacity: MAX_CAPACITY,
        }
    }

    /// Create a buffer that never grows beyond `max_capacity` slots
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `capacity` exceeds `max_capacity`
    /// or `max_capacity` is zero.
    pub fn with_max_capacity(capacity: usize, max_capacity: usize) -> Result<Self> {
        if max_capacity == 0 || max_capacity > MAX_CAPACITY {
            return Err(LoggerError::config(
                "RingBuffer",
                format!("max capacity must be between 1 and {}, got {}", MAX_CAPACITY, max_capacity),
            ));
        }
        if capacity > max_capacity {
            return Err(LoggerError::config(
                "RingBuffer",
                format!("initial capacity {} exceeds max capacity {}", capacity, max_capacity),
            ));
        }

        Ok(Self {
            slots: Self::empty_slots(capacity),
            head: 0,
            tail: 0,
            count: 0,
            max_capacity,
        })
    }

    fn empty_slots(capacity: usize) -> Vec<Option<T>> {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        slots
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Append `item` at the tail, growing the backing array if it is full
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` when the buffer is full and already at its
    /// maximum capacity. The buffer is left untouched in that case.
    pub fn enqueue(&mut self, item: T) -> Result<()> {
        if self.count == self.slots.len() {
            self.grow(self.count + 1)?;
        }

        self.slots[self.tail] = Some(item);
        self.tail = (self.tail + 1) % self.slots.len();
        self.count += 1;
        Ok(())
    }

    /// Remove and return the item at the head
    ///
    /// # Errors
    ///
    /// Returns `BufferEmpty` if nothing is queued.
    pub fn dequeue(&mut self) -> Result<T> {
        if self.count == 0 {
            return Err(LoggerError::BufferEmpty);
        }

        let item = self.slots[self.head].take().ok_or(LoggerError::BufferEmpty)?;
        self.head = (self.head + 1) % self.slots.len();
        self.count -= 1;
        Ok(item)
    }

    /// Item at the head without removing it
    pub fn peek(&self) -> Option<&T> {
        if self.count == 0 {
            None
        } else {
            self.slots[self.head].as_ref()
        }
    }

    /// Drop every queued item and reset to empty. Capacity is kept.
    pub fn clear(&mut self) {
        let (first, second) = self.occupied();
        for idx in first.chain(second) {
            self.slots[idx] = None;
        }
        self.reset_indices();
    }

    /// Move every queued item out in FIFO order, leaving the buffer empty
    pub fn snapshot_and_clear(&mut self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.count);
        let (first, second) = self.occupied();
        for idx in first.chain(second) {
            if let Some(item) = self.slots[idx].take() {
                items.push(item);
            }
        }
        self.reset_indices();
        items
    }

    /// Move every queued item to the back of `other`, keeping FIFO order
    ///
    /// Nothing moves if `other` cannot hold all of the items.
    pub fn drain_into(&mut self, other: &mut RingBuffer<T>) -> Result<()> {
        let required = other.count + self.count;
        if required > other.max_capacity {
            return Err(LoggerError::capacity_exceeded(required, other.max_capacity));
        }

        let (first, second) = self.occupied();
        for idx in first.chain(second) {
            if let Some(item) = self.slots[idx].take() {
                other.enqueue(item)?;
            }
        }
        self.reset_indices();
        Ok(())
    }

    fn reset_indices(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }

    /// Slot ranges holding queued items, in FIFO order
    ///
    /// The second range is non-empty only when the logical contents wrap
    /// past the end of the backing array.
    fn occupied(&self) -> (Range<usize>, Range<usize>) {
        let capacity = self.slots.len();
        if self.head + self.count <= capacity {
            (self.head..self.head + self.count, 0..0)
        } else {
            (self.head..capacity, 0..self.tail)
        }
    }

    fn grow(&mut self, min: usize) -> Result<()> {
        let capacity = self.slots.len();
        let mut new_capacity = if capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            capacity.saturating_mul(2)
        };
        if new_capacity > self.max_capacity {
            new_capacity = self.max_capacity;
        }
        if new_capacity < min {
            return Err(LoggerError::capacity_exceeded(min, self.max_capacity));
        }

        let mut slots = Vec::with_capacity(new_capacity);
        let (first, second) = self.occupied();
        for idx in first.chain(second) {
            slots.push(self.slots[idx].take());
        }
        slots.resize_with(new_capacity, || None);

        self.slots = slots;
        self.head = 0;
        self.tail = self.count % new_capacity;
        Ok(())
    }
}

impl<T> Default for RingBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
