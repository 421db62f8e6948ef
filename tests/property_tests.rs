//! Property-based tests for rust_log_dispatch using proptest

use proptest::prelude::*;
use rust_log_dispatch::core::ring_buffer::{DEFAULT_CAPACITY, MAX_CAPACITY};
use rust_log_dispatch::core::short_type_name;
use rust_log_dispatch::prelude::*;
use std::collections::VecDeque;

fn any_level() -> impl Strategy<Value = LogLevel> {
    prop_oneof![
        Just(LogLevel::Trace),
        Just(LogLevel::Debug),
        Just(LogLevel::Info),
        Just(LogLevel::Warn),
        Just(LogLevel::Error),
    ]
}

#[derive(Debug, Clone)]
enum Op {
    Enqueue(u32),
    Dequeue,
    Peek,
    Snapshot,
    Clear,
}

fn any_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => any::<u32>().prop_map(Op::Enqueue),
        3 => Just(Op::Dequeue),
        1 => Just(Op::Peek),
        1 => Just(Op::Snapshot),
        1 => Just(Op::Clear),
    ]
}

// ============================================================================
// LogLevel Tests
// ============================================================================

proptest! {
    /// Test that LogLevel string conversions roundtrip correctly
    #[test]
    fn test_log_level_str_roundtrip(level in any_level()) {
        let parsed: LogLevel = level.to_str().parse().unwrap();
        prop_assert_eq!(level, parsed);
        prop_assert_eq!(level.to_string(), level.to_str());
    }

    /// Test that parsing ignores case
    #[test]
    fn test_log_level_parse_case_insensitive(level in any_level(), lower in any::<bool>()) {
        let text = if lower {
            level.to_str().to_lowercase()
        } else {
            level.to_str().to_string()
        };
        prop_assert_eq!(text.parse::<LogLevel>().unwrap(), level);
    }
}

// ============================================================================
// RingBuffer Tests
// ============================================================================

proptest! {
    /// Test that the ring buffer behaves like a FIFO queue for any operation sequence
    #[test]
    fn test_ring_buffer_matches_fifo_model(
        initial in 0usize..20,
        ops in prop::collection::vec(any_op(), 0..300),
    ) {
        let mut buffer = RingBuffer::new(initial);
        let mut model = VecDeque::new();

        for op in ops {
            match op {
                Op::Enqueue(value) => {
                    buffer.enqueue(value).unwrap();
                    model.push_back(value);
                }
                Op::Dequeue => match model.pop_front() {
                    Some(expected) => {
                        prop_assert_eq!(buffer.dequeue().unwrap(), expected);
                    }
                    None => {
                        prop_assert!(buffer.dequeue().is_err());
                    }
                },
                Op::Peek => {
                    prop_assert_eq!(buffer.peek(), model.front());
                }
                Op::Snapshot => {
                    let expected: Vec<u32> = model.drain(..).collect();
                    prop_assert_eq!(buffer.snapshot_and_clear(), expected);
                }
                Op::Clear => {
                    buffer.clear();
                    model.clear();
                }
            }

            prop_assert_eq!(buffer.len(), model.len());
            prop_assert_eq!(buffer.is_empty(), model.is_empty());
            prop_assert!(buffer.len() <= buffer.capacity());
        }
    }

    /// Test that capacity only grows by doubling from the initial size
    #[test]
    fn test_ring_buffer_growth_doubles(initial in 0usize..16, count in 0usize..500) {
        let mut buffer = RingBuffer::new(initial);
        let mut expected_capacity = initial;

        for i in 0..count {
            if buffer.len() == expected_capacity {
                expected_capacity = if expected_capacity == 0 {
                    DEFAULT_CAPACITY
                } else {
                    expected_capacity * 2
                };
            }
            buffer.enqueue(i).unwrap();
            prop_assert_eq!(buffer.capacity(), expected_capacity);
        }
    }

    /// Test that a bounded buffer rejects exactly the records past its maximum
    #[test]
    fn test_ring_buffer_respects_max_capacity(max in 1usize..64, count in 0usize..128) {
        let mut buffer = RingBuffer::with_max_capacity(1, max).unwrap();
        for i in 0..count {
            let result = buffer.enqueue(i);
            if i < max {
                prop_assert!(result.is_ok());
            } else {
                let is_capacity_exceeded = matches!(result, Err(LoggerError::CapacityExceeded { .. }));
                prop_assert!(is_capacity_exceeded);
            }
        }
        prop_assert_eq!(buffer.len(), count.min(max));
        prop_assert!(buffer.capacity() <= max);
        prop_assert!(buffer.max_capacity() <= MAX_CAPACITY);
    }
}

// ============================================================================
// LogEntry Tests
// ============================================================================

proptest! {
    /// Test that a formatted record is always a single line
    #[test]
    fn test_entry_formats_to_single_line(level in any_level(), message in ".{0,200}") {
        let entry = LogEntry::new(level, "Prop", &message);
        let line = entry.to_string();
        prop_assert!(!line.contains('\n'));
        prop_assert!(!line.contains('\r'));
        let expected_marker = format!("|Prop|{} ", level);
        prop_assert!(line.contains(&expected_marker));
    }

    /// Test that type names never keep a module path
    #[test]
    fn test_short_type_name_strips_paths(
        segments in prop::collection::vec("[a-z][a-z0-9_]{0,6}", 1..5),
        ty in "[A-Z][A-Za-z0-9]{0,8}",
    ) {
        let full = format!("{}::{}", segments.join("::"), ty);
        prop_assert_eq!(short_type_name(&full), ty.clone());

        let generic = format!("Wrapper<{}>", full);
        prop_assert_eq!(short_type_name(&generic), format!("Wrapper<{}>", ty));
    }
}
