//! # Ordered, drainable capture queues.
//!
//! [`StreamBuffer`] backs the three per-task streams (output, error,
//! progress). Writers append from the engine thread; readers snapshot or
//! drain atomically from any thread.
//!
//! ## Rules
//! - Items come back in the order they were appended.
//! - `receive(keep = false)` drains atomically; drained items are never
//!   re-delivered, even under concurrent receives.
//! - Unbounded: the scheduler never throttles a script on its own output.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Thread-safe FIFO of captured stream items.
#[derive(Debug)]
pub struct StreamBuffer<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T: Clone> StreamBuffer<T> {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }

    /// Appends one item at the tail.
    pub fn push(&self, item: T) {
        self.items.lock().expect("stream buffer poisoned").push_back(item);
    }

    /// Returns an ordered snapshot of the buffered items.
    ///
    /// With `keep = false` the buffer is drained in the same critical
    /// section, so two concurrent drains can never hand out the same item.
    pub fn receive(&self, keep: bool) -> Vec<T> {
        let mut guard = self.items.lock().expect("stream buffer poisoned");
        if keep {
            guard.iter().cloned().collect()
        } else {
            guard.drain(..).collect()
        }
    }

    /// Number of currently buffered items.
    pub fn len(&self) -> usize {
        self.items.lock().expect("stream buffer poisoned").len()
    }

    /// True when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Default for StreamBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_append_order() {
        let buf = StreamBuffer::new();
        buf.push(1);
        buf.push(2);
        buf.push(3);
        assert_eq!(buf.receive(true), vec![1, 2, 3]);
    }

    #[test]
    fn keep_true_retains_items() {
        let buf = StreamBuffer::new();
        buf.push("a");
        assert_eq!(buf.receive(true), vec!["a"]);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn second_drain_is_empty() {
        let buf = StreamBuffer::new();
        buf.push("a");
        buf.push("b");
        assert_eq!(buf.receive(false), vec!["a", "b"]);
        assert!(buf.receive(false).is_empty());
    }

    #[test]
    fn drain_then_push_delivers_only_new_items() {
        let buf = StreamBuffer::new();
        buf.push(1);
        buf.receive(false);
        buf.push(2);
        assert_eq!(buf.receive(false), vec![2]);
    }
}
