#![forbid(unsafe_code)]

//! Bounded, linear, snapshot-based history.
//!
//! [`History`] keeps whole-state snapshots rather than reversible commands:
//! undo and redo move a cursor and hand back the snapshot under it.
//!
//! # Invariants
//!
//! 1. `0 <= cursor < len` at all times; the history is never empty.
//! 2. Index 0 is the oldest retained snapshot (the initial value until it is
//!    evicted).
//! 3. `len <= capacity`. Eviction is FIFO and shifts the cursor so it keeps
//!    referring to the same logical snapshot.
//! 4. Every push appends exactly one entry, even one equal to the entry
//!    under the cursor, and first discards every snapshot after the cursor
//!    (no branches).
//! 5. Snapshots are immutable once recorded.

use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use tracing::debug;
use web_time::Duration;

/// Default debounce window between the last accepted change and the
/// snapshot it produces.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Default maximum number of retained snapshots.
pub const DEFAULT_CAPACITY: usize = 100;

/// Configuration for history recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Quiet period after the last change before a snapshot is recorded.
    pub debounce: Duration,
    /// Maximum retained snapshots (at least 1).
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl HistoryConfig {
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }
}

/// Outcome of [`History::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PushOutcome {
    /// Redo entries dropped before appending.
    pub discarded: usize,
    /// The oldest entry was evicted to stay within capacity.
    pub evicted: bool,
}

/// Linear snapshot history with a cursor.
pub struct History<T> {
    entries: VecDeque<Rc<T>>,
    cursor: usize,
    capacity: usize,
}

impl<T> History<T> {
    /// Start a history whose only entry is `initial`.
    #[must_use]
    pub fn new(initial: Rc<T>, capacity: usize) -> Self {
        let mut entries = VecDeque::with_capacity(capacity.clamp(1, 128));
        entries.push_back(initial);
        Self {
            entries,
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    /// Record `snapshot` after the cursor.
    ///
    /// Future (redo) entries are discarded first.
    pub fn push(&mut self, snapshot: Rc<T>) -> PushOutcome {
        let discarded = self.entries.len() - (self.cursor + 1);
        self.entries.truncate(self.cursor + 1);
        self.entries.push_back(snapshot);
        self.cursor = self.entries.len() - 1;

        let evicted = self.entries.len() > self.capacity;
        if evicted {
            self.entries.pop_front();
            self.cursor -= 1;
        }

        debug!(
            message = "history.push",
            len = self.entries.len(),
            cursor = self.cursor,
            discarded,
            evicted
        );
        PushOutcome { discarded, evicted }
    }

    /// Step back one entry. `None` at the oldest entry.
    pub fn undo(&mut self) -> Option<Rc<T>> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(Rc::clone(&self.entries[self.cursor]))
    }

    /// Step forward one entry. `None` at the newest entry.
    pub fn redo(&mut self) -> Option<Rc<T>> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        Some(Rc::clone(&self.entries[self.cursor]))
    }

    /// Move the cursor to `index`. `None` if out of range.
    pub fn rollback_to(&mut self, index: usize) -> Option<Rc<T>> {
        let entry = self.entries.get(index)?;
        self.cursor = index;
        Some(Rc::clone(entry))
    }

    /// Collapse to a single entry.
    pub fn reset(&mut self, initial: Rc<T>) {
        self.entries.clear();
        self.entries.push_back(initial);
        self.cursor = 0;
    }
}

impl<T> History<T> {
    /// Snapshot under the cursor.
    #[must_use]
    pub fn current(&self) -> &Rc<T> {
        &self.entries[self.cursor]
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Rc<T>> {
        self.entries.get(index)
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: a history holds at least one entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// Snapshots from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Rc<T>> {
        self.entries.iter()
    }
}

impl<T> fmt::Debug for History<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("History")
            .field("len", &self.entries.len())
            .field("cursor", &self.cursor)
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(capacity: usize) -> History<i32> {
        History::new(Rc::new(0), capacity)
    }

    fn values(h: &History<i32>) -> Vec<i32> {
        h.iter().map(|v| **v).collect()
    }

    #[test]
    fn starts_with_single_entry() {
        let h = history(10);
        assert_eq!(h.len(), 1);
        assert_eq!(h.cursor(), 0);
        assert!(!h.can_undo());
        assert!(!h.can_redo());
        assert!(!h.is_empty());
    }

    #[test]
    fn push_advances_cursor() {
        let mut h = history(10);
        assert_eq!(h.push(Rc::new(1)), PushOutcome::default());
        h.push(Rc::new(2));
        assert_eq!(values(&h), vec![0, 1, 2]);
        assert_eq!(h.cursor(), 2);
        assert_eq!(**h.current(), 2);
    }

    #[test]
    fn push_equal_to_cursor_still_appends_and_truncates() {
        let mut h = history(10);
        h.push(Rc::new(1));
        h.push(Rc::new(2));
        h.undo();
        let outcome = h.push(Rc::new(1));
        assert_eq!(outcome.discarded, 1);
        assert_eq!(values(&h), vec![0, 1, 1]);
        assert_eq!(h.cursor(), 2);
        assert!(!h.can_redo());
    }

    #[test]
    fn undo_redo_walk_the_cursor() {
        let mut h = history(10);
        h.push(Rc::new(1));
        h.push(Rc::new(2));

        assert_eq!(h.undo().map(|v| *v), Some(1));
        assert_eq!(h.undo().map(|v| *v), Some(0));
        assert_eq!(h.undo(), None);
        assert_eq!(h.cursor(), 0);

        assert_eq!(h.redo().map(|v| *v), Some(1));
        assert_eq!(h.redo().map(|v| *v), Some(2));
        assert_eq!(h.redo(), None);
        assert_eq!(h.cursor(), 2);
    }

    #[test]
    fn push_after_undo_discards_future() {
        let mut h = history(10);
        h.push(Rc::new(1));
        h.push(Rc::new(2));
        h.undo();
        h.undo();
        h.push(Rc::new(9));
        assert_eq!(values(&h), vec![0, 9]);
        assert!(!h.can_redo());
    }

    #[test]
    fn capacity_evicts_oldest_and_shifts_cursor() {
        let mut h = history(3);
        h.push(Rc::new(1));
        h.push(Rc::new(2));
        assert!(h.push(Rc::new(3)).evicted);
        assert_eq!(values(&h), vec![1, 2, 3]);
        assert_eq!(h.cursor(), 2);
        assert_eq!(**h.current(), 3);
    }

    #[test]
    fn rollback_in_and_out_of_range() {
        let mut h = history(10);
        h.push(Rc::new(1));
        h.push(Rc::new(2));
        assert_eq!(h.rollback_to(0).map(|v| *v), Some(0));
        assert_eq!(h.cursor(), 0);
        assert_eq!(h.rollback_to(3), None);
        assert_eq!(h.cursor(), 0);
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn reset_collapses() {
        let mut h = history(10);
        h.push(Rc::new(1));
        h.push(Rc::new(2));
        h.reset(Rc::new(0));
        assert_eq!(values(&h), vec![0]);
        assert_eq!(h.cursor(), 0);
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let mut h = history(0);
        assert_eq!(h.capacity(), 1);
        h.push(Rc::new(5));
        assert_eq!(values(&h), vec![5]);
        assert_eq!(h.cursor(), 0);
    }

    #[test]
    fn config_builders() {
        let cfg = HistoryConfig::default()
            .with_debounce(Duration::from_millis(50))
            .with_capacity(0);
        assert_eq!(cfg.debounce, Duration::from_millis(50));
        assert_eq!(cfg.capacity, 1);
        assert_eq!(HistoryConfig::default().capacity, DEFAULT_CAPACITY);
    }
}
