//! Snapshot scan iterators.
//!
//! `PREFIX_ITERATE` and `RANGE_ITERATE` hand the caller a
//! [`ScanIterator`]: the sorted union of memtable and SSTable matches,
//! captured at open time. Writes made while iterating are not
//! reflected. `stop` halts production on the caller's side; `reset`
//! rewinds to the first entry and lifts a stop.

/// Buffered iterator over a scan's snapshot.
#[derive(Debug)]
pub struct ScanIterator {
    entries: Vec<(String, String)>,
    position: usize,
    stopped: bool,
}

impl ScanIterator {
    /// Wrap a sorted snapshot.
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self {
            entries,
            position: 0,
            stopped: false,
        }
    }

    /// The next entry, or `None` when exhausted or stopped.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<(String, String)> {
        if self.stopped || self.position >= self.entries.len() {
            return None;
        }
        let entry = self.entries[self.position].clone();
        self.position += 1;
        Some(entry)
    }

    /// True when another `next` would yield an entry.
    pub fn has_next(&self) -> bool {
        !self.stopped && self.position < self.entries.len()
    }

    /// Rewind to the first entry and lift any stop.
    pub fn reset(&mut self) {
        self.position = 0;
        self.stopped = false;
    }

    /// Halt the iterator; subsequent `next` calls yield `None` until a
    /// `reset`.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Total entries in the snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the snapshot holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
