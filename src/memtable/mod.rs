//! Memtable Module
//!
//! The in-memory write buffer of the engine. The engine owns a ring of
//! memtables; the one under the cursor accepts writes, the others hold
//! recently flushed (or flushing) data for reads until the ring wraps
//! back onto them.
//!
//! ## Design Invariants
//!
//! - Keys are unique; `add` on an existing key replaces its value.
//! - `size` is the running sum of `len(key) + len(value)` over every
//!   accepted `add`, including overwrites — it only grows until
//!   `clear()`. A memtable is *full* once `size` reaches the configured
//!   threshold.
//! - Tombstones are ordinary values (the configured marker literal);
//!   the memtable never interprets them.
//! - `to_sorted_pairs` yields entries in ascending key order for every
//!   backing; the hashmap backing sorts on the way out.
//!
//! ## Backings
//!
//! Chosen by [`MemtableKind`]: an arena-based [`SkipList`], a
//! [`BTreeMap`]-backed table, or a [`HashMap`]-backed table. The
//! external contract is identical except that the hashmap loses the
//! ordering of in-flight writes (prefix/range scans over unflushed data
//! pay a sort).

#[cfg(test)]
mod tests;

pub mod btree;
pub mod hashmap;
pub mod skiplist;

pub use btree::BTreeMemtable;
pub use hashmap::HashMemtable;
pub use skiplist::SkipList;

use crate::config::{Config, MemtableKind};

/// One in-memory write buffer of the engine's ring.
#[derive(Debug)]
pub enum Memtable {
    /// Arena-based skiplist backing.
    SkipList(SkipList),
    /// `BTreeMap` backing.
    BTree(BTreeMemtable),
    /// `HashMap` backing (sorts on output).
    Hash(HashMemtable),
}

impl Memtable {
    /// Create a memtable using the backing selected in `config`.
    pub fn new(config: &Config) -> Self {
        match config.memtable_type {
            MemtableKind::SkipList => Memtable::SkipList(SkipList::new(config.skip_list_levels)),
            MemtableKind::BTree => Memtable::BTree(BTreeMemtable::new()),
            MemtableKind::HashMap => Memtable::Hash(HashMemtable::new()),
        }
    }

    /// Insert or overwrite a key. Returns `true` when the key was new.
    pub fn add(&mut self, key: &str, value: &str) -> bool {
        match self {
            Memtable::SkipList(inner) => inner.add(key, value),
            Memtable::BTree(inner) => inner.add(key, value),
            Memtable::Hash(inner) => inner.add(key, value),
        }
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<String> {
        match self {
            Memtable::SkipList(inner) => inner.get(key),
            Memtable::BTree(inner) => inner.get(key),
            Memtable::Hash(inner) => inner.get(key),
        }
    }

    /// All entries in ascending key order.
    pub fn to_sorted_pairs(&self) -> Vec<(String, String)> {
        match self {
            Memtable::SkipList(inner) => inner.to_sorted_pairs(),
            Memtable::BTree(inner) => inner.to_sorted_pairs(),
            Memtable::Hash(inner) => inner.to_sorted_pairs(),
        }
    }

    /// Accumulated byte size (monotonic until [`Self::clear`]).
    pub fn size(&self) -> usize {
        match self {
            Memtable::SkipList(inner) => inner.size(),
            Memtable::BTree(inner) => inner.size(),
            Memtable::Hash(inner) => inner.size(),
        }
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        match self {
            Memtable::SkipList(inner) => inner.len(),
            Memtable::BTree(inner) => inner.len(),
            Memtable::Hash(inner) => inner.len(),
        }
    }

    /// True when no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry and reset `size` to zero.
    pub fn clear(&mut self) {
        match self {
            Memtable::SkipList(inner) => inner.clear(),
            Memtable::BTree(inner) => inner.clear(),
            Memtable::Hash(inner) => inner.clear(),
        }
    }
}
