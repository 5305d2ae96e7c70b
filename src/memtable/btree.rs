//! `BTreeMap` backing — the standard library already provides the
//! ordered structure, so this backing is a thin size-tracking shell.

use std::collections::BTreeMap;

/// Ordered memtable over a `BTreeMap`.
#[derive(Debug, Default)]
pub struct BTreeMemtable {
    map: BTreeMap<String, String>,
    size: usize,
}

impl BTreeMemtable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a key. Returns `true` when the key was new.
    pub fn add(&mut self, key: &str, value: &str) -> bool {
        self.size += key.len() + value.len();
        self.map.insert(key.to_string(), value.to_string()).is_none()
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    /// All entries in key order (the map's natural order).
    pub fn to_sorted_pairs(&self) -> Vec<(String, String)> {
        self.map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Accumulated byte size.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.map.clear();
        self.size = 0;
    }
}
