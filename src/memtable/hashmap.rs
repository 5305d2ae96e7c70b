//! `HashMap` backing — O(1) writes, but iteration order is lost, so
//! `to_sorted_pairs` sorts on the way out. Prefix and range scans over
//! unflushed data pay that sort; point reads do not.

use std::collections::HashMap;

/// Unordered memtable over a `HashMap`.
#[derive(Debug, Default)]
pub struct HashMemtable {
    map: HashMap<String, String>,
    size: usize,
}

impl HashMemtable {
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

    /// All entries sorted by key.
    pub fn to_sorted_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs
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
