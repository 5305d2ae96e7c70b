//! Arena-based skiplist backing.
//!
//! Nodes live in a `Vec`; tower links are plain indices into that
//! arena, so there is no pointer juggling and the whole structure drops
//! in one shot on `clear()`. Tower heights come from coin flips capped
//! at the configured maximum level.

use rand::Rng;

const NIL: usize = usize::MAX;

/// One node of the list: a key, its value, and a tower of forward
/// links (index 0 is the base level holding every node).
#[derive(Debug)]
struct Node {
    key: String,
    value: String,
    tower: Vec<usize>,
}

/// Ordered map over an index arena.
#[derive(Debug)]
pub struct SkipList {
    arena: Vec<Node>,
    /// Forward links out of the virtual head, one per level.
    head: Vec<usize>,
    max_levels: usize,
    size: usize,
}

impl SkipList {
    /// Create an empty list with towers capped at `max_levels`.
    pub fn new(max_levels: usize) -> Self {
        let max_levels = max_levels.max(1);
        Self {
            arena: Vec::new(),
            head: vec![NIL; max_levels],
            max_levels,
            size: 0,
        }
    }

    /// Insert or overwrite a key. Returns `true` when the key was new.
    ///
    /// Size grows by `len(key) + len(value)` either way; it is the
    /// flush-trigger accumulator, not a live footprint.
    pub fn add(&mut self, key: &str, value: &str) -> bool {
        self.size += key.len() + value.len();

        // Collect the rightmost node before `key` on every level.
        let mut preds = vec![NIL; self.max_levels];
        let mut current = NIL;
        for level in (0..self.max_levels).rev() {
            let mut next = self.next_on_level(current, level);
            while next != NIL && self.arena[next].key.as_str() < key {
                current = next;
                next = self.next_on_level(current, level);
            }
            preds[level] = current;
        }

        // Overwrite in place when the key already exists.
        let candidate = self.next_on_level(preds[0], 0);
        if candidate != NIL && self.arena[candidate].key == key {
            self.arena[candidate].value = value.to_string();
            return false;
        }

        let height = self.random_height();
        let idx = self.arena.len();
        self.arena.push(Node {
            key: key.to_string(),
            value: value.to_string(),
            tower: vec![NIL; height],
        });

        for level in 0..height {
            let pred = preds[level];
            if pred == NIL {
                self.arena[idx].tower[level] = self.head[level];
                self.head[level] = idx;
            } else {
                self.arena[idx].tower[level] = self.arena[pred].tower[level];
                self.arena[pred].tower[level] = idx;
            }
        }
        true
    }

    /// Look up a key by descending the towers.
    pub fn get(&self, key: &str) -> Option<String> {
        let mut current = NIL;
        for level in (0..self.max_levels).rev() {
            let mut next = self.next_on_level(current, level);
            while next != NIL && self.arena[next].key.as_str() < key {
                current = next;
                next = self.next_on_level(current, level);
            }
        }
        let candidate = self.next_on_level(current, 0);
        if candidate != NIL && self.arena[candidate].key == key {
            Some(self.arena[candidate].value.clone())
        } else {
            None
        }
    }

    /// All entries in key order, walking the base level.
    pub fn to_sorted_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.arena.len());
        let mut idx = self.head[0];
        while idx != NIL {
            let node = &self.arena[idx];
            pairs.push((node.key.clone(), node.value.clone()));
            idx = node.tower[0];
        }
        pairs
    }

    /// Accumulated byte size.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// True when no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Drop all nodes.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.head = vec![NIL; self.max_levels];
        self.size = 0;
    }

    /// Link following `current` on `level`; `NIL` current means the
    /// virtual head.
    fn next_on_level(&self, current: usize, level: usize) -> usize {
        if current == NIL {
            self.head[level]
        } else {
            self.arena[current]
                .tower
                .get(level)
                .copied()
                .unwrap_or(NIL)
        }
    }

    /// Coin-flip tower height in `1..=max_levels`.
    fn random_height(&self) -> usize {
        let mut rng = rand::rng();
        let mut height = 1;
        while height < self.max_levels && rng.random_bool(0.5) {
            height += 1;
        }
        height
    }
}
