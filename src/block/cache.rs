//! Bounded LRU cache over `(path, block_no)` entries.
//!
//! The recency list is an arena-backed doubly linked list: nodes live in
//! a `Vec`, links are indices, and freed slots are recycled through a
//! free list. No `Rc`/`RefCell` juggling, no unsafe.
//!
//! The cache is read-only from the manager's point of view — blocks are
//! inserted on read and invalidated on write — but eviction still hands
//! the displaced entry back to the caller through [`LruCache::insert`]
//! so a write-back layer could flush it.

use std::collections::HashMap;
use std::path::Path;

use super::BlockKey;

const NIL: usize = usize::MAX;

/// One slot of the recency arena.
#[derive(Debug)]
struct Node {
    key: BlockKey,
    data: Vec<u8>,
    prev: usize,
    next: usize,
}

/// Bounded LRU mapping `(path, block_no)` to block bytes.
#[derive(Debug)]
pub struct LruCache {
    capacity: usize,
    map: HashMap<BlockKey, usize>,
    arena: Vec<Option<Node>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
}

impl LruCache {
    /// Create a cache holding at most `capacity` blocks.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            map: HashMap::new(),
            arena: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    /// Number of cached blocks.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Look up a block, promoting it to most-recently-used on hit.
    pub fn get(&mut self, path: &Path, block_no: u64) -> Option<Vec<u8>> {
        let key = BlockKey {
            path: path.to_path_buf(),
            block_no,
        };
        let idx = *self.map.get(&key)?;
        self.move_to_front(idx);
        self.arena[idx].as_ref().map(|node| node.data.clone())
    }

    /// Insert or refresh a block, returning the entry evicted to make
    /// room, if any.
    pub fn insert(
        &mut self,
        path: &Path,
        block_no: u64,
        data: Vec<u8>,
    ) -> Option<(BlockKey, Vec<u8>)> {
        let key = BlockKey {
            path: path.to_path_buf(),
            block_no,
        };

        if let Some(&idx) = self.map.get(&key) {
            if let Some(node) = self.arena[idx].as_mut() {
                node.data = data;
            }
            self.move_to_front(idx);
            return None;
        }

        let idx = self.alloc(Node {
            key: key.clone(),
            data,
            prev: NIL,
            next: self.head,
        });
        if self.head != NIL {
            if let Some(old_head) = self.arena[self.head].as_mut() {
                old_head.prev = idx;
            }
        }
        self.head = idx;
        if self.tail == NIL {
            self.tail = idx;
        }
        self.map.insert(key, idx);

        if self.map.len() > self.capacity {
            return self.evict_tail();
        }
        None
    }

    /// Drop one block if cached.
    pub fn invalidate(&mut self, path: &Path, block_no: u64) {
        let key = BlockKey {
            path: path.to_path_buf(),
            block_no,
        };
        if let Some(idx) = self.map.remove(&key) {
            self.unlink(idx);
            self.release(idx);
        }
    }

    /// Drop every cached block of `path`.
    pub fn evict_file(&mut self, path: &Path) {
        let doomed: Vec<BlockKey> = self
            .map
            .keys()
            .filter(|key| key.path == path)
            .cloned()
            .collect();
        for key in doomed {
            if let Some(idx) = self.map.remove(&key) {
                self.unlink(idx);
                self.release(idx);
            }
        }
    }

    fn alloc(&mut self, node: Node) -> usize {
        if let Some(idx) = self.free.pop() {
            self.arena[idx] = Some(node);
            idx
        } else {
            self.arena.push(Some(node));
            self.arena.len() - 1
        }
    }

    fn release(&mut self, idx: usize) {
        self.arena[idx] = None;
        self.free.push(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match self.arena[idx].as_ref() {
            Some(node) => (node.prev, node.next),
            None => return,
        };
        if prev != NIL {
            if let Some(p) = self.arena[prev].as_mut() {
                p.next = next;
            }
        } else {
            self.head = next;
        }
        if next != NIL {
            if let Some(n) = self.arena[next].as_mut() {
                n.prev = prev;
            }
        } else {
            self.tail = prev;
        }
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == idx {
            return;
        }
        self.unlink(idx);
        if let Some(node) = self.arena[idx].as_mut() {
            node.prev = NIL;
            node.next = self.head;
        }
        if self.head != NIL {
            if let Some(old_head) = self.arena[self.head].as_mut() {
                old_head.prev = idx;
            }
        }
        self.head = idx;
        if self.tail == NIL {
            self.tail = idx;
        }
    }

    fn evict_tail(&mut self) -> Option<(BlockKey, Vec<u8>)> {
        let tail = self.tail;
        if tail == NIL {
            return None;
        }
        self.unlink(tail);
        let node = self.arena[tail].take()?;
        self.free.push(tail);
        self.map.remove(&node.key);
        Some((node.key, node.data))
    }
}
