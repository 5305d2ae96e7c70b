//! Multi-table streaming readers for compaction.
//!
//! A [`ReaderPool`] opens every input table once, parses its metadata
//! once, and then streams each data section in order: one decoded block
//! buffered per table, with a countdown from the metadata's `num_items`
//! marking exhaustion — the data section's end is never probed
//! directly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::block::{BlockManager, BlockStreamReader, Direction};
use crate::codec;
use crate::config::Config;

use super::{SSTableError, TableReader};

/// Streaming cursor over one table's data section.
struct PoolEntry {
    reader: BlockStreamReader,
    path: PathBuf,
    /// Next data block to load.
    current_block: u64,
    /// Decoded payload of the block under the cursor.
    buffer: Vec<u8>,
    /// Byte position inside `buffer`.
    position: usize,
    /// Records left before this table is exhausted.
    remaining: u64,
}

/// One open reader per compaction input table.
pub struct ReaderPool {
    entries: Vec<PoolEntry>,
}

impl ReaderPool {
    /// Open all input tables and pre-parse their metadata.
    pub fn open(
        bm: Arc<BlockManager>,
        paths: &[PathBuf],
        config: &Config,
    ) -> Result<Self, SSTableError> {
        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let table = TableReader::open(Arc::clone(&bm), path, config)?;
            let remaining = table.meta().num_items;
            entries.push(PoolEntry {
                reader: BlockStreamReader::new(Arc::clone(&bm), path, Direction::Forward),
                path: path.clone(),
                current_block: 0,
                buffer: Vec::new(),
                position: 0,
                remaining,
            });
        }
        Ok(Self { entries })
    }

    /// Number of pooled tables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Path of table `i`.
    pub fn path(&self, i: usize) -> &Path {
        &self.entries[i].path
    }

    /// Total records across all pooled tables (upper bound for the
    /// merged output before deduplication).
    pub fn total_items(&self) -> u64 {
        self.entries.iter().map(|e| e.remaining).sum()
    }

    /// Next `(key, value)` of table `i`, or `None` once it is
    /// exhausted.
    pub fn read_next(&mut self, i: usize) -> Result<Option<(String, String)>, SSTableError> {
        let entry = &mut self.entries[i];
        if entry.remaining == 0 {
            return Ok(None);
        }

        // Refill the buffer when the current block is spent.
        if entry.buffer.len() - entry.position < 16 {
            let (payload, consumed) = entry.reader.read_entry(entry.current_block)?;
            entry.current_block += consumed;
            entry.buffer = payload;
            entry.position = 0;
        }

        let (key, value) = codec::decode_data_record(&entry.buffer, &mut entry.position)?;
        entry.remaining -= 1;
        Ok(Some((key, value)))
    }
}
