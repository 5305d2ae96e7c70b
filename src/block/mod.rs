//! Block Manager Module
//!
//! Every persisted file in StrataDB — SSTables and WAL segments alike —
//! is an exact sequence of fixed-size blocks. This module is the only
//! place that touches those files: it reads and writes whole blocks at
//! computed offsets and fronts the reads with an optional LRU cache.
//!
//! ## Design Overview
//!
//! The manager itself is stateless apart from the cache; callers hold a
//! shared [`std::sync::Arc`] and pass paths per call. Writes always go
//! straight to disk (the cache is read-only) and invalidate the cached
//! copy of the written block.
//!
//! # Addressing
//!
//! Block numbers are zero-based. [`Direction::Forward`] counts from the
//! start of the file; [`Direction::Reverse`] counts from the end, so
//! reverse block `0` is the **last** block of the file. Reading past the
//! final block yields [`BlockError::EndOfFile`], which callers use as
//! their iteration stop signal.
//!
//! # Sub-modules
//!
//! - [`cache`] — bounded LRU over `(path, block_no)` with an arena-backed
//!   recency list.
//! - [`writer`] — block-aligned record stream with jumbo chunking.
//! - [`reader`] — direction-aware entry reads with jumbo reassembly.

#[cfg(test)]
mod tests;

pub mod cache;
pub mod reader;
pub mod writer;

pub use reader::BlockStreamReader;
pub use writer::BlockStreamWriter;

use std::fs::OpenOptions;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::trace;

use cache::LruCache;

/// Three-byte end-of-data notation separating a record payload from the
/// zero padding that fills the rest of its block.
pub const DATA_END_NOTATION: &[u8; 3] = b"<!>";

/// Width of the jumbo flag field at the tail of every block.
pub const JUMBO_FLAG_LEN: usize = 3;

/// Jumbo flag values, carried in the last byte of the 3-byte flag field.
///
/// Block structure: `[DATA][<!>][PADDING][3-byte JUMBO FLAG]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JumboFlag {
    /// Regular block holding one or more whole records.
    None = 0,
    /// First block of a jumbo sequence.
    Start = 1,
    /// Interior block of a jumbo sequence.
    Middle = 3,
    /// Final block of a jumbo sequence.
    End = 7,
}

impl JumboFlag {
    /// Decode a flag byte, rejecting unknown values.
    pub fn from_byte(byte: u8) -> Result<Self, BlockError> {
        match byte {
            0 => Ok(JumboFlag::None),
            1 => Ok(JumboFlag::Start),
            3 => Ok(JumboFlag::Middle),
            7 => Ok(JumboFlag::End),
            other => Err(BlockError::InvalidJumboFlag(other)),
        }
    }
}

/// Reading direction for block addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Block `n` is the `n`-th block from the start of the file.
    Forward,
    /// Block `n` is the `n`-th block from the end (`0` = last block).
    Reverse,
}

/// Errors returned by block-level I/O.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BlockError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to write more than one block of data.
    #[error("data size {size} exceeds block size {block_size}")]
    Oversized {
        /// Bytes the caller attempted to write.
        size: usize,
        /// Configured block size.
        block_size: usize,
    },

    /// Read addressed a block past the end of the file.
    #[error("block {0} is past the end of the file")]
    EndOfFile(u64),

    /// A block carried an unknown jumbo flag byte.
    #[error("unknown jumbo flag: 0x{0:02X}")]
    InvalidJumboFlag(u8),

    /// A jumbo sequence did not follow start → middle → end order.
    #[error("malformed jumbo sequence: {0}")]
    MalformedJumbo(String),

    /// A block was shorter than the mandatory notation + flag tail.
    #[error("undersized block: {0} bytes")]
    UndersizedBlock(usize),

    /// Internal consistency or locking error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Fixed-size block I/O with an optional read cache.
///
/// See the [module-level documentation](self) for addressing rules.
#[derive(Debug)]
pub struct BlockManager {
    block_size: usize,
    cache: Option<Mutex<LruCache>>,
}

impl BlockManager {
    /// Create a manager with a read cache of `cache_capacity` blocks.
    ///
    /// A capacity of zero disables caching entirely; correctness is
    /// identical either way.
    pub fn new(block_size: usize, cache_capacity: usize) -> Self {
        let cache = if cache_capacity > 0 {
            Some(Mutex::new(LruCache::new(cache_capacity)))
        } else {
            None
        };
        Self { block_size, cache }
    }

    /// The configured block size in bytes.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Write one block at `block_no * block_size`, padding `data` with
    /// zeroes up to the block size.
    ///
    /// Fails with [`BlockError::Oversized`] if `data` does not fit in a
    /// single block.
    pub fn write_block(&self, path: &Path, block_no: u64, data: &[u8]) -> Result<(), BlockError> {
        if data.len() > self.block_size {
            return Err(BlockError::Oversized {
                size: data.len(),
                block_size: self.block_size,
            });
        }

        let mut file = OpenOptions::new().create(true).write(true).open(path)?;
        file.seek(SeekFrom::Start(block_no * self.block_size as u64))?;

        let mut padded = vec![0u8; self.block_size];
        padded[..data.len()].copy_from_slice(data);
        file.write_all(&padded)?;
        file.sync_data()?;

        if let Some(cache) = &self.cache {
            let mut guard = cache
                .lock()
                .map_err(|_| BlockError::Internal("cache lock poisoned".into()))?;
            guard.invalidate(path, block_no);
        }

        trace!(path = %path.display(), block_no, len = data.len(), "block written");
        Ok(())
    }

    /// Read one block, addressed according to `direction`.
    ///
    /// Returns exactly `block_size` bytes, or [`BlockError::EndOfFile`]
    /// when the address lies past the last block.
    pub fn read_block(
        &self,
        path: &Path,
        block_no: u64,
        direction: Direction,
    ) -> Result<Vec<u8>, BlockError> {
        let total = self.file_size_in_blocks(path)?;
        if block_no >= total {
            return Err(BlockError::EndOfFile(block_no));
        }
        let absolute = match direction {
            Direction::Forward => block_no,
            Direction::Reverse => total - 1 - block_no,
        };

        if let Some(cache) = &self.cache {
            let mut guard = cache
                .lock()
                .map_err(|_| BlockError::Internal("cache lock poisoned".into()))?;
            if let Some(bytes) = guard.get(path, absolute) {
                trace!(path = %path.display(), block = absolute, "block cache hit");
                return Ok(bytes);
            }
        }

        let mut file = OpenOptions::new().read(true).open(path)?;
        file.seek(SeekFrom::Start(absolute * self.block_size as u64))?;
        let mut buf = vec![0u8; self.block_size];
        file.read_exact(&mut buf)?;

        if let Some(cache) = &self.cache {
            let mut guard = cache
                .lock()
                .map_err(|_| BlockError::Internal("cache lock poisoned".into()))?;
            guard.insert(path, absolute, buf.clone());
        }

        trace!(path = %path.display(), block = absolute, "block read from disk");
        Ok(buf)
    }

    /// Number of whole blocks in the file (a missing file has zero).
    pub fn file_size_in_blocks(&self, path: &Path) -> Result<u64, BlockError> {
        match std::fs::metadata(path) {
            Ok(meta) => Ok(meta.len() / self.block_size as u64),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(BlockError::Io(e)),
        }
    }

    /// Drop every cached block belonging to `path`.
    ///
    /// Called when a file is deleted (compaction inputs, WAL segments) so
    /// a later file at the same path cannot serve stale bytes.
    pub fn evict_file(&self, path: &Path) -> Result<(), BlockError> {
        if let Some(cache) = &self.cache {
            let mut guard = cache
                .lock()
                .map_err(|_| BlockError::Internal("cache lock poisoned".into()))?;
            guard.evict_file(path);
        }
        Ok(())
    }
}

/// Cache key: one block of one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockKey {
    /// File the block belongs to.
    pub path: PathBuf,
    /// Absolute (forward) block number.
    pub block_no: u64,
}
