//! Sorted String Table (SSTable) Module
//!
//! Immutable, sorted, block-aligned on-disk tables. Each table is a
//! single file produced by a memtable flush or a compaction and is
//! never modified afterwards.
//!
//! # On-disk layout
//!
//! Four sections, laid out contiguously, each closed on a block
//! boundary by the stream writer:
//!
//! ```text
//! ┌───────────────┐ block 0
//! │ Data          │  (u64 key_len, key, u64 value_len, value)*
//! ├───────────────┤
//! │ Index         │  (u64 key_len, key, u64 data_block)*
//! ├───────────────┤
//! │ Summary       │  (u64 key_len, key, u64 index_block_from_end)*
//! ├───────────────┤
//! │ Metadata      │  u64 bf_size, bf, u64 pbf_size, pbf,
//! │               │  u64 sum_start_rel, u64 sum_end_rel,
//! │               │  u64 num_items, u64 merkle_size, merkle_root
//! ├───────────────┤
//! │ Closing block │  …padding… u64 metadata_start ‖ <!> ‖ flag
//! └───────────────┘ last block
//! ```
//!
//! All integers are big-endian. Offsets stored in the summary and in
//! the metadata are **distances from the end of the file in blocks**,
//! so a reader can resolve them against `file_size_in_blocks` without
//! any other context; the closing block's trailing 8 bytes bootstrap
//! the whole discovery bottom-up.
//!
//! # Lookup path
//!
//! bloom filter → summary (bracketing pair) → index (last entry ≤ key)
//! → data block scan. Each stage can declare the key absent without
//! touching the stages after it.
//!
//! # Sub-modules
//!
//! - [`writer`] — [`TableWriter`] building tables from sorted streams,
//!   plus [`writer::flush_memtable`].
//! - [`reader`] — [`TableReader`] for one table and [`Retriever`] for
//!   the newest-first walk across all levels.
//! - [`pool`] — [`ReaderPool`] streaming whole tables for compaction.

#[cfg(test)]
mod tests;

pub mod pool;
pub mod reader;
pub mod writer;

pub use pool::ReaderPool;
pub use reader::{Retriever, TableReader};
pub use writer::TableWriter;

use std::io;

use thiserror::Error;

use crate::block::BlockError;
use crate::codec::CodecError;
use crate::filter::{BloomFilter, FilterError, PrefixBloomFilter};

/// Errors returned by SSTable operations (read, write, build).
#[derive(Debug, Error)]
pub enum SSTableError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Block-level I/O error.
    #[error("block error: {0}")]
    Block(#[from] BlockError),

    /// Record framing error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A persisted filter failed to deserialize.
    #[error("filter error: {0}")]
    Filter(#[from] FilterError),

    /// The table's sections contradict each other or the file size.
    #[error("corrupt table: {0}")]
    Corrupt(String),

    /// Records were fed to the writer out of order.
    #[error("keys out of order: {prev:?} came before {next:?}")]
    OutOfOrder {
        /// Key accepted previously.
        prev: String,
        /// Offending key.
        next: String,
    },
}

/// Parsed metadata section of one table.
///
/// Everything a reader needs before touching the data: the filters, the
/// summary location (already converted to absolute block numbers), the
/// record count, and the Merkle root over the values.
#[derive(Debug)]
pub struct TableMeta {
    /// Bloom filter over the table's keys.
    pub bloom: BloomFilter,

    /// Bloom filter over the table's key prefixes.
    pub prefix_bloom: PrefixBloomFilter,

    /// First block of the summary section (absolute).
    pub summary_start: u64,

    /// One past the last block of the summary section (absolute); also
    /// the first block of the metadata section.
    pub summary_end: u64,

    /// Number of data records in the table.
    pub num_items: u64,

    /// Merkle root over the table's values.
    pub merkle_root: Vec<u8>,
}
