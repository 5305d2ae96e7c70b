//! Block-aligned record stream writer.
//!
//! Records are packed into a pending block and flushed to the block
//! manager one full block at a time. Every flushed block ends with a
//! 3-byte jumbo flag; a record's payload is separated from its zero
//! padding by the `<!>` notation. A record longer than
//! `block_size − 6` bytes becomes a **jumbo** sequence of consecutive
//! blocks flagged first/middle/last.
//!
//! `append` returns the number of the block the record *starts* in,
//! which the SSTable writer uses to build its index.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::trace;

use super::{BlockError, BlockManager, DATA_END_NOTATION, JUMBO_FLAG_LEN, JumboFlag};

/// Per-block overhead: the `<!>` notation plus the jumbo flag.
const BLOCK_OVERHEAD: usize = DATA_END_NOTATION.len() + JUMBO_FLAG_LEN;

/// Streaming writer that lays records out over fixed-size blocks.
#[derive(Debug)]
pub struct BlockStreamWriter {
    bm: Arc<BlockManager>,
    path: PathBuf,
    pending: Vec<u8>,
    next_block: u64,
}

impl BlockStreamWriter {
    /// Create a writer that appends blocks to `path` starting at block 0.
    pub fn new(bm: Arc<BlockManager>, path: impl Into<PathBuf>) -> Self {
        let block_size = bm.block_size();
        Self {
            bm,
            path: path.into(),
            pending: Vec::with_capacity(block_size),
            next_block: 0,
        }
    }

    /// Path of the file being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block size of the backing manager.
    pub fn block_size(&self) -> usize {
        self.bm.block_size()
    }

    /// Number of blocks flushed to disk so far.
    pub fn blocks_written(&self) -> u64 {
        self.next_block
    }

    /// True when `len` cannot fit a single block alongside its notation
    /// and flag.
    pub fn is_jumbo(&self, len: usize) -> bool {
        len > self.bm.block_size() - BLOCK_OVERHEAD
    }

    /// Append one record, returning the block number it starts in.
    pub fn append(&mut self, record: &[u8]) -> Result<u64, BlockError> {
        let block_size = self.bm.block_size();

        if self.is_jumbo(record.len()) {
            self.flush_pending()?;
            let start = self.next_block;
            self.write_jumbo(record)?;
            return Ok(start);
        }

        // Reserve the 3-byte flag when deciding whether the record fits.
        if self.pending.len() + record.len() + JUMBO_FLAG_LEN > block_size {
            self.flush_pending()?;
        }
        self.pending.extend_from_slice(record);
        Ok(self.next_block)
    }

    /// Close the current section on a block boundary.
    ///
    /// With a `tail`, a dedicated closing block is emitted whose final
    /// bytes are `tail ‖ <!> ‖ flag`, zero padding in front — this is how
    /// the SSTable writer plants the metadata-offset pointer in the last
    /// block of the file. Returns the block number the *next* section
    /// would start at (equivalently, the file's block count so far).
    pub fn end_section(&mut self, tail: Option<u64>) -> Result<u64, BlockError> {
        self.flush_pending()?;
        if let Some(value) = tail {
            let block_size = self.bm.block_size();
            let mut block = Vec::with_capacity(block_size);
            block.resize(block_size - 8 - BLOCK_OVERHEAD, 0);
            block.extend_from_slice(&value.to_be_bytes());
            block.extend_from_slice(DATA_END_NOTATION);
            block.extend_from_slice(&[0, 0, JumboFlag::None as u8]);
            self.bm.write_block(&self.path, self.next_block, &block)?;
            self.next_block += 1;
            trace!(path = %self.path.display(), tail = value, "closing block written");
        }
        Ok(self.next_block)
    }

    /// Flush the pending block, adding notation, padding, and flag.
    fn flush_pending(&mut self) -> Result<(), BlockError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let block_size = self.bm.block_size();
        let mut block = std::mem::take(&mut self.pending);
        if block.len() + BLOCK_OVERHEAD <= block_size {
            block.extend_from_slice(DATA_END_NOTATION);
        }
        block.resize(block_size - JUMBO_FLAG_LEN, 0);
        block.extend_from_slice(&[0, 0, JumboFlag::None as u8]);

        self.bm.write_block(&self.path, self.next_block, &block)?;
        trace!(path = %self.path.display(), block_no = self.next_block, "block flushed");
        self.next_block += 1;
        self.pending = Vec::with_capacity(block_size);
        Ok(())
    }

    /// Emit a record as a sequence of jumbo blocks.
    fn write_jumbo(&mut self, record: &[u8]) -> Result<(), BlockError> {
        let block_size = self.bm.block_size();
        let chunk_size = block_size - BLOCK_OVERHEAD;
        let num_blocks = record.len().div_ceil(chunk_size);
        trace!(
            path = %self.path.display(),
            len = record.len(),
            num_blocks,
            "writing jumbo record"
        );

        for (i, chunk) in record.chunks(chunk_size).enumerate() {
            let flag = if i == 0 {
                JumboFlag::Start
            } else if i == num_blocks - 1 {
                JumboFlag::End
            } else {
                JumboFlag::Middle
            };

            let mut block = Vec::with_capacity(block_size);
            block.extend_from_slice(chunk);
            block.extend_from_slice(DATA_END_NOTATION);
            block.resize(block_size - JUMBO_FLAG_LEN, 0);
            block.extend_from_slice(&[0, 0, flag as u8]);

            self.bm.write_block(&self.path, self.next_block, &block)?;
            self.next_block += 1;
        }
        Ok(())
    }

    /// Predict how many blocks a run of records will occupy, mirroring
    /// the packing rules of [`append`] followed by a plain
    /// [`end_section`].
    ///
    /// The SSTable writer uses this to compute distance-from-end offsets
    /// before the trailing sections are physically written.
    pub fn count_blocks(
        block_size: usize,
        record_lens: impl IntoIterator<Item = usize>,
    ) -> u64 {
        let chunk_size = block_size - BLOCK_OVERHEAD;
        let mut blocks = 0u64;
        let mut pending = 0usize;
        for len in record_lens {
            if len > chunk_size {
                if pending > 0 {
                    blocks += 1;
                    pending = 0;
                }
                blocks += len.div_ceil(chunk_size) as u64;
            } else if pending + len + JUMBO_FLAG_LEN > block_size {
                blocks += 1;
                pending = len;
            } else {
                pending += len;
            }
        }
        if pending > 0 {
            blocks += 1;
        }
        blocks
    }
}
