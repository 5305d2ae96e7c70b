//! Direction-aware block stream reader with jumbo reassembly.
//!
//! `read_entry` hides the block structure from callers: it strips the
//! jumbo flag and padding from regular blocks and stitches jumbo
//! sequences back together, reporting how many raw blocks were consumed
//! so the caller can advance its cursor.
//!
//! In [`Direction::Forward`] a jumbo sequence reads first → middle* →
//! last. In [`Direction::Reverse`] block numbers count from the end of
//! the file, so the same sequence is encountered last → middle* → first
//! and the collected chunks are reversed before being returned.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::trace;

use super::{
    BlockError, BlockManager, DATA_END_NOTATION, Direction, JUMBO_FLAG_LEN, JumboFlag,
};

/// Streaming reader over a block-aligned file.
#[derive(Debug)]
pub struct BlockStreamReader {
    bm: Arc<BlockManager>,
    path: PathBuf,
    direction: Direction,
}

impl BlockStreamReader {
    /// Create a reader over `path` in the given direction.
    pub fn new(bm: Arc<BlockManager>, path: impl Into<PathBuf>, direction: Direction) -> Self {
        Self {
            bm,
            path: path.into(),
            direction,
        }
    }

    /// Path of the file being read.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current reading direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Switch reading direction (metadata is read backwards, data
    /// forwards).
    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    /// Total number of blocks in the file.
    pub fn file_size_in_blocks(&self) -> Result<u64, BlockError> {
        self.bm.file_size_in_blocks(&self.path)
    }

    /// Read one logical entry starting at `block_no` (direction-aware).
    ///
    /// Returns the cleaned payload and the number of raw blocks the
    /// entry occupied.
    pub fn read_entry(&self, block_no: u64) -> Result<(Vec<u8>, u64), BlockError> {
        let block = self.bm.read_block(&self.path, block_no, self.direction)?;
        let flag = block_flag(&block)?;

        match (self.direction, flag) {
            (_, JumboFlag::None) => Ok((clean_block(&block), 1)),

            // A lone first-block can only be identified by peeking ahead,
            // so forward jumbo handles it inside the loop. In reverse, a
            // first-block flag *is* the lone case: a longer sequence
            // would have been entered through its last block.
            (Direction::Forward, JumboFlag::Start) => self.read_jumbo_forward(block_no, &block),
            (Direction::Reverse, JumboFlag::Start) => Ok((clean_block(&block), 1)),

            (Direction::Reverse, JumboFlag::End) => self.read_jumbo_reverse(block_no, &block),

            (Direction::Forward, JumboFlag::Middle | JumboFlag::End) => {
                Err(BlockError::MalformedJumbo(format!(
                    "forward read entered a jumbo sequence mid-way at block {block_no}"
                )))
            }
            (Direction::Reverse, JumboFlag::Middle) => Err(BlockError::MalformedJumbo(format!(
                "reverse read entered a jumbo sequence mid-way at block {block_no}"
            ))),
        }
    }

    /// Assemble a jumbo sequence starting from its first block.
    fn read_jumbo_forward(
        &self,
        start_block: u64,
        first: &[u8],
    ) -> Result<(Vec<u8>, u64), BlockError> {
        let mut payload = clean_block(first);
        let mut consumed = 1u64;

        loop {
            let next = match self.bm.read_block(&self.path, start_block + consumed, self.direction)
            {
                Ok(block) => block,
                // File ends right after the first block: lone start.
                Err(BlockError::EndOfFile(_)) if consumed == 1 => return Ok((payload, 1)),
                Err(e) => return Err(e),
            };
            match block_flag(&next)? {
                JumboFlag::Middle => {
                    payload.extend_from_slice(&clean_block(&next));
                    consumed += 1;
                }
                JumboFlag::End => {
                    payload.extend_from_slice(&clean_block(&next));
                    consumed += 1;
                    trace!(start_block, consumed, "jumbo entry assembled");
                    return Ok((payload, consumed));
                }
                // The next block starts a fresh entry, so the first block
                // was a single-block jumbo record.
                JumboFlag::None | JumboFlag::Start if consumed == 1 => {
                    return Ok((payload, 1));
                }
                other => {
                    return Err(BlockError::MalformedJumbo(format!(
                        "unexpected {other:?} block inside jumbo sequence at block {}",
                        start_block + consumed
                    )));
                }
            }
        }
    }

    /// Assemble a jumbo sequence entered through its last block.
    fn read_jumbo_reverse(
        &self,
        start_block: u64,
        last: &[u8],
    ) -> Result<(Vec<u8>, u64), BlockError> {
        let mut chunks = vec![clean_block(last)];
        let mut consumed = 1u64;

        loop {
            let next = self
                .bm
                .read_block(&self.path, start_block + consumed, self.direction)
                .map_err(|e| match e {
                    BlockError::EndOfFile(_) => BlockError::MalformedJumbo(
                        "jumbo sequence ran past the start of the file".into(),
                    ),
                    other => other,
                })?;
            match block_flag(&next)? {
                JumboFlag::Middle => {
                    chunks.push(clean_block(&next));
                    consumed += 1;
                }
                JumboFlag::Start => {
                    chunks.push(clean_block(&next));
                    consumed += 1;
                    chunks.reverse();
                    trace!(start_block, consumed, "jumbo entry assembled (reverse)");
                    return Ok((chunks.concat(), consumed));
                }
                other => {
                    return Err(BlockError::MalformedJumbo(format!(
                        "unexpected {other:?} block inside reverse jumbo sequence at block {}",
                        start_block + consumed
                    )));
                }
            }
        }
    }
}

/// Extract and validate the jumbo flag from a raw block.
fn block_flag(block: &[u8]) -> Result<JumboFlag, BlockError> {
    if block.len() < JUMBO_FLAG_LEN + DATA_END_NOTATION.len() {
        return Err(BlockError::UndersizedBlock(block.len()));
    }
    JumboFlag::from_byte(block[block.len() - 1])
}

/// Strip the jumbo flag, then cut the payload at the data-end notation.
///
/// Blocks packed so tightly that the notation was omitted come back
/// whole (minus the flag); callers' record framing skips the residue.
fn clean_block(block: &[u8]) -> Vec<u8> {
    let without_flag = &block[..block.len() - JUMBO_FLAG_LEN];
    match without_flag
        .windows(DATA_END_NOTATION.len())
        .position(|w| w == DATA_END_NOTATION)
    {
        Some(idx) => without_flag[..idx].to_vec(),
        None => without_flag.to_vec(),
    }
}
