//! Write-Ahead Logging (WAL) Module
//!
//! A **durable**, **buffered**, **segmented** write-ahead log. Every
//! accepted mutation becomes a CRC-protected record; records are
//! buffered in memory and flushed through the block-aligned stream
//! writer, so segments are ordinary block files like everything else on
//! disk.
//!
//! ## Design Overview
//!
//! - `append` pushes a record into the pending buffer; once
//!   `wal_buffer_size` records accumulate the buffer is encoded and
//!   flushed, closing the section on a block boundary so the bytes are
//!   on disk.
//! - After a flush, a segment that has reached `wal_segment_size` bytes
//!   is rotated: the writer moves to a fresh segment file named with a
//!   monotonic timestamp, so a filename sort is the replay order.
//! - All segments are deleted at once when the engine's memtable ring
//!   wraps — at that point every prior write is persisted in SSTables.
//!
//! # Record layout (little-endian)
//!
//! ```text
//! CRC32(IEEE)  | 4 B  (over everything after this field)
//! Timestamp    | 8 B  (seconds since UNIX epoch)
//! Tombstone    | 1 B  (0 = put, 1 = delete)
//! KeySize      | 8 B
//! ValueSize    | 8 B  (0 for delete)
//! Key          | KeySize B
//! Value        | ValueSize B
//! ```
//!
//! # Guarantees
//!
//! - **Durability:** a flushed buffer is on disk before `flush` returns.
//! - **Integrity:** every record checksum is verified during replay.
//! - **Corruption detection:** a single CRC mismatch aborts replay with
//!   a fatal error — a corrupted log is never partially trusted.

#[cfg(test)]
mod tests;

use std::fs;
use std::io;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crc32fast::Hasher as Crc32;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::block::{BlockError, BlockManager, BlockStreamReader, BlockStreamWriter, Direction};
use crate::codec::{self, CodecError};
use crate::layout::DataLayout;

/// Fixed bytes of a record before its key and value: CRC, timestamp,
/// tombstone flag, and the two sizes.
const RECORD_HEADER_LEN: usize = 4 + 8 + 1 + 8 + 8;

/// Seconds since the UNIX epoch, for stamping WAL records.
fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Errors returned by WAL operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WalError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Block-level I/O error.
    #[error("block error: {0}")]
    Block(#[from] BlockError),

    /// Record framing error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A replayed record failed its checksum — the log cannot be
    /// trusted past this point, and replay refuses to skip it.
    #[error("WAL record checksum mismatch in {segment}")]
    ChecksumMismatch {
        /// Segment file holding the corrupt record.
        segment: String,
    },
}

/// One logical WAL record: a put or a delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    /// Seconds since the UNIX epoch at append time.
    pub timestamp: u64,

    /// True for a delete record.
    pub tombstone: bool,

    /// The key.
    pub key: String,

    /// The value; empty for deletes.
    pub value: String,
}

impl WalRecord {
    /// Build a put record stamped with the current time.
    pub fn put(key: &str, value: &str) -> Self {
        Self {
            timestamp: now_secs(),
            tombstone: false,
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    /// Build a delete record stamped with the current time.
    pub fn delete(key: &str) -> Self {
        Self {
            timestamp: now_secs(),
            tombstone: true,
            key: key.to_string(),
            value: String::new(),
        }
    }

    /// Encode to the on-disk frame, CRC first.
    pub fn encode(&self) -> Vec<u8> {
        let key = self.key.as_bytes();
        let value = self.value.as_bytes();

        let mut body = Vec::with_capacity(RECORD_HEADER_LEN - 4 + key.len() + value.len());
        codec::put_u64_le(&mut body, self.timestamp);
        body.push(u8::from(self.tombstone));
        codec::put_u64_le(&mut body, key.len() as u64);
        codec::put_u64_le(&mut body, value.len() as u64);
        body.extend_from_slice(key);
        body.extend_from_slice(value);

        let mut hasher = Crc32::new();
        hasher.update(&body);
        let crc = hasher.finalize();

        let mut frame = Vec::with_capacity(4 + body.len());
        codec::put_u32_le(&mut frame, crc);
        frame.extend_from_slice(&body);
        frame
    }

    /// Decode one frame at the cursor, verifying its checksum.
    ///
    /// Returns `Ok(None)` on checksum mismatch so the caller can attach
    /// segment context to the fatal error.
    pub fn decode(buf: &[u8], pos: &mut usize) -> Result<Option<Self>, WalError> {
        let body_start = *pos + 4;
        let stored_crc = codec::read_u32_le(buf, pos)?;
        let timestamp = codec::read_u64_le(buf, pos)?;
        let tombstone_byte = codec::read_raw(buf, pos, 1)?[0];
        let key_size = codec::read_u64_le(buf, pos)? as usize;
        let value_size = codec::read_u64_le(buf, pos)? as usize;
        let key = codec::read_raw(buf, pos, key_size)?;
        let value = codec::read_raw(buf, pos, value_size)?;

        let mut hasher = Crc32::new();
        hasher.update(&buf[body_start..*pos]);
        if hasher.finalize() != stored_crc {
            return Ok(None);
        }

        Ok(Some(Self {
            timestamp,
            tombstone: tombstone_byte == 1,
            key: String::from_utf8(key).map_err(CodecError::from)?,
            value: String::from_utf8(value).map_err(CodecError::from)?,
        }))
    }
}

/// The engine's write-ahead log: a pending-record buffer plus the
/// active segment.
#[derive(Debug)]
pub struct Wal {
    bm: Arc<BlockManager>,
    layout: DataLayout,
    buffer: Vec<WalRecord>,
    buffer_size: usize,
    segment_size: usize,
    writer: BlockStreamWriter,
}

impl Wal {
    /// Open the WAL, appending to a fresh segment.
    ///
    /// Existing segments are left alone for replay; new records always
    /// start a new segment file.
    pub fn open(
        bm: Arc<BlockManager>,
        layout: DataLayout,
        buffer_size: usize,
        segment_size: usize,
    ) -> Result<Self, WalError> {
        let path = layout.new_wal_segment_path();
        let writer = BlockStreamWriter::new(Arc::clone(&bm), &path);
        info!(segment = %path.display(), "WAL opened");
        Ok(Self {
            bm,
            layout,
            buffer: Vec::with_capacity(buffer_size),
            buffer_size,
            segment_size,
            writer,
        })
    }

    /// Queue one record, flushing the buffer once it is full.
    pub fn append(&mut self, record: WalRecord) -> Result<(), WalError> {
        self.buffer.push(record);
        if self.buffer.len() >= self.buffer_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Encode and persist every buffered record, then rotate the
    /// segment if it grew past the size threshold.
    pub fn flush(&mut self) -> Result<(), WalError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let count = self.buffer.len();
        for record in self.buffer.drain(..) {
            self.writer.append(&record.encode())?;
        }
        self.writer.end_section(None)?;
        trace!(records = count, "WAL buffer flushed");

        let on_disk = self.writer.blocks_written() as usize * self.bm.block_size();
        if on_disk >= self.segment_size {
            self.rotate()?;
        }
        Ok(())
    }

    /// Close the active segment and start a fresh one.
    fn rotate(&mut self) -> Result<(), WalError> {
        let path = self.layout.new_wal_segment_path();
        debug!(segment = %path.display(), "WAL segment rotated");
        self.writer = BlockStreamWriter::new(Arc::clone(&self.bm), &path);
        Ok(())
    }

    /// Flush any buffered records; called on shutdown.
    pub fn shut(&mut self) -> Result<(), WalError> {
        self.flush()
    }

    /// Remove every segment file and start a fresh one.
    ///
    /// This is the WAL's only garbage-collection point, taken when the
    /// memtable ring wraps to index 0 — everything the old segments
    /// protect is in SSTables by then. Buffered records survive in
    /// memory and land in the fresh segment on the next flush.
    pub fn delete_segments(&mut self) -> Result<(), WalError> {
        let segments = self.layout.wal_segments_oldest_first()?;
        let count = segments.len();
        for segment in segments {
            self.bm.evict_file(&segment)?;
            fs::remove_file(&segment)?;
        }
        self.rotate()?;
        info!(deleted = count, "WAL segments deleted");
        Ok(())
    }

    /// Number of records waiting in the buffer.
    pub fn pending_records(&self) -> usize {
        self.buffer.len()
    }

    /// Replay every segment in filename order, yielding records in
    /// append order.
    ///
    /// A checksum mismatch anywhere aborts with a fatal error — replay
    /// never skips over corruption.
    pub fn replay(
        bm: &Arc<BlockManager>,
        layout: &DataLayout,
    ) -> Result<Vec<WalRecord>, WalError> {
        let mut records = Vec::new();
        for segment in layout.wal_segments_oldest_first()? {
            debug!(segment = %segment.display(), "WAL replay started");
            let reader = BlockStreamReader::new(Arc::clone(bm), &segment, Direction::Forward);
            let mut block = 0u64;
            loop {
                let (payload, consumed) = match reader.read_entry(block) {
                    Ok(entry) => entry,
                    Err(BlockError::EndOfFile(_)) => break,
                    Err(e) => return Err(e.into()),
                };
                let mut pos = 0;
                while payload.len() - pos >= RECORD_HEADER_LEN {
                    match WalRecord::decode(&payload, &mut pos)? {
                        Some(record) => records.push(record),
                        None => {
                            warn!(segment = %segment.display(), "corrupt WAL record");
                            return Err(WalError::ChecksumMismatch {
                                segment: segment.display().to_string(),
                            });
                        }
                    }
                }
                block += consumed;
            }
        }
        info!(records = records.len(), "WAL replay finished");
        Ok(records)
    }
}
