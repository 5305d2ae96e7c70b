//! Byte-level framing helpers for the on-disk formats.
//!
//! StrataDB owns every byte it persists; this module is the single place
//! where integer widths and endianness are decided, so the on-disk
//! representation never changes due to a dependency upgrade.
//!
//! # Wire conventions
//!
//! | Context                  | Integers                   |
//! |--------------------------|----------------------------|
//! | SSTable sections         | `u64`, **big-endian**      |
//! | WAL records              | `u32`/`u64`, little-endian |
//!
//! Variable-length fields inside SSTable sections use the
//! `(u64 size, bytes)` framing produced by [`put_sized_bytes`]:
//!
//! ```text
//! [u64 len BE][bytes]
//! ```
//!
//! # Decoding discipline
//!
//! All decoders operate on `(&[u8], &mut usize)` cursors, verify bounds
//! before touching the buffer, and propagate [`CodecError`] instead of
//! panicking. Length fields are capped at [`MAX_FIELD_LEN`] so corrupted
//! data cannot trigger allocation bombs.

#[cfg(test)]
mod tests;

use thiserror::Error;

/// Maximum accepted byte length for a single decoded field (256 MiB).
///
/// A length prefix above this value is rejected immediately, preventing
/// allocation bombs from corrupted or crafted blocks.
pub const MAX_FIELD_LEN: u64 = 256 * 1024 * 1024;

/// Errors produced while decoding framed bytes.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The buffer ran out of bytes before decoding completed.
    #[error("unexpected end of buffer (need {needed} bytes, have {available})")]
    UnexpectedEof {
        /// Bytes required to continue decoding.
        needed: usize,
        /// Bytes actually remaining.
        available: usize,
    },

    /// A length prefix exceeded [`MAX_FIELD_LEN`].
    #[error("field length {0} exceeds limit")]
    LengthOverflow(u64),

    /// A byte sequence decoded as a string was not valid UTF-8.
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Verify that `buf[*pos..]` holds at least `needed` bytes.
#[inline]
fn require(buf: &[u8], pos: usize, needed: usize) -> Result<(), CodecError> {
    let available = buf.len().saturating_sub(pos);
    if available < needed {
        Err(CodecError::UnexpectedEof { needed, available })
    } else {
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// Big-endian u64 — the SSTable integer
// ------------------------------------------------------------------------------------------------

/// Append a big-endian `u64`.
#[inline]
pub fn put_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_be_bytes());
}

/// Decode a big-endian `u64` at the cursor, advancing it.
#[inline]
pub fn read_u64(buf: &[u8], pos: &mut usize) -> Result<u64, CodecError> {
    require(buf, *pos, 8)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[*pos..*pos + 8]);
    *pos += 8;
    Ok(u64::from_be_bytes(raw))
}

// ------------------------------------------------------------------------------------------------
// (size, bytes) framing
// ------------------------------------------------------------------------------------------------

/// Append `[u64 len BE][bytes]`.
pub fn put_sized_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    put_u64(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Decode `[u64 len BE][bytes]` at the cursor, advancing it.
pub fn read_sized_bytes(buf: &[u8], pos: &mut usize) -> Result<Vec<u8>, CodecError> {
    let len = read_u64(buf, pos)?;
    if len > MAX_FIELD_LEN {
        return Err(CodecError::LengthOverflow(len));
    }
    let len = len as usize;
    require(buf, *pos, len)?;
    let bytes = buf[*pos..*pos + len].to_vec();
    *pos += len;
    Ok(bytes)
}

/// Decode a `(size, bytes)` field as UTF-8 text.
pub fn read_sized_string(buf: &[u8], pos: &mut usize) -> Result<String, CodecError> {
    let raw = read_sized_bytes(buf, pos)?;
    Ok(String::from_utf8(raw)?)
}

// ------------------------------------------------------------------------------------------------
// SSTable record framing
// ------------------------------------------------------------------------------------------------

/// Encode a data-section record: `(size, key)(size, value)`.
pub fn encode_data_record(key: &str, value: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16 + key.len() + value.len());
    put_sized_bytes(&mut buf, key.as_bytes());
    put_sized_bytes(&mut buf, value.as_bytes());
    buf
}

/// Decode one data-section record at the cursor, advancing it.
pub fn decode_data_record(buf: &[u8], pos: &mut usize) -> Result<(String, String), CodecError> {
    let key = read_sized_string(buf, pos)?;
    let value = read_sized_string(buf, pos)?;
    Ok((key, value))
}

/// Encode an index or summary record: `(size, key)(u64 block)`.
///
/// The index stores absolute data block numbers; the summary stores
/// index block positions as distance from the end of the file. Both use
/// this framing.
pub fn encode_keyed_offset(key: &str, block: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16 + key.len());
    put_sized_bytes(&mut buf, key.as_bytes());
    put_u64(&mut buf, block);
    buf
}

/// Decode one `(key, block)` record at the cursor, advancing it.
pub fn decode_keyed_offset(buf: &[u8], pos: &mut usize) -> Result<(String, u64), CodecError> {
    let key = read_sized_string(buf, pos)?;
    let block = read_u64(buf, pos)?;
    Ok((key, block))
}

// ------------------------------------------------------------------------------------------------
// Little-endian helpers — the WAL integers
// ------------------------------------------------------------------------------------------------

/// Append a little-endian `u32`.
#[inline]
pub fn put_u32_le(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Append a little-endian `u64`.
#[inline]
pub fn put_u64_le(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Decode a little-endian `u32` at the cursor, advancing it.
#[inline]
pub fn read_u32_le(buf: &[u8], pos: &mut usize) -> Result<u32, CodecError> {
    require(buf, *pos, 4)?;
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[*pos..*pos + 4]);
    *pos += 4;
    Ok(u32::from_le_bytes(raw))
}

/// Decode a little-endian `u64` at the cursor, advancing it.
#[inline]
pub fn read_u64_le(buf: &[u8], pos: &mut usize) -> Result<u64, CodecError> {
    require(buf, *pos, 8)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[*pos..*pos + 8]);
    *pos += 8;
    Ok(u64::from_le_bytes(raw))
}

/// Decode exactly `len` raw bytes at the cursor, advancing it.
pub fn read_raw(buf: &[u8], pos: &mut usize, len: usize) -> Result<Vec<u8>, CodecError> {
    require(buf, *pos, len)?;
    let bytes = buf[*pos..*pos + len].to_vec();
    *pos += len;
    Ok(bytes)
}
