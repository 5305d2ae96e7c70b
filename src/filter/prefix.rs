//! Prefix bloom filter for fast negative prefix-scan answers.
//!
//! For every key added, all prefixes of lengths
//! `[min_length ..= min(key_len, max_length)]` enter an inner
//! [`BloomFilter`]. A prefix lookup shorter than `min_length`
//! optimistically answers "might be present" — precision is weakened,
//! correctness is not. A lookup longer than `max_length` tests its
//! `max_length` truncation.

use super::{BloomFilter, FilterError};

/// Bloom filter over key prefixes of a bounded length range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixBloomFilter {
    filter: BloomFilter,
    min_length: usize,
    max_length: usize,
}

impl PrefixBloomFilter {
    /// Size the inner filter for `expected_elements` keys, each
    /// contributing up to `max_length − min_length + 1` prefixes.
    pub fn new(
        expected_elements: usize,
        false_positive_rate: f64,
        min_length: usize,
        max_length: usize,
    ) -> Self {
        let estimated_prefixes =
            expected_elements * (max_length.saturating_sub(min_length) + 1);
        Self {
            filter: BloomFilter::new(estimated_prefixes.max(1), false_positive_rate),
            min_length,
            max_length,
        }
    }

    /// Record every in-range prefix of `key`.
    ///
    /// Prefix boundaries are char-aligned so multi-byte keys never get
    /// sliced mid-codepoint.
    pub fn add(&mut self, key: &str) {
        for (count, end) in char_boundaries(key) {
            if count < self.min_length {
                continue;
            }
            if count > self.max_length {
                break;
            }
            self.filter.add(&key[..end]);
        }
    }

    /// Membership test: `false` means no key with this prefix exists in
    /// the table.
    pub fn check(&self, prefix: &str) -> bool {
        let char_count = prefix.chars().count();
        if char_count < self.min_length {
            // Too short to have been recorded; assume presence.
            return true;
        }
        if char_count > self.max_length {
            let truncated: String = prefix.chars().take(self.max_length).collect();
            return self.filter.check(&truncated);
        }
        self.filter.check(prefix)
    }

    /// Serialize the inner filter (lengths travel in configuration).
    pub fn to_bytes(&self) -> Vec<u8> {
        self.filter.to_bytes()
    }

    /// Reconstruct from [`Self::to_bytes`] output plus the configured
    /// length range.
    pub fn from_bytes(
        buf: &[u8],
        min_length: usize,
        max_length: usize,
    ) -> Result<Self, FilterError> {
        Ok(Self {
            filter: BloomFilter::from_bytes(buf)?,
            min_length,
            max_length,
        })
    }
}

/// Yield `(char_count, byte_end)` for each prefix of `key`.
fn char_boundaries(key: &str) -> impl Iterator<Item = (usize, usize)> + '_ {
    key.char_indices()
        .enumerate()
        .map(|(i, (byte_idx, ch))| (i + 1, byte_idx + ch.len_utf8()))
}
