//! Membership filters and integrity hashing for SSTables.
//!
//! Every SSTable carries a [`BloomFilter`] over its keys and a
//! [`PrefixBloomFilter`](prefix::PrefixBloomFilter) over its key
//! prefixes, both serialized into the table's metadata section so a
//! reader can reject point and prefix lookups without touching the data
//! blocks. The metadata also embeds a Merkle root over the table's
//! values (see [`merkle`]).
//!
//! # Hash family
//!
//! The `k` hash functions are MD5 digests of `data ‖ seed`, where the
//! 4-byte big-endian seeds are `HASH_SEED_BASE + i`. Deriving the seeds
//! from a fixed constant means a deserialized filter always reconstructs
//! the exact family that built it, across processes and machines.
//!
//! # Serialized form
//!
//! ```text
//! [u32 k BE][u32 m BE][m slot bytes][k × 4-byte seeds]
//! ```
//!
//! Slots are one byte each (0 or 1), mirroring the array the filter
//! maintains in memory.


pub mod merkle;
pub mod prefix;

pub use prefix::PrefixBloomFilter;

use md5::{Digest, Md5};
use thiserror::Error;

/// Fixed constant the 4-byte hash seeds are derived from.
pub const HASH_SEED_BASE: u32 = 442;

/// Errors produced while deserializing a filter.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The serialized buffer was shorter than its header demanded.
    #[error("truncated filter: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required.
        needed: usize,
        /// Bytes present.
        available: usize,
    },

    /// Header fields were inconsistent (zero-sized array, absurd k).
    #[error("invalid filter parameters: {0}")]
    InvalidParams(String),
}

/// One seeded hash function of the filter's family.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SeededHash {
    seed: [u8; 4],
}

impl SeededHash {
    fn new(seed_value: u32) -> Self {
        Self {
            seed: seed_value.to_be_bytes(),
        }
    }

    /// MD5 over `data ‖ seed`, first 8 digest bytes as a big-endian u64.
    fn hash(&self, data: &[u8]) -> u64 {
        let mut hasher = Md5::new();
        hasher.update(data);
        hasher.update(self.seed);
        let digest = hasher.finalize();
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(raw)
    }
}

/// Derive the `k`-function family from the fixed seed base.
fn hash_family(k: u32) -> Vec<SeededHash> {
    (0..k)
        .map(|i| SeededHash::new(HASH_SEED_BASE.wrapping_add(i)))
        .collect()
}

/// Standard bloom sizing: `m = ⌈−n·ln(p) / (ln 2)²⌉` slots.
pub fn calculate_m(expected_elements: usize, false_positive_rate: f64) -> u32 {
    let n = expected_elements.max(1) as f64;
    let ln2 = std::f64::consts::LN_2;
    (-(n * false_positive_rate.ln()) / (ln2 * ln2)).ceil() as u32
}

/// Standard bloom sizing: `k = ⌈(m/n)·ln 2⌉` hash functions.
pub fn calculate_k(expected_elements: usize, m: u32) -> u32 {
    let n = expected_elements.max(1) as f64;
    ((m as f64 / n) * std::f64::consts::LN_2).ceil().max(1.0) as u32
}

/// A serializable bloom filter with a deterministic MD5 hash family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomFilter {
    k: u32,
    m: u32,
    slots: Vec<u8>,
    hashes: Vec<SeededHash>,
}

impl BloomFilter {
    /// Size a filter for `expected_elements` at the target false
    /// positive rate.
    pub fn new(expected_elements: usize, false_positive_rate: f64) -> Self {
        let m = calculate_m(expected_elements, false_positive_rate);
        let k = calculate_k(expected_elements, m);
        Self {
            k,
            m,
            slots: vec![0u8; m as usize],
            hashes: hash_family(k),
        }
    }

    /// Number of hash functions.
    pub fn k(&self) -> u32 {
        self.k
    }

    /// Number of slots.
    pub fn m(&self) -> u32 {
        self.m
    }

    /// Record a key.
    pub fn add(&mut self, key: &str) {
        for hash in &self.hashes {
            let index = (hash.hash(key.as_bytes()) % self.m as u64) as usize;
            self.slots[index] = 1;
        }
    }

    /// Membership test: `false` means definitely absent.
    pub fn check(&self, key: &str) -> bool {
        self.hashes.iter().all(|hash| {
            let index = (hash.hash(key.as_bytes()) % self.m as u64) as usize;
            self.slots[index] == 1
        })
    }

    /// Serialize to `[k][m][slots][seeds]`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + self.slots.len() + self.hashes.len() * 4);
        buf.extend_from_slice(&self.k.to_be_bytes());
        buf.extend_from_slice(&self.m.to_be_bytes());
        buf.extend_from_slice(&self.slots);
        for hash in &self.hashes {
            buf.extend_from_slice(&hash.seed);
        }
        buf
    }

    /// Reconstruct a filter from [`Self::to_bytes`] output.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, FilterError> {
        if buf.len() < 8 {
            return Err(FilterError::Truncated {
                needed: 8,
                available: buf.len(),
            });
        }
        let k = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let m = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        if m == 0 || k == 0 {
            return Err(FilterError::InvalidParams(format!("k={k}, m={m}")));
        }

        let needed = 8 + m as usize + k as usize * 4;
        if buf.len() < needed {
            return Err(FilterError::Truncated {
                needed,
                available: buf.len(),
            });
        }

        let slots = buf[8..8 + m as usize].to_vec();
        let mut hashes = Vec::with_capacity(k as usize);
        let mut offset = 8 + m as usize;
        for _ in 0..k {
            let mut seed = [0u8; 4];
            seed.copy_from_slice(&buf[offset..offset + 4]);
            hashes.push(SeededHash { seed });
            offset += 4;
        }

        Ok(Self { k, m, slots, hashes })
    }
}
