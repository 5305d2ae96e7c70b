//! Merkle root computation over SSTable values.
//!
//! Each value is hashed into a leaf; levels are built by hashing the
//! concatenation of adjacent pairs, duplicating the last node of an odd
//! level. Only the 32-byte root is persisted, in the table's metadata
//! section — it fingerprints the full value set of the table.

use sha2::{Digest, Sha256};

/// Size of a serialized root in bytes.
pub const ROOT_LEN: usize = 32;

/// Accumulates value hashes and reduces them to a Merkle root.
#[derive(Debug, Default)]
pub struct MerkleAccumulator {
    leaves: Vec<[u8; ROOT_LEN]>,
}

impl MerkleAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash one value into a leaf.
    pub fn add(&mut self, value: &str) {
        self.leaves.push(hash_bytes(value.as_bytes()));
    }

    /// Number of leaves accumulated.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// True when no values were added.
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Reduce the accumulated leaves to the root hash.
    ///
    /// An empty accumulator yields the hash of the empty byte string so
    /// the metadata field is always well-formed.
    pub fn root(&self) -> [u8; ROOT_LEN] {
        if self.leaves.is_empty() {
            return hash_bytes(b"");
        }

        let mut level = self.leaves.clone();
        while level.len() > 1 {
            if level.len() % 2 == 1 {
                // Odd level: duplicate the last node.
                let last = level[level.len() - 1];
                level.push(last);
            }
            level = level
                .chunks(2)
                .map(|pair| {
                    let mut hasher = Sha256::new();
                    hasher.update(pair[0]);
                    hasher.update(pair[1]);
                    let digest = hasher.finalize();
                    let mut node = [0u8; ROOT_LEN];
                    node.copy_from_slice(&digest);
                    node
                })
                .collect();
        }
        level[0]
    }
}

/// SHA-256 of a byte string as a fixed array.
fn hash_bytes(data: &[u8]) -> [u8; ROOT_LEN] {
    let digest = Sha256::digest(data);
    let mut out = [0u8; ROOT_LEN];
    out.copy_from_slice(&digest);
    out
}
