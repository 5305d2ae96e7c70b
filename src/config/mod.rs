//! Engine configuration.
//!
//! A single JSON document configures the whole engine. The parsed
//! [`Config`] is immutable and passed explicitly at construction —
//! sub-components receive only the values they use, there is no global
//! singleton.
//!
//! ```json
//! {
//!     "BLOCK_SIZE": 4096,
//!     "MEMTABLE_TYPE": "skiplist",
//!     "TOMBSTONE": "<TOMBSTONE!>",
//!     "LSM_BASE_DIR": "data"
//! }
//! ```
//!
//! Unrecognised keys are rejected, missing keys take their defaults,
//! and invalid values (zero block size, empty tombstone, inverted
//! prefix range) are fatal at startup.


use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config document was not valid JSON or held wrong types.
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value was out of its legal range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Backing structure for the memtables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemtableKind {
    /// Arena-based skiplist, ordered iteration.
    SkipList,
    /// `BTreeMap`, ordered iteration.
    BTree,
    /// `HashMap`; loses ordering of in-flight writes, sorts on flush.
    HashMap,
}

/// Immutable engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Bytes per block for every block-aligned file.
    #[serde(rename = "BLOCK_SIZE", default = "defaults::block_size")]
    pub block_size: usize,

    /// Stride for sampling summary entries from the index.
    #[serde(rename = "SUMMARY_STEP", default = "defaults::summary_step")]
    pub summary_step: usize,

    /// Literal value that marks a deletion.
    #[serde(rename = "TOMBSTONE", default = "defaults::tombstone")]
    pub tombstone: String,

    /// Memtable backing structure.
    #[serde(rename = "MEMTABLE_TYPE", default = "defaults::memtable_type")]
    pub memtable_type: MemtableKind,

    /// Number of memtables in the ring.
    #[serde(rename = "MEMTABLE_COUNT", default = "defaults::memtable_count")]
    pub memtable_count: usize,

    /// Per-memtable size threshold in bytes.
    #[serde(rename = "MEMTABLE_SIZE", default = "defaults::memtable_size")]
    pub memtable_size: usize,

    /// Records buffered before the WAL flushes to disk.
    #[serde(rename = "WAL_BUFFER_SIZE", default = "defaults::wal_buffer_size")]
    pub wal_buffer_size: usize,

    /// Segment rotation threshold in bytes.
    #[serde(rename = "WAL_SEGMENT_SIZE", default = "defaults::wal_segment_size")]
    pub wal_segment_size: usize,

    /// Target false positive rate for bloom sizing.
    #[serde(
        rename = "BLOOM_FILTER_FALSE_POSITIVE_RATE",
        default = "defaults::bloom_fp_rate"
    )]
    pub bloom_filter_false_positive_rate: f64,

    /// Expected element count for bloom sizing.
    #[serde(
        rename = "BLOOM_FILTER_EXPECTED_ELEMENTS",
        default = "defaults::bloom_expected"
    )]
    pub bloom_filter_expected_elements: usize,

    /// Shortest prefix recorded by the prefix bloom filter.
    #[serde(rename = "MIN_PREFIX_LENGTH", default = "defaults::min_prefix_length")]
    pub min_prefix_length: usize,

    /// Longest prefix recorded by the prefix bloom filter.
    #[serde(rename = "MAX_PREFIX_LENGTH", default = "defaults::max_prefix_length")]
    pub max_prefix_length: usize,

    /// Number of LSM levels (`lvl0 .. lvl(n-1)`).
    #[serde(rename = "LSM_LEVELS", default = "defaults::lsm_levels")]
    pub lsm_levels: usize,

    /// Root directory for SSTable level directories and the WAL.
    #[serde(rename = "LSM_BASE_DIR", default = "defaults::lsm_base_dir")]
    pub lsm_base_dir: PathBuf,

    /// Table count per level that triggers compaction.
    #[serde(
        rename = "COMPACTION_THRESHOLD",
        default = "defaults::compaction_threshold"
    )]
    pub compaction_threshold: usize,

    /// Maximum tower height for the skiplist backing.
    #[serde(rename = "SKIP_LIST_LEVELS", default = "defaults::skip_list_levels")]
    pub skip_list_levels: usize,

    /// Tokens regained per second per user.
    #[serde(rename = "TOKEN_REFILL_RATE", default = "defaults::token_refill_rate")]
    pub token_refill_rate: f64,

    /// Bucket capacity per user.
    #[serde(rename = "MAX_TOKEN", default = "defaults::max_tokens")]
    pub max_tokens: u64,

    /// Block cache capacity in blocks (0 disables the cache).
    #[serde(rename = "BLOCK_CACHE_CAPACITY", default = "defaults::cache_capacity")]
    pub block_cache_capacity: usize,
}

mod defaults {
    use super::MemtableKind;
    use std::path::PathBuf;

    pub fn block_size() -> usize {
        4096
    }
    pub fn summary_step() -> usize {
        20
    }
    pub fn tombstone() -> String {
        "<TOMBSTONE!>".to_string()
    }
    pub fn memtable_type() -> MemtableKind {
        MemtableKind::SkipList
    }
    pub fn memtable_count() -> usize {
        4
    }
    pub fn memtable_size() -> usize {
        1024 * 1024
    }
    pub fn wal_buffer_size() -> usize {
        16
    }
    pub fn wal_segment_size() -> usize {
        1024 * 1024
    }
    pub fn bloom_fp_rate() -> f64 {
        0.01
    }
    pub fn bloom_expected() -> usize {
        10_000
    }
    pub fn min_prefix_length() -> usize {
        2
    }
    pub fn max_prefix_length() -> usize {
        8
    }
    pub fn lsm_levels() -> usize {
        4
    }
    pub fn lsm_base_dir() -> PathBuf {
        PathBuf::from("data")
    }
    pub fn compaction_threshold() -> usize {
        4
    }
    pub fn skip_list_levels() -> usize {
        16
    }
    pub fn token_refill_rate() -> f64 {
        100.0
    }
    pub fn max_tokens() -> u64 {
        1000
    }
    pub fn cache_capacity() -> usize {
        256
    }
}

impl Default for Config {
    fn default() -> Self {
        // An empty document is a valid config: every key has a default.
        serde_json::from_str("{}").unwrap_or_else(|_| unreachable!())
    }
}

impl Config {
    /// Load and validate a config document from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parse and validate a config document from a JSON string.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject out-of-range values; called once at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size < 32 {
            return Err(ConfigError::Invalid(format!(
                "BLOCK_SIZE {} is below the 32-byte minimum",
                self.block_size
            )));
        }
        if self.summary_step == 0 {
            return Err(ConfigError::Invalid("SUMMARY_STEP must be positive".into()));
        }
        if self.tombstone.is_empty() {
            return Err(ConfigError::Invalid(
                "TOMBSTONE must not be the empty string (empty is a legal value)".into(),
            ));
        }
        if self.memtable_count == 0 {
            return Err(ConfigError::Invalid("MEMTABLE_COUNT must be positive".into()));
        }
        if self.memtable_size == 0 {
            return Err(ConfigError::Invalid("MEMTABLE_SIZE must be positive".into()));
        }
        if self.wal_buffer_size == 0 {
            return Err(ConfigError::Invalid("WAL_BUFFER_SIZE must be positive".into()));
        }
        if self.wal_segment_size < self.block_size {
            return Err(ConfigError::Invalid(format!(
                "WAL_SEGMENT_SIZE {} is below one block",
                self.wal_segment_size
            )));
        }
        if !(self.bloom_filter_false_positive_rate > 0.0
            && self.bloom_filter_false_positive_rate < 1.0)
        {
            return Err(ConfigError::Invalid(
                "BLOOM_FILTER_FALSE_POSITIVE_RATE must be in (0, 1)".into(),
            ));
        }
        if self.min_prefix_length == 0 || self.min_prefix_length > self.max_prefix_length {
            return Err(ConfigError::Invalid(format!(
                "prefix length range [{}, {}] is invalid",
                self.min_prefix_length, self.max_prefix_length
            )));
        }
        if self.lsm_levels < 2 {
            return Err(ConfigError::Invalid("LSM_LEVELS must be at least 2".into()));
        }
        if self.compaction_threshold < 2 {
            return Err(ConfigError::Invalid(
                "COMPACTION_THRESHOLD must be at least 2".into(),
            ));
        }
        if self.skip_list_levels == 0 {
            return Err(ConfigError::Invalid("SKIP_LIST_LEVELS must be positive".into()));
        }
        if self.token_refill_rate <= 0.0 {
            return Err(ConfigError::Invalid(
                "TOKEN_REFILL_RATE must be positive".into(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid("MAX_TOKEN must be positive".into()));
        }
        Ok(())
    }
}
