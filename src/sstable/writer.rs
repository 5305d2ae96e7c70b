//! SSTable construction.
//!
//! [`TableWriter`] accepts records in ascending key order — from a
//! sorted memtable snapshot or a compaction merge — and lays down the
//! four sections of the table format. The trailing sections store their
//! offsets as distances from the end of the file, which requires
//! knowing the final block count before the summary is written; since
//! every record length is known at that point, the writer pre-counts
//! the remaining blocks with the stream writer's packing rules instead
//! of buffering whole sections.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::block::{BlockManager, BlockStreamWriter};
use crate::codec;
use crate::config::Config;
use crate::filter::merkle::MerkleAccumulator;
use crate::filter::{BloomFilter, PrefixBloomFilter};

use super::SSTableError;

/// Incremental writer for one SSTable file.
pub struct TableWriter {
    writer: BlockStreamWriter,
    path: PathBuf,
    summary_step: usize,

    /// First key of every data block, with its block number.
    index: Vec<(String, u64)>,
    bloom: BloomFilter,
    prefix_bloom: PrefixBloomFilter,
    merkle: MerkleAccumulator,
    num_items: u64,
    last_key: Option<String>,
}

impl TableWriter {
    /// Open a writer for a fresh table at `path`.
    ///
    /// `expected_items` sizes the bloom filters; overshooting only
    /// lowers their false positive rate.
    pub fn new(
        bm: Arc<BlockManager>,
        path: impl Into<PathBuf>,
        config: &Config,
        expected_items: usize,
    ) -> Self {
        let path = path.into();
        Self {
            writer: BlockStreamWriter::new(bm, &path),
            path,
            summary_step: config.summary_step,
            index: Vec::new(),
            // The point bloom is sized for this table's actual keys;
            // the prefix bloom keeps the configured estimate since the
            // prefix count per key is unknown until the keys arrive.
            bloom: BloomFilter::new(
                expected_items.max(1),
                config.bloom_filter_false_positive_rate,
            ),
            prefix_bloom: PrefixBloomFilter::new(
                config.bloom_filter_expected_elements,
                config.bloom_filter_false_positive_rate,
                config.min_prefix_length,
                config.max_prefix_length,
            ),
            merkle: MerkleAccumulator::new(),
            num_items: 0,
            last_key: None,
        }
    }

    /// Path of the table being built.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records accepted so far.
    pub fn num_items(&self) -> u64 {
        self.num_items
    }

    /// Append one record; keys must arrive in strictly ascending order.
    pub fn add(&mut self, key: &str, value: &str) -> Result<(), SSTableError> {
        if let Some(prev) = &self.last_key {
            if prev.as_str() >= key {
                return Err(SSTableError::OutOfOrder {
                    prev: prev.clone(),
                    next: key.to_string(),
                });
            }
        }

        let record = codec::encode_data_record(key, value);
        let block = self.writer.append(&record)?;
        if self.index.last().map(|(_, b)| *b) != Some(block) {
            self.index.push((key.to_string(), block));
        }

        self.bloom.add(key);
        self.prefix_bloom.add(key);
        self.merkle.add(value);
        self.num_items += 1;
        self.last_key = Some(key.to_string());
        Ok(())
    }

    /// Close the data section and write index, summary, and metadata.
    pub fn finish(mut self) -> Result<(), SSTableError> {
        // Pre-counting below must use the same block size the stream
        // writer packs with.
        let block_size = self.writer.block_size();

        // ----------------------------------------------------------------
        // Index section: (key, absolute data block) per data block,
        // remembering which index block each entry lands in.
        // ----------------------------------------------------------------
        self.writer.end_section(None)?;
        let mut entry_blocks = Vec::with_capacity(self.index.len());
        for (key, data_block) in &self.index {
            let record = codec::encode_keyed_offset(key, *data_block);
            entry_blocks.push(self.writer.append(&record)?);
        }
        let summary_start = self.writer.end_section(None)?;

        // ----------------------------------------------------------------
        // Sample the summary: every summary_step-th index entry plus the
        // final one, so every key in the table is bracketed.
        // ----------------------------------------------------------------
        let mut sampled: Vec<(&str, u64)> = Vec::new();
        for (i, (key, _)) in self.index.iter().enumerate() {
            if i % self.summary_step == 0 || i == self.index.len() - 1 {
                sampled.push((key.as_str(), entry_blocks[i]));
            }
        }

        // ----------------------------------------------------------------
        // The summary and metadata store distance-from-end offsets, so
        // the final block count is needed now. Every remaining record
        // length is already known; replay the packing rules.
        // ----------------------------------------------------------------
        let serialized_bloom = self.bloom.to_bytes();
        let serialized_prefix = self.prefix_bloom.to_bytes();
        let merkle_root = self.merkle.root();

        let summary_lens = sampled.iter().map(|(key, _)| 16 + key.len());
        let summary_blocks = BlockStreamWriter::count_blocks(block_size, summary_lens);

        let metadata_len = 8 + serialized_bloom.len()
            + 8 + serialized_prefix.len()
            + 8 + 8 + 8
            + 8 + merkle_root.len();
        let metadata_blocks = BlockStreamWriter::count_blocks(block_size, [metadata_len]);

        let metadata_start = summary_start + summary_blocks;
        let total_blocks = metadata_start + metadata_blocks + 1;

        // ----------------------------------------------------------------
        // Summary section.
        // ----------------------------------------------------------------
        for (key, index_block) in &sampled {
            let record = codec::encode_keyed_offset(key, total_blocks - index_block);
            self.writer.append(&record)?;
        }
        let summary_end = self.writer.end_section(None)?;
        if summary_end != metadata_start {
            return Err(SSTableError::Corrupt(format!(
                "summary landed at block {summary_end}, expected {metadata_start}"
            )));
        }

        // ----------------------------------------------------------------
        // Metadata section and the closing block with the bottom-up
        // discovery pointer.
        // ----------------------------------------------------------------
        let mut metadata = Vec::with_capacity(metadata_len);
        codec::put_sized_bytes(&mut metadata, &serialized_bloom);
        codec::put_sized_bytes(&mut metadata, &serialized_prefix);
        codec::put_u64(&mut metadata, total_blocks - summary_start);
        codec::put_u64(&mut metadata, total_blocks - metadata_start);
        codec::put_u64(&mut metadata, self.num_items);
        codec::put_sized_bytes(&mut metadata, &merkle_root);

        self.writer.append(&metadata)?;
        let written = self.writer.end_section(Some(metadata_start))?;
        if written != total_blocks {
            return Err(SSTableError::Corrupt(format!(
                "table closed at block {written}, expected {total_blocks}"
            )));
        }

        info!(
            path = %self.path.display(),
            items = self.num_items,
            blocks = total_blocks,
            "sstable written"
        );
        Ok(())
    }

    /// Abandon the table, removing the partial file.
    pub fn abandon(self) -> Result<(), SSTableError> {
        debug!(path = %self.path.display(), "sstable abandoned");
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SSTableError::Io(e)),
        }
    }

}

/// Flush a memtable snapshot into a fresh level-0 table.
///
/// Sorts the pairs (the hashmap backing yields them sorted already, but
/// the contract is re-checked cheaply) and drives a [`TableWriter`].
pub fn flush_memtable(
    bm: Arc<BlockManager>,
    path: impl Into<PathBuf>,
    config: &Config,
    mut pairs: Vec<(String, String)>,
) -> Result<(), SSTableError> {
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs.dedup_by(|a, b| a.0 == b.0);

    let mut writer = TableWriter::new(bm, path, config, pairs.len());
    for (key, value) in &pairs {
        writer.add(key, value)?;
    }
    writer.finish()
}
