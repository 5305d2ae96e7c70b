//! SSTable lookups.
//!
//! [`TableReader`] serves one table: it discovers the metadata
//! bottom-up (reverse reads from the final block), then answers point,
//! prefix, and range queries through the bloom → summary → index → data
//! pipeline. [`Retriever`] walks every table newest-first across the
//! levels, treating a corrupt table as absent for the query at hand.
//!
//! Tombstones are returned verbatim; mapping the marker to "not found"
//! is the engine's job.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use crate::block::{BlockManager, BlockStreamReader, Direction};
use crate::codec;
use crate::config::Config;
use crate::layout::DataLayout;

use super::{SSTableError, TableMeta};

/// Outcome of probing one table for one key.
#[derive(Debug, PartialEq, Eq)]
pub enum TableGet {
    /// The table holds this key with this value (possibly a tombstone).
    Found(String),
    /// The table does not hold this key.
    NotPresent,
}

/// Reader over a single SSTable file.
pub struct TableReader {
    bm: Arc<BlockManager>,
    path: PathBuf,
    meta: TableMeta,
    total_blocks: u64,
}

impl TableReader {
    /// Open a table and parse its metadata section.
    pub fn open(
        bm: Arc<BlockManager>,
        path: impl Into<PathBuf>,
        config: &Config,
    ) -> Result<Self, SSTableError> {
        let path = path.into();
        let reverse = BlockStreamReader::new(Arc::clone(&bm), &path, Direction::Reverse);
        let total_blocks = reverse.file_size_in_blocks()?;
        if total_blocks == 0 {
            return Err(SSTableError::Corrupt("empty table file".into()));
        }

        // The cleaned payload of the last block ends with the metadata
        // start pointer.
        let (closing, _) = reverse.read_entry(0)?;
        if closing.len() < 8 {
            return Err(SSTableError::Corrupt("closing block too short".into()));
        }
        let tail: [u8; 8] = closing[closing.len() - 8..]
            .try_into()
            .map_err(|_| SSTableError::Corrupt("closing block tail unreadable".into()))?;
        let metadata_start = u64::from_be_bytes(tail);
        if metadata_start >= total_blocks {
            return Err(SSTableError::Corrupt(format!(
                "metadata start {metadata_start} outside file of {total_blocks} blocks"
            )));
        }

        // Collect the metadata section backwards, then flip it to
        // forward order. The closing block contributes only its pointer.
        let section_blocks = total_blocks - metadata_start;
        let mut payloads = vec![closing];
        let mut seen = 1u64;
        while seen < section_blocks {
            let (payload, consumed) = reverse.read_entry(seen)?;
            payloads.push(payload);
            seen += consumed;
        }
        payloads.reverse();
        payloads.pop(); // drop the closing block's padding + pointer
        let blob = payloads.concat();

        let mut pos = 0;
        let bloom_bytes = codec::read_sized_bytes(&blob, &mut pos)?;
        let prefix_bytes = codec::read_sized_bytes(&blob, &mut pos)?;
        let summary_start_rel = codec::read_u64(&blob, &mut pos)?;
        let summary_end_rel = codec::read_u64(&blob, &mut pos)?;
        let num_items = codec::read_u64(&blob, &mut pos)?;
        let merkle_root = codec::read_sized_bytes(&blob, &mut pos)?;

        if summary_start_rel > total_blocks || summary_end_rel > total_blocks {
            return Err(SSTableError::Corrupt(
                "summary offsets outside the file".into(),
            ));
        }

        let meta = TableMeta {
            bloom: crate::filter::BloomFilter::from_bytes(&bloom_bytes)?,
            prefix_bloom: crate::filter::PrefixBloomFilter::from_bytes(
                &prefix_bytes,
                config.min_prefix_length,
                config.max_prefix_length,
            )?,
            summary_start: total_blocks - summary_start_rel,
            summary_end: total_blocks - summary_end_rel,
            num_items,
            merkle_root,
        };

        Ok(Self {
            bm,
            path,
            meta,
            total_blocks,
        })
    }

    /// Path of the table file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parsed metadata.
    pub fn meta(&self) -> &TableMeta {
        &self.meta
    }

    /// Total file size in blocks.
    pub fn total_blocks(&self) -> u64 {
        self.total_blocks
    }

    /// Point lookup through bloom → summary → index → data.
    pub fn get(&self, key: &str) -> Result<TableGet, SSTableError> {
        if !self.meta.bloom.check(key) {
            return Ok(TableGet::NotPresent);
        }

        let summary = self.read_summary()?;
        let Some(bracket) = bracket_index(&summary, key) else {
            return Ok(TableGet::NotPresent);
        };
        let (lower, upper) = self.bracket_blocks(&summary, bracket);

        let Some(data_block) = self.scan_index_for(key, lower, upper)? else {
            return Ok(TableGet::NotPresent);
        };

        let forward = self.forward_reader();
        let (payload, _) = forward.read_entry(data_block)?;
        let mut pos = 0;
        while payload.len() - pos >= 16 {
            let (k, v) = codec::decode_data_record(&payload, &mut pos)?;
            if k == key {
                return Ok(TableGet::Found(v));
            }
        }
        // Stale summary bracket; the caller moves on to older tables.
        Ok(TableGet::NotPresent)
    }

    /// All records whose key starts with `prefix`, in key order.
    pub fn prefix_entries(&self, prefix: &str) -> Result<Vec<(String, String)>, SSTableError> {
        if !self.meta.prefix_bloom.check(prefix) {
            return Ok(Vec::new());
        }
        self.collect_range(prefix, |key| {
            if key.starts_with(prefix) {
                RangeStep::Take
            } else if key.as_str() < prefix {
                RangeStep::Skip
            } else {
                RangeStep::Stop
            }
        })
    }

    /// All records with `start ≤ key ≤ end`, in key order.
    pub fn range_entries(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<(String, String)>, SSTableError> {
        if start > end {
            return Ok(Vec::new());
        }
        self.collect_range(start, |key| {
            if key.as_str() < start {
                RangeStep::Skip
            } else if key.as_str() <= end {
                RangeStep::Take
            } else {
                RangeStep::Stop
            }
        })
    }

    /// Shared prefix/range collection: bracket the lower bound in the
    /// summary, walk index entries from there, and scan the data blocks
    /// they point at until the classifier stops the walk.
    fn collect_range(
        &self,
        lower_bound: &str,
        classify: impl Fn(&String) -> RangeStep,
    ) -> Result<Vec<(String, String)>, SSTableError> {
        let summary = self.read_summary()?;
        if summary.is_empty() {
            return Ok(Vec::new());
        }

        // Keys below the first summary entry can only live in the first
        // data block, so clamp the bracket to the first entry.
        let bracket = bracket_index(&summary, lower_bound).unwrap_or(0);
        let (lower, _) = self.bracket_blocks(&summary, bracket);

        // Walk index entries from the bracket's block to the end of the
        // index section; entries are sorted, so the first out-of-range
        // first-key ends the walk.
        let entries = self.read_index_entries(lower, self.meta.summary_start)?;

        // Blocks worth scanning: every block whose first key is in
        // range, plus the last block whose first key is still below the
        // bound — it may hold in-range keys after its first.
        let mut data_blocks: Vec<u64> = Vec::new();
        let mut covering: Option<u64> = None;
        for (first_key, block) in &entries {
            match classify(first_key) {
                RangeStep::Skip => covering = Some(*block),
                RangeStep::Take => data_blocks.push(*block),
                RangeStep::Stop => break,
            }
        }
        if let Some(block) = covering {
            data_blocks.push(block);
        }
        data_blocks.sort_unstable();
        data_blocks.dedup();

        let forward = self.forward_reader();
        let mut results = Vec::new();
        let mut cursor: Option<u64> = None;
        for block in data_blocks {
            // A jumbo scan may already have consumed this block.
            if cursor.is_some_and(|c| block < c) {
                continue;
            }
            let (payload, consumed) = forward.read_entry(block)?;
            cursor = Some(block + consumed);
            let mut pos = 0;
            while payload.len() - pos >= 16 {
                let (k, v) = codec::decode_data_record(&payload, &mut pos)?;
                match classify(&k) {
                    RangeStep::Take => results.push((k, v)),
                    RangeStep::Skip => {}
                    RangeStep::Stop => return Ok(results),
                }
            }
        }
        Ok(results)
    }

    /// Decode the whole summary section.
    fn read_summary(&self) -> Result<Vec<(String, u64)>, SSTableError> {
        self.read_keyed_section(self.meta.summary_start, self.meta.summary_end)
    }

    /// Decode `(key, block)` entries from blocks `[start, end)`.
    fn read_keyed_section(
        &self,
        start: u64,
        end: u64,
    ) -> Result<Vec<(String, u64)>, SSTableError> {
        let forward = self.forward_reader();
        let mut entries = Vec::new();
        let mut block = start;
        while block < end {
            let (payload, consumed) = forward.read_entry(block)?;
            let mut pos = 0;
            while payload.len() - pos >= 16 {
                entries.push(codec::decode_keyed_offset(&payload, &mut pos)?);
            }
            block += consumed;
        }
        Ok(entries)
    }

    /// Decode index entries from blocks `[start, end)`.
    fn read_index_entries(
        &self,
        start: u64,
        end: u64,
    ) -> Result<Vec<(String, u64)>, SSTableError> {
        self.read_keyed_section(start, end)
    }

    /// Absolute index block range for summary bracket `i`: the entry's
    /// own block through the next sampled entry's block (inclusive).
    fn bracket_blocks(&self, summary: &[(String, u64)], i: usize) -> (u64, u64) {
        let lower = self.total_blocks - summary[i].1;
        let upper = match summary.get(i + 1) {
            Some((_, rel)) => self.total_blocks - rel + 1,
            None => self.meta.summary_start,
        };
        (lower, upper.min(self.meta.summary_start))
    }

    /// Last index entry with key ≤ `key` inside the bracketed blocks.
    fn scan_index_for(
        &self,
        key: &str,
        lower: u64,
        upper: u64,
    ) -> Result<Option<u64>, SSTableError> {
        let entries = self.read_index_entries(lower, upper)?;
        let mut candidate = None;
        for (first_key, data_block) in entries {
            if first_key.as_str() <= key {
                candidate = Some(data_block);
            } else {
                break;
            }
        }
        Ok(candidate)
    }

    fn forward_reader(&self) -> BlockStreamReader {
        BlockStreamReader::new(Arc::clone(&self.bm), &self.path, Direction::Forward)
    }
}

/// Classification of a key against a scan's bounds.
#[derive(Debug, PartialEq, Eq)]
enum RangeStep {
    /// Key is inside the bounds.
    Take,
    /// Key is before the bounds; keep walking.
    Skip,
    /// Key is past the bounds; the walk is over.
    Stop,
}

/// Index of the summary entry bracketing `key`: the last entry whose
/// key is ≤ `key`. `None` when the key sorts before the whole table.
fn bracket_index(summary: &[(String, u64)], key: &str) -> Option<usize> {
    let after = summary.partition_point(|(k, _)| k.as_str() <= key);
    after.checked_sub(1)
}

/// Newest-first lookups across every level of the tree.
///
/// Tables are enumerated per call, so each query sees a consistent
/// snapshot of the directory layout (compaction swaps whole files).
pub struct Retriever {
    bm: Arc<BlockManager>,
    layout: DataLayout,
    config: Config,
}

impl Retriever {
    /// Create a retriever over the given layout.
    pub fn new(bm: Arc<BlockManager>, layout: DataLayout, config: Config) -> Self {
        Self { bm, layout, config }
    }

    /// Find the newest persisted value for `key`.
    ///
    /// A table that fails to parse or read is logged and treated as not
    /// containing the key; older tables still get their chance.
    pub fn get(&self, key: &str) -> Result<Option<String>, SSTableError> {
        for path in self.layout.all_tables_newest_first()? {
            match self.probe(&path, key) {
                Ok(TableGet::Found(value)) => return Ok(Some(value)),
                Ok(TableGet::NotPresent) => {}
                Err(e) => {
                    warn!(table = %path.display(), error = %e, "table unreadable, skipping");
                }
            }
        }
        Ok(None)
    }

    fn probe(&self, path: &Path, key: &str) -> Result<TableGet, SSTableError> {
        let reader = TableReader::open(Arc::clone(&self.bm), path, &self.config)?;
        reader.get(key)
    }

    /// Merge prefix matches from every table, newest value per key.
    pub fn prefix_entries(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, String)>, SSTableError> {
        self.merge_tables(|reader| reader.prefix_entries(prefix))
    }

    /// Merge range matches from every table, newest value per key.
    pub fn range_entries(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<(String, String)>, SSTableError> {
        self.merge_tables(|reader| reader.range_entries(start, end))
    }

    fn merge_tables(
        &self,
        collect: impl Fn(&TableReader) -> Result<Vec<(String, String)>, SSTableError>,
    ) -> Result<Vec<(String, String)>, SSTableError> {
        use std::collections::BTreeMap;
        let mut merged: BTreeMap<String, String> = BTreeMap::new();
        for path in self.layout.all_tables_newest_first()? {
            let entries = match TableReader::open(Arc::clone(&self.bm), &path, &self.config)
                .and_then(|reader| collect(&reader))
            {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(table = %path.display(), error = %e, "table unreadable, skipping");
                    continue;
                }
            };
            for (key, value) in entries {
                // Newest-first walk: the first table to mention a key wins.
                merged.entry(key).or_insert(value);
            }
        }
        Ok(merged.into_iter().collect())
    }
}
