//! Leveled Compaction Module
//!
//! After every memtable flush the compacter walks the levels from the
//! top: any level holding at least `compaction_threshold` tables has
//! its oldest `compaction_threshold` tables k-way merged into a single
//! new table one level down. The walk continues upward, so a merge that
//! pushes the next level over its threshold triggers the next merge in
//! the same pass.
//!
//! ## Merge semantics
//!
//! - The smallest current key across the inputs is emitted next; on a
//!   key tie the **newest** input wins and the shadowed cursors are
//!   advanced past their stale versions.
//! - Tombstones are ordinary records and keep shadowing older data —
//!   except when the output lands in the final level, where nothing
//!   older can exist and they are dropped.
//! - The output's index, bloom filters, and Merkle root are built
//!   streamingly by the shared [`TableWriter`].
//!
//! ## Safety
//!
//! Input tables are deleted only after the output file is complete, so
//! a reader enumerating mid-compaction sees the inputs or the output,
//! never neither. A failed merge removes the partial output and leaves
//! the inputs untouched.


use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::block::{BlockError, BlockManager};
use crate::config::Config;
use crate::layout::DataLayout;
use crate::sstable::{ReaderPool, SSTableError, TableWriter};

/// Errors raised while compacting.
#[derive(Debug, Error)]
pub enum CompactionError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Block-level I/O error.
    #[error("block error: {0}")]
    Block(#[from] BlockError),

    /// SSTable read/write error.
    #[error("sstable error: {0}")]
    SSTable(#[from] SSTableError),
}

/// Walks the levels and merges tables downward.
pub struct Compacter {
    bm: Arc<BlockManager>,
    layout: DataLayout,
    config: Config,
}

impl Compacter {
    /// Create a compacter over the given layout.
    pub fn new(bm: Arc<BlockManager>, layout: DataLayout, config: Config) -> Self {
        Self { bm, layout, config }
    }

    /// Merge wherever a level holds at least the threshold of tables.
    ///
    /// Called after every flush; a no-op when nothing crosses the
    /// threshold.
    pub fn check_compaction_conditions(&self) -> Result<(), CompactionError> {
        for level in 0..self.layout.last_level() {
            loop {
                let tables = self.layout.level_tables_oldest_first(level)?;
                if tables.len() < self.config.compaction_threshold {
                    break;
                }
                let inputs = tables[..self.config.compaction_threshold].to_vec();
                self.compact_into(level + 1, &inputs)?;
            }
        }
        Ok(())
    }

    /// Merge `inputs` into one fresh table in `target_level`.
    fn compact_into(
        &self,
        target_level: usize,
        inputs: &[PathBuf],
    ) -> Result<(), CompactionError> {
        let output = self.layout.new_table_path(target_level);
        debug!(
            target_level,
            inputs = inputs.len(),
            output = %output.display(),
            "compaction started"
        );

        match self.merge(target_level, inputs, &output) {
            Ok(items) => {
                for path in inputs {
                    self.bm.evict_file(path)?;
                    fs::remove_file(path)?;
                }
                info!(
                    target_level,
                    inputs = inputs.len(),
                    items,
                    "compaction finished"
                );
                Ok(())
            }
            Err(e) => {
                // Leave the inputs in place; only the partial output goes.
                warn!(error = %e, output = %output.display(), "compaction aborted");
                if let Err(cleanup) = fs::remove_file(&output) {
                    if cleanup.kind() != io::ErrorKind::NotFound {
                        warn!(error = %cleanup, "partial compaction output not removed");
                    }
                }
                Err(e)
            }
        }
    }

    /// K-way merge of `inputs` into `output`. Returns the record count
    /// of the merged table.
    fn merge(
        &self,
        target_level: usize,
        inputs: &[PathBuf],
        output: &PathBuf,
    ) -> Result<u64, CompactionError> {
        let mut pool = ReaderPool::open(Arc::clone(&self.bm), inputs, &self.config)?;
        let mut writer = TableWriter::new(
            Arc::clone(&self.bm),
            output,
            &self.config,
            pool.total_items() as usize,
        );

        // Prime one cursor per input; inputs arrive oldest first, so a
        // higher index is a newer table.
        let mut current: Vec<Option<(String, String)>> = Vec::with_capacity(pool.len());
        for i in 0..pool.len() {
            current.push(pool.read_next(i)?);
        }

        let drop_tombstones = target_level == self.layout.last_level();

        loop {
            // Smallest current key; ties resolve to the newest input
            // (the highest index in the oldest-first ordering).
            let mut winner: Option<usize> = None;
            for (i, slot) in current.iter().enumerate() {
                let Some((key, _)) = slot else { continue };
                let keep_previous = winner.is_some_and(|m| {
                    matches!(current[m].as_ref(), Some((best, _)) if best.as_str() < key.as_str())
                });
                if !keep_previous {
                    winner = Some(i);
                }
            }
            let Some(m) = winner else { break };
            let (key, value) = match current[m].take() {
                Some(pair) => pair,
                None => break,
            };

            // Shadowed versions of the same key advance without being
            // written.
            for i in 0..current.len() {
                if i == m {
                    continue;
                }
                if current[i].as_ref().is_some_and(|(k, _)| *k == key) {
                    current[i] = pool.read_next(i)?;
                }
            }
            current[m] = pool.read_next(m)?;

            if drop_tombstones && value == self.config.tombstone {
                continue;
            }
            writer.add(&key, &value)?;
        }

        let items = writer.num_items();
        if items == 0 {
            // Every record was a dropped tombstone; no table to keep.
            writer.abandon()?;
        } else {
            writer.finish()?;
        }
        Ok(items)
    }
}
