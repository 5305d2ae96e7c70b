//! LSM Storage Engine
//!
//! The facade tying the pipeline together: per-user admission, the
//! WAL-first write path over a ring of memtables, reads that walk
//! memtables and then the on-disk levels newest-first, paged and
//! iterator-style scans, and the background worker that flushes
//! displaced memtables and triggers compaction.
//!
//! ## Write path
//!
//! ```text
//! write(user, k, v) ──► token bucket ──► WAL.append ──► memtable.add
//!                                                          │ full?
//!                                        cursor advances ◄─┘
//!                                        worker ◄─ Flush + CompactCheck
//! ```
//!
//! The ring means a foreground write never waits for a flush: the
//! displaced memtable keeps serving reads until the ring wraps back
//! onto it, by which time its table is on disk. When the wrap reaches
//! index 0, every WAL segment is deleted — all prior writes are in
//! SSTables by then.
//!
//! ## Read path
//!
//! Memtables are probed newest-first (the latest accepted write wins),
//! then the SSTable retriever walks `lvl0, lvl1, …`, newest table
//! first within each level. The first hit decides: a tombstone means
//! "not found", anything else is the value.
//!
//! ## Background work
//!
//! One worker thread owns a FIFO task queue (flush, compaction check,
//! sync barrier, shutdown). A single queue serializes flushes and
//! guarantees each compaction check sees the table its flush produced.

#[cfg(test)]
mod tests;

pub mod iterator;

pub use iterator::ScanIterator;

use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;

use crossbeam::channel::{Receiver, Sender, unbounded};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::block::{BlockError, BlockManager};
use crate::compaction::{Compacter, CompactionError};
use crate::config::{Config, ConfigError};
use crate::layout::DataLayout;
use crate::limiter::{AdmissionDenied, UserLimiter};
use crate::memtable::Memtable;
use crate::sstable::writer::flush_memtable;
use crate::sstable::{Retriever, SSTableError};
use crate::wal::{Wal, WalError, WalRecord};

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration rejected at startup.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// WAL failure (append, flush, replay).
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    /// SSTable failure.
    #[error("sstable error: {0}")]
    SSTable(#[from] SSTableError),

    /// Compaction failure.
    #[error("compaction error: {0}")]
    Compaction(#[from] CompactionError),

    /// Block-level failure.
    #[error("block error: {0}")]
    Block(#[from] BlockError),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The user's token bucket is empty.
    #[error(transparent)]
    Admission(#[from] AdmissionDenied),

    /// Internal invariant violation (poisoned lock, dead worker).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Work items for the background worker.
enum Task {
    /// Flush a displaced memtable snapshot to a level-0 table;
    /// `wrapped` marks the ring returning to index 0.
    Flush {
        pairs: Vec<(String, String)>,
        wrapped: bool,
    },
    /// Walk the levels and compact where thresholds trip.
    CompactCheck,
    /// Barrier: acknowledge once every earlier task is done.
    Sync(Sender<()>),
    /// Stop the worker.
    Shutdown,
}

/// Snapshot of engine state returned by [`Engine::stats`].
#[derive(Debug)]
pub struct EngineStats {
    /// Fill of each memtable in ring order.
    pub memtable_sizes: Vec<usize>,
    /// Ring cursor (the active memtable).
    pub cursor: usize,
    /// Table count per level, `lvl0` first.
    pub tables_per_level: Vec<usize>,
    /// Total bytes across all SSTables.
    pub total_table_bytes: u64,
    /// WAL segment count on disk.
    pub wal_segments: usize,
    /// Records waiting in the WAL buffer.
    pub pending_wal_records: usize,
}

/// Mutable engine state behind the lock.
struct EngineInner {
    memtables: Vec<Memtable>,
    cursor: usize,
    wal: Wal,
}

/// The storage engine facade.
pub struct Engine {
    inner: Arc<RwLock<EngineInner>>,
    limiter: Mutex<UserLimiter>,
    bm: Arc<BlockManager>,
    layout: DataLayout,
    config: Config,
    retriever: Retriever,
    worker_tx: Sender<Task>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Open an engine rooted at the configured base directory.
    ///
    /// Creates the directory layout and spawns the background worker;
    /// call [`Engine::start`] afterwards to replay the WAL.
    pub fn open(config: Config) -> Result<Self, EngineError> {
        config.validate()?;

        let layout = DataLayout::new(config.lsm_base_dir.clone(), config.lsm_levels);
        layout.ensure_dirs()?;

        let bm = Arc::new(BlockManager::new(
            config.block_size,
            config.block_cache_capacity,
        ));
        let wal = Wal::open(
            Arc::clone(&bm),
            layout.clone(),
            config.wal_buffer_size,
            config.wal_segment_size,
        )?;

        let memtables = (0..config.memtable_count)
            .map(|_| Memtable::new(&config))
            .collect();

        let inner = Arc::new(RwLock::new(EngineInner {
            memtables,
            cursor: 0,
            wal,
        }));

        let (worker_tx, worker_rx) = unbounded();
        let worker = spawn_worker(
            worker_rx,
            Arc::clone(&inner),
            Arc::clone(&bm),
            layout.clone(),
            config.clone(),
        );

        info!(base_dir = %layout.base_dir().display(), "engine opened");
        Ok(Self {
            inner,
            limiter: Mutex::new(UserLimiter::new(
                config.max_tokens,
                config.token_refill_rate,
            )),
            bm: Arc::clone(&bm),
            retriever: Retriever::new(bm, layout.clone(), config.clone()),
            layout,
            config,
            worker_tx,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Replay the WAL, restoring the memtable ring, then flush any
    /// displaced memtables whose tables never made it to disk.
    pub fn start(&self) -> Result<(), EngineError> {
        let records = Wal::replay(&self.bm, &self.layout)?;
        let count = records.len();
        for record in records {
            let value = if record.tombstone {
                self.config.tombstone.clone()
            } else {
                record.value
            };
            self.write("", &record.key, &value, true)?;
        }

        // A memtable displaced right before a crash may have lost its
        // flush; re-enqueue every full non-active memtable, oldest
        // first. Recovery flushes never delete the WAL — the next
        // natural ring wrap handles that.
        let inner = self.read_inner()?;
        let ring = inner.memtables.len();
        let mut flushed_any = false;
        for step in 1..ring {
            let idx = (inner.cursor + step) % ring;
            if inner.memtables[idx].size() >= self.config.memtable_size {
                self.enqueue(Task::Flush {
                    pairs: inner.memtables[idx].to_sorted_pairs(),
                    wrapped: false,
                })?;
                flushed_any = true;
            }
        }
        drop(inner);
        if flushed_any {
            self.enqueue(Task::CompactCheck)?;
        }

        info!(records = count, "engine started");
        Ok(())
    }

    /// Store `value` under `key` for `user`.
    ///
    /// `from_wal` marks replay traffic: it bypasses admission and the
    /// WAL re-append, and never triggers background flushes.
    pub fn write(
        &self,
        user: &str,
        key: &str,
        value: &str,
        from_wal: bool,
    ) -> Result<(), EngineError> {
        if !from_wal {
            self.admit(user)?;
        }

        let mut inner = self.write_inner()?;

        // The cursor may sit on a memtable left full by a previous ring
        // lap (its table is on disk by now) — reclaim it first.
        if inner.memtables[inner.cursor].size() >= self.config.memtable_size {
            if from_wal {
                // Replay advances the ring instead of clearing so that
                // recovered-but-unflushed data survives; `start`
                // re-enqueues the flushes afterwards.
                let next = (inner.cursor + 1) % inner.memtables.len();
                inner.cursor = next;
                inner.memtables[next].clear();
            } else {
                debug!(cursor = inner.cursor, "reusing wrapped memtable");
                let cursor = inner.cursor;
                inner.memtables[cursor].clear();
            }
        }

        if !from_wal {
            let record = if value == self.config.tombstone {
                WalRecord::delete(key)
            } else {
                WalRecord::put(key, value)
            };
            inner.wal.append(record)?;
        }

        let cursor = inner.cursor;
        inner.memtables[cursor].add(key, value);

        if !from_wal && inner.memtables[cursor].size() >= self.config.memtable_size {
            let pairs = inner.memtables[cursor].to_sorted_pairs();
            inner.cursor = (cursor + 1) % inner.memtables.len();
            let wrapped = inner.cursor == 0;

            // The memtable the ring lands on still holds last lap's
            // data; its table is on disk (or its flush is queued with
            // its own snapshot). Clear it now so stale entries never
            // rank as newest in reads.
            let next = inner.cursor;
            if !inner.memtables[next].is_empty() {
                inner.memtables[next].clear();
            }
            drop(inner);

            self.enqueue(Task::Flush { pairs, wrapped })?;
            self.enqueue(Task::CompactCheck)?;
        }
        Ok(())
    }

    /// Delete `key` by writing the tombstone marker.
    pub fn delete(&self, user: &str, key: &str) -> Result<(), EngineError> {
        let tombstone = self.config.tombstone.clone();
        self.write(user, key, &tombstone, false)
    }

    /// Fetch the newest value for `key`, or `None` if absent or
    /// deleted.
    pub fn read(&self, user: &str, key: &str) -> Result<Option<String>, EngineError> {
        self.admit(user)?;

        let inner = self.read_inner()?;
        for idx in self.ring_newest_first(inner.cursor, inner.memtables.len()) {
            if let Some(value) = inner.memtables[idx].get(key) {
                if value == self.config.tombstone {
                    return Ok(None);
                }
                return Ok(Some(value));
            }
        }
        drop(inner);

        match self.retriever.get(key)? {
            Some(value) if value == self.config.tombstone => Ok(None),
            other => Ok(other),
        }
    }

    /// One page of keys starting with `prefix`, in key order.
    ///
    /// Pages are 1-based: `page_num = 1` is the first `page_size`
    /// matches.
    pub fn prefix_scan(
        &self,
        user: &str,
        prefix: &str,
        page_num: usize,
        page_size: usize,
    ) -> Result<Vec<(String, String)>, EngineError> {
        self.admit(user)?;
        let matches = self.collect_prefix(prefix)?;
        Ok(paginate(matches, page_num, page_size))
    }

    /// One page of keys in `[start, end]`, in key order.
    pub fn range_scan(
        &self,
        user: &str,
        start: &str,
        end: &str,
        page_num: usize,
        page_size: usize,
    ) -> Result<Vec<(String, String)>, EngineError> {
        self.admit(user)?;
        let matches = self.collect_range(start, end)?;
        Ok(paginate(matches, page_num, page_size))
    }

    /// Snapshot iterator over every key starting with `prefix`.
    pub fn prefix_iterate(&self, user: &str, prefix: &str) -> Result<ScanIterator, EngineError> {
        self.admit(user)?;
        Ok(ScanIterator::new(self.collect_prefix(prefix)?))
    }

    /// Snapshot iterator over every key in `[start, end]`.
    pub fn range_iterate(
        &self,
        user: &str,
        start: &str,
        end: &str,
    ) -> Result<ScanIterator, EngineError> {
        self.admit(user)?;
        Ok(ScanIterator::new(self.collect_range(start, end)?))
    }

    /// Engine state snapshot for diagnostics and the STATS command.
    pub fn stats(&self) -> Result<EngineStats, EngineError> {
        let inner = self.read_inner()?;
        let memtable_sizes = inner.memtables.iter().map(|m| m.size()).collect();
        let cursor = inner.cursor;
        let pending_wal_records = inner.wal.pending_records();
        drop(inner);

        let mut tables_per_level = Vec::with_capacity(self.layout.levels());
        let mut total_table_bytes = 0u64;
        for level in 0..self.layout.levels() {
            let tables = self.layout.level_tables_oldest_first(level)?;
            for table in &tables {
                total_table_bytes += std::fs::metadata(table)?.len();
            }
            tables_per_level.push(tables.len());
        }
        let wal_segments = self.layout.wal_segments_oldest_first()?.len();

        Ok(EngineStats {
            memtable_sizes,
            cursor,
            tables_per_level,
            total_table_bytes,
            wal_segments,
            pending_wal_records,
        })
    }

    /// Block until every queued background task has finished.
    pub fn sync(&self) -> Result<(), EngineError> {
        let (ack_tx, ack_rx) = unbounded();
        self.enqueue(Task::Sync(ack_tx))?;
        ack_rx
            .recv()
            .map_err(|_| EngineError::Internal("background worker died".into()))
    }

    /// Graceful shutdown: drain background work, flush every memtable
    /// to a level-0 table, flush and clear the WAL, stop the worker.
    ///
    /// After a clean shutdown the WAL directory is empty and every
    /// accepted write lives in an SSTable, so a restart replays
    /// nothing.
    pub fn shut(&self) -> Result<(), EngineError> {
        self.sync()?;
        {
            let mut inner = self.write_inner()?;
            let ring = inner.memtables.len();
            let cursor = inner.cursor;
            // Oldest first, ending at the active memtable, so newer
            // tables shadow older ones.
            for step in 1..=ring {
                let idx = (cursor + step) % ring;
                if inner.memtables[idx].is_empty() {
                    continue;
                }
                let pairs = inner.memtables[idx].to_sorted_pairs();
                flush_memtable(
                    Arc::clone(&self.bm),
                    self.layout.new_table_path(0),
                    &self.config,
                    pairs,
                )?;
                inner.memtables[idx].clear();
            }
            inner.wal.shut()?;
            inner.wal.delete_segments()?;
        }

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            self.enqueue(Task::Shutdown)?;
            handle
                .join()
                .map_err(|_| EngineError::Internal("background worker panicked".into()))?;
        }
        info!("engine shut down");
        Ok(())
    }

    // --------------------------------------------------------------------------------------------
    // Internals
    // --------------------------------------------------------------------------------------------

    /// Merge prefix matches from the memtables (newest first) and the
    /// tables, dropping tombstones.
    fn collect_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, EngineError> {
        self.collect_matching(
            |key| key.starts_with(prefix),
            |retriever| retriever.prefix_entries(prefix),
        )
    }

    /// Merge range matches from the memtables (newest first) and the
    /// tables, dropping tombstones.
    fn collect_range(&self, start: &str, end: &str) -> Result<Vec<(String, String)>, EngineError> {
        if start > end {
            return Ok(Vec::new());
        }
        self.collect_matching(
            |key| start <= key && key <= end,
            |retriever| retriever.range_entries(start, end),
        )
    }

    fn collect_matching(
        &self,
        keep: impl Fn(&str) -> bool,
        persisted: impl Fn(&Retriever) -> Result<Vec<(String, String)>, SSTableError>,
    ) -> Result<Vec<(String, String)>, EngineError> {
        use std::collections::BTreeMap;
        let mut merged: BTreeMap<String, String> = BTreeMap::new();

        let inner = self.read_inner()?;
        for idx in self.ring_newest_first(inner.cursor, inner.memtables.len()) {
            for (key, value) in inner.memtables[idx].to_sorted_pairs() {
                if keep(&key) {
                    merged.entry(key).or_insert(value);
                }
            }
        }
        drop(inner);

        for (key, value) in persisted(&self.retriever)? {
            merged.entry(key).or_insert(value);
        }

        Ok(merged
            .into_iter()
            .filter(|(_, value)| *value != self.config.tombstone)
            .collect())
    }

    /// Ring indices from the active memtable backwards in write age.
    fn ring_newest_first(&self, cursor: usize, len: usize) -> impl Iterator<Item = usize> {
        (0..len).map(move |step| (cursor + len - step) % len)
    }

    fn admit(&self, user: &str) -> Result<(), EngineError> {
        self.limiter
            .lock()
            .map_err(|_| EngineError::Internal("limiter lock poisoned".into()))?
            .check(user)
            .map_err(EngineError::from)
    }

    fn enqueue(&self, task: Task) -> Result<(), EngineError> {
        self.worker_tx
            .send(task)
            .map_err(|_| EngineError::Internal("background worker is gone".into()))
    }

    fn read_inner(&self) -> Result<std::sync::RwLockReadGuard<'_, EngineInner>, EngineError> {
        self.inner
            .read()
            .map_err(|_| EngineError::Internal("engine lock poisoned".into()))
    }

    fn write_inner(&self) -> Result<std::sync::RwLockWriteGuard<'_, EngineInner>, EngineError> {
        self.inner
            .write()
            .map_err(|_| EngineError::Internal("engine lock poisoned".into()))
    }
}

/// 1-based pagination over a sorted match list.
fn paginate(
    matches: Vec<(String, String)>,
    page_num: usize,
    page_size: usize,
) -> Vec<(String, String)> {
    let skip = page_num.saturating_sub(1).saturating_mul(page_size);
    matches.into_iter().skip(skip).take(page_size).collect()
}

/// Start the background worker: flushes, compaction checks, barriers.
fn spawn_worker(
    rx: Receiver<Task>,
    inner: Arc<RwLock<EngineInner>>,
    bm: Arc<BlockManager>,
    layout: DataLayout,
    config: Config,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let compacter = Compacter::new(Arc::clone(&bm), layout.clone(), config.clone());
        while let Ok(task) = rx.recv() {
            match task {
                Task::Flush { pairs, wrapped } => {
                    if pairs.is_empty() {
                        continue;
                    }
                    let path = layout.new_table_path(0);
                    match flush_memtable(Arc::clone(&bm), &path, &config, pairs) {
                        Ok(()) => {
                            debug!(table = %path.display(), "memtable flushed");
                            if wrapped {
                                match inner.write() {
                                    Ok(mut guard) => {
                                        if let Err(e) = guard.wal.delete_segments() {
                                            error!(error = %e, "WAL cleanup failed");
                                        }
                                    }
                                    Err(_) => error!("engine lock poisoned; WAL kept"),
                                }
                            }
                        }
                        // The memtable still serves reads and the WAL
                        // still holds the records; skipping the flush
                        // loses nothing durable.
                        Err(e) => error!(error = %e, "memtable flush failed"),
                    }
                }
                Task::CompactCheck => {
                    if let Err(e) = compacter.check_compaction_conditions() {
                        warn!(error = %e, "compaction aborted");
                    }
                }
                Task::Sync(ack) => {
                    let _ = ack.send(());
                }
                Task::Shutdown => break,
            }
        }
    })
}
