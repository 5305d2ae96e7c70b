//! On-disk path strategy.
//!
//! All path construction lives here: the level directories
//! (`lvl0 .. lvl(n-1)`), the WAL segment directory, and the
//! timestamp-based file naming that makes "newest" and "oldest"
//! derivable from a plain filename sort.
//!
//! Names embed nanoseconds since the UNIX epoch, zero-padded to a fixed
//! width so lexicographic order equals creation order; a process-wide
//! monotonic counter breaks ties when two files are created within the
//! same nanosecond tick.


use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// File extension for SSTables.
pub const TABLE_EXT: &str = "db";

/// File extension for WAL segments.
pub const WAL_EXT: &str = "log";

/// Directory under the base dir holding WAL segments.
const WAL_DIR: &str = "wal";

static LAST_STAMP: AtomicU64 = AtomicU64::new(0);

/// A strictly monotonic timestamp in nanoseconds.
///
/// Wall-clock nanos, bumped past the previous value whenever the clock
/// stalls or steps backwards.
pub fn monotonic_stamp() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let mut prev = LAST_STAMP.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev + 1);
        match LAST_STAMP.compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => prev = actual,
        }
    }
}

/// Resolves every path the engine touches.
#[derive(Debug, Clone)]
pub struct DataLayout {
    base_dir: PathBuf,
    levels: usize,
}

impl DataLayout {
    /// Create a layout rooted at `base_dir` with `levels` LSM levels.
    pub fn new(base_dir: impl Into<PathBuf>, levels: usize) -> Self {
        Self {
            base_dir: base_dir.into(),
            levels,
        }
    }

    /// Root data directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Number of LSM levels.
    pub fn levels(&self) -> usize {
        self.levels
    }

    /// Index of the deepest level (`lvl(n-1)`).
    pub fn last_level(&self) -> usize {
        self.levels - 1
    }

    /// Directory holding level `level`'s tables.
    pub fn level_dir(&self, level: usize) -> PathBuf {
        self.base_dir.join(format!("lvl{level}"))
    }

    /// Directory holding WAL segments.
    pub fn wal_dir(&self) -> PathBuf {
        self.base_dir.join(WAL_DIR)
    }

    /// Create the base, WAL, and every level directory.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        fs::create_dir_all(self.wal_dir())?;
        for level in 0..self.levels {
            fs::create_dir_all(self.level_dir(level))?;
        }
        Ok(())
    }

    /// Path for a fresh SSTable in `level`.
    pub fn new_table_path(&self, level: usize) -> PathBuf {
        self.level_dir(level)
            .join(format!("sstable-{:020}.{TABLE_EXT}", monotonic_stamp()))
    }

    /// Path for a fresh WAL segment.
    pub fn new_wal_segment_path(&self) -> PathBuf {
        self.wal_dir()
            .join(format!("wal-{:020}.{WAL_EXT}", monotonic_stamp()))
    }

    /// Tables in `level`, oldest first (filename order).
    pub fn level_tables_oldest_first(&self, level: usize) -> io::Result<Vec<PathBuf>> {
        let mut tables = list_with_ext(&self.level_dir(level), TABLE_EXT)?;
        tables.sort();
        Ok(tables)
    }

    /// Tables in `level`, newest first.
    pub fn level_tables_newest_first(&self, level: usize) -> io::Result<Vec<PathBuf>> {
        let mut tables = self.level_tables_oldest_first(level)?;
        tables.reverse();
        Ok(tables)
    }

    /// All tables across all levels in shadowing order: level 0 before
    /// level 1, newest first within each level.
    pub fn all_tables_newest_first(&self) -> io::Result<Vec<PathBuf>> {
        let mut all = Vec::new();
        for level in 0..self.levels {
            all.extend(self.level_tables_newest_first(level)?);
        }
        Ok(all)
    }

    /// WAL segments, oldest first (replay order).
    pub fn wal_segments_oldest_first(&self) -> io::Result<Vec<PathBuf>> {
        let mut segments = list_with_ext(&self.wal_dir(), WAL_EXT)?;
        segments.sort();
        Ok(segments)
    }
}

/// Non-recursive listing of files in `dir` with the given extension.
fn list_with_ext(dir: &Path, ext: &str) -> io::Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some(ext) {
            paths.push(path);
        }
    }
    Ok(paths)
}
