//! # StrataDB
//!
//! An embeddable, persistent, ordered key-value storage engine built on a
//! **Log-Structured Merge Tree (LSM-tree)** over block-aligned files.
//! Designed for fast writes, crash-safe operation, and a predictable disk
//! layout.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                       Engine                           │
//! │  ┌─────────────┐   ┌──────────────┐   ┌────────────┐   │
//! │  │  Memtable   │   │     WAL      │   │  SSTables  │   │
//! │  │  ring       │   │  (segments)  │   │ lvl0..lvlN │   │
//! │  └──────┬──────┘   └──────┬───────┘   └─────┬──────┘   │
//! │         │ flush (worker)  │ replay          │          │
//! │         └────────►────────┴────────►        │          │
//! │                                             │          │
//! │  ┌──────────────────────────────────────────┘          │
//! │  │  Leveled compaction (k-way merge, worker)           │
//! │  └─────────────────────────────────────────────────────┤
//! │                                                        │
//! │  ┌──────────────────────────────────────────────────┐  │
//! │  │   Block manager (fixed blocks + LRU cache)       │  │
//! │  └──────────────────────────────────────────────────┘  │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`engine`] | Storage facade — write, read, prefix/range scans, iterators, recovery |
//! | [`memtable`] | In-memory ordered write buffer (skiplist, B-tree, or hashmap backing) |
//! | [`wal`] | Buffered, segmented, CRC-protected write-ahead log |
//! | [`sstable`] | Immutable sorted tables: writer, reader, multi-table pool |
//! | [`compaction`] | Leveled compaction with k-way merge between levels |
//! | [`block`] | Block manager, LRU cache, block-aligned stream writer/reader |
//! | [`filter`] | Bloom filter, prefix bloom filter, Merkle root |
//! | [`limiter`] | Per-user token-bucket admission control |
//! | [`config`] | Immutable engine configuration loaded from a JSON document |
//! | [`layout`] | On-disk path strategy (level directories, WAL segments) |
//! | [`codec`] | Byte-level framing helpers for the on-disk formats |
//!
//! ## Key Features
//!
//! - **Write-ahead logging** — every mutation is persisted to a WAL
//!   segment before it is acknowledged; replay restores the memtables
//!   after a crash.
//! - **Block-aligned files** — every persisted file is an exact sequence
//!   of fixed-size blocks; records larger than one block are chunked
//!   into jumbo sequences and reassembled transparently.
//! - **Four-section SSTables** — data, index, strided summary, and
//!   metadata (bloom filters + Merkle root) in a single file, discovered
//!   bottom-up from the final block.
//! - **Leveled compaction** — per-level thresholds trigger a k-way merge
//!   into the next level, deduplicating keys and dropping shadowed
//!   tombstones at the final level.
//! - **Admission control** — per-user token buckets gate reads and
//!   writes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stratadb::config::Config;
//! use stratadb::engine::Engine;
//!
//! let mut config = Config::default();
//! config.lsm_base_dir = "/tmp/strata".into();
//! let engine = Engine::open(config).unwrap();
//! engine.start().unwrap();
//!
//! engine.write("alice", "hello", "world", false).unwrap();
//! assert_eq!(
//!     engine.read("alice", "hello").unwrap(),
//!     Some("world".to_string())
//! );
//!
//! let page = engine.prefix_scan("alice", "he", 1, 10).unwrap();
//! assert_eq!(page.len(), 1);
//!
//! engine.shut().unwrap();
//! ```

pub mod block;
pub mod codec;
pub mod compaction;
pub mod config;
pub mod engine;
pub mod filter;
pub mod layout;
pub mod limiter;
pub mod memtable;
pub mod sstable;
pub mod wal;
