#[cfg(test)]
mod tests {
    use crate::block::BlockManager;
    use crate::layout::DataLayout;
    use crate::wal::{Wal, WalRecord};
    use std::sync::Arc;
    use tempfile::TempDir;

    const BLOCK_SIZE: usize = 64;

    fn setup() -> (TempDir, Arc<BlockManager>, DataLayout) {
        let tmp = TempDir::new().unwrap();
        let bm = Arc::new(BlockManager::new(BLOCK_SIZE, 0));
        let layout = DataLayout::new(tmp.path().join("data"), 2);
        layout.ensure_dirs().unwrap();
        (tmp, bm, layout)
    }

    #[test]
    fn test_replay_of_empty_directory() {
        let (_tmp, bm, layout) = setup();
        assert!(Wal::replay(&bm, &layout).unwrap().is_empty());
    }

    #[test]
    fn test_open_without_writes_leaves_no_files() {
        let (_tmp, bm, layout) = setup();
        let _wal = Wal::open(Arc::clone(&bm), layout.clone(), 8, 1024).unwrap();
        // The segment file is created lazily on the first flush.
        assert!(layout.wal_segments_oldest_first().unwrap().is_empty());
    }

    #[test]
    fn test_empty_value_round_trips() {
        let (_tmp, bm, layout) = setup();
        let mut wal = Wal::open(Arc::clone(&bm), layout.clone(), 1, 1024 * 1024).unwrap();

        wal.append(WalRecord::put("key", "")).unwrap();
        let records = Wal::replay(&bm, &layout).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, "");
        assert!(!records[0].tombstone);
    }

    #[test]
    fn test_key_larger_than_a_block() {
        let (_tmp, bm, layout) = setup();
        let mut wal = Wal::open(Arc::clone(&bm), layout.clone(), 1, 1024 * 1024).unwrap();

        let long_key = "k".repeat(200);
        wal.append(WalRecord::put(&long_key, "v")).unwrap();
        let records = Wal::replay(&bm, &layout).unwrap();
        assert_eq!(records[0].key, long_key);
    }

    #[test]
    fn test_interleaved_puts_and_deletes_keep_order() {
        let (_tmp, bm, layout) = setup();
        let mut wal = Wal::open(Arc::clone(&bm), layout.clone(), 3, 1024 * 1024).unwrap();

        wal.append(WalRecord::put("k", "1")).unwrap();
        wal.append(WalRecord::delete("k")).unwrap();
        wal.append(WalRecord::put("k", "2")).unwrap();
        wal.shut().unwrap();

        let records = Wal::replay(&bm, &layout).unwrap();
        assert_eq!(records.len(), 3);
        assert!(!records[0].tombstone);
        assert!(records[1].tombstone);
        assert_eq!(records[2].value, "2");
    }

    #[test]
    fn test_flush_with_empty_buffer_is_a_no_op() {
        let (_tmp, bm, layout) = setup();
        let mut wal = Wal::open(Arc::clone(&bm), layout.clone(), 8, 1024).unwrap();
        wal.flush().unwrap();
        wal.shut().unwrap();
        assert!(Wal::replay(&bm, &layout).unwrap().is_empty());
    }

    #[test]
    fn test_delete_segments_twice() {
        let (_tmp, bm, layout) = setup();
        let mut wal = Wal::open(Arc::clone(&bm), layout.clone(), 1, 1024 * 1024).unwrap();

        wal.append(WalRecord::put("a", "1")).unwrap();
        wal.delete_segments().unwrap();
        wal.delete_segments().unwrap();
        assert!(Wal::replay(&bm, &layout).unwrap().is_empty());

        wal.append(WalRecord::put("b", "2")).unwrap();
        assert_eq!(Wal::replay(&bm, &layout).unwrap().len(), 1);
    }
}
