#[cfg(test)]
mod tests {
    use crate::block::BlockManager;
    use crate::layout::DataLayout;
    use crate::wal::{Wal, WalError, WalRecord};
    use std::fs::OpenOptions;
    use std::io::{Read, Seek, SeekFrom, Write};
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
    fn test_bit_flip_in_value_aborts_replay() {
        let (_tmp, bm, layout) = setup();
        let mut wal = Wal::open(Arc::clone(&bm), layout.clone(), 1, 1024 * 1024).unwrap();
        wal.append(WalRecord::put("key1", "AAAAAAAA")).unwrap();

        // Flip one payload byte in the middle of the record frame.
        let segment = &layout.wal_segments_oldest_first().unwrap()[0];
        let mut file = OpenOptions::new().read(true).write(true).open(segment).unwrap();
        let mut block = vec![0u8; BLOCK_SIZE];
        file.read_exact(&mut block).unwrap();
        let target = block
            .iter()
            .position(|&b| b == b'A')
            .expect("payload byte present");
        file.seek(SeekFrom::Start(target as u64)).unwrap();
        file.write_all(&[b'Z']).unwrap();

        let err = Wal::replay(&bm, &layout).unwrap_err();
        assert!(matches!(err, WalError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_corrupt_stored_crc_aborts_replay() {
        let (_tmp, bm, layout) = setup();
        let mut wal = Wal::open(Arc::clone(&bm), layout.clone(), 1, 1024 * 1024).unwrap();
        wal.append(WalRecord::put("key1", "value1")).unwrap();

        // The CRC is the first field of the first record in the block.
        let segment = &layout.wal_segments_oldest_first().unwrap()[0];
        let mut file = OpenOptions::new().write(true).open(segment).unwrap();
        file.write_all(&[0xFF, 0xFF, 0xFF, 0xFF]).unwrap();

        let err = Wal::replay(&bm, &layout).unwrap_err();
        assert!(matches!(err, WalError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_clean_log_replays_after_unrelated_writes() {
        let (_tmp, bm, layout) = setup();
        let mut wal = Wal::open(Arc::clone(&bm), layout.clone(), 1, 1024 * 1024).unwrap();
        wal.append(WalRecord::put("key1", "value1")).unwrap();
        wal.append(WalRecord::delete("key2")).unwrap();

        let records = Wal::replay(&bm, &layout).unwrap();
        assert_eq!(records.len(), 2);
        assert!(!records[0].tombstone);
        assert!(records[1].tombstone);
    }
}
