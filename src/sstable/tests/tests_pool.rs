#[cfg(test)]
mod tests {
    use crate::block::BlockManager;
    use crate::config::Config;
    use crate::sstable::ReaderPool;
    use crate::sstable::writer::flush_memtable;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn config() -> Config {
        let mut config = Config::default();
        config.block_size = 64;
        config.summary_step = 4;
        config.bloom_filter_expected_elements = 100;
        config
    }

    fn build_table(
        tmp: &TempDir,
        bm: &Arc<BlockManager>,
        config: &Config,
        name: &str,
        pairs: Vec<(String, String)>,
    ) -> PathBuf {
        let path = tmp.path().join(name);
        flush_memtable(Arc::clone(bm), &path, config, pairs).unwrap();
        path
    }

    #[test]
    fn test_streams_whole_table_in_order() {
        let tmp = TempDir::new().unwrap();
        let bm = Arc::new(BlockManager::new(64, 0));
        let config = config();

        let pairs: Vec<(String, String)> = (0..50)
            .map(|i| (format!("key-{i:02}"), format!("value-{i}")))
            .collect();
        let path = build_table(&tmp, &bm, &config, "t.db", pairs.clone());

        let mut pool = ReaderPool::open(Arc::clone(&bm), &[path], &config).unwrap();
        assert_eq!(pool.total_items(), 50);

        let mut streamed = Vec::new();
        while let Some(pair) = pool.read_next(0).unwrap() {
            streamed.push(pair);
        }
        assert_eq!(streamed, pairs);

        // Exhausted stays exhausted.
        assert!(pool.read_next(0).unwrap().is_none());
    }

    #[test]
    fn test_streams_multiple_tables_independently() {
        let tmp = TempDir::new().unwrap();
        let bm = Arc::new(BlockManager::new(64, 0));
        let config = config();

        let a = build_table(
            &tmp,
            &bm,
            &config,
            "a.db",
            vec![
                ("a1".to_string(), "1".to_string()),
                ("a2".to_string(), "2".to_string()),
            ],
        );
        let b = build_table(
            &tmp,
            &bm,
            &config,
            "b.db",
            vec![("b1".to_string(), "9".to_string())],
        );

        let mut pool = ReaderPool::open(Arc::clone(&bm), &[a, b], &config).unwrap();
        assert_eq!(pool.len(), 2);

        // Interleave reads across the two cursors.
        assert_eq!(
            pool.read_next(1).unwrap(),
            Some(("b1".to_string(), "9".to_string()))
        );
        assert_eq!(
            pool.read_next(0).unwrap(),
            Some(("a1".to_string(), "1".to_string()))
        );
        assert!(pool.read_next(1).unwrap().is_none());
        assert_eq!(
            pool.read_next(0).unwrap(),
            Some(("a2".to_string(), "2".to_string()))
        );
        assert!(pool.read_next(0).unwrap().is_none());
    }

    #[test]
    fn test_streams_jumbo_records() {
        let tmp = TempDir::new().unwrap();
        let bm = Arc::new(BlockManager::new(64, 0));
        let config = config();

        let big = "y".repeat(300);
        let path = build_table(
            &tmp,
            &bm,
            &config,
            "t.db",
            vec![
                ("aaa".to_string(), "first".to_string()),
                ("big".to_string(), big.clone()),
                ("zzz".to_string(), "last".to_string()),
            ],
        );

        let mut pool = ReaderPool::open(Arc::clone(&bm), &[path], &config).unwrap();
        assert_eq!(
            pool.read_next(0).unwrap(),
            Some(("aaa".to_string(), "first".to_string()))
        );
        assert_eq!(pool.read_next(0).unwrap(), Some(("big".to_string(), big)));
        assert_eq!(
            pool.read_next(0).unwrap(),
            Some(("zzz".to_string(), "last".to_string()))
        );
        assert!(pool.read_next(0).unwrap().is_none());
    }

    #[test]
    fn test_count_stops_before_index_section() {
        let tmp = TempDir::new().unwrap();
        let bm = Arc::new(BlockManager::new(64, 0));
        let config = config();

        // Enough records that data, index, and summary all span blocks;
        // the countdown must stop exactly at the data section's end.
        let pairs: Vec<(String, String)> = (0..100)
            .map(|i| (format!("key-{i:03}"), "v".to_string()))
            .collect();
        let path = build_table(&tmp, &bm, &config, "t.db", pairs);

        let mut pool = ReaderPool::open(Arc::clone(&bm), &[path], &config).unwrap();
        let mut count = 0;
        while pool.read_next(0).unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 100);
    }
}
