#[cfg(test)]
mod tests {
    use crate::block::BlockManager;
    use crate::config::Config;
    use crate::layout::DataLayout;
    use crate::sstable::writer::flush_memtable;
    use crate::sstable::reader::TableGet;
    use crate::sstable::{Retriever, TableReader};
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn config(block_size: usize) -> Config {
        let mut config = Config::default();
        config.block_size = block_size;
        config.summary_step = 3;
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
    fn test_point_lookup_every_key() {
        let tmp = TempDir::new().unwrap();
        let bm = Arc::new(BlockManager::new(64, 0));
        let config = config(64);

        let pairs: Vec<(String, String)> = (0..60)
            .map(|i| (format!("key-{i:03}"), format!("value-{i}")))
            .collect();
        let path = build_table(&tmp, &bm, &config, "t.db", pairs);

        let reader = TableReader::open(Arc::clone(&bm), &path, &config).unwrap();
        for i in 0..60 {
            assert_eq!(
                reader.get(&format!("key-{i:03}")).unwrap(),
                TableGet::Found(format!("value-{i}")),
                "key-{i:03} lookup failed"
            );
        }
    }

    #[test]
    fn test_absent_keys_not_present() {
        let tmp = TempDir::new().unwrap();
        let bm = Arc::new(BlockManager::new(64, 0));
        let config = config(64);

        let pairs: Vec<(String, String)> = (0..20)
            .map(|i| (format!("key-{i:02}"), "v".to_string()))
            .collect();
        let path = build_table(&tmp, &bm, &config, "t.db", pairs);

        let reader = TableReader::open(Arc::clone(&bm), &path, &config).unwrap();
        // Before the first key, between keys, after the last key.
        assert_eq!(reader.get("aaa").unwrap(), TableGet::NotPresent);
        assert_eq!(reader.get("key-05x").unwrap(), TableGet::NotPresent);
        assert_eq!(reader.get("zzz").unwrap(), TableGet::NotPresent);
    }

    #[test]
    fn test_tombstone_returned_verbatim() {
        let tmp = TempDir::new().unwrap();
        let bm = Arc::new(BlockManager::new(64, 0));
        let config = config(64);

        let pairs = vec![
            ("alive".to_string(), "v".to_string()),
            ("dead".to_string(), config.tombstone.clone()),
        ];
        let path = build_table(&tmp, &bm, &config, "t.db", pairs);

        let reader = TableReader::open(Arc::clone(&bm), &path, &config).unwrap();
        assert_eq!(
            reader.get("dead").unwrap(),
            TableGet::Found(config.tombstone.clone())
        );
    }

    #[test]
    fn test_jumbo_value_round_trips() {
        let tmp = TempDir::new().unwrap();
        let bm = Arc::new(BlockManager::new(64, 0));
        let config = config(64);

        let big = "x".repeat(500);
        let pairs = vec![
            ("aaa".to_string(), "small".to_string()),
            ("big".to_string(), big.clone()),
            ("zzz".to_string(), "tail".to_string()),
        ];
        let path = build_table(&tmp, &bm, &config, "t.db", pairs);

        let reader = TableReader::open(Arc::clone(&bm), &path, &config).unwrap();
        assert_eq!(reader.get("big").unwrap(), TableGet::Found(big));
        assert_eq!(
            reader.get("zzz").unwrap(),
            TableGet::Found("tail".to_string())
        );
    }

    #[test]
    fn test_prefix_entries_sorted_and_bounded() {
        let tmp = TempDir::new().unwrap();
        let bm = Arc::new(BlockManager::new(64, 0));
        let config = config(64);

        let pairs = vec![
            ("user:1".to_string(), "a".to_string()),
            ("user:2".to_string(), "b".to_string()),
            ("user:3".to_string(), "c".to_string()),
            ("util".to_string(), "x".to_string()),
            ("aardvark".to_string(), "y".to_string()),
        ];
        let path = build_table(&tmp, &bm, &config, "t.db", pairs);

        let reader = TableReader::open(Arc::clone(&bm), &path, &config).unwrap();
        let entries = reader.prefix_entries("user:").unwrap();
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["user:1", "user:2", "user:3"]);
    }

    #[test]
    fn test_range_entries_inclusive_bounds() {
        let tmp = TempDir::new().unwrap();
        let bm = Arc::new(BlockManager::new(64, 0));
        let config = config(64);

        let pairs: Vec<(String, String)> = (1..=30)
            .map(|i| (format!("k{i:02}"), format!("v{i}")))
            .collect();
        let path = build_table(&tmp, &bm, &config, "t.db", pairs);

        let reader = TableReader::open(Arc::clone(&bm), &path, &config).unwrap();
        let entries = reader.range_entries("k05", "k20").unwrap();
        assert_eq!(entries.len(), 16);
        assert_eq!(entries[0].0, "k05");
        assert_eq!(entries[15].0, "k20");
        assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_range_with_inverted_bounds_is_empty() {
        let tmp = TempDir::new().unwrap();
        let bm = Arc::new(BlockManager::new(64, 0));
        let config = config(64);

        let pairs = vec![("a".to_string(), "1".to_string())];
        let path = build_table(&tmp, &bm, &config, "t.db", pairs);

        let reader = TableReader::open(Arc::clone(&bm), &path, &config).unwrap();
        assert!(reader.range_entries("z", "a").unwrap().is_empty());
    }

    #[test]
    fn test_retriever_newest_table_shadows_older() {
        let tmp = TempDir::new().unwrap();
        let bm = Arc::new(BlockManager::new(64, 0));
        let config = config(64);
        let layout = DataLayout::new(tmp.path().join("data"), 2);
        layout.ensure_dirs().unwrap();

        let old = layout.new_table_path(0);
        flush_memtable(
            Arc::clone(&bm),
            &old,
            &config,
            vec![
                ("k".to_string(), "old".to_string()),
                ("only-old".to_string(), "o".to_string()),
            ],
        )
        .unwrap();

        let new = layout.new_table_path(0);
        flush_memtable(
            Arc::clone(&bm),
            &new,
            &config,
            vec![("k".to_string(), "new".to_string())],
        )
        .unwrap();

        let retriever = Retriever::new(Arc::clone(&bm), layout, config);
        assert_eq!(retriever.get("k").unwrap(), Some("new".to_string()));
        assert_eq!(retriever.get("only-old").unwrap(), Some("o".to_string()));
        assert_eq!(retriever.get("missing").unwrap(), None);
    }

    #[test]
    fn test_retriever_level0_shadows_level1() {
        let tmp = TempDir::new().unwrap();
        let bm = Arc::new(BlockManager::new(64, 0));
        let config = config(64);
        let layout = DataLayout::new(tmp.path().join("data"), 2);
        layout.ensure_dirs().unwrap();

        // Deeper level written later in wall-clock time still loses.
        let shallow = layout.new_table_path(0);
        let deep = layout.new_table_path(1);
        flush_memtable(
            Arc::clone(&bm),
            &shallow,
            &config,
            vec![("k".to_string(), "shallow".to_string())],
        )
        .unwrap();
        flush_memtable(
            Arc::clone(&bm),
            &deep,
            &config,
            vec![("k".to_string(), "deep".to_string())],
        )
        .unwrap();

        let retriever = Retriever::new(Arc::clone(&bm), layout, config);
        assert_eq!(retriever.get("k").unwrap(), Some("shallow".to_string()));
    }

    #[test]
    fn test_retriever_merges_prefix_across_tables() {
        let tmp = TempDir::new().unwrap();
        let bm = Arc::new(BlockManager::new(64, 0));
        let config = config(64);
        let layout = DataLayout::new(tmp.path().join("data"), 2);
        layout.ensure_dirs().unwrap();

        let old = layout.new_table_path(0);
        flush_memtable(
            Arc::clone(&bm),
            &old,
            &config,
            vec![
                ("user:1".to_string(), "stale".to_string()),
                ("user:2".to_string(), "b".to_string()),
            ],
        )
        .unwrap();

        let new = layout.new_table_path(0);
        flush_memtable(
            Arc::clone(&bm),
            &new,
            &config,
            vec![("user:1".to_string(), "fresh".to_string())],
        )
        .unwrap();

        let retriever = Retriever::new(Arc::clone(&bm), layout, config);
        let entries = retriever.prefix_entries("user:").unwrap();
        assert_eq!(
            entries,
            vec![
                ("user:1".to_string(), "fresh".to_string()),
                ("user:2".to_string(), "b".to_string()),
            ]
        );
    }

    #[test]
    fn test_corrupt_table_skipped_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let bm = Arc::new(BlockManager::new(64, 0));
        let config = config(64);
        let layout = DataLayout::new(tmp.path().join("data"), 2);
        layout.ensure_dirs().unwrap();

        let good = layout.new_table_path(0);
        flush_memtable(
            Arc::clone(&bm),
            &good,
            &config,
            vec![("k".to_string(), "v".to_string())],
        )
        .unwrap();

        // A garbage file that is block-aligned but meaningless.
        let junk = layout.new_table_path(0);
        std::fs::write(&junk, vec![0xABu8; 128]).unwrap();

        let retriever = Retriever::new(Arc::clone(&bm), layout, config);
        assert_eq!(retriever.get("k").unwrap(), Some("v".to_string()));
    }
}
