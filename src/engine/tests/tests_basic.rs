#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::engine::{Engine, EngineError};
    use tempfile::TempDir;

    fn config(tmp: &TempDir) -> Config {
        let mut config = Config::default();
        config.lsm_base_dir = tmp.path().join("data");
        config.block_size = 4096;
        config.memtable_size = 64;
        config.memtable_count = 2;
        config.wal_buffer_size = 4;
        config.bloom_filter_expected_elements = 100;
        config
    }

    fn open(tmp: &TempDir) -> Engine {
        let engine = Engine::open(config(tmp)).unwrap();
        engine.start().unwrap();
        engine
    }

    #[test]
    fn test_put_then_get() {
        let tmp = TempDir::new().unwrap();
        let engine = open(&tmp);

        engine.write("u", "a", "1", false).unwrap();
        engine.write("u", "b", "2", false).unwrap();

        assert_eq!(engine.read("u", "a").unwrap(), Some("1".to_string()));
        assert_eq!(engine.read("u", "b").unwrap(), Some("2".to_string()));
        assert_eq!(engine.read("u", "c").unwrap(), None);
        engine.shut().unwrap();
    }

    #[test]
    fn test_read_your_write_across_flush() {
        let tmp = TempDir::new().unwrap();
        let engine = open(&tmp);

        // 64-byte memtables fill fast; these writes span several
        // flushes.
        for i in 0..40 {
            engine
                .write("u", &format!("key-{i:02}"), &format!("value-{i}"), false)
                .unwrap();
        }
        engine.sync().unwrap();

        for i in 0..40 {
            assert_eq!(
                engine.read("u", &format!("key-{i:02}")).unwrap(),
                Some(format!("value-{i}")),
                "key-{i:02}"
            );
        }
        engine.shut().unwrap();
    }

    #[test]
    fn test_overwrite_returns_latest() {
        let tmp = TempDir::new().unwrap();
        let engine = open(&tmp);

        engine.write("u", "k", "first", false).unwrap();
        engine.write("u", "k", "second", false).unwrap();
        assert_eq!(engine.read("u", "k").unwrap(), Some("second".to_string()));
        engine.shut().unwrap();
    }

    #[test]
    fn test_delete_shadows_in_memtable() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(&tmp);
        let tombstone = cfg.tombstone.clone();
        let engine = Engine::open(cfg).unwrap();
        engine.start().unwrap();

        engine.write("u", "k", "hello", false).unwrap();
        engine.write("u", "k", &tombstone, false).unwrap();
        assert_eq!(engine.read("u", "k").unwrap(), None);
        engine.shut().unwrap();
    }

    #[test]
    fn test_delete_shadows_after_flush() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(&tmp);
        let tombstone = cfg.tombstone.clone();
        let engine = Engine::open(cfg).unwrap();
        engine.start().unwrap();

        engine.write("u", "k", "hello", false).unwrap();
        engine.write("u", "k", &tombstone, false).unwrap();

        // Push the tombstone through a flush with unrelated traffic.
        for i in 0..100 {
            engine
                .write("u", &format!("filler-{i:03}"), "x", false)
                .unwrap();
        }
        engine.sync().unwrap();

        assert_eq!(engine.read("u", "k").unwrap(), None);
        engine.shut().unwrap();
    }

    #[test]
    fn test_empty_string_value_is_not_absence() {
        let tmp = TempDir::new().unwrap();
        let engine = open(&tmp);

        engine.write("u", "k", "", false).unwrap();
        assert_eq!(engine.read("u", "k").unwrap(), Some(String::new()));
        engine.shut().unwrap();
    }

    #[test]
    fn test_admission_denied_without_mutating() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = config(&tmp);
        cfg.max_tokens = 2;
        cfg.token_refill_rate = 0.001;
        let engine = Engine::open(cfg).unwrap();
        engine.start().unwrap();

        engine.write("miser", "a", "1", false).unwrap();
        engine.write("miser", "b", "2", false).unwrap();
        let err = engine.write("miser", "c", "3", false).unwrap_err();
        assert!(matches!(err, EngineError::Admission(_)));

        // A different user still has tokens, and the denied write
        // left no trace.
        assert_eq!(engine.read("fresh", "c").unwrap(), None);
        assert_eq!(engine.read("fresh", "a").unwrap(), Some("1".to_string()));
        engine.shut().unwrap();
    }

    #[test]
    fn test_stats_reflect_state() {
        let tmp = TempDir::new().unwrap();
        let engine = open(&tmp);

        for i in 0..40 {
            engine
                .write("u", &format!("key-{i:02}"), "some-value", false)
                .unwrap();
        }
        engine.sync().unwrap();

        let stats = engine.stats().unwrap();
        assert_eq!(stats.memtable_sizes.len(), 2);
        assert!(stats.tables_per_level.iter().sum::<usize>() >= 1);
        assert!(stats.total_table_bytes > 0);
        engine.shut().unwrap();
    }
}
