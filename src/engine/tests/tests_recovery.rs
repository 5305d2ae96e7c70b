#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::engine::Engine;
    use tempfile::TempDir;

    fn config(tmp: &TempDir) -> Config {
        let mut config = Config::default();
        config.lsm_base_dir = tmp.path().join("data");
        config.block_size = 4096;
        config.memtable_size = 256;
        config.memtable_count = 2;
        config.wal_buffer_size = 1; // every record durable immediately
        config.bloom_filter_expected_elements = 100;
        config
    }

    #[test]
    fn test_clean_shutdown_recovers_everything() {
        let tmp = TempDir::new().unwrap();
        {
            let engine = Engine::open(config(&tmp)).unwrap();
            engine.start().unwrap();
            for i in 0..50 {
                engine
                    .write("u", &format!("key-{i:02}"), &format!("value-{i}"), false)
                    .unwrap();
            }
            engine.write("u", "key-07", "rewritten", false).unwrap();
            engine.shut().unwrap();
        }

        let engine = Engine::open(config(&tmp)).unwrap();
        engine.start().unwrap();
        for i in 0..50 {
            let expected = if i == 7 {
                "rewritten".to_string()
            } else {
                format!("value-{i}")
            };
            assert_eq!(
                engine.read("u", &format!("key-{i:02}")).unwrap(),
                Some(expected),
                "key-{i:02} after restart"
            );
        }
        engine.shut().unwrap();
    }

    #[test]
    fn test_crash_recovers_flushed_wal_records() {
        let tmp = TempDir::new().unwrap();
        {
            let engine = Engine::open(config(&tmp)).unwrap();
            engine.start().unwrap();
            engine.write("u", "a", "1", false).unwrap();
            engine.write("u", "b", "2", false).unwrap();
            engine.sync().unwrap();
            // No shut: the engine "crashes" with data only in the WAL.
        }

        let engine = Engine::open(config(&tmp)).unwrap();
        engine.start().unwrap();
        assert_eq!(engine.read("u", "a").unwrap(), Some("1".to_string()));
        assert_eq!(engine.read("u", "b").unwrap(), Some("2".to_string()));
        engine.shut().unwrap();
    }

    #[test]
    fn test_jumbo_value_survives_restart() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = config(&tmp);
        cfg.block_size = 64;
        cfg.wal_segment_size = 64 * 16;

        let big_value = "v".repeat(256);
        {
            let engine = Engine::open(cfg.clone()).unwrap();
            engine.start().unwrap();
            engine.write("u", "big", &big_value, false).unwrap();
        }

        let engine = Engine::open(cfg).unwrap();
        engine.start().unwrap();
        assert_eq!(engine.read("u", "big").unwrap(), Some(big_value));
        engine.shut().unwrap();
    }

    #[test]
    fn test_deletes_survive_restart() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(&tmp);
        let tombstone = cfg.tombstone.clone();
        {
            let engine = Engine::open(cfg.clone()).unwrap();
            engine.start().unwrap();
            engine.write("u", "doomed", "here", false).unwrap();
            engine.write("u", "doomed", &tombstone, false).unwrap();
            engine.write("u", "kept", "v", false).unwrap();
        }

        let engine = Engine::open(cfg).unwrap();
        engine.start().unwrap();
        assert_eq!(engine.read("u", "doomed").unwrap(), None);
        assert_eq!(engine.read("u", "kept").unwrap(), Some("v".to_string()));
        engine.shut().unwrap();
    }

    #[test]
    fn test_replay_spanning_multiple_memtables() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = config(&tmp);
        cfg.memtable_size = 64;
        cfg.memtable_count = 4;

        {
            let engine = Engine::open(cfg.clone()).unwrap();
            engine.start().unwrap();
            // Enough data to displace a couple of memtables, then
            // crash before anything is guaranteed flushed.
            for i in 0..20 {
                engine
                    .write("u", &format!("key-{i:02}"), "0123456789", false)
                    .unwrap();
            }
        }

        let engine = Engine::open(cfg).unwrap();
        engine.start().unwrap();
        engine.sync().unwrap();
        for i in 0..20 {
            assert_eq!(
                engine.read("u", &format!("key-{i:02}")).unwrap(),
                Some("0123456789".to_string()),
                "key-{i:02} lost in replay"
            );
        }
        engine.shut().unwrap();
    }

    #[test]
    fn test_restart_after_restart() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(&tmp);

        for round in 0..3 {
            let engine = Engine::open(cfg.clone()).unwrap();
            engine.start().unwrap();
            engine
                .write("u", &format!("round-{round}"), "done", false)
                .unwrap();
            // Every earlier round's marker is still visible.
            for earlier in 0..=round {
                assert_eq!(
                    engine.read("u", &format!("round-{earlier}")).unwrap(),
                    Some("done".to_string())
                );
            }
            engine.shut().unwrap();
        }
    }
}
