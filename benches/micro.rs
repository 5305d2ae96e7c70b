//! Micro-benchmarks for the hot paths: point writes, point reads, and
//! the memtable-to-SSTable flush.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use stratadb::config::Config;
use stratadb::engine::Engine;
use tempfile::TempDir;

fn bench_config(tmp: &TempDir) -> Config {
    let mut config = Config::default();
    config.lsm_base_dir = tmp.path().join("data");
    config.memtable_size = 4 * 1024 * 1024;
    config.wal_buffer_size = 64;
    config.max_tokens = u64::MAX / 2;
    config.token_refill_rate = 1_000_000.0;
    config
}

fn bench_put(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let engine = Engine::open(bench_config(&tmp)).unwrap();
    engine.start().unwrap();

    let mut i = 0u64;
    c.bench_function("put_small", |b| {
        b.iter(|| {
            i += 1;
            engine
                .write("bench", &format!("key-{i:012}"), "value-payload", false)
                .unwrap();
        })
    });
    engine.shut().unwrap();
}

fn bench_get_memtable(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let engine = Engine::open(bench_config(&tmp)).unwrap();
    engine.start().unwrap();
    for i in 0..10_000u64 {
        engine
            .write("bench", &format!("key-{i:06}"), "value-payload", false)
            .unwrap();
    }

    let mut i = 0u64;
    c.bench_function("get_memtable_hit", |b| {
        b.iter(|| {
            i = (i + 7) % 10_000;
            black_box(engine.read("bench", &format!("key-{i:06}")).unwrap());
        })
    });
    engine.shut().unwrap();
}

fn bench_get_sstable(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let mut config = bench_config(&tmp);
    config.memtable_size = 64 * 1024;
    let engine = Engine::open(config).unwrap();
    engine.start().unwrap();
    for i in 0..10_000u64 {
        engine
            .write("bench", &format!("key-{i:06}"), "value-payload", false)
            .unwrap();
    }
    engine.sync().unwrap();

    let mut i = 0u64;
    c.bench_function("get_sstable_hit", |b| {
        b.iter(|| {
            i = (i + 7) % 10_000;
            black_box(engine.read("bench", &format!("key-{i:06}")).unwrap());
        })
    });
    engine.shut().unwrap();
}

criterion_group!(benches, bench_put, bench_get_memtable, bench_get_sstable);
criterion_main!(benches);
