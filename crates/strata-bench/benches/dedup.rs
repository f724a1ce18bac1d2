//! Dedup-index lookup and record throughput benchmarks, run against a
//! real sled-backed metadata store in a temporary directory.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use strata_bench::{generate_blocks_with_duplicates, Scale};
use strata_core::hash::checksum;
use strata_core::{MetadataStore, StoreConfig};
use strata_proto::BlockUid;
use tempfile::TempDir;

const BLOCK_SIZE: usize = 64 * 1024;
const STORAGE: &str = "bench";

fn open_store() -> (TempDir, MetadataStore) {
    let dir = TempDir::new().unwrap();
    let store = MetadataStore::open(StoreConfig::new(dir.path())).unwrap();
    (dir, store)
}

fn bench_record_dedup_entry(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedup/record");

    for scale in [Scale::Tiny, Scale::Small] {
        let blocks = generate_blocks_with_duplicates(scale.count(), BLOCK_SIZE, 4);
        group.bench_with_input(BenchmarkId::new("blocks", scale.count()), &blocks, |b, blocks| {
            b.iter(|| {
                let (_dir, store) = open_store();
                for (i, block) in blocks.iter().enumerate() {
                    let sum = checksum(block);
                    let uid = BlockUid::for_block(1, i as u64);
                    store.record_dedup_entry(&sum, STORAGE, uid).unwrap();
                }
                black_box(&store);
            });
        });
    }

    group.finish();
}

fn bench_find_duplicate(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedup/find");

    for scale in [Scale::Tiny, Scale::Small, Scale::Medium] {
        let blocks = generate_blocks_with_duplicates(scale.count(), BLOCK_SIZE, 4);
        let (_dir, store) = open_store();
        for (i, block) in blocks.iter().enumerate() {
            let sum = checksum(block);
            let uid = BlockUid::for_block(1, i as u64);
            store.record_dedup_entry(&sum, STORAGE, uid).unwrap();
        }
        let sums: Vec<String> = blocks.iter().map(|b| checksum(b)).collect();

        group.bench_with_input(BenchmarkId::new("blocks", scale.count()), &sums, |b, sums| {
            b.iter(|| {
                for sum in sums {
                    black_box(store.find_duplicate(sum, STORAGE).unwrap());
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_record_dedup_entry, bench_find_duplicate);
criterion_main!(benches);
