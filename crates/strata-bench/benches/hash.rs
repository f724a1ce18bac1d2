//! Block checksumming and sparse-detection benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use strata_bench::{generate_blocks, Scale};
use strata_core::hash::{checksum, is_sparse};

const BLOCK_SIZE: usize = 4 * 1024 * 1024;

fn bench_checksum(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash/checksum");

    for scale in [Scale::Tiny, Scale::Small, Scale::Medium] {
        let blocks = generate_blocks(scale.count(), BLOCK_SIZE);
        group.bench_with_input(BenchmarkId::new("blocks", scale.count()), &blocks, |b, blocks| {
            b.iter(|| {
                for block in blocks {
                    black_box(checksum(block));
                }
            });
        });
    }

    group.finish();
}

fn bench_is_sparse(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash/is_sparse");

    let zeroed = vec![0u8; BLOCK_SIZE];
    group.bench_function("all_zero", |b| {
        b.iter(|| black_box(is_sparse(&zeroed)));
    });

    let random = generate_blocks(1, BLOCK_SIZE).remove(0);
    group.bench_function("random", |b| {
        b.iter(|| black_box(is_sparse(&random)));
    });

    group.finish();
}

criterion_group!(benches, bench_checksum, bench_is_sparse);
criterion_main!(benches);
