//! Test data generation for benchmarks: synthetic block payloads at a
//! handful of useful scales.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Scale factor for benchmark data generation.
#[derive(Clone, Copy, Debug)]
pub enum Scale {
    /// ~30 blocks, use for quick iteration.
    Tiny,
    /// ~100 blocks.
    Small,
    /// ~2,000 blocks.
    Medium,
    /// ~20,000 blocks.
    Large,
}

impl Scale {
    pub fn count(&self) -> usize {
        match self {
            Scale::Tiny => 30,
            Scale::Small => 100,
            Scale::Medium => 2_000,
            Scale::Large => 20_000,
        }
    }
}

/// Generate `count` pseudo-random `block_size`-byte blocks, deterministically
/// seeded so benchmark runs are reproducible across invocations.
pub fn generate_blocks(count: usize, block_size: usize) -> Vec<Vec<u8>> {
    let mut rng = StdRng::seed_from_u64(0x5_7A47A);
    (0..count)
        .map(|_| (0..block_size).map(|_| rng.gen()).collect())
        .collect()
}

/// Generate `count` blocks where every `dup_every`th block repeats the
/// previous one verbatim, simulating the duplicate content a real backup
/// would dedup away.
pub fn generate_blocks_with_duplicates(count: usize, block_size: usize, dup_every: usize) -> Vec<Vec<u8>> {
    let mut rng = StdRng::seed_from_u64(0x5_7A47A);
    let mut blocks: Vec<Vec<u8>> = Vec::with_capacity(count);
    for i in 0..count {
        if dup_every > 0 && i % dup_every != 0 && !blocks.is_empty() {
            blocks.push(blocks[blocks.len() - 1].clone());
        } else {
            blocks.push((0..block_size).map(|_| rng.gen()).collect());
        }
    }
    blocks
}
