//! Backup engine benchmark suite.
//!
//! # Benchmark categories
//!
//! - **Hash**: block checksumming and sparse-block detection
//! - **Dedup**: dedup-index lookup/record-entry throughput under the
//!   metadata store
//! - **Filter**: filter-expression parse, compile, and evaluation

pub mod fixtures;

pub use fixtures::{generate_blocks, generate_blocks_with_duplicates, Scale};
