//! # Quantum-Chain Subsystem Benchmarks
//!
//! | Subsystem | Claim | Bench group |
//! |-----------|-------|-------------|
//! | qc-18 Shard Scanner | Gap fill linear in hole length | qc-18-gap-fill |
//! | qc-18 Shard Scanner | Pagination linear in transactions | qc-18-pagination |
//! | qc-18 Shard Scanner | Range scan cost per master | qc-18-range-scan |

use criterion::{criterion_group, criterion_main};
use qc_tests::benchmarks::qc_18_shard_scanner;

criterion_group!(benches, qc_18_shard_scanner::register_benchmarks);

criterion_main!(benches);
