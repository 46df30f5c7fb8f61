//! # QC-18 Shard Scanner Benchmarks
//!
//! Claims to validate:
//! - Gap filling is linear in the hole length
//! - Pagination cost is linear in the block's transaction count
//! - A full range scan stays cheap per master block
//!
//! All providers are in-memory, so these measure scanner overhead only.

use criterion::{black_box, BenchmarkId, Criterion, Throughput};
use qc_18_shard_scanner::{
    AncestorGapFiller, BlockRef, ChainBuilder, InMemoryChain, ScanConfig, ScanContext,
    SeqnoRange, ShardKey, ShardScanService, ShardSeqnoMap, TransactionPaginator,
};
use std::collections::HashSet;
use std::time::Duration;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("tokio runtime")
}

/// One lane whose second master commits `hole` blocks at once.
fn hole_chain(hole: u32) -> (InMemoryChain, ShardSeqnoMap, BlockRef) {
    let lane = ShardKey::full(0);
    let mut builder = ChainBuilder::new(1);
    builder.transactions_per_block(0);
    let base = builder.open_lane(lane, 1).expect("open lane");
    builder.seal_master();
    let head = builder.advance(lane, hole).expect("advance");
    builder.seal_master();

    let mut tracker = ShardSeqnoMap::new();
    tracker.seed([&base]);
    (builder.build("bench"), tracker, head)
}

/// One lane whose tip block carries `count` transactions.
fn dense_block(count: u32) -> (InMemoryChain, BlockRef) {
    let lane = ShardKey::full(0);
    let mut builder = ChainBuilder::new(1);
    builder.transactions_per_block(count);
    builder.open_lane(lane, 1).expect("open lane");
    builder.seal_master();
    let tip = builder.advance(lane, 1).expect("advance");
    builder.seal_master();
    (builder.build("bench"), tip)
}

/// Two workchains over `masters` master blocks with one split and one merge.
fn range_chain(masters: u32) -> InMemoryChain {
    let wc0 = ShardKey::full(0);
    let wc1 = ShardKey::full(1);
    let mut builder = ChainBuilder::new(1);
    builder.transactions_per_block(3);
    builder.open_lane(wc0, 1).expect("open lane");
    builder.open_lane(wc1, 1).expect("open lane");
    builder.seal_master();

    for i in 1..masters {
        if i == masters / 3 {
            builder.split(wc0).expect("split");
        } else if i == 2 * masters / 3 {
            if let Some((left, right)) = wc0.split() {
                builder.merge(left, right).expect("merge");
            }
        } else {
            for lane in builder.lanes() {
                builder.advance(lane, 1 + i % 2).expect("advance");
            }
        }
        builder.seal_master();
    }
    builder.build("bench")
}

pub fn gap_fill_long_hole(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-18-gap-fill");
    group.measurement_time(Duration::from_secs(10));
    let rt = runtime();
    let ctx = ScanContext::background();
    let filler = AncestorGapFiller::new(usize::MAX);

    for hole in [10u32, 100, 1_000] {
        let (chain, tracker, head) = hole_chain(hole);
        group.throughput(Throughput::Elements(hole as u64));
        group.bench_with_input(BenchmarkId::new("hole", hole), &head, |b, head| {
            b.iter(|| {
                let result = rt
                    .block_on(filler.fill(&ctx, &chain, &tracker, head, &HashSet::new()))
                    .expect("fill");
                black_box(result.len())
            })
        });
    }

    group.finish();
}

pub fn paginate_dense_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-18-pagination");
    group.measurement_time(Duration::from_secs(10));
    let rt = runtime();
    let ctx = ScanContext::background();

    for count in [100u32, 1_000, 5_000] {
        let (chain, block) = dense_block(count);
        group.throughput(Throughput::Elements(count as u64));
        for page_size in [16u32, 256] {
            let paginator = TransactionPaginator::new(page_size, 1);
            group.bench_with_input(
                BenchmarkId::new(format!("page_{page_size}"), count),
                &block,
                |b, block| {
                    b.iter(|| {
                        let txs = rt
                            .block_on(paginator.collect(&ctx, &chain, block))
                            .expect("collect");
                        black_box(txs.transactions.len())
                    })
                },
            );
        }
    }

    group.finish();
}

pub fn scan_full_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-18-range-scan");
    group.measurement_time(Duration::from_secs(15));
    let rt = runtime();
    let ctx = ScanContext::background();

    for masters in [30u32, 150] {
        let fixture = range_chain(masters).fixture();
        group.throughput(Throughput::Elements(masters as u64));
        group.bench_with_input(BenchmarkId::new("masters", masters), &fixture, |b, fixture| {
            b.iter(|| {
                let mut service = ShardScanService::new(
                    ScanConfig::for_testing(),
                    InMemoryChain::from_fixture("bench", fixture.clone()),
                )
                .expect("service");
                let report = rt
                    .block_on(service.scan_range_with(
                        &ctx,
                        SeqnoRange::new(2, masters + 1),
                        |batch| {
                            black_box(batch.transaction_count());
                        },
                    ))
                    .expect("scan");
                black_box(report.shard_blocks)
            })
        });
    }

    group.finish();
}

pub fn register_benchmarks(c: &mut Criterion) {
    gap_fill_long_hole(c);
    paginate_dense_block(c);
    scan_full_range(c);
}
