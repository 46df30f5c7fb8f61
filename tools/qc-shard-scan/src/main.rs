//! QC-Shard-Scan: master-range transaction scanner
//!
//! Walks master blocks `[start, end)` and logs every shard block and
//! transaction they commit, following shard splits and merges.

mod config;
mod demo;
mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use qc_18_shard_scanner::{
    BlockDataProvider, ChainFixture, InMemoryChain, MasterBatch, ScanContext, ScanError,
    SeqnoRange, ShardScanApi, ShardScanService, StickyProvider,
};

/// QC-Shard-Scan: gap-free transaction scan across shard splits and merges
#[derive(Parser, Debug)]
#[command(name = "qc-shard-scan")]
#[command(about = "Scan a master seqno range and list every shard transaction")]
struct Args {
    /// First master seqno to scan
    #[arg(short, long, default_value = "4230350")]
    start: u32,

    /// Master seqno to stop before
    #[arg(short, long, default_value = "4230700")]
    end: u32,

    /// Transaction ids per page (env: QC_SCAN_PAGE_SIZE)
    #[arg(short, long)]
    page_size: Option<u32>,

    /// Replays per master after connectivity errors (env: QC_SCAN_MAX_RETRIES)
    #[arg(long)]
    max_retries: Option<u32>,

    /// Transactions resolved concurrently within a page
    #[arg(long)]
    resolve_concurrency: Option<usize>,

    /// Deadline for one backend call in ms (env: QC_SCAN_CALL_TIMEOUT_MS)
    #[arg(long)]
    call_timeout_ms: Option<u64>,

    /// Load the chain from a JSON fixture instead of the built-in demo chain
    #[arg(long)]
    fixture: Option<PathBuf>,

    /// Write the demo chain for the range to this file and exit
    #[arg(long)]
    dump_fixture: Option<PathBuf>,

    /// Number of interchangeable backends serving the chain
    #[arg(long, default_value = "2")]
    backends: usize,

    /// Take the first backend down after this master seqno (failover demo)
    #[arg(long)]
    kill_primary_at: Option<u32>,

    /// Log shard blocks only, not individual transactions
    #[arg(long)]
    blocks_only: bool,

    /// Print the scan report as JSON when done
    #[arg(long)]
    report_json: bool,

    /// JSON log output (env: QC_JSON_LOGS)
    #[arg(long)]
    json_logs: bool,
}

fn load_fixture(args: &Args) -> Result<ChainFixture> {
    match &args.fixture {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read fixture {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse fixture {}", path.display()))
        }
        None => demo::demo_chain(args.start, args.end),
    }
}

fn log_batch(batch: &MasterBatch, blocks_only: bool) {
    if blocks_only {
        return;
    }
    for (i, tx) in batch.transactions().enumerate() {
        info!("{} {}", i, tx);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    telemetry::init_logging(args.json_logs)?;

    if let Some(path) = &args.dump_fixture {
        let fixture = demo::demo_chain(args.start, args.end)?;
        let json = serde_json::to_string_pretty(&fixture)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write fixture {}", path.display()))?;
        info!("Demo chain written to {}", path.display());
        return Ok(());
    }

    let scan_config = config::load_config(&config::Overrides {
        page_size: args.page_size,
        max_retries: args.max_retries,
        resolve_concurrency: args.resolve_concurrency,
        call_timeout_ms: args.call_timeout_ms,
    })?;

    let fixture = load_fixture(&args)?;
    let backends: Vec<Arc<InMemoryChain>> = (0..args.backends.max(1))
        .map(|i| Arc::new(InMemoryChain::from_fixture(format!("backend-{i}"), fixture.clone())))
        .collect();
    let primary = Arc::clone(&backends[0]);
    let provider = StickyProvider::new(backends)?;

    let mut service = ShardScanService::new(scan_config, provider)?;

    let (ctx, cancel) = ScanContext::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling scan");
            cancel.cancel();
        }
    });

    let range = SeqnoRange::new(args.start, args.end);
    let kill_at = args.kill_primary_at;
    let blocks_only = args.blocks_only;

    let result = service
        .scan_range_with(&ctx, range, |batch| {
            log_batch(batch, blocks_only);
            if kill_at == Some(batch.master.seqno) {
                warn!("Taking {} down", primary.backend_id());
                primary.set_unavailable(true);
            }
        })
        .await;

    match result {
        Ok(report) => {
            if args.report_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Ok(())
        }
        Err(ScanError::Cancelled) => {
            warn!("Scan cancelled; tracked lanes: {:?}", service_lanes(&service));
            Ok(())
        }
        Err(err) => Err(err)
            .with_context(|| format!("scan of {}..{} failed", args.start, args.end)),
    }
}

fn service_lanes(service: &ShardScanService<StickyProvider<InMemoryChain>>) -> Vec<String> {
    service
        .tracker()
        .entries()
        .into_iter()
        .map(|(key, seqno)| format!("{key}@{seqno}"))
        .collect()
}
