//! # QC-18 Shard Scanner
//!
//! Gap-free transaction stream over a sharded chain's master range.
//!
//! **Subsystem ID:** 18
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//! **Status:** Production-Ready
//!
//! ## Purpose
//!
//! Walk the master chain block by block and emit every shard block it
//! commits, together with all of that block's transactions:
//! - Shard heads only name the newest block per lane; the blocks in between
//!   are recovered by walking parent links back to already-seen territory
//! - Splits and merges are followed through the parent links, so a merged
//!   lane traces through both former lanes
//! - Transactions are paged with a cursor and resolved one by one
//!
//! ## Guarantees
//!
//! | Property | Description |
//! |----------|-------------|
//! | Parents first | A block is never emitted before its parents |
//! | No duplicates | A block reachable from two heads is emitted once |
//! | Monotone tracker | A lane's tracked seqno never moves backwards |
//! | Atomic iterations | Failed or cancelled masters leave the tracker untouched |
//!
//! ## Module Structure
//!
//! ```text
//! qc-18-shard-scanner/
//! ├── domain/          # ShardKey, BlockRef, ShardSeqnoMap, errors, invariants
//! ├── algorithms/      # Gap filler, master walker, paginator, retry
//! ├── ports/           # API trait (inbound) + BlockDataProvider (outbound)
//! ├── adapters/        # InMemoryChain, StickyProvider
//! ├── application/     # ShardScanService orchestrating everything
//! └── config.rs        # ScanConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::{
    CallStats, ChainBuilder, ChainFixture, InMemoryChain, MasterEntry, ShardBlockEntry,
    StickyProvider,
};
pub use algorithms::{
    backoff_delay, retry_iteration, should_retry, AncestorGapFiller, MasterChainWalker,
    Retried, TransactionPaginator,
};
pub use application::ShardScanService;
pub use config::{RetryPolicy, ScanConfig};
pub use domain::{
    Hash, ScanError,
    ShardKey, BlockRef, AccountId, TransactionId, TransactionPage, Transaction, SeqnoRange,
    ShardSeqnoMap, GapFillResult, HeadUpdate, IterationPlan, BlockTransactions, MasterBatch,
    ScanReport,
    MASTERCHAIN_ID, SHARD_FULL, DEFAULT_PAGE_SIZE, DEFAULT_MAX_WALK_BLOCKS, DEFAULT_MAX_ATTEMPTS,
    invariant_monotonic, invariant_no_duplicates, invariant_parents_first,
    invariant_lane_continuity,
};
pub use ports::{BlockDataProvider, CancelHandle, ScanContext, ShardScanApi};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
