//! # Domain Entities
//!
//! Core entities for the Shard Scanner: the session-scoped seqno tracker and
//! the results each stage hands to the next.

use super::value_objects::{BlockRef, ShardKey, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Last-seen seqno per shard lane.
///
/// Owned by one scan session. Reads are free for everyone; writes go through
/// the walker's commit step only, which keeps every entry monotone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShardSeqnoMap {
    seqnos: HashMap<ShardKey, u32>,
}

impl ShardSeqnoMap {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last seen seqno for a lane.
    pub fn get(&self, key: &ShardKey) -> Option<u32> {
        self.seqnos.get(key).copied()
    }

    /// Overwrite the seqno for a lane.
    pub(crate) fn set(&mut self, key: ShardKey, seqno: u32) {
        self.seqnos.insert(key, seqno);
    }

    /// Establish the baseline from the heads of the master block preceding
    /// the scan range.
    pub fn seed<'a>(&mut self, heads: impl IntoIterator<Item = &'a BlockRef>) {
        for head in heads {
            self.seqnos.insert(head.shard_key(), head.seqno);
        }
    }

    /// Is `block` at or behind the last seqno recorded for its lane?
    pub fn has_seen(&self, block: &BlockRef) -> bool {
        self.get(&block.shard_key())
            .is_some_and(|seen| block.seqno <= seen)
    }

    /// Number of tracked lanes.
    pub fn len(&self) -> usize {
        self.seqnos.len()
    }

    /// Is nothing tracked yet?
    pub fn is_empty(&self) -> bool {
        self.seqnos.is_empty()
    }

    /// Tracked lanes in key order.
    pub fn entries(&self) -> Vec<(ShardKey, u32)> {
        let mut entries: Vec<_> = self.seqnos.iter().map(|(k, v)| (*k, *v)).collect();
        entries.sort();
        entries
    }
}

/// Unseen blocks on one shard head's ancestor path, oldest first, the head
/// itself last.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GapFillResult {
    /// Blocks in causal order.
    pub blocks: Vec<BlockRef>,
}

impl GapFillResult {
    /// Nothing to process for this head.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of blocks discovered.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Was the head already processed?
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The requested head, if it was unseen.
    pub fn head(&self) -> Option<&BlockRef> {
        self.blocks.last()
    }
}

/// Tracker write staged by the walker until its iteration succeeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeadUpdate {
    /// Lane of the shard head.
    pub key: ShardKey,
    /// Seqno of the shard head.
    pub seqno: u32,
}

/// Everything one master iteration has to process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IterationPlan {
    /// Master block being processed.
    pub master: BlockRef,
    /// Shard heads declared by the master block.
    pub heads: Vec<BlockRef>,
    /// Blocks to process, per-head gap fills concatenated in declaration order.
    pub blocks: Vec<BlockRef>,
    /// Tracker updates to commit once the iteration is fully processed.
    pub updates: Vec<HeadUpdate>,
}

/// Transactions of one shard block, in page cursor order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTransactions {
    /// The shard block.
    pub block: BlockRef,
    /// Its transactions.
    pub transactions: Vec<Transaction>,
    /// Page requests it took.
    pub pages: u32,
}

/// Output of one committed master iteration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterBatch {
    /// Master block.
    pub master: BlockRef,
    /// Shard blocks and their transactions, oldest ancestor first per head.
    pub blocks: Vec<BlockTransactions>,
}

impl MasterBatch {
    /// Total transactions in the batch.
    pub fn transaction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.transactions.len()).sum()
    }

    /// All transactions in emission order.
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.blocks.iter().flat_map(|b| b.transactions.iter())
    }
}

/// Summary of a range scan.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Master blocks committed.
    pub masters_scanned: u32,
    /// Shard blocks processed.
    pub shard_blocks: u64,
    /// Transactions emitted.
    pub transactions: u64,
    /// Iterations replayed after retryable errors.
    pub retries: u32,
    /// Last committed master seqno.
    pub last_seqno: Option<u32>,
    /// Wall time in milliseconds.
    pub duration_ms: u64,
}

impl ScanReport {
    /// Fold a committed batch into the report.
    pub fn record(&mut self, batch: &MasterBatch) {
        self.masters_scanned += 1;
        self.shard_blocks += batch.blocks.len() as u64;
        self.transactions += batch.transaction_count() as u64;
        self.last_seqno = Some(batch.master.seqno);
    }
}
