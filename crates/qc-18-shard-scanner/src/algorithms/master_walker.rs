//! # Master Chain Walker
//!
//! Turns one master block into the ordered list of shard blocks it newly
//! commits, and owns the tracker those lists are computed against.
//!
//! Planning only reads the tracker. Head updates are staged in the plan and
//! applied by [`MasterChainWalker::commit`] once the caller has finished
//! every block of the iteration, so a replayed iteration sees the same
//! tracker state as the failed one.

use super::gap_filler::AncestorGapFiller;
use crate::config::ScanConfig;
use crate::domain::{
    invariant_monotonic, invariant_no_duplicates, BlockRef, HeadUpdate, IterationPlan,
    ScanError, ShardKey, ShardSeqnoMap,
};
use crate::ports::outbound::{BlockDataProvider, ScanContext};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Per-master iteration planner and tracker owner.
#[derive(Clone, Debug)]
pub struct MasterChainWalker {
    master: ShardKey,
    tracker: ShardSeqnoMap,
    gap_filler: AncestorGapFiller,
    dedup: bool,
}

impl MasterChainWalker {
    /// Create a walker with an empty tracker.
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            master: config.master,
            tracker: ShardSeqnoMap::new(),
            gap_filler: AncestorGapFiller::new(config.max_walk_blocks),
            dedup: config.dedup_within_iteration,
        }
    }

    /// Master chain lane being walked.
    pub fn master(&self) -> ShardKey {
        self.master
    }

    /// Current tracker state.
    pub fn tracker(&self) -> &ShardSeqnoMap {
        &self.tracker
    }

    /// Resolve a master block and the shard heads it declares.
    pub async fn master_heads<P: BlockDataProvider + ?Sized>(
        &self,
        ctx: &ScanContext,
        provider: &P,
        seqno: u32,
    ) -> Result<(BlockRef, Vec<BlockRef>), ScanError> {
        let master = ctx
            .guard(provider.lookup_block(ctx, self.master.workchain, self.master.shard, seqno))
            .await?;
        let heads = ctx.guard(provider.get_block_shard_heads(ctx, &master)).await?;
        Ok((master, heads))
    }

    /// Record `heads` as the baseline; returns the number of tracked lanes.
    ///
    /// Lanes already tracked past a head keep their seqno, so seeding from an
    /// earlier master never re-opens committed blocks.
    pub fn seed(&mut self, heads: &[BlockRef]) -> usize {
        for head in heads {
            let key = head.shard_key();
            match invariant_monotonic(&key, self.tracker.get(&key), head.seqno) {
                Ok(()) => self.tracker.set(key, head.seqno),
                Err(err) => warn!("[qc-18] Keeping tracked seqno over seed: {}", err),
            }
        }
        debug!("[qc-18] Tracker seeded: {:?}", self.tracker.entries());
        self.tracker.len()
    }

    /// Compute the blocks master `seqno` newly commits.
    pub async fn plan<P: BlockDataProvider + ?Sized>(
        &self,
        ctx: &ScanContext,
        provider: &P,
        seqno: u32,
    ) -> Result<IterationPlan, ScanError> {
        info!("[qc-18] Scanning master block {}...", seqno);

        let (master, heads) = self.master_heads(ctx, provider, seqno).await?;

        let mut included: HashSet<BlockRef> = HashSet::new();
        let mut blocks = Vec::new();
        let mut updates = Vec::with_capacity(heads.len());

        for head in &heads {
            let fill = self
                .gap_filler
                .fill(ctx, provider, &self.tracker, head, &included)
                .await?;
            if self.dedup {
                included.extend(fill.blocks.iter().copied());
            }
            blocks.extend(fill.blocks);
            updates.push(HeadUpdate {
                key: head.shard_key(),
                seqno: head.seqno,
            });
        }

        if self.dedup {
            invariant_no_duplicates(&blocks)?;
        }

        debug!(
            "[qc-18] Master {} declares {} head(s), {} new shard block(s)",
            seqno,
            heads.len(),
            blocks.len()
        );

        Ok(IterationPlan {
            master,
            heads,
            blocks,
            updates,
        })
    }

    /// Apply the staged head updates of a fully processed plan.
    ///
    /// Updates that would move a lane backwards are skipped. Returns the
    /// number of updates applied.
    pub fn commit(&mut self, plan: &IterationPlan) -> usize {
        let mut applied = 0;
        for update in &plan.updates {
            let previous = self.tracker.get(&update.key);
            match invariant_monotonic(&update.key, previous, update.seqno) {
                Ok(()) => {
                    self.tracker.set(update.key, update.seqno);
                    applied += 1;
                }
                Err(err) => warn!("[qc-18] Skipping tracker update: {}", err),
            }
        }
        applied
    }
}
