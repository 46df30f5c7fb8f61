//! # Inbound Ports
//!
//! API trait defining what the Shard Scanner can do.

use super::outbound::ScanContext;
use crate::domain::{MasterBatch, ScanError, ScanReport, SeqnoRange, ShardKey, ShardSeqnoMap};
use async_trait::async_trait;

/// Shard Scanner API - inbound port.
#[async_trait]
pub trait ShardScanApi: Send + Sync {
    /// Seed the tracker from the shard heads of master block `seqno`.
    ///
    /// Returns the number of lanes tracked afterwards.
    async fn seed_from_master(&mut self, ctx: &ScanContext, seqno: u32)
        -> Result<usize, ScanError>;

    /// Scan one master block, retrying per policy, and commit it.
    async fn scan_master(&mut self, ctx: &ScanContext, seqno: u32)
        -> Result<MasterBatch, ScanError>;

    /// Seed from `range.start - 1` and scan every master block in the range.
    async fn scan_range(
        &mut self,
        ctx: &ScanContext,
        range: SeqnoRange,
    ) -> Result<ScanReport, ScanError>;

    /// Last committed seqno for a lane.
    fn tracked_seqno(&self, key: &ShardKey) -> Option<u32>;

    /// Current tracker state.
    fn tracker(&self) -> &ShardSeqnoMap;
}
