//! # Sticky Provider
//!
//! Binds a scan to one backend out of several equivalent ones. Every call
//! goes to the bound backend; when it reports `Unavailable` the session
//! rebinds to the next backend and the error is still returned, so the
//! caller replays its iteration entirely against the new backend instead of
//! mixing answers from two.

use crate::domain::{AccountId, BlockRef, ScanError, Transaction, TransactionId, TransactionPage};
use crate::ports::outbound::{BlockDataProvider, ScanContext};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Session-sticky wrapper over interchangeable backends.
pub struct StickyProvider<P: BlockDataProvider> {
    backends: Vec<Arc<P>>,
    bound: AtomicUsize,
    rebinds: AtomicU64,
}

impl<P: BlockDataProvider> StickyProvider<P> {
    /// Bind to the first backend.
    pub fn new(backends: Vec<Arc<P>>) -> Result<Self, ScanError> {
        if backends.is_empty() {
            return Err(ScanError::NoBackends);
        }
        Ok(Self {
            backends,
            bound: AtomicUsize::new(0),
            rebinds: AtomicU64::new(0),
        })
    }

    /// Index of the backend calls currently go to.
    pub fn bound_index(&self) -> usize {
        self.bound.load(Ordering::SeqCst)
    }

    /// The backend calls currently go to.
    pub fn bound(&self) -> &Arc<P> {
        &self.backends[self.bound_index()]
    }

    /// Number of configured backends.
    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    /// Times the session moved to another backend.
    pub fn rebinds(&self) -> u64 {
        self.rebinds.load(Ordering::SeqCst)
    }

    fn observe<T>(&self, index: usize, result: Result<T, ScanError>) -> Result<T, ScanError> {
        match &result {
            Err(ScanError::Unavailable(reason)) => self.rebind_from(index, reason),
            Err(ScanError::Timeout(reason)) => self.rebind_from(index, reason),
            _ => {}
        }
        result
    }

    fn rebind_from(&self, index: usize, reason: &str) {
        let next = (index + 1) % self.backends.len();
        // Only the first failure seen on `index` moves the session.
        if next != index
            && self
                .bound
                .compare_exchange(index, next, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            self.rebinds.fetch_add(1, Ordering::SeqCst);
            warn!(
                "[qc-18] Backend {} unavailable ({}); rebinding to {}",
                self.backends[index].backend_id(),
                reason,
                self.backends[next].backend_id()
            );
        }
    }
}

#[async_trait]
impl<P: BlockDataProvider> BlockDataProvider for StickyProvider<P> {
    async fn lookup_block(
        &self,
        ctx: &ScanContext,
        workchain: i32,
        shard: u64,
        seqno: u32,
    ) -> Result<BlockRef, ScanError> {
        let index = self.bound_index();
        let result = self.backends[index]
            .lookup_block(ctx, workchain, shard, seqno)
            .await;
        self.observe(index, result)
    }

    async fn get_block_shard_heads(
        &self,
        ctx: &ScanContext,
        master: &BlockRef,
    ) -> Result<Vec<BlockRef>, ScanError> {
        let index = self.bound_index();
        let result = self.backends[index].get_block_shard_heads(ctx, master).await;
        self.observe(index, result)
    }

    async fn get_parent_blocks(
        &self,
        ctx: &ScanContext,
        block: &BlockRef,
    ) -> Result<Vec<BlockRef>, ScanError> {
        let index = self.bound_index();
        let result = self.backends[index].get_parent_blocks(ctx, block).await;
        self.observe(index, result)
    }

    async fn get_block_transactions(
        &self,
        ctx: &ScanContext,
        block: &BlockRef,
        page_size: u32,
        after: Option<&TransactionId>,
    ) -> Result<TransactionPage, ScanError> {
        let index = self.bound_index();
        let result = self.backends[index]
            .get_block_transactions(ctx, block, page_size, after)
            .await;
        self.observe(index, result)
    }

    async fn get_transaction(
        &self,
        ctx: &ScanContext,
        block: &BlockRef,
        account: &AccountId,
        lt: u64,
    ) -> Result<Transaction, ScanError> {
        let index = self.bound_index();
        let result = self.backends[index]
            .get_transaction(ctx, block, account, lt)
            .await;
        self.observe(index, result)
    }

    fn backend_id(&self) -> &str {
        self.bound().backend_id()
    }

    fn on_call_timeout(&self) {
        self.rebind_from(self.bound_index(), "call timed out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{ChainBuilder, InMemoryChain};
    use crate::domain::ShardKey;

    fn backends(count: usize) -> Vec<Arc<InMemoryChain>> {
        let mut builder = ChainBuilder::new(1);
        builder.open_lane(ShardKey::full(0), 1).unwrap();
        builder.seal_master();
        let fixture = builder.into_fixture();
        (0..count)
            .map(|i| Arc::new(InMemoryChain::from_fixture(format!("node-{i}"), fixture.clone())))
            .collect()
    }

    #[test]
    fn test_empty_backends_rejected() {
        let result = StickyProvider::<InMemoryChain>::new(Vec::new());
        assert!(matches!(result, Err(ScanError::NoBackends)));
    }

    #[tokio::test]
    async fn test_calls_stay_on_bound_backend() {
        let nodes = backends(2);
        let sticky = StickyProvider::new(nodes.clone()).unwrap();
        let ctx = ScanContext::background();

        for _ in 0..3 {
            sticky.lookup_block(&ctx, -1, ShardKey::masterchain().shard, 1).await.unwrap();
        }
        assert_eq!(nodes[0].stats().lookups, 3);
        assert_eq!(nodes[1].stats().lookups, 0);
        assert_eq!(sticky.backend_id(), "node-0");
    }

    #[tokio::test]
    async fn test_unavailable_rebinds_and_surfaces_error() {
        let nodes = backends(2);
        nodes[0].set_unavailable(true);
        let sticky = StickyProvider::new(nodes.clone()).unwrap();
        let ctx = ScanContext::background();
        let master = ShardKey::masterchain().shard;

        let first = sticky.lookup_block(&ctx, -1, master, 1).await;
        assert!(matches!(first, Err(ScanError::Unavailable(_))));
        assert_eq!(sticky.bound_index(), 1);
        assert_eq!(sticky.rebinds(), 1);

        assert!(sticky.lookup_block(&ctx, -1, master, 1).await.is_ok());
        assert_eq!(sticky.backend_id(), "node-1");
    }

    #[tokio::test]
    async fn test_protocol_errors_do_not_rebind() {
        let nodes = backends(2);
        let sticky = StickyProvider::new(nodes).unwrap();
        let err = sticky
            .lookup_block(&ScanContext::background(), -1, ShardKey::masterchain().shard, 42)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::BlockNotFound { .. }));
        assert_eq!(sticky.bound_index(), 0);
    }

    #[tokio::test]
    async fn test_single_backend_stays_bound() {
        let nodes = backends(1);
        nodes[0].fail_next_calls(1);
        let sticky = StickyProvider::new(nodes).unwrap();
        let ctx = ScanContext::background();
        let master = ShardKey::masterchain().shard;

        assert!(sticky.lookup_block(&ctx, -1, master, 1).await.is_err());
        assert_eq!(sticky.rebinds(), 0);
        assert!(sticky.lookup_block(&ctx, -1, master, 1).await.is_ok());
    }

    #[tokio::test]
    async fn test_timeouts_rebind() {
        let nodes = backends(3);
        let sticky = StickyProvider::new(nodes).unwrap();

        let reported = sticky.observe::<()>(0, Err(ScanError::Timeout("slow".into())));
        assert!(matches!(reported, Err(ScanError::Timeout(_))));
        assert_eq!(sticky.bound_index(), 1);

        sticky.on_call_timeout();
        assert_eq!(sticky.bound_index(), 2);
        assert_eq!(sticky.rebinds(), 2);
    }
}
