//! # Outbound Ports
//!
//! The block/transaction data provider the scanner depends on, and the scan
//! context every provider call receives.

use crate::domain::{AccountId, BlockRef, ScanError, Transaction, TransactionId, TransactionPage};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Per-scan call context.
///
/// Carries the cancellation signal and the per-call deadline. Clones share
/// the same signal.
#[derive(Clone, Debug)]
pub struct ScanContext {
    cancel: watch::Receiver<bool>,
    call_timeout: Option<Duration>,
}

/// Owner side of a [`ScanContext`] cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Cancel every call bound to the paired context.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl ScanContext {
    /// Create a cancellable context.
    pub fn new() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                cancel: rx,
                call_timeout: None,
            },
            CancelHandle { tx },
        )
    }

    /// Context that is never cancelled.
    pub fn background() -> Self {
        let (_, rx) = watch::channel(false);
        Self {
            cancel: rx,
            call_timeout: None,
        }
    }

    /// Same signal, with every guarded call bounded by `limit`.
    pub fn with_call_timeout(&self, limit: Duration) -> Self {
        Self {
            cancel: self.cancel.clone(),
            call_timeout: Some(limit),
        }
    }

    /// Deadline applied to each guarded call, if any.
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    /// Has cancellation been requested?
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Fail fast if cancelled.
    pub fn check(&self) -> Result<(), ScanError> {
        if self.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        Ok(())
    }

    /// Resolves once cancellation is requested; never if the handle is gone.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel.clone();
        let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }

    /// Run a provider call, aborting it on cancellation.
    ///
    /// A call still pending after the context's call timeout fails with
    /// [`ScanError::Timeout`].
    pub async fn guard<T, F>(&self, call: F) -> Result<T, ScanError>
    where
        F: Future<Output = Result<T, ScanError>>,
    {
        self.check()?;
        let bounded = async {
            match self.call_timeout {
                Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                    ScanError::Timeout(format!("no answer within {}ms", limit.as_millis()))
                })?,
                None => call.await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(ScanError::Cancelled),
            result = bounded => result,
        }
    }

    /// Cancellable sleep (retry backoff). Not subject to the call timeout.
    pub async fn sleep(&self, delay: Duration) -> Result<(), ScanError> {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(ScanError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

/// Block/transaction data provider - outbound port.
///
/// All calls of one scan pass must be answered by one consistent backend
/// (see `adapters::StickyProvider`).
#[async_trait]
pub trait BlockDataProvider: Send + Sync {
    /// Resolve a block by (workchain, shard, seqno).
    async fn lookup_block(
        &self,
        ctx: &ScanContext,
        workchain: i32,
        shard: u64,
        seqno: u32,
    ) -> Result<BlockRef, ScanError>;

    /// Shard heads declared by a master block, in declaration order.
    async fn get_block_shard_heads(
        &self,
        ctx: &ScanContext,
        master: &BlockRef,
    ) -> Result<Vec<BlockRef>, ScanError>;

    /// Parents of a shard block: one normally, two right after a merge.
    async fn get_parent_blocks(
        &self,
        ctx: &ScanContext,
        block: &BlockRef,
    ) -> Result<Vec<BlockRef>, ScanError>;

    /// One page of transaction ids strictly after `after`.
    async fn get_block_transactions(
        &self,
        ctx: &ScanContext,
        block: &BlockRef,
        page_size: u32,
        after: Option<&TransactionId>,
    ) -> Result<TransactionPage, ScanError>;

    /// Full transaction record.
    async fn get_transaction(
        &self,
        ctx: &ScanContext,
        block: &BlockRef,
        account: &AccountId,
        lt: u64,
    ) -> Result<Transaction, ScanError>;

    /// Backend identifier (for logging/debugging).
    fn backend_id(&self) -> &str;

    /// A call to this provider ran past the scan's call timeout and was
    /// dropped before it could report anything.
    fn on_call_timeout(&self) {}
}

#[async_trait]
impl<P: BlockDataProvider + ?Sized> BlockDataProvider for Arc<P> {
    async fn lookup_block(
        &self,
        ctx: &ScanContext,
        workchain: i32,
        shard: u64,
        seqno: u32,
    ) -> Result<BlockRef, ScanError> {
        (**self).lookup_block(ctx, workchain, shard, seqno).await
    }

    async fn get_block_shard_heads(
        &self,
        ctx: &ScanContext,
        master: &BlockRef,
    ) -> Result<Vec<BlockRef>, ScanError> {
        (**self).get_block_shard_heads(ctx, master).await
    }

    async fn get_parent_blocks(
        &self,
        ctx: &ScanContext,
        block: &BlockRef,
    ) -> Result<Vec<BlockRef>, ScanError> {
        (**self).get_parent_blocks(ctx, block).await
    }

    async fn get_block_transactions(
        &self,
        ctx: &ScanContext,
        block: &BlockRef,
        page_size: u32,
        after: Option<&TransactionId>,
    ) -> Result<TransactionPage, ScanError> {
        (**self)
            .get_block_transactions(ctx, block, page_size, after)
            .await
    }

    async fn get_transaction(
        &self,
        ctx: &ScanContext,
        block: &BlockRef,
        account: &AccountId,
        lt: u64,
    ) -> Result<Transaction, ScanError> {
        (**self).get_transaction(ctx, block, account, lt).await
    }

    fn backend_id(&self) -> &str {
        (**self).backend_id()
    }

    fn on_call_timeout(&self) {
        (**self).on_call_timeout()
    }
}
