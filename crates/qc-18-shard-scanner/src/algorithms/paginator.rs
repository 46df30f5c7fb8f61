//! # Transaction Paginator
//!
//! Enumerates every transaction of a shard block with cursor paging and
//! resolves each id to its full record. Pages are fetched one after the
//! other; ids inside a page may be resolved concurrently, but results keep
//! the page order.

use crate::config::ScanConfig;
use crate::domain::{BlockRef, BlockTransactions, ScanError, Transaction, TransactionId};
use crate::ports::outbound::{BlockDataProvider, ScanContext};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

/// Cursor-paged transaction enumerator.
#[derive(Clone, Debug)]
pub struct TransactionPaginator {
    page_size: u32,
    resolve_concurrency: usize,
}

impl TransactionPaginator {
    /// Create a paginator.
    pub fn new(page_size: u32, resolve_concurrency: usize) -> Self {
        Self {
            page_size,
            resolve_concurrency: resolve_concurrency.max(1),
        }
    }

    /// Create a paginator from the scanner configuration.
    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.page_size, config.resolve_concurrency)
    }

    /// Page size in use.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// All transactions of `block`, in cursor order.
    ///
    /// Provider errors are returned as-is so the caller can tell transient
    /// failures from protocol ones.
    pub async fn collect<P: BlockDataProvider + ?Sized>(
        &self,
        ctx: &ScanContext,
        provider: &P,
        block: &BlockRef,
    ) -> Result<BlockTransactions, ScanError> {
        let mut transactions = Vec::new();
        let mut cursor: Option<TransactionId> = None;
        let mut pages = 0u32;

        loop {
            let page = ctx
                .guard(provider.get_block_transactions(
                    ctx,
                    block,
                    self.page_size,
                    cursor.as_ref(),
                ))
                .await?;
            pages += 1;

            transactions.extend(self.resolve(ctx, provider, block, &page.ids).await?);

            if !page.has_more {
                break;
            }

            let next = page.cursor().copied().ok_or_else(|| ScanError::Pagination {
                block: block.to_string(),
                reason: "empty page reported more results".into(),
            })?;
            if cursor == Some(next) {
                return Err(ScanError::Pagination {
                    block: block.to_string(),
                    reason: format!("cursor stuck at lt {}", next.lt),
                });
            }
            cursor = Some(next);
        }

        debug!(
            "[qc-18] {}: {} transaction(s) in {} page(s)",
            block,
            transactions.len(),
            pages
        );

        Ok(BlockTransactions {
            block: *block,
            transactions,
            pages,
        })
    }

    /// Collect every block in order.
    pub async fn collect_all<P: BlockDataProvider + ?Sized>(
        &self,
        ctx: &ScanContext,
        provider: &P,
        blocks: &[BlockRef],
    ) -> Result<Vec<BlockTransactions>, ScanError> {
        let mut out = Vec::with_capacity(blocks.len());
        for block in blocks {
            info!(
                "[qc-18] Scanning block {} of shard {:x}...",
                block.seqno, block.shard
            );
            let collected = self.collect(ctx, provider, block).await?;
            if collected.transactions.is_empty() {
                info!("[qc-18] No transactions in block {}", block.seqno);
            }
            out.push(collected);
        }
        Ok(out)
    }

    async fn resolve<P: BlockDataProvider + ?Sized>(
        &self,
        ctx: &ScanContext,
        provider: &P,
        block: &BlockRef,
        ids: &[TransactionId],
    ) -> Result<Vec<Transaction>, ScanError> {
        if self.resolve_concurrency == 1 {
            let mut resolved = Vec::with_capacity(ids.len());
            for id in ids {
                let tx = ctx
                    .guard(provider.get_transaction(ctx, block, &id.account, id.lt))
                    .await?;
                resolved.push(tx);
            }
            return Ok(resolved);
        }

        stream::iter(ids.iter().copied())
            .map(|id| async move {
                ctx.guard(provider.get_transaction(ctx, block, &id.account, id.lt))
                    .await
            })
            .buffered(self.resolve_concurrency)
            .try_collect()
            .await
    }
}
