//! # Shard Scan Service
//!
//! Application service composing the walker, the gap filler and the
//! paginator over a master seqno range.
//!
//! One master block is one unit of work: it is planned and every block it
//! commits is enumerated before the tracker advances and the batch reaches
//! the caller. A retryable failure anywhere in that sequence replays the
//! whole unit.

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::algorithms::{retry_iteration, MasterChainWalker, TransactionPaginator};
use crate::config::ScanConfig;
use crate::domain::{
    IterationPlan, MasterBatch, ScanError, ScanReport, SeqnoRange, ShardKey, ShardSeqnoMap,
};
use crate::ports::{BlockDataProvider, ScanContext, ShardScanApi};

/// Shard Scanner service.
pub struct ShardScanService<P: BlockDataProvider> {
    /// Configuration.
    config: ScanConfig,
    /// Block data source.
    provider: P,
    /// Planner and tracker owner.
    walker: MasterChainWalker,
    /// Transaction enumerator.
    paginator: TransactionPaginator,
    /// Iteration replays since creation.
    retries: u32,
}

impl<P: BlockDataProvider> ShardScanService<P> {
    /// Create a new service after validating `config`.
    pub fn new(config: ScanConfig, provider: P) -> Result<Self, ScanError> {
        config.validate()?;
        Ok(Self {
            walker: MasterChainWalker::new(&config),
            paginator: TransactionPaginator::from_config(&config),
            config,
            provider,
            retries: 0,
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Iteration replays since creation.
    pub fn total_retries(&self) -> u32 {
        self.retries
    }

    /// Tell the provider when one of its calls ran out of time.
    fn note_timeout<T>(&self, result: Result<T, ScanError>) -> Result<T, ScanError> {
        if let Err(ScanError::Timeout(reason)) = &result {
            warn!(
                "[qc-18] Call to {} timed out: {}",
                self.provider.backend_id(),
                reason
            );
            self.provider.on_call_timeout();
        }
        result
    }

    /// Plan one master and enumerate every block it commits.
    async fn run_iteration(
        &self,
        ctx: &ScanContext,
        seqno: u32,
    ) -> Result<(IterationPlan, MasterBatch), ScanError> {
        let result = self.plan_and_collect(ctx, seqno).await;
        self.note_timeout(result)
    }

    async fn plan_and_collect(
        &self,
        ctx: &ScanContext,
        seqno: u32,
    ) -> Result<(IterationPlan, MasterBatch), ScanError> {
        let plan = self.walker.plan(ctx, &self.provider, seqno).await?;
        let blocks = self
            .paginator
            .collect_all(ctx, &self.provider, &plan.blocks)
            .await?;
        let batch = MasterBatch {
            master: plan.master,
            blocks,
        };
        Ok((plan, batch))
    }

    /// Scan one master with retries; returns the plan to commit and its batch.
    async fn attempt_master(
        &mut self,
        ctx: &ScanContext,
        seqno: u32,
    ) -> Result<(IterationPlan, MasterBatch), ScanError> {
        let ctx = &ctx.with_call_timeout(self.config.call_timeout());
        let this = &*self;
        let retried = retry_iteration(ctx, &this.config.retry, seqno, || {
            this.run_iteration(ctx, seqno)
        })
        .await?;
        self.retries += retried.retries;
        Ok(retried.value)
    }

    /// Scan `range`, handing each committed batch to `on_batch` in order.
    ///
    /// The tracker is seeded from master `range.start - 1` first (unless
    /// `range.start` is 0). On error the masters already handed out stay
    /// committed.
    pub async fn scan_range_with<F>(
        &mut self,
        ctx: &ScanContext,
        range: SeqnoRange,
        mut on_batch: F,
    ) -> Result<ScanReport, ScanError>
    where
        F: FnMut(&MasterBatch) + Send,
    {
        if range.start > range.end {
            return Err(ScanError::InvalidRange {
                start: range.start,
                end: range.end,
            });
        }

        let started = Instant::now();
        let retries_before = self.retries;
        let mut report = ScanReport::default();
        if range.is_empty() {
            return Ok(report);
        }

        info!(
            "[qc-18] Scanning master blocks {}..{} via {}",
            range.start,
            range.end,
            self.provider.backend_id()
        );

        if range.start > 0 {
            self.seed_from_master(ctx, range.start - 1).await?;
        }

        for seqno in range.start..range.end {
            let batch = match self.scan_master(ctx, seqno).await {
                Ok(batch) => batch,
                Err(err) => {
                    if err.is_cancelled() {
                        info!("[qc-18] Scan cancelled at master {}", seqno);
                    } else {
                        error!("[qc-18] Scan aborted at master {}: {}", seqno, err);
                    }
                    return Err(err);
                }
            };
            on_batch(&batch);
            report.record(&batch);
        }

        report.retries = self.retries - retries_before;
        report.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            "[qc-18] Scan complete: {} master(s), {} shard block(s), {} transaction(s), {} retr(ies) in {}ms",
            report.masters_scanned,
            report.shard_blocks,
            report.transactions,
            report.retries,
            report.duration_ms
        );
        Ok(report)
    }
}

#[async_trait]
impl<P: BlockDataProvider> ShardScanApi for ShardScanService<P> {
    async fn seed_from_master(
        &mut self,
        ctx: &ScanContext,
        seqno: u32,
    ) -> Result<usize, ScanError> {
        let ctx = &ctx.with_call_timeout(self.config.call_timeout());
        let this = &*self;
        let retried = retry_iteration(ctx, &this.config.retry, seqno, move || async move {
            let result = this.walker.master_heads(ctx, &this.provider, seqno).await;
            this.note_timeout(result)
        })
        .await?;
        self.retries += retried.retries;

        let (_, heads) = retried.value;
        let tracked = self.walker.seed(&heads);
        info!(
            "[qc-18] Seeded {} lane(s) from master block {}",
            tracked, seqno
        );
        Ok(tracked)
    }

    async fn scan_master(
        &mut self,
        ctx: &ScanContext,
        seqno: u32,
    ) -> Result<MasterBatch, ScanError> {
        let (plan, batch) = self.attempt_master(ctx, seqno).await?;
        let applied = self.walker.commit(&plan);
        debug!(
            "[qc-18] Master {} committed: {} tracker update(s)",
            seqno, applied
        );
        if batch.transaction_count() == 0 {
            info!("[qc-18] No transactions in master block {}", seqno);
        }
        Ok(batch)
    }

    async fn scan_range(
        &mut self,
        ctx: &ScanContext,
        range: SeqnoRange,
    ) -> Result<ScanReport, ScanError> {
        self.scan_range_with(ctx, range, |_| {}).await
    }

    fn tracked_seqno(&self, key: &ShardKey) -> Option<u32> {
        self.walker.tracker().get(key)
    }

    fn tracker(&self) -> &ShardSeqnoMap {
        self.walker.tracker()
    }
}
