//! # Shard Scanner Integration Flows
//!
//! End-to-end scans through the public API of qc-18-shard-scanner:
//!
//! 1. **Resumed ranges**: two back-to-back ranges equal one long range
//! 2. **Failover**: a backend dies mid-range and the sticky session moves on
//! 3. **Latency**: concurrent resolution keeps order under per-call delays
//! 4. **Cancellation**: an interrupt from another task stops the scan cleanly
//! 5. **Fixtures**: a chain survives a JSON round trip and scans identically

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use qc_18_shard_scanner::{
        AccountId, BlockDataProvider, BlockRef, ChainBuilder, ChainFixture, InMemoryChain,
        MasterBatch, ScanConfig, ScanContext, ScanError, SeqnoRange, ShardKey, ShardScanApi,
        ShardScanService, StickyProvider, Transaction, TransactionId, TransactionPage,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const FIRST: u32 = 5_000;

    /// 40 masters on two workchains; workchain 0 splits twice and merges once.
    fn fixture() -> ChainFixture {
        let wc0 = ShardKey::full(0);
        let wc1 = ShardKey::full(1);
        let mut b = ChainBuilder::new(FIRST);
        b.transactions_per_block(4);
        b.open_lane(wc0, 10).unwrap();
        b.open_lane(wc1, 500).unwrap();
        b.seal_master();

        let (left, _) = wc0.split().unwrap();
        for i in 1..40u32 {
            match i {
                8 => {
                    b.split(wc0).unwrap();
                }
                15 => {
                    b.split(left).unwrap();
                }
                30 => {
                    let (ll, lr) = left.split().unwrap();
                    b.merge(ll, lr).unwrap();
                }
                _ => {
                    for (n, lane) in b.lanes().into_iter().enumerate() {
                        b.advance(lane, 1 + (i + n as u32) % 3).unwrap();
                    }
                }
            }
            b.seal_master();
        }
        b.into_fixture()
    }

    fn collect_blocks(batches: &[MasterBatch]) -> Vec<BlockRef> {
        batches
            .iter()
            .flat_map(|batch| batch.blocks.iter().map(|b| b.block))
            .collect()
    }

    async fn scan(
        svc: &mut ShardScanService<impl BlockDataProvider>,
        ctx: &ScanContext,
        range: SeqnoRange,
    ) -> Result<Vec<MasterBatch>, ScanError> {
        let mut batches = Vec::new();
        svc.scan_range_with(ctx, range, |batch| batches.push(batch.clone()))
            .await?;
        Ok(batches)
    }

    /// Adds a fixed delay to every provider call.
    struct SlowProvider {
        inner: InMemoryChain,
        delay: Duration,
    }

    #[async_trait]
    impl BlockDataProvider for SlowProvider {
        async fn lookup_block(
            &self,
            ctx: &ScanContext,
            workchain: i32,
            shard: u64,
            seqno: u32,
        ) -> Result<BlockRef, ScanError> {
            tokio::time::sleep(self.delay).await;
            self.inner.lookup_block(ctx, workchain, shard, seqno).await
        }

        async fn get_block_shard_heads(
            &self,
            ctx: &ScanContext,
            master: &BlockRef,
        ) -> Result<Vec<BlockRef>, ScanError> {
            tokio::time::sleep(self.delay).await;
            self.inner.get_block_shard_heads(ctx, master).await
        }

        async fn get_parent_blocks(
            &self,
            ctx: &ScanContext,
            block: &BlockRef,
        ) -> Result<Vec<BlockRef>, ScanError> {
            tokio::time::sleep(self.delay).await;
            self.inner.get_parent_blocks(ctx, block).await
        }

        async fn get_block_transactions(
            &self,
            ctx: &ScanContext,
            block: &BlockRef,
            page_size: u32,
            after: Option<&TransactionId>,
        ) -> Result<TransactionPage, ScanError> {
            tokio::time::sleep(self.delay).await;
            self.inner
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
            tokio::time::sleep(self.delay).await;
            self.inner.get_transaction(ctx, block, account, lt).await
        }

        fn backend_id(&self) -> &str {
            self.inner.backend_id()
        }
    }

    // =============================================================================
    // FLOWS
    // =============================================================================

    #[tokio::test]
    async fn test_resumed_ranges_match_single_range() {
        let ctx = ScanContext::background();

        let mut whole = ShardScanService::new(
            ScanConfig::for_testing(),
            InMemoryChain::from_fixture("whole", fixture()),
        )
        .unwrap();
        let expected = scan(&mut whole, &ctx, SeqnoRange::new(FIRST + 1, FIRST + 40))
            .await
            .unwrap();
        let expected = collect_blocks(&expected);

        let mut parts = ShardScanService::new(
            ScanConfig::for_testing(),
            InMemoryChain::from_fixture("parts", fixture()),
        )
        .unwrap();
        let first = scan(&mut parts, &ctx, SeqnoRange::new(FIRST + 1, FIRST + 17))
            .await
            .unwrap();
        let second = scan(&mut parts, &ctx, SeqnoRange::new(FIRST + 17, FIRST + 40))
            .await
            .unwrap();
        let mut actual = collect_blocks(&first);
        actual.extend(collect_blocks(&second));

        assert_eq!(actual, expected);
        assert_eq!(parts.tracker(), whole.tracker());
    }

    #[tokio::test]
    async fn test_failover_mid_range_loses_nothing() {
        let ctx = ScanContext::background();
        let fixture = fixture();

        let mut reference = ShardScanService::new(
            ScanConfig::for_testing(),
            InMemoryChain::from_fixture("reference", fixture.clone()),
        )
        .unwrap();
        let expected = scan(&mut reference, &ctx, SeqnoRange::new(FIRST + 1, FIRST + 40))
            .await
            .unwrap();

        let nodes: Vec<Arc<InMemoryChain>> = (0..3)
            .map(|i| Arc::new(InMemoryChain::from_fixture(format!("ls-{i}"), fixture.clone())))
            .collect();
        let mut svc = ShardScanService::new(
            ScanConfig::for_testing(),
            StickyProvider::new(nodes.clone()).unwrap(),
        )
        .unwrap();

        let mut batches = Vec::new();
        let report = svc
            .scan_range_with(&ctx, SeqnoRange::new(FIRST + 1, FIRST + 40), |batch| {
                batches.push(batch.clone());
                if batch.master.seqno == FIRST + 12 {
                    nodes[0].set_unavailable(true);
                }
                if batch.master.seqno == FIRST + 25 {
                    nodes[1].set_unavailable(true);
                }
            })
            .await
            .unwrap();

        assert_eq!(batches, expected);
        assert_eq!(report.retries, 2);
        assert_eq!(svc.provider().bound_index(), 2);
        assert_eq!(svc.provider().rebinds(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_resolution_under_latency() {
        let ctx = ScanContext::background();
        let range = SeqnoRange::new(FIRST + 1, FIRST + 6);

        let mut sequential = ShardScanService::new(
            ScanConfig::for_testing(),
            SlowProvider {
                inner: InMemoryChain::from_fixture("slow", fixture()),
                delay: Duration::from_millis(20),
            },
        )
        .unwrap();
        let started = tokio::time::Instant::now();
        let expected = scan(&mut sequential, &ctx, range).await.unwrap();
        let sequential_elapsed = started.elapsed();

        let mut config = ScanConfig::for_testing();
        config.resolve_concurrency = 8;
        let mut concurrent = ShardScanService::new(
            config,
            SlowProvider {
                inner: InMemoryChain::from_fixture("slow", fixture()),
                delay: Duration::from_millis(20),
            },
        )
        .unwrap();

        let started = tokio::time::Instant::now();
        let actual = scan(&mut concurrent, &ctx, range).await.unwrap();
        let concurrent_elapsed = started.elapsed();

        assert_eq!(actual, expected);
        assert!(concurrent_elapsed < sequential_elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_from_other_task() {
        let (ctx, handle) = ScanContext::new();
        let mut svc = ShardScanService::new(
            ScanConfig::for_testing(),
            SlowProvider {
                inner: InMemoryChain::from_fixture("slow", fixture()),
                delay: Duration::from_millis(50),
            },
        )
        .unwrap();

        let interrupter = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2_500)).await;
            handle.cancel();
        });

        let mut committed = Vec::new();
        let err = svc
            .scan_range_with(&ctx, SeqnoRange::new(FIRST + 1, FIRST + 40), |batch| {
                committed.push(batch.master.seqno)
            })
            .await
            .unwrap_err();
        interrupter.await.unwrap();

        assert_eq!(err, ScanError::Cancelled);
        assert!(!committed.is_empty());
        assert!(committed.len() < 39);
        let last = *committed.last().unwrap();
        assert_eq!(committed, (FIRST + 1..=last).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_fixture_json_round_trip_scans_identically() {
        let ctx = ScanContext::background();
        let original = fixture();
        let json = serde_json::to_string(&original).unwrap();
        let reloaded: ChainFixture = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded, original);

        let mut a = ShardScanService::new(
            ScanConfig::for_testing(),
            InMemoryChain::from_fixture("a", original),
        )
        .unwrap();
        let mut b = ShardScanService::new(
            ScanConfig::for_testing(),
            InMemoryChain::from_fixture("b", reloaded),
        )
        .unwrap();

        let range = SeqnoRange::new(FIRST + 1, FIRST + 40);
        assert_eq!(
            scan(&mut a, &ctx, range).await.unwrap(),
            scan(&mut b, &ctx, range).await.unwrap()
        );
    }
}
