//! In-Memory Chain Adapter
//!
//! Implements `BlockDataProvider` over a synthetic sharded chain held in
//! memory. Used by tests, benches and the CLI demo; chains can be built with
//! [`ChainBuilder`] or loaded from a JSON [`ChainFixture`].

use crate::domain::{
    AccountId, BlockRef, Hash, ScanError, ShardKey, Transaction, TransactionId, TransactionPage,
};
use crate::ports::outbound::{BlockDataProvider, ScanContext};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use tracing::debug;

/// Master block and the shard heads it declares.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterEntry {
    /// Master block.
    pub block: BlockRef,
    /// Declared shard heads, in declaration order.
    pub shard_heads: Vec<BlockRef>,
}

/// Shard block with its parent links and transactions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardBlockEntry {
    /// Shard block.
    pub block: BlockRef,
    /// Parent blocks (empty for a lane's first block).
    pub parents: Vec<BlockRef>,
    /// Transactions in cursor order.
    pub transactions: Vec<Transaction>,
}

/// Serializable chain description.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainFixture {
    /// Master chain lane.
    pub master: Option<ShardKey>,
    /// Master blocks in seqno order.
    pub masters: Vec<MasterEntry>,
    /// Every shard block.
    pub shard_blocks: Vec<ShardBlockEntry>,
}

/// Provider call counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallStats {
    /// `lookup_block` calls.
    pub lookups: u64,
    /// `get_block_shard_heads` calls.
    pub shard_heads: u64,
    /// `get_parent_blocks` calls.
    pub parents: u64,
    /// `get_block_transactions` calls.
    pub pages: u64,
    /// `get_transaction` calls.
    pub transactions: u64,
}

#[derive(Default)]
struct Counters {
    lookups: AtomicU64,
    shard_heads: AtomicU64,
    parents: AtomicU64,
    pages: AtomicU64,
    transactions: AtomicU64,
}

#[derive(Default)]
struct Faults {
    parents: HashSet<BlockRef>,
    pages: HashMap<BlockRef, u32>,
    transactions: HashSet<(BlockRef, u64)>,
}

/// Synthetic chain provider.
pub struct InMemoryChain {
    id: String,
    master: ShardKey,
    masters: BTreeMap<u32, MasterEntry>,
    blocks: HashMap<BlockRef, ShardBlockEntry>,
    by_seqno: HashMap<(ShardKey, u32), BlockRef>,
    counters: Counters,
    unavailable: AtomicBool,
    transient_failures: AtomicU32,
    faults: Mutex<Faults>,
    page_log: Mutex<Vec<(BlockRef, usize)>>,
}

impl InMemoryChain {
    /// Build a provider from a fixture.
    pub fn from_fixture(id: impl Into<String>, fixture: ChainFixture) -> Self {
        let master = fixture.master.unwrap_or_else(ShardKey::masterchain);
        let masters = fixture
            .masters
            .into_iter()
            .map(|entry| (entry.block.seqno, entry))
            .collect();

        let mut blocks = HashMap::with_capacity(fixture.shard_blocks.len());
        let mut by_seqno = HashMap::with_capacity(fixture.shard_blocks.len());
        for entry in fixture.shard_blocks {
            by_seqno.insert((entry.block.shard_key(), entry.block.seqno), entry.block);
            blocks.insert(entry.block, entry);
        }

        Self {
            id: id.into(),
            master,
            masters,
            blocks,
            by_seqno,
            counters: Counters::default(),
            unavailable: AtomicBool::new(false),
            transient_failures: AtomicU32::new(0),
            faults: Mutex::new(Faults::default()),
            page_log: Mutex::new(Vec::new()),
        }
    }

    /// Export the chain as a fixture.
    pub fn fixture(&self) -> ChainFixture {
        let mut shard_blocks: Vec<_> = self.blocks.values().cloned().collect();
        shard_blocks.sort_by_key(|e| (e.block.shard_key(), e.block.seqno));
        ChainFixture {
            master: Some(self.master),
            masters: self.masters.values().cloned().collect(),
            shard_blocks,
        }
    }

    /// Master seqnos present, ascending.
    pub fn master_seqnos(&self) -> Vec<u32> {
        self.masters.keys().copied().collect()
    }

    /// Number of shard blocks.
    pub fn shard_block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Shard block by lane and seqno.
    pub fn shard_block(&self, key: ShardKey, seqno: u32) -> Option<BlockRef> {
        self.by_seqno.get(&(key, seqno)).copied()
    }

    /// Parent links of every shard block.
    pub fn parents_map(&self) -> HashMap<BlockRef, Vec<BlockRef>> {
        self.blocks
            .iter()
            .map(|(block, entry)| (*block, entry.parents.clone()))
            .collect()
    }

    /// Transactions stored for a block.
    pub fn transactions_of(&self, block: &BlockRef) -> Vec<Transaction> {
        self.blocks
            .get(block)
            .map(|e| e.transactions.clone())
            .unwrap_or_default()
    }

    /// Call counters so far.
    pub fn stats(&self) -> CallStats {
        CallStats {
            lookups: self.counters.lookups.load(Ordering::SeqCst),
            shard_heads: self.counters.shard_heads.load(Ordering::SeqCst),
            parents: self.counters.parents.load(Ordering::SeqCst),
            pages: self.counters.pages.load(Ordering::SeqCst),
            transactions: self.counters.transactions.load(Ordering::SeqCst),
        }
    }

    /// Page sizes returned, in request order.
    pub fn page_log(&self) -> Vec<(BlockRef, usize)> {
        self.page_log.lock().clone()
    }

    /// Make every call fail with `Unavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make the next `count` calls fail with `Unavailable`.
    pub fn fail_next_calls(&self, count: u32) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    /// Make parent resolution of `block` fail.
    pub fn fail_parents_of(&self, block: BlockRef) {
        self.faults.lock().parents.insert(block);
    }

    /// Make the `page`-th (0-based) page request for `block` fail.
    pub fn fail_page(&self, block: BlockRef, page: u32) {
        self.faults.lock().pages.insert(block, page);
    }

    /// Make resolution of one transaction fail.
    pub fn fail_transaction(&self, block: BlockRef, lt: u64) {
        self.faults.lock().transactions.insert((block, lt));
    }

    /// Remove every injected fault.
    pub fn clear_faults(&self) {
        *self.faults.lock() = Faults::default();
        self.set_unavailable(false);
        self.fail_next_calls(0);
    }

    fn enter(&self, ctx: &ScanContext) -> Result<(), ScanError> {
        ctx.check()?;
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ScanError::Unavailable(format!("{} is down", self.id)));
        }
        let consumed = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            return Err(ScanError::Unavailable(format!(
                "{} connection reset",
                self.id
            )));
        }
        Ok(())
    }

    fn entry(&self, block: &BlockRef) -> Option<&ShardBlockEntry> {
        self.blocks.get(block)
    }
}

#[async_trait]
impl BlockDataProvider for InMemoryChain {
    async fn lookup_block(
        &self,
        ctx: &ScanContext,
        workchain: i32,
        shard: u64,
        seqno: u32,
    ) -> Result<BlockRef, ScanError> {
        self.counters.lookups.fetch_add(1, Ordering::SeqCst);
        self.enter(ctx)?;

        let key = ShardKey::new(workchain, shard);
        let found = if key == self.master {
            self.masters.get(&seqno).map(|m| m.block)
        } else {
            self.by_seqno.get(&(key, seqno)).copied()
        };

        found.ok_or(ScanError::BlockNotFound {
            workchain,
            shard,
            seqno,
        })
    }

    async fn get_block_shard_heads(
        &self,
        ctx: &ScanContext,
        master: &BlockRef,
    ) -> Result<Vec<BlockRef>, ScanError> {
        self.counters.shard_heads.fetch_add(1, Ordering::SeqCst);
        self.enter(ctx)?;

        match self.masters.get(&master.seqno) {
            Some(entry) if entry.block == *master => Ok(entry.shard_heads.clone()),
            Some(_) => Err(ScanError::MalformedBlock(format!(
                "{} does not match stored master block",
                master
            ))),
            None => Err(ScanError::BlockNotFound {
                workchain: master.workchain,
                shard: master.shard,
                seqno: master.seqno,
            }),
        }
    }

    async fn get_parent_blocks(
        &self,
        ctx: &ScanContext,
        block: &BlockRef,
    ) -> Result<Vec<BlockRef>, ScanError> {
        self.counters.parents.fetch_add(1, Ordering::SeqCst);
        self.enter(ctx)?;

        if self.faults.lock().parents.contains(block) {
            return Err(ScanError::ParentResolution {
                block: block.to_string(),
                reason: "injected fault".into(),
            });
        }

        self.entry(block)
            .map(|e| e.parents.clone())
            .ok_or_else(|| ScanError::ParentResolution {
                block: block.to_string(),
                reason: "unknown block".into(),
            })
    }

    async fn get_block_transactions(
        &self,
        ctx: &ScanContext,
        block: &BlockRef,
        page_size: u32,
        after: Option<&TransactionId>,
    ) -> Result<TransactionPage, ScanError> {
        let call = self.counters.pages.fetch_add(1, Ordering::SeqCst);
        self.enter(ctx)?;

        let requested = self
            .page_log
            .lock()
            .iter()
            .filter(|(b, _)| b == block)
            .count() as u32;
        if self.faults.lock().pages.get(block) == Some(&requested) {
            return Err(ScanError::Pagination {
                block: block.to_string(),
                reason: format!("injected fault on page {}", requested),
            });
        }

        let entry = self.entry(block).ok_or_else(|| ScanError::Pagination {
            block: block.to_string(),
            reason: "unknown block".into(),
        })?;

        let start = match after {
            None => 0,
            Some(cursor) => entry
                .transactions
                .iter()
                .position(|tx| tx.id() == *cursor)
                .map(|i| i + 1)
                .ok_or_else(|| ScanError::Pagination {
                    block: block.to_string(),
                    reason: format!("unknown cursor lt {}", cursor.lt),
                })?,
        };
        let end = (start + page_size as usize).min(entry.transactions.len());
        let ids: Vec<TransactionId> = entry.transactions[start..end]
            .iter()
            .map(Transaction::id)
            .collect();
        let has_more = end < entry.transactions.len();

        debug!(
            "[qc-18] {} page #{} of {}: {} ids, more={}",
            self.id,
            call,
            block,
            ids.len(),
            has_more
        );
        self.page_log.lock().push((*block, ids.len()));

        Ok(TransactionPage::new(ids, has_more))
    }

    async fn get_transaction(
        &self,
        ctx: &ScanContext,
        block: &BlockRef,
        account: &AccountId,
        lt: u64,
    ) -> Result<Transaction, ScanError> {
        self.counters.transactions.fetch_add(1, Ordering::SeqCst);
        self.enter(ctx)?;

        let not_found = |reason: &str| ScanError::TransactionResolution {
            block: block.to_string(),
            lt,
            reason: reason.to_string(),
        };

        if self.faults.lock().transactions.contains(&(*block, lt)) {
            return Err(not_found("injected fault"));
        }

        self.entry(block)
            .and_then(|e| {
                e.transactions
                    .iter()
                    .find(|tx| tx.lt == lt && tx.account == *account)
            })
            .cloned()
            .ok_or_else(|| not_found("not found"))
    }

    fn backend_id(&self) -> &str {
        &self.id
    }
}

// =============================================================================
// Chain Builder
// =============================================================================

fn derive_hash(tag: &[u8], key: ShardKey, seqno: u32) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(tag);
    hasher.update(key.workchain.to_be_bytes());
    hasher.update(key.shard.to_be_bytes());
    hasher.update(seqno.to_be_bytes());
    hasher.finalize().into()
}

fn make_block(key: ShardKey, seqno: u32) -> BlockRef {
    BlockRef::new(
        key,
        seqno,
        derive_hash(b"root", key, seqno),
        derive_hash(b"file", key, seqno),
    )
}

/// Builds synthetic chains with lane advances, splits and merges.
///
/// Master blocks declare the current tip of every lane when sealed; lanes
/// advanced by more than one block between seals leave seqno holes for the
/// scanner to fill.
pub struct ChainBuilder {
    master: ShardKey,
    next_master_seqno: u32,
    tips: BTreeMap<ShardKey, BlockRef>,
    masters: Vec<MasterEntry>,
    shard_blocks: Vec<ShardBlockEntry>,
    transactions_per_block: u32,
    accounts: u8,
    next_lt: u64,
    utime: u32,
}

impl ChainBuilder {
    /// Start a chain whose first sealed master block is `first_master_seqno`.
    pub fn new(first_master_seqno: u32) -> Self {
        Self {
            master: ShardKey::masterchain(),
            next_master_seqno: first_master_seqno,
            tips: BTreeMap::new(),
            masters: Vec::new(),
            shard_blocks: Vec::new(),
            transactions_per_block: 2,
            accounts: 4,
            next_lt: 1_000_000,
            utime: 1_700_000_000,
        }
    }

    /// Transactions generated for each subsequent block.
    pub fn transactions_per_block(&mut self, count: u32) -> &mut Self {
        self.transactions_per_block = count;
        self
    }

    /// Open a lane whose first block (no parents) has `seqno`.
    pub fn open_lane(&mut self, key: ShardKey, seqno: u32) -> Result<BlockRef, ScanError> {
        if self.tips.contains_key(&key) {
            return Err(ScanError::InvalidConfig(format!("lane {} already open", key)));
        }
        Ok(self.push_block(key, seqno, Vec::new()))
    }

    /// Current tip of a lane.
    pub fn tip(&self, key: &ShardKey) -> Option<BlockRef> {
        self.tips.get(key).copied()
    }

    /// Open lanes in declaration order.
    pub fn lanes(&self) -> Vec<ShardKey> {
        self.tips.keys().copied().collect()
    }

    /// Append `count` blocks to a lane.
    pub fn advance(&mut self, key: ShardKey, count: u32) -> Result<BlockRef, ScanError> {
        let mut tip = self.require_tip(&key)?;
        for _ in 0..count {
            tip = self.push_block(key, tip.seqno + 1, vec![tip]);
        }
        Ok(tip)
    }

    /// Append `count` blocks to every open lane.
    pub fn advance_all(&mut self, count: u32) -> Result<(), ScanError> {
        for key in self.lanes() {
            self.advance(key, count)?;
        }
        Ok(())
    }

    /// Split a lane; both children continue from the parent tip.
    pub fn split(&mut self, key: ShardKey) -> Result<(ShardKey, ShardKey), ScanError> {
        let tip = self.require_tip(&key)?;
        let (left, right) = key
            .split()
            .ok_or_else(|| ScanError::InvalidConfig(format!("lane {} cannot split", key)))?;
        self.tips.remove(&key);
        self.push_block(left, tip.seqno + 1, vec![tip]);
        self.push_block(right, tip.seqno + 1, vec![tip]);
        Ok((left, right))
    }

    /// Merge two sibling lanes back into their parent lane.
    pub fn merge(&mut self, left: ShardKey, right: ShardKey) -> Result<ShardKey, ScanError> {
        let parent = left
            .parent()
            .filter(|p| right.parent() == Some(*p) && left != right)
            .ok_or_else(|| {
                ScanError::InvalidConfig(format!("lanes {} and {} are not siblings", left, right))
            })?;
        let left_tip = self.require_tip(&left)?;
        let right_tip = self.require_tip(&right)?;
        self.tips.remove(&left);
        self.tips.remove(&right);
        let seqno = left_tip.seqno.max(right_tip.seqno) + 1;
        self.push_block(parent, seqno, vec![left_tip, right_tip]);
        Ok(parent)
    }

    /// Seal a master block declaring every current lane tip.
    pub fn seal_master(&mut self) -> BlockRef {
        let seqno = self.next_master_seqno;
        self.next_master_seqno += 1;
        let block = make_block(self.master, seqno);
        self.masters.push(MasterEntry {
            block,
            shard_heads: self.tips.values().copied().collect(),
        });
        block
    }

    /// Seqno the next sealed master block will get.
    pub fn next_master_seqno(&self) -> u32 {
        self.next_master_seqno
    }

    /// Finish as a fixture.
    pub fn into_fixture(self) -> ChainFixture {
        ChainFixture {
            master: Some(self.master),
            masters: self.masters,
            shard_blocks: self.shard_blocks,
        }
    }

    /// Finish as a provider.
    pub fn build(self, id: impl Into<String>) -> InMemoryChain {
        InMemoryChain::from_fixture(id, self.into_fixture())
    }

    fn require_tip(&self, key: &ShardKey) -> Result<BlockRef, ScanError> {
        self.tip(key)
            .ok_or_else(|| ScanError::InvalidConfig(format!("lane {} is not open", key)))
    }

    fn push_block(&mut self, key: ShardKey, seqno: u32, parents: Vec<BlockRef>) -> BlockRef {
        let block = make_block(key, seqno);
        let transactions = (0..self.transactions_per_block)
            .map(|i| self.make_transaction(&block, i))
            .collect();
        self.shard_blocks.push(ShardBlockEntry {
            block,
            parents,
            transactions,
        });
        self.tips.insert(key, block);
        self.utime += 3;
        block
    }

    fn make_transaction(&mut self, block: &BlockRef, index: u32) -> Transaction {
        let lt = self.next_lt;
        self.next_lt += 1;

        let mut account = [0u8; 32];
        account[0] = (block.shard >> 56) as u8;
        account[31] = (index % u32::from(self.accounts)) as u8;

        let mut hasher = Sha256::new();
        hasher.update(block.root_hash);
        hasher.update(lt.to_be_bytes());

        Transaction {
            block: *block,
            account: AccountId(account),
            lt,
            hash: hasher.finalize().into(),
            prev_lt: lt.saturating_sub(u64::from(self.accounts)),
            utime: self.utime,
            total_fees: 1_000 + u64::from(index),
        }
    }
}
