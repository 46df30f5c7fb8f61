//! # Domain Value Objects
//!
//! Immutable value types for the Shard Scanner: shard identities, block
//! references and transaction records.

use super::errors::Hash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Workchain id of the master chain.
pub const MASTERCHAIN_ID: i32 = -1;

/// Shard bitmask covering the whole account space (no split).
pub const SHARD_FULL: u64 = 0x8000_0000_0000_0000;

/// Identity of a shard lane: (workchain, shard bitmask).
///
/// The bitmask encodes the shard prefix followed by a single tag bit; the
/// lowest set bit marks where the prefix ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardKey {
    /// Workchain id.
    pub workchain: i32,
    /// Shard bitmask.
    pub shard: u64,
}

impl ShardKey {
    /// Create a new shard key.
    pub fn new(workchain: i32, shard: u64) -> Self {
        Self { workchain, shard }
    }

    /// The master chain lane.
    pub fn masterchain() -> Self {
        Self::new(MASTERCHAIN_ID, SHARD_FULL)
    }

    /// Shard covering the whole workchain.
    pub fn full(workchain: i32) -> Self {
        Self::new(workchain, SHARD_FULL)
    }

    /// Is this the master chain lane?
    pub fn is_masterchain(&self) -> bool {
        self.workchain == MASTERCHAIN_ID
    }

    /// Does this shard cover the whole workchain?
    pub fn is_full(&self) -> bool {
        self.shard == SHARD_FULL
    }

    fn tag_bit(&self) -> u64 {
        self.shard & self.shard.wrapping_neg()
    }

    /// Number of prefix bits before the tag bit.
    pub fn prefix_len(&self) -> u32 {
        63u32.saturating_sub(self.shard.trailing_zeros())
    }

    /// Children of a split: (left, right). `None` once the prefix is exhausted.
    pub fn split(&self) -> Option<(ShardKey, ShardKey)> {
        let tag = self.tag_bit();
        if tag <= 1 {
            return None;
        }
        let half = tag >> 1;
        Some((
            Self::new(self.workchain, self.shard - half),
            Self::new(self.workchain, self.shard + half),
        ))
    }

    /// Lane this shard merges back into. `None` for the full shard.
    pub fn parent(&self) -> Option<ShardKey> {
        if self.is_full() || self.shard == 0 {
            return None;
        }
        let up = self.tag_bit() << 1;
        Some(Self::new(self.workchain, (self.shard & up.wrapping_neg()) | up))
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:016x}", self.workchain, self.shard)
    }
}

/// Reference to a block on any chain.
///
/// `root_hash`/`file_hash` are the opaque identity the provider needs to
/// fetch data for this block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRef {
    /// Workchain id.
    pub workchain: i32,
    /// Shard bitmask.
    pub shard: u64,
    /// Sequence number within the lane.
    pub seqno: u32,
    /// Root hash.
    pub root_hash: Hash,
    /// File hash.
    pub file_hash: Hash,
}

impl BlockRef {
    /// Create a new block reference.
    pub fn new(key: ShardKey, seqno: u32, root_hash: Hash, file_hash: Hash) -> Self {
        Self {
            workchain: key.workchain,
            shard: key.shard,
            seqno,
            root_hash,
            file_hash,
        }
    }

    /// Lane this block belongs to.
    pub fn shard_key(&self) -> ShardKey {
        ShardKey::new(self.workchain, self.shard)
    }

    /// Is this a master chain block?
    pub fn is_masterchain(&self) -> bool {
        self.workchain == MASTERCHAIN_ID
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{:016x},{})", self.workchain, self.shard, self.seqno)
    }
}

/// Account identity (256-bit account id within a workchain).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    /// Hex form used in log lines.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Cursor value for transaction pagination: (account, logical time).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId {
    /// Account that owns the transaction.
    pub account: AccountId,
    /// Logical time.
    pub lt: u64,
}

impl TransactionId {
    /// Create a transaction id.
    pub fn new(account: AccountId, lt: u64) -> Self {
        Self { account, lt }
    }
}

/// One page of transaction ids.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPage {
    /// Ids in cursor order.
    pub ids: Vec<TransactionId>,
    /// Are there more ids after the last one?
    pub has_more: bool,
}

impl TransactionPage {
    /// Create a page.
    pub fn new(ids: Vec<TransactionId>, has_more: bool) -> Self {
        Self { ids, has_more }
    }

    /// Cursor for the next request.
    pub fn cursor(&self) -> Option<&TransactionId> {
        self.ids.last()
    }
}

/// Full transaction record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Block containing the transaction.
    pub block: BlockRef,
    /// Account the transaction belongs to.
    pub account: AccountId,
    /// Logical time.
    pub lt: u64,
    /// Transaction hash.
    pub hash: Hash,
    /// Logical time of the account's previous transaction.
    pub prev_lt: u64,
    /// Unix time the transaction was generated.
    pub utime: u32,
    /// Fees collected, in nano units.
    pub total_fees: u64,
}

impl Transaction {
    /// Cursor id of this transaction.
    pub fn id(&self) -> TransactionId {
        TransactionId::new(self.account, self.lt)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tx {} lt={} account={} utime={} fees={} block={}",
            hex::encode(&self.hash[..8]),
            self.lt,
            self.account.to_hex(),
            self.utime,
            self.total_fees,
            self.block
        )
    }
}

/// Master seqno range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeqnoRange {
    /// First master seqno to scan.
    pub start: u32,
    /// One past the last master seqno to scan.
    pub end: u32,
}

impl SeqnoRange {
    /// Create a range.
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Number of master blocks in the range.
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Is the range empty?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
