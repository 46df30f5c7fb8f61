//! # Domain Invariants
//!
//! Rules that must hold for every scan.

use super::errors::ScanError;
use super::value_objects::{BlockRef, ShardKey};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Default transaction page size.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Default cap on blocks visited by one ancestor walk.
pub const DEFAULT_MAX_WALK_BLOCKS: usize = 10_000;

/// Default retry attempts per master iteration.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Invariant: a lane's tracked seqno never moves backwards.
pub fn invariant_monotonic(
    key: &ShardKey,
    previous: Option<u32>,
    next: u32,
) -> Result<(), ScanError> {
    match previous {
        Some(prev) if next < prev => Err(ScanError::MalformedBlock(format!(
            "seqno regression on {}: {} -> {}",
            key, prev, next
        ))),
        _ => Ok(()),
    }
}

/// Invariant: no block is emitted twice within one iteration.
pub fn invariant_no_duplicates(blocks: &[BlockRef]) -> Result<(), ScanError> {
    let mut seen = HashSet::with_capacity(blocks.len());
    for block in blocks {
        if !seen.insert(*block) {
            return Err(ScanError::MalformedBlock(format!(
                "block {} emitted twice",
                block
            )));
        }
    }
    Ok(())
}

/// Invariant: every block's parent, when present in `blocks`, comes first.
pub fn invariant_parents_first(
    blocks: &[BlockRef],
    parents: &HashMap<BlockRef, Vec<BlockRef>>,
) -> Result<(), ScanError> {
    let position: HashMap<&BlockRef, usize> =
        blocks.iter().enumerate().map(|(i, b)| (b, i)).collect();

    for (i, block) in blocks.iter().enumerate() {
        for parent in parents.get(block).into_iter().flatten() {
            if let Some(&p) = position.get(parent) {
                if p >= i {
                    return Err(ScanError::MalformedBlock(format!(
                        "parent {} emitted after child {}",
                        parent, block
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Invariant: per lane, discovered seqnos form one continuous run.
pub fn invariant_lane_continuity(blocks: &[BlockRef]) -> Result<(), ScanError> {
    let mut lanes: BTreeMap<ShardKey, Vec<u32>> = BTreeMap::new();
    for block in blocks {
        lanes.entry(block.shard_key()).or_default().push(block.seqno);
    }

    for (key, mut seqnos) in lanes {
        seqnos.sort_unstable();
        for pair in seqnos.windows(2) {
            if pair[1] != pair[0] + 1 {
                return Err(ScanError::MalformedBlock(format!(
                    "lane {} jumps from {} to {}",
                    key, pair[0], pair[1]
                )));
            }
        }
    }
    Ok(())
}
