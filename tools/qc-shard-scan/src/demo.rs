//! Demo chain: one workchain whose single shard splits and merges twice
//! inside the scanned range, with seqno holes between master blocks.

use anyhow::Result;
use qc_18_shard_scanner::{ChainBuilder, ChainFixture, ShardKey};

/// Master seqnos (relative to the range start) where topology changes.
const SPLIT_AT: [u32; 2] = [32, 279];
const MERGE_AT: [u32; 2] = [92, 339];

/// Build a chain whose master blocks cover `[start - 1, end)`, or
/// `[0, end)` when `start` is 0.
pub fn demo_chain(start: u32, end: u32) -> Result<ChainFixture> {
    let workchain = ShardKey::full(0);
    let first = start.saturating_sub(1);

    let mut builder = ChainBuilder::new(first);
    builder.open_lane(workchain, 2_756_400)?;
    builder.seal_master();

    for seqno in (first + 1)..end {
        let offset = seqno - start;
        builder.transactions_per_block(offset % 5);

        if SPLIT_AT.contains(&offset) && builder.tip(&workchain).is_some() {
            builder.split(workchain)?;
        } else if MERGE_AT.contains(&offset) {
            if let Some((left, right)) = workchain.split() {
                if builder.tip(&left).is_some() && builder.tip(&right).is_some() {
                    builder.merge(left, right)?;
                }
            }
        } else {
            for (i, lane) in builder.lanes().into_iter().enumerate() {
                // Every third master skips a shard block, leaving a hole.
                let blocks = if (offset + i as u32) % 3 == 0 { 2 } else { 1 };
                builder.advance(lane, blocks)?;
            }
        }
        builder.seal_master();
    }

    Ok(builder.into_fixture())
}
