//! # Ancestor Gap Filler
//!
//! Walks parent links back from a shard head until every path reaches a
//! block the tracker has already seen, and returns the unseen blocks with
//! parents before children.
//!
//! The walk uses an explicit stack, so long gaps cannot overflow the call
//! stack and a merge's two parent paths are explored left to right.

use crate::domain::{BlockRef, GapFillResult, ScanError, ShardSeqnoMap};
use crate::ports::outbound::{BlockDataProvider, ScanContext};
use std::collections::HashSet;
use std::vec;
use tracing::{debug, trace};

struct Frame {
    block: BlockRef,
    parents: Option<vec::IntoIter<BlockRef>>,
}

impl Frame {
    fn new(block: BlockRef) -> Self {
        Self {
            block,
            parents: None,
        }
    }
}

/// Discovers unseen ancestors of a shard head.
#[derive(Clone, Debug)]
pub struct AncestorGapFiller {
    max_walk_blocks: usize,
}

impl AncestorGapFiller {
    /// Create a gap filler that gives up after `max_walk_blocks` blocks.
    pub fn new(max_walk_blocks: usize) -> Self {
        Self { max_walk_blocks }
    }

    /// Unseen blocks on the ancestor paths of `head`, head last.
    ///
    /// A block stops the walk when the tracker has seen it or it is in
    /// `included` (already emitted earlier in the same master iteration).
    /// The tracker is only read.
    pub async fn fill<P: BlockDataProvider + ?Sized>(
        &self,
        ctx: &ScanContext,
        provider: &P,
        tracker: &ShardSeqnoMap,
        head: &BlockRef,
        included: &HashSet<BlockRef>,
    ) -> Result<GapFillResult, ScanError> {
        let known = |block: &BlockRef| tracker.has_seen(block) || included.contains(block);

        if known(head) {
            trace!("[qc-18] Head {} already processed", head);
            return Ok(GapFillResult::empty());
        }

        let mut blocks = Vec::new();
        let mut emitted: HashSet<BlockRef> = HashSet::new();
        let mut on_path: HashSet<BlockRef> = HashSet::from([*head]);
        let mut stack = vec![Frame::new(*head)];
        let mut visited = 0usize;

        while let Some(frame) = stack.last_mut() {
            ctx.check()?;

            if frame.parents.is_none() {
                visited += 1;
                if visited > self.max_walk_blocks {
                    return Err(ScanError::WalkLimitExceeded {
                        head: head.to_string(),
                        limit: self.max_walk_blocks,
                    });
                }
                let block = frame.block;
                let parents = ctx.guard(provider.get_parent_blocks(ctx, &block)).await?;
                frame.parents = Some(parents.into_iter());
            }

            match frame.parents.as_mut().and_then(Iterator::next) {
                Some(parent) => {
                    if known(&parent) || emitted.contains(&parent) {
                        continue;
                    }
                    if !on_path.insert(parent) {
                        return Err(ScanError::MalformedBlock(format!(
                            "parent cycle through {} while walking back from {}",
                            parent, head
                        )));
                    }
                    stack.push(Frame::new(parent));
                }
                None => {
                    let block = frame.block;
                    stack.pop();
                    on_path.remove(&block);
                    emitted.insert(block);
                    blocks.push(block);
                }
            }
        }

        debug!(
            "[qc-18] Gap fill for {}: {} block(s), {} parent lookup(s)",
            head,
            blocks.len(),
            visited
        );
        Ok(GapFillResult { blocks })
    }
}
