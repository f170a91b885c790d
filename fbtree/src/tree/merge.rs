use super::{walk, FiberTree, Mode, Walk};
use crate::{
    error::{Error, Result},
    fiber::{Fiber, FiberId},
};
use derive_more::Display;
use std::str::FromStr;
use tracing::info;

/// How to combine a fiber that exists in both trees of a merge
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictStrategy {
    /// add up all counters, keep existing metadata and add missing keys
    #[default]
    #[display(fmt = "stats_sum")]
    StatsSum,
    /// leave the receiving tree's fiber alone
    #[display(fmt = "keep_existing")]
    KeepExisting,
    /// replace stats and metadata with the other tree's
    #[display(fmt = "overwrite")]
    Overwrite,
}

impl FromStr for ConflictStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stats_sum" => Ok(Self::StatsSum),
            "keep_existing" => Ok(Self::KeepExisting),
            "overwrite" => Ok(Self::Overwrite),
            other => Err(Error::UnknownConflictStrategy(other.to_owned())),
        }
    }
}

impl ConflictStrategy {
    /// combines `theirs` into `ours`, returns true if `ours` changed
    fn resolve(self, ours: &mut Fiber, theirs: &Fiber) -> Result<bool> {
        Ok(match self {
            Self::StatsSum => {
                ours.stats = ours
                    .stats
                    .checked_combine(&theirs.stats)
                    .ok_or_else(|| Error::StatsOverflow(ours.id.clone()))?;
                for (key, value) in &theirs.metadata {
                    ours.metadata
                        .entry(key.clone())
                        .or_insert_with(|| value.clone());
                }
                true
            }
            Self::KeepExisting => false,
            Self::Overwrite => {
                ours.stats = theirs.stats;
                ours.metadata = theirs.metadata.clone();
                true
            }
        })
    }
}

impl FiberTree {
    /// Merges all paths of `other` into this tree.
    ///
    /// Paths that only exist in `other` are created with the other tree's stats and metadata, fibers
    /// on paths that exist in both are combined according to `strategy`. The other tree is not
    /// changed. Everything is committed as one batch. Returns the number of fibers added or updated.
    pub fn merge(&mut self, other: &FiberTree, strategy: ConflictStrategy) -> Result<usize> {
        self.require("merge", &[Mode::Idle])?;
        let theirs = other.store.as_ref();
        let (added, updated) = self.transact(|txn| {
            let mut added = 0usize;
            let mut updated = 0usize;
            let their_root = walk::load(theirs, &FiberId::root())?;
            let mut root = walk::load(&*txn, &FiberId::root())?;
            if strategy.resolve(&mut root, &their_root)? {
                updated += 1;
                txn.put(root);
            }
            // each of their fibers together with the fiber its run ends in on our side
            let mut stack = vec![(FiberId::root(), FiberId::root())];
            while let Some((their_id, anchor)) = stack.pop() {
                for child_id in theirs.children_of(&their_id)? {
                    let child = walk::load(theirs, &child_id)?;
                    let mut segment = Walk::below(&walk::load(&*txn, &anchor)?);
                    segment.extend(txn, child.moves.iter().cloned())?;
                    segment.end_at_boundary(txn)?;
                    for id in segment.touched() {
                        let mut fiber = walk::load(&*txn, id)?;
                        if segment.was_created(id) {
                            fiber.stats = child.stats;
                            fiber.metadata = child.metadata.clone();
                            added += 1;
                        } else if strategy.resolve(&mut fiber, &child)? {
                            updated += 1;
                        } else {
                            continue;
                        }
                        txn.put(fiber);
                    }
                    stack.push((child.id, segment.terminal().clone()));
                }
            }
            Ok((added, updated))
        })?;
        info!(
            "merged with {}: {} fibers added, {} updated",
            strategy, added, updated
        );
        Ok(added + updated)
    }
}
