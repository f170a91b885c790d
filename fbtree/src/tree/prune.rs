use super::{visit, FiberTree, Mode};
use crate::{error::Result, store::WriteBatch};
use fnv::FnvHashSet;
use tracing::info;

impl FiberTree {
    /// Removes every fiber with fewer than `min_visits` visits that has no descendant which stays.
    ///
    /// The root always stays. All removals are committed as one batch. Returns the number of
    /// removed fibers.
    pub fn prune_tree(&mut self, min_visits: u64) -> Result<usize> {
        self.require("prune the tree", &[Mode::Idle])?;
        let mut preorder = Vec::new();
        visit(self.store.as_ref(), |fiber, _| {
            preorder.push((
                fiber.id.clone(),
                fiber.parent_id.clone(),
                fiber.stats.visit_count,
            ));
            Ok(())
        })?;
        // reversed preorder sees all descendants of a fiber before the fiber itself
        let mut has_survivors = FnvHashSet::default();
        let mut batch = WriteBatch::new();
        for (id, parent, visits) in preorder.into_iter().rev() {
            let keep = parent.is_none() || visits >= min_visits || has_survivors.contains(&id);
            match (keep, parent) {
                (true, Some(parent)) => {
                    has_survivors.insert(parent);
                }
                (true, None) => {}
                (false, _) => batch.delete(id),
            }
        }
        let removed = batch.len();
        if removed > 0 {
            self.store.write_batch(batch)?;
        }
        info!("pruned {} fibers with less than {} visits", removed, min_visits);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::Error,
        fiber::{FiberId, Move, Outcome},
        store::FiberStore,
    };

    fn moves(values: &[i32]) -> Vec<Move> {
        values.iter().copied().map(Move::new).collect()
    }

    #[test]
    fn prunes_rarely_visited_branches() -> anyhow::Result<()> {
        let mut tree = FiberTree::memory();
        tree.simulate_path(&moves(&[1, 2]), Outcome::Win, 5, true)?;
        tree.simulate_path(&moves(&[1, 3]), Outcome::Loss, 1, true)?;
        tree.simulate_path(&moves(&[4]), Outcome::Draw, 2, true)?;
        let before = tree.len()?;
        let removed = tree.prune_tree(3)?;
        assert_eq!(removed, 2);
        assert_eq!(tree.len()?, before - removed);
        assert!(tree.find_path(&moves(&[1, 2]))?.is_some());
        assert!(tree.find_path(&moves(&[1, 3]))?.is_none());
        assert!(tree.find_path(&moves(&[4]))?.is_none());
        for (id, fiber) in tree.iter()? {
            assert!(id.is_root() || fiber.stats.visit_count >= 3);
        }
        Ok(())
    }

    #[test]
    fn ancestors_of_survivors_stay() -> anyhow::Result<()> {
        let mut tree = FiberTree::memory();
        tree.simulate_path(&moves(&[1, 2]), Outcome::Win, 1, false)?;
        tree.simulate_path(&moves(&[1, 3]), Outcome::Win, 1, false)?;
        let leaf = tree.find_path(&moves(&[1, 2]))?.expect("created");
        // stats only on the leaf, as a merge with overwrite could leave it
        let mut fiber = tree.get_fiber(&leaf)?.expect("stored");
        fiber.stats = crate::fiber::Stats {
            visit_count: 10,
            win_count: 10,
            ..Default::default()
        };
        tree.store.put(fiber)?;
        let removed = tree.prune_tree(5)?;
        // only the unvisited [3] goes, its parent [1] is kept for [2]
        assert_eq!(removed, 1);
        assert_eq!(tree.path_to_fiber(&leaf)?, Some(moves(&[1, 2])));
        Ok(())
    }

    #[test]
    fn root_is_never_pruned() -> anyhow::Result<()> {
        let mut tree = FiberTree::memory();
        tree.simulate_path(&moves(&[1]), Outcome::Win, 1, true)?;
        assert_eq!(tree.prune_tree(u64::MAX)?, 1);
        assert_eq!(tree.len()?, 1);
        assert!(tree.get_fiber(&FiberId::root())?.is_some());
        Ok(())
    }

    #[test]
    fn prune_needs_idle() -> anyhow::Result<()> {
        let mut tree = FiberTree::memory();
        tree.start_path()?;
        assert!(matches!(
            tree.prune_tree(1),
            Err(Error::InvalidModeTransition { .. })
        ));
        Ok(())
    }
}
