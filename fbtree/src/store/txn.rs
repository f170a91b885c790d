use super::{ReadOnlyStore, WriteBatch};
use crate::{
    error::Result,
    fiber::{Fiber, FiberId},
};
use fnv::{FnvHashMap, FnvHashSet};

/// Staged changes on top of a read-only view of a store
///
/// Mutating tree operations make all their changes through a `Txn`, which sees its own writes,
/// and then commit them to the store as a single [WriteBatch]. If anything fails before the commit,
/// the store is untouched.
pub(crate) struct Txn<'a, S: ?Sized> {
    store: &'a S,
    /// `None` marks a staged delete
    staged: FnvHashMap<FiberId, Option<Fiber>>,
    /// children that were staged below a parent, possibly stale
    staged_children: FnvHashMap<FiberId, Vec<FiberId>>,
    /// order in which ids were first staged, so the batch replays deterministically
    order: Vec<FiberId>,
}

impl<'a, S: ReadOnlyStore + ?Sized> Txn<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            staged: FnvHashMap::default(),
            staged_children: FnvHashMap::default(),
            order: Vec::new(),
        }
    }

    fn stage(&mut self, id: FiberId, fiber: Option<Fiber>) {
        if !self.staged.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.staged.insert(id, fiber);
    }

    pub fn put(&mut self, fiber: Fiber) {
        if let Some(parent) = fiber.parent_id.as_ref() {
            let siblings = self.staged_children.entry(parent.clone()).or_default();
            if !siblings.contains(&fiber.id) {
                siblings.push(fiber.id.clone());
            }
        }
        self.stage(fiber.id.clone(), Some(fiber));
    }

    pub fn delete(&mut self, id: &FiberId) {
        self.stage(id.clone(), None);
    }

    /// whether `child`, once listed below `parent` somewhere, is still a child of it
    fn is_child(&self, child: &FiberId, parent: &FiberId) -> bool {
        match self.staged.get(child) {
            None => true,
            Some(None) => false,
            Some(Some(fiber)) => fiber.parent_id.as_ref() == Some(parent),
        }
    }

    pub fn into_batch(mut self) -> WriteBatch {
        let mut batch = WriteBatch::new();
        for id in self.order {
            match self.staged.remove(&id) {
                Some(Some(fiber)) => batch.put(fiber),
                Some(None) => batch.delete(id),
                None => {}
            }
        }
        batch
    }
}

impl<'a, S: ReadOnlyStore + ?Sized> ReadOnlyStore for Txn<'a, S> {
    fn get(&self, id: &FiberId) -> Result<Option<Fiber>> {
        match self.staged.get(id) {
            Some(staged) => Ok(staged.clone()),
            None => self.store.get(id),
        }
    }

    fn children_of(&self, id: &FiberId) -> Result<Vec<FiberId>> {
        let mut seen = FnvHashSet::default();
        let stored = self.store.children_of(id)?;
        let staged = self.staged_children.get(id).into_iter().flatten().cloned();
        Ok(stored
            .into_iter()
            .chain(staged)
            .filter(|child| self.is_child(child, id) && seen.insert(child.clone()))
            .collect())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.fibers()?.len())
    }

    fn fibers(&self) -> Result<Vec<Fiber>> {
        let mut result = self
            .store
            .fibers()?
            .into_iter()
            .filter(|fiber| !self.staged.contains_key(&fiber.id))
            .collect::<Vec<_>>();
        result.extend(self.staged.values().flatten().cloned());
        Ok(result)
    }
}
