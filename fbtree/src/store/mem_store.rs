use super::{FiberStore, ReadOnlyStore, WriteBatch, WriteOp};
use crate::{
    error::Result,
    fiber::{Fiber, FiberId},
};
use fnv::FnvHashMap;

/// Volatile store. Everything lives in a hash map, so it needs no cache in front of it.
#[derive(Debug, Clone)]
pub struct MemStore {
    fibers: FnvHashMap<FiberId, Fiber>,
    /// parent id to child ids, in insertion order
    children: FnvHashMap<FiberId, Vec<FiberId>>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    /// Creates a store that contains just the root fiber
    pub fn new() -> Self {
        let mut fibers = FnvHashMap::default();
        fibers.insert(FiberId::root(), Fiber::root());
        Self {
            fibers,
            children: FnvHashMap::default(),
        }
    }

    fn unlink(&mut self, child: &FiberId, parent: &FiberId) {
        if let Some(siblings) = self.children.get_mut(parent) {
            siblings.retain(|id| id != child);
            if siblings.is_empty() {
                self.children.remove(parent);
            }
        }
    }

    fn put0(&mut self, fiber: Fiber) {
        let previous_parent = self.fibers.get(&fiber.id).map(|old| old.parent_id.clone());
        match previous_parent {
            Some(previous) if previous == fiber.parent_id => {}
            previous => {
                if let Some(Some(old_parent)) = previous {
                    self.unlink(&fiber.id, &old_parent);
                }
                if let Some(parent) = fiber.parent_id.as_ref() {
                    self.children
                        .entry(parent.clone())
                        .or_default()
                        .push(fiber.id.clone());
                }
            }
        }
        self.fibers.insert(fiber.id.clone(), fiber);
    }

    fn delete0(&mut self, id: &FiberId) {
        if let Some(fiber) = self.fibers.remove(id) {
            if let Some(parent) = fiber.parent_id.as_ref() {
                self.unlink(id, parent);
            }
        }
    }
}

impl ReadOnlyStore for MemStore {
    fn get(&self, id: &FiberId) -> Result<Option<Fiber>> {
        Ok(self.fibers.get(id).cloned())
    }

    fn children_of(&self, id: &FiberId) -> Result<Vec<FiberId>> {
        Ok(self.children.get(id).cloned().unwrap_or_default())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.fibers.len())
    }

    fn fibers(&self) -> Result<Vec<Fiber>> {
        Ok(self.fibers.values().cloned().collect())
    }
}

impl FiberStore for MemStore {
    fn write_batch(&mut self, batch: WriteBatch) -> Result<()> {
        for op in batch.into_ops() {
            match op {
                WriteOp::Put(fiber) => self.put0(fiber),
                WriteOp::Delete(id) => self.delete0(&id),
            }
        }
        Ok(())
    }
}
