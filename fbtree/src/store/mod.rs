//! interface to the fiber storage backends
//!
//! There are two backends, [MemStore] (volatile) and [SqliteStore] (durable, single file). The tree
//! engine only ever talks to them through [FiberStore], so they are interchangeable. [MemCache] can be
//! put in front of any store to keep a bounded working set of recently used fibers in memory.
use crate::{
    error::Result,
    fiber::{Fiber, FiberId},
};
mod mem_cache;
mod mem_store;
#[cfg(feature = "metrics")]
pub(crate) mod prom;
mod sqlite;
mod txn;

pub use mem_cache::MemCache;
pub use mem_store::MemStore;
pub use sqlite::SqliteStore;
pub(crate) use txn::Txn;

pub trait ReadOnlyStore {
    /// the fiber with the given id, `None` if there is no such fiber
    fn get(&self, id: &FiberId) -> Result<Option<Fiber>>;

    /// ids of all fibers whose parent is `id`, in insertion order
    fn children_of(&self, id: &FiberId) -> Result<Vec<FiberId>>;

    /// total number of stored fibers, including the root
    fn count(&self) -> Result<usize>;

    /// all stored fibers, in no particular order
    fn fibers(&self) -> Result<Vec<Fiber>>;
}

/// A single change to the store
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Put(Fiber),
    Delete(FiberId),
}

/// A sequence of changes that is applied completely or not at all
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch(Vec<WriteOp>);

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// inserts or fully overwrites the fiber with the same id
    pub fn put(&mut self, fiber: Fiber) {
        self.0.push(WriteOp::Put(fiber));
    }

    pub fn delete(&mut self, id: FiberId) {
        self.0.push(WriteOp::Delete(id));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.0
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.0
    }
}

pub trait FiberStore: ReadOnlyStore {
    /// applies all ops of the batch in order, atomically
    fn write_batch(&mut self, batch: WriteBatch) -> Result<()>;

    /// inserts or fully overwrites a fiber. Idempotent.
    fn put(&mut self, fiber: Fiber) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.put(fiber);
        self.write_batch(batch)
    }

    /// removes a fiber, no-op if it is not there
    fn delete(&mut self, id: &FiberId) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete(id.clone());
        self.write_batch(batch)
    }

    /// releases whatever external resource the store holds
    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// A store, we use dyn to avoid having just another type parameter
pub type BoxFiberStore = Box<dyn FiberStore + Send + 'static>;
