//! the fiber tree engine
use crate::{
    config::{Config, StorageKind},
    error::{Error, Result},
    fiber::{Fiber, FiberId, Move, Stats},
    store::{BoxFiberStore, FiberStore, MemCache, MemStore, ReadOnlyStore, SqliteStore, Txn},
};
use derive_more::Display;
use fnv::FnvHashSet;
use serde::Serialize;
use std::{collections::BTreeMap, fmt, path::Path};
use tracing::{debug, info, warn};
mod merge;
mod prune;
mod query;
mod walk;
mod write;

pub use merge::ConflictStrategy;
pub use query::{Continuation, PathDiversity, PathStatistics};
pub(crate) use walk::Walk;

/// What the tree currently accepts
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// only queries and structural operations
    #[display(fmt = "idle")]
    Idle,
    /// a single path is being recorded, ends with an outcome
    #[display(fmt = "building a path")]
    PathBuilding,
    /// a long path is being recorded, with any number of intermediate outcomes
    #[display(fmt = "in adding mode")]
    Adding,
}

/// Outcome counters of a fiber, together with the derived win rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Statistics {
    pub visit_count: u64,
    pub win_count: u64,
    pub loss_count: u64,
    pub draw_count: u64,
    pub win_rate: f64,
}

impl From<Stats> for Statistics {
    fn from(stats: Stats) -> Self {
        Self {
            visit_count: stats.visit_count,
            win_count: stats.win_count,
            loss_count: stats.loss_count,
            draw_count: stats.draw_count,
            win_rate: stats.win_rate(),
        }
    }
}

type StoreTxn<'a> = Txn<'a, dyn FiberStore + Send + 'static>;

/// A tree of fibers, holding branching move sequences and their outcome statistics
///
/// All fibers live in the store the tree was created with. The tree itself only holds the
/// recording [Mode] and the cursor of the path being recorded.
pub struct FiberTree {
    pub(crate) store: BoxFiberStore,
    mode: Mode,
    /// the path being recorded, or the last one while idle
    pub(crate) cursor: Walk,
}

impl fmt::Debug for FiberTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiberTree")
            .field("mode", &self.mode)
            .field("cursor", &self.cursor)
            .finish()
    }
}

/// visits every fiber depth first, parents before children, together with the moves from the root
/// up to and including its own run
pub(crate) fn visit<S: ReadOnlyStore + ?Sized>(
    store: &S,
    mut f: impl FnMut(&Fiber, &[Move]) -> Result<()>,
) -> Result<()> {
    let mut path = Vec::new();
    let mut stack = vec![(FiberId::root(), 0)];
    while let Some((id, base)) = stack.pop() {
        let fiber = walk::load(store, &id)?;
        path.truncate(base);
        path.extend(fiber.moves.iter().cloned());
        f(&fiber, &path)?;
        let depth = path.len();
        let children = store.children_of(&id)?;
        stack.extend(children.into_iter().rev().map(|child| (child, depth)));
    }
    Ok(())
}

impl FiberTree {
    /// creates a tree with the configured backend, or opens the existing one
    pub fn new(config: Config) -> Result<Self> {
        let store: BoxFiberStore = match config.storage {
            StorageKind::Memory => Box::new(MemStore::new()),
            StorageKind::Sqlite { path } => Box::new(MemCache::new(
                SqliteStore::open(path)?,
                config.cache_capacity,
            )),
        };
        Self::with_store(store)
    }

    /// a volatile tree
    pub fn memory() -> Self {
        Self::from_parts(Box::new(MemStore::new()))
    }

    /// opens the SQLite file at `path` with a default sized cache, creating it if necessary
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Config::sqlite(path.as_ref()))
    }

    /// a tree on top of an arbitrary store
    pub fn with_store(mut store: BoxFiberStore) -> Result<Self> {
        if store.get(&FiberId::root())?.is_none() {
            warn!("store has no root fiber, creating one");
            store.put(Fiber::root())?;
        }
        let tree = Self::from_parts(store);
        info!("opened fiber tree with {} fibers", tree.store.count()?);
        Ok(tree)
    }

    fn from_parts(store: BoxFiberStore) -> Self {
        Self {
            store,
            mode: Mode::Idle,
            cursor: Walk::from_root(),
        }
    }

    /// releases the backend, flushing nothing since every operation is already committed
    pub fn close(self) -> Result<()> {
        debug!("closing fiber tree");
        self.store.close()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub(crate) fn require(&self, operation: &'static str, allowed: &[Mode]) -> Result<()> {
        if allowed.contains(&self.mode) {
            Ok(())
        } else {
            Err(Error::InvalidModeTransition {
                operation,
                mode: self.mode,
            })
        }
    }

    /// runs `f` against a staged view of the store and commits what it staged as one batch
    ///
    /// If `f` fails, nothing is written.
    fn transact<T>(&mut self, f: impl FnOnce(&mut StoreTxn<'_>) -> Result<T>) -> Result<T> {
        let (value, batch) = {
            let mut txn = Txn::new(self.store.as_ref());
            let value = f(&mut txn)?;
            (value, txn.into_batch())
        };
        if !batch.is_empty() {
            debug!("committing {} changes", batch.len());
            self.store.write_batch(batch)?;
        }
        Ok(value)
    }

    /// number of fibers, including the root
    pub fn len(&self) -> Result<usize> {
        self.store.count()
    }

    /// true if nothing but the root is stored
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? <= 1)
    }

    pub fn get_fiber(&self, id: &FiberId) -> Result<Option<Fiber>> {
        self.store.get(id)
    }

    /// direct children of a fiber, in the order they were created
    pub fn children(&self, id: &FiberId) -> Result<Vec<Fiber>> {
        self.store
            .children_of(id)?
            .iter()
            .map(|child| walk::load(self.store.as_ref(), child))
            .collect()
    }

    pub fn get_statistics(&self, id: &FiberId) -> Result<Option<Statistics>> {
        Ok(self.store.get(id)?.map(|fiber| fiber.stats.into()))
    }

    /// statistics of the fiber the current or last recorded path ends in
    pub fn current_statistics(&self) -> Result<Option<Statistics>> {
        self.get_statistics(self.cursor.terminal())
    }

    /// moves of the current or last recorded path
    pub fn get_complete_path(&self) -> Vec<Move> {
        self.cursor.moves().to_vec()
    }

    pub fn get_all_fibers(&self) -> Result<BTreeMap<FiberId, Fiber>> {
        Ok(self
            .store
            .fibers()?
            .into_iter()
            .map(|fiber| (fiber.id.clone(), fiber))
            .collect())
    }

    /// all fibers, ordered by id
    pub fn iter(&self) -> Result<impl Iterator<Item = (FiberId, Fiber)>> {
        Ok(self.get_all_fibers()?.into_iter())
    }

    /// the moves leading from the root to the end of the fiber's run, `None` for an unknown id
    pub fn path_to_fiber(&self, id: &FiberId) -> Result<Option<Vec<Move>>> {
        let mut fiber = match self.store.get(id)? {
            Some(fiber) => fiber,
            None => return Ok(None),
        };
        let mut runs = Vec::new();
        let mut seen = FnvHashSet::default();
        loop {
            if !seen.insert(fiber.id.clone()) {
                warn!("parent chain of fiber {} loops through {}", id, fiber.id);
                return Ok(None);
            }
            let parent = fiber.parent_id.take();
            runs.push(fiber.moves);
            match parent {
                Some(parent) => fiber = walk::load(self.store.as_ref(), &parent)?,
                None => break,
            }
        }
        Ok(Some(runs.into_iter().rev().flatten().collect()))
    }
}
