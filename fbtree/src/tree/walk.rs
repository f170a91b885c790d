//! path resolution
//!
//! Children of a fiber are keyed by their first move, so there is at most one way to follow a path
//! from the root. Following a path ends at a [Position], which is a fiber and the number of its moves
//! that were consumed. A position at the end of a fiber's run is a *boundary*.
//!
//! Writing walks through a [Txn]. When the input leaves a run in the middle, the run is split into a
//! stub holding the common prefix and the original fiber holding the continuation. The stub takes
//! the original's place below its parent and inherits its stats; the original keeps its id, stats,
//! metadata and children. A fiber that was created by the walk itself and has not been recorded yet
//! is *fresh*, and following moves are appended to its run instead of getting fibers of their own.
use crate::{
    error::{Error, Result},
    fiber::{Fiber, FiberId, Metadata, Move, Outcome, Stats},
    store::{ReadOnlyStore, Txn},
};
use fnv::FnvHashSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Position {
    pub fiber: FiberId,
    pub offset: usize,
}

impl Position {
    fn root() -> Self {
        Self {
            fiber: FiberId::root(),
            offset: 0,
        }
    }
}

/// loads a fiber that is referenced from within the tree, so it has to be there
pub(crate) fn load<S: ReadOnlyStore + ?Sized>(store: &S, id: &FiberId) -> Result<Fiber> {
    store.get(id)?.ok_or_else(|| Error::MissingFiber(id.clone()))
}

/// the child of `parent` whose run starts with `mv`
pub(crate) fn find_child<S: ReadOnlyStore + ?Sized>(
    store: &S,
    parent: &FiberId,
    mv: &Move,
) -> Result<Option<Fiber>> {
    for id in store.children_of(parent)? {
        let child = load(store, &id)?;
        if child.first_move() == Some(mv) {
            return Ok(Some(child));
        }
    }
    Ok(None)
}

/// follows `moves` from the root without changing anything
///
/// Returns the fiber containing the last move and the number of its moves that were consumed,
/// or `None` as soon as a move has no match.
pub(crate) fn locate<S: ReadOnlyStore + ?Sized>(
    store: &S,
    moves: &[Move],
) -> Result<Option<(Fiber, usize)>> {
    let mut fiber = load(store, &FiberId::root())?;
    let mut offset = 0;
    for mv in moves {
        if offset < fiber.len() {
            if &fiber.moves[offset] != mv {
                return Ok(None);
            }
            offset += 1;
        } else {
            match find_child(store, &fiber.id, mv)? {
                Some(child) => {
                    fiber = child;
                    offset = 1;
                }
                None => return Ok(None),
            }
        }
    }
    Ok(Some((fiber, offset)))
}

/// Splits `fiber` after `at` moves and returns the stub holding the prefix.
fn split<S: ReadOnlyStore + ?Sized>(txn: &mut Txn<'_, S>, mut fiber: Fiber, at: usize) -> Fiber {
    debug_assert!(at > 0 && at < fiber.len());
    let tail = fiber.moves.split_off(at);
    let stub = Fiber {
        id: FiberId::random(),
        parent_id: fiber.parent_id.take(),
        moves: std::mem::replace(&mut fiber.moves, tail),
        stats: fiber.stats,
        metadata: Metadata::new(),
    };
    fiber.parent_id = Some(stub.id.clone());
    debug!(
        "split fiber {} after {} moves, prefix moved to {}",
        fiber.id, at, stub.id
    );
    txn.put(stub.clone());
    txn.put(fiber);
    stub
}

/// A path being written, move by move
#[derive(Debug, Clone)]
pub(crate) struct Walk {
    position: Position,
    /// every fiber the walk went through, each exactly once, in path order
    touched: Vec<FiberId>,
    /// fibers created by this walk
    created: FnvHashSet<FiberId>,
    fresh: Option<FiberId>,
    moves: Vec<Move>,
}

impl Walk {
    /// a walk starting at the root, which counts as touched
    pub fn from_root() -> Self {
        Self {
            position: Position::root(),
            touched: vec![FiberId::root()],
            created: FnvHashSet::default(),
            fresh: None,
            moves: Vec::new(),
        }
    }

    /// a walk starting at the end of `fiber`, which does not count as touched
    pub fn below(fiber: &Fiber) -> Self {
        Self {
            position: Position {
                fiber: fiber.id.clone(),
                offset: fiber.len(),
            },
            touched: Vec::new(),
            created: FnvHashSet::default(),
            fresh: None,
            moves: Vec::new(),
        }
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn touched(&self) -> &[FiberId] {
        &self.touched
    }

    pub fn was_created(&self, id: &FiberId) -> bool {
        self.created.contains(id)
    }

    /// the fiber containing the last move, or the root for an empty walk
    pub fn terminal(&self) -> &FiberId {
        &self.position.fiber
    }

    /// stops extending the last created run, so the next move gets a fiber of its own
    pub fn seal(&mut self) {
        self.fresh = None;
    }

    fn replace_tail(&mut self, id: FiberId) {
        debug_assert_eq!(self.touched.last(), Some(&self.position.fiber));
        if let Some(last) = self.touched.last_mut() {
            *last = id;
        }
    }

    fn branch<S: ReadOnlyStore + ?Sized>(&mut self, txn: &mut Txn<'_, S>, parent: &FiberId, mv: Move) {
        let child = Fiber::child_of(parent, vec![mv]);
        debug!("new fiber {} below {}", child.id, parent);
        self.touched.push(child.id.clone());
        self.created.insert(child.id.clone());
        self.fresh = Some(child.id.clone());
        self.position = Position {
            fiber: child.id.clone(),
            offset: 1,
        };
        txn.put(child);
    }

    /// follows or creates the next move
    pub fn step<S: ReadOnlyStore + ?Sized>(&mut self, txn: &mut Txn<'_, S>, mv: Move) -> Result<()> {
        self.moves.push(mv.clone());
        let mut fiber = load(&*txn, &self.position.fiber)?;
        if self.position.offset < fiber.len() {
            if fiber.moves[self.position.offset] == mv {
                self.position.offset += 1;
            } else {
                let stub = split(txn, fiber, self.position.offset);
                self.replace_tail(stub.id.clone());
                self.branch(txn, &stub.id, mv);
            }
        } else if let Some(child) = find_child(&*txn, &fiber.id, &mv)? {
            self.touched.push(child.id.clone());
            self.fresh = None;
            self.position = Position {
                fiber: child.id,
                offset: 1,
            };
        } else if self.fresh.as_ref() == Some(&fiber.id) {
            fiber.moves.push(mv);
            self.position.offset = fiber.len();
            debug!("extended fiber {} to {} moves", fiber.id, fiber.len());
            txn.put(fiber);
        } else {
            self.branch(txn, &fiber.id, mv);
        }
        Ok(())
    }

    pub fn extend<S: ReadOnlyStore + ?Sized>(
        &mut self,
        txn: &mut Txn<'_, S>,
        moves: impl IntoIterator<Item = Move>,
    ) -> Result<()> {
        for mv in moves {
            self.step(txn, mv)?;
        }
        Ok(())
    }

    /// makes sure the walk ends on a fiber boundary, splitting the last fiber if necessary
    pub fn end_at_boundary<S: ReadOnlyStore + ?Sized>(&mut self, txn: &mut Txn<'_, S>) -> Result<()> {
        let fiber = load(&*txn, &self.position.fiber)?;
        if self.position.offset < fiber.len() {
            let stub = split(txn, fiber, self.position.offset);
            self.replace_tail(stub.id.clone());
            self.position = Position {
                offset: stub.len(),
                fiber: stub.id,
            };
        }
        Ok(())
    }

    /// replaces the stats of every touched fiber with `f(stats)`
    ///
    /// `None` from `f` fails the whole update with [`Error::StatsOverflow`].
    pub fn update_stats<S: ReadOnlyStore + ?Sized>(
        &self,
        txn: &mut Txn<'_, S>,
        mut f: impl FnMut(&Stats) -> Option<Stats>,
    ) -> Result<()> {
        for id in &self.touched {
            let mut fiber = load(&*txn, id)?;
            fiber.stats = f(&fiber.stats).ok_or_else(|| Error::StatsOverflow(id.clone()))?;
            txn.put(fiber);
        }
        Ok(())
    }

    /// records `times` visits ending in `outcome` on every touched fiber
    pub fn record<S: ReadOnlyStore + ?Sized>(
        &self,
        txn: &mut Txn<'_, S>,
        outcome: Outcome,
        times: u64,
    ) -> Result<()> {
        self.update_stats(txn, |stats| stats.checked_record(outcome, times))
    }
}
