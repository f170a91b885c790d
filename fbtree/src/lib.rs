//! # Fiber trees
//!
//! A fiber tree records many overlapping sequences of discrete decisions ("paths", for example the
//! moves of a game) and keeps outcome statistics for every prefix. It answers questions like
//! "what has historically happened after these moves" without scanning all recorded paths.
//!
//! Paths share their prefixes. A run of moves that never branched is stored as a single node, a
//! *fiber*, so the number of stored nodes stays close to the number of branch points rather than the
//! number of moves. When a new path leaves a run in the middle, the run is split in two.
//!
//! ## Recording
//!
//! Paths are recorded either move by move, using [FiberTree::start_path], [FiberTree::add_move] and
//! [FiberTree::record_outcome], or in one go using [FiberTree::simulate_path]. Long paths with
//! intermediate results can be recorded in *adding mode*, see [FiberTree::start_adding_mode].
//!
//! Every recorded outcome is added to the stats of every fiber on the path, including the root.
//!
//! ## Storage
//!
//! Fibers live in a [FiberStore](store::FiberStore). There is a volatile backend
//! ([MemStore](store::MemStore)) and a durable backend storing one row per fiber in a single SQLite
//! file ([SqliteStore](store::SqliteStore)). The durable backend is normally used through a bounded
//! LRU cache ([MemCache](store::MemCache)).
//!
//! Every mutating operation is committed as a single atomic batch, so it either fully applies or
//! leaves the store untouched.
//!
//! ## Snapshots
//!
//! A whole tree can be exported to and imported from a backend independent JSON document, see
//! [snapshot].
//!
//! ```
//! use fbtree::{FiberTree, Move, Outcome};
//!
//! let mut tree = FiberTree::memory();
//! let moves = [Move::new(112), Move::new(113)];
//! tree.simulate_path(&moves, Outcome::Win, 1, true)?;
//! let best = tree.get_best_continuation(&moves[..1], 3, 0)?;
//! assert_eq!(best[0].mv, Move::new(113));
//! # Ok::<(), fbtree::Error>(())
//! ```
pub mod config;
pub mod error;
pub mod fiber;
pub mod snapshot;
pub mod store;
pub mod tree;

pub use config::{Config, StorageKind};
pub use error::{Error, Result};
pub use fiber::{Fiber, FiberId, Metadata, Move, MoveValue, Outcome, Stats};
pub use snapshot::{FiberRecord, Snapshot};
pub use tree::{
    ConflictStrategy, Continuation, FiberTree, Mode, PathDiversity, PathStatistics, Statistics,
};

/// registers the storage and cache metrics with a prometheus registry
#[cfg(feature = "metrics")]
pub fn register_metrics(registry: &prometheus::Registry) -> Result<()> {
    store::prom::register(registry)?;
    Ok(())
}

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;
