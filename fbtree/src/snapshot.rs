//! Portable snapshots of a whole tree
//!
//! A snapshot is a single JSON document with a descriptive `metadata` map and all fibers keyed by
//! id. It does not depend on the backend, so it can move trees between memory and SQLite or between
//! machines.
//!
//! ```json
//! {
//!   "metadata": { "format": "fbtree", "version": "0.1.0", "fiber_count": 2 },
//!   "fibers": {
//!     "root": { "moves": [], "parent_id": null, "stats": { ... }, "metadata": {} },
//!     "4b0c...": { "moves": [{ "value": 112 }], "parent_id": "root", "stats": { ... } }
//!   }
//! }
//! ```
use crate::{
    config::Config,
    error::{Error, Result},
    fiber::{Fiber, FiberId, Metadata, Move, MoveValue, Stats},
    store::WriteBatch,
    tree::{FiberTree, Mode, Walk},
};
use fnv::FnvHashSet;
use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};
use tracing::info;

pub const FORMAT: &str = "fbtree";

/// A fiber as stored in a snapshot, without its id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiberRecord {
    pub moves: Vec<Move>,
    pub parent_id: Option<FiberId>,
    pub stats: Stats,
    #[serde(default)]
    pub metadata: Metadata,
}

impl From<Fiber> for FiberRecord {
    fn from(fiber: Fiber) -> Self {
        Self {
            moves: fiber.moves,
            parent_id: fiber.parent_id,
            stats: fiber.stats,
            metadata: fiber.metadata,
        }
    }
}

impl FiberRecord {
    fn into_fiber(self, id: FiberId) -> Fiber {
        Fiber {
            id,
            parent_id: self.parent_id,
            moves: self.moves,
            stats: self.stats,
            metadata: self.metadata,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub metadata: Metadata,
    pub fibers: BTreeMap<FiberId, FiberRecord>,
}

fn corrupt(message: impl Into<String>) -> Error {
    Error::CorruptSnapshot(message.into())
}

impl Snapshot {
    /// Checks that the snapshot describes a valid tree.
    ///
    /// - the root is present, without parent and without moves
    /// - every other fiber has at least one valid move and a parent that is in the snapshot
    /// - every chain of parents ends at the root
    /// - stats are consistent
    /// - no two siblings start with the same move
    pub fn validate(&self) -> Result<()> {
        let root = self
            .fibers
            .get(&FiberId::root())
            .ok_or_else(|| corrupt("no root fiber"))?;
        if root.parent_id.is_some() || !root.moves.is_empty() {
            return Err(corrupt("root fiber has a parent or moves"));
        }
        let mut first_moves = FnvHashSet::<(&FiberId, &MoveValue)>::default();
        for (id, record) in &self.fibers {
            if !record.stats.is_consistent() {
                return Err(corrupt(format!("inconsistent stats for fiber {}", id)));
            }
            if id.is_root() {
                continue;
            }
            let parent = record
                .parent_id
                .as_ref()
                .ok_or_else(|| corrupt(format!("fiber {} has no parent", id)))?;
            if !self.fibers.contains_key(parent) {
                return Err(corrupt(format!("parent {} of fiber {} is missing", parent, id)));
            }
            let first = record
                .moves
                .first()
                .ok_or_else(|| corrupt(format!("fiber {} has no moves", id)))?;
            for mv in &record.moves {
                mv.validate().map_err(|e| corrupt(e.to_string()))?;
            }
            if !first_moves.insert((parent, first.value())) {
                return Err(corrupt(format!(
                    "two children of {} start with move {}",
                    parent, first
                )));
            }
        }
        for id in self.fibers.keys() {
            let mut current = id;
            let mut steps = 0;
            while let Some(parent) = self.fibers.get(current).and_then(|r| r.parent_id.as_ref()) {
                steps += 1;
                if steps > self.fibers.len() {
                    return Err(corrupt(format!("fiber {} is part of a cycle", id)));
                }
                current = parent;
            }
        }
        Ok(())
    }

    /// reads a snapshot document. Malformed documents are [Error::CorruptSnapshot].
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        serde_json::from_reader(reader).map_err(|e| match e.classify() {
            Category::Io => Error::Json(e),
            _ => corrupt(e.to_string()),
        })
    }

    pub fn to_writer(&self, writer: impl Write) -> Result<()> {
        Ok(serde_json::to_writer_pretty(writer, self)?)
    }

    pub fn into_fibers(self) -> impl Iterator<Item = Fiber> {
        self.fibers
            .into_iter()
            .map(|(id, record)| record.into_fiber(id))
    }
}

impl FiberTree {
    pub fn export_snapshot(&self) -> Result<Snapshot> {
        let fibers = self
            .get_all_fibers()?
            .into_iter()
            .map(|(id, fiber)| (id, FiberRecord::from(fiber)))
            .collect::<BTreeMap<_, _>>();
        let mut metadata = Metadata::new();
        metadata.insert("format".into(), FORMAT.into());
        metadata.insert("version".into(), env!("CARGO_PKG_VERSION").into());
        metadata.insert("fiber_count".into(), fibers.len().into());
        Ok(Snapshot { metadata, fibers })
    }

    pub fn export_to_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let snapshot = self.export_snapshot()?;
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        snapshot.to_writer(&mut writer)?;
        writer.flush()?;
        info!(
            "exported {} fibers to {}",
            snapshot.fibers.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Replaces the contents of the tree with the snapshot.
    ///
    /// The snapshot is validated first, an invalid snapshot leaves the tree untouched.
    pub fn import_snapshot(&mut self, snapshot: Snapshot) -> Result<()> {
        self.require("import a snapshot", &[Mode::Idle])?;
        snapshot.validate()?;
        let mut batch = WriteBatch::new();
        for fiber in self.store.fibers()? {
            if !snapshot.fibers.contains_key(&fiber.id) {
                batch.delete(fiber.id);
            }
        }
        let count = snapshot.fibers.len();
        for fiber in snapshot.into_fibers() {
            batch.put(fiber);
        }
        self.store.write_batch(batch)?;
        self.cursor = Walk::from_root();
        info!("imported {} fibers", count);
        Ok(())
    }

    pub fn from_snapshot(config: Config, snapshot: Snapshot) -> Result<Self> {
        let mut tree = Self::new(config)?;
        tree.import_snapshot(snapshot)?;
        Ok(tree)
    }

    pub fn import_from_json(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let snapshot = Snapshot::from_reader(BufReader::new(File::open(path.as_ref())?))?;
        info!("read snapshot from {}", path.as_ref().display());
        Self::from_snapshot(config, snapshot)
    }
}
