//! durable single-file backend
use super::{FiberStore, ReadOnlyStore, WriteBatch, WriteOp};
use crate::{
    error::{Error, Result},
    fiber::{Fiber, FiberId, Metadata, Move, Stats},
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS fibers (
    fiber_id TEXT PRIMARY KEY,
    parent_id TEXT,
    data BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_parent_id ON fibers(parent_id);
";

// upsert instead of INSERT OR REPLACE so that a rewritten fiber keeps its rowid,
// which is what orders children_of
const UPSERT: &str = "
INSERT INTO fibers (fiber_id, parent_id, data) VALUES (?1, ?2, ?3)
ON CONFLICT(fiber_id) DO UPDATE SET parent_id = excluded.parent_id, data = excluded.data
";

/// The blob column: everything about a fiber except its id and parent
#[derive(Serialize)]
struct BlobRef<'a> {
    moves: &'a [Move],
    stats: &'a Stats,
    metadata: &'a Metadata,
}

#[derive(Deserialize)]
struct Blob {
    moves: Vec<Move>,
    stats: Stats,
    #[serde(default)]
    metadata: Metadata,
}

fn encode(fiber: &Fiber) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&BlobRef {
        moves: &fiber.moves,
        stats: &fiber.stats,
        metadata: &fiber.metadata,
    })?)
}

fn decode(id: String, parent_id: Option<String>, data: &[u8]) -> Result<Fiber> {
    let id = FiberId::from(id);
    let blob: Blob =
        serde_json::from_slice(data).map_err(|cause| Error::CorruptFiber(id.clone(), cause))?;
    Ok(Fiber {
        id,
        parent_id: parent_id.map(FiberId::from),
        moves: blob.moves,
        stats: blob.stats,
        metadata: blob.metadata,
    })
}

fn read_row(row: &Row) -> rusqlite::Result<(String, Option<String>, Vec<u8>)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

/// Durable store, one row per fiber in a SQLite database file
pub struct SqliteStore {
    conn: Connection,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl SqliteStore {
    /// Opens the database at `path`, creating the file, the schema and the root row if needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        info!("opened fiber database {}", path.as_ref().display());
        Self::init(conn)
    }

    /// A database that lives only as long as the store, mostly useful for tests
    pub fn memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO fibers (fiber_id, parent_id, data) VALUES (?1, NULL, ?2)",
            params![FiberId::root().as_str(), encode(&Fiber::root())?],
        )?;
        if inserted > 0 {
            debug!("initialized fiber database with a root row");
        }
        Ok(Self { conn })
    }
}

impl ReadOnlyStore for SqliteStore {
    fn get(&self, id: &FiberId) -> Result<Option<Fiber>> {
        #[cfg(feature = "metrics")]
        let _timer = super::prom::FIBER_LOAD_HIST.start_timer();
        let row = self
            .conn
            .prepare_cached("SELECT fiber_id, parent_id, data FROM fibers WHERE fiber_id = ?1")?
            .query_row([id.as_str()], read_row)
            .optional()?;
        row.map(|(id, parent_id, data)| decode(id, parent_id, &data))
            .transpose()
    }

    fn children_of(&self, id: &FiberId) -> Result<Vec<FiberId>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT fiber_id FROM fibers WHERE parent_id = ?1 ORDER BY rowid")?;
        let ids = stmt
            .query_map([id.as_str()], |row| row.get::<_, String>(0))?
            .map(|id| id.map(FiberId::from))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM fibers", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn fibers(&self) -> Result<Vec<Fiber>> {
        let mut stmt = self
            .conn
            .prepare("SELECT fiber_id, parent_id, data FROM fibers ORDER BY rowid")?;
        let rows = stmt
            .query_map([], read_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|(id, parent_id, data)| decode(id, parent_id, &data))
            .collect()
    }
}

impl FiberStore for SqliteStore {
    fn write_batch(&mut self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        #[cfg(feature = "metrics")]
        let _timer = super::prom::BATCH_WRITE_HIST.start_timer();
        #[cfg(feature = "metrics")]
        super::prom::BATCH_SIZE_HIST.observe(batch.len() as f64);
        let tx = self.conn.transaction()?;
        {
            let mut upsert = tx.prepare_cached(UPSERT)?;
            let mut delete = tx.prepare_cached("DELETE FROM fibers WHERE fiber_id = ?1")?;
            for op in batch.ops() {
                match op {
                    WriteOp::Put(fiber) => {
                        upsert.execute(params![
                            fiber.id.as_str(),
                            fiber.parent_id.as_ref().map(FiberId::as_str),
                            encode(fiber)?,
                        ])?;
                    }
                    WriteOp::Delete(id) => {
                        delete.execute([id.as_str()])?;
                    }
                }
            }
        }
        // dropping an uncommitted transaction rolls it back, so an error above leaves the file untouched
        tx.commit()?;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.conn.close().map_err(|(_, cause)| Error::from(cause))
    }
}
