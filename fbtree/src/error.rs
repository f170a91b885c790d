use crate::{fiber::FiberId, tree::Mode};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid move: {}", .0)]
    InvalidMove(String),

    #[error("Invalid outcome {:?}, expected win, loss or draw", .0)]
    InvalidOutcome(String),

    #[error("Cannot {} while {}", .operation, .mode)]
    InvalidModeTransition { operation: &'static str, mode: Mode },

    #[error("Corrupt snapshot: {}", .0)]
    CorruptSnapshot(String),

    #[error("Fiber {} is referenced but not stored", .0)]
    MissingFiber(FiberId),

    #[error("Statistics of fiber {} would overflow", .0)]
    StatsOverflow(FiberId),

    #[error("Fiber {} could not be decoded: {}", .0, .1)]
    CorruptFiber(FiberId, serde_json::Error),

    #[error("Unknown conflict strategy {:?}", .0)]
    UnknownConflictStrategy(String),

    #[error(transparent)]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "metrics")]
    #[error(transparent)]
    Prometheus(#[from] prometheus::Error),
}

impl Error {
    /// true for failures of the durable backend or the file system, including fibers that were
    /// stored but can not be read back.
    ///
    /// These are never retried by the engine.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            Error::Storage(_) | Error::Io(_) | Error::CorruptFiber(..)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
