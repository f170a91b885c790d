use std::path::PathBuf;

/// Where the fibers of a tree live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageKind {
    /// volatile, gone when the tree is dropped
    Memory,
    /// a single SQLite file, created on first use
    Sqlite { path: PathBuf },
}

/// Configuration for a [FiberTree](crate::FiberTree)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// backend to store the fibers in
    pub storage: StorageKind,
    /// maximum number of fibers kept in the cache in front of a durable backend, 0 to disable.
    ///
    /// The in-memory backend is never cached, it already is memory.
    pub cache_capacity: usize,
}

impl Config {
    pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

    /// config for a volatile tree
    pub fn memory() -> Self {
        Self {
            storage: StorageKind::Memory,
            cache_capacity: Self::DEFAULT_CACHE_CAPACITY,
        }
    }

    /// config for a tree stored in the SQLite file at `path`
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageKind::Sqlite { path: path.into() },
            cache_capacity: Self::DEFAULT_CACHE_CAPACITY,
        }
    }

    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::memory()
    }
}
