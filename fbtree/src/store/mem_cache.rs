use super::{FiberStore, ReadOnlyStore, WriteBatch, WriteOp};
use crate::{
    error::Result,
    fiber::{Fiber, FiberId},
};
use lru::LruCache;
use parking_lot::Mutex;
use std::{fmt, num::NonZeroUsize};
use tracing::trace;

/// A MemCache wraps an existing store with a cache holding a bounded number of fibers
///
/// The cache is write-through. A batch is first committed to the underlying store, and only then are
/// the cached fibers updated, so the cache never holds anything the store does not. Evicting an entry
/// therefore never loses data.
///
/// Reads that miss the cache fall through to the store and populate the cache. Listing children,
/// counting and full scans always go to the store.
pub struct MemCache<I> {
    inner: I,
    /// the actual cache, None if a capacity of 0 was configured
    cache: Option<Mutex<LruCache<FiberId, Fiber>>>,
}

impl<I> fmt::Debug for MemCache<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemCache")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

impl<I> MemCache<I> {
    /// create a new MemCache
    /// `capacity` the maximum number of cached fibers, 0 to disable
    pub fn new(inner: I, capacity: usize) -> Self {
        Self {
            inner,
            cache: NonZeroUsize::new(capacity).map(|capacity| Mutex::new(LruCache::new(capacity))),
        }
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }

    pub fn into_inner(self) -> I {
        self.inner
    }

    pub fn capacity(&self) -> usize {
        self.cache
            .as_ref()
            .map(|cache| cache.lock().cap().get())
            .unwrap_or_default()
    }

    /// number of currently cached fibers
    pub fn len(&self) -> usize {
        self.cache
            .as_ref()
            .map(|cache| cache.lock().len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// true if the fiber is cached. Does not count as a use.
    pub fn contains(&self, id: &FiberId) -> bool {
        self.cache
            .as_ref()
            .map(|cache| cache.lock().contains(id))
            .unwrap_or_default()
    }

    /// get the value, just from ourselves
    fn get0(&self, id: &FiberId) -> Option<Fiber> {
        self.cache
            .as_ref()
            .and_then(|cache| cache.lock().get(id).cloned())
    }

    fn offer(&self, fiber: Fiber) {
        if let Some(cache) = self.cache.as_ref() {
            let id = fiber.id.clone();
            if let Some((evicted, _)) = cache.lock().push(id.clone(), fiber) {
                if evicted != id {
                    trace!("evicted fiber {} from cache", evicted);
                    #[cfg(feature = "metrics")]
                    super::prom::CACHE_EVICTIONS.inc();
                }
            }
        }
    }

    fn forget(&self, id: &FiberId) {
        if let Some(cache) = self.cache.as_ref() {
            cache.lock().pop(id);
        }
    }
}

impl<I: ReadOnlyStore> ReadOnlyStore for MemCache<I> {
    fn get(&self, id: &FiberId) -> Result<Option<Fiber>> {
        if let Some(fiber) = self.get0(id) {
            trace!("cache hit {}", id);
            #[cfg(feature = "metrics")]
            super::prom::CACHE_HITS.inc();
            return Ok(Some(fiber));
        }
        let fiber = self.inner.get(id)?;
        if self.cache.is_some() {
            trace!("cache miss {}", id);
            #[cfg(feature = "metrics")]
            super::prom::CACHE_MISSES.inc();
            if let Some(fiber) = fiber.as_ref() {
                self.offer(fiber.clone());
            }
        }
        Ok(fiber)
    }

    fn children_of(&self, id: &FiberId) -> Result<Vec<FiberId>> {
        self.inner.children_of(id)
    }

    fn count(&self) -> Result<usize> {
        self.inner.count()
    }

    fn fibers(&self) -> Result<Vec<Fiber>> {
        self.inner.fibers()
    }
}

impl<I: FiberStore> FiberStore for MemCache<I> {
    fn write_batch(&mut self, batch: WriteBatch) -> Result<()> {
        if self.cache.is_none() {
            return self.inner.write_batch(batch);
        }
        self.inner.write_batch(batch.clone())?;
        for op in batch.into_ops() {
            match op {
                WriteOp::Put(fiber) => self.offer(fiber),
                WriteOp::Delete(id) => self.forget(&id),
            }
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        Box::new(self.inner).close()
    }
}
