use lazy_static::lazy_static;
use prometheus::{exponential_buckets, Histogram, HistogramOpts, IntCounter, Opts, Registry};

lazy_static! {
    pub static ref FIBER_LOAD_HIST: Histogram = Histogram::with_opts(
        HistogramOpts::new("fiber_load_time", "Time to load a fiber from the durable store",)
            .namespace("fbtree")
            .buckets(exponential_buckets(0.00001, 2.0, 17).unwrap()),
    )
    .unwrap();
    pub static ref BATCH_WRITE_HIST: Histogram = Histogram::with_opts(
        HistogramOpts::new("batch_write_time", "Time to commit a write batch to the durable store",)
            .namespace("fbtree")
            .buckets(exponential_buckets(0.00001, 2.0, 17).unwrap()),
    )
    .unwrap();
    pub static ref BATCH_SIZE_HIST: Histogram = Histogram::with_opts(
        HistogramOpts::new("batch_size", "Number of ops in committed write batches",)
            .namespace("fbtree")
            .buckets(exponential_buckets(1.0, 2.0, 16).unwrap()),
    )
    .unwrap();
    pub static ref CACHE_HITS: IntCounter = IntCounter::with_opts(
        Opts::new("cache_hits", "Fiber reads served from the cache").namespace("fbtree")
    )
    .unwrap();
    pub static ref CACHE_MISSES: IntCounter = IntCounter::with_opts(
        Opts::new("cache_misses", "Fiber reads that fell through to the store").namespace("fbtree")
    )
    .unwrap();
    pub static ref CACHE_EVICTIONS: IntCounter = IntCounter::with_opts(
        Opts::new("cache_evictions", "Fibers dropped from a full cache").namespace("fbtree")
    )
    .unwrap();
}

pub(crate) fn register(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(FIBER_LOAD_HIST.clone()))?;
    registry.register(Box::new(BATCH_WRITE_HIST.clone()))?;
    registry.register(Box::new(BATCH_SIZE_HIST.clone()))?;
    registry.register(Box::new(CACHE_HITS.clone()))?;
    registry.register(Box::new(CACHE_MISSES.clone()))?;
    registry.register(Box::new(CACHE_EVICTIONS.clone()))?;
    Ok(())
}
