use common::{init_logging, moves};
use fbtree::{
    store::{FiberStore, MemCache, MemStore, ReadOnlyStore, WriteBatch},
    ConflictStrategy, Fiber, FiberId, FiberTree, Move, Outcome, Result,
};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

mod common;

#[derive(Debug, Clone, Default)]
struct Counters {
    gets: Arc<AtomicU64>,
    batches: Arc<AtomicU64>,
}

impl Counters {
    fn gets(&self) -> u64 {
        self.gets.load(Ordering::SeqCst)
    }

    fn batches(&self) -> u64 {
        self.batches.load(Ordering::SeqCst)
    }
}

struct OpsCountingStore {
    inner: MemStore,
    counters: Counters,
}

impl OpsCountingStore {
    fn new() -> (Self, Counters) {
        let counters = Counters::default();
        let store = Self {
            inner: MemStore::new(),
            counters: counters.clone(),
        };
        (store, counters)
    }
}

impl ReadOnlyStore for OpsCountingStore {
    fn get(&self, id: &FiberId) -> Result<Option<Fiber>> {
        self.counters.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(id)
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

impl FiberStore for OpsCountingStore {
    fn write_batch(&mut self, batch: WriteBatch) -> Result<()> {
        self.counters.batches.fetch_add(1, Ordering::SeqCst);
        self.inner.write_batch(batch)
    }
}

fn cached_tree(capacity: usize) -> anyhow::Result<(FiberTree, Counters)> {
    let (store, counters) = OpsCountingStore::new();
    let tree = FiberTree::with_store(Box::new(MemCache::new(store, capacity)))?;
    Ok((tree, counters))
}

#[test]
fn warm_cache_serves_all_lookups() -> anyhow::Result<()> {
    init_logging();
    let (mut tree, counters) = cached_tree(1000)?;
    for i in 0..20 {
        tree.simulate_path(&moves(&[i % 4, i % 5, i]), Outcome::Win, 1, true)?;
    }
    let g0 = counters.gets();
    for i in 0..20 {
        assert!(tree.find_path(&moves(&[i % 4, i % 5, i]))?.is_some());
        tree.get_best_continuation(&moves(&[i % 4]), 3, 0)?;
    }
    // everything written went through the cache, so nothing has to be read back
    assert_eq!(counters.gets(), g0);
    Ok(())
}

#[test]
fn disabled_cache_reads_through() -> anyhow::Result<()> {
    let (mut tree, counters) = cached_tree(0)?;
    tree.simulate_path(&moves(&[1, 2, 3]), Outcome::Loss, 1, true)?;
    let g0 = counters.gets();
    tree.find_path(&moves(&[1, 2, 3]))?;
    assert!(counters.gets() > g0);
    Ok(())
}

#[test]
fn small_cache_still_answers_correctly() -> anyhow::Result<()> {
    let (mut tree, counters) = cached_tree(2)?;
    for i in 0..30 {
        tree.simulate_path(&moves(&[i, i + 1]), Outcome::Draw, 1, true)?;
    }
    let g0 = counters.gets();
    for i in 0..30 {
        let id = tree.find_path(&moves(&[i, i + 1]))?.expect("recorded");
        let stats = tree.get_statistics(&id)?.expect("stored");
        assert!(stats.visit_count >= 1);
    }
    // evicted fibers are loaded again from the store
    assert!(counters.gets() > g0);
    Ok(())
}

#[test]
fn one_batch_per_mutation() -> anyhow::Result<()> {
    let (mut tree, counters) = cached_tree(100)?;
    let b0 = counters.batches();

    tree.simulate_path(&moves(&[1, 2, 3, 4]), Outcome::Win, 3, true)?;
    assert_eq!(counters.batches(), b0 + 1);

    // splitting a run and recording is still a single batch
    tree.simulate_path(&moves(&[1, 2, 5]), Outcome::Win, 1, true)?;
    assert_eq!(counters.batches(), b0 + 2);

    tree.start_path()?;
    tree.add_move(Move::new(1))?;
    tree.add_move(Move::new(9))?;
    tree.record_outcome(Outcome::Loss)?;
    assert_eq!(counters.batches(), b0 + 4);

    // entering existing fibers writes nothing
    tree.start_path()?;
    tree.add_move(Move::new(1))?;
    tree.end_path()?;
    assert_eq!(counters.batches(), b0 + 4);

    // queries and rejected operations write nothing
    tree.analyze_path_diversity()?;
    tree.get_common_path_statistics(0)?;
    assert!(tree.simulate_path(&[Move::new("")], Outcome::Win, 1, true).is_err());
    assert!(tree.record_outcome(Outcome::Win).is_err());
    assert_eq!(counters.batches(), b0 + 4);

    tree.prune_tree(2)?;
    assert_eq!(counters.batches(), b0 + 5);

    let mut other = FiberTree::memory();
    other.simulate_path(&moves(&[1, 2, 3, 4]), Outcome::Win, 5, true)?;
    tree.merge(&other, ConflictStrategy::StatsSum)?;
    assert_eq!(counters.batches(), b0 + 6);
    Ok(())
}
