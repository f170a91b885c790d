#![cfg(feature = "metrics")]
use common::{init_logging, moves};
use fbtree::{
    store::{MemCache, MemStore, ReadOnlyStore},
    FiberId, FiberTree, Outcome,
};
use prometheus::Registry;

mod common;

fn counter(registry: &Registry, name: &str) -> u64 {
    registry
        .gather()
        .iter()
        .filter(|family| family.get_name() == name)
        .flat_map(|family| family.get_metric())
        .map(|metric| metric.get_counter().get_value() as u64)
        .sum()
}

// the only test in this binary, so nothing else moves the counters
#[test]
fn cache_counters_are_registered_and_counted() -> anyhow::Result<()> {
    init_logging();
    let registry = Registry::new();
    fbtree::register_metrics(&registry)?;
    let names = registry
        .gather()
        .iter()
        .map(|family| family.get_name().to_owned())
        .collect::<Vec<_>>();
    for name in [
        "fbtree_fiber_load_time",
        "fbtree_batch_write_time",
        "fbtree_batch_size",
        "fbtree_cache_hits",
        "fbtree_cache_misses",
        "fbtree_cache_evictions",
    ] {
        assert!(names.iter().any(|n| n == name), "{} registered", name);
    }
    // the same metrics can not be registered twice
    assert!(fbtree::register_metrics(&registry).is_err());

    let misses = counter(&registry, "fbtree_cache_misses");
    let disabled = MemCache::new(MemStore::new(), 0);
    disabled.get(&FiberId::root())?;
    disabled.get(&FiberId::from("absent"))?;
    assert_eq!(counter(&registry, "fbtree_cache_misses"), misses);

    let enabled = MemCache::new(MemStore::new(), 10);
    enabled.get(&FiberId::root())?;
    assert_eq!(counter(&registry, "fbtree_cache_misses"), misses + 1);
    let hits = counter(&registry, "fbtree_cache_hits");
    enabled.get(&FiberId::root())?;
    assert_eq!(counter(&registry, "fbtree_cache_hits"), hits + 1);

    let mut tree = FiberTree::with_store(Box::new(enabled))?;
    tree.simulate_path(&moves(&[1, 2]), Outcome::Win, 1, true)?;
    assert!(tree.find_path(&moves(&[1, 2]))?.is_some());
    Ok(())
}
