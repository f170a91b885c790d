#![allow(dead_code)]
//! helper methods for the tests
use fbtree::{FiberId, FiberTree, Move, Outcome, Result};
use quickcheck::{Arbitrary, Gen};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use std::collections::BTreeSet;
use tracing_subscriber::EnvFilter;

/// installs a subscriber for the test output, filtered with `RUST_LOG`
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn moves(values: &[i64]) -> Vec<Move> {
    values.iter().copied().map(Move::new).collect()
}

/// visit count of the fiber a path resolves to, `None` for an unknown path
pub fn visits(tree: &FiberTree, path: &[Move]) -> Result<Option<u64>> {
    Ok(match tree.find_path(path)? {
        Some(id) => tree.get_statistics(&id)?.map(|s| s.visit_count),
        None => None,
    })
}

/// all non-root fibers
pub fn non_root(tree: &FiberTree) -> Result<Vec<fbtree::Fiber>> {
    Ok(tree
        .iter()?
        .filter(|(id, _)| !id.is_root())
        .map(|(_, fiber)| fiber)
        .collect())
}

/// A path over a small alphabet, so that random paths share prefixes and split each other's runs
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TestPath(pub Vec<u8>);

impl TestPath {
    pub fn moves(&self) -> Vec<Move> {
        self.0.iter().copied().map(Move::new).collect()
    }
}

impl Arbitrary for TestPath {
    fn arbitrary(g: &mut Gen) -> Self {
        let len = usize::arbitrary(g) % 8;
        Self((0..len).map(|_| u8::arbitrary(g) % 4).collect())
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        Box::new(self.0.shrink().map(TestPath))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TestOutcome(pub Outcome);

impl Arbitrary for TestOutcome {
    fn arbitrary(g: &mut Gen) -> Self {
        let outcome = g
            .choose(&[Outcome::Win, Outcome::Loss, Outcome::Draw])
            .copied()
            .unwrap_or(Outcome::Draw);
        Self(outcome)
    }
}

/// records all paths, returns the tree
pub fn tree_of(paths: &[(TestPath, TestOutcome)]) -> Result<FiberTree> {
    let mut tree = FiberTree::memory();
    for (path, outcome) in paths {
        tree.simulate_path(&path.moves(), outcome.0, 1, true)?;
    }
    Ok(tree)
}

/// all distinct recorded paths
pub fn distinct_paths(paths: &[(TestPath, TestOutcome)]) -> BTreeSet<TestPath> {
    paths.iter().map(|(path, _)| path.clone()).collect()
}

/// Random games on a square board, with moves encoded as `row * board_size + col`.
///
/// Openings are drawn from a few cells around the center, so games share prefixes like real ones do.
pub fn random_games(
    seed: u64,
    games: usize,
    board_size: usize,
    max_len: usize,
) -> Vec<(Vec<Move>, Outcome)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let center = (board_size / 2) * board_size + board_size / 2;
    let openings = [center, center + 1, center + board_size];
    (0..games)
        .map(|_| {
            let mut cells = (0..board_size * board_size).collect::<Vec<_>>();
            cells.shuffle(&mut rng);
            let opening = openings[rng.gen_range(0..openings.len())];
            cells.retain(|cell| *cell != opening);
            let len = rng.gen_range(1..=max_len);
            let moves = std::iter::once(opening)
                .chain(cells.into_iter().take(len - 1))
                .map(|cell| Move::new(cell as i64))
                .collect();
            let outcome = match rng.gen_range(0..10) {
                0..=4 => Outcome::Win,
                5..=8 => Outcome::Loss,
                _ => Outcome::Draw,
            };
            (moves, outcome)
        })
        .collect()
}

/// the fiber ids on the way from the root to `id`, root first
pub fn ancestry(tree: &FiberTree, id: &FiberId) -> Result<Vec<FiberId>> {
    let mut result = vec![id.clone()];
    let mut current = tree.get_fiber(id)?;
    while let Some(parent) = current.and_then(|fiber| fiber.parent_id) {
        result.push(parent.clone());
        current = tree.get_fiber(&parent)?;
    }
    result.reverse();
    Ok(result)
}
