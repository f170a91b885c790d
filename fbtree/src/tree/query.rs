//! read-only lookups and aggregations
use super::{visit, walk, FiberTree};
use crate::{
    error::Result,
    fiber::{FiberId, Move, MoveValue},
};
use serde::Serialize;
use std::collections::BTreeMap;

/// A possible next move after a path, with the statistics of the paths that took it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Continuation {
    #[serde(rename = "move")]
    pub mv: Move,
    pub win_rate: f64,
    pub visits: u64,
}

/// A root-to-fiber path and the statistics of its last fiber
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathStatistics {
    pub fiber_id: FiberId,
    pub path: Vec<Move>,
    pub visits: u64,
    pub win_rate: f64,
    /// number of moves in the path
    pub depth: usize,
}

/// Shape of the whole tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathDiversity {
    /// number of fibers, including the root
    pub total_fibers: usize,
    /// length of the longest path, in moves
    pub max_depth: usize,
    /// average number of children over all fibers that have any
    pub avg_branching_factor: f64,
    /// non-root fibers without children
    pub leaf_nodes: usize,
    /// depth at which a fiber's run ends, mapped to the number of such fibers
    pub depth_distribution: BTreeMap<usize, usize>,
    pub most_visited_paths: Vec<PathStatistics>,
}

impl FiberTree {
    /// The fiber containing the last move of `moves`, `None` if the path was never recorded.
    ///
    /// The empty path resolves to the root.
    pub fn find_path(&self, moves: &[Move]) -> Result<Option<FiberId>> {
        Ok(walk::locate(self.store.as_ref(), moves)?.map(|(fiber, _)| fiber.id))
    }

    /// Up to `top_n` moves that were played after `path` at least `min_visits` times, best first.
    ///
    /// Ordered by win rate, ties broken by number of visits. Unknown paths have no continuations.
    pub fn get_best_continuation(
        &self,
        path: &[Move],
        top_n: usize,
        min_visits: u64,
    ) -> Result<Vec<Continuation>> {
        let store = self.store.as_ref();
        let (fiber, offset) = match walk::locate(store, path)? {
            Some(found) => found,
            None => return Ok(Vec::new()),
        };
        let candidates = if offset < fiber.len() {
            // inside a run there is just the next move of the run
            vec![(fiber.moves[offset].clone(), fiber.stats)]
        } else {
            let mut children = Vec::new();
            for id in store.children_of(&fiber.id)? {
                let child = walk::load(store, &id)?;
                if let Some(first) = child.first_move() {
                    children.push((first.clone(), child.stats));
                }
            }
            children
        };
        let mut result = candidates
            .into_iter()
            .filter(|(_, stats)| stats.visit_count >= min_visits)
            .map(|(mv, stats)| Continuation {
                mv,
                win_rate: stats.win_rate(),
                visits: stats.visit_count,
            })
            .collect::<Vec<_>>();
        result.sort_by(|a, b| {
            b.win_rate
                .total_cmp(&a.win_rate)
                .then(b.visits.cmp(&a.visits))
        });
        result.truncate(top_n);
        Ok(result)
    }

    /// Total visits per move value over all moves played as the `depth`th move of a path.
    ///
    /// Depth 1 is the first move after the root. Values with fewer than `min_visits` visits in
    /// total are left out.
    pub fn get_move_frequency(
        &self,
        depth: usize,
        min_visits: u64,
    ) -> Result<BTreeMap<MoveValue, u64>> {
        let mut frequency = BTreeMap::<MoveValue, u64>::new();
        if depth == 0 {
            return Ok(frequency);
        }
        visit(self.store.as_ref(), |fiber, path| {
            let start = path.len() - fiber.len();
            if start < depth && depth <= path.len() {
                let mv = &fiber.moves[depth - 1 - start];
                *frequency.entry(mv.value().clone()).or_default() += fiber.stats.visit_count;
            }
            Ok(())
        })?;
        frequency.retain(|_, visits| *visits >= min_visits);
        Ok(frequency)
    }

    /// Visits per board cell, for moves encoded as `row * board_size + col`.
    ///
    /// Moves that are not integers or not on the board are ignored.
    pub fn generate_move_heatmap(&self, board_size: usize) -> Result<Vec<Vec<u64>>> {
        let mut heatmap = vec![vec![0u64; board_size]; board_size];
        let cells = board_size * board_size;
        for fiber in self.store.fibers()? {
            for mv in &fiber.moves {
                let cell = match mv.value().as_int().and_then(|x| usize::try_from(x).ok()) {
                    Some(cell) if cell < cells => cell,
                    _ => continue,
                };
                heatmap[cell / board_size][cell % board_size] += fiber.stats.visit_count;
            }
        }
        Ok(heatmap)
    }

    /// Every path from the root to a fiber with at least `min_visits` visits, most visited first
    pub fn get_common_path_statistics(&self, min_visits: u64) -> Result<Vec<PathStatistics>> {
        let mut result = Vec::new();
        visit(self.store.as_ref(), |fiber, path| {
            if !fiber.is_root() && fiber.stats.visit_count >= min_visits {
                result.push(PathStatistics {
                    fiber_id: fiber.id.clone(),
                    path: path.to_vec(),
                    visits: fiber.stats.visit_count,
                    win_rate: fiber.stats.win_rate(),
                    depth: path.len(),
                });
            }
            Ok(())
        })?;
        result.sort_by(|a, b| b.visits.cmp(&a.visits));
        Ok(result)
    }

    pub fn analyze_path_diversity(&self) -> Result<PathDiversity> {
        let store = self.store.as_ref();
        let mut total_fibers = 0;
        let mut max_depth = 0usize;
        let mut branching_fibers = 0usize;
        let mut branches = 0usize;
        let mut leaf_nodes = 0;
        let mut depth_distribution = BTreeMap::<usize, usize>::new();
        visit(store, |fiber, path| {
            total_fibers += 1;
            max_depth = max_depth.max(path.len());
            let children = store.children_of(&fiber.id)?.len();
            if children > 0 {
                branching_fibers += 1;
                branches += children;
            } else if !fiber.is_root() {
                leaf_nodes += 1;
            }
            if !fiber.is_root() {
                *depth_distribution.entry(path.len()).or_default() += 1;
            }
            Ok(())
        })?;
        let avg_branching_factor = if branching_fibers == 0 {
            0.0
        } else {
            branches as f64 / branching_fibers as f64
        };
        let mut most_visited_paths = self.get_common_path_statistics(1)?;
        most_visited_paths.truncate(5);
        Ok(PathDiversity {
            total_fibers,
            max_depth,
            avg_branching_factor,
            leaf_nodes,
            depth_distribution,
            most_visited_paths,
        })
    }
}
