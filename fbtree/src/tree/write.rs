//! recording paths
use super::{FiberTree, Mode, Walk};
use crate::{
    error::Result,
    fiber::{FiberId, Move, Outcome},
};
use tracing::{debug, info};

const RECORDING: &[Mode] = &[Mode::PathBuilding, Mode::Adding];

impl FiberTree {
    /// starts recording a path from the root. Only allowed while idle.
    pub fn start_path(&mut self) -> Result<()> {
        self.require("start a path", &[Mode::Idle])?;
        self.cursor = Walk::from_root();
        self.mode = Mode::PathBuilding;
        Ok(())
    }

    /// starts recording a long path with intermediate outcomes. Only allowed while idle.
    pub fn start_adding_mode(&mut self) -> Result<()> {
        self.require("start adding mode", &[Mode::Idle])?;
        self.cursor = Walk::from_root();
        self.mode = Mode::Adding;
        Ok(())
    }

    /// extends the path being recorded by one move, creating or splitting fibers as needed
    pub fn add_move(&mut self, mv: Move) -> Result<()> {
        self.require("add a move", RECORDING)?;
        mv.validate()?;
        let mut cursor = self.cursor.clone();
        self.transact(|txn| cursor.step(txn, mv))?;
        self.cursor = cursor;
        Ok(())
    }

    /// records the outcome on every fiber of the path and ends it
    pub fn record_outcome(&mut self, outcome: Outcome) -> Result<()> {
        self.require("record an outcome", &[Mode::PathBuilding])?;
        self.record_at_cursor(outcome)?;
        debug!(
            "recorded {} for a path of {} moves",
            outcome,
            self.cursor.moves().len()
        );
        self.mode = Mode::Idle;
        Ok(())
    }

    /// ends the path being built without recording anything
    pub fn end_path(&mut self) -> Result<()> {
        self.require("end a path", &[Mode::PathBuilding])?;
        self.mode = Mode::Idle;
        Ok(())
    }

    /// records an outcome for the moves added so far and keeps recording
    pub fn update_statistics(&mut self, outcome: Outcome) -> Result<()> {
        self.require("update statistics", RECORDING)?;
        self.record_at_cursor(outcome)?;
        self.cursor.seal();
        Ok(())
    }

    pub fn end_adding_mode(&mut self) -> Result<()> {
        self.require("end adding mode", &[Mode::Adding])?;
        self.mode = Mode::Idle;
        Ok(())
    }

    fn record_at_cursor(&mut self, outcome: Outcome) -> Result<()> {
        let mut cursor = self.cursor.clone();
        self.transact(|txn| {
            // stats are uniform across a run, so the recorded path has to end on a boundary
            cursor.end_at_boundary(txn)?;
            cursor.record(txn, outcome, 1)
        })?;
        self.cursor = cursor;
        Ok(())
    }

    /// Records a complete path in one go.
    ///
    /// The path is created as needed. If `update_stats` is set, `outcome` is recorded `visits`
    /// times on every fiber of the path. Everything is committed as a single batch. Returns the
    /// fiber the path ends in.
    pub fn simulate_path(
        &mut self,
        moves: &[Move],
        outcome: Outcome,
        visits: u64,
        update_stats: bool,
    ) -> Result<FiberId> {
        self.require("simulate a path", &[Mode::Idle])?;
        for mv in moves {
            mv.validate()?;
        }
        let mut walk = Walk::from_root();
        self.transact(|txn| {
            walk.extend(txn, moves.iter().cloned())?;
            if update_stats && visits > 0 {
                walk.end_at_boundary(txn)?;
                walk.record(txn, outcome, visits)?;
            }
            Ok(())
        })?;
        walk.seal();
        let terminal = walk.terminal().clone();
        self.cursor = walk;
        Ok(terminal)
    }

    /// records every path in `paths` with the given outcome, once each
    pub fn simulate_paths<'a>(
        &mut self,
        paths: impl IntoIterator<Item = &'a [Move]>,
        outcome: Outcome,
    ) -> Result<usize> {
        let mut count = 0;
        for path in paths {
            self.simulate_path(path, outcome, 1, true)?;
            count += 1;
        }
        info!("simulated {} paths ending in {}", count, outcome);
        Ok(count)
    }
}
