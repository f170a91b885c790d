//! The fiber data model
//!
//! A [Move] is a single decision. Its identity is its [MoveValue]; the metadata that travels with it
//! is never used for equality, hashing or lookup.
//!
//! A [Fiber] is a node of the tree. It holds a *run* of one or more moves that were always taken
//! together, so a path of moves that never branched is stored as a single fiber. Each fiber carries
//! the outcome [Stats] of every recorded path that went through it.
//!
//! # Invariants
//!
//! Only the root fiber has no parent and no moves. The counters of [Stats] always add up:
//! `visit_count == win_count + loss_count + draw_count`.
use crate::error::{Error, Result};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};

/// Free-form annotations, not interpreted by the engine
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Identity of a fiber, stable across save and load
#[derive(Debug, Display, From, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FiberId(String);

impl FiberId {
    const ROOT: &'static str = "root";

    /// the distinguished id of the tree's entry point
    pub fn root() -> Self {
        Self(Self::ROOT.to_owned())
    }

    /// a fresh, globally unique id
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == Self::ROOT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FiberId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// The identifying part of a move
#[derive(Debug, Display, From, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MoveValue {
    Int(i64),
    Text(String),
}

impl From<i32> for MoveValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u32> for MoveValue {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u8> for MoveValue {
    fn from(value: u8) -> Self {
        Self::Int(value.into())
    }
}

impl From<&str> for MoveValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl MoveValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Text(_) => None,
        }
    }
}

/// One atomic decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Move {
    value: MoveValue,
    #[serde(default)]
    metadata: Metadata,
}

impl Move {
    pub fn new(value: impl Into<MoveValue>) -> Self {
        Self {
            value: value.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(value: impl Into<MoveValue>, metadata: Metadata) -> Self {
        Self {
            value: value.into(),
            metadata,
        }
    }

    pub fn value(&self) -> &MoveValue {
        &self.value
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Checks that the move can be stored. Text values must not be blank.
    pub fn validate(&self) -> Result<()> {
        match &self.value {
            MoveValue::Text(text) if text.trim().is_empty() => {
                Err(Error::InvalidMove(format!("blank text value {:?}", text)))
            }
            _ => Ok(()),
        }
    }
}

impl PartialEq for Move {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Move {}

impl Hash for Move {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state)
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// The result of a finished path
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    #[display(fmt = "win")]
    Win,
    #[display(fmt = "loss")]
    Loss,
    #[display(fmt = "draw")]
    Draw,
}

impl FromStr for Outcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "win" => Ok(Self::Win),
            "loss" => Ok(Self::Loss),
            "draw" => Ok(Self::Draw),
            other => Err(Error::InvalidOutcome(other.to_owned())),
        }
    }
}

/// Aggregate outcome counters of a fiber
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub visit_count: u64,
    pub win_count: u64,
    pub loss_count: u64,
    pub draw_count: u64,
}

impl Stats {
    /// stats after `times` more visits that all ended with `outcome`, `None` on overflow
    pub fn checked_record(&self, outcome: Outcome, times: u64) -> Option<Stats> {
        let mut result = *self;
        result.visit_count = self.visit_count.checked_add(times)?;
        let counter = match outcome {
            Outcome::Win => &mut result.win_count,
            Outcome::Loss => &mut result.loss_count,
            Outcome::Draw => &mut result.draw_count,
        };
        *counter = counter.checked_add(times)?;
        Some(result)
    }

    /// sum of all counters, `None` on overflow
    pub fn checked_combine(&self, other: &Stats) -> Option<Stats> {
        Some(Stats {
            visit_count: self.visit_count.checked_add(other.visit_count)?,
            win_count: self.win_count.checked_add(other.win_count)?,
            loss_count: self.loss_count.checked_add(other.loss_count)?,
            draw_count: self.draw_count.checked_add(other.draw_count)?,
        })
    }

    /// fraction of visits that were won, 0 for an unvisited fiber
    pub fn win_rate(&self) -> f64 {
        if self.visit_count == 0 {
            0.0
        } else {
            self.win_count as f64 / self.visit_count as f64
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.win_count
            .checked_add(self.loss_count)
            .and_then(|x| x.checked_add(self.draw_count))
            == Some(self.visit_count)
    }
}

/// A tree node holding a run of moves
#[derive(Debug, Clone, PartialEq)]
pub struct Fiber {
    pub id: FiberId,
    pub parent_id: Option<FiberId>,
    pub moves: Vec<Move>,
    pub stats: Stats,
    pub metadata: Metadata,
}

impl Fiber {
    pub fn root() -> Self {
        Self {
            id: FiberId::root(),
            parent_id: None,
            moves: Vec::new(),
            stats: Stats::default(),
            metadata: Metadata::new(),
        }
    }

    /// a new, unvisited fiber below `parent` with a fresh id
    pub fn child_of(parent: &FiberId, moves: Vec<Move>) -> Self {
        Self {
            id: FiberId::random(),
            parent_id: Some(parent.clone()),
            moves,
            stats: Stats::default(),
            metadata: Metadata::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// number of moves in the run
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// the move that keys this fiber among its siblings
    pub fn first_move(&self) -> Option<&Move> {
        self.moves.first()
    }
}
