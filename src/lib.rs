//! Slime-mold growth over a wall-derived attractant field, trained with
//! tabular Q-learning over (cell count, cell) pairs.
//!
//! - [`field::Field`] turns a wall layout into a reward landscape and a
//!   goal band at a configured distance from the walls.
//! - [`mold::Mold`] grows an occupancy grid from a seed cell, tracking the
//!   frontier of cells that can still grow.
//! - [`trainer::Trainer`] runs episodes, applies the value update, and
//!   persists per-configuration tables through a [`store::TableStore`].

pub mod error;
pub mod field;
pub mod mold;
pub mod prng;
pub mod qtable;
pub mod store;
pub mod trainer;

pub use error::{Error, Result};
pub use field::{Cell, Field, GOAL_BAND_FRACTION, WALL};
pub use mold::{Mold, ScoredCell};
pub use qtable::QTable;
pub use store::{FsStore, MemoryStore, RunKey, TableStore};
pub use trainer::{EvalRow, RunStats, SweepStats, Trainer, TrainerConfig};
