//! # `edgematch`
//!
//! `edgematch` is a constraint-satisfaction search engine for edge-matching
//! tiling puzzles: an R×C board is filled from a pool of R·C unique square
//! tiles, each carrying four labelled edges, so that every interior edge
//! pair agrees and every border edge carries the reserved label 0.
//!
//! The solver is a backtracking engine with MRV cell selection, LCV value
//! ordering, AC-3 style forward pruning, singleton forcing, anchor-cell
//! symmetry breaking, and a diversified multi-worker driver with periodic
//! checkpoint/resume.

// #![deny(warnings)]
#![deny(missing_docs)]
#![deny(clippy::all)]

mod board;
mod checkpoint;
mod constraints;
mod domain;
mod error;
mod pool;
mod puzzle;
mod rules;
mod solver;
mod stats;
mod tile;

pub use board::{Board, Placement};
pub use checkpoint::{CheckpointRecord, CheckpointStore, DepthCursor, PlacementStep};
pub use constraints::{CellConstraints, ConstraintGrid};
pub use domain::DomainGrid;
pub use error::SolveError;
pub use pool::TilePool;
pub use puzzle::Puzzle;
pub use rules::EdgeRules;
pub use solver::engine::{PROGRESS_DEPTHS, SearchConfig, SearchEngine, SearchOutcome};
pub use solver::heuristics::OrderMode;
pub use solver::parallel::{
    DriverConfig, DriverReport, ParallelDriver, SharedSearchState, default_workers,
};
pub use solver::symmetry::SymmetryBreaker;
pub use solver::trail::TrailEntry;
pub use stats::{
    ConsoleReporter, MonitorSnapshot, PlacementView, ProgressReporter, RunStatus, SilentReporter,
    Statistics,
};
pub use tile::{ALL_SIDES, BORDER, Side, Tile, rotate_edges};
