//! The constraint-satisfaction search engine and its collaborators.

pub mod engine;
pub mod fits;
pub mod heuristics;
pub mod parallel;
pub mod propagate;
pub mod singleton;
pub mod symmetry;
pub mod trail;
