use thiserror::Error;

/// Errors surfaced by the solver core.
///
/// Terminal search states (solved, exhausted, timed out, cancelled) are not
/// errors; they are reported through `SearchOutcome`.
#[derive(Debug, Error)]
pub enum SolveError {
    /// The tile pool text was malformed or internally inconsistent.
    #[error("invalid tile pool: {0}")]
    InvalidPool(String),

    /// The checkpoint text was malformed or inconsistent with the pool.
    #[error("invalid checkpoint: {0}")]
    InvalidCheckpoint(String),

    /// An underlying filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
