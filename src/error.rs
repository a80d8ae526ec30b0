//! Error types for the probability engine.

use thiserror::Error;

/// Errors surfaced by the solve entry points.
#[derive(Debug, Error)]
pub enum SolverError {
    /// Rejected before any reduction work: bad mine count, bad per-cell cap,
    /// or a clue that exceeds its own neighbor-and-cap capacity.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The board's clues admit no mine arrangement at all. A legitimate
    /// terminal outcome, distinct from a probability of zero.
    #[error("no mine arrangement is consistent with the board's clues")]
    InconsistentBoard,

    /// The LP relaxation reported infeasibility or unboundedness while
    /// deriving enumeration ceilings. Indicates a defect upstream of the
    /// bound step, not a recoverable runtime condition.
    #[error("bound derivation failed: {0}")]
    BoundingFailure(String),

    /// Aggregation reached a state that a correctly pruned configuration
    /// set cannot produce (e.g. zero total weight over a non-empty set).
    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),

    /// The solve was cancelled via its cancellation token.
    #[error("solve was cancelled")]
    Cancelled,
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SolverError>;
