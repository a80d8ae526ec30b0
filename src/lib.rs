//! Exact mine-probability engine for Minesweeper-style boards.
//!
//! Given a snapshot of revealed clues, hidden cells, and the remaining mine
//! count, the engine computes the exact probability that each unknown cell
//! contains a mine. Boards where a single cell may hold several mines are
//! supported through the `max_per_cell` parameter.
//!
//! The arithmetic is exact end to end: equation reduction runs over
//! arbitrary-precision rationals and configuration weights over big
//! integers. Floating point appears only in the LP used to bound the
//! enumeration (where it is safe) and in the final probability values.
//!
//! ```
//! use mineprobs::{solve, Combinatorics, GridBoard};
//!
//! let board = GridBoard::parse(&["x 1 x"]).unwrap();
//! let combinatorics = Combinatorics::new();
//! let probs = solve(&board, 1, 1, &combinatorics).unwrap();
//! assert_eq!(probs[&(0, 0)], 0.5);
//! ```

pub mod board;
pub mod bounds;
pub mod cancel;
pub mod combinatorics;
pub mod error;
pub mod matrix;
pub mod solver;

pub use board::{derive_clues, BoardView, CellState, Coord, GridBoard, NeighborCache};
pub use cancel::CancelToken;
pub use combinatorics::Combinatorics;
pub use error::{Result, SolverError};
pub use solver::{solve, solve_configs, ConfigurationSet, ProbabilityMap, Solver};
