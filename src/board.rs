//! Board state types and the board-provider contract.
//!
//! The engine never owns a game; it reads a snapshot of revealed clues and
//! hidden cells through [`BoardView`]. A concrete [`GridBoard`] over a flat
//! `Vec` with a precomputed neighbor table is provided for consumers and for
//! building test fixtures from textual layouts.

use crate::error::{Result, SolverError};

/// A grid coordinate, `(x, y)`.
pub type Coord = (usize, usize);

/// Snapshot state of a single cell.
///
/// A flag carries no information for inference purposes: a flagged cell is
/// still an unknown cell and participates in the equation system exactly
/// like a hidden one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellState {
    Hidden,
    Flagged,
    /// Revealed with the given clue: the number of mines among the cell's
    /// neighbors (counting multiplicity on boards with multi-mine cells).
    Revealed(u32),
}

impl CellState {
    /// True for any cell whose mine content is unknown (hidden or flagged).
    pub fn is_unknown(&self) -> bool {
        !matches!(self, CellState::Revealed(_))
    }
}

/// Read-only board snapshot the solver runs against.
///
/// `neighbors` may return repeated coordinates; the equation builder counts
/// occurrences, so variant adjacency rules with multiplicity work unchanged.
pub trait BoardView {
    /// All coordinates of the board, in a stable order.
    fn all_coords(&self) -> Vec<Coord>;

    /// State of the cell at `coord`.
    fn state(&self, coord: Coord) -> CellState;

    /// Adjacent coordinates of `coord`.
    fn neighbors(&self, coord: Coord) -> &[Coord];
}

/// Precomputed 8-directional neighbor table for a rectangular grid.
///
/// Indexed by `x * height + y`, the same column-major layout the grid types
/// use.
pub struct NeighborCache {
    height: usize,
    entries: Vec<Vec<Coord>>,
}

impl NeighborCache {
    pub fn new(width: usize, height: usize) -> Self {
        let mut entries = Vec::with_capacity(width * height);
        for x in 0..width {
            for y in 0..height {
                let mut nbrs = Vec::with_capacity(8);
                for dx in -1i32..=1 {
                    for dy in -1i32..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let nx = x as i32 + dx;
                        let ny = y as i32 + dy;
                        if nx >= 0 && nx < width as i32 && ny >= 0 && ny < height as i32 {
                            nbrs.push((nx as usize, ny as usize));
                        }
                    }
                }
                entries.push(nbrs);
            }
        }
        Self { height, entries }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> &[Coord] {
        &self.entries[x * self.height + y]
    }
}

/// A rectangular board snapshot with standard 8-directional adjacency.
///
/// Cells are stored column-major (`cells[x * height + y]`).
pub struct GridBoard {
    pub width: usize,
    pub height: usize,
    cells: Vec<CellState>,
    neighbor_cache: NeighborCache,
}

impl GridBoard {
    /// Create a board with every cell hidden.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![CellState::Hidden; width * height],
            neighbor_cache: NeighborCache::new(width, height),
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> CellState {
        self.cells[x * self.height + y]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, state: CellState) {
        self.cells[x * self.height + y] = state;
    }

    /// Build a board from one string per row, with whitespace-separated
    /// tokens: `x` for a hidden cell, `F` for a flagged cell, and a decimal
    /// number for a revealed clue.
    ///
    /// ```
    /// use mineprobs::board::GridBoard;
    /// let board = GridBoard::parse(&[
    ///     "x 2 x",
    ///     "x x x",
    /// ]).unwrap();
    /// assert_eq!((board.width, board.height), (3, 2));
    /// ```
    pub fn parse(rows: &[&str]) -> Result<Self> {
        let parsed: Vec<Vec<CellState>> = rows
            .iter()
            .map(|row| {
                row.split_whitespace()
                    .map(|tok| match tok {
                        "x" | "X" | "#" => Ok(CellState::Hidden),
                        "F" | "f" => Ok(CellState::Flagged),
                        _ => tok
                            .parse::<u32>()
                            .map(CellState::Revealed)
                            .map_err(|_| {
                                SolverError::InvalidInput(format!(
                                    "unrecognized board token {tok:?}"
                                ))
                            }),
                    })
                    .collect()
            })
            .collect::<Result<_>>()?;

        let height = parsed.len();
        let width = parsed.first().map_or(0, Vec::len);
        if width == 0 || height == 0 {
            return Err(SolverError::InvalidInput("empty board layout".into()));
        }
        if parsed.iter().any(|row| row.len() != width) {
            return Err(SolverError::InvalidInput("ragged board layout".into()));
        }

        let mut board = Self::new(width, height);
        for (y, row) in parsed.iter().enumerate() {
            for (x, &state) in row.iter().enumerate() {
                board.set(x, y, state);
            }
        }
        Ok(board)
    }
}

impl BoardView for GridBoard {
    fn all_coords(&self) -> Vec<Coord> {
        let mut coords = Vec::with_capacity(self.width * self.height);
        for x in 0..self.width {
            for y in 0..self.height {
                coords.push((x, y));
            }
        }
        coords
    }

    fn state(&self, (x, y): Coord) -> CellState {
        self.get(x, y)
    }

    fn neighbors(&self, (x, y): Coord) -> &[Coord] {
        self.neighbor_cache.get(x, y)
    }
}

/// Derive the clue value for every cell from a per-cell mine count
/// (column-major, `mine_counts[x * height + y]`).
///
/// A cell's clue is the total number of mines among its neighbors. Useful
/// for constructing self-consistent fixtures: place mines, derive clues,
/// reveal any subset of the mine-free cells.
pub fn derive_clues(width: usize, height: usize, mine_counts: &[u32]) -> Vec<u32> {
    let nc = NeighborCache::new(width, height);
    let mut clues = vec![0u32; width * height];
    for x in 0..width {
        for y in 0..height {
            let mut total = 0;
            for &(nx, ny) in nc.get(x, y) {
                total += mine_counts[nx * height + ny];
            }
            clues[x * height + y] = total;
        }
    }
    clues
}
