//! Solving a board: equations from clues, configuration enumeration, and
//! per-cell mine probabilities.
//!
//! The pipeline is the classic one for exact inference:
//!
//! 1. one equation per revealed clue with a hidden neighbor, plus a closing
//!    equation for the total remaining mines;
//! 2. merge unknown cells with identical clue adjacency into groups;
//! 3. exact reduction splitting group counts into fixed and free;
//! 4. LP ceilings for the free counts, then exhaustive enumeration of the
//!    bounded box, keeping the integer points whose implied fixed counts
//!    are in range;
//! 5. weight each surviving configuration by its arrangement count and
//!    fold into a per-group probability.
//!
//! A solve is a synchronous batch computation and can run long on dense
//! boards; callers wanting to abort pass a [`CancelToken`], checked before
//! every enumerated point, every configuration weighing, and every
//! recursive step of a cache-miss arrangement count.

use std::collections::{HashMap, HashSet};

use num_bigint::BigUint;
use num_rational::BigRational;
use num_traits::{One, ToPrimitive, Zero};
use tracing::debug;

use crate::board::{BoardView, CellState, Coord};
use crate::bounds;
use crate::cancel::CancelToken;
use crate::combinatorics::{factorial, Combinatorics};
use crate::error::{Result, SolverError};
use crate::matrix::{in_integer_range, LinearSystem, ReducedSystem};

/// Mine probability per unknown coordinate, each in `[0, 1]`.
pub type ProbabilityMap = HashMap<Coord, f64>;

/// The raw output of enumeration: the group partition of the unknown cells
/// and every mine-count assignment consistent with the clues.
///
/// An empty `configs` set means the clues are mutually contradictory with
/// the given mine count. That is data, not an error, at this level.
pub struct ConfigurationSet {
    /// Unknown cells partitioned by identical clue adjacency. Cells within
    /// a group are interchangeable for probability purposes.
    pub groups: Vec<Vec<Coord>>,
    /// Each configuration assigns a mine count to every group, in group
    /// order.
    pub configs: HashSet<Vec<u32>>,
}

/// One solve over a board snapshot.
pub struct Solver<'a, B: BoardView + ?Sized> {
    board: &'a B,
    total_mines: u32,
    max_per_cell: u32,
    unknown_cells: Vec<Coord>,
    clue_cells: Vec<(Coord, u32)>,
    cancel: CancelToken,
}

impl<'a, B: BoardView + ?Sized> Solver<'a, B> {
    /// Validate inputs and take a snapshot of the board's cell partition.
    ///
    /// Cheap pre-checks that reject before any reduction work: a zero
    /// per-cell cap, a clue exceeding its own neighbor capacity, or more
    /// mines than the unknown cells can hold.
    pub fn new(board: &'a B, total_mines: u32, max_per_cell: u32) -> Result<Self> {
        if max_per_cell == 0 {
            return Err(SolverError::InvalidInput(
                "max mines per cell must be at least 1".into(),
            ));
        }

        let mut unknown_cells = Vec::new();
        let mut clue_cells = Vec::new();
        for coord in board.all_coords() {
            match board.state(coord) {
                CellState::Revealed(clue) => clue_cells.push((coord, clue)),
                CellState::Hidden | CellState::Flagged => unknown_cells.push(coord),
            }
        }

        for &(coord, clue) in &clue_cells {
            let capacity = board.neighbors(coord).len() as u64 * max_per_cell as u64;
            if clue as u64 > capacity {
                return Err(SolverError::InvalidInput(format!(
                    "clue {clue} at {coord:?} exceeds its neighbor capacity of {capacity}"
                )));
            }
        }
        if total_mines as u64 > unknown_cells.len() as u64 * max_per_cell as u64 {
            return Err(SolverError::InvalidInput(format!(
                "{} mines cannot fit in {} unknown cells",
                total_mines,
                unknown_cells.len()
            )));
        }

        Ok(Self {
            board,
            total_mines,
            max_per_cell,
            unknown_cells,
            clue_cells,
            cancel: CancelToken::default(),
        })
    }

    /// Attach a cancellation token checked inside the enumeration loops.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// The board as simultaneous equations over the unknown cells: one row
    /// per clue with at least one unknown neighbor (coefficients count
    /// neighbor multiplicity), plus the closing all-ones row for the total
    /// remaining mines.
    fn full_matrix(&self) -> LinearSystem {
        let index: HashMap<Coord, usize> = self
            .unknown_cells
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, i))
            .collect();

        let mut rows = Vec::with_capacity(self.clue_cells.len() + 1);
        let mut rhs = Vec::with_capacity(self.clue_cells.len() + 1);
        for &(coord, clue) in &self.clue_cells {
            let mut row = vec![0i64; self.unknown_cells.len()];
            let mut touches_unknown = false;
            for nbr in self.board.neighbors(coord) {
                if let Some(&i) = index.get(nbr) {
                    row[i] += 1;
                    touches_unknown = true;
                }
            }
            if touches_unknown {
                rows.push(row);
                rhs.push(clue as i64);
            }
        }
        rows.push(vec![1; self.unknown_cells.len()]);
        rhs.push(self.total_mines as i64);

        LinearSystem::from_integers(rows, rhs)
    }

    fn collect_groups(&self, inverse: &[usize], group_count: usize) -> Vec<Vec<Coord>> {
        let mut groups = vec![Vec::new(); group_count];
        for (cell_index, &group) in inverse.iter().enumerate() {
            groups[group].push(self.unknown_cells[cell_index]);
        }
        groups
    }

    /// Every group-level mine assignment consistent with the clues.
    pub fn configurations(&self) -> Result<ConfigurationSet> {
        let full = self.full_matrix();
        let (grouped, inverse) = full.unique_cols();
        let groups = self.collect_groups(&inverse, grouped.cols());
        debug!(
            cells = self.unknown_cells.len(),
            groups = groups.len(),
            "merged interchangeable cells"
        );

        let reduced = grouped.rref();
        debug!(
            fixed = reduced.fixed_cols.len(),
            free = reduced.free_cols.len(),
            "reduced equation system"
        );
        if reduced.contradictory {
            return Ok(ConfigurationSet {
                groups,
                configs: HashSet::new(),
            });
        }

        let caps: Vec<u32> = groups
            .iter()
            .map(|g| g.len() as u32 * self.max_per_cell)
            .collect();
        let limits = bounds::free_variable_bounds(&grouped, &caps, &reduced.free_cols)?;
        debug!(?limits, "free variable ceilings");

        let configs = self.enumerate(&reduced, &caps, &limits)?;
        debug!(configs = configs.len(), "enumerated feasible configurations");

        Ok(ConfigurationSet { groups, configs })
    }

    /// Walk the inclusive box `[0, limit]` over the free columns; keep each
    /// point whose implied fixed values are whole numbers within their
    /// group caps.
    fn enumerate(
        &self,
        reduced: &ReducedSystem,
        caps: &[u32],
        limits: &[u32],
    ) -> Result<HashSet<Vec<u32>>> {
        let free_system = reduced.system.filter_cols(&reduced.free_cols);
        let mut configs = HashSet::new();
        let mut point = vec![0u32; limits.len()];

        loop {
            if self.cancel.is_cancelled() {
                return Err(SolverError::Cancelled);
            }

            let fixed_vals = free_system.reduce_vec_with_vals(&point);
            if let Some(fixed) = checked_fixed_values(&fixed_vals, &reduced.fixed_cols, caps) {
                let mut config = vec![0u32; caps.len()];
                for (i, &c) in reduced.free_cols.iter().enumerate() {
                    config[c] = point[i];
                }
                for (i, &c) in reduced.fixed_cols.iter().enumerate() {
                    config[c] = fixed[i];
                }
                configs.insert(config);
            }

            // Advance the odometer; done once every digit wraps.
            let mut i = 0;
            loop {
                if i == point.len() {
                    return Ok(configs);
                }
                if point[i] < limits[i] {
                    point[i] += 1;
                    break;
                }
                point[i] = 0;
                i += 1;
            }
        }
    }

    /// Per-cell mine probabilities. An empty configuration set surfaces as
    /// [`SolverError::InconsistentBoard`] here.
    pub fn probabilities(&self, combinatorics: &Combinatorics) -> Result<ProbabilityMap> {
        let set = self.configurations()?;
        if set.configs.is_empty() {
            return Err(SolverError::InconsistentBoard);
        }
        self.aggregate(combinatorics, &set)
    }

    /// Weight of one configuration, proportional to the number of distinct
    /// mine layouts realizing it. `count` returns ordered placements, so
    /// each group's contribution is divided by the orderings of its own
    /// mines; the leftover interleaving factor is shared by every
    /// configuration and cancels in the ratio.
    fn config_weight(
        &self,
        combinatorics: &Combinatorics,
        sizes: &[u32],
        config: &[u32],
    ) -> Result<BigRational> {
        let mut numerator = BigUint::one();
        let mut denominator = BigUint::one();
        for (group, &mines) in config.iter().enumerate() {
            numerator *=
                combinatorics.count_cancellable(sizes[group], mines, self.max_per_cell, &self.cancel)?;
            denominator *= factorial(mines);
        }
        Ok(BigRational::new(numerator.into(), denominator.into()))
    }

    fn aggregate(
        &self,
        combinatorics: &Combinatorics,
        set: &ConfigurationSet,
    ) -> Result<ProbabilityMap> {
        let sizes: Vec<u32> = set.groups.iter().map(|g| g.len() as u32).collect();

        let mut weighted: Vec<(&Vec<u32>, BigRational)> = Vec::with_capacity(set.configs.len());
        let mut total = BigRational::zero();
        for config in &set.configs {
            if self.cancel.is_cancelled() {
                return Err(SolverError::Cancelled);
            }
            let weight = self.config_weight(combinatorics, &sizes, config)?;
            total += &weight;
            weighted.push((config, weight));
        }
        if total.is_zero() {
            return Err(SolverError::InternalInconsistency(
                "zero total weight over a non-empty configuration set".into(),
            ));
        }

        let mut group_probs = vec![0.0f64; sizes.len()];
        for (config, weight) in &weighted {
            let share = (weight / &total).to_f64().ok_or_else(|| {
                SolverError::InternalInconsistency("weight share not representable".into())
            })?;
            for (group, &mines) in config.iter().enumerate() {
                group_probs[group] += share
                    * combinatorics.probability_cancellable(
                        sizes[group],
                        mines,
                        self.max_per_cell,
                        &self.cancel,
                    )?;
            }
        }

        let mut map = ProbabilityMap::new();
        for (group, cells) in set.groups.iter().enumerate() {
            for &cell in cells {
                map.insert(cell, group_probs[group].clamp(0.0, 1.0));
            }
        }
        Ok(map)
    }
}

fn checked_fixed_values(
    values: &[BigRational],
    fixed_cols: &[usize],
    caps: &[u32],
) -> Option<Vec<u32>> {
    let mut out = Vec::with_capacity(values.len());
    for (value, &col) in values.iter().zip(fixed_cols) {
        if !in_integer_range(value, caps[col]) {
            return None;
        }
        out.push(value.to_integer().to_u32()?);
    }
    Some(out)
}

/// Per-cell mine probabilities for `board` with `total_mines` remaining and
/// at most `max_per_cell` mines in any one cell.
pub fn solve<B: BoardView + ?Sized>(
    board: &B,
    total_mines: u32,
    max_per_cell: u32,
    combinatorics: &Combinatorics,
) -> Result<ProbabilityMap> {
    Solver::new(board, total_mines, max_per_cell)?.probabilities(combinatorics)
}

/// The raw configuration set for `board`, for callers doing their own
/// downstream analysis.
pub fn solve_configs<B: BoardView + ?Sized>(
    board: &B,
    total_mines: u32,
    max_per_cell: u32,
) -> Result<ConfigurationSet> {
    Solver::new(board, total_mines, max_per_cell)?.configurations()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{derive_clues, GridBoard};
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn engine() -> Combinatorics {
        Combinatorics::new()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn expected_mines(map: &ProbabilityMap) -> f64 {
        map.values().sum()
    }

    #[test]
    fn test_single_forced_cell() {
        // One clue "1" with exactly one hidden neighbor: that cell is a
        // mine with certainty.
        let board = GridBoard::parse(&["1 x"]).unwrap();
        let set = solve_configs(&board, 1, 1).unwrap();
        assert_eq!(set.groups, vec![vec![(1, 0)]]);
        assert_eq!(set.configs, HashSet::from([vec![1]]));

        let map = solve(&board, 1, 1, &engine()).unwrap();
        assert_close(map[&(1, 0)], 1.0);
    }

    #[test]
    fn test_fifty_fifty() {
        let board = GridBoard::parse(&["x 1 x"]).unwrap();
        let set = solve_configs(&board, 1, 1).unwrap();
        // Both hidden cells see the same clue, so they merge.
        assert_eq!(set.groups.len(), 1);
        assert_eq!(set.groups[0].len(), 2);
        assert_eq!(set.configs, HashSet::from([vec![1]]));

        let map = solve(&board, 1, 1, &engine()).unwrap();
        assert_close(map[&(0, 0)], 0.5);
        assert_close(map[&(2, 0)], 0.5);
    }

    #[test]
    fn test_flagged_cells_are_unknowns() {
        // A flag is an annotation, not information; the flagged cell gets
        // the same probability as its hidden twin.
        let board = GridBoard::parse(&["F 1 x"]).unwrap();
        let map = solve(&board, 1, 1, &engine()).unwrap();
        assert_close(map[&(0, 0)], 0.5);
        assert_close(map[&(2, 0)], 0.5);
    }

    #[test]
    fn test_contradictory_clues_yield_empty_set() {
        // Left clue wants a mine at the middle cell, right clue forbids it.
        let board = GridBoard::parse(&["1 x 0"]).unwrap();
        let set = solve_configs(&board, 1, 1).unwrap();
        assert!(set.configs.is_empty());

        let err = solve(&board, 1, 1, &engine()).unwrap_err();
        assert!(matches!(err, SolverError::InconsistentBoard));
    }

    #[test]
    fn test_overlapping_clues_chain() {
        // x 1 x 1 x over two rows of hidden cells: groups are "left only",
        // "shared", "right only" with A+B=1 and B+C=1.
        let board = GridBoard::parse(&["x 1 x 1 x", "x x x x x"]).unwrap();
        let map = solve(&board, 2, 1, &engine()).unwrap();
        // Two mines force A=1, B=0, C=1: one mine among each outer triple.
        for cell in [(0, 0), (0, 1), (1, 1)] {
            assert_close(map[&cell], 1.0 / 3.0);
        }
        for cell in [(2, 0), (2, 1)] {
            assert_close(map[&cell], 0.0);
        }
        for cell in [(4, 0), (3, 1), (4, 1)] {
            assert_close(map[&cell], 1.0 / 3.0);
        }
        assert_close(expected_mines(&map), 2.0);
    }

    #[test]
    fn test_free_variable_enumeration() {
        // Same chain plus an unconstrained far region, leaving one free
        // variable after reduction. Hand-computed weights over the two
        // surviving configurations give exact probabilities.
        let board = GridBoard::parse(&[
            "x 1 x 1 x x x x x",
            "x x x x x x x x x",
        ])
        .unwrap();
        let solver = Solver::new(&board, 3, 1).unwrap();
        let set = solver.configurations().unwrap();
        assert_eq!(set.groups.len(), 4);
        assert_eq!(
            set.configs,
            HashSet::from([vec![1, 0, 1, 1], vec![0, 1, 0, 2]])
        );

        let map = solver.probabilities(&engine()).unwrap();
        // Weights: 72 for the (1,0,1,1) split, 56 for (0,1,0,2).
        assert_close(map[&(0, 0)], 24.0 / 128.0);
        assert_close(map[&(2, 0)], 28.0 / 128.0);
        assert_close(map[&(4, 0)], 24.0 / 128.0);
        assert_close(map[&(5, 0)], 23.0 / 128.0);
        assert_close(expected_mines(&map), 3.0);
    }

    #[test]
    fn test_independent_regions() {
        // Two clue islands with disjoint neighborhoods: the left region's
        // probability is untouched by the right region's layout.
        let mut board = GridBoard::new(6, 3);
        board.set(1, 1, CellState::Revealed(1));
        board.set(4, 1, CellState::Revealed(1));
        let map = solve(&board, 2, 1, &engine()).unwrap();
        assert_close(map[&(0, 0)], 1.0 / 8.0);
        assert_close(map[&(5, 2)], 1.0 / 8.0);
        assert_close(expected_mines(&map), 2.0);

        // Change the right island's clue and mine budget; the left island
        // must not move.
        let mut board = GridBoard::new(6, 3);
        board.set(1, 1, CellState::Revealed(1));
        board.set(4, 1, CellState::Revealed(2));
        let map = solve(&board, 3, 1, &engine()).unwrap();
        assert_close(map[&(0, 0)], 1.0 / 8.0);
        assert_close(map[&(5, 2)], 2.0 / 8.0);
        assert_close(expected_mines(&map), 3.0);
    }

    #[test]
    fn test_multi_mine_cells() {
        // One hidden cell absorbing both mines in double-mine mode.
        let board = GridBoard::parse(&["2 x"]).unwrap();
        let map = solve(&board, 2, 2, &engine()).unwrap();
        assert_close(map[&(1, 0)], 1.0);

        // Two interchangeable cells sharing two mines, cap 2 each: the
        // placement is independent, so P(at least one) = 3/4.
        let board = GridBoard::parse(&["x 2 x"]).unwrap();
        let map = solve(&board, 2, 2, &engine()).unwrap();
        assert_close(map[&(0, 0)], 0.75);
        assert_close(map[&(2, 0)], 0.75);
    }

    #[test]
    fn test_fully_revealed_board() {
        let board = GridBoard::parse(&["0 0", "0 0"]).unwrap();
        let map = solve(&board, 0, 1, &engine()).unwrap();
        assert!(map.is_empty());

        let set = solve_configs(&board, 0, 1).unwrap();
        assert_eq!(set.configs.len(), 1);
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let board = GridBoard::parse(&["x 1 x"]).unwrap();
        assert!(matches!(
            solve(&board, 1, 0, &engine()),
            Err(SolverError::InvalidInput(_))
        ));
        // More mines than the two unknown cells can hold.
        assert!(matches!(
            solve(&board, 5, 1, &engine()),
            Err(SolverError::InvalidInput(_))
        ));
        // A clue exceeding its neighbor capacity.
        let board = GridBoard::parse(&["9 x"]).unwrap();
        assert!(matches!(
            solve(&board, 1, 1, &engine()),
            Err(SolverError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_cancellation() {
        let board = GridBoard::parse(&["x 1 x"]).unwrap();
        let token = CancelToken::new();
        token.cancel();
        let solver = Solver::new(&board, 1, 1).unwrap().with_cancel(token);
        assert!(matches!(
            solver.probabilities(&engine()),
            Err(SolverError::Cancelled)
        ));
    }

    #[test]
    fn test_reference_board_smoke() {
        // A mostly hidden 5x5 board with four clues and eight mines.
        let board = GridBoard::parse(&[
            "x 2 x x x",
            "x x x x x",
            "x 3 x x x",
            "x 2 x 4 x",
            "x x x x x",
        ])
        .unwrap();
        let set = solve_configs(&board, 8, 1).unwrap();
        assert!(!set.configs.is_empty());

        let map = solve(&board, 8, 1, &engine()).unwrap();
        assert_eq!(map.len(), 21);
        assert!(map.values().all(|p| (0.0..=1.0).contains(p)));
        assert!((expected_mines(&map) - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_expected_mines_on_random_boards() {
        // Place mines, derive clues, reveal the mine-free left columns.
        // Whatever the resulting constraint structure, the probabilities
        // must account for every mine in expectation.
        for seed in [7u64, 21, 1812] {
            let mut rng = SmallRng::seed_from_u64(seed);
            let (width, height, mines) = (5usize, 4usize, 4u32);

            let mut mine_counts = vec![0u32; width * height];
            let mut placed = 0;
            while placed < mines {
                let i = rng.random_range(0..mine_counts.len());
                if mine_counts[i] == 0 {
                    mine_counts[i] = 1;
                    placed += 1;
                }
            }
            let clues = derive_clues(width, height, &mine_counts);

            let mut board = GridBoard::new(width, height);
            for x in 0..2 {
                for y in 0..height {
                    let i = x * height + y;
                    if mine_counts[i] == 0 {
                        board.set(x, y, CellState::Revealed(clues[i]));
                    }
                }
            }

            let map = solve(&board, mines, 1, &engine()).unwrap();
            assert!(
                (expected_mines(&map) - mines as f64).abs() < 1e-6,
                "seed {seed}"
            );
        }
    }
}
