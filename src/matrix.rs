//! Simultaneous equations in matrix form, with exact rational arithmetic.
//!
//! The reduction step feeds feasibility checks that compare against zero and
//! integer caps, so everything here stays in `BigRational`. Floating point
//! is confined to the LP bound in `bounds.rs`, whose output is only ever a
//! safe enumeration ceiling.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};

/// A coefficient matrix paired with its right-hand-side vector.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearSystem {
    matrix: Vec<Vec<BigRational>>,
    vec: Vec<BigRational>,
}

/// Output of [`LinearSystem::rref`].
pub struct ReducedSystem {
    /// The system in reduced row-echelon form, all-zero rows dropped. One
    /// row per pivot, in pivot-column order.
    pub system: LinearSystem,
    /// Pivot columns: determined by the free columns via substitution.
    pub fixed_cols: Vec<usize>,
    /// Non-pivot columns: independently choosable within bounds.
    pub free_cols: Vec<usize>,
    /// True if elimination exposed a row `0 = c` with `c != 0`; the system
    /// then has no solution at all.
    pub contradictory: bool,
}

impl LinearSystem {
    pub fn new(matrix: Vec<Vec<BigRational>>, vec: Vec<BigRational>) -> Self {
        debug_assert_eq!(matrix.len(), vec.len());
        Self { matrix, vec }
    }

    pub fn from_integers(rows: Vec<Vec<i64>>, rhs: Vec<i64>) -> Self {
        let matrix = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|v| BigRational::from_integer(BigInt::from(v)))
                    .collect()
            })
            .collect();
        let vec = rhs
            .into_iter()
            .map(|v| BigRational::from_integer(BigInt::from(v)))
            .collect();
        Self::new(matrix, vec)
    }

    pub fn rows(&self) -> usize {
        self.vec.len()
    }

    pub fn cols(&self) -> usize {
        self.matrix.first().map_or(0, Vec::len)
    }

    pub fn coeff(&self, row: usize, col: usize) -> &BigRational {
        &self.matrix[row][col]
    }

    pub fn rhs(&self, row: usize) -> &BigRational {
        &self.vec[row]
    }

    /// Drop duplicate columns, keeping first occurrences in order. Returns
    /// the deduplicated system and the map from original column index to
    /// its representative's index.
    pub fn unique_cols(&self) -> (LinearSystem, Vec<usize>) {
        let nrows = self.rows();
        let mut kept: Vec<Vec<BigRational>> = Vec::new();
        let mut inverse = Vec::with_capacity(self.cols());

        for c in 0..self.cols() {
            let column: Vec<BigRational> =
                (0..nrows).map(|r| self.matrix[r][c].clone()).collect();
            match kept.iter().position(|k| *k == column) {
                Some(j) => inverse.push(j),
                None => {
                    kept.push(column);
                    inverse.push(kept.len() - 1);
                }
            }
        }

        let matrix = (0..nrows)
            .map(|r| kept.iter().map(|col| col[r].clone()).collect())
            .collect();
        (LinearSystem::new(matrix, self.vec.clone()), inverse)
    }

    /// Keep only the given columns, in the given order. The right-hand side
    /// is unchanged.
    pub fn filter_cols(&self, cols: &[usize]) -> LinearSystem {
        let matrix = self
            .matrix
            .iter()
            .map(|row| cols.iter().map(|&c| row[c].clone()).collect())
            .collect();
        LinearSystem::new(matrix, self.vec.clone())
    }

    /// Exact reduction to reduced row-echelon form over the augmented
    /// `[matrix | vec]`.
    pub fn rref(&self) -> ReducedSystem {
        let nrows = self.rows();
        let ncols = self.cols();

        // Work on joined rows so the right-hand side is eliminated along
        // with the coefficients.
        let mut rows: Vec<Vec<BigRational>> = self
            .matrix
            .iter()
            .zip(&self.vec)
            .map(|(row, rhs)| {
                let mut joined = row.clone();
                joined.push(rhs.clone());
                joined
            })
            .collect();

        let mut pivot_cols = Vec::new();
        let mut r = 0;
        for c in 0..ncols {
            let Some(p) = (r..nrows).find(|&i| !rows[i][c].is_zero()) else {
                continue;
            };
            rows.swap(r, p);

            let pivot = rows[r][c].clone();
            for entry in &mut rows[r] {
                *entry = &*entry / &pivot;
            }
            for k in 0..nrows {
                if k == r || rows[k][c].is_zero() {
                    continue;
                }
                let factor = rows[k][c].clone();
                for j in 0..=ncols {
                    let delta = &factor * &rows[r][j];
                    rows[k][j] = &rows[k][j] - &delta;
                }
            }

            pivot_cols.push(c);
            r += 1;
            if r == nrows {
                break;
            }
        }

        // Rows below the pivots have all-zero coefficients; a nonzero
        // right-hand side there means the system is unsatisfiable.
        let contradictory = rows[r..].iter().any(|row| !row[ncols].is_zero());

        let (matrix, vec) = rows
            .into_iter()
            .take(pivot_cols.len())
            .map(|mut row| {
                let rhs = row.pop().unwrap_or_else(BigRational::zero);
                (row, rhs)
            })
            .unzip();

        let free_cols = (0..ncols).filter(|c| !pivot_cols.contains(c)).collect();
        ReducedSystem {
            system: LinearSystem::new(matrix, vec),
            fixed_cols: pivot_cols,
            free_cols,
            contradictory,
        }
    }

    /// `vec − matrix · vals`: the implied values of the pivot columns given
    /// values for the columns this system was filtered down to.
    pub fn reduce_vec_with_vals(&self, vals: &[u32]) -> Vec<BigRational> {
        debug_assert_eq!(self.cols(), vals.len());
        self.matrix
            .iter()
            .zip(&self.vec)
            .map(|(row, rhs)| {
                let mut acc = rhs.clone();
                for (coeff, &v) in row.iter().zip(vals) {
                    if v != 0 {
                        let term = coeff * BigRational::from_integer(BigInt::from(v));
                        acc -= term;
                    }
                }
                acc
            })
            .collect()
    }

    /// Coefficients and right-hand side as `f64`, for the LP relaxation.
    /// `None` if any value fails to convert.
    pub fn to_f64_parts(&self) -> Option<(Vec<Vec<f64>>, Vec<f64>)> {
        let matrix = self
            .matrix
            .iter()
            .map(|row| row.iter().map(ToPrimitive::to_f64).collect())
            .collect::<Option<Vec<Vec<f64>>>>()?;
        let vec = self
            .vec
            .iter()
            .map(ToPrimitive::to_f64)
            .collect::<Option<Vec<f64>>>()?;
        Some((matrix, vec))
    }
}

/// True when `value` is a whole number in `[0, cap]`.
pub fn in_integer_range(value: &BigRational, cap: u32) -> bool {
    value.is_integer()
        && !value.is_negative()
        && *value <= BigRational::from_integer(BigInt::from(cap))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rational(n: i64) -> BigRational {
        BigRational::from_integer(BigInt::from(n))
    }

    #[test]
    fn test_unique_cols_merges_duplicates() {
        // Columns 0 and 2 are identical, as are 1 and 3.
        let system = LinearSystem::from_integers(
            vec![vec![1, 0, 1, 0], vec![0, 2, 0, 2], vec![1, 1, 1, 1]],
            vec![1, 2, 3],
        );
        let (unique, inverse) = system.unique_cols();
        assert_eq!(unique.cols(), 2);
        assert_eq!(inverse, vec![0, 1, 0, 1]);

        // Re-expanding through the inverse map reconstructs the original.
        for r in 0..system.rows() {
            for (c, &g) in inverse.iter().enumerate() {
                assert_eq!(system.coeff(r, c), unique.coeff(r, g));
            }
        }
    }

    #[test]
    fn test_unique_cols_all_distinct() {
        let system =
            LinearSystem::from_integers(vec![vec![1, 0], vec![0, 1]], vec![1, 1]);
        let (unique, inverse) = system.unique_cols();
        assert_eq!(unique.cols(), 2);
        assert_eq!(inverse, vec![0, 1]);
    }

    #[test]
    fn test_rref_identity_result() {
        // x + y = 1, x = 1  =>  x = 1, y = 0.
        let system =
            LinearSystem::from_integers(vec![vec![1, 1], vec![1, 0]], vec![1, 1]);
        let reduced = system.rref();
        assert!(!reduced.contradictory);
        assert_eq!(reduced.fixed_cols, vec![0, 1]);
        assert!(reduced.free_cols.is_empty());
        assert_eq!(reduced.system.rhs(0), &rational(1));
        assert_eq!(reduced.system.rhs(1), &rational(0));
    }

    #[test]
    fn test_rref_drops_zero_rows() {
        // Second row is a multiple of the first.
        let system =
            LinearSystem::from_integers(vec![vec![1, 2], vec![2, 4]], vec![3, 6]);
        let reduced = system.rref();
        assert!(!reduced.contradictory);
        assert_eq!(reduced.system.rows(), 1);
        assert_eq!(reduced.fixed_cols, vec![0]);
        assert_eq!(reduced.free_cols, vec![1]);
    }

    #[test]
    fn test_rref_detects_contradiction() {
        // x = 1 and x = 0 cannot both hold.
        let system =
            LinearSystem::from_integers(vec![vec![1], vec![1]], vec![1, 0]);
        let reduced = system.rref();
        assert!(reduced.contradictory);
    }

    #[test]
    fn test_rref_rational_pivots_stay_exact() {
        // 2x + 4y = 6 reduces to x + 2y = 3 with no rounding.
        let system = LinearSystem::from_integers(vec![vec![2, 4]], vec![6]);
        let reduced = system.rref();
        assert_eq!(reduced.system.coeff(0, 0), &rational(1));
        assert_eq!(reduced.system.coeff(0, 1), &rational(2));
        assert_eq!(reduced.system.rhs(0), &rational(3));
    }

    #[test]
    fn test_substitution_satisfies_original_equations() {
        // Underdetermined system with two free columns.
        let rows = vec![vec![1, 1, 0, 1], vec![0, 1, 1, 2], vec![1, 2, 1, 3]];
        let rhs = vec![4, 5, 9];
        let system = LinearSystem::from_integers(rows.clone(), rhs.clone());
        let reduced = system.rref();
        assert!(!reduced.contradictory);

        let free_system = reduced.system.filter_cols(&reduced.free_cols);
        for free_vals in [[0u32, 0], [1, 0], [2, 3], [5, 1]] {
            let fixed_vals = free_system.reduce_vec_with_vals(&free_vals);

            // Assemble the full solution vector in original column order.
            let mut solution = vec![BigRational::zero(); system.cols()];
            for (i, &c) in reduced.free_cols.iter().enumerate() {
                solution[c] = rational(free_vals[i] as i64);
            }
            for (i, &c) in reduced.fixed_cols.iter().enumerate() {
                solution[c] = fixed_vals[i].clone();
            }

            for (row, &b) in rows.iter().zip(&rhs) {
                let lhs: BigRational = row
                    .iter()
                    .zip(&solution)
                    .map(|(&a, x)| rational(a) * x)
                    .sum();
                assert_eq!(lhs, rational(b));
            }
        }
    }

    #[test]
    fn test_in_integer_range() {
        assert!(in_integer_range(&rational(0), 3));
        assert!(in_integer_range(&rational(3), 3));
        assert!(!in_integer_range(&rational(4), 3));
        assert!(!in_integer_range(&rational(-1), 3));
        let half = BigRational::new(BigInt::from(1), BigInt::from(2));
        assert!(!in_integer_range(&half, 3));
    }
}
