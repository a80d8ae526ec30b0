//! Enumeration ceilings for free variables, via an LP relaxation.
//!
//! Each free column gets one linear program: maximize that column subject
//! to the pre-reduction group equations and `0 <= x_i <= cap_i`. The
//! relaxed optimum is floored and clamped, which is always a safe ceiling
//! for the integer search — floating point never leaks past this module.

use crate::error::{Result, SolverError};
use crate::matrix::LinearSystem;

const EPS: f64 = 1e-9;
/// Penalty weight driving artificial variables out of the basis.
const BIG_M: f64 = 1e7;
const MAX_PIVOTS: usize = 10_000;

/// Safe upper bounds for the given free columns of `system`.
///
/// `caps[i]` is column `i`'s capacity (group size times max mines per
/// cell). Infeasibility or unboundedness of the relaxation means the
/// system handed in was malformed and surfaces as `BoundingFailure`.
pub fn free_variable_bounds(
    system: &LinearSystem,
    caps: &[u32],
    free_cols: &[usize],
) -> Result<Vec<u32>> {
    let (matrix, rhs) = system
        .to_f64_parts()
        .ok_or_else(|| SolverError::BoundingFailure("coefficient not representable".into()))?;
    let caps_f: Vec<f64> = caps.iter().map(|&c| c as f64).collect();

    let mut bounds = Vec::with_capacity(free_cols.len());
    for &col in free_cols {
        let optimum = maximize_variable(&matrix, &rhs, &caps_f, col)?;
        let floored = (optimum + 1e-6).floor().max(0.0) as u32;
        bounds.push(floored.min(caps[col]));
    }
    Ok(bounds)
}

/// Maximize `x[target]` subject to `matrix · x = rhs`, `0 <= x <= caps`.
///
/// Dense big-M simplex: equality rows carry artificial variables, cap rows
/// carry slacks. Bland's rule (first improving column, lowest-index tie
/// break on leaving rows) prevents cycling; the pivot cap is a backstop.
fn maximize_variable(
    matrix: &[Vec<f64>],
    rhs: &[f64],
    caps: &[f64],
    target: usize,
) -> Result<f64> {
    let n = caps.len();
    let meq = matrix.len();
    let nrows = meq + n;
    let ncols = 2 * n + meq; // structural: x, slacks, artificials

    let mut tableau = vec![vec![0.0; ncols + 1]; nrows];
    let mut basis = vec![0usize; nrows];

    for (i, row) in matrix.iter().enumerate() {
        let sign = if rhs[i] < 0.0 { -1.0 } else { 1.0 };
        for (j, &a) in row.iter().enumerate() {
            tableau[i][j] = sign * a;
        }
        tableau[i][2 * n + i] = 1.0;
        tableau[i][ncols] = sign * rhs[i];
        basis[i] = 2 * n + i;
    }
    for j in 0..n {
        let r = meq + j;
        tableau[r][j] = 1.0;
        tableau[r][n + j] = 1.0;
        tableau[r][ncols] = caps[j];
        basis[r] = n + j;
    }

    let mut costs = vec![0.0; ncols];
    costs[target] = 1.0;
    for j in 0..meq {
        costs[2 * n + j] = -BIG_M;
    }

    // Reduced costs relative to the initial basis.
    let mut reduced = costs.clone();
    for i in 0..nrows {
        let cb = costs[basis[i]];
        if cb != 0.0 {
            for j in 0..ncols {
                reduced[j] -= cb * tableau[i][j];
            }
        }
    }

    for _ in 0..MAX_PIVOTS {
        let Some(enter) = (0..ncols).find(|&j| reduced[j] > EPS) else {
            let artificial_load: f64 = (0..nrows)
                .filter(|&i| basis[i] >= 2 * n)
                .map(|i| tableau[i][ncols])
                .sum();
            if artificial_load > 1e-6 {
                return Err(SolverError::BoundingFailure(
                    "LP relaxation is infeasible".into(),
                ));
            }
            let value = (0..nrows)
                .find(|&i| basis[i] == target)
                .map_or(0.0, |i| tableau[i][ncols]);
            return Ok(value);
        };

        let mut leave: Option<usize> = None;
        let mut best = f64::INFINITY;
        for i in 0..nrows {
            if tableau[i][enter] > EPS {
                let ratio = tableau[i][ncols] / tableau[i][enter];
                let tie = (ratio - best).abs() <= EPS;
                if ratio < best - EPS || (tie && leave.is_some_and(|l| basis[i] < basis[l])) {
                    best = ratio;
                    leave = Some(i);
                }
            }
        }
        let Some(leave) = leave else {
            return Err(SolverError::BoundingFailure(
                "LP relaxation is unbounded".into(),
            ));
        };

        let pivot = tableau[leave][enter];
        for j in 0..=ncols {
            tableau[leave][j] /= pivot;
        }
        for i in 0..nrows {
            if i == leave || tableau[i][enter].abs() <= f64::EPSILON {
                continue;
            }
            let factor = tableau[i][enter];
            for j in 0..=ncols {
                tableau[i][j] -= factor * tableau[leave][j];
            }
        }
        let factor = reduced[enter];
        for j in 0..ncols {
            reduced[j] -= factor * tableau[leave][j];
        }
        basis[leave] = enter;
    }

    Err(SolverError::BoundingFailure(
        "simplex pivot limit reached".into(),
    ))
}
