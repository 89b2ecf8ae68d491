//! Dense two-phase simplex for `min c'x  s.t.  A_eq x = b_eq,  0 <= x <= u`.
//!
//! Finite upper bounds become slack rows. Every equality row gets an
//! artificial column; phase 1 drives them to zero, phase 2 optimizes the
//! real objective with artificials locked out of the basis.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::PlannerError;

/// Consecutive degenerate pivots tolerated before switching to Bland's rule.
const DEGENERATE_STREAK_LIMIT: usize = 64;

/// A linear program in equality form with box bounds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearProgram {
    pub c: Vec<f64>,
    pub a_eq: Vec<Vec<f64>>,
    pub b_eq: Vec<f64>,
    /// Upper bound per variable, `f64::INFINITY` when unbounded.
    pub upper: Vec<f64>,
}

impl LinearProgram {
    pub fn validate(&self) -> Result<(), PlannerError> {
        let n = self.c.len();
        if self.upper.len() != n {
            return Err(PlannerError::InvalidProblem(format!(
                "{} upper bounds for {} variables",
                self.upper.len(),
                n
            )));
        }
        if self.a_eq.len() != self.b_eq.len() {
            return Err(PlannerError::InvalidProblem(format!(
                "{} equality rows but {} right-hand sides",
                self.a_eq.len(),
                self.b_eq.len()
            )));
        }
        if let Some(r) = self.a_eq.iter().position(|row| row.len() != n) {
            return Err(PlannerError::InvalidProblem(format!(
                "equality row {r} has {} coefficients, expected {n}",
                self.a_eq[r].len()
            )));
        }
        let finite = self.c.iter().chain(self.b_eq.iter()).all(|v| v.is_finite())
            && self.a_eq.iter().flatten().all(|v| v.is_finite());
        if !finite {
            return Err(PlannerError::InvalidProblem(
                "coefficients must be finite".into(),
            ));
        }
        if let Some(k) = self.upper.iter().position(|u| u.is_nan() || *u < 0.0) {
            return Err(PlannerError::InvalidProblem(format!(
                "upper bound of variable {k} is {}",
                self.upper[k]
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LpStatus {
    Optimal,
    Infeasible,
    Unbounded,
    IterationLimit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinProgSolution {
    pub x: Vec<f64>,
    pub objective: f64,
    pub iterations: usize,
    pub status: LpStatus,
}

impl LinProgSolution {
    pub fn is_optimal(&self) -> bool {
        self.status == LpStatus::Optimal
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SimplexSolver {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for SimplexSolver {
    fn default() -> Self {
        Self {
            tolerance: 1e-9,
            max_iterations: 100_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Tableau
// ---------------------------------------------------------------------------

struct Tableau {
    rows: Vec<Vec<f64>>,
    basis: Vec<usize>,
    /// Reduced costs. The last entry holds the negated objective value.
    cost: Vec<f64>,
    cols: usize,
}

enum Outcome {
    Optimal,
    Unbounded,
    IterationLimit,
}

impl Tableau {
    fn rhs(&self, r: usize) -> f64 {
        self.rows[r][self.cols]
    }

    fn pivot(&mut self, r: usize, c: usize) {
        let p = self.rows[r][c];
        for v in self.rows[r].iter_mut() {
            *v /= p;
        }
        let pivot_row = self.rows[r].clone();
        let nonzero: Vec<usize> = (0..=self.cols).filter(|&k| pivot_row[k] != 0.0).collect();

        for (k, row) in self.rows.iter_mut().enumerate() {
            let f = row[c];
            if k == r || f == 0.0 {
                continue;
            }
            for &q in &nonzero {
                row[q] -= f * pivot_row[q];
            }
        }
        let f = self.cost[c];
        if f != 0.0 {
            for &q in &nonzero {
                self.cost[q] -= f * pivot_row[q];
            }
        }
        self.basis[r] = c;
    }

    /// Primal simplex over columns flagged in `allowed`.
    fn optimize(
        &mut self,
        allowed: &[bool],
        tol: f64,
        max_iterations: usize,
        iterations: &mut usize,
    ) -> Outcome {
        let mut degenerate_streak = 0;

        loop {
            if *iterations >= max_iterations {
                return Outcome::IterationLimit;
            }
            let bland = degenerate_streak > DEGENERATE_STREAK_LIMIT;

            let mut candidates = (0..self.cols).filter(|&j| allowed[j] && self.cost[j] < -tol);
            let entering = if bland {
                candidates.next()
            } else {
                candidates.min_by(|&a, &b| self.cost[a].total_cmp(&self.cost[b]))
            };
            let Some(c) = entering else {
                return Outcome::Optimal;
            };

            let mut leaving: Option<(usize, f64)> = None;
            for r in 0..self.rows.len() {
                let a = self.rows[r][c];
                if a <= tol {
                    continue;
                }
                let ratio = self.rhs(r) / a;
                leaving = match leaving {
                    None => Some((r, ratio)),
                    Some((best, best_ratio)) => {
                        if ratio < best_ratio - tol
                            || (ratio <= best_ratio + tol && self.basis[r] < self.basis[best])
                        {
                            Some((r, ratio))
                        } else {
                            Some((best, best_ratio))
                        }
                    }
                };
            }
            let Some((r, ratio)) = leaving else {
                return Outcome::Unbounded;
            };

            if ratio <= tol {
                degenerate_streak += 1;
            } else {
                degenerate_streak = 0;
            }
            self.pivot(r, c);
            *iterations += 1;
        }
    }
}

impl SimplexSolver {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }

    /// Solve the program. Only malformed input is an error; infeasible,
    /// unbounded and truncated runs are reported through the status.
    pub fn solve(&self, lp: &LinearProgram) -> Result<LinProgSolution, PlannerError> {
        lp.validate()?;

        let tol = self.tolerance;
        let n = lp.c.len();
        let m_eq = lp.a_eq.len();
        let bounded: Vec<usize> = (0..n).filter(|&k| lp.upper[k].is_finite()).collect();
        let m_bound = bounded.len();
        let artificial = n + m_bound;
        let cols = artificial + m_eq;

        let mut rows = Vec::with_capacity(m_eq + m_bound);
        let mut basis = Vec::with_capacity(m_eq + m_bound);
        for (r, (coefficients, &b)) in lp.a_eq.iter().zip(&lp.b_eq).enumerate() {
            let sign = if b < 0.0 { -1.0 } else { 1.0 };
            let mut row = vec![0.0; cols + 1];
            for (q, &a) in coefficients.iter().enumerate() {
                row[q] = sign * a;
            }
            row[artificial + r] = 1.0;
            row[cols] = sign * b;
            rows.push(row);
            basis.push(artificial + r);
        }
        for (t, &k) in bounded.iter().enumerate() {
            let mut row = vec![0.0; cols + 1];
            row[k] = 1.0;
            row[n + t] = 1.0;
            row[cols] = lp.upper[k];
            rows.push(row);
            basis.push(n + t);
        }

        // Phase 1: minimize the sum of artificials.
        let mut cost = vec![0.0; cols + 1];
        for value in cost.iter_mut().take(cols).skip(artificial) {
            *value = 1.0;
        }
        for row in rows.iter().take(m_eq) {
            for (q, v) in row.iter().enumerate() {
                cost[q] -= v;
            }
        }

        let mut tableau = Tableau {
            rows,
            basis,
            cost,
            cols,
        };
        let mut iterations = 0;
        let all_columns = vec![true; cols];

        match tableau.optimize(&all_columns, tol, self.max_iterations, &mut iterations) {
            Outcome::Optimal => {}
            Outcome::IterationLimit => {
                return Ok(Self::terminal(n, iterations, LpStatus::IterationLimit))
            }
            Outcome::Unbounded => return Ok(Self::terminal(n, iterations, LpStatus::Infeasible)),
        }

        let scale = 1.0 + lp.b_eq.iter().fold(0.0_f64, |acc, b| acc.max(b.abs()));
        let infeasibility = -tableau.cost[cols];
        if infeasibility > 1e-7 * scale {
            debug!(infeasibility, iterations, "Phase 1 ended with positive artificials");
            return Ok(Self::terminal(n, iterations, LpStatus::Infeasible));
        }

        // Pivot zero-level artificials out, or drop their redundant rows.
        let mut redundant = Vec::new();
        for r in 0..tableau.rows.len() {
            if tableau.basis[r] < artificial {
                continue;
            }
            let replacement = (0..artificial).find(|&q| tableau.rows[r][q].abs() > tol);
            match replacement {
                Some(q) => tableau.pivot(r, q),
                None => redundant.push(r),
            }
        }
        for r in redundant.into_iter().rev() {
            tableau.rows.remove(r);
            tableau.basis.remove(r);
        }

        // Phase 2 on the real objective.
        let objective_coefficient = |q: usize| if q < n { lp.c[q] } else { 0.0 };
        let mut cost = vec![0.0; cols + 1];
        cost[..n].copy_from_slice(&lp.c);
        for (row, &b) in tableau.rows.iter().zip(&tableau.basis) {
            let cb = objective_coefficient(b);
            if cb != 0.0 {
                for (q, v) in row.iter().enumerate() {
                    cost[q] -= cb * v;
                }
            }
        }
        tableau.cost = cost;

        let structural: Vec<bool> = (0..cols).map(|q| q < artificial).collect();
        let status = match tableau.optimize(&structural, tol, self.max_iterations, &mut iterations) {
            Outcome::Optimal => LpStatus::Optimal,
            Outcome::Unbounded => LpStatus::Unbounded,
            Outcome::IterationLimit => LpStatus::IterationLimit,
        };

        let mut x = vec![0.0; n];
        for (r, &b) in tableau.basis.iter().enumerate() {
            if b < n {
                x[b] = tableau.rhs(r).max(0.0);
            }
        }
        let objective = lp.c.iter().zip(&x).map(|(c, x)| c * x).sum();

        debug!(variables = n, rows = tableau.rows.len(), iterations, ?status, "Simplex finished");

        Ok(LinProgSolution {
            x,
            objective,
            iterations,
            status,
        })
    }

    fn terminal(n: usize, iterations: usize, status: LpStatus) -> LinProgSolution {
        LinProgSolution {
            x: vec![0.0; n],
            objective: f64::NAN,
            iterations,
            status,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
