//! Data amount planning.
//!
//! Builds the linear program that maximizes processed data and minimizes
//! dropped data over the network, solves it and writes the plan
//! (`x`, `y`, `z`, `g`) back into the data.
//!
//! Per `(j, rho, l)` the incoming amount has to be disposed of:
//!
//! ```text
//! x_eq[j,rho,l] = g + z + y[l] - y[l-1] + sum_i x[j,i] - sum_i x[i,j]
//! ```

pub mod simplex;

pub use simplex::{LinProgSolution, LinearProgram, LpStatus, SimplexSolver};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::data::{DataInterface, DataProvider, RowIndex, Schema};
use crate::network::{NetworkData, ObjectiveWeights};
use crate::processor::DataProcessor;
use crate::types::{indices, DataError, PlannerError};

/// Variables solved for, in row layout order.
pub const ROW_VARIABLES: [&str; 4] = ["y", "x", "z", "g"];

/// Weights closer to zero than this make the objective degenerate.
const MIN_WEIGHT: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Pivot tolerance of the simplex.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-9,
            max_iterations: 100_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// The planning LP built from one snapshot of the data.
#[derive(Debug, Clone)]
pub struct LinsolvPlanner {
    schema: Schema,
    row_index: RowIndex,
    program: LinearProgram,
    solver: SimplexSolver,
}

impl LinsolvPlanner {
    pub fn new(
        data: &dyn DataInterface,
        schema: &Schema,
        config: &PlannerConfig,
    ) -> Result<Self, PlannerError> {
        validate_schema(schema)?;

        let weights = ObjectiveWeights::resolve(data)?;
        if weights.processed.abs() < MIN_WEIGHT || weights.dropped.abs() < MIN_WEIGHT {
            return Err(PlannerError::Validation(format!(
                "objective weights must be non-zero (alpha_0 = {}, alpha_1 = {})",
                weights.processed, weights.dropped
            )));
        }

        let row_index = RowIndex::from_schema(schema, &ROW_VARIABLES)?;
        let n = row_index.row_len();
        let nodes = schema.index_bound("j")?;

        // Equality rows, one per (j, rho, l) in x_eq order.
        let mut a_eq = Vec::new();
        let mut b_eq = Vec::new();
        for at in schema.iter_variable_named("x_eq")? {
            let (j, rho, l) = (at["j"], at["rho"], at["l"]);
            let mut row = vec![0.0; n];

            row[row_index.position("g", &at)?] += 1.0;
            row[row_index.position("z", &at)?] += 1.0;
            row[row_index.position("y", &at)?] += 1.0;
            if l > 0 {
                let previous = indices(&[("j", j), ("rho", rho), ("l", l - 1)]);
                row[row_index.position("y", &previous)?] -= 1.0;
            }
            for i in (0..nodes).filter(|&i| i != j) {
                let outgoing = indices(&[("j", j), ("i", i), ("rho", rho), ("l", l)]);
                let incoming = indices(&[("j", i), ("i", j), ("rho", rho), ("l", l)]);
                row[row_index.position("x", &outgoing)?] += 1.0;
                row[row_index.position("x", &incoming)?] -= 1.0;
            }

            a_eq.push(row);
            b_eq.push(data.data("x_eq", &at)?);
        }

        // Box bounds. `z` stays unbounded.
        let mut upper = vec![f64::INFINITY; n];
        for (variable, budget) in [("x", "psi"), ("y", "v"), ("g", "phi")] {
            for at in schema.iter_variable_named(variable)? {
                let self_loop = variable == "x" && at["j"] == at["i"];
                let bound = if self_loop { 0.0 } else { data.data(budget, &at)? };
                upper[row_index.position(variable, &at)?] = bound;
            }
        }

        let mut c = vec![0.0; n];
        for at in schema.iter_variable_named("g")? {
            c[row_index.position("g", &at)?] = -weights.processed;
        }
        for at in schema.iter_variable_named("z")? {
            c[row_index.position("z", &at)?] = weights.dropped;
        }

        debug!(variables = n, equalities = a_eq.len(), "Planning LP assembled");

        Ok(Self {
            schema: schema.clone(),
            row_index,
            program: LinearProgram {
                c,
                a_eq,
                b_eq,
                upper,
            },
            solver: SimplexSolver::new(config.tolerance, config.max_iterations),
        })
    }

    pub fn program(&self) -> &LinearProgram {
        &self.program
    }

    pub fn row_index(&self) -> &RowIndex {
        &self.row_index
    }

    /// Solve the LP. Anything but an optimal status is an error.
    pub fn solve(&self) -> Result<LinProgSolution, PlannerError> {
        let solution = self.solver.solve(&self.program)?;
        match solution.status {
            LpStatus::Optimal => Ok(solution),
            LpStatus::Infeasible => Err(PlannerError::Infeasible),
            LpStatus::Unbounded => Err(PlannerError::Unbounded),
            LpStatus::IterationLimit => Err(PlannerError::IterationLimit(solution.iterations)),
        }
    }

    /// Write every planned `x, y, z, g` value through the interface.
    pub fn store(
        &self,
        solution: &LinProgSolution,
        data: &mut dyn DataInterface,
    ) -> Result<(), PlannerError> {
        for variable in ROW_VARIABLES {
            for at in self.schema.iter_variable_named(variable)? {
                let value = solution.x[self.row_index.position(variable, &at)?];
                data.set_data(variable, &at, value)?;
            }
        }
        Ok(())
    }

    pub fn solve_and_store(
        &self,
        data: &mut dyn DataInterface,
    ) -> Result<LinProgSolution, PlannerError> {
        let solution = self.solve()?;
        self.store(&solution, data)?;
        Ok(solution)
    }
}

/// Index layouts the LP relies on.
fn validate_schema(schema: &Schema) -> Result<(), PlannerError> {
    if schema.index_bound("i")? != schema.index_bound("j")? {
        return Err(PlannerError::Validation(
            "index bounds of `i` and `j` must match".into(),
        ));
    }
    let expect = |variable: &str, layout: &[&str]| -> Result<(), PlannerError> {
        let actual = schema.variable_indices(variable)?;
        if actual.iter().map(|s| s.as_str()).eq(layout.iter().copied()) {
            Ok(())
        } else {
            Err(PlannerError::Validation(format!(
                "`{variable}` must be indexed by {layout:?}, found {actual:?}"
            )))
        }
    };
    expect("x", &["j", "i", "rho", "l"])?;
    for variable in ["x_eq", "y", "g", "z"] {
        expect(variable, &["j", "rho", "l"])?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Solver over a provider
// ---------------------------------------------------------------------------

/// Summary of one planning run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanOutcome {
    /// `alpha_0 * sum(g) - alpha_1 * sum(z)` of the plan.
    pub objective: f64,
    pub iterations: usize,
}

/// Plans over a provider and stores the plan in it.
pub struct ProcessedDataAmountMaximizationSolver<P: DataProvider> {
    data: NetworkData<P>,
    config: PlannerConfig,
}

impl<P: DataProvider> ProcessedDataAmountMaximizationSolver<P> {
    pub fn new(provider: P, config: PlannerConfig) -> Result<Self, DataError> {
        Ok(Self {
            data: NetworkData::from_provider(provider)?,
            config,
        })
    }

    pub fn data(&self) -> &NetworkData<P> {
        &self.data
    }

    pub fn into_provider(self) -> P {
        self.data.into_provider()
    }

    pub fn plan(&mut self) -> Result<PlanOutcome, PlannerError> {
        let planner = LinsolvPlanner::new(&self.data, self.data.schema(), &self.config)?;
        let solution = planner.solve_and_store(&mut self.data)?;
        let outcome = PlanOutcome {
            objective: -solution.objective,
            iterations: solution.iterations,
        };
        info!(
            objective = %format!("{:.4}", outcome.objective),
            iterations = outcome.iterations,
            "Plan computed"
        );
        Ok(outcome)
    }
}

#[async_trait]
impl<P: DataProvider> DataProcessor for ProcessedDataAmountMaximizationSolver<P> {
    type Output = PlanOutcome;

    async fn run(&mut self) -> Result<PlanOutcome> {
        Ok(self.plan()?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RamDataProvider;
    use crate::network::network_schema;
    use approx::assert_abs_diff_eq;

    fn simple_ab_transfer() -> RamDataProvider {
        RamDataProvider::from_rows(&[
            ("psi", &[0, 1, 0, 0], 10.0),
            ("phi", &[1, 0, 0], 10.0),
            ("x_eq", &[0, 0, 0], 10.0),
            ("mm_psi", &[0, 1, 0], 1.0),
            ("m_psi", &[0, 1, 0, 0], 0.0),
            ("mm_phi", &[0, 1], 1.0),
            ("m_phi", &[0, 1, 0], 0.0),
            ("tl", &[0], 5.0),
            ("tl", &[1], 5.0),
            ("alpha_1", &[], 0.5),
            ("alpha_0", &[], 0.5),
            ("nodes", &[], 2.0),
            ("virtualized_environments", &[], 2.0),
            ("structural_stability_intervals", &[], 2.0),
        ])
    }

    #[test]
    fn test_simple_transfer() {
        let mut solver =
            ProcessedDataAmountMaximizationSolver::new(simple_ab_transfer(), PlannerConfig::default())
                .unwrap();
        let outcome = solver.plan().unwrap();
        let data = solver.data();

        assert_abs_diff_eq!(
            data.get("x", &[("j", 0), ("i", 1), ("rho", 0), ("l", 0)]).unwrap(),
            10.0,
            epsilon = 1e-6
        );
        assert_abs_diff_eq!(
            data.get("g", &[("j", 1), ("rho", 0), ("l", 0)]).unwrap(),
            10.0,
            epsilon = 1e-6
        );
        assert_abs_diff_eq!(outcome.objective, 5.0, epsilon = 1e-6);
    }

    #[test]
    fn test_row_layout_and_bounds() {
        let data = NetworkData::from_provider(simple_ab_transfer()).unwrap();
        let planner = LinsolvPlanner::new(&data, data.schema(), &PlannerConfig::default()).unwrap();

        // y, x, z, g over 2 nodes, 2 environments, 2 intervals.
        assert_eq!(planner.row_index().row_len(), 8 + 16 + 8 + 8);
        assert_eq!(planner.program().a_eq.len(), 8);

        let self_loop = indices(&[("j", 1), ("i", 1), ("rho", 0), ("l", 0)]);
        let p = planner.row_index().position("x", &self_loop).unwrap();
        assert_eq!(planner.program().upper[p], 0.0);

        let z = planner
            .row_index()
            .position("z", &indices(&[("j", 0), ("rho", 0), ("l", 0)]))
            .unwrap();
        assert!(planner.program().upper[z].is_infinite());
        assert_eq!(planner.program().c[z], 0.5);
    }

    #[test]
    fn test_zero_weight_is_rejected() {
        let mut ram = simple_ab_transfer();
        ram.set(crate::types::DataKey::scalar("alpha_0"), 0.0);
        let data = NetworkData::from_provider(ram).unwrap();
        assert!(matches!(
            LinsolvPlanner::new(&data, data.schema(), &PlannerConfig::default()),
            Err(PlannerError::Validation(_))
        ));
    }

    #[test]
    fn test_schema_validation() {
        let mut schema = network_schema(2, 1, 1);
        schema.set_index_bound("i", 3);
        let data = NetworkData::new(
            RamDataProvider::from_rows(&[("alpha_0", &[], 0.5), ("alpha_1", &[], 0.5)]),
            schema.clone(),
        );
        assert!(LinsolvPlanner::new(&data, &schema, &PlannerConfig::default()).is_err());

        let mut schema = network_schema(2, 1, 1);
        schema.set_variable_indices("y", &["rho", "j", "l"]);
        assert!(matches!(
            LinsolvPlanner::new(&data, &schema, &PlannerConfig::default()),
            Err(PlannerError::Validation(_))
        ));
    }

    #[test]
    fn test_storage_carries_over_intervals() {
        // Node 0 receives data in interval 0 but can only process in interval 1.
        let ram = RamDataProvider::from_rows(&[
            ("x_eq", &[0, 0, 0], 6.0),
            ("v", &[0, 0, 0], 10.0),
            ("phi", &[0, 0, 1], 10.0),
            ("tl", &[0], 1.0),
            ("tl", &[1], 1.0),
            ("alpha_0", &[], 0.5),
            ("alpha_1", &[], 0.5),
            ("nodes", &[], 1.0),
            ("virtualized_environments", &[], 1.0),
            ("structural_stability_intervals", &[], 2.0),
        ]);
        let mut solver = ProcessedDataAmountMaximizationSolver::new(ram, PlannerConfig::default()).unwrap();
        solver.plan().unwrap();
        let data = solver.data();
        assert_abs_diff_eq!(data.get("y", &[("j", 0), ("rho", 0), ("l", 0)]).unwrap(), 6.0, epsilon = 1e-6);
        assert_abs_diff_eq!(data.get("g", &[("j", 0), ("rho", 0), ("l", 1)]).unwrap(), 6.0, epsilon = 1e-6);
        assert_abs_diff_eq!(data.get("z", &[("j", 0), ("rho", 0), ("l", 0)]).unwrap(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_rate_without_fraction_gives_equal_share_budget() {
        let ram = RamDataProvider::from_rows(&[
            ("x_eq", &[0, 0, 0], 10.0),
            ("mm_phi", &[0, 0], 10.0),
            ("tl", &[0], 2.0),
            ("alpha_0", &[], 0.5),
            ("alpha_1", &[], 0.5),
            ("nodes", &[], 1.0),
            ("virtualized_environments", &[], 2.0),
            ("structural_stability_intervals", &[], 1.0),
        ]);
        let mut solver = ProcessedDataAmountMaximizationSolver::new(ram, PlannerConfig::default()).unwrap();
        solver.plan().unwrap();
        let data = solver.data();
        assert_abs_diff_eq!(data.get("g", &[("j", 0), ("rho", 0), ("l", 0)]).unwrap(), 10.0, epsilon = 1e-6);
        assert_abs_diff_eq!(data.get("z", &[("j", 0), ("rho", 0), ("l", 0)]).unwrap(), 0.0, epsilon = 1e-6);
    }

    #[tokio::test]
    async fn test_runs_as_data_processor() {
        let mut solver =
            ProcessedDataAmountMaximizationSolver::new(simple_ab_transfer(), PlannerConfig::default())
                .unwrap();
        let outcome = solver.run().await.unwrap();
        assert!(outcome.iterations > 0);
        let ram = solver.into_provider();
        assert!(ram.variable_entries("g").count() > 0);
    }
}
