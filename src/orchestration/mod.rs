//! Two-stage optimization: planning, then throughput tuning, repeated.
//!
//! Each iteration plans on a RAM copy of the current state, hands the plan
//! to the GA on a second RAM copy and folds the GA's fractions and
//! simulated results back into the state. The tuned fractions change the
//! inferred budgets (`psi = mm_psi * m_psi * tl`), so the next plan sees
//! them. The caller's provider is only written once, at the end.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::data::{DataInterface, DataProvider, RamDataProvider};
use crate::network::{NetworkData, ORCHESTRATION_N_ITERATIONS};
use crate::optimizer::{GaConfig, GaNetworkOptimizationSolver};
use crate::planner::{PlannerConfig, ProcessedDataAmountMaximizationSolver};
use crate::processor::DataProcessor;
use crate::simulation::SimulationConfig;
use crate::types::optional;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    pub n_iterations: usize,
    /// Stop once the simulated objective improves by less than this.
    /// Disabled at 0.
    pub convergence_tolerance: f64,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            n_iterations: 20,
            convergence_tolerance: 0.0,
        }
    }
}

impl OrchestrationConfig {
    pub fn test_profile() -> Self {
        Self {
            n_iterations: 2,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub planned_objective: f64,
    pub simulated_objective: f64,
    pub best_fitness: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub iterations: Vec<IterationRecord>,
    pub converged: bool,
    #[serde(default)]
    pub cancelled: bool,
}

impl OrchestrationReport {
    pub fn last(&self) -> Option<&IterationRecord> {
        self.iterations.last()
    }
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

pub struct Orchestrated2StageSolver<P: DataProvider> {
    provider: P,
    config: OrchestrationConfig,
    planner: PlannerConfig,
    ga: GaConfig,
    simulation: SimulationConfig,
    cancel: Arc<AtomicBool>,
}

impl<P: DataProvider> Orchestrated2StageSolver<P> {
    pub fn new(
        provider: P,
        config: OrchestrationConfig,
        planner: PlannerConfig,
        ga: GaConfig,
        simulation: SimulationConfig,
    ) -> Self {
        Self {
            provider,
            config,
            planner,
            ga,
            simulation,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a cancellation flag, checked before every iteration.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn into_provider(self) -> P {
        self.provider
    }

    /// Iteration count, unless the data overrides it.
    fn iterations(&self, state: &RamDataProvider) -> Result<usize> {
        let data = NetworkData::from_provider(state.clone())?;
        let stored = optional(data.get(ORCHESTRATION_N_ITERATIONS, &[]))?;
        Ok(stored.map_or(self.config.n_iterations, |n| n.round().max(0.0) as usize))
    }

    pub async fn solve(&mut self) -> Result<OrchestrationReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut state = self.provider.to_ram();
        let n_iterations = self.iterations(&state)?;

        info!(%run_id, n_iterations, "Orchestration started");

        let mut iterations: Vec<IterationRecord> = Vec::with_capacity(n_iterations);
        let mut converged = false;
        let mut cancelled = false;

        for iteration in 1..=n_iterations {
            if self.cancel.load(Ordering::SeqCst) {
                warn!(iteration, "Orchestration cancelled");
                cancelled = true;
                break;
            }

            let mut planner = ProcessedDataAmountMaximizationSolver::new(state.clone(), self.planner.clone())
                .context("Failed to prepare planning data")?;
            let plan = planner
                .run()
                .await
                .with_context(|| format!("Planning failed in iteration {iteration}"))?;

            let mut ga_store = RamDataProvider::new();
            ga_store.copy_from(&planner.into_provider());
            let mut ga = GaNetworkOptimizationSolver::new(ga_store, self.ga.clone(), self.simulation.clone())
                .context("Failed to prepare GA data")?;
            let tuned = ga
                .run()
                .await
                .with_context(|| format!("GA failed in iteration {iteration}"))?;
            state.copy_from(&ga.into_provider());

            let record = IterationRecord {
                iteration,
                planned_objective: plan.objective,
                simulated_objective: tuned.final_simulation.objective,
                best_fitness: tuned.best_fitness,
            };
            info!(
                iteration,
                planned = %format!("{:.4}", record.planned_objective),
                simulated = %format!("{:.4}", record.simulated_objective),
                "Orchestration iteration"
            );

            let improvement = iterations
                .last()
                .map(|previous| record.simulated_objective - previous.simulated_objective);
            iterations.push(record);

            if self.config.convergence_tolerance > 0.0
                && improvement.is_some_and(|gain| gain < self.config.convergence_tolerance)
            {
                info!(iteration, "Orchestration converged");
                converged = true;
                break;
            }
        }

        self.provider.copy_from(&state);
        self.provider.sync().context("Failed to persist orchestration results")?;

        Ok(OrchestrationReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            iterations,
            converged,
            cancelled,
        })
    }
}

#[async_trait]
impl<P: DataProvider> DataProcessor for Orchestrated2StageSolver<P> {
    type Output = OrchestrationReport;

    async fn run(&mut self) -> Result<OrchestrationReport> {
        self.solve().await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
