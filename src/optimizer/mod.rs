//! Genetic optimization of throughput fractions.
//!
//! The plan stays fixed; the GA searches the `m_psi`, `m_v` and `m_phi`
//! fractions that make the simulated network follow it best. Fitness is the
//! simulated objective `alpha_0 * sum(g^) - alpha_1 * sum(z^)`. Every
//! individual is simulated with the same seed, so fitness differences come
//! from the genes alone.

pub mod gene;

pub use gene::{Gene, GeneLayout, GENE_VARIABLES};

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::data::{DataInterface, DataProvider, RamDataProvider, Schema};
use crate::network::{
    NetworkData, GA_N_ITERATIONS, GA_POPULATION_SIZE, GA_REMOVE_PERC_POPULATION,
    GA_SWAP_PERC_GENES, GA_SWAP_PERC_POPULATION,
};
use crate::processor::DataProcessor;
use crate::simulation::{Simulation, SimulationConfig, SimulationReport};
use crate::types::{optional, DataError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaConfig {
    pub population_size: usize,
    pub n_iterations: usize,
    /// Share of genes a child takes from its second parent.
    pub swap_perc_genes: f64,
    /// Share of the survivors that get crossed.
    pub swap_perc_population: f64,
    /// Share of the population removed after each evaluation.
    pub remove_perc_population: f64,
    /// Seeds selection, crossover and random genes.
    pub seed: u64,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            n_iterations: 30,
            swap_perc_genes: 0.5,
            swap_perc_population: 0.3,
            remove_perc_population: 0.3,
            seed: 7,
        }
    }
}

impl GaConfig {
    /// Small and fast, for tests and smoke runs.
    pub fn test_profile() -> Self {
        Self {
            population_size: 3,
            n_iterations: 2,
            swap_perc_population: 1.0,
            remove_perc_population: 0.6,
            ..Self::default()
        }
    }

    /// Apply the `OPT_VIRT_GA_*` scalars stored in the data.
    pub fn with_data_overrides(mut self, data: &dyn DataInterface) -> Result<Self, DataError> {
        let scalar = |variable: &str| optional(data.get(variable, &[]));

        if let Some(value) = scalar(GA_POPULATION_SIZE)? {
            self.population_size = value.round().max(1.0) as usize;
        }
        if let Some(value) = scalar(GA_N_ITERATIONS)? {
            self.n_iterations = value.round().max(0.0) as usize;
        }
        if let Some(value) = scalar(GA_SWAP_PERC_GENES)? {
            self.swap_perc_genes = value;
        }
        if let Some(value) = scalar(GA_SWAP_PERC_POPULATION)? {
            self.swap_perc_population = value;
        }
        if let Some(value) = scalar(GA_REMOVE_PERC_POPULATION)? {
            self.remove_perc_population = value;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.population_size == 0 {
            anyhow::bail!("GA population_size must be at least 1");
        }
        for (name, value) in [
            ("swap_perc_genes", self.swap_perc_genes),
            ("swap_perc_population", self.swap_perc_population),
            ("remove_perc_population", self.remove_perc_population),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("GA {name} must lie in [0, 1], got {value}");
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    pub gene: Gene,
    pub fitness: f64,
}

/// Result of a GA run, before it is written anywhere.
#[derive(Debug, Clone)]
pub struct GaOutcome {
    pub best: Individual,
    /// Best fitness seen so far, after each iteration.
    pub history: Vec<f64>,
    pub evaluations: usize,
}

pub struct GeneticOptimizer {
    config: GaConfig,
    simulation: SimulationConfig,
}

impl GeneticOptimizer {
    pub fn new(config: GaConfig, simulation: SimulationConfig) -> Self {
        Self { config, simulation }
    }

    pub fn config(&self) -> &GaConfig {
        &self.config
    }

    /// Search fractions for the plan stored in `base`. `base` itself is not
    /// modified. At least one iteration always runs.
    pub async fn optimize(&self, base: &RamDataProvider, schema: &Schema) -> Result<GaOutcome> {
        self.config.validate()?;
        self.simulation.validate()?;

        let layout = Arc::new(GeneLayout::from_schema(schema)?);
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);

        let current = {
            let data = NetworkData::new(base.clone(), schema.clone());
            layout.read(&data)?
        };
        let mut population = vec![current];
        while population.len() < self.config.population_size {
            population.push(layout.random(&mut rng));
        }

        let rounds = self.config.n_iterations.max(1);
        let mut best: Option<Individual> = None;
        let mut history = Vec::with_capacity(rounds);
        let mut evaluations = 0;

        for iteration in 0..rounds {
            let mut evaluated = self.evaluate(base, schema, &layout, population).await?;
            evaluations += evaluated.len();
            evaluated.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));

            let leader = evaluated.first().cloned().context("GA population is empty")?;
            if best.as_ref().map_or(true, |b| leader.fitness > b.fitness) {
                best = Some(leader);
            }
            let best_fitness = best.as_ref().map_or(f64::NEG_INFINITY, |b| b.fitness);
            history.push(best_fitness);

            info!(
                iteration = iteration + 1,
                of = rounds,
                best_fitness = %format!("{:.4}", best_fitness),
                population = evaluated.len(),
                "GA iteration"
            );

            population = self.breed(&layout, evaluated, &mut rng);
        }

        let best = best.context("GA produced no individual")?;
        Ok(GaOutcome {
            best,
            history,
            evaluations,
        })
    }

    /// Simulate every gene on its own copy of the data.
    async fn evaluate(
        &self,
        base: &RamDataProvider,
        schema: &Schema,
        layout: &Arc<GeneLayout>,
        population: Vec<Gene>,
    ) -> Result<Vec<Individual>> {
        let tasks = population.into_iter().map(|gene| {
            let provider = base.clone();
            let schema = schema.clone();
            let layout = Arc::clone(layout);
            let config = self.simulation.clone();
            tokio::task::spawn_blocking(move || -> Result<Individual> {
                let mut data = NetworkData::new(provider, schema);
                layout.write(&gene, &mut data)?;
                let mut simulation = Simulation::new(&data, data.schema(), config)?;
                let fitness = simulation.run().objective;
                Ok(Individual { gene, fitness })
            })
        });

        let mut individuals = Vec::new();
        for joined in join_all(tasks).await {
            individuals.push(joined.context("GA evaluation task failed")??);
        }
        debug!(individuals = individuals.len(), "Population evaluated");
        Ok(individuals)
    }

    /// Next population from one sorted by descending fitness.
    fn breed(&self, layout: &GeneLayout, evaluated: Vec<Individual>, rng: &mut ChaCha8Rng) -> Vec<Gene> {
        let size = self.config.population_size.max(1);
        let removed = (evaluated.len() as f64 * self.config.remove_perc_population).floor() as usize;
        let keep = evaluated.len().saturating_sub(removed).max(1);
        let survivors: Vec<Gene> = evaluated.into_iter().take(keep).map(|i| i.gene).collect();

        let mut next = survivors.clone();
        if survivors.len() >= 2 {
            let children = (survivors.len() as f64 * self.config.swap_perc_population).ceil() as usize;
            for _ in 0..children {
                let first = rng.gen_range(0..survivors.len());
                let mut second = rng.gen_range(0..survivors.len() - 1);
                if second >= first {
                    second += 1;
                }
                next.push(layout.crossover(
                    &survivors[first],
                    &survivors[second],
                    self.config.swap_perc_genes,
                    rng,
                ));
            }
        }
        while next.len() < size {
            next.push(layout.random(rng));
        }
        // Survivors come first, so the leader is never cut.
        next.truncate(size);
        next
    }
}

// ---------------------------------------------------------------------------
// Solver over a provider
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaReport {
    pub best_fitness: f64,
    /// Best fitness so far after each iteration.
    pub history: Vec<f64>,
    pub evaluations: usize,
    /// Simulation of the best gene, as written into the data.
    pub final_simulation: SimulationReport,
}

/// Optimizes the fractions stored in a provider and writes the best ones
/// back, together with the `*^` results of simulating them.
pub struct GaNetworkOptimizationSolver<P: DataProvider> {
    data: NetworkData<P>,
    ga: GaConfig,
    simulation: SimulationConfig,
}

impl<P: DataProvider> GaNetworkOptimizationSolver<P> {
    /// GA scalars stored in the data override `ga`.
    pub fn new(provider: P, ga: GaConfig, simulation: SimulationConfig) -> Result<Self, DataError> {
        let data = NetworkData::from_provider(provider)?;
        let ga = ga.with_data_overrides(&data)?;
        Ok(Self {
            data,
            ga,
            simulation,
        })
    }

    pub fn config(&self) -> &GaConfig {
        &self.ga
    }

    pub fn data(&self) -> &NetworkData<P> {
        &self.data
    }

    pub fn into_provider(self) -> P {
        self.data.into_provider()
    }

    pub async fn optimize(&mut self) -> Result<GaReport> {
        let base = self.data.provider().to_ram();
        let optimizer = GeneticOptimizer::new(self.ga.clone(), self.simulation.clone());
        let outcome = optimizer.optimize(&base, self.data.schema()).await?;

        let layout = GeneLayout::from_schema(self.data.schema())?;
        layout.write(&outcome.best.gene, &mut self.data)?;
        let mut simulation = Simulation::new(&self.data, self.data.schema(), self.simulation.clone())?;
        let final_simulation = simulation.run();
        simulation.write_results(&mut self.data)?;

        info!(
            best_fitness = %format!("{:.4}", outcome.best.fitness),
            evaluations = outcome.evaluations,
            "GA finished"
        );
        Ok(GaReport {
            best_fitness: outcome.best.fitness,
            history: outcome.history,
            evaluations: outcome.evaluations,
            final_simulation,
        })
    }
}

#[async_trait]
impl<P: DataProvider> DataProcessor for GaNetworkOptimizationSolver<P> {
    type Output = GaReport;

    async fn run(&mut self) -> Result<GaReport> {
        self.optimize().await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
