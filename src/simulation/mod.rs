//! Discrete-time simulation of a data amount plan.
//!
//! Every `(j, rho, l)` gets an input container and generate/store/process/
//! drop operations; every connected `(j, i, rho, l)` channel gets a transfer
//! operation. Operations chase their planned amounts at the resolved
//! throughput, and the amounts they actually handled (`x^`, `y^`, `g^`,
//! `z^`, `x_eq^`) are written back into the data.
//!
//! Within a tick: generate, then transfer/store/process in a seeded random
//! order, then teardown. At the end of an interval whatever is left in an
//! input container is dropped, so each interval balances exactly.

pub mod ops;
pub mod trace;

pub use ops::{ContainerId, Containers, Flow, OpKind, Operation};
pub use trace::{write_trace_csv, TraceRecord};

use anyhow::Result;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::data::{DataInterface, DataProvider, Schema};
use crate::network::{
    is_transfer_connected, throughput, Dimensions, NetworkData, ObjectiveWeights, Resource, Timeline,
    TICK_LENGTH,
};
use crate::processor::DataProcessor;
use crate::types::{format_indices, indices, optional, DataError, SimulationError};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Tick length.
    pub dt: f64,
    pub noise: NoiseModel,
    /// Seeds operation order and noise.
    pub seed: u64,
    /// Record every operation's amount per tick.
    pub trace: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt: 1.0,
            noise: NoiseModel::None,
            seed: 42,
            trace: false,
        }
    }
}

impl SimulationConfig {
    /// Apply a tick length stored in the data.
    pub fn with_data_overrides(mut self, data: &dyn DataInterface) -> Result<Self, DataError> {
        if let Some(dt) = optional(data.get(TICK_LENGTH, &[]))? {
            self.dt = dt;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(SimulationError::Config(format!(
                "dt must be positive, got {}",
                self.dt
            )));
        }
        Ok(())
    }
}

/// Perturbation added to an operation's rate per tick. Noise never slows an
/// operation down, and store operations are not perturbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseModel {
    #[default]
    None,
    /// `max(0, N(0, rate / 4))`.
    Gauss,
}

fn sample_noise(rng: &mut ChaCha8Rng, model: NoiseModel, op: &Operation) -> f64 {
    let rate = op.rate_upper * op.fraction;
    match model {
        NoiseModel::None => 0.0,
        NoiseModel::Gauss if op.kind() == OpKind::Store => 0.0,
        NoiseModel::Gauss if rate.is_finite() && rate > 0.0 => Normal::new(0.0, rate / 4.0)
            .map(|normal| normal.sample(rng).max(0.0))
            .unwrap_or(0.0),
        NoiseModel::Gauss => 0.0,
    }
}

/// Ticks needed to cover `duration`. A remainder below `1e-9 * dt` is
/// treated as rounding error.
fn ticks_in(duration: f64, dt: f64) -> usize {
    ((duration / dt) - 1e-9).ceil().max(1.0) as usize
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub ticks: usize,
    pub duration: f64,
    pub generated: f64,
    pub transferred: f64,
    pub processed: f64,
    pub dropped: f64,
    /// Total store level at the end of the run.
    pub stored: f64,
    /// `alpha_0 * processed - alpha_1 * dropped`.
    pub objective: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<TraceRecord>,
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Operation indices active in one interval, by phase.
#[derive(Debug, Clone, Default)]
struct Schedule {
    generate: Vec<usize>,
    flow: Vec<usize>,
    drop: Vec<usize>,
}

pub struct Simulation {
    config: SimulationConfig,
    schema: Schema,
    timeline: Timeline,
    weights: ObjectiveWeights,
    containers: Containers,
    stores: Vec<ContainerId>,
    ops: Vec<Operation>,
    schedule: Vec<Schedule>,
    rng: ChaCha8Rng,
    trace: Vec<TraceRecord>,
    ticks: usize,
    finished: bool,
}

impl Simulation {
    /// Build containers and operations from the plan and throughput data.
    pub fn new(
        data: &dyn DataInterface,
        schema: &Schema,
        config: SimulationConfig,
    ) -> Result<Self, SimulationError> {
        let config = if schema.has_variable(TICK_LENGTH) {
            config.with_data_overrides(data)?
        } else {
            config
        };
        config.validate()?;
        let dims = Dimensions::of(schema)?;
        let timeline = Timeline::from_data(data, dims.intervals)?;
        let weights = ObjectiveWeights::resolve(data)?;

        let mut containers = Containers::default();
        let mut inputs = HashMap::new();
        for j in 0..dims.nodes {
            for rho in 0..dims.environments {
                for l in 0..dims.intervals {
                    inputs.insert((j, rho, l), containers.alloc());
                }
            }
        }
        let mut stores = Vec::new();
        let mut store_of = HashMap::new();
        for j in 0..dims.nodes {
            for rho in 0..dims.environments {
                let id = containers.alloc();
                stores.push(id);
                store_of.insert((j, rho), id);
            }
        }

        let mut ops = Vec::new();
        let mut schedule = vec![Schedule::default(); dims.intervals];
        for l in 0..dims.intervals {
            let duration = timeline
                .duration_of(l)
                .ok_or_else(|| DataError::UnknownIndex(format!("l={l}")))?;
            for j in 0..dims.nodes {
                for rho in 0..dims.environments {
                    let at = indices(&[("j", j), ("rho", rho), ("l", l)]);
                    let input = inputs[&(j, rho, l)];
                    let store = store_of[&(j, rho)];
                    let plan = |variable: &str| data.data(variable, &at);
                    let rate = |resource: Resource| throughput(data, resource, &at, dims.environments);

                    schedule[l].generate.push(ops.len());
                    ops.push(Operation::generate(at.clone(), l, plan("x_eq")?, duration, input));

                    schedule[l].flow.push(ops.len());
                    ops.push(Operation::store(at.clone(), l, plan("y")?, rate(Resource::Store)?, input, store));

                    schedule[l].flow.push(ops.len());
                    ops.push(Operation::process(at.clone(), l, plan("g")?, rate(Resource::Process)?, input));

                    schedule[l].drop.push(ops.len());
                    ops.push(Operation::discard(at.clone(), l, plan("z")?, input));

                    for i in 0..dims.nodes {
                        if !is_transfer_connected(data, j, i, rho, l, dims.environments)? {
                            continue;
                        }
                        let channel = indices(&[("j", j), ("i", i), ("rho", rho), ("l", l)]);
                        let planned = data.data("x", &channel)?;
                        let rate = throughput(data, Resource::Transfer, &channel, dims.environments)?;
                        schedule[l].flow.push(ops.len());
                        ops.push(Operation::transfer(
                            channel,
                            l,
                            planned,
                            rate,
                            input,
                            inputs[&(i, rho, l)],
                        ));
                    }
                }
            }
        }

        debug!(
            operations = ops.len(),
            containers = containers.len(),
            duration = timeline.duration(),
            "Simulation assembled"
        );

        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            schema: schema.clone(),
            timeline,
            weights,
            containers,
            stores,
            ops,
            schedule,
            trace: Vec::new(),
            ticks: 0,
            finished: false,
        })
    }

    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    pub fn count(&self, kind: OpKind) -> usize {
        self.ops.iter().filter(|op| op.kind() == kind).count()
    }

    pub fn containers(&self) -> &Containers {
        &self.containers
    }

    /// Run to the end of the timeline. Later calls return the same report.
    ///
    /// Interval `l` gets `ceil(tl[l] / dt)` ticks; the last one covers the
    /// remaining time only.
    pub fn run(&mut self) -> SimulationReport {
        if !self.finished {
            let dt = self.config.dt;
            for l in 0..self.timeline.len() {
                let start = self.timeline.interval_start(l).unwrap_or(0.0);
                let duration = self.timeline.duration_of(l).unwrap_or(0.0);
                let ticks = ticks_in(duration, dt);
                for k in 0..ticks {
                    let elapsed = k as f64 * dt;
                    let step = if k + 1 == ticks { duration - elapsed } else { dt };
                    self.tick(start + elapsed, l, step);
                    self.ticks += 1;
                }
                self.close_interval(l);
            }
            self.finished = true;
        }
        self.report()
    }

    fn tick(&mut self, t: f64, l: usize, dt: f64) {
        let Self {
            config,
            ops,
            schedule,
            containers,
            rng,
            trace,
            ..
        } = self;
        let plan = &mut schedule[l];

        for &k in &plan.generate {
            let noise = sample_noise(rng, config.noise, &ops[k]);
            ops[k].step(containers, dt, noise);
        }

        plan.flow.shuffle(rng);
        for &k in &plan.flow {
            let noise = sample_noise(rng, config.noise, &ops[k]);
            ops[k].step(containers, dt, noise);
        }

        for &k in plan.flow.iter().chain(&plan.drop) {
            ops[k].teardown(containers);
        }

        if config.trace {
            for &k in plan.generate.iter().chain(&plan.flow).chain(&plan.drop) {
                let op = &ops[k];
                if op.moved() != 0.0 {
                    trace.push(TraceRecord {
                        t,
                        interval: l,
                        kind: op.kind(),
                        op: format_indices(&op.at),
                        amount: op.moved(),
                    });
                }
            }
        }
    }

    fn close_interval(&mut self, l: usize) {
        let end = self.timeline.interval_end(l).unwrap_or(0.0);
        let plan = &self.schedule[l];

        for &k in &plan.drop {
            let forced = self.ops[k].flush(&mut self.containers);
            if self.config.trace && forced > 0.0 {
                self.trace.push(TraceRecord {
                    t: end,
                    interval: l,
                    kind: OpKind::Drop,
                    op: format_indices(&self.ops[k].at),
                    amount: forced,
                });
            }
        }
        for &k in &plan.flow {
            self.ops[k].close(&self.containers);
        }
    }

    fn report(&self) -> SimulationReport {
        let total = |kind: OpKind| -> f64 {
            self.ops
                .iter()
                .filter(|op| op.kind() == kind)
                .map(|op| op.handled)
                .sum()
        };
        let processed = total(OpKind::Process);
        let dropped = total(OpKind::Drop);

        SimulationReport {
            ticks: self.ticks,
            duration: self.timeline.duration(),
            generated: total(OpKind::Generate),
            transferred: total(OpKind::Transfer),
            processed,
            dropped,
            stored: self.stores.iter().map(|&id| self.containers.amount(id)).sum(),
            objective: self.weights.objective(processed, dropped),
            trace: self.trace.clone(),
        }
    }

    /// Write `x^, y^, g^, z^, x_eq^`. Channels without an operation read 0.
    pub fn write_results(&self, data: &mut dyn DataInterface) -> Result<(), DataError> {
        for kind in [
            OpKind::Generate,
            OpKind::Transfer,
            OpKind::Store,
            OpKind::Process,
            OpKind::Drop,
        ] {
            for at in self.schema.iter_variable_named(kind.handled_variable())? {
                data.set_data(kind.handled_variable(), &at, 0.0)?;
            }
        }
        for op in &self.ops {
            data.set_data(op.kind().handled_variable(), &op.at, op.handled)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Simulation over a provider
// ---------------------------------------------------------------------------

/// Simulates the plan stored in a provider and stores the results in it.
pub struct NetworkDataFlow<P: DataProvider> {
    data: NetworkData<P>,
    config: SimulationConfig,
    trace_path: Option<PathBuf>,
}

impl<P: DataProvider> NetworkDataFlow<P> {
    pub fn new(provider: P, config: SimulationConfig) -> Result<Self, DataError> {
        Ok(Self {
            data: NetworkData::from_provider(provider)?,
            config,
            trace_path: None,
        })
    }

    /// Export the trace here after the run. Enables tracing.
    pub fn with_trace_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.trace = true;
        self.trace_path = Some(path.into());
        self
    }

    pub fn data(&self) -> &NetworkData<P> {
        &self.data
    }

    pub fn into_provider(self) -> P {
        self.data.into_provider()
    }

    pub fn simulate(&mut self) -> Result<SimulationReport, SimulationError> {
        let mut simulation = Simulation::new(&self.data, self.data.schema(), self.config.clone())?;
        let report = simulation.run();
        simulation.write_results(&mut self.data)?;

        if let Some(path) = &self.trace_path {
            write_trace_csv(path, &report.trace)?;
        }

        info!(
            generated = %format!("{:.2}", report.generated),
            processed = %format!("{:.2}", report.processed),
            dropped = %format!("{:.2}", report.dropped),
            objective = %format!("{:.4}", report.objective),
            ticks = report.ticks,
            "Simulation finished"
        );
        Ok(report)
    }
}

#[async_trait]
impl<P: DataProvider> DataProcessor for NetworkDataFlow<P> {
    type Output = SimulationReport;

    async fn run(&mut self) -> Result<SimulationReport> {
        Ok(self.simulate()?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RamDataProvider;
    use crate::network::Throughput;
    use approx::assert_abs_diff_eq;

    /// Two nodes, one environment, two intervals. Node 0 receives 10 per
    /// interval and forwards to node 1, which processes.
    fn chain() -> RamDataProvider {
        RamDataProvider::from_rows(&[
            ("nodes", &[], 2.0),
            ("virtualized_environments", &[], 1.0),
            ("structural_stability_intervals", &[], 2.0),
            ("tl", &[0], 2.0),
            ("tl", &[1], 2.0),
            ("alpha_0", &[], 0.5),
            ("alpha_1", &[], 0.5),
            ("x_eq", &[0, 0, 0], 10.0),
            ("x_eq", &[0, 0, 1], 10.0),
            ("psi", &[0, 1, 0, 0], 10.0),
            ("psi", &[0, 1, 0, 1], 10.0),
            ("phi", &[1, 0, 0], 20.0),
            ("phi", &[1, 0, 1], 20.0),
            ("v", &[0, 0, 0], 4.0),
            ("x", &[0, 1, 0, 0], 6.0),
            ("x", &[0, 1, 0, 1], 10.0),
            ("y", &[0, 0, 0], 4.0),
            ("g", &[1, 0, 0], 6.0),
            ("g", &[1, 0, 1], 10.0),
        ])
    }

    fn simulate(ram: RamDataProvider, config: SimulationConfig) -> (NetworkData<RamDataProvider>, SimulationReport) {
        let mut data = NetworkData::from_provider(ram).unwrap();
        let mut simulation = Simulation::new(&data, data.schema(), config).unwrap();
        let report = simulation.run();
        simulation.write_results(&mut data).unwrap();
        (data, report)
    }

    fn assert_balanced(data: &NetworkData<RamDataProvider>) {
        let dims = data.dimensions().unwrap();
        for j in 0..dims.nodes {
            for rho in 0..dims.environments {
                for l in 0..dims.intervals {
                    let at = |v: &str| data.get(v, &[("j", j), ("rho", rho), ("l", l)]).unwrap();
                    let previous = if l > 0 {
                        data.get("y^", &[("j", j), ("rho", rho), ("l", l - 1)]).unwrap()
                    } else {
                        0.0
                    };
                    let mut outgoing = 0.0;
                    let mut incoming = 0.0;
                    for i in 0..dims.nodes {
                        outgoing += data.get("x^", &[("j", j), ("i", i), ("rho", rho), ("l", l)]).unwrap();
                        incoming += data.get("x^", &[("j", i), ("i", j), ("rho", rho), ("l", l)]).unwrap();
                    }
                    let disposed = at("y^") - previous + at("z^") + at("g^") + outgoing - incoming;
                    assert_abs_diff_eq!(at("x_eq^"), disposed, epsilon = 1e-6);
                }
            }
        }
    }

    /// One node, one environment, two intervals of the given lengths.
    fn single_node(tl: [f64; 2]) -> RamDataProvider {
        RamDataProvider::from_rows(&[
            ("nodes", &[], 1.0),
            ("virtualized_environments", &[], 1.0),
            ("structural_stability_intervals", &[], 2.0),
            ("tl", &[0], tl[0]),
            ("tl", &[1], tl[1]),
            ("alpha_0", &[], 0.5),
            ("alpha_1", &[], 0.5),
            ("x_eq", &[0, 0, 0], 10.0),
            ("x_eq", &[0, 0, 1], 10.0),
            ("phi", &[0, 0, 0], 1000.0),
            ("phi", &[0, 0, 1], 1000.0),
            ("g", &[0, 0, 0], 10.0),
            ("g", &[0, 0, 1], 10.0),
        ])
    }

    fn assert_inflow_meets_plan(data: &NetworkData<RamDataProvider>, report: &SimulationReport) {
        for l in 0..2 {
            let generated = data.get("x_eq^", &[("j", 0), ("rho", 0), ("l", l)]).unwrap();
            assert_abs_diff_eq!(generated, 10.0, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(report.generated, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_interval_not_a_multiple_of_dt() {
        let (data, report) = simulate(single_node([1.5, 1.5]), SimulationConfig::default());
        assert_eq!(report.ticks, 4);
        assert_inflow_meets_plan(&data, &report);
        assert_balanced(&data);
    }

    #[test]
    fn test_interval_shorter_than_dt() {
        let (data, report) = simulate(single_node([0.5, 0.5]), SimulationConfig::default());
        assert_eq!(report.ticks, 2);
        assert_inflow_meets_plan(&data, &report);
        assert_balanced(&data);
    }

    #[test]
    fn test_ticks_in_rounds_up() {
        assert_eq!(ticks_in(2.0, 1.0), 2);
        assert_eq!(ticks_in(1.5, 1.0), 2);
        assert_eq!(ticks_in(0.5, 1.0), 1);
        assert_eq!(ticks_in(0.3, 0.1), 3);
    }

    #[test]
    fn test_gaussian_noise_never_slows_inflow() {
        for seed in 0..50 {
            let config = SimulationConfig {
                noise: NoiseModel::Gauss,
                seed,
                ..SimulationConfig::default()
            };
            let (data, report) = simulate(single_node([2.0, 2.0]), config);
            assert_inflow_meets_plan(&data, &report);
            assert_balanced(&data);
        }
    }

    #[test]
    fn test_noise_is_non_negative_and_skips_stores() {
        let mut containers = Containers::default();
        let input = containers.alloc();
        let store = containers.alloc();
        let rate = Throughput { rate: 8.0, fraction: 1.0 };
        let at = indices(&[("j", 0), ("rho", 0), ("l", 0)]);
        let process = Operation::process(at.clone(), 0, 10.0, rate, input);
        let stash = Operation::store(at, 0, 10.0, rate, input, store);

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..200 {
            assert!(sample_noise(&mut rng, NoiseModel::Gauss, &process) >= 0.0);
            assert_eq!(sample_noise(&mut rng, NoiseModel::Gauss, &stash), 0.0);
        }
    }

    #[test]
    fn test_operation_counts_match_index_space() {
        let data = NetworkData::from_provider(chain()).unwrap();
        let simulation = Simulation::new(&data, data.schema(), SimulationConfig::default()).unwrap();
        // 2 nodes * 1 environment * 2 intervals.
        assert_eq!(simulation.count(OpKind::Generate), 4);
        assert_eq!(simulation.count(OpKind::Store), 4);
        assert_eq!(simulation.count(OpKind::Process), 4);
        assert_eq!(simulation.count(OpKind::Drop), 4);
        // Only 0 -> 1 is connected, in both intervals.
        assert_eq!(simulation.count(OpKind::Transfer), 2);
        assert_eq!(simulation.containers().len(), 4 + 2);
    }

    #[test]
    fn test_plan_is_followed() {
        let (data, report) = simulate(chain(), SimulationConfig::default());
        assert_eq!(report.ticks, 4);
        assert_abs_diff_eq!(report.generated, 20.0, epsilon = 1e-9);

        let x0 = data.get("x^", &[("j", 0), ("i", 1), ("rho", 0), ("l", 0)]).unwrap();
        let y0 = data.get("y^", &[("j", 0), ("rho", 0), ("l", 0)]).unwrap();
        let z0 = data.get("z^", &[("j", 0), ("rho", 0), ("l", 0)]).unwrap();
        assert!(x0 > 0.0);
        assert!(y0 <= 4.0 + 1e-9);
        assert_abs_diff_eq!(x0 + y0 + z0, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(
            data.get("x_eq^", &[("j", 0), ("rho", 0), ("l", 1)]).unwrap(),
            10.0,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(report.processed + report.dropped + report.stored, 20.0, epsilon = 1e-9);
        assert_balanced(&data);
    }

    #[test]
    fn test_unplanned_input_is_dropped() {
        let mut ram = chain();
        ram.set(crate::types::DataKey::new("x_eq", vec![1, 0, 0]), 5.0);
        let (data, _) = simulate(ram, SimulationConfig::default());
        // Node 1 may process 6 in interval 0 but only gets what it is sent plus 5.
        let z = data.get("z^", &[("j", 1), ("rho", 0), ("l", 0)]).unwrap();
        let g = data.get("g^", &[("j", 1), ("rho", 0), ("l", 0)]).unwrap();
        let x = data.get("x^", &[("j", 0), ("i", 1), ("rho", 0), ("l", 0)]).unwrap();
        assert_abs_diff_eq!(g + z, x + 5.0, epsilon = 1e-9);
        assert_balanced(&data);
    }

    #[test]
    fn test_gaussian_noise_keeps_balance() {
        let config = SimulationConfig {
            noise: NoiseModel::Gauss,
            dt: 0.5,
            seed: 7,
            ..SimulationConfig::default()
        };
        let (data, report) = simulate(chain(), config);
        assert_eq!(report.ticks, 8);
        assert_balanced(&data);
    }

    #[test]
    fn test_same_seed_same_result() {
        let config = SimulationConfig {
            noise: NoiseModel::Gauss,
            seed: 11,
            ..SimulationConfig::default()
        };
        let (_, a) = simulate(chain(), config.clone());
        let (_, b) = simulate(chain(), config);
        assert_eq!(a, b);
    }

    #[test]
    fn test_trace_records_moves() {
        let config = SimulationConfig {
            trace: true,
            ..SimulationConfig::default()
        };
        let (_, report) = simulate(chain(), config);
        assert!(!report.trace.is_empty());
        let generated: f64 = report
            .trace
            .iter()
            .filter(|r| r.kind == OpKind::Generate)
            .map(|r| r.amount)
            .sum();
        assert_abs_diff_eq!(generated, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_run_twice_is_idempotent() {
        let data = NetworkData::from_provider(chain()).unwrap();
        let mut simulation = Simulation::new(&data, data.schema(), SimulationConfig::default()).unwrap();
        let first = simulation.run();
        assert_eq!(simulation.run(), first);
    }

    #[test]
    fn test_stored_dt_overrides_config() {
        let mut ram = chain();
        ram.set(crate::types::DataKey::scalar(TICK_LENGTH), 0.5);
        let (data, report) = simulate(ram, SimulationConfig::default());
        assert_eq!(report.ticks, 8);
        assert_balanced(&data);

        let mut ram = chain();
        ram.set(crate::types::DataKey::scalar(TICK_LENGTH), -1.0);
        let data = NetworkData::from_provider(ram).unwrap();
        assert!(matches!(
            Simulation::new(&data, data.schema(), SimulationConfig::default()),
            Err(SimulationError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_dt() {
        let data = NetworkData::from_provider(chain()).unwrap();
        let config = SimulationConfig {
            dt: 0.0,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            Simulation::new(&data, data.schema(), config),
            Err(SimulationError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_data_flow_writes_trace_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.csv");
        let mut flow = NetworkDataFlow::new(chain(), SimulationConfig::default())
            .unwrap()
            .with_trace_path(&path);
        let report = flow.run().await.unwrap();
        assert!(report.objective.is_finite());
        assert!(path.exists());
        let ram = flow.into_provider();
        assert!(ram.variable_entries("g^").count() > 0);
    }
}
