//! Dataset generation.
//!
//! [`RandomGenerator`] fills a schema's network variables with uniform
//! values, for experiments and property tests. [`ushakov`] holds the
//! hand-made reference network.

pub mod ushakov;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::data::{CsvDataProvider, DataProvider, RamDataProvider, Schema};
use crate::network::{NODES, STRUCTURAL_STABILITY_INTERVALS, VIRTUALIZED_ENVIRONMENTS};
use crate::types::{DataError, DataKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub psi_upper: f64,
    pub phi_upper: f64,
    pub v_upper: f64,
    /// Inflow; none is generated when unset.
    pub x_eq_upper: Option<f64>,
    /// Transfer rate. When set, `psi` is left to inference from
    /// `mm_psi * m_psi * tl`.
    pub mm_psi_upper: Option<f64>,
    pub mm_phi_upper: Option<f64>,
    pub mm_v_upper: Option<f64>,
    /// Interval durations lie in `[tl_upper / 2, tl_upper)`.
    pub tl_upper: f64,
    /// Nodes receiving inflow. All nodes when empty.
    pub entry_nodes: Vec<usize>,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            psi_upper: 10.0,
            phi_upper: 10.0,
            v_upper: 10.0,
            x_eq_upper: None,
            mm_psi_upper: None,
            mm_phi_upper: None,
            mm_v_upper: None,
            tl_upper: 2.0,
            entry_nodes: Vec::new(),
            seed: 0,
        }
    }
}

/// Index layouts the generator relies on.
const EXPECTED_LAYOUT: [(&str, &[&str]); 3] = [
    ("psi", &["j", "i", "rho", "l"]),
    ("v", &["j", "rho", "l"]),
    ("phi", &["j", "rho", "l"]),
];

pub struct RandomGenerator {
    schema: Schema,
    config: GeneratorConfig,
}

impl RandomGenerator {
    pub fn new(schema: Schema, config: GeneratorConfig) -> Result<Self, DataError> {
        for (variable, expected) in EXPECTED_LAYOUT {
            let got = schema.variable_indices(variable)?;
            if got != expected {
                return Err(DataError::IndexMismatch {
                    variable: variable.to_string(),
                    expected: expected.iter().map(|s| s.to_string()).collect(),
                    got: got.to_vec(),
                });
            }
        }
        if !config.tl_upper.is_finite() || config.tl_upper <= 0.0 {
            return Err(DataError::InvalidValue {
                variable: "tl".into(),
                value: config.tl_upper,
                reason: "upper bound must be positive".into(),
            });
        }
        Ok(Self { schema, config })
    }

    pub fn generate(&self) -> Result<RamDataProvider, DataError> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut ram = RamDataProvider::new();
        let config = &self.config;

        let budgets = [
            ("psi", config.psi_upper, "mm_psi", config.mm_psi_upper, "m_psi"),
            ("v", config.v_upper, "mm_v", config.mm_v_upper, "m_v"),
            ("phi", config.phi_upper, "mm_phi", config.mm_phi_upper, "m_phi"),
        ];
        for (budget, budget_upper, rate, rate_upper, fraction) in budgets {
            match rate_upper {
                Some(upper) if self.schema.has_variable(rate) => {
                    self.uniform(&mut ram, &mut rng, rate, upper)?;
                    self.fractions(&mut ram, &mut rng, fraction)?;
                }
                _ => self.uniform(&mut ram, &mut rng, budget, budget_upper)?,
            }
        }

        if let Some(upper) = config.x_eq_upper {
            let names = self.schema.variable_indices("x_eq")?.to_vec();
            for at in self.schema.iter_variable("x_eq")? {
                let entry = names
                    .iter()
                    .zip(&at)
                    .all(|(name, &value)| name != "j" || config.entry_nodes.is_empty() || config.entry_nodes.contains(&value));
                if entry {
                    let value = if upper > 0.0 { rng.gen_range(0.0..upper) } else { 0.0 };
                    ram.set(DataKey::new("x_eq", at), value);
                }
            }
        }

        if self.schema.has_variable("tl") {
            for at in self.schema.iter_variable("tl")? {
                let tl = rng.gen_range(config.tl_upper / 2.0..config.tl_upper);
                ram.set(DataKey::new("tl", at), tl);
            }
        }

        let alpha_0: f64 = rng.gen_range(0.0..1.0);
        ram.set(DataKey::scalar("alpha_0"), alpha_0);
        ram.set(DataKey::scalar("alpha_1"), 1.0 - alpha_0);

        for (variable, index) in [(NODES, "j"), (VIRTUALIZED_ENVIRONMENTS, "rho"), (STRUCTURAL_STABILITY_INTERVALS, "l")] {
            ram.set(DataKey::scalar(variable), self.schema.index_bound(index)? as f64);
        }
        Ok(ram)
    }

    fn uniform(&self, ram: &mut RamDataProvider, rng: &mut ChaCha8Rng, variable: &str, upper: f64) -> Result<(), DataError> {
        for at in self.schema.iter_variable(variable)? {
            let value = if upper > 0.0 { rng.gen_range(0.0..upper) } else { 0.0 };
            ram.set(DataKey::new(variable, at), value);
        }
        Ok(())
    }

    /// Fractions normalised to sum 1 over `rho`.
    fn fractions(&self, ram: &mut RamDataProvider, rng: &mut ChaCha8Rng, variable: &str) -> Result<(), DataError> {
        let names = self.schema.variable_indices(variable)?.to_vec();
        let rho = names.iter().position(|n| n == "rho").ok_or_else(|| DataError::UnknownIndex("rho".into()))?;

        let mut groups: BTreeMap<Vec<usize>, Vec<(Vec<usize>, f64)>> = BTreeMap::new();
        for at in self.schema.iter_variable(variable)? {
            let mut group = at.clone();
            group.remove(rho);
            groups.entry(group).or_default().push((at, rng.gen::<f64>()));
        }
        for members in groups.into_values() {
            let sum: f64 = members.iter().map(|(_, draw)| draw).sum();
            let share = 1.0 / members.len() as f64;
            for (at, draw) in members {
                let value = if sum > 0.0 { draw / sum } else { share };
                ram.set(DataKey::new(variable, at), value);
            }
        }
        Ok(())
    }
}

/// Generate a random dataset and write it to `output`. Returns the number
/// of entries written.
pub fn generate_random(
    schema: &Schema,
    config: &GeneratorConfig,
    output: impl AsRef<Path>,
) -> Result<usize, DataError> {
    let output = output.as_ref();
    let ram = RandomGenerator::new(schema.clone(), config.clone())?.generate()?;
    let mut file = CsvDataProvider::create_if_missing(output)?;
    file.copy_from(&ram);
    file.sync()?;
    info!(path = %output.display(), entries = ram.len(), "Random dataset written");
    Ok(ram.len())
}
