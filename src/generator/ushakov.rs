//! The reference network (Ushakov, 2021).
//!
//! Seven nodes, two virtualized environments and three intervals of
//! durations 4, 2 and 1. Inflow enters at nodes 0 and 2. Every channel
//! carries 10 per unit of time and environment; node processing and store
//! capacities differ per node. Capacities are stored as rates and fractions
//! (`mm_*`, `m_*`, an even split between the two environments) so that the
//! budgets `psi`, `phi`, `v` are inferred and follow tuned fractions.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::data::{CsvDataProvider, DataProvider, RamDataProvider, Schema};
use crate::network::{network_schema, NODES, STRUCTURAL_STABILITY_INTERVALS, VIRTUALIZED_ENVIRONMENTS};
use crate::types::{DataError, DataKey};

pub const NODE_COUNT: usize = 7;
pub const ENVIRONMENTS: usize = 2;
pub const INTERVAL_DURATIONS: [f64; 3] = [4.0, 2.0, 1.0];

/// Channel throughput per unit of time and environment.
pub const CHANNEL_THROUGHPUT: f64 = 10.0;

/// Processing per unit of time and environment, per node.
pub const PROCESSING: [f64; NODE_COUNT] = [2.0, 5.0, 8.0, 12.0, 9.0, 3.0, 7.0];

/// Store capacity per environment, per node.
pub const STORAGE: [f64; NODE_COUNT] = [20.0, 20.0, 20.0, 50.0, 50.0, 10.0, 20.0];

/// Connected `(source, destination)` channels per interval.
pub const CHANNELS: [&[(usize, usize)]; 3] = [
    &[
        (0, 1),
        (0, 2),
        (1, 3),
        (1, 6),
        (2, 3),
        (3, 1),
        (3, 5),
        (3, 6),
        (4, 3),
        (4, 5),
        (5, 3),
        (5, 6),
        (6, 1),
    ],
    &[
        (0, 2),
        (0, 1),
        (1, 3),
        (1, 6),
        (2, 3),
        (3, 1),
        (3, 6),
        (4, 3),
        (5, 6),
        (6, 1),
    ],
    &[(1, 3), (1, 6), (2, 3), (3, 1), (3, 6), (4, 3), (6, 1)],
];

/// Inflow as `(j, rho, l, amount)`.
pub const INFLOW: [(usize, usize, usize, f64); 10] = [
    (0, 0, 0, 100.0),
    (0, 1, 0, 100.0),
    (2, 0, 0, 50.0),
    (2, 1, 0, 50.0),
    (0, 0, 1, 50.0),
    (0, 1, 1, 50.0),
    (2, 0, 1, 60.0),
    (2, 1, 1, 60.0),
    (2, 0, 2, 50.0),
    (2, 1, 2, 50.0),
];

pub const ALPHA_0: f64 = 0.5;
pub const ALPHA_1: f64 = 0.9;

pub fn schema() -> Schema {
    network_schema(NODE_COUNT, ENVIRONMENTS, INTERVAL_DURATIONS.len())
}

pub fn dataset() -> RamDataProvider {
    let mut ram = RamDataProvider::new();
    let share = 1.0 / ENVIRONMENTS as f64;
    let envs = ENVIRONMENTS as f64;

    for (l, &tl) in INTERVAL_DURATIONS.iter().enumerate() {
        ram.set(DataKey::new("tl", vec![l]), tl);

        for &(j, i) in CHANNELS[l] {
            ram.set(DataKey::new("mm_psi", vec![j, i, l]), CHANNEL_THROUGHPUT * envs);
            for rho in 0..ENVIRONMENTS {
                ram.set(DataKey::new("m_psi", vec![j, i, rho, l]), share);
            }
        }

        for j in 0..NODE_COUNT {
            ram.set(DataKey::new("mm_phi", vec![j, l]), PROCESSING[j] * envs);
            // Spread over the interval so that the inferred `v` is the
            // capacity itself.
            ram.set(DataKey::new("mm_v", vec![j, l]), STORAGE[j] * envs / tl);
            for rho in 0..ENVIRONMENTS {
                ram.set(DataKey::new("m_phi", vec![j, rho, l]), share);
                ram.set(DataKey::new("m_v", vec![j, rho, l]), share);
            }
        }
    }

    for (j, rho, l, amount) in INFLOW {
        ram.set(DataKey::new("x_eq", vec![j, rho, l]), amount);
    }

    ram.set(DataKey::scalar("alpha_0"), ALPHA_0);
    ram.set(DataKey::scalar("alpha_1"), ALPHA_1);
    ram.set(DataKey::scalar(NODES), NODE_COUNT as f64);
    ram.set(DataKey::scalar(VIRTUALIZED_ENVIRONMENTS), ENVIRONMENTS as f64);
    ram.set(DataKey::scalar(STRUCTURAL_STABILITY_INTERVALS), INTERVAL_DURATIONS.len() as f64);
    ram
}

/// Write `ushakov.csv` and `ushakov.json` into `dir`. Returns both paths.
pub fn write(dir: impl AsRef<Path>) -> Result<(PathBuf, PathBuf), DataError> {
    let dir = dir.as_ref();
    let data_path = dir.join("ushakov.csv");
    let schema_path = dir.join("ushakov.json");

    let mut file = CsvDataProvider::create_if_missing(&data_path)?;
    file.copy_from(&dataset());
    file.sync()?;
    schema().write(&schema_path)?;

    info!(data = %data_path.display(), schema = %schema_path.display(), "Ushakov dataset written");
    Ok((data_path, schema_path))
}
