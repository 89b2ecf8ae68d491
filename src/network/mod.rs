//! Network ontology: variable catalogue, schema construction and the
//! canonical data chain used by the planner, the simulation and the GA.
//!
//! Index names:
//! - `j`, `i`   -- nodes (source and destination)
//! - `rho`      -- virtualized environment
//! - `l`        -- structural stability interval

pub mod timeline;

pub use timeline::Timeline;

use crate::data::{
    ConcreteDataInterface, DataInterface, DataProvider, DefaultPolicy, DefaultingDataInterface,
    InferencingDataInterface, Schema,
};
use crate::types::{indices, indices_without, optional, DataError, DataKey, Indices};

// ---------------------------------------------------------------------------
// Catalogue
// ---------------------------------------------------------------------------

pub const NODES: &str = "nodes";
pub const VIRTUALIZED_ENVIRONMENTS: &str = "virtualized_environments";
pub const STRUCTURAL_STABILITY_INTERVALS: &str = "structural_stability_intervals";
/// Stored tick length, overriding the simulation config.
pub const TICK_LENGTH: &str = "dt";

pub const GA_POPULATION_SIZE: &str = "OPT_VIRT_GA_POPULATION_SIZE";
pub const GA_SWAP_PERC_POPULATION: &str = "OPT_VIRT_GA_SWAP_PERC_POPULATION";
pub const GA_SWAP_PERC_GENES: &str = "OPT_VIRT_GA_SWAP_PERC_GENES";
pub const GA_REMOVE_PERC_POPULATION: &str = "OPT_VIRT_GA_REMOVE_PERC_POPULATION";
pub const GA_N_ITERATIONS: &str = "OPT_VIRT_GA_N_ITERATIONS";
pub const ORCHESTRATION_N_ITERATIONS: &str = "OPT_VIRT_ORCHESTRATION_N_ITERATIONS";

/// Index layout of every network variable.
pub const VARIABLE_INDICES: &[(&str, &[&str])] = &[
    ("x", &["j", "i", "rho", "l"]),
    ("y", &["j", "rho", "l"]),
    ("g", &["j", "rho", "l"]),
    ("z", &["j", "rho", "l"]),
    ("psi", &["j", "i", "rho", "l"]),
    ("phi", &["j", "rho", "l"]),
    ("v", &["j", "rho", "l"]),
    ("x_eq", &["j", "rho", "l"]),
    ("mm_psi", &["j", "i", "l"]),
    ("m_psi", &["j", "i", "rho", "l"]),
    ("mm_v", &["j", "l"]),
    ("m_v", &["j", "rho", "l"]),
    ("mm_phi", &["j", "l"]),
    ("m_phi", &["j", "rho", "l"]),
    ("x^", &["j", "i", "rho", "l"]),
    ("y^", &["j", "rho", "l"]),
    ("g^", &["j", "rho", "l"]),
    ("z^", &["j", "rho", "l"]),
    ("x_eq^", &["j", "rho", "l"]),
    ("alpha_0", &[]),
    ("alpha_1", &[]),
    (TICK_LENGTH, &[]),
    ("tl", &["l"]),
    (NODES, &[]),
    (STRUCTURAL_STABILITY_INTERVALS, &[]),
    (VIRTUALIZED_ENVIRONMENTS, &[]),
    (GA_POPULATION_SIZE, &[]),
    (GA_SWAP_PERC_POPULATION, &[]),
    (GA_SWAP_PERC_GENES, &[]),
    (GA_REMOVE_PERC_POPULATION, &[]),
    (GA_N_ITERATIONS, &[]),
    (ORCHESTRATION_N_ITERATIONS, &[]),
];

/// Readable aliases accepted by [`crate::data::IdentifierTranslatingDataInterface`].
pub const TRANSLATION_TABLE: &[(&str, &str)] = &[
    ("max_transferred", "mm_psi"),
    ("max_stored", "mm_v"),
    ("max_processed", "mm_phi"),
    ("transferred_fraction", "m_psi"),
    ("stored_fraction", "m_v"),
    ("processed_fraction", "m_phi"),
    ("max_transferred_per_virtualized_environment", "psi"),
    ("max_stored_per_virtualized_environment", "v"),
    ("max_processed_per_virtualized_environment", "phi"),
    ("source_node", "j"),
    ("destination_node", "i"),
    ("node", "j"),
    ("virtualized_environment", "rho"),
    ("structural_stability_interval", "l"),
    ("processed", "g"),
    ("dropped", "z"),
    ("stored", "y"),
    ("transferred", "x"),
    ("minimize_drop_importance", "alpha_1"),
    ("maximize_processing_importance", "alpha_0"),
];

/// Variables whose absence must stay visible instead of reading as 0.
const NON_DEFAULTABLE: &[&str] = &[
    "alpha_0",
    "alpha_1",
    "tl",
    TICK_LENGTH,
    NODES,
    VIRTUALIZED_ENVIRONMENTS,
    STRUCTURAL_STABILITY_INTERVALS,
    GA_POPULATION_SIZE,
    GA_SWAP_PERC_POPULATION,
    GA_SWAP_PERC_GENES,
    GA_REMOVE_PERC_POPULATION,
    GA_N_ITERATIONS,
    ORCHESTRATION_N_ITERATIONS,
];

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Network schema for the given index bounds.
pub fn network_schema(nodes: usize, environments: usize, intervals: usize) -> Schema {
    let mut schema = Schema::new();
    schema.set_index_bounds(&[
        ("j", nodes),
        ("i", nodes),
        ("rho", environments),
        ("l", intervals),
    ]);
    for (variable, names) in VARIABLE_INDICES {
        schema.set_variable_indices(variable, names);
    }
    schema
}

/// Build the schema from the count scalars stored in the data itself.
pub fn schema_from_data(provider: &dyn DataProvider) -> Result<Schema, DataError> {
    let count = |variable: &str| -> Result<usize, DataError> {
        let value = provider
            .get(&DataKey::scalar(variable))
            .ok_or_else(|| DataError::no_data(variable, &Indices::new()))?;
        if !value.is_finite() || value < 0.0 {
            return Err(DataError::InvalidValue {
                variable: variable.to_string(),
                value,
                reason: "count must be a non-negative number".into(),
            });
        }
        Ok(value.round() as usize)
    };

    Ok(network_schema(
        count(NODES)?,
        count(VIRTUALIZED_ENVIRONMENTS)?,
        count(STRUCTURAL_STABILITY_INTERVALS)?,
    ))
}

/// Sizes of the three index spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub nodes: usize,
    pub environments: usize,
    pub intervals: usize,
}

impl Dimensions {
    pub fn of(schema: &Schema) -> Result<Self, DataError> {
        Ok(Self {
            nodes: schema.index_bound("j")?,
            environments: schema.index_bound("rho")?,
            intervals: schema.index_bound("l")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Canonical data chain
// ---------------------------------------------------------------------------

pub type NetworkChain<P> =
    DefaultingDataInterface<InferencingDataInterface<ConcreteDataInterface<P>>>;

/// Provider wrapped as `Concrete -> Inferencing -> Defaulting(0.0)`.
#[derive(Debug, Clone)]
pub struct NetworkData<P: DataProvider> {
    chain: NetworkChain<P>,
}

impl<P: DataProvider> NetworkData<P> {
    pub fn new(provider: P, schema: Schema) -> Self {
        let mut inferencing = InferencingDataInterface::new(ConcreteDataInterface::new(provider, schema.clone()));
        if let Ok(environments) = schema.index_bound("rho") {
            inferencing = inferencing.with_equal_share(environments);
        }
        let chain = DefaultingDataInterface::new(inferencing, 0.0)
        .with_policy(DefaultPolicy::deny(NON_DEFAULTABLE));
        Self { chain }
    }

    /// Wrap a provider, reading the index bounds from its count scalars.
    pub fn from_provider(provider: P) -> Result<Self, DataError> {
        let schema = schema_from_data(&provider)?;
        Ok(Self::new(provider, schema))
    }

    pub fn schema(&self) -> &Schema {
        self.chain.inner().inner().schema()
    }

    pub fn dimensions(&self) -> Result<Dimensions, DataError> {
        Dimensions::of(self.schema())
    }

    pub fn provider(&self) -> &P {
        self.chain.inner().inner().provider()
    }

    pub fn provider_mut(&mut self) -> &mut P {
        self.chain.inner_mut().inner_mut().provider_mut()
    }

    pub fn into_provider(self) -> P {
        self.chain.into_inner().into_inner().into_provider()
    }

    pub fn timeline(&self) -> Result<Timeline, DataError> {
        Timeline::from_data(self, self.dimensions()?.intervals)
    }

    pub fn weights(&self) -> Result<ObjectiveWeights, DataError> {
        ObjectiveWeights::resolve(self)
    }
}

impl<P: DataProvider> DataInterface for NetworkData<P> {
    fn data(&self, variable: &str, at: &Indices) -> Result<f64, DataError> {
        self.chain.data(variable, at)
    }

    fn set_data(&mut self, variable: &str, at: &Indices, value: f64) -> Result<(), DataError> {
        self.chain.set_data(variable, at, value)
    }

    fn contains(&self, variable: &str, at: &Indices) -> bool {
        self.chain.contains(variable, at)
    }
}

// ---------------------------------------------------------------------------
// Objective weights
// ---------------------------------------------------------------------------

/// `alpha_0` weighs processed data, `alpha_1` weighs dropped data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectiveWeights {
    pub processed: f64,
    pub dropped: f64,
}

impl ObjectiveWeights {
    /// Read both weights. When only one is stored, the other is `1 - it`.
    pub fn resolve(data: &dyn DataInterface) -> Result<Self, DataError> {
        let alpha_0 = optional(data.get("alpha_0", &[]))?;
        let alpha_1 = optional(data.get("alpha_1", &[]))?;
        match (alpha_0, alpha_1) {
            (Some(processed), Some(dropped)) => Ok(Self { processed, dropped }),
            (Some(processed), None) => Ok(Self {
                processed,
                dropped: 1.0 - processed,
            }),
            (None, Some(dropped)) => Ok(Self {
                processed: 1.0 - dropped,
                dropped,
            }),
            (None, None) => Err(DataError::no_data("alpha_0", &Indices::new())),
        }
    }

    /// `alpha_0 * processed - alpha_1 * dropped`.
    pub fn objective(&self, processed: f64, dropped: f64) -> f64 {
        self.processed * processed - self.dropped * dropped
    }
}

// ---------------------------------------------------------------------------
// Throughput
// ---------------------------------------------------------------------------

/// Resources shared between virtualized environments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Transfer,
    Store,
    Process,
}

impl Resource {
    pub const ALL: [Resource; 3] = [Resource::Transfer, Resource::Store, Resource::Process];

    /// Rate shared by all environments (`mm_*`).
    pub fn rate_variable(self) -> &'static str {
        match self {
            Resource::Transfer => "mm_psi",
            Resource::Store => "mm_v",
            Resource::Process => "mm_phi",
        }
    }

    /// Per-environment share of the rate (`m_*`).
    pub fn fraction_variable(self) -> &'static str {
        match self {
            Resource::Transfer => "m_psi",
            Resource::Store => "m_v",
            Resource::Process => "m_phi",
        }
    }

    /// Per-interval budget used by the planner.
    pub fn budget_variable(self) -> &'static str {
        match self {
            Resource::Transfer => "psi",
            Resource::Store => "v",
            Resource::Process => "phi",
        }
    }
}

/// Resolved rate and fraction of one resource channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    pub rate: f64,
    pub fraction: f64,
}

impl Throughput {
    pub fn effective(&self) -> f64 {
        self.rate * self.fraction
    }
}

/// Rate and fraction for `resource` at `at` (indices include `rho` and `l`).
///
/// With `mm_*` stored, the rate is `mm_*` and the fraction `m_*` (an equal
/// share when absent). Otherwise the rate is the budget spread over the
/// interval and the fraction is 1.
pub fn throughput(
    data: &dyn DataInterface,
    resource: Resource,
    at: &Indices,
    environments: usize,
) -> Result<Throughput, DataError> {
    let rate_at = indices_without(at, "rho");
    if data.contains(resource.rate_variable(), &rate_at) {
        let rate = data.data(resource.rate_variable(), &rate_at)?;
        let fraction = if data.contains(resource.fraction_variable(), at) {
            data.data(resource.fraction_variable(), at)?
        } else {
            1.0 / environments.max(1) as f64
        };
        return Ok(Throughput { rate, fraction });
    }

    let l = *at
        .get("l")
        .ok_or_else(|| DataError::UnknownIndex("l".to_string()))?;
    let budget = data.data(resource.budget_variable(), at)?;
    let duration = data.get("tl", &[("l", l)])?;
    Ok(Throughput {
        rate: budget / duration,
        fraction: 1.0,
    })
}

/// Whether data can flow `j -> i` in environment `rho` during interval `l`.
pub fn is_transfer_connected(
    data: &dyn DataInterface,
    j: usize,
    i: usize,
    rho: usize,
    l: usize,
    environments: usize,
) -> Result<bool, DataError> {
    if i == j {
        return Ok(false);
    }
    let at = indices(&[("j", j), ("i", i), ("rho", rho), ("l", l)]);
    Ok(throughput(data, Resource::Transfer, &at, environments)?.effective() > 0.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
