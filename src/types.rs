//! Shared types for TWOOPT.
//!
//! Data keys, named index maps and the error taxonomy used by the data
//! layer, the planner and the simulation. Kept free of module-specific
//! logic so every stage can depend on it without cycles.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Indices and keys
// ---------------------------------------------------------------------------

/// Named indices of a variable, e.g. `{j: 0, i: 1, rho: 0, l: 2}`.
pub type Indices = BTreeMap<String, usize>;

/// Build an [`Indices`] map from `(name, value)` pairs.
pub fn indices(pairs: &[(&str, usize)]) -> Indices {
    pairs.iter().map(|(name, value)| (name.to_string(), *value)).collect()
}

/// Drop one named index, returning a copy of the rest.
pub fn indices_without(source: &Indices, name: &str) -> Indices {
    source
        .iter()
        .filter(|(k, _)| k.as_str() != name)
        .map(|(k, v)| (k.clone(), *v))
        .collect()
}

/// Render named indices as `j=0,i=1,rho=0`.
pub fn format_indices(source: &Indices) -> String {
    source
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Plain storage key: a variable name plus its index values in schema order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DataKey {
    pub variable: String,
    pub indices: Vec<usize>,
}

impl DataKey {
    pub fn new(variable: impl Into<String>, indices: Vec<usize>) -> Self {
        Self {
            variable: variable.into(),
            indices,
        }
    }

    /// Key of an index-less variable (`alpha_0`, `nodes`, ...).
    pub fn scalar(variable: impl Into<String>) -> Self {
        Self::new(variable, Vec::new())
    }
}

impl fmt::Display for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.variable)?;
        for index in &self.indices {
            write!(f, " {index}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by schemas, providers and data interfaces.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("No data for {variable}[{indices}]")]
    NoData { variable: String, indices: String },

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Unknown index: {0}")]
    UnknownIndex(String),

    #[error("Index mismatch for {variable}: expected {expected:?}, got {got:?}")]
    IndexMismatch {
        variable: String,
        expected: Vec<String>,
        got: Vec<String>,
    },

    #[error("Index {index}={value} of {variable} is out of bounds (< {bound})")]
    IndexOutOfBounds {
        variable: String,
        index: String,
        value: usize,
        bound: usize,
    },

    #[error("Invalid value {value} for {variable}: {reason}")]
    InvalidValue {
        variable: String,
        value: f64,
        reason: String,
    },

    #[error("Malformed row at line {line}: {message}")]
    MalformedRow { line: usize, message: String },

    #[error("Unsupported storage: {0}")]
    UnsupportedStorage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Schema JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DataError {
    pub fn no_data(variable: &str, at: &Indices) -> Self {
        DataError::NoData {
            variable: variable.to_string(),
            indices: format_indices(at),
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, DataError::NoData { .. })
    }
}

/// Treat a missing value as `None`, keep every other error.
pub fn optional(result: Result<f64, DataError>) -> Result<Option<f64>, DataError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_no_data() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Errors raised by the linear-programming planner.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("Invalid linear program: {0}")]
    InvalidProblem(String),

    #[error("Input validation failed: {0}")]
    Validation(String),

    #[error("Linear program is infeasible")]
    Infeasible,

    #[error("Linear program is unbounded")]
    Unbounded,

    #[error("Simplex iteration limit reached after {0} iterations")]
    IterationLimit(usize),

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Errors raised while building or running a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Invalid simulation config: {0}")]
    Config(String),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("Trace export failed: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
