//! Named-index access to data, composed as a decorator chain.
//!
//! [`ConcreteDataInterface`] sits at the bottom and talks to a provider
//! through the schema. The other interfaces wrap any [`DataInterface`] and
//! change how misses and names are handled.

use std::collections::{BTreeSet, HashMap};
use tracing::warn;

use super::provider::DataProvider;
use super::schema::Schema;
use crate::types::{indices, indices_without, DataError, DataKey, Indices};

/// Read/write access to variables by name and named indices.
pub trait DataInterface: Send {
    fn data(&self, variable: &str, at: &Indices) -> Result<f64, DataError>;

    fn set_data(&mut self, variable: &str, at: &Indices, value: f64) -> Result<(), DataError>;

    /// Whether a value is actually stored (or inferable). Defaults do not count.
    fn contains(&self, variable: &str, at: &Indices) -> bool {
        self.data(variable, at).is_ok()
    }

    fn get(&self, variable: &str, at: &[(&str, usize)]) -> Result<f64, DataError> {
        self.data(variable, &indices(at))
    }

    fn set(&mut self, variable: &str, at: &[(&str, usize)], value: f64) -> Result<(), DataError> {
        self.set_data(variable, &indices(at), value)
    }
}

// ---------------------------------------------------------------------------
// Concrete
// ---------------------------------------------------------------------------

/// Provider access through the schema's index order.
#[derive(Debug, Clone)]
pub struct ConcreteDataInterface<P> {
    provider: P,
    schema: Schema,
}

impl<P: DataProvider> ConcreteDataInterface<P> {
    pub fn new(provider: P, schema: Schema) -> Self {
        Self { provider, schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub fn into_provider(self) -> P {
        self.provider
    }
}

impl<P: DataProvider> DataInterface for ConcreteDataInterface<P> {
    fn data(&self, variable: &str, at: &Indices) -> Result<f64, DataError> {
        let plain = self.schema.indices_named_to_plain(variable, at)?;
        self.provider
            .get(&DataKey::new(variable, plain))
            .ok_or_else(|| DataError::no_data(variable, at))
    }

    fn set_data(&mut self, variable: &str, at: &Indices, value: f64) -> Result<(), DataError> {
        let plain = self.schema.indices_named_to_plain(variable, at)?;
        self.provider.set(DataKey::new(variable, plain), value);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Inferencing
// ---------------------------------------------------------------------------

/// Budgets that can be derived from a rate, a fraction and the interval length.
const DECOMPOSITIONS: [(&str, &str, &str); 3] = [
    ("psi", "mm_psi", "m_psi"),
    ("phi", "mm_phi", "m_phi"),
    ("v", "mm_v", "m_v"),
];

fn decomposition(variable: &str) -> Option<(&'static str, &'static str)> {
    DECOMPOSITIONS
        .iter()
        .find(|(budget, _, _)| *budget == variable)
        .map(|(_, rate, fraction)| (*rate, *fraction))
}

/// Infers `psi`, `phi`, `v` as `mm_* * m_* * tl[l]` when they are not stored.
#[derive(Debug, Clone)]
pub struct InferencingDataInterface<D> {
    inner: D,
    equal_share: Option<f64>,
}

impl<D: DataInterface> InferencingDataInterface<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            equal_share: None,
        }
    }

    /// A missing `m_*` reads as `1 / environments` instead of blocking inference.
    pub fn with_equal_share(mut self, environments: usize) -> Self {
        self.equal_share = Some(1.0 / environments.max(1) as f64);
        self
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut D {
        &mut self.inner
    }

    pub fn into_inner(self) -> D {
        self.inner
    }

    fn infer(&self, rate: &str, fraction: &str, at: &Indices) -> Result<f64, DataError> {
        let l = *at
            .get("l")
            .ok_or_else(|| DataError::UnknownIndex("l".to_string()))?;
        let rate_value = self.inner.data(rate, &indices_without(at, "rho"))?;
        let fraction_value = match self.inner.data(fraction, at) {
            Err(e) if e.is_no_data() => self.equal_share.ok_or(e)?,
            other => other?,
        };
        let duration = self.inner.data("tl", &indices(&[("l", l)]))?;
        Ok(rate_value * fraction_value * duration)
    }
}

impl<D: DataInterface> DataInterface for InferencingDataInterface<D> {
    fn data(&self, variable: &str, at: &Indices) -> Result<f64, DataError> {
        match self.inner.data(variable, at) {
            Err(e) if e.is_no_data() => match decomposition(variable) {
                Some((rate, fraction)) => self.infer(rate, fraction, at).map_err(|_| e),
                None => Err(e),
            },
            other => other,
        }
    }

    fn set_data(&mut self, variable: &str, at: &Indices, value: f64) -> Result<(), DataError> {
        self.inner.set_data(variable, at, value)
    }

    fn contains(&self, variable: &str, at: &Indices) -> bool {
        if self.inner.contains(variable, at) {
            return true;
        }
        match decomposition(variable) {
            Some((rate, fraction)) => self.infer(rate, fraction, at).is_ok(),
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaulting
// ---------------------------------------------------------------------------

/// Which variables may fall back to a default value.
#[derive(Debug, Clone, Default)]
pub enum DefaultPolicy {
    #[default]
    All,
    Allow(BTreeSet<String>),
    Deny(BTreeSet<String>),
}

impl DefaultPolicy {
    pub fn allow(variables: &[&str]) -> Self {
        DefaultPolicy::Allow(variables.iter().map(|s| s.to_string()).collect())
    }

    pub fn deny(variables: &[&str]) -> Self {
        DefaultPolicy::Deny(variables.iter().map(|s| s.to_string()).collect())
    }

    pub fn permits(&self, variable: &str) -> bool {
        match self {
            DefaultPolicy::All => true,
            DefaultPolicy::Allow(set) => set.contains(variable),
            DefaultPolicy::Deny(set) => !set.contains(variable),
        }
    }
}

/// Replaces `NoData` with a default value for permitted variables.
#[derive(Debug, Clone)]
pub struct DefaultingDataInterface<D> {
    inner: D,
    default_value: f64,
    overrides: HashMap<String, f64>,
    policy: DefaultPolicy,
}

impl<D: DataInterface> DefaultingDataInterface<D> {
    pub fn new(inner: D, default_value: f64) -> Self {
        Self {
            inner,
            default_value,
            overrides: HashMap::new(),
            policy: DefaultPolicy::All,
        }
    }

    pub fn with_policy(mut self, policy: DefaultPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Per-variable default taking precedence over the common one.
    pub fn with_override(mut self, variable: &str, value: f64) -> Self {
        self.overrides.insert(variable.to_string(), value);
        self
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut D {
        &mut self.inner
    }

    pub fn into_inner(self) -> D {
        self.inner
    }
}

impl<D: DataInterface> DataInterface for DefaultingDataInterface<D> {
    fn data(&self, variable: &str, at: &Indices) -> Result<f64, DataError> {
        match self.inner.data(variable, at) {
            Err(e) if e.is_no_data() && self.policy.permits(variable) => Ok(self
                .overrides
                .get(variable)
                .copied()
                .unwrap_or(self.default_value)),
            other => other,
        }
    }

    fn set_data(&mut self, variable: &str, at: &Indices, value: f64) -> Result<(), DataError> {
        self.inner.set_data(variable, at, value)
    }

    fn contains(&self, variable: &str, at: &Indices) -> bool {
        self.inner.contains(variable, at)
    }
}

// ---------------------------------------------------------------------------
// Identifier translation
// ---------------------------------------------------------------------------

/// Maps readable aliases (`max_transferred`, `source_node`) to internal
/// identifiers (`mm_psi`, `j`). Unknown names pass through unchanged.
#[derive(Debug, Clone)]
pub struct IdentifierTranslatingDataInterface<D> {
    inner: D,
    table: HashMap<String, String>,
}

impl<D: DataInterface> IdentifierTranslatingDataInterface<D> {
    pub fn new(inner: D, table: &[(&str, &str)]) -> Self {
        Self {
            inner,
            table: table
                .iter()
                .map(|(alias, stem)| (alias.to_string(), stem.to_string()))
                .collect(),
        }
    }

    pub fn into_inner(self) -> D {
        self.inner
    }

    fn translate<'a>(&'a self, name: &'a str) -> &'a str {
        self.table.get(name).map(|s| s.as_str()).unwrap_or(name)
    }

    fn translate_indices(&self, at: &Indices) -> Indices {
        at.iter()
            .map(|(k, v)| (self.translate(k).to_string(), *v))
            .collect()
    }
}

impl<D: DataInterface> DataInterface for IdentifierTranslatingDataInterface<D> {
    fn data(&self, variable: &str, at: &Indices) -> Result<f64, DataError> {
        self.inner
            .data(self.translate(variable), &self.translate_indices(at))
    }

    fn set_data(&mut self, variable: &str, at: &Indices, value: f64) -> Result<(), DataError> {
        let variable = self.translate(variable).to_string();
        let at = self.translate_indices(at);
        self.inner.set_data(&variable, &at, value)
    }

    fn contains(&self, variable: &str, at: &Indices) -> bool {
        self.inner
            .contains(self.translate(variable), &self.translate_indices(at))
    }
}

// ---------------------------------------------------------------------------
// Constrained
// ---------------------------------------------------------------------------

/// Warns about variables outside the known set, then forwards the call.
#[derive(Debug, Clone)]
pub struct ConstrainedDataInterface<D> {
    inner: D,
    known: BTreeSet<String>,
}

impl<D: DataInterface> ConstrainedDataInterface<D> {
    pub fn new(inner: D, schema: &Schema) -> Self {
        Self {
            inner,
            known: schema.variables().map(|s| s.to_string()).collect(),
        }
    }

    pub fn into_inner(self) -> D {
        self.inner
    }

    fn check(&self, variable: &str) {
        if !self.known.contains(variable) {
            warn!(variable, "Variable is not declared in the schema");
        }
    }
}

impl<D: DataInterface> DataInterface for ConstrainedDataInterface<D> {
    fn data(&self, variable: &str, at: &Indices) -> Result<f64, DataError> {
        self.check(variable);
        self.inner.data(variable, at)
    }

    fn set_data(&mut self, variable: &str, at: &Indices, value: f64) -> Result<(), DataError> {
        self.check(variable);
        self.inner.set_data(variable, at, value)
    }

    fn contains(&self, variable: &str, at: &Indices) -> bool {
        self.inner.contains(variable, at)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
