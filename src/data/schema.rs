//! Dataset schema: index bounds and the ordered index list of each variable.
//!
//! Serialized as JSON with two top-level keys:
//!
//! ```json
//! { "indexbound": { "j": 3, "l": 2 }, "variableindices": { "x": ["j", "i", "rho", "l"] } }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use super::radix::{radix_product, RadixProduct};
use crate::types::{DataError, Indices};

/// Index bounds plus variable index layouts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "indexbound", default)]
    index_bounds: BTreeMap<String, usize>,
    #[serde(rename = "variableindices", default)]
    variable_indices: BTreeMap<String, Vec<String>>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a schema from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let schema = Self::from_json_str(&json)?;
        debug!(path = %path.display(), variables = schema.variable_indices.len(), "Schema loaded");
        Ok(schema)
    }

    pub fn from_json_str(json: &str) -> Result<Self, DataError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String, DataError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the schema as pretty JSON.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), DataError> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    // -- Index bounds --------------------------------------------------------

    pub fn set_index_bound(&mut self, index: &str, bound: usize) {
        self.index_bounds.insert(index.to_string(), bound);
    }

    pub fn set_index_bounds(&mut self, bounds: &[(&str, usize)]) {
        for (index, bound) in bounds {
            self.set_index_bound(index, *bound);
        }
    }

    pub fn index_bound(&self, index: &str) -> Result<usize, DataError> {
        self.index_bounds
            .get(index)
            .copied()
            .ok_or_else(|| DataError::UnknownIndex(index.to_string()))
    }

    pub fn index_bounds(&self) -> &BTreeMap<String, usize> {
        &self.index_bounds
    }

    // -- Variables -----------------------------------------------------------

    pub fn set_variable_indices(&mut self, variable: &str, indices: &[&str]) {
        self.variable_indices.insert(
            variable.to_string(),
            indices.iter().map(|s| s.to_string()).collect(),
        );
    }

    pub fn variable_indices(&self, variable: &str) -> Result<&[String], DataError> {
        self.variable_indices
            .get(variable)
            .map(|v| v.as_slice())
            .ok_or_else(|| DataError::UnknownVariable(variable.to_string()))
    }

    pub fn has_variable(&self, variable: &str) -> bool {
        self.variable_indices.contains_key(variable)
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.variable_indices.keys().map(|s| s.as_str())
    }

    /// Bounds of a variable's indices, in its index order.
    pub fn variable_radix(&self, variable: &str) -> Result<Vec<usize>, DataError> {
        self.variable_indices(variable)?
            .iter()
            .map(|index| self.index_bound(index))
            .collect()
    }

    /// Bounds of the given index names, in the given order.
    pub fn make_radix_map<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>, DataError> {
        names.iter().map(|name| self.index_bound(name.as_ref())).collect()
    }

    // -- Iteration -----------------------------------------------------------

    /// Enumerate the index tuples of explicit names, resolving bounds here.
    pub fn iter_indices(&self, names: &[&str]) -> Result<RadixProduct, DataError> {
        Ok(radix_product(&self.make_radix_map(names)?))
    }

    /// Enumerate a variable's plain index tuples.
    pub fn iter_variable(&self, variable: &str) -> Result<RadixProduct, DataError> {
        Ok(radix_product(&self.variable_radix(variable)?))
    }

    /// Enumerate a variable's index tuples as named maps.
    pub fn iter_variable_named(
        &self,
        variable: &str,
    ) -> Result<impl Iterator<Item = Indices>, DataError> {
        let names = self.variable_indices(variable)?.to_vec();
        let plain = self.iter_variable(variable)?;
        Ok(plain.map(move |values| names.iter().cloned().zip(values).collect()))
    }

    // -- Conversion ----------------------------------------------------------

    /// Order named indices by the variable's index list.
    ///
    /// The name set must match exactly and each value must be within bounds.
    pub fn indices_named_to_plain(
        &self,
        variable: &str,
        named: &Indices,
    ) -> Result<Vec<usize>, DataError> {
        let names = self.variable_indices(variable)?;
        if names.len() != named.len() || names.iter().any(|n| !named.contains_key(n)) {
            return Err(DataError::IndexMismatch {
                variable: variable.to_string(),
                expected: names.to_vec(),
                got: named.keys().cloned().collect(),
            });
        }

        names
            .iter()
            .map(|name| {
                let value = named[name];
                let bound = self.index_bound(name)?;
                if value >= bound {
                    return Err(DataError::IndexOutOfBounds {
                        variable: variable.to_string(),
                        index: name.clone(),
                        value,
                        bound,
                    });
                }
                Ok(value)
            })
            .collect()
    }

    pub fn indices_plain_to_named(
        &self,
        variable: &str,
        plain: &[usize],
    ) -> Result<Indices, DataError> {
        let names = self.variable_indices(variable)?;
        if names.len() != plain.len() {
            return Err(DataError::IndexMismatch {
                variable: variable.to_string(),
                expected: names.to_vec(),
                got: plain.iter().map(|v| v.to_string()).collect(),
            });
        }
        Ok(names.iter().cloned().zip(plain.iter().copied()).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
