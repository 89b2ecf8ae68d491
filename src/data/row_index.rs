//! Flat vector layout for a selected list of variables.
//!
//! Each variable occupies a contiguous block, in the order it was listed.
//! Inside a block, positions follow the variable's index order with the
//! last index varying fastest.

use std::collections::BTreeMap;

use super::schema::Schema;
use crate::types::{DataError, Indices};

#[derive(Debug, Clone)]
struct Block {
    indices: Vec<String>,
    bounds: Vec<usize>,
    strides: Vec<usize>,
    offset: usize,
    len: usize,
}

/// Maps `(variable, named indices)` to a position in a flat row.
#[derive(Debug, Clone)]
pub struct RowIndex {
    blocks: BTreeMap<String, Block>,
    order: Vec<String>,
    row_len: usize,
}

impl RowIndex {
    /// Lay out `variables` (in the given order) against the schema's bounds.
    pub fn from_schema(schema: &Schema, variables: &[&str]) -> Result<Self, DataError> {
        let mut blocks = BTreeMap::new();
        let mut order = Vec::with_capacity(variables.len());
        let mut offset = 0;

        for variable in variables {
            let indices = schema.variable_indices(variable)?.to_vec();
            let bounds = schema.variable_radix(variable)?;

            let mut strides = vec![1; bounds.len()];
            for k in (0..bounds.len().saturating_sub(1)).rev() {
                strides[k] = strides[k + 1] * bounds[k + 1];
            }
            let len = bounds.iter().product::<usize>();

            blocks.insert(
                variable.to_string(),
                Block {
                    indices,
                    bounds,
                    strides,
                    offset,
                    len,
                },
            );
            order.push(variable.to_string());
            offset += len;
        }

        Ok(Self {
            blocks,
            order,
            row_len: offset,
        })
    }

    /// Total number of positions.
    pub fn row_len(&self) -> usize {
        self.row_len
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    /// `(offset, len)` of a variable's block.
    pub fn span(&self, variable: &str) -> Result<(usize, usize), DataError> {
        let block = self.block(variable)?;
        Ok((block.offset, block.len))
    }

    pub fn position(&self, variable: &str, named: &Indices) -> Result<usize, DataError> {
        let block = self.block(variable)?;
        if block.indices.len() != named.len() {
            return Err(DataError::IndexMismatch {
                variable: variable.to_string(),
                expected: block.indices.clone(),
                got: named.keys().cloned().collect(),
            });
        }

        let mut position = block.offset;
        for (k, name) in block.indices.iter().enumerate() {
            let value = *named.get(name).ok_or_else(|| DataError::IndexMismatch {
                variable: variable.to_string(),
                expected: block.indices.clone(),
                got: named.keys().cloned().collect(),
            })?;
            if value >= block.bounds[k] {
                return Err(DataError::IndexOutOfBounds {
                    variable: variable.to_string(),
                    index: name.clone(),
                    value,
                    bound: block.bounds[k],
                });
            }
            position += value * block.strides[k];
        }
        Ok(position)
    }

    fn block(&self, variable: &str) -> Result<&Block, DataError> {
        self.blocks
            .get(variable)
            .ok_or_else(|| DataError::UnknownVariable(variable.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
