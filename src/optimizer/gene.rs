//! Genes of the throughput optimizer.
//!
//! A gene is the flat vector of every `m_psi`, `m_v` and `m_phi` fraction,
//! laid out by a [`RowIndex`]. Fractions that share a variable and all
//! indices except `rho` form a group: one physical resource split between
//! environments. A feasible gene keeps every value in `[0, 1]` and every
//! group sum at most 1.

use rand::seq::index;
use rand::Rng;
use std::collections::BTreeMap;

use crate::data::{DataInterface, RowIndex, Schema};
use crate::types::{indices_without, DataError, Indices};

/// Fraction variables tuned by the GA, in gene order.
pub const GENE_VARIABLES: [&str; 3] = ["m_psi", "m_v", "m_phi"];

pub type Gene = Vec<f64>;

/// Position of every gene value and the groups they form.
#[derive(Debug, Clone)]
pub struct GeneLayout {
    slots: Vec<(&'static str, Indices)>,
    groups: Vec<Vec<usize>>,
    environments: usize,
}

impl GeneLayout {
    pub fn from_schema(schema: &Schema) -> Result<Self, DataError> {
        let row_index = RowIndex::from_schema(schema, &GENE_VARIABLES)?;
        let mut slots: Vec<Option<(&'static str, Indices)>> = vec![None; row_index.row_len()];
        let mut groups: BTreeMap<(&'static str, Indices), Vec<usize>> = BTreeMap::new();

        for variable in GENE_VARIABLES {
            for at in schema.iter_variable_named(variable)? {
                let position = row_index.position(variable, &at)?;
                groups
                    .entry((variable, indices_without(&at, "rho")))
                    .or_default()
                    .push(position);
                slots[position] = Some((variable, at));
            }
        }

        Ok(Self {
            slots: slots.into_iter().flatten().collect(),
            groups: groups.into_values().collect(),
            environments: schema.index_bound("rho")?,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn groups(&self) -> &[Vec<usize>] {
        &self.groups
    }

    /// Variable and indices of a gene position.
    pub fn slot(&self, position: usize) -> Option<(&str, &Indices)> {
        self.slots.get(position).map(|(variable, at)| (*variable, at))
    }

    /// Current fractions. Missing ones read as an equal share.
    pub fn read(&self, data: &dyn DataInterface) -> Result<Gene, DataError> {
        let share = 1.0 / self.environments.max(1) as f64;
        let mut gene = Vec::with_capacity(self.len());
        for (variable, at) in &self.slots {
            if data.contains(variable, at) {
                gene.push(data.data(variable, at)?);
            } else {
                gene.push(share);
            }
        }
        self.normalize(&mut gene);
        Ok(gene)
    }

    pub fn write(&self, gene: &[f64], data: &mut dyn DataInterface) -> Result<(), DataError> {
        if gene.len() != self.len() {
            return Err(DataError::InvalidValue {
                variable: "gene".into(),
                value: gene.len() as f64,
                reason: format!("expected {} fractions", self.len()),
            });
        }
        for ((variable, at), value) in self.slots.iter().zip(gene) {
            data.set_data(variable, at, *value)?;
        }
        Ok(())
    }

    /// Clamp to `[0, 1]` and scale down groups that sum above 1.
    pub fn normalize(&self, gene: &mut [f64]) {
        for value in gene.iter_mut() {
            *value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        }
        for group in &self.groups {
            let sum: f64 = group.iter().map(|&p| gene[p]).sum();
            if sum > 1.0 {
                for &p in group {
                    gene[p] /= sum;
                }
            }
        }
    }

    /// Uniform draws, each group normalised to sum 1.
    pub fn random<R: Rng>(&self, rng: &mut R) -> Gene {
        let mut gene = vec![0.0; self.len()];
        for group in &self.groups {
            let draws: Vec<f64> = group.iter().map(|_| rng.gen::<f64>()).collect();
            let sum: f64 = draws.iter().sum();
            for (&p, draw) in group.iter().zip(&draws) {
                gene[p] = if sum > 0.0 {
                    draw / sum
                } else {
                    1.0 / group.len() as f64
                };
            }
        }
        gene
    }

    /// Child of `first` with a random `swap_perc` share of positions taken
    /// from `second`.
    pub fn crossover<R: Rng>(&self, first: &[f64], second: &[f64], swap_perc: f64, rng: &mut R) -> Gene {
        let mut child = first.to_vec();
        let len = child.len().min(second.len());
        let amount = ((len as f64) * swap_perc.clamp(0.0, 1.0)).round() as usize;
        for p in index::sample(rng, len, amount.min(len)).iter() {
            child[p] = second[p];
        }
        self.normalize(&mut child);
        child
    }

    /// Whether every value is in `[0, 1]` and every group sums to at most 1.
    pub fn is_feasible(&self, gene: &[f64]) -> bool {
        const SLACK: f64 = 1e-9;
        gene.len() == self.len()
            && gene.iter().all(|v| (0.0..=1.0).contains(v))
            && self
                .groups
                .iter()
                .all(|group| group.iter().map(|&p| gene[p]).sum::<f64>() <= 1.0 + SLACK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RamDataProvider;
    use crate::network::{network_schema, NetworkData};
    use crate::types::indices;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn layout() -> GeneLayout {
        GeneLayout::from_schema(&network_schema(2, 2, 1)).unwrap()
    }

    #[test]
    fn test_layout_size_and_groups() {
        let layout = layout();
        // m_psi: 2*2*2*1, m_v: 2*2*1, m_phi: 2*2*1.
        assert_eq!(layout.len(), 8 + 4 + 4);
        // Groups drop rho: 4 + 2 + 2.
        assert_eq!(layout.groups().len(), 8);
        assert!(layout.groups().iter().all(|g| g.len() == 2));
        assert_eq!(layout.slot(0).unwrap().0, "m_psi");
        assert!(layout.slot(layout.len()).is_none());
    }

    #[test]
    fn test_normalize_scales_groups() {
        let layout = layout();
        let mut gene = vec![0.9; layout.len()];
        gene[0] = -1.0;
        gene[1] = f64::NAN;
        layout.normalize(&mut gene);
        assert!(layout.is_feasible(&gene));
        for group in layout.groups() {
            let sum: f64 = group.iter().map(|&p| gene[p]).sum();
            assert!(sum <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn test_random_and_crossover_are_feasible() {
        let layout = layout();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let a = layout.random(&mut rng);
        let b = layout.random(&mut rng);
        for group in layout.groups() {
            assert_abs_diff_eq!(group.iter().map(|&p| a[p]).sum::<f64>(), 1.0, epsilon = 1e-9);
        }
        let child = layout.crossover(&a, &b, 0.5, &mut rng);
        assert!(layout.is_feasible(&child));
        assert!(layout.is_feasible(&layout.crossover(&a, &b, 1.0, &mut rng)));
    }

    #[test]
    fn test_read_and_write_round_through_data() {
        let layout = layout();
        let ram = RamDataProvider::from_rows(&[
            ("nodes", &[], 2.0),
            ("virtualized_environments", &[], 2.0),
            ("structural_stability_intervals", &[], 1.0),
            ("m_phi", &[1, 0, 0], 0.3),
        ]);
        let mut data = NetworkData::from_provider(ram).unwrap();
        let gene = layout.read(&data).unwrap();
        let target = indices(&[("j", 1), ("rho", 0), ("l", 0)]);
        let p = (0..layout.len())
            .find(|&p| layout.slot(p) == Some(("m_phi", &target)))
            .unwrap();
        // Stored value survives, missing ones fall back to an equal share.
        assert_abs_diff_eq!(gene[p], 0.3);
        assert_abs_diff_eq!(gene[0], 0.5);

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let fresh = layout.random(&mut rng);
        layout.write(&fresh, &mut data).unwrap();
        for (read, written) in layout.read(&data).unwrap().iter().zip(&fresh) {
            assert_abs_diff_eq!(read, written, epsilon = 1e-12);
        }
        assert!(layout.write(&fresh[1..], &mut data).is_err());
    }
}
