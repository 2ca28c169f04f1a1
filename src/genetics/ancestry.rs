use super::genome::Genome;
use crate::error::{ClanTuneError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Allowed drift of a distribution's total away from 1.0.
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// One entry of an ancestry distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parent {
    pub probability: f64,
    pub id: Uuid,
}

/// Rank-aligned reproduction weights over a population.
///
/// Entry `i` belongs to `population[i]`. A probability of exactly `0.0` excludes
/// that member from every downstream consumer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ancestry(Vec<Parent>);

impl Ancestry {
    pub fn new(parents: Vec<Parent>) -> Self {
        Self(parents)
    }

    /// Pairs `probabilities[i]` with `population[i]`'s id.
    pub fn from_probabilities(probabilities: &[f64], population: &[Genome]) -> Result<Self> {
        if probabilities.len() != population.len() {
            return Err(ClanTuneError::Precondition(format!(
                "ancestry has {} entries for a population of {}",
                probabilities.len(),
                population.len()
            )));
        }
        Ok(Self(
            probabilities
                .iter()
                .zip(population)
                .map(|(&probability, genome)| Parent {
                    probability,
                    id: genome.id(),
                })
                .collect(),
        ))
    }

    pub fn parents(&self) -> &[Parent] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parent> {
        self.0.iter()
    }

    pub fn probabilities(&self) -> Vec<f64> {
        self.0.iter().map(|parent| parent.probability).collect()
    }

    /// Probability at `index`, `0.0` past the end.
    pub fn probability(&self, index: usize) -> f64 {
        self.0.get(index).map_or(0.0, |parent| parent.probability)
    }

    /// Indices of entries with non-zero probability, in rank order.
    pub fn live_indices(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, parent)| parent.probability > 0.0)
            .map(|(index, _)| index)
            .collect()
    }

    pub fn live_count(&self) -> usize {
        self.0.iter().filter(|parent| parent.probability > 0.0).count()
    }

    pub fn total(&self) -> f64 {
        self.0.iter().map(|parent| parent.probability).sum()
    }

    /// Checks rank alignment with `population` and that the probabilities form a
    /// distribution: finite, non-negative and summing to 1.0.
    pub fn validate(&self, population: &[Genome]) -> Result<()> {
        if self.0.len() != population.len() {
            return Err(ClanTuneError::Precondition(format!(
                "ancestry has {} entries for a population of {}",
                self.0.len(),
                population.len()
            )));
        }

        for (rank, (parent, genome)) in self.0.iter().zip(population).enumerate() {
            if parent.id != genome.id() {
                return Err(ClanTuneError::Precondition(format!(
                    "ancestry entry {} names {} but population member {} is {}",
                    rank,
                    parent.id,
                    rank,
                    genome.id()
                )));
            }
            if !parent.probability.is_finite() || parent.probability < 0.0 {
                return Err(ClanTuneError::Precondition(format!(
                    "ancestry entry {} has invalid probability {}",
                    rank, parent.probability
                )));
            }
        }

        let total = self.total();
        if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(ClanTuneError::Precondition(format!(
                "ancestry probabilities sum to {}, expected 1.0",
                total
            )));
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Ancestry {
    type Item = &'a Parent;
    type IntoIter = std::slice::Iter<'a, Parent>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
