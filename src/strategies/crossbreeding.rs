//! Reference crossbreeding strategies.

use super::traits::{continuous_value, inherit, metadata_or, CrossbreedingStrategy, Strategy};
use crate::error::{ClanTuneError, Result};
use crate::genetics::{Allele, Ancestry, Bounds};
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, RngCore};

/// Metadata key of the evolvable SBX distribution index.
pub const ETA_KEY: &str = "eta";

fn check_sources(strategy: &str, population: &[Allele], ancestry: &Ancestry) -> Result<()> {
    if population.len() != ancestry.len() {
        return Err(ClanTuneError::Precondition(format!(
            "{} received {} alleles for an ancestry of {}",
            strategy,
            population.len(),
            ancestry.len()
        )));
    }
    Ok(())
}

/// Offspring value is `Σ p·v` over the live parents. Continuous variants only.
#[derive(Debug, Clone, Default)]
pub struct WeightedAverage;

impl Strategy for WeightedAverage {
    fn name(&self) -> &'static str {
        "WeightedAverage"
    }
}

impl CrossbreedingStrategy for WeightedAverage {
    fn synthesize_allele(
        &self,
        template: &Allele,
        population: &[Allele],
        ancestry: &Ancestry,
        _rng: &mut dyn RngCore,
    ) -> Result<Allele> {
        continuous_value(self.name(), template)?;
        check_sources(self.name(), population, ancestry)?;

        let mut blended = 0.0;
        for index in ancestry.live_indices() {
            let value = continuous_value(self.name(), &population[index])?;
            blended += ancestry.probability(index) * value;
        }
        template.with_value(blended)
    }
}

/// Offspring copies the most probable parent; ties go to the lowest rank.
#[derive(Debug, Clone, Default)]
pub struct DominantParent;

impl Strategy for DominantParent {
    fn name(&self) -> &'static str {
        "DominantParent"
    }
}

impl CrossbreedingStrategy for DominantParent {
    fn synthesize_allele(
        &self,
        template: &Allele,
        population: &[Allele],
        ancestry: &Ancestry,
        _rng: &mut dyn RngCore,
    ) -> Result<Allele> {
        check_sources(self.name(), population, ancestry)?;

        let mut dominant: Option<(usize, f64)> = None;
        for (index, parent) in ancestry.iter().enumerate() {
            if parent.probability > dominant.map_or(0.0, |(_, best)| best) {
                dominant = Some((index, parent.probability));
            }
        }
        let (index, _) = dominant.ok_or_else(|| {
            ClanTuneError::Precondition(format!("{} found no live parent", self.name()))
        })?;
        inherit(template, &population[index])
    }
}

/// Simulated binary crossover between exactly two live parents.
///
/// The distribution index `eta` is read from the template's `"eta"` metadata,
/// falling back to the configured default. Larger `eta` keeps children closer to
/// their parents. Pair with [`super::ancestry::TopN`] of 2.
#[derive(Debug, Clone)]
pub struct SimulatedBinaryCrossover {
    eta: f64,
    use_metalearning: bool,
    eta_evolves: bool,
}

impl SimulatedBinaryCrossover {
    pub const ETA_DOMAIN: (f64, f64) = (2.0, 30.0);

    pub fn new(eta: f64, use_metalearning: bool) -> Result<Self> {
        if !(eta > 0.0 && eta.is_finite()) {
            return Err(ClanTuneError::InvalidParameter(format!(
                "eta must be positive, got {}",
                eta
            )));
        }
        Ok(Self {
            eta,
            use_metalearning,
            eta_evolves: true,
        })
    }

    /// Whether the injected eta allele itself takes part in mutation and crossbreeding.
    pub fn with_evolving_eta(mut self, eta_evolves: bool) -> Self {
        self.eta_evolves = eta_evolves;
        self
    }

    fn eta_allele(&self) -> Result<Allele> {
        let (min, max) = Self::ETA_DOMAIN;
        Ok(Allele::float(self.eta, Bounds::new(min, max))?
            .with_can_mutate(self.eta_evolves)
            .with_can_crossbreed(self.eta_evolves))
    }
}

impl Default for SimulatedBinaryCrossover {
    fn default() -> Self {
        Self {
            eta: 15.0,
            use_metalearning: false,
            eta_evolves: true,
        }
    }
}

impl Strategy for SimulatedBinaryCrossover {
    fn name(&self) -> &'static str {
        "SimulatedBinaryCrossover"
    }

    fn on_setup(&self, allele: Allele) -> Result<Allele> {
        if !self.use_metalearning {
            return Ok(allele);
        }
        Ok(allele.with_metadata(ETA_KEY, self.eta_allele()?))
    }
}

impl CrossbreedingStrategy for SimulatedBinaryCrossover {
    fn synthesize_allele(
        &self,
        template: &Allele,
        population: &[Allele],
        ancestry: &Ancestry,
        rng: &mut dyn RngCore,
    ) -> Result<Allele> {
        continuous_value(self.name(), template)?;
        check_sources(self.name(), population, ancestry)?;

        let live = ancestry.live_indices();
        if live.len() != 2 {
            return Err(ClanTuneError::Precondition(format!(
                "SimulatedBinaryCrossover requires exactly 2 live parents, got {}; pair with TopN(2) or num_parents = 2",
                live.len()
            )));
        }
        let eta = metadata_or(template, ETA_KEY, self.eta);
        let first = continuous_value(self.name(), &population[live[0]])?;
        let second = continuous_value(self.name(), &population[live[1]])?;

        let u: f64 = rng.gen();
        let beta = if u <= 0.5 {
            (2.0 * u).powf(1.0 / (eta + 1.0))
        } else {
            (1.0 / (2.0 * (1.0 - u))).powf(1.0 / (eta + 1.0))
        };

        let child = if rng.gen_bool(0.5) {
            0.5 * ((1.0 + beta) * first + (1.0 - beta) * second)
        } else {
            0.5 * ((1.0 - beta) * first + (1.0 + beta) * second)
        };
        template.with_value(child)
    }
}

/// Each position independently copies one parent drawn by ancestry weight.
#[derive(Debug, Clone, Default)]
pub struct StochasticCrossover;

impl Strategy for StochasticCrossover {
    fn name(&self) -> &'static str {
        "StochasticCrossover"
    }
}

impl CrossbreedingStrategy for StochasticCrossover {
    fn synthesize_allele(
        &self,
        template: &Allele,
        population: &[Allele],
        ancestry: &Ancestry,
        rng: &mut dyn RngCore,
    ) -> Result<Allele> {
        check_sources(self.name(), population, ancestry)?;
        let weights = WeightedIndex::new(ancestry.probabilities()).map_err(|error| {
            ClanTuneError::Precondition(format!("{} cannot sample ancestry: {}", self.name(), error))
        })?;
        inherit(template, &population[weights.sample(rng)])
    }
}
