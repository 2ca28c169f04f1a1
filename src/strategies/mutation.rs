//! Reference mutation strategies.
//!
//! Additive perturbations act on the float backing of continuous alleles (so Int
//! alleles drift smoothly before rounding) and become multiplicative for
//! LogFloat alleles: `value * exp(noise)`.
//!
//! With `use_metalearning` on, setup injects the strategy's parameters as Float
//! alleles into every hyperparameter's metadata. The hooks read them back from
//! the flattened metadata and fall back to the configured defaults.

use super::traits::{continuous_value, metadata_or, unsupported, MutationStrategy, Strategy};
use crate::error::{ClanTuneError, Result};
use crate::genetics::{Allele, AlleleKind, Ancestry, Bounds, Domain};
use crate::types::Value;
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, RngCore};
use rand_distr::{Cauchy, Normal};
use serde::{Deserialize, Serialize};

pub const STD_KEY: &str = "std";
pub const SCALE_KEY: &str = "scale";
pub const CHANCE_KEY: &str = "mutation_chance";
pub const F_KEY: &str = "F";
pub const SAMPLING_MODE_KEY: &str = "sampling_mode";

fn check_chance(chance: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&chance) {
        return Err(ClanTuneError::InvalidParameter(format!(
            "mutation chance must be in [0, 1], got {}",
            chance
        )));
    }
    Ok(())
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if !(value > 0.0 && value.is_finite()) {
        return Err(ClanTuneError::InvalidParameter(format!(
            "{} must be positive, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Evolvable Float allele with both capability flags on.
fn meta_allele(value: f64, min: f64, max: f64) -> Result<Allele> {
    Allele::float(value, Bounds::new(min, max))
}

/// Applies additive `noise` to `raw`, in log space for LogFloat alleles.
fn displace(allele: &Allele, raw: f64, noise: f64) -> Result<Allele> {
    match allele.kind() {
        AlleleKind::LogFloat => allele.with_value(raw * noise.exp()),
        _ => allele.with_value(raw + noise),
    }
}

/// `value += N(0, std)` with probability `mutation_chance`.
#[derive(Debug, Clone)]
pub struct GaussianMutation {
    std: f64,
    mutation_chance: f64,
    use_metalearning: bool,
}

impl GaussianMutation {
    pub fn new(std: f64, mutation_chance: f64, use_metalearning: bool) -> Result<Self> {
        check_positive("std", std)?;
        check_chance(mutation_chance)?;
        Ok(Self {
            std,
            mutation_chance,
            use_metalearning,
        })
    }
}

impl Default for GaussianMutation {
    fn default() -> Self {
        Self {
            std: 0.1,
            mutation_chance: 0.15,
            use_metalearning: false,
        }
    }
}

impl Strategy for GaussianMutation {
    fn name(&self) -> &'static str {
        "GaussianMutation"
    }

    fn on_setup(&self, allele: Allele) -> Result<Allele> {
        if !self.use_metalearning {
            return Ok(allele);
        }
        Ok(allele.with_metadata_entries([
            (STD_KEY, meta_allele(self.std, 0.01 * self.std, 10.0 * self.std)?),
            (CHANCE_KEY, meta_allele(self.mutation_chance, 0.1, 0.5)?),
        ]))
    }
}

impl MutationStrategy for GaussianMutation {
    fn perturb_allele(
        &self,
        allele: &Allele,
        _population: &[Allele],
        _ancestry: &Ancestry,
        rng: &mut dyn RngCore,
    ) -> Result<Allele> {
        let raw = continuous_value(self.name(), allele)?;
        let std = metadata_or(allele, STD_KEY, self.std);
        let chance = metadata_or(allele, CHANCE_KEY, self.mutation_chance);

        if rng.gen::<f64>() > chance {
            return Ok(allele.clone());
        }
        let normal = Normal::new(0.0, std).map_err(|error| {
            ClanTuneError::InvalidParameter(format!("gaussian std {}: {}", std, error))
        })?;
        displace(allele, raw, normal.sample(rng))
    }
}

/// `value += Cauchy(0, scale)` with probability `mutation_chance`. The heavy tail
/// occasionally makes long jumps out of local optima.
#[derive(Debug, Clone)]
pub struct CauchyMutation {
    scale: f64,
    mutation_chance: f64,
    use_metalearning: bool,
}

impl CauchyMutation {
    pub fn new(scale: f64, mutation_chance: f64, use_metalearning: bool) -> Result<Self> {
        check_positive("scale", scale)?;
        check_chance(mutation_chance)?;
        Ok(Self {
            scale,
            mutation_chance,
            use_metalearning,
        })
    }
}

impl Default for CauchyMutation {
    fn default() -> Self {
        Self {
            scale: 0.1,
            mutation_chance: 0.15,
            use_metalearning: false,
        }
    }
}

impl Strategy for CauchyMutation {
    fn name(&self) -> &'static str {
        "CauchyMutation"
    }

    fn on_setup(&self, allele: Allele) -> Result<Allele> {
        if !self.use_metalearning {
            return Ok(allele);
        }
        Ok(allele.with_metadata_entries([
            (SCALE_KEY, meta_allele(self.scale, 0.01 * self.scale, 10.0 * self.scale)?),
            (CHANCE_KEY, meta_allele(self.mutation_chance, 0.1, 0.5)?),
        ]))
    }
}

impl MutationStrategy for CauchyMutation {
    fn perturb_allele(
        &self,
        allele: &Allele,
        _population: &[Allele],
        _ancestry: &Ancestry,
        rng: &mut dyn RngCore,
    ) -> Result<Allele> {
        let raw = continuous_value(self.name(), allele)?;
        let scale = metadata_or(allele, SCALE_KEY, self.scale);
        let chance = metadata_or(allele, CHANCE_KEY, self.mutation_chance);

        if rng.gen::<f64>() > chance {
            return Ok(allele.clone());
        }
        let cauchy = Cauchy::new(0.0, scale).map_err(|error| {
            ClanTuneError::InvalidParameter(format!("cauchy scale {}: {}", scale, error))
        })?;
        displace(allele, raw, cauchy.sample(rng))
    }
}

/// How differential evolution draws its difference pair from the live members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    #[default]
    #[serde(alias = "random")]
    Uniform,
    Weighted,
}

impl SamplingMode {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "uniform" | "random" => Some(SamplingMode::Uniform),
            "weighted" => Some(SamplingMode::Weighted),
            _ => None,
        }
    }
}

/// `value += F·(v1 − v2)` for two distinct live members `v1`, `v2`.
///
/// Needs at least three live members. For LogFloat alleles the step is
/// `value · (v1 / v2)^F`. The sampling mode can be overridden per allele with a
/// raw `"sampling_mode"` metadata entry.
#[derive(Debug, Clone)]
pub struct DifferentialEvolution {
    f: f64,
    sampling_mode: SamplingMode,
    use_metalearning: bool,
}

impl DifferentialEvolution {
    pub fn new(f: f64, sampling_mode: SamplingMode, use_metalearning: bool) -> Result<Self> {
        check_positive("F", f)?;
        Ok(Self {
            f,
            sampling_mode,
            use_metalearning,
        })
    }

    fn sampling_mode_for(&self, allele: &Allele) -> Result<SamplingMode> {
        let Some(entry) = allele.metadata_entry(SAMPLING_MODE_KEY) else {
            return Ok(self.sampling_mode);
        };
        let value = entry.value();
        value
            .as_str()
            .and_then(SamplingMode::parse)
            .ok_or_else(|| {
                ClanTuneError::InvalidParameter(format!(
                    "unknown sampling mode {}, expected \"uniform\" or \"weighted\"",
                    value
                ))
            })
    }

    /// Two distinct positions into `live`.
    fn sample_pair(
        mode: SamplingMode,
        live: &[usize],
        ancestry: &Ancestry,
        rng: &mut dyn RngCore,
    ) -> Result<(usize, usize)> {
        match mode {
            SamplingMode::Uniform => {
                let first = rng.gen_range(0..live.len());
                let mut second = rng.gen_range(0..live.len() - 1);
                if second >= first {
                    second += 1;
                }
                Ok((first, second))
            }
            SamplingMode::Weighted => {
                let mut weights: Vec<f64> =
                    live.iter().map(|&index| ancestry.probability(index)).collect();
                let first = weighted_pick(&weights, rng)?;
                weights[first] = 0.0;
                let second = weighted_pick(&weights, rng)?;
                Ok((first, second))
            }
        }
    }
}

fn weighted_pick(weights: &[f64], rng: &mut dyn RngCore) -> Result<usize> {
    let distribution: WeightedIndex<f64> = WeightedIndex::new(weights).map_err(|error| {
        ClanTuneError::Precondition(format!("cannot sample live members: {}", error))
    })?;
    Ok(distribution.sample(rng))
}

impl Default for DifferentialEvolution {
    fn default() -> Self {
        Self {
            f: 0.8,
            sampling_mode: SamplingMode::Uniform,
            use_metalearning: false,
        }
    }
}

impl Strategy for DifferentialEvolution {
    fn name(&self) -> &'static str {
        "DifferentialEvolution"
    }

    fn on_setup(&self, allele: Allele) -> Result<Allele> {
        if !self.use_metalearning {
            return Ok(allele);
        }
        Ok(allele.with_metadata(F_KEY, meta_allele(self.f, 0.5, 2.0)?))
    }
}

impl MutationStrategy for DifferentialEvolution {
    fn perturb_allele(
        &self,
        allele: &Allele,
        population: &[Allele],
        ancestry: &Ancestry,
        rng: &mut dyn RngCore,
    ) -> Result<Allele> {
        let raw = continuous_value(self.name(), allele)?;
        let f = metadata_or(allele, F_KEY, self.f);
        let mode = self.sampling_mode_for(allele)?;

        let live: Vec<usize> = ancestry
            .live_indices()
            .into_iter()
            .filter(|&index| index < population.len())
            .collect();
        if live.len() < 3 {
            return Err(ClanTuneError::Precondition(format!(
                "DifferentialEvolution requires at least 3 live population members, got {}",
                live.len()
            )));
        }

        let (first, second) = Self::sample_pair(mode, &live, ancestry, rng)?;
        let v1 = continuous_value(self.name(), &population[live[first]])?;
        let v2 = continuous_value(self.name(), &population[live[second]])?;

        match allele.kind() {
            AlleleKind::LogFloat => allele.with_value(raw * (v1 / v2).powf(f)),
            _ => allele.with_value(raw + f * (v1 - v2)),
        }
    }
}

/// Resamples the value uniformly from its domain with probability
/// `mutation_chance`. LogFloat alleles sample uniformly in log space; Bool and
/// String alleles draw from their choices.
#[derive(Debug, Clone)]
pub struct UniformMutation {
    mutation_chance: f64,
    use_metalearning: bool,
}

impl UniformMutation {
    pub fn new(mutation_chance: f64, use_metalearning: bool) -> Result<Self> {
        check_chance(mutation_chance)?;
        Ok(Self {
            mutation_chance,
            use_metalearning,
        })
    }
}

impl Default for UniformMutation {
    fn default() -> Self {
        Self {
            mutation_chance: 0.1,
            use_metalearning: false,
        }
    }
}

impl Strategy for UniformMutation {
    fn name(&self) -> &'static str {
        "UniformMutation"
    }

    fn on_setup(&self, allele: Allele) -> Result<Allele> {
        if !self.use_metalearning {
            return Ok(allele);
        }
        Ok(allele.with_metadata(CHANCE_KEY, meta_allele(self.mutation_chance, 0.01, 0.3)?))
    }
}

impl MutationStrategy for UniformMutation {
    fn perturb_allele(
        &self,
        allele: &Allele,
        _population: &[Allele],
        _ancestry: &Ancestry,
        rng: &mut dyn RngCore,
    ) -> Result<Allele> {
        // Checked before the roll.
        let target = match allele.domain() {
            Domain::Continuous(bounds) => {
                let (min, max) = bounds.span().ok_or_else(|| {
                    ClanTuneError::Precondition(format!(
                        "{} needs a closed domain, {} has bounds {:?}",
                        self.name(),
                        allele,
                        bounds
                    ))
                })?;
                ResampleTarget::Range { min, max }
            }
            Domain::Discrete(choices) if choices.is_empty() => {
                return Err(unsupported(self.name(), allele.kind()));
            }
            Domain::Discrete(choices) => ResampleTarget::Choices(choices),
        };

        let chance = metadata_or(allele, CHANCE_KEY, self.mutation_chance);
        if rng.gen::<f64>() > chance {
            return Ok(allele.clone());
        }

        match target {
            ResampleTarget::Range { min, max } => {
                let r: f64 = rng.gen();
                let value = match allele.kind() {
                    AlleleKind::LogFloat => {
                        let (low, high) = (min.ln(), max.ln());
                        (low + r * (high - low)).exp()
                    }
                    _ => min + r * (max - min),
                };
                allele.with_value(value)
            }
            ResampleTarget::Choices(choices) => {
                let pick = rng.gen_range(0..choices.len());
                allele.with_value(choices[pick].clone())
            }
        }
    }
}

enum ResampleTarget {
    Range { min: f64, max: f64 },
    Choices(Vec<Value>),
}
