use crate::error::{ClanTuneError, Result};
use crate::genetics::ancestry::Ancestry;
use crate::genetics::tree;
use crate::genetics::{Allele, AlleleKind, Genome};
use rand::RngCore;
use std::collections::BTreeMap;

/// Behaviour shared by every reproduction strategy.
pub trait Strategy {
    /// Name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Called once per top-level allele of a freshly built genome. Overridden to
    /// inject metalearning alleles into metadata; must never touch the value.
    fn on_setup(&self, allele: Allele) -> Result<Allele> {
        Ok(allele)
    }

    /// Runs [`Strategy::on_setup`] over every hyperparameter of `genome`.
    fn setup_genome(&self, genome: &Genome) -> Result<Genome> {
        let mut alleles = BTreeMap::new();
        for (name, allele) in genome.alleles() {
            let prepared = self.on_setup(allele.clone())?;
            let unchanged = prepared.kind() == allele.kind()
                && prepared.numeric() == allele.numeric()
                && prepared.value() == allele.value();
            if !unchanged {
                return Err(ClanTuneError::Precondition(format!(
                    "{} setup changed the value of '{}' from {} to {}",
                    self.name(),
                    name,
                    allele,
                    prepared
                )));
            }
            alleles.insert(name.clone(), prepared);
        }
        Ok(genome.with_alleles(alleles))
    }
}

/// Declares reproduction weights over a scored population. Never reads alleles.
pub trait AncestryStrategy: Strategy {
    /// Returns one probability per population member, in rank order.
    fn select_ancestry(
        &self,
        me: &Genome,
        population: &[Genome],
        rng: &mut dyn RngCore,
    ) -> Result<Ancestry>;

    /// Checks preconditions, selects, then validates the declared distribution.
    fn declare_ancestry(
        &self,
        me: &Genome,
        population: &[Genome],
        rng: &mut dyn RngCore,
    ) -> Result<Ancestry> {
        fitnesses(population)?;
        if me.rank_in(population).is_none() {
            return Err(ClanTuneError::Precondition(format!(
                "genome {} is not a member of the population",
                me.id()
            )));
        }

        let ancestry = self.select_ancestry(me, population, rng)?;
        ancestry.validate(population)?;
        Ok(ancestry)
    }
}

/// Interprets an ancestry distribution into new allele values.
pub trait CrossbreedingStrategy: Strategy {
    /// Produces one allele from the population's alleles at a single position.
    /// Members with probability `0.0` must not contribute.
    fn synthesize_allele(
        &self,
        template: &Allele,
        population: &[Allele],
        ancestry: &Ancestry,
        rng: &mut dyn RngCore,
    ) -> Result<Allele>;

    /// Synthesizes every crossbreedable position of `me` from `population`.
    fn synthesize_genome(
        &self,
        me: &Genome,
        population: &[Genome],
        ancestry: &Ancestry,
        rng: &mut dyn RngCore,
    ) -> Result<Genome> {
        me.synthesize_from(
            population,
            |template, sources| self.synthesize_allele(template, sources, ancestry, rng),
            tree::can_crossbreed,
        )
    }
}

/// Perturbs allele values. Population and ancestry are available for
/// population-aware schemes.
pub trait MutationStrategy: Strategy {
    fn perturb_allele(
        &self,
        allele: &Allele,
        population: &[Allele],
        ancestry: &Ancestry,
        rng: &mut dyn RngCore,
    ) -> Result<Allele>;

    /// Perturbs every mutable position of `genome`. The genome's own ancestry is
    /// carried over untouched.
    fn perturb_genome(
        &self,
        genome: &Genome,
        population: &[Genome],
        ancestry: &Ancestry,
        rng: &mut dyn RngCore,
    ) -> Result<Genome> {
        // The genome joins the population as the synthesis template and is
        // dropped again before the hook sees the sources.
        let mut extended = population.to_vec();
        extended.push(genome.clone());

        let mutated = genome.synthesize_from(
            &extended,
            |allele, sources| {
                let population = &sources[..sources.len() - 1];
                self.perturb_allele(allele, population, ancestry, rng)
            },
            tree::can_mutate,
        )?;

        Ok(match genome.ancestry() {
            Some(lineage) => mutated.with_ancestry(lineage.clone()),
            None => mutated,
        })
    }
}

/// Fitness of every member, failing on the first unscored one.
pub(crate) fn fitnesses(population: &[Genome]) -> Result<Vec<f64>> {
    if population.is_empty() {
        return Err(ClanTuneError::Precondition(
            "population is empty".to_string(),
        ));
    }
    population
        .iter()
        .map(|genome| match genome.fitness() {
            Some(fitness) if !fitness.is_nan() => Ok(fitness),
            Some(_) => Err(ClanTuneError::Precondition(format!(
                "genome {} has NaN fitness",
                genome.id()
            ))),
            None => Err(ClanTuneError::Precondition(format!(
                "genome {} has no fitness; every member must be scored before selection",
                genome.id()
            ))),
        })
        .collect()
}

/// Population indices ordered best (lowest fitness) first; ties keep rank order.
pub(crate) fn ranking(fitnesses: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..fitnesses.len()).collect();
    order.sort_by(|&a, &b| fitnesses[a].total_cmp(&fitnesses[b]));
    order
}

/// Float backing of a continuous allele, or `UnsupportedVariant`.
pub(crate) fn continuous_value(strategy: &str, allele: &Allele) -> Result<f64> {
    allele
        .numeric()
        .ok_or_else(|| unsupported(strategy, allele.kind()))
}

pub(crate) fn unsupported(strategy: &str, kind: AlleleKind) -> ClanTuneError {
    ClanTuneError::UnsupportedVariant {
        strategy: strategy.to_string(),
        variant: kind.to_string(),
    }
}

/// Numeric metadata entry, or `default` when the key is absent.
pub(crate) fn metadata_or(allele: &Allele, key: &str, default: f64) -> f64 {
    allele.metadata_f64(key).unwrap_or(default)
}

/// `template` carrying `source`'s value; continuous variants copy the unrounded backing.
pub(crate) fn inherit(template: &Allele, source: &Allele) -> Result<Allele> {
    match source.numeric() {
        Some(raw) => template.with_value(raw),
        None => template.with_value(source.value()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genetics::{AlleleParams, Bounds};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Passthrough;

    impl Strategy for Passthrough {
        fn name(&self) -> &'static str {
            "Passthrough"
        }
    }

    struct Tamper;

    impl Strategy for Tamper {
        fn name(&self) -> &'static str {
            "Tamper"
        }

        fn on_setup(&self, allele: Allele) -> Result<Allele> {
            allele.with_value(allele.numeric().unwrap_or(0.0) + 1.0)
        }
    }

    struct SelfOnly;

    impl Strategy for SelfOnly {
        fn name(&self) -> &'static str {
            "SelfOnly"
        }
    }

    impl AncestryStrategy for SelfOnly {
        fn select_ancestry(
            &self,
            me: &Genome,
            population: &[Genome],
            _rng: &mut dyn RngCore,
        ) -> Result<Ancestry> {
            let probabilities: Vec<f64> = population
                .iter()
                .map(|member| if member.id() == me.id() { 1.0 } else { 0.0 })
                .collect();
            Ancestry::from_probabilities(&probabilities, population)
        }
    }

    struct Halves;

    impl Strategy for Halves {
        fn name(&self) -> &'static str {
            "Halves"
        }
    }

    impl AncestryStrategy for Halves {
        fn select_ancestry(
            &self,
            _me: &Genome,
            population: &[Genome],
            _rng: &mut dyn RngCore,
        ) -> Result<Ancestry> {
            Ancestry::from_probabilities(&vec![0.5; population.len()], population)
        }
    }

    struct CountSources;

    impl Strategy for CountSources {
        fn name(&self) -> &'static str {
            "CountSources"
        }
    }

    impl MutationStrategy for CountSources {
        fn perturb_allele(
            &self,
            allele: &Allele,
            population: &[Allele],
            _ancestry: &Ancestry,
            _rng: &mut dyn RngCore,
        ) -> Result<Allele> {
            allele.with_value(population.len() as f64)
        }
    }

    fn scored(value: f64, fitness: f64) -> Genome {
        Genome::new()
            .add_hyperparameter("x", value, AlleleKind::Float, AlleleParams::new())
            .unwrap()
            .set_fitness(fitness)
    }

    #[test]
    fn test_default_setup_is_identity() {
        let genome = scored(1.0, 0.0);
        let prepared = Passthrough.setup_genome(&genome).unwrap();
        assert_eq!(prepared.alleles(), genome.alleles());
    }

    #[test]
    fn test_setup_must_not_change_values() {
        let genome = scored(1.0, 0.0);
        assert!(matches!(
            Tamper.setup_genome(&genome),
            Err(ClanTuneError::Precondition(_))
        ));
    }

    #[test]
    fn test_declare_requires_fitness() {
        let population = vec![scored(1.0, 0.5), Genome::new()];
        let mut rng = StdRng::seed_from_u64(1);
        let result = SelfOnly.declare_ancestry(&population[0], &population, &mut rng);
        assert!(matches!(result, Err(ClanTuneError::Precondition(_))));
    }

    #[test]
    fn test_declare_requires_membership() {
        let population = vec![scored(1.0, 0.5), scored(2.0, 0.7)];
        let outsider = scored(3.0, 0.1);
        let mut rng = StdRng::seed_from_u64(1);
        let result = SelfOnly.declare_ancestry(&outsider, &population, &mut rng);
        assert!(matches!(result, Err(ClanTuneError::Precondition(_))));
    }

    #[test]
    fn test_declare_rejects_distribution_not_summing_to_one() {
        let population = vec![scored(1.0, 0.5), scored(2.0, 0.7), scored(3.0, 0.9)];
        let mut rng = StdRng::seed_from_u64(1);
        let result = Halves.declare_ancestry(&population[0], &population, &mut rng);
        assert!(matches!(result, Err(ClanTuneError::Precondition(_))));
    }

    #[test]
    fn test_perturb_hides_genome_from_population_and_keeps_lineage() {
        let population = vec![scored(1.0, 0.5), scored(2.0, 0.7)];
        let mut rng = StdRng::seed_from_u64(1);
        let ancestry = SelfOnly
            .declare_ancestry(&population[0], &population, &mut rng)
            .unwrap();
        let child = population[0].with_ancestry(ancestry.clone());

        let mutated = CountSources
            .perturb_genome(&child, &population, &ancestry, &mut rng)
            .unwrap();
        assert_eq!(mutated.allele("x").unwrap().numeric(), Some(2.0));
        assert_eq!(mutated.ancestry(), Some(&ancestry));
    }

    #[test]
    fn test_inherit_keeps_int_backing() {
        let template = Allele::int(1.0, Bounds::unbounded()).unwrap();
        let source = Allele::int(3.4, Bounds::unbounded()).unwrap();
        assert_eq!(inherit(&template, &source).unwrap().numeric(), Some(3.4));
    }

    #[test]
    fn test_ranking_is_stable() {
        assert_eq!(ranking(&[0.5, 0.1, 0.5, 0.0]), vec![3, 1, 0, 2]);
    }
}
