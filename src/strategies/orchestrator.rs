use super::traits::{AncestryStrategy, CrossbreedingStrategy, MutationStrategy};
use crate::error::Result;
use crate::genetics::Genome;
use log::debug;
use rand::RngCore;

/// Composes one strategy of each kind into a reproduction cycle:
/// ancestry → crossbreeding → mutation → lineage stamping.
pub struct StrategyOrchestrator {
    ancestry: Box<dyn AncestryStrategy>,
    crossbreeding: Box<dyn CrossbreedingStrategy>,
    mutation: Box<dyn MutationStrategy>,
}

impl StrategyOrchestrator {
    pub fn new(
        ancestry: Box<dyn AncestryStrategy>,
        crossbreeding: Box<dyn CrossbreedingStrategy>,
        mutation: Box<dyn MutationStrategy>,
    ) -> Self {
        Self {
            ancestry,
            crossbreeding,
            mutation,
        }
    }

    pub fn ancestry_strategy(&self) -> &dyn AncestryStrategy {
        self.ancestry.as_ref()
    }

    pub fn crossbreeding_strategy(&self) -> &dyn CrossbreedingStrategy {
        self.crossbreeding.as_ref()
    }

    pub fn mutation_strategy(&self) -> &dyn MutationStrategy {
        self.mutation.as_ref()
    }

    /// Chains the setup hooks of all three strategies, ancestry first.
    pub fn setup_genome(&self, genome: &Genome) -> Result<Genome> {
        let genome = self.ancestry.setup_genome(genome)?;
        let genome = self.crossbreeding.setup_genome(&genome)?;
        self.mutation.setup_genome(&genome)
    }

    /// Breeds one offspring for `me` from the scored `population`.
    ///
    /// The offspring has a fresh identity, no fitness, and the ancestry that was
    /// actually used to breed it.
    pub fn reproduce(
        &self,
        me: &Genome,
        population: &[Genome],
        rng: &mut dyn RngCore,
    ) -> Result<Genome> {
        let ancestry = self.ancestry.declare_ancestry(me, population, rng)?;
        debug!(
            "{} declared {} live parents for genome {}",
            self.ancestry.name(),
            ancestry.live_count(),
            me.id()
        );

        let child = self
            .crossbreeding
            .synthesize_genome(me, population, &ancestry, rng)?;
        debug!("{} synthesized genome {}", self.crossbreeding.name(), child.id());

        let child = self
            .mutation
            .perturb_genome(&child, population, &ancestry, rng)?;
        debug!("{} perturbed genome {}", self.mutation.name(), child.id());

        Ok(child.with_ancestry(ancestry))
    }

    /// One offspring per population member, in population order.
    pub fn reproduce_all(&self, population: &[Genome], rng: &mut dyn RngCore) -> Result<Vec<Genome>> {
        population
            .iter()
            .map(|me| self.reproduce(me, population, rng))
            .collect()
    }
}
