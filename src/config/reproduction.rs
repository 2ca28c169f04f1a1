use super::ancestry::AncestryConfig;
use super::crossbreeding::CrossbreedingConfig;
use super::mutation::MutationConfig;
use super::traits::ConfigSection;
use crate::error::ClanTuneError;
use crate::strategies::StrategyOrchestrator;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// A complete reproduction pipeline: one strategy of each kind plus the seed of
/// the random source they share.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReproductionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default)]
    pub ancestry: AncestryConfig,
    #[serde(default)]
    pub crossbreeding: CrossbreedingConfig,
    #[serde(default)]
    pub mutation: MutationConfig,
}

impl ReproductionConfig {
    pub fn validate(&self) -> Result<(), ClanTuneError> {
        self.ancestry.validate()?;
        self.crossbreeding.validate()?;
        self.mutation.validate()?;
        Ok(())
    }

    pub fn build_orchestrator(&self) -> Result<StrategyOrchestrator, ClanTuneError> {
        Ok(StrategyOrchestrator::new(
            self.ancestry.build()?,
            self.crossbreeding.build()?,
            self.mutation.build()?,
        ))
    }

    /// Seeded generator when `seed` is set, entropy-seeded otherwise.
    pub fn build_rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}
