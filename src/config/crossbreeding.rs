use super::traits::{section_error, ConfigSection};
use crate::error::ClanTuneError;
use crate::strategies::crossbreeding::{
    DominantParent, SimulatedBinaryCrossover, StochasticCrossover, WeightedAverage,
};
use crate::strategies::CrossbreedingStrategy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum CrossbreedingConfig {
    WeightedAverage,
    DominantParent,
    SimulatedBinary {
        #[serde(default = "default_eta")]
        eta: f64,
        #[serde(default)]
        use_metalearning: bool,
        #[serde(default = "default_true")]
        eta_evolves: bool,
    },
    Stochastic,
}

fn default_eta() -> f64 {
    15.0
}

fn default_true() -> bool {
    true
}

impl Default for CrossbreedingConfig {
    fn default() -> Self {
        Self::WeightedAverage
    }
}

impl CrossbreedingConfig {
    pub fn build(&self) -> Result<Box<dyn CrossbreedingStrategy>, ClanTuneError> {
        let strategy: Box<dyn CrossbreedingStrategy> = match self {
            Self::WeightedAverage => Box::new(WeightedAverage),
            Self::DominantParent => Box::new(DominantParent),
            Self::SimulatedBinary {
                eta,
                use_metalearning,
                eta_evolves,
            } => Box::new(
                SimulatedBinaryCrossover::new(*eta, *use_metalearning)
                    .map_err(section_error::<Self>)?
                    .with_evolving_eta(*eta_evolves),
            ),
            Self::Stochastic => Box::new(StochasticCrossover),
        };
        Ok(strategy)
    }
}

impl ConfigSection for CrossbreedingConfig {
    fn section_name() -> &'static str {
        "crossbreeding"
    }

    fn validate(&self) -> Result<(), ClanTuneError> {
        self.build().map(|_| ())
    }
}
