use super::traits::{section_error, ConfigSection};
use crate::error::ClanTuneError;
use crate::strategies::ancestry::{
    BoltzmannSelection, EliteBreeds, RankSelection, TopN, TournamentSelection, DEFAULT_NUM_PARENTS,
};
use crate::strategies::AncestryStrategy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AncestryConfig {
    Tournament {
        #[serde(default = "default_tournament_size")]
        size: usize,
        #[serde(default = "default_tournament_rounds")]
        rounds: usize,
    },
    EliteBreeds {
        #[serde(default = "default_tier")]
        thrive: usize,
        #[serde(default = "default_tier")]
        die: usize,
    },
    Rank {
        #[serde(default = "default_one")]
        selection_pressure: f64,
        #[serde(default = "default_num_parents")]
        num_parents: Option<usize>,
    },
    Boltzmann {
        #[serde(default = "default_one")]
        temperature: f64,
        #[serde(default = "default_num_parents")]
        num_parents: Option<usize>,
    },
    TopN {
        n: usize,
        inner: Box<AncestryConfig>,
    },
}

fn default_tournament_size() -> usize {
    3
}

fn default_tournament_rounds() -> usize {
    7
}

fn default_tier() -> usize {
    2
}

fn default_one() -> f64 {
    1.0
}

fn default_num_parents() -> Option<usize> {
    Some(DEFAULT_NUM_PARENTS)
}

impl Default for AncestryConfig {
    fn default() -> Self {
        Self::Tournament {
            size: default_tournament_size(),
            rounds: default_tournament_rounds(),
        }
    }
}

impl AncestryConfig {
    /// Builds the strategy this section describes.
    pub fn build(&self) -> Result<Box<dyn AncestryStrategy>, ClanTuneError> {
        let strategy: Box<dyn AncestryStrategy> = match self {
            Self::Tournament { size, rounds } => {
                Box::new(TournamentSelection::new(*size, *rounds).map_err(section_error::<Self>)?)
            }
            Self::EliteBreeds { thrive, die } => {
                Box::new(EliteBreeds::new(*thrive, *die).map_err(section_error::<Self>)?)
            }
            Self::Rank {
                selection_pressure,
                num_parents,
            } => Box::new(
                RankSelection::new(*selection_pressure, *num_parents)
                    .map_err(section_error::<Self>)?,
            ),
            Self::Boltzmann {
                temperature,
                num_parents,
            } => Box::new(
                BoltzmannSelection::new(*temperature, *num_parents)
                    .map_err(section_error::<Self>)?,
            ),
            Self::TopN { n, inner } => {
                Box::new(TopN::new(*n, inner.build()?).map_err(section_error::<Self>)?)
            }
        };
        Ok(strategy)
    }
}

impl ConfigSection for AncestryConfig {
    fn section_name() -> &'static str {
        "ancestry"
    }

    fn validate(&self) -> Result<(), ClanTuneError> {
        self.build().map(|_| ())
    }
}
