use super::traits::{section_error, ConfigSection};
use crate::error::ClanTuneError;
use crate::strategies::mutation::{
    CauchyMutation, DifferentialEvolution, GaussianMutation, SamplingMode, UniformMutation,
};
use crate::strategies::MutationStrategy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum MutationConfig {
    Gaussian {
        #[serde(default = "default_magnitude")]
        std: f64,
        #[serde(default = "default_chance")]
        mutation_chance: f64,
        #[serde(default)]
        use_metalearning: bool,
    },
    Cauchy {
        #[serde(default = "default_magnitude")]
        scale: f64,
        #[serde(default = "default_chance")]
        mutation_chance: f64,
        #[serde(default)]
        use_metalearning: bool,
    },
    DifferentialEvolution {
        #[serde(default = "default_f", alias = "F")]
        f: f64,
        #[serde(default)]
        sampling_mode: SamplingMode,
        #[serde(default)]
        use_metalearning: bool,
    },
    Uniform {
        #[serde(default = "default_uniform_chance")]
        mutation_chance: f64,
        #[serde(default)]
        use_metalearning: bool,
    },
}

fn default_magnitude() -> f64 {
    0.1
}

fn default_chance() -> f64 {
    0.15
}

fn default_f() -> f64 {
    0.8
}

fn default_uniform_chance() -> f64 {
    0.1
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self::Gaussian {
            std: default_magnitude(),
            mutation_chance: default_chance(),
            use_metalearning: false,
        }
    }
}

impl MutationConfig {
    pub fn build(&self) -> Result<Box<dyn MutationStrategy>, ClanTuneError> {
        let strategy: Box<dyn MutationStrategy> = match self {
            Self::Gaussian {
                std,
                mutation_chance,
                use_metalearning,
            } => Box::new(
                GaussianMutation::new(*std, *mutation_chance, *use_metalearning)
                    .map_err(section_error::<Self>)?,
            ),
            Self::Cauchy {
                scale,
                mutation_chance,
                use_metalearning,
            } => Box::new(
                CauchyMutation::new(*scale, *mutation_chance, *use_metalearning)
                    .map_err(section_error::<Self>)?,
            ),
            Self::DifferentialEvolution {
                f,
                sampling_mode,
                use_metalearning,
            } => Box::new(
                DifferentialEvolution::new(*f, *sampling_mode, *use_metalearning)
                    .map_err(section_error::<Self>)?,
            ),
            Self::Uniform {
                mutation_chance,
                use_metalearning,
            } => Box::new(
                UniformMutation::new(*mutation_chance, *use_metalearning)
                    .map_err(section_error::<Self>)?,
            ),
        };
        Ok(strategy)
    }
}

impl ConfigSection for MutationConfig {
    fn section_name() -> &'static str {
        "mutation"
    }

    fn validate(&self) -> Result<(), ClanTuneError> {
        self.build().map(|_| ())
    }
}
