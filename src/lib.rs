//! Reproduction engine for population-based hyperparameter evolution.
//!
//! Given a scored population of [`genetics::Genome`]s, a
//! [`strategies::StrategyOrchestrator`] decides who reproduces (ancestry),
//! synthesizes new allele values from the selected parents (crossbreeding) and
//! perturbs the result (mutation).

pub mod config;
pub mod error;
pub mod genetics;
pub mod strategies;
pub mod types;

pub use error::{ClanTuneError, Result};
