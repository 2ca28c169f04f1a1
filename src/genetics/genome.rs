//! Genome: one candidate configuration in a population.
//!
//! A genome is a named set of top-level allele trees (one per tracked
//! hyperparameter) plus three pieces of bookkeeping:
//! - `id`: identity, kept across copies unless a structural change resets it
//! - `ancestry`: the distribution this genome was bred from, if any
//! - `fitness`: assigned by the external evaluator, lower is better
//!
//! All tree work is delegated to [`crate::genetics::tree`]. Every structural
//! change returns a new genome with a new identity; [`Genome::with_id`] is the
//! explicit override.
//!
//! # Example
//!
//! ```
//! use clantune::genetics::{AlleleKind, AlleleParams, Bounds, Domain, Genome};
//! use clantune::types::Value;
//!
//! let genome = Genome::new()
//!     .add_hyperparameter(
//!         "lr",
//!         0.01,
//!         AlleleKind::LogFloat,
//!         AlleleParams::new().domain(Domain::Continuous(Bounds::new(1e-5, 1.0))),
//!     )
//!     .unwrap();
//!
//! assert_eq!(genome.as_hyperparameters()["lr"], Value::Float(0.01));
//! ```

use super::alleles::{Allele, AlleleKind, Domain, Metadata, Metadatum};
use super::ancestry::Ancestry;
use super::tree::{self, Walk};
use crate::error::{ClanTuneError, Result};
use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Everything besides name, value and variant that `add_hyperparameter` accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct AlleleParams {
    pub domain: Option<Domain>,
    pub can_mutate: bool,
    pub can_crossbreed: bool,
    pub metadata: Metadata,
}

impl Default for AlleleParams {
    fn default() -> Self {
        Self {
            domain: None,
            can_mutate: true,
            can_crossbreed: true,
            metadata: Metadata::new(),
        }
    }
}

impl AlleleParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn domain(mut self, domain: Domain) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn can_mutate(mut self, can_mutate: bool) -> Self {
        self.can_mutate = can_mutate;
        self
    }

    pub fn can_crossbreed(mut self, can_crossbreed: bool) -> Self {
        self.can_crossbreed = can_crossbreed;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, entry: impl Into<Metadatum>) -> Self {
        self.metadata.insert(key.into(), entry.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "GenomeRecord", into = "GenomeRecord")]
pub struct Genome {
    id: Uuid,
    alleles: BTreeMap<String, Allele>,
    ancestry: Option<Ancestry>,
    fitness: Option<f64>,
}

impl Default for Genome {
    fn default() -> Self {
        Self::new()
    }
}

impl Genome {
    /// Empty genome with a fresh identity, no lineage and no fitness.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            alleles: BTreeMap::new(),
            ancestry: None,
            fitness: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn alleles(&self) -> &BTreeMap<String, Allele> {
        &self.alleles
    }

    pub fn allele(&self, name: &str) -> Option<&Allele> {
        self.alleles.get(name)
    }

    pub fn ancestry(&self) -> Option<&Ancestry> {
        self.ancestry.as_ref()
    }

    pub fn fitness(&self) -> Option<f64> {
        self.fitness
    }

    /// Same genome under the given identity.
    pub fn with_id(&self, id: Uuid) -> Self {
        Self {
            id,
            ..self.clone()
        }
    }

    pub fn with_alleles(&self, alleles: BTreeMap<String, Allele>) -> Self {
        Self {
            id: Uuid::new_v4(),
            alleles,
            ancestry: self.ancestry.clone(),
            fitness: self.fitness,
        }
    }

    pub fn with_ancestry(&self, ancestry: Ancestry) -> Self {
        Self {
            id: Uuid::new_v4(),
            alleles: self.alleles.clone(),
            ancestry: Some(ancestry),
            fitness: self.fitness,
        }
    }

    /// Records an evaluation result. Identity is kept: fitness is not structural.
    pub fn set_fitness(&self, fitness: f64) -> Self {
        Self {
            fitness: Some(fitness),
            ..self.clone()
        }
    }

    pub fn with_fitness(self, fitness: f64) -> Self {
        Self {
            fitness: Some(fitness),
            ..self
        }
    }

    /// Adds a hyperparameter built from a value, a variant and its parameters.
    pub fn add_hyperparameter(
        &self,
        name: impl Into<String>,
        value: impl Into<Value>,
        kind: AlleleKind,
        params: AlleleParams,
    ) -> Result<Self> {
        let allele = Allele::new(kind, value.into(), params.domain)?
            .with_can_mutate(params.can_mutate)
            .with_can_crossbreed(params.can_crossbreed)
            .with_metadata_entries(params.metadata);
        self.add_allele(name, allele)
    }

    /// Adds a pre-built allele tree under `name`.
    pub fn add_allele(&self, name: impl Into<String>, allele: Allele) -> Result<Self> {
        let name = name.into();
        if self.alleles.contains_key(&name) {
            return Err(ClanTuneError::Precondition(format!(
                "hyperparameter '{}' already exists",
                name
            )));
        }
        let mut alleles = self.alleles.clone();
        alleles.insert(name, allele);
        Ok(self.with_alleles(alleles))
    }

    /// Scalar projection consumed by the training layer; tree structure is dropped.
    pub fn as_hyperparameters(&self) -> BTreeMap<String, Value> {
        self.alleles
            .iter()
            .map(|(name, allele)| (name.clone(), allele.value()))
            .collect()
    }

    /// Position of this genome in `population`, matched by id.
    pub fn rank_in(&self, population: &[Genome]) -> Option<usize> {
        population.iter().position(|member| member.id == self.id)
    }

    /// Rebuilds every hyperparameter tree through `handler`.
    ///
    /// The handler receives each admitted node flattened, children first; extra
    /// context is whatever the closure captures. The result has a new identity
    /// and carries neither ancestry nor fitness.
    pub fn update_alleles<H, P>(&self, mut handler: H, include_if: P) -> Result<Self>
    where
        H: FnMut(&Allele) -> Result<Allele>,
        P: Fn(&Allele) -> bool,
    {
        let mut alleles = BTreeMap::new();
        for (name, allele) in &self.alleles {
            let updated = tree::synthesize_rooted(
                name,
                allele,
                &[allele],
                |template: &Allele, _sources: &[Allele]| handler(template),
                &include_if,
            )?;
            alleles.insert(name.clone(), updated);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            alleles,
            ancestry: None,
            fitness: None,
        })
    }

    /// Builds a genome whose every hyperparameter is synthesized from the
    /// population, with this genome's trees as templates.
    ///
    /// This genome must be a member of `population`, and every member must carry
    /// exactly the same hyperparameter names.
    pub fn synthesize_from<H, P>(&self, population: &[Genome], mut handler: H, include_if: P) -> Result<Self>
    where
        H: FnMut(&Allele, &[Allele]) -> Result<Allele>,
        P: Fn(&Allele) -> bool,
    {
        if self.rank_in(population).is_none() {
            return Err(ClanTuneError::Precondition(format!(
                "genome {} is not a member of the population",
                self.id
            )));
        }
        check_same_names(population)?;

        let mut alleles = BTreeMap::new();
        for (name, template) in &self.alleles {
            let sources = population
                .iter()
                .map(|member| {
                    member.alleles.get(name).ok_or_else(|| {
                        ClanTuneError::Precondition(format!(
                            "genome {} lacks hyperparameter '{}'",
                            member.id, name
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let synthesized =
                tree::synthesize_rooted(name, template, &sources, &mut handler, &include_if)?;
            alleles.insert(name.clone(), synthesized);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            alleles,
            ancestry: None,
            fitness: None,
        })
    }

    /// Walks this genome's hyperparameters in name order.
    pub fn walk<'a, T, H, P>(&'a self, handler: H, include_if: P) -> Result<Walk<'a, T, H, P>>
    where
        H: FnMut(&[Allele]) -> Option<T>,
        P: Fn(&Allele) -> bool,
    {
        Self::walk_population(std::slice::from_ref(self), handler, include_if)
    }

    /// Walks every hyperparameter of `genomes` in parallel, names in sorted order.
    /// Each handler call receives one node per genome, in population order.
    pub fn walk_population<'a, T, H, P>(
        genomes: &'a [Genome],
        handler: H,
        include_if: P,
    ) -> Result<Walk<'a, T, H, P>>
    where
        H: FnMut(&[Allele]) -> Option<T>,
        P: Fn(&Allele) -> bool,
    {
        check_same_names(genomes)?;
        let forest = match genomes.first() {
            Some(first) => first
                .alleles
                .keys()
                .map(|name| {
                    let trees = genomes
                        .iter()
                        .filter_map(|genome| genome.alleles.get(name))
                        .collect();
                    (name.clone(), trees)
                })
                .collect(),
            None => Vec::new(),
        };
        tree::walk_forest(forest, handler, include_if)
    }

    pub fn to_record(&self) -> GenomeRecord {
        GenomeRecord::from(self.clone())
    }

    pub fn from_record(record: GenomeRecord) -> Self {
        Self::from(record)
    }
}

fn check_same_names(genomes: &[Genome]) -> Result<()> {
    let Some((first, rest)) = genomes.split_first() else {
        return Ok(());
    };
    for member in rest {
        if !member.alleles.keys().eq(first.alleles.keys()) {
            let missing: Vec<&String> = first
                .alleles
                .keys()
                .filter(|name| !member.alleles.contains_key(*name))
                .collect();
            let extra: Vec<&String> = member
                .alleles
                .keys()
                .filter(|name| !first.alleles.contains_key(*name))
                .collect();
            return Err(ClanTuneError::Precondition(format!(
                "genome {} has different hyperparameters than genome {}: missing {:?}, extra {:?}",
                member.id, first.id, missing, extra
            )));
        }
    }
    Ok(())
}

/// Serializable form of a genome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeRecord {
    pub id: Uuid,
    pub alleles: BTreeMap<String, Allele>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancestry: Option<Ancestry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fitness: Option<f64>,
}

impl From<Genome> for GenomeRecord {
    fn from(genome: Genome) -> Self {
        Self {
            id: genome.id,
            alleles: genome.alleles,
            ancestry: genome.ancestry,
            fitness: genome.fitness,
        }
    }
}

impl From<GenomeRecord> for Genome {
    fn from(record: GenomeRecord) -> Self {
        Self {
            id: record.id,
            alleles: record.alleles,
            ancestry: record.ancestry,
            fitness: record.fitness,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genetics::alleles::Bounds;
    use crate::genetics::tree::{any_allele, can_mutate};

    fn sample(lr: f64, layers: f64) -> Genome {
        Genome::new()
            .add_hyperparameter(
                "lr",
                lr,
                AlleleKind::Float,
                AlleleParams::new()
                    .domain(Domain::Continuous(Bounds::new(0.0, 1.0)))
                    .metadata("std", Allele::float(0.1, Bounds::new(0.001, 1.0)).unwrap()),
            )
            .unwrap()
            .add_hyperparameter(
                "layers",
                layers,
                AlleleKind::Int,
                AlleleParams::new().domain(Domain::Continuous(Bounds::new(1.0, 10.0))),
            )
            .unwrap()
    }

    #[test]
    fn test_new_genome_is_blank() {
        let genome = Genome::new();
        assert!(genome.alleles().is_empty());
        assert!(genome.ancestry().is_none());
        assert!(genome.fitness().is_none());
        assert_ne!(genome.id(), Genome::new().id());
    }

    #[test]
    fn test_add_hyperparameter_changes_identity() {
        let base = Genome::new();
        let added = base
            .add_hyperparameter("dropout", 0.2, AlleleKind::Float, AlleleParams::new())
            .unwrap();
        assert_ne!(base.id(), added.id());
        assert!(base.alleles().is_empty());
        assert_eq!(added.as_hyperparameters()["dropout"], Value::Float(0.2));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let genome = sample(0.5, 3.0);
        let result = genome.add_hyperparameter("lr", 0.1, AlleleKind::Float, AlleleParams::new());
        assert!(matches!(result, Err(ClanTuneError::Precondition(_))));
    }

    #[test]
    fn test_add_hyperparameter_rejects_bad_domain() {
        let result = Genome::new().add_hyperparameter(
            "optimizer",
            "rmsprop",
            AlleleKind::String,
            AlleleParams::new().domain(Domain::Discrete(vec!["adam".into(), "sgd".into()])),
        );
        assert!(matches!(result, Err(ClanTuneError::Domain(_))));
    }

    #[test]
    fn test_params_flags_are_applied() {
        let genome = Genome::new()
            .add_hyperparameter(
                "batch",
                32,
                AlleleKind::Int,
                AlleleParams::new().can_mutate(false).can_crossbreed(false),
            )
            .unwrap();
        let allele = genome.allele("batch").unwrap();
        assert!(!allele.can_mutate());
        assert!(!allele.can_crossbreed());
    }

    #[test]
    fn test_as_hyperparameters_rounds_int() {
        let genome = sample(0.5, 3.6);
        let values = genome.as_hyperparameters();
        assert_eq!(values["lr"], Value::Float(0.5));
        assert_eq!(values["layers"], Value::Integer(4));
    }

    #[test]
    fn test_set_fitness_keeps_identity() {
        let genome = sample(0.5, 3.0);
        let scored = genome.set_fitness(1.25);
        assert_eq!(scored.id(), genome.id());
        assert_eq!(scored.fitness(), Some(1.25));
        assert!(genome.fitness().is_none());
    }

    #[test]
    fn test_with_ancestry_resets_identity_and_with_id_restores_it() {
        let genome = sample(0.5, 3.0);
        let population = vec![genome.clone()];
        let ancestry = Ancestry::from_probabilities(&[1.0], &population).unwrap();

        let bred = genome.with_ancestry(ancestry.clone());
        assert_ne!(bred.id(), genome.id());
        assert_eq!(bred.ancestry(), Some(&ancestry));

        let kept = bred.with_id(genome.id());
        assert_eq!(kept.id(), genome.id());
        assert_eq!(kept.ancestry(), Some(&ancestry));
    }

    #[test]
    fn test_update_alleles_visits_metadata_first() {
        let genome = sample(0.5, 3.0);
        let mut visited = Vec::new();
        let updated = genome
            .update_alleles(
                |allele| {
                    visited.push(allele.numeric().unwrap());
                    allele.with_value(allele.numeric().unwrap() / 2.0)
                },
                any_allele,
            )
            .unwrap();

        assert_eq!(visited, vec![3.0, 0.1, 0.5]);
        assert_eq!(updated.allele("lr").unwrap().numeric(), Some(0.25));
        assert_eq!(updated.allele("lr").unwrap().metadata_f64("std"), Some(0.05));
        assert!(updated.fitness().is_none());
        assert_ne!(updated.id(), genome.id());
    }

    #[test]
    fn test_update_alleles_respects_filter() {
        let genome = Genome::new()
            .add_hyperparameter(
                "frozen",
                1.0,
                AlleleKind::Float,
                AlleleParams::new().can_mutate(false),
            )
            .unwrap();
        let updated = genome
            .update_alleles(|allele| allele.with_value(9.0), can_mutate)
            .unwrap();
        assert_eq!(updated.allele("frozen").unwrap().numeric(), Some(1.0));
    }

    #[test]
    fn test_synthesize_from_averages_population() {
        let population = vec![sample(0.2, 2.0), sample(0.4, 4.0)];
        let child = population[0]
            .synthesize_from(
                &population,
                |template, sources| {
                    let mean = sources.iter().filter_map(Allele::numeric).sum::<f64>()
                        / sources.len() as f64;
                    template.with_value(mean)
                },
                any_allele,
            )
            .unwrap();

        let lr = child.allele("lr").unwrap();
        assert!((lr.numeric().unwrap() - 0.3).abs() < 1e-12);
        assert_eq!(child.allele("layers").unwrap().numeric(), Some(3.0));
        assert!(child.ancestry().is_none());
        assert!(child.fitness().is_none());
    }

    #[test]
    fn test_synthesize_from_requires_membership() {
        let population = vec![sample(0.2, 2.0), sample(0.4, 4.0)];
        let outsider = sample(0.3, 3.0);
        let result = outsider.synthesize_from(&population, |t, _| Ok(t.clone()), any_allele);
        assert!(matches!(result, Err(ClanTuneError::Precondition(_))));
    }

    #[test]
    fn test_synthesize_from_rejects_missing_hyperparameter() {
        let full = sample(0.2, 2.0);
        let partial = Genome::new()
            .add_hyperparameter("lr", 0.3, AlleleKind::Float, AlleleParams::new())
            .unwrap();
        let population = vec![full.clone(), partial];
        let result = full.synthesize_from(&population, |t, _| Ok(t.clone()), any_allele);
        assert!(matches!(result, Err(ClanTuneError::Precondition(_))));
    }

    #[test]
    fn test_synthesize_error_path_names_hyperparameter() {
        let left = sample(0.2, 2.0);
        let right = Genome::new()
            .add_hyperparameter(
                "lr",
                0.4,
                AlleleKind::Float,
                AlleleParams::new()
                    .domain(Domain::Continuous(Bounds::new(0.0, 1.0)))
                    .metadata("std", 0.1),
            )
            .unwrap()
            .add_hyperparameter(
                "layers",
                4.0,
                AlleleKind::Int,
                AlleleParams::new().domain(Domain::Continuous(Bounds::new(1.0, 10.0))),
            )
            .unwrap();
        let population = vec![left.clone(), right];
        match left.synthesize_from(&population, |t, _| Ok(t.clone()), any_allele) {
            Err(ClanTuneError::TypeMismatch { path, .. }) => assert_eq!(path, "lr.std"),
            other => panic!("expected a type mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_walk_population_in_name_then_population_order() {
        let population = vec![sample(0.2, 2.0), sample(0.4, 4.0)];
        let rows: Vec<Vec<f64>> = Genome::walk_population(
            &population,
            |nodes| Some(nodes.iter().filter_map(Allele::numeric).collect()),
            any_allele,
        )
        .unwrap()
        .collect();

        assert_eq!(
            rows,
            vec![vec![2.0, 4.0], vec![0.1, 0.1], vec![0.2, 0.4]]
        );
    }

    #[test]
    fn test_walk_population_rejects_differing_names() {
        let population = vec![
            sample(0.2, 2.0),
            Genome::new()
                .add_hyperparameter("lr", 0.1, AlleleKind::Float, AlleleParams::new())
                .unwrap(),
        ];
        let result = Genome::walk_population(&population, |_nodes| Some(()), any_allele);
        assert!(result.is_err());
    }

    #[test]
    fn test_record_round_trip() {
        let population = vec![sample(0.2, 2.5), sample(0.4, 4.0)];
        let ancestry = Ancestry::from_probabilities(&[0.25, 0.75], &population).unwrap();
        let genome = population[0].with_ancestry(ancestry).set_fitness(0.75);

        let json = serde_json::to_string(&genome).unwrap();
        let restored: Genome = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, genome);
        assert_eq!(restored.id(), genome.id());
    }
}
