//! Immutable allele trees.
//!
//! An [`Allele`] is one evolvable scalar together with its domain, two capability
//! flags and a metadata map. Metadata entries are either raw [`Value`]s or further
//! alleles, which is how metalearning is expressed: a mutation magnitude stored
//! under `metadata["std"]` is itself an allele with its own metadata.
//!
//! Every modification returns a new allele. Continuous domains clamp, discrete
//! domains reject.

use crate::error::{ClanTuneError, Result};
use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type Metadata = BTreeMap<String, Metadatum>;

/// Concrete allele variant; doubles as the serialization tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlleleKind {
    Float,
    Int,
    LogFloat,
    Bool,
    String,
}

impl AlleleKind {
    pub fn is_continuous(self) -> bool {
        matches!(self, AlleleKind::Float | AlleleKind::Int | AlleleKind::LogFloat)
    }

    pub fn name(self) -> &'static str {
        match self {
            AlleleKind::Float => "Float",
            AlleleKind::Int => "Int",
            AlleleKind::LogFloat => "LogFloat",
            AlleleKind::Bool => "Bool",
            AlleleKind::String => "String",
        }
    }
}

impl fmt::Display for AlleleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Optional lower/upper limits of a continuous domain. `None` leaves that side open.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn at_most(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    /// Both ends, when the domain is closed on both sides.
    pub fn span(&self) -> Option<(f64, f64)> {
        match (self.min, self.max) {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        let mut value = value;
        if let Some(min) = self.min {
            value = value.max(min);
        }
        if let Some(max) = self.max {
            value = value.min(max);
        }
        value
    }

    fn validate(&self) -> Result<()> {
        for bound in [self.min, self.max].into_iter().flatten() {
            if bound.is_nan() {
                return Err(ClanTuneError::Domain("domain bound is NaN".to_string()));
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(ClanTuneError::Domain(format!(
                    "domain min {} exceeds max {}",
                    min, max
                )));
            }
        }
        Ok(())
    }
}

/// Domain of an allele: numeric limits for continuous variants, a choice set for
/// discrete ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Domain {
    Continuous(Bounds),
    Discrete(Vec<Value>),
}

/// A metadata entry: a nested allele or a raw scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metadatum {
    Allele(Allele),
    Raw(Value),
}

impl Metadatum {
    pub fn as_allele(&self) -> Option<&Allele> {
        match self {
            Metadatum::Allele(allele) => Some(allele),
            Metadatum::Raw(_) => None,
        }
    }

    /// Scalar view: a raw entry as-is, a nested allele by its exposed value.
    pub fn value(&self) -> Value {
        match self {
            Metadatum::Allele(allele) => allele.value(),
            Metadatum::Raw(value) => value.clone(),
        }
    }

    pub fn is_allele(&self) -> bool {
        matches!(self, Metadatum::Allele(_))
    }
}

impl From<Allele> for Metadatum {
    fn from(allele: Allele) -> Self {
        Metadatum::Allele(allele)
    }
}

impl From<Value> for Metadatum {
    fn from(value: Value) -> Self {
        Metadatum::Raw(value)
    }
}

impl From<f64> for Metadatum {
    fn from(value: f64) -> Self {
        Metadatum::Raw(Value::Float(value))
    }
}

impl From<bool> for Metadatum {
    fn from(value: bool) -> Self {
        Metadatum::Raw(Value::Bool(value))
    }
}

impl From<&str> for Metadatum {
    fn from(value: &str) -> Self {
        Metadatum::Raw(Value::from(value))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Gene {
    Float { value: f64, bounds: Bounds },
    /// Stored as a float so small perturbations accumulate; exposed rounded.
    Int { value: f64, bounds: Bounds },
    LogFloat { value: f64, bounds: Bounds },
    Bool { value: bool },
    String { value: String, choices: Vec<String> },
}

impl Gene {
    fn kind(&self) -> AlleleKind {
        match self {
            Gene::Float { .. } => AlleleKind::Float,
            Gene::Int { .. } => AlleleKind::Int,
            Gene::LogFloat { .. } => AlleleKind::LogFloat,
            Gene::Bool { .. } => AlleleKind::Bool,
            Gene::String { .. } => AlleleKind::String,
        }
    }

    fn float(value: f64, bounds: Bounds) -> Result<Self> {
        bounds.validate()?;
        Ok(Gene::Float {
            value: clamp_finite(value, &bounds, AlleleKind::Float)?,
            bounds,
        })
    }

    fn int(value: f64, bounds: Bounds) -> Result<Self> {
        bounds.validate()?;
        Ok(Gene::Int {
            value: clamp_finite(value, &bounds, AlleleKind::Int)?,
            bounds,
        })
    }

    fn log_float(value: f64, bounds: Bounds) -> Result<Self> {
        bounds.validate()?;
        match bounds.min {
            None => {
                return Err(ClanTuneError::Domain(
                    "LogFloat requires a domain min".to_string(),
                ))
            }
            Some(min) if min <= 0.0 => {
                return Err(ClanTuneError::Domain(format!(
                    "LogFloat domain min must be > 0, got {}",
                    min
                )))
            }
            Some(_) => {}
        }
        Ok(Gene::LogFloat {
            value: clamp_finite(value, &bounds, AlleleKind::LogFloat)?,
            bounds,
        })
    }

    fn string(value: String, choices: Vec<String>) -> Result<Self> {
        let mut unique: Vec<String> = Vec::with_capacity(choices.len());
        for choice in choices {
            if !unique.contains(&choice) {
                unique.push(choice);
            }
        }
        if unique.is_empty() {
            return Err(ClanTuneError::Domain(
                "String allele requires a non-empty domain".to_string(),
            ));
        }
        if !unique.contains(&value) {
            return Err(ClanTuneError::Domain(format!(
                "value {:?} is outside domain {:?}",
                value, unique
            )));
        }
        Ok(Gene::String {
            value,
            choices: unique,
        })
    }

    /// Same variant and domain, new value.
    fn with_value(&self, value: Value) -> Result<Self> {
        match self {
            Gene::Float { bounds, .. } => Gene::float(expect_number(&value, self.kind())?, *bounds),
            Gene::Int { bounds, .. } => Gene::int(expect_number(&value, self.kind())?, *bounds),
            Gene::LogFloat { bounds, .. } => {
                Gene::log_float(expect_number(&value, self.kind())?, *bounds)
            }
            Gene::Bool { .. } => match value {
                Value::Bool(value) => Ok(Gene::Bool { value }),
                other => Err(ClanTuneError::Domain(format!(
                    "value {} is outside domain {{true, false}}",
                    other
                ))),
            },
            Gene::String { choices, .. } => match value {
                Value::String(value) => Gene::string(value, choices.clone()),
                other => Err(ClanTuneError::Domain(format!(
                    "value {} is outside domain {:?}",
                    other, choices
                ))),
            },
        }
    }
}

fn expect_number(value: &Value, kind: AlleleKind) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        ClanTuneError::Domain(format!(
            "{} allele expects a number, got {}",
            kind,
            value.type_name()
        ))
    })
}

fn clamp_finite(value: f64, bounds: &Bounds, kind: AlleleKind) -> Result<f64> {
    if value.is_nan() {
        return Err(ClanTuneError::Domain(format!("{} allele value is NaN", kind)));
    }
    let clamped = bounds.clamp(value);
    if !clamped.is_finite() {
        return Err(ClanTuneError::Domain(format!(
            "{} allele value {} is not finite",
            kind, value
        )));
    }
    Ok(clamped)
}

/// One node of an allele tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AlleleRecord", into = "AlleleRecord")]
pub struct Allele {
    gene: Gene,
    can_mutate: bool,
    can_crossbreed: bool,
    metadata: Metadata,
}

impl Allele {
    fn from_gene(gene: Gene) -> Self {
        Self {
            gene,
            can_mutate: true,
            can_crossbreed: true,
            metadata: Metadata::new(),
        }
    }

    /// Linear float allele.
    pub fn float(value: f64, bounds: Bounds) -> Result<Self> {
        Ok(Self::from_gene(Gene::float(value, bounds)?))
    }

    /// Integer allele backed by a float; `value()` rounds half to even.
    pub fn int(value: f64, bounds: Bounds) -> Result<Self> {
        Ok(Self::from_gene(Gene::int(value, bounds)?))
    }

    /// Float allele perturbed in log space. Requires `bounds.min > 0`.
    pub fn log_float(value: f64, bounds: Bounds) -> Result<Self> {
        Ok(Self::from_gene(Gene::log_float(value, bounds)?))
    }

    pub fn boolean(value: bool) -> Self {
        Self::from_gene(Gene::Bool { value })
    }

    /// String allele over a required, non-empty choice set.
    pub fn string<S, I, C>(value: S, choices: I) -> Result<Self>
    where
        S: Into<String>,
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        let choices = choices.into_iter().map(Into::into).collect();
        Ok(Self::from_gene(Gene::string(value.into(), choices)?))
    }

    /// Generic constructor dispatching on `kind`.
    ///
    /// Continuous kinds take an optional [`Domain::Continuous`] (unbounded when
    /// absent); `Bool` ignores an absent domain and only accepts `{true, false}`;
    /// `String` requires a [`Domain::Discrete`] of strings.
    pub fn new(kind: AlleleKind, value: Value, domain: Option<Domain>) -> Result<Self> {
        let gene = match kind {
            AlleleKind::Float | AlleleKind::Int | AlleleKind::LogFloat => {
                let bounds = match domain {
                    None => Bounds::unbounded(),
                    Some(Domain::Continuous(bounds)) => bounds,
                    Some(Domain::Discrete(_)) => {
                        return Err(ClanTuneError::Domain(format!(
                            "{} allele requires a continuous domain",
                            kind
                        )))
                    }
                };
                let number = expect_number(&value, kind)?;
                match kind {
                    AlleleKind::Float => Gene::float(number, bounds)?,
                    AlleleKind::Int => Gene::int(number, bounds)?,
                    _ => Gene::log_float(number, bounds)?,
                }
            }
            AlleleKind::Bool => {
                if let Some(domain) = domain {
                    if !is_bool_domain(&domain) {
                        return Err(ClanTuneError::Domain(
                            "Bool allele domain is fixed to {true, false}".to_string(),
                        ));
                    }
                }
                match value {
                    Value::Bool(value) => Gene::Bool { value },
                    other => {
                        return Err(ClanTuneError::Domain(format!(
                            "value {} is outside domain {{true, false}}",
                            other
                        )))
                    }
                }
            }
            AlleleKind::String => {
                let choices = match domain {
                    Some(Domain::Discrete(choices)) => choices
                        .into_iter()
                        .map(|choice| match choice {
                            Value::String(s) => Ok(s),
                            other => Err(ClanTuneError::Domain(format!(
                                "String allele choices must be strings, got {}",
                                other
                            ))),
                        })
                        .collect::<Result<Vec<_>>>()?,
                    _ => {
                        return Err(ClanTuneError::Domain(
                            "String allele requires a discrete domain".to_string(),
                        ))
                    }
                };
                match value {
                    Value::String(value) => Gene::string(value, choices)?,
                    other => {
                        return Err(ClanTuneError::Domain(format!(
                            "value {} is outside domain {:?}",
                            other, choices
                        )))
                    }
                }
            }
        };
        Ok(Self::from_gene(gene))
    }

    pub fn kind(&self) -> AlleleKind {
        self.gene.kind()
    }

    /// Exposed value. Int alleles round their float backing half to even.
    pub fn value(&self) -> Value {
        match &self.gene {
            Gene::Float { value, .. } | Gene::LogFloat { value, .. } => Value::Float(*value),
            Gene::Int { value, .. } => Value::Integer(value.round_ties_even() as i64),
            Gene::Bool { value } => Value::Bool(*value),
            Gene::String { value, .. } => Value::String(value.clone()),
        }
    }

    /// Float backing of continuous variants (unrounded for Int); `None` for discrete ones.
    pub fn numeric(&self) -> Option<f64> {
        match &self.gene {
            Gene::Float { value, .. } | Gene::Int { value, .. } | Gene::LogFloat { value, .. } => {
                Some(*value)
            }
            Gene::Bool { .. } | Gene::String { .. } => None,
        }
    }

    pub fn domain(&self) -> Domain {
        match &self.gene {
            Gene::Float { bounds, .. } | Gene::Int { bounds, .. } | Gene::LogFloat { bounds, .. } => {
                Domain::Continuous(*bounds)
            }
            Gene::Bool { .. } => Domain::Discrete(vec![Value::Bool(true), Value::Bool(false)]),
            Gene::String { choices, .. } => {
                Domain::Discrete(choices.iter().cloned().map(Value::String).collect())
            }
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        match &self.gene {
            Gene::Float { bounds, .. } | Gene::Int { bounds, .. } | Gene::LogFloat { bounds, .. } => {
                Some(*bounds)
            }
            Gene::Bool { .. } | Gene::String { .. } => None,
        }
    }

    pub fn can_mutate(&self) -> bool {
        self.can_mutate
    }

    pub fn can_crossbreed(&self) -> bool {
        self.can_crossbreed
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_entry(&self, key: &str) -> Option<&Metadatum> {
        self.metadata.get(key)
    }

    /// Numeric metadata lookup; works on both flattened and nested entries.
    pub fn metadata_f64(&self, key: &str) -> Option<f64> {
        match self.metadata.get(key)? {
            Metadatum::Allele(allele) => allele.numeric(),
            Metadatum::Raw(value) => value.as_f64(),
        }
    }

    pub fn with_value(&self, value: impl Into<Value>) -> Result<Self> {
        Ok(Self {
            gene: self.gene.with_value(value.into())?,
            can_mutate: self.can_mutate,
            can_crossbreed: self.can_crossbreed,
            metadata: self.metadata.clone(),
        })
    }

    pub fn with_can_mutate(mut self, can_mutate: bool) -> Self {
        self.can_mutate = can_mutate;
        self
    }

    pub fn with_can_crossbreed(mut self, can_crossbreed: bool) -> Self {
        self.can_crossbreed = can_crossbreed;
        self
    }

    /// Copy with one metadata entry added or replaced.
    pub fn with_metadata(&self, key: impl Into<String>, entry: impl Into<Metadatum>) -> Self {
        let mut next = self.clone();
        next.metadata.insert(key.into(), entry.into());
        next
    }

    /// Copy with several metadata entries added or replaced.
    pub fn with_metadata_entries<K, E, I>(&self, entries: I) -> Self
    where
        K: Into<String>,
        E: Into<Metadatum>,
        I: IntoIterator<Item = (K, E)>,
    {
        let mut next = self.clone();
        for (key, entry) in entries {
            next.metadata.insert(key.into(), entry.into());
        }
        next
    }

    /// Copy with nested alleles in metadata replaced by their scalar values.
    pub fn flattened(&self) -> Self {
        let metadata = self
            .metadata
            .iter()
            .map(|(key, entry)| (key.clone(), Metadatum::Raw(entry.value())))
            .collect();
        Self {
            gene: self.gene.clone(),
            can_mutate: self.can_mutate,
            can_crossbreed: self.can_crossbreed,
            metadata,
        }
    }

    /// Copy with the given keys pointing at the given child alleles.
    pub(crate) fn with_children(&self, children: &BTreeMap<String, Allele>) -> Self {
        let mut next = self.clone();
        for (key, child) in children {
            next.metadata
                .insert(key.clone(), Metadatum::Allele(child.clone()));
        }
        next
    }

    pub fn to_record(&self) -> AlleleRecord {
        AlleleRecord::from(self.clone())
    }

    pub fn from_record(record: AlleleRecord) -> Result<Self> {
        Self::try_from(record)
    }
}

impl fmt::Display for Allele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.value())
    }
}

fn is_bool_domain(domain: &Domain) -> bool {
    match domain {
        Domain::Discrete(choices) => {
            choices.len() == 2
                && choices.contains(&Value::Bool(true))
                && choices.contains(&Value::Bool(false))
        }
        Domain::Continuous(_) => false,
    }
}

/// Structured, serializable form of an allele. `kind` is written as `"type"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlleleRecord {
    #[serde(rename = "type")]
    pub kind: AlleleKind,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
    pub can_mutate: bool,
    pub can_crossbreed: bool,
    #[serde(default)]
    pub metadata: Metadata,
}

impl From<Allele> for AlleleRecord {
    fn from(allele: Allele) -> Self {
        let kind = allele.kind();
        let (value, domain) = match allele.gene {
            Gene::Float { value, bounds }
            | Gene::Int { value, bounds }
            | Gene::LogFloat { value, bounds } => {
                (Value::Float(value), Some(Domain::Continuous(bounds)))
            }
            Gene::Bool { value } => (Value::Bool(value), None),
            Gene::String { value, choices } => (
                Value::String(value),
                Some(Domain::Discrete(choices.into_iter().map(Value::String).collect())),
            ),
        };
        Self {
            kind,
            value,
            domain,
            can_mutate: allele.can_mutate,
            can_crossbreed: allele.can_crossbreed,
            metadata: allele.metadata,
        }
    }
}

impl TryFrom<AlleleRecord> for Allele {
    type Error = ClanTuneError;

    fn try_from(record: AlleleRecord) -> Result<Self> {
        let mut allele = Allele::new(record.kind, record.value, record.domain)?;
        allele.can_mutate = record.can_mutate;
        allele.can_crossbreed = record.can_crossbreed;
        allele.metadata = record.metadata;
        Ok(allele)
    }
}
