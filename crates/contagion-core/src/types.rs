//! Core type definitions for the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of individuals. Signed so that intermediate bookkeeping can go
/// through zero without wrapping.
pub type Headcount = i64;

/// Stable index of a region inside a territory
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegionId(pub usize);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region#{}", self.0)
    }
}

/// Stable index of a species inside the species registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpeciesId(pub usize);

impl fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "species#{}", self.0)
    }
}

/// Stable index of a virus family
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FamilyId(pub usize);

/// Stable index of a vaccine in the vaccine catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VaccineId(pub usize);

/// Identity of an affectation: one (region, species) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AffectationId {
    pub region: RegionId,
    pub species: SpeciesId,
}

impl AffectationId {
    pub fn new(region: RegionId, species: SpeciesId) -> Self {
        Self { region, species }
    }
}

/// Disease progress of a cohort. `None` in an `Option<DiseaseState>` means
/// the disease period is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiseaseState {
    Incubating,
    Symptomatic,
}

impl DiseaseState {
    pub fn next(self) -> Option<DiseaseState> {
        match self {
            DiseaseState::Incubating => Some(DiseaseState::Symptomatic),
            DiseaseState::Symptomatic => None,
        }
    }

    pub fn bucket(self) -> Bucket {
        match self {
            DiseaseState::Incubating => Bucket::Incubating,
            DiseaseState::Symptomatic => Bucket::Symptomatic,
        }
    }
}

/// Contagion progress of a cohort, timed independently from the disease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContagiousState {
    Latent,
    Contagious,
}

impl ContagiousState {
    pub fn next(self) -> Option<ContagiousState> {
        match self {
            ContagiousState::Latent => Some(ContagiousState::Contagious),
            ContagiousState::Contagious => None,
        }
    }

    pub fn bucket(self) -> Bucket {
        match self {
            ContagiousState::Latent => Bucket::Latent,
            ContagiousState::Contagious => Bucket::Contagious,
        }
    }
}

/// Epidemiological quantity a vaccine may transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Parameter {
    Mortality,
    Duration,
    FallSick,
    Contagiousness,
    VirusEffectiveness,
}

impl Parameter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Parameter::Mortality => "mortality",
            Parameter::Duration => "duration",
            Parameter::FallSick => "fallSick",
            Parameter::Contagiousness => "contagiousness",
            Parameter::VirusEffectiveness => "virusEffectiveness",
        }
    }
}

/// Aggregate state bucket tracked per affectation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Incubating,
    Symptomatic,
    Latent,
    Contagious,
    /// Disease over, still contagious or latent
    NullDisease,
    /// Contagion over, still incubating or symptomatic
    NullContagious,
    Immune,
    Dead,
}

impl Bucket {
    pub const COUNT: usize = 8;

    pub fn all() -> [Bucket; Bucket::COUNT] {
        [
            Bucket::Incubating,
            Bucket::Symptomatic,
            Bucket::Latent,
            Bucket::Contagious,
            Bucket::NullDisease,
            Bucket::NullContagious,
            Bucket::Immune,
            Bucket::Dead,
        ]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Bucket::Incubating => "incubating",
            Bucket::Symptomatic => "symptomatic",
            Bucket::Latent => "latent",
            Bucket::Contagious => "contagious",
            Bucket::NullDisease => "null_disease",
            Bucket::NullContagious => "null_contagious",
            Bucket::Immune => "immune",
            Bucket::Dead => "dead",
        }
    }

    /// Bucket a cohort sits in once at least one of its periods is over.
    pub fn phase(disease: Option<DiseaseState>, contagious: Option<ContagiousState>) -> Option<Bucket> {
        match (disease, contagious) {
            (None, None) => Some(Bucket::Immune),
            (None, Some(_)) => Some(Bucket::NullDisease),
            (Some(_), None) => Some(Bucket::NullContagious),
            (Some(_), Some(_)) => None,
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
