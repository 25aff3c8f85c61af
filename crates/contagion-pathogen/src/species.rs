//! Virus species and their ancestry.

use contagion_core::SpeciesId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::family::VirusFamily;

/// Epidemiological parameter set. Rates are fractions, durations are ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpiParameters {
    pub fall_sick_probability: f64,
    pub death_rate: f64,
    pub spread_rate: f64,
    pub symptom_duration: u32,
    pub incubation_time: u32,
    pub latency_time: u32,
    pub immunity_duration: u32,
    pub infection_duration: u32,
}

/// How a mutable species came to exist
#[derive(Debug, Clone)]
pub enum Origin {
    /// Loaded from the scenario
    Root,
    /// Copy error while infecting new hosts
    CopyError { parent: Arc<VirusSpecies> },
    /// Recombination of two same-family species sharing hosts
    Recombination {
        first: Arc<VirusSpecies>,
        second: Arc<VirusSpecies>,
    },
}

#[derive(Debug, Clone)]
pub struct MutationTraits {
    pub copy_error_probability: f64,
    pub recombination_probability: f64,
    pub origin: Origin,
}

impl MutationTraits {
    pub fn root(copy_error_probability: f64, recombination_probability: f64) -> Self {
        Self {
            copy_error_probability,
            recombination_probability,
            origin: Origin::Root,
        }
    }
}

#[derive(Debug, Clone)]
pub enum VirusKind {
    Fixed,
    Mutable(MutationTraits),
}

/// Immutable species definition
#[derive(Debug)]
pub struct VirusSpecies {
    id: SpeciesId,
    name: String,
    family: Arc<VirusFamily>,
    params: EpiParameters,
    kind: VirusKind,
}

impl VirusSpecies {
    pub fn new(
        id: SpeciesId,
        name: impl Into<String>,
        family: Arc<VirusFamily>,
        params: EpiParameters,
        kind: VirusKind,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            family,
            params,
            kind,
        }
    }

    pub fn id(&self) -> SpeciesId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family(&self) -> &Arc<VirusFamily> {
        &self.family
    }

    pub fn params(&self) -> &EpiParameters {
        &self.params
    }

    pub fn kind(&self) -> &VirusKind {
        &self.kind
    }

    pub fn mutation(&self) -> Option<&MutationTraits> {
        match &self.kind {
            VirusKind::Fixed => None,
            VirusKind::Mutable(traits) => Some(traits),
        }
    }

    pub fn is_mutable(&self) -> bool {
        matches!(self.kind, VirusKind::Mutable(_))
    }

    pub fn same_family(&self, other: &VirusSpecies) -> bool {
        self.family.id == other.family.id
    }

    /// Direct parents, if this species is a mutation product
    pub fn parents(&self) -> Vec<&Arc<VirusSpecies>> {
        match &self.kind {
            VirusKind::Fixed => Vec::new(),
            VirusKind::Mutable(traits) => match &traits.origin {
                Origin::Root => Vec::new(),
                Origin::CopyError { parent } => vec![parent],
                Origin::Recombination { first, second } => vec![first, second],
            },
        }
    }

    /// True if `ancestor` is this species or any of its mutation ancestors.
    pub fn descends_from(&self, ancestor: SpeciesId) -> bool {
        self.id == ancestor || self.parents().iter().any(|p| p.descends_from(ancestor))
    }

    /// Earliest ancestor reachable through copy-error links only. Names of
    /// copy-error variants are numbered per root.
    pub fn copy_error_root(self: &Arc<Self>) -> Arc<VirusSpecies> {
        let mut current = Arc::clone(self);
        loop {
            let parent = match current.mutation().map(|t| &t.origin) {
                Some(Origin::CopyError { parent }) => Arc::clone(parent),
                _ => return current,
            };
            current = parent;
        }
    }

    /// Fitness order used when two same-family species compete:
    /// spread rate, then fall-sick probability, then death rate, then name.
    pub fn fitness_cmp(&self, other: &VirusSpecies) -> Ordering {
        self.params
            .spread_rate
            .total_cmp(&other.params.spread_rate)
            .then(
                self.params
                    .fall_sick_probability
                    .total_cmp(&other.params.fall_sick_probability),
            )
            .then(self.params.death_rate.total_cmp(&other.params.death_rate))
            .then_with(|| self.name.cmp(&other.name))
    }

    pub fn outcompetes(&self, other: &VirusSpecies) -> bool {
        self.fitness_cmp(other) == Ordering::Greater
    }
}

impl PartialEq for VirusSpecies {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for VirusSpecies {}

impl fmt::Display for VirusSpecies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.family.name)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use contagion_core::FamilyId;

    pub(crate) fn params() -> EpiParameters {
        EpiParameters {
            fall_sick_probability: 0.5,
            death_rate: 0.1,
            spread_rate: 0.3,
            symptom_duration: 5,
            incubation_time: 3,
            latency_time: 2,
            immunity_duration: 10,
            infection_duration: 4,
        }
    }

    pub(crate) fn family() -> Arc<VirusFamily> {
        Arc::new(VirusFamily::new(FamilyId(0), "corona", 0.1))
    }

    fn species(id: usize, name: &str, kind: VirusKind) -> Arc<VirusSpecies> {
        Arc::new(VirusSpecies::new(SpeciesId(id), name, family(), params(), kind))
    }

    #[test]
    fn test_fixed_species_only_descends_from_itself() {
        let a = species(0, "a", VirusKind::Fixed);
        assert!(a.descends_from(SpeciesId(0)));
        assert!(!a.descends_from(SpeciesId(1)));
        assert!(a.parents().is_empty());
    }

    #[test]
    fn test_ancestry_through_copy_error_and_recombination() {
        let a = species(0, "a", VirusKind::Mutable(MutationTraits::root(0.1, 0.1)));
        let b = species(1, "b", VirusKind::Mutable(MutationTraits::root(0.1, 0.1)));
        let c = species(2, "c", VirusKind::Fixed);

        let a1 = species(
            3,
            "a1",
            VirusKind::Mutable(MutationTraits {
                origin: Origin::CopyError { parent: a.clone() },
                ..MutationTraits::root(0.1, 0.1)
            }),
        );
        let hybrid = species(
            4,
            "a1_b",
            VirusKind::Mutable(MutationTraits {
                origin: Origin::Recombination {
                    first: a1.clone(),
                    second: b.clone(),
                },
                ..MutationTraits::root(0.1, 0.1)
            }),
        );

        assert!(a1.descends_from(a.id()));
        assert!(hybrid.descends_from(a.id()));
        assert!(hybrid.descends_from(b.id()));
        assert!(!hybrid.descends_from(c.id()));

        assert_eq!(a1.copy_error_root().id(), a.id());
        // recombination products start their own copy-error lineage
        assert_eq!(hybrid.copy_error_root().id(), hybrid.id());
    }

    #[test]
    fn test_fitness_order() {
        let mut strong_params = params();
        strong_params.spread_rate = 0.4;
        let strong = VirusSpecies::new(SpeciesId(0), "z", family(), strong_params, VirusKind::Fixed);
        let weak = VirusSpecies::new(SpeciesId(1), "a", family(), params(), VirusKind::Fixed);
        assert!(strong.outcompetes(&weak));
        assert!(!weak.outcompetes(&strong));

        // ties fall through to the name
        let alpha = VirusSpecies::new(SpeciesId(2), "alpha", family(), params(), VirusKind::Fixed);
        let beta = VirusSpecies::new(SpeciesId(3), "beta", family(), params(), VirusKind::Fixed);
        assert!(beta.outcompetes(&alpha));
        assert!(!alpha.outcompetes(&alpha));
    }
}
