//! Cohorts: groups of individuals sharing one disease/contagion/immunity
//! progress.

use contagion_core::{AffectationId, Bucket, ContagiousState, DiseaseState, Headcount, Parameter, SpeciesId};
use contagion_pathogen::{VaccineApplication, VirusSpecies};

/// Receives the bucket movements and forks produced while a cohort advances.
pub trait CohortObserver {
    /// `people` left bucket `from` and entered bucket `to`
    fn transition(&mut self, from: Option<Bucket>, to: Option<Bucket>, people: Headcount);

    /// A sub-cohort split off and must be staged
    fn fork(&mut self, cohort: AffectedCohort);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CohortStatus {
    Active,
    /// The immunity period elapsed; the cohort leaves its affectation
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffectedCohort {
    affectation: AffectationId,
    species: SpeciesId,
    disease: Option<DiseaseState>,
    contagious: Option<ContagiousState>,
    disease_tick: u32,
    contagious_tick: u32,
    immunity_tick: u32,
    expired: bool,
    count: Headcount,
    deaths: Headcount,
    /// Deaths reached when the symptom period ends
    final_deaths: Headcount,
}

impl AffectedCohort {
    /// Fresh infections start incubating and latent.
    pub fn new(affectation: AffectationId, count: Headcount) -> Self {
        Self {
            affectation,
            species: affectation.species,
            disease: Some(DiseaseState::Incubating),
            contagious: Some(ContagiousState::Latent),
            disease_tick: 0,
            contagious_tick: 0,
            immunity_tick: 0,
            expired: false,
            count,
            deaths: 0,
            final_deaths: 0,
        }
    }

    pub fn affectation(&self) -> AffectationId {
        self.affectation
    }

    pub fn species(&self) -> SpeciesId {
        self.species
    }

    pub fn disease(&self) -> Option<DiseaseState> {
        self.disease
    }

    pub fn contagious(&self) -> Option<ContagiousState> {
        self.contagious
    }

    pub fn count(&self) -> Headcount {
        self.count
    }

    pub fn deaths(&self) -> Headcount {
        self.deaths
    }

    pub fn final_deaths(&self) -> Headcount {
        self.final_deaths
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Buckets currently holding this cohort's living members.
    pub fn buckets(&self) -> impl Iterator<Item = Bucket> {
        self.disease
            .map(DiseaseState::bucket)
            .into_iter()
            .chain(self.contagious.map(ContagiousState::bucket))
            .chain(Bucket::phase(self.disease, self.contagious))
    }

    pub fn is_mergeable(&self, other: &AffectedCohort) -> bool {
        self.affectation == other.affectation
            && self.species == other.species
            && self.disease == other.disease
            && self.contagious == other.contagious
            && self.disease_tick == other.disease_tick
            && self.contagious_tick == other.contagious_tick
            && self.immunity_tick == other.immunity_tick
            && self.expired == other.expired
    }

    pub fn absorb(&mut self, other: AffectedCohort) {
        self.count += other.count;
        self.deaths += other.deaths;
        self.final_deaths += other.final_deaths;
    }

    /// Split off `floor(count * proportion)` members, with proportionally
    /// floored deaths. The remainder of every division stays in `self`.
    pub fn take_share(&mut self, proportion: f64) -> AffectedCohort {
        let proportion = proportion.clamp(0.0, 1.0);
        let mut extracted = self.clone();
        extracted.count = (self.count as f64 * proportion) as Headcount;
        extracted.deaths = (self.deaths as f64 * proportion) as Headcount;
        extracted.final_deaths = (self.final_deaths as f64 * proportion) as Headcount;
        self.count -= extracted.count;
        self.deaths -= extracted.deaths;
        self.final_deaths -= extracted.final_deaths;
        extracted
    }

    /// Split off exactly `min(people, count)` members.
    pub fn take_exact(&mut self, people: Headcount) -> AffectedCohort {
        let people = people.clamp(0, self.count);
        let mut extracted = self.clone();
        extracted.count = people;
        if self.count > 0 {
            extracted.deaths = self.deaths * people / self.count;
            extracted.final_deaths = self.final_deaths * people / self.count;
        } else {
            extracted.deaths = 0;
            extracted.final_deaths = 0;
        }
        self.count -= extracted.count;
        self.deaths -= extracted.deaths;
        self.final_deaths -= extracted.final_deaths;
        extracted
    }

    /// Owned two-way split: `(retained, extracted)`.
    pub fn split(mut self, proportion: f64) -> (AffectedCohort, AffectedCohort) {
        let extracted = self.take_share(proportion);
        (self, extracted)
    }

    pub fn relocate(&mut self, affectation: AffectationId) {
        self.affectation = affectation;
        self.species = affectation.species;
    }

    /// Advance one tick. Contagion is stepped before the disease so that a
    /// healthy fork carries the contagion progress of this tick.
    pub fn advance(
        &mut self,
        species: &VirusSpecies,
        vaccine: &VaccineApplication,
        observer: &mut impl CohortObserver,
    ) -> CohortStatus {
        let params = species.params();
        let before = Bucket::phase(self.disease, self.contagious);

        if let Some(state) = self.contagious {
            let ticks = match state {
                ContagiousState::Latent => params.latency_time,
                ContagiousState::Contagious => params.infection_duration,
            };
            self.contagious_tick += 1;
            if self.contagious_tick >= vaccine.duration(ticks) {
                self.contagious_tick = 0;
                self.contagious = state.next();
                observer.transition(
                    Some(state.bucket()),
                    self.contagious.map(ContagiousState::bucket),
                    self.count,
                );
            }
        }

        let mid = Bucket::phase(self.disease, self.contagious);
        if mid != before {
            observer.transition(before, mid, self.count);
        }

        if let Some(state) = self.disease {
            let ticks = match state {
                DiseaseState::Incubating => params.incubation_time,
                DiseaseState::Symptomatic => params.symptom_duration,
            };
            self.disease_tick += 1;
            if self.disease_tick >= vaccine.duration(ticks) {
                self.disease_tick = 0;
                self.disease = state.next();
                match self.disease {
                    Some(DiseaseState::Symptomatic) => self.fall_sick(species, vaccine, mid, observer),
                    _ => {
                        observer.transition(Some(state.bucket()), None, self.count);
                        let after = Bucket::phase(self.disease, self.contagious);
                        observer.transition(mid, after, self.count);
                    }
                }
            }
            if self.disease == Some(DiseaseState::Symptomatic) {
                self.accrue_deaths(params.symptom_duration, observer);
            }
        }

        if self.disease.is_none() && self.contagious.is_none() {
            self.immunity_tick += 1;
            if self.immunity_tick >= params.immunity_duration {
                self.expired = true;
                observer.transition(Some(Bucket::Immune), None, self.count);
                return CohortStatus::Expired;
            }
        }

        CohortStatus::Active
    }

    /// Entering the symptom period: only a fall-sick share stays in it, the
    /// rest forks off with the disease already over.
    fn fall_sick(
        &mut self,
        species: &VirusSpecies,
        vaccine: &VaccineApplication,
        phase: Option<Bucket>,
        observer: &mut impl CohortObserver,
    ) {
        let params = species.params();
        let sick_fraction = vaccine.modifier(Parameter::FallSick, params.fall_sick_probability);
        let mortality = vaccine.modifier(Parameter::Mortality, params.death_rate);

        let sick = (self.count as f64 * sick_fraction) as Headcount;
        let healthy = self.count - sick;

        observer.transition(Some(Bucket::Incubating), None, self.count);
        observer.transition(None, Some(Bucket::Symptomatic), sick);

        self.final_deaths = (sick as f64 * mortality) as Headcount;
        self.count = sick;

        if healthy > 0 {
            let fork = AffectedCohort {
                disease: None,
                disease_tick: 0,
                immunity_tick: 0,
                count: healthy,
                deaths: 0,
                final_deaths: 0,
                ..self.clone()
            };
            observer.transition(phase, Bucket::phase(None, self.contagious), healthy);
            observer.fork(fork);
        }
    }

    /// Linear death accrual over the symptom period. Integer truncation is
    /// kept as is, so recorded deaths may go back down after a split.
    fn accrue_deaths(&mut self, symptom_duration: u32, observer: &mut impl CohortObserver) {
        let current = if symptom_duration == 0 {
            0
        } else {
            self.final_deaths * self.disease_tick as Headcount / symptom_duration as Headcount
        };
        let delta = current - self.deaths;
        self.count -= delta;
        self.deaths = current;
        if delta > 0 {
            observer.transition(Some(Bucket::Symptomatic), Some(Bucket::Dead), delta);
        } else if delta < 0 {
            observer.transition(Some(Bucket::Dead), Some(Bucket::Symptomatic), -delta);
        }
    }
}
