//! Aggregate of all cohorts of one species in one region.

use contagion_core::{
    AffectationId, AffectationSummary, Bucket, BucketCounts, Flow, FlowCounters, Headcount, Parameter,
};
use contagion_pathogen::{VaccineApplication, VirusSpecies};
use std::cell::Cell;
use std::sync::Arc;
use tracing::trace;

use crate::cohort::{AffectedCohort, CohortObserver, CohortStatus};

/// Live cohorts plus the ones staged during the current tick.
///
/// Staged cohorts are visible to every read but only merged into the live
/// list on [`CohortSet::commit`].
#[derive(Debug, Clone, Default)]
pub struct CohortSet {
    live: Vec<AffectedCohort>,
    pending: Vec<AffectedCohort>,
}

impl CohortSet {
    pub fn iter(&self) -> impl Iterator<Item = &AffectedCohort> {
        self.live.iter().chain(self.pending.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AffectedCohort> {
        self.live.iter_mut().chain(self.pending.iter_mut())
    }

    pub fn stage(&mut self, cohort: AffectedCohort) {
        self.pending.push(cohort);
    }

    /// Merge staged cohorts into the live list, folding each into a
    /// mergeable live cohort when one exists.
    pub fn commit(&mut self) {
        for cohort in self.pending.drain(..) {
            match self.live.iter_mut().find(|c| c.is_mergeable(&cohort)) {
                Some(existing) => existing.absorb(cohort),
                None => self.live.push(cohort),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.live.len() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where transferred people end up
pub enum Destination<'a> {
    /// Removed from the simulation
    Discard,
    /// Staged into another affectation, limited by its healthy headroom
    Into {
        affectation: &'a mut Affectation,
        inhabitants: Headcount,
    },
}

struct Recorder<'a> {
    flows: &'a mut FlowCounters,
    pending: &'a mut Vec<AffectedCohort>,
}

impl CohortObserver for Recorder<'_> {
    fn transition(&mut self, from: Option<Bucket>, to: Option<Bucket>, people: Headcount) {
        self.flows.transition(from, to, people);
    }

    fn fork(&mut self, cohort: AffectedCohort) {
        self.pending.push(cohort);
    }
}

#[derive(Debug, Clone)]
pub struct Affectation {
    id: AffectationId,
    species: Arc<VirusSpecies>,
    cohorts: CohortSet,
    vaccine: VaccineApplication,
    flows: FlowCounters,
    /// People whose immunity elapsed
    expired: Headcount,
    /// Deaths of cohorts that left the live list
    retired_deaths: Headcount,
    totals: Cell<Option<BucketCounts>>,
}

impl Affectation {
    pub fn new(id: AffectationId, species: Arc<VirusSpecies>) -> Self {
        Self {
            id,
            species,
            cohorts: CohortSet::default(),
            vaccine: VaccineApplication::none(),
            flows: FlowCounters::new(),
            expired: 0,
            retired_deaths: 0,
            totals: Cell::new(None),
        }
    }

    pub fn id(&self) -> AffectationId {
        self.id
    }

    pub fn species(&self) -> &Arc<VirusSpecies> {
        &self.species
    }

    pub fn cohorts(&self) -> &CohortSet {
        &self.cohorts
    }

    pub fn vaccine(&self) -> &VaccineApplication {
        &self.vaccine
    }

    fn invalidate(&self) {
        self.totals.set(None);
    }

    /// Stage a cohort for the next commit
    pub fn stage(&mut self, cohort: AffectedCohort) {
        self.invalidate();
        self.cohorts.stage(cohort);
    }

    pub fn commit(&mut self) {
        self.invalidate();
        self.cohorts.commit();
        let mut retired = 0;
        self.cohorts.live.retain(|cohort| {
            if cohort.count() == 0 {
                retired += cohort.deaths();
                false
            } else {
                true
            }
        });
        self.retired_deaths += retired;
    }

    /// Stage `people` new infections.
    pub fn infect(&mut self, people: Headcount) {
        if people <= 0 {
            return;
        }
        self.flows.transition(None, Some(Bucket::Incubating), people);
        self.flows.transition(None, Some(Bucket::Latent), people);
        self.stage(AffectedCohort::new(self.id, people));
    }

    /// Step every live cohort one tick. Flows restart from zero; forks are
    /// staged and expired cohorts leave the live list.
    pub fn advance(&mut self) {
        self.invalidate();
        self.flows.reset();

        let mut recorder = Recorder {
            flows: &mut self.flows,
            pending: &mut self.cohorts.pending,
        };
        let species = &self.species;
        let vaccine = &self.vaccine;
        let mut expired = 0;
        let mut retired = 0;
        self.cohorts.live.retain_mut(|cohort| {
            match cohort.advance(species, vaccine, &mut recorder) {
                CohortStatus::Active => true,
                CohortStatus::Expired => {
                    expired += cohort.count();
                    retired += cohort.deaths();
                    false
                }
            }
        });
        self.expired += expired;
        self.retired_deaths += retired;
    }

    /// Aggregate counts over live and staged cohorts, recomputed only after
    /// a mutation.
    pub fn totals(&self) -> BucketCounts {
        if let Some(totals) = self.totals.get() {
            return totals;
        }
        let mut totals = BucketCounts {
            dead: self.retired_deaths,
            ..BucketCounts::default()
        };
        for cohort in self.cohorts.iter() {
            totals.dead += cohort.deaths();
            if cohort.is_expired() {
                continue;
            }
            totals.affected += cohort.count();
            for bucket in cohort.buckets() {
                *totals.get_mut(bucket) += cohort.count();
            }
        }
        self.totals.set(Some(totals));
        totals
    }

    pub fn affected(&self) -> Headcount {
        self.totals().affected
    }

    pub fn deaths(&self) -> Headcount {
        self.totals().dead
    }

    pub fn healthy(&self, inhabitants: Headcount) -> Headcount {
        let totals = self.totals();
        inhabitants - totals.affected - totals.dead
    }

    pub fn count(&self, bucket: Bucket) -> Headcount {
        self.totals().get(bucket)
    }

    pub fn flow(&self, bucket: Bucket) -> Flow {
        self.flows.get(bucket)
    }

    pub fn flows(&self) -> &FlowCounters {
        &self.flows
    }

    pub fn expired(&self) -> Headcount {
        self.expired
    }

    /// New infections this tick for a region of `inhabitants` people moving
    /// around with `mobility`.
    pub fn new_infections(&self, inhabitants: Headcount, mobility: f64) -> Headcount {
        if inhabitants <= 0 {
            return 0;
        }
        let healthy = self.healthy(inhabitants).max(0);
        let spread = self.vaccine.modifier(
            Parameter::Contagiousness,
            self.vaccine
                .modifier(Parameter::VirusEffectiveness, self.species.params().spread_rate),
        );
        let contagious = self.count(Bucket::Contagious);
        let contacts = spread * mobility * contagious as f64 / inhabitants as f64;
        healthy.min((contacts * healthy as f64) as Headcount)
    }

    pub fn apply_vaccine(&mut self, vaccine: VaccineApplication) {
        self.vaccine = vaccine;
    }

    pub fn advance_vaccine(&mut self) {
        self.vaccine.advance();
    }

    pub fn vaccine_remaining_ticks(&self) -> u32 {
        self.vaccine.remaining_ticks()
    }

    pub fn summary(&self, region: &str, inhabitants: Headcount) -> AffectationSummary {
        AffectationSummary {
            region: region.to_string(),
            species: self.species.name().to_string(),
            inhabitants,
            counts: self.totals(),
            flows: self.flows,
            expired: self.expired,
            vaccine: self
                .vaccine
                .vaccine()
                .filter(|_| !self.vaccine.is_over())
                .map(|v| v.name.clone()),
            vaccine_remaining_ticks: self.vaccine_remaining_ticks(),
        }
    }

    /// Move `people` affected individuals out of this affectation, keeping
    /// the state mix of the cohorts as far as integer counts allow.
    ///
    /// A proportional pass splits every cohort by the same share. Whatever
    /// rounding leaves behind is then taken in even samples across cohorts
    /// until the target is met or the source runs dry. Extracted cohorts
    /// carry their deaths, and a destination never receives more affected
    /// plus dead people than its healthy headroom; cohorts that do not fit
    /// are staged back here. Returns the number of affected people moved.
    pub fn transfer(&mut self, to: Destination<'_>, people: Headcount) -> Headcount {
        let (target, people) = match to {
            Destination::Discard => (None, people),
            Destination::Into {
                affectation,
                inhabitants,
            } => {
                let headroom = affectation.healthy(inhabitants);
                (Some((affectation, headroom)), people.min(headroom))
            }
        };

        let available = self.affected();
        if people <= 0 || available == 0 {
            return 0;
        }
        self.invalidate();

        let mut extracted = Vec::new();
        let proportion = (people as f64 / available as f64).min(1.0);
        let mut moved = 0;
        let mut largest = 0;
        for cohort in self.cohorts.iter_mut() {
            let share = cohort.take_share(proportion);
            moved += share.count();
            largest = largest.max(share.count());
            if share.count() > 0 {
                extracted.push(share);
            } else {
                cohort.absorb(share);
            }
        }

        while moved < people {
            let remaining = available - moved;
            if remaining <= 0 {
                break;
            }
            let numerator = (people - moved) * largest;
            let sample = (numerator / remaining + Headcount::from(numerator % remaining > 0)).max(1);
            for cohort in self.cohorts.iter_mut() {
                if moved >= people {
                    break;
                }
                let amount = sample.min(cohort.count()).min(people - moved);
                if amount <= 0 {
                    continue;
                }
                let share = cohort.take_exact(amount);
                moved += share.count();
                extracted.push(share);
            }
        }

        if let Some((target, headroom)) = target {
            moved = self.deliver(extracted, target, headroom);
        }

        trace!(
            event = "transfer",
            species = %self.species.name(),
            requested = people,
            moved,
            "Affected people transferred"
        );
        moved
    }

    /// Stage `cohorts` into `target` while their people and deaths fit in
    /// `budget`. The part that does not fit goes back into this affectation.
    fn deliver(&mut self, cohorts: Vec<AffectedCohort>, target: &mut Affectation, budget: Headcount) -> Headcount {
        let mut budget = budget;
        let mut delivered = 0;
        for mut cohort in cohorts {
            let cost = cohort.count() + cohort.deaths();
            if cost > budget {
                let fitting = budget.max(0) * cohort.count() / cost;
                if fitting > 0 {
                    let mut part = cohort.take_exact(fitting);
                    budget -= part.count() + part.deaths();
                    delivered += part.count();
                    part.relocate(target.id);
                    target.stage(part);
                }
                self.stage(cohort);
                continue;
            }
            budget -= cost;
            delivered += cohort.count();
            cohort.relocate(target.id);
            target.stage(cohort);
        }
        delivered
    }

    /// Deaths of cohorts that already left the live list
    pub fn retired_deaths(&self) -> Headcount {
        self.retired_deaths
    }

    /// Hand up to `deaths` retired deaths over to `target`, bounded by its
    /// headroom for `inhabitants`. Returns the number handed over.
    pub fn transfer_retired_deaths(
        &mut self,
        target: &mut Affectation,
        inhabitants: Headcount,
        deaths: Headcount,
    ) -> Headcount {
        let handed = deaths
            .min(self.retired_deaths)
            .min(target.healthy(inhabitants))
            .max(0);
        if handed > 0 {
            self.invalidate();
            target.invalidate();
            self.retired_deaths -= handed;
            target.retired_deaths += handed;
        }
        handed
    }
}
