//! Regions: a population, its affectations and its borders.

use contagion_core::{AffectationId, Headcount, RegionId, SpeciesId};
use contagion_pathogen::{Host, SimulationContext, Vaccine, VaccineApplication, VirusSpecies};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::affectation::{Affectation, Destination};

/// Directed travel link to a neighbouring region
#[derive(Debug, Clone, PartialEq)]
pub struct Border {
    /// Fraction of inhabitants crossing per tick
    pub flow_rate: f64,
    /// People sent across during the current tick
    pub movement: Headcount,
    pub open: bool,
}

impl Border {
    pub fn new(flow_rate: f64, open: bool) -> Self {
        Self {
            flow_rate,
            movement: 0,
            open,
        }
    }
}

/// Hard lockdown: no border crossings in or out while active
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Lockdown {
    pub active: bool,
    /// Rate requested with the lockdown; 1.0 once lifted
    pub reduced_flow_rate: f64,
}

#[derive(Debug, Clone)]
pub struct Region {
    id: RegionId,
    name: String,
    inside_mobility: f64,
    inhabitants: Headcount,
    natal: Headcount,
    pre_rollback: Headcount,
    abroad: Headcount,
    affectations: Vec<Affectation>,
    index: HashMap<SpeciesId, usize>,
    neighbours: BTreeMap<RegionId, Border>,
    lockdown: Lockdown,
    vaccines: Vec<VaccineApplication>,
    recent: Vec<SpeciesId>,
}

impl Region {
    pub fn new(id: RegionId, name: impl Into<String>, inhabitants: Headcount, inside_mobility: f64) -> Self {
        Self {
            id,
            name: name.into(),
            inside_mobility,
            inhabitants,
            natal: inhabitants,
            pre_rollback: inhabitants,
            abroad: 0,
            affectations: Vec::new(),
            index: HashMap::new(),
            neighbours: BTreeMap::new(),
            lockdown: Lockdown::default(),
            vaccines: Vec::new(),
            recent: Vec::new(),
        }
    }

    pub fn id(&self) -> RegionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inhabitants(&self) -> Headcount {
        self.inhabitants
    }

    pub fn natal(&self) -> Headcount {
        self.natal
    }

    pub fn abroad(&self) -> Headcount {
        self.abroad
    }

    /// Visitors present before they were sent home, net of locals abroad.
    pub fn foreign(&self) -> Headcount {
        self.pre_rollback - self.natal + self.abroad
    }

    pub fn inside_mobility(&self) -> f64 {
        self.inside_mobility
    }

    pub fn lockdown(&self) -> Lockdown {
        self.lockdown
    }

    pub fn is_locked_down(&self) -> bool {
        self.lockdown.active
    }

    pub fn set_hard_lockdown(&mut self, enabled: bool, reduced_flow_rate: f64) {
        self.lockdown = Lockdown {
            active: enabled,
            reduced_flow_rate: if enabled { reduced_flow_rate } else { 1.0 },
        };
    }

    pub fn add_neighbour(&mut self, neighbour: RegionId, border: Border) {
        self.neighbours.insert(neighbour, border);
    }

    pub fn neighbours(&self) -> &BTreeMap<RegionId, Border> {
        &self.neighbours
    }

    pub fn border_mut(&mut self, neighbour: RegionId) -> Option<&mut Border> {
        self.neighbours.get_mut(&neighbour)
    }

    pub fn affectations(&self) -> &[Affectation] {
        &self.affectations
    }

    pub fn affectation(&self, species: SpeciesId) -> Option<&Affectation> {
        self.index.get(&species).map(|&i| &self.affectations[i])
    }

    pub fn vaccines(&self) -> &[VaccineApplication] {
        &self.vaccines
    }

    /// Index of the affectation of `species`, created on first use. A new
    /// affectation adopts the first running vaccine effective on it.
    pub fn affectation_or_create(&mut self, species: &Arc<VirusSpecies>) -> usize {
        if let Some(&i) = self.index.get(&species.id()) {
            return i;
        }
        let mut affectation = Affectation::new(AffectationId::new(self.id, species.id()), Arc::clone(species));
        self.vaccines.retain(|app| !app.is_over());
        if let Some(app) = self
            .vaccines
            .iter()
            .find(|app| app.vaccine().is_some_and(|v| v.is_effective(species)))
        {
            affectation.apply_vaccine(app.clone());
        }

        let i = self.affectations.len();
        self.affectations.push(affectation);
        self.index.insert(species.id(), i);
        self.recent.push(species.id());
        i
    }

    /// Drain the species whose affectation appeared since the last call.
    pub fn recently_added(&mut self) -> Vec<SpeciesId> {
        std::mem::take(&mut self.recent)
    }

    /// Vaccinate `proportion` of the region. Replaces any running application
    /// aimed at the same species and reaches every affectation the vaccine is
    /// effective on.
    pub fn apply_vaccine(&mut self, vaccine: Arc<Vaccine>, proportion: f64) {
        let application = VaccineApplication::new(Arc::clone(&vaccine), proportion);
        self.vaccines.retain(|app| !app.targets(vaccine.target));
        self.vaccines.push(application.clone());
        for affectation in &mut self.affectations {
            if vaccine.is_effective(affectation.species()) {
                affectation.apply_vaccine(application.clone());
            }
        }
        debug!(
            event = "vaccine_applied",
            region = %self.name,
            vaccine = %vaccine,
            proportion,
            "Vaccine applied"
        );
    }

    /// Step every vaccine application once and forget the finished ones.
    pub fn advance_vaccines(&mut self) {
        for app in &mut self.vaccines {
            app.advance();
        }
        self.vaccines.retain(|app| !app.is_over());
        for affectation in &mut self.affectations {
            affectation.advance_vaccine();
        }
    }

    pub(crate) fn begin_movement(&mut self) {
        self.abroad = 0;
        for border in self.neighbours.values_mut() {
            border.movement = 0;
        }
    }

    pub(crate) fn record_departure(&mut self, neighbour: RegionId, people: Headcount) {
        if let Some(border) = self.neighbours.get_mut(&neighbour) {
            border.movement = people;
        }
        self.abroad += people;
    }

    pub(crate) fn begin_rollback(&mut self) {
        self.pre_rollback = self.inhabitants;
    }

    /// Move `people` inhabitants into `target`, together with the matching
    /// share of every affectation. Returns the number of people moved.
    ///
    /// The share of a species is taken from its affected and dead alike, so
    /// both regions keep `affected + dead <= inhabitants`. Affected people
    /// travel first with the deaths of their cohorts; retired deaths and
    /// further affected people make up the rest of the share.
    pub fn send(&mut self, target: &mut Region, people: Headcount) -> Headcount {
        let people = people.clamp(0, self.inhabitants);
        if people == 0 {
            return 0;
        }
        let before = self.inhabitants;
        self.inhabitants -= people;
        target.inhabitants += people;

        for i in 0..self.affectations.len() {
            let source = &self.affectations[i];
            let present = source.affected() + source.deaths();
            if present <= 0 {
                continue;
            }
            let share = present * people / before;
            if share <= 0 {
                continue;
            }
            let mut travellers = source.affected() * share / present;

            let species = Arc::clone(source.species());
            let j = target.affectation_or_create(&species);
            let inhabitants = target.inhabitants;
            let source = &mut self.affectations[i];
            let arrivals = &mut target.affectations[j];

            let mut outstanding = share;
            while outstanding > 0 {
                let arrived = arrivals.affected() + arrivals.deaths();
                if travellers > 0 {
                    source.transfer(
                        Destination::Into {
                            affectation: &mut *arrivals,
                            inhabitants,
                        },
                        travellers,
                    );
                }
                source.commit();
                let carried = arrivals.affected() + arrivals.deaths() - arrived;
                let handed = source.transfer_retired_deaths(arrivals, inhabitants, outstanding - carried);
                if carried + handed == 0 {
                    break;
                }
                outstanding -= carried + handed;
                travellers = outstanding.min(source.affected());
            }
            arrivals.commit();
        }
        people
    }

    /// Advance every affectation present at the start of the phase, then let
    /// each one infect new people.
    pub fn propagate(&mut self, ctx: &mut SimulationContext) {
        let mobility = self.inside_mobility;
        let present = self.affectations.len();
        for i in 0..present {
            self.affectations[i].advance();
            let newly_infected = self.affectations[i].new_infections(self.inhabitants, mobility);
            if newly_infected > 0 {
                let species = Arc::clone(self.affectations[i].species());
                species.propagate(self, newly_infected, ctx);
            }
        }
    }

    pub fn commit(&mut self) {
        for affectation in &mut self.affectations {
            affectation.commit();
        }
    }

    /// Seed `fraction` of the inhabitants with `species` before the first
    /// tick. The affected are spread evenly over the symptom period, then
    /// fast-forwarded past incubation, and a first propagation round runs.
    pub fn seed_initial_state(
        &mut self,
        species: &Arc<VirusSpecies>,
        fraction: f64,
        ctx: &mut SimulationContext,
    ) {
        let i = self.affectation_or_create(species);
        let params = species.params();
        let groups = Headcount::from(params.symptom_duration.max(1));
        let affected = (fraction * self.inhabitants as f64) as Headcount;
        let base = affected / groups;
        let larger_from = groups - affected % groups;

        for group in 0..groups {
            let people = base + Headcount::from(group >= larger_from);
            let affectation = &mut self.affectations[i];
            affectation.infect(people);
            affectation.commit();
            affectation.advance();
        }
        for _ in 1..params.incubation_time {
            self.affectations[i].commit();
            self.affectations[i].advance();
        }
        self.affectations[i].commit();

        let newly_infected = self.affectations[i].new_infections(self.inhabitants, self.inside_mobility);
        if newly_infected > 0 {
            species.propagate(self, newly_infected, ctx);
        }
        self.commit();
        debug!(
            event = "initial_state",
            region = %self.name,
            species = %species.name(),
            affected,
            newly_infected,
            "Initial state seeded"
        );
    }
}

impl Host for Region {
    fn inhabitants(&self) -> Headcount {
        self.inhabitants
    }

    fn affected(&self, species: SpeciesId) -> Headcount {
        self.affectation(species).map_or(0, Affectation::affected)
    }

    fn rivals(&self, species: &VirusSpecies) -> Vec<Arc<VirusSpecies>> {
        self.affectations
            .iter()
            .map(Affectation::species)
            .filter(|s| s.id() != species.id() && s.same_family(species))
            .cloned()
            .collect()
    }

    fn infect(&mut self, species: &Arc<VirusSpecies>, people: Headcount) {
        let i = self.affectation_or_create(species);
        self.affectations[i].infect(people);
    }

    fn cull(&mut self, species: SpeciesId, people: Headcount) -> Headcount {
        match self.index.get(&species) {
            Some(&i) => self.affectations[i].transfer(Destination::Discard, people),
            None => 0,
        }
    }

    fn convert(&mut self, from: SpeciesId, into: &Arc<VirusSpecies>, people: Headcount) -> Headcount {
        let Some(&source) = self.index.get(&from) else {
            return 0;
        };
        let target = self.affectation_or_create(into);
        if source == target {
            return 0;
        }
        let inhabitants = self.inhabitants;
        let (source, target) = pair_mut(&mut self.affectations, source, target);
        source.transfer(
            Destination::Into {
                affectation: target,
                inhabitants,
            },
            people,
        )
    }
}

/// Two distinct mutable elements of one slice.
pub(crate) fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    assert_ne!(a, b, "pair_mut needs two distinct indices");
    if a < b {
        let (left, right) = items.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
