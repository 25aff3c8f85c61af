//! Scenario assembly, commands and the run loop.

use contagion_core::{
    AffectationSummary, Error, Headcount, InterventionAction, InterventionConfig, RegionId, Result, ScenarioConfig,
    SimulationConfig, SpeciesId, SummaryTotals, VaccineEffectConfig, VaccineId,
};
use contagion_pathogen::{
    validate_family, validate_parameters, validate_vaccine, Attenuation, EpiParameters, MutationTraits,
    SimulationContext, SpeciesRegistry, Vaccine, VaccineKind, VirusKind, VirusSpecies,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::territory::Territory;

/// A species whose affectation first appeared in a region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesEmergence {
    pub tick: u64,
    pub region: String,
    pub species: String,
}

/// Catalogue entry for one species
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesInfo {
    pub name: String,
    pub family: String,
    pub mutable: bool,
    pub parents: Vec<String>,
}

impl SpeciesInfo {
    fn from_species(species: &VirusSpecies) -> Self {
        Self {
            name: species.name().to_string(),
            family: species.family().name.clone(),
            mutable: species.is_mutable(),
            parents: species.parents().iter().map(|p| p.name().to_string()).collect(),
        }
    }
}

/// Final state of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub ticks: u64,
    pub species: Vec<SpeciesInfo>,
    pub emergences: Vec<SpeciesEmergence>,
    pub summaries: Vec<AffectationSummary>,
    pub totals: SummaryTotals,
}

impl SimulationReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct Simulation {
    config: SimulationConfig,
    ctx: SimulationContext,
    territory: Territory,
    vaccines: Vec<Arc<Vaccine>>,
    interventions: Vec<InterventionConfig>,
    emergences: Vec<SpeciesEmergence>,
}

fn check_fraction(what: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::Validation(format!("{} must be within [0, 1], got {}", what, value)));
    }
    Ok(())
}

impl Simulation {
    /// Validate a scenario and build the simulation, seeding initial states.
    pub fn from_scenario(scenario: ScenarioConfig) -> Result<Self> {
        let mut registry = SpeciesRegistry::new();

        for family in &scenario.families {
            let family = registry.add_family(&family.name, family.max_variation)?;
            validate_family(&family)?;
        }

        for species in &scenario.species {
            let family = registry
                .family_by_name(&species.family)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("family '{}'", species.family)))?;
            let params = EpiParameters {
                fall_sick_probability: species.fall_sick_probability,
                death_rate: species.death_rate,
                spread_rate: species.spread_rate,
                symptom_duration: species.symptom_duration,
                incubation_time: species.incubation_time,
                latency_time: species.latency_time,
                immunity_duration: species.immunity_duration,
                infection_duration: species.infection_duration,
            };
            let kind = match &species.mutation {
                Some(m) => VirusKind::Mutable(MutationTraits::root(
                    m.copy_error_probability,
                    m.recombination_probability,
                )),
                None => VirusKind::Fixed,
            };
            validate_parameters(&species.name, &params, &kind)?;
            registry.add_species(&species.name, &family, params, kind)?;
        }

        let mut vaccines: Vec<Arc<Vaccine>> = Vec::new();
        for config in &scenario.vaccines {
            if vaccines.iter().any(|v| v.name == config.name) {
                return Err(Error::AlreadyExists(format!("vaccine '{}'", config.name)));
            }
            let target = registry
                .by_name(&config.target)
                .ok_or_else(|| Error::NotFound(format!("species '{}'", config.target)))?
                .id();
            let kind = match config.effect {
                VaccineEffectConfig::Suppressive { effectiveness_ratio } => {
                    VaccineKind::Suppressive { effectiveness_ratio }
                }
                VaccineEffectConfig::Attenuating {
                    mortality,
                    duration,
                    fall_sick,
                    contagiousness,
                } => VaccineKind::Attenuating(Attenuation {
                    mortality,
                    duration,
                    fall_sick,
                    contagiousness,
                }),
            };
            let vaccine = Vaccine {
                id: VaccineId(vaccines.len()),
                name: config.name.clone(),
                target,
                delay: config.delay,
                effect_duration: config.effect_duration,
                kind,
            };
            validate_vaccine(&vaccine)?;
            vaccines.push(Arc::new(vaccine));
        }

        let mut territory = Territory::new();
        for region in &scenario.regions {
            if territory.region_by_name(&region.name).is_some() {
                return Err(Error::AlreadyExists(format!("region '{}'", region.name)));
            }
            if region.inhabitants < 0 {
                return Err(Error::Validation(format!(
                    "region '{}': inhabitants must not be negative",
                    region.name
                )));
            }
            if region.inside_mobility < 0.0 {
                return Err(Error::Validation(format!(
                    "region '{}': inside_mobility must not be negative",
                    region.name
                )));
            }
            territory.add_region(&region.name, region.inhabitants, region.inside_mobility);
        }

        let region_id = |territory: &Territory, name: &str| -> Result<RegionId> {
            territory
                .region_by_name(name)
                .map(|r| r.id())
                .ok_or_else(|| Error::NotFound(format!("region '{}'", name)))
        };

        for border in &scenario.borders {
            let from = region_id(&territory, &border.region)?;
            let to = region_id(&territory, &border.neighbour)?;
            if from == to {
                return Err(Error::Validation(format!("region '{}' cannot border itself", border.region)));
            }
            check_fraction(&format!("border {} -> {} flow_rate", border.region, border.neighbour), border.flow_rate)?;
            territory.add_border(from, to, border.flow_rate, border.open);
        }
        for region in territory.regions() {
            let outgoing: f64 = region.neighbours().values().map(|b| b.flow_rate).sum();
            if outgoing > 1.0 {
                return Err(Error::Validation(format!(
                    "region '{}': outgoing flow rates sum to {}",
                    region.name(),
                    outgoing
                )));
            }
        }

        let mut ctx = SimulationContext::new(registry, scenario.simulation.seed);

        for state in &scenario.initial_states {
            let region = region_id(&territory, &state.region)?;
            let species = ctx
                .registry()
                .by_name(&state.species)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("species '{}'", state.species)))?;
            check_fraction(&format!("initial state {}/{}", state.region, state.species), state.affected_fraction)?;
            territory
                .region_mut(region)
                .seed_initial_state(&species, state.affected_fraction, &mut ctx);
        }

        let mut interventions = scenario.interventions;
        interventions.sort_by_key(|i| i.at_tick);

        let mut simulation = Self {
            config: scenario.simulation,
            ctx,
            territory,
            vaccines,
            interventions,
            emergences: Vec::new(),
        };
        for intervention in &simulation.interventions {
            simulation.check_intervention(&intervention.action)?;
        }
        // affectations created while seeding are not emergences
        for i in 0..simulation.territory.regions().len() {
            simulation.territory.region_mut(RegionId(i)).recently_added();
        }

        info!(
            event = "simulation_created",
            regions = simulation.territory.regions().len(),
            species = simulation.ctx.registry().len(),
            vaccines = simulation.vaccines.len(),
            interventions = simulation.interventions.len(),
            seed = simulation.config.seed,
            "Simulation assembled"
        );
        Ok(simulation)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn territory(&self) -> &Territory {
        &self.territory
    }

    pub fn registry(&self) -> &SpeciesRegistry {
        self.ctx.registry()
    }

    pub fn current_tick(&self) -> u64 {
        self.territory.current_tick()
    }

    pub fn emergences(&self) -> &[SpeciesEmergence] {
        &self.emergences
    }

    fn region_id(&self, name: &str) -> Result<RegionId> {
        self.territory
            .region_by_name(name)
            .map(|r| r.id())
            .ok_or_else(|| Error::NotFound(format!("region '{}'", name)))
    }

    fn species_id(&self, name: &str) -> Result<SpeciesId> {
        self.ctx
            .registry()
            .by_name(name)
            .map(|s| s.id())
            .ok_or_else(|| Error::NotFound(format!("species '{}'", name)))
    }

    fn vaccine(&self, name: &str) -> Result<Arc<Vaccine>> {
        self.vaccines
            .iter()
            .find(|v| v.name == name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("vaccine '{}'", name)))
    }

    fn check_intervention(&self, action: &InterventionAction) -> Result<()> {
        match action {
            InterventionAction::ApplyVaccine {
                vaccine,
                region,
                proportion,
            } => {
                self.vaccine(vaccine)?;
                self.region_id(region)?;
                check_fraction("vaccine proportion", *proportion)
            }
            InterventionAction::SetBorder { region, neighbour, .. } => {
                let a = self.region_id(region)?;
                let b = self.region_id(neighbour)?;
                let shared = self.territory.region(a).neighbours().contains_key(&b)
                    || self.territory.region(b).neighbours().contains_key(&a);
                if !shared {
                    return Err(Error::NotFound(format!("border between '{}' and '{}'", region, neighbour)));
                }
                Ok(())
            }
            InterventionAction::SetLockdown {
                region,
                reduced_flow_rate,
                ..
            } => {
                self.region_id(region)?;
                check_fraction("reduced_flow_rate", *reduced_flow_rate)
            }
        }
    }

    /// Vaccinate `proportion` of region `region` with `vaccine`.
    pub fn apply_vaccine(&mut self, vaccine: &str, region: &str, proportion: f64) -> Result<()> {
        check_fraction("vaccine proportion", proportion)?;
        let vaccine = self.vaccine(vaccine)?;
        let region = self.region_id(region)?;
        self.territory.apply_vaccine(region, vaccine, proportion);
        Ok(())
    }

    /// Open or close the border between two regions, both directions.
    pub fn set_border_state(&mut self, region: &str, neighbour: &str, open: bool) -> Result<()> {
        let a = self.region_id(region)?;
        let b = self.region_id(neighbour)?;
        if !self.territory.set_border_state(a, b, open) {
            return Err(Error::NotFound(format!("border between '{}' and '{}'", region, neighbour)));
        }
        Ok(())
    }

    pub fn set_hard_lockdown(&mut self, region: &str, enabled: bool, reduced_flow_rate: f64) -> Result<()> {
        check_fraction("reduced_flow_rate", reduced_flow_rate)?;
        let id = self.region_id(region)?;
        self.territory.set_hard_lockdown(id, enabled, reduced_flow_rate);
        Ok(())
    }

    fn apply_intervention(&mut self, action: &InterventionAction) -> Result<()> {
        match action {
            InterventionAction::ApplyVaccine {
                vaccine,
                region,
                proportion,
            } => self.apply_vaccine(vaccine, region, *proportion),
            InterventionAction::SetBorder { region, neighbour, open } => {
                self.set_border_state(region, neighbour, *open)
            }
            InterventionAction::SetLockdown {
                region,
                enabled,
                reduced_flow_rate,
            } => self.set_hard_lockdown(region, *enabled, *reduced_flow_rate),
        }
    }

    /// Run the interventions scheduled for the coming tick, then advance the
    /// territory one tick and record new species appearances.
    pub fn tick(&mut self) -> Result<()> {
        let tick = self.current_tick();
        let due: Vec<InterventionConfig> = self
            .interventions
            .iter()
            .filter(|i| i.at_tick == tick)
            .cloned()
            .collect();
        for intervention in &due {
            info!(event = "intervention", tick, action = ?intervention.action, "Applying intervention");
            self.apply_intervention(&intervention.action)?;
        }

        self.territory.tick(&mut self.ctx);

        let tick = self.current_tick();
        for i in 0..self.territory.regions().len() {
            let region = self.territory.region_mut(RegionId(i));
            let added = region.recently_added();
            let region_name = region.name().to_string();
            for species in added {
                let emergence = SpeciesEmergence {
                    tick,
                    region: region_name.clone(),
                    species: self.ctx.registry().get(species).name().to_string(),
                };
                info!(
                    event = "species_arrived",
                    tick,
                    region = %emergence.region,
                    species = %emergence.species,
                    "Species reached region"
                );
                self.emergences.push(emergence);
            }
        }
        Ok(())
    }

    /// Run the configured number of ticks and produce the report.
    #[instrument(skip(self), fields(num_ticks = self.config.num_ticks, seed = self.config.seed))]
    pub fn run(&mut self) -> Result<SimulationReport> {
        info!("Starting simulation for {} ticks", self.config.num_ticks);

        for _ in 0..self.config.num_ticks {
            self.tick()?;
            let tick = self.current_tick();
            if self.config.summary_interval > 0 && tick % self.config.summary_interval == 0 {
                self.emit_progress(tick);
            }
        }

        let report = self.report();
        info!(
            event = "simulation_complete",
            ticks = report.ticks,
            species = report.species.len(),
            emergences = report.emergences.len(),
            affected = report.totals.counts.affected,
            dead = report.totals.counts.dead,
            "Simulation complete"
        );
        Ok(report)
    }

    fn emit_progress(&self, tick: u64) {
        let totals = self.totals();
        info!(
            event = "progress",
            tick,
            species = self.ctx.registry().len(),
            affected = totals.counts.affected,
            contagious = totals.counts.contagious,
            symptomatic = totals.counts.symptomatic,
            dead = totals.counts.dead,
            transmission_ratio = totals.transmission_ratio(),
            "Tick {}/{}",
            tick,
            self.config.num_ticks
        );
        for summary in self.summaries() {
            debug!(
                event = "affectation_summary",
                tick,
                region = %summary.region,
                species = %summary.species,
                affected = summary.counts.affected,
                healthy = summary.healthy(),
                dead = summary.counts.dead,
                vaccine_remaining_ticks = summary.vaccine_remaining_ticks,
                "Affectation state"
            );
        }
    }

    /// Snapshot of species `species` in region `region`. A species that never
    /// reached the region yields an all-zero summary.
    pub fn summary(&self, region: &str, species: &str) -> Result<AffectationSummary> {
        let region = self.territory.region(self.region_id(region)?);
        let species_id = self.species_id(species)?;
        Ok(match region.affectation(species_id) {
            Some(affectation) => affectation.summary(region.name(), region.inhabitants()),
            None => AffectationSummary {
                region: region.name().to_string(),
                species: species.to_string(),
                inhabitants: region.inhabitants(),
                counts: Default::default(),
                flows: Default::default(),
                expired: 0,
                vaccine: None,
                vaccine_remaining_ticks: 0,
            },
        })
    }

    /// Snapshots of every affectation, region by region
    pub fn summaries(&self) -> Vec<AffectationSummary> {
        self.territory
            .regions()
            .iter()
            .flat_map(|region| {
                region
                    .affectations()
                    .iter()
                    .map(move |a| a.summary(region.name(), region.inhabitants()))
            })
            .collect()
    }

    /// Sum over all affectations; every region's inhabitants counted once.
    pub fn totals(&self) -> SummaryTotals {
        let summaries = self.summaries();
        let mut totals = SummaryTotals::from_summaries(&summaries);
        let counted: HashSet<&str> = summaries.iter().map(|s| s.region.as_str()).collect();
        let missing: Headcount = self
            .territory
            .regions()
            .iter()
            .filter(|r| !counted.contains(r.name()))
            .map(|r| r.inhabitants())
            .sum();
        totals.inhabitants += missing;
        totals
    }

    pub fn species_catalogue(&self) -> Vec<SpeciesInfo> {
        self.ctx
            .registry()
            .iter()
            .map(|s| SpeciesInfo::from_species(s))
            .collect()
    }

    pub fn report(&self) -> SimulationReport {
        SimulationReport {
            ticks: self.current_tick(),
            species: self.species_catalogue(),
            emergences: self.emergences.clone(),
            summaries: self.summaries(),
            totals: self.totals(),
        }
    }
}
