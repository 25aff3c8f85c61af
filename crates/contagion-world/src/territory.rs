//! The set of regions and the four-phase tick that drives them.

use contagion_core::{Headcount, RegionId};
use contagion_pathogen::{SimulationContext, Vaccine};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::region::{pair_mut, Border, Region};

/// A planned crossing of one border during the movement phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Crossing {
    from: RegionId,
    to: RegionId,
    people: Headcount,
}

#[derive(Debug, Clone, Default)]
pub struct Territory {
    regions: Vec<Region>,
    tick: u64,
}

impl Territory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a region; its id is its position in the territory.
    pub fn add_region(&mut self, name: &str, inhabitants: Headcount, inside_mobility: f64) -> RegionId {
        let id = RegionId(self.regions.len());
        self.regions.push(Region::new(id, name, inhabitants, inside_mobility));
        id
    }

    pub fn add_border(&mut self, from: RegionId, to: RegionId, flow_rate: f64, open: bool) {
        self.regions[from.0].add_neighbour(to, Border::new(flow_rate, open));
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, id: RegionId) -> &Region {
        &self.regions[id.0]
    }

    pub fn region_mut(&mut self, id: RegionId) -> &mut Region {
        &mut self.regions[id.0]
    }

    pub fn region_by_name(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name() == name)
    }

    /// Ticks simulated so far
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Advance the whole territory one tick. Each phase completes for every
    /// region before the next one starts.
    pub fn tick(&mut self, ctx: &mut SimulationContext) {
        self.movement_phase();
        for region in &mut self.regions {
            region.propagate(ctx);
        }
        self.rollback_phase();
        for region in &mut self.regions {
            region.commit();
        }
        self.tick += 1;
        debug!(event = "tick_complete", tick = self.tick, "Tick complete");
    }

    /// Every crossing is planned from the populations at the start of the
    /// phase, then executed in region order.
    fn movement_phase(&mut self) {
        for region in &mut self.regions {
            region.advance_vaccines();
            region.begin_movement();
        }

        let crossings = self.plan_crossings();
        for crossing in crossings {
            let (from, to) = pair_mut(&mut self.regions, crossing.from.0, crossing.to.0);
            let moved = from.send(to, crossing.people);
            from.record_departure(crossing.to, moved);
            trace!(
                event = "movement",
                from = %from.name(),
                to = %to.name(),
                moved,
                "Inhabitants travelled"
            );
        }
    }

    fn plan_crossings(&self) -> Vec<Crossing> {
        let mut crossings = Vec::new();
        for region in &self.regions {
            if region.is_locked_down() {
                continue;
            }
            for (&neighbour, border) in region.neighbours() {
                if !border.open || self.regions[neighbour.0].is_locked_down() {
                    continue;
                }
                let people = (region.inhabitants() as f64 * border.flow_rate) as Headcount;
                if people > 0 {
                    crossings.push(Crossing {
                        from: region.id(),
                        to: neighbour,
                        people,
                    });
                }
            }
        }
        crossings
    }

    /// Send every traveller of this tick back home with its current state.
    fn rollback_phase(&mut self) {
        for region in &mut self.regions {
            region.begin_rollback();
        }

        let returns: Vec<Crossing> = self
            .regions
            .iter()
            .flat_map(|region| {
                region
                    .neighbours()
                    .iter()
                    .filter(|(_, border)| border.movement > 0)
                    .map(move |(&neighbour, border)| Crossing {
                        from: neighbour,
                        to: region.id(),
                        people: border.movement,
                    })
            })
            .collect();

        for crossing in returns {
            let (from, to) = pair_mut(&mut self.regions, crossing.from.0, crossing.to.0);
            from.send(to, crossing.people);
            if let Some(border) = to.border_mut(crossing.from) {
                border.movement = 0;
            }
        }
    }

    pub fn apply_vaccine(&mut self, region: RegionId, vaccine: Arc<Vaccine>, proportion: f64) {
        self.regions[region.0].apply_vaccine(vaccine, proportion);
    }

    /// Open or close the border between `a` and `b` in both directions.
    /// Returns false when the regions share no border.
    pub fn set_border_state(&mut self, a: RegionId, b: RegionId, open: bool) -> bool {
        let mut found = false;
        for (from, to) in [(a, b), (b, a)] {
            if let Some(border) = self.regions[from.0].border_mut(to) {
                border.open = open;
                found = true;
            }
        }
        found
    }

    pub fn set_hard_lockdown(&mut self, region: RegionId, enabled: bool, reduced_flow_rate: f64) {
        self.regions[region.0].set_hard_lockdown(enabled, reduced_flow_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort::tests::params;
    use contagion_pathogen::{Host, SpeciesRegistry, VirusKind, VirusSpecies};

    fn setup() -> (Territory, SimulationContext, Arc<VirusSpecies>) {
        let mut registry = SpeciesRegistry::new();
        let family = registry.add_family("corona", 0.1).unwrap();
        let species = registry
            .add_species("sars", &family, params(), VirusKind::Fixed)
            .unwrap();

        let mut territory = Territory::new();
        let a = territory.add_region("north", 1000, 0.0);
        let b = territory.add_region("south", 1000, 0.0);
        territory.add_border(a, b, 0.1, true);
        territory.add_border(b, a, 0.2, true);
        (territory, SimulationContext::new(registry, 9), species)
    }

    #[test]
    fn test_rollback_restores_inhabitants() {
        let (mut territory, mut ctx, _) = setup();
        territory.tick(&mut ctx);
        assert_eq!(territory.region(RegionId(0)).inhabitants(), 1000);
        assert_eq!(territory.region(RegionId(1)).inhabitants(), 1000);
        assert_eq!(territory.region(RegionId(0)).abroad(), 100);
        assert_eq!(territory.region(RegionId(0)).foreign(), 200);
        assert_eq!(territory.current_tick(), 1);
    }

    #[test]
    fn test_travellers_return_home() {
        let (mut territory, mut ctx, species) = setup();
        let north = territory.region_mut(RegionId(0));
        Host::infect(north, &species, 100);
        north.commit();

        territory.tick(&mut ctx);
        // no internal mobility, so nobody new is infected; returns are
        // proportional, so the affected mix between regions may shift
        let north = territory.region(RegionId(0));
        let south = territory.region(RegionId(1));
        let total = |r: &Region| r.affectation(species.id()).map_or(0, |a| a.affected() + a.deaths());
        assert_eq!(total(north) + total(south), 100);
        assert_eq!(north.inhabitants(), 1000);
        assert_eq!(south.inhabitants(), 1000);
    }

    #[test]
    fn test_lockdown_blocks_movement() {
        let (mut territory, mut ctx, _) = setup();
        territory.set_hard_lockdown(RegionId(1), true, 0.5);
        territory.tick(&mut ctx);
        assert_eq!(territory.region(RegionId(0)).abroad(), 0);
        assert_eq!(territory.region(RegionId(1)).abroad(), 0);
    }

    #[test]
    fn test_closed_border_both_directions() {
        let (mut territory, mut ctx, _) = setup();
        assert!(territory.set_border_state(RegionId(0), RegionId(1), false));
        territory.tick(&mut ctx);
        assert_eq!(territory.region(RegionId(0)).abroad(), 0);
        assert_eq!(territory.region(RegionId(1)).abroad(), 0);

        assert!(territory.set_border_state(RegionId(1), RegionId(0), true));
        territory.tick(&mut ctx);
        assert_eq!(territory.region(RegionId(1)).abroad(), 200);
    }

    #[test]
    fn test_region_by_name() {
        let (territory, _, _) = setup();
        assert_eq!(territory.region_by_name("south").map(Region::id), Some(RegionId(1)));
        assert!(territory.region_by_name("east").is_none());
    }
}
