//! Spreading a species inside one host population and resolving overlap
//! between same-family species.

use contagion_core::{Headcount, SpeciesId};
use std::sync::Arc;
use tracing::debug;

use crate::context::SimulationContext;
use crate::species::{VirusKind, VirusSpecies};

/// Population a species propagates in. Implemented by regions.
pub trait Host {
    fn inhabitants(&self) -> Headcount;

    /// Living affected individuals of `species`
    fn affected(&self, species: SpeciesId) -> Headcount;

    /// Other species of the same family as `species` that are present
    fn rivals(&self, species: &VirusSpecies) -> Vec<Arc<VirusSpecies>>;

    /// Add a fresh cohort of `people` newly infected by `species`
    fn infect(&mut self, species: &Arc<VirusSpecies>, people: Headcount);

    /// Remove up to `people` affected by `species`; returns how many were removed
    fn cull(&mut self, species: SpeciesId, people: Headcount) -> Headcount;

    /// Move up to `people` from the affectation of `from` into the one of `into`
    fn convert(&mut self, from: SpeciesId, into: &Arc<VirusSpecies>, people: Headcount) -> Headcount;
}

fn proportion(people: Headcount, inhabitants: Headcount) -> f64 {
    (people as f64 / inhabitants as f64).min(1.0)
}

impl VirusSpecies {
    /// Infect `newly_infected` people of `host`.
    ///
    /// Mutable species divert a copy-error share of them into a freshly
    /// spawned variant.
    pub fn propagate(
        self: &Arc<Self>,
        host: &mut impl Host,
        newly_infected: Headcount,
        ctx: &mut SimulationContext,
    ) {
        match self.kind() {
            VirusKind::Fixed => self.spread(host, newly_infected, ctx),
            VirusKind::Mutable(traits) => {
                let errors = (newly_infected as f64 * traits.copy_error_probability) as Headcount;
                let retained = newly_infected - errors;
                if retained > 0 {
                    self.spread(host, retained, ctx);
                }
                if errors > 0 {
                    let clone = ctx.spawn_copy_error(self, traits);
                    clone.spread(host, errors, ctx);
                }
            }
        }
    }

    fn spread(self: &Arc<Self>, host: &mut impl Host, people: Headcount, ctx: &mut SimulationContext) {
        host.infect(self, people);
        self.check_overlap(host, people, ctx);
    }

    /// Resolve overlap of `people` new infections with every same-family
    /// rival present in `host`.
    pub fn check_overlap(
        self: &Arc<Self>,
        host: &mut impl Host,
        people: Headcount,
        ctx: &mut SimulationContext,
    ) {
        let inhabitants = host.inhabitants();
        if inhabitants <= 0 {
            return;
        }
        for rival in host.rivals(self) {
            let shared = proportion(people, inhabitants)
                * proportion(host.affected(rival.id()), inhabitants);
            if shared > 0.0 {
                self.resolve_overlap(host, &rival, shared, ctx);
            }
        }
    }

    /// Mutable species first divert a recombination share of the overlap
    /// into a hybrid when the rival is mutable too. The rest of the overlap
    /// is removed from the weaker species.
    pub fn resolve_overlap(
        self: &Arc<Self>,
        host: &mut impl Host,
        rival: &Arc<VirusSpecies>,
        overlap: f64,
        ctx: &mut SimulationContext,
    ) {
        match self.kind() {
            VirusKind::Fixed => self.survival(host, rival, overlap),
            VirusKind::Mutable(traits) => {
                let inhabitants = host.inhabitants() as f64;
                let diverted = if rival.is_mutable() {
                    overlap * traits.recombination_probability
                } else {
                    0.0
                };
                let total = (overlap * inhabitants) as Headcount;
                let remaining = overlap - diverted;

                self.survival(host, rival, remaining);

                let hybrids = total - (remaining * inhabitants) as Headcount;
                if hybrids > 0 {
                    let hybrid = ctx.spawn_hybrid(self, rival);
                    let moved = host.convert(self.id(), &hybrid, hybrids);
                    let removed = host.cull(rival.id(), hybrids);
                    debug!(
                        event = "recombination",
                        species = %self.name(),
                        rival = %rival.name(),
                        hybrid = %hybrid.name(),
                        moved,
                        removed,
                        "Overlap recombined into hybrid"
                    );
                }
            }
        }
    }

    fn survival(&self, host: &mut impl Host, rival: &VirusSpecies, overlap: f64) {
        let shared = (overlap * host.inhabitants() as f64) as Headcount;
        if shared <= 0 {
            return;
        }
        let (winner, loser) = if self.outcompetes(rival) {
            (self, rival)
        } else {
            (rival, self)
        };
        let removed = host.cull(loser.id(), shared);
        debug!(
            event = "overlap",
            winner = %winner.name(),
            loser = %loser.name(),
            removed,
            "Weaker species lost shared hosts"
        );
    }
}
