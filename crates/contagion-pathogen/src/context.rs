//! Run-wide mutable state shared by mutation-producing calls.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::registry::SpeciesRegistry;

/// Owns the species registry and the RNG that drives mutation draws.
///
/// Passed by `&mut` into every call that may create a species, so the
/// registry is fully updated before the next propagation phase reads it.
pub struct SimulationContext {
    registry: SpeciesRegistry,
    rng: ChaCha8Rng,
}

impl SimulationContext {
    pub fn new(registry: SpeciesRegistry, seed: u64) -> Self {
        Self {
            registry,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn registry(&self) -> &SpeciesRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SpeciesRegistry {
        &mut self.registry
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }
}
