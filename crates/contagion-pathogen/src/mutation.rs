//! Copy-error and recombination operators.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use tracing::info;

use crate::context::SimulationContext;
use crate::species::{EpiParameters, MutationTraits, Origin, VirusKind, VirusSpecies};

fn scale_rate(rate: f64, multiplier: f64) -> f64 {
    (rate * multiplier).clamp(0.0, 1.0)
}

fn scale_ticks(ticks: u32, multiplier: f64) -> u32 {
    if ticks == 0 {
        return 0;
    }
    ((ticks as f64 * multiplier).round() as u32).max(1)
}

fn mix_rate(weight: f64, a: f64, b: f64) -> f64 {
    weight * a + (1.0 - weight) * b
}

fn mix_ticks(weight: f64, a: u32, b: u32) -> u32 {
    (weight * a as f64 + (1.0 - weight) * b as f64).round() as u32
}

/// Every parameter scaled by the same multiplier. Rates stay within [0, 1]
/// and non-zero durations never drop below one tick.
pub fn copy_error_parameters(parent: &EpiParameters, multiplier: f64) -> EpiParameters {
    EpiParameters {
        fall_sick_probability: scale_rate(parent.fall_sick_probability, multiplier),
        death_rate: scale_rate(parent.death_rate, multiplier),
        spread_rate: scale_rate(parent.spread_rate, multiplier),
        symptom_duration: scale_ticks(parent.symptom_duration, multiplier),
        incubation_time: scale_ticks(parent.incubation_time, multiplier),
        latency_time: scale_ticks(parent.latency_time, multiplier),
        immunity_duration: scale_ticks(parent.immunity_duration, multiplier),
        infection_duration: scale_ticks(parent.infection_duration, multiplier),
    }
}

/// Independent random convex combination of each parameter of `a` and `b`.
pub fn recombine_parameters(a: &EpiParameters, b: &EpiParameters, rng: &mut ChaCha8Rng) -> EpiParameters {
    EpiParameters {
        fall_sick_probability: mix_rate(rng.gen(), a.fall_sick_probability, b.fall_sick_probability),
        death_rate: mix_rate(rng.gen(), a.death_rate, b.death_rate),
        spread_rate: mix_rate(rng.gen(), a.spread_rate, b.spread_rate),
        symptom_duration: mix_ticks(rng.gen(), a.symptom_duration, b.symptom_duration),
        incubation_time: mix_ticks(rng.gen(), a.incubation_time, b.incubation_time),
        latency_time: mix_ticks(rng.gen(), a.latency_time, b.latency_time),
        immunity_duration: mix_ticks(rng.gen(), a.immunity_duration, b.immunity_duration),
        infection_duration: mix_ticks(rng.gen(), a.infection_duration, b.infection_duration),
    }
}

impl SimulationContext {
    /// Spawn a copy-error variant of `parent` and register it.
    ///
    /// The variant is named after the copy-error root of `parent` followed by
    /// that root's running copy count.
    pub fn spawn_copy_error(
        &mut self,
        parent: &Arc<VirusSpecies>,
        traits: &MutationTraits,
    ) -> Arc<VirusSpecies> {
        let max_variation = parent.family().max_variation;
        let multiplier = 1.0 + self.rng().gen_range(-max_variation..=max_variation);

        let root = parent.copy_error_root();
        let number = self.registry_mut().next_copy_number(root.id());
        let name = format!("{}{}", root.name(), number);

        let params = copy_error_parameters(parent.params(), multiplier);
        let kind = VirusKind::Mutable(MutationTraits {
            copy_error_probability: scale_rate(traits.copy_error_probability, multiplier),
            recombination_probability: scale_rate(traits.recombination_probability, multiplier),
            origin: Origin::CopyError {
                parent: Arc::clone(parent),
            },
        });

        let variant = self
            .registry_mut()
            .register_variant(&name, parent.family(), params, kind);
        info!(
            event = "species_emerged",
            origin = "copy_error",
            species = %variant.name(),
            parent = %parent.name(),
            multiplier,
            "Copy-error variant spawned"
        );
        variant
    }

    /// Spawn a hybrid of two mutable species of the same family and
    /// register it. The hybrid belongs to the family of `first`.
    pub fn spawn_hybrid(
        &mut self,
        first: &Arc<VirusSpecies>,
        second: &Arc<VirusSpecies>,
    ) -> Arc<VirusSpecies> {
        let params = recombine_parameters(first.params(), second.params(), self.rng());

        let (copy_a, recomb_a) = mutation_rates(first);
        let (copy_b, recomb_b) = mutation_rates(second);
        let copy_weight: f64 = self.rng().gen();
        let recomb_weight: f64 = self.rng().gen();

        let kind = VirusKind::Mutable(MutationTraits {
            copy_error_probability: mix_rate(copy_weight, copy_a, copy_b),
            recombination_probability: mix_rate(recomb_weight, recomb_a, recomb_b),
            origin: Origin::Recombination {
                first: Arc::clone(first),
                second: Arc::clone(second),
            },
        });

        let name = format!("{}_{}", first.name(), second.name());
        let hybrid = self
            .registry_mut()
            .register_variant(&name, first.family(), params, kind);
        info!(
            event = "species_emerged",
            origin = "recombination",
            species = %hybrid.name(),
            first = %first.name(),
            second = %second.name(),
            "Recombination hybrid spawned"
        );
        hybrid
    }
}

fn mutation_rates(species: &VirusSpecies) -> (f64, f64) {
    species
        .mutation()
        .map(|t| (t.copy_error_probability, t.recombination_probability))
        .unwrap_or((0.0, 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SpeciesRegistry;
    use crate::species::tests::params;
    use rand::SeedableRng;

    fn context_with_root() -> (SimulationContext, Arc<VirusSpecies>) {
        let mut registry = SpeciesRegistry::new();
        let family = registry.add_family("corona", 0.2).unwrap();
        let root = registry
            .add_species(
                "sars",
                &family,
                params(),
                VirusKind::Mutable(MutationTraits::root(0.1, 0.3)),
            )
            .unwrap();
        (SimulationContext::new(registry, 42), root)
    }

    #[test]
    fn test_copy_error_parameters_clamp() {
        let mut parent = params();
        parent.spread_rate = 0.9;
        parent.incubation_time = 0;

        let child = copy_error_parameters(&parent, 1.2);
        assert_eq!(child.spread_rate, 1.0);
        assert!((child.fall_sick_probability - 0.6).abs() < 1e-12);
        assert_eq!(child.symptom_duration, 6);
        assert_eq!(child.incubation_time, 0);

        let shrunk = copy_error_parameters(&parent, 0.1);
        assert_eq!(shrunk.latency_time, 1);
    }

    #[test]
    fn test_recombination_stays_between_parents() {
        let a = params();
        let mut b = params();
        b.spread_rate = 0.9;
        b.symptom_duration = 15;

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            let mixed = recombine_parameters(&a, &b, &mut rng);
            assert!(mixed.spread_rate >= a.spread_rate - 1e-9 && mixed.spread_rate <= b.spread_rate + 1e-9);
            assert!(mixed.symptom_duration >= 5 && mixed.symptom_duration <= 15);
            assert_eq!(mixed.latency_time, a.latency_time);
        }
    }

    #[test]
    fn test_copy_error_names_follow_root() {
        let (mut ctx, root) = context_with_root();
        let traits = root.mutation().unwrap().clone();

        let first = ctx.spawn_copy_error(&root, &traits);
        assert_eq!(first.name(), "sars1");
        assert!(first.descends_from(root.id()));

        // a copy of a copy is still numbered against the root
        let first_traits = first.mutation().unwrap().clone();
        let second = ctx.spawn_copy_error(&first, &first_traits);
        assert_eq!(second.name(), "sars2");
        assert!(second.descends_from(root.id()));
        assert_eq!(ctx.registry().len(), 3);
    }

    #[test]
    fn test_copy_error_drift_is_bounded() {
        let (mut ctx, root) = context_with_root();
        let traits = root.mutation().unwrap().clone();
        for _ in 0..20 {
            let variant = ctx.spawn_copy_error(&root, &traits);
            let ratio = variant.params().fall_sick_probability / root.params().fall_sick_probability;
            assert!((0.8 - 1e-9..=1.2 + 1e-9).contains(&ratio));
        }
    }

    #[test]
    fn test_hybrid_registration() {
        let (mut ctx, root) = context_with_root();
        let family = Arc::clone(root.family());
        let other = ctx
            .registry_mut()
            .add_species(
                "mers",
                &family,
                params(),
                VirusKind::Mutable(MutationTraits::root(0.2, 0.1)),
            )
            .unwrap();

        let hybrid = ctx.spawn_hybrid(&root, &other);
        assert_eq!(hybrid.name(), "sars_mers");
        assert!(hybrid.descends_from(root.id()));
        assert!(hybrid.descends_from(other.id()));
        assert!(hybrid.same_family(&root));

        let traits = hybrid.mutation().unwrap();
        assert!((0.1 - 1e-9..=0.2 + 1e-9).contains(&traits.copy_error_probability));

        let again = ctx.spawn_hybrid(&root, &other);
        assert_eq!(again.name(), "sars_mers-2");
    }

    #[test]
    fn test_same_seed_same_variants() {
        let (mut a, root_a) = context_with_root();
        let (mut b, root_b) = context_with_root();
        let traits = root_a.mutation().unwrap().clone();
        let va = a.spawn_copy_error(&root_a, &traits);
        let vb = b.spawn_copy_error(&root_b, &traits);
        assert_eq!(va.params(), vb.params());
    }
}
