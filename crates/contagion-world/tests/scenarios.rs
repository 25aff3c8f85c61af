//! Whole-simulation scenarios run through the public API.

use contagion_core::{Bucket, ScenarioConfig};
use contagion_world::Simulation;
use serde_json::{json, Value};

fn species(mutation: Option<Value>) -> Value {
    let mut species = json!({
        "name": "sars", "family": "corona",
        "fall_sick_probability": 0.5, "death_rate": 0.1, "spread_rate": 0.3,
        "symptom_duration": 5, "incubation_time": 3, "latency_time": 2,
        "immunity_duration": 10, "infection_duration": 4
    });
    if let Some(mutation) = mutation {
        species["mutation"] = mutation;
    }
    species
}

fn two_regions(seed: u64, mutation: Option<Value>) -> ScenarioConfig {
    serde_json::from_value(json!({
        "simulation": { "num_ticks": 20, "seed": seed, "summary_interval": 0 },
        "families": [{ "name": "corona", "max_variation": 0.2 }],
        "species": [species(mutation)],
        "regions": [
            { "name": "north", "inhabitants": 10000, "inside_mobility": 2.0 },
            { "name": "south", "inhabitants": 4000, "inside_mobility": 1.5 }
        ],
        "borders": [
            { "region": "north", "neighbour": "south", "flow_rate": 0.05 },
            { "region": "south", "neighbour": "north", "flow_rate": 0.1 }
        ],
        "initial_states": [{ "region": "north", "species": "sars", "affected_fraction": 0.01 }]
    }))
    .unwrap()
}

fn single_region(vaccinated: bool) -> ScenarioConfig {
    let interventions = if vaccinated {
        json!([{
            "at_tick": 0,
            "action": { "type": "apply_vaccine", "vaccine": "shield", "region": "north", "proportion": 1.0 }
        }])
    } else {
        json!([])
    };
    serde_json::from_value(json!({
        "simulation": { "num_ticks": 10, "seed": 1, "summary_interval": 0 },
        "families": [{ "name": "corona", "max_variation": 0.1 }],
        "species": [species(None)],
        "vaccines": [{
            "name": "shield", "target": "sars", "delay": 0, "effect_duration": 30,
            "effect": { "kind": "suppressive", "effectiveness_ratio": 1.0 }
        }],
        "regions": [{ "name": "north", "inhabitants": 10000, "inside_mobility": 2.0 }],
        "initial_states": [{ "region": "north", "species": "sars", "affected_fraction": 0.01 }],
        "interventions": interventions
    }))
    .unwrap()
}

#[test]
fn test_population_conserved_across_ticks() {
    let mut sim = Simulation::from_scenario(two_regions(11, None)).unwrap();
    for _ in 0..20 {
        sim.tick().unwrap();
        let regions = sim.territory().regions();
        assert_eq!(regions[0].inhabitants(), 10000);
        assert_eq!(regions[1].inhabitants(), 4000);
        for summary in sim.summaries() {
            for bucket in Bucket::all() {
                assert!(summary.counts.get(bucket) >= 0, "{} negative in {}", bucket.name(), summary.region);
            }
            assert!(summary.healthy() >= 0, "{} over capacity in {}", summary.species, summary.region);
        }
        assert_eq!(sim.totals().inhabitants, 14000);
    }
}

/// Lethal species, busy borders and most of one region infected up front
fn crowded_borders() -> ScenarioConfig {
    serde_json::from_value(json!({
        "simulation": { "num_ticks": 80, "seed": 5, "summary_interval": 0 },
        "families": [{ "name": "corona", "max_variation": 0.1 }],
        "species": [{
            "name": "sars", "family": "corona",
            "fall_sick_probability": 0.9, "death_rate": 0.6, "spread_rate": 0.3,
            "symptom_duration": 5, "incubation_time": 3, "latency_time": 2,
            "immunity_duration": 10, "infection_duration": 4
        }],
        "regions": [
            { "name": "north", "inhabitants": 1000, "inside_mobility": 10.0 },
            { "name": "south", "inhabitants": 1000, "inside_mobility": 10.0 }
        ],
        "borders": [
            { "region": "north", "neighbour": "south", "flow_rate": 0.3 },
            { "region": "south", "neighbour": "north", "flow_rate": 0.3 }
        ],
        "initial_states": [{ "region": "north", "species": "sars", "affected_fraction": 0.5 }]
    }))
    .unwrap()
}

#[test]
fn test_affected_and_dead_fit_in_region_while_travelling() {
    let mut sim = Simulation::from_scenario(crowded_borders()).unwrap();
    let mut dead_seen = false;
    for _ in 0..80 {
        sim.tick().unwrap();
        for summary in sim.summaries() {
            assert!(
                summary.healthy() >= 0,
                "tick {}: {} has {} affected and {} dead for {} inhabitants",
                sim.current_tick(),
                summary.region,
                summary.counts.affected,
                summary.counts.dead,
                summary.inhabitants
            );
            dead_seen |= summary.counts.dead > 0;
        }
        assert_eq!(sim.totals().inhabitants, 2000);
    }
    assert!(dead_seen);
}

#[test]
fn test_same_seed_same_run() {
    let mutation = json!({ "copy_error_probability": 0.2, "recombination_probability": 0.3 });
    let first = Simulation::from_scenario(two_regions(42, Some(mutation.clone())))
        .unwrap()
        .run()
        .unwrap();
    let second = Simulation::from_scenario(two_regions(42, Some(mutation)))
        .unwrap()
        .run()
        .unwrap();

    assert!(first.species.len() > 1);
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

#[test]
fn test_mutants_descend_from_root() {
    let mutation = json!({ "copy_error_probability": 0.2, "recombination_probability": 0.3 });
    let mut sim = Simulation::from_scenario(two_regions(7, Some(mutation))).unwrap();
    let report = sim.run().unwrap();

    let root = sim.registry().by_name("sars").unwrap().id();
    for species in sim.registry().iter() {
        assert!(species.descends_from(root), "{} is not a sars descendant", species.name());
    }
    assert!(report.species.iter().skip(1).all(|s| !s.parents.is_empty()));
}

#[test]
fn test_lockdown_keeps_species_out() {
    let mut config = two_regions(3, None);
    config.interventions = serde_json::from_value(json!([{
        "at_tick": 0,
        "action": { "type": "set_lockdown", "region": "north", "enabled": true, "reduced_flow_rate": 0.5 }
    }]))
    .unwrap();

    let mut sim = Simulation::from_scenario(config).unwrap();
    let report = sim.run().unwrap();

    assert!(report.emergences.iter().all(|e| e.region != "south"));
    let south = sim.summary("south", "sars").unwrap();
    assert_eq!(south.counts.affected, 0);
    assert_eq!(south.counts.dead, 0);
}

#[test]
fn test_closed_border_keeps_species_out() {
    let mut config = two_regions(3, None);
    for border in &mut config.borders {
        border.open = false;
    }
    let mut sim = Simulation::from_scenario(config).unwrap();
    sim.run().unwrap();
    assert_eq!(sim.summary("south", "sars").unwrap().counts.affected, 0);
}

#[test]
fn test_suppressive_vaccine_stops_new_infections() {
    let mut vaccinated = Simulation::from_scenario(single_region(true)).unwrap();
    let mut control = Simulation::from_scenario(single_region(false)).unwrap();

    let mut control_infections = 0;
    for _ in 0..10 {
        vaccinated.tick().unwrap();
        control.tick().unwrap();

        let summary = vaccinated.summary("north", "sars").unwrap();
        assert_eq!(summary.flows.get(Bucket::Latent).inflow, 0);
        control_infections += control.summary("north", "sars").unwrap().flows.get(Bucket::Latent).inflow;
    }
    assert!(control_infections > 0);

    let summary = vaccinated.summary("north", "sars").unwrap();
    assert_eq!(summary.vaccine.as_deref(), Some("shield"));
    assert_eq!(summary.vaccine_remaining_ticks, 20);
}
