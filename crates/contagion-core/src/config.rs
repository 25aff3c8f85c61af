//! Configuration types for a simulation scenario.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Headcount, Result};

/// Run parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of ticks to simulate
    pub num_ticks: u64,
    /// Random seed for reproducibility
    pub seed: u64,
    /// Emit a summary log line every N ticks (0 disables)
    pub summary_interval: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_ticks: 100,
            seed: 0,
            summary_interval: 10,
        }
    }
}

/// A family of virus species that compete for the same hosts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyConfig {
    pub name: String,
    /// Upper bound of the copy-error parameter drift (0.0 to 1.0)
    pub max_variation: f64,
}

/// Mutation capability of a species
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationConfig {
    /// Fraction of new infections that spawn a copy-error variant
    pub copy_error_probability: f64,
    /// Fraction of a same-family overlap that recombines into a hybrid
    pub recombination_probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesConfig {
    pub name: String,
    pub family: String,
    pub fall_sick_probability: f64,
    pub death_rate: f64,
    pub spread_rate: f64,
    pub symptom_duration: u32,
    pub incubation_time: u32,
    pub latency_time: u32,
    pub immunity_duration: u32,
    pub infection_duration: u32,
    /// `None` for species that never mutate
    #[serde(default)]
    pub mutation: Option<MutationConfig>,
}

/// What a vaccine does to the epidemiological parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VaccineEffectConfig {
    /// Reduces virus effectiveness by `effectiveness_ratio`
    Suppressive { effectiveness_ratio: f64 },
    /// Scales the other parameters by fixed factors
    Attenuating {
        mortality: f64,
        duration: f64,
        fall_sick: f64,
        contagiousness: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaccineConfig {
    pub name: String,
    /// Name of the targeted species
    pub target: String,
    /// Ticks until the vaccine takes effect
    pub delay: u32,
    /// Ticks the effect lasts
    pub effect_duration: u32,
    pub effect: VaccineEffectConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    pub name: String,
    pub inhabitants: Headcount,
    pub inside_mobility: f64,
}

/// Directed travel flow between two regions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorderConfig {
    pub region: String,
    pub neighbour: String,
    /// Fraction of inhabitants crossing per tick
    pub flow_rate: f64,
    #[serde(default = "default_open")]
    pub open: bool,
}

fn default_open() -> bool {
    true
}

/// Share of a region affected by a species before tick 0
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialStateConfig {
    pub region: String,
    pub species: String,
    /// 0.0 to 1.0
    pub affected_fraction: f64,
}

/// A command applied between ticks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterventionAction {
    ApplyVaccine {
        vaccine: String,
        region: String,
        proportion: f64,
    },
    SetBorder {
        region: String,
        neighbour: String,
        open: bool,
    },
    SetLockdown {
        region: String,
        enabled: bool,
        #[serde(default)]
        reduced_flow_rate: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionConfig {
    /// Applied right before this tick is simulated
    pub at_tick: u64,
    pub action: InterventionAction,
}

/// Everything needed to assemble a simulation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    pub families: Vec<FamilyConfig>,
    pub species: Vec<SpeciesConfig>,
    #[serde(default)]
    pub vaccines: Vec<VaccineConfig>,
    pub regions: Vec<RegionConfig>,
    #[serde(default)]
    pub borders: Vec<BorderConfig>,
    #[serde(default)]
    pub initial_states: Vec<InitialStateConfig>,
    #[serde(default)]
    pub interventions: Vec<InterventionConfig>,
}

impl ScenarioConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs() {
        let config = SimulationConfig::default();
        assert_eq!(config.num_ticks, 100);
        assert_eq!(config.seed, 0);
        assert_eq!(config.summary_interval, 10);
    }

    #[test]
    fn test_scenario_from_json() {
        let json = r#"{
            "simulation": { "num_ticks": 20, "seed": 7 },
            "families": [{ "name": "corona", "max_variation": 0.1 }],
            "species": [{
                "name": "sars", "family": "corona",
                "fall_sick_probability": 0.5, "death_rate": 0.1, "spread_rate": 0.3,
                "symptom_duration": 5, "incubation_time": 3, "latency_time": 2,
                "immunity_duration": 10, "infection_duration": 4,
                "mutation": { "copy_error_probability": 0.01, "recombination_probability": 0.2 }
            }],
            "vaccines": [{
                "name": "shield", "target": "sars", "delay": 2, "effect_duration": 10,
                "effect": { "kind": "suppressive", "effectiveness_ratio": 0.8 }
            }],
            "regions": [{ "name": "north", "inhabitants": 1000, "inside_mobility": 2.0 }],
            "interventions": [{
                "at_tick": 3,
                "action": { "type": "set_lockdown", "region": "north", "enabled": true, "reduced_flow_rate": 0.5 }
            }]
        }"#;

        let scenario = ScenarioConfig::from_json(json).unwrap();
        assert_eq!(scenario.simulation.num_ticks, 20);
        assert_eq!(scenario.simulation.summary_interval, 10);
        assert!(scenario.species[0].mutation.is_some());
        assert!(matches!(
            scenario.vaccines[0].effect,
            VaccineEffectConfig::Suppressive { effectiveness_ratio } if effectiveness_ratio == 0.8
        ));
        assert!(scenario.borders.is_empty());
        assert!(matches!(
            scenario.interventions[0].action,
            InterventionAction::SetLockdown { enabled: true, .. }
        ));
    }

    #[test]
    fn test_border_defaults_open() {
        let border: BorderConfig =
            serde_json::from_str(r#"{ "region": "a", "neighbour": "b", "flow_rate": 0.1 }"#).unwrap();
        assert!(border.open);
    }
}
