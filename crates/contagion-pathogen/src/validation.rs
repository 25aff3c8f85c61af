//! Range checks for pathogen definitions.

use contagion_core::{Error, Parameter, Result};

use crate::family::VirusFamily;
use crate::species::{EpiParameters, VirusKind};
use crate::vaccine::{Vaccine, VaccineKind};

fn check_fraction(owner: &str, field: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::Validation(format!(
            "{}: {} must be within [0, 1], got {}",
            owner, field, value
        )));
    }
    Ok(())
}

fn check_positive(owner: &str, field: &str, value: u32) -> Result<()> {
    if value == 0 {
        return Err(Error::Validation(format!("{}: {} must be positive", owner, field)));
    }
    Ok(())
}

pub fn validate_family(family: &VirusFamily) -> Result<()> {
    check_fraction(&family.name, "max_variation", family.max_variation)
}

/// Validate the parameters of species `name`. Incubation may be zero; every
/// other duration must last at least one tick.
pub fn validate_parameters(name: &str, params: &EpiParameters, kind: &VirusKind) -> Result<()> {
    check_fraction(name, "fall_sick_probability", params.fall_sick_probability)?;
    check_fraction(name, "death_rate", params.death_rate)?;
    check_fraction(name, "spread_rate", params.spread_rate)?;
    check_positive(name, "symptom_duration", params.symptom_duration)?;
    check_positive(name, "latency_time", params.latency_time)?;
    check_positive(name, "immunity_duration", params.immunity_duration)?;
    check_positive(name, "infection_duration", params.infection_duration)?;

    if let VirusKind::Mutable(traits) = kind {
        check_fraction(name, "copy_error_probability", traits.copy_error_probability)?;
        check_fraction(name, "recombination_probability", traits.recombination_probability)?;
    }

    Ok(())
}

pub fn validate_vaccine(vaccine: &Vaccine) -> Result<()> {
    check_positive(&vaccine.name, "effect_duration", vaccine.effect_duration)?;
    match &vaccine.kind {
        VaccineKind::Suppressive { effectiveness_ratio } => {
            check_fraction(&vaccine.name, "effectiveness_ratio", *effectiveness_ratio)
        }
        VaccineKind::Attenuating(att) => {
            check_fraction(&vaccine.name, Parameter::Mortality.as_str(), att.mortality)?;
            check_fraction(&vaccine.name, Parameter::Duration.as_str(), att.duration)?;
            check_fraction(&vaccine.name, Parameter::FallSick.as_str(), att.fall_sick)?;
            check_fraction(&vaccine.name, Parameter::Contagiousness.as_str(), att.contagiousness)
        }
    }
}
