//! Vaccines and their per-region application.

use contagion_core::{Parameter, SpeciesId, VaccineId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::species::VirusSpecies;

/// Reduction factors of an attenuating vaccine. Each factor multiplies the
/// raw parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Attenuation {
    pub mortality: f64,
    pub duration: f64,
    pub fall_sick: f64,
    pub contagiousness: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum VaccineKind {
    /// Only lowers virus effectiveness, by `effectiveness_ratio`
    Suppressive { effectiveness_ratio: f64 },
    /// Scales mortality, duration, fall-sick and contagiousness
    Attenuating(Attenuation),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vaccine {
    pub id: VaccineId,
    pub name: String,
    pub target: SpeciesId,
    /// Ticks before the effect starts
    pub delay: u32,
    /// Ticks the effect lasts
    pub effect_duration: u32,
    pub kind: VaccineKind,
}

impl Vaccine {
    /// Transformed value of `parameter` for a fully vaccinated population.
    pub fn modifier(&self, parameter: Parameter, value: f64) -> f64 {
        match (&self.kind, parameter) {
            (VaccineKind::Suppressive { effectiveness_ratio }, Parameter::VirusEffectiveness) => {
                (1.0 - effectiveness_ratio) * value
            }
            (VaccineKind::Suppressive { .. }, _) => value,
            (VaccineKind::Attenuating(att), Parameter::Mortality) => att.mortality * value,
            (VaccineKind::Attenuating(att), Parameter::Duration) => att.duration * value,
            (VaccineKind::Attenuating(att), Parameter::FallSick) => att.fall_sick * value,
            (VaccineKind::Attenuating(att), Parameter::Contagiousness) => att.contagiousness * value,
            (VaccineKind::Attenuating(_), Parameter::VirusEffectiveness) => value,
        }
    }

    /// A vaccine works on its target and on every mutation descendant of it.
    pub fn is_effective(&self, species: &VirusSpecies) -> bool {
        species.descends_from(self.target)
    }
}

impl fmt::Display for Vaccine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            VaccineKind::Suppressive { .. } => write!(f, "{} (suppressive)", self.name),
            VaccineKind::Attenuating(_) => write!(f, "{} (attenuating)", self.name),
        }
    }
}

/// A vaccine administered to a share of a region, with its own tick counter.
///
/// Active strictly between `delay` and `delay + effect_duration` elapsed ticks.
#[derive(Debug, Clone, Default)]
pub struct VaccineApplication {
    vaccine: Option<Arc<Vaccine>>,
    proportion: f64,
    elapsed: u32,
}

impl VaccineApplication {
    pub fn new(vaccine: Arc<Vaccine>, proportion: f64) -> Self {
        Self {
            vaccine: Some(vaccine),
            proportion: proportion.clamp(0.0, 1.0),
            elapsed: 0,
        }
    }

    /// No vaccine: every parameter passes through unchanged.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn vaccine(&self) -> Option<&Arc<Vaccine>> {
        self.vaccine.as_ref()
    }

    pub fn proportion(&self) -> f64 {
        self.proportion
    }

    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }

    pub fn is_active(&self) -> bool {
        match &self.vaccine {
            Some(vaccine) => vaccine.delay < self.elapsed && !self.is_over(),
            None => false,
        }
    }

    pub fn is_over(&self) -> bool {
        match &self.vaccine {
            Some(vaccine) => self.elapsed >= vaccine.delay + vaccine.effect_duration,
            None => false,
        }
    }

    /// Blend of the vaccinated and unvaccinated value while active.
    pub fn modifier(&self, parameter: Parameter, value: f64) -> f64 {
        match &self.vaccine {
            Some(vaccine) if self.is_active() => {
                vaccine.modifier(parameter, value) * self.proportion
                    + value * (1.0 - self.proportion)
            }
            _ => value,
        }
    }

    /// Vaccine-adjusted duration in whole ticks.
    pub fn duration(&self, ticks: u32) -> u32 {
        self.modifier(Parameter::Duration, ticks as f64) as u32
    }

    pub fn advance(&mut self) {
        if self.vaccine.is_some() {
            self.elapsed += 1;
        }
    }

    /// Ticks left until the effect ends; 0 without a vaccine.
    pub fn remaining_ticks(&self) -> u32 {
        match &self.vaccine {
            Some(vaccine) => (vaccine.delay + vaccine.effect_duration).saturating_sub(self.elapsed),
            None => 0,
        }
    }

    pub fn targets(&self, species: SpeciesId) -> bool {
        self.vaccine.as_ref().is_some_and(|v| v.target == species)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn suppressive(delay: u32, duration: u32) -> Arc<Vaccine> {
        Arc::new(Vaccine {
            id: VaccineId(0),
            name: "shield".to_string(),
            target: SpeciesId(0),
            delay,
            effect_duration: duration,
            kind: VaccineKind::Suppressive {
                effectiveness_ratio: 0.75,
            },
        })
    }

    fn attenuating() -> Vaccine {
        Vaccine {
            id: VaccineId(1),
            name: "soften".to_string(),
            target: SpeciesId(0),
            delay: 0,
            effect_duration: 10,
            kind: VaccineKind::Attenuating(Attenuation {
                mortality: 0.5,
                duration: 0.8,
                fall_sick: 0.4,
                contagiousness: 0.2,
            }),
        }
    }

    #[test]
    fn test_suppressive_modifier() {
        let vaccine = suppressive(0, 10);
        assert!((vaccine.modifier(Parameter::VirusEffectiveness, 0.4) - 0.1).abs() < 1e-12);
        for param in [
            Parameter::Mortality,
            Parameter::Duration,
            Parameter::FallSick,
            Parameter::Contagiousness,
        ] {
            assert_eq!(vaccine.modifier(param, 0.4), 0.4);
        }
    }

    #[test]
    fn test_attenuating_modifier() {
        let vaccine = attenuating();
        assert!((vaccine.modifier(Parameter::Mortality, 0.2) - 0.1).abs() < 1e-12);
        assert!((vaccine.modifier(Parameter::Duration, 10.0) - 8.0).abs() < 1e-12);
        assert!((vaccine.modifier(Parameter::FallSick, 0.5) - 0.2).abs() < 1e-12);
        assert!((vaccine.modifier(Parameter::Contagiousness, 0.5) - 0.1).abs() < 1e-12);
        assert_eq!(vaccine.modifier(Parameter::VirusEffectiveness, 0.5), 0.5);
    }

    #[test]
    fn test_application_blends_proportion() {
        let mut app = VaccineApplication::new(suppressive(0, 10), 0.5);
        app.advance();
        assert!(app.is_active());
        // half at 0.25 * 0.4, half at 0.4
        let value = app.modifier(Parameter::VirusEffectiveness, 0.4);
        assert!((value - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_empty_application_is_identity() {
        let mut app = VaccineApplication::none();
        app.advance();
        assert!(!app.is_active());
        assert!(!app.is_over());
        assert_eq!(app.modifier(Parameter::Mortality, 0.3), 0.3);
        assert_eq!(app.remaining_ticks(), 0);
        assert_eq!(app.duration(7), 7);
    }

    #[test]
    fn test_remaining_ticks() {
        let mut app = VaccineApplication::new(suppressive(2, 5), 1.0);
        assert_eq!(app.remaining_ticks(), 7);
        for _ in 0..4 {
            app.advance();
        }
        assert_eq!(app.remaining_ticks(), 3);
        for _ in 0..10 {
            app.advance();
        }
        assert_eq!(app.remaining_ticks(), 0);
        assert!(app.is_over());
    }

    proptest! {
        #[test]
        fn prop_vaccine_window(delay in 0u32..20, duration in 0u32..20, elapsed in 0u32..60) {
            let mut app = VaccineApplication::new(suppressive(delay, duration), 1.0);
            for _ in 0..elapsed {
                app.advance();
            }
            let expected = elapsed > delay && elapsed < delay + duration;
            prop_assert_eq!(app.is_active(), expected);
            if !expected {
                prop_assert_eq!(app.modifier(Parameter::VirusEffectiveness, 0.6), 0.6);
            }
        }
    }
}
