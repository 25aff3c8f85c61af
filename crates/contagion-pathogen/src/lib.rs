//! Pathogen model: virus families and species, vaccines, mutation and
//! in-region propagation.
//!
//! Species are immutable once registered. The only thing that grows during a
//! run is the [`SpeciesRegistry`], which is owned by the
//! [`SimulationContext`] together with the RNG that drives mutation.

pub mod family;
pub mod species;
pub mod vaccine;
pub mod registry;
pub mod context;
pub mod mutation;
pub mod propagation;
pub mod validation;

pub use family::VirusFamily;
pub use species::{EpiParameters, MutationTraits, Origin, VirusKind, VirusSpecies};
pub use vaccine::{Attenuation, Vaccine, VaccineApplication, VaccineKind};
pub use registry::SpeciesRegistry;
pub use context::SimulationContext;
pub use propagation::Host;
pub use validation::{validate_family, validate_parameters, validate_vaccine};
