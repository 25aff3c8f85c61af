//! The simulated world: regions, the affectations living in them and the
//! tick that moves, infects and ages their populations.
//!
//! A [`Simulation`] is assembled from a [`contagion_core::ScenarioConfig`]
//! and owns the [`Territory`] together with the species registry and RNG.

pub mod cohort;
pub mod affectation;
pub mod region;
pub mod territory;
pub mod simulation;

pub use cohort::{AffectedCohort, CohortObserver, CohortStatus};
pub use affectation::{Affectation, CohortSet, Destination};
pub use region::{Border, Lockdown, Region};
pub use territory::Territory;
pub use simulation::{Simulation, SimulationReport, SpeciesEmergence, SpeciesInfo};
