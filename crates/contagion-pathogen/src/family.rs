//! Virus families.

use contagion_core::FamilyId;
use serde::{Deserialize, Serialize};

/// Grouping of species that compete for the same hosts and can recombine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirusFamily {
    pub id: FamilyId,
    pub name: String,
    /// Bound of the random multiplier drift applied by copy errors
    pub max_variation: f64,
}

impl VirusFamily {
    pub fn new(id: FamilyId, name: impl Into<String>, max_variation: f64) -> Self {
        Self {
            id,
            name: name.into(),
            max_variation,
        }
    }
}
