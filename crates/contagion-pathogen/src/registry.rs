//! Append-only catalogue of families and species.

use contagion_core::{Error, FamilyId, Result, SpeciesId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::family::VirusFamily;
use crate::species::{EpiParameters, VirusKind, VirusSpecies};

/// Every family and species known to a run.
///
/// Species ids are dense indices into the species list. Entries are never
/// removed, so an id handed out once stays valid for the whole run.
#[derive(Debug, Default)]
pub struct SpeciesRegistry {
    families: Vec<Arc<VirusFamily>>,
    species: Vec<Arc<VirusSpecies>>,
    by_name: HashMap<String, SpeciesId>,
    /// Copy-error descendants spawned so far, per copy-error root
    copy_counts: HashMap<SpeciesId, u32>,
}

impl SpeciesRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_family(&mut self, name: &str, max_variation: f64) -> Result<Arc<VirusFamily>> {
        if self.family_by_name(name).is_some() {
            return Err(Error::AlreadyExists(format!("family '{}'", name)));
        }
        let family = Arc::new(VirusFamily::new(
            FamilyId(self.families.len()),
            name,
            max_variation,
        ));
        self.families.push(Arc::clone(&family));
        Ok(family)
    }

    pub fn family_by_name(&self, name: &str) -> Option<&Arc<VirusFamily>> {
        self.families.iter().find(|f| f.name == name)
    }

    pub fn families(&self) -> &[Arc<VirusFamily>] {
        &self.families
    }

    /// Register a species loaded from the scenario. Names must be unique.
    pub fn add_species(
        &mut self,
        name: &str,
        family: &Arc<VirusFamily>,
        params: EpiParameters,
        kind: VirusKind,
    ) -> Result<Arc<VirusSpecies>> {
        if self.by_name.contains_key(name) {
            return Err(Error::AlreadyExists(format!("species '{}'", name)));
        }
        Ok(self.push(name.to_string(), family, params, kind))
    }

    /// Register a species produced by mutation. A taken name gets a numeric
    /// suffix instead of failing.
    pub fn register_variant(
        &mut self,
        name: &str,
        family: &Arc<VirusFamily>,
        params: EpiParameters,
        kind: VirusKind,
    ) -> Arc<VirusSpecies> {
        let name = self.unique_name(name);
        self.push(name, family, params, kind)
    }

    fn push(
        &mut self,
        name: String,
        family: &Arc<VirusFamily>,
        params: EpiParameters,
        kind: VirusKind,
    ) -> Arc<VirusSpecies> {
        let id = SpeciesId(self.species.len());
        let species = Arc::new(VirusSpecies::new(id, name.clone(), Arc::clone(family), params, kind));
        self.species.push(Arc::clone(&species));
        self.by_name.insert(name, id);
        species
    }

    fn unique_name(&self, base: &str) -> String {
        if !self.by_name.contains_key(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{}-{}", base, n))
            .find(|candidate| !self.by_name.contains_key(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    /// Bump and return the copy-error counter of `root`, starting at 1.
    pub fn next_copy_number(&mut self, root: SpeciesId) -> u32 {
        let count = self.copy_counts.entry(root).or_insert(0);
        *count += 1;
        *count
    }

    pub fn get(&self, id: SpeciesId) -> &Arc<VirusSpecies> {
        &self.species[id.0]
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<VirusSpecies>> {
        self.by_name.get(name).map(|id| self.get(*id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<VirusSpecies>> {
        self.species.iter()
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }
}
