//! Aggregate statistics for affectations.

use serde::{Deserialize, Serialize};

use crate::{Bucket, Headcount};

/// Current totals of every state bucket for one affectation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCounts {
    /// Living affected individuals (not expired)
    pub affected: Headcount,
    pub incubating: Headcount,
    pub symptomatic: Headcount,
    pub latent: Headcount,
    pub contagious: Headcount,
    pub null_disease: Headcount,
    pub null_contagious: Headcount,
    pub immune: Headcount,
    pub dead: Headcount,
}

impl BucketCounts {
    pub fn get(&self, bucket: Bucket) -> Headcount {
        match bucket {
            Bucket::Incubating => self.incubating,
            Bucket::Symptomatic => self.symptomatic,
            Bucket::Latent => self.latent,
            Bucket::Contagious => self.contagious,
            Bucket::NullDisease => self.null_disease,
            Bucket::NullContagious => self.null_contagious,
            Bucket::Immune => self.immune,
            Bucket::Dead => self.dead,
        }
    }

    pub fn get_mut(&mut self, bucket: Bucket) -> &mut Headcount {
        match bucket {
            Bucket::Incubating => &mut self.incubating,
            Bucket::Symptomatic => &mut self.symptomatic,
            Bucket::Latent => &mut self.latent,
            Bucket::Contagious => &mut self.contagious,
            Bucket::NullDisease => &mut self.null_disease,
            Bucket::NullContagious => &mut self.null_contagious,
            Bucket::Immune => &mut self.immune,
            Bucket::Dead => &mut self.dead,
        }
    }

    pub fn merge(&mut self, other: &BucketCounts) {
        self.affected += other.affected;
        for bucket in Bucket::all() {
            *self.get_mut(bucket) += other.get(bucket);
        }
    }
}

/// People entering and leaving a bucket during the current tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    pub inflow: Headcount,
    pub outflow: Headcount,
}

/// Same-tick in/out deltas for all buckets.
///
/// Counters only move through [`FlowCounters::transition`]; they are reset
/// once per tick by the owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowCounters {
    flows: [Flow; Bucket::COUNT],
}

impl FlowCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, bucket: Bucket) -> Flow {
        self.flows[bucket.index()]
    }

    /// Record `people` leaving `from` and entering `to`. `None` stands for
    /// outside of the tracked buckets (newly infected, expired).
    pub fn transition(&mut self, from: Option<Bucket>, to: Option<Bucket>, people: Headcount) {
        if people == 0 || from == to {
            return;
        }
        if let Some(from) = from {
            self.flows[from.index()].outflow += people;
        }
        if let Some(to) = to {
            self.flows[to.index()].inflow += people;
        }
    }

    pub fn reset(&mut self) {
        self.flows = [Flow::default(); Bucket::COUNT];
    }

    pub fn merge(&mut self, other: &FlowCounters) {
        for (mine, theirs) in self.flows.iter_mut().zip(other.flows.iter()) {
            mine.inflow += theirs.inflow;
            mine.outflow += theirs.outflow;
        }
    }
}

/// Snapshot of one (region, species) affectation for presentation layers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectationSummary {
    pub region: String,
    pub species: String,
    pub inhabitants: Headcount,
    pub counts: BucketCounts,
    pub flows: FlowCounters,
    /// People whose immunity period elapsed
    pub expired: Headcount,
    pub vaccine: Option<String>,
    pub vaccine_remaining_ticks: u32,
}

impl AffectationSummary {
    pub fn healthy(&self) -> Headcount {
        self.inhabitants - self.counts.affected - self.counts.dead
    }

    /// Newly latent people per currently infected person; 0 when nobody is infected.
    pub fn transmission_ratio(&self) -> f64 {
        let infected = self.counts.contagious + self.counts.latent;
        if infected == 0 {
            0.0
        } else {
            self.flows.get(Bucket::Latent).inflow as f64 / infected as f64
        }
    }

    /// Infected people not yet immune
    pub fn contagiated(&self) -> Headcount {
        self.counts.latent + self.counts.contagious + self.counts.null_contagious
    }

    pub fn virus_presence(&self) -> Headcount {
        self.contagiated() + self.counts.immune
    }
}

/// Sum of several summaries (across regions, species or both)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryTotals {
    pub affectations: u32,
    pub inhabitants: Headcount,
    pub counts: BucketCounts,
    pub flows: FlowCounters,
    pub expired: Headcount,
}

impl SummaryTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one summary. Inhabitants are only counted once per region, so
    /// callers that aggregate several species of the same region pass
    /// `count_inhabitants = false` after the first one.
    pub fn update(&mut self, summary: &AffectationSummary, count_inhabitants: bool) {
        self.affectations += 1;
        if count_inhabitants {
            self.inhabitants += summary.inhabitants;
        }
        self.counts.merge(&summary.counts);
        self.flows.merge(&summary.flows);
        self.expired += summary.expired;
    }

    pub fn from_summaries<'a>(summaries: impl IntoIterator<Item = &'a AffectationSummary>) -> Self {
        let mut totals = Self::new();
        let mut seen_regions = std::collections::HashSet::new();
        for summary in summaries {
            let first = seen_regions.insert(summary.region.clone());
            totals.update(summary, first);
        }
        totals
    }

    pub fn transmission_ratio(&self) -> f64 {
        let infected = self.counts.contagious + self.counts.latent;
        if infected == 0 {
            0.0
        } else {
            self.flows.get(Bucket::Latent).inflow as f64 / infected as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(region: &str, latent: Headcount, in_latent: Headcount) -> AffectationSummary {
        let mut flows = FlowCounters::new();
        flows.transition(None, Some(Bucket::Latent), in_latent);
        AffectationSummary {
            region: region.to_string(),
            species: "flu".to_string(),
            inhabitants: 1000,
            counts: BucketCounts {
                affected: latent,
                latent,
                incubating: latent,
                ..Default::default()
            },
            flows,
            expired: 0,
            vaccine: None,
            vaccine_remaining_ticks: 0,
        }
    }

    #[test]
    fn test_transition_records_both_sides() {
        let mut flows = FlowCounters::new();
        flows.transition(Some(Bucket::Incubating), Some(Bucket::Symptomatic), 30);
        assert_eq!(flows.get(Bucket::Incubating).outflow, 30);
        assert_eq!(flows.get(Bucket::Symptomatic).inflow, 30);

        flows.reset();
        assert_eq!(flows.get(Bucket::Symptomatic), Flow::default());
    }

    #[test]
    fn test_transition_ignores_empty_moves() {
        let mut flows = FlowCounters::new();
        flows.transition(Some(Bucket::Immune), Some(Bucket::Immune), 5);
        flows.transition(Some(Bucket::Latent), Some(Bucket::Contagious), 0);
        assert_eq!(flows, FlowCounters::new());
    }

    #[test]
    fn test_transmission_ratio_guards_empty() {
        let empty = summary("A", 0, 0);
        assert_eq!(empty.transmission_ratio(), 0.0);

        let busy = summary("A", 50, 10);
        assert!((busy.transmission_ratio() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_totals_count_region_inhabitants_once() {
        let a = summary("A", 10, 2);
        let mut b = summary("A", 5, 1);
        b.species = "cold".to_string();
        let c = summary("B", 1, 0);

        let totals = SummaryTotals::from_summaries([&a, &b, &c]);
        assert_eq!(totals.affectations, 3);
        assert_eq!(totals.inhabitants, 2000);
        assert_eq!(totals.counts.latent, 16);
        assert_eq!(totals.flows.get(Bucket::Latent).inflow, 3);
    }
}
