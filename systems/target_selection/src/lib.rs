#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Priority-weighted ranking of delivery targets and withdrawal reservoirs.

mod proximity;

pub use proximity::SourceProximity;

use colony_logistics_core::{
    AgentSnapshot, CellCoord, DistanceWeights, LogisticsConfig, OperatingMode, ResourceKind,
    SourceView, Storable, StructureId, StructureKind, StructureSnapshot, StructureView,
    TierTables,
};
use tracing::trace;

/// Scale applied to tiers so distance weights can be expressed in per-mille.
const TIER_SCALE: u64 = 1_000;

/// Delivery candidate ranked by effective priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RankedTarget {
    /// Structure receiving the delivery.
    pub structure: StructureId,
    /// Kind of the structure.
    pub kind: StructureKind,
    /// Cell occupied by the structure.
    pub cell: CellCoord,
    /// Base tier under the active mode.
    pub tier: u8,
    /// Range from the agent to the structure.
    pub distance: u32,
    /// Free capacity for the scheduled resource.
    pub free_capacity: u32,
    /// Effective priority; lower is better.
    pub priority: u64,
}

/// Reservoir an agent may withdraw from, ranked by distance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReservoirCandidate {
    /// Reservoir identifier.
    pub structure: StructureId,
    /// Kind of reservoir.
    pub kind: StructureKind,
    /// Cell occupied by the reservoir.
    pub cell: CellCoord,
    /// Range from the agent to the reservoir.
    pub distance: u32,
    /// Stored amount of the scheduled resource, before reservations.
    pub stored: u32,
}

/// Ranks sinks and reservoirs for individual agents.
#[derive(Clone, Debug)]
pub struct TargetSelector {
    resource: ResourceKind,
    tiers: TierTables,
    weights: DistanceWeights,
    shortlist_len: usize,
    proximity: SourceProximity,
}

impl TargetSelector {
    /// Creates a selector driven by the provided configuration.
    #[must_use]
    pub fn new(config: &LogisticsConfig) -> Self {
        Self {
            resource: config.resource,
            tiers: config.tiers,
            weights: config.weights,
            shortlist_len: config.shortlist_len,
            proximity: SourceProximity::new(config.relay_source_radius),
        }
    }

    /// Updates the relay proximity cache from the current source roster.
    ///
    /// Call once per pass before ranking; relays are judged against the roster
    /// seen by the latest refresh.
    pub fn refresh_sources(&mut self, sources: &SourceView) {
        self.proximity.refresh(sources);
    }

    /// Effective priority of a candidate: its tier plus a per-kind distance penalty.
    #[must_use]
    pub fn priority(&self, kind: StructureKind, tier: u8, distance: u32) -> u64 {
        u64::from(tier) * TIER_SCALE + u64::from(distance) * u64::from(self.weights.weight(kind))
    }

    /// Fills `out` with the best delivery targets for `agent`, best first.
    ///
    /// Candidates outside the agent's zone, absent from the mode's tier table,
    /// of the excluded kind or without free capacity are skipped. At most
    /// `shortlist_len` entries are produced; an empty list means there is
    /// nothing to deliver to this tick.
    pub fn select_targets(
        &self,
        agent: &AgentSnapshot,
        mode: OperatingMode,
        exclude: Option<StructureKind>,
        structures: &StructureView,
        out: &mut Vec<RankedTarget>,
    ) {
        out.clear();
        for structure in structures.in_zone(agent.zone) {
            if let Some(ranked) = self.rank(agent, mode, exclude, structure) {
                out.push(ranked);
            }
        }

        out.sort_by_key(|target| (target.priority, target.distance, target.structure));
        out.truncate(self.shortlist_len);
        trace!(
            agent = agent.id.get(),
            ?mode,
            candidates = out.len(),
            best = ?out.first().map(|target| target.structure.get()),
            "ranked delivery targets"
        );
    }

    /// Ranks a single structure, returning `None` when it is not a valid target.
    #[must_use]
    pub fn rank(
        &self,
        agent: &AgentSnapshot,
        mode: OperatingMode,
        exclude: Option<StructureKind>,
        structure: &StructureSnapshot,
    ) -> Option<RankedTarget> {
        if structure.zone != agent.zone || exclude == Some(structure.kind) {
            return None;
        }
        let tier = self.tiers.for_mode(mode).tier(structure.kind)?;
        let free_capacity = structure.store.free_capacity(self.resource);
        if free_capacity == 0 {
            return None;
        }
        if structure.kind == StructureKind::Relay {
            let near_source = self.proximity.is_near_source(structure.zone, structure.cell);
            if near_source != mode.is_harvesting() {
                return None;
            }
        }

        let distance = agent.cell.range_to(structure.cell);
        Some(RankedTarget {
            structure: structure.id,
            kind: structure.kind,
            cell: structure.cell,
            tier,
            distance,
            free_capacity,
            priority: self.priority(structure.kind, tier, distance),
        })
    }

    /// Fills `out` with reservoirs `agent` may withdraw from, nearest first.
    ///
    /// Containers and storage always qualify; relays only when they sit next to
    /// a source. Reservoirs holding none of the resource, or refused by
    /// `admit`, are skipped before the list is cut to `shortlist_len`.
    pub fn reservoirs<F>(
        &self,
        agent: &AgentSnapshot,
        structures: &StructureView,
        mut admit: F,
        out: &mut Vec<ReservoirCandidate>,
    ) where
        F: FnMut(&StructureSnapshot) -> bool,
    {
        out.clear();
        for structure in structures.in_zone(agent.zone) {
            let eligible = match structure.kind {
                StructureKind::Container | StructureKind::Storage => true,
                StructureKind::Relay => {
                    self.proximity.is_near_source(structure.zone, structure.cell)
                }
                _ => false,
            };
            let stored = structure.store.used_capacity(self.resource);
            if !eligible || stored == 0 || !admit(structure) {
                continue;
            }
            out.push(ReservoirCandidate {
                structure: structure.id,
                kind: structure.kind,
                cell: structure.cell,
                distance: agent.cell.range_to(structure.cell),
                stored,
            });
        }

        out.sort_by_key(|candidate| (candidate.distance, candidate.structure));
        out.truncate(self.shortlist_len);
    }
}
