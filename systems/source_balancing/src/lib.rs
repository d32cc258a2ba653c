#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Load-balanced assignment of harvesting agents to source nodes.
//!
//! No partition table is stored anywhere. Every reassignment re-derives the
//! per-source load from the agents' own memory records, so the balance is
//! emergent and cannot drift from the records it summarises.

use std::collections::BTreeMap;

use colony_logistics_core::{
    AgentMemory, AgentSnapshot, MemoryStore, ResourceKind, Role, SourceCaps, SourceId,
    SourceView, TargetId, TaskState, Tick,
};
use tracing::debug;

/// Load carried by a single source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SourceTally {
    /// Harvesting agents assigned to the source.
    pub assigned: u32,
    /// Assigned agents that are currently gathering.
    pub harvesting: u32,
}

/// Counts assigned and actively harvesting agents per source.
///
/// Every source in `sources` receives an entry; assignments naming sources
/// that no longer exist are ignored.
#[must_use]
pub fn tally<'a, I>(memories: I, sources: &SourceView) -> BTreeMap<SourceId, SourceTally>
where
    I: IntoIterator<Item = &'a AgentMemory>,
{
    let mut counts: BTreeMap<SourceId, SourceTally> = sources
        .iter()
        .map(|source| (source.id, SourceTally::default()))
        .collect();

    for memory in memories {
        if memory.role != Role::Harvester {
            continue;
        }
        let Some(entry) = memory
            .assigned_source
            .and_then(|source| counts.get_mut(&source))
        else {
            continue;
        };
        entry.assigned += 1;
        if memory.state == TaskState::Gathering {
            entry.harvesting += 1;
        }
    }

    counts
}

/// Assigns harvesting agents to the least contended eligible source.
#[derive(Clone, Debug, Default)]
pub struct SourceBalancer {
    resource: ResourceKind,
    caps: SourceCaps,
}

impl SourceBalancer {
    /// Creates a balancer for sources yielding `resource`, enforcing the
    /// provided concurrency caps.
    #[must_use]
    pub fn new(resource: ResourceKind, caps: SourceCaps) -> Self {
        Self { resource, caps }
    }

    /// Returns the source `agent` should harvest, updating its memory.
    ///
    /// `memory` must not be present in `others`. A sticky assignment is kept
    /// while its source still yields; otherwise the eligible source with the
    /// fewest assigned agents wins, ties going to the nearer source. Sources the
    /// agent is avoiding at `now`, or that yield another resource, are not
    /// eligible. A changed assignment forces
    /// a repath and forgets the old target and stall record.
    pub fn assign(
        &self,
        agent: &AgentSnapshot,
        memory: &mut AgentMemory,
        others: &MemoryStore,
        sources: &SourceView,
        now: Tick,
    ) -> Option<SourceId> {
        if let Some(current) = memory.assigned_source {
            let yielding = sources.get(current).is_some_and(|source| {
                source.zone == agent.zone
                    && source.resource == self.resource
                    && source.available > 0
            });
            if yielding && !memory.is_avoiding(TargetId::Source(current), now) {
                return Some(current);
            }
        }

        let counts = tally(others.records(), sources);
        let chosen = sources
            .in_zone(agent.zone)
            .filter(|source| source.resource == self.resource && source.available > 0)
            .filter(|source| !memory.is_avoiding(TargetId::Source(source.id), now))
            .filter_map(|source| {
                let assigned = counts.get(&source.id).map_or(0, |tally| tally.assigned);
                let within_cap = self
                    .caps
                    .cap_for(source.id)
                    .map_or(true, |cap| assigned < cap);
                within_cap.then(|| (assigned, agent.cell.range_to(source.cell), source.id))
            })
            .min()
            .map(|(_, _, source)| source);

        if chosen != memory.assigned_source {
            debug!(
                agent = agent.id.get(),
                from = ?memory.assigned_source.map(|source| source.get()),
                to = ?chosen.map(|source| source.get()),
                "source reassigned"
            );
            memory.assigned_source = chosen;
            memory.repath = true;
            memory.clear_target();
        }
        chosen
    }
}
