//! Typed per-agent memory records and the store that keeps them across ticks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{AgentId, CellCoord, Role, SourceId, StructureId, StructureKind, Tick};

/// Transport state of an agent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Filling up from a source or reservoir.
    #[default]
    Gathering,
    /// Emptying into sinks.
    Delivering,
}

/// Identity of whatever an agent currently pursues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetId {
    /// A reservoir or sink.
    Structure(StructureId),
    /// A source node.
    Source(SourceId),
}

impl TargetId {
    /// Structure identifier, when the target is a structure.
    #[must_use]
    pub const fn structure(self) -> Option<StructureId> {
        match self {
            Self::Structure(id) => Some(id),
            Self::Source(_) => None,
        }
    }
}

/// Speculative withdrawal held by an agent against a reservoir.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reservation {
    /// Reservoir the amount was reserved against.
    pub structure: StructureId,
    /// Amount recorded in the ledger.
    pub amount: u32,
}

/// Position and time at which an agent was last seen making progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StuckRecord {
    /// Cell the agent occupied when tracking started.
    pub cell: CellCoord,
    /// Tick at which tracking started.
    pub tick: Tick,
    /// Destination the agent was pursuing.
    pub goal: CellCoord,
}

/// Target temporarily skipped after the host reported it unreachable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AvoidedTarget {
    /// Target to skip.
    pub target: TargetId,
    /// First tick at which the target becomes eligible again.
    pub until: Tick,
}

/// Fixed-schema memory record owned by a single agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMemory {
    /// Role tag copied from the agent at first evaluation.
    pub role: Role,
    /// Current transport state.
    pub state: TaskState,
    /// Cached target being pursued.
    pub target: Option<TargetId>,
    /// Sticky source assignment.
    pub assigned_source: Option<SourceId>,
    /// Reservation currently held in the ledger.
    pub reservation: Option<Reservation>,
    /// Stuck-tracking record.
    pub stuck: Option<StuckRecord>,
    /// Kind of reservoir the current load was withdrawn from.
    pub last_withdrawn_kind: Option<StructureKind>,
    /// Forces the next movement to discard the cached path.
    pub repath: bool,
    /// Target skipped until its cooldown elapses.
    pub avoided: Option<AvoidedTarget>,
}

impl AgentMemory {
    /// Creates a blank record for an agent with the provided role.
    #[must_use]
    pub const fn new(role: Role) -> Self {
        Self {
            role,
            state: TaskState::Gathering,
            target: None,
            assigned_source: None,
            reservation: None,
            stuck: None,
            last_withdrawn_kind: None,
            repath: false,
            avoided: None,
        }
    }

    /// Reports whether the agent is delivering.
    #[must_use]
    pub fn is_delivering(&self) -> bool {
        self.state == TaskState::Delivering
    }

    /// Removes and returns the held reservation, leaving `None` behind.
    pub fn take_reservation(&mut self) -> Option<Reservation> {
        self.reservation.take()
    }

    /// Forgets the cached target and any stall tracking tied to it.
    pub fn clear_target(&mut self) {
        self.target = None;
        self.stuck = None;
    }

    /// Reports whether `target` is being skipped at `now`.
    #[must_use]
    pub fn is_avoiding(&self, target: TargetId, now: Tick) -> bool {
        self.avoided
            .is_some_and(|avoided| avoided.target == target && now < avoided.until)
    }
}

/// Persistent per-agent memory keyed by agent identity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStore {
    agents: BTreeMap<AgentId, AgentMemory>,
}

impl MemoryStore {
    /// Creates an empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the record of a single agent.
    #[must_use]
    pub fn get(&self, agent: AgentId) -> Option<&AgentMemory> {
        self.agents.get(&agent)
    }

    /// Looks up the record of a single agent for mutation.
    pub fn get_mut(&mut self, agent: AgentId) -> Option<&mut AgentMemory> {
        self.agents.get_mut(&agent)
    }

    /// Removes a record so it can be mutated while the rest stays readable.
    pub fn take(&mut self, agent: AgentId) -> Option<AgentMemory> {
        self.agents.remove(&agent)
    }

    /// Stores the record of an agent, replacing any previous one.
    pub fn insert(&mut self, agent: AgentId, memory: AgentMemory) {
        let _ = self.agents.insert(agent, memory);
    }

    /// Iterator over the records alone.
    pub fn records(&self) -> impl Iterator<Item = &AgentMemory> {
        self.agents.values()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Reports whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Drops every record whose agent fails `alive`, returning the removed records.
    pub fn retain_agents<F>(&mut self, mut alive: F) -> Vec<(AgentId, AgentMemory)>
    where
        F: FnMut(AgentId) -> bool,
    {
        let dead: Vec<AgentId> = self
            .agents
            .keys()
            .copied()
            .filter(|agent| !alive(*agent))
            .collect();

        dead.into_iter()
            .filter_map(|agent| self.agents.remove(&agent).map(|memory| (agent, memory)))
            .collect()
    }
}
