#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the colony logistics scheduler.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters and systems submit
//! [`Command`] values describing desired mutations, the world validates and
//! queues them, resolves everything queued when the next [`Command::Tick`]
//! arrives, and broadcasts [`Event`] values for systems to react to. Systems
//! consume event streams, query immutable snapshot views, and respond
//! exclusively with new command batches.

mod config;
mod memory;
mod store;

pub use config::{
    ConfigError, DistanceWeights, LogisticsConfig, SourceCap, SourceCaps, TierTable, TierTables,
};
pub use memory::{
    AgentMemory, AvoidedTarget, MemoryStore, Reservation, StuckRecord, TargetId, TaskState,
};
pub use store::{Storable, Store, StructureStore};

use serde::{Deserialize, Serialize};

/// Search budget used by ordinary movement intents.
pub const NORMAL_SEARCH_BUDGET: u32 = 400;

/// Search budget used by reroute intents issued after a stall.
pub const REROUTE_SEARCH_BUDGET: u32 = 2_000;

/// Range at which agents can withdraw, transfer or harvest.
pub const INTERACTION_RANGE: u32 = 1;

/// Unique identifier assigned to a mobile agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(u32);

impl AgentId {
    /// Creates a new agent identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a stationary structure (reservoir or sink).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructureId(u32);

impl StructureId {
    /// Creates a new structure identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a regenerating source node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(u32);

impl SourceId {
    /// Creates a new source identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a zone of the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(u32);

impl ZoneId {
    /// Creates a new zone identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Monotonically increasing simulation clock value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tick(u64);

impl Tick {
    /// Creates a tick wrapper around the provided counter value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the raw counter value.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Number of ticks elapsed since `earlier`, saturating at zero.
    #[must_use]
    pub const fn elapsed_since(self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Tick lying `ticks` steps after this one.
    #[must_use]
    pub const fn offset(self, ticks: u64) -> Tick {
        Tick(self.0.saturating_add(ticks))
    }

    /// Tick that immediately follows this one.
    #[must_use]
    pub const fn next(self) -> Tick {
        self.offset(1)
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Computes the Chebyshev range between two cells.
    ///
    /// Agents move in eight directions, so a diagonal neighbour lies at range
    /// one just like an orthogonal one.
    #[must_use]
    pub fn range_to(self, other: CellCoord) -> u32 {
        self.column()
            .abs_diff(other.column())
            .max(self.row().abs_diff(other.row()))
    }
}

/// Kinds of resource that stores can hold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Primary resource produced by sources and consumed by sinks.
    #[default]
    Energy,
    /// Secondary resource that only pooled stores accept.
    Mineral,
}

/// Kinds of stationary structure that participate in logistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    /// Facility that produces new agents.
    Spawner,
    /// Auxiliary buffer that feeds spawning facilities.
    Extension,
    /// Defense emplacement.
    Turret,
    /// Transit buffer usually placed next to sources.
    Container,
    /// Bulk store.
    Storage,
    /// Relay node that forwards energy across a zone.
    Relay,
}

impl StructureKind {
    /// Every structure kind in declaration order.
    pub const ALL: [StructureKind; 6] = [
        StructureKind::Spawner,
        StructureKind::Extension,
        StructureKind::Turret,
        StructureKind::Container,
        StructureKind::Storage,
        StructureKind::Relay,
    ];

    /// Reports whether agents may withdraw from structures of this kind.
    #[must_use]
    pub const fn is_reservoir(self) -> bool {
        matches!(self, Self::Container | Self::Storage | Self::Relay)
    }
}

/// Role tag assigned to an agent by the spawning logic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Agent that gathers from source nodes.
    Harvester,
    /// Agent that gathers from reservoirs.
    Hauler,
}

/// Operating mode that selects the tier table used for delivery ranking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    /// Peacetime harvesting.
    IdleHarvesting,
    /// Wartime transport between reservoirs and sinks.
    WartimeTransport,
    /// Wartime harvesting.
    WartimeHarvesting,
}

impl OperatingMode {
    /// Reports whether agents in this mode deposit harvested resource.
    #[must_use]
    pub const fn is_harvesting(self) -> bool {
        matches!(self, Self::IdleHarvesting | Self::WartimeHarvesting)
    }
}

/// Options attached to a movement intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MoveOptions {
    /// Range around the destination that counts as arrival.
    pub range: u32,
    /// Whether the host may keep following a previously cached path.
    pub reuse_path: bool,
    /// Whether planning and stepping may pass through other agents.
    pub ignore_agents: bool,
    /// Maximum number of cells the host path search may expand.
    pub search_budget: u32,
}

impl MoveOptions {
    /// Ordinary movement that reuses the cached path when possible.
    #[must_use]
    pub const fn normal(range: u32) -> Self {
        Self {
            range,
            reuse_path: true,
            ignore_agents: false,
            search_budget: NORMAL_SEARCH_BUDGET,
        }
    }

    /// Ordinary movement that discards any cached path first.
    #[must_use]
    pub const fn fresh(range: u32) -> Self {
        Self {
            reuse_path: false,
            ..Self::normal(range)
        }
    }

    /// Relaxed movement issued to recover from a stall.
    #[must_use]
    pub const fn reroute(range: u32) -> Self {
        Self {
            range,
            reuse_path: false,
            ignore_agents: true,
            search_budget: REROUTE_SEARCH_BUDGET,
        }
    }

    /// Reports whether these options describe a reroute.
    #[must_use]
    pub const fn is_reroute(&self) -> bool {
        self.ignore_agents
    }
}

/// Kinds of world-mutating intent an agent can issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Withdrawal from a reservoir.
    Withdraw,
    /// Transfer into a sink.
    Transfer,
    /// Harvest from a source.
    Harvest,
    /// Movement toward a destination.
    Move,
}

/// Closed set of outcomes reported for agent actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionOutcome {
    /// The action was accepted.
    Success,
    /// The target lies beyond interaction range; the caller must move.
    OutOfRange,
    /// The store or source lacks the resource required.
    ResourceInsufficient,
    /// The target is full, missing, unreachable or otherwise invalid.
    TargetUnavailable,
    /// The agent cannot act right now; retry next tick.
    Busy,
}

/// Reasons a placement or spawn request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlacementError {
    /// The referenced zone does not exist.
    MissingZone,
    /// The requested cell lies outside the zone bounds.
    OutOfBounds,
    /// The requested cell is a wall or already occupied.
    Occupied,
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Creates a new zone with the provided dimensions and static walls.
    CreateZone {
        /// Number of cell columns in the zone.
        columns: u32,
        /// Number of cell rows in the zone.
        rows: u32,
        /// Cells that are permanently impassable.
        walls: Vec<CellCoord>,
    },
    /// Places a regenerating source node.
    PlaceSource {
        /// Zone that receives the source.
        zone: ZoneId,
        /// Cell occupied by the source.
        cell: CellCoord,
        /// Resource yielded by harvesting.
        resource: ResourceKind,
        /// Maximum yield restored on every regeneration.
        capacity: u32,
        /// Ticks between the first harvest and the next full refill.
        regen_ticks: u32,
    },
    /// Places a stationary structure.
    PlaceStructure {
        /// Zone that receives the structure.
        zone: ZoneId,
        /// Kind of structure to construct.
        kind: StructureKind,
        /// Cell occupied by the structure.
        cell: CellCoord,
        /// Initial store contents and capacity.
        store: StructureStore,
    },
    /// Removes an existing structure from the world.
    RemoveStructure {
        /// Structure to remove.
        structure: StructureId,
    },
    /// Spawns a new agent.
    SpawnAgent {
        /// Zone that receives the agent.
        zone: ZoneId,
        /// Cell the agent occupies after spawning.
        cell: CellCoord,
        /// Role tag assigned to the agent.
        role: Role,
        /// Fixed carrying capacity of the agent.
        carry_capacity: u32,
        /// Amount harvested per tick when working a source.
        harvest_power: u32,
    },
    /// Removes an agent from the world.
    RemoveAgent {
        /// Agent to remove.
        agent: AgentId,
    },
    /// Resolves queued intents and advances the simulation clock.
    Tick,
    /// Requests withdrawal from a reservoir.
    Withdraw {
        /// Acting agent.
        agent: AgentId,
        /// Reservoir to withdraw from.
        structure: StructureId,
        /// Resource to withdraw.
        resource: ResourceKind,
        /// Requested amount.
        amount: u32,
    },
    /// Requests a transfer into a sink.
    Transfer {
        /// Acting agent.
        agent: AgentId,
        /// Sink receiving the resource.
        structure: StructureId,
        /// Resource to transfer.
        resource: ResourceKind,
        /// Requested amount.
        amount: u32,
    },
    /// Requests a harvest from a source node.
    Harvest {
        /// Acting agent.
        agent: AgentId,
        /// Source to harvest.
        source: SourceId,
    },
    /// Requests one step toward a destination.
    MoveTowards {
        /// Acting agent.
        agent: AgentId,
        /// Cell the agent is heading for.
        destination: CellCoord,
        /// Movement options.
        options: MoveOptions,
    },
}

impl Command {
    /// Agent issuing the command when it is an agent intent.
    #[must_use]
    pub const fn agent(&self) -> Option<AgentId> {
        match self {
            Self::Withdraw { agent, .. }
            | Self::Transfer { agent, .. }
            | Self::Harvest { agent, .. }
            | Self::MoveTowards { agent, .. } => Some(*agent),
            _ => None,
        }
    }
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Tick that became current.
        tick: Tick,
    },
    /// Confirms that a zone was created.
    ZoneCreated {
        /// Identifier allocated to the zone.
        zone: ZoneId,
    },
    /// Confirms that a source was placed.
    SourcePlaced {
        /// Identifier allocated to the source.
        source: SourceId,
        /// Zone containing the source.
        zone: ZoneId,
        /// Cell occupied by the source.
        cell: CellCoord,
    },
    /// Confirms that a structure was placed.
    StructurePlaced {
        /// Identifier allocated to the structure.
        structure: StructureId,
        /// Zone containing the structure.
        zone: ZoneId,
        /// Kind of structure placed.
        kind: StructureKind,
        /// Cell occupied by the structure.
        cell: CellCoord,
    },
    /// Confirms that a structure was removed.
    StructureRemoved {
        /// Identifier of the removed structure.
        structure: StructureId,
    },
    /// Confirms that an agent was spawned.
    AgentSpawned {
        /// Identifier allocated to the agent.
        agent: AgentId,
        /// Zone containing the agent.
        zone: ZoneId,
        /// Cell occupied by the agent.
        cell: CellCoord,
        /// Role tag assigned to the agent.
        role: Role,
    },
    /// Confirms that an agent was removed.
    AgentRemoved {
        /// Identifier of the removed agent.
        agent: AgentId,
    },
    /// Reports that a placement or spawn request was rejected.
    PlacementRejected {
        /// Zone named in the request.
        zone: ZoneId,
        /// Cell named in the request.
        cell: CellCoord,
        /// Specific reason the placement failed.
        reason: PlacementError,
    },
    /// Confirms that an agent moved between two cells.
    AgentMoved {
        /// Agent that moved.
        agent: AgentId,
        /// Cell occupied before the move.
        from: CellCoord,
        /// Cell occupied after the move.
        to: CellCoord,
    },
    /// Confirms a resolved withdrawal.
    ResourceWithdrawn {
        /// Acting agent.
        agent: AgentId,
        /// Reservoir withdrawn from.
        structure: StructureId,
        /// Resource withdrawn.
        resource: ResourceKind,
        /// Amount actually taken.
        amount: u32,
    },
    /// Confirms a resolved transfer.
    ResourceTransferred {
        /// Acting agent.
        agent: AgentId,
        /// Sink that received the resource.
        structure: StructureId,
        /// Resource transferred.
        resource: ResourceKind,
        /// Amount actually delivered.
        amount: u32,
    },
    /// Confirms a resolved harvest.
    SourceHarvested {
        /// Acting agent.
        agent: AgentId,
        /// Source harvested.
        source: SourceId,
        /// Amount actually harvested.
        amount: u32,
    },
    /// Reports that an agent action was rejected or failed at resolution.
    ActionRejected {
        /// Acting agent.
        agent: AgentId,
        /// Kind of action that failed.
        action: ActionKind,
        /// Outcome describing the failure.
        outcome: ActionOutcome,
    },
}

/// Immutable representation of a single agent used for queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentSnapshot {
    /// Unique identifier assigned to the agent.
    pub id: AgentId,
    /// Zone the agent currently occupies.
    pub zone: ZoneId,
    /// Grid cell currently occupied by the agent.
    pub cell: CellCoord,
    /// Role tag assigned at spawn.
    pub role: Role,
    /// Carried resources.
    pub store: Store,
    /// Amount harvested per tick when working a source.
    pub harvest_power: u32,
}

/// Read-only snapshot describing all agents.
#[derive(Clone, Debug, Default)]
pub struct AgentView {
    snapshots: Vec<AgentSnapshot>,
}

impl AgentView {
    /// Creates a new agent view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<AgentSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured agent snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &AgentSnapshot> {
        self.snapshots.iter()
    }

    /// Looks up the snapshot of a single agent.
    #[must_use]
    pub fn get(&self, id: AgentId) -> Option<&AgentSnapshot> {
        self.snapshots
            .binary_search_by_key(&id, |snapshot| snapshot.id)
            .ok()
            .and_then(|index| self.snapshots.get(index))
    }

    /// Reports whether the agent is present in the view.
    #[must_use]
    pub fn contains(&self, id: AgentId) -> bool {
        self.get(id).is_some()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<AgentSnapshot> {
        self.snapshots
    }
}

/// Immutable representation of a single structure used for queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructureSnapshot {
    /// Identifier allocated to the structure.
    pub id: StructureId,
    /// Zone containing the structure.
    pub zone: ZoneId,
    /// Kind of structure.
    pub kind: StructureKind,
    /// Cell occupied by the structure.
    pub cell: CellCoord,
    /// Stored resources.
    pub store: StructureStore,
}

/// Read-only snapshot describing all reservoirs and sinks.
#[derive(Clone, Debug, Default)]
pub struct StructureView {
    snapshots: Vec<StructureSnapshot>,
}

impl StructureView {
    /// Creates a new structure view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<StructureSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured structure snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &StructureSnapshot> {
        self.snapshots.iter()
    }

    /// Iterator over the structures located in `zone`.
    pub fn in_zone(&self, zone: ZoneId) -> impl Iterator<Item = &StructureSnapshot> {
        self.snapshots
            .iter()
            .filter(move |snapshot| snapshot.zone == zone)
    }

    /// Looks up the snapshot of a single structure.
    #[must_use]
    pub fn get(&self, id: StructureId) -> Option<&StructureSnapshot> {
        self.snapshots
            .binary_search_by_key(&id, |snapshot| snapshot.id)
            .ok()
            .and_then(|index| self.snapshots.get(index))
    }

    /// Reports whether the structure is present in the view.
    #[must_use]
    pub fn contains(&self, id: StructureId) -> bool {
        self.get(id).is_some()
    }
}

/// Immutable representation of a single source node used for queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceSnapshot {
    /// Identifier allocated to the source.
    pub id: SourceId,
    /// Zone containing the source.
    pub zone: ZoneId,
    /// Cell occupied by the source.
    pub cell: CellCoord,
    /// Resource yielded by harvesting.
    pub resource: ResourceKind,
    /// Amount currently available for harvesting.
    pub available: u32,
    /// Maximum yield restored on regeneration.
    pub capacity: u32,
}

/// Read-only snapshot describing all source nodes.
#[derive(Clone, Debug, Default)]
pub struct SourceView {
    snapshots: Vec<SourceSnapshot>,
}

impl SourceView {
    /// Creates a new source view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<SourceSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured source snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &SourceSnapshot> {
        self.snapshots.iter()
    }

    /// Iterator over the sources located in `zone`.
    pub fn in_zone(&self, zone: ZoneId) -> impl Iterator<Item = &SourceSnapshot> {
        self.snapshots
            .iter()
            .filter(move |snapshot| snapshot.zone == zone)
    }

    /// Looks up the snapshot of a single source.
    #[must_use]
    pub fn get(&self, id: SourceId) -> Option<&SourceSnapshot> {
        self.snapshots
            .binary_search_by_key(&id, |snapshot| snapshot.id)
            .ok()
            .and_then(|index| self.snapshots.get(index))
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AgentId, AgentSnapshot, AgentView, CellCoord, Command, MoveOptions, Role, Store, Tick,
        ZoneId,
    };

    #[test]
    fn range_uses_chebyshev_metric() {
        let origin = CellCoord::new(1, 1);
        assert_eq!(origin.range_to(CellCoord::new(4, 3)), 3);
        assert_eq!(origin.range_to(CellCoord::new(2, 2)), 1);
        assert_eq!(origin.range_to(origin), 0);
    }

    #[test]
    fn tick_arithmetic_saturates() {
        let early = Tick::new(3);
        let late = Tick::new(10);
        assert_eq!(late.elapsed_since(early), 7);
        assert_eq!(early.elapsed_since(late), 0);
        assert_eq!(Tick::new(u64::MAX).next(), Tick::new(u64::MAX));
    }

    #[test]
    fn agent_view_lookup_is_order_independent() {
        let snapshot = |id: u32| AgentSnapshot {
            id: AgentId::new(id),
            zone: ZoneId::new(0),
            cell: CellCoord::new(id, 0),
            role: Role::Hauler,
            store: Store::new(50),
            harvest_power: 0,
        };
        let view = AgentView::from_snapshots(vec![snapshot(7), snapshot(2), snapshot(5)]);

        let ids: Vec<_> = view.iter().map(|agent| agent.id.get()).collect();
        assert_eq!(ids, vec![2, 5, 7]);
        assert_eq!(
            view.get(AgentId::new(5)).map(|agent| agent.cell),
            Some(CellCoord::new(5, 0))
        );
        assert!(!view.contains(AgentId::new(6)));
    }

    #[test]
    fn reroute_options_relax_constraints() {
        let normal = MoveOptions::normal(1);
        let reroute = MoveOptions::reroute(1);
        assert!(!normal.is_reroute());
        assert!(reroute.is_reroute());
        assert!(!reroute.reuse_path);
        assert!(reroute.search_budget > normal.search_budget);
        assert!(!MoveOptions::fresh(1).reuse_path);
    }

    #[test]
    fn only_intents_report_an_agent() {
        assert_eq!(Command::Tick.agent(), None);
        let command = Command::MoveTowards {
            agent: AgentId::new(4),
            destination: CellCoord::new(0, 0),
            options: MoveOptions::normal(1),
        };
        assert_eq!(command.agent(), Some(AgentId::new(4)));
    }
}
