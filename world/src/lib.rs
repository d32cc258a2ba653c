#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative host simulation for the colony logistics scheduler.
//!
//! Agent intents are validated against the state they observe and queued. They
//! resolve together when the next [`Command::Tick`] arrives, so two agents that
//! both saw the same stored amount can still collide at resolution time; that
//! race is what the reservation ledger exists to prevent.

mod intents;
mod pathing;

use std::collections::{BTreeMap, BTreeSet};

use colony_logistics_core::{
    ActionKind, ActionOutcome, AgentId, CellCoord, Command, Event, MoveOptions, PlacementError,
    ResourceKind, Role, SourceId, Storable, Store, StructureId, StructureKind, StructureStore,
    Tick, ZoneId, INTERACTION_RANGE,
};

use intents::{Intent, IntentFrame};
use pathing::{plan_path, CachedPath, PathRequest};

/// Represents the authoritative world state.
#[derive(Debug)]
pub struct World {
    tick: Tick,
    zones: BTreeMap<ZoneId, Zone>,
    sources: BTreeMap<SourceId, SourceState>,
    structures: BTreeMap<StructureId, StructureState>,
    agents: BTreeMap<AgentId, AgentState>,
    intents: IntentFrame,
    paths: BTreeMap<AgentId, CachedPath>,
    next_zone: u32,
    next_source: u32,
    next_structure: u32,
    next_agent: u32,
}

#[derive(Debug)]
struct Zone {
    columns: u32,
    rows: u32,
    walls: BTreeSet<CellCoord>,
}

impl Zone {
    fn contains(&self, cell: CellCoord) -> bool {
        cell.column() < self.columns && cell.row() < self.rows
    }
}

#[derive(Debug)]
struct SourceState {
    zone: ZoneId,
    cell: CellCoord,
    resource: ResourceKind,
    capacity: u32,
    available: u32,
    regen_ticks: u32,
    regen_in: Option<u32>,
}

#[derive(Debug)]
struct StructureState {
    zone: ZoneId,
    kind: StructureKind,
    cell: CellCoord,
    store: StructureStore,
}

#[derive(Debug)]
struct AgentState {
    zone: ZoneId,
    cell: CellCoord,
    role: Role,
    store: Store,
    harvest_power: u32,
}

/// Cells blocking movement within one zone during move resolution.
#[derive(Debug, Default)]
struct ZoneOccupancy {
    impassable: BTreeSet<CellCoord>,
    agents: BTreeMap<CellCoord, AgentId>,
}

impl World {
    /// Creates an empty world at tick zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tick: Tick::default(),
            zones: BTreeMap::new(),
            sources: BTreeMap::new(),
            structures: BTreeMap::new(),
            agents: BTreeMap::new(),
            intents: IntentFrame::new(),
            paths: BTreeMap::new(),
            next_zone: 0,
            next_source: 0,
            next_structure: 0,
            next_agent: 0,
        }
    }

    fn check_placement(&self, zone_id: ZoneId, cell: CellCoord) -> Result<(), PlacementError> {
        let zone = self
            .zones
            .get(&zone_id)
            .ok_or(PlacementError::MissingZone)?;
        if !zone.contains(cell) {
            return Err(PlacementError::OutOfBounds);
        }

        let occupied = zone.walls.contains(&cell)
            || self
                .sources
                .values()
                .any(|source| source.zone == zone_id && source.cell == cell)
            || self
                .structures
                .values()
                .any(|structure| structure.zone == zone_id && structure.cell == cell)
            || self
                .agents
                .values()
                .any(|agent| agent.zone == zone_id && agent.cell == cell);
        if occupied {
            return Err(PlacementError::Occupied);
        }
        Ok(())
    }

    fn queue_intent(&mut self, intent: Intent, out_events: &mut Vec<Event>) {
        let agent = intent.agent();
        let outcome = if self.intents.contains(agent) {
            ActionOutcome::Busy
        } else {
            self.validate(&intent)
        };

        if outcome == ActionOutcome::Success {
            self.intents.queue(intent);
        } else {
            out_events.push(Event::ActionRejected {
                agent,
                action: intent.kind(),
                outcome,
            });
        }
    }

    fn validate(&self, intent: &Intent) -> ActionOutcome {
        let Some(agent) = self.agents.get(&intent.agent()) else {
            return ActionOutcome::TargetUnavailable;
        };

        match *intent {
            Intent::Withdraw {
                structure,
                resource,
                amount,
                ..
            } => {
                let Some(reservoir) = self.structures.get(&structure) else {
                    return ActionOutcome::TargetUnavailable;
                };
                if reservoir.zone != agent.zone || !reservoir.kind.is_reservoir() {
                    return ActionOutcome::TargetUnavailable;
                }
                if agent.cell.range_to(reservoir.cell) > INTERACTION_RANGE {
                    return ActionOutcome::OutOfRange;
                }
                if amount == 0 || agent.store.free() == 0 {
                    return ActionOutcome::TargetUnavailable;
                }
                if reservoir.store.used_capacity(resource) == 0 {
                    return ActionOutcome::ResourceInsufficient;
                }
                ActionOutcome::Success
            }
            Intent::Transfer {
                structure,
                resource,
                amount,
                ..
            } => {
                let Some(sink) = self.structures.get(&structure) else {
                    return ActionOutcome::TargetUnavailable;
                };
                if sink.zone != agent.zone {
                    return ActionOutcome::TargetUnavailable;
                }
                if agent.cell.range_to(sink.cell) > INTERACTION_RANGE {
                    return ActionOutcome::OutOfRange;
                }
                if amount == 0 || agent.store.amount(resource) == 0 {
                    return ActionOutcome::ResourceInsufficient;
                }
                if sink.store.free_capacity(resource) == 0 {
                    return ActionOutcome::TargetUnavailable;
                }
                ActionOutcome::Success
            }
            Intent::Harvest { source, .. } => {
                let Some(node) = self.sources.get(&source) else {
                    return ActionOutcome::TargetUnavailable;
                };
                if node.zone != agent.zone {
                    return ActionOutcome::TargetUnavailable;
                }
                if agent.cell.range_to(node.cell) > INTERACTION_RANGE {
                    return ActionOutcome::OutOfRange;
                }
                if agent.harvest_power == 0 || agent.store.free() == 0 {
                    return ActionOutcome::TargetUnavailable;
                }
                if node.available == 0 {
                    return ActionOutcome::ResourceInsufficient;
                }
                ActionOutcome::Success
            }
            Intent::Move { destination, .. } => {
                let inside = self
                    .zones
                    .get(&agent.zone)
                    .is_some_and(|zone| zone.contains(destination));
                if inside {
                    ActionOutcome::Success
                } else {
                    ActionOutcome::TargetUnavailable
                }
            }
        }
    }

    fn resolve_tick(&mut self, out_events: &mut Vec<Event>) {
        let (moves, actions): (Vec<Intent>, Vec<Intent>) = self
            .intents
            .drain_sorted()
            .into_iter()
            .partition(|intent| intent.kind() == ActionKind::Move);

        for intent in actions {
            self.resolve_action(intent, out_events);
        }
        self.resolve_moves(moves, out_events);
        self.regenerate_sources();

        self.tick = self.tick.next();
        out_events.push(Event::TimeAdvanced { tick: self.tick });
    }

    fn resolve_action(&mut self, intent: Intent, out_events: &mut Vec<Event>) {
        let outcome = self.validate(&intent);
        if outcome != ActionOutcome::Success {
            out_events.push(Event::ActionRejected {
                agent: intent.agent(),
                action: intent.kind(),
                outcome,
            });
            return;
        }

        match intent {
            Intent::Withdraw {
                agent,
                structure,
                resource,
                amount,
            } => {
                let (Some(carrier), Some(reservoir)) = (
                    self.agents.get_mut(&agent),
                    self.structures.get_mut(&structure),
                ) else {
                    return;
                };
                let wanted = amount
                    .min(reservoir.store.used_capacity(resource))
                    .min(carrier.store.free());
                let taken = reservoir.store.take(resource, wanted);
                let _ = carrier.store.add(resource, taken);
                out_events.push(Event::ResourceWithdrawn {
                    agent,
                    structure,
                    resource,
                    amount: taken,
                });
            }
            Intent::Transfer {
                agent,
                structure,
                resource,
                amount,
            } => {
                let (Some(carrier), Some(sink)) = (
                    self.agents.get_mut(&agent),
                    self.structures.get_mut(&structure),
                ) else {
                    return;
                };
                let offered = amount.min(carrier.store.amount(resource));
                let stored = sink.store.deposit(resource, offered);
                let _ = carrier.store.remove(resource, stored);
                out_events.push(Event::ResourceTransferred {
                    agent,
                    structure,
                    resource,
                    amount: stored,
                });
            }
            Intent::Harvest { agent, source } => {
                let (Some(harvester), Some(node)) =
                    (self.agents.get_mut(&agent), self.sources.get_mut(&source))
                else {
                    return;
                };
                let yielded = harvester
                    .harvest_power
                    .min(node.available)
                    .min(harvester.store.free());
                node.available -= yielded;
                if node.regen_in.is_none() {
                    node.regen_in = Some(node.regen_ticks);
                }
                let _ = harvester.store.add(node.resource, yielded);
                out_events.push(Event::SourceHarvested {
                    agent,
                    source,
                    amount: yielded,
                });
            }
            Intent::Move { .. } => {}
        }
    }

    fn resolve_moves(&mut self, moves: Vec<Intent>, out_events: &mut Vec<Event>) {
        if moves.is_empty() {
            return;
        }

        let mut occupancy = self.occupancy();
        let mut moved = BTreeSet::new();
        for intent in moves {
            let Intent::Move {
                agent,
                destination,
                options,
            } = intent
            else {
                continue;
            };

            if let Err(outcome) = self.step_agent(
                agent,
                destination,
                options,
                &mut occupancy,
                &mut moved,
                out_events,
            ) {
                out_events.push(Event::ActionRejected {
                    agent,
                    action: ActionKind::Move,
                    outcome,
                });
            }
        }
    }

    fn step_agent(
        &mut self,
        agent: AgentId,
        destination: CellCoord,
        options: MoveOptions,
        occupancy: &mut BTreeMap<ZoneId, ZoneOccupancy>,
        moved: &mut BTreeSet<AgentId>,
        out_events: &mut Vec<Event>,
    ) -> Result<(), ActionOutcome> {
        let (zone_id, origin) = self
            .agents
            .get(&agent)
            .map(|state| (state.zone, state.cell))
            .ok_or(ActionOutcome::TargetUnavailable)?;
        if origin.range_to(destination) <= options.range {
            let _ = self.paths.remove(&agent);
            return Ok(());
        }

        let zone = self
            .zones
            .get(&zone_id)
            .ok_or(ActionOutcome::TargetUnavailable)?;
        let occupied = occupancy.entry(zone_id).or_default();

        let reusable = options.reuse_path
            && self
                .paths
                .get(&agent)
                .is_some_and(|path| path.follows(origin, destination, options.range));
        if !reusable {
            let request = PathRequest {
                columns: zone.columns,
                rows: zone.rows,
                start: origin,
                destination,
                range: options.range,
                budget: options.search_budget,
            };
            let planned = plan_path(request, |cell| {
                occupied.impassable.contains(&cell)
                    || (!options.ignore_agents && occupied.agents.contains_key(&cell))
            });
            match planned {
                Some(steps) => {
                    let _ = self.paths.insert(
                        agent,
                        CachedPath::new(destination, options.range, steps),
                    );
                }
                None => {
                    let _ = self.paths.remove(&agent);
                    // Blocked only by agents: a stall, not a dead end.
                    let crowded = !options.ignore_agents
                        && plan_path(request, |cell| occupied.impassable.contains(&cell))
                            .is_some();
                    return Err(if crowded {
                        ActionOutcome::Busy
                    } else {
                        ActionOutcome::TargetUnavailable
                    });
                }
            }
        }

        let next = self
            .paths
            .get(&agent)
            .and_then(CachedPath::next_step)
            .ok_or(ActionOutcome::TargetUnavailable)?;
        if occupied.impassable.contains(&next) {
            let _ = self.paths.remove(&agent);
            return Err(ActionOutcome::Busy);
        }

        match occupied.agents.get(&next).copied() {
            None => {
                let _ = occupied.agents.remove(&origin);
            }
            Some(other) if options.ignore_agents && !moved.contains(&other) => {
                if let Some(state) = self.agents.get_mut(&other) {
                    state.cell = origin;
                }
                let _ = occupied.agents.insert(origin, other);
                let _ = moved.insert(other);
                out_events.push(Event::AgentMoved {
                    agent: other,
                    from: next,
                    to: origin,
                });
            }
            Some(_) => return Err(ActionOutcome::Busy),
        }

        if let Some(state) = self.agents.get_mut(&agent) {
            state.cell = next;
        }
        let _ = occupied.agents.insert(next, agent);
        let _ = moved.insert(agent);
        if let Some(path) = self.paths.get_mut(&agent) {
            path.advance();
        }
        out_events.push(Event::AgentMoved {
            agent,
            from: origin,
            to: next,
        });
        Ok(())
    }

    fn occupancy(&self) -> BTreeMap<ZoneId, ZoneOccupancy> {
        let mut occupancy: BTreeMap<ZoneId, ZoneOccupancy> = BTreeMap::new();
        for (zone_id, zone) in &self.zones {
            occupancy
                .entry(*zone_id)
                .or_default()
                .impassable
                .extend(zone.walls.iter().copied());
        }
        for source in self.sources.values() {
            let _ = occupancy
                .entry(source.zone)
                .or_default()
                .impassable
                .insert(source.cell);
        }
        for structure in self.structures.values() {
            let _ = occupancy
                .entry(structure.zone)
                .or_default()
                .impassable
                .insert(structure.cell);
        }
        for (agent_id, agent) in &self.agents {
            let _ = occupancy
                .entry(agent.zone)
                .or_default()
                .agents
                .insert(agent.cell, *agent_id);
        }
        occupancy
    }

    fn regenerate_sources(&mut self) {
        for source in self.sources.values_mut() {
            match source.regen_in {
                Some(remaining) if remaining <= 1 => {
                    source.available = source.capacity;
                    source.regen_in = None;
                }
                Some(remaining) => source.regen_in = Some(remaining - 1),
                None => {}
            }
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::CreateZone {
            columns,
            rows,
            walls,
        } => {
            let zone = ZoneId::new(world.next_zone);
            world.next_zone += 1;
            let walls = walls
                .into_iter()
                .filter(|cell| cell.column() < columns && cell.row() < rows)
                .collect();
            let _ = world.zones.insert(
                zone,
                Zone {
                    columns,
                    rows,
                    walls,
                },
            );
            out_events.push(Event::ZoneCreated { zone });
        }
        Command::PlaceSource {
            zone,
            cell,
            resource,
            capacity,
            regen_ticks,
        } => match world.check_placement(zone, cell) {
            Ok(()) => {
                let source = SourceId::new(world.next_source);
                world.next_source += 1;
                let _ = world.sources.insert(
                    source,
                    SourceState {
                        zone,
                        cell,
                        resource,
                        capacity,
                        available: capacity,
                        regen_ticks,
                        regen_in: None,
                    },
                );
                out_events.push(Event::SourcePlaced { source, zone, cell });
            }
            Err(reason) => out_events.push(Event::PlacementRejected { zone, cell, reason }),
        },
        Command::PlaceStructure {
            zone,
            kind,
            cell,
            store,
        } => match world.check_placement(zone, cell) {
            Ok(()) => {
                let structure = StructureId::new(world.next_structure);
                world.next_structure += 1;
                let _ = world.structures.insert(
                    structure,
                    StructureState {
                        zone,
                        kind,
                        cell,
                        store,
                    },
                );
                out_events.push(Event::StructurePlaced {
                    structure,
                    zone,
                    kind,
                    cell,
                });
            }
            Err(reason) => out_events.push(Event::PlacementRejected { zone, cell, reason }),
        },
        Command::RemoveStructure { structure } => {
            if world.structures.remove(&structure).is_some() {
                out_events.push(Event::StructureRemoved { structure });
            }
        }
        Command::SpawnAgent {
            zone,
            cell,
            role,
            carry_capacity,
            harvest_power,
        } => match world.check_placement(zone, cell) {
            Ok(()) => {
                let agent = AgentId::new(world.next_agent);
                world.next_agent += 1;
                let _ = world.agents.insert(
                    agent,
                    AgentState {
                        zone,
                        cell,
                        role,
                        store: Store::new(carry_capacity),
                        harvest_power,
                    },
                );
                out_events.push(Event::AgentSpawned {
                    agent,
                    zone,
                    cell,
                    role,
                });
            }
            Err(reason) => out_events.push(Event::PlacementRejected { zone, cell, reason }),
        },
        Command::RemoveAgent { agent } => {
            if world.agents.remove(&agent).is_some() {
                let _ = world.paths.remove(&agent);
                world.intents.discard(agent);
                out_events.push(Event::AgentRemoved { agent });
            }
        }
        Command::Tick => world.resolve_tick(out_events),
        Command::Withdraw {
            agent,
            structure,
            resource,
            amount,
        } => world.queue_intent(
            Intent::Withdraw {
                agent,
                structure,
                resource,
                amount,
            },
            out_events,
        ),
        Command::Transfer {
            agent,
            structure,
            resource,
            amount,
        } => world.queue_intent(
            Intent::Transfer {
                agent,
                structure,
                resource,
                amount,
            },
            out_events,
        ),
        Command::Harvest { agent, source } => {
            world.queue_intent(Intent::Harvest { agent, source }, out_events);
        }
        Command::MoveTowards {
            agent,
            destination,
            options,
        } => world.queue_intent(
            Intent::Move {
                agent,
                destination,
                options,
            },
            out_events,
        ),
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use super::World;
    use colony_logistics_core::{
        AgentId, AgentSnapshot, AgentView, SourceSnapshot, SourceView, StructureSnapshot,
        StructureView, Tick,
    };

    /// Current simulation tick.
    #[must_use]
    pub fn tick(world: &World) -> Tick {
        world.tick
    }

    /// Captures a read-only view of every agent.
    #[must_use]
    pub fn agent_view(world: &World) -> AgentView {
        AgentView::from_snapshots(
            world
                .agents
                .iter()
                .map(|(id, agent)| AgentSnapshot {
                    id: *id,
                    zone: agent.zone,
                    cell: agent.cell,
                    role: agent.role,
                    store: agent.store.clone(),
                    harvest_power: agent.harvest_power,
                })
                .collect(),
        )
    }

    /// Captures a read-only view of every structure.
    #[must_use]
    pub fn structure_view(world: &World) -> StructureView {
        StructureView::from_snapshots(
            world
                .structures
                .iter()
                .map(|(id, structure)| StructureSnapshot {
                    id: *id,
                    zone: structure.zone,
                    kind: structure.kind,
                    cell: structure.cell,
                    store: structure.store.clone(),
                })
                .collect(),
        )
    }

    /// Captures a read-only view of every source node.
    #[must_use]
    pub fn source_view(world: &World) -> SourceView {
        SourceView::from_snapshots(
            world
                .sources
                .iter()
                .map(|(id, source)| SourceSnapshot {
                    id: *id,
                    zone: source.zone,
                    cell: source.cell,
                    resource: source.resource,
                    available: source.available,
                    capacity: source.capacity,
                })
                .collect(),
        )
    }

    /// Number of steps left on the path cached for an agent.
    #[must_use]
    pub fn cached_path_len(world: &World, agent: AgentId) -> Option<usize> {
        world.paths.get(&agent).map(|path| path.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(world: &mut World, columns: u32, rows: u32, walls: Vec<CellCoord>) -> ZoneId {
        let mut events = Vec::new();
        apply(
            world,
            Command::CreateZone {
                columns,
                rows,
                walls,
            },
            &mut events,
        );
        match events.as_slice() {
            [Event::ZoneCreated { zone }] => *zone,
            other => panic!("unexpected events {other:?}"),
        }
    }

    fn container(world: &mut World, zone: ZoneId, cell: CellCoord, amount: u32) -> StructureId {
        let mut events = Vec::new();
        apply(
            world,
            Command::PlaceStructure {
                zone,
                kind: StructureKind::Container,
                cell,
                store: StructureStore::pooled(Store::new(2_000).with(ResourceKind::Energy, amount)),
            },
            &mut events,
        );
        match events.as_slice() {
            [Event::StructurePlaced { structure, .. }] => *structure,
            other => panic!("unexpected events {other:?}"),
        }
    }

    fn agent(world: &mut World, zone: ZoneId, cell: CellCoord, carry_capacity: u32) -> AgentId {
        let mut events = Vec::new();
        apply(
            world,
            Command::SpawnAgent {
                zone,
                cell,
                role: Role::Hauler,
                carry_capacity,
                harvest_power: 10,
            },
            &mut events,
        );
        match events.as_slice() {
            [Event::AgentSpawned { agent, .. }] => *agent,
            other => panic!("unexpected events {other:?}"),
        }
    }

    fn withdraw(agent: AgentId, structure: StructureId, amount: u32) -> Command {
        Command::Withdraw {
            agent,
            structure,
            resource: ResourceKind::Energy,
            amount,
        }
    }

    fn carried(world: &World, agent: AgentId) -> u32 {
        query::agent_view(world)
            .get(agent)
            .map(|snapshot| snapshot.store.used())
            .unwrap_or_default()
    }

    #[test]
    fn placement_is_validated() {
        let mut world = World::new();
        let zone_id = zone(&mut world, 5, 5, vec![CellCoord::new(2, 2)]);
        let mut events = Vec::new();

        for (zone, cell) in [
            (ZoneId::new(9), CellCoord::new(0, 0)),
            (zone_id, CellCoord::new(5, 0)),
            (zone_id, CellCoord::new(2, 2)),
        ] {
            apply(
                &mut world,
                Command::PlaceSource {
                    zone,
                    cell,
                    resource: ResourceKind::Energy,
                    capacity: 100,
                    regen_ticks: 10,
                },
                &mut events,
            );
        }

        let reasons: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                Event::PlacementRejected { reason, .. } => Some(*reason),
                _ => None,
            })
            .collect();
        assert_eq!(
            reasons,
            vec![
                PlacementError::MissingZone,
                PlacementError::OutOfBounds,
                PlacementError::Occupied
            ]
        );
        assert_eq!(query::source_view(&world).iter().count(), 0);
    }

    #[test]
    fn intents_resolve_only_on_tick() {
        let mut world = World::new();
        let zone_id = zone(&mut world, 6, 6, Vec::new());
        let reservoir = container(&mut world, zone_id, CellCoord::new(2, 2), 100);
        let hauler = agent(&mut world, zone_id, CellCoord::new(2, 3), 50);
        let mut events = Vec::new();

        apply(&mut world, withdraw(hauler, reservoir, 50), &mut events);
        assert!(events.is_empty());
        assert_eq!(carried(&world, hauler), 0);

        apply(&mut world, Command::Tick, &mut events);
        assert_eq!(carried(&world, hauler), 50);
        assert_eq!(
            events,
            vec![
                Event::ResourceWithdrawn {
                    agent: hauler,
                    structure: reservoir,
                    resource: ResourceKind::Energy,
                    amount: 50,
                },
                Event::TimeAdvanced { tick: Tick::new(1) },
            ]
        );
    }

    #[test]
    fn concurrent_withdrawals_are_clamped_then_rejected() {
        let mut world = World::new();
        let zone_id = zone(&mut world, 6, 6, Vec::new());
        let reservoir = container(&mut world, zone_id, CellCoord::new(2, 2), 50);
        let first = agent(&mut world, zone_id, CellCoord::new(1, 1), 40);
        let second = agent(&mut world, zone_id, CellCoord::new(3, 3), 40);
        let mut events = Vec::new();

        apply(&mut world, withdraw(first, reservoir, 40), &mut events);
        apply(&mut world, withdraw(second, reservoir, 40), &mut events);
        assert!(events.is_empty(), "both intents validate against 50 stored");
        apply(&mut world, Command::Tick, &mut events);

        assert_eq!(carried(&world, first), 40);
        assert_eq!(carried(&world, second), 10);

        let third = agent(&mut world, zone_id, CellCoord::new(1, 3), 40);
        events.clear();
        apply(&mut world, withdraw(third, reservoir, 40), &mut events);
        assert_eq!(
            events,
            vec![Event::ActionRejected {
                agent: third,
                action: ActionKind::Withdraw,
                outcome: ActionOutcome::ResourceInsufficient,
            }]
        );
    }

    #[test]
    fn second_intent_in_one_tick_is_busy() {
        let mut world = World::new();
        let zone_id = zone(&mut world, 6, 6, Vec::new());
        let reservoir = container(&mut world, zone_id, CellCoord::new(2, 2), 100);
        let hauler = agent(&mut world, zone_id, CellCoord::new(2, 3), 50);
        let mut events = Vec::new();

        apply(&mut world, withdraw(hauler, reservoir, 10), &mut events);
        apply(
            &mut world,
            Command::MoveTowards {
                agent: hauler,
                destination: CellCoord::new(5, 5),
                options: MoveOptions::normal(0),
            },
            &mut events,
        );

        assert_eq!(
            events,
            vec![Event::ActionRejected {
                agent: hauler,
                action: ActionKind::Move,
                outcome: ActionOutcome::Busy,
            }]
        );
    }

    #[test]
    fn distant_targets_are_out_of_range() {
        let mut world = World::new();
        let zone_id = zone(&mut world, 6, 6, Vec::new());
        let reservoir = container(&mut world, zone_id, CellCoord::new(0, 0), 100);
        let hauler = agent(&mut world, zone_id, CellCoord::new(2, 2), 50);
        let mut events = Vec::new();

        apply(&mut world, withdraw(hauler, reservoir, 10), &mut events);

        assert_eq!(
            events,
            vec![Event::ActionRejected {
                agent: hauler,
                action: ActionKind::Withdraw,
                outcome: ActionOutcome::OutOfRange,
            }]
        );
    }

    #[test]
    fn movement_follows_cached_path_around_walls() {
        let mut world = World::new();
        let walls = (0..4).map(|row| CellCoord::new(2, row)).collect();
        let zone_id = zone(&mut world, 5, 5, walls);
        let walker = agent(&mut world, zone_id, CellCoord::new(0, 0), 50);
        let destination = CellCoord::new(4, 0);
        let mut events = Vec::new();

        for _ in 0..10 {
            apply(
                &mut world,
                Command::MoveTowards {
                    agent: walker,
                    destination,
                    options: MoveOptions::normal(0),
                },
                &mut events,
            );
            apply(&mut world, Command::Tick, &mut events);
        }

        let cell = query::agent_view(&world).get(walker).map(|agent| agent.cell);
        assert_eq!(cell, Some(destination));
        assert!(events.iter().any(|event| matches!(
            event,
            Event::AgentMoved { to, .. } if *to == CellCoord::new(2, 4)
        )));
        assert_eq!(query::cached_path_len(&world, walker), None);
    }

    #[test]
    fn exhausted_search_reports_target_unavailable() {
        let mut world = World::new();
        let zone_id = zone(&mut world, 40, 40, Vec::new());
        let walker = agent(&mut world, zone_id, CellCoord::new(0, 0), 50);
        let mut events = Vec::new();

        apply(
            &mut world,
            Command::MoveTowards {
                agent: walker,
                destination: CellCoord::new(39, 39),
                options: MoveOptions {
                    search_budget: 10,
                    ..MoveOptions::normal(0)
                },
            },
            &mut events,
        );
        apply(&mut world, Command::Tick, &mut events);

        assert_eq!(
            events.first(),
            Some(&Event::ActionRejected {
                agent: walker,
                action: ActionKind::Move,
                outcome: ActionOutcome::TargetUnavailable,
            })
        );
    }

    #[test]
    fn blocked_step_is_busy_unless_rerouting() {
        let mut world = World::new();
        let walls = vec![
            CellCoord::new(0, 0),
            CellCoord::new(1, 0),
            CellCoord::new(2, 0),
            CellCoord::new(0, 2),
            CellCoord::new(1, 2),
            CellCoord::new(2, 2),
        ];
        let zone_id = zone(&mut world, 3, 3, walls);
        let mover = agent(&mut world, zone_id, CellCoord::new(0, 1), 50);
        let blocker = agent(&mut world, zone_id, CellCoord::new(1, 1), 50);
        let destination = CellCoord::new(2, 1);
        let mut events = Vec::new();

        apply(
            &mut world,
            Command::MoveTowards {
                agent: mover,
                destination,
                options: MoveOptions::normal(0),
            },
            &mut events,
        );
        apply(&mut world, Command::Tick, &mut events);
        assert_eq!(
            events.first(),
            Some(&Event::ActionRejected {
                agent: mover,
                action: ActionKind::Move,
                outcome: ActionOutcome::Busy,
            }),
            "a route closed only by agents is a stall, not a dead end"
        );
        assert_eq!(query::cached_path_len(&world, mover), None);

        events.clear();
        apply(
            &mut world,
            Command::MoveTowards {
                agent: mover,
                destination,
                options: MoveOptions::reroute(0),
            },
            &mut events,
        );
        apply(&mut world, Command::Tick, &mut events);

        let view = query::agent_view(&world);
        assert_eq!(view.get(mover).map(|a| a.cell), Some(CellCoord::new(1, 1)));
        assert_eq!(view.get(blocker).map(|a| a.cell), Some(CellCoord::new(0, 1)));
    }

    #[test]
    fn cached_path_blocked_by_newcomer_reports_busy() {
        let mut world = World::new();
        let zone_id = zone(&mut world, 8, 1, Vec::new());
        let mover = agent(&mut world, zone_id, CellCoord::new(0, 0), 50);
        let destination = CellCoord::new(7, 0);
        let mut events = Vec::new();

        let step = |world: &mut World, events: &mut Vec<Event>| {
            apply(
                world,
                Command::MoveTowards {
                    agent: mover,
                    destination,
                    options: MoveOptions::normal(0),
                },
                events,
            );
            apply(world, Command::Tick, events);
        };

        step(&mut world, &mut events);
        let _blocker = agent(&mut world, zone_id, CellCoord::new(2, 0), 50);
        events.clear();
        step(&mut world, &mut events);

        assert_eq!(
            events.first(),
            Some(&Event::ActionRejected {
                agent: mover,
                action: ActionKind::Move,
                outcome: ActionOutcome::Busy,
            })
        );
    }

    #[test]
    fn harvesting_starts_regeneration_countdown() {
        let mut world = World::new();
        let zone_id = zone(&mut world, 4, 4, Vec::new());
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::PlaceSource {
                zone: zone_id,
                cell: CellCoord::new(0, 0),
                resource: ResourceKind::Mineral,
                capacity: 30,
                regen_ticks: 3,
            },
            &mut events,
        );
        let harvester = agent(&mut world, zone_id, CellCoord::new(1, 1), 100);
        let source = SourceId::new(0);
        let available = |world: &World| {
            query::source_view(world)
                .get(source)
                .map(|snapshot| snapshot.available)
        };

        apply(&mut world, Command::Harvest { agent: harvester, source }, &mut events);
        apply(&mut world, Command::Tick, &mut events);
        assert_eq!(available(&world), Some(20));

        apply(&mut world, Command::Harvest { agent: harvester, source }, &mut events);
        apply(&mut world, Command::Tick, &mut events);
        assert_eq!(available(&world), Some(10));

        apply(&mut world, Command::Tick, &mut events);
        assert_eq!(available(&world), Some(30));
        let mineral = query::agent_view(&world)
            .get(harvester)
            .map(|snapshot| snapshot.store.amount(ResourceKind::Mineral));
        assert_eq!(mineral, Some(20));
    }

    #[test]
    fn removing_an_agent_discards_its_intent() {
        let mut world = World::new();
        let zone_id = zone(&mut world, 6, 6, Vec::new());
        let reservoir = container(&mut world, zone_id, CellCoord::new(2, 2), 100);
        let hauler = agent(&mut world, zone_id, CellCoord::new(2, 3), 50);
        let mut events = Vec::new();

        apply(&mut world, withdraw(hauler, reservoir, 50), &mut events);
        apply(&mut world, Command::RemoveAgent { agent: hauler }, &mut events);
        apply(&mut world, Command::Tick, &mut events);

        assert_eq!(
            events,
            vec![
                Event::AgentRemoved { agent: hauler },
                Event::TimeAdvanced { tick: Tick::new(1) },
            ]
        );
        let stored = query::structure_view(&world)
            .get(reservoir)
            .map(|snapshot| snapshot.store.used_capacity(ResourceKind::Energy));
        assert_eq!(stored, Some(100));
    }
}
