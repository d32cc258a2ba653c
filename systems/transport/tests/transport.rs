use std::collections::BTreeSet;

use colony_logistics_core::{
    ActionKind, ActionOutcome, AgentId, AgentSnapshot, CellCoord, Command, Event, LogisticsConfig,
    MemoryStore, OperatingMode, ResourceKind, Role, SourceCaps, SourceId, Storable, Store,
    StructureId, StructureKind, StructureStore, ZoneId,
};
use colony_logistics_system_reservations::ReservationLedger;
use colony_logistics_system_transport::Transport;
use colony_logistics_world::{self as world, query, World};

struct Simulation {
    world: World,
    transport: Transport,
    memory: MemoryStore,
    ledger: ReservationLedger,
    pending: Vec<Event>,
    history: Vec<Event>,
}

impl Simulation {
    fn new(config: &LogisticsConfig) -> Self {
        Self {
            world: World::new(),
            transport: Transport::new(config),
            memory: MemoryStore::new(),
            ledger: ReservationLedger::new(),
            pending: Vec::new(),
            history: Vec::new(),
        }
    }

    fn setup(&mut self, command: Command) -> Event {
        let mut events = Vec::new();
        world::apply(&mut self.world, command, &mut events);
        assert_eq!(events.len(), 1, "setup produced {events:?}");
        events.remove(0)
    }

    fn zone(&mut self, columns: u32, rows: u32, walls: Vec<CellCoord>) -> ZoneId {
        match self.setup(Command::CreateZone {
            columns,
            rows,
            walls,
        }) {
            Event::ZoneCreated { zone } => zone,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn source(&mut self, zone: ZoneId, cell: CellCoord, capacity: u32) -> SourceId {
        self.source_of(zone, cell, ResourceKind::Energy, capacity)
    }

    fn source_of(
        &mut self,
        zone: ZoneId,
        cell: CellCoord,
        resource: ResourceKind,
        capacity: u32,
    ) -> SourceId {
        match self.setup(Command::PlaceSource {
            zone,
            cell,
            resource,
            capacity,
            regen_ticks: 50,
        }) {
            Event::SourcePlaced { source, .. } => source,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn structure(
        &mut self,
        zone: ZoneId,
        kind: StructureKind,
        cell: CellCoord,
        store: StructureStore,
    ) -> StructureId {
        match self.setup(Command::PlaceStructure {
            zone,
            kind,
            cell,
            store,
        }) {
            Event::StructurePlaced { structure, .. } => structure,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn agent(&mut self, zone: ZoneId, cell: CellCoord, role: Role, capacity: u32) -> AgentId {
        match self.setup(Command::SpawnAgent {
            zone,
            cell,
            role,
            carry_capacity: capacity,
            harvest_power: 10,
        }) {
            Event::AgentSpawned { agent, .. } => agent,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn step(&mut self) -> Vec<Command> {
        world::apply(&mut self.world, Command::Tick, &mut self.pending);
        let events = std::mem::take(&mut self.pending);

        let mut commands = Vec::new();
        self.transport.handle(
            &events,
            &query::agent_view(&self.world),
            &query::structure_view(&self.world),
            &query::source_view(&self.world),
            &mut self.memory,
            &mut self.ledger,
            mode_for,
            &mut commands,
        );

        let issuers: BTreeSet<AgentId> = commands.iter().filter_map(Command::agent).collect();
        assert_eq!(issuers.len(), commands.len(), "one intent per agent per tick");

        self.history.extend(events);
        for command in &commands {
            world::apply(&mut self.world, command.clone(), &mut self.pending);
        }
        commands
    }

    fn run(&mut self, ticks: usize) -> Vec<Command> {
        (0..ticks).flat_map(|_| self.step()).collect()
    }

    fn stored(&self, structure: StructureId) -> u32 {
        self.holding(structure, ResourceKind::Energy)
    }

    fn holding(&self, structure: StructureId, resource: ResourceKind) -> u32 {
        query::structure_view(&self.world)
            .get(structure)
            .map(|snapshot| snapshot.store.used_capacity(resource))
            .unwrap_or_default()
    }

    fn reroutes(commands: &[Command]) -> usize {
        commands
            .iter()
            .filter(|command| {
                matches!(command, Command::MoveTowards { options, .. } if options.is_reroute())
            })
            .count()
    }

    fn carried(&self, agent: AgentId) -> u32 {
        query::agent_view(&self.world)
            .get(agent)
            .map(|snapshot| snapshot.store.used())
            .unwrap_or_default()
    }

    fn cell(&self, agent: AgentId) -> Option<CellCoord> {
        query::agent_view(&self.world)
            .get(agent)
            .map(|snapshot| snapshot.cell)
    }
}

fn mode_for(agent: &AgentSnapshot) -> OperatingMode {
    match agent.role {
        Role::Harvester => OperatingMode::IdleHarvesting,
        Role::Hauler => OperatingMode::WartimeTransport,
    }
}

fn corridor_walls(columns: u32) -> Vec<CellCoord> {
    (0..columns)
        .flat_map(|column| [CellCoord::new(column, 0), CellCoord::new(column, 2)])
        .collect()
}

#[test]
fn harvester_fills_spawner() {
    let mut sim = Simulation::new(&LogisticsConfig::default());
    let zone = sim.zone(12, 12, Vec::new());
    let _ = sim.source(zone, CellCoord::new(2, 2), 300);
    let spawner = sim.structure(
        zone,
        StructureKind::Spawner,
        CellCoord::new(8, 8),
        StructureStore::dedicated(ResourceKind::Energy, 0, 300),
    );
    let _ = sim.agent(zone, CellCoord::new(3, 5), Role::Harvester, 50);

    let _ = sim.run(60);

    assert!(sim.stored(spawner) >= 50, "stored {}", sim.stored(spawner));
    assert!(!sim.history.iter().any(|event| matches!(
        event,
        Event::ActionRejected {
            outcome: ActionOutcome::Busy,
            ..
        }
    )));
}

#[test]
fn haulers_never_overdraw_a_shared_container() {
    let mut sim = Simulation::new(&LogisticsConfig::default());
    let zone = sim.zone(10, 10, Vec::new());
    let container = sim.structure(
        zone,
        StructureKind::Container,
        CellCoord::new(5, 5),
        StructureStore::pooled(Store::new(2_000).with(ResourceKind::Energy, 50)),
    );
    let _ = sim.structure(
        zone,
        StructureKind::Spawner,
        CellCoord::new(0, 9),
        StructureStore::dedicated(ResourceKind::Energy, 0, 300),
    );
    let first = sim.agent(zone, CellCoord::new(4, 4), Role::Hauler, 40);
    let second = sim.agent(zone, CellCoord::new(6, 6), Role::Hauler, 40);

    let _ = sim.step();
    assert_eq!(sim.ledger.reserved(container), 50);
    let _ = sim.step();

    assert_eq!(sim.carried(first), 40);
    assert_eq!(sim.carried(second), 10);
    assert_eq!(sim.stored(container), 0);
    assert!(sim.ledger.is_empty());
    assert!(!sim.history.iter().any(|event| matches!(
        event,
        Event::ActionRejected {
            action: ActionKind::Withdraw,
            ..
        }
    )));
}

#[test]
fn stalled_hauler_reroutes_past_a_blocker() {
    let mut sim = Simulation::new(&LogisticsConfig::default());
    let zone = sim.zone(12, 3, corridor_walls(12));
    let _ = sim.structure(
        zone,
        StructureKind::Container,
        CellCoord::new(0, 1),
        StructureStore::pooled(Store::new(500).with(ResourceKind::Energy, 500)),
    );
    let spawner = sim.structure(
        zone,
        StructureKind::Spawner,
        CellCoord::new(11, 1),
        StructureStore::dedicated(ResourceKind::Energy, 0, 300),
    );
    let hauler = sim.agent(zone, CellCoord::new(1, 1), Role::Hauler, 50);

    let _ = sim.step();
    let _ = sim.step();
    assert_eq!(sim.carried(hauler), 50);
    let _ = sim.step();
    assert_eq!(sim.cell(hauler), Some(CellCoord::new(2, 1)));
    let blocker = sim.agent(zone, CellCoord::new(4, 1), Role::Hauler, 0);

    let commands = sim.run(14);
    let _ = sim.step();

    assert_eq!(Simulation::reroutes(&commands), 1);
    assert!(sim.history.iter().any(|event| matches!(
        event,
        Event::ActionRejected {
            agent,
            action: ActionKind::Move,
            outcome: ActionOutcome::Busy,
        } if *agent == hauler
    )));
    assert_eq!(sim.cell(blocker), Some(CellCoord::new(3, 1)));
    assert_eq!(sim.stored(spawner), 50);
}

#[test]
fn hauler_boxed_in_from_the_start_reroutes_past_a_blocker() {
    let mut sim = Simulation::new(&LogisticsConfig::default());
    let zone = sim.zone(12, 3, corridor_walls(12));
    let _ = sim.structure(
        zone,
        StructureKind::Container,
        CellCoord::new(0, 1),
        StructureStore::pooled(Store::new(500).with(ResourceKind::Energy, 500)),
    );
    let spawner = sim.structure(
        zone,
        StructureKind::Spawner,
        CellCoord::new(11, 1),
        StructureStore::dedicated(ResourceKind::Energy, 0, 300),
    );
    let hauler = sim.agent(zone, CellCoord::new(1, 1), Role::Hauler, 50);
    let blocker = sim.agent(zone, CellCoord::new(4, 1), Role::Hauler, 0);

    let commands = sim.run(40);

    assert_eq!(sim.stored(spawner), 50);
    assert!(Simulation::reroutes(&commands) >= 1);
    assert_eq!(sim.cell(blocker), Some(CellCoord::new(3, 1)));
    assert!(!sim.history.iter().any(|event| matches!(
        event,
        Event::ActionRejected {
            action: ActionKind::Move,
            outcome: ActionOutcome::TargetUnavailable,
            ..
        }
    )));
    assert_eq!(sim.memory.get(hauler).and_then(|record| record.avoided), None);
}

#[test]
fn mineral_harvester_ignores_energy_sources() {
    let config = LogisticsConfig {
        resource: ResourceKind::Mineral,
        ..LogisticsConfig::default()
    };
    let mut sim = Simulation::new(&config);
    let zone = sim.zone(12, 12, Vec::new());
    let energy = sim.source(zone, CellCoord::new(2, 2), 300);
    let _ = sim.source_of(zone, CellCoord::new(9, 2), ResourceKind::Mineral, 300);
    let storage = sim.structure(
        zone,
        StructureKind::Storage,
        CellCoord::new(8, 8),
        StructureStore::pooled(Store::new(2_000)),
    );
    let spawner = sim.structure(
        zone,
        StructureKind::Spawner,
        CellCoord::new(2, 8),
        StructureStore::dedicated(ResourceKind::Energy, 0, 300),
    );
    let harvester = sim.agent(zone, CellCoord::new(3, 5), Role::Harvester, 50);

    let _ = sim.run(60);

    assert!(sim.holding(storage, ResourceKind::Mineral) >= 50);
    assert_eq!(sim.stored(storage), 0);
    assert_eq!(sim.stored(spawner), 0);
    let untouched = query::source_view(&sim.world)
        .get(energy)
        .map(|source| source.available);
    assert_eq!(untouched, Some(300));
    assert!(sim.history.iter().any(|event| matches!(
        event,
        Event::SourceHarvested { agent, .. } if *agent == harvester
    )));
}

#[test]
fn capped_source_leaves_surplus_harvester_idle() {
    let config = LogisticsConfig {
        source_caps: SourceCaps {
            default_cap: Some(1),
            caps: Vec::new(),
        },
        ..LogisticsConfig::default()
    };
    let mut sim = Simulation::new(&config);
    let zone = sim.zone(10, 10, Vec::new());
    let source = sim.source(zone, CellCoord::new(5, 5), 1_000);
    let first = sim.agent(zone, CellCoord::new(4, 4), Role::Harvester, 50);
    let second = sim.agent(zone, CellCoord::new(6, 6), Role::Harvester, 50);

    let commands = sim.run(3);

    assert!(commands
        .iter()
        .all(|command| command.agent() == Some(first)));
    assert_eq!(
        sim.memory.get(first).and_then(|record| record.assigned_source),
        Some(source)
    );
    assert_eq!(
        sim.memory.get(second).and_then(|record| record.assigned_source),
        None
    );
}

#[test]
fn removed_agent_releases_its_reservation() {
    let mut sim = Simulation::new(&LogisticsConfig::default());
    let zone = sim.zone(10, 10, Vec::new());
    let container = sim.structure(
        zone,
        StructureKind::Container,
        CellCoord::new(8, 8),
        StructureStore::pooled(Store::new(2_000).with(ResourceKind::Energy, 500)),
    );
    let hauler = sim.agent(zone, CellCoord::new(0, 0), Role::Hauler, 50);

    let _ = sim.step();
    assert_eq!(sim.ledger.reserved(container), 50);

    let removed = sim.setup(Command::RemoveAgent { agent: hauler });
    assert_eq!(removed, Event::AgentRemoved { agent: hauler });
    let _ = sim.step();

    assert!(sim.ledger.is_empty());
    assert!(sim.memory.get(hauler).is_none());
}

fn busy_colony() -> Simulation {
    let mut sim = Simulation::new(&LogisticsConfig::default());
    let zone = sim.zone(16, 16, vec![CellCoord::new(7, 6), CellCoord::new(7, 7)]);
    let _ = sim.source(zone, CellCoord::new(2, 2), 200);
    let _ = sim.source(zone, CellCoord::new(13, 3), 200);
    let _ = sim.structure(
        zone,
        StructureKind::Container,
        CellCoord::new(4, 4),
        StructureStore::pooled(Store::new(2_000).with(ResourceKind::Energy, 300)),
    );
    let _ = sim.structure(
        zone,
        StructureKind::Spawner,
        CellCoord::new(8, 12),
        StructureStore::dedicated(ResourceKind::Energy, 0, 300),
    );
    let _ = sim.structure(
        zone,
        StructureKind::Turret,
        CellCoord::new(12, 12),
        StructureStore::dedicated(ResourceKind::Energy, 0, 200),
    );
    for column in [1, 5, 9, 14] {
        let _ = sim.agent(zone, CellCoord::new(column, 8), Role::Harvester, 50);
    }
    for column in [3, 6, 11] {
        let _ = sim.agent(zone, CellCoord::new(column, 14), Role::Hauler, 50);
    }
    sim
}

#[test]
fn identical_runs_replay_identically() {
    let mut first = busy_colony();
    let mut second = busy_colony();

    let first_commands = first.run(80);
    let second_commands = second.run(80);

    assert_eq!(first_commands, second_commands);
    assert_eq!(first.history, second.history);
    assert_eq!(first.memory, second.memory);
    assert_eq!(first.ledger, second.ledger);
    assert_eq!(
        query::agent_view(&first.world).into_vec(),
        query::agent_view(&second.world).into_vec()
    );
}
