//! Tick loop gluing the world host to the transport system.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use colony_logistics_core::{Command, Event, LogisticsConfig, MemoryStore, OperatingMode, Role};
use colony_logistics_system_reservations::ReservationLedger;
use colony_logistics_system_transport::Transport;
use colony_logistics_world::{self as world, query, World};
use tracing::{debug, info};

use crate::{
    report::{RunStats, RunSummary, StateDump},
    scenario::{
        ScenarioLayout, CARRY_CAPACITY, HARVEST_POWER, SOURCE_CAPACITY, SOURCE_REGEN_TICKS,
    },
};

/// Owns the world and every piece of scheduler state for one run.
#[derive(Debug)]
pub(crate) struct Driver {
    world: World,
    transport: Transport,
    memory: MemoryStore,
    ledger: ReservationLedger,
    pending: Vec<Event>,
    commands: Vec<Command>,
    wartime: bool,
    stats: RunStats,
}

impl Driver {
    pub(crate) fn new(config: &LogisticsConfig, wartime: bool) -> Self {
        Self {
            world: World::new(),
            transport: Transport::new(config),
            memory: MemoryStore::new(),
            ledger: ReservationLedger::new(),
            pending: Vec::new(),
            commands: Vec::new(),
            wartime,
            stats: RunStats::default(),
        }
    }

    /// Creates the zone and places everything the layout names.
    pub(crate) fn build(&mut self, layout: &ScenarioLayout) -> Result<()> {
        let zone = match self.setup(Command::CreateZone {
            columns: layout.columns,
            rows: layout.rows,
            walls: layout.walls.clone(),
        })? {
            Event::ZoneCreated { zone } => zone,
            other => bail!("unexpected response to zone creation: {other:?}"),
        };

        for cell in &layout.sources {
            let _ = self.setup(Command::PlaceSource {
                zone,
                cell: *cell,
                resource: layout.resource,
                capacity: SOURCE_CAPACITY,
                regen_ticks: SOURCE_REGEN_TICKS,
            })?;
        }
        for planned in &layout.structures {
            let _ = self.setup(Command::PlaceStructure {
                zone,
                kind: planned.kind,
                cell: planned.cell,
                store: planned.store.clone(),
            })?;
        }
        for planned in &layout.agents {
            let _ = self.setup(Command::SpawnAgent {
                zone,
                cell: planned.cell,
                role: planned.role,
                carry_capacity: CARRY_CAPACITY,
                harvest_power: HARVEST_POWER,
            })?;
        }

        info!(
            zone = zone.get(),
            sources = layout.sources.len(),
            structures = layout.structures.len(),
            agents = layout.agents.len(),
            "scenario built"
        );
        Ok(())
    }

    fn setup(&mut self, command: Command) -> Result<Event> {
        let mut events = Vec::new();
        world::apply(&mut self.world, command, &mut events);
        match events.pop() {
            Some(Event::PlacementRejected { zone, cell, reason }) => bail!(
                "placement in zone {} at ({}, {}) rejected: {reason:?}",
                zone.get(),
                cell.column(),
                cell.row()
            ),
            Some(event) => Ok(event),
            None => bail!("world produced no confirmation"),
        }
    }

    /// Resolves the queued intents and runs one decision pass.
    pub(crate) fn step(&mut self) {
        world::apply(&mut self.world, Command::Tick, &mut self.pending);
        let events = std::mem::take(&mut self.pending);
        let structures = query::structure_view(&self.world);
        self.stats.record(&events, &structures);

        let wartime = self.wartime;
        self.transport.handle(
            &events,
            &query::agent_view(&self.world),
            &structures,
            &query::source_view(&self.world),
            &mut self.memory,
            &mut self.ledger,
            |agent| mode_for(agent.role, wartime),
            &mut self.commands,
        );
        debug!(
            tick = query::tick(&self.world).get(),
            intents = self.commands.len(),
            "decision pass"
        );

        for command in self.commands.drain(..) {
            world::apply(&mut self.world, command, &mut self.pending);
        }
    }

    pub(crate) fn summary(&self) -> RunSummary {
        RunSummary::new(
            query::tick(&self.world),
            &self.stats,
            &self.memory,
            &self.ledger,
            &query::source_view(&self.world),
        )
    }

    /// Writes agent memory and the reservation ledger as pretty JSON.
    pub(crate) fn dump(&self, path: &Path) -> Result<()> {
        let dump = StateDump {
            tick: query::tick(&self.world),
            memory: &self.memory,
            ledger: &self.ledger,
        };
        let json = serde_json::to_string_pretty(&dump).context("failed to encode state")?;
        fs::write(path, json)
            .with_context(|| format!("failed to write state to {}", path.display()))?;
        info!(path = %path.display(), "state written");
        Ok(())
    }
}

/// Harvesters follow the peacetime or wartime harvesting table; haulers always
/// run the wartime transport table.
fn mode_for(role: Role, wartime: bool) -> OperatingMode {
    match (role, wartime) {
        (Role::Harvester, false) => OperatingMode::IdleHarvesting,
        (Role::Harvester, true) => OperatingMode::WartimeHarvesting,
        (Role::Hauler, _) => OperatingMode::WartimeTransport,
    }
}
