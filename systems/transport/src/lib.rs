#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Per-agent transport state machine driving the logistics scheduler.
//!
//! Every tick each agent either gathers (from its assigned source or from a
//! reserved reservoir) or delivers (to the best ranked sink), and emits at most
//! one intent. State flips only at the extremes: a full agent delivers, an
//! empty one gathers, partial loads keep whatever the agent was doing.

use colony_logistics_core::{
    ActionKind, ActionOutcome, AgentMemory, AgentSnapshot, AgentView, AvoidedTarget, CellCoord,
    Command, Event, LogisticsConfig, MemoryStore, MoveOptions, OperatingMode, Reservation,
    ResourceKind, Role, SourceView, Storable, StructureId, StructureView, TargetId, TaskState,
    Tick, INTERACTION_RANGE,
};
use colony_logistics_system_reservations::ReservationLedger;
use colony_logistics_system_source_balancing::SourceBalancer;
use colony_logistics_system_stuck_detection::{StuckDetector, Verdict};
use colony_logistics_system_target_selection::{RankedTarget, ReservoirCandidate, TargetSelector};
use tracing::{debug, trace};

/// Transport system that reuses scratch buffers across agents and ticks.
#[derive(Debug)]
pub struct Transport {
    resource: ResourceKind,
    unreachable_cooldown: u64,
    selector: TargetSelector,
    balancer: SourceBalancer,
    detector: StuckDetector,
    ranked: Vec<RankedTarget>,
    reservoirs: Vec<ReservoirCandidate>,
}

/// Snapshot data shared by every decision within one pass.
struct Frame<'a> {
    now: Tick,
    structures: &'a StructureView,
    sources: &'a SourceView,
}

impl Transport {
    /// Creates a transport system driven by the provided configuration.
    #[must_use]
    pub fn new(config: &LogisticsConfig) -> Self {
        Self {
            resource: config.resource,
            unreachable_cooldown: config.unreachable_cooldown,
            selector: TargetSelector::new(config),
            balancer: SourceBalancer::new(config.resource, config.source_caps.clone()),
            detector: StuckDetector::new(config.stuck_threshold),
            ranked: Vec::new(),
            reservoirs: Vec::new(),
        }
    }

    /// Consumes the events produced since the previous pass and emits at most
    /// one command per agent.
    ///
    /// Nothing happens unless `events` contains a [`Event::TimeAdvanced`]. Outcomes
    /// of earlier intents settle reservations and clear cached targets before
    /// any agent decides. Memory of vanished agents is dropped, together with
    /// the reservations it held, and ledger entries for vanished reservoirs
    /// are pruned.
    #[allow(clippy::too_many_arguments)]
    pub fn handle<F>(
        &mut self,
        events: &[Event],
        agents: &AgentView,
        structures: &StructureView,
        sources: &SourceView,
        memory: &mut MemoryStore,
        ledger: &mut ReservationLedger,
        mut mode_for: F,
        out: &mut Vec<Command>,
    ) where
        F: FnMut(&AgentSnapshot) -> OperatingMode,
    {
        let Some(now) = latest_tick(events) else {
            return;
        };

        self.apply_feedback(events, now, structures, memory, ledger);
        collect_garbage(agents, structures, memory, ledger);
        self.selector.refresh_sources(sources);

        let frame = Frame {
            now,
            structures,
            sources,
        };
        for agent in agents.iter() {
            let mut record = memory
                .take(agent.id)
                .unwrap_or_else(|| AgentMemory::new(agent.role));
            let mode = mode_for(agent);
            if let Some(command) = self.decide(&frame, agent, mode, &mut record, memory, ledger) {
                out.push(command);
            }
            memory.insert(agent.id, record);
        }
    }

    fn apply_feedback(
        &self,
        events: &[Event],
        now: Tick,
        structures: &StructureView,
        memory: &mut MemoryStore,
        ledger: &mut ReservationLedger,
    ) {
        for event in events {
            match *event {
                Event::ResourceWithdrawn {
                    agent,
                    structure,
                    amount,
                    ..
                } => {
                    let Some(record) = memory.get_mut(agent) else {
                        continue;
                    };
                    settle(record, ledger, Some(amount));
                    record.last_withdrawn_kind = structures.get(structure).map(|found| found.kind);
                    record.clear_target();
                }
                Event::ActionRejected {
                    agent,
                    action,
                    outcome,
                } => {
                    let Some(record) = memory.get_mut(agent) else {
                        continue;
                    };
                    match action {
                        ActionKind::Withdraw => {
                            settle(record, ledger, None);
                            record.clear_target();
                        }
                        ActionKind::Transfer | ActionKind::Harvest => record.clear_target(),
                        ActionKind::Move if outcome == ActionOutcome::TargetUnavailable => {
                            if let Some(target) = record.target {
                                record.avoided = Some(AvoidedTarget {
                                    target,
                                    until: now.offset(self.unreachable_cooldown),
                                });
                                debug!(agent = agent.get(), ?target, "target unreachable");
                            }
                            settle(record, ledger, None);
                            record.clear_target();
                        }
                        ActionKind::Move => {}
                    }
                }
                _ => {}
            }
        }
    }

    fn decide(
        &mut self,
        frame: &Frame<'_>,
        agent: &AgentSnapshot,
        mode: OperatingMode,
        record: &mut AgentMemory,
        others: &MemoryStore,
        ledger: &mut ReservationLedger,
    ) -> Option<Command> {
        if agent.store.capacity() == 0 {
            return None;
        }

        transition(agent, self.resource, record, ledger);
        let command = match (record.state, agent.role) {
            (TaskState::Gathering, Role::Harvester) => self.harvest(frame, agent, record, others),
            (TaskState::Gathering, Role::Hauler) => self.fetch(frame, agent, record, ledger),
            (TaskState::Delivering, _) => self.deliver(frame, agent, mode, record),
        };
        trace!(
            agent = agent.id.get(),
            state = ?record.state,
            ?command,
            "decided"
        );
        command
    }

    fn harvest(
        &self,
        frame: &Frame<'_>,
        agent: &AgentSnapshot,
        record: &mut AgentMemory,
        others: &MemoryStore,
    ) -> Option<Command> {
        if agent.store.free() == 0 {
            return None;
        }
        let source_id = self
            .balancer
            .assign(agent, record, others, frame.sources, frame.now)?;
        let source = frame.sources.get(source_id)?;
        record.target = Some(TargetId::Source(source_id));

        if agent.cell.range_to(source.cell) <= INTERACTION_RANGE {
            record.stuck = None;
            return Some(Command::Harvest {
                agent: agent.id,
                source: source_id,
            });
        }
        Some(self.move_towards(agent, record, source.cell, frame.now))
    }

    fn fetch(
        &mut self,
        frame: &Frame<'_>,
        agent: &AgentSnapshot,
        record: &mut AgentMemory,
        ledger: &mut ReservationLedger,
    ) -> Option<Command> {
        if let Some(held) = record.reservation {
            let usable = frame.structures.get(held.structure).is_some_and(|reservoir| {
                reservoir.zone == agent.zone && reservoir.store.used_capacity(self.resource) > 0
            });
            if !usable {
                settle(record, ledger, None);
                record.clear_target();
            }
        }

        if record.reservation.is_none() {
            let acquired = self.acquire(frame, agent, record, ledger)?;
            record.reservation = Some(acquired);
            record.target = Some(TargetId::Structure(acquired.structure));
        }

        let held = record.reservation?;
        let reservoir = frame.structures.get(held.structure)?;
        if agent.cell.range_to(reservoir.cell) <= INTERACTION_RANGE {
            record.stuck = None;
            return Some(Command::Withdraw {
                agent: agent.id,
                structure: held.structure,
                resource: self.resource,
                amount: held.amount,
            });
        }
        Some(self.move_towards(agent, record, reservoir.cell, frame.now))
    }

    /// Reserves the agent's remaining need against the nearest reservoir that
    /// can cover it, or else against the one with the most unreserved stock.
    /// Fully reserved and avoided reservoirs never reach the shortlist.
    fn acquire(
        &mut self,
        frame: &Frame<'_>,
        agent: &AgentSnapshot,
        record: &AgentMemory,
        ledger: &mut ReservationLedger,
    ) -> Option<Reservation> {
        let need = agent.store.free();
        if need == 0 {
            return None;
        }

        let resource = self.resource;
        self.selector.reservoirs(
            agent,
            frame.structures,
            |reservoir| {
                !record.is_avoiding(TargetId::Structure(reservoir.id), frame.now)
                    && ledger.available(reservoir, resource) > 0
            },
            &mut self.reservoirs,
        );

        let mut covering = None;
        let mut largest: Option<(u32, StructureId)> = None;
        for candidate in &self.reservoirs {
            let Some(snapshot) = frame.structures.get(candidate.structure) else {
                continue;
            };
            if ledger.available_for(snapshot, self.resource, need) {
                covering = Some(Reservation {
                    structure: candidate.structure,
                    amount: need,
                });
                break;
            }
            let available = ledger.available(snapshot, self.resource);
            if available > 0 && largest.map_or(true, |(best, _)| available > best) {
                largest = Some((available, candidate.structure));
            }
        }

        let reservation = covering.or_else(|| {
            largest.map(|(amount, structure)| Reservation { structure, amount })
        })?;
        ledger.reserve(reservation.structure, reservation.amount);
        Some(reservation)
    }

    fn deliver(
        &mut self,
        frame: &Frame<'_>,
        agent: &AgentSnapshot,
        mode: OperatingMode,
        record: &mut AgentMemory,
    ) -> Option<Command> {
        let carried = agent.store.amount(self.resource);
        if carried == 0 {
            return None;
        }
        let exclude = record.last_withdrawn_kind;

        let target = match record.target.and_then(TargetId::structure) {
            Some(cached) => {
                let still_valid = frame.structures.get(cached).and_then(|structure| {
                    self.selector.rank(agent, mode, exclude, structure)
                });
                let Some(target) = still_valid else {
                    trace!(
                        agent = agent.id.get(),
                        structure = cached.get(),
                        "cached target no longer accepts deliveries"
                    );
                    record.clear_target();
                    return None;
                };
                target
            }
            None => {
                self.selector.select_targets(
                    agent,
                    mode,
                    exclude,
                    frame.structures,
                    &mut self.ranked,
                );
                let best = self
                    .ranked
                    .iter()
                    .find(|target| {
                        !record.is_avoiding(TargetId::Structure(target.structure), frame.now)
                    })
                    .copied()?;
                record.target = Some(TargetId::Structure(best.structure));
                best
            }
        };

        if agent.cell.range_to(target.cell) <= INTERACTION_RANGE {
            record.stuck = None;
            return Some(Command::Transfer {
                agent: agent.id,
                structure: target.structure,
                resource: self.resource,
                amount: carried.min(target.free_capacity),
            });
        }
        Some(self.move_towards(agent, record, target.cell, frame.now))
    }

    fn move_towards(
        &self,
        agent: &AgentSnapshot,
        record: &mut AgentMemory,
        destination: CellCoord,
        now: Tick,
    ) -> Command {
        let verdict = self
            .detector
            .observe(&mut record.stuck, agent.cell, destination, now);
        let options = match verdict {
            Verdict::Stuck => {
                debug!(agent = agent.id.get(), "rerouting stalled agent");
                record.repath = false;
                MoveOptions::reroute(INTERACTION_RANGE)
            }
            Verdict::Tracking if record.repath => {
                record.repath = false;
                MoveOptions::fresh(INTERACTION_RANGE)
            }
            Verdict::Tracking => MoveOptions::normal(INTERACTION_RANGE),
        };

        Command::MoveTowards {
            agent: agent.id,
            destination,
            options,
        }
    }
}

fn latest_tick(events: &[Event]) -> Option<Tick> {
    events.iter().rev().find_map(|event| match event {
        Event::TimeAdvanced { tick } => Some(*tick),
        _ => None,
    })
}

/// Flips the transport state at the load extremes of the scheduled resource.
///
/// Cargo of any other kind is never delivered, so it only counts against the
/// free space that decides when gathering is done.
fn transition(
    agent: &AgentSnapshot,
    resource: ResourceKind,
    record: &mut AgentMemory,
    ledger: &mut ReservationLedger,
) {
    let carried = agent.store.amount(resource);
    let next = match record.state {
        TaskState::Gathering if carried > 0 && agent.store.free() == 0 => TaskState::Delivering,
        TaskState::Delivering if carried == 0 => TaskState::Gathering,
        _ => return,
    };

    settle(record, ledger, None);
    record.clear_target();
    if next == TaskState::Gathering {
        record.last_withdrawn_kind = None;
    }
    record.state = next;
    trace!(agent = agent.id.get(), state = ?next, carried, "state changed");
}

/// Releases exactly the amount held in the agent's reservation, at most once.
fn settle(record: &mut AgentMemory, ledger: &mut ReservationLedger, taken: Option<u32>) {
    if let Some(held) = record.take_reservation() {
        ledger.release(held.structure, held.amount);
        trace!(
            reservoir = held.structure.get(),
            reserved = held.amount,
            ?taken,
            "settled reservation"
        );
    }
}

fn collect_garbage(
    agents: &AgentView,
    structures: &StructureView,
    memory: &mut MemoryStore,
    ledger: &mut ReservationLedger,
) {
    for (agent, record) in memory.retain_agents(|agent| agents.contains(agent)) {
        if let Some(held) = record.reservation {
            ledger.release(held.structure, held.amount);
        }
        debug!(agent = agent.get(), "dropped memory of vanished agent");
    }
    let _ = ledger.prune(|reservoir| structures.contains(reservoir));
}
