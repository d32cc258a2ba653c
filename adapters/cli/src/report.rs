//! Run statistics gathered from the world's event stream.

use std::{collections::BTreeMap, fmt};

use colony_logistics_core::{
    ActionOutcome, Event, MemoryStore, SourceId, SourceView, StructureKind, StructureView,
    TaskState, Tick,
};
use colony_logistics_system_reservations::ReservationLedger;
use colony_logistics_system_source_balancing::{tally, SourceTally};
use serde::Serialize;

/// Running totals accumulated over a simulation.
#[derive(Clone, Debug, Default)]
pub(crate) struct RunStats {
    harvested: u64,
    withdrawn: u64,
    delivered: BTreeMap<StructureKind, u64>,
    steps: u64,
    busy: u64,
    out_of_range: u64,
    insufficient: u64,
    unavailable: u64,
}

impl RunStats {
    /// Folds one tick's worth of events into the totals.
    pub(crate) fn record(&mut self, events: &[Event], structures: &StructureView) {
        for event in events {
            match *event {
                Event::SourceHarvested { amount, .. } => self.harvested += u64::from(amount),
                Event::ResourceWithdrawn { amount, .. } => self.withdrawn += u64::from(amount),
                Event::ResourceTransferred {
                    structure, amount, ..
                } => {
                    if let Some(sink) = structures.get(structure) {
                        *self.delivered.entry(sink.kind).or_default() += u64::from(amount);
                    }
                }
                Event::AgentMoved { .. } => self.steps += 1,
                Event::ActionRejected { outcome, .. } => match outcome {
                    ActionOutcome::Busy => self.busy += 1,
                    ActionOutcome::OutOfRange => self.out_of_range += 1,
                    ActionOutcome::ResourceInsufficient => self.insufficient += 1,
                    ActionOutcome::TargetUnavailable => self.unavailable += 1,
                    ActionOutcome::Success => {}
                },
                _ => {}
            }
        }
    }
}

/// End-of-run report printed by the driver.
#[derive(Clone, Debug)]
pub(crate) struct RunSummary {
    pub(crate) tick: Tick,
    pub(crate) stats: RunStats,
    pub(crate) gathering: usize,
    pub(crate) delivering: usize,
    pub(crate) reserved: u32,
    pub(crate) reservoirs: usize,
    pub(crate) sources: BTreeMap<SourceId, SourceTally>,
}

impl RunSummary {
    /// Builds the report from the scheduler state at the end of a run.
    pub(crate) fn new(
        tick: Tick,
        stats: &RunStats,
        memory: &MemoryStore,
        ledger: &ReservationLedger,
        sources: &SourceView,
    ) -> Self {
        let delivering = memory.records().filter(|record| record.is_delivering()).count();
        let gathering = memory
            .records()
            .filter(|record| record.state == TaskState::Gathering)
            .count();
        Self {
            tick,
            stats: stats.clone(),
            gathering,
            delivering,
            reserved: ledger.iter().map(|(_, amount)| amount).sum(),
            reservoirs: ledger.len(),
            sources: tally(memory.records(), sources),
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = &self.stats;
        writeln!(f, "tick {}", self.tick.get())?;
        writeln!(
            f,
            "agents: {} gathering, {} delivering",
            self.gathering, self.delivering
        )?;
        writeln!(
            f,
            "harvested {} / withdrawn {} / moved {} cells",
            stats.harvested, stats.withdrawn, stats.steps
        )?;
        for (kind, amount) in &stats.delivered {
            writeln!(f, "delivered to {kind:?}: {amount}")?;
        }
        for (source, load) in &self.sources {
            writeln!(
                f,
                "source {}: {} assigned, {} harvesting",
                source.get(),
                load.assigned,
                load.harvesting
            )?;
        }
        writeln!(
            f,
            "reserved {} across {} reservoirs",
            self.reserved, self.reservoirs
        )?;
        write!(
            f,
            "rejected: {} busy, {} out of range, {} insufficient, {} unavailable",
            stats.busy, stats.out_of_range, stats.insufficient, stats.unavailable
        )
    }
}

/// Scheduler state written by `--dump-state`.
#[derive(Debug, Serialize)]
pub(crate) struct StateDump<'a> {
    pub(crate) tick: Tick,
    pub(crate) memory: &'a MemoryStore,
    pub(crate) ledger: &'a ReservationLedger,
}
