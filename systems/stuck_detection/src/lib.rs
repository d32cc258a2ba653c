#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Stall tracking for agents that are trying to move.
//!
//! The detector keeps no state of its own: the tracking record lives in the
//! agent's memory so it persists with everything else the agent remembers.

use colony_logistics_core::{CellCoord, StuckRecord, Tick};
use tracing::debug;

/// Result of observing an agent that intends to move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// The agent is making progress or has not stalled long enough yet.
    Tracking,
    /// The agent has stood still past the threshold and must reroute.
    Stuck,
}

/// Flags agents that stay on one cell for longer than a threshold.
#[derive(Clone, Copy, Debug)]
pub struct StuckDetector {
    threshold: u64,
}

impl StuckDetector {
    /// Creates a detector that fires once an agent stays put for more than
    /// `threshold` ticks.
    #[must_use]
    pub const fn new(threshold: u64) -> Self {
        Self { threshold }
    }

    /// Updates `record` with the agent's position and reports whether it is stuck.
    ///
    /// A new goal or a changed position restarts tracking. Declaring the agent
    /// stuck clears the record, so firing again requires the threshold to
    /// elapse anew.
    pub fn observe(
        &self,
        record: &mut Option<StuckRecord>,
        cell: CellCoord,
        goal: CellCoord,
        now: Tick,
    ) -> Verdict {
        match record {
            Some(tracked) if tracked.goal == goal && tracked.cell == cell => {
                let stalled = now.elapsed_since(tracked.tick);
                if stalled > self.threshold {
                    debug!(
                        column = cell.column(),
                        row = cell.row(),
                        stalled,
                        "agent stuck"
                    );
                    *record = None;
                    Verdict::Stuck
                } else {
                    Verdict::Tracking
                }
            }
            _ => {
                *record = Some(StuckRecord {
                    cell,
                    tick: now,
                    goal,
                });
                Verdict::Tracking
            }
        }
    }
}
