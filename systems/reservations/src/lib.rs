#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Reservation ledger guarding reservoirs against same-tick over-withdrawal.
//!
//! The host defers every withdrawal until the tick resolves, so agents decided
//! later in a tick still observe the pre-tick stored amount. The ledger is the
//! side channel that tells them what earlier agents have already spoken for.
//! It is a soft lock: it narrows the race, it does not make withdrawals exact.

use std::collections::BTreeMap;

use colony_logistics_core::{ResourceKind, Storable, StructureId, StructureSnapshot};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Speculative withdrawal amounts keyed by reservoir.
///
/// Entries are created on the first reservation, grow with further ones, shrink
/// on release and disappear once they reach zero.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationLedger {
    entries: BTreeMap<StructureId, u32>,
}

impl ReservationLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Debits `amount` against `reservoir`.
    pub fn reserve(&mut self, reservoir: StructureId, amount: u32) {
        if amount == 0 {
            return;
        }
        let entry = self.entries.entry(reservoir).or_insert(0);
        *entry = entry.saturating_add(amount);
        trace!(
            reservoir = reservoir.get(),
            amount,
            reserved = *entry,
            "reserved"
        );
    }

    /// Credits `amount` back to `reservoir`, never dropping below zero.
    pub fn release(&mut self, reservoir: StructureId, amount: u32) {
        let Some(entry) = self.entries.get_mut(&reservoir) else {
            return;
        };
        *entry = entry.saturating_sub(amount);
        let remaining = *entry;
        if remaining == 0 {
            let _ = self.entries.remove(&reservoir);
        }
        trace!(
            reservoir = reservoir.get(),
            amount,
            remaining,
            "released"
        );
    }

    /// Amount currently reserved against `reservoir`.
    #[must_use]
    pub fn reserved(&self, reservoir: StructureId) -> u32 {
        self.entries.get(&reservoir).copied().unwrap_or(0)
    }

    /// Stored amount of `resource` not yet spoken for.
    #[must_use]
    pub fn available(&self, reservoir: &StructureSnapshot, resource: ResourceKind) -> u32 {
        reservoir
            .store
            .used_capacity(resource)
            .saturating_sub(self.reserved(reservoir.id))
    }

    /// Reports whether `requested` units can still be claimed from `reservoir`.
    #[must_use]
    pub fn available_for(
        &self,
        reservoir: &StructureSnapshot,
        resource: ResourceKind,
        requested: u32,
    ) -> bool {
        requested > 0 && self.available(reservoir, resource) >= requested
    }

    /// Drops entries whose reservoir fails `exists`, returning how many were removed.
    pub fn prune<F>(&mut self, mut exists: F) -> usize
    where
        F: FnMut(StructureId) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|reservoir, _| exists(*reservoir));
        let pruned = before - self.entries.len();
        if pruned > 0 {
            debug!(pruned, "pruned orphaned reservations");
        }
        pruned
    }

    /// Number of reservoirs with an outstanding reservation.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether no reservation is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Outstanding reservations in reservoir order.
    pub fn iter(&self) -> impl Iterator<Item = (StructureId, u32)> + '_ {
        self.entries
            .iter()
            .map(|(reservoir, amount)| (*reservoir, *amount))
    }
}
