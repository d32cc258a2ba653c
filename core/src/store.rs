//! Resource stores carried by agents and held by structures.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ResourceKind;

/// Capability shared by everything that holds resources.
pub trait Storable {
    /// Amount of `resource` currently held.
    fn used_capacity(&self, resource: ResourceKind) -> u32;

    /// Additional amount of `resource` the store can accept.
    fn free_capacity(&self, resource: ResourceKind) -> u32;
}

/// Multi-resource store with a single shared capacity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    capacity: u32,
    contents: BTreeMap<ResourceKind, u32>,
}

impl Store {
    /// Creates an empty store with the provided capacity.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            contents: BTreeMap::new(),
        }
    }

    /// Returns the store after adding `amount` of `resource`, clamped to capacity.
    #[must_use]
    pub fn with(mut self, resource: ResourceKind, amount: u32) -> Self {
        let _ = self.add(resource, amount);
        self
    }

    /// Total capacity shared by all resources.
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Total amount held across all resources.
    #[must_use]
    pub fn used(&self) -> u32 {
        self.contents
            .values()
            .fold(0_u32, |total, amount| total.saturating_add(*amount))
    }

    /// Remaining shared capacity.
    #[must_use]
    pub fn free(&self) -> u32 {
        self.capacity.saturating_sub(self.used())
    }

    /// Amount of a single resource held.
    #[must_use]
    pub fn amount(&self, resource: ResourceKind) -> u32 {
        self.contents.get(&resource).copied().unwrap_or(0)
    }

    /// Adds up to `amount` of `resource`, returning the amount accepted.
    pub fn add(&mut self, resource: ResourceKind, amount: u32) -> u32 {
        let accepted = amount.min(self.free());
        if accepted > 0 {
            let slot = self.contents.entry(resource).or_insert(0);
            *slot = slot.saturating_add(accepted);
        }
        accepted
    }

    /// Removes up to `amount` of `resource`, returning the amount taken.
    pub fn remove(&mut self, resource: ResourceKind, amount: u32) -> u32 {
        let held = self.amount(resource);
        let taken = amount.min(held);
        if taken == held {
            let _ = self.contents.remove(&resource);
        } else if let Some(slot) = self.contents.get_mut(&resource) {
            *slot -= taken;
        }
        taken
    }
}

impl Storable for Store {
    fn used_capacity(&self, resource: ResourceKind) -> u32 {
        self.amount(resource)
    }

    fn free_capacity(&self, _resource: ResourceKind) -> u32 {
        self.free()
    }
}

/// Store layout attached to a structure.
///
/// Spawners, extensions, turrets and relays buffer a single resource; containers
/// and storage pool several resources behind one capacity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructureStore {
    /// Buffer dedicated to one resource kind.
    Dedicated {
        /// Resource accepted by the buffer.
        resource: ResourceKind,
        /// Amount currently held.
        amount: u32,
        /// Maximum amount the buffer can hold.
        capacity: u32,
    },
    /// Shared multi-resource store.
    Pooled(Store),
}

impl StructureStore {
    /// Creates a dedicated buffer holding `amount` (clamped to `capacity`).
    #[must_use]
    pub fn dedicated(resource: ResourceKind, amount: u32, capacity: u32) -> Self {
        Self::Dedicated {
            resource,
            amount: amount.min(capacity),
            capacity,
        }
    }

    /// Creates a pooled store.
    #[must_use]
    pub fn pooled(store: Store) -> Self {
        Self::Pooled(store)
    }

    /// Adds up to `amount` of `resource`, returning the amount accepted.
    pub fn deposit(&mut self, resource: ResourceKind, amount: u32) -> u32 {
        match self {
            Self::Dedicated {
                resource: accepted,
                amount: held,
                capacity,
            } => {
                if *accepted != resource {
                    return 0;
                }
                let stored = amount.min(capacity.saturating_sub(*held));
                *held += stored;
                stored
            }
            Self::Pooled(store) => store.add(resource, amount),
        }
    }

    /// Removes up to `amount` of `resource`, returning the amount taken.
    pub fn take(&mut self, resource: ResourceKind, amount: u32) -> u32 {
        match self {
            Self::Dedicated {
                resource: accepted,
                amount: held,
                ..
            } => {
                if *accepted != resource {
                    return 0;
                }
                let taken = amount.min(*held);
                *held -= taken;
                taken
            }
            Self::Pooled(store) => store.remove(resource, amount),
        }
    }
}

impl Storable for StructureStore {
    fn used_capacity(&self, resource: ResourceKind) -> u32 {
        match self {
            Self::Dedicated {
                resource: accepted,
                amount,
                ..
            } if *accepted == resource => *amount,
            Self::Dedicated { .. } => 0,
            Self::Pooled(store) => store.used_capacity(resource),
        }
    }

    fn free_capacity(&self, resource: ResourceKind) -> u32 {
        match self {
            Self::Dedicated {
                resource: accepted,
                amount,
                capacity,
            } if *accepted == resource => capacity.saturating_sub(*amount),
            Self::Dedicated { .. } => 0,
            Self::Pooled(store) => store.free_capacity(resource),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Storable, Store, StructureStore};
    use crate::ResourceKind;

    #[test]
    fn store_shares_capacity_across_resources() {
        let mut store = Store::new(100).with(ResourceKind::Energy, 60);
        assert_eq!(store.add(ResourceKind::Mineral, 70), 40);
        assert_eq!(store.used(), 100);
        assert_eq!(store.free(), 0);
        assert_eq!(store.remove(ResourceKind::Energy, 80), 60);
        assert_eq!(store.amount(ResourceKind::Energy), 0);
        assert_eq!(store.free_capacity(ResourceKind::Energy), 60);
    }

    #[test]
    fn dedicated_buffer_rejects_foreign_resources() {
        let mut buffer = StructureStore::dedicated(ResourceKind::Energy, 20, 50);
        assert_eq!(buffer.deposit(ResourceKind::Mineral, 10), 0);
        assert_eq!(buffer.free_capacity(ResourceKind::Mineral), 0);
        assert_eq!(buffer.free_capacity(ResourceKind::Energy), 30);
        assert_eq!(buffer.deposit(ResourceKind::Energy, 100), 30);
        assert_eq!(buffer.take(ResourceKind::Energy, 15), 15);
        assert_eq!(buffer.used_capacity(ResourceKind::Energy), 35);
    }

    #[test]
    fn dedicated_buffer_clamps_initial_amount() {
        let buffer = StructureStore::dedicated(ResourceKind::Energy, 500, 50);
        assert_eq!(buffer.used_capacity(ResourceKind::Energy), 50);
    }

    #[test]
    fn pooled_store_dispatches_to_inner_store() {
        let mut pooled = StructureStore::pooled(Store::new(1_000).with(ResourceKind::Energy, 400));
        assert_eq!(pooled.used_capacity(ResourceKind::Energy), 400);
        assert_eq!(pooled.free_capacity(ResourceKind::Mineral), 600);
        assert_eq!(pooled.take(ResourceKind::Energy, 1_000), 400);
    }
}
