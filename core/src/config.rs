//! Static capacity configuration consumed by the scheduler.
//!
//! Tier tables, distance weights and per-source caps are data supplied from
//! outside; the scheduler never derives them. Every section has defaults so a
//! configuration file only needs to name what it overrides.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{OperatingMode, ResourceKind, SourceId, StructureKind};

/// Errors reported when a configuration cannot drive the scheduler.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The ranked shortlist would always be empty.
    #[error("shortlist_len must be at least 1")]
    ZeroShortlist,
    /// Agents would be declared stuck on every tick they fail to move.
    #[error("stuck_threshold must be at least 1 tick")]
    ZeroStuckThreshold,
    /// The default source cap forbids harvesting everywhere.
    #[error("default source cap must be at least 1")]
    ZeroDefaultCap,
    /// A per-source cap forbids harvesting that source.
    #[error("cap for source {} must be at least 1", .id.get())]
    ZeroSourceCap {
        /// Source carrying the zero cap.
        id: SourceId,
    },
    /// Two cap entries name the same source.
    #[error("source {} has more than one cap entry", .id.get())]
    DuplicateSourceCap {
        /// Source named twice.
        id: SourceId,
    },
    /// A mode admits no structure kind at all.
    #[error("tier table for {mode:?} admits no structure kind")]
    EmptyTierTable {
        /// Mode whose table is empty.
        mode: OperatingMode,
    },
}

/// Complete scheduler configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogisticsConfig {
    /// Resource moved by the scheduler.
    pub resource: ResourceKind,
    /// Ticks an agent may stand still while moving before it is declared stuck.
    pub stuck_threshold: u64,
    /// Maximum number of ranked delivery candidates returned per query.
    pub shortlist_len: usize,
    /// Range within which a relay counts as adjacent to a source.
    pub relay_source_radius: u32,
    /// Ticks an unreachable target is skipped.
    pub unreachable_cooldown: u64,
    /// Tier tables for every operating mode.
    pub tiers: TierTables,
    /// Distance weights per structure kind.
    pub weights: DistanceWeights,
    /// Concurrency caps for source nodes.
    pub source_caps: SourceCaps,
}

impl Default for LogisticsConfig {
    fn default() -> Self {
        Self {
            resource: ResourceKind::Energy,
            stuck_threshold: 5,
            shortlist_len: 5,
            relay_source_radius: 3,
            unreachable_cooldown: 20,
            tiers: TierTables::default(),
            weights: DistanceWeights::default(),
            source_caps: SourceCaps::default(),
        }
    }
}

impl LogisticsConfig {
    /// Checks that the configuration can drive the scheduler.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shortlist_len == 0 {
            return Err(ConfigError::ZeroShortlist);
        }
        if self.stuck_threshold == 0 {
            return Err(ConfigError::ZeroStuckThreshold);
        }

        for mode in [
            OperatingMode::IdleHarvesting,
            OperatingMode::WartimeTransport,
            OperatingMode::WartimeHarvesting,
        ] {
            if self.tiers.for_mode(mode).is_empty() {
                return Err(ConfigError::EmptyTierTable { mode });
            }
        }

        self.source_caps.validate()
    }
}

/// Base priorities for one operating mode; 0 is most preferred.
///
/// A kind left unset is excluded from that mode entirely.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TierTable {
    /// Tier of spawning facilities.
    pub spawner: Option<u8>,
    /// Tier of extensions.
    pub extension: Option<u8>,
    /// Tier of defense emplacements.
    pub turret: Option<u8>,
    /// Tier of containers.
    pub container: Option<u8>,
    /// Tier of bulk storage.
    pub storage: Option<u8>,
    /// Tier of relay nodes.
    pub relay: Option<u8>,
}

impl TierTable {
    /// Tier assigned to `kind`, or `None` when the kind is excluded.
    #[must_use]
    pub const fn tier(&self, kind: StructureKind) -> Option<u8> {
        match kind {
            StructureKind::Spawner => self.spawner,
            StructureKind::Extension => self.extension,
            StructureKind::Turret => self.turret,
            StructureKind::Container => self.container,
            StructureKind::Storage => self.storage,
            StructureKind::Relay => self.relay,
        }
    }

    /// Reports whether the table admits no kind.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        StructureKind::ALL
            .iter()
            .all(|kind| self.tier(*kind).is_none())
    }
}

/// Tier tables keyed by operating mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TierTables {
    /// Table used while harvesting in peacetime.
    pub idle_harvesting: TierTable,
    /// Table used by transport agents in wartime.
    pub wartime_transport: TierTable,
    /// Table used while harvesting in wartime.
    pub wartime_harvesting: TierTable,
}

impl TierTables {
    /// Table that applies to `mode`.
    #[must_use]
    pub const fn for_mode(&self, mode: OperatingMode) -> &TierTable {
        match mode {
            OperatingMode::IdleHarvesting => &self.idle_harvesting,
            OperatingMode::WartimeTransport => &self.wartime_transport,
            OperatingMode::WartimeHarvesting => &self.wartime_harvesting,
        }
    }
}

impl Default for TierTables {
    fn default() -> Self {
        Self {
            idle_harvesting: TierTable {
                relay: Some(0),
                spawner: Some(1),
                extension: Some(1),
                container: Some(2),
                turret: Some(3),
                storage: Some(4),
            },
            wartime_transport: TierTable {
                turret: Some(0),
                spawner: Some(1),
                extension: Some(1),
                relay: Some(2),
                storage: Some(4),
                container: None,
            },
            wartime_harvesting: TierTable {
                turret: Some(0),
                relay: Some(1),
                spawner: Some(1),
                extension: Some(1),
                container: Some(2),
                storage: Some(4),
            },
        }
    }
}

/// Per-kind distance penalty in thousandths of a tier per cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DistanceWeights {
    /// Weight applied to spawning facilities.
    pub spawner: u32,
    /// Weight applied to extensions.
    pub extension: u32,
    /// Weight applied to defense emplacements.
    pub turret: u32,
    /// Weight applied to containers.
    pub container: u32,
    /// Weight applied to bulk storage.
    pub storage: u32,
    /// Weight applied to relay nodes.
    pub relay: u32,
}

impl DistanceWeights {
    /// Weight that applies to `kind`.
    #[must_use]
    pub const fn weight(&self, kind: StructureKind) -> u32 {
        match kind {
            StructureKind::Spawner => self.spawner,
            StructureKind::Extension => self.extension,
            StructureKind::Turret => self.turret,
            StructureKind::Container => self.container,
            StructureKind::Storage => self.storage,
            StructureKind::Relay => self.relay,
        }
    }
}

impl Default for DistanceWeights {
    fn default() -> Self {
        Self {
            spawner: 100,
            extension: 100,
            turret: 150,
            container: 100,
            storage: 50,
            relay: 400,
        }
    }
}

/// Explicit concurrency cap for one source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceCap {
    /// Source the cap applies to.
    pub source: SourceId,
    /// Maximum number of simultaneously assigned harvesters.
    pub cap: u32,
}

/// Concurrency caps for source nodes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceCaps {
    /// Cap applied to sources without an explicit entry; `None` means unlimited.
    pub default_cap: Option<u32>,
    /// Explicit per-source caps.
    pub caps: Vec<SourceCap>,
}

impl SourceCaps {
    /// Cap that applies to `source`; `None` means unlimited.
    #[must_use]
    pub fn cap_for(&self, source: SourceId) -> Option<u32> {
        self.caps
            .iter()
            .find(|entry| entry.source == source)
            .map(|entry| entry.cap)
            .or(self.default_cap)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_cap == Some(0) {
            return Err(ConfigError::ZeroDefaultCap);
        }

        let mut seen = BTreeSet::new();
        for entry in &self.caps {
            if entry.cap == 0 {
                return Err(ConfigError::ZeroSourceCap { id: entry.source });
            }
            if !seen.insert(entry.source) {
                return Err(ConfigError::DuplicateSourceCap { id: entry.source });
            }
        }
        Ok(())
    }
}
