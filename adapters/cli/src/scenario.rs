//! Seeded colony layouts for the command-line driver.

use std::collections::BTreeSet;

use colony_logistics_core::{CellCoord, ResourceKind, Role, Store, StructureKind, StructureStore};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const COLUMNS: u32 = 24;
const ROWS: u32 = 24;
const SOURCE_COUNT: usize = 3;
const WALL_SEGMENTS: usize = 4;
const NEAR_SOURCE_RADIUS: i64 = 2;
const NEAR_ATTEMPTS: usize = 32;

/// Yield restored on every source regeneration.
pub(crate) const SOURCE_CAPACITY: u32 = 300;
/// Ticks between the first harvest and the refill.
pub(crate) const SOURCE_REGEN_TICKS: u32 = 60;
/// Carrying capacity of every spawned agent.
pub(crate) const CARRY_CAPACITY: u32 = 50;
/// Amount a harvester extracts per tick.
pub(crate) const HARVEST_POWER: u32 = 10;

/// Structure to place when the scenario is built.
#[derive(Clone, Debug)]
pub(crate) struct PlannedStructure {
    pub(crate) kind: StructureKind,
    pub(crate) cell: CellCoord,
    pub(crate) store: StructureStore,
}

/// Agent to spawn when the scenario is built.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PlannedAgent {
    pub(crate) role: Role,
    pub(crate) cell: CellCoord,
}

/// Complete single-zone layout derived from a seed.
#[derive(Clone, Debug)]
pub(crate) struct ScenarioLayout {
    pub(crate) resource: ResourceKind,
    pub(crate) columns: u32,
    pub(crate) rows: u32,
    pub(crate) walls: Vec<CellCoord>,
    pub(crate) sources: Vec<CellCoord>,
    pub(crate) structures: Vec<PlannedStructure>,
    pub(crate) agents: Vec<PlannedAgent>,
}

impl ScenarioLayout {
    /// Generates a layout whose sources and stores deal in `resource`; equal
    /// seeds yield equal layouts.
    pub(crate) fn generate(
        seed: u64,
        resource: ResourceKind,
        harvesters: u32,
        haulers: u32,
    ) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut taken = BTreeSet::new();

        let walls = wall_segments(&mut rng, &mut taken);
        let sources: Vec<CellCoord> = (0..SOURCE_COUNT)
            .map(|_| free_cell(&mut rng, &mut taken))
            .collect();

        let mut structures = vec![
            PlannedStructure {
                kind: StructureKind::Spawner,
                cell: free_cell(&mut rng, &mut taken),
                store: StructureStore::dedicated(resource, 0, 300),
            },
            PlannedStructure {
                kind: StructureKind::Turret,
                cell: free_cell(&mut rng, &mut taken),
                store: StructureStore::dedicated(resource, 0, 200),
            },
            PlannedStructure {
                kind: StructureKind::Storage,
                cell: free_cell(&mut rng, &mut taken),
                store: StructureStore::pooled(Store::new(5_000).with(resource, 400)),
            },
        ];
        for _ in 0..2 {
            structures.push(PlannedStructure {
                kind: StructureKind::Extension,
                cell: free_cell(&mut rng, &mut taken),
                store: StructureStore::dedicated(resource, 0, 100),
            });
        }
        if let Some(origin) = sources.first() {
            structures.push(PlannedStructure {
                kind: StructureKind::Container,
                cell: near_cell(&mut rng, &mut taken, *origin),
                store: StructureStore::pooled(Store::new(2_000).with(resource, 200)),
            });
        }
        if let Some(origin) = sources.get(1) {
            structures.push(PlannedStructure {
                kind: StructureKind::Relay,
                cell: near_cell(&mut rng, &mut taken, *origin),
                store: StructureStore::dedicated(resource, 0, 100),
            });
        }

        let roles = std::iter::repeat(Role::Harvester)
            .take(harvesters as usize)
            .chain(std::iter::repeat(Role::Hauler).take(haulers as usize));
        let agents = roles
            .map(|role| PlannedAgent {
                role,
                cell: free_cell(&mut rng, &mut taken),
            })
            .collect();

        Self {
            resource,
            columns: COLUMNS,
            rows: ROWS,
            walls,
            sources,
            structures,
            agents,
        }
    }
}

fn wall_segments(rng: &mut ChaCha8Rng, taken: &mut BTreeSet<CellCoord>) -> Vec<CellCoord> {
    let mut walls = Vec::new();
    for _ in 0..WALL_SEGMENTS {
        let start = CellCoord::new(rng.gen_range(2..COLUMNS - 2), rng.gen_range(2..ROWS - 2));
        let horizontal = rng.gen_bool(0.5);
        let length = rng.gen_range(3..7);
        for offset in 0..length {
            let cell = if horizontal {
                CellCoord::new(start.column() + offset, start.row())
            } else {
                CellCoord::new(start.column(), start.row() + offset)
            };
            if cell.column() < COLUMNS - 1 && cell.row() < ROWS - 1 && taken.insert(cell) {
                walls.push(cell);
            }
        }
    }
    walls
}

fn free_cell(rng: &mut ChaCha8Rng, taken: &mut BTreeSet<CellCoord>) -> CellCoord {
    loop {
        let cell = CellCoord::new(rng.gen_range(1..COLUMNS - 1), rng.gen_range(1..ROWS - 1));
        if taken.insert(cell) {
            return cell;
        }
    }
}

fn near_cell(
    rng: &mut ChaCha8Rng,
    taken: &mut BTreeSet<CellCoord>,
    origin: CellCoord,
) -> CellCoord {
    for _ in 0..NEAR_ATTEMPTS {
        let column_offset = rng.gen_range(-NEAR_SOURCE_RADIUS..=NEAR_SOURCE_RADIUS);
        let row_offset = rng.gen_range(-NEAR_SOURCE_RADIUS..=NEAR_SOURCE_RADIUS);
        let column = i64::from(origin.column()) + column_offset;
        let row = i64::from(origin.row()) + row_offset;
        let (Ok(column), Ok(row)) = (u32::try_from(column), u32::try_from(row)) else {
            continue;
        };
        let cell = CellCoord::new(column, row);
        if column < COLUMNS && row < ROWS && taken.insert(cell) {
            return cell;
        }
    }
    free_cell(rng, taken)
}
