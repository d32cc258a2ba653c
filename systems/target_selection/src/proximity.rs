use std::collections::{BTreeMap, HashMap, HashSet};

use colony_logistics_core::{CellCoord, SourceId, SourceSnapshot, SourceView, ZoneId};
use tracing::debug;

/// Per-zone cache of the cells lying within a fixed range of any source.
///
/// [`SourceProximity::refresh`] walks the source roster once and rebuilds only
/// the zones whose roster changed; membership checks are then O(1).
#[derive(Clone, Debug)]
pub struct SourceProximity {
    radius: u32,
    zones: HashMap<ZoneId, ZoneCells>,
}

#[derive(Clone, Debug, Default)]
struct ZoneCells {
    sources: Vec<SourceId>,
    cells: HashSet<CellCoord>,
}

impl SourceProximity {
    /// Creates an empty cache for the provided radius.
    #[must_use]
    pub fn new(radius: u32) -> Self {
        Self {
            radius,
            zones: HashMap::new(),
        }
    }

    /// Brings the cache in line with `sources`.
    pub fn refresh(&mut self, sources: &SourceView) {
        let mut rosters: BTreeMap<ZoneId, Vec<&SourceSnapshot>> = BTreeMap::new();
        for source in sources.iter() {
            rosters.entry(source.zone).or_default().push(source);
        }
        self.zones.retain(|zone, _| rosters.contains_key(zone));

        for (zone, members) in rosters {
            let entry = self.zones.entry(zone).or_default();
            if entry.sources.iter().copied().eq(members.iter().map(|source| source.id)) {
                continue;
            }
            entry.rebuild(self.radius, &members);
            debug!(
                zone = zone.get(),
                sources = entry.sources.len(),
                cells = entry.cells.len(),
                "rebuilt source proximity"
            );
        }
    }

    /// Reports whether `cell` lay within the radius of a source in `zone` at
    /// the last refresh.
    #[must_use]
    pub fn is_near_source(&self, zone: ZoneId, cell: CellCoord) -> bool {
        self.zones
            .get(&zone)
            .is_some_and(|entry| entry.cells.contains(&cell))
    }
}

impl ZoneCells {
    fn rebuild(&mut self, radius: u32, members: &[&SourceSnapshot]) {
        self.sources.clear();
        self.cells.clear();
        for source in members {
            self.sources.push(source.id);
            let origin = source.cell;
            let first_column = origin.column().saturating_sub(radius);
            let last_column = origin.column().saturating_add(radius);
            let first_row = origin.row().saturating_sub(radius);
            let last_row = origin.row().saturating_add(radius);
            for column in first_column..=last_column {
                for row in first_row..=last_row {
                    let _ = self.cells.insert(CellCoord::new(column, row));
                }
            }
        }
    }
}
