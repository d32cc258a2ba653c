//! Budgeted breadth-first path planner used to resolve movement intents.

use std::collections::VecDeque;

use colony_logistics_core::CellCoord;

/// Path retained for an agent between ticks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CachedPath {
    destination: CellCoord,
    range: u32,
    steps: VecDeque<CellCoord>,
}

impl CachedPath {
    pub(crate) fn new(destination: CellCoord, range: u32, steps: VecDeque<CellCoord>) -> Self {
        Self {
            destination,
            range,
            steps,
        }
    }

    /// Reports whether the path still leads toward `destination` from `origin`.
    pub(crate) fn follows(&self, origin: CellCoord, destination: CellCoord, range: u32) -> bool {
        self.destination == destination
            && self.range == range
            && self
                .steps
                .front()
                .is_some_and(|step| origin.range_to(*step) == 1)
    }

    pub(crate) fn next_step(&self) -> Option<CellCoord> {
        self.steps.front().copied()
    }

    pub(crate) fn advance(&mut self) {
        let _ = self.steps.pop_front();
    }

    pub(crate) fn len(&self) -> usize {
        self.steps.len()
    }
}

/// Bounds and goal of a single path search.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PathRequest {
    pub(crate) columns: u32,
    pub(crate) rows: u32,
    pub(crate) start: CellCoord,
    pub(crate) destination: CellCoord,
    pub(crate) range: u32,
    pub(crate) budget: u32,
}

/// Finds the shortest 8-connected path from `start` to any cell within `range`
/// of the destination.
///
/// The returned steps exclude `start`. `None` means no such cell was reached
/// before `budget` cells had been expanded.
pub(crate) fn plan_path<F>(request: PathRequest, mut is_blocked: F) -> Option<VecDeque<CellCoord>>
where
    F: FnMut(CellCoord) -> bool,
{
    let width = usize::try_from(request.columns).ok()?;
    let height = usize::try_from(request.rows).ok()?;
    let cell_count = width.checked_mul(height)?;
    if cell_count == 0 {
        return None;
    }

    let start_index = index(width, request.start).filter(|offset| *offset < cell_count)?;
    let mut parents: Vec<Option<usize>> = vec![None; cell_count];
    let mut visited = vec![false; cell_count];
    visited[start_index] = true;

    let mut queue = VecDeque::new();
    queue.push_back(request.start);
    let mut expanded = 0_u32;

    while let Some(cell) = queue.pop_front() {
        if expanded >= request.budget {
            return None;
        }
        expanded += 1;

        let current_index = index(width, cell)?;
        for neighbor in neighbors(cell, request.columns, request.rows) {
            let Some(neighbor_index) = index(width, neighbor) else {
                continue;
            };
            if visited[neighbor_index] || is_blocked(neighbor) {
                continue;
            }
            visited[neighbor_index] = true;
            parents[neighbor_index] = Some(current_index);

            if neighbor.range_to(request.destination) <= request.range {
                return Some(unwind(&parents, width, neighbor_index, start_index));
            }
            queue.push_back(neighbor);
        }
    }

    None
}

fn unwind(
    parents: &[Option<usize>],
    width: usize,
    goal_index: usize,
    start_index: usize,
) -> VecDeque<CellCoord> {
    let mut steps = VecDeque::new();
    let mut cursor = goal_index;
    while cursor != start_index {
        steps.push_front(coord(width, cursor));
        match parents.get(cursor).copied().flatten() {
            Some(parent) => cursor = parent,
            None => break,
        }
    }
    steps
}

fn neighbors(cell: CellCoord, width: u32, height: u32) -> impl Iterator<Item = CellCoord> {
    const OFFSETS: [(i64, i64); 8] = [
        (0, -1),
        (1, -1),
        (1, 0),
        (1, 1),
        (0, 1),
        (-1, 1),
        (-1, 0),
        (-1, -1),
    ];

    OFFSETS.into_iter().filter_map(move |(dx, dy)| {
        let column = u32::try_from(i64::from(cell.column()) + dx).ok()?;
        let row = u32::try_from(i64::from(cell.row()) + dy).ok()?;
        (column < width && row < height).then(|| CellCoord::new(column, row))
    })
}

fn index(width: usize, cell: CellCoord) -> Option<usize> {
    let column = usize::try_from(cell.column()).ok()?;
    let row = usize::try_from(cell.row()).ok()?;
    if column >= width {
        return None;
    }
    row.checked_mul(width)?.checked_add(column)
}

fn coord(width: usize, offset: usize) -> CellCoord {
    let column = u32::try_from(offset % width).unwrap_or(u32::MAX);
    let row = u32::try_from(offset / width).unwrap_or(u32::MAX);
    CellCoord::new(column, row)
}
