#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Breadth-first pathfinding over the walkable cells of a grid view.
//!
//! Movement cost is ignored: every step between 4-connected walkable cells
//! counts as one hop, so the first path discovered is a shortest one.
//! Neighbours are always expanded up, down, left, right so equal-length
//! routes resolve identically between runs.

use std::collections::VecDeque;

use lane_skirmish_core::{CellCoord, GridSize, GridView, Path, SimulationError};
use tracing::debug;

/// Reusable breadth-first search workspace.
///
/// The frontier and predecessor buffers are kept between calls so repeated
/// requests on the same grid avoid reallocating.
#[derive(Clone, Debug, Default)]
pub struct Pathfinder {
    frontier: VecDeque<CellCoord>,
    came_from: Vec<Option<CellCoord>>,
    visited: Vec<bool>,
}

impl Pathfinder {
    /// Creates a pathfinder with empty scratch buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes a shortest walkable path from `start` to `end`, inclusive.
    ///
    /// Only walkable cells are expanded. The start cell itself is never
    /// checked, which lets an agent standing on a cell that was just blocked
    /// walk out of it.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::PathNotFound`] when either endpoint lies
    /// outside the grid or the frontier exhausts without reaching `end`.
    pub fn find_path(
        &mut self,
        grid: &GridView<'_>,
        start: CellCoord,
        end: CellCoord,
    ) -> Result<Path, SimulationError> {
        let size = grid.size();
        let not_found = SimulationError::PathNotFound { start, end };

        let (Some(start_index), Some(end_index)) = (size.index(start), size.index(end)) else {
            return Err(not_found);
        };

        if start == end {
            return Ok(Path::new(vec![start]));
        }

        self.reset(size);
        self.visited[start_index] = true;
        self.frontier.push_back(start);

        while let Some(cell) = self.frontier.pop_front() {
            if cell == end {
                break;
            }

            for neighbor in neighbors(cell, size) {
                if !grid.is_walkable(neighbor) {
                    continue;
                }
                let Some(index) = size.index(neighbor) else {
                    continue;
                };
                if self.visited[index] {
                    continue;
                }

                self.visited[index] = true;
                self.came_from[index] = Some(cell);
                self.frontier.push_back(neighbor);
            }
        }

        if !self.visited[end_index] {
            debug!(?start, ?end, "no walkable path");
            return Err(not_found);
        }

        self.reconstruct(size, start, end).ok_or(not_found)
    }

    fn reset(&mut self, size: GridSize) {
        let count = size.cell_count();
        self.frontier.clear();
        self.came_from.clear();
        self.came_from.resize(count, None);
        self.visited.clear();
        self.visited.resize(count, false);
    }

    fn reconstruct(&self, size: GridSize, start: CellCoord, end: CellCoord) -> Option<Path> {
        let mut cells = vec![end];
        let mut current = end;
        while current != start {
            let previous = self.came_from.get(size.index(current)?).copied().flatten()?;
            cells.push(previous);
            current = previous;
        }
        cells.reverse();
        Some(Path::new(cells))
    }
}

/// In-bounds 4-connected neighbours in up, down, left, right order.
///
/// "Up" is toward increasing row indices.
fn neighbors(cell: CellCoord, size: GridSize) -> impl Iterator<Item = CellCoord> {
    let mut candidates = [None; 4];
    let mut count = 0;

    if let Some(row) = cell.row().checked_add(1) {
        if row < size.rows() {
            candidates[count] = Some(CellCoord::new(cell.column(), row));
            count += 1;
        }
    }

    if let Some(row) = cell.row().checked_sub(1) {
        candidates[count] = Some(CellCoord::new(cell.column(), row));
        count += 1;
    }

    if let Some(column) = cell.column().checked_sub(1) {
        candidates[count] = Some(CellCoord::new(column, cell.row()));
        count += 1;
    }

    if let Some(column) = cell.column().checked_add(1) {
        if column < size.columns() {
            candidates[count] = Some(CellCoord::new(column, cell.row()));
            count += 1;
        }
    }

    candidates.into_iter().take(count).flatten()
}
