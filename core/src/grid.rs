//! Grid contracts: cell coordinates, cell flags, read-only grid views and paths.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::Faction;

/// Location of a single grid cell expressed as column and row coordinates.
///
/// Columns grow along the world `x` axis and rows along the world `y` axis.
/// Each cell is one world unit wide and centred on its integer coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Computes the Manhattan distance between two cell coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: CellCoord) -> u32 {
        self.column().abs_diff(other.column()) + self.row().abs_diff(other.row())
    }

    /// World-space point at the centre of the cell.
    #[must_use]
    pub fn world_point(self) -> Vec2 {
        Vec2::new(self.column as f32, self.row as f32)
    }

    /// Cell whose footprint contains the provided world point.
    ///
    /// Returns `None` for points left of or below the grid origin.
    #[must_use]
    pub fn from_world_point(point: Vec2) -> Option<Self> {
        let column = (point.x + 0.5).floor();
        let row = (point.y + 0.5).floor();
        if !column.is_finite() || !row.is_finite() || column < 0.0 || row < 0.0 {
            return None;
        }
        if column > u32::MAX as f32 || row > u32::MAX as f32 {
            return None;
        }
        Some(Self::new(column as u32, row as u32))
    }
}

/// Dimensions of the cell grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSize {
    columns: u32,
    rows: u32,
}

impl GridSize {
    /// Creates a grid size with explicit dimensions.
    #[must_use]
    pub const fn new(columns: u32, rows: u32) -> Self {
        Self { columns, rows }
    }

    /// Creates an `N x N` grid size.
    #[must_use]
    pub const fn square(side: u32) -> Self {
        Self::new(side, side)
    }

    /// Number of columns in the grid.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of rows in the grid.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Reports whether the coordinate lies inside the grid.
    #[must_use]
    pub const fn contains(&self, cell: CellCoord) -> bool {
        cell.column() < self.columns && cell.row() < self.rows
    }

    /// Total number of cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        let columns = usize::try_from(self.columns).unwrap_or(0);
        let rows = usize::try_from(self.rows).unwrap_or(0);
        columns.saturating_mul(rows)
    }

    /// Row-major index of the cell, if it lies inside the grid.
    #[must_use]
    pub fn index(&self, cell: CellCoord) -> Option<usize> {
        if !self.contains(cell) {
            return None;
        }
        let width = usize::try_from(self.columns).ok()?;
        let row = usize::try_from(cell.row()).ok()?;
        let column = usize::try_from(cell.column()).ok()?;
        row.checked_mul(width)?.checked_add(column)
    }

    /// Clamps a world point into the area covered by cell centres.
    #[must_use]
    pub fn clamp_point(&self, point: Vec2) -> Vec2 {
        let max_x = self.columns.saturating_sub(1) as f32;
        let max_y = self.rows.saturating_sub(1) as f32;
        Vec2::new(point.x.clamp(0.0, max_x), point.y.clamp(0.0, max_y))
    }
}

/// Mutable flags carried by every grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellFlags {
    /// Whether agents may traverse the cell.
    pub walkable: bool,
    /// Traversal cost kept for rendering and future weighting.
    pub movement_cost: u32,
    /// Whether allies may be spawned into the cell.
    pub ally_spawnable: bool,
    /// Whether enemies may be spawned into the cell.
    pub enemy_spawnable: bool,
}

impl CellFlags {
    /// Flags for an open, unit-cost cell that accepts both factions.
    pub const OPEN: Self = Self {
        walkable: true,
        movement_cost: 1,
        ally_spawnable: true,
        enemy_spawnable: true,
    };

    /// Reports whether the cell accepts spawns for the provided faction.
    #[must_use]
    pub const fn spawnable_for(&self, faction: Faction) -> bool {
        match faction {
            Faction::Ally => self.ally_spawnable,
            Faction::Enemy => self.enemy_spawnable,
        }
    }
}

impl Default for CellFlags {
    fn default() -> Self {
        Self::OPEN
    }
}

/// Single grid square with an immutable position and reconfigurable flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cell {
    position: CellCoord,
    flags: CellFlags,
}

impl Cell {
    /// Creates a cell at the provided position.
    #[must_use]
    pub const fn new(position: CellCoord, flags: CellFlags) -> Self {
        Self { position, flags }
    }

    /// Grid position of the cell.
    #[must_use]
    pub const fn position(&self) -> CellCoord {
        self.position
    }

    /// Current flags applied to the cell.
    #[must_use]
    pub const fn flags(&self) -> CellFlags {
        self.flags
    }

    /// Whether agents may traverse the cell.
    #[must_use]
    pub const fn is_walkable(&self) -> bool {
        self.flags.walkable
    }

    /// Stored movement cost.
    #[must_use]
    pub const fn movement_cost(&self) -> u32 {
        self.flags.movement_cost
    }

    /// Whether the cell is walkable and accepts spawns for the faction.
    #[must_use]
    pub const fn accepts_spawn(&self, faction: Faction) -> bool {
        self.flags.walkable && self.flags.spawnable_for(faction)
    }
}

/// Read-only view into the world's cell grid.
#[derive(Clone, Copy, Debug)]
pub struct GridView<'a> {
    cells: &'a [Cell],
    size: GridSize,
}

impl<'a> GridView<'a> {
    /// Captures a view backed by a row-major cell slice.
    #[must_use]
    pub fn new(cells: &'a [Cell], size: GridSize) -> Self {
        Self { cells, size }
    }

    /// Dimensions of the grid.
    #[must_use]
    pub const fn size(&self) -> GridSize {
        self.size
    }

    /// Cell at the provided coordinate, or `None` when out of bounds.
    #[must_use]
    pub fn cell(&self, coord: CellCoord) -> Option<&'a Cell> {
        self.size
            .index(coord)
            .and_then(|index| self.cells.get(index))
    }

    /// Reports whether the coordinate names an in-bounds walkable cell.
    #[must_use]
    pub fn is_walkable(&self, coord: CellCoord) -> bool {
        self.cell(coord).map_or(false, Cell::is_walkable)
    }

    /// Walkable cells that accept spawns for the faction, in row-major order.
    pub fn spawnable_cells(&self, faction: Faction) -> impl Iterator<Item = &'a Cell> + 'a {
        self.cells
            .iter()
            .filter(move |cell| cell.accepts_spawn(faction))
    }

    /// Cell containing the world point, if it lies inside the grid.
    #[must_use]
    pub fn locate(&self, point: Vec2) -> Option<CellCoord> {
        CellCoord::from_world_point(point).filter(|cell| self.size.contains(*cell))
    }

    /// Reports whether a straight segment between two points avoids blocked cells.
    ///
    /// Every cell the segment crosses strictly between the two endpoint cells
    /// must be walkable. The endpoint cells themselves are never treated as
    /// occluders so an observer standing next to a wall can still see past it.
    #[must_use]
    pub fn line_of_sight(&self, from: Vec2, to: Vec2) -> bool {
        let (Some(start), Some(end)) = (self.locate(from), self.locate(to)) else {
            return false;
        };

        let mut column = i64::from(start.column());
        let mut row = i64::from(start.row());
        let end_column = i64::from(end.column());
        let end_row = i64::from(end.row());

        let delta = to - from;
        let step_column: i64 = if delta.x > 0.0 {
            1
        } else if delta.x < 0.0 {
            -1
        } else {
            0
        };
        let step_row: i64 = if delta.y > 0.0 {
            1
        } else if delta.y < 0.0 {
            -1
        } else {
            0
        };

        let boundary_t = |origin: f32, cell: i64, step: i64, delta: f32| -> f32 {
            if step == 0 {
                return f32::INFINITY;
            }
            let boundary = cell as f32 + 0.5 * step as f32;
            (boundary - origin) / delta
        };
        let mut t_column = boundary_t(from.x, column, step_column, delta.x);
        let mut t_row = boundary_t(from.y, row, step_row, delta.y);
        let t_delta_column = if step_column == 0 {
            f32::INFINITY
        } else {
            1.0 / delta.x.abs()
        };
        let t_delta_row = if step_row == 0 {
            f32::INFINITY
        } else {
            1.0 / delta.y.abs()
        };

        let steps = start.manhattan_distance(end);
        for _ in 0..steps {
            if t_column < t_row {
                column += step_column;
                t_column += t_delta_column;
            } else {
                row += step_row;
                t_row += t_delta_row;
            }

            if column == end_column && row == end_row {
                return true;
            }

            let (Ok(c), Ok(r)) = (u32::try_from(column), u32::try_from(row)) else {
                return false;
            };
            if !self.is_walkable(CellCoord::new(c, r)) {
                return false;
            }
        }

        true
    }
}

/// Ordered sequence of grid positions from start to end, inclusive of both.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Path {
    cells: Vec<CellCoord>,
}

impl Path {
    /// Wraps an ordered cell sequence.
    #[must_use]
    pub fn new(cells: Vec<CellCoord>) -> Self {
        Self { cells }
    }

    /// Cells along the path in traversal order.
    #[must_use]
    pub fn cells(&self) -> &[CellCoord] {
        &self.cells
    }

    /// First cell of the path.
    #[must_use]
    pub fn start(&self) -> Option<CellCoord> {
        self.cells.first().copied()
    }

    /// Last cell of the path.
    #[must_use]
    pub fn end(&self) -> Option<CellCoord> {
        self.cells.last().copied()
    }

    /// Number of cells in the path.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Reports whether the path holds no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of moves needed to walk the path.
    #[must_use]
    pub fn hops(&self) -> usize {
        self.cells.len().saturating_sub(1)
    }

    /// Consumes the path, yielding cell centres in traversal order.
    pub fn into_waypoints(self) -> impl Iterator<Item = Vec2> {
        self.cells.into_iter().map(CellCoord::world_point)
    }
}
