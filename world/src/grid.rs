//! Authoritative cell grid owned by the world.

use lane_skirmish_core::{Cell, CellCoord, CellFlags, Faction, GridSize, GridView};

/// Fixed-size grid of cells whose flags may be reconfigured but whose shape
/// never changes after creation.
#[derive(Clone, Debug)]
pub struct GridWorld {
    size: GridSize,
    cells: Vec<Cell>,
}

impl GridWorld {
    /// Creates a grid of open, unit-cost cells that accept both factions.
    #[must_use]
    pub fn new(size: GridSize) -> Self {
        let mut cells = Vec::with_capacity(size.cell_count());
        for row in 0..size.rows() {
            for column in 0..size.columns() {
                cells.push(Cell::new(CellCoord::new(column, row), CellFlags::OPEN));
            }
        }
        Self { size, cells }
    }

    /// Dimensions of the grid.
    #[must_use]
    pub const fn size(&self) -> GridSize {
        self.size
    }

    /// Cell at the coordinate, or `None` when out of bounds.
    #[must_use]
    pub fn get_cell(&self, coord: CellCoord) -> Option<&Cell> {
        self.size.index(coord).and_then(|index| self.cells.get(index))
    }

    /// Reconfigures a cell and returns its new flags.
    ///
    /// Spawnability arguments left as `None` keep their previous values.
    /// Out-of-bounds coordinates are ignored and yield `None`.
    pub fn update_cell(
        &mut self,
        coord: CellCoord,
        walkable: bool,
        movement_cost: u32,
        ally_spawnable: Option<bool>,
        enemy_spawnable: Option<bool>,
    ) -> Option<CellFlags> {
        let index = self.size.index(coord)?;
        let cell = self.cells.get_mut(index)?;
        let previous = cell.flags();
        let flags = CellFlags {
            walkable,
            movement_cost,
            ally_spawnable: ally_spawnable.unwrap_or(previous.ally_spawnable),
            enemy_spawnable: enemy_spawnable.unwrap_or(previous.enemy_spawnable),
        };
        *cell = Cell::new(coord, flags);
        Some(flags)
    }

    /// Walkable cells that accept spawns for the faction.
    #[must_use]
    pub fn spawnable_cells(&self, faction: Faction) -> Vec<Cell> {
        self.view().spawnable_cells(faction).copied().collect()
    }

    /// Read-only view for systems.
    #[must_use]
    pub fn view(&self) -> GridView<'_> {
        GridView::new(&self.cells, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_grid_is_open() {
        let grid = GridWorld::new(GridSize::new(3, 2));
        assert_eq!(grid.spawnable_cells(Faction::Ally).len(), 6);
        let cell = grid.get_cell(CellCoord::new(2, 1)).expect("in bounds");
        assert!(cell.is_walkable());
        assert_eq!(cell.movement_cost(), 1);
        assert!(grid.get_cell(CellCoord::new(3, 0)).is_none());
    }

    #[test]
    fn update_cell_keeps_unspecified_spawn_flags() {
        let mut grid = GridWorld::new(GridSize::square(4));
        let coord = CellCoord::new(1, 2);

        let flags = grid
            .update_cell(coord, true, 3, Some(false), None)
            .expect("in bounds");
        assert!(!flags.ally_spawnable);
        assert!(flags.enemy_spawnable);

        let flags = grid
            .update_cell(coord, false, 999, None, None)
            .expect("in bounds");
        assert!(!flags.walkable);
        assert!(!flags.ally_spawnable);
        assert_eq!(flags.movement_cost, 999);
        assert_eq!(grid.get_cell(coord).map(Cell::position), Some(coord));
    }

    #[test]
    fn update_cell_ignores_out_of_bounds() {
        let mut grid = GridWorld::new(GridSize::square(2));
        assert!(grid
            .update_cell(CellCoord::new(5, 5), false, 1, None, None)
            .is_none());
    }

    #[test]
    fn blocked_cells_are_not_spawnable() {
        let mut grid = GridWorld::new(GridSize::square(2));
        let _ = grid.update_cell(CellCoord::new(0, 0), false, 999, None, None);
        let cells = grid.spawnable_cells(Faction::Enemy);
        assert_eq!(cells.len(), 3);
        assert!(cells
            .iter()
            .all(|cell| cell.position() != CellCoord::new(0, 0)));
    }
}
