//! Set of cells currently claimed by spawned allies.

use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, MutexGuard,
    },
};

use lane_skirmish_core::CellCoord;
use tracing::warn;

static OCCUPANCY_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

/// Cells claimed by living allies, guarded for exclusive mutation.
#[derive(Debug, Default)]
pub struct OccupiedCells {
    cells: Mutex<BTreeSet<CellCoord>>,
}

impl OccupiedCells {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the cell. Returns `false` if it was already claimed.
    pub fn claim(&self, cell: CellCoord) -> bool {
        self.lock("claim").insert(cell)
    }

    /// Frees the cell. Returns `false` if it was not claimed.
    pub fn release(&self, cell: CellCoord) -> bool {
        self.lock("release").remove(&cell)
    }

    /// Reports whether the cell is claimed.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        self.lock("contains").contains(&cell)
    }

    /// Number of claimed cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock("len").len()
    }

    /// Reports whether no cell is claimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock("is_empty").is_empty()
    }

    /// Frees every cell.
    pub fn clear(&self) {
        self.lock("clear").clear();
    }

    fn lock(&self, operation: &'static str) -> MutexGuard<'_, BTreeSet<CellCoord>> {
        match self.cells.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                if OCCUPANCY_LOCK_POISON_WARNED
                    .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
                {
                    warn!(operation, "occupied-cell lock poisoned; recovered inner value");
                }
                poisoned.into_inner()
            }
        }
    }
}
