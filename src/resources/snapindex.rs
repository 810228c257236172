//! Snap-cell occupancy index.
//!
//! Each grid keeps per-tile knowledge of what is anchored where; the
//! anchoring subsystem talks to it through the [`SnapIndex`] trait so real
//! grids can bring richer storage and policies. [`CellIndex`] is the
//! in-memory implementation the crate ships: one anchored entity per cell.

use bevy_ecs::prelude::{Entity, Resource};
use rustc_hash::FxHashMap;

use crate::components::grid::TileCoord;

/// Per-grid, per-tile anchor bookkeeping.
///
/// `insert` may reject (occupancy policy, destroyed tile, out of bounds);
/// the anchoring subsystem treats a rejection as "anchoring failed" with no
/// state touched. `remove` reports whether the entity was actually present,
/// which keeps double-removal bugs observable.
pub trait SnapIndex: Send + Sync {
    fn insert(&mut self, grid: Entity, tile: TileCoord, entity: Entity) -> bool;
    fn remove(&mut self, grid: Entity, tile: TileCoord, entity: Entity) -> bool;
    fn occupant(&self, grid: Entity, tile: TileCoord) -> Option<Entity>;
}

/// Hash-backed snap index with an exclusive occupancy policy.
#[derive(Debug, Default)]
pub struct CellIndex {
    cells: FxHashMap<(Entity, TileCoord), Entity>,
}

impl CellIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapIndex for CellIndex {
    fn insert(&mut self, grid: Entity, tile: TileCoord, entity: Entity) -> bool {
        match self.cells.get(&(grid, tile)) {
            Some(&occupant) => occupant == entity,
            None => {
                self.cells.insert((grid, tile), entity);
                true
            }
        }
    }

    fn remove(&mut self, grid: Entity, tile: TileCoord, entity: Entity) -> bool {
        match self.cells.get(&(grid, tile)) {
            Some(&occupant) if occupant == entity => {
                self.cells.remove(&(grid, tile));
                true
            }
            _ => false,
        }
    }

    fn occupant(&self, grid: Entity, tile: TileCoord) -> Option<Entity> {
        self.cells.get(&(grid, tile)).copied()
    }
}

/// Resource holding the active snap index.
#[derive(Resource)]
pub struct SnapCells {
    pub index: Box<dyn SnapIndex>,
}

impl Default for SnapCells {
    fn default() -> Self {
        Self {
            index: Box::new(CellIndex::new()),
        }
    }
}
