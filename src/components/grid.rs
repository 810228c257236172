//! Tile grid node.
//!
//! A grid is itself a transform node (usually parented to a map root) whose
//! local space is divided into square tiles. Anchored entities are parented
//! directly to the grid and snapped to a tile center; tile *occupancy* is
//! tracked by the snap index resource, not here.

use bevy_ecs::prelude::Component;
use glam::{IVec2, Vec2};

/// Tile coordinates in grid-local space.
pub type TileCoord = IVec2;

/// Marker plus tile geometry for grid entities.
#[derive(Component, Clone, Copy, Debug)]
pub struct Grid {
    /// Side length of a square tile in grid-local units.
    pub tile_size: f32,
}

impl Grid {
    #[must_use]
    pub fn new(tile_size: f32) -> Self {
        Self { tile_size }
    }

    /// The tile containing a grid-local position. Positions exactly on a
    /// boundary belong to the higher tile.
    #[must_use]
    pub fn tile_of(&self, local: Vec2) -> TileCoord {
        IVec2::new(
            (local.x / self.tile_size).floor() as i32,
            (local.y / self.tile_size).floor() as i32,
        )
    }

    /// Center of a tile in grid-local space. This is the canonical local
    /// position of anything anchored to that tile.
    #[must_use]
    pub fn tile_center(&self, tile: TileCoord) -> Vec2 {
        Vec2::new(
            (tile.x as f32 + 0.5) * self.tile_size,
            (tile.y as f32 + 0.5) * self.tile_size,
        )
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self { tile_size: 1.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== GRID TESTS ====================

    #[test]
    fn tile_of_floors_toward_negative() {
        let grid = Grid::new(1.0);
        assert_eq!(grid.tile_of(Vec2::new(0.5, 0.5)), IVec2::new(0, 0));
        assert_eq!(grid.tile_of(Vec2::new(-0.5, 0.5)), IVec2::new(-1, 0));
        assert_eq!(grid.tile_of(Vec2::new(1.0, -0.1)), IVec2::new(1, -1));
    }

    #[test]
    fn tile_center_round_trips() {
        let grid = Grid::new(2.0);
        let tile = IVec2::new(3, -2);
        assert_eq!(grid.tile_of(grid.tile_center(tile)), tile);
        assert_eq!(grid.tile_center(tile), Vec2::new(7.0, -3.0));
    }

    #[test]
    fn tile_size_scales_lookup() {
        let grid = Grid::new(0.5);
        assert_eq!(grid.tile_of(Vec2::new(1.1, 1.1)), IVec2::new(2, 2));
    }
}
