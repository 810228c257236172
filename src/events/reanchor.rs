//! Grid-to-grid re-anchor notifications.

use bevy_ecs::message::Message;
use bevy_ecs::prelude::Entity;

use crate::components::grid::TileCoord;

/// An anchored node was moved between grids without an unanchor/anchor
/// round trip (grid split/merge fast path).
#[derive(Message, Debug, Clone, Copy)]
pub struct ReAnchorEvent {
    pub entity: Entity,
    pub old_grid: Entity,
    pub new_grid: Entity,
    /// Tile on the new grid the node now occupies.
    pub tile: TileCoord,
}
