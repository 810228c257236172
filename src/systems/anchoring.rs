//! Tile anchoring.
//!
//! Anchoring rigidly couples a node to one tile of a grid: the node is
//! parented to the grid, its local position snaps to the tile center, and
//! the grid's snap-cell index records the occupancy. The physics hook is
//! told to freeze the body *before* the snap move so the position change
//! cannot leak velocity into the body.
//!
//! Ordering in here is contractual; consumers key off the relative order
//! of the physics call, the flag flip, and the anchor-state message.

use bevy_ecs::prelude::*;
use glam::Vec2;

use crate::components::grid::{Grid, TileCoord};
use crate::components::node::{EntityCoords, NodeStage, TransformNode};
use crate::events::anchorstate::AnchorStateEvent;
use crate::events::movement::MoveEvent;
use crate::events::parentchanged::ParentChangedEvent;
use crate::events::reanchor::ReAnchorEvent;
use crate::events::write_message;
use crate::resources::collaborators::Collaborators;
use crate::resources::replication::{ReplicationSet, SyncPhase};
use crate::resources::snapindex::SnapCells;
use crate::systems::coordinates::{refresh_subtree_caches, set_coordinates};
use crate::systems::world_query::{inv_world_matrix, world_position};

/// Anchor `entity` to `tile` of `grid`.
///
/// Returns `false` with no state touched when the snap index rejects the
/// cell (occupied, destroyed tile) or the participants cannot anchor at
/// all. On success the node ends up parented to the grid, snapped to the
/// tile center, with a static physics body.
pub fn anchor(world: &mut World, entity: Entity, grid: Entity, tile: TileCoord) -> bool {
    if entity == grid {
        log::error!("anchor: {entity} cannot anchor to itself");
        return false;
    }
    let Some(grid_geometry) = world.get::<Grid>(grid).copied() else {
        log::warn!("anchor: {grid} is not a grid");
        return false;
    };
    let Some(node) = world.get::<TransformNode>(entity) else {
        log::error!("anchor: {entity} has no transform node");
        return false;
    };
    if node.stage.terminating() {
        log::error!("anchor: {entity} is terminating");
        return false;
    }
    if world
        .get::<TransformNode>(grid)
        .is_none_or(|grid_node| grid_node.stage.terminating())
    {
        log::warn!("anchor: grid {grid} is unusable as a parent");
        return false;
    }
    let was_anchored = node.anchored;
    let stage = node.stage;

    let inserted = match world.get_resource_mut::<SnapCells>() {
        Some(mut cells) => cells.index.insert(grid, tile, entity),
        None => {
            log::warn!("anchor: no snap index registered");
            false
        }
    };
    if !inserted {
        return false;
    }

    if let Some(mut node) = world.get_mut::<TransformNode>(entity) {
        node.anchored = true;
    }
    // Static before the move, not after.
    if let Some(mut collab) = world.get_resource_mut::<Collaborators>() {
        collab.physics.body_anchored(entity, true);
    }
    if let Some(mut replication) = world.get_resource_mut::<ReplicationSet>() {
        replication.mark(entity);
    }
    if !was_anchored && stage == NodeStage::Running {
        write_message(
            world,
            AnchorStateEvent {
                entity,
                anchored: true,
                detaching: false,
            },
        );
    }

    let snap = grid_geometry.tile_center(tile);
    if let Err(err) = set_coordinates(world, entity, Some(grid), snap, None, false) {
        log::error!("anchor: snapping {entity} to {grid} failed ({err}); rolling back");
        if let Some(mut cells) = world.get_resource_mut::<SnapCells>() {
            cells.index.remove(grid, tile, entity);
        }
        if let Some(mut node) = world.get_mut::<TransformNode>(entity) {
            node.anchored = was_anchored;
        }
        if let Some(mut collab) = world.get_resource_mut::<Collaborators>() {
            collab.physics.body_anchored(entity, was_anchored);
        }
        return false;
    }
    true
}

/// Anchor to whichever tile of `grid` is under the node's current world
/// position.
pub fn anchor_at_current_tile(world: &mut World, entity: Entity, grid: Entity) -> bool {
    let Some(grid_geometry) = world.get::<Grid>(grid).copied() else {
        log::warn!("anchor: {grid} is not a grid");
        return false;
    };
    let grid_local = inv_world_matrix(world, grid).transform_point2(world_position(world, entity));
    anchor(world, entity, grid, grid_geometry.tile_of(grid_local))
}

/// Release an anchored node. No-op when not anchored.
pub fn unanchor(world: &mut World, entity: Entity) {
    unanchor_inner(world, entity, false);
}

/// Release as part of a detach to null space: the body is about to leave
/// the world, so the physics restore is skipped and consumers are told via
/// the `detaching` flag.
pub(crate) fn unanchor_for_detach(world: &mut World, entity: Entity) {
    unanchor_inner(world, entity, true);
}

fn unanchor_inner(world: &mut World, entity: Entity, detaching: bool) {
    let Some(node) = world.get::<TransformNode>(entity) else {
        return;
    };
    if !node.anchored {
        return;
    }
    let stage = node.stage;
    let grid = node.grid;
    let local = node.local_position;

    if let Some(mut replication) = world.get_resource_mut::<ReplicationSet>() {
        replication.mark(entity);
    }
    if let Some(mut node) = world.get_mut::<TransformNode>(entity) {
        node.anchored = false;
    }
    if !detaching
        && let Some(mut collab) = world.get_resource_mut::<Collaborators>()
    {
        collab.physics.body_anchored(entity, false);
    }

    // Uninitialized nodes never made it into the index; a vanished grid
    // means the index entries died with it.
    if stage.initialized()
        && let Some(grid_entity) = grid
        && let Some(grid_geometry) = world.get::<Grid>(grid_entity).copied()
    {
        let tile = grid_geometry.tile_of(local);
        let removed = match world.get_resource_mut::<SnapCells>() {
            Some(mut cells) => cells.index.remove(grid_entity, tile, entity),
            None => false,
        };
        if !removed {
            log::warn!("unanchor: {entity} was missing from the cell index of {grid_entity}");
            debug_assert!(removed, "anchored node absent from its snap cell");
        }
    }

    if stage.initialized() {
        write_message(
            world,
            AnchorStateEvent {
                entity,
                anchored: false,
                detaching,
            },
        );
    }
}

/// Grid-swap fast path: move an anchored node to `tile` of `new_grid`
/// without the unanchor/anchor round trip.
///
/// Used when the node's owning tile itself migrates between grids (grid
/// split or merge). The caller guarantees the node's pose relative to its
/// tile is unchanged, so no anchoring notifications fire; parent-changed
/// and move notifications still do, because dependents must resynchronize.
pub fn reanchor(world: &mut World, entity: Entity, new_grid: Entity, tile: TileCoord) {
    let Some(node) = world.get::<TransformNode>(entity) else {
        log::error!("reanchor: {entity} has no transform node");
        return;
    };
    if !node.anchored {
        log::error!("reanchor: {entity} is not anchored");
        return;
    }
    let Some(old_grid) = node.grid else {
        log::error!("reanchor: {entity} has no grid to leave");
        return;
    };
    let Some(new_geometry) = world.get::<Grid>(new_grid).copied() else {
        log::error!("reanchor: {new_grid} is not a grid");
        return;
    };

    let old_parent = node.parent;
    let old_map = node.map_id;
    let stage = node.stage;
    let old_local = node.local_position;
    let rotation = node.local_rotation;

    // Direct snap-cell surgery, no events.
    let mut tile_offset = Vec2::ZERO;
    if let Some(old_geometry) = world.get::<Grid>(old_grid).copied() {
        let old_tile = old_geometry.tile_of(old_local);
        tile_offset = old_local - old_geometry.tile_center(old_tile);
        if let Some(mut cells) = world.get_resource_mut::<SnapCells>() {
            cells.index.remove(old_grid, old_tile, entity);
        }
    }
    let inserted = match world.get_resource_mut::<SnapCells>() {
        Some(mut cells) => cells.index.insert(new_grid, tile, entity),
        None => false,
    };
    if !inserted {
        log::error!("reanchor: cell ({}, {}) of {new_grid} rejected {entity}", tile.x, tile.y);
        debug_assert!(inserted, "reanchor target cell rejected the node");
    }

    // Parent and grid swap, bypassing set_coordinates validation.
    if let Some(old) = old_parent
        && let Some(mut old_node) = world.get_mut::<TransformNode>(old)
    {
        old_node.children.remove(&entity);
    }
    if let Some(mut grid_node) = world.get_mut::<TransformNode>(new_grid) {
        grid_node.children.insert(entity);
    }
    let new_local = new_geometry.tile_center(tile) + tile_offset;
    if let Some(mut node) = world.get_mut::<TransformNode>(entity) {
        node.parent = Some(new_grid);
        node.local_position = new_local;
        node.matrices_dirty = true;
        node.clear_lerp();
    }
    refresh_subtree_caches(world, entity);

    if let Some(mut replication) = world.get_resource_mut::<ReplicationSet>() {
        replication.mark(entity);
    }
    write_message(
        world,
        ReAnchorEvent {
            entity,
            old_grid,
            new_grid,
            tile,
        },
    );
    write_message(
        world,
        ParentChangedEvent {
            entity,
            old_parent,
            old_map,
        },
    );
    if stage.initialized() {
        let from_state = world
            .get_resource::<SyncPhase>()
            .is_some_and(|phase| phase.applying);
        write_message(
            world,
            MoveEvent {
                entity,
                old_coords: EntityCoords::new(old_parent, old_local),
                new_coords: EntityCoords::new(Some(new_grid), new_local),
                old_rotation: rotation,
                new_rotation: rotation,
                from_state,
            },
        );
    }
}
