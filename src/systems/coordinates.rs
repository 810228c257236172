//! Hierarchy mutators.
//!
//! Every operation that changes a node's parent, position, or rotation
//! funnels into [`set_coordinates`]; the other entry points compute
//! arguments for it. This is the only place structural invariants are
//! enforced, so mutations made by writing `TransformNode` fields directly
//! bypass cycle checks, cache propagation, and notifications.
//!
//! Mutators take `&mut World` and must run in the serial phase of the
//! tick. Read-side queries live in [`crate::systems::world_query`].

use bevy_ecs::prelude::*;
use glam::Vec2;
use smallvec::SmallVec;
use thiserror::Error;

use crate::components::grid::Grid;
use crate::components::map::{Map, MapId};
use crate::components::node::{EntityCoords, TransformNode};
use crate::events::movement::MoveEvent;
use crate::events::parentchanged::ParentChangedEvent;
use crate::events::write_message;
use crate::math::Angle;
use crate::resources::collaborators::Collaborators;
use crate::resources::replication::{ReplicationSet, SyncPhase};
use crate::systems::anchoring;
use crate::systems::lifecycle;
use crate::systems::world_query::{inv_world_matrix, world_pose, world_rotation};

/// Structural violations the mutators refuse.
///
/// Every variant is logged at the rejection site, so callers may discard
/// the result when they have no recovery of their own.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StructuralError {
    #[error("{0} cannot become its own parent")]
    SelfParent(Entity),
    #[error("parenting {child} under {parent} would close a cycle")]
    Cycle { child: Entity, parent: Entity },
    #[error("{0} is terminating and can no longer be moved")]
    NodeTerminating(Entity),
    #[error("{0} is terminating and cannot become a parent")]
    TargetTerminating(Entity),
}

/// The canonical mutator. All other pose and parent setters reduce to it.
///
/// `new_rotation: None` keeps the local rotation on a pure move and
/// preserves the *world* rotation across a parent change. `unanchor`
/// controls whether an anchored node is released first; the anchoring and
/// sync paths pass `false` because they manage the flag themselves.
pub fn set_coordinates(
    world: &mut World,
    entity: Entity,
    new_parent: Option<Entity>,
    new_position: Vec2,
    new_rotation: Option<Angle>,
    unanchor: bool,
) -> Result<(), StructuralError> {
    let Some(node) = world.get::<TransformNode>(entity) else {
        log::error!("set_coordinates on {entity} without a transform node");
        return Ok(());
    };

    let old_parent = node.parent;
    let old_position = node.local_position;
    let old_rotation = node.local_rotation;
    let old_map = node.map_id;
    let stage = node.stage;
    let was_anchored = node.anchored;
    let no_local_rotation = node.no_local_rotation;

    // Rotation writes are ignored while the lock is set.
    let requested_rotation = if no_local_rotation {
        Some(Angle::ZERO)
    } else {
        new_rotation
    };

    let parent_changing = new_parent != old_parent;
    let same_position = new_position.abs_diff_eq(old_position, crate::math::POSE_EPSILON);
    let same_rotation = match requested_rotation {
        Some(rot) => rot.approx_eq(old_rotation),
        None => true,
    };
    if !parent_changing && same_position && same_rotation {
        return Ok(());
    }

    if was_anchored && unanchor {
        anchoring::unanchor(world, entity);
    }

    if stage.terminating() {
        log::error!("refusing to move terminating {entity}");
        return Err(StructuralError::NodeTerminating(entity));
    }

    if parent_changing && let Some(proposed) = new_parent {
        if proposed == entity {
            // Hard corruption. Pull the node out of the tree and get rid
            // of it before reporting, so the graph stays walkable.
            log::error!("{entity} attempted to become its own parent; detaching and deleting");
            detach_parent_to_null(world, entity);
            lifecycle::queue_deletion(world, entity);
            return Err(StructuralError::SelfParent(entity));
        }

        let Some(proposed_node) = world.get::<TransformNode>(proposed) else {
            log::error!("set_coordinates: proposed parent {proposed} has no transform node");
            return Ok(());
        };
        if proposed_node.stage.terminating() {
            log::error!("refusing to parent {entity} under terminating {proposed}");
            return Err(StructuralError::TargetTerminating(proposed));
        }

        // Walk from the proposed parent upward. Finding `entity` on that
        // path means the attach would close a cycle.
        let mut ancestor = proposed_node.parent;
        while let Some(above) = ancestor {
            if above == entity {
                let applying = world
                    .get_resource::<SyncPhase>()
                    .is_some_and(|phase| phase.applying);
                if !applying {
                    log::error!("parenting {entity} under {proposed} would close a cycle");
                    return Err(StructuralError::Cycle {
                        child: entity,
                        parent: proposed,
                    });
                }
                // Predicted rollback can transiently produce mutually
                // parented pairs; the authoritative stream straightens
                // them out next tick. Cut the back-edge and carry on.
                log::warn!(
                    "breaking transient cycle while applying state: detaching {proposed} from descendant chain of {entity}"
                );
                detach_parent_to_null(world, proposed);
                break;
            }
            ancestor = world.get::<TransformNode>(above).and_then(|n| n.parent);
        }
    }

    // Across a reparent the world rotation is preserved unless the caller
    // supplied one explicitly. Resolve before any link changes.
    let new_local_rotation = if no_local_rotation {
        Angle::ZERO
    } else {
        match requested_rotation {
            Some(rot) => rot,
            None if parent_changing => {
                let current_world = world_pose(world, entity).1;
                let parent_world = match new_parent {
                    Some(parent) => world_rotation(world, parent),
                    None => Angle::ZERO,
                };
                current_world - parent_world
            }
            None => old_rotation,
        }
    };

    if parent_changing {
        if let Some(old) = old_parent
            && let Some(mut old_node) = world.get_mut::<TransformNode>(old)
        {
            old_node.children.remove(&entity);
        }
        if let Some(new) = new_parent
            && let Some(mut new_node) = world.get_mut::<TransformNode>(new)
        {
            new_node.children.insert(entity);
        }
    }

    if let Some(mut node) = world.get_mut::<TransformNode>(entity) {
        node.parent = new_parent;
        node.local_position = new_position;
        node.local_rotation = new_local_rotation;
        node.matrices_dirty = true;
        if parent_changing {
            node.clear_lerp();
        }
    }

    if parent_changing {
        refresh_subtree_caches(world, entity);
        write_message(
            world,
            ParentChangedEvent {
                entity,
                old_parent,
                old_map,
            },
        );
    }

    if let Some(mut replication) = world.get_resource_mut::<ReplicationSet>() {
        replication.mark(entity);
    }

    if stage.initialized() {
        let from_state = world
            .get_resource::<SyncPhase>()
            .is_some_and(|phase| phase.applying);
        write_message(
            world,
            MoveEvent {
                entity,
                old_coords: EntityCoords::new(old_parent, old_position),
                new_coords: EntityCoords::new(new_parent, new_position),
                old_rotation,
                new_rotation: new_local_rotation,
                from_state,
            },
        );
    }

    Ok(())
}

/// Reparent while keeping the node's world pose fixed.
///
/// Silent no-op when `new_parent` has no transform node; structural
/// violations still come back from [`set_coordinates`].
pub fn set_parent(
    world: &mut World,
    entity: Entity,
    new_parent: Entity,
) -> Result<(), StructuralError> {
    if world.get::<TransformNode>(new_parent).is_none() {
        return Ok(());
    }
    if world.get::<TransformNode>(entity).is_none() {
        log::error!("set_parent on {entity} without a transform node");
        return Ok(());
    }

    let (world_pos, world_rot) = world_pose(world, entity);
    let local_position = inv_world_matrix(world, new_parent).transform_point2(world_pos);
    let local_rotation = world_rot - world_rotation(world, new_parent);
    set_coordinates(
        world,
        entity,
        Some(new_parent),
        local_position,
        Some(local_rotation),
        true,
    )
}

/// Move every child of `from` under `to`, one at a time, preserving each
/// child's world pose. Children that cannot be moved are logged by
/// [`set_coordinates`] and skipped.
pub fn reparent_children(world: &mut World, from: Entity, to: Entity) {
    if from == to {
        log::error!("reparent_children: {from} to itself");
        return;
    }
    let children: Vec<Entity> = match world.get::<TransformNode>(from) {
        Some(node) => node.children.iter().copied().collect(),
        None => return,
    };
    for child in children {
        let _ = set_parent(world, child, to);
    }
}

/// Detach a node into null space: no parent, origin position.
///
/// Used when an entity leaves the playable world (deletion, cycle
/// breaking, container insertion). Removes broadphase membership, drops
/// interpolation targets, and releases any anchor first. No-op when
/// already parentless.
pub fn detach_parent_to_null(world: &mut World, entity: Entity) {
    let Some(node) = world.get::<TransformNode>(entity) else {
        return;
    };
    if node.parent.is_none() {
        // Containers parent their contents to themselves; a contained
        // node with no parent means the two systems disagree.
        let contained = world
            .get_resource::<Collaborators>()
            .is_some_and(|collab| collab.containers.contains(entity));
        if contained {
            log::error!("{entity} is inside a container but has no parent");
            debug_assert!(!contained, "contained node without a parent");
        }
        return;
    }

    if let Some(mut collab) = world.get_resource_mut::<Collaborators>() {
        collab.broadphase.remove(entity);
    }

    if let Some(mut node) = world.get_mut::<TransformNode>(entity) {
        node.clear_lerp();
    }
    anchoring::unanchor_for_detach(world, entity);
    // Already unanchored above; the flag must not bounce again.
    let _ = set_coordinates(world, entity, None, Vec2::ZERO, None, false);
}

/// Set the local position, leaving rotation and parent alone.
pub fn set_local_position(world: &mut World, entity: Entity, position: Vec2) {
    let parent = world.get::<TransformNode>(entity).and_then(|n| n.parent);
    let _ = set_coordinates(world, entity, parent, position, None, true);
}

/// Set the local rotation, leaving position and parent alone. Ignored for
/// rotation-locked nodes.
pub fn set_local_rotation(world: &mut World, entity: Entity, rotation: Angle) {
    let Some(node) = world.get::<TransformNode>(entity) else {
        log::error!("set_local_rotation on {entity} without a transform node");
        return;
    };
    let (parent, position) = (node.parent, node.local_position);
    let _ = set_coordinates(world, entity, parent, position, Some(rotation), true);
}

/// Set local position and rotation together.
pub fn set_local_pose(world: &mut World, entity: Entity, position: Vec2, rotation: Angle) {
    let parent = world.get::<TransformNode>(entity).and_then(|n| n.parent);
    let _ = set_coordinates(world, entity, parent, position, Some(rotation), true);
}

/// Exchange the (parent, pose) pairs of two nodes.
pub fn swap_positions(world: &mut World, a: Entity, b: Entity) {
    let Some(node_a) = world.get::<TransformNode>(a) else {
        log::error!("swap_positions: {a} has no transform node");
        return;
    };
    let Some(node_b) = world.get::<TransformNode>(b) else {
        log::error!("swap_positions: {b} has no transform node");
        return;
    };
    let (parent_a, pos_a, rot_a) = (node_a.parent, node_a.local_position, node_a.local_rotation);
    let (parent_b, pos_b, rot_b) = (node_b.parent, node_b.local_position, node_b.local_rotation);

    let _ = set_coordinates(world, a, parent_b, pos_b, Some(rot_b), true);
    let _ = set_coordinates(world, b, parent_a, pos_a, Some(rot_a), true);
}

/// Reattach a parentless or detaching node to whatever grid sits under its
/// current world position, falling back to the map root.
///
/// Dropping an item, leaving a container, or a grid being destroyed all
/// end here: the entity needs *some* parent on its map to stay locatable.
pub fn attach_to_grid_or_map(world: &mut World, entity: Entity) {
    let Some((map_id, current_parent)) = world
        .get::<TransformNode>(entity)
        .map(|node| (node.map_id, node.parent))
    else {
        return;
    };
    let Some(map_id) = map_id else {
        log::warn!("attach_to_grid_or_map: {entity} is in null space");
        return;
    };

    let position = world_pose(world, entity).0;
    let grid = world
        .get_resource::<Collaborators>()
        .and_then(|collab| collab.grids.grid_at(map_id, position));
    let target = grid.or_else(|| {
        world
            .get_resource::<crate::resources::mapindex::MapDirectory>()
            .and_then(|maps| maps.root_of(map_id))
    });

    match target {
        Some(target) if Some(target) != current_parent => {
            let _ = set_parent(world, entity, target);
        }
        Some(_) => {}
        None => log::warn!("attach_to_grid_or_map: no grid or map root under {entity}"),
    }
}

/// Recompute one node's cached grid/map from its parent and its own
/// markers. Returns `(map_id, grid)`.
pub(crate) fn compute_caches(world: &World, entity: Entity) -> (Option<MapId>, Option<Entity>) {
    let parent = world
        .get::<TransformNode>(entity)
        .and_then(|node| node.parent);
    let (parent_map, parent_grid) = match parent {
        Some(parent) => world
            .get::<TransformNode>(parent)
            .map(|node| (node.map_id, node.grid))
            .unwrap_or((None, None)),
        None => (None, None),
    };

    let map_id = match world.get::<Map>(entity) {
        Some(map) => Some(map.id),
        None => parent_map,
    };
    let grid = if world.get::<Grid>(entity).is_some() {
        Some(entity)
    } else {
        parent_grid
    };
    (map_id, grid)
}

/// Push recomputed grid/map caches down the subtree rooted at `root`.
///
/// Iterative on purpose: tree depth must not be bounded by stack size.
pub(crate) fn refresh_subtree_caches(world: &mut World, root: Entity) {
    let mut work: SmallVec<[Entity; 16]> = SmallVec::new();
    work.push(root);

    while let Some(current) = work.pop() {
        let (map_id, grid) = compute_caches(world, current);
        let Some(mut node) = world.get_mut::<TransformNode>(current) else {
            continue;
        };
        if node.map_id == map_id && node.grid == grid {
            continue;
        }
        node.map_id = map_id;
        node.grid = grid;
        work.extend(node.children.iter().copied());
    }
}
