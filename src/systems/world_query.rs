//! World-space queries over the transform tree.
//!
//! Nothing here caches: every query is a single upward walk composing local
//! poses until it falls off the root. Consumers that want cached world
//! products watch the `matrices_dirty` flag and move notifications instead,
//! and rebuild on their own schedule.
//!
//! # Read safety
//!
//! All queries take `&World` and write nothing, so any number of them may
//! run concurrently with each other (see [`par_world_poses`]). They must
//! not run concurrently with the mutators in
//! [`coordinates`](crate::systems::coordinates), which `&mut World` already
//! guarantees.

use bevy_ecs::prelude::{Entity, World};
use glam::{Affine2, Vec2};

use crate::components::node::TransformNode;
use crate::math::Angle;
use crate::systems::coordinates::{set_local_position, set_local_rotation};

/// Entities per work unit for the batched pose resolver.
pub const POSE_BATCH: usize = 128;

/// World position and accumulated rotation, or `None` when the entity has
/// no transform node.
#[must_use]
pub fn try_world_pose(world: &World, entity: Entity) -> Option<(Vec2, Angle)> {
    let node = world.get::<TransformNode>(entity)?;
    let mut position = node.local_position;
    let mut rotation = node.local_rotation;
    let mut current = node.parent;

    while let Some(ancestor) = current {
        let Some(above) = world.get::<TransformNode>(ancestor) else {
            log::error!("{entity} has dangling ancestor {ancestor}; pose truncated");
            break;
        };
        position = above.local_rotation.rotate_vec(position) + above.local_position;
        rotation += above.local_rotation;
        current = above.parent;
    }

    Some((position, rotation))
}

/// World pose of an entity. Entities without a node resolve to the origin
/// with a logged error.
#[must_use]
pub fn world_pose(world: &World, entity: Entity) -> (Vec2, Angle) {
    match try_world_pose(world, entity) {
        Some(pose) => pose,
        None => {
            log::error!("world pose queried for {entity} without a transform node");
            (Vec2::ZERO, Angle::ZERO)
        }
    }
}

#[must_use]
pub fn world_position(world: &World, entity: Entity) -> Vec2 {
    world_pose(world, entity).0
}

/// Accumulated rotation from the node up to its root. Raw sum; wrap with
/// [`Angle::normalized`] when a canonical heading is needed.
#[must_use]
pub fn world_rotation(world: &World, entity: Entity) -> Angle {
    world_pose(world, entity).1
}

/// Local-to-world matrix.
#[must_use]
pub fn world_matrix(world: &World, entity: Entity) -> Affine2 {
    let (position, rotation) = world_pose(world, entity);
    Affine2::from_angle_translation(rotation.radians(), position)
}

/// World-to-local matrix.
#[must_use]
pub fn inv_world_matrix(world: &World, entity: Entity) -> Affine2 {
    world_matrix(world, entity).inverse()
}

/// Pose and both matrices from one walk, for consumers rebuilding caches.
#[must_use]
pub fn world_pose_and_matrices(world: &World, entity: Entity) -> (Vec2, Angle, Affine2, Affine2) {
    let (position, rotation) = world_pose(world, entity);
    let matrix = Affine2::from_angle_translation(rotation.radians(), position);
    (position, rotation, matrix, matrix.inverse())
}

/// Pose of `entity` expressed in `ancestor`'s local frame.
///
/// Walks upward and stops at `ancestor` when it is on the path. When it is
/// not, the pose is projected through the ancestor's inverse world matrix
/// instead; this is almost always caller confusion, so it warns.
#[must_use]
pub fn relative_pose(world: &World, entity: Entity, ancestor: Entity) -> (Vec2, Angle) {
    if entity == ancestor {
        return (Vec2::ZERO, Angle::ZERO);
    }
    let Some(node) = world.get::<TransformNode>(entity) else {
        log::error!("relative pose queried for {entity} without a transform node");
        return (Vec2::ZERO, Angle::ZERO);
    };

    let mut position = node.local_position;
    let mut rotation = node.local_rotation;
    let mut current = node.parent;

    while let Some(above) = current {
        if above == ancestor {
            return (position, rotation);
        }
        let Some(above_node) = world.get::<TransformNode>(above) else {
            break;
        };
        position = above_node.local_rotation.rotate_vec(position) + above_node.local_position;
        rotation += above_node.local_rotation;
        current = above_node.parent;
    }

    log::warn!("{ancestor} is not an ancestor of {entity}; projecting through world space");
    let (world_pos, world_rot) = world_pose(world, entity);
    let (_, ancestor_rot) = world_pose(world, ancestor);
    (
        inv_world_matrix(world, ancestor).transform_point2(world_pos),
        world_rot - ancestor_rot,
    )
}

#[must_use]
pub fn relative_position(world: &World, entity: Entity, ancestor: Entity) -> Vec2 {
    relative_pose(world, entity, ancestor).0
}

#[must_use]
pub fn relative_rotation(world: &World, entity: Entity, ancestor: Entity) -> Angle {
    relative_pose(world, entity, ancestor).1
}

/// Move an entity so its *world* position lands on `target`, leaving the
/// parent link alone.
pub fn set_world_position(world: &mut World, entity: Entity, target: Vec2) {
    let parent = world.get::<TransformNode>(entity).and_then(|n| n.parent);
    let local = match parent {
        Some(p) => inv_world_matrix(world, p).transform_point2(target),
        None => target,
    };
    set_local_position(world, entity, local);
}

/// Rotate an entity so its *world* rotation lands on `target`.
pub fn set_world_rotation(world: &mut World, entity: Entity, target: Angle) {
    let parent = world.get::<TransformNode>(entity).and_then(|n| n.parent);
    let local = match parent {
        Some(p) => target - world_rotation(world, p),
        None => target,
    };
    set_local_rotation(world, entity, local);
}

/// Resolve world poses for a slice of entities in fixed-size batches.
///
/// The mutate phase of the tick is over by the time this runs, so the walks
/// only read; with the `parallel` feature the batches fan out over rayon.
#[cfg(feature = "parallel")]
#[must_use]
pub fn par_world_poses(world: &World, entities: &[Entity]) -> Vec<(Entity, Vec2, Angle)> {
    use rayon::prelude::*;

    entities
        .par_chunks(POSE_BATCH)
        .flat_map_iter(|chunk| {
            chunk.iter().map(|&entity| {
                let (position, rotation) = world_pose(world, entity);
                (entity, position, rotation)
            })
        })
        .collect()
}

/// Resolve world poses for a slice of entities in fixed-size batches.
///
/// Serial fallback; enable the `parallel` feature to fan the batches out
/// over rayon.
#[cfg(not(feature = "parallel"))]
#[must_use]
pub fn par_world_poses(world: &World, entities: &[Entity]) -> Vec<(Entity, Vec2, Angle)> {
    entities
        .iter()
        .map(|&entity| {
            let (position, rotation) = world_pose(world, entity);
            (entity, position, rotation)
        })
        .collect()
}
