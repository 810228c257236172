//! Node lifecycle: spawn, initialize, start, terminate, despawn.
//!
//! Stages gate the rest of the engine: move notifications only fire for
//! initialized nodes, terminating nodes refuse mutation, and grid/map
//! caches are resolved exactly once on the way up. Cache resolution uses
//! an explicit ancestor chain, never recursion, so tree depth cannot
//! overflow the stack.

use bevy_ecs::prelude::*;
use smallvec::SmallVec;

use crate::components::grid::Grid;
use crate::components::map::{Map, MapId};
use crate::components::node::{NodeStage, TransformNode};
use crate::events::startup::TransformStartupEvent;
use crate::events::write_message;
use crate::resources::collaborators::Collaborators;
use crate::resources::lifecycle::DeletionQueue;
use crate::resources::mapindex::MapDirectory;
use crate::resources::netmap::NetIdMap;
use crate::resources::replication::ReplicationSet;
use crate::systems::anchoring::unanchor_for_detach;
use crate::systems::coordinates::{compute_caches, detach_parent_to_null};

/// Spawn an entity carrying `node`, left uninitialized for the caller to
/// bring up with [`init_node`] and [`start_node`].
pub fn spawn_node(world: &mut World, node: TransformNode) -> Entity {
    world.spawn(node).id()
}

/// Spawn, initialize, and start a node in one go.
pub fn spawn_running(world: &mut World, node: TransformNode) -> Entity {
    let entity = world.spawn(node).id();
    init_node(world, entity);
    start_node(world, entity);
    entity
}

/// Spawn a map root: parentless, identity pose, registered in the map
/// directory, running immediately.
pub fn spawn_map(world: &mut World, id: MapId) -> Entity {
    let root = world.spawn((Map::new(id), TransformNode::new())).id();
    if let Some(mut directory) = world.get_resource_mut::<MapDirectory>() {
        directory.register(id, root);
    }
    init_node(world, root);
    start_node(world, root);
    root
}

/// Spawn a grid node under a map root, running immediately.
pub fn spawn_grid(world: &mut World, map_root: Entity, tile_size: f32) -> Entity {
    let grid = world
        .spawn((
            Grid::new(tile_size),
            TransformNode::new().with_parent(map_root),
        ))
        .id();
    init_node(world, grid);
    start_node(world, grid);
    grid
}

/// Resolve grid/map caches and wire the parent's child set.
///
/// Ancestors may themselves still be uninitialized; the whole chain up to
/// the root is resolved top-down so every cache read sees a settled
/// parent. Idempotent past the first call.
pub fn init_node(world: &mut World, entity: Entity) {
    let Some(node) = world.get::<TransformNode>(entity) else {
        log::error!("init_node: {entity} has no transform node");
        return;
    };
    if node.stage != NodeStage::Uninitialized {
        return;
    }
    let parent = node.parent;

    if let Some(mut node) = world.get_mut::<TransformNode>(entity) {
        node.stage = NodeStage::Initializing;
    }

    if let Some(parent) = parent {
        match world.get_mut::<TransformNode>(parent) {
            Some(mut parent_node) => {
                parent_node.children.insert(entity);
            }
            None => log::error!("init_node: parent {parent} of {entity} has no transform node"),
        }
    }

    let mut chain: SmallVec<[Entity; 16]> = SmallVec::new();
    let mut cursor = Some(entity);
    while let Some(current) = cursor {
        chain.push(current);
        cursor = world
            .get::<TransformNode>(current)
            .and_then(|node| node.parent);
    }
    for &link in chain.iter().rev() {
        let (map_id, grid) = compute_caches(world, link);
        if let Some(mut node) = world.get_mut::<TransformNode>(link) {
            node.map_id = map_id;
            node.grid = grid;
        }
    }
}

/// Enter the running stage and announce it.
pub fn start_node(world: &mut World, entity: Entity) {
    match world.get::<TransformNode>(entity).map(|node| node.stage) {
        Some(NodeStage::Uninitialized) => init_node(world, entity),
        Some(NodeStage::Initializing) => {}
        Some(_) => return,
        None => {
            log::error!("start_node: {entity} has no transform node");
            return;
        }
    }

    if let Some(mut node) = world.get_mut::<TransformNode>(entity) {
        node.stage = NodeStage::Running;
    }
    if let Some(mut replication) = world.get_resource_mut::<ReplicationSet>() {
        replication.mark(entity);
    }
    write_message(world, TransformStartupEvent { entity });
}

/// Mark a node terminating: it can no longer move or become a parent.
pub fn begin_terminate(world: &mut World, entity: Entity) {
    if let Some(mut node) = world.get_mut::<TransformNode>(entity) {
        node.stage = NodeStage::Terminating;
    }
}

/// Mark terminating and park the entity for [`process_deletions`].
pub fn queue_deletion(world: &mut World, entity: Entity) {
    begin_terminate(world, entity);
    match world.get_resource_mut::<DeletionQueue>() {
        Some(mut queue) => queue.push(entity),
        None => log::warn!("no deletion queue registered; {entity} will linger terminating"),
    }
}

/// Despawn everything parked in the deletion queue.
pub fn process_deletions(world: &mut World) {
    let pending = match world.get_resource_mut::<DeletionQueue>() {
        Some(mut queue) => queue.take(),
        None => return,
    };
    for entity in pending {
        despawn_node(world, entity);
    }
}

/// Tear a node down completely.
///
/// Children are detached to null space first (a parent must never vanish
/// while children still reference it), the snap cell is vacated, the
/// parent's child set and the net-id map forget the entity, and only then
/// is it despawned.
pub fn despawn_node(world: &mut World, entity: Entity) {
    let Some(node) = world.get::<TransformNode>(entity) else {
        log::warn!("despawn_node: {entity} has no transform node");
        return;
    };
    let parent = node.parent;
    let children: Vec<Entity> = node.children.iter().copied().collect();

    begin_terminate(world, entity);
    for child in children {
        detach_parent_to_null(world, child);
    }

    unanchor_for_detach(world, entity);
    if let Some(mut collab) = world.get_resource_mut::<Collaborators>() {
        collab.broadphase.remove(entity);
    }
    if let Some(parent) = parent
        && let Some(mut parent_node) = world.get_mut::<TransformNode>(parent)
    {
        parent_node.children.remove(&entity);
    }

    if let Some(map) = world.get::<Map>(entity).copied()
        && let Some(mut directory) = world.get_resource_mut::<MapDirectory>()
    {
        directory.unregister(map.id);
    }
    if let Some(mut net) = world.get_resource_mut::<NetIdMap>() {
        net.unbind(entity);
    }
    world.despawn(entity);
}

/// Convenience for hosts tearing down a whole map: despawns the root and
/// every node that resolved to it.
pub fn despawn_map(world: &mut World, id: MapId) {
    let Some(root) = world
        .get_resource::<MapDirectory>()
        .and_then(|directory| directory.root_of(id))
    else {
        log::warn!("despawn_map: no root registered for map {}", id.0);
        return;
    };

    let mut on_map: Vec<Entity> = Vec::new();
    let mut query = world.query::<(Entity, &TransformNode)>();
    for (entity, node) in query.iter(world) {
        if node.map_id == Some(id) && entity != root {
            on_map.push(entity);
        }
    }
    for entity in on_map {
        despawn_node(world, entity);
    }
    despawn_node(world, root);
}
