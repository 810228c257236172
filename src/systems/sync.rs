//! Delta state sync across the network boundary.
//!
//! The authoritative side drains dirtied nodes into [`TransformDelta`]s;
//! the replicated side applies them with [`apply_state`], tolerating the
//! transient contradictions client prediction produces (the mutator breaks
//! cycles instead of rejecting while [`SyncPhase::applying`] is set).
//! Transport framing is somebody else's problem; JSON helpers are provided
//! for bridges that want a textual encoding.

use bevy_ecs::prelude::*;
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::components::grid::Grid;
use crate::components::node::TransformNode;
use crate::events::anchorstate::AnchorStateEvent;
use crate::events::write_message;
use crate::math::{Angle, POSE_EPSILON};
use crate::resources::netmap::{NetId, NetIdMap};
use crate::resources::replication::{ReplicationSet, SyncPhase, SyncSettings};
use crate::resources::snapindex::SnapCells;
use crate::systems::coordinates::set_coordinates;

/// One node's transform on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformDelta {
    pub position: Vec2,
    /// Local rotation in radians.
    pub rotation: Angle,
    /// Parent by network-stable id; `None` for roots and null space.
    pub parent: Option<NetId>,
    pub no_local_rotation: bool,
    pub anchored: bool,
}

/// A confirmed delta plus, when the server already knows it, the following
/// tick's delta for interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformState {
    pub delta: TransformDelta,
    pub next: Option<TransformDelta>,
}

impl TransformState {
    #[must_use]
    pub fn new(delta: TransformDelta) -> Self {
        Self { delta, next: None }
    }

    #[must_use]
    pub fn with_next(delta: TransformDelta, next: TransformDelta) -> Self {
        Self {
            delta,
            next: Some(next),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Capture one node's current delta, allocating net ids for it and its
/// parent as needed. `None` when the entity has no node or no id map is
/// registered.
pub fn produce_delta(world: &mut World, entity: Entity) -> Option<TransformDelta> {
    let (position, rotation, parent, no_local_rotation, anchored) = {
        let node = world.get::<TransformNode>(entity)?;
        (
            node.local_position,
            node.local_rotation,
            node.parent,
            node.no_local_rotation,
            node.anchored,
        )
    };
    let mut net = world.get_resource_mut::<NetIdMap>()?;
    Some(TransformDelta {
        position,
        rotation,
        parent: parent.map(|p| net.allocate(p)),
        no_local_rotation,
        anchored,
    })
}

/// Drain the replication set into `(net id, delta)` pairs, sorted by id so
/// the wire order is deterministic. Entities that died since they were
/// marked are skipped.
pub fn drain_deltas(world: &mut World) -> Vec<(NetId, TransformDelta)> {
    let dirty = match world.get_resource_mut::<ReplicationSet>() {
        Some(mut replication) => replication.take(),
        None => return Vec::new(),
    };

    let mut out = Vec::with_capacity(dirty.len());
    for entity in dirty {
        let Some(delta) = produce_delta(world, entity) else {
            continue;
        };
        let Some(id) = world
            .get_resource_mut::<NetIdMap>()
            .map(|mut net| net.allocate(entity))
        else {
            continue;
        };
        out.push((id, delta));
    }
    out.sort_by_key(|(id, _)| *id);
    out
}

/// Apply an authoritative state onto a local node.
///
/// The order in here is the rollback-tolerance contract: vacate the old
/// snap cell, keep the anchor flag optimistically high across the move so
/// the index does not churn, move under [`SyncPhase::applying`], then
/// settle the final flag and cell.
pub fn apply_state(world: &mut World, entity: Entity, state: &TransformState) {
    let delta = &state.delta;

    let resolved_parent = match delta.parent {
        None => None,
        Some(net_id) => {
            let local = world
                .get_resource::<NetIdMap>()
                .and_then(|net| net.resolve(net_id));
            if local.is_none() {
                log::error!(
                    "apply_state: parent net id {} of {entity} is unresolved; proceeding parentless",
                    net_id.0
                );
            }
            local
        }
    };

    let Some(node) = world.get::<TransformNode>(entity) else {
        log::error!("apply_state: {entity} has no transform node");
        return;
    };
    let old_parent = node.parent;
    let old_position = node.local_position;
    let old_rotation = node.local_rotation;
    let old_anchored = node.anchored;
    let old_grid = node.grid;
    let old_rotation_lock = node.no_local_rotation;
    let stage = node.stage;

    if old_rotation_lock != delta.no_local_rotation
        && let Some(mut node) = world.get_mut::<TransformNode>(entity)
    {
        node.no_local_rotation = delta.no_local_rotation;
    }

    let pose_changed = resolved_parent != old_parent
        || !delta.position.abs_diff_eq(old_position, POSE_EPSILON)
        || !delta.rotation.approx_eq(old_rotation);

    if pose_changed {
        // The old cell is stale whatever else happens.
        if old_anchored
            && let Some(grid_entity) = old_grid
            && let Some(geometry) = world.get::<Grid>(grid_entity).copied()
        {
            let tile = geometry.tile_of(old_position);
            if let Some(mut cells) = world.get_resource_mut::<SnapCells>() {
                cells.index.remove(grid_entity, tile, entity);
            }
        }
        // Keep the flag high across the move when the entity stays
        // anchored, so the move itself cannot tear the anchor down.
        if let Some(mut node) = world.get_mut::<TransformNode>(entity) {
            node.anchored = old_anchored || delta.anchored;
        }

        let was_applying = world
            .get_resource::<SyncPhase>()
            .is_some_and(|phase| phase.applying);
        if let Some(mut phase) = world.get_resource_mut::<SyncPhase>() {
            phase.applying = true;
        }
        let moved = set_coordinates(
            world,
            entity,
            resolved_parent,
            delta.position,
            Some(delta.rotation),
            false,
        );
        if let Some(mut phase) = world.get_resource_mut::<SyncPhase>() {
            phase.applying = was_applying;
        }
        if let Err(err) = moved {
            log::error!("apply_state: move of {entity} rejected ({err})");
        }

        if let Some(mut node) = world.get_mut::<TransformNode>(entity) {
            node.anchored = delta.anchored;
        }

        if delta.anchored {
            let (parent_now, grid_now, position_now) = match world.get::<TransformNode>(entity) {
                Some(node) => (node.parent, node.grid, node.local_position),
                None => return,
            };
            let mut settled = false;
            if parent_now == grid_now
                && let Some(grid_entity) = grid_now
                && let Some(geometry) = world.get::<Grid>(grid_entity).copied()
            {
                let tile = geometry.tile_of(position_now);
                settled = match world.get_resource_mut::<SnapCells>() {
                    Some(mut cells) => cells.index.insert(grid_entity, tile, entity),
                    None => false,
                };
            }
            if !settled {
                log::error!(
                    "apply_state: {entity} is flagged anchored but its parent is not its grid; clearing"
                );
                debug_assert!(settled, "anchored state without a matching grid parent");
                if let Some(mut node) = world.get_mut::<TransformNode>(entity) {
                    node.anchored = false;
                }
            }
        }

        let anchored_now = world
            .get::<TransformNode>(entity)
            .is_some_and(|node| node.anchored);
        if anchored_now != old_anchored && stage.initialized() {
            write_message(
                world,
                AnchorStateEvent {
                    entity,
                    anchored: anchored_now,
                    detaching: false,
                },
            );
        }
    } else if delta.anchored != old_anchored {
        // Anchor flip in place: no move machinery, but the cell index must
        // stay truthful.
        if let Some(mut node) = world.get_mut::<TransformNode>(entity) {
            node.anchored = delta.anchored;
        }
        if let Some(grid_entity) = old_grid
            && old_parent == Some(grid_entity)
            && let Some(geometry) = world.get::<Grid>(grid_entity).copied()
        {
            let tile = geometry.tile_of(old_position);
            if let Some(mut cells) = world.get_resource_mut::<SnapCells>() {
                if delta.anchored {
                    cells.index.insert(grid_entity, tile, entity);
                } else {
                    cells.index.remove(grid_entity, tile, entity);
                }
            }
        }
        if stage.initialized() {
            write_message(
                world,
                AnchorStateEvent {
                    entity,
                    anchored: delta.anchored,
                    detaching: false,
                },
            );
        }
    }

    // Look-ahead seeds interpolation only when it shares the parent the
    // node just confirmed; a mid-air reparent skips smoothing this tick.
    let interpolate = world
        .get_resource::<SyncSettings>()
        .is_none_or(|settings| settings.interpolation);
    if let Some(mut node) = world.get_mut::<TransformNode>(entity) {
        match &state.next {
            Some(next) if interpolate && next.parent == delta.parent => {
                node.next_position = Some(next.position);
                node.next_rotation = Some(next.rotation);
            }
            _ => node.clear_lerp(),
        }
    }
}
