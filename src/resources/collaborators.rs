//! Injected collaborator hooks.
//!
//! The transform tree has ordering contracts with a handful of neighboring
//! systems (physics body state, broadphase membership, container ownership,
//! grid lookup) but owns none of them. Hosts register implementations here;
//! everything defaults to an inert no-op so the tree runs standalone in
//! tests and headless tools.
//!
//! Hook implementations own whatever state they mirror (a physics engine
//! handle, a lookup structure); the transform systems only hand them entity
//! ids and flags.

use bevy_ecs::prelude::{Entity, Resource};
use glam::Vec2;

use crate::components::map::MapId;

/// Physics-side reaction to anchoring.
///
/// Anchored bodies must be static *before* the node snaps to its tile, so
/// [`body_anchored`](Self::body_anchored) is called ahead of the position
/// change on anchor, and after the flag clears on unanchor.
pub trait PhysicsHook: Send + Sync {
    fn body_anchored(&mut self, entity: Entity, anchored: bool) {
        let _ = (entity, anchored);
    }
}

/// Broadphase membership maintenance.
pub trait BroadphaseHook: Send + Sync {
    /// Drop the entity from spatial lookup structures. Called when a node
    /// detaches to null space and is no longer locatable.
    fn remove(&mut self, entity: Entity) {
        let _ = entity;
    }
}

/// Container ownership queries.
pub trait ContainerHook: Send + Sync {
    /// Whether the entity currently lives inside a container.
    fn contains(&self, entity: Entity) -> bool {
        let _ = entity;
        false
    }
}

/// Find the grid under a world position, if any.
pub trait GridLookup: Send + Sync {
    fn grid_at(&self, map: MapId, world_position: Vec2) -> Option<Entity> {
        let _ = (map, world_position);
        None
    }
}

struct Inert;

impl PhysicsHook for Inert {}
impl BroadphaseHook for Inert {}
impl ContainerHook for Inert {}
impl GridLookup for Inert {}

/// Resource bundling the injected hooks.
#[derive(Resource)]
pub struct Collaborators {
    pub physics: Box<dyn PhysicsHook>,
    pub broadphase: Box<dyn BroadphaseHook>,
    pub containers: Box<dyn ContainerHook>,
    pub grids: Box<dyn GridLookup>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            physics: Box::new(Inert),
            broadphase: Box::new(Inert),
            containers: Box::new(Inert),
            grids: Box::new(Inert),
        }
    }
}
