//! Map registry.

use bevy_ecs::prelude::{Entity, Resource};
use rustc_hash::FxHashMap;

use crate::components::map::MapId;

/// Which entity hosts each map root.
///
/// [`MapId`]s are stable across the wire and across saves; the hosting
/// entity is not. Lifecycle code registers map roots here as they spawn.
#[derive(Resource, Debug, Default)]
pub struct MapDirectory {
    roots: FxHashMap<MapId, Entity>,
}

impl MapDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: MapId, root: Entity) {
        self.roots.insert(id, root);
    }

    pub fn unregister(&mut self, id: MapId) {
        self.roots.remove(&id);
    }

    #[must_use]
    pub fn root_of(&self, id: MapId) -> Option<Entity> {
        self.roots.get(&id).copied()
    }
}
