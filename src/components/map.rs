//! Map root marker.
//!
//! A map is the top of a transform tree: it has no parent, an identity
//! local pose, and everything on it resolves its `map_id` to this map.

use bevy_ecs::prelude::Component;
use serde::{Deserialize, Serialize};

/// Stable identifier for a map, independent of the entity that hosts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapId(pub u32);

/// Marker for map root entities.
#[derive(Component, Clone, Copy, Debug)]
pub struct Map {
    pub id: MapId,
}

impl Map {
    #[must_use]
    pub fn new(id: MapId) -> Self {
        Self { id }
    }
}
