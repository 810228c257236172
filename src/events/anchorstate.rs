//! Anchor state change notifications.

use bevy_ecs::message::Message;
use bevy_ecs::prelude::Entity;

/// A node became anchored to, or released from, a grid tile.
#[derive(Message, Debug, Clone, Copy)]
pub struct AnchorStateEvent {
    pub entity: Entity,
    pub anchored: bool,
    /// True when the release happens as part of detaching the node to null
    /// space, so consumers skip work on an entity that is leaving the map
    /// anyway.
    pub detaching: bool,
}
