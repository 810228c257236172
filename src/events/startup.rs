//! Node startup notifications.

use bevy_ecs::message::Message;
use bevy_ecs::prelude::Entity;

/// A node finished initialization and entered the running stage.
///
/// Dependent systems (broadphase registration, anchoring bookkeeping) key
/// their first-time setup off this message rather than polling stages.
#[derive(Message, Debug, Clone, Copy)]
pub struct TransformStartupEvent {
    pub entity: Entity,
}
