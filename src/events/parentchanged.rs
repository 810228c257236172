//! Parent link change notifications.

use bevy_ecs::message::Message;
use bevy_ecs::prelude::Entity;

use crate::components::map::MapId;

/// A node was attached to a different parent (or detached entirely).
///
/// Carries the previous parent and the map the node was on before the
/// change, so consumers can unhook per-map bookkeeping.
#[derive(Message, Debug, Clone, Copy)]
pub struct ParentChangedEvent {
    pub entity: Entity,
    pub old_parent: Option<Entity>,
    pub old_map: Option<MapId>,
}
