//! Move notifications.
//!
//! A [`MoveEvent`] is written whenever a node's pose or parent actually
//! changes, once the node has finished initializing. Consumers that cache
//! world-space products (broadphase, lookups, followers) key their updates
//! off this message.
//!
//! # Related
//!
//! - [`crate::systems::coordinates::set_coordinates`] – the function that
//!   writes these
//! - [`crate::components::node::EntityCoords`] – the coordinate payload

use bevy_ecs::message::Message;
use bevy_ecs::prelude::Entity;

use crate::components::node::EntityCoords;
use crate::math::Angle;

/// A node moved, rotated, or changed parent.
#[derive(Message, Debug, Clone, Copy)]
pub struct MoveEvent {
    pub entity: Entity,
    pub old_coords: EntityCoords,
    pub new_coords: EntityCoords,
    pub old_rotation: Angle,
    pub new_rotation: Angle,
    /// True when the move came from applying authoritative network state.
    /// Predicted-side consumers use this to tell rollback replay apart from
    /// fresh local simulation.
    pub from_state: bool,
}
