//! Messages exchanged between the transform tree and its consumers.
//!
//! All notifications are buffered [`Message`]s scoped to the world they are
//! registered in; [`crate::setup::setup_world`] inserts the buffers and
//! [`crate::setup::flush_messages`] advances them once per tick. Readers
//! drain them with a `MessageReader` in their own systems.
//!
//! Submodules:
//! - [`movement`] – a node's pose or parent actually changed
//! - [`parentchanged`] – the parent link specifically changed
//! - [`anchorstate`] – a node anchored to or released from a grid tile
//! - [`reanchor`] – anchored node swapped grids directly
//! - [`startup`] – a node entered the running stage

use bevy_ecs::message::{Message, Messages};
use bevy_ecs::prelude::World;

pub mod anchorstate;
pub mod movement;
pub mod parentchanged;
pub mod reanchor;
pub mod startup;

/// Write one message into the world-scoped buffer, if it is registered.
///
/// Worlds built without [`crate::setup::setup_world`] simply drop
/// notifications; a warning is logged so the misconfiguration is visible.
pub(crate) fn write_message<M: Message>(world: &mut World, message: M) {
    match world.get_resource_mut::<Messages<M>>() {
        Some(mut buffer) => {
            buffer.write(message);
        }
        None => log::warn!(
            "dropping {}: buffer not registered (setup_world not called?)",
            std::any::type_name::<M>()
        ),
    }
}
