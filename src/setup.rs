//! World wiring.
//!
//! Call [`setup_world`] once on a fresh [`World`] to register every message
//! buffer and resource the transform systems expect. The buffers follow the
//! bevy_ecs [`Messages`] contract: call their `update()` once per tick,
//! either via the individual systems here or [`flush_messages`].

use bevy_ecs::message::Messages;
use bevy_ecs::prelude::*;

use crate::events::anchorstate::AnchorStateEvent;
use crate::events::movement::MoveEvent;
use crate::events::parentchanged::ParentChangedEvent;
use crate::events::reanchor::ReAnchorEvent;
use crate::events::startup::TransformStartupEvent;
use crate::resources::collaborators::Collaborators;
use crate::resources::lifecycle::DeletionQueue;
use crate::resources::mapindex::MapDirectory;
use crate::resources::netmap::NetIdMap;
use crate::resources::replication::{ReplicationSet, SyncPhase, SyncSettings};
use crate::resources::snapindex::SnapCells;

/// Insert every resource and message buffer the transform systems use.
///
/// Safe to call on a world that already has some of them; existing
/// resources are replaced with defaults, so call it before anything else.
pub fn setup_world(world: &mut World) {
    world.insert_resource(Messages::<MoveEvent>::default());
    world.insert_resource(Messages::<ParentChangedEvent>::default());
    world.insert_resource(Messages::<AnchorStateEvent>::default());
    world.insert_resource(Messages::<ReAnchorEvent>::default());
    world.insert_resource(Messages::<TransformStartupEvent>::default());

    world.insert_resource(Collaborators::default());
    world.insert_resource(SnapCells::default());
    world.insert_resource(NetIdMap::default());
    world.insert_resource(MapDirectory::default());
    world.insert_resource(ReplicationSet::default());
    world.insert_resource(SyncPhase::default());
    world.insert_resource(SyncSettings::default());
    world.insert_resource(DeletionQueue::default());
}

/// Advance the move message buffer; run once per tick.
pub fn update_move_messages(mut messages: ResMut<Messages<MoveEvent>>) {
    messages.update();
}

/// Advance the parent-changed message buffer; run once per tick.
pub fn update_parent_changed_messages(mut messages: ResMut<Messages<ParentChangedEvent>>) {
    messages.update();
}

/// Advance the anchor-state message buffer; run once per tick.
pub fn update_anchor_state_messages(mut messages: ResMut<Messages<AnchorStateEvent>>) {
    messages.update();
}

/// Advance the re-anchor message buffer; run once per tick.
pub fn update_reanchor_messages(mut messages: ResMut<Messages<ReAnchorEvent>>) {
    messages.update();
}

/// Advance the startup message buffer; run once per tick.
pub fn update_startup_messages(mut messages: ResMut<Messages<TransformStartupEvent>>) {
    messages.update();
}

/// Register all five buffer-advance systems on a schedule.
pub fn add_flush_systems(schedule: &mut Schedule) {
    schedule.add_systems((
        update_move_messages,
        update_parent_changed_messages,
        update_anchor_state_messages,
        update_reanchor_messages,
        update_startup_messages,
    ));
}

/// Advance every message buffer directly, for hosts that tick a bare world
/// without a schedule.
pub fn flush_messages(world: &mut World) {
    world.resource_mut::<Messages<MoveEvent>>().update();
    world.resource_mut::<Messages<ParentChangedEvent>>().update();
    world.resource_mut::<Messages<AnchorStateEvent>>().update();
    world.resource_mut::<Messages<ReAnchorEvent>>().update();
    world
        .resource_mut::<Messages<TransformStartupEvent>>()
        .update();
}
