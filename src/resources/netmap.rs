//! Network-stable entity identity.
//!
//! `Entity` values are process-local; the wire protocol references nodes by
//! [`NetId`] instead. [`NetIdMap`] keeps the two-way association and hands
//! out fresh ids on the authoritative side.

use bevy_ecs::prelude::{Entity, Resource};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Identifier shared between peers for one logical entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NetId(pub u64);

/// Two-way map between wire ids and local entities.
#[derive(Resource, Debug, Default)]
pub struct NetIdMap {
    by_net: FxHashMap<NetId, Entity>,
    by_entity: FxHashMap<Entity, NetId>,
    next: u64,
}

impl NetIdMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id for an entity (authoritative side).
    pub fn allocate(&mut self, entity: Entity) -> NetId {
        if let Some(&existing) = self.by_entity.get(&entity) {
            return existing;
        }
        self.next += 1;
        let id = NetId(self.next);
        self.by_net.insert(id, entity);
        self.by_entity.insert(entity, id);
        id
    }

    /// Bind a received id to a local entity (replicated side).
    pub fn bind(&mut self, id: NetId, entity: Entity) {
        self.by_net.insert(id, entity);
        self.by_entity.insert(entity, id);
        self.next = self.next.max(id.0);
    }

    #[must_use]
    pub fn resolve(&self, id: NetId) -> Option<Entity> {
        self.by_net.get(&id).copied()
    }

    #[must_use]
    pub fn net_of(&self, entity: Entity) -> Option<NetId> {
        self.by_entity.get(&entity).copied()
    }

    /// Drop both directions of an association, e.g. on entity deletion.
    pub fn unbind(&mut self, entity: Entity) {
        if let Some(id) = self.by_entity.remove(&entity) {
            self.by_net.remove(&id);
        }
    }
}
