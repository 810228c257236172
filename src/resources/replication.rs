//! State-sync bookkeeping resources.

use bevy_ecs::prelude::{Entity, Resource};
use rustc_hash::FxHashSet;

/// Nodes whose transform state changed since the last outgoing delta batch.
///
/// Mutators and the anchoring subsystem mark in here; the sync producer
/// drains it once per network tick.
#[derive(Resource, Debug, Default)]
pub struct ReplicationSet {
    dirty: FxHashSet<Entity>,
}

impl ReplicationSet {
    pub fn mark(&mut self, entity: Entity) {
        self.dirty.insert(entity);
    }

    pub fn take(&mut self) -> FxHashSet<Entity> {
        std::mem::take(&mut self.dirty)
    }

    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.dirty.contains(&entity)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty()
    }
}

/// True only while authoritative state is being applied.
///
/// Cycle detection consults this to tell a real corruption apart from a
/// transient contradiction between predicted and authoritative trees, and
/// move notifications carry it as their replay flag.
#[derive(Resource, Debug, Default, Clone, Copy)]
pub struct SyncPhase {
    pub applying: bool,
}

/// Client-side sync tuning.
#[derive(Resource, Debug, Clone, Copy)]
pub struct SyncSettings {
    /// Seed interpolation targets from look-ahead server states.
    pub interpolation: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interpolation: true,
        }
    }
}
