//! Deferred entity deletion.

use bevy_ecs::prelude::{Entity, Resource};

/// Entities condemned mid-tick, despawned at the next safe point.
///
/// Mutators that discover a corrupt node (self-parenting) mark it
/// terminating and park it here rather than despawning under their own
/// feet; [`crate::systems::lifecycle::process_deletions`] drains it.
#[derive(Resource, Debug, Default)]
pub struct DeletionQueue {
    pending: Vec<Entity>,
}

impl DeletionQueue {
    pub fn push(&mut self, entity: Entity) {
        if !self.pending.contains(&entity) {
            self.pending.push(entity);
        }
    }

    pub fn take(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.pending)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
