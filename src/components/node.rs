//! The per-entity transform tree node.
//!
//! Every spatially-placed entity carries a [`TransformNode`]: a local pose
//! relative to an optional parent, non-owning back-references to children,
//! cached grid/map ancestry, and the bookkeeping flags the mutators and the
//! state-sync layer maintain. All pose surgery goes through the functions in
//! [`crate::systems::coordinates`]; the fields stay public in the engine
//! tradition, but writing them directly skips cache propagation and event
//! emission.

use bevy_ecs::prelude::{Component, Entity};
use glam::Vec2;
use rustc_hash::FxHashSet;

use crate::components::map::MapId;
use crate::math::{Angle, POSE_EPSILON};

/// Where a node is in its life.
///
/// Stages only ever move forward. [`NodeStage::Terminating`] nodes are on
/// their way out: they may still be read and detached, but can never become
/// the parent of anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeStage {
    #[default]
    Uninitialized,
    Initializing,
    Running,
    Terminating,
}

impl NodeStage {
    /// True once initialization has finished (running or terminating).
    #[must_use]
    pub fn initialized(self) -> bool {
        matches!(self, NodeStage::Running | NodeStage::Terminating)
    }

    #[must_use]
    pub fn terminating(self) -> bool {
        matches!(self, NodeStage::Terminating)
    }
}

/// A position expressed relative to a reference entity.
///
/// `parent == None` means the position is in null space (detached) or, for
/// map roots, the world origin itself. This is the coordinate payload move
/// notifications carry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityCoords {
    pub parent: Option<Entity>,
    pub position: Vec2,
}

impl EntityCoords {
    #[must_use]
    pub fn new(parent: Option<Entity>, position: Vec2) -> Self {
        Self { parent, position }
    }

    /// Detached coordinates: no reference entity, position meaningless.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            parent: None,
            position: Vec2::ZERO,
        }
    }

    /// Same reference entity and the same position within tolerance.
    #[must_use]
    pub fn approx_eq(&self, other: &Self) -> bool {
        self.parent == other.parent && self.position.abs_diff_eq(other.position, POSE_EPSILON)
    }
}

/// Spatial hierarchy node: local pose, parent link, children back-refs, and
/// the caches that make world-space queries and anchoring fast.
#[derive(Debug, Clone, Component)]
pub struct TransformNode {
    /// Position relative to the parent, or in null space when detached.
    pub local_position: Vec2,
    /// Rotation relative to the parent. Pinned to zero while
    /// [`no_local_rotation`](Self::no_local_rotation) is set.
    pub local_rotation: Angle,
    /// Parent entity. `None` for map roots and detached nodes.
    pub parent: Option<Entity>,
    /// Non-owning back-references. Invariant: `c` is in here exactly when
    /// `c.parent == Some(self)`.
    pub children: FxHashSet<Entity>,
    /// Tile-locked to the grid that is the parent.
    pub anchored: bool,
    /// Nearest grid ancestor (the node itself when it is a grid).
    pub grid: Option<Entity>,
    /// Map this node currently lives on.
    pub map_id: Option<MapId>,
    /// Ignore rotation writes; local rotation stays zero.
    pub no_local_rotation: bool,
    /// Set by every pose or parent mutation; consumers clear it after
    /// rebuilding whatever world-space products they cache.
    pub matrices_dirty: bool,
    /// Interpolation target between confirmed network states.
    pub next_position: Option<Vec2>,
    /// Interpolation target between confirmed network states.
    pub next_rotation: Option<Angle>,
    pub stage: NodeStage,
}

impl Default for TransformNode {
    fn default() -> Self {
        Self {
            local_position: Vec2::ZERO,
            local_rotation: Angle::ZERO,
            parent: None,
            children: FxHashSet::default(),
            anchored: false,
            grid: None,
            map_id: None,
            no_local_rotation: false,
            matrices_dirty: true,
            next_position: None,
            next_rotation: None,
            stage: NodeStage::Uninitialized,
        }
    }
}

impl TransformNode {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_position(mut self, position: Vec2) -> Self {
        self.local_position = position;
        self
    }

    #[must_use]
    pub fn with_rotation(mut self, rotation: Angle) -> Self {
        self.local_rotation = rotation;
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: Entity) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn with_no_local_rotation(mut self) -> Self {
        self.no_local_rotation = true;
        self
    }

    /// The node's coordinates as an [`EntityCoords`] value.
    #[must_use]
    pub fn coords(&self) -> EntityCoords {
        EntityCoords::new(self.parent, self.local_position)
    }

    /// Drop any pending interpolation targets. Called whenever the tree
    /// structure under the node changes, since the targets were expressed
    /// relative to the old parent.
    pub fn clear_lerp(&mut self) {
        self.next_position = None;
        self.next_rotation = None;
    }
}
