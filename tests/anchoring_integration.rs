//! Integration tests for tile anchoring: snap behavior, cell occupancy,
//! physics hook ordering, and the grid-swap fast path.
//!
//! # Usage
//!
//! ```sh
//! cargo test --test anchoring_integration
//! ```

use std::sync::{Arc, Mutex};

use bevy_ecs::message::{Message, Messages};
use bevy_ecs::prelude::*;
use glam::{IVec2, Vec2};

use orrery::components::grid::TileCoord;
use orrery::components::map::MapId;
use orrery::components::node::TransformNode;
use orrery::events::anchorstate::AnchorStateEvent;
use orrery::events::movement::MoveEvent;
use orrery::events::parentchanged::ParentChangedEvent;
use orrery::events::reanchor::ReAnchorEvent;
use orrery::resources::collaborators::{Collaborators, PhysicsHook};
use orrery::resources::snapindex::{CellIndex, SnapCells, SnapIndex};
use orrery::setup::setup_world;
use orrery::systems::anchoring::{anchor, anchor_at_current_tile, reanchor, unanchor};
use orrery::systems::coordinates::{detach_parent_to_null, set_local_position, set_parent};
use orrery::systems::lifecycle::{init_node, spawn_grid, spawn_map, spawn_node, spawn_running};
use orrery::systems::world_query::world_position;

const EPSILON: f32 = 1e-4;

fn vec_approx_eq(a: Vec2, b: Vec2) -> bool {
    a.abs_diff_eq(b, EPSILON)
}

fn new_world() -> World {
    let mut world = World::new();
    setup_world(&mut world);
    world
}

fn take_messages<M: Message>(world: &mut World) -> Vec<M> {
    world.resource_mut::<Messages<M>>().drain().collect()
}

fn occupant(world: &World, grid: Entity, tile: TileCoord) -> Option<Entity> {
    world.resource::<SnapCells>().index.occupant(grid, tile)
}

/// Physics hook double that records `body_anchored` calls in order.
struct RecordingPhysics {
    calls: Arc<Mutex<Vec<(Entity, bool)>>>,
}

impl PhysicsHook for RecordingPhysics {
    fn body_anchored(&mut self, entity: Entity, anchored: bool) {
        self.calls.lock().unwrap().push((entity, anchored));
    }
}

fn install_recording_physics(world: &mut World) -> Arc<Mutex<Vec<(Entity, bool)>>> {
    let calls = Arc::new(Mutex::new(Vec::new()));
    world.resource_mut::<Collaborators>().physics = Box::new(RecordingPhysics {
        calls: Arc::clone(&calls),
    });
    calls
}

/// Snap index double that counts removals on top of the stock behavior.
struct CountingIndex {
    inner: CellIndex,
    removes: Arc<Mutex<Vec<(Entity, TileCoord, Entity)>>>,
}

impl SnapIndex for CountingIndex {
    fn insert(&mut self, grid: Entity, tile: TileCoord, entity: Entity) -> bool {
        self.inner.insert(grid, tile, entity)
    }

    fn remove(&mut self, grid: Entity, tile: TileCoord, entity: Entity) -> bool {
        self.removes.lock().unwrap().push((grid, tile, entity));
        self.inner.remove(grid, tile, entity)
    }

    fn occupant(&self, grid: Entity, tile: TileCoord) -> Option<Entity> {
        self.inner.occupant(grid, tile)
    }
}

fn install_counting_index(world: &mut World) -> Arc<Mutex<Vec<(Entity, TileCoord, Entity)>>> {
    let removes = Arc::new(Mutex::new(Vec::new()));
    world.resource_mut::<SnapCells>().index = Box::new(CountingIndex {
        inner: CellIndex::new(),
        removes: Arc::clone(&removes),
    });
    removes
}

/// Map, one grid of `tile_size` on it, and a loose node at `position`.
fn grid_fixture(world: &mut World, tile_size: f32, position: Vec2) -> (Entity, Entity, Entity) {
    let map = spawn_map(world, MapId(1));
    let grid = spawn_grid(world, map, tile_size);
    let node = spawn_running(
        world,
        TransformNode::new().with_parent(map).with_position(position),
    );
    (map, grid, node)
}

// =============================================================================
// ANCHOR / UNANCHOR
// =============================================================================

#[test]
fn anchor_snaps_to_the_tile_center() {
    let mut world = new_world();
    let (_map, grid, node) = grid_fixture(&mut world, 2.0, Vec2::new(0.3, 0.9));

    assert!(anchor(&mut world, node, grid, IVec2::new(2, 3)));

    let state = world.get::<TransformNode>(node).unwrap();
    assert!(state.anchored);
    assert_eq!(state.parent, Some(grid));
    assert!(
        vec_approx_eq(state.local_position, Vec2::new(5.0, 7.0)),
        "tile (2,3) at size 2 centers on (5, 7), got {:?}",
        state.local_position
    );
    assert_eq!(occupant(&world, grid, IVec2::new(2, 3)), Some(node));
}

#[test]
fn anchor_respects_the_grid_world_offset() {
    let mut world = new_world();
    let (_map, grid, node) = grid_fixture(&mut world, 1.0, Vec2::ZERO);
    set_local_position(&mut world, grid, Vec2::new(10.0, 0.0));

    assert!(anchor(&mut world, node, grid, IVec2::new(2, 3)));

    assert!(vec_approx_eq(
        world.get::<TransformNode>(node).unwrap().local_position,
        Vec2::new(2.5, 3.5)
    ));
    assert!(
        vec_approx_eq(world_position(&world, node), Vec2::new(12.5, 3.5)),
        "world position must include the grid offset, got {:?}",
        world_position(&world, node)
    );
}

#[test]
fn occupied_cell_rejects_the_second_anchor() {
    let mut world = new_world();
    let (map, grid, first) = grid_fixture(&mut world, 1.0, Vec2::ZERO);
    let second = spawn_running(
        &mut world,
        TransformNode::new().with_parent(map).with_position(Vec2::new(4.0, 4.0)),
    );
    assert!(anchor(&mut world, first, grid, IVec2::ZERO));
    take_messages::<AnchorStateEvent>(&mut world);
    take_messages::<MoveEvent>(&mut world);

    assert!(!anchor(&mut world, second, grid, IVec2::ZERO));

    let state = world.get::<TransformNode>(second).unwrap();
    assert!(!state.anchored, "rejected anchor must not set the flag");
    assert_eq!(state.parent, Some(map), "rejected anchor must not reparent");
    assert!(vec_approx_eq(state.local_position, Vec2::new(4.0, 4.0)));
    assert_eq!(occupant(&world, grid, IVec2::ZERO), Some(first));
    assert!(take_messages::<AnchorStateEvent>(&mut world).is_empty());
    assert!(take_messages::<MoveEvent>(&mut world).is_empty());
}

#[test]
fn unanchor_releases_the_cell_but_not_the_pose() {
    let mut world = new_world();
    let (_map, grid, node) = grid_fixture(&mut world, 1.0, Vec2::new(0.2, 0.2));
    assert!(anchor(&mut world, node, grid, IVec2::new(1, 1)));
    take_messages::<AnchorStateEvent>(&mut world);

    unanchor(&mut world, node);

    let state = world.get::<TransformNode>(node).unwrap();
    assert!(!state.anchored);
    assert_eq!(state.parent, Some(grid), "unanchor must not reparent");
    assert!(
        vec_approx_eq(state.local_position, Vec2::new(1.5, 1.5)),
        "unanchor must leave the node where it sat"
    );
    assert_eq!(occupant(&world, grid, IVec2::new(1, 1)), None);

    let events = take_messages::<AnchorStateEvent>(&mut world);
    assert_eq!(events.len(), 1);
    assert!(!events[0].anchored);
    assert!(!events[0].detaching);

    // Releasing again changes nothing.
    unanchor(&mut world, node);
    assert!(take_messages::<AnchorStateEvent>(&mut world).is_empty());
}

#[test]
fn anchor_then_unanchor_returns_the_node_unmoved() {
    let mut world = new_world();
    // Pre-placed on the canonical coordinate of tile (1, 0).
    let (_map, grid, node) = grid_fixture(&mut world, 1.0, Vec2::new(1.5, 0.5));
    let removes = install_counting_index(&mut world);
    let before = world.get::<TransformNode>(node).unwrap().local_position;

    assert!(anchor(&mut world, node, grid, IVec2::new(1, 0)));
    unanchor(&mut world, node);

    assert!(
        vec_approx_eq(
            world.get::<TransformNode>(node).unwrap().local_position,
            before
        ),
        "anchor then unanchor must return the node to where it started"
    );
    assert_eq!(
        removes.lock().unwrap().len(),
        1,
        "the cell entry must be removed exactly once"
    );
    assert_eq!(removes.lock().unwrap()[0], (grid, IVec2::new(1, 0), node));
}

#[test]
fn physics_body_follows_the_anchor_flag() {
    let mut world = new_world();
    let (_map, grid, node) = grid_fixture(&mut world, 1.0, Vec2::ZERO);
    let calls = install_recording_physics(&mut world);

    assert!(anchor(&mut world, node, grid, IVec2::new(0, 1)));
    assert_eq!(
        *calls.lock().unwrap(),
        vec![(node, true)],
        "anchoring must freeze the body exactly once"
    );

    unanchor(&mut world, node);
    assert_eq!(*calls.lock().unwrap(), vec![(node, true), (node, false)]);
}

#[test]
fn anchor_rolls_back_when_the_snap_move_is_rejected() {
    let mut world = new_world();
    let map = spawn_map(&mut world, MapId(1));
    let holder = spawn_running(&mut world, TransformNode::new().with_parent(map));
    let grid = spawn_grid(&mut world, map, 1.0);
    // A grid *below* the candidate makes the snap reparent a cycle.
    set_parent(&mut world, grid, holder).unwrap();
    let calls = install_recording_physics(&mut world);

    assert!(!anchor(&mut world, holder, grid, IVec2::ZERO));

    let state = world.get::<TransformNode>(holder).unwrap();
    assert!(!state.anchored, "failed anchor must clear the flag again");
    assert_eq!(state.parent, Some(map), "failed anchor must not reparent");
    assert_eq!(
        occupant(&world, grid, IVec2::ZERO),
        None,
        "failed anchor must vacate the claimed cell"
    );
    assert_eq!(
        *calls.lock().unwrap(),
        vec![(holder, true), (holder, false)],
        "rollback must restore the body state it changed"
    );
}

#[test]
fn anchor_state_messages_require_a_running_node() {
    let mut world = new_world();
    let map = spawn_map(&mut world, MapId(1));
    let grid = spawn_grid(&mut world, map, 1.0);
    let node = spawn_node(&mut world, TransformNode::new().with_parent(map));
    init_node(&mut world, node);
    take_messages::<AnchorStateEvent>(&mut world);

    assert!(anchor(&mut world, node, grid, IVec2::new(3, 3)));

    assert!(world.get::<TransformNode>(node).unwrap().anchored);
    assert!(
        take_messages::<AnchorStateEvent>(&mut world).is_empty(),
        "nodes still initializing must anchor silently"
    );
}

#[test]
fn unanchor_before_initialization_leaves_the_index_alone() {
    let mut world = new_world();
    let map = spawn_map(&mut world, MapId(1));
    let grid = spawn_grid(&mut world, map, 1.0);
    let tile = IVec2::new(0, 2);

    // A map loader restores the anchored flag and the grid's cell entries
    // itself; the node has not initialized yet.
    let node = spawn_node(
        &mut world,
        TransformNode::new().with_parent(grid).with_position(Vec2::new(0.5, 2.5)),
    );
    world
        .resource_mut::<SnapCells>()
        .index
        .insert(grid, tile, node);
    {
        let mut state = world.get_mut::<TransformNode>(node).unwrap();
        state.anchored = true;
        state.grid = Some(grid);
    }

    unanchor(&mut world, node);

    assert!(!world.get::<TransformNode>(node).unwrap().anchored);
    assert_eq!(
        occupant(&world, grid, tile),
        Some(node),
        "the loader owns cell entries until the node initializes"
    );
    assert!(take_messages::<AnchorStateEvent>(&mut world).is_empty());
}

#[test]
fn unanchor_survives_a_vanished_grid() {
    let mut world = new_world();
    let (_map, grid, node) = grid_fixture(&mut world, 1.0, Vec2::ZERO);
    assert!(anchor(&mut world, node, grid, IVec2::ZERO));
    take_messages::<AnchorStateEvent>(&mut world);

    // Raw despawn models a grid lost without orderly teardown.
    world.despawn(grid);
    unanchor(&mut world, node);

    assert!(!world.get::<TransformNode>(node).unwrap().anchored);
    let events = take_messages::<AnchorStateEvent>(&mut world);
    assert_eq!(events.len(), 1, "release must still be announced");
}

#[test]
fn detaching_release_skips_physics_and_flags_the_message() {
    let mut world = new_world();
    let (_map, grid, node) = grid_fixture(&mut world, 1.0, Vec2::ZERO);
    assert!(anchor(&mut world, node, grid, IVec2::new(1, 0)));
    let calls = install_recording_physics(&mut world);
    take_messages::<AnchorStateEvent>(&mut world);

    detach_parent_to_null(&mut world, node);

    let state = world.get::<TransformNode>(node).unwrap();
    assert!(!state.anchored);
    assert_eq!(state.parent, None);
    assert_eq!(occupant(&world, grid, IVec2::new(1, 0)), None);
    assert!(
        calls.lock().unwrap().is_empty(),
        "a body leaving the world must not be restored to dynamic"
    );

    let events = take_messages::<AnchorStateEvent>(&mut world);
    assert_eq!(events.len(), 1);
    assert!(events[0].detaching, "consumers must see this as a detach");
}

// =============================================================================
// TILE SELECTION
// =============================================================================

#[test]
fn anchor_at_current_tile_picks_the_tile_underfoot() {
    let mut world = new_world();
    let (_map, grid, node) = grid_fixture(&mut world, 2.0, Vec2::new(3.2, -0.5));

    assert!(anchor_at_current_tile(&mut world, node, grid));

    assert_eq!(occupant(&world, grid, IVec2::new(1, -1)), Some(node));
    assert!(
        vec_approx_eq(
            world.get::<TransformNode>(node).unwrap().local_position,
            Vec2::new(3.0, -1.0)
        ),
        "(3.2, -0.5) on a size-2 grid snaps to the center of tile (1, -1)"
    );
}

// =============================================================================
// GRID SWAP
// =============================================================================

#[test]
fn reanchor_moves_the_cell_and_preserves_the_tile_offset() {
    let mut world = new_world();
    let map = spawn_map(&mut world, MapId(1));
    let grid_a = spawn_grid(&mut world, map, 1.0);
    let grid_b = spawn_grid(&mut world, map, 1.0);
    let node = spawn_running(&mut world, TransformNode::new().with_parent(map));
    assert!(anchor(&mut world, node, grid_a, IVec2::new(1, 1)));

    // Splitting tools keep sub-tile placement; model a nudged pose.
    world.get_mut::<TransformNode>(node).unwrap().local_position = Vec2::new(1.7, 1.5);
    take_messages::<AnchorStateEvent>(&mut world);
    take_messages::<ParentChangedEvent>(&mut world);
    take_messages::<MoveEvent>(&mut world);

    reanchor(&mut world, node, grid_b, IVec2::new(4, -2));

    let state = world.get::<TransformNode>(node).unwrap();
    assert_eq!(state.parent, Some(grid_b));
    assert_eq!(state.grid, Some(grid_b), "grid cache must follow the swap");
    assert!(state.anchored, "the node never stops being anchored");
    assert!(
        vec_approx_eq(state.local_position, Vec2::new(4.7, -1.5)),
        "offset from the tile center must carry over, got {:?}",
        state.local_position
    );
    assert_eq!(occupant(&world, grid_a, IVec2::new(1, 1)), None);
    assert_eq!(occupant(&world, grid_b, IVec2::new(4, -2)), Some(node));

    let swaps = take_messages::<ReAnchorEvent>(&mut world);
    assert_eq!(swaps.len(), 1);
    assert_eq!(swaps[0].old_grid, grid_a);
    assert_eq!(swaps[0].new_grid, grid_b);
    assert_eq!(swaps[0].tile, IVec2::new(4, -2));

    let parent_changes = take_messages::<ParentChangedEvent>(&mut world);
    assert_eq!(parent_changes.len(), 1);
    assert_eq!(parent_changes[0].old_parent, Some(grid_a));

    assert_eq!(take_messages::<MoveEvent>(&mut world).len(), 1);
    assert!(
        take_messages::<AnchorStateEvent>(&mut world).is_empty(),
        "a grid swap is not an anchoring transition"
    );
}
