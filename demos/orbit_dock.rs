//! End-to-end walkthrough: a station grid, a shuttle docking to it, and
//! the resulting deltas applied onto a second world.
//!
//! Run with:
//!
//! ```sh
//! RUST_LOG=debug cargo run --example orbit_dock
//! ```

use bevy_ecs::prelude::*;
use glam::{IVec2, Vec2};

use orrery::components::map::MapId;
use orrery::components::node::TransformNode;
use orrery::math::Angle;
use orrery::resources::netmap::NetIdMap;
use orrery::setup::{flush_messages, setup_world};
use orrery::systems::anchoring::{anchor, unanchor};
use orrery::systems::coordinates::set_parent;
use orrery::systems::lifecycle::{spawn_grid, spawn_map, spawn_running};
use orrery::systems::sync::{TransformState, apply_state, drain_deltas};
use orrery::systems::world_query::{world_position, world_rotation};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Authoritative world: one map, a station grid, a crate on the
    // station, and a free-flying shuttle.
    let mut server = World::new();
    setup_world(&mut server);

    let map = spawn_map(&mut server, MapId(1));
    let station = spawn_grid(&mut server, map, 1.0);
    let shuttle = spawn_running(
        &mut server,
        TransformNode::new()
            .with_parent(map)
            .with_position(Vec2::new(40.0, 12.0))
            .with_rotation(Angle::from_degrees(15.0)),
    );
    let cargo = spawn_running(
        &mut server,
        TransformNode::new()
            .with_parent(map)
            .with_position(Vec2::new(3.2, 4.9)),
    );

    log::info!(
        "shuttle starts at {:?} heading {:.1} deg",
        world_position(&server, shuttle),
        world_rotation(&server, shuttle).degrees()
    );

    // Bolt the cargo crate onto the station's deck.
    if anchor(&mut server, cargo, station, IVec2::new(3, 4)) {
        log::info!(
            "cargo anchored at tile (3, 4), world {:?}",
            world_position(&server, cargo)
        );
    }

    // The shuttle docks: it becomes part of the station's tree, keeping
    // its world pose while its coordinates become station-relative.
    set_parent(&mut server, shuttle, station).expect("docking is structurally sound");
    log::info!(
        "docked; shuttle is still at {:?} but now rides the station",
        world_position(&server, shuttle)
    );
    flush_messages(&mut server);

    // Ship the dirty set across the "wire" to a replicated world.
    let frame = drain_deltas(&mut server);
    log::info!("replicating {} transform deltas", frame.len());

    let mut client = World::new();
    setup_world(&mut client);
    let client_map = spawn_map(&mut client, MapId(1));
    let client_station = spawn_grid(&mut client, client_map, 1.0);
    let client_shuttle = spawn_running(&mut client, TransformNode::new().with_parent(client_map));
    let client_cargo = spawn_running(&mut client, TransformNode::new().with_parent(client_map));
    {
        // A real session negotiates these bindings during entity spawn.
        let server_net = server.resource::<NetIdMap>();
        let mut client_net = client.resource_mut::<NetIdMap>();
        for (server_entity, client_entity) in [
            (map, client_map),
            (station, client_station),
            (shuttle, client_shuttle),
            (cargo, client_cargo),
        ] {
            if let Some(id) = server_net.net_of(server_entity) {
                client_net.bind(id, client_entity);
            }
        }
    }
    for (id, delta) in &frame {
        if let Some(entity) = client.resource::<NetIdMap>().resolve(*id) {
            apply_state(&mut client, entity, &TransformState::new(*delta));
        }
    }
    flush_messages(&mut client);
    log::info!(
        "client shuttle: {:?} (server says {:?})",
        world_position(&client, client_shuttle),
        world_position(&server, shuttle)
    );
    log::info!(
        "client cargo anchored: {}",
        client
            .get::<TransformNode>(client_cargo)
            .map(|node| node.anchored)
            .unwrap_or(false)
    );

    // Undock and release the cargo again on the server side.
    unanchor(&mut server, cargo);
    set_parent(&mut server, shuttle, map).expect("undocking is structurally sound");
    flush_messages(&mut server);
    log::info!(
        "undocked; shuttle back on the map at {:?}",
        world_position(&server, shuttle)
    );
}
