//! ECS resources made available to systems.
//!
//! This module groups the long-lived data injected into the world and
//! consulted by the transform systems during execution.
//!
//! Overview
//! - `collaborators` – injected hooks for physics, broadphase, containers,
//!   and grid lookup, all defaulting to no-ops
//! - `snapindex` – per-grid tile occupancy behind the `SnapIndex` trait
//! - `netmap` – two-way map between wire ids and local entities
//! - `mapindex` – which entity hosts each map root
//! - `replication` – outgoing dirty set, applying-state flag, sync tuning
//! - `lifecycle` – entities waiting on the deferred despawn sweep

pub mod collaborators;
pub mod lifecycle;
pub mod mapindex;
pub mod netmap;
pub mod replication;
pub mod snapindex;
