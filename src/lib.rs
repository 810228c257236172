//! Orrery — the spatial hierarchy engine of an entity simulation.
//!
//! Maintains a tree of per-entity transforms (local pose plus parent link),
//! resolves world-space poses on demand, anchors entities to tile grids,
//! and replicates the tree across a network boundary via compact deltas,
//! while enforcing the structural invariants (no cycles, consistent
//! grid/map membership) that the rest of the simulation leans on.
//!
//! Start with [`setup::setup_world`], spawn maps and grids through
//! [`systems::lifecycle`], and mutate through [`systems::coordinates`].

pub mod components;
pub mod events;
pub mod math;
pub mod resources;
pub mod setup;
pub mod systems;
