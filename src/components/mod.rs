//! ECS components for spatially-placed entities.
//!
//! Submodules overview:
//! - [`node`] – the transform tree node: local pose, parent link, children,
//!   anchoring flag, grid/map caches, and sync bookkeeping
//! - [`map`] – map root marker and stable map identifier
//! - [`grid`] – tile grid marker and tile geometry

pub mod grid;
pub mod map;
pub mod node;
