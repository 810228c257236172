//! Transform engine systems.
//!
//! This module groups the operations over the transform tree. Mutators run
//! in the serial phase of a tick; world-space queries are read-only and may
//! fan out.
//!
//! Submodules overview
//! - [`coordinates`] – the canonical mutator and everything reducing to it
//! - [`world_query`] – on-demand world pose/matrix resolution
//! - [`anchoring`] – tile anchoring, release, and the grid-swap fast path
//! - [`lifecycle`] – spawn/init/start/terminate/despawn staging
//! - [`sync`] – wire deltas: production, draining, authoritative apply

pub mod anchoring;
pub mod coordinates;
pub mod lifecycle;
pub mod sync;
pub mod world_query;
