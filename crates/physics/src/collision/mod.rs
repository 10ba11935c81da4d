//! Collision queries for the movement capsule.
//!
//! # Key Types
//!
//! - [`CollisionQuery`]: the capability the movement simulator consumes
//! - [`HitResult`] / [`FloorResult`]: answers to sweeps and floor probes
//! - [`CollisionWorld`]: a parry3d-backed implementation over static brushes
//!
//! Positions passed to every query are capsule centres. The capsule is
//! always Z-aligned, so orientation never enters a query.

mod flags;
mod query;
mod world;

pub use flags::ContentFlags;
pub use query::{
    CapsuleShape, CollisionQuery, FloorResult, HitResult, SurfaceMaterial, KINDA_SMALL_NUMBER,
    SWEEP_EDGE_REJECT_DISTANCE,
};
pub use world::{BrushId, CollisionBrush, CollisionWorld};
