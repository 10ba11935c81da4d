//! Bunny-hop movement physics
//!
//! A deterministic character movement simulator reproducing Source-engine
//! movement: ground acceleration, capped air control for strafe-jumping,
//! sub-stepped braking, stair stepping, crouch transitions and exact jump
//! apex detection.
//!
//! # Architecture
//!
//! The crate is split into two main systems:
//!
//! - **Collision**: the [`CollisionQuery`] capability the simulator consumes,
//!   and a parry3d-backed [`CollisionWorld`] that implements it
//! - **Movement**: the [`MovementSimulator`] and its sub-phases, which use
//!   collision queries to move a capsule through the world
//!
//! # Conventions
//!
//! 1. **Units**: centimetres and seconds, Z up
//! 2. **Position**: the capsule centre
//! 3. **Determinism**: same commands, same world, same results
//! 4. **No errors in the tick**: degenerate geometry is resolved by heuristics;
//!    only configuration loading can fail

pub mod collision;
pub mod error;
pub mod movement;
pub mod random;

// Re-export commonly used types
pub use collision::{CapsuleShape, CollisionQuery, CollisionWorld, ContentFlags, FloorResult, HitResult};
pub use error::ConfigError;
pub use movement::{
    CommandButtons, ContactMode, CrouchPhase, MoveCommand, MovementEvent, MovementSimulator, MovementState,
    TuningParameters,
};
pub use random::SeededRandom;
