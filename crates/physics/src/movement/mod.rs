//! Character movement simulation.
//!
//! This module implements Source-style bunny-hop movement with:
//!
//! - Ground acceleration, friction and sub-stepped braking
//! - Air control capped for strafe-jumping
//! - Sub-stepped falling with exact jump apex detection
//! - Multi-plane collision sliding and stair stepping
//! - Timed crouch transitions with encroachment checks
//! - Speed-scaled step height and walkable slope
//!
//! # Design
//!
//! Movement is driven by the [`MovementSimulator`], which takes one
//! [`MoveCommand`] per tick and updates the caller's [`MovementState`]
//! through a [`CollisionQuery`](crate::collision::CollisionQuery). The
//! sub-phases ([`VelocityResolver`], [`FallIntegrator`],
//! [`CrouchTransitioner`], [`GroundAdhesionPolicy`]) borrow the tuning for
//! the length of a call and can be used on their own.
//!
//! All movement is deterministic: the same commands against the same world
//! always produce the same states and events.

mod adhesion;
mod config;
mod crouch;
mod fall;
mod jump;
mod simulator;
mod slide_move;
mod state;
mod velocity;

pub use adhesion::{Adhesion, GroundAdhesionPolicy};
pub use config::{
    CrouchPivot, TuningParameters, APEX_TIME_MINIMUM, BRAKE_TO_STOP_VELOCITY, JUMP_VELOCITY, MAX_FLOOR_DIST,
    MAX_MODE_CHANGES_PER_TICK, MIN_FLOOR_DIST, MIN_TICK_TIME, VERTICAL_SLOPE_NORMAL_Z,
};
pub use crouch::{can_crouch_in, next_phase, CrouchPass, CrouchTransitioner};
pub use fall::{FallInput, FallIntegrator, FallOutcome};
pub use jump::{apply_jump_velocity, can_attempt_jump, JumpState};
pub use simulator::MovementSimulator;
pub use slide_move::SlideMover;
pub use state::{
    BrakingWindow, CachedFloorInfo, CommandButtons, ContactMode, CrouchPhase, MoveCommand, MovementEvent,
    MovementState,
};
pub use velocity::{SpeedFlags, VelocityInput, VelocityResolver};
