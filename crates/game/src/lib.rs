//! Bunny-hop game host
//!
//! This crate wraps the movement physics in a small game host:
//!
//! - Raw input mapping to per-tick movement commands
//! - Players owning their movement state and run statistics
//! - Built-in levels (arena, bhop course) with spawn points and triggers
//! - A fixed-tick simulation loop with a time accumulator
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Game Simulation                         │
//! │  ┌─────────┐    ┌──────────────┐    ┌───────────────────┐   │
//! │  │ Player  │───►│ Movement     │───►│ Players, events,  │   │
//! │  │ Input   │    │ Simulator    │    │ triggers          │   │
//! │  └─────────┘    └──────────────┘    └───────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod input;
pub mod level;
pub mod player;
pub mod simulation;

// Re-export main types
pub use input::PlayerInput;
pub use level::Level;
pub use player::{Player, RunStats};
pub use simulation::{GameEvent, Simulation, SimulationConfig};

// Re-export physics types for convenience
pub use bhop_physics::{
    CollisionWorld, ContentFlags, MoveCommand, MovementEvent, MovementSimulator, MovementState, TuningParameters,
};
