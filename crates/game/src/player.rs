//! Player entity and state.

use bhop_physics::{MovementEvent, MovementState, TuningParameters};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Unique identifier for entities.
pub type EntityId = u32;

/// Distance from the top of the capsule down to the eyes (cm).
const EYE_BELOW_TOP: f32 = 24.0;

/// A player in the game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// Unique player ID.
    pub id: EntityId,

    /// Player name/handle.
    pub name: String,

    /// Movement physics state.
    pub movement: MovementState,

    /// Running totals for this life.
    pub stats: RunStats,
}

/// Movement statistics accumulated from tick events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub jumps: u32,
    pub landings: u32,

    /// Highest horizontal speed seen (cm/s).
    pub top_speed: f32,

    /// Horizontal distance travelled (cm).
    pub distance: f32,

    /// Triggers touched, in order.
    pub triggers: Vec<String>,
}

impl Player {
    /// Create a new player at the given spawn position.
    pub fn new(id: EntityId, name: String, spawn_position: Vec3, tuning: &TuningParameters) -> Self {
        Self {
            id,
            name,
            movement: MovementState::new(spawn_position, tuning),
            stats: RunStats::default(),
        }
    }

    /// Get the player's current position.
    #[inline]
    pub fn position(&self) -> Vec3 {
        self.movement.position
    }

    /// Get the player's eye position (for camera). Follows the crouch.
    pub fn eye_position(&self) -> Vec3 {
        self.movement.position + Vec3::new(0.0, 0.0, self.movement.half_height() - EYE_BELOW_TOP)
    }

    /// Get the direction the player is looking.
    #[inline]
    pub fn look_direction(&self) -> Vec3 {
        self.movement.look_direction()
    }

    /// Get the player's forward direction (horizontal only).
    #[inline]
    pub fn forward_direction(&self) -> Vec3 {
        self.movement.forward_direction()
    }

    #[inline]
    pub fn horizontal_speed(&self) -> f32 {
        self.movement.horizontal_speed()
    }

    /// Check if the player is on the ground.
    #[inline]
    pub fn on_ground(&self) -> bool {
        self.movement.contact().is_grounded()
    }

    /// Check if the player is crouching.
    #[inline]
    pub fn is_crouching(&self) -> bool {
        self.movement.crouch().is_crouched()
    }

    /// Fold one tick's events and motion into the stats.
    pub fn record_tick(&mut self, previous_position: Vec3, events: &[MovementEvent]) {
        for event in events {
            match event {
                MovementEvent::Jumped => self.stats.jumps += 1,
                MovementEvent::Landed { .. } => self.stats.landings += 1,
                _ => {}
            }
        }

        let step = self.position() - previous_position;
        self.stats.distance += Vec3::new(step.x, step.y, 0.0).length();
        self.stats.top_speed = self.stats.top_speed.max(self.horizontal_speed());
    }

    /// Reset movement and stats at a new position.
    pub fn respawn(&mut self, position: Vec3, tuning: &TuningParameters) {
        let view_angles = self.movement.view_angles;
        self.movement = MovementState::new(position, tuning);
        self.movement.view_angles = view_angles;
        self.stats = RunStats::default();
    }
}
