//! Player input handling.
//!
//! This module converts raw input (keyboard, mouse, gamepad) into the
//! per-tick [`MoveCommand`] consumed by the movement simulator.

use bhop_physics::movement::{CommandButtons, MoveCommand};
use serde::{Deserialize, Serialize};

/// Mouse pixels to radians at sensitivity 1.0.
const MOUSE_RADIANS_PER_PIXEL: f32 = 0.001;

/// Stick deflection below this is treated as centred.
const STICK_DEAD_ZONE: f32 = 0.1;

/// Raw player input for a single tick.
///
/// This is the input format collected by the host. It gets converted to
/// [`MoveCommand`] for the simulator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerInput {
    /// Movement keys pressed.
    pub movement: MovementInput,

    /// Analog stick (right, forward), each -1.0 to 1.0. Used when no key is held.
    pub stick: (f32, f32),

    /// Mouse delta this tick (pixels).
    pub mouse_delta: (f32, f32),

    /// Action buttons pressed.
    pub actions: ActionInput,

    /// Tick number this input was generated for.
    pub frame: u32,
}

/// Movement key states.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MovementInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

/// Action button states.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ActionInput {
    pub jump: bool,
    pub crouch: bool,
    pub sprint: bool,
    pub walk: bool,
}

impl PlayerInput {
    /// Convert to a movement command.
    ///
    /// # Arguments
    ///
    /// * `mouse_sensitivity` - Mouse sensitivity multiplier
    pub fn to_command(&self, mouse_sensitivity: f32) -> MoveCommand {
        let mut cmd = MoveCommand::default();

        if self.has_movement() {
            if self.movement.forward {
                cmd.forward_move += 1.0;
            }
            if self.movement.backward {
                cmd.forward_move -= 1.0;
            }
            if self.movement.right {
                cmd.right_move += 1.0;
            }
            if self.movement.left {
                cmd.right_move -= 1.0;
            }
        } else {
            let (right, forward) = self.stick;
            if right.abs() > STICK_DEAD_ZONE {
                cmd.right_move = right.clamp(-1.0, 1.0);
            }
            if forward.abs() > STICK_DEAD_ZONE {
                cmd.forward_move = forward.clamp(-1.0, 1.0);
            }
        }

        // Normalize diagonal movement
        let move_magnitude = (cmd.forward_move.powi(2) + cmd.right_move.powi(2)).sqrt();
        if move_magnitude > 1.0 {
            cmd.forward_move /= move_magnitude;
            cmd.right_move /= move_magnitude;
        }

        // Mouse right turns right (yaw up), mouse down looks down (pitch down).
        let sensitivity_radians = mouse_sensitivity * MOUSE_RADIANS_PER_PIXEL;
        cmd.view_delta = (
            -self.mouse_delta.1 * sensitivity_radians,
            self.mouse_delta.0 * sensitivity_radians,
        );

        if self.actions.jump {
            cmd.buttons.press(CommandButtons::JUMP);
        }
        if self.actions.crouch {
            cmd.buttons.press(CommandButtons::CROUCH);
        }
        if self.actions.sprint {
            cmd.buttons.press(CommandButtons::SPRINT);
        }
        if self.actions.walk {
            cmd.buttons.press(CommandButtons::WALK);
        }

        cmd
    }

    /// Check if any movement key is held.
    pub fn has_movement(&self) -> bool {
        self.movement.forward || self.movement.backward || self.movement.left || self.movement.right
    }
}
