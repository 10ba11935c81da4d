//! Movement state, commands and events.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::collision::{CapsuleShape, FloorResult};
use crate::random::SeededRandom;

use super::config::TuningParameters;
use super::jump::JumpState;

/// Landing grace period. While open, ground friction and braking are withheld.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BrakingWindow {
    /// Counting up since touchdown.
    Open { elapsed_ms: f32 },
    /// Normal ground braking applies.
    Elapsed,
}

/// What the body is in contact with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ContactMode {
    /// Standing on walkable floor.
    Grounded { braking: BrakingWindow },
    /// Airborne, under gravity.
    Falling,
    /// No-clip: collision ignored.
    Flying,
    /// Attached to a ladder; the host owns velocity.
    OnLadder,
    /// Inside a fluid volume.
    Swimming,
}

impl ContactMode {
    /// Grounded with a fresh braking window.
    pub fn landed() -> Self {
        Self::Grounded {
            braking: BrakingWindow::Open { elapsed_ms: 0.0 },
        }
    }

    #[inline]
    pub fn is_grounded(&self) -> bool {
        matches!(self, Self::Grounded { .. })
    }

    #[inline]
    pub fn is_falling(&self) -> bool {
        matches!(self, Self::Falling)
    }

    /// Grounded and past the landing grace period.
    #[inline]
    pub fn is_braking_ground_move(&self) -> bool {
        matches!(
            self,
            Self::Grounded {
                braking: BrakingWindow::Elapsed
            }
        )
    }

    /// Same variant, ignoring payload.
    #[inline]
    pub fn same_kind(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Grounded { .. } => "grounded",
            Self::Falling => "falling",
            Self::Flying => "flying",
            Self::OnLadder => "ladder",
            Self::Swimming => "swimming",
        }
    }
}

/// Crouch state machine. Progress runs 0.0 (standing) to 1.0 (crouched).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CrouchPhase {
    Standing,
    TransitioningToCrouch { progress: f32 },
    Crouched,
    TransitioningToStand { progress: f32 },
}

impl CrouchPhase {
    #[inline]
    pub fn progress(&self) -> f32 {
        match *self {
            Self::Standing => 0.0,
            Self::Crouched => 1.0,
            Self::TransitioningToCrouch { progress } | Self::TransitioningToStand { progress } => progress,
        }
    }

    #[inline]
    pub fn in_transition(&self) -> bool {
        matches!(
            self,
            Self::TransitioningToCrouch { .. } | Self::TransitioningToStand { .. }
        )
    }

    /// Counts as crouched for speed and capsule purposes.
    #[inline]
    pub fn is_crouched(&self) -> bool {
        matches!(self, Self::Crouched | Self::TransitioningToStand { .. })
    }
}

/// Floor info cached for the tick it was computed on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CachedFloorInfo {
    pub result: FloorResult,
    pub last_update_tick: u64,
}

impl CachedFloorInfo {
    /// Return the cached result, recomputing it first if it belongs to another tick.
    pub fn get_or_refresh(&mut self, tick: u64, compute: impl FnOnce() -> FloorResult) -> FloorResult {
        if self.last_update_tick != tick {
            self.result = compute();
            self.last_update_tick = tick;
        }
        self.result
    }
}

impl Default for CachedFloorInfo {
    fn default() -> Self {
        Self {
            result: FloorResult::default(),
            last_update_tick: 0,
        }
    }
}

/// Complete movement state of one character.
///
/// Mutated once per tick by
/// [`MovementSimulator::advance_tick`](super::MovementSimulator::advance_tick)
/// and never shared between bodies. The contact mode, crouch phase, capsule
/// height and jump latch are only writable inside the crate, so every mode
/// change goes through
/// [`MovementSimulator::set_contact_mode`](super::MovementSimulator::set_contact_mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementState {
    /// Capsule centre in world space (cm).
    pub position: Vec3,

    /// Velocity (cm/s).
    pub velocity: Vec3,

    /// Input acceleration for the current tick (cm/s²).
    pub acceleration: Vec3,

    /// View angles in radians: (pitch, yaw, roll).
    pub view_angles: Vec3,

    pub(crate) contact: ContactMode,

    pub(crate) crouch: CrouchPhase,

    /// Current capsule half-height (cm).
    pub(crate) half_height: f32,

    /// Friction multiplier of the surface underfoot.
    pub surface_friction: f32,

    /// Step height from the last adhesion update.
    pub step_height: f32,

    /// Walkable cosine from the last adhesion update.
    pub walkable_floor_z: f32,

    /// Floor found by the last ground move.
    pub current_floor: FloorResult,

    /// Ground info used for friction lookup.
    pub ground_info: CachedFloorInfo,

    pub(crate) jump: JumpState,

    /// Crouched speeds apply from the tick after becoming crouched.
    pub crouch_frame_tolerated: bool,

    /// Report the next apex crossing.
    pub notify_apex: bool,

    /// Apex refinements performed this tick.
    pub apex_attempts: u32,

    /// Seconds of jump force still to apply.
    pub jump_force_time_remaining: f32,

    /// Ticks simulated so far.
    pub tick: u64,

    /// Jitter source for ditch escapes.
    pub rng: SeededRandom,

    /// Set by the host while something else drives the body.
    pub motion_override: bool,
}

impl MovementState {
    /// Standing, falling state at `position` sized from `tuning`.
    pub fn new(position: Vec3, tuning: &TuningParameters) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            view_angles: Vec3::ZERO,
            contact: ContactMode::Falling,
            crouch: CrouchPhase::Standing,
            half_height: tuning.standing_half_height,
            surface_friction: 1.0,
            step_height: tuning.max_step_height,
            walkable_floor_z: tuning.walkable_floor_z,
            current_floor: FloorResult::none(position),
            ground_info: CachedFloorInfo::default(),
            jump: JumpState::default(),
            crouch_frame_tolerated: false,
            notify_apex: false,
            apex_attempts: 0,
            jump_force_time_remaining: 0.0,
            tick: 0,
            rng: SeededRandom::default(),
            motion_override: false,
        }
    }

    #[inline]
    pub fn contact(&self) -> ContactMode {
        self.contact
    }

    #[inline]
    pub fn crouch(&self) -> CrouchPhase {
        self.crouch
    }

    /// Current capsule half-height (cm).
    #[inline]
    pub fn half_height(&self) -> f32 {
        self.half_height
    }

    pub fn jump(&self) -> &JumpState {
        &self.jump
    }

    /// Collision capsule at the current height.
    #[inline]
    pub fn capsule(&self, radius: f32) -> CapsuleShape {
        CapsuleShape::new(radius, self.half_height)
    }

    /// Lowest point of the capsule.
    #[inline]
    pub fn base_position(&self) -> Vec3 {
        self.position - Vec3::new(0.0, 0.0, self.half_height)
    }

    #[inline]
    pub fn is_no_clip(&self) -> bool {
        matches!(self.contact, ContactMode::Flying)
    }

    /// Horizontal facing from yaw.
    pub fn forward_direction(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.view_angles.y.sin_cos();
        Vec3::new(cos_yaw, sin_yaw, 0.0)
    }

    /// Horizontal right vector from yaw.
    pub fn right_direction(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.view_angles.y.sin_cos();
        Vec3::new(-sin_yaw, cos_yaw, 0.0)
    }

    /// Full look direction including pitch.
    pub fn look_direction(&self) -> Vec3 {
        let (sin_pitch, cos_pitch) = self.view_angles.x.sin_cos();
        let (sin_yaw, cos_yaw) = self.view_angles.y.sin_cos();
        Vec3::new(cos_pitch * cos_yaw, cos_pitch * sin_yaw, sin_pitch)
    }

    pub fn horizontal_speed(&self) -> f32 {
        Vec3::new(self.velocity.x, self.velocity.y, 0.0).length()
    }
}

/// Input command for a single tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveCommand {
    /// Forward/backward axis, -1.0 to 1.0.
    pub forward_move: f32,

    /// Strafe axis, -1.0 (left) to 1.0 (right).
    pub right_move: f32,

    /// View angle delta (pitch, yaw) in radians.
    pub view_delta: (f32, f32),

    pub buttons: CommandButtons,
}

/// Button bits carried in a [`MoveCommand`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandButtons(pub u16);

impl CommandButtons {
    pub const JUMP: u16 = 1 << 0;
    pub const CROUCH: u16 = 1 << 1;
    pub const SPRINT: u16 = 1 << 2;
    pub const WALK: u16 = 1 << 3;

    #[inline]
    pub fn pressed(self, button: u16) -> bool {
        (self.0 & button) != 0
    }

    #[inline]
    pub fn press(&mut self, button: u16) {
        self.0 |= button;
    }

    #[inline]
    pub fn release(&mut self, button: u16) {
        self.0 &= !button;
    }
}

impl MoveCommand {
    #[inline]
    pub fn wants_jump(&self) -> bool {
        self.buttons.pressed(CommandButtons::JUMP)
    }

    #[inline]
    pub fn wants_crouch(&self) -> bool {
        self.buttons.pressed(CommandButtons::CROUCH)
    }

    #[inline]
    pub fn wants_sprint(&self) -> bool {
        self.buttons.pressed(CommandButtons::SPRINT)
    }

    #[inline]
    pub fn wants_walk(&self) -> bool {
        self.buttons.pressed(CommandButtons::WALK)
    }

    /// Stick deflection, 0.0 to 1.0.
    pub fn analog_magnitude(&self) -> f32 {
        (self.forward_move * self.forward_move + self.right_move * self.right_move)
            .sqrt()
            .min(1.0)
    }
}

/// Notable things that happened during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MovementEvent {
    Jumped,
    /// The held-jump force window ran out.
    JumpForceEnded,
    /// Vertical velocity crossed zero, `time_into_tick` seconds into the tick.
    ApexReached { time_into_tick: f32 },
    Landed { impact_velocity: Vec3 },
    StartCrouch,
    EndCrouch,
    CapsuleResized { half_height: f32 },
    ModeChanged { from: ContactMode, to: ContactMode },
    Impact { normal: Vec3 },
    EnteredFluid,
}
