//! Movement tuning parameters.
//!
//! Everything a designer can tweak lives in [`TuningParameters`]; the fixed
//! numerical tolerances of the integrator are module constants.
//!
//! Units are centimetres and seconds, Z up.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Ticks shorter than this are ignored.
pub const MIN_TICK_TIME: f32 = 1.0e-6;

/// Speeds below this are snapped to zero while braking (cm/s).
pub const BRAKE_TO_STOP_VELOCITY: f32 = 10.0;

/// Ground velocity component above which the body is launched off a ramp (cm/s).
pub const JUMP_VELOCITY: f32 = 266.7;

/// Normals with |z| at or below this are vertical walls.
pub const VERTICAL_SLOPE_NORMAL_Z: f32 = 0.001;

/// Shortest apex split the fall integrator will perform (s).
pub const APEX_TIME_MINIMUM: f32 = 1.0e-4;

/// Preferred gap between the capsule base and the floor (cm).
pub const MIN_FLOOR_DIST: f32 = 1.9;
pub const MAX_FLOOR_DIST: f32 = 2.4;

/// Hard limit on movement mode hand-offs within one tick.
pub const MAX_MODE_CHANGES_PER_TICK: usize = 4;

/// Which part of the capsule stays put while it changes height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrouchPivot {
    /// Feet stay where they are, centre moves.
    KeepBase,
    /// Crouching pulls the feet up toward the head; standing grows around the centre.
    TuckLegs,
}

/// Tuning for the movement simulator.
///
/// Defaults reproduce classic Source bunny-hop feel at engine scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningParameters {
    // ========================================================================
    // Capsule
    // ========================================================================
    /// Capsule radius (cm).
    pub capsule_radius: f32,

    /// Standing capsule half-height, centre to tip (cm).
    pub standing_half_height: f32,

    /// Crouched capsule half-height (cm).
    pub crouched_half_height: f32,

    /// Pivot used when resizing on the ground.
    pub crouch_pivot_grounded: CrouchPivot,

    /// Pivot used when resizing in the air.
    pub crouch_pivot_airborne: CrouchPivot,

    // ========================================================================
    // Speeds (cm/s)
    // ========================================================================
    pub walk_speed: f32,
    pub run_speed: f32,
    pub sprint_speed: f32,

    /// Fraction of `run_speed` used while crouched.
    pub crouched_speed_multiplier: f32,

    /// Floor for analog-scaled max speed.
    pub min_analog_walk_speed: f32,

    /// Per-axis horizontal speed cap, also applied to Z.
    pub axis_speed_limit: f32,

    // ========================================================================
    // Acceleration
    // ========================================================================
    /// Input acceleration magnitude (cm/s²).
    pub max_acceleration: f32,

    /// Multiplier on input acceleration while on the ground.
    pub ground_accelerate_multiplier: f32,

    /// Multiplier on input acceleration while airborne.
    pub air_accelerate_multiplier: f32,

    /// Horizontal wish speed cap while airborne (cm/s).
    pub air_speed_cap: f32,

    /// Always accelerate at `max_acceleration` regardless of input magnitude.
    pub force_max_acceleration: bool,

    // ========================================================================
    // Friction and braking
    // ========================================================================
    pub ground_friction: f32,

    /// Friction used instead of `ground_friction` when there is no input.
    pub ground_braking_deceleration: f32,

    pub braking_deceleration_walking: f32,
    pub braking_deceleration_falling: f32,
    pub braking_deceleration_flying: f32,
    pub braking_deceleration_swimming: f32,

    /// Lateral friction while falling.
    pub falling_lateral_friction: f32,

    /// Fluid friction used while swimming.
    pub fluid_friction: f32,

    /// Scales friction inside braking.
    pub braking_friction_factor: f32,

    /// Braking sub-step length (s), clamped to [1/75, 1/20].
    pub braking_sub_step_time: f32,

    /// Time after landing during which braking is withheld (ms).
    pub braking_window_ms: f32,

    // ========================================================================
    // Jumping and gravity
    // ========================================================================
    /// Vertical launch velocity of a jump (cm/s).
    pub jump_z_velocity: f32,

    /// Gravity along Z (cm/s², negative is down).
    pub gravity_z: f32,

    /// Maximum downward speed (cm/s).
    pub terminal_velocity: f32,

    /// How long holding jump keeps applying jump force (s). 0 disables.
    pub jump_max_hold_time: f32,

    /// Whether gravity still acts while jump force is held.
    pub apply_gravity_while_jumping: bool,

    /// Holding jump re-jumps on every landing.
    pub auto_bunny_hop: bool,

    /// Jumps allowed before touching the ground again.
    pub jump_max_count: u32,

    /// Limit air control when an impact would push back into the wall.
    pub limit_air_control_on_impact: bool,

    /// Fraction of the slide that is reflected on impact while falling.
    pub bounce_multiplier: f32,

    // ========================================================================
    // Crouching (s)
    // ========================================================================
    pub crouch_time: f32,
    pub crouch_jump_time: f32,
    pub uncrouch_time: f32,
    pub uncrouch_jump_time: f32,

    /// Portion of the remaining height checked before starting a grounded uncrouch.
    pub ground_uncrouch_check_factor: f32,

    // ========================================================================
    // Ground adhesion
    // ========================================================================
    pub max_step_height: f32,
    pub min_step_height: f32,

    /// Cosine of the steepest walkable slope.
    pub walkable_floor_z: f32,

    /// Walkable cosine reached at `speed_mult_max`.
    pub slide_walkable_floor_z: f32,

    /// Speed where adhesion starts to loosen (cm/s).
    pub speed_mult_min: f32,

    /// Speed where adhesion is loosest (cm/s).
    pub speed_mult_max: f32,

    /// Floor checks treat the capsule base as flat.
    pub flat_base_floor_checks: bool,

    /// Extra reach of the airborne ground trace (cm).
    pub ground_trace_distance: f32,

    /// Edge distance below which the body counts as perched (cm). 0 disables
    /// perching, and with it the ditch escape kick.
    pub perch_radius_threshold: f32,

    // ========================================================================
    // Simulation
    // ========================================================================
    /// Sub-steps per fall integration.
    pub max_simulation_iterations: u32,

    /// Longest fall sub-step (s).
    pub max_simulation_time_step: f32,

    /// Apex splits allowed per fall integration.
    pub max_jump_apex_attempts: u32,

    /// Longest tick accepted by the simulator (s).
    pub max_delta_time: f32,

    // ========================================================================
    // View and debug
    // ========================================================================
    /// Camera roll at full strafe speed (degrees). 0 disables.
    pub roll_angle: f32,

    /// Strafe speed at which roll reaches `roll_angle` (cm/s).
    pub roll_speed: f32,

    /// Log position, view and speed every tick.
    pub show_pos: bool,
}

impl Default for TuningParameters {
    fn default() -> Self {
        let sprint_speed = 609.6;
        Self {
            capsule_radius: 34.0,
            standing_half_height: 88.0,
            crouched_half_height: 55.0,
            crouch_pivot_grounded: CrouchPivot::KeepBase,
            crouch_pivot_airborne: CrouchPivot::TuckLegs,

            walk_speed: 285.75,
            run_speed: 361.9,
            sprint_speed,
            crouched_speed_multiplier: 0.3333,
            min_analog_walk_speed: 0.0,
            axis_speed_limit: 6667.5,

            max_acceleration: 857.25,
            ground_accelerate_multiplier: 10.0,
            air_accelerate_multiplier: 10.0,
            air_speed_cap: 57.15,
            force_max_acceleration: false,

            ground_friction: 4.0,
            ground_braking_deceleration: 15.0,
            braking_deceleration_walking: 190.5,
            braking_deceleration_falling: 0.0,
            braking_deceleration_flying: 190.5,
            braking_deceleration_swimming: 190.5,
            falling_lateral_friction: 0.0,
            fluid_friction: 0.3,
            braking_friction_factor: 1.0,
            braking_sub_step_time: 0.015,
            braking_window_ms: 15.0,

            jump_z_velocity: 304.8,
            gravity_z: -1143.0,
            terminal_velocity: 4000.0,
            jump_max_hold_time: 0.0,
            apply_gravity_while_jumping: true,
            auto_bunny_hop: true,
            jump_max_count: 1,
            limit_air_control_on_impact: false,
            bounce_multiplier: 0.0,

            crouch_time: 0.4,
            crouch_jump_time: 0.1,
            uncrouch_time: 0.2,
            uncrouch_jump_time: 0.2,
            ground_uncrouch_check_factor: 0.75,

            max_step_height: 34.29,
            min_step_height: 10.0,
            walkable_floor_z: 0.7,
            slide_walkable_floor_z: 0.9848,
            speed_mult_min: sprint_speed * 1.7,
            speed_mult_max: sprint_speed * 2.5,
            flat_base_floor_checks: true,
            ground_trace_distance: 100_000.0,
            perch_radius_threshold: 0.0,

            max_simulation_iterations: 1,
            max_simulation_time_step: 0.5,
            max_jump_apex_attempts: 2,
            max_delta_time: 0.1,

            roll_angle: 0.0,
            roll_speed: 0.0,
            show_pos: false,
        }
    }
}

impl TuningParameters {
    /// Classic Source values, identical to the defaults.
    pub fn source() -> Self {
        Self::default()
    }

    /// Tighter variant for competitive movement maps.
    pub fn competitive() -> Self {
        Self {
            max_simulation_iterations: 4,
            max_simulation_time_step: 0.05,
            roll_angle: 0.0,
            crouch_time: 0.2,
            limit_air_control_on_impact: true,
            ..Default::default()
        }
    }

    /// Parse and validate tuning from JSON. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let tuning: Self = serde_json::from_str(json)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Load and validate tuning from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check the parameters are mutually consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("capsule_radius", self.capsule_radius),
            ("standing_half_height", self.standing_half_height),
            ("walk_speed", self.walk_speed),
            ("run_speed", self.run_speed),
            ("sprint_speed", self.sprint_speed),
            ("max_acceleration", self.max_acceleration),
            ("axis_speed_limit", self.axis_speed_limit),
            ("max_simulation_time_step", self.max_simulation_time_step),
            ("max_delta_time", self.max_delta_time),
        ];
        for (field, value) in positive {
            if !(value > 0.0) {
                return Err(ConfigError::invalid(field, format!("must be positive, got {value}")));
            }
        }

        let non_negative = [
            ("crouch_time", self.crouch_time),
            ("crouch_jump_time", self.crouch_jump_time),
            ("uncrouch_time", self.uncrouch_time),
            ("uncrouch_jump_time", self.uncrouch_jump_time),
            ("ground_friction", self.ground_friction),
            ("braking_window_ms", self.braking_window_ms),
            ("min_step_height", self.min_step_height),
            ("terminal_velocity", self.terminal_velocity),
            ("jump_max_hold_time", self.jump_max_hold_time),
            ("perch_radius_threshold", self.perch_radius_threshold),
        ];
        for (field, value) in non_negative {
            if !(value >= 0.0) {
                return Err(ConfigError::invalid(field, format!("must not be negative, got {value}")));
            }
        }

        if self.min_step_height > self.max_step_height {
            return Err(ConfigError::invalid(
                "min_step_height",
                format!("{} exceeds max_step_height {}", self.min_step_height, self.max_step_height),
            ));
        }
        if self.speed_mult_min >= self.speed_mult_max {
            return Err(ConfigError::invalid(
                "speed_mult_min",
                format!("{} must be below speed_mult_max {}", self.speed_mult_min, self.speed_mult_max),
            ));
        }
        if self.crouched_half_height < self.capsule_radius
            || self.crouched_half_height > self.standing_half_height
        {
            return Err(ConfigError::invalid(
                "crouched_half_height",
                format!(
                    "{} must lie between capsule_radius {} and standing_half_height {}",
                    self.crouched_half_height, self.capsule_radius, self.standing_half_height
                ),
            ));
        }
        for (field, value) in [
            ("walkable_floor_z", self.walkable_floor_z),
            ("slide_walkable_floor_z", self.slide_walkable_floor_z),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::invalid(field, format!("must be in (0, 1], got {value}")));
            }
        }
        if self.max_simulation_iterations == 0 {
            return Err(ConfigError::invalid("max_simulation_iterations", "must be at least 1"));
        }
        if self.jump_max_count == 0 {
            return Err(ConfigError::invalid("jump_max_count", "must be at least 1"));
        }

        Ok(())
    }

    /// Crouched max speed (cm/s).
    #[inline]
    pub fn crouched_speed(&self) -> f32 {
        self.run_speed * self.crouched_speed_multiplier
    }

    /// Length of the next movement sub-step given the time left in the tick.
    ///
    /// Long ticks are halved until they fit `max_simulation_time_step`; the
    /// last allowed iteration takes whatever remains.
    pub fn simulation_time_step(&self, remaining: f32, iterations: u32) -> f32 {
        let step = if remaining > self.max_simulation_time_step && iterations < self.max_simulation_iterations {
            self.max_simulation_time_step.min(remaining * 0.5)
        } else {
            remaining
        };
        step.max(MIN_TICK_TIME)
    }

    /// Braking window length in seconds.
    #[inline]
    pub fn braking_window_seconds(&self) -> f32 {
        self.braking_window_ms / 1000.0
    }
}
