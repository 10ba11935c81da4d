//! Velocity resolution: acceleration, friction, braking and speed caps.
//!
//! Everything here is a pure function of its inputs and the tuning. The
//! simulator decides which friction and braking deceleration apply for the
//! current contact mode and passes them in.

use glam::Vec3;

use super::config::{TuningParameters, BRAKE_TO_STOP_VELOCITY, MIN_TICK_TIME};
use super::state::{ContactMode, MovementState};
use crate::collision::KINDA_SMALL_NUMBER;

const SMALL_NUMBER: f32 = 1.0e-8;

/// Per-component threshold below which braking is skipped.
const BRAKING_NEARLY_ZERO: f32 = 0.1;

/// Inputs to the max speed rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpeedFlags {
    pub no_clip: bool,
    pub sprinting: bool,
    pub walking: bool,
    pub crouched: bool,
    /// Crouched since at least the previous tick.
    pub crouch_tolerated: bool,
}

/// Snapshot of the body used to resolve velocity.
#[derive(Debug, Clone, Copy)]
pub struct VelocityInput {
    pub velocity: Vec3,
    pub acceleration: Vec3,
    pub contact: ContactMode,
    pub speed: SpeedFlags,
    pub surface_friction: f32,
    /// Stick deflection, 0.0 to 1.0.
    pub analog_modifier: f32,
    /// Horizontal facing of the body.
    pub facing: Vec3,
    /// Full view direction including pitch.
    pub look: Vec3,
    pub motion_override: bool,
}

impl VelocityInput {
    /// Snapshot of `state` with the given speed flags and stick deflection.
    pub fn from_state(state: &MovementState, speed: SpeedFlags, analog_modifier: f32) -> Self {
        Self {
            velocity: state.velocity,
            acceleration: state.acceleration,
            contact: state.contact,
            speed,
            surface_friction: state.surface_friction,
            analog_modifier,
            facing: state.forward_direction(),
            look: state.look_direction(),
            motion_override: state.motion_override,
        }
    }
}

/// Resolves one tick of velocity change.
#[derive(Debug, Clone, Copy)]
pub struct VelocityResolver<'a> {
    tuning: &'a TuningParameters,
}

impl<'a> VelocityResolver<'a> {
    pub fn new(tuning: &'a TuningParameters) -> Self {
        Self { tuning }
    }

    /// Max speed for the current stance and buttons.
    pub fn max_speed(&self, flags: SpeedFlags) -> f32 {
        let t = self.tuning;
        if flags.no_clip {
            return 1.5 * if flags.sprinting { t.sprint_speed } else { t.walk_speed };
        }
        let crouched = flags.crouched && flags.crouch_tolerated;
        if flags.sprinting {
            if crouched {
                t.crouched_speed() * 1.7
            } else {
                t.sprint_speed
            }
        } else if flags.walking {
            t.walk_speed
        } else if crouched {
            t.crouched_speed()
        } else {
            t.run_speed
        }
    }

    /// New velocity after one tick of acceleration, friction and clamping.
    pub fn resolve_velocity(
        &self,
        input: &VelocityInput,
        delta_time: f32,
        friction: f32,
        is_fluid: bool,
        braking_deceleration: f32,
    ) -> Vec3 {
        let mut velocity = input.velocity;
        if delta_time < MIN_TICK_TIME || input.motion_override {
            return velocity;
        }

        let t = self.tuning;
        let friction = friction.max(0.0);
        let mut acceleration = input.acceleration;
        let mut analog = input.analog_modifier;

        if t.force_max_acceleration {
            acceleration = if acceleration.length_squared() > SMALL_NUMBER {
                acceleration.normalize() * t.max_acceleration
            } else if velocity.length_squared() < SMALL_NUMBER {
                input.facing * t.max_acceleration
            } else {
                velocity.normalize() * t.max_acceleration
            };
            analog = 1.0;
        }

        let max_speed = (self.max_speed(input.speed) * analog).max(t.min_analog_walk_speed);
        let zero_acceleration = is_nearly_zero(acceleration, KINDA_SMALL_NUMBER);
        let is_ground_move = input.contact.is_braking_ground_move();

        if is_ground_move {
            let over_max = velocity.length_squared() > max_speed * max_speed;
            let old_velocity = velocity;
            let braking_friction = if zero_acceleration {
                t.ground_braking_deceleration
            } else {
                friction * input.surface_friction
            };
            velocity = self.apply_velocity_braking(velocity, delta_time, braking_friction, braking_deceleration);

            // Braking alone must not drag a body that keeps pushing forward below max speed.
            if over_max
                && velocity.length_squared() < max_speed * max_speed
                && acceleration.dot(old_velocity) > 0.0
            {
                velocity = old_velocity.normalize_or_zero() * max_speed;
            }
        }

        if is_fluid {
            velocity *= 1.0 - (friction * delta_time).min(1.0);
        }

        velocity = self.clamp_axes(velocity);

        match input.contact {
            ContactMode::Flying => {
                velocity = if zero_acceleration {
                    Vec3::ZERO
                } else {
                    self.no_clip_velocity(input, acceleration)
                };
            }
            ContactMode::OnLadder => {}
            _ => {
                if !zero_acceleration {
                    let acceleration = clamp_size_2d(acceleration, max_speed);
                    let accel_dir = Vec3::new(acceleration.x, acceleration.y, 0.0).normalize_or_zero();
                    let veer = velocity.x * accel_dir.x + velocity.y * accel_dir.y;
                    let wish = if is_ground_move {
                        acceleration
                    } else {
                        clamp_size_2d(acceleration, t.air_speed_cap)
                    };
                    let add_speed = size_2d(wish) - veer;
                    if add_speed > 0.0 {
                        let multiplier = if is_ground_move {
                            t.ground_accelerate_multiplier
                        } else {
                            t.air_accelerate_multiplier
                        };
                        let gain = acceleration * multiplier * input.surface_friction * delta_time;
                        velocity += clamp_size_2d(gain, add_speed);
                    }
                }
            }
        }

        self.clamp_axes(velocity)
    }

    /// Sub-stepped friction and constant deceleration. Never reverses direction.
    pub fn apply_velocity_braking(
        &self,
        velocity: Vec3,
        delta_time: f32,
        friction: f32,
        braking_deceleration: f32,
    ) -> Vec3 {
        if is_nearly_zero(velocity, BRAKING_NEARLY_ZERO) || delta_time < MIN_TICK_TIME {
            return velocity;
        }

        let friction = (friction * self.tuning.braking_friction_factor.max(0.0)).max(0.0);
        let braking_deceleration = braking_deceleration.max(0.0);
        let zero_friction = friction == 0.0;
        let zero_braking = braking_deceleration == 0.0;
        if zero_friction && zero_braking {
            return velocity;
        }

        let old_velocity = velocity;
        let mut velocity = velocity;
        let max_time_step = self.tuning.braking_sub_step_time.clamp(1.0 / 75.0, 1.0 / 20.0);
        let rev_accel = if zero_braking {
            Vec3::ZERO
        } else {
            -braking_deceleration * velocity.normalize_or_zero()
        };

        let mut remaining = delta_time;
        while remaining >= MIN_TICK_TIME {
            let dt = if remaining > max_time_step && !zero_friction {
                max_time_step.min(remaining * 0.5)
            } else {
                remaining
            };
            remaining -= dt;

            velocity += (-friction * velocity + rev_accel) * dt;

            if velocity.dot(old_velocity) <= 0.0 {
                return Vec3::ZERO;
            }
        }

        let speed_sq = velocity.length_squared();
        if speed_sq <= KINDA_SMALL_NUMBER
            || (!zero_braking && speed_sq <= BRAKE_TO_STOP_VELOCITY * BRAKE_TO_STOP_VELOCITY)
        {
            return Vec3::ZERO;
        }
        velocity
    }

    /// Clamp X and Y to the per-axis limit.
    #[inline]
    pub fn clamp_axes(&self, mut velocity: Vec3) -> Vec3 {
        let limit = self.tuning.axis_speed_limit;
        velocity.x = velocity.x.clamp(-limit, limit);
        velocity.y = velocity.y.clamp(-limit, limit);
        velocity
    }

    /// Clamp Z to the per-axis limit.
    #[inline]
    pub fn clamp_vertical(&self, mut velocity: Vec3) -> Vec3 {
        let limit = self.tuning.axis_speed_limit;
        velocity.z = velocity.z.clamp(-limit, limit);
        velocity
    }

    fn no_clip_velocity(&self, input: &VelocityInput, acceleration: Vec3) -> Vec3 {
        let look_2d = Vec3::new(input.facing.x, input.facing.y, 0.0);
        let parallel = look_2d.dot(acceleration) * look_2d;
        let tangential = acceleration - parallel;
        let cosine = cosine_angle_2d(acceleration, input.look);
        let cap = if input.speed.sprinting {
            2.0 * self.tuning.max_acceleration
        } else {
            self.tuning.max_acceleration
        };
        clamp_to_exact_size(cosine * input.look * size_2d(parallel) + tangential, cap)
    }
}

#[inline]
pub(crate) fn size_2d(v: Vec3) -> f32 {
    (v.x * v.x + v.y * v.y).sqrt()
}

/// Scale X/Y down so their length is at most `max`, leaving Z alone.
pub(crate) fn clamp_size_2d(v: Vec3, max: f32) -> Vec3 {
    let size = size_2d(v);
    if size > max && size > SMALL_NUMBER {
        let scale = max / size;
        Vec3::new(v.x * scale, v.y * scale, v.z)
    } else {
        v
    }
}

#[inline]
pub(crate) fn is_nearly_zero(v: Vec3, tolerance: f32) -> bool {
    v.x.abs() <= tolerance && v.y.abs() <= tolerance && v.z.abs() <= tolerance
}

fn cosine_angle_2d(a: Vec3, b: Vec3) -> f32 {
    let a = Vec3::new(a.x, a.y, 0.0).normalize_or_zero();
    let b = Vec3::new(b.x, b.y, 0.0).normalize_or_zero();
    a.dot(b)
}

fn clamp_to_exact_size(v: Vec3, size: f32) -> Vec3 {
    let length = v.length();
    if length > SMALL_NUMBER {
        v / length * size
    } else {
        Vec3::ZERO
    }
}
