//! Speed-scaled ground adhesion.
//!
//! At bunny-hop speeds the body should skim over small lips and slide up
//! ramps instead of sticking to them, so step height shrinks and the
//! walkable slope tightens as horizontal speed rises.

use super::config::TuningParameters;
use super::state::{ContactMode, MovementState};

/// Step height and walkable cosine for the current speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adhesion {
    pub step_height: f32,
    pub walkable_floor_z: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct GroundAdhesionPolicy<'a> {
    tuning: &'a TuningParameters,
}

impl<'a> GroundAdhesionPolicy<'a> {
    pub fn new(tuning: &'a TuningParameters) -> Self {
        Self { tuning }
    }

    pub fn defaults(&self) -> Adhesion {
        Adhesion {
            step_height: self.tuning.max_step_height,
            walkable_floor_z: self.tuning.walkable_floor_z,
        }
    }

    pub fn update_adhesion(&self, horizontal_speed: f32, contact: ContactMode, surface_friction: f32) -> Adhesion {
        let t = self.tuning;
        let crouched_speed = t.crouched_speed();
        if matches!(contact, ContactMode::OnLadder) || horizontal_speed * horizontal_speed <= crouched_speed * crouched_speed {
            return self.defaults();
        }

        let scale = ((horizontal_speed - t.speed_mult_min) / (t.speed_mult_max - t.speed_mult_min)).clamp(0.0, 1.0);
        let mut multiplier = scale * scale;
        if !contact.is_falling() {
            multiplier = ((1.0 - surface_friction) * multiplier).max(0.0);
        }

        Adhesion {
            step_height: lerp(t.max_step_height, t.min_step_height, multiplier),
            walkable_floor_z: lerp(t.walkable_floor_z, t.slide_walkable_floor_z, multiplier),
        }
    }

    /// Recompute adhesion from the body's current speed and store it on the state.
    pub fn apply(&self, state: &mut MovementState) {
        let adhesion = self.update_adhesion(state.horizontal_speed(), state.contact, state.surface_friction);
        state.step_height = adhesion.step_height;
        state.walkable_floor_z = adhesion.walkable_floor_z;
    }
}

#[inline]
fn lerp(a: f32, b: f32, alpha: f32) -> f32 {
    a + (b - a) * alpha
}
