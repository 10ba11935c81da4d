//! Sweep and slide primitives shared by the ground, fall and ladder moves.
//!
//! This is the collision response layer: the body is swept along a delta,
//! and when something blocks it the remaining motion is redirected along the
//! surface, around corners between two walls, or up and over a step.
//!
//! # Design
//!
//! [`SlideMover`] borrows the collision world and the tuning for the length of
//! one tick and mutates the [`MovementState`] it is handed. Nothing is cached
//! between calls. Every sweep goes through [`SlideMover::safe_move`], which
//! owns depenetration and the rising-box adjustment.

use glam::Vec3;

use super::config::{TuningParameters, MAX_FLOOR_DIST, MIN_FLOOR_DIST, VERTICAL_SLOPE_NORMAL_Z};
use super::state::{MovementEvent, MovementState};
use super::velocity::is_nearly_zero;
use crate::collision::{
    CapsuleShape, CollisionQuery, FloorResult, HitResult, KINDA_SMALL_NUMBER, SWEEP_EDGE_REJECT_DISTANCE,
};

/// Extra distance added when pushing out of penetration.
const PENETRATION_PULLBACK: f32 = 0.125;

/// Push applied when an adjusted slide hits the same wall again.
const SAME_WALL_NUDGE: f32 = 0.01;

/// Remove the component of `v` along `normal`.
#[inline]
pub fn plane_project(v: Vec3, normal: Vec3) -> Vec3 {
    v - normal * v.dot(normal)
}

/// Horizontal part of `v`, normalized, or zero.
#[inline]
pub fn safe_normal_2d(v: Vec3) -> Vec3 {
    Vec3::new(v.x, v.y, 0.0).normalize_or_zero()
}

/// Whether `impact_point` lies far enough inside the capsule's footprint to stand on.
pub fn is_within_edge_tolerance(location: Vec3, impact_point: Vec3, radius: f32) -> bool {
    let offset = impact_point - location;
    let distance_sq = offset.x * offset.x + offset.y * offset.y;
    let reduced = (radius - SWEEP_EDGE_REJECT_DISTANCE).max(SWEEP_EDGE_REJECT_DISTANCE + KINDA_SMALL_NUMBER);
    distance_sq < reduced * reduced
}

/// Moves one body through the world for a single tick.
pub struct SlideMover<'a> {
    world: &'a dyn CollisionQuery,
    tuning: &'a TuningParameters,
}

impl<'a> SlideMover<'a> {
    pub fn new(world: &'a dyn CollisionQuery, tuning: &'a TuningParameters) -> Self {
        Self { world, tuning }
    }

    pub fn world(&self) -> &'a dyn CollisionQuery {
        self.world
    }

    #[inline]
    pub fn capsule(&self, state: &MovementState) -> CapsuleShape {
        state.capsule(self.tuning.capsule_radius)
    }

    #[inline]
    pub fn is_walkable(&self, state: &MovementState, hit: &HitResult) -> bool {
        self.world.is_walkable(hit, state.walkable_floor_z)
    }

    /// Probe for floor below `position`, reaching one step plus the float gap.
    pub fn find_floor(&self, state: &MovementState, position: Vec3) -> FloorResult {
        self.world.find_floor(
            position,
            self.capsule(state),
            state.step_height + MAX_FLOOR_DIST,
            state.walkable_floor_z,
        )
    }

    // ========================================================================
    // Sweeping
    // ========================================================================

    /// Sweep the body by `delta`, pushing out of penetration and retrying once if needed.
    ///
    /// The state's position is updated to where the sweep stopped.
    pub fn safe_move(&self, state: &mut MovementState, delta: Vec3) -> HitResult {
        let delta = self.rising_box_adjust(state, delta);
        let capsule = self.capsule(state);

        let mut hit = self.world.sweep(state.position, delta, capsule);
        if hit.start_penetrating && self.resolve_penetration(state, &hit, capsule) {
            hit = self.world.sweep(state.position, delta, capsule);
        }
        if !hit.start_penetrating {
            state.position = hit.location;
        }
        hit
    }

    fn resolve_penetration(&self, state: &mut MovementState, hit: &HitResult, capsule: CapsuleShape) -> bool {
        let adjustment = hit.normal * (hit.penetration_depth + PENETRATION_PULLBACK);
        if adjustment.length_squared() <= KINDA_SMALL_NUMBER {
            return false;
        }

        let target = state.position + adjustment;
        if self.world.overlap_blocking(target, capsule) {
            log::trace!("penetration at {:?} could not be resolved", state.position);
            return false;
        }

        log::debug!("pushed out of penetration by {:.3} cm", adjustment.length());
        state.position = target;
        true
    }

    /// While rising, look ahead at foot level and slide along box edges before touching them.
    fn rising_box_adjust(&self, state: &MovementState, delta: Vec3) -> Vec3 {
        if !state.contact.is_falling() || delta.z <= 0.0 {
            return delta;
        }
        let horizontal = Vec3::new(delta.x, delta.y, 0.0);
        if horizontal.length_squared() <= KINDA_SMALL_NUMBER {
            return delta;
        }

        let mut start = state.position;
        start.z += -state.half_height + MAX_FLOOR_DIST + delta.z;
        let reach = horizontal.normalize() * (self.tuning.capsule_radius + SWEEP_EDGE_REJECT_DISTANCE);

        let hit = self.world.line_trace(start, start + reach);
        if hit.blocking && hit.impact_normal.z.abs() <= VERTICAL_SLOPE_NORMAL_Z {
            plane_project(delta, hit.impact_normal)
        } else {
            delta
        }
    }

    // ========================================================================
    // Sliding
    // ========================================================================

    /// Portion of `delta` left after hitting `normal`, scaled by `time`.
    pub fn compute_slide_vector(
        &self,
        state: &MovementState,
        delta: Vec3,
        time: f32,
        normal: Vec3,
        hit: &HitResult,
    ) -> Vec3 {
        if state.contact.is_falling() {
            self.handle_slope_boosting(state, delta, time, normal, hit)
        } else {
            plane_project(delta, normal) * time
        }
    }

    /// Airborne slide. Removes a friction-scaled bounce of the delta along the surface.
    fn handle_slope_boosting(
        &self,
        state: &MovementState,
        delta: Vec3,
        time: f32,
        normal: Vec3,
        hit: &HitResult,
    ) -> Vec3 {
        let wall_angle = hit.impact_normal.z.abs();
        let impact_normal = if wall_angle <= VERTICAL_SLOPE_NORMAL_Z || wall_angle == 1.0 {
            normal
        } else {
            hit.impact_normal
        };
        let bounce = 1.0 + self.tuning.bounce_multiplier * (1.0 - state.surface_friction);
        (delta - bounce * impact_normal * delta.dot(impact_normal)) * time
    }

    /// Redirect `delta` after hitting a second wall.
    pub fn two_wall_adjust(&self, state: &MovementState, delta: Vec3, hit: &HitResult, old_hit_normal: Vec3) -> Vec3 {
        let in_delta = delta;
        let hit_normal = hit.normal;

        let mut delta = if old_hit_normal.dot(hit_normal) <= 0.0 {
            // Corner of 90 degrees or less: run along the crease.
            let crease = hit_normal.cross(old_hit_normal).normalize_or_zero();
            let along = crease * delta.dot(crease) * (1.0 - hit.time);
            if in_delta.dot(along) < 0.0 {
                -along
            } else {
                along
            }
        } else {
            let slid = self.compute_slide_vector(state, delta, 1.0 - hit.time, hit_normal, hit);
            if slid.dot(in_delta) <= 0.0 {
                Vec3::ZERO
            } else if (hit_normal.dot(old_hit_normal) - 1.0).abs() < KINDA_SMALL_NUMBER {
                slid + hit_normal * SAME_WALL_NUDGE
            } else {
                slid
            }
        };

        if state.contact.is_grounded() {
            if delta.z > 0.0 {
                if (hit.normal.z >= state.walkable_floor_z || self.is_walkable(state, hit))
                    && hit.normal.z > KINDA_SMALL_NUMBER
                {
                    // Walkable crease: keep horizontal speed and climb it.
                    let time = 1.0 - hit.time;
                    let scaled = delta.normalize_or_zero() * in_delta.length();
                    delta = Vec3::new(in_delta.x, in_delta.y, scaled.z / hit.normal.z) * time;
                    if delta.z > state.step_height && delta.z > 0.0 {
                        delta *= state.step_height / delta.z;
                    }
                } else {
                    delta.z = 0.0;
                }
            } else if delta.z < 0.0 {
                let floor = &state.current_floor;
                if floor.floor_distance < MIN_FLOOR_DIST && floor.blocking_hit {
                    delta.z = 0.0;
                }
            }
        }

        delta
    }

    /// Slide along the surface described by `hit`, then along a second one if needed.
    ///
    /// Returns the fraction of `time` that was actually travelled. `hit` is
    /// updated to the last sweep performed.
    #[allow(clippy::too_many_arguments)]
    pub fn slide_along_surface(
        &self,
        state: &mut MovementState,
        delta: Vec3,
        time: f32,
        normal: Vec3,
        hit: &mut HitResult,
        handle_impact: bool,
        events: &mut Vec<MovementEvent>,
    ) -> f32 {
        if !hit.blocking {
            return 0.0;
        }

        let mut normal = normal;
        if state.contact.is_grounded() {
            if normal.z > 0.0 {
                // Never get pushed up a surface we could not stand on.
                if !self.is_walkable(state, hit) {
                    normal = safe_normal_2d(normal);
                }
            } else if normal.z < -KINDA_SMALL_NUMBER {
                let floor = &state.current_floor;
                if floor.floor_distance < MIN_FLOOR_DIST && floor.blocking_hit {
                    let floor_normal = floor.hit.normal;
                    if delta.dot(floor_normal) < 0.0 && floor_normal.z < 1.0 - 1.0e-5 {
                        normal = floor_normal;
                    }
                    normal = safe_normal_2d(normal);
                }
            }
        }

        let old_hit_normal = normal;
        let mut slide = self.compute_slide_vector(state, delta, time, normal, hit);
        if slide.dot(delta) <= 0.0 {
            return 0.0;
        }

        *hit = self.safe_move(state, slide);
        let first_hit_percent = hit.time;
        let mut percent_applied = first_hit_percent;

        if hit.is_valid_blocking_hit() {
            if handle_impact {
                events.push(MovementEvent::Impact { normal: hit.normal });
            }

            slide = self.two_wall_adjust(state, slide, hit, old_hit_normal);
            if !is_nearly_zero(slide, 1.0e-3) && slide.dot(delta) > 0.0 {
                *hit = self.safe_move(state, slide);
                percent_applied += hit.time * (1.0 - first_hit_percent);
                if handle_impact && hit.blocking {
                    events.push(MovementEvent::Impact { normal: hit.normal });
                }
            }
        }

        percent_applied.clamp(0.0, 1.0)
    }

    // ========================================================================
    // Ground movement
    // ========================================================================

    /// Project a horizontal delta onto a walkable ramp, keeping its horizontal length.
    pub fn compute_ground_movement_delta(&self, state: &MovementState, delta: Vec3, ramp_hit: &HitResult) -> Vec3 {
        let floor_normal = ramp_hit.impact_normal;
        let contact_normal = ramp_hit.normal;

        if floor_normal.z < 1.0 - KINDA_SMALL_NUMBER
            && floor_normal.z > KINDA_SMALL_NUMBER
            && contact_normal.z > KINDA_SMALL_NUMBER
            && self.is_walkable(state, ramp_hit)
        {
            let floor_dot_delta = floor_normal.dot(delta);
            return Vec3::new(delta.x, delta.y, -floor_dot_delta / floor_normal.z);
        }
        delta
    }

    /// Move along the current floor for `delta_time`.
    ///
    /// Handles ramps, steps and walls. Returns the floor found by a successful
    /// step up so the caller does not have to probe again.
    pub fn move_along_floor(
        &self,
        state: &mut MovementState,
        velocity: Vec3,
        delta_time: f32,
        events: &mut Vec<MovementEvent>,
    ) -> Option<FloorResult> {
        if !state.current_floor.is_walkable_floor() {
            return None;
        }

        let delta = Vec3::new(velocity.x, velocity.y, 0.0) * delta_time;
        let floor_hit = state.current_floor.hit;
        let ramp = self.compute_ground_movement_delta(state, delta, &floor_hit);
        let mut hit = self.safe_move(state, ramp);

        if hit.start_penetrating {
            events.push(MovementEvent::Impact { normal: hit.normal });
            self.slide_along_surface(state, delta, 1.0, hit.normal, &mut hit, true, events);
            if hit.start_penetrating {
                log::debug!("stuck in geometry at {:?}", state.position);
            }
            return None;
        }
        if !hit.is_valid_blocking_hit() {
            return None;
        }

        let mut percent_applied = hit.time;
        if hit.time > 0.0 && hit.normal.z > KINDA_SMALL_NUMBER && self.is_walkable(state, &hit) {
            // Another walkable ramp.
            let remaining = 1.0 - percent_applied;
            let ramp = self.compute_ground_movement_delta(state, delta * remaining, &hit);
            hit = self.safe_move(state, ramp);
            percent_applied = (percent_applied + hit.time * remaining).clamp(0.0, 1.0);
        }

        if hit.is_valid_blocking_hit() {
            if let Some(floor) = self.step_up(state, delta * (1.0 - percent_applied), &hit, events) {
                return Some(floor);
            }
            events.push(MovementEvent::Impact { normal: hit.normal });
            let normal = hit.normal;
            self.slide_along_surface(state, delta, 1.0 - percent_applied, normal, &mut hit, true, events);
        }
        None
    }

    /// Try to climb the obstacle in `hit`: up, forward by `delta`, then down.
    ///
    /// On success the body is left on top and the floor under it is returned.
    /// On failure the body is put back where it started.
    pub fn step_up(
        &self,
        state: &mut MovementState,
        delta: Vec3,
        hit: &HitResult,
        events: &mut Vec<MovementEvent>,
    ) -> Option<FloorResult> {
        if !hit.is_valid_blocking_hit() || state.contact.is_falling() {
            return None;
        }

        let radius = self.tuning.capsule_radius;
        let old_position = state.position;
        let initial_impact_z = hit.impact_point.z;

        // Hit with the upper body: nothing to step onto.
        if initial_impact_z > old_position.z + (state.half_height - radius) {
            return None;
        }

        let max_step = state.step_height;
        let mut step_up_height = max_step;
        let mut step_down_height = max_step;
        let mut floor_base_z = old_position.z - state.half_height;
        let mut floor_point_z = floor_base_z;

        if state.contact.is_grounded() && state.current_floor.is_walkable_floor() {
            let floor_distance = state.current_floor.floor_distance.max(0.0);
            floor_base_z -= floor_distance;
            step_up_height = (step_up_height - floor_distance).max(0.0);
            step_down_height = max_step + MAX_FLOOR_DIST * 2.0;
            if is_within_edge_tolerance(hit.location, hit.impact_point, radius) {
                floor_point_z = state.current_floor.hit.impact_point.z;
            } else {
                floor_point_z -= floor_distance;
            }
        }

        if initial_impact_z <= floor_base_z {
            return None;
        }

        let revert = |state: &mut MovementState| -> Option<FloorResult> {
            state.position = old_position;
            None
        };

        let sweep_up = self.safe_move(state, Vec3::new(0.0, 0.0, step_up_height));
        if sweep_up.start_penetrating {
            return revert(state);
        }

        let mut forward = self.safe_move(state, delta);
        if forward.blocking {
            if forward.start_penetrating {
                return revert(state);
            }
            if sweep_up.blocking {
                events.push(MovementEvent::Impact { normal: sweep_up.normal });
            }
            events.push(MovementEvent::Impact { normal: forward.normal });

            let forward_hit_time = forward.time;
            let normal = forward.normal;
            let slide_amount = self.slide_along_surface(
                state,
                delta,
                1.0 - forward_hit_time,
                normal,
                &mut forward,
                true,
                events,
            );
            if forward_hit_time == 0.0 && slide_amount == 0.0 {
                return revert(state);
            }
        }

        let down = self.safe_move(state, Vec3::new(0.0, 0.0, -step_down_height));
        if down.start_penetrating || !down.is_valid_blocking_hit() {
            return revert(state);
        }

        let delta_z = down.impact_point.z - floor_point_z;
        if delta_z > max_step {
            return revert(state);
        }
        if !self.is_walkable(state, &down) {
            if delta.dot(down.impact_normal) < 0.0 || down.location.z > old_position.z {
                return revert(state);
            }
        }
        if !is_within_edge_tolerance(down.location, down.impact_point, radius) {
            return revert(state);
        }

        // Ending up higher than we started is only allowed onto standable floor.
        let floor = self.find_floor(state, state.position);
        if down.location.z > old_position.z && !floor.is_walkable_floor() {
            return revert(state);
        }

        log::trace!("stepped up {:.2} cm", state.position.z - old_position.z);
        Some(floor)
    }

    /// Keep the capsule floating between `MIN_FLOOR_DIST` and `MAX_FLOOR_DIST` above the floor.
    pub fn adjust_floor_height(&self, state: &mut MovementState) {
        if !state.current_floor.is_walkable_floor() {
            return;
        }

        let old_distance = state.current_floor.floor_distance;
        if (MIN_FLOOR_DIST..=MAX_FLOOR_DIST).contains(&old_distance) {
            return;
        }

        let initial_z = state.position.z;
        let move_distance = (MIN_FLOOR_DIST + MAX_FLOOR_DIST) * 0.5 - old_distance;
        let hit = self.safe_move(state, Vec3::new(0.0, 0.0, move_distance));

        if !hit.is_valid_blocking_hit() {
            state.current_floor.floor_distance += move_distance;
        } else if move_distance > 0.0 {
            state.current_floor.floor_distance += state.position.z - initial_z;
        } else {
            state.current_floor.floor_distance = state.position.z - hit.location.z;
            if self.is_walkable(state, &hit) {
                state.current_floor.hit = hit;
                state.current_floor.walkable = true;
            }
        }
    }
}
