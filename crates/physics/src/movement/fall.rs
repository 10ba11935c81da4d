//! Airborne integration.
//!
//! Falling is integrated in sub-steps with midpoint positions. Each sub-step
//! applies air control, gravity and the held-jump force, splits exactly at the
//! apex of a jump, then sweeps the body and decides whether the contact is a
//! landing, a wall to deflect off, or a ditch between two slopes.
//!
//! # Design
//!
//! The integrator does not change the contact mode itself. It reports a
//! [`FallOutcome`] and leaves mode hand-offs (landing, entering fluid) to the
//! simulator, which owns the mode-change hook.

use glam::Vec3;

use super::adhesion::GroundAdhesionPolicy;
use super::config::{
    TuningParameters, APEX_TIME_MINIMUM, JUMP_VELOCITY, MAX_FLOOR_DIST, MIN_TICK_TIME, VERTICAL_SLOPE_NORMAL_Z,
};
use super::slide_move::{is_within_edge_tolerance, plane_project, safe_normal_2d, SlideMover};
use super::state::{ContactMode, MovementEvent, MovementState};
use super::velocity::{is_nearly_zero, SpeedFlags, VelocityInput, VelocityResolver};
use crate::collision::{CollisionQuery, HitResult, KINDA_SMALL_NUMBER};

/// Per-tick inputs the fall integrator cannot read off the state.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallInput {
    pub speed: SpeedFlags,
    /// Stick deflection, 0.0 to 1.0.
    pub analog_modifier: f32,
    /// Time of the tick already consumed by earlier moves (s).
    pub tick_elapsed: f32,
}

/// How a fall integration ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FallOutcome {
    /// Still airborne; the whole time slice was used.
    Airborne,
    /// Touched down on `hit` with `remaining_time` left in the tick.
    Landed { hit: HitResult, remaining_time: f32 },
    /// Moved into a fluid volume with `remaining_time` left in the tick.
    EnteredFluid { remaining_time: f32 },
}

/// Sub-stepped gravity integration for airborne bodies.
pub struct FallIntegrator<'a> {
    tuning: &'a TuningParameters,
}

impl<'a> FallIntegrator<'a> {
    pub fn new(tuning: &'a TuningParameters) -> Self {
        Self { tuning }
    }

    /// Apply gravity for `delta_time`, respecting terminal velocity and the axis limit.
    pub fn new_fall_velocity(&self, initial: Vec3, gravity_z: f32, delta_time: f32) -> Vec3 {
        let mut result = initial;
        if delta_time > 0.0 {
            result.z += gravity_z * delta_time;

            let terminal = self.tuning.terminal_velocity.abs();
            if gravity_z != 0.0 && result.length_squared() > terminal * terminal {
                let gravity_dir = Vec3::new(0.0, 0.0, gravity_z.signum());
                if result.dot(gravity_dir) > terminal {
                    result = plane_project(result, gravity_dir) + gravity_dir * terminal;
                }
            }
        }
        VelocityResolver::new(self.tuning).clamp_vertical(result)
    }

    /// Integrate an airborne body for `delta_time`.
    pub fn integrate(
        &self,
        state: &mut MovementState,
        world: &dyn CollisionQuery,
        input: &FallInput,
        delta_time: f32,
        events: &mut Vec<MovementEvent>,
    ) -> FallOutcome {
        if delta_time < MIN_TICK_TIME {
            return FallOutcome::Airborne;
        }

        let t = self.tuning;
        let resolver = VelocityResolver::new(t);
        let adhesion = GroundAdhesionPolicy::new(t);
        let mover = SlideMover::new(world, t);

        let mut fall_acceleration = Vec3::new(state.acceleration.x, state.acceleration.y, 0.0);
        if fall_acceleration.length_squared() > 0.0 {
            fall_acceleration = fall_acceleration.clamp_length_max(t.max_acceleration);
        }
        let limit_air_control = t.limit_air_control_on_impact && fall_acceleration.length_squared() > 0.0;

        let mut remaining = delta_time;
        let mut iterations = 0;
        let mut elapsed = 0.0;

        while remaining >= MIN_TICK_TIME && iterations < t.max_simulation_iterations {
            iterations += 1;
            let mut time_tick = t.simulation_time_step(remaining, iterations);
            remaining -= time_tick;

            let old_location = state.position;
            let old_velocity = state.velocity;

            // Air control acts on the horizontal plane only.
            let mut lateral = VelocityInput::from_state(state, input.speed, input.analog_modifier);
            lateral.velocity.z = 0.0;
            lateral.acceleration = fall_acceleration;
            lateral.contact = ContactMode::Falling;
            let mut velocity = resolver.resolve_velocity(
                &lateral,
                time_tick,
                t.falling_lateral_friction,
                false,
                t.braking_deceleration_falling,
            );
            velocity.z = old_velocity.z;
            state.velocity = velocity;
            adhesion.apply(state);

            let mut gravity_time = time_tick;
            let mut ending_jump_force = false;
            if state.jump_force_time_remaining > 0.0 {
                let jump_force_time = state.jump_force_time_remaining.min(time_tick);
                if !t.apply_gravity_while_jumping {
                    gravity_time = (time_tick - jump_force_time).max(0.0);
                }
                state.jump_force_time_remaining -= jump_force_time;
                if state.jump_force_time_remaining <= 0.0 {
                    state.jump_force_time_remaining = 0.0;
                    state.jump.reset(true);
                    ending_jump_force = true;
                    events.push(MovementEvent::JumpForceEnded);
                }
            }

            velocity = self.new_fall_velocity(velocity, t.gravity_z, gravity_time);

            // Split the sub-step exactly at the apex.
            if old_velocity.z > 0.0 && velocity.z <= 0.0 && state.apex_attempts < t.max_jump_apex_attempts {
                let derived = (velocity - old_velocity) / time_tick;
                if derived.z.abs() > KINDA_SMALL_NUMBER {
                    let time_to_apex = -old_velocity.z / derived.z;
                    if (APEX_TIME_MINIMUM..time_tick).contains(&time_to_apex) {
                        velocity = old_velocity + derived * time_to_apex;
                        velocity.z = 0.0;

                        remaining += time_tick - time_to_apex;
                        time_tick = time_to_apex;
                        iterations -= 1;
                        state.apex_attempts += 1;

                        if state.notify_apex {
                            state.notify_apex = false;
                            let time_into_tick = input.tick_elapsed + elapsed + time_to_apex;
                            log::debug!("jump apex at z {:.2}, {:.5}s into tick", state.position.z, time_into_tick);
                            events.push(MovementEvent::ApexReached { time_into_tick });
                        }
                    }
                }
            }

            if state.notify_apex && velocity.z < 0.0 {
                state.notify_apex = false;
                events.push(MovementEvent::ApexReached {
                    time_into_tick: input.tick_elapsed + elapsed + time_tick,
                });
            }

            state.velocity = velocity;
            elapsed += time_tick;

            let mut adjusted = 0.5 * (old_velocity + velocity) * time_tick;
            if ending_jump_force && !t.apply_gravity_while_jumping {
                let non_gravity_time = (time_tick - gravity_time).max(0.0);
                adjusted = old_velocity * non_gravity_time + 0.5 * (old_velocity + velocity) * gravity_time;
            }

            log::trace!(
                "fall step {:.5}s: v {:?}, delta {:?}",
                time_tick,
                state.velocity,
                adjusted
            );

            let mut hit = mover.safe_move(state, adjusted);
            let mut last_move_time_slice = time_tick;
            let mut sub_time_remaining = time_tick * (1.0 - hit.time);

            if world.is_in_fluid(state.position, mover.capsule(state)) {
                return FallOutcome::EnteredFluid {
                    remaining_time: remaining + sub_time_remaining,
                };
            }

            if hit.blocking {
                if self.is_valid_landing_spot(&mover, state, state.position, &hit, delta_time) {
                    return FallOutcome::Landed {
                        hit,
                        remaining_time: remaining + sub_time_remaining,
                    };
                }

                if !hit.start_penetrating && self.should_check_for_valid_landing_spot(state, &hit) {
                    let floor = mover.find_floor(state, state.position);
                    if floor.is_walkable_floor()
                        && self.is_valid_landing_spot(&mover, state, state.position, &floor.hit, delta_time)
                    {
                        return FallOutcome::Landed {
                            hit: floor.hit,
                            remaining_time: remaining + sub_time_remaining,
                        };
                    }
                }

                events.push(MovementEvent::Impact { normal: hit.normal });

                let mut velocity_no_air_control = old_velocity;
                let mut air_control_accel = state.acceleration;
                if limit_air_control {
                    let mut coast = VelocityInput::from_state(state, input.speed, input.analog_modifier);
                    coast.velocity = Vec3::new(old_velocity.x, old_velocity.y, 0.0);
                    coast.acceleration = Vec3::ZERO;
                    coast.contact = ContactMode::Falling;
                    let coasted = resolver.resolve_velocity(
                        &coast,
                        time_tick,
                        t.falling_lateral_friction,
                        false,
                        t.braking_deceleration_falling,
                    );
                    velocity_no_air_control = self.new_fall_velocity(
                        Vec3::new(coasted.x, coasted.y, old_velocity.z),
                        t.gravity_z,
                        gravity_time,
                    );
                    air_control_accel = (state.velocity - velocity_no_air_control) / time_tick;
                    let air_control_dv = self.limit_air_control(air_control_accel, &hit) * last_move_time_slice;
                    adjusted = (velocity_no_air_control + air_control_dv) * last_move_time_slice;
                }

                let old_hit_normal = hit.normal;
                let old_hit_impact_normal = hit.impact_normal;
                let mut delta = mover.compute_slide_vector(state, adjusted, 1.0 - hit.time, old_hit_normal, &hit);
                let delta_step =
                    mover.compute_slide_vector(state, state.velocity * time_tick, 1.0 - hit.time, old_hit_normal, &hit);

                // Deflection can rotate speed onto one axis; re-apply the axis limit.
                if sub_time_remaining > KINDA_SMALL_NUMBER {
                    state.velocity = resolver.clamp_axes(delta_step / sub_time_remaining);
                }

                if sub_time_remaining > KINDA_SMALL_NUMBER && delta.dot(adjusted) > 0.0 {
                    hit = mover.safe_move(state, delta);

                    if hit.blocking {
                        // Second wall.
                        last_move_time_slice = sub_time_remaining;
                        sub_time_remaining *= 1.0 - hit.time;

                        if self.is_valid_landing_spot(&mover, state, state.position, &hit, delta_time) {
                            return FallOutcome::Landed {
                                hit,
                                remaining_time: remaining + sub_time_remaining,
                            };
                        }

                        events.push(MovementEvent::Impact { normal: hit.normal });

                        if limit_air_control && hit.normal.z > VERTICAL_SLOPE_NORMAL_Z {
                            let last_move_no_air_control = velocity_no_air_control * last_move_time_slice;
                            delta = mover.compute_slide_vector(state, last_move_no_air_control, 1.0, old_hit_normal, &hit);
                        }

                        delta = mover.two_wall_adjust(state, delta, &hit, old_hit_normal);

                        if limit_air_control {
                            let air_control_dv = self.limit_air_control(air_control_accel, &hit) * sub_time_remaining;
                            if air_control_dv.dot(old_hit_normal) > 0.0 {
                                delta += air_control_dv * sub_time_remaining;
                            }
                        }

                        if sub_time_remaining > KINDA_SMALL_NUMBER {
                            state.velocity = resolver.clamp_axes(delta / sub_time_remaining);
                        }

                        // Straddling two slopes, neither of which can be stood on.
                        let ditch = old_hit_impact_normal.z > 0.0
                            && hit.impact_normal.z > 0.0
                            && delta.z.abs() <= KINDA_SMALL_NUMBER
                            && hit.impact_normal.dot(old_hit_impact_normal) < 0.0;

                        hit = mover.safe_move(state, delta);
                        if hit.time == 0.0 {
                            let mut side = safe_normal_2d(old_hit_normal + hit.impact_normal);
                            if is_nearly_zero(side, KINDA_SMALL_NUMBER) {
                                side = Vec3::new(old_hit_normal.y, -old_hit_normal.x, 0.0).normalize_or_zero();
                            }
                            hit = mover.safe_move(state, side);
                        }

                        if ditch
                            || hit.time == 0.0
                            || self.is_valid_landing_spot(&mover, state, state.position, &hit, delta_time)
                        {
                            log::debug!("settled between two surfaces at {:?}", state.position);
                            return FallOutcome::Landed { hit, remaining_time: 0.0 };
                        }

                        let moved = state.position - old_location;
                        if self.is_stuck_on_perch(hit.time, old_hit_impact_normal.z, state.walkable_floor_z, moved, time_tick)
                        {
                            self.ditch_jitter(state, resolver.max_speed(input.speed));
                            log::debug!("perched in a ditch, jittering to {:?}", state.velocity);
                            let delta = state.velocity * time_tick;
                            mover.safe_move(state, delta);
                        }
                    }
                }
            }

            if state.velocity.x * state.velocity.x + state.velocity.y * state.velocity.y <= KINDA_SMALL_NUMBER * 10.0 {
                state.velocity.x = 0.0;
                state.velocity.y = 0.0;
            }
        }

        FallOutcome::Airborne
    }

    /// Whether a body that slid freely off a walkable impact went nowhere
    /// this sub-step. Always `false` while perching is disabled.
    pub fn is_stuck_on_perch(
        &self,
        final_hit_time: f32,
        first_impact_normal_z: f32,
        walkable_floor_z: f32,
        moved: Vec3,
        time_tick: f32,
    ) -> bool {
        if self.tuning.perch_radius_threshold <= 0.0
            || final_hit_time != 1.0
            || first_impact_normal_z < walkable_floor_z
        {
            return false;
        }
        let moved_2d_sq = moved.x * moved.x + moved.y * moved.y;
        moved.z.abs() <= 0.2 * time_tick && moved_2d_sq <= 4.0 * time_tick
    }

    /// Random horizontal kick plus a small hop to get out of a perch.
    pub fn ditch_jitter(&self, state: &mut MovementState, max_speed: f32) {
        state.velocity.x += 0.25 * max_speed * state.rng.next_centered();
        state.velocity.y += 0.25 * max_speed * state.rng.next_centered();
        state.velocity.z = (self.tuning.jump_z_velocity * 0.25).max(1.0);
        state.velocity = VelocityResolver::new(self.tuning).clamp_axes(state.velocity);
    }

    /// Whether the body at `location` may land on `hit`.
    pub fn is_valid_landing_spot(
        &self,
        mover: &SlideMover<'_>,
        state: &MovementState,
        location: Vec3,
        hit: &HitResult,
        delta_time: f32,
    ) -> bool {
        if !hit.blocking {
            return false;
        }

        let radius = self.tuning.capsule_radius;
        if !hit.start_penetrating {
            if !mover.is_walkable(state, hit) {
                return false;
            }

            if self.tuning.flat_base_floor_checks {
                let lower_box_z = hit.location.z - state.half_height + MAX_FLOOR_DIST;
                if (hit.impact_normal.z < state.walkable_floor_z || hit.impact_normal.z == 1.0)
                    && hit.impact_point.z > lower_box_z
                {
                    return false;
                }
            } else {
                let lower_hemisphere_z = hit.location.z - state.half_height + radius;
                if hit.impact_point.z >= lower_hemisphere_z {
                    return false;
                }
            }

            if !is_within_edge_tolerance(hit.location, hit.impact_point, radius) {
                return false;
            }
        } else if hit.normal.z < KINDA_SMALL_NUMBER {
            // Pushed out sideways next to a wall; not a floor.
            return false;
        }

        if !mover.find_floor(state, location).is_walkable_floor() {
            return false;
        }

        // Moving into a slope: would one half-step of gravity still leave us rising too fast?
        if hit.normal.z < 1.0 && state.velocity.dot(hit.normal) < 0.0 {
            let mut deflection = state.velocity;
            deflection.z += 0.5 * self.tuning.gravity_z * delta_time;
            let deflection = mover.compute_slide_vector(state, deflection, 1.0, hit.normal, hit);
            if deflection.z > JUMP_VELOCITY {
                return false;
            }
        }

        true
    }

    fn should_check_for_valid_landing_spot(&self, state: &MovementState, hit: &HitResult) -> bool {
        if self.tuning.flat_base_floor_checks {
            return false;
        }
        hit.normal.z > KINDA_SMALL_NUMBER
            && !hit.normal.abs_diff_eq(hit.impact_normal, KINDA_SMALL_NUMBER)
            && is_within_edge_tolerance(state.position, hit.impact_point, self.tuning.capsule_radius)
    }

    /// Keep air control from pushing into a surface that could lift the body.
    fn limit_air_control(&self, fall_acceleration: Vec3, hit: &HitResult) -> Vec3 {
        if hit.is_valid_blocking_hit() && hit.normal.z > VERTICAL_SLOPE_NORMAL_Z {
            if fall_acceleration.dot(hit.normal) < 0.0 {
                return plane_project(fall_acceleration, safe_normal_2d(hit.normal));
            }
        } else if hit.start_penetrating {
            return if fall_acceleration.dot(hit.normal) > 0.0 {
                fall_acceleration
            } else {
                Vec3::ZERO
            };
        }
        fall_acceleration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{CapsuleShape, CollisionWorld, ContentFlags};
    use glam::Quat;

    fn create_test_world() -> CollisionWorld {
        let mut world = CollisionWorld::new();
        // Floor, top surface at z = 0
        world.add_box(
            Vec3::new(0.0, 0.0, -50.0),
            Vec3::new(5000.0, 5000.0, 50.0),
            ContentFlags::SOLID,
        );
        world
    }

    fn airborne_state(tuning: &TuningParameters, z: f32) -> MovementState {
        let mut state = MovementState::new(Vec3::new(0.0, 0.0, z), tuning);
        state.contact = ContactMode::Falling;
        state
    }

    #[test]
    fn test_terminal_velocity() {
        let tuning = TuningParameters::default();
        let integrator = FallIntegrator::new(&tuning);
        let v = integrator.new_fall_velocity(Vec3::new(100.0, 0.0, -3990.0), tuning.gravity_z, 0.1);
        assert!((v.z + tuning.terminal_velocity).abs() < 1e-2, "z = {}", v.z);
        assert_eq!(v.x, 100.0, "terminal velocity only limits the gravity axis");
    }

    #[test]
    fn test_apex_split_is_exact() {
        let tuning = TuningParameters::default();
        let world = create_test_world();
        let integrator = FallIntegrator::new(&tuning);
        let mut state = airborne_state(&tuning, 500.0);
        state.velocity.z = tuning.jump_z_velocity;
        state.notify_apex = true;
        let mut events = Vec::new();

        let dt = 0.3;
        let outcome = integrator.integrate(&mut state, &world, &FallInput::default(), dt, &mut events);
        assert_eq!(outcome, FallOutcome::Airborne);

        let apex_time = tuning.jump_z_velocity / -tuning.gravity_z;
        let reported = events
            .iter()
            .find_map(|e| match e {
                MovementEvent::ApexReached { time_into_tick } => Some(*time_into_tick),
                _ => None,
            })
            .expect("apex should be reported");
        assert!((reported - apex_time).abs() < 1e-4, "apex at {reported}, expected {apex_time}");
        assert!((apex_time - 0.26667).abs() < 1e-4);

        // Velocity was exactly zero at the split, so only the refund shows.
        let expected_z = tuning.gravity_z * (dt - apex_time);
        assert!((state.velocity.z - expected_z).abs() < 1e-2, "v.z {}", state.velocity.z);
        assert!(!state.notify_apex);
        assert_eq!(state.apex_attempts, 1);
    }

    #[test]
    fn test_landing_reports_remaining_time() {
        let tuning = TuningParameters::default();
        let world = create_test_world();
        let integrator = FallIntegrator::new(&tuning);
        let mut state = airborne_state(&tuning, tuning.standing_half_height + 5.0);
        state.velocity.z = -500.0;
        let mut events = Vec::new();

        let outcome = integrator.integrate(&mut state, &world, &FallInput::default(), 0.05, &mut events);

        match outcome {
            FallOutcome::Landed { hit, remaining_time } => {
                assert!(hit.impact_normal.z > 0.99);
                assert!(remaining_time > 0.0 && remaining_time < 0.05);
            }
            other => panic!("expected landing, got {other:?}"),
        }
        assert!(state.base_position().z >= -1e-3);
    }

    #[test]
    fn test_steep_slope_is_not_a_landing() {
        let tuning = TuningParameters::default();
        let mut world = CollisionWorld::new();
        // 60 degree slope
        world.add_oriented_box(
            Vec3::new(0.0, 0.0, -100.0),
            Vec3::new(500.0, 500.0, 100.0),
            Quat::from_rotation_y(60f32.to_radians()),
            ContentFlags::SOLID,
            None,
        );
        let integrator = FallIntegrator::new(&tuning);
        let mut state = airborne_state(&tuning, 300.0);
        state.velocity.z = -800.0;
        let mut events = Vec::new();

        for _ in 0..20 {
            let outcome = integrator.integrate(&mut state, &world, &FallInput::default(), 0.02, &mut events);
            assert!(
                !matches!(outcome, FallOutcome::Landed { .. }),
                "landed on an unwalkable slope at {:?}",
                state.position
            );
        }
        assert!(events.iter().any(|e| matches!(e, MovementEvent::Impact { .. })));
        assert!(state.velocity.x.abs() > 1.0, "should be sliding off the slope");
    }

    #[test]
    fn test_held_jump_force_suppresses_gravity() {
        let tuning = TuningParameters {
            jump_max_hold_time: 0.1,
            apply_gravity_while_jumping: false,
            ..Default::default()
        };
        let world = create_test_world();
        let integrator = FallIntegrator::new(&tuning);
        let mut state = airborne_state(&tuning, 500.0);
        state.velocity.z = tuning.jump_z_velocity;
        state.jump_force_time_remaining = 0.1;
        let mut events = Vec::new();

        integrator.integrate(&mut state, &world, &FallInput::default(), 0.05, &mut events);
        assert_eq!(state.velocity.z, tuning.jump_z_velocity, "no gravity inside the window");

        integrator.integrate(&mut state, &world, &FallInput::default(), 0.1, &mut events);
        assert!(events.contains(&MovementEvent::JumpForceEnded));
        let expected = tuning.jump_z_velocity + tuning.gravity_z * 0.05;
        assert!((state.velocity.z - expected).abs() < 1e-2);
    }

    #[test]
    fn test_ditch_jitter_is_bounded_and_seeded() {
        let tuning = TuningParameters::default();
        let integrator = FallIntegrator::new(&tuning);
        let max_speed = tuning.run_speed;

        let mut a = airborne_state(&tuning, 100.0);
        let mut b = airborne_state(&tuning, 100.0);
        integrator.ditch_jitter(&mut a, max_speed);
        integrator.ditch_jitter(&mut b, max_speed);

        assert_eq!(a.velocity, b.velocity, "same seed, same kick");
        assert!(a.velocity.x.abs() <= 0.125 * max_speed);
        assert!(a.velocity.y.abs() <= 0.125 * max_speed);
        assert_eq!(a.velocity.z, tuning.jump_z_velocity * 0.25);
    }

    #[test]
    fn test_perch_check_needs_a_radius() {
        let still = Vec3::new(0.1, 0.0, 0.0);
        let disabled = TuningParameters::default();
        assert_eq!(disabled.perch_radius_threshold, 0.0);
        let integrator = FallIntegrator::new(&disabled);
        assert!(!integrator.is_stuck_on_perch(1.0, 1.0, 0.7, still, 0.02));

        let enabled = TuningParameters {
            perch_radius_threshold: 15.0,
            ..Default::default()
        };
        let integrator = FallIntegrator::new(&enabled);
        assert!(integrator.is_stuck_on_perch(1.0, 1.0, 0.7, still, 0.02));
        assert!(!integrator.is_stuck_on_perch(0.5, 1.0, 0.7, still, 0.02), "blocked slide");
        assert!(!integrator.is_stuck_on_perch(1.0, 0.5, 0.7, still, 0.02), "first impact unwalkable");
        assert!(
            !integrator.is_stuck_on_perch(1.0, 1.0, 0.7, Vec3::new(10.0, 0.0, 0.0), 0.02),
            "body got away"
        );
    }

    #[test]
    fn test_v_ditch_does_not_trap_or_tunnel() {
        let tuning = TuningParameters::default();
        let mut world = CollisionWorld::new();
        // Two 60 degree slopes meeting at x = 0, z = 0
        world.add_oriented_box(
            Vec3::new(-192.3, 0.0, 293.0),
            Vec3::new(350.0, 500.0, 20.0),
            Quat::from_rotation_y(60f32.to_radians()),
            ContentFlags::SOLID,
            None,
        );
        world.add_oriented_box(
            Vec3::new(192.3, 0.0, 293.0),
            Vec3::new(350.0, 500.0, 20.0),
            Quat::from_rotation_y(-60f32.to_radians()),
            ContentFlags::SOLID,
            None,
        );
        let integrator = FallIntegrator::new(&tuning);
        let mut state = airborne_state(&tuning, 400.0);
        let mut events = Vec::new();

        for _ in 0..100 {
            integrator.integrate(&mut state, &world, &FallInput::default(), 0.02, &mut events);
            assert!(state.position.is_finite());
            assert!(state.velocity.is_finite());
        }
        assert!(
            !world.overlap_blocking(
                state.position,
                CapsuleShape::new(tuning.capsule_radius - 1.0, state.half_height - 1.0)
            ),
            "body ended inside the slopes at {:?}",
            state.position
        );
    }
}
