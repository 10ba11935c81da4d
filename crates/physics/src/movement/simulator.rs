//! Per-tick movement orchestration.
//!
//! This is the main entry point for character movement. It takes one input
//! command per tick and advances the [`MovementState`] through the collision
//! world, handing off between the ground, fall, fly, ladder and swim moves.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use glam::Vec3;

use crate::collision::{CollisionQuery, FloorResult, HitResult, KINDA_SMALL_NUMBER};

use super::adhesion::GroundAdhesionPolicy;
use super::config::{TuningParameters, JUMP_VELOCITY, MAX_MODE_CHANGES_PER_TICK, MIN_TICK_TIME};
use super::crouch::{CrouchPass, CrouchTransitioner};
use super::fall::{FallInput, FallIntegrator, FallOutcome};
use super::jump;
use super::slide_move::SlideMover;
use super::state::{BrakingWindow, ContactMode, MoveCommand, MovementEvent, MovementState};
use super::velocity::{is_nearly_zero, size_2d, SpeedFlags, VelocityInput, VelocityResolver};

/// Character movement simulator.
///
/// Holds the tuning and nothing else; all per-character data lives in the
/// [`MovementState`] passed to each call, so one simulator can drive any
/// number of characters.
///
/// # Example
///
/// ```ignore
/// let simulator = MovementSimulator::new(TuningParameters::default());
/// let mut state = MovementState::new(spawn, simulator.tuning());
/// simulator.spawn_at(&mut state, spawn, &world);
///
/// // Each tick:
/// let events = simulator.advance_tick(&mut state, &command, &world, delta_time);
/// ```
#[derive(Debug, Clone)]
pub struct MovementSimulator {
    tuning: TuningParameters,
}

impl MovementSimulator {
    pub fn new(tuning: TuningParameters) -> Self {
        Self { tuning }
    }

    pub fn with_default_tuning() -> Self {
        Self::new(TuningParameters::default())
    }

    pub fn tuning(&self) -> &TuningParameters {
        &self.tuning
    }

    /// Place the body at `spawn` and settle it onto the floor below, if any.
    pub fn spawn_at(&self, state: &mut MovementState, spawn: Vec3, world: &dyn CollisionQuery) {
        let mut events = Vec::new();
        let mover = SlideMover::new(world, &self.tuning);

        state.position = spawn;
        state.velocity = Vec3::ZERO;

        let floor = mover.find_floor(state, spawn);
        if floor.is_walkable_floor() {
            self.set_contact_mode(state, ContactMode::landed(), &mut events);
            state.current_floor = floor;
            mover.adjust_floor_height(state);
        } else {
            self.set_contact_mode(state, ContactMode::Falling, &mut events);
        }
        log::debug!("spawned at {:?} ({})", state.position, state.contact.name());
    }

    /// Advance one tick.
    ///
    /// Returns everything notable that happened, in order. A tick shorter
    /// than `MIN_TICK_TIME`, or one taken while the host overrides motion,
    /// does nothing.
    pub fn advance_tick(
        &self,
        state: &mut MovementState,
        command: &MoveCommand,
        world: &dyn CollisionQuery,
        delta_time: f32,
    ) -> Vec<MovementEvent> {
        let mut events = Vec::new();
        if state.motion_override || delta_time < MIN_TICK_TIME {
            return events;
        }

        let t = &self.tuning;
        let resolver = VelocityResolver::new(t);
        let crouch = CrouchTransitioner::new(t);
        let delta_time = delta_time.min(t.max_delta_time);

        state.tick += 1;
        state.apex_attempts = 0;

        self.update_view_angles(state, command);
        state.acceleration = self.input_acceleration(state, command);

        // Before movement
        state.velocity = resolver.clamp_vertical(state.velocity);
        self.check_jump_input(state, command, &mut events);
        crouch.update_crouching(
            state,
            world,
            command.wants_crouch(),
            delta_time,
            CrouchPass::BeforeMovement,
            &mut events,
        );

        let speed = self.speed_flags(state, command);
        self.run_movement(state, world, speed, command.analog_magnitude(), delta_time, &mut events);

        // After movement
        state.velocity = resolver.clamp_axes(resolver.clamp_vertical(state.velocity));
        if state.jump.clear_input(delta_time, t.jump_max_hold_time) {
            state.jump_force_time_remaining = 0.0;
        }
        self.update_surface_friction(state, world);
        crouch.update_crouching(
            state,
            world,
            command.wants_crouch(),
            delta_time,
            CrouchPass::AfterMovement,
            &mut events,
        );

        self.update_braking_window(state, delta_time, &mut events);
        state.crouch_frame_tolerated = state.crouch.is_crouched();

        if t.roll_angle != 0.0 && t.roll_speed != 0.0 {
            state.view_angles.z = self.camera_roll(state).to_radians();
        }

        if t.show_pos {
            log::info!(
                "pos: {:.2?} ang: {:.3?} vel: {:.2}",
                state.position,
                state.view_angles,
                state.velocity.length()
            );
        }

        events
    }

    // ========================================================================
    // Mode changes
    // ========================================================================

    /// The only place the contact mode changes.
    ///
    /// Changing kind emits [`MovementEvent::ModeChanged`] and resets the jump
    /// latch unless a held jump is carrying the body into a fall.
    pub fn set_contact_mode(&self, state: &mut MovementState, mode: ContactMode, events: &mut Vec<MovementEvent>) {
        let from = state.contact;
        if from == mode {
            return;
        }
        state.contact = mode;

        if from.same_kind(&mode) {
            return;
        }

        if !state.jump.is_pressed() || !mode.is_falling() {
            state.jump.reset(mode.is_falling());
            state.jump_force_time_remaining = 0.0;
        }

        match mode {
            ContactMode::Grounded { .. } => {
                state.velocity.z = 0.0;
            }
            _ => {
                state.current_floor = FloorResult::none(state.position);
            }
        }

        log::debug!("contact {} -> {} at {:?}", from.name(), mode.name(), state.position);
        events.push(MovementEvent::ModeChanged { from, to: mode });
    }

    /// Enter or leave no-clip. Leaving drops the body into a fall.
    pub fn set_no_clip(&self, state: &mut MovementState, enabled: bool, events: &mut Vec<MovementEvent>) {
        if enabled {
            self.set_contact_mode(state, ContactMode::Flying, events);
        } else if state.is_no_clip() {
            self.set_contact_mode(state, ContactMode::Falling, events);
        }
    }

    pub fn toggle_no_clip(&self, state: &mut MovementState, events: &mut Vec<MovementEvent>) {
        let enabled = !state.is_no_clip();
        self.set_no_clip(state, enabled, events);
    }

    /// Attach to or detach from a ladder. While attached the host owns velocity.
    pub fn set_on_ladder(&self, state: &mut MovementState, on_ladder: bool, events: &mut Vec<MovementEvent>) {
        if on_ladder {
            self.set_contact_mode(state, ContactMode::OnLadder, events);
        } else if matches!(state.contact, ContactMode::OnLadder) {
            self.set_contact_mode(state, ContactMode::Falling, events);
        }
    }

    // ========================================================================
    // Input
    // ========================================================================

    fn update_view_angles(&self, state: &mut MovementState, command: &MoveCommand) {
        state.view_angles.x += command.view_delta.0;
        state.view_angles.y += command.view_delta.1;

        const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.01;
        state.view_angles.x = state.view_angles.x.clamp(-PITCH_LIMIT, PITCH_LIMIT);

        while state.view_angles.y > PI {
            state.view_angles.y -= TAU;
        }
        while state.view_angles.y < -PI {
            state.view_angles.y += TAU;
        }
    }

    /// Stick input mapped onto the horizontal facing, scaled to max acceleration.
    fn input_acceleration(&self, state: &MovementState, command: &MoveCommand) -> Vec3 {
        let wish = state.forward_direction() * command.forward_move + state.right_direction() * command.right_move;
        wish.clamp_length_max(1.0) * self.tuning.max_acceleration
    }

    fn speed_flags(&self, state: &MovementState, command: &MoveCommand) -> SpeedFlags {
        SpeedFlags {
            no_clip: state.is_no_clip(),
            sprinting: command.wants_sprint(),
            walking: command.wants_walk(),
            crouched: state.crouch.is_crouched(),
            crouch_tolerated: state.crouch_frame_tolerated,
        }
    }

    /// Try the latched jump. A new jump arms the apex notify and the
    /// jump-force window; a held one only re-applies the impulse.
    fn check_jump_input(&self, state: &mut MovementState, command: &MoveCommand, events: &mut Vec<MovementEvent>) {
        let t = &self.tuning;
        state.jump.read_input(command.wants_jump(), t.auto_bunny_hop);
        if !state.jump.is_pressed() {
            return;
        }

        if state.contact.is_falling() {
            state.jump.count_fall_as_jump();
        }
        let did_jump = self.do_jump(state, events);
        if state.jump.record_attempt(did_jump) {
            state.notify_apex = true;
            state.jump_force_time_remaining = t.jump_max_hold_time;
            events.push(MovementEvent::Jumped);
            log::debug!(
                "jump {} at {:?}, v.z {:.1}",
                state.jump.jump_count(),
                state.position,
                state.velocity.z
            );
        }
    }

    /// Apply the jump impulse and switch to falling. Returns whether it happened.
    pub fn do_jump(&self, state: &mut MovementState, events: &mut Vec<MovementEvent>) -> bool {
        let t = &self.tuning;
        let allowed = state.jump.can_jump(
            state.contact.is_grounded(),
            state.contact.is_falling(),
            t.jump_max_hold_time,
            t.jump_max_count,
        );
        if state.is_no_clip() || !jump::can_attempt_jump(state) || !allowed {
            return false;
        }
        jump::apply_jump_velocity(state, t);
        self.set_contact_mode(state, ContactMode::Falling, events);
        true
    }

    // ========================================================================
    // Movement modes
    // ========================================================================

    fn run_movement(
        &self,
        state: &mut MovementState,
        world: &dyn CollisionQuery,
        speed: SpeedFlags,
        analog_modifier: f32,
        delta_time: f32,
        events: &mut Vec<MovementEvent>,
    ) {
        let mut remaining = delta_time;
        let mut mode_changes = 0;

        while remaining >= MIN_TICK_TIME {
            if mode_changes >= MAX_MODE_CHANGES_PER_TICK {
                log::trace!("mode change limit hit with {:.5}s left", remaining);
                break;
            }

            let before = state.contact;
            let elapsed = delta_time - remaining;
            remaining = match state.contact {
                ContactMode::Grounded { .. } => self.phys_walking(state, world, speed, analog_modifier, remaining, events),
                ContactMode::Falling => {
                    let input = FallInput {
                        speed,
                        analog_modifier,
                        tick_elapsed: elapsed,
                    };
                    self.phys_falling(state, world, &input, remaining, events)
                }
                ContactMode::Flying => self.phys_flying(state, speed, analog_modifier, remaining),
                ContactMode::OnLadder => self.phys_ladder(state, world, speed, analog_modifier, remaining, events),
                ContactMode::Swimming => self.phys_swimming(state, world, speed, analog_modifier, remaining, events),
            };

            if state.contact.same_kind(&before) {
                break;
            }
            mode_changes += 1;
        }
    }

    /// Ground move. Returns time left over if the body left the ground.
    fn phys_walking(
        &self,
        state: &mut MovementState,
        world: &dyn CollisionQuery,
        speed: SpeedFlags,
        analog_modifier: f32,
        delta_time: f32,
        events: &mut Vec<MovementEvent>,
    ) -> f32 {
        let t = &self.tuning;
        let mover = SlideMover::new(world, t);
        let resolver = VelocityResolver::new(t);
        let adhesion = GroundAdhesionPolicy::new(t);

        let mut remaining = delta_time;
        let mut iterations = 0;

        while remaining >= MIN_TICK_TIME && iterations < t.max_simulation_iterations {
            iterations += 1;
            let time_tick = t.simulation_time_step(remaining, iterations);
            remaining -= time_tick;

            let old_location = state.position;
            let old_floor = state.current_floor;

            // Ground velocity is always horizontal.
            state.velocity.z = 0.0;
            let input = VelocityInput::from_state(state, speed, analog_modifier);
            state.velocity = resolver.resolve_velocity(
                &input,
                time_tick,
                t.ground_friction,
                false,
                t.braking_deceleration_walking,
            );
            adhesion.apply(state);

            let velocity = state.velocity;
            let delta = velocity * time_tick;
            let step_floor = if is_nearly_zero(delta, KINDA_SMALL_NUMBER) {
                None
            } else {
                mover.move_along_floor(state, velocity, time_tick, events)
            };

            state.current_floor = match step_floor {
                Some(floor) => floor,
                None => mover.find_floor(state, state.position),
            };

            if state.current_floor.is_walkable_floor() {
                if self.should_catch_air(state, world, &old_floor) {
                    log::debug!("caught air off a ramp at {:.1} cm/s", state.horizontal_speed());
                    return self.start_falling(state, remaining, time_tick, delta, old_location, events);
                }
                mover.adjust_floor_height(state);
            } else {
                return self.start_falling(state, remaining, time_tick, delta, old_location, events);
            }

            if time_tick >= MIN_TICK_TIME {
                let moved = (state.position - old_location) / time_tick;
                state.velocity = resolver.clamp_axes(Vec3::new(moved.x, moved.y, 0.0));
            }

            if state.position == old_location {
                remaining = 0.0;
                break;
            }
        }

        remaining
    }

    /// Leave the ground, refunding the part of the sub-step that was not travelled.
    fn start_falling(
        &self,
        state: &mut MovementState,
        remaining: f32,
        time_tick: f32,
        delta: Vec3,
        old_location: Vec3,
        events: &mut Vec<MovementEvent>,
    ) -> f32 {
        let desired = delta.length();
        let actual = size_2d(state.position - old_location);
        let refund = if desired > KINDA_SMALL_NUMBER {
            time_tick * (1.0 - (actual / desired).min(1.0))
        } else {
            0.0
        };
        self.set_contact_mode(state, ContactMode::Falling, events);
        remaining + refund
    }

    /// Launch off a ramp crest when moving fast enough that the floor cannot hold the body.
    fn should_catch_air(&self, state: &MovementState, world: &dyn CollisionQuery, old_floor: &FloorResult) -> bool {
        let speed_2d = size_2d(state.velocity);
        if speed_2d <= KINDA_SMALL_NUMBER {
            return false;
        }

        let old_friction = world.surface_friction(&old_floor.hit);
        let sliding = old_friction * self.tuning.speed_mult_max / speed_2d < 0.5;

        let new_floor = &state.current_floor;
        let gaining_ramp = new_floor.hit.impact_normal.z - old_floor.hit.impact_normal.z >= 0.0;

        let going_up_ramp = state.velocity.dot(old_floor.hit.impact_normal) < 0.0;
        let strafing = state.acceleration.dot(state.right_direction()).abs() > 0.0;

        sliding && gaining_ramp && (going_up_ramp || strafing)
    }

    fn phys_falling(
        &self,
        state: &mut MovementState,
        world: &dyn CollisionQuery,
        input: &FallInput,
        delta_time: f32,
        events: &mut Vec<MovementEvent>,
    ) -> f32 {
        let integrator = FallIntegrator::new(&self.tuning);
        match integrator.integrate(state, world, input, delta_time, events) {
            FallOutcome::Airborne => 0.0,
            FallOutcome::Landed { hit, remaining_time } => {
                self.process_landed(state, world, &hit, events);
                remaining_time
            }
            FallOutcome::EnteredFluid { remaining_time } => {
                events.push(MovementEvent::EnteredFluid);
                self.set_contact_mode(state, ContactMode::Swimming, events);
                remaining_time
            }
        }
    }

    /// Touch down on `hit` and settle onto the floor.
    fn process_landed(
        &self,
        state: &mut MovementState,
        world: &dyn CollisionQuery,
        hit: &HitResult,
        events: &mut Vec<MovementEvent>,
    ) {
        let mover = SlideMover::new(world, &self.tuning);
        let impact_velocity = state.velocity;

        events.push(MovementEvent::Landed { impact_velocity });
        log::debug!(
            "landed at {:?} on normal {:?}, impact v.z {:.1}",
            state.position,
            hit.impact_normal,
            impact_velocity.z
        );
        self.set_contact_mode(state, ContactMode::landed(), events);

        state.current_floor = mover.find_floor(state, state.position);
        if state.current_floor.is_walkable_floor() {
            mover.adjust_floor_height(state);
        } else {
            // Ditch or edge: nothing to stand on after all.
            self.set_contact_mode(state, ContactMode::Falling, events);
        }
    }

    /// No-clip flight: collision is ignored.
    fn phys_flying(&self, state: &mut MovementState, speed: SpeedFlags, analog_modifier: f32, delta_time: f32) -> f32 {
        let t = &self.tuning;
        let input = VelocityInput::from_state(state, speed, analog_modifier);
        state.velocity = VelocityResolver::new(t).resolve_velocity(
            &input,
            delta_time,
            0.5 * t.fluid_friction,
            true,
            t.braking_deceleration_flying,
        );
        state.position += state.velocity * delta_time;
        0.0
    }

    /// Ladder move: host-driven velocity, swept and slid along whatever blocks it.
    fn phys_ladder(
        &self,
        state: &mut MovementState,
        world: &dyn CollisionQuery,
        speed: SpeedFlags,
        analog_modifier: f32,
        delta_time: f32,
        events: &mut Vec<MovementEvent>,
    ) -> f32 {
        let t = &self.tuning;
        let input = VelocityInput::from_state(state, speed, analog_modifier);
        state.velocity = VelocityResolver::new(t).resolve_velocity(&input, delta_time, 0.0, false, 0.0);
        self.swept_slide(state, world, delta_time, events);
        0.0
    }

    /// Swimming: fluid drag, then a swept slide. Leaves to falling outside the fluid.
    fn phys_swimming(
        &self,
        state: &mut MovementState,
        world: &dyn CollisionQuery,
        speed: SpeedFlags,
        analog_modifier: f32,
        delta_time: f32,
        events: &mut Vec<MovementEvent>,
    ) -> f32 {
        let t = &self.tuning;
        let input = VelocityInput::from_state(state, speed, analog_modifier);
        state.velocity = VelocityResolver::new(t).resolve_velocity(
            &input,
            delta_time,
            t.fluid_friction,
            true,
            t.braking_deceleration_swimming,
        );
        self.swept_slide(state, world, delta_time, events);

        let capsule = state.capsule(t.capsule_radius);
        if !world.is_in_fluid(state.position, capsule) {
            self.set_contact_mode(state, ContactMode::Falling, events);
        }
        0.0
    }

    fn swept_slide(
        &self,
        state: &mut MovementState,
        world: &dyn CollisionQuery,
        delta_time: f32,
        events: &mut Vec<MovementEvent>,
    ) {
        let mover = SlideMover::new(world, &self.tuning);
        let delta = state.velocity * delta_time;
        let mut hit = mover.safe_move(state, delta);
        if hit.is_valid_blocking_hit() {
            events.push(MovementEvent::Impact { normal: hit.normal });
            let normal = hit.normal;
            mover.slide_along_surface(state, delta, 1.0 - hit.time, normal, &mut hit, true, events);
        }
    }

    // ========================================================================
    // After movement
    // ========================================================================

    /// Floor under the body for friction purposes, computed at most once per tick.
    pub fn ground_info(&self, state: &mut MovementState, world: &dyn CollisionQuery) -> FloorResult {
        let grounded = state.contact.is_grounded();
        let current_floor = state.current_floor;
        let position = state.position;
        let half_height = state.half_height;
        let walkable_floor_z = state.walkable_floor_z;
        let reach = self.tuning.ground_trace_distance + half_height;

        state.ground_info.get_or_refresh(state.tick, || {
            if grounded {
                return current_floor;
            }
            let hit = world.line_trace(position, position - Vec3::new(0.0, 0.0, reach));
            FloorResult {
                blocking_hit: hit.blocking,
                walkable: world.is_walkable(&hit, walkable_floor_z),
                floor_distance: (hit.distance() - half_height).max(0.0),
                hit,
            }
        })
    }

    fn update_surface_friction(&self, state: &mut MovementState, world: &dyn CollisionQuery) {
        if state.contact.is_grounded() && state.current_floor.is_walkable_floor() {
            let ground = self.ground_info(state, world);
            state.surface_friction = world.surface_friction(&ground.hit);
        } else if matches!(state.contact, ContactMode::OnLadder)
            || state.is_no_clip()
            || state.velocity.z > JUMP_VELOCITY
            || state.velocity.z <= 0.0
        {
            state.surface_friction = 1.0;
        }
    }

    fn update_braking_window(&self, state: &mut MovementState, delta_time: f32, events: &mut Vec<MovementEvent>) {
        if let ContactMode::Grounded {
            braking: BrakingWindow::Open { elapsed_ms },
        } = state.contact
        {
            let elapsed_ms = elapsed_ms + delta_time * 1000.0;
            let braking = if elapsed_ms >= self.tuning.braking_window_ms {
                BrakingWindow::Elapsed
            } else {
                BrakingWindow::Open { elapsed_ms }
            };
            self.set_contact_mode(state, ContactMode::Grounded { braking }, events);
        }
    }

    /// View roll from strafe speed, in degrees.
    pub fn camera_roll(&self, state: &MovementState) -> f32 {
        let t = &self.tuning;
        if t.roll_speed == 0.0 || t.roll_angle == 0.0 {
            return 0.0;
        }
        let side = state.velocity.dot(state.right_direction());
        let magnitude = side.abs();
        let roll = if magnitude < t.roll_speed {
            magnitude * t.roll_angle / t.roll_speed
        } else {
            t.roll_angle
        };
        if side < 0.0 {
            -roll
        } else {
            roll
        }
    }
}

impl Default for MovementSimulator {
    fn default() -> Self {
        Self::with_default_tuning()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{CapsuleShape, CollisionWorld, ContentFlags, SurfaceMaterial};
    use crate::movement::state::CommandButtons;
    use crate::movement::state::CrouchPhase;
    use crate::random::SeededRandom;
    use glam::Quat;

    const DT: f32 = 1.0 / 64.0;

    fn create_test_world() -> CollisionWorld {
        let mut world = CollisionWorld::new();
        // Floor, top surface at z = 0
        world.add_box(
            Vec3::new(0.0, 0.0, -50.0),
            Vec3::new(2000.0, 2000.0, 50.0),
            ContentFlags::SOLID,
        );
        world
    }

    /// Floor plus a 30 degree ramp, a 50 degree ramp and a 60/60 V-ditch.
    fn create_sloped_world() -> CollisionWorld {
        let mut world = create_test_world();
        world.add_oriented_box(
            Vec3::new(600.0, 0.0, -100.0),
            Vec3::new(400.0, 400.0, 100.0),
            Quat::from_rotation_y(30f32.to_radians()),
            ContentFlags::SOLID,
            None,
        );
        world.add_oriented_box(
            Vec3::new(-600.0, 0.0, -100.0),
            Vec3::new(300.0, 400.0, 100.0),
            Quat::from_rotation_y(-50f32.to_radians()),
            ContentFlags::SOLID,
            None,
        );
        add_v_ditch(&mut world, Vec3::new(0.0, 800.0, 0.0));
        world
    }

    /// Two 60 degree slopes meeting along the Y axis at `vertex`.
    fn add_v_ditch(world: &mut CollisionWorld, vertex: Vec3) {
        world.add_oriented_box(
            vertex + Vec3::new(-192.3, 0.0, 293.0),
            Vec3::new(350.0, 300.0, 20.0),
            Quat::from_rotation_y(60f32.to_radians()),
            ContentFlags::SOLID,
            None,
        );
        world.add_oriented_box(
            vertex + Vec3::new(192.3, 0.0, 293.0),
            Vec3::new(350.0, 300.0, 20.0),
            Quat::from_rotation_y(-60f32.to_radians()),
            ContentFlags::SOLID,
            None,
        );
    }

    fn random_command(rng: &mut SeededRandom) -> MoveCommand {
        let mut cmd = MoveCommand {
            forward_move: rng.next_centered() * 2.0,
            right_move: rng.next_centered() * 2.0,
            view_delta: (rng.next_centered() * 0.2, rng.next_centered() * 0.5),
            ..Default::default()
        };
        for button in [CommandButtons::JUMP, CommandButtons::CROUCH, CommandButtons::SPRINT] {
            if rng.next_unit() < 0.3 {
                cmd.buttons.press(button);
            }
        }
        cmd
    }

    fn spawn(simulator: &MovementSimulator, world: &CollisionWorld) -> MovementState {
        let tuning = simulator.tuning();
        let origin = Vec3::new(0.0, 0.0, tuning.standing_half_height + 2.0);
        let mut state = MovementState::new(origin, tuning);
        simulator.spawn_at(&mut state, origin, world);
        state
    }

    fn idle() -> MoveCommand {
        MoveCommand::default()
    }

    fn forward() -> MoveCommand {
        MoveCommand {
            forward_move: 1.0,
            ..Default::default()
        }
    }

    fn jump() -> MoveCommand {
        let mut cmd = MoveCommand::default();
        cmd.buttons.press(CommandButtons::JUMP);
        cmd
    }

    #[test]
    fn test_spawn_settles_on_floor() {
        let simulator = MovementSimulator::default();
        let world = create_test_world();
        let state = spawn(&simulator, &world);

        assert!(state.contact.is_grounded(), "spawned {:?}", state.contact);
        assert!(state.current_floor.is_walkable_floor());
        let gap = state.base_position().z;
        assert!(gap > 0.0 && gap < 3.0, "floor gap {}", gap);
    }

    #[test]
    fn test_guards_make_tick_a_no_op() {
        let simulator = MovementSimulator::default();
        let world = create_test_world();
        let mut state = spawn(&simulator, &world);
        state.velocity = Vec3::new(300.0, 0.0, 0.0);
        let before = state.position;

        let events = simulator.advance_tick(&mut state, &forward(), &world, 1.0e-7);
        assert!(events.is_empty());
        assert_eq!(state.position, before);
        assert_eq!(state.tick, 0);

        state.motion_override = true;
        simulator.advance_tick(&mut state, &forward(), &world, DT);
        assert_eq!(state.position, before, "overridden motion must not move");
    }

    #[test]
    fn test_forward_input_reaches_run_speed() {
        let simulator = MovementSimulator::default();
        let world = create_test_world();
        let mut state = spawn(&simulator, &world);

        for _ in 0..120 {
            simulator.advance_tick(&mut state, &forward(), &world, DT);
        }

        let run_speed = simulator.tuning().run_speed;
        assert!(state.contact.is_grounded());
        assert!(
            (state.horizontal_speed() - run_speed).abs() < 2.0,
            "speed {} vs run {}",
            state.horizontal_speed(),
            run_speed
        );
        assert!(state.position.x > 300.0);
    }

    #[test]
    fn test_ground_coast_brakes_to_zero_and_stays() {
        let simulator = MovementSimulator::default();
        let world = create_test_world();
        let mut state = spawn(&simulator, &world);
        state.velocity = Vec3::new(500.0, 0.0, 0.0);

        let mut previous = state.horizontal_speed();
        let mut stopped_at = None;
        for tick in 0..200 {
            simulator.advance_tick(&mut state, &idle(), &world, 0.02);
            let speed = state.horizontal_speed();
            assert!(speed <= previous + 1e-3, "speed rose from {} to {}", previous, speed);
            assert!(state.velocity.x >= 0.0, "braking reversed direction");
            previous = speed;
            if speed == 0.0 && stopped_at.is_none() {
                stopped_at = Some(tick);
            }
        }

        let stopped_at = stopped_at.expect("body should come to rest");
        assert!(stopped_at < 50, "took {} ticks to stop", stopped_at);
        assert_eq!(state.velocity, Vec3::ZERO);
    }

    #[test]
    fn test_jump_apex_and_landing() {
        let simulator = MovementSimulator::default();
        let world = create_test_world();
        let mut state = spawn(&simulator, &world);

        let events = simulator.advance_tick(&mut state, &jump(), &world, DT);
        assert!(events.contains(&MovementEvent::Jumped));
        assert!(state.contact.is_falling());

        fn scan(events: &[MovementEvent], tick: u32, apex_time: &mut Option<f32>, landed: &mut bool) {
            for event in events {
                match event {
                    MovementEvent::ApexReached { time_into_tick } => {
                        *apex_time = Some(tick as f32 * DT + time_into_tick);
                    }
                    MovementEvent::Landed { .. } => *landed = true,
                    _ => {}
                }
            }
        }

        let mut apex_time = None;
        let mut landed = false;
        scan(&events, 0, &mut apex_time, &mut landed);

        for tick in 1..80 {
            let events = simulator.advance_tick(&mut state, &idle(), &world, DT);
            scan(&events, tick, &mut apex_time, &mut landed);
            if landed {
                break;
            }
        }

        let tuning = simulator.tuning();
        let expected = tuning.jump_z_velocity / -tuning.gravity_z;
        let apex_time = apex_time.expect("apex should be reported");
        assert!((apex_time - expected).abs() < 1e-3, "apex at {}, expected {}", apex_time, expected);
        assert!(landed, "should land again");
        assert!(state.contact.is_grounded());
        assert_eq!(state.velocity.z, 0.0);
    }

    #[test]
    fn test_braking_window_opens_on_landing() {
        let simulator = MovementSimulator::default();
        let world = create_test_world();
        let mut state = spawn(&simulator, &world);
        assert!(matches!(
            state.contact,
            ContactMode::Grounded {
                braking: BrakingWindow::Open { .. }
            }
        ));

        simulator.advance_tick(&mut state, &idle(), &world, 0.01);
        assert!(!state.contact.is_braking_ground_move(), "10 ms is inside the window");

        simulator.advance_tick(&mut state, &idle(), &world, 0.01);
        assert!(state.contact.is_braking_ground_move());
    }

    #[test]
    fn test_air_strafing_gains_speed_across_hops() {
        let simulator = MovementSimulator::default();
        let world = create_test_world();
        let mut state = spawn(&simulator, &world);
        state.velocity = Vec3::new(simulator.tuning().run_speed, 0.0, 0.0);

        for _ in 0..192 {
            // Keep facing along velocity and strafe right; auto-hop on every landing.
            let desired_yaw = state.velocity.y.atan2(state.velocity.x);
            let mut cmd = jump();
            cmd.right_move = 1.0;
            cmd.view_delta = (0.0, desired_yaw - state.view_angles.y);
            simulator.advance_tick(&mut state, &cmd, &world, DT);
        }

        let run_speed = simulator.tuning().run_speed;
        assert!(
            state.horizontal_speed() > run_speed + 50.0,
            "strafe hopping should build speed, got {}",
            state.horizontal_speed()
        );
    }

    #[test]
    fn test_axis_limit_holds_under_random_input() {
        let tuning = TuningParameters {
            axis_speed_limit: 800.0,
            ..Default::default()
        };
        let simulator = MovementSimulator::new(tuning);
        let world = create_test_world();
        let mut state = spawn(&simulator, &world);
        state.velocity = Vec3::new(5000.0, -5000.0, 0.0);
        let mut rng = SeededRandom::new(42);

        for _ in 0..400 {
            let cmd = random_command(&mut rng);
            simulator.advance_tick(&mut state, &cmd, &world, DT);

            let limit = simulator.tuning().axis_speed_limit;
            assert!(state.velocity.x.abs() <= limit, "v.x {}", state.velocity.x);
            assert!(state.velocity.y.abs() <= limit, "v.y {}", state.velocity.y);
            assert!(state.velocity.z.abs() <= limit, "v.z {}", state.velocity.z);
            assert!(state.position.is_finite());
        }
    }

    #[test]
    fn test_slope_deflection_respects_axis_limit() {
        let tuning = TuningParameters {
            axis_speed_limit: 800.0,
            speed_mult_min: 300.0,
            speed_mult_max: 400.0,
            ..Default::default()
        };
        let limit = tuning.axis_speed_limit;
        let simulator = MovementSimulator::new(tuning);
        let mut world = CollisionWorld::new();
        // Too steep to stand on at this speed, so the fall slides along it.
        world.add_oriented_box(
            Vec3::new(0.0, 0.0, -100.0),
            Vec3::new(2000.0, 2000.0, 100.0),
            Quat::from_rotation_y(30f32.to_radians()),
            ContentFlags::SOLID,
            None,
        );
        let mut state = MovementState::new(Vec3::new(-500.0, 0.0, 600.0), simulator.tuning());
        state.velocity = Vec3::new(800.0, 0.0, -2500.0);

        let mut impacts = 0;
        for tick in 0..32 {
            let events = simulator.advance_tick(&mut state, &idle(), &world, DT);
            impacts += events
                .iter()
                .filter(|e| matches!(e, MovementEvent::Impact { .. }))
                .count();
            assert!(state.velocity.x.abs() <= limit, "tick {}: v.x {}", tick, state.velocity.x);
            assert!(state.velocity.y.abs() <= limit, "tick {}: v.y {}", tick, state.velocity.y);
        }
        assert!(impacts > 0, "the fall should have been deflected by the slope");
    }

    #[test]
    fn test_axis_limit_holds_over_sloped_geometry() {
        let tuning = TuningParameters {
            axis_speed_limit: 800.0,
            speed_mult_min: 300.0,
            speed_mult_max: 400.0,
            ..Default::default()
        };
        let limit = tuning.axis_speed_limit;
        let simulator = MovementSimulator::new(tuning);
        let world = create_sloped_world();

        for seed in [3, 17, 99] {
            let mut rng = SeededRandom::new(seed);
            let mut state = MovementState::new(Vec3::new(0.0, 0.0, 400.0), simulator.tuning());
            state.velocity = Vec3::new(4000.0, 2500.0, -1500.0);

            for tick in 0..600 {
                let cmd = random_command(&mut rng);
                simulator.advance_tick(&mut state, &cmd, &world, DT);

                assert!(
                    state.velocity.x.abs() <= limit && state.velocity.y.abs() <= limit,
                    "seed {} tick {}: velocity {:?} over the axis limit",
                    seed,
                    tick,
                    state.velocity
                );
                assert!(state.position.is_finite(), "seed {} tick {}", seed, tick);
            }
        }
    }

    #[test]
    fn test_body_dropped_into_v_ditch_settles() {
        let tuning = TuningParameters {
            perch_radius_threshold: 15.0,
            ..Default::default()
        };
        let simulator = MovementSimulator::new(tuning.clone());
        let mut world = CollisionWorld::new();
        add_v_ditch(&mut world, Vec3::ZERO);
        let start = Vec3::new(5.0, 0.0, 400.0);
        let mut state = MovementState::new(start, &tuning);

        let mut settled_at = None;
        for tick in 0..128 {
            let events = simulator.advance_tick(&mut state, &idle(), &world, DT);
            assert!(state.position.is_finite() && state.velocity.is_finite());
            let touched_down = events.iter().any(|e| {
                matches!(
                    e,
                    MovementEvent::Landed { .. }
                        | MovementEvent::ModeChanged {
                            to: ContactMode::Grounded { .. },
                            ..
                        }
                )
            });
            if touched_down {
                settled_at = Some(tick);
                break;
            }
        }

        assert!(settled_at.is_some(), "still falling in the ditch at {:?}", state.position);
        assert!(state.position.z < start.z, "body never left the drop point");
        assert!(state.position.z > 0.0, "body sank through the vertex to {:?}", state.position);
        assert!(
            !world.overlap_blocking(
                state.position,
                CapsuleShape::new(tuning.capsule_radius - 1.0, state.half_height() - 1.0)
            ),
            "body ended inside the slopes at {:?}",
            state.position
        );
    }

    #[test]
    fn test_every_contact_change_is_reported() {
        let simulator = MovementSimulator::default();
        let world = create_sloped_world();
        let mut state = spawn(&simulator, &world);
        let mut rng = SeededRandom::new(7);
        let mut reported = state.contact();
        let mut changes = 0;

        for tick in 0..500 {
            let mut cmd = random_command(&mut rng);
            cmd.forward_move = 1.0;
            for event in simulator.advance_tick(&mut state, &cmd, &world, DT) {
                if let MovementEvent::ModeChanged { from, to } = event {
                    assert!(from.same_kind(&reported), "tick {}: {:?} reported from {:?}", tick, reported, from);
                    assert!(!from.same_kind(&to), "tick {}: same-kind change reported", tick);
                    reported = to;
                    changes += 1;
                }
            }
            assert!(
                state.contact().same_kind(&reported),
                "tick {}: contact {:?} but last reported {:?}",
                tick,
                state.contact(),
                reported
            );
        }
        assert!(changes > 0, "random jumping should change contact");
    }

    #[test]
    fn test_braking_window_elapses_without_mode_events() {
        let simulator = MovementSimulator::default();
        let world = create_test_world();
        let mut state = spawn(&simulator, &world);

        let mut last_elapsed = -1.0;
        for _ in 0..3 {
            let events = simulator.advance_tick(&mut state, &idle(), &world, 0.004);
            assert!(
                !events.iter().any(|e| matches!(e, MovementEvent::ModeChanged { .. })),
                "window progress is not a mode change: {:?}",
                events
            );
            match state.contact() {
                ContactMode::Grounded {
                    braking: BrakingWindow::Open { elapsed_ms },
                } => {
                    assert!(elapsed_ms > last_elapsed, "window should advance");
                    last_elapsed = elapsed_ms;
                }
                other => panic!("window closed early: {:?}", other),
            }
        }

        let events = simulator.advance_tick(&mut state, &idle(), &world, 0.004);
        assert!(!events.iter().any(|e| matches!(e, MovementEvent::ModeChanged { .. })));
        assert_eq!(
            state.contact(),
            ContactMode::Grounded {
                braking: BrakingWindow::Elapsed
            }
        );
    }

    #[test]
    fn test_held_jump_rises_higher_inside_hold_window() {
        let tuning = TuningParameters {
            jump_max_hold_time: 0.1,
            auto_bunny_hop: false,
            ..Default::default()
        };
        let simulator = MovementSimulator::new(tuning);
        let world = create_test_world();

        let peak = |hold_ticks: u32| {
            let mut state = spawn(&simulator, &world);
            let floor_z = state.position.z;
            let mut jumps = 0;
            let mut peak = floor_z;
            for tick in 0..48 {
                let cmd = if tick < hold_ticks { jump() } else { idle() };
                let events = simulator.advance_tick(&mut state, &cmd, &world, DT);
                jumps += events.iter().filter(|e| **e == MovementEvent::Jumped).count();
                peak = peak.max(state.position.z);
            }
            (jumps, peak - floor_z)
        };

        let (tapped_jumps, tapped) = peak(1);
        let (held_jumps, held) = peak(10);
        assert_eq!(tapped_jumps, 1);
        assert_eq!(held_jumps, 1, "re-applying the hold is not a new jump");
        assert!(held > tapped + 10.0, "held {} vs tapped {}", held, tapped);
    }

    #[test]
    fn test_jump_count_allows_air_jumps() {
        let world = create_test_world();
        let count_jumps = |max_count: u32| {
            let simulator = MovementSimulator::new(TuningParameters {
                jump_max_count: max_count,
                auto_bunny_hop: false,
                ..Default::default()
            });
            let mut state = spawn(&simulator, &world);
            let mut jumps = 0;
            // Taps at 0, 8 and 16 ticks, all well before landing.
            for tick in 0..20 {
                let cmd = if tick % 8 == 0 { jump() } else { idle() };
                let events = simulator.advance_tick(&mut state, &cmd, &world, DT);
                jumps += events.iter().filter(|e| **e == MovementEvent::Jumped).count();
            }
            assert!(state.contact().is_falling());
            (jumps, state.jump().jump_count())
        };

        assert_eq!(count_jumps(1), (1, 1), "a single jump per airtime");
        assert_eq!(count_jumps(2), (2, 2), "one extra jump in the air");
    }

    #[test]
    fn test_crouch_jump_tucks_quickly_in_the_air() {
        let simulator = MovementSimulator::default();
        let world = create_test_world();
        let mut state = spawn(&simulator, &world);
        let mut cmd = jump();
        cmd.buttons.press(CommandButtons::CROUCH);

        let mut crouched_at = None;
        for tick in 0..12 {
            simulator.advance_tick(&mut state, &cmd, &world, DT);
            if state.crouch() == CrouchPhase::Crouched {
                crouched_at = Some(tick);
                break;
            }
        }

        let tuning = simulator.tuning();
        let crouched_at = crouched_at.expect("airborne crouch should finish within the crouch-jump time");
        assert!(
            (crouched_at as f32) < tuning.crouch_time / DT,
            "took {} ticks, as slow as a grounded crouch",
            crouched_at
        );
        assert!(state.contact().is_falling(), "still in the jump");
        assert!((state.half_height() - tuning.crouched_half_height).abs() < 0.01);
    }

    #[test]
    fn test_walking_off_ledge_starts_falling() {
        let simulator = MovementSimulator::default();
        let mut world = CollisionWorld::new();
        // Platform ending at x = 100
        world.add_box(
            Vec3::new(0.0, 0.0, -50.0),
            Vec3::new(100.0, 500.0, 50.0),
            ContentFlags::SOLID,
        );
        let mut state = spawn(&simulator, &world);

        let mut mode_changes = Vec::new();
        for _ in 0..120 {
            for event in simulator.advance_tick(&mut state, &forward(), &world, DT) {
                if let MovementEvent::ModeChanged { to, .. } = event {
                    mode_changes.push(to);
                }
            }
            if state.contact.is_falling() {
                break;
            }
        }

        assert!(state.contact.is_falling(), "should fall off the edge");
        assert!(mode_changes.contains(&ContactMode::Falling));
        assert!(state.position.x > 100.0);
    }

    #[test]
    fn test_no_clip_passes_through_walls() {
        let simulator = MovementSimulator::default();
        let mut world = create_test_world();
        world.add_box(
            Vec3::new(200.0, 0.0, 100.0),
            Vec3::new(10.0, 500.0, 200.0),
            ContentFlags::SOLID,
        );
        let mut state = spawn(&simulator, &world);
        let mut events = Vec::new();

        simulator.set_no_clip(&mut state, true, &mut events);
        assert!(state.is_no_clip());
        assert!(events.iter().any(|e| matches!(e, MovementEvent::ModeChanged { to: ContactMode::Flying, .. })));

        for _ in 0..64 {
            simulator.advance_tick(&mut state, &forward(), &world, DT);
        }
        assert!(state.position.x > 300.0, "no-clip should fly through, x = {}", state.position.x);

        simulator.advance_tick(&mut state, &idle(), &world, DT);
        assert_eq!(state.velocity, Vec3::ZERO, "no input stops a flying body");

        simulator.toggle_no_clip(&mut state, &mut events);
        assert!(state.contact.is_falling());
    }

    #[test]
    fn test_jumping_is_disabled_in_no_clip() {
        let simulator = MovementSimulator::default();
        let world = create_test_world();
        let mut state = spawn(&simulator, &world);
        let mut events = Vec::new();
        simulator.set_no_clip(&mut state, true, &mut events);

        let events = simulator.advance_tick(&mut state, &jump(), &world, DT);
        assert!(!events.contains(&MovementEvent::Jumped));
        assert!(!simulator.do_jump(&mut state, &mut Vec::new()));
    }

    #[test]
    fn test_ladder_keeps_host_velocity() {
        let simulator = MovementSimulator::default();
        let world = create_test_world();
        let mut state = spawn(&simulator, &world);
        let mut events = Vec::new();

        simulator.set_on_ladder(&mut state, true, &mut events);
        state.velocity = Vec3::new(0.0, 0.0, 200.0);
        let start_z = state.position.z;
        simulator.advance_tick(&mut state, &idle(), &world, 0.1);

        assert!(matches!(state.contact, ContactMode::OnLadder));
        assert!((state.position.z - start_z - 20.0).abs() < 0.5, "climbed {}", state.position.z - start_z);

        simulator.set_on_ladder(&mut state, false, &mut events);
        assert!(state.contact.is_falling());
    }

    #[test]
    fn test_swimming_hands_back_to_falling() {
        let simulator = MovementSimulator::default();
        let mut world = create_test_world();
        world.add_box(
            Vec3::new(0.0, 0.0, 400.0),
            Vec3::new(300.0, 300.0, 200.0),
            ContentFlags::WATER,
        );
        let tuning = simulator.tuning();
        let mut state = MovementState::new(Vec3::new(0.0, 0.0, 700.0), tuning);

        let mut entered = false;
        for _ in 0..64 {
            let events = simulator.advance_tick(&mut state, &idle(), &world, DT);
            if events.contains(&MovementEvent::EnteredFluid) {
                entered = true;
                break;
            }
        }
        assert!(entered, "should fall into the water volume");
        assert!(matches!(state.contact, ContactMode::Swimming));

        // Swim up and out of the top of the volume.
        state.velocity = Vec3::new(0.0, 0.0, 2000.0);
        simulator.advance_tick(&mut state, &idle(), &world, 0.1);
        assert!(state.contact.is_falling(), "left the fluid, contact {:?}", state.contact);
    }

    #[test]
    fn test_surface_friction_from_floor_material() {
        let simulator = MovementSimulator::default();
        let mut world = CollisionWorld::new();
        world.add_box_with_material(
            Vec3::new(0.0, 0.0, -50.0),
            Vec3::new(2000.0, 2000.0, 50.0),
            ContentFlags::SOLID,
            SurfaceMaterial { friction: 0.4 },
        );
        let mut state = spawn(&simulator, &world);

        simulator.advance_tick(&mut state, &idle(), &world, DT);
        assert!((state.surface_friction - 0.5).abs() < 1e-5, "friction {}", state.surface_friction);
    }

    #[test]
    fn test_airborne_ground_info_traces_down() {
        let simulator = MovementSimulator::default();
        let world = create_test_world();
        let tuning = simulator.tuning();
        let mut state = MovementState::new(Vec3::new(0.0, 0.0, 300.0), tuning);
        state.tick = 7;

        let info = simulator.ground_info(&mut state, &world);
        assert!(info.blocking_hit);
        assert!(info.walkable);
        assert!((info.floor_distance - (300.0 - tuning.standing_half_height)).abs() < 0.1);
        assert_eq!(state.ground_info.last_update_tick, 7);
    }

    #[test]
    fn test_camera_roll() {
        let tuning = TuningParameters {
            roll_angle: 2.0,
            roll_speed: 200.0,
            ..Default::default()
        };
        let simulator = MovementSimulator::new(tuning.clone());
        let mut state = MovementState::new(Vec3::ZERO, &tuning);

        state.velocity = Vec3::new(0.0, 100.0, 0.0);
        assert!((simulator.camera_roll(&state) - 1.0).abs() < 1e-5);

        state.velocity = Vec3::new(0.0, -400.0, 0.0);
        assert!((simulator.camera_roll(&state) + 2.0).abs() < 1e-5, "roll saturates at the angle");

        let disabled = MovementSimulator::default();
        assert_eq!(disabled.camera_roll(&state), 0.0);
    }

    #[test]
    fn test_identical_inputs_are_deterministic() {
        let simulator = MovementSimulator::default();
        let world = create_test_world();
        let mut a = spawn(&simulator, &world);
        let mut b = spawn(&simulator, &world);

        for tick in 0..300 {
            let mut cmd = MoveCommand {
                forward_move: 1.0,
                right_move: if (tick / 40) % 2 == 0 { 1.0 } else { -1.0 },
                view_delta: (0.0, 0.01),
                ..Default::default()
            };
            if tick % 50 < 25 {
                cmd.buttons.press(CommandButtons::JUMP);
            }
            if tick % 90 > 60 {
                cmd.buttons.press(CommandButtons::CROUCH);
            }
            let ea = simulator.advance_tick(&mut a, &cmd, &world, DT);
            let eb = simulator.advance_tick(&mut b, &cmd, &world, DT);
            assert_eq!(ea, eb, "event streams diverged at tick {}", tick);
        }

        assert_eq!(a.position, b.position);
        assert_eq!(a.velocity, b.velocity);
        assert_eq!(a.crouch, b.crouch);
    }
}
