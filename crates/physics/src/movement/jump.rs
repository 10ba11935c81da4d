//! Jump input and launch.
//!
//! [`JumpState`] latches the jump button and decides whether a latched
//! press may jump: a jump count limits jumps per airtime, and while
//! `jump_max_hold_time` is positive a held button keeps re-applying the
//! jump for that long. [`can_attempt_jump`] is the contact-side gate and
//! [`apply_jump_velocity`] the impulse; the simulator strings them together.

use serde::{Deserialize, Serialize};

use super::config::TuningParameters;
use super::state::{ContactMode, MovementState};

/// Jump input latch and per-airtime bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JumpState {
    /// A press is latched and will be tried this tick.
    pressed: bool,

    /// The last attempt jumped; further attempts count as holding.
    was_jumping: bool,

    /// How long the latched press has been held (s).
    key_hold_time: f32,

    /// Jumps since the body last stood on something.
    current_count: u32,

    /// Button state last tick, for edge detection.
    held: bool,
}

impl JumpState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold this tick's button into the latch.
    ///
    /// A fresh press latches. With `auto_bunny_hop` a held button latches
    /// again every tick, so it fires as soon as the body can jump. Releasing
    /// the button drops the latch.
    pub fn read_input(&mut self, held: bool, auto_bunny_hop: bool) {
        let just_pressed = held && !self.held;
        let released = self.held && !held;
        self.held = held;

        if just_pressed || (auto_bunny_hop && held) {
            self.pressed = true;
        } else if released {
            self.pressed = false;
            self.key_hold_time = 0.0;
        }
    }

    /// Whether the latched press may jump now.
    ///
    /// Outside a hold window the jump count decides. Inside one, the press
    /// must still be held and younger than `max_hold_time`.
    pub fn can_jump(&self, grounded: bool, falling: bool, max_hold_time: f32, max_count: u32) -> bool {
        if !self.was_jumping || max_hold_time <= 0.0 {
            if self.current_count == 0 && falling {
                self.current_count + 1 < max_count
            } else {
                self.current_count < max_count
            }
        } else {
            let key_held = self.pressed && self.key_hold_time < max_hold_time;
            key_held
                && (grounded
                    || self.current_count < max_count
                    || (self.was_jumping && self.current_count == max_count))
        }
    }

    /// Walking off a ledge spends the first jump.
    pub fn count_fall_as_jump(&mut self) {
        if self.current_count == 0 {
            self.current_count = 1;
        }
    }

    /// Record the outcome of a jump attempt. Returns `true` for a new jump,
    /// `false` for a miss or a held re-application.
    pub fn record_attempt(&mut self, did_jump: bool) -> bool {
        let started = did_jump && !self.was_jumping;
        if started {
            self.current_count += 1;
        }
        self.was_jumping = did_jump;
        started
    }

    /// End-of-tick bookkeeping. A latched press ages and is dropped once it
    /// outlives the hold window. Returns `true` when nothing is latched and
    /// any remaining jump force should be cut.
    pub fn clear_input(&mut self, delta_time: f32, max_hold_time: f32) -> bool {
        if self.pressed {
            self.key_hold_time += delta_time;
            if self.key_hold_time >= max_hold_time {
                self.pressed = false;
            }
            false
        } else {
            self.was_jumping = false;
            true
        }
    }

    /// Forget the current jump. The count only clears once the body is no
    /// longer falling.
    pub fn reset(&mut self, falling: bool) {
        self.pressed = false;
        self.was_jumping = false;
        self.key_hold_time = 0.0;
        if !falling {
            self.current_count = 0;
        }
    }

    #[inline]
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    #[inline]
    pub fn is_jumping(&self) -> bool {
        self.was_jumping
    }

    #[inline]
    pub fn jump_count(&self) -> u32 {
        self.current_count
    }
}

/// Contact-side jump gate: walkable floor when grounded, always while
/// falling, otherwise only on a ladder.
pub fn can_attempt_jump(state: &MovementState) -> bool {
    match state.contact() {
        ContactMode::Grounded { .. } => {
            let floor_z = state.current_floor.hit.impact_normal.z;
            floor_z >= state.walkable_floor_z || (floor_z - state.walkable_floor_z).abs() <= 1.0e-8
        }
        ContactMode::Falling => true,
        ContactMode::OnLadder => true,
        ContactMode::Flying | ContactMode::Swimming => false,
    }
}

/// Jump impulse: set `v.z` to the jump speed, or add it when already rising.
pub fn apply_jump_velocity(state: &mut MovementState, tuning: &TuningParameters) {
    if state.velocity.z <= 0.0 {
        state.velocity.z = tuning.jump_z_velocity;
    } else {
        state.velocity.z += tuning.jump_z_velocity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{FloorResult, HitResult};
    use glam::Vec3;

    const TICK: f32 = 1.0 / 64.0;

    /// One simulated tick of the latch against a fixed contact, the way the
    /// simulator drives it. Returns whether a new jump started.
    fn tick(jump: &mut JumpState, held: bool, grounded: bool, auto_bunny_hop: bool, max_hold: f32) -> bool {
        let falling = !grounded;
        jump.read_input(held, auto_bunny_hop);
        let mut started = false;
        if jump.is_pressed() {
            if falling {
                jump.count_fall_as_jump();
            }
            let did_jump = jump.can_jump(grounded, falling, max_hold, 1);
            started = jump.record_attempt(did_jump);
        }
        jump.clear_input(TICK, max_hold);
        started
    }

    fn grounded_on(normal: Vec3, tuning: &TuningParameters) -> MovementState {
        let mut state = MovementState::new(Vec3::new(0.0, 0.0, 90.0), tuning);
        state.contact = ContactMode::landed();
        let mut hit = HitResult::miss(state.position, state.position);
        hit.blocking = true;
        hit.impact_normal = normal;
        state.current_floor = FloorResult {
            blocking_hit: true,
            walkable: true,
            floor_distance: 2.0,
            hit,
        };
        state
    }

    #[test]
    fn test_basic_jump() {
        let mut jump = JumpState::new();
        assert!(tick(&mut jump, true, true, false, 0.0));
        assert_eq!(jump.jump_count(), 1);
        assert!(!jump.is_pressed(), "a zero hold window drops the latch at once");
    }

    #[test]
    fn test_holding_jump_only_triggers_once() {
        let mut jump = JumpState::new();
        assert!(tick(&mut jump, true, true, false, 0.0));
        for _ in 0..40 {
            assert!(!tick(&mut jump, true, true, false, 0.0));
        }
    }

    #[test]
    fn test_press_in_the_air_is_not_remembered() {
        let mut jump = JumpState::new();
        assert!(tick(&mut jump, true, true, false, 0.0));
        jump.reset(true);

        tick(&mut jump, false, false, false, 0.0);
        assert!(!tick(&mut jump, true, false, false, 0.0), "one jump per airtime");

        // Touchdown with the button still down and no fresh press.
        jump.reset(false);
        assert!(!tick(&mut jump, true, true, false, 0.0));
    }

    #[test]
    fn test_auto_bhop_rejumps_on_every_landing() {
        let mut jump = JumpState::new();
        assert!(tick(&mut jump, true, true, true, 0.0));

        for _ in 0..10 {
            assert!(!tick(&mut jump, true, false, true, 0.0));
        }
        jump.reset(false);
        assert!(tick(&mut jump, true, true, true, 0.0), "held jump fires on landing");
    }

    #[test]
    fn test_auto_bhop_released_does_not_jump() {
        let mut jump = JumpState::new();
        tick(&mut jump, true, true, true, 0.0);
        tick(&mut jump, false, false, true, 0.0);
        jump.reset(false);
        assert!(!tick(&mut jump, false, true, true, 0.0));
    }

    #[test]
    fn test_walking_off_a_ledge_spends_the_jump() {
        let mut jump = JumpState::new();
        assert!(!tick(&mut jump, true, false, false, 0.0));
        assert_eq!(jump.jump_count(), 1);

        let mut double = JumpState::new();
        double.read_input(true, false);
        double.count_fall_as_jump();
        assert!(double.can_jump(false, true, 0.0, 2), "a second jump is left with a count of two");
    }

    #[test]
    fn test_hold_window_reapplies_until_it_expires() {
        let max_hold = 3.0 * TICK;
        let mut jump = JumpState::new();
        assert!(tick(&mut jump, true, true, false, max_hold));

        // Still held and inside the window: the attempt succeeds but is not a new jump.
        jump.read_input(true, false);
        assert!(jump.can_jump(false, true, max_hold, 1));
        assert!(!jump.record_attempt(true));
        jump.clear_input(TICK, max_hold);

        jump.read_input(true, false);
        assert!(jump.can_jump(false, true, max_hold, 1));
        assert!(!jump.record_attempt(true));
        assert!(!jump.clear_input(TICK, max_hold));
        assert!(!jump.is_pressed(), "latch dropped once the hold time is used up");

        jump.read_input(true, false);
        assert!(!jump.is_pressed());
        assert!(jump.clear_input(TICK, max_hold), "nothing latched, cut the force");
        assert!(!jump.is_jumping());
    }

    #[test]
    fn test_release_ends_the_hold() {
        let max_hold = 0.2;
        let mut jump = JumpState::new();
        assert!(tick(&mut jump, true, true, false, max_hold));
        assert!(jump.is_pressed());

        jump.read_input(false, false);
        assert!(!jump.is_pressed());
        assert!(!jump.can_jump(false, true, max_hold, 1));
        assert!(jump.clear_input(TICK, max_hold));
    }

    #[test]
    fn test_can_attempt_jump_by_contact() {
        let tuning = TuningParameters::default();

        let flat = grounded_on(Vec3::Z, &tuning);
        assert!(can_attempt_jump(&flat));

        let steep = grounded_on(Vec3::new(0.8, 0.0, 0.6), &tuning);
        assert!(!can_attempt_jump(&steep), "unwalkable floor");

        for contact in [ContactMode::OnLadder, ContactMode::Falling] {
            let mut state = flat.clone();
            state.contact = contact;
            assert!(can_attempt_jump(&state), "{} may attempt", contact.name());
        }

        for contact in [ContactMode::Flying, ContactMode::Swimming] {
            let mut state = flat.clone();
            state.contact = contact;
            assert!(!can_attempt_jump(&state), "{} should not jump", contact.name());
        }
    }

    #[test]
    fn test_jump_velocity_sets_or_adds() {
        let tuning = TuningParameters::default();

        let mut state = grounded_on(Vec3::Z, &tuning);
        state.velocity.z = -50.0;
        apply_jump_velocity(&mut state, &tuning);
        assert_eq!(state.velocity.z, tuning.jump_z_velocity);

        let mut rising = grounded_on(Vec3::Z, &tuning);
        rising.velocity.z = 100.0;
        apply_jump_velocity(&mut rising, &tuning);
        assert_eq!(rising.velocity.z, 100.0 + tuning.jump_z_velocity, "rising jumps stack");
    }
}
