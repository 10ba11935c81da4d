//! Crouch transitions.
//!
//! The capsule never snaps between heights. Each tick the transitioner moves
//! the crouch progress toward its target by `dt / duration` and resizes the
//! capsule to match, keeping either the feet or the head in place depending
//! on the configured [`CrouchPivot`].
//!
//! # Design
//!
//! Intent is folded into [`CrouchPhase`] first (see [`next_phase`]), then the
//! resize step runs for whichever transition the phase names. Growing the
//! capsule is gated on overlap probes; a blocked uncrouch leaves the state
//! untouched and is retried on the next tick.

use glam::Vec3;

use super::config::{CrouchPivot, TuningParameters, MIN_FLOOR_DIST};
use super::state::{ContactMode, CrouchPhase, MovementEvent, MovementState};
use crate::collision::{CapsuleShape, CollisionQuery, KINDA_SMALL_NUMBER};

/// Extra height added to uncrouch probes.
const UNCROUCH_PROBE_INFLATION: f32 = 1.0e-3;

/// Which half of the tick the crouch update belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrouchPass {
    /// Before movement: intent is applied and either direction may step.
    BeforeMovement,
    /// After movement: only a forced uncrouch may step.
    AfterMovement,
}

/// Whether the body is allowed to be crouched in `contact`.
#[inline]
pub fn can_crouch_in(contact: ContactMode) -> bool {
    matches!(contact, ContactMode::Grounded { .. } | ContactMode::Falling)
}

/// Fold crouch intent into the phase.
///
/// On a ladder a transition the player still asks for is cancelled outright
/// rather than reversed.
pub fn next_phase(phase: CrouchPhase, wants_crouch: bool, contact: ContactMode) -> CrouchPhase {
    if wants_crouch && phase.in_transition() && matches!(contact, ContactMode::OnLadder) {
        return CrouchPhase::Standing;
    }

    let crouch = wants_crouch && can_crouch_in(contact);
    match phase {
        CrouchPhase::Standing if crouch => CrouchPhase::TransitioningToCrouch { progress: 0.0 },
        CrouchPhase::Crouched if !crouch => CrouchPhase::TransitioningToStand { progress: 1.0 },
        CrouchPhase::TransitioningToCrouch { progress } if !crouch => {
            CrouchPhase::TransitioningToStand { progress }
        }
        CrouchPhase::TransitioningToStand { progress } if crouch => {
            CrouchPhase::TransitioningToCrouch { progress }
        }
        other => other,
    }
}

/// Drives the capsule between standing and crouched heights.
pub struct CrouchTransitioner<'a> {
    tuning: &'a TuningParameters,
}

impl<'a> CrouchTransitioner<'a> {
    pub fn new(tuning: &'a TuningParameters) -> Self {
        Self { tuning }
    }

    /// Run one crouch pass.
    ///
    /// No-clip bodies keep whatever height they have. Before movement the
    /// intent is applied and the resulting transition steps; after movement
    /// only an uncrouch forced by the current contact mode steps.
    pub fn update_crouching(
        &self,
        state: &mut MovementState,
        world: &dyn CollisionQuery,
        wants_crouch: bool,
        delta_time: f32,
        pass: CrouchPass,
        events: &mut Vec<MovementEvent>,
    ) {
        if state.is_no_clip() {
            return;
        }

        let grounded = state.contact.is_grounded();
        let pivot = self.pivot(grounded);

        match pass {
            CrouchPass::BeforeMovement => {
                state.crouch = next_phase(state.crouch, wants_crouch, state.contact);
            }
            CrouchPass::AfterMovement => {
                if can_crouch_in(state.contact) {
                    return;
                }
                state.crouch = next_phase(state.crouch, false, state.contact);
            }
        }

        match state.crouch {
            CrouchPhase::TransitioningToCrouch { .. } => {
                let duration = if grounded {
                    self.tuning.crouch_time
                } else {
                    self.tuning.crouch_jump_time
                };
                self.do_crouch_resize(state, world, duration, delta_time, pivot, events);
            }
            CrouchPhase::TransitioningToStand { .. } => {
                let duration = if grounded {
                    self.tuning.uncrouch_time
                } else {
                    self.tuning.uncrouch_jump_time
                };
                self.do_uncrouch_resize(state, world, duration, delta_time, pivot, events);
            }
            CrouchPhase::Standing => {
                // A cancelled transition leaves the capsule short until it fits again.
                if state.half_height < self.tuning.standing_half_height - KINDA_SMALL_NUMBER {
                    self.do_uncrouch_resize(state, world, 0.0, delta_time, pivot, events);
                }
            }
            CrouchPhase::Crouched => {}
        }
    }

    /// Shrink the capsule one step toward crouched height.
    pub fn do_crouch_resize(
        &self,
        state: &mut MovementState,
        world: &dyn CollisionQuery,
        target_time: f32,
        delta_time: f32,
        pivot: CrouchPivot,
        events: &mut Vec<MovementEvent>,
    ) {
        let radius = self.tuning.capsule_radius;
        let standing = self.tuning.standing_half_height;
        let crouched = self.tuning.crouched_half_height;
        let full = standing - crouched;

        if !can_crouch_in(state.contact) {
            state.crouch = CrouchPhase::TransitioningToStand {
                progress: state.crouch.progress(),
            };
            return;
        }

        if nearly_equal(state.half_height, crouched) || full <= KINDA_SMALL_NUMBER {
            state.half_height = crouched.max(radius);
            state.crouch = CrouchPhase::Crouched;
            events.push(MovementEvent::StartCrouch);
            return;
        }

        let current_alpha = (1.0 - (state.half_height - crouched) / full).clamp(0.0, 1.0);
        let mut target_alpha = if target_time.abs() < KINDA_SMALL_NUMBER {
            1.0
        } else {
            current_alpha + delta_time / target_time
        };
        let finished = target_alpha >= 1.0 || nearly_equal(target_alpha, 1.0);
        if finished {
            target_alpha = 1.0;
        }

        let old_half = state.half_height;
        let new_half = (standing - full * target_alpha).max(radius);
        let adjust = old_half - new_half;
        state.half_height = new_half;

        let shift = match pivot {
            CrouchPivot::KeepBase => -adjust,
            CrouchPivot::TuckLegs => adjust,
        };
        if shift.abs() > 0.0 {
            let capsule = CapsuleShape::new(radius, new_half);
            let hit = world.sweep(state.position, Vec3::new(0.0, 0.0, shift), capsule);
            if !hit.start_penetrating {
                state.position = hit.location;
            }
        }

        events.push(MovementEvent::CapsuleResized { half_height: new_half });
        if finished {
            state.crouch = CrouchPhase::Crouched;
            events.push(MovementEvent::StartCrouch);
        } else {
            state.crouch = CrouchPhase::TransitioningToCrouch { progress: target_alpha };
        }

        log::debug!(
            "crouch step: half_height {:.2} -> {:.2} ({:?}), progress {:.3}",
            old_half,
            new_half,
            pivot,
            state.crouch.progress()
        );
    }

    /// Grow the capsule one step toward standing height.
    ///
    /// Returns `false` when the larger capsule would not fit; the state is
    /// left unchanged and the transition continues next tick.
    pub fn do_uncrouch_resize(
        &self,
        state: &mut MovementState,
        world: &dyn CollisionQuery,
        target_time: f32,
        delta_time: f32,
        pivot: CrouchPivot,
        events: &mut Vec<MovementEvent>,
    ) -> bool {
        let radius = self.tuning.capsule_radius;
        let standing = self.tuning.standing_half_height;
        let crouched = self.tuning.crouched_half_height;
        let full = standing - crouched;

        if nearly_equal(state.half_height, standing) || full <= KINDA_SMALL_NUMBER {
            state.half_height = standing;
            self.finish_standing(state, events);
            return true;
        }

        let old_half = state.half_height;
        let current_alpha = (1.0 - (standing - old_half) / full).clamp(0.0, 1.0);
        let instant = target_time.abs() < KINDA_SMALL_NUMBER;
        let mut target_alpha = if instant {
            1.0
        } else {
            current_alpha + delta_time / target_time
        };

        // Grounded: look ahead over most of the remaining height before committing to a step.
        if !instant && pivot == CrouchPivot::KeepBase {
            let check = (standing - old_half) * self.tuning.ground_uncrouch_check_factor;
            let probe = CapsuleShape::new(radius, old_half + UNCROUCH_PROBE_INFLATION + check);
            let location = state.position + Vec3::new(0.0, 0.0, probe.half_height - old_half);
            if world.overlap_blocking(location, probe) {
                log::debug!("uncrouch deferred: {:.2} cm of headroom needed", check);
                return false;
            }
        }

        let finished = target_alpha >= 1.0 || nearly_equal(target_alpha, 1.0);
        if finished {
            target_alpha = 1.0;
        }
        let new_half = (crouched + full * target_alpha).min(standing);
        let adjust = new_half - old_half;
        let probe = CapsuleShape::new(radius, old_half + UNCROUCH_PROBE_INFLATION + adjust);

        let location = match pivot {
            CrouchPivot::KeepBase => self.grounded_uncrouch_location(state, world, probe, old_half),
            CrouchPivot::TuckLegs => self.airborne_uncrouch_location(state, world, probe, old_half, adjust),
        };
        let Some(location) = location else {
            log::debug!("uncrouch deferred at half_height {:.2}", old_half);
            return false;
        };

        state.position = location;
        state.half_height = new_half;
        state.crouch_frame_tolerated = false;
        events.push(MovementEvent::CapsuleResized { half_height: new_half });

        if finished {
            self.finish_standing(state, events);
        } else {
            state.crouch = CrouchPhase::TransitioningToStand {
                progress: 1.0 - target_alpha,
            };
        }

        log::debug!(
            "uncrouch step: half_height {:.2} -> {:.2} ({:?})",
            old_half,
            new_half,
            pivot
        );
        true
    }

    fn pivot(&self, grounded: bool) -> CrouchPivot {
        if grounded {
            self.tuning.crouch_pivot_grounded
        } else {
            self.tuning.crouch_pivot_airborne
        }
    }

    fn finish_standing(&self, state: &mut MovementState, events: &mut Vec<MovementEvent>) {
        state.crouch = CrouchPhase::Standing;
        state.crouch_frame_tolerated = false;
        events.push(MovementEvent::EndCrouch);
    }

    /// Feet stay put. If that does not fit, settle onto the floor gap and try again.
    fn grounded_uncrouch_location(
        &self,
        state: &MovementState,
        world: &dyn CollisionQuery,
        probe: CapsuleShape,
        old_half: f32,
    ) -> Option<Vec3> {
        let mut location = state.position + Vec3::new(0.0, 0.0, probe.half_height - old_half);
        if !world.overlap_blocking(location, probe) {
            return Some(location);
        }

        let floor = &state.current_floor;
        if state.contact.is_grounded() && floor.blocking_hit && floor.floor_distance > UNCROUCH_PROBE_INFLATION {
            location.z -= floor.floor_distance - UNCROUCH_PROBE_INFLATION;
            if !world.overlap_blocking(location, probe) {
                return Some(location);
            }
        }
        None
    }

    /// Grow around the centre. If that does not fit, keep the feet just above where they are.
    fn airborne_uncrouch_location(
        &self,
        state: &MovementState,
        world: &dyn CollisionQuery,
        probe: CapsuleShape,
        old_half: f32,
        adjust: f32,
    ) -> Option<Vec3> {
        if !world.overlap_blocking(state.position, probe) {
            return Some(state.position);
        }
        if adjust <= 0.0 {
            return None;
        }

        let location = Vec3::new(
            state.position.x,
            state.position.y,
            state.position.z - old_half + probe.half_height + MIN_FLOOR_DIST / 2.0,
        );
        (!world.overlap_blocking(location, probe)).then_some(location)
    }
}

#[inline]
fn nearly_equal(a: f32, b: f32) -> bool {
    (a - b).abs() <= KINDA_SMALL_NUMBER
}
