//! The collision boundary consumed by the movement simulator.
//!
//! The simulator never touches geometry directly. It asks a [`CollisionQuery`]
//! to sweep the capsule, test for overlap and probe for floors, and reads the
//! answers out of [`HitResult`] and [`FloorResult`].

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Tolerance used for "nearly zero" comparisons throughout the crate.
pub const KINDA_SMALL_NUMBER: f32 = 1.0e-4;

/// Floor probes shrink the capsule radius by this much so adjacent walls are
/// not reported as floor.
pub const SWEEP_EDGE_REJECT_DISTANCE: f32 = 0.15;

/// Z-aligned capsule, described the same way as the movement body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapsuleShape {
    /// Radius of the hemispheres and cylinder (cm).
    pub radius: f32,
    /// Distance from centre to the tip of either hemisphere (cm).
    pub half_height: f32,
}

impl CapsuleShape {
    pub fn new(radius: f32, half_height: f32) -> Self {
        Self {
            radius,
            half_height: half_height.max(radius),
        }
    }

    /// Half length of the straight segment between the hemisphere centres.
    #[inline]
    pub fn segment_half_height(&self) -> f32 {
        (self.half_height - self.radius).max(0.0)
    }

    /// Same capsule with a different radius, keeping the tips in place.
    pub fn with_radius(&self, radius: f32) -> Self {
        Self {
            radius,
            half_height: self.half_height,
        }
    }

    /// Capsule grown or shrunk vertically by `amount` on each end.
    pub fn inflated(&self, amount: f32) -> Self {
        Self::new(self.radius, self.half_height + amount)
    }
}

/// Physical material attached to a surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceMaterial {
    /// Friction coefficient, 1.0 is "normal ground".
    pub friction: f32,
}

/// Result of a single sweep, line trace or probe.
///
/// Only valid for the query that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitResult {
    /// Whether anything blocked the query.
    pub blocking: bool,
    /// Fraction of the requested move that was completed, in `[0, 1]`.
    pub time: f32,
    /// Where the query started.
    pub trace_start: Vec3,
    /// Where the query would have ended unobstructed.
    pub trace_end: Vec3,
    /// Capsule centre (or ray point) where the query stopped.
    pub location: Vec3,
    /// Normal of the swept shape at the contact, pointing away from the surface.
    pub normal: Vec3,
    /// Point of contact on the surface.
    pub impact_point: Vec3,
    /// Normal of the surface that was hit.
    pub impact_normal: Vec3,
    /// The query started already overlapping geometry.
    pub start_penetrating: bool,
    /// Overlap depth when `start_penetrating`.
    pub penetration_depth: f32,
    /// Material of the hit surface, if any.
    pub material: Option<SurfaceMaterial>,
}

impl HitResult {
    /// A query that travelled its full length without touching anything.
    pub fn miss(start: Vec3, end: Vec3) -> Self {
        Self {
            blocking: false,
            time: 1.0,
            trace_start: start,
            trace_end: end,
            location: end,
            normal: Vec3::ZERO,
            impact_point: end,
            impact_normal: Vec3::ZERO,
            start_penetrating: false,
            penetration_depth: 0.0,
            material: None,
        }
    }

    /// Blocking hit that did not start inside geometry.
    #[inline]
    pub fn is_valid_blocking_hit(&self) -> bool {
        self.blocking && !self.start_penetrating
    }

    /// Distance travelled before stopping.
    #[inline]
    pub fn distance(&self) -> f32 {
        (self.trace_end - self.trace_start).length() * self.time
    }
}

/// Outcome of a downward floor probe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloorResult {
    /// The probe hit something.
    pub blocking_hit: bool,
    /// The surface hit is standable.
    pub walkable: bool,
    /// Gap between the capsule base and the floor (cm).
    pub floor_distance: f32,
    /// The probe's hit.
    pub hit: HitResult,
}

impl FloorResult {
    /// No floor within the probe distance.
    pub fn none(position: Vec3) -> Self {
        Self {
            blocking_hit: false,
            walkable: false,
            floor_distance: 0.0,
            hit: HitResult::miss(position, position),
        }
    }

    #[inline]
    pub fn is_walkable_floor(&self) -> bool {
        self.blocking_hit && self.walkable
    }
}

impl Default for FloorResult {
    fn default() -> Self {
        Self::none(Vec3::ZERO)
    }
}

/// Collision capability required by the movement simulator.
///
/// Implementors only need the three geometric queries. Floor probing,
/// walkability and friction lookups are provided in terms of them and can
/// be overridden when the backing engine has better answers.
pub trait CollisionQuery {
    /// Sweep `capsule` from `start` by `delta`, stopping at the first blocking contact.
    fn sweep(&self, start: Vec3, delta: Vec3, capsule: CapsuleShape) -> HitResult;

    /// Whether `capsule` placed at `position` overlaps blocking geometry.
    fn overlap_blocking(&self, position: Vec3, capsule: CapsuleShape) -> bool;

    /// Ray query from `start` to `end` against blocking geometry.
    fn line_trace(&self, start: Vec3, end: Vec3) -> HitResult;

    /// Whether `capsule` at `position` is inside a fluid volume.
    fn is_in_fluid(&self, _position: Vec3, _capsule: CapsuleShape) -> bool {
        false
    }

    /// Whether `hit` is a surface the body can stand on.
    fn is_walkable(&self, hit: &HitResult, walkable_floor_z: f32) -> bool {
        if !hit.blocking {
            return false;
        }
        let z = hit.impact_normal.z;
        z >= KINDA_SMALL_NUMBER && z >= walkable_floor_z
    }

    /// Friction multiplier of the surface under `hit`.
    fn surface_friction(&self, hit: &HitResult) -> f32 {
        match hit.material {
            Some(material) => (material.friction * 1.25).min(1.0),
            None => 1.0,
        }
    }

    /// Probe straight down from `position` for up to `probe_distance`.
    fn find_floor(
        &self,
        position: Vec3,
        capsule: CapsuleShape,
        probe_distance: f32,
        walkable_floor_z: f32,
    ) -> FloorResult {
        let probe_radius = (capsule.radius - SWEEP_EDGE_REJECT_DISTANCE).max(KINDA_SMALL_NUMBER);
        let probe = capsule.with_radius(probe_radius);
        let hit = self.sweep(position, Vec3::new(0.0, 0.0, -probe_distance), probe);

        if !hit.blocking {
            return FloorResult::none(position);
        }

        let floor_distance = if hit.start_penetrating {
            0.0
        } else {
            (position.z - hit.location.z).max(0.0)
        };

        FloorResult {
            blocking_hit: true,
            walkable: self.is_walkable(&hit, walkable_floor_z),
            floor_distance,
            hit,
        }
    }
}
