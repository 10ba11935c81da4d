//! Parry-backed collision world.
//!
//! Stores static brushes and answers [`CollisionQuery`] requests for a
//! Z-aligned capsule. Sweeps march the capsule along the move in steps no
//! longer than half its radius, then binary search the first blocked
//! interval, so thin geometry is not tunnelled through.

use glam::{Quat, Vec3};
use parry3d::math::{Isometry, Point, Real, Vector};
use parry3d::na::{Quaternion, Translation3, UnitQuaternion};
use parry3d::query::{contact, Ray};
use parry3d::shape::SharedShape;

use super::flags::ContentFlags;
use super::query::{CapsuleShape, CollisionQuery, HitResult, SurfaceMaterial, KINDA_SMALL_NUMBER};

/// Identifier handed out when a brush is added.
pub type BrushId = u32;

/// Binary search iterations used to refine a sweep's contact time.
const SWEEP_REFINE_ITERATIONS: usize = 16;

/// A piece of collision geometry in the world.
#[derive(Clone)]
pub struct CollisionBrush {
    pub id: BrushId,
    pub shape: SharedShape,
    pub transform: Isometry<Real>,
    pub contents: ContentFlags,
    pub material: Option<SurfaceMaterial>,
}

impl std::fmt::Debug for CollisionBrush {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollisionBrush")
            .field("id", &self.id)
            .field("contents", &self.contents)
            .field("material", &self.material)
            .finish_non_exhaustive()
    }
}

/// Deepest contact between the capsule and any brush.
#[derive(Debug, Clone, Copy)]
struct Penetration {
    point: Vec3,
    normal: Vec3,
    depth: f32,
    material: Option<SurfaceMaterial>,
}

/// Static collision environment.
#[derive(Debug, Default)]
pub struct CollisionWorld {
    brushes: Vec<CollisionBrush>,
    next_id: BrushId,
}

impl CollisionWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an axis-aligned box.
    pub fn add_box(&mut self, center: Vec3, half_extents: Vec3, contents: ContentFlags) -> BrushId {
        self.add_oriented_box(center, half_extents, Quat::IDENTITY, contents, None)
    }

    /// Add an axis-aligned box with a surface material.
    pub fn add_box_with_material(
        &mut self,
        center: Vec3,
        half_extents: Vec3,
        contents: ContentFlags,
        material: SurfaceMaterial,
    ) -> BrushId {
        self.add_oriented_box(center, half_extents, Quat::IDENTITY, contents, Some(material))
    }

    /// Add a rotated box, e.g. a ramp.
    pub fn add_oriented_box(
        &mut self,
        center: Vec3,
        half_extents: Vec3,
        rotation: Quat,
        contents: ContentFlags,
        material: Option<SurfaceMaterial>,
    ) -> BrushId {
        let shape = SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z);
        let transform = Isometry::from_parts(
            Translation3::new(center.x, center.y, center.z),
            UnitQuaternion::new_normalize(Quaternion::new(rotation.w, rotation.x, rotation.y, rotation.z)),
        );
        self.push(shape, transform, contents, material)
    }

    /// Add a convex hull. Returns `None` if the points are degenerate.
    pub fn add_convex_hull(&mut self, points: &[Vec3], contents: ContentFlags) -> Option<BrushId> {
        let points: Vec<Point<Real>> = points.iter().map(|p| to_point(*p)).collect();
        let shape = SharedShape::convex_hull(&points)?;
        Some(self.push(shape, Isometry::identity(), contents, None))
    }

    /// Remove a brush. Returns whether it existed.
    pub fn remove_brush(&mut self, id: BrushId) -> bool {
        let before = self.brushes.len();
        self.brushes.retain(|b| b.id != id);
        self.brushes.len() != before
    }

    pub fn clear(&mut self) {
        self.brushes.clear();
    }

    pub fn brush_count(&self) -> usize {
        self.brushes.len()
    }

    fn push(
        &mut self,
        shape: SharedShape,
        transform: Isometry<Real>,
        contents: ContentFlags,
        material: Option<SurfaceMaterial>,
    ) -> BrushId {
        let id = self.next_id;
        self.next_id += 1;
        self.brushes.push(CollisionBrush {
            id,
            shape,
            transform,
            contents,
            material,
        });
        id
    }

    // ========================================================================
    // Private helpers
    // ========================================================================

    fn capsule_at(position: Vec3, capsule: CapsuleShape) -> (SharedShape, Isometry<Real>) {
        (
            SharedShape::capsule_z(capsule.segment_half_height(), capsule.radius),
            Isometry::translation(position.x, position.y, position.z),
        )
    }

    fn overlaps_mask(&self, position: Vec3, capsule: CapsuleShape, mask: ContentFlags) -> bool {
        let (shape, transform) = Self::capsule_at(position, capsule);
        self.brushes
            .iter()
            .filter(|b| mask.intersects(b.contents))
            .any(|b| {
                matches!(
                    contact(&transform, shape.as_ref(), &b.transform, b.shape.as_ref(), 0.0),
                    Ok(Some(_))
                )
            })
    }

    fn deepest_penetration(&self, position: Vec3, capsule: CapsuleShape) -> Option<Penetration> {
        let (shape, transform) = Self::capsule_at(position, capsule);
        let mut deepest: Option<Penetration> = None;

        for brush in self
            .brushes
            .iter()
            .filter(|b| ContentFlags::MASK_PLAYER_SOLID.intersects(b.contents))
        {
            if let Ok(Some(c)) = contact(&transform, shape.as_ref(), &brush.transform, brush.shape.as_ref(), 0.0) {
                let depth = -c.dist;
                if deepest.map_or(true, |d| depth > d.depth) {
                    deepest = Some(Penetration {
                        point: to_vec3(c.point2.coords),
                        normal: to_vec3(c.normal2.into_inner()),
                        depth,
                        material: brush.material,
                    });
                }
            }
        }

        deepest
    }

    /// Normal of the capsule surface at `impact_point`, pointing out of the surface.
    fn capsule_normal(center: Vec3, capsule: CapsuleShape, impact_point: Vec3, fallback: Vec3) -> Vec3 {
        let segment = capsule.segment_half_height();
        let axis_z = (impact_point.z - center.z).clamp(-segment, segment);
        let closest = Vec3::new(center.x, center.y, center.z + axis_z);
        let n = closest - impact_point;
        if n.length_squared() > KINDA_SMALL_NUMBER {
            n.normalize()
        } else {
            fallback
        }
    }
}

impl CollisionQuery for CollisionWorld {
    fn sweep(&self, start: Vec3, delta: Vec3, capsule: CapsuleShape) -> HitResult {
        let end = start + delta;

        if let Some(p) = self.deepest_penetration(start, capsule) {
            return HitResult {
                blocking: true,
                time: 0.0,
                trace_start: start,
                trace_end: end,
                location: start,
                normal: p.normal,
                impact_point: p.point,
                impact_normal: p.normal,
                start_penetrating: true,
                penetration_depth: p.depth.max(0.0),
                material: p.material,
            };
        }

        let distance = delta.length();
        if distance < KINDA_SMALL_NUMBER {
            return HitResult::miss(start, end);
        }

        let step = (capsule.radius * 0.5).max(1.0);
        let steps = (distance / step).ceil().max(1.0) as usize;
        let mask = ContentFlags::MASK_PLAYER_SOLID;

        let mut lo = 0.0_f32;
        let mut blocked_at = None;
        for i in 1..=steps {
            let t = i as f32 / steps as f32;
            if self.overlaps_mask(start + delta * t, capsule, mask) {
                blocked_at = Some(t);
                break;
            }
            lo = t;
        }

        let Some(mut hi) = blocked_at else {
            return HitResult::miss(start, end);
        };

        for _ in 0..SWEEP_REFINE_ITERATIONS {
            let mid = (lo + hi) * 0.5;
            if self.overlaps_mask(start + delta * mid, capsule, mask) {
                hi = mid;
            } else {
                lo = mid;
            }
        }

        let location = start + delta * lo;
        let direction = delta / distance;
        let (impact_point, impact_normal, material) = match self.deepest_penetration(start + delta * hi, capsule) {
            Some(p) => (p.point, p.normal, p.material),
            None => (location + direction * capsule.radius, -direction, None),
        };

        HitResult {
            blocking: true,
            time: lo,
            trace_start: start,
            trace_end: end,
            location,
            normal: Self::capsule_normal(location, capsule, impact_point, impact_normal),
            impact_point,
            impact_normal,
            start_penetrating: false,
            penetration_depth: 0.0,
            material,
        }
    }

    fn overlap_blocking(&self, position: Vec3, capsule: CapsuleShape) -> bool {
        self.overlaps_mask(position, capsule, ContentFlags::MASK_PLAYER_SOLID)
    }

    fn line_trace(&self, start: Vec3, end: Vec3) -> HitResult {
        let delta = end - start;
        let max_distance = delta.length();
        if max_distance < KINDA_SMALL_NUMBER {
            return HitResult::miss(start, end);
        }
        let dir = delta / max_distance;
        let ray = Ray::new(to_point(start), Vector::new(dir.x, dir.y, dir.z));

        let mut closest: Option<(f32, Vec3, &CollisionBrush)> = None;
        for brush in self
            .brushes
            .iter()
            .filter(|b| ContentFlags::MASK_PLAYER_SOLID.intersects(b.contents))
        {
            if let Some(hit) = brush.shape.cast_ray_and_get_normal(&brush.transform, &ray, max_distance, true) {
                if closest.as_ref().map_or(true, |(toi, _, _)| hit.time_of_impact < *toi) {
                    closest = Some((hit.time_of_impact, to_vec3(hit.normal), brush));
                }
            }
        }

        match closest {
            Some((toi, normal, brush)) => {
                let point = start + dir * toi;
                let normal = normal.try_normalize().unwrap_or(-dir);
                HitResult {
                    blocking: true,
                    time: toi / max_distance,
                    trace_start: start,
                    trace_end: end,
                    location: point,
                    normal,
                    impact_point: point,
                    impact_normal: normal,
                    start_penetrating: toi <= 0.0,
                    penetration_depth: 0.0,
                    material: brush.material,
                }
            }
            None => HitResult::miss(start, end),
        }
    }

    fn is_in_fluid(&self, position: Vec3, capsule: CapsuleShape) -> bool {
        self.overlaps_mask(position, capsule, ContentFlags::MASK_FLUID)
    }
}

#[inline]
fn to_point(v: Vec3) -> Point<Real> {
    Point::new(v.x, v.y, v.z)
}

#[inline]
fn to_vec3(v: Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

// ============================================================================
// Tests
// ============================================================================
