//! Rigid poses and the ledge / wall primitives the climbing and parkour abilities walk along.
//!
//! Everything in here is pure: no physics queries, no state beyond the geometry itself.

use crate::{
    prelude::*,
    probe::{ColliderInfo, WORLD_UP},
};

/// A rigid pose: translation plus unit rotation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineTransform {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AffineTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub const fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(translation, Quat::IDENTITY)
    }

    /// Local -Z, the way Bevy transforms look.
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Linear distance and angular distance (degrees) to `other`.
    pub fn error_to(&self, other: &Self) -> (f32, f32) {
        let linear = self.translation.distance(other.translation);
        let angular = self.rotation.angle_between(other.rotation).to_degrees();
        (linear, angular)
    }
}

impl From<Transform> for AffineTransform {
    fn from(transform: Transform) -> Self {
        Self::new(transform.translation, transform.rotation)
    }
}

/// Signed angle in degrees that rotates `from` onto `to` around `axis`.
///
/// Both vectors are projected onto the plane orthogonal to `axis` first. Degenerate inputs
/// yield `0.0`.
pub fn signed_angle(from: Vec3, to: Vec3, axis: Vec3) -> f32 {
    let from = from.reject_from_normalized(axis);
    let to = to.reject_from_normalized(axis);
    if from.length_squared() <= f32::EPSILON || to.length_squared() <= f32::EPSILON {
        return 0.0;
    }
    let sin = axis.dot(from.cross(to));
    let cos = from.dot(to);
    sin.atan2(cos).to_degrees()
}

/// Yaw-only rotation whose forward (-Z) points along the horizontal part of `direction`.
pub fn yaw_towards(direction: Vec3) -> Quat {
    let flat = Vec3::new(direction.x, 0.0, direction.z);
    if flat.length_squared() <= f32::EPSILON {
        return Quat::IDENTITY;
    }
    Quat::from_rotation_y(f32::atan2(-flat.x, -flat.z))
}

/// Projection of `v` onto `onto`, zero when `onto` is degenerate.
pub fn project_safe(v: Vec3, onto: Vec3) -> Vec3 {
    let len_sq = onto.length_squared();
    if len_sq <= f32::EPSILON {
        return Vec3::ZERO;
    }
    onto * (v.dot(onto) / len_sq)
}

/// Closest point to `p` on segment `a..b`, with its normalized parameter.
pub fn closest_point_on_segment(a: Vec3, b: Vec3, p: Vec3) -> (Vec3, f32) {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return (a, 0.0);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (a + ab * t, t)
}

/// Location along a ledge: a segment of the polygon and a fraction along it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LedgeHook {
    pub index: usize,
    pub fraction: f32,
}

/// How close a point is to the ends of its ledge segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CornerProximity {
    /// Whether the nearest segment end is on the left of a character facing the ledge.
    pub left: bool,
    pub distance: f32,
}

/// A closed polygon of vertices describing a climbable edge, usually the top face of a box.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LedgeGeometry {
    vertices: Vec<Vec3>,
}

impl LedgeGeometry {
    pub fn new(vertices: Vec<Vec3>) -> Self {
        Self { vertices }
    }

    /// The four top corners of a box collider, wound around its up axis.
    pub fn from_collider(collider: &ColliderInfo) -> Self {
        let h = collider.half_extents;
        let corners = [
            Vec3::new(-h.x, h.y, h.z),
            Vec3::new(h.x, h.y, h.z),
            Vec3::new(h.x, h.y, -h.z),
            Vec3::new(-h.x, h.y, -h.z),
        ];
        Self::new(
            corners
                .into_iter()
                .map(|corner| collider.center + collider.rotation * corner)
                .collect(),
        )
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.len() < 2
    }

    fn segment(&self, index: usize) -> (Vec3, Vec3) {
        let n = self.vertices.len();
        (self.vertices[index % n], self.vertices[(index + 1) % n])
    }

    fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.vertices.len()
    }

    fn previous_index(&self, index: usize) -> usize {
        (index + self.vertices.len() - 1) % self.vertices.len()
    }

    fn centroid(&self) -> Vec3 {
        self.vertices.iter().copied().sum::<Vec3>() / self.vertices.len().max(1) as f32
    }

    /// Hook on the segment closest to `position`.
    pub fn get_hook(&self, position: Vec3) -> LedgeHook {
        if self.is_empty() {
            return LedgeHook::default();
        }
        (0..self.vertices.len())
            .map(|index| {
                let (a, b) = self.segment(index);
                let (point, fraction) = closest_point_on_segment(a, b, position);
                (LedgeHook { index, fraction }, point.distance_squared(position))
            })
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(hook, _)| hook)
            .unwrap_or_default()
    }

    pub fn get_position(&self, hook: LedgeHook) -> Vec3 {
        if self.is_empty() {
            return Vec3::ZERO;
        }
        let (a, b) = self.segment(hook.index);
        a.lerp(b, hook.fraction)
    }

    /// Horizontal outward normal of the hook's segment.
    pub fn get_normal(&self, hook: LedgeHook) -> Vec3 {
        if self.is_empty() {
            return Vec3::NEG_Z;
        }
        let (a, b) = self.segment(hook.index);
        let normal = (b - a).cross(WORLD_UP).normalize_or_zero();
        let outward = (a + b) * 0.5 - self.centroid();
        if normal.dot(outward) < 0.0 {
            -normal
        } else {
            normal
        }
    }

    /// Pose on the ledge at `hook`, facing away from the ledge.
    pub fn get_transform(&self, hook: LedgeHook) -> AffineTransform {
        AffineTransform::new(
            self.get_position(hook),
            yaw_towards(self.get_normal(hook)),
        )
    }

    /// Pose at the closest point of the whole polygon to `position`, facing outward.
    pub fn closest_transform(&self, position: Vec3) -> AffineTransform {
        self.get_transform(self.get_hook(position))
    }

    /// Move `hook` towards `target` along its own segment.
    ///
    /// The result stays at least `min_corner_distance` away from either end. When the target
    /// projects past the end of the segment the hook on the neighbouring segment is returned
    /// instead, so callers can tell by `index` that the target left the segment.
    pub fn update_hook(&self, hook: LedgeHook, target: Vec3, min_corner_distance: f32) -> LedgeHook {
        if self.is_empty() {
            return hook;
        }
        let (a, b) = self.segment(hook.index);
        let ab = b - a;
        let length = ab.length();
        if length <= f32::EPSILON {
            return hook;
        }
        let raw = (target - a).dot(ab) / (length * length);
        if raw < 0.0 {
            let index = self.previous_index(hook.index);
            let (pa, pb) = self.segment(index);
            let (_, fraction) = closest_point_on_segment(pa, pb, target);
            return LedgeHook { index, fraction };
        }
        if raw > 1.0 {
            let index = self.next_index(hook.index);
            let (na, nb) = self.segment(index);
            let (_, fraction) = closest_point_on_segment(na, nb, target);
            return LedgeHook { index, fraction };
        }
        let margin = (min_corner_distance / length).min(0.5);
        LedgeHook {
            index: hook.index,
            fraction: raw.clamp(margin, 1.0 - margin),
        }
    }

    /// Hook on the neighbouring segment around the corner to one side of `hook`, `distance`
    /// from the shared vertex. Sides are as seen by a character facing the ledge.
    pub fn corner_hook(&self, hook: LedgeHook, right: bool, distance: f32) -> LedgeHook {
        if self.is_empty() {
            return hook;
        }
        let (a, b) = self.segment(hook.index);
        let facing_right = (-self.get_normal(hook)).cross(WORLD_UP);
        let b_is_right = (b - a).dot(facing_right) > 0.0;

        let index = if right == b_is_right {
            self.next_index(hook.index)
        } else {
            self.previous_index(hook.index)
        };
        let (na, nb) = self.segment(index);
        let length = na.distance(nb);
        let offset = if length > f32::EPSILON {
            (distance / length).min(0.5)
        } else {
            0.0
        };
        let fraction = if index == self.next_index(hook.index) {
            offset
        } else {
            1.0 - offset
        };
        LedgeHook { index, fraction }
    }

    /// Distance from the projection of `position` on the hook's segment to the nearest end of
    /// that segment, and which side that end is on.
    pub fn closest_point_distance(&self, position: Vec3, hook: LedgeHook) -> CornerProximity {
        if self.is_empty() {
            return CornerProximity {
                left: false,
                distance: 0.0,
            };
        }
        let (a, b) = self.segment(hook.index);
        let (point, _) = closest_point_on_segment(a, b, position);
        let to_a = point.distance(a);
        let to_b = point.distance(b);

        // A character facing the ledge looks along -normal; its right is forward x up.
        let right = (-self.get_normal(hook)).cross(WORLD_UP);
        let a_is_left = (b - a).dot(right) > 0.0;

        if to_a <= to_b {
            CornerProximity {
                left: a_is_left,
                distance: to_a,
            }
        } else {
            CornerProximity {
                left: !a_is_left,
                distance: to_b,
            }
        }
    }
}

/// Location on a wall face: `x` across, `y` up, both normalized.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WallAnchor {
    pub x: f32,
    pub y: f32,
}

/// One vertical face of a box collider.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WallGeometry {
    /// Bottom-left corner as seen by a character facing the wall.
    origin: Vec3,
    tangent: Vec3,
    normal: Vec3,
    width: f32,
    height: f32,
}

impl WallGeometry {
    /// Picks the side face of `collider` whose outward normal best matches `contact`'s facing.
    ///
    /// Contact poses face the wall, so the wall's normal is the contact's backward direction.
    pub fn from_collider(collider: &ColliderInfo, contact: &AffineTransform) -> Self {
        let facing = -contact.forward();
        let h = collider.half_extents;
        let faces = [
            (Vec3::X, h.x, Vec3::NEG_Z, h.z),
            (Vec3::NEG_X, h.x, Vec3::Z, h.z),
            (Vec3::Z, h.z, Vec3::X, h.x),
            (Vec3::NEG_Z, h.z, Vec3::NEG_X, h.x),
        ];
        let (local_normal, depth, local_tangent, half_width) = faces
            .into_iter()
            .max_by(|(a, ..), (b, ..)| {
                (collider.rotation * *a)
                    .dot(facing)
                    .total_cmp(&(collider.rotation * *b).dot(facing))
            })
            .unwrap_or(faces[0]);

        let normal = collider.rotation * local_normal;
        let tangent = collider.rotation * local_tangent;
        let face_center = collider.center + normal * depth;
        Self {
            origin: face_center - tangent * half_width - WORLD_UP * h.y,
            tangent,
            normal,
            width: half_width * 2.0,
            height: h.y * 2.0,
        }
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    pub fn get_anchor(&self, position: Vec3) -> WallAnchor {
        let local = position - self.origin;
        let x = if self.width > 0.0 {
            local.dot(self.tangent) / self.width
        } else {
            0.0
        };
        let y = if self.height > 0.0 {
            local.dot(WORLD_UP) / self.height
        } else {
            0.0
        };
        WallAnchor {
            x: x.clamp(0.0, 1.0),
            y: y.clamp(0.0, 1.0),
        }
    }

    /// Height of the face at `anchor`, measured from its base.
    pub fn get_height(&self, _anchor: WallAnchor) -> f32 {
        self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ColliderHandle;

    fn wall(center: Vec3, half_extents: Vec3) -> ColliderInfo {
        ColliderInfo {
            handle: ColliderHandle::from_raw(7),
            center,
            rotation: Quat::IDENTITY,
            half_extents,
            is_box: true,
            climbable: true,
            parkour: None,
        }
    }

    #[test]
    fn signed_angle_matches_yaw_rotation() {
        let from = Vec3::NEG_Z;
        let to = Quat::from_rotation_y(30f32.to_radians()) * from;
        assert!((signed_angle(from, to, WORLD_UP) - 30.0).abs() < 1e-4);
        assert!((signed_angle(to, from, WORLD_UP) + 30.0).abs() < 1e-4);
        assert_eq!(signed_angle(Vec3::ZERO, to, WORLD_UP), 0.0);
    }

    #[test]
    fn yaw_towards_points_forward_along_direction() {
        for direction in [Vec3::X, Vec3::NEG_X, Vec3::Z, Vec3::NEG_Z, Vec3::new(1.0, 3.0, 1.0)] {
            let forward = yaw_towards(direction) * Vec3::NEG_Z;
            let expected = Vec3::new(direction.x, 0.0, direction.z).normalize();
            assert!(forward.abs_diff_eq(expected, 1e-5), "{direction}: {forward}");
        }
    }

    #[test]
    fn box_ledge_normals_point_outward() {
        let ledge = LedgeGeometry::from_collider(&wall(Vec3::new(0.0, 1.4, -2.0), Vec3::new(2.0, 1.4, 0.2)));
        let hook = ledge.get_hook(Vec3::new(0.5, 0.0, 0.0));
        assert!(ledge.get_normal(hook).abs_diff_eq(Vec3::Z, 1e-5));
        assert!((ledge.get_position(hook).y - 2.8).abs() < 1e-5);
        assert!((ledge.get_position(hook).x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn update_hook_clamps_before_corner_and_reports_segment_exit() {
        let ledge = LedgeGeometry::from_collider(&wall(Vec3::new(0.0, 1.4, -2.0), Vec3::new(2.0, 1.4, 0.2)));
        let hook = ledge.get_hook(Vec3::new(0.0, 2.8, -1.8));

        let near_corner = ledge.update_hook(hook, Vec3::new(1.95, 2.8, -1.8), 0.2);
        assert_eq!(near_corner.index, hook.index);
        assert!((ledge.get_position(near_corner).x - 1.8).abs() < 1e-4);

        let past_corner = ledge.update_hook(hook, Vec3::new(2.5, 2.8, -1.8), 0.2);
        assert_ne!(past_corner.index, hook.index);
    }

    #[test]
    fn corner_hook_lands_on_the_neighbouring_face() {
        let ledge = LedgeGeometry::from_collider(&wall(Vec3::new(0.0, 1.4, -2.0), Vec3::new(2.0, 1.4, 0.2)));
        let hook = ledge.get_hook(Vec3::new(1.8, 2.8, -1.8));

        let right = ledge.corner_hook(hook, true, 0.1);
        assert_ne!(right.index, hook.index);
        assert!(ledge.get_normal(right).abs_diff_eq(Vec3::X, 1e-5));
        assert!(ledge.get_position(right).abs_diff_eq(Vec3::new(2.0, 2.8, -1.9), 1e-4));

        let left = ledge.corner_hook(hook, false, 0.1);
        assert!(ledge.get_normal(left).abs_diff_eq(Vec3::NEG_X, 1e-5));
        assert!(ledge.get_position(left).abs_diff_eq(Vec3::new(-2.0, 2.8, -1.9), 1e-4));
    }

    #[test]
    fn corner_proximity_knows_its_side() {
        let ledge = LedgeGeometry::from_collider(&wall(Vec3::new(0.0, 1.4, -2.0), Vec3::new(2.0, 1.4, 0.2)));
        let hook = ledge.get_hook(Vec3::new(0.0, 2.8, -1.8));

        // Facing the wall (-Z), +X is to the right.
        let right = ledge.closest_point_distance(Vec3::new(1.97, 2.8, -1.8), hook);
        assert!(!right.left);
        assert!((right.distance - 0.03).abs() < 1e-4);

        let left = ledge.closest_point_distance(Vec3::new(-1.9, 2.8, -1.8), hook);
        assert!(left.left);
    }

    #[test]
    fn wall_face_follows_contact_facing() {
        let info = wall(Vec3::new(0.0, 1.4, -2.0), Vec3::new(2.0, 1.4, 0.2));
        let contact = AffineTransform::new(Vec3::new(0.0, 0.0, -1.8), yaw_towards(Vec3::NEG_Z));
        let geometry = WallGeometry::from_collider(&info, &contact);
        assert!(geometry.normal().abs_diff_eq(Vec3::Z, 1e-5));
        let anchor = geometry.get_anchor(Vec3::new(0.0, 1.4, -1.8));
        assert!((anchor.x - 0.5).abs() < 1e-4);
        assert!((anchor.y - 0.5).abs() < 1e-4);
        assert!((geometry.get_height(anchor) - 2.8).abs() < 1e-5);
    }
}
