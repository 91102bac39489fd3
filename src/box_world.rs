//! A headless [`PhysicsWorld`] made of axis-aligned boxes.
//!
//! Useful for server-side simulation and tests, where spinning up an Avian world is
//! overkill. The capsule is approximated by its bounding box for sweeps, which is exact
//! against the flat faces these scenes are built from.

use crate::{
    prelude::*,
    probe::{
        CapsuleShape, ColliderHandle, ColliderInfo, ParkourKind, PhysicsWorld, Sweep, SweepHit,
        nearest_within,
    },
};

/// Distance kept between the capsule and anything it slides along.
const SKIN: f32 = 1.0e-3;
const MAX_SLIDE_ITERATIONS: usize = 4;
const MIN_MOVE_SQ: f32 = 1.0e-10;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxCollider {
    pub center: Vec3,
    pub half_extents: Vec3,
    pub climbable: bool,
    pub parkour: Option<ParkourKind>,
}

impl BoxCollider {
    pub fn new(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            half_extents,
            climbable: false,
            parkour: None,
        }
    }

    pub fn climbable(mut self) -> Self {
        self.climbable = true;
        self
    }

    pub fn parkour(mut self, kind: ParkourKind) -> Self {
        self.parkour = Some(kind);
        self
    }

    /// Describes this box as the collider `handle`.
    pub fn info(&self, handle: ColliderHandle) -> ColliderInfo {
        ColliderInfo {
            handle,
            center: self.center,
            rotation: Quat::IDENTITY,
            half_extents: self.half_extents,
            is_box: true,
            climbable: self.climbable,
            parkour: self.parkour,
        }
    }

    fn min(&self) -> Vec3 {
        self.center - self.half_extents
    }

    fn max(&self) -> Vec3 {
        self.center + self.half_extents
    }

    fn closest_point(&self, point: Vec3) -> Vec3 {
        point.clamp(self.min(), self.max())
    }

    /// Strict overlap with another box, touching faces do not count.
    fn overlaps(&self, center: Vec3, half_extents: Vec3) -> bool {
        let delta = (center - self.center).abs();
        let reach = self.half_extents + half_extents;
        delta.x < reach.x && delta.y < reach.y && delta.z < reach.z
    }

    /// Earliest time of impact in `[0, 1]` of a box of `half_extents` moving from `center`
    /// by `motion`, with the face normal that was hit. Boxes that start out overlapping are
    /// ignored so a penetrating capsule can always move out.
    fn cast(&self, center: Vec3, half_extents: Vec3, motion: Vec3) -> Option<(f32, Vec3)> {
        // Shrunk by the skin so a mover resting on a face can slide along it.
        let reach = self.half_extents + half_extents - Vec3::splat(SKIN);
        let mut enter = f32::NEG_INFINITY;
        let mut exit = f32::INFINITY;
        let mut normal = Vec3::ZERO;

        for axis in 0..3 {
            let origin = center[axis] - self.center[axis];
            let speed = motion[axis];
            if speed.abs() <= f32::EPSILON {
                if origin.abs() >= reach[axis] {
                    return None;
                }
                continue;
            }
            let near = (-reach[axis] - origin) / speed;
            let far = (reach[axis] - origin) / speed;
            let (near, far) = if near <= far { (near, far) } else { (far, near) };
            if near > enter {
                enter = near;
                normal = Vec3::ZERO;
                normal[axis] = -speed.signum();
            }
            exit = exit.min(far);
        }

        if enter >= exit || exit <= 0.0 || enter > 1.0 || enter < 0.0 {
            return None;
        }
        Some((enter, normal))
    }
}

#[derive(Clone, Debug, Default)]
pub struct BoxWorld {
    boxes: Vec<BoxCollider>,
}

impl BoxWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, collider: BoxCollider) -> ColliderHandle {
        self.boxes.push(collider);
        ColliderHandle::from_raw(self.boxes.len() as u64 - 1)
    }

    pub fn with(mut self, collider: BoxCollider) -> Self {
        self.add(collider);
        self
    }

    fn get(&self, handle: ColliderHandle) -> Option<&BoxCollider> {
        usize::try_from(handle.raw())
            .ok()
            .and_then(|index| self.boxes.get(index))
    }

    fn handles(&self) -> impl Iterator<Item = (ColliderHandle, &BoxCollider)> {
        self.boxes
            .iter()
            .enumerate()
            .map(|(index, collider)| (ColliderHandle::from_raw(index as u64), collider))
    }
}

impl PhysicsWorld for BoxWorld {
    fn sweep_capsule(
        &self,
        capsule: CapsuleShape,
        position: Vec3,
        _rotation: Quat,
        displacement: Vec3,
        _delta_time: f32,
    ) -> Sweep {
        let half_extents = Vec3::new(capsule.radius, capsule.height * 0.5, capsule.radius);
        let lift = Vec3::Y * (capsule.height * 0.5);
        let mut center = position + lift;
        let mut remaining = displacement;
        let mut hits = Vec::new();

        for _ in 0..MAX_SLIDE_ITERATIONS {
            if remaining.length_squared() <= MIN_MOVE_SQ {
                break;
            }

            let earliest = self
                .handles()
                .filter_map(|(handle, collider)| {
                    collider
                        .cast(center, half_extents, remaining)
                        .map(|(time, normal)| (handle, collider, time, normal))
                })
                .min_by(|a, b| a.2.total_cmp(&b.2));

            let Some((handle, collider, time, normal)) = earliest else {
                center += remaining;
                break;
            };

            center += remaining * time + normal * SKIN;
            hits.push(SweepHit {
                collider: handle,
                point: collider.closest_point(center),
                normal,
            });

            let leftover = remaining * (1.0 - time);
            remaining = leftover - normal * leftover.dot(normal);
        }

        Sweep {
            position: center - lift,
            hits,
        }
    }

    fn ground_probe(&self, point: Vec3, radius: f32) -> Option<ColliderHandle> {
        nearest_within(
            self.handles()
                .map(|(handle, collider)| (handle, collider.closest_point(point))),
            point,
            radius,
        )
    }

    fn check_capsule(&self, start: Vec3, end: Vec3, radius: f32) -> bool {
        let min = start.min(end) - Vec3::splat(radius);
        let max = start.max(end) + Vec3::splat(radius);
        let center = (min + max) * 0.5;
        let half_extents = (max - min) * 0.5;
        self.boxes
            .iter()
            .any(|collider| collider.overlaps(center, half_extents))
    }

    fn raycast(&self, origin: Vec3, direction: Dir3, max_distance: f32) -> Option<f32> {
        let motion = direction.as_vec3() * max_distance;
        self.boxes
            .iter()
            .filter_map(|collider| {
                if collider.closest_point(origin) == origin {
                    return Some(0.0);
                }
                collider
                    .cast(origin, Vec3::ZERO, motion)
                    .map(|(time, _)| time * max_distance)
            })
            .min_by(f32::total_cmp)
    }

    fn closest_point(&self, collider: ColliderHandle, point: Vec3) -> Option<Vec3> {
        self.get(collider).map(|collider| collider.closest_point(point))
    }

    fn collider(&self, handle: ColliderHandle) -> Option<ColliderInfo> {
        self.get(handle).map(|collider| collider.info(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPSULE: CapsuleShape = CapsuleShape {
        radius: 0.3,
        height: 1.8,
    };

    fn floor() -> BoxCollider {
        BoxCollider::new(Vec3::new(0.0, -0.5, 0.0), Vec3::new(50.0, 0.5, 50.0))
    }

    #[test]
    fn sliding_along_the_floor_does_not_hit_it() {
        let world = BoxWorld::new().with(floor());
        let sweep = world.sweep_capsule(CAPSULE, Vec3::ZERO, Quat::IDENTITY, Vec3::new(1.0, 0.0, -2.0), 0.1);
        assert!(sweep.hits.is_empty());
        assert!(sweep.position.abs_diff_eq(Vec3::new(1.0, 0.0, -2.0), 1e-6));
    }

    #[test]
    fn wall_stops_and_slides() {
        let mut world = BoxWorld::new().with(floor());
        let wall = world.add(BoxCollider::new(Vec3::new(0.0, 1.5, -2.0), Vec3::new(2.0, 1.5, 0.2)));
        let sweep = world.sweep_capsule(CAPSULE, Vec3::ZERO, Quat::IDENTITY, Vec3::new(0.5, 0.0, -3.0), 0.1);

        assert_eq!(sweep.hits.len(), 1);
        let hit = sweep.hits[0];
        assert_eq!(hit.collider, wall);
        assert!(hit.normal.abs_diff_eq(Vec3::Z, 1e-6));
        assert!((hit.point.z + 1.8).abs() < 1e-3);
        // Stopped in front of the wall but kept the sideways part of the motion.
        assert!((sweep.position.z + 1.5).abs() < 1e-2);
        assert!((sweep.position.x - 0.5).abs() < 1e-3);
    }

    #[test]
    fn probes_find_the_nearest_box() {
        let mut world = BoxWorld::new();
        let ground = world.add(floor());
        assert_eq!(world.ground_probe(Vec3::new(0.0, 0.05, 0.0), 0.1), Some(ground));
        assert_eq!(world.ground_probe(Vec3::new(0.0, 0.5, 0.0), 0.1), None);
        assert_eq!(world.raycast(Vec3::new(0.0, 0.3, 0.0), Dir3::NEG_Y, 1.0).map(|d| (d * 10.0).round()), Some(3.0));
        assert!(world.check_capsule(Vec3::new(0.0, 0.1, 0.0), Vec3::new(0.0, 1.0, 0.0), 0.3));
        assert!(!world.check_capsule(Vec3::new(0.0, 0.4, 0.0), Vec3::new(0.0, 1.0, 0.0), 0.3));
    }
}
