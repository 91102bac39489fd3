//! [`PhysicsWorld`] over Avian's spatial queries.

use core::time::Duration;

use crate::{
    Climbable, ParkourSurface,
    prelude::*,
    probe::{
        CapsuleShape, ColliderHandle, ColliderInfo, PhysicsWorld, Sweep, SweepHit, WORLD_UP,
        nearest_within,
    },
};

/// Everything [`AvianWorld`] reads from the colliders in the scene.
pub type SurfaceData = (
    &'static Collider,
    &'static Position,
    &'static Rotation,
    Has<Climbable>,
    Option<&'static ParkourSurface>,
);

/// One traverser's view of the Avian world.
///
/// Controller positions are at the capsule's feet while Avian works with shape centers, so
/// every query shifts by half the capsule height.
pub struct AvianWorld<'a, 'w, 's> {
    pub move_and_slide: &'a MoveAndSlide<'w, 's>,
    pub surfaces: &'a Query<'w, 's, SurfaceData>,
    pub filter: &'a SpatialQueryFilter,
    pub config: &'a MoveAndSlideConfig,
}

pub(crate) fn capsule_collider(capsule: CapsuleShape) -> Collider {
    Collider::capsule(
        capsule.radius,
        (capsule.height - 2.0 * capsule.radius).max(0.0),
    )
}

pub(crate) fn center_offset(capsule: CapsuleShape) -> Vec3 {
    WORLD_UP * capsule.height * 0.5
}

impl PhysicsWorld for AvianWorld<'_, '_, '_> {
    fn sweep_capsule(
        &self,
        capsule: CapsuleShape,
        position: Vec3,
        rotation: Quat,
        displacement: Vec3,
        delta_time: f32,
    ) -> Sweep {
        if !(delta_time.is_finite() && delta_time > 0.0) {
            return Sweep {
                position,
                hits: Vec::new(),
            };
        }

        let offset = center_offset(capsule);
        let mut hits = Vec::new();
        let out = self.move_and_slide.move_and_slide(
            &capsule_collider(capsule),
            position + offset,
            rotation,
            displacement / delta_time,
            Duration::from_secs_f32(delta_time),
            self.config,
            self.filter,
            |hit| {
                hits.push(SweepHit {
                    collider: hit.entity.into(),
                    point: hit.point,
                    normal: hit.normal.as_vec3(),
                });
                true
            },
        );
        Sweep {
            position: out.position - offset,
            hits,
        }
    }

    fn ground_probe(&self, point: Vec3, radius: f32) -> Option<ColliderHandle> {
        let mut touching: Vec<ColliderHandle> = Vec::new();
        self.move_and_slide
            .query_pipeline
            .shape_intersections_callback(
                &Collider::sphere(radius),
                point,
                Quat::IDENTITY,
                self.filter,
                |entity| {
                    touching.push(entity.into());
                    true
                },
            );
        nearest_within(
            touching.into_iter().map(|handle| {
                // The sphere overlaps it, so a collider we cannot project counts as touching.
                (handle, self.closest_point(handle, point).unwrap_or(point))
            }),
            point,
            radius,
        )
    }

    fn check_capsule(&self, start: Vec3, end: Vec3, radius: f32) -> bool {
        let mut intersecting = false;
        self.move_and_slide
            .query_pipeline
            .shape_intersections_callback(
                &Collider::capsule_endpoints(radius, start, end),
                Vec3::ZERO,
                Quat::IDENTITY,
                self.filter,
                |_| {
                    intersecting = true;
                    false
                },
            );
        intersecting
    }

    fn raycast(&self, origin: Vec3, direction: Dir3, max_distance: f32) -> Option<f32> {
        self.move_and_slide
            .query_pipeline
            .cast_ray(origin, direction, max_distance, true, self.filter)
            .map(|hit| hit.distance)
    }

    fn closest_point(&self, handle: ColliderHandle, point: Vec3) -> Option<Vec3> {
        let (collider, position, rotation, ..) = self.surfaces.get(handle.entity()).ok()?;
        let (closest, _inside) = collider.project_point(*position, *rotation, point, true);
        Some(closest)
    }

    fn collider(&self, handle: ColliderHandle) -> Option<ColliderInfo> {
        let (collider, position, rotation, climbable, parkour) =
            self.surfaces.get(handle.entity()).ok()?;
        let local = collider.aabb(Vec3::ZERO, Rotation::default());
        let local_center = (local.min + local.max) * 0.5;
        Some(ColliderInfo {
            handle,
            center: position.0 + rotation.0 * local_center,
            rotation: rotation.0,
            half_extents: (local.max - local.min) * 0.5,
            is_box: collider.shape_scaled().as_cuboid().is_some(),
            climbable,
            parkour: parkour.map(|surface| surface.0),
        })
    }
}
