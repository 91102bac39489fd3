//! The low-level character controller: a capsule pushed through a [`PhysicsWorld`] one tick at
//! a time, with a snapshot slot for speculative simulation.

use tracing::{error, warn};

use crate::{
    geometry::{AffineTransform, project_safe, yaw_towards},
    prelude::*,
    probe::{CapsuleShape, ColliderHandle, PhysicsWorld, SweepHit, WORLD_UP},
};

#[derive(Clone, Copy, Debug, PartialEq, Reflect)]
pub struct ControllerConfig {
    pub capsule_radius: f32,
    /// Full height of the capsule, from feet to top.
    pub capsule_height: f32,
    /// Hits this close above the feet count as ground, not as wall contacts.
    pub ground_probe_radius: f32,
    pub ground_snap: bool,
    pub ground_snap_ray_distance: f32,
    pub gravity_enabled: bool,
    pub gravity: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            capsule_radius: 0.3,
            capsule_height: 1.8,
            ground_probe_radius: 0.1,
            ground_snap: true,
            ground_snap_ray_distance: 0.5,
            gravity_enabled: true,
            gravity: 9.81,
        }
    }
}

impl ControllerConfig {
    pub fn capsule(&self) -> CapsuleShape {
        CapsuleShape {
            radius: self.capsule_radius,
            height: self.capsule_height,
        }
    }
}

/// The controller's physical situation at one instant.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CollisionSample {
    pub collider: Option<ColliderHandle>,
    pub is_colliding: bool,
    pub contact_point: Vec3,
    pub contact_normal: Vec3,
    pub ground: Option<ColliderHandle>,
    pub is_grounded: bool,
    pub position: Vec3,
    pub velocity: Vec3,
    pub kinematic_displacement: Vec3,
    pub dynamics_displacement: Vec3,
}

impl CollisionSample {
    fn starting_at(position: Vec3) -> Self {
        Self {
            position,
            ..default()
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ControllerState {
    /// Last committed sample.
    pub previous: CollisionSample,
    /// Sample being built by the tick in progress.
    pub current: CollisionSample,
    pub desired_displacement: Vec3,
}

/// Pose and size of the last surface the capsule ran into.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ContactRecord {
    /// Hit point, rotated to face the surface.
    pub transform: AffineTransform,
    /// Estimated width of the surface.
    pub size: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Snapshot {
    state: ControllerState,
    transform: AffineTransform,
    target_position: Vec3,
    contact: ContactRecord,
}

#[derive(Clone, Debug)]
pub struct CharacterController {
    config: ControllerConfig,
    transform: AffineTransform,
    state: ControllerState,
    snapshot: Option<Snapshot>,
    target_position: Vec3,
    stepping: f32,
    collision_enabled: bool,
    contact: ContactRecord,
}

impl Default for CharacterController {
    fn default() -> Self {
        Self::new(ControllerConfig::default())
    }
}

impl CharacterController {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            transform: AffineTransform::IDENTITY,
            state: ControllerState::default(),
            snapshot: None,
            target_position: Vec3::ZERO,
            stepping: 1.0,
            collision_enabled: true,
            contact: ContactRecord::default(),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn capsule(&self) -> CapsuleShape {
        self.config.capsule()
    }

    pub fn transform(&self) -> AffineTransform {
        self.transform
    }

    pub fn position(&self) -> Vec3 {
        self.transform.translation
    }

    pub fn rotation(&self) -> Quat {
        self.transform.rotation
    }

    pub fn forward(&self) -> Vec3 {
        self.transform.forward()
    }

    pub fn right(&self) -> Vec3 {
        self.transform.right()
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn previous(&self) -> CollisionSample {
        self.state.previous
    }

    pub fn current(&self) -> CollisionSample {
        self.state.current
    }

    pub fn is_grounded(&self) -> bool {
        self.state.current.is_grounded
    }

    pub fn ground(&self) -> Option<ColliderHandle> {
        self.state.current.ground
    }

    pub fn target_position(&self) -> Vec3 {
        self.target_position
    }

    pub fn set_target_position(&mut self, target: Vec3) {
        self.target_position = target;
    }

    pub fn stepping(&self) -> f32 {
        self.stepping
    }

    /// Multiplier applied to queued displacement by the next ticks.
    pub fn set_stepping(&mut self, stepping: f32) {
        self.stepping = stepping;
    }

    pub fn collision_enabled(&self) -> bool {
        self.collision_enabled
    }

    pub fn contact_transform(&self) -> AffineTransform {
        self.contact.transform
    }

    pub fn contact_size(&self) -> f32 {
        self.contact.size
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Captures the controller so a speculative pass can be undone with [`Self::rewind`].
    pub fn snapshot(&mut self) {
        debug_assert!(
            self.snapshot.is_none(),
            "snapshot taken while another one is pending"
        );
        if self.snapshot.is_some() {
            error!("Character controller snapshot taken while another one is pending, overwriting it");
        }
        self.snapshot = Some(Snapshot {
            state: self.state,
            transform: self.transform,
            target_position: self.target_position,
            contact: self.contact,
        });
    }

    /// Restores the pending snapshot and consumes it.
    pub fn rewind(&mut self) {
        let snapshot = self.snapshot.take();
        debug_assert!(snapshot.is_some(), "rewind without a snapshot");
        let Some(snapshot) = snapshot else {
            error!("Character controller rewound without a snapshot, ignoring");
            return;
        };
        self.state = snapshot.state;
        self.transform = snapshot.transform;
        self.target_position = snapshot.target_position;
        self.contact = snapshot.contact;
    }

    /// Queues a kinematic displacement for the next [`Self::tick`].
    pub fn move_by(&mut self, displacement: Vec3) {
        self.state.desired_displacement += displacement;
    }

    /// Yaws the agent about world up by `degrees`, without moving it.
    pub fn force_rotate(&mut self, degrees: f32) {
        self.transform.rotation =
            (Quat::from_rotation_y(degrees.to_radians()) * self.transform.rotation).normalize();
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.transform.rotation = rotation;
    }

    /// Turns collision response on or off. While off, ticks move the agent straight to its
    /// queued displacement and skip ground snapping.
    pub fn configure(&mut self, collision_response: bool) {
        self.collision_enabled = collision_response;
    }

    /// Places the agent at `transform` and makes it the committed position.
    pub fn teleport_to(&mut self, transform: AffineTransform) {
        self.transform = transform;
        self.state.current.position = transform.translation;
        self.state.previous.position = transform.translation;
        self.state.desired_displacement = Vec3::ZERO;
        self.target_position = transform.translation;
    }

    /// Advances the controller by one step of `delta_time` seconds.
    ///
    /// The sample of the last tick becomes `previous` and the result of this one `current`.
    pub fn tick(&mut self, world: &dyn PhysicsWorld, delta_time: f32) {
        self.state.previous = self.state.current;
        let previous = self.state.previous;
        let start = self.transform.translation;
        let mut current = CollisionSample::starting_at(start);

        current.kinematic_displacement = sanitize(self.state.desired_displacement * self.stepping);
        self.state.desired_displacement = Vec3::ZERO;

        if self.config.gravity_enabled && self.collision_enabled && !previous.is_grounded && delta_time > 0.0 {
            let fall_speed = previous.dynamics_displacement.y / delta_time - self.config.gravity * delta_time;
            current.dynamics_displacement = WORLD_UP * fall_speed * delta_time;
        }

        let displacement = current.kinematic_displacement + current.dynamics_displacement;
        let end = if self.collision_enabled {
            let sweep = world.sweep_capsule(
                self.capsule(),
                start,
                self.transform.rotation,
                displacement,
                delta_time,
            );
            if let Some(hit) = sweep
                .hits
                .iter()
                .find(|hit| self.accepts_hit(hit, sweep.position, &previous))
            {
                self.record_contact(world, hit, &mut current);
            }
            sweep.position
        } else {
            start + displacement
        };

        current.position = end;
        if delta_time > 0.0 {
            current.velocity = (end - start) / delta_time;
        }

        if self.collision_enabled {
            self.probe_ground(world, &mut current);
            self.snap_to_ground(world, &previous, &mut current, delta_time);
        }

        self.transform.translation = current.position;
        self.state.current = current;
    }

    fn accepts_hit(&self, hit: &SweepHit, position: Vec3, previous: &CollisionSample) -> bool {
        if hit.point.y <= position.y + self.config.ground_probe_radius {
            return false;
        }
        previous.ground != Some(hit.collider)
    }

    fn record_contact(&mut self, world: &dyn PhysicsWorld, hit: &SweepHit, current: &mut CollisionSample) {
        current.collider = Some(hit.collider);
        current.is_colliding = true;
        current.contact_point = hit.point;
        current.contact_normal = hit.normal;

        let size = world.collider(hit.collider).map_or(0.0, |info| {
            let size = info.size();
            if info.right().dot(hit.normal).abs() < info.forward().dot(hit.normal).abs() {
                size.x
            } else {
                size.z
            }
        });
        self.contact = ContactRecord {
            transform: AffineTransform::new(hit.point, yaw_towards(-hit.normal)),
            size,
        };
    }

    fn probe_ground(&self, world: &dyn PhysicsWorld, current: &mut CollisionSample) {
        current.ground = world.ground_probe(current.position, self.config.ground_probe_radius);
        current.is_grounded = current.ground.is_some();
    }

    fn snap_to_ground(
        &self,
        world: &dyn PhysicsWorld,
        previous: &CollisionSample,
        current: &mut CollisionSample,
        delta_time: f32,
    ) {
        if !self.config.ground_snap {
            return;
        }
        let Some(ground) = previous.ground else {
            return;
        };
        let radius = self.config.capsule_radius;
        let origin = current.position + WORLD_UP * radius;
        if world
            .raycast(origin, Dir3::NEG_Y, self.config.ground_snap_ray_distance + radius)
            .is_some()
        {
            return;
        }
        let Some(closest) = world.closest_point(ground, current.position) else {
            return;
        };

        let velocity = project_safe(current.velocity, closest - previous.position);
        current.position = previous.position + velocity * delta_time;
        current.velocity = if self.stepping > 0.0 {
            velocity / self.stepping
        } else {
            velocity
        };
        current.dynamics_displacement = Vec3::ZERO;
        self.probe_ground(world, current);
    }
}

fn sanitize(mut displacement: Vec3) -> Vec3 {
    for i in 0..3 {
        if !displacement[i].is_finite() {
            warn!("displacement[{i}] is not finite: {}, setting to 0", displacement[i]);
            displacement[i] = 0.0;
        }
    }
    displacement
}
