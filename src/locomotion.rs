//! Free locomotion, and the predictive pass that lets other abilities claim the character
//! before it runs into a wall or off a ledge.

use tracing::trace;

use crate::{
    ability::{Ability, AbilityContext, AbilityId, Control, Peers},
    controller::{CharacterController, CollisionSample},
    geometry::{AffineTransform, signed_angle, yaw_towards},
    input::InputSnapshot,
    prelude::*,
    probe::WORLD_UP,
};

#[derive(Clone, Copy, Debug, PartialEq, Reflect)]
pub struct LocomotionConfig {
    /// Walking speed in m/s.
    pub movement_speed_slow: f32,
    /// Running speed in m/s.
    pub movement_speed_fast: f32,
    /// Speeds below this are treated as standing still.
    pub movement_speed_min: f32,
    /// Maximum velocity change per tick, in m/s.
    pub movement_acceleration: f32,
    /// Seconds to reach the target velocity. Smaller is snappier.
    pub movement_acceleration_time: f32,
    /// Rate at which input intensity decays when the stick is released.
    pub movement_deceleration_time: f32,
    /// Rate at which the speed ramp fills up. The ramp is full after `1 / movement_speed_time`
    /// seconds of input.
    pub movement_speed_time: f32,
    /// Degrees per second.
    pub rotation_speed: f32,
    pub rotation_acceleration: f32,
    pub rotation_acceleration_time: f32,
    /// Sub-steps simulated per tick when predicting contacts.
    pub iterations: usize,
    /// Displacement multiplier of every sub-step after the first.
    pub stepping: f32,
    /// Contacts further than this many degrees from the input direction are not offered.
    pub contact_max_angle: f32,
    /// Contacts further than this from the character are not offered.
    pub contact_max_distance: f32,
}

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            movement_speed_slow: 3.9,
            movement_speed_fast: 5.5,
            movement_speed_min: 0.1,
            movement_acceleration: 50.0,
            movement_acceleration_time: 0.1,
            movement_deceleration_time: 0.75,
            movement_speed_time: 0.75,
            rotation_speed: 180.0,
            rotation_acceleration: 15.0,
            rotation_acceleration_time: 0.1,
            iterations: 3,
            stepping: 10.0,
            contact_max_angle: 30.0,
            contact_max_distance: 4.0,
        }
    }
}

/// Speed and turn rate decided for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LocomotionStep {
    pub speed: f32,
    /// Degrees per second.
    pub rotation_speed: f32,
}

#[derive(Clone, Debug)]
pub struct LocomotionAbility {
    pub config: LocomotionConfig,
    pub enabled: bool,
    velocity: Vec3,
    rotation_speed: f32,
    acceleration_timer: f32,
    deceleration_timer: f32,
    previous_intensity: f32,
}

impl Default for LocomotionAbility {
    fn default() -> Self {
        Self::new(LocomotionConfig::default())
    }
}

impl LocomotionAbility {
    pub fn new(config: LocomotionConfig) -> Self {
        Self {
            config,
            enabled: true,
            velocity: Vec3::ZERO,
            rotation_speed: 0.0,
            acceleration_timer: 0.0,
            deceleration_timer: 1.0,
            previous_intensity: 0.0,
        }
    }

    pub fn desired_linear_speed(&self, run: bool) -> f32 {
        if run {
            self.config.movement_speed_fast
        } else {
            self.config.movement_speed_slow
        }
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn rotation_speed(&self) -> f32 {
        self.rotation_speed
    }

    /// Input intensity after the deceleration ramp: dropping the stick lets the intensity decay
    /// instead of stopping dead.
    pub fn movement_intensity(&mut self, input_intensity: f32, delta_time: f32) -> f32 {
        if self.deceleration_timer < 0.0 {
            self.deceleration_timer = 0.0;
            self.previous_intensity = 0.0;
        }

        if input_intensity < self.previous_intensity {
            let intensity = self.deceleration_timer;
            self.previous_intensity = intensity + 0.01;
            self.deceleration_timer -= self.config.movement_deceleration_time * delta_time;
            intensity
        } else {
            self.deceleration_timer = input_intensity;
            self.previous_intensity = input_intensity;
            input_intensity
        }
    }

    /// Advances both speed ramps by one tick and returns the speed to move at.
    pub fn desired_speed(&mut self, input: &InputSnapshot, delta_time: f32) -> f32 {
        let intensity = self.movement_intensity(input.move_intensity, delta_time);

        self.acceleration_timer =
            (self.acceleration_timer + self.config.movement_speed_time * delta_time).min(1.0);

        let speed = self.desired_linear_speed(input.run) * self.acceleration_timer * intensity;

        if speed == 0.0 {
            self.acceleration_timer = 0.0;
        } else if intensity < self.acceleration_timer {
            self.acceleration_timer = intensity;
        }

        if speed < self.config.movement_speed_min {
            0.0
        } else {
            speed
        }
    }

    fn update_velocity(&mut self, input: &InputSnapshot) {
        let limit = self.desired_linear_speed(input.run);
        let target = input.movement_direction * input.move_intensity * limit;
        let acceleration = ((target - self.velocity) / self.config.movement_acceleration_time)
            .clamp_length_max(self.config.movement_acceleration);
        self.velocity = (self.velocity + acceleration).clamp(Vec3::splat(-limit), Vec3::splat(limit));
    }

    fn update_rotation(&mut self, forward: Vec3) {
        let max_speed = self.config.rotation_speed;
        let max_acceleration = self.config.rotation_acceleration;
        let angle = signed_angle(forward, self.velocity, WORLD_UP).clamp(-max_speed, max_speed);
        let acceleration =
            (angle / self.config.rotation_acceleration_time).clamp(-max_acceleration, max_acceleration);
        self.rotation_speed = (self.rotation_speed + acceleration).clamp(-max_speed, max_speed);
    }

    /// Decides this tick's speed and turn rate from the input.
    pub fn plan(
        &mut self,
        controller: &CharacterController,
        input: &InputSnapshot,
        delta_time: f32,
    ) -> LocomotionStep {
        let speed = self.desired_speed(input, delta_time);
        self.update_velocity(input);
        self.update_rotation(controller.forward());
        LocomotionStep {
            speed,
            rotation_speed: self.rotation_speed,
        }
    }

    /// Simulates `step` ahead over several sub-steps and offers what the character would run
    /// into to `peers`. The controller is rewound afterwards, only the accepting ability is
    /// returned.
    pub fn predict(
        &mut self,
        ctx: &mut AbilityContext,
        peers: &mut Peers,
        step: LocomotionStep,
        delta_time: f32,
    ) -> Option<AbilityId> {
        let origin = ctx.controller.transform();
        ctx.controller.snapshot();

        let mut attempt_transition = true;
        let mut accepted = None;

        for iteration in 0..self.config.iterations {
            ctx.controller.set_stepping(if iteration == 0 {
                1.0
            } else {
                self.config.stepping
            });
            advance(ctx, step, delta_time);

            let sample = ctx.controller.current();
            if sample.is_colliding && attempt_transition {
                let contact = contact_pose(&sample, ctx.controller.position());
                if !self.accepts_contact(ctx.input, &origin, &contact) {
                    trace!(?contact, iteration, "Predicted contact outside the contact gate");
                    continue;
                }
                accepted = peers.offer_contact(ctx, contact, delta_time);
                attempt_transition = false;
            } else if !sample.is_grounded {
                accepted = peers.offer_drop(ctx, delta_time);
            }

            if accepted.is_some() {
                break;
            }
        }

        self.velocity = Vec3::ZERO;
        self.rotation_speed = 0.0;
        ctx.controller.rewind();
        ctx.controller.set_stepping(1.0);
        accepted
    }

    /// Whether a predicted contact is ahead of where the player is steering, and close enough.
    pub fn accepts_contact(
        &self,
        input: &InputSnapshot,
        origin: &AffineTransform,
        contact: &AffineTransform,
    ) -> bool {
        let heading = if input.movement_direction == Vec3::ZERO {
            origin.forward()
        } else {
            input.movement_direction
        };
        let to_contact = contact.translation - origin.translation;
        let angle = signed_angle(heading, to_contact, WORLD_UP);
        angle.abs() <= self.config.contact_max_angle
            && to_contact.length() <= self.config.contact_max_distance
    }
}

/// Rotates, queues the step's displacement and ticks the controller once.
fn advance(ctx: &mut AbilityContext, step: LocomotionStep, delta_time: f32) {
    ctx.controller.force_rotate(step.rotation_speed * delta_time);
    let forward = ctx.controller.forward();
    ctx.controller.move_by(forward * step.speed * delta_time);
    ctx.controller.tick(ctx.world, delta_time);
}

/// Hit point at the character's height, facing the surface that was hit.
fn contact_pose(sample: &CollisionSample, position: Vec3) -> AffineTransform {
    let mut point = sample.contact_point;
    point.y = position.y;
    AffineTransform::new(point, yaw_towards(-sample.contact_normal))
}

impl Ability for LocomotionAbility {
    fn name(&self) -> &'static str {
        "locomotion"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn on_fixed_update(
        &mut self,
        ctx: &mut AbilityContext,
        peers: &mut Peers,
        delta_time: f32,
    ) -> Control {
        ctx.controller.configure(true);

        let step = self.plan(ctx.controller, ctx.input, delta_time);
        if let Some(id) = self.predict(ctx, peers, step, delta_time) {
            return Control::Handoff(id);
        }

        ctx.controller.set_stepping(1.0);
        advance(ctx, step, delta_time);
        Control::Retain
    }
}
