#![allow(dead_code, reason = "each test binary uses a different subset")]

use bevy_math::prelude::*;
use bevy_traverser::{
    ability::{Abilities, AbilityContext},
    animation::TraverserAnimation,
    box_world::{BoxCollider, BoxWorld},
    climbing::{ClimbingAbility, ClimbingConfig},
    controller::CharacterController,
    geometry::AffineTransform,
    input::InputSnapshot,
    locomotion::LocomotionConfig,
    parkour::{ParkourAbility, ParkourConfig},
};

pub const DT: f32 = 1.0 / 60.0;

pub fn floor() -> BoxCollider {
    BoxCollider::new(Vec3::new(0.0, -0.5, 0.0), Vec3::new(50.0, 0.5, 50.0))
}

/// A 4m wide, 2.8m high, 0.4m deep climbable block whose front face is `distance` ahead of the
/// origin along -Z.
pub fn climbable_wall(distance: f32) -> BoxCollider {
    BoxCollider::new(
        Vec3::new(0.0, 1.4, -(distance + 0.2)),
        Vec3::new(2.0, 1.4, 0.2),
    )
    .climbable()
}

/// Locomotion that reaches full running speed of 5 m/s on the first tick.
pub fn instant_locomotion() -> LocomotionConfig {
    LocomotionConfig {
        movement_speed_time: 1000.0,
        movement_speed_fast: 5.0,
        ..LocomotionConfig::default()
    }
}

pub fn run_forward() -> InputSnapshot {
    InputSnapshot {
        run: true,
        ..InputSnapshot::from_stick(Vec2::Y)
    }
}

pub fn stick(x: f32, y: f32) -> InputSnapshot {
    InputSnapshot::from_stick(Vec2::new(x, y))
}

/// A character standing at the origin, facing -Z, with the standard abilities.
pub struct Rig {
    pub world: BoxWorld,
    pub controller: CharacterController,
    pub abilities: Abilities,
    pub animation: TraverserAnimation,
}

impl Rig {
    pub fn new(world: BoxWorld, locomotion: LocomotionConfig) -> Self {
        Self::standing_at(world, locomotion, Vec3::ZERO)
    }

    /// A character standing at `position`, facing -Z.
    pub fn standing_at(world: BoxWorld, locomotion: LocomotionConfig, position: Vec3) -> Self {
        let mut controller = CharacterController::default();
        controller.teleport_to(AffineTransform::from_translation(position));
        controller.tick(&world, DT);
        assert!(controller.is_grounded());
        Self {
            world,
            controller,
            abilities: Abilities::standard(
                locomotion,
                ClimbingConfig::default(),
                ParkourConfig::default(),
            ),
            animation: TraverserAnimation::default(),
        }
    }

    pub fn fixed_update(&mut self, input: &InputSnapshot) {
        let mut ctx = AbilityContext {
            controller: &mut self.controller,
            world: &self.world,
            animation: &mut self.animation,
            input,
        };
        self.abilities.fixed_update(&mut ctx, DT);
    }

    /// One frame: animation timers, then one fixed tick.
    pub fn frame(&mut self, input: &InputSnapshot) {
        self.animation.advance(DT);
        self.fixed_update(input);
    }

    pub fn climbing(&self) -> &ClimbingAbility {
        self.abilities
            .get::<ClimbingAbility>()
            .expect("standard abilities include climbing")
    }

    pub fn parkour(&self) -> &ParkourAbility {
        self.abilities
            .get::<ParkourAbility>()
            .expect("standard abilities include parkour")
    }

    /// Lets the running transition finish and runs the tick that reacts to it.
    pub fn finish_transition(&mut self, input: &InputSnapshot) {
        self.animation.advance(self.animation.transition_duration + 0.1);
        self.fixed_update(input);
    }

    /// Runs into a climbable wall 1.2m ahead with mount held and completes the mount.
    pub fn mounted() -> Self {
        let world = BoxWorld::new()
            .with(floor())
            .with(climbable_wall(1.2));
        let mut rig = Self::new(world, instant_locomotion());
        rig.fixed_update(&InputSnapshot {
            mount: true,
            ..run_forward()
        });
        assert_eq!(rig.abilities.active_name(), Some("climbing"));
        rig.finish_transition(&InputSnapshot::default());
        rig
    }
}
