#![doc = include_str!("../readme.md")]

/// Everything you need to get started with `bevy_traverser`
pub mod prelude {
    pub(crate) use {
        avian3d::prelude::*,
        bevy_app::prelude::*,
        bevy_derive::{Deref, DerefMut},
        bevy_ecs::prelude::*,
        bevy_enhanced_input::prelude::*,
        bevy_math::prelude::*,
        bevy_reflect::prelude::*,
        bevy_time::prelude::*,
        bevy_transform::prelude::*,
        bevy_utils::prelude::*,
    };

    pub use crate::{
        Climbable, ParkourSurface, Traverser, TraverserPlugin, TraverserState, TraverserSystems,
        ability::{Abilities, Ability, AbilityContext, AbilityId, Control, Peers},
        animation::TraverserAnimation,
        camera::{TraverserCamera, TraverserCameraOf},
        controller::{CharacterController, ControllerConfig},
        input::{
            DropDown, Dismount, InputSnapshot, Mount, Movement, Parkour, ParkourDropDown, PullUp,
            Run, TraverserInput,
        },
        probe::{ParkourKind, PhysicsWorld},
    };
}

use crate::{
    ability::Abilities,
    animation::TraverserAnimation,
    avian::{capsule_collider, center_offset},
    climbing::ClimbingConfig,
    controller::{CharacterController, ControllerConfig},
    geometry::AffineTransform,
    input::TraverserInput,
    locomotion::LocomotionConfig,
    parkour::ParkourConfig,
    prelude::*,
    probe::ParkourKind,
};
use bevy_ecs::{
    intern::Interned, lifecycle::HookContext, relationship::RelationshipSourceCollection as _,
    schedule::ScheduleLabel, world::DeferredWorld,
};

pub mod ability;
pub mod animation;
pub mod avian;
pub mod box_world;
pub mod camera;
pub mod climbing;
pub mod controller;
mod fixed_update_utils;
pub mod geometry;
pub mod input;
mod kcc;
pub mod locomotion;
pub mod parkour;
pub mod probe;
pub mod transition;

/// Also requires you to add [`PhysicsPlugins`] and [`EnhancedInputPlugin`] to work properly.
pub struct TraverserPlugin {
    schedule: Interned<dyn ScheduleLabel>,
}

impl TraverserPlugin {
    /// Create a new plugin in the given schedule. The default is [`FixedPostUpdate`].
    pub fn new(schedule: impl ScheduleLabel) -> Self {
        Self {
            schedule: schedule.intern(),
        }
    }
}

impl Default for TraverserPlugin {
    fn default() -> Self {
        Self {
            schedule: FixedPostUpdate.intern(),
        }
    }
}

impl Plugin for TraverserPlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            self.schedule,
            (TraverserSystems::MoveCharacters)
                .chain()
                .in_set(PhysicsSystems::First),
        )
        .add_plugins((
            input::plugin,
            camera::plugin,
            kcc::plugin(self.schedule),
            fixed_update_utils::plugin,
        ));
    }
}

/// System set used by all systems of `bevy_traverser`.
#[derive(SystemSet, Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum TraverserSystems {
    MoveCharacters,
}

/// A character driven by locomotion, climbing and parkour abilities.
///
/// The entity's [`Transform`] is the center of its capsule. Changing the tunables after the
/// character was spawned has no effect on its abilities.
#[derive(Component, Clone, Reflect, Debug)]
#[reflect(Component)]
#[require(
    TraverserInput,
    TraverserState,
    TraverserAnimation,
    TranslationInterpolation,
    RigidBody = RigidBody::Kinematic,
    Collider = Collider::capsule(0.3, 1.2),
    CustomPositionIntegration,
    Transform,
    SpeculativeMargin::ZERO,
)]
#[component(on_add=Traverser::on_add)]
pub struct Traverser {
    pub filter: SpatialQueryFilter,
    pub move_and_slide: MoveAndSlideConfig,
    pub controller: ControllerConfig,
    pub locomotion: LocomotionConfig,
    pub climbing: ClimbingConfig,
    pub parkour: ParkourConfig,
}

impl Default for Traverser {
    fn default() -> Self {
        Self {
            filter: SpatialQueryFilter::default(),
            move_and_slide: MoveAndSlideConfig {
                skin_width: 0.0075,
                ..default()
            },
            controller: ControllerConfig::default(),
            locomotion: LocomotionConfig::default(),
            climbing: ClimbingConfig::default(),
            parkour: ParkourConfig::default(),
        }
    }
}

impl Traverser {
    pub fn on_add(mut world: DeferredWorld, ctx: HookContext) {
        {
            let Some(mut traverser) = world.get_mut::<Self>(ctx.entity) else {
                return;
            };
            traverser.filter.excluded_entities.add(ctx.entity);
        }

        let Some(traverser) = world.get::<Self>(ctx.entity).cloned() else {
            return;
        };
        let transform = world
            .get::<Transform>(ctx.entity)
            .copied()
            .unwrap_or_default();

        let Some(mut state) = world.get_mut::<TraverserState>(ctx.entity) else {
            return;
        };
        *state = TraverserState::new(&traverser, transform);

        world
            .commands()
            .entity(ctx.entity)
            .insert(capsule_collider(traverser.controller.capsule()));
    }
}

/// The controller and abilities of a [`Traverser`].
#[derive(Component, Default)]
pub struct TraverserState {
    pub controller: CharacterController,
    pub abilities: Abilities,
}

impl TraverserState {
    /// Standard abilities placed at `transform`, the capsule's center.
    pub fn new(traverser: &Traverser, transform: Transform) -> Self {
        let mut controller = CharacterController::new(traverser.controller);
        controller.teleport_to(AffineTransform::new(
            transform.translation - center_offset(traverser.controller.capsule()),
            transform.rotation,
        ));
        Self {
            controller,
            abilities: Abilities::standard(
                traverser.locomotion,
                traverser.climbing,
                traverser.parkour,
            ),
        }
    }
}

/// Tags a box collider whose top edges can be climbed.
#[derive(Component, Clone, Copy, Reflect, Default, Debug)]
#[reflect(Component)]
pub struct Climbable;

/// Tags a collider the parkour ability can traverse, and how.
#[derive(Component, Clone, Copy, Reflect, Debug, Deref)]
#[reflect(Component)]
pub struct ParkourSurface(pub ParkourKind);
