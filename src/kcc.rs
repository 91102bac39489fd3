use bevy_ecs::{intern::Interned, schedule::ScheduleLabel};

use crate::{
    TraverserState,
    ability::AbilityContext,
    animation::TraverserAnimation,
    avian::{AvianWorld, SurfaceData, center_offset},
    controller::CharacterController,
    input::TraverserInput,
    prelude::*,
};

pub(super) fn plugin(schedule: Interned<dyn ScheduleLabel>) -> impl Fn(&mut App) {
    move |app: &mut App| {
        app.add_systems(
            schedule,
            run_traversers.in_set(TraverserSystems::MoveCharacters),
        )
        .add_systems(Update, update_traversers);
    }
}

type TraverserData = (
    &'static Traverser,
    &'static mut TraverserState,
    &'static TraverserInput,
    &'static mut TraverserAnimation,
);

fn run_traversers(
    mut traversers: Query<(TraverserData, &mut Transform)>,
    surfaces: Query<SurfaceData>,
    time: Res<Time>,
    move_and_slide: MoveAndSlide,
) {
    let dt = time.delta_secs();
    for ((cfg, mut state, input, mut animation), mut transform) in &mut traversers {
        let world = AvianWorld {
            move_and_slide: &move_and_slide,
            surfaces: &surfaces,
            filter: &cfg.filter,
            config: &cfg.move_and_slide,
        };
        let input = input.snapshot();
        let TraverserState {
            controller,
            abilities,
        } = &mut *state;

        let mut ctx = AbilityContext {
            controller: &mut *controller,
            world: &world,
            animation: &mut *animation,
            input: &input,
        };
        abilities.fixed_update(&mut ctx, dt);

        write_transform(controller, &mut transform);
    }
}

fn update_traversers(
    mut traversers: Query<TraverserData>,
    surfaces: Query<SurfaceData>,
    time: Res<Time>,
    move_and_slide: MoveAndSlide,
) {
    let dt = time.delta_secs();
    for (cfg, mut state, input, mut animation) in &mut traversers {
        animation.advance(dt);

        let world = AvianWorld {
            move_and_slide: &move_and_slide,
            surfaces: &surfaces,
            filter: &cfg.filter,
            config: &cfg.move_and_slide,
        };
        let input = input.snapshot();
        let TraverserState {
            controller,
            abilities,
        } = &mut *state;

        let mut ctx = AbilityContext {
            controller: &mut *controller,
            world: &world,
            animation: &mut *animation,
            input: &input,
        };
        abilities.update(&mut ctx, dt);
    }
}

/// The controller tracks the capsule's feet, the transform its center.
fn write_transform(controller: &CharacterController, transform: &mut Transform) {
    transform.translation = controller.position() + center_offset(controller.capsule());
    transform.rotation = controller.rotation();
}
