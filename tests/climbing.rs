mod common;

use bevy_math::prelude::*;
use bevy_traverser::{
    ability::{Ability, AbilityContext},
    box_world::{BoxCollider, BoxWorld},
    climbing::{ClimbingAbility, ClimbingDirection, ClimbingState},
    geometry::AffineTransform,
    input::InputSnapshot,
    transition::AnimationDriver,
};
use common::*;

#[test]
fn mount_completes_hanging_from_the_ledge() {
    let rig = Rig::mounted();

    assert_eq!(rig.abilities.active_name(), Some("climbing"));
    let climbing = rig.climbing();
    assert_eq!(climbing.state(), ClimbingState::Climbing);
    assert_eq!(climbing.previous_state(), ClimbingState::Mounting);
    assert_eq!(climbing.direction(), ClimbingDirection::Idle);
    assert_eq!(climbing.hook().index, 0);
    assert!(climbing.transition().is_none());
    assert_eq!(rig.animation.state(), "LedgeIdle");

    // Below the ledge by the capsule height, out from it by 1.5 radii, facing the wall.
    assert!(rig
        .controller
        .position()
        .abs_diff_eq(Vec3::new(0.0, 1.0, -0.75), 1e-3));
    assert!(rig.controller.forward().abs_diff_eq(Vec3::NEG_Z, 1e-4));
    assert!(!rig.controller.collision_enabled());
}

#[test]
fn contact_while_mounting_is_refused() {
    let world = BoxWorld::new()
        .with(floor())
        .with(climbable_wall(1.2));
    let mut rig = Rig::new(world, instant_locomotion());
    let mount = InputSnapshot {
        mount: true,
        ..run_forward()
    };
    rig.fixed_update(&mount);
    assert_eq!(rig.climbing().state(), ClimbingState::Mounting);

    let contact = AffineTransform::new(Vec3::new(0.0, 0.0, -1.2), Quat::IDENTITY);
    let climbing = rig
        .abilities
        .get_mut::<ClimbingAbility>()
        .expect("standard abilities include climbing");
    let mut ctx = AbilityContext {
        controller: &mut rig.controller,
        world: &rig.world,
        animation: &mut rig.animation,
        input: &mount,
    };
    assert!(!climbing.on_contact(&mut ctx, contact, DT));
    assert_eq!(climbing.state(), ClimbingState::Mounting);
    // The mount transition is still the one playing.
    assert!(rig.animation.is_transition_active());
    assert_eq!(rig.animation.cancelled(), 0);
}

#[test]
fn shuffling_never_leaves_the_segment_within_a_tick() {
    let mut rig = Rig::mounted();
    let right = stick(1.0, 0.0);

    let mut last_x = rig.controller.position().x;
    let mut reached_corner = false;
    for _ in 0..300 {
        rig.frame(&right);
        let climbing = rig.climbing();
        assert_eq!(climbing.hook().index, 0);
        assert!(rig.controller.position().x >= last_x - 1e-5);
        // Never closer to the corner than the minimum distance.
        assert!(rig.controller.position().x <= 1.8 + 1e-3);
        last_x = rig.controller.position().x;

        if climbing.direction() == ClimbingDirection::CornerRight {
            reached_corner = true;
            break;
        }
        assert_eq!(climbing.direction(), ClimbingDirection::Right);
        assert_eq!(rig.animation.state(), "LedgeRight");
    }

    assert!(reached_corner);
    assert_eq!(rig.animation.state(), "LedgeCornerRight");
    assert!(rig.controller.position().x > 1.5);
}

#[test]
fn corner_turn_hooks_onto_the_next_segment() {
    let mut rig = Rig::mounted();
    let right = stick(1.0, 0.0);
    for _ in 0..300 {
        rig.frame(&right);
        if rig.climbing().direction() == ClimbingDirection::CornerRight {
            break;
        }
    }
    assert_eq!(rig.climbing().direction(), ClimbingDirection::CornerRight);

    // Halfway through the turn nothing changes.
    rig.animation.advance(0.5);
    rig.fixed_update(&right);
    assert_eq!(rig.climbing().direction(), ClimbingDirection::CornerRight);
    assert_eq!(rig.climbing().hook().index, 0);

    // The turn animation ends beside the block's right face.
    rig.animation
        .set_reference_position(Some(Vec3::new(2.3, 1.0, -1.4)));
    rig.animation.advance(1.0);
    rig.fixed_update(&InputSnapshot::default());

    let climbing = rig.climbing();
    assert_eq!(climbing.hook().index, 1);
    assert_eq!(climbing.direction(), ClimbingDirection::Idle);
    assert_eq!(rig.animation.state(), "LedgeIdle");
    assert!(rig
        .controller
        .position()
        .abs_diff_eq(Vec3::new(2.45, 1.0, -1.4), 1e-3));
    assert!(rig.controller.forward().abs_diff_eq(Vec3::NEG_X, 1e-4));
}

#[test]
fn timed_corner_turn_reaches_the_next_segment() {
    let mut rig = Rig::mounted();
    let right = stick(1.0, 0.0);

    let mut corner_frames = 0;
    for _ in 0..600 {
        rig.frame(&right);
        if rig.climbing().hook().index != 0 {
            break;
        }
        if rig.climbing().direction() == ClimbingDirection::CornerRight {
            corner_frames += 1;
        }
    }

    let climbing = rig.climbing();
    assert_eq!(climbing.hook().index, 1);
    assert_eq!(climbing.direction(), ClimbingDirection::Idle);
    // The turn waited for the clip.
    assert!(corner_frames >= 50);
    assert!(rig
        .controller
        .position()
        .abs_diff_eq(Vec3::new(2.45, 1.0, -1.4), 1e-3));
    assert!(rig.controller.forward().abs_diff_eq(Vec3::NEG_X, 1e-4));
}

#[test]
fn blocked_corner_is_not_turned() {
    let world = BoxWorld::new()
        .with(floor())
        .with(climbable_wall(1.2))
        // Fills the space around the block's right corner.
        .with(BoxCollider::new(
            Vec3::new(3.5, 1.4, -1.5),
            Vec3::new(1.0, 1.4, 1.0),
        ));
    let mut rig = Rig::new(world, instant_locomotion());
    rig.fixed_update(&InputSnapshot {
        mount: true,
        ..run_forward()
    });
    rig.finish_transition(&InputSnapshot::default());
    assert_eq!(rig.climbing().state(), ClimbingState::Climbing);

    let right = stick(1.0, 0.0);
    for _ in 0..300 {
        rig.frame(&right);
        assert_ne!(rig.climbing().direction(), ClimbingDirection::CornerRight);
    }
    assert!(rig.controller.position().x > 1.7);
}

#[test]
fn pull_up_stands_on_top_and_returns_to_locomotion() {
    let mut rig = Rig::mounted();
    let pull_up = InputSnapshot {
        pull_up: true,
        ..InputSnapshot::default()
    };
    rig.fixed_update(&pull_up);
    assert_eq!(rig.climbing().state(), ClimbingState::PullUp);
    assert_eq!(rig.abilities.active_name(), Some("climbing"));

    rig.finish_transition(&InputSnapshot::default());
    assert_eq!(rig.climbing().state(), ClimbingState::Suspended);
    assert_eq!(rig.abilities.active_name(), Some("locomotion"));
    assert!(rig
        .controller
        .position()
        .abs_diff_eq(Vec3::new(0.0, 2.8, -1.5), 1e-3));

    // Standing on the block.
    rig.fixed_update(&InputSnapshot::default());
    assert!(rig.controller.collision_enabled());
    assert!(rig.controller.is_grounded());
    assert!((rig.controller.position().y - 2.8).abs() < 1e-2);
}

#[test]
fn dismount_lands_at_the_foot_of_the_wall() {
    let mut rig = Rig::mounted();
    rig.fixed_update(&InputSnapshot {
        dismount: true,
        ..InputSnapshot::default()
    });
    assert_eq!(rig.climbing().state(), ClimbingState::Dismount);

    rig.finish_transition(&InputSnapshot::default());
    assert_eq!(rig.abilities.active_name(), Some("locomotion"));
    assert!(rig
        .controller
        .position()
        .abs_diff_eq(Vec3::new(0.0, 0.0, -0.75), 1e-3));
}

#[test]
fn walking_off_the_top_drops_down_onto_the_ledge() {
    let mut rig = Rig::mounted();
    rig.fixed_update(&InputSnapshot {
        pull_up: true,
        ..InputSnapshot::default()
    });
    rig.finish_transition(&InputSnapshot::default());
    rig.fixed_update(&InputSnapshot::default());
    assert_eq!(rig.abilities.active_name(), Some("locomotion"));

    // Forward is over the back edge of the block.
    let drop = InputSnapshot {
        drop_down: true,
        ..stick(0.0, 1.0)
    };
    let mut dropped = false;
    for _ in 0..30 {
        rig.fixed_update(&drop);
        if rig.abilities.active_name() == Some("climbing") {
            dropped = true;
            break;
        }
    }
    assert!(dropped);
    assert_eq!(rig.climbing().state(), ClimbingState::DropDown);
    // Rewound: still standing on the block.
    assert!((rig.controller.position().y - 2.8).abs() < 1e-2);

    rig.finish_transition(&InputSnapshot::default());
    let climbing = rig.climbing();
    assert_eq!(climbing.state(), ClimbingState::Climbing);
    assert_eq!(climbing.hook().index, 2);
    assert!(rig
        .controller
        .position()
        .abs_diff_eq(Vec3::new(0.0, 1.0, -2.05), 1e-2));
    assert!(rig.controller.forward().abs_diff_eq(Vec3::Z, 1e-4));
}

#[test]
fn refused_transition_keeps_climbing() {
    let mut rig = Rig::mounted();
    rig.animation.set_accepting(false);
    rig.fixed_update(&InputSnapshot {
        pull_up: true,
        ..InputSnapshot::default()
    });
    assert_eq!(rig.climbing().state(), ClimbingState::Climbing);
    assert_eq!(rig.abilities.active_name(), Some("climbing"));
}
