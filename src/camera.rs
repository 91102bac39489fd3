//! Reading the stick relative to a camera.

use crate::{input::TraverserInput, prelude::*};

pub(super) fn plugin(app: &mut App) {
    app.add_systems(
        RunFixedMainLoop,
        sync_view_rotation.in_set(RunFixedMainLoopSystems::BeforeFixedMainLoop),
    );
}

/// Put this on a camera to have its traverser read the stick relative to it.
#[derive(Component, Clone, Copy)]
#[relationship(relationship_target = TraverserCamera)]
pub struct TraverserCameraOf(pub Entity);

#[derive(Component, Clone, Copy)]
#[relationship_target(relationship = TraverserCameraOf)]
pub struct TraverserCamera(Entity);

impl TraverserCamera {
    pub fn get(self) -> Entity {
        self.0
    }
}

pub(crate) fn sync_view_rotation(
    cameras: Query<(&Transform, &TraverserCameraOf)>,
    mut inputs: Query<&mut TraverserInput>,
) {
    for (camera_transform, camera_of) in &cameras {
        let Ok(mut input) = inputs.get_mut(camera_of.0) else {
            continue;
        };
        input.view_rotation = camera_transform.rotation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::system::RunSystemOnce as _;

    #[test]
    fn camera_rotation_orients_its_traverser() {
        let mut world = World::new();
        let traverser = world.spawn(TraverserInput::default()).id();
        let bystander = world.spawn(TraverserInput::default()).id();
        let rotation = Quat::from_rotation_y(1.0);
        world.spawn((Transform::from_rotation(rotation), TraverserCameraOf(traverser)));

        world.run_system_once(sync_view_rotation).unwrap();

        assert_eq!(world.get::<TraverserInput>(traverser).unwrap().view_rotation, rotation);
        assert_eq!(world.get::<TraverserInput>(bystander).unwrap().view_rotation, Quat::IDENTITY);
        assert!(world.get::<TraverserCamera>(traverser).is_some());
    }
}
