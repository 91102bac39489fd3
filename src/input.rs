use bevy_math::EulerRot;

use crate::prelude::*;

use crate::fixed_update_utils::did_fixed_timestep_run_this_frame;

pub(super) fn plugin(app: &mut App) {
    app.add_observer(apply_movement)
        .add_observer(apply_run)
        .add_observer(apply_mount)
        .add_observer(apply_dismount)
        .add_observer(apply_pull_up)
        .add_observer(apply_drop_down)
        .add_observer(apply_parkour)
        .add_observer(apply_parkour_drop_down)
        .add_systems(
            RunFixedMainLoop,
            clear_accumulated_input
                .run_if(did_fixed_timestep_run_this_frame)
                .in_set(RunFixedMainLoopSystems::AfterFixedMainLoop),
        );
}

#[derive(Debug, InputAction)]
#[action_output(Vec2)]
pub struct Movement;

#[derive(Debug, InputAction)]
#[action_output(bool)]
pub struct Run;

#[derive(Debug, InputAction)]
#[action_output(bool)]
pub struct Mount;

#[derive(Debug, InputAction)]
#[action_output(bool)]
pub struct Dismount;

#[derive(Debug, InputAction)]
#[action_output(bool)]
pub struct PullUp;

#[derive(Debug, InputAction)]
#[action_output(bool)]
pub struct DropDown;

#[derive(Debug, InputAction)]
#[action_output(bool)]
pub struct Parkour;

#[derive(Debug, InputAction)]
#[action_output(bool)]
pub struct ParkourDropDown;

/// Stick magnitudes below this read as no input.
pub const STICK_DEAD_ZONE: f32 = 0.1;

/// Input accumulated since the last fixed update loop. Is cleared after every fixed update loop.
#[derive(Component, Clone, Reflect, Debug)]
#[reflect(Component)]
pub struct TraverserInput {
    // The last movement that was input since the last fixed update loop
    pub last_movement: Option<Vec2>,
    /// Rotation the stick is read relative to. Only its yaw is used. Kept in sync with the
    /// camera carrying [`TraverserCameraOf`](crate::camera::TraverserCameraOf), if any, and
    /// otherwise left for the game to set.
    pub view_rotation: Quat,
    pub run: bool,
    pub mount: bool,
    pub dismount: bool,
    pub pull_up: bool,
    pub drop_down: bool,
    pub parkour: bool,
    pub parkour_drop_down: bool,
}

impl Default for TraverserInput {
    fn default() -> Self {
        Self {
            last_movement: None,
            view_rotation: Quat::IDENTITY,
            run: false,
            mount: false,
            dismount: false,
            pull_up: false,
            drop_down: false,
            parkour: false,
            parkour_drop_down: false,
        }
    }
}

impl TraverserInput {
    pub fn snapshot(&self) -> InputSnapshot {
        let (yaw, _, _) = self.view_rotation.to_euler(EulerRot::YXZ);
        InputSnapshot {
            run: self.run,
            mount: self.mount,
            dismount: self.dismount,
            pull_up: self.pull_up,
            drop_down: self.drop_down,
            parkour: self.parkour,
            parkour_drop_down: self.parkour_drop_down,
            ..InputSnapshot::from_stick(self.last_movement.unwrap_or_default())
        }
        .oriented(Quat::from_rotation_y(yaw))
    }
}

/// Everything the abilities read from the player during one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InputSnapshot {
    /// Stick after the dead zone, x right and y forward.
    pub stick: Vec2,
    /// Horizontal world direction the stick points to, zero without input.
    pub movement_direction: Vec3,
    pub move_intensity: f32,
    pub run: bool,
    pub mount: bool,
    pub dismount: bool,
    pub pull_up: bool,
    pub drop_down: bool,
    pub parkour: bool,
    pub parkour_drop_down: bool,
}

impl InputSnapshot {
    pub fn from_stick(stick: Vec2) -> Self {
        let length = stick.length();
        let stick = if length < STICK_DEAD_ZONE || !length.is_finite() {
            Vec2::ZERO
        } else if length > 1.0 {
            stick / length
        } else {
            stick
        };
        Self {
            stick,
            movement_direction: Vec3::new(stick.x, 0.0, -stick.y).normalize_or_zero(),
            move_intensity: stick.length().min(1.0),
            ..default()
        }
    }

    /// Rotates the movement direction into the frame of `view`.
    pub fn oriented(mut self, view: Quat) -> Self {
        self.movement_direction = (view * self.movement_direction).normalize_or_zero();
        self
    }
}

fn apply_movement(movement: On<Fire<Movement>>, mut inputs: Query<&mut TraverserInput>) {
    if let Ok(mut input) = inputs.get_mut(movement.context) {
        input.last_movement = Some(movement.value);
    }
}

fn apply_run(run: On<Fire<Run>>, mut inputs: Query<&mut TraverserInput>) {
    if let Ok(mut input) = inputs.get_mut(run.context) {
        input.run = true;
    }
}

fn apply_mount(mount: On<Fire<Mount>>, mut inputs: Query<&mut TraverserInput>) {
    if let Ok(mut input) = inputs.get_mut(mount.context) {
        input.mount = true;
    }
}

fn apply_dismount(dismount: On<Fire<Dismount>>, mut inputs: Query<&mut TraverserInput>) {
    if let Ok(mut input) = inputs.get_mut(dismount.context) {
        input.dismount = true;
    }
}

fn apply_pull_up(pull_up: On<Fire<PullUp>>, mut inputs: Query<&mut TraverserInput>) {
    if let Ok(mut input) = inputs.get_mut(pull_up.context) {
        input.pull_up = true;
    }
}

fn apply_drop_down(drop_down: On<Fire<DropDown>>, mut inputs: Query<&mut TraverserInput>) {
    if let Ok(mut input) = inputs.get_mut(drop_down.context) {
        input.drop_down = true;
    }
}

fn apply_parkour(parkour: On<Fire<Parkour>>, mut inputs: Query<&mut TraverserInput>) {
    if let Ok(mut input) = inputs.get_mut(parkour.context) {
        input.parkour = true;
    }
}

fn apply_parkour_drop_down(
    parkour_drop_down: On<Fire<ParkourDropDown>>,
    mut inputs: Query<&mut TraverserInput>,
) {
    if let Ok(mut input) = inputs.get_mut(parkour_drop_down.context) {
        input.parkour_drop_down = true;
    }
}

fn clear_accumulated_input(mut inputs: Query<&mut TraverserInput>) {
    for mut input in &mut inputs {
        *input = TraverserInput {
            view_rotation: input.view_rotation,
            ..default()
        };
    }
}
