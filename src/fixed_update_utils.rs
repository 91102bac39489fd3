use crate::prelude::*;

pub(super) fn plugin(app: &mut App) {
    app.init_resource::<DidFixedTimestepRunThisFrame>()
        .add_systems(PreUpdate, clear_fixed_timestep_flag)
        .add_systems(FixedPreUpdate, set_fixed_timestep_flag);
}

/// Whether the fixed timestep ran at least once this frame. Input accumulated by the
/// traversers is only consumed when it did.
#[derive(Resource, Debug, Deref, DerefMut, Default)]
pub(crate) struct DidFixedTimestepRunThisFrame(bool);

fn clear_fixed_timestep_flag(mut did_run: ResMut<DidFixedTimestepRunThisFrame>) {
    **did_run = false;
}

fn set_fixed_timestep_flag(mut did_run: ResMut<DidFixedTimestepRunThisFrame>) {
    **did_run = true;
}

pub(crate) fn did_fixed_timestep_run_this_frame(did_run: Res<DidFixedTimestepRunThisFrame>) -> bool {
    **did_run
}
