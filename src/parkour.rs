//! Vaults, climb-ons and drop-downs over obstacles tagged with a [`ParkourKind`].

use tracing::debug;

use crate::{
    ability::{Ability, AbilityContext, Control, Peers},
    geometry::{AffineTransform, LedgeGeometry, yaw_towards},
    prelude::*,
    probe::{CapsuleShape, ColliderInfo, ParkourKind, PhysicsWorld},
    transition::{AnchoredTransition, TransitionRequest, TransitionState, replace_transition},
};

#[derive(Clone, Copy, Debug, PartialEq, Reflect)]
pub struct ParkourConfig {
    /// Gap left between the capsule and the obstacle at the landing pose, in meters.
    pub landing_clearance: f32,
    /// Furthest a drop-down looks for ground below the edge.
    pub max_drop_height: f32,
    pub max_linear_error: f32,
    /// Degrees.
    pub max_angular_error: f32,
}

impl Default for ParkourConfig {
    fn default() -> Self {
        Self {
            landing_clearance: 0.1,
            max_drop_height: 10.0,
            max_linear_error: 0.01,
            max_angular_error: 1.0,
        }
    }
}

/// Where a traversal of `kind` that touched `collider` at `contact` ends.
///
/// Walls and tables are crossed, platforms and ledges climbed onto. The character keeps the
/// heading it had at the contact.
pub fn landing_pose(
    kind: ParkourKind,
    collider: &ColliderInfo,
    contact: AffineTransform,
    capsule: CapsuleShape,
    ground_height: f32,
    clearance: f32,
) -> AffineTransform {
    let forward = Vec3::new(contact.forward().x, 0.0, contact.forward().z).normalize_or(Vec3::NEG_Z);
    let offset = capsule.radius + clearance;
    let translation = match kind {
        ParkourKind::Wall | ParkourKind::Table => {
            let h = collider.half_extents;
            let half_depth = collider.right().dot(forward).abs() * h.x
                + collider.forward().dot(forward).abs() * h.z;
            let far_side = (collider.center - contact.translation).dot(forward) + half_depth;
            let mut translation = contact.translation + forward * (far_side + offset);
            translation.y = ground_height;
            translation
        }
        ParkourKind::Platform | ParkourKind::Ledge | ParkourKind::DropDown => {
            let mut translation = contact.translation + forward * offset;
            translation.y = collider.center.y + collider.half_extents.y;
            translation
        }
    };
    AffineTransform::new(translation, yaw_towards(forward))
}

/// Where a drop off the edge at `edge` lands: just past the edge, on whatever is below.
pub fn drop_pose(
    world: &dyn PhysicsWorld,
    edge: AffineTransform,
    capsule: CapsuleShape,
    clearance: f32,
    max_drop_height: f32,
) -> AffineTransform {
    let mut translation = edge.translation + edge.forward() * (capsule.radius + clearance);
    if let Some(distance) = world.raycast(translation, Dir3::NEG_Y, max_drop_height) {
        translation.y -= distance;
    }
    AffineTransform::new(translation, edge.rotation)
}

#[derive(Clone, Debug)]
pub struct ParkourAbility {
    pub config: ParkourConfig,
    pub enabled: bool,
    kind: Option<ParkourKind>,
    transition: Option<AnchoredTransition>,
}

impl Default for ParkourAbility {
    fn default() -> Self {
        Self::new(ParkourConfig::default())
    }
}

impl ParkourAbility {
    pub fn new(config: ParkourConfig) -> Self {
        Self {
            config,
            enabled: true,
            kind: None,
            transition: None,
        }
    }

    /// The obstacle being traversed, if any.
    pub fn kind(&self) -> Option<ParkourKind> {
        self.kind
    }

    pub fn transition(&self) -> Option<&AnchoredTransition> {
        self.transition.as_ref()
    }

    fn start(
        &mut self,
        ctx: &mut AbilityContext,
        kind: ParkourKind,
        contact: AffineTransform,
        target: AffineTransform,
    ) -> bool {
        let mut request = TransitionRequest::new(
            ("Locomotion", kind.animation_state()),
            ("LocomotionTrigger", "ParkourTrigger"),
            contact,
            target,
        );
        request.max_linear_error = self.config.max_linear_error;
        request.max_angular_error = self.config.max_angular_error;

        if !replace_transition(&mut self.transition, ctx.animation, request) {
            return false;
        }
        debug!(?kind, "Parkour transition started");
        self.kind = Some(kind);
        true
    }
}

impl Ability for ParkourAbility {
    fn name(&self) -> &'static str {
        "parkour"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn on_fixed_update(
        &mut self,
        ctx: &mut AbilityContext,
        _peers: &mut Peers,
        _delta_time: f32,
    ) -> Control {
        let Some(transition) = self.transition.as_mut() else {
            ctx.controller.configure(true);
            return Control::Yield;
        };

        let state = transition.poll(ctx.animation);
        if state == TransitionState::Playing {
            ctx.controller.configure(false);
            return Control::Retain;
        }

        let target = transition.target();
        if let Some(transition) = self.transition.take() {
            transition.release(ctx.animation);
        }
        if state == TransitionState::Complete {
            ctx.controller.teleport_to(target);
        }
        debug!(kind = ?self.kind, ?state, "Parkour transition over");
        self.kind = None;
        ctx.controller.configure(true);
        Control::Yield
    }

    fn on_contact(
        &mut self,
        ctx: &mut AbilityContext,
        contact: AffineTransform,
        _delta_time: f32,
    ) -> bool {
        if !ctx.input.parkour {
            return false;
        }
        let Some(info) = ctx
            .controller
            .current()
            .collider
            .and_then(|handle| ctx.world.collider(handle))
        else {
            return false;
        };
        let Some(kind) = info.parkour.filter(|kind| *kind != ParkourKind::DropDown) else {
            return false;
        };

        let target = landing_pose(
            kind,
            &info,
            contact,
            ctx.controller.capsule(),
            ctx.controller.position().y,
            self.config.landing_clearance,
        );
        self.start(ctx, kind, contact, target)
    }

    fn on_drop(&mut self, ctx: &mut AbilityContext, _delta_time: f32) -> bool {
        if !ctx.input.parkour_drop_down {
            return false;
        }

        let previous = ctx.controller.previous();
        let Some(ground) = previous.ground.filter(|_| previous.is_grounded) else {
            return false;
        };
        let Some(info) = ctx.world.collider(ground).filter(|info| info.is_box) else {
            return false;
        };

        let edge = LedgeGeometry::from_collider(&info).closest_transform(previous.position);
        let target = drop_pose(
            ctx.world,
            edge,
            ctx.controller.capsule(),
            self.config.landing_clearance,
            self.config.max_drop_height,
        );
        self.start(ctx, ParkourKind::DropDown, edge, target)
    }
}
