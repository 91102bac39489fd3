//! Ledge climbing: mounting a climbable box, shuffling along its top edge, turning its corners,
//! and leaving it again by pulling up, dismounting or dropping back down.

use tracing::{debug, info};

use crate::{
    ability::{Ability, AbilityContext, Control, Peers},
    geometry::{AffineTransform, CornerProximity, LedgeGeometry, LedgeHook, WallAnchor, WallGeometry, yaw_towards},
    prelude::*,
    probe::{CapsuleShape, ColliderInfo, WORLD_UP},
    transition::{AnchoredTransition, TransitionRequest, TransitionState, replace_transition},
};

#[derive(Clone, Copy, Debug, PartialEq, Reflect)]
pub struct ClimbingConfig {
    /// Lateral speed along a ledge, in m/s.
    pub desired_speed_ledge: f32,
    /// The closest the character gets to a ledge corner, in meters.
    pub desired_corner_min_distance: f32,
    /// Added to `desired_corner_min_distance` to decide when a corner turn starts.
    pub corner_margin: f32,
    /// Mounts closer than this to a corner are refused.
    pub mount_corner_distance: f32,
    /// Horizontal stick magnitude that counts as a shuffle.
    pub stick_threshold: f32,
    /// How far out from the ledge the character hangs, in capsule radii.
    pub hang_distance: f32,
    /// Wall height that can be dismounted from, and the tolerance around it.
    pub dismount_height: f32,
    pub dismount_height_tolerance: f32,
}

impl Default for ClimbingConfig {
    fn default() -> Self {
        Self {
            desired_speed_ledge: 1.0,
            desired_corner_min_distance: 0.2,
            corner_margin: 0.05,
            mount_corner_distance: 0.25,
            stick_threshold: 0.5,
            hang_distance: 1.5,
            dismount_height: 2.8,
            dismount_height_tolerance: 0.095,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Reflect)]
pub enum ClimbingState {
    #[default]
    Suspended,
    Mounting,
    Climbing,
    Dismount,
    PullUp,
    DropDown,
}

/// Where the character is heading while on a ledge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Reflect)]
pub enum ClimbingDirection {
    #[default]
    Idle,
    Up,
    Down,
    Left,
    Right,
    UpRight,
    DownRight,
    UpLeft,
    DownLeft,
    CornerRight,
    CornerLeft,
    None,
}

impl ClimbingDirection {
    pub fn is_corner(self) -> bool {
        matches!(self, Self::CornerRight | Self::CornerLeft)
    }

    /// Animation state played while heading this way.
    pub fn animation_state(self) -> Option<&'static str> {
        match self {
            Self::Idle => Some("LedgeIdle"),
            Self::Right => Some("LedgeRight"),
            Self::Left => Some("LedgeLeft"),
            Self::CornerRight => Some("LedgeCornerRight"),
            Self::CornerLeft => Some("LedgeCornerLeft"),
            _ => None,
        }
    }
}

/// Direction the stick asks for, given how close the character is to the end of its segment.
pub fn pick_climbing_direction(
    stick_x: f32,
    corner: CornerProximity,
    stick_threshold: f32,
    corner_threshold: f32,
) -> ClimbingDirection {
    if stick_x > stick_threshold {
        if !corner.left && corner.distance < corner_threshold {
            return ClimbingDirection::CornerRight;
        }
        return ClimbingDirection::Right;
    }
    if stick_x < -stick_threshold {
        if corner.left && corner.distance < corner_threshold {
            return ClimbingDirection::CornerLeft;
        }
        return ClimbingDirection::Left;
    }
    ClimbingDirection::Idle
}

/// Pose of a character hanging from `hook`: out from the ledge by `distance` capsule radii,
/// its top at the ledge, facing the wall.
pub fn hang_pose(ledge: &LedgeGeometry, hook: LedgeHook, capsule: CapsuleShape, distance: f32) -> AffineTransform {
    let position = ledge.get_position(hook);
    let normal = ledge.get_normal(hook);
    let mut translation = position + normal * capsule.radius * distance;
    translation.y = position.y - capsule.height;
    AffineTransform::new(translation, yaw_towards(-normal))
}

#[derive(Clone, Debug)]
pub struct ClimbingAbility {
    pub config: ClimbingConfig,
    pub enabled: bool,
    state: ClimbingState,
    previous_state: ClimbingState,
    direction: ClimbingDirection,
    previous_direction: ClimbingDirection,
    last_colliding_direction: ClimbingDirection,
    ledge: LedgeGeometry,
    wall: WallGeometry,
    hook: LedgeHook,
    anchor: WallAnchor,
    transition: Option<AnchoredTransition>,
}

impl Default for ClimbingAbility {
    fn default() -> Self {
        Self::new(ClimbingConfig::default())
    }
}

impl ClimbingAbility {
    pub fn new(config: ClimbingConfig) -> Self {
        Self {
            config,
            enabled: true,
            state: ClimbingState::Suspended,
            previous_state: ClimbingState::Suspended,
            direction: ClimbingDirection::Idle,
            previous_direction: ClimbingDirection::Idle,
            last_colliding_direction: ClimbingDirection::None,
            ledge: LedgeGeometry::default(),
            wall: WallGeometry::default(),
            hook: LedgeHook::default(),
            anchor: WallAnchor::default(),
            transition: None,
        }
    }

    pub fn state(&self) -> ClimbingState {
        self.state
    }

    pub fn previous_state(&self) -> ClimbingState {
        self.previous_state
    }

    pub fn direction(&self) -> ClimbingDirection {
        self.direction
    }

    pub fn previous_direction(&self) -> ClimbingDirection {
        self.previous_direction
    }

    pub fn hook(&self) -> LedgeHook {
        self.hook
    }

    pub fn ledge(&self) -> &LedgeGeometry {
        &self.ledge
    }

    pub fn wall_anchor(&self) -> WallAnchor {
        self.anchor
    }

    pub fn transition(&self) -> Option<&AnchoredTransition> {
        self.transition.as_ref()
    }

    pub fn set_state(&mut self, state: ClimbingState) {
        if state != self.state {
            debug!(from = ?self.state, to = ?state, "Climbing state change");
        }
        self.previous_state = self.state;
        self.state = state;
        self.last_colliding_direction = ClimbingDirection::None;
    }

    pub fn set_direction(&mut self, direction: ClimbingDirection) {
        self.previous_direction = self.direction;
        self.direction = direction;
    }

    fn hang_pose(&self, hook: LedgeHook, capsule: CapsuleShape) -> AffineTransform {
        hang_pose(&self.ledge, hook, capsule, self.config.hang_distance)
    }

    fn snap_to_hook(&self, ctx: &mut AbilityContext) {
        let pose = self.hang_pose(self.hook, ctx.controller.capsule());
        ctx.controller.teleport_to(pose);
    }

    /// Polls the owned transition and releases it once it is over.
    fn poll_transition(&mut self, ctx: &mut AbilityContext) -> TransitionState {
        let Some(transition) = self.transition.as_mut() else {
            return TransitionState::Invalid;
        };
        let state = transition.poll(ctx.animation);
        if state != TransitionState::Playing
            && let Some(transition) = self.transition.take()
        {
            transition.release(ctx.animation);
        }
        state
    }

    fn start_transition(&mut self, ctx: &mut AbilityContext, request: TransitionRequest) -> bool {
        replace_transition(&mut self.transition, ctx.animation, request)
    }

    /// Hooked on the ledge again, idling.
    fn settle_on_ledge(&mut self, ctx: &mut AbilityContext) {
        self.snap_to_hook(ctx);
        self.set_state(ClimbingState::Climbing);
        self.set_direction(ClimbingDirection::Idle);
        ctx.animation.play("LedgeIdle");
    }

    fn handle_mounting(&mut self, ctx: &mut AbilityContext) {
        match self.poll_transition(ctx) {
            TransitionState::Playing => {}
            TransitionState::Complete => self.settle_on_ledge(ctx),
            TransitionState::Failed | TransitionState::Invalid => {
                self.set_state(ClimbingState::Suspended);
            }
        }
    }

    fn handle_drop_down(&mut self, ctx: &mut AbilityContext) {
        self.handle_mounting(ctx);
    }

    /// Pull up and dismount both leave the ledge for good when they complete.
    fn handle_leaving(&mut self, ctx: &mut AbilityContext) {
        let target = self
            .transition
            .as_ref()
            .map_or_else(|| ctx.controller.transform(), AnchoredTransition::target);
        match self.poll_transition(ctx) {
            TransitionState::Playing => {}
            TransitionState::Complete => {
                ctx.controller.teleport_to(target);
                self.set_state(ClimbingState::Suspended);
            }
            TransitionState::Failed | TransitionState::Invalid => {
                self.set_state(ClimbingState::Climbing);
                self.set_direction(ClimbingDirection::Idle);
                ctx.animation.play("LedgeIdle");
            }
        }
    }

    /// Moves the target along the ledge from the stick. Returns whether the character can keep
    /// moving, which it cannot once the target leaves the current segment.
    fn update_climbing(&mut self, ctx: &mut AbilityContext, delta_time: f32) -> bool {
        let target = ctx.controller.target_position()
            + ctx.controller.right() * ctx.input.stick.x * self.config.desired_speed_ledge * delta_time;

        let hook = self
            .ledge
            .update_hook(self.hook, target, self.config.desired_corner_min_distance);
        if hook.index != self.hook.index {
            return false;
        }

        self.hook = hook;
        let pose = self.hang_pose(hook, ctx.controller.capsule());
        ctx.controller.teleport_to(pose);
        ctx.controller.set_target_position(target);
        true
    }

    fn desired_direction(&self, ctx: &AbilityContext) -> ClimbingDirection {
        let corner = self
            .ledge
            .closest_point_distance(ctx.controller.target_position(), self.hook);
        pick_climbing_direction(
            ctx.input.stick.x,
            corner,
            self.config.stick_threshold,
            self.config.corner_margin + self.config.desired_corner_min_distance,
        )
    }

    /// Whether the character would overlap something at the end of a corner turn.
    ///
    /// Only approximates the turn: the end pose is taken one unit forward and one unit to the
    /// side, not from the animation's root motion.
    fn corner_blocked(&self, ctx: &AbilityContext, side: f32) -> bool {
        let capsule = ctx.controller.capsule();
        let position = ctx.controller.position() + ctx.controller.right() * side + ctx.controller.forward();
        ctx.world
            .check_capsule(position, position + WORLD_UP * capsule.height, capsule.radius)
    }

    fn handle_climbing(&mut self, ctx: &mut AbilityContext, delta_time: f32) {
        if self.direction.is_corner() {
            if ctx.animation.normalized_time() >= 1.0 {
                // Without a reference joint, hook just around the corner.
                self.hook = match ctx.animation.reference_position() {
                    Some(reference) => self.ledge.get_hook(reference),
                    None => self.ledge.corner_hook(
                        self.hook,
                        self.direction == ClimbingDirection::CornerRight,
                        self.config.desired_corner_min_distance,
                    ),
                };
                self.set_direction(ClimbingDirection::Idle);
                self.snap_to_hook(ctx);
                ctx.animation.play("LedgeIdle");
            }
            return;
        }

        let can_move = self.update_climbing(ctx, delta_time);

        let mut desired = self.desired_direction(ctx);
        if desired == self.last_colliding_direction || !can_move {
            desired = ClimbingDirection::Idle;
        }

        if desired != self.direction {
            if desired.is_corner() {
                let side = if desired == ClimbingDirection::CornerRight {
                    1.0
                } else {
                    -1.0
                };
                if self.corner_blocked(ctx, side) {
                    debug!(direction = ?desired, "Corner turn blocked");
                    self.last_colliding_direction = desired;
                    desired = ClimbingDirection::Idle;
                }
            }
            if let Some(state) = desired.animation_state() {
                ctx.animation.play(state);
            }
            self.set_direction(desired);
        }

        let position = ctx.controller.position();
        self.anchor = self.wall.get_anchor(position);
        let height = self.wall.get_height(self.anchor);
        let close_to_drop =
            (height - self.config.dismount_height).abs() <= self.config.dismount_height_tolerance;

        if ctx.input.pull_up {
            let request = TransitionRequest::new(
                ("LedgeIdle", "PullUp"),
                ("LedgeIdleTrigger", "PullUpTrigger"),
                ctx.controller.transform(),
                self.pull_up_pose(ctx.controller.capsule()),
            );
            if self.start_transition(ctx, request) {
                self.set_state(ClimbingState::PullUp);
            }
        } else if close_to_drop && ctx.input.dismount {
            let request = TransitionRequest::new(
                ("LedgeIdle", "Dismount"),
                ("LedgeIdleTrigger", "DismountTrigger"),
                ctx.controller.transform(),
                self.dismount_pose(ctx.controller.capsule(), height),
            );
            if self.start_transition(ctx, request) {
                self.set_state(ClimbingState::Dismount);
            }
        }
    }

    /// Standing on top of the ledge, just behind its edge.
    fn pull_up_pose(&self, capsule: CapsuleShape) -> AffineTransform {
        let position = self.ledge.get_position(self.hook);
        let normal = self.ledge.get_normal(self.hook);
        AffineTransform::new(position - normal * capsule.radius, yaw_towards(-normal))
    }

    /// Standing at the foot of the wall, facing it.
    fn dismount_pose(&self, capsule: CapsuleShape, height: f32) -> AffineTransform {
        let mut pose = self.hang_pose(self.hook, capsule);
        pose.translation.y = self.ledge.get_position(self.hook).y - height;
        pose
    }

    fn mount_target(&self, info: &ColliderInfo) -> bool {
        info.is_box && info.climbable
    }
}

impl Ability for ClimbingAbility {
    fn name(&self) -> &'static str {
        "climbing"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn on_fixed_update(
        &mut self,
        ctx: &mut AbilityContext,
        _peers: &mut Peers,
        delta_time: f32,
    ) -> Control {
        ctx.controller
            .configure(self.state == ClimbingState::Suspended);

        match self.state {
            ClimbingState::Suspended => {}
            ClimbingState::Mounting => self.handle_mounting(ctx),
            ClimbingState::Climbing => self.handle_climbing(ctx, delta_time),
            ClimbingState::PullUp | ClimbingState::Dismount => self.handle_leaving(ctx),
            ClimbingState::DropDown => self.handle_drop_down(ctx),
        }

        if self.state == ClimbingState::Suspended {
            return Control::Yield;
        }
        Control::Retain
    }

    fn on_contact(
        &mut self,
        ctx: &mut AbilityContext,
        contact: AffineTransform,
        _delta_time: f32,
    ) -> bool {
        if !ctx.input.mount || self.state != ClimbingState::Suspended {
            return false;
        }

        let sample = ctx.controller.current();
        let Some(handle) = sample.collider else {
            return false;
        };
        let Some(info) = ctx.world.collider(handle) else {
            return false;
        };
        if !self.mount_target(&info) || !sample.is_grounded {
            return false;
        }

        let ledge = LedgeGeometry::from_collider(&info);
        let aux_hook = ledge.get_hook(contact.translation);
        let corner = ledge.closest_point_distance(contact.translation, aux_hook);
        if sample.ground == Some(handle) || corner.distance <= self.config.mount_corner_distance {
            return false;
        }

        let hook = ledge.get_hook(ctx.controller.position());
        let target = hang_pose(&ledge, hook, ctx.controller.capsule(), self.config.hang_distance);
        let request = TransitionRequest::new(
            ("WalkTransition", "Mount"),
            ("WalkTransitionTrigger", "MountTrigger"),
            contact,
            target,
        );
        if !self.start_transition(ctx, request) {
            return false;
        }

        info!(collider = ?handle, "Mounting ledge");
        self.wall = WallGeometry::from_collider(&info, &contact);
        self.ledge = ledge;
        self.hook = hook;
        self.set_state(ClimbingState::Mounting);
        true
    }

    fn on_drop(&mut self, ctx: &mut AbilityContext, _delta_time: f32) -> bool {
        if !ctx.input.drop_down || self.state != ClimbingState::Suspended {
            return false;
        }

        let previous = ctx.controller.previous();
        let Some(ground) = previous.ground.filter(|_| previous.is_grounded) else {
            return false;
        };
        let Some(info) = ctx.world.collider(ground) else {
            return false;
        };
        if !self.mount_target(&info) {
            return false;
        }

        let ledge = LedgeGeometry::from_collider(&info);
        let hook = ledge.get_hook(previous.position);
        let target = hang_pose(&ledge, hook, ctx.controller.capsule(), self.config.hang_distance);
        let request = TransitionRequest::new(
            ("WalkTransition", "DropDown"),
            ("WalkTransitionTrigger", "DropDownTrigger"),
            ledge.get_transform(hook),
            target,
        );
        if !self.start_transition(ctx, request) {
            return false;
        }

        self.wall = WallGeometry::from_collider(&info, &target);
        self.ledge = ledge;
        self.hook = hook;
        self.set_state(ClimbingState::DropDown);
        true
    }
}
