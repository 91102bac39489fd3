//! Anchored transitions: short animation-driven moves that end with the agent snapped to a
//! precomputed pose.
//!
//! The core never blends poses itself. It hands a [`TransitionRequest`] to an
//! [`AnimationDriver`] and polls it every tick through an [`AnchoredTransition`].

use crate::{geometry::AffineTransform, prelude::*};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Reflect)]
pub enum TransitionState {
    #[default]
    Invalid,
    Playing,
    Complete,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransitionRequest {
    pub source_state: &'static str,
    pub target_state: &'static str,
    pub source_trigger: &'static str,
    pub target_trigger: &'static str,
    pub source_speed: f32,
    pub target_speed: f32,
    /// Where the agent touched the surface that started the transition.
    pub contact: AffineTransform,
    /// Pose the agent ends up in.
    pub target: AffineTransform,
    pub max_linear_error: f32,
    /// Degrees.
    pub max_angular_error: f32,
}

impl TransitionRequest {
    pub fn new(
        (source_state, target_state): (&'static str, &'static str),
        (source_trigger, target_trigger): (&'static str, &'static str),
        contact: AffineTransform,
        target: AffineTransform,
    ) -> Self {
        Self {
            source_state,
            target_state,
            source_trigger,
            target_trigger,
            source_speed: 1.0,
            target_speed: 1.0,
            contact,
            target,
            max_linear_error: 0.01,
            max_angular_error: 1.0,
        }
    }

    /// Seconds the target clip takes at this request's speed, given its length at speed 1.
    pub fn scaled_duration(&self, duration: f32) -> f32 {
        if self.target_speed > 0.0 {
            duration / self.target_speed
        } else {
            duration
        }
    }
}

/// The animation side of a transition. Implemented by whatever plays the character's clips.
pub trait AnimationDriver {
    /// Begins blending into `request`. Returns `false` when the transition cannot start.
    fn start_transition(&mut self, request: &TransitionRequest) -> bool;

    fn is_transition_active(&self) -> bool;

    fn has_transition_completed(&self) -> bool;

    /// Abandons the running transition, if any.
    fn cancel_transition(&mut self);

    /// Switches straight to a named looping state.
    fn play(&mut self, state: &'static str);

    /// Playback progress of the current state, `1.0` once a non-looping clip has finished.
    fn normalized_time(&self) -> f32;

    /// World position of the skeleton's reference joint, when the animation drives root motion.
    fn reference_position(&self) -> Option<Vec3>;

    /// Root pose the animation ended on, when it drives root motion.
    fn root_pose(&self) -> Option<AffineTransform> {
        None
    }
}

/// A transition owned by one ability. Dropping the handle without [`Self::release`] leaves the
/// driver playing, so every exit path releases it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnchoredTransition {
    request: TransitionRequest,
    state: TransitionState,
}

impl AnchoredTransition {
    /// Starts `request` on `driver`, or returns `None` if the driver refused it.
    pub fn start(driver: &mut dyn AnimationDriver, request: TransitionRequest) -> Option<Self> {
        driver.start_transition(&request).then_some(Self {
            request,
            state: TransitionState::Playing,
        })
    }

    pub fn state(&self) -> TransitionState {
        self.state
    }

    pub fn target(&self) -> AffineTransform {
        self.request.target
    }

    pub fn request(&self) -> &TransitionRequest {
        &self.request
    }

    pub fn poll(&mut self, driver: &dyn AnimationDriver) -> TransitionState {
        if self.state == TransitionState::Playing {
            self.state = if driver.is_transition_active() {
                TransitionState::Playing
            } else if driver.has_transition_completed() {
                match driver.root_pose() {
                    Some(pose) if !self.reached(&pose) => TransitionState::Failed,
                    _ => TransitionState::Complete,
                }
            } else {
                TransitionState::Failed
            };
        }
        self.state
    }

    /// Whether `pose` is within the request's tolerances of the target.
    pub fn reached(&self, pose: &AffineTransform) -> bool {
        let (linear, angular) = pose.error_to(&self.request.target);
        linear <= self.request.max_linear_error && angular <= self.request.max_angular_error
    }

    pub fn release(self, driver: &mut dyn AnimationDriver) {
        if self.state == TransitionState::Playing {
            driver.cancel_transition();
        }
    }
}

/// Releases whatever transition `slot` holds, then tries to start `request` in its place.
pub fn replace_transition(
    slot: &mut Option<AnchoredTransition>,
    driver: &mut dyn AnimationDriver,
    request: TransitionRequest,
) -> bool {
    if let Some(previous) = slot.take() {
        previous.release(driver);
    }
    *slot = AnchoredTransition::start(driver, request);
    slot.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::TraverserAnimation;

    fn request() -> TransitionRequest {
        TransitionRequest::new(
            ("WalkTransition", "Mount"),
            ("WalkTransitionTrigger", "MountTrigger"),
            AffineTransform::IDENTITY,
            AffineTransform::from_translation(Vec3::new(0.0, 1.0, -1.0)),
        )
    }

    #[test]
    fn lifecycle_follows_the_driver() {
        let mut animation = TraverserAnimation::default();
        let mut transition = AnchoredTransition::start(&mut animation, request()).unwrap();
        assert_eq!(transition.poll(&animation), TransitionState::Playing);
        animation.complete();
        assert_eq!(transition.poll(&animation), TransitionState::Complete);
        transition.release(&mut animation);
        assert!(!animation.is_transition_active());
    }

    #[test]
    fn completion_off_target_fails() {
        let mut animation = TraverserAnimation::default();
        let mut transition = AnchoredTransition::start(&mut animation, request()).unwrap();
        animation.set_root_pose(Some(AffineTransform::from_translation(Vec3::new(0.0, 1.0, -1.5))));
        animation.complete();
        assert_eq!(transition.poll(&animation), TransitionState::Failed);

        let mut transition = AnchoredTransition::start(&mut animation, request()).unwrap();
        animation.set_root_pose(Some(AffineTransform::from_translation(Vec3::new(0.0, 1.0, -1.005))));
        animation.complete();
        assert_eq!(transition.poll(&animation), TransitionState::Complete);
    }

    #[test]
    fn refused_start_yields_nothing() {
        let mut animation = TraverserAnimation::default();
        animation.set_accepting(false);
        assert!(AnchoredTransition::start(&mut animation, request()).is_none());
    }

    #[test]
    fn replacing_cancels_the_old_transition() {
        let mut animation = TraverserAnimation::default();
        let mut slot = None;
        assert!(replace_transition(&mut slot, &mut animation, request()));
        assert!(replace_transition(&mut slot, &mut animation, request()));
        assert_eq!(animation.cancelled(), 1);
        assert_eq!(slot.map(|t| t.state()), Some(TransitionState::Playing));
    }

    #[test]
    fn reached_uses_both_tolerances() {
        let transition = AnchoredTransition {
            request: request(),
            state: TransitionState::Playing,
        };
        assert!(transition.reached(&AffineTransform::from_translation(Vec3::new(0.0, 1.005, -1.0))));
        assert!(!transition.reached(&AffineTransform::from_translation(Vec3::new(0.0, 1.1, -1.0))));
        assert!(!transition.reached(&AffineTransform::new(
            Vec3::new(0.0, 1.0, -1.0),
            Quat::from_rotation_y(0.1),
        )));
    }
}
