use crate::{
    geometry::AffineTransform,
    prelude::*,
    transition::{AnimationDriver, TransitionRequest, TransitionState},
};

/// Animation bookkeeping for a [`Traverser`](crate::Traverser).
///
/// By default transitions and clips run on timers, which is enough to drive the abilities
/// without an animation graph. Games that play real clips call [`Self::complete`],
/// [`Self::fail`] and [`Self::set_normalized_time`] from their own animation systems and turn
/// `timed` off.
#[derive(Component, Clone, Debug)]
pub struct TraverserAnimation {
    /// Advance transitions and clips from elapsed time.
    pub timed: bool,
    /// Seconds a transition takes when timed.
    pub transition_duration: f32,
    /// Seconds a state clip takes when timed.
    pub clip_duration: f32,
    accepting: bool,
    request: Option<TransitionRequest>,
    status: TransitionState,
    state: &'static str,
    elapsed: f32,
    normalized_time: f32,
    reference_position: Option<Vec3>,
    root_pose: Option<AffineTransform>,
    cancelled: u32,
}

impl Default for TraverserAnimation {
    fn default() -> Self {
        Self {
            timed: true,
            transition_duration: 0.5,
            clip_duration: 1.0,
            accepting: true,
            request: None,
            status: TransitionState::Invalid,
            state: "Locomotion",
            elapsed: 0.0,
            normalized_time: 0.0,
            reference_position: None,
            root_pose: None,
            cancelled: 0,
        }
    }
}

impl TraverserAnimation {
    /// The transition being played, if any.
    pub fn request(&self) -> Option<&TransitionRequest> {
        self.request.as_ref()
    }

    pub fn status(&self) -> TransitionState {
        self.status
    }

    /// Name of the state currently playing.
    pub fn state(&self) -> &'static str {
        self.state
    }

    pub fn cancelled(&self) -> u32 {
        self.cancelled
    }

    /// Whether new transitions may start. Used to model a blocked animation graph.
    pub fn set_accepting(&mut self, accepting: bool) {
        self.accepting = accepting;
    }

    pub fn complete(&mut self) {
        if self.status == TransitionState::Playing {
            self.status = TransitionState::Complete;
            if let Some(request) = self.request {
                self.state = request.target_state;
            }
        }
    }

    pub fn fail(&mut self) {
        if self.status == TransitionState::Playing {
            self.status = TransitionState::Failed;
        }
    }

    pub fn set_normalized_time(&mut self, normalized_time: f32) {
        self.normalized_time = normalized_time;
    }

    pub fn set_reference_position(&mut self, position: Option<Vec3>) {
        self.reference_position = position;
    }

    /// Root pose reported when a transition completes. Checked against the transition's
    /// tolerances.
    pub fn set_root_pose(&mut self, pose: Option<AffineTransform>) {
        self.root_pose = pose;
    }

    /// Advances the timers by `delta_time` seconds. Does nothing unless `timed`.
    pub fn advance(&mut self, delta_time: f32) {
        if !self.timed {
            return;
        }
        self.elapsed += delta_time;
        if self.status == TransitionState::Playing {
            let duration = self
                .request
                .map_or(self.transition_duration, |request| {
                    request.scaled_duration(self.transition_duration)
                });
            if self.elapsed >= duration {
                self.complete();
                self.elapsed = 0.0;
            }
            return;
        }
        self.normalized_time = if self.clip_duration > 0.0 {
            (self.elapsed / self.clip_duration).min(1.0)
        } else {
            1.0
        };
    }
}

impl AnimationDriver for TraverserAnimation {
    fn start_transition(&mut self, request: &TransitionRequest) -> bool {
        if !self.accepting {
            return false;
        }
        self.request = Some(*request);
        self.status = TransitionState::Playing;
        self.state = request.source_state;
        self.elapsed = 0.0;
        self.normalized_time = 0.0;
        true
    }

    fn is_transition_active(&self) -> bool {
        self.status == TransitionState::Playing
    }

    fn has_transition_completed(&self) -> bool {
        self.status == TransitionState::Complete
    }

    fn cancel_transition(&mut self) {
        if self.status == TransitionState::Playing {
            self.cancelled += 1;
        }
        self.status = TransitionState::Invalid;
        self.request = None;
    }

    fn play(&mut self, state: &'static str) {
        self.state = state;
        self.elapsed = 0.0;
        self.normalized_time = 0.0;
    }

    fn normalized_time(&self) -> f32 {
        self.normalized_time
    }

    fn reference_position(&self) -> Option<Vec3> {
        self.reference_position
    }

    fn root_pose(&self) -> Option<AffineTransform> {
        self.root_pose
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timed_transition_completes_after_its_duration() {
        let mut animation = TraverserAnimation::default();
        let request = TransitionRequest::new(
            ("LedgeIdle", "PullUp"),
            ("", "PullUpTrigger"),
            AffineTransform::IDENTITY,
            AffineTransform::IDENTITY,
        );
        assert!(animation.start_transition(&request));
        animation.advance(0.3);
        assert!(animation.is_transition_active());
        animation.advance(0.3);
        assert!(animation.has_transition_completed());
        assert_eq!(animation.state(), "PullUp");
    }

    #[test]
    fn faster_transition_finishes_sooner() {
        let mut animation = TraverserAnimation::default();
        let request = TransitionRequest {
            target_speed: 2.0,
            ..TransitionRequest::new(
                ("Locomotion", "ParkourWall"),
                ("LocomotionTrigger", "ParkourTrigger"),
                AffineTransform::IDENTITY,
                AffineTransform::IDENTITY,
            )
        };
        assert!(animation.start_transition(&request));
        animation.advance(0.3);
        assert!(animation.has_transition_completed());
    }

    #[test]
    fn timed_clip_reaches_the_end() {
        let mut animation = TraverserAnimation::default();
        animation.play("LedgeCornerRight");
        animation.advance(0.5);
        assert!((animation.normalized_time() - 0.5).abs() < 1e-6);
        animation.advance(2.0);
        assert_eq!(animation.normalized_time(), 1.0);
    }

    #[test]
    fn untimed_animation_waits_for_the_game() {
        let mut animation = TraverserAnimation {
            timed: false,
            ..default()
        };
        animation.play("LedgeIdle");
        animation.advance(10.0);
        assert_eq!(animation.normalized_time(), 0.0);
    }
}
