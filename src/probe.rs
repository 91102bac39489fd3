//! The physics query surface the controller and abilities run against.
//!
//! [`PhysicsWorld`] is implemented over Avian's spatial queries for the ECS integration
//! ([`crate::avian`]) and over a plain list of boxes for headless use ([`crate::box_world`]).

use crate::prelude::*;

pub const WORLD_UP: Vec3 = Vec3::Y;

/// Opaque identifier of a collider in whatever world produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColliderHandle(u64);

impl ColliderHandle {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub fn entity(self) -> Entity {
        Entity::from_bits(self.0)
    }
}

impl From<Entity> for ColliderHandle {
    fn from(entity: Entity) -> Self {
        Self(entity.to_bits())
    }
}

/// Kinds of obstacle the parkour ability knows how to traverse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Reflect)]
pub enum ParkourKind {
    Wall,
    Table,
    Platform,
    Ledge,
    DropDown,
}

impl ParkourKind {
    /// Animation state the traversal plays.
    pub fn animation_state(self) -> &'static str {
        match self {
            Self::Wall => "ParkourWall",
            Self::Table => "ParkourTable",
            Self::Platform => "ParkourPlatform",
            Self::Ledge => "ParkourLedge",
            Self::DropDown => "ParkourDropDown",
        }
    }
}

/// Everything the abilities need to know about a collider they touched.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColliderInfo {
    pub handle: ColliderHandle,
    /// World-space center of the collider's bounds.
    pub center: Vec3,
    pub rotation: Quat,
    /// Half extents along the collider's local axes.
    pub half_extents: Vec3,
    /// Only boxes can be turned into ledges.
    pub is_box: bool,
    pub climbable: bool,
    pub parkour: Option<ParkourKind>,
}

impl ColliderInfo {
    pub fn size(&self) -> Vec3 {
        self.half_extents * 2.0
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }
}

/// Capsule standing on its lowest point: the agent's position is at its feet.
#[derive(Clone, Copy, Debug, PartialEq, Reflect)]
pub struct CapsuleShape {
    pub radius: f32,
    pub height: f32,
}

impl CapsuleShape {
    /// Centers of the bottom and top hemispheres, relative to the feet.
    pub fn segment(&self) -> (Vec3, Vec3) {
        let bottom = WORLD_UP * self.radius;
        let top = WORLD_UP * (self.height - self.radius).max(self.radius);
        (bottom, top)
    }
}

/// A surface touched while sweeping the capsule.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepHit {
    pub collider: ColliderHandle,
    pub point: Vec3,
    pub normal: Vec3,
}

/// Where a capsule sweep ended and what it touched on the way, in order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sweep {
    pub position: Vec3,
    pub hits: Vec<SweepHit>,
}

/// The candidate whose closest point lies nearest to `point`, if any lies within `radius`.
///
/// Candidates pair a collider with its closest point to `point`.
pub fn nearest_within(
    candidates: impl IntoIterator<Item = (ColliderHandle, Vec3)>,
    point: Vec3,
    radius: f32,
) -> Option<ColliderHandle> {
    candidates
        .into_iter()
        .map(|(handle, closest)| (handle, closest.distance(point)))
        .filter(|(_, distance)| *distance <= radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(handle, _)| handle)
}

/// Scene queries used by the controller and the abilities.
///
/// Implementations decide which colliders participate (collision mask, excluded self).
pub trait PhysicsWorld {
    /// Moves `capsule` from `position` by `displacement`, sliding along whatever it hits.
    fn sweep_capsule(
        &self,
        capsule: CapsuleShape,
        position: Vec3,
        rotation: Quat,
        displacement: Vec3,
        delta_time: f32,
    ) -> Sweep;

    /// Nearest collider within `radius` of `point`.
    fn ground_probe(&self, point: Vec3, radius: f32) -> Option<ColliderHandle>;

    /// Whether a capsule between `start` and `end` overlaps anything.
    fn check_capsule(&self, start: Vec3, end: Vec3, radius: f32) -> bool;

    /// Distance to the first hit along a ray.
    fn raycast(&self, origin: Vec3, direction: Dir3, max_distance: f32) -> Option<f32>;

    /// Closest point on `collider` to `point`.
    fn closest_point(&self, collider: ColliderHandle, point: Vec3) -> Option<Vec3>;

    fn collider(&self, collider: ColliderHandle) -> Option<ColliderInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_candidate_wins_regardless_of_order() {
        let floor = ColliderHandle::from_raw(1);
        let block = ColliderHandle::from_raw(2);
        let point = Vec3::new(0.0, 0.05, -1.0);
        // Touching both the floor below and the block's front face.
        let candidates = [
            (floor, Vec3::new(0.0, 0.0, -1.0)),
            (block, Vec3::new(0.0, 0.05, -1.02)),
        ];
        assert_eq!(nearest_within(candidates, point, 0.1), Some(block));
        assert_eq!(nearest_within(candidates.into_iter().rev(), point, 0.1), Some(block));
        assert_eq!(nearest_within(candidates, point, 0.01), None);
    }
}
