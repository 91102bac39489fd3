//! The capability set every ability implements, and the ordered collection that decides which
//! one drives the character.

use core::any::Any;

use tracing::{debug, error};

use crate::{
    climbing::{ClimbingAbility, ClimbingConfig},
    controller::CharacterController,
    geometry::AffineTransform,
    input::InputSnapshot,
    locomotion::{LocomotionAbility, LocomotionConfig},
    parkour::{ParkourAbility, ParkourConfig},
    probe::PhysicsWorld,
    transition::AnimationDriver,
};

/// Position of an ability in its [`Abilities`] collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AbilityId(pub usize);

/// What an ability wants to happen after one of its updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    /// Keep driving the character.
    Retain,
    /// Give control back to the default ability.
    Yield,
    /// Hand control to another ability, which runs from the next tick on.
    Handoff(AbilityId),
}

/// Everything an ability may touch during one call.
pub struct AbilityContext<'a> {
    pub controller: &'a mut CharacterController,
    pub world: &'a dyn PhysicsWorld,
    pub animation: &'a mut dyn AnimationDriver,
    pub input: &'a InputSnapshot,
}

pub trait Ability: Any + Send + Sync {
    fn name(&self) -> &'static str;

    fn is_enabled(&self) -> bool {
        true
    }

    /// Runs once per rendered frame while active.
    fn on_update(&mut self, _ctx: &mut AbilityContext, _delta_time: f32) -> Control {
        Control::Retain
    }

    /// Runs once per fixed tick while active. `peers` are the other abilities, for offering
    /// contacts and drops.
    fn on_fixed_update(
        &mut self,
        ctx: &mut AbilityContext,
        peers: &mut Peers,
        delta_time: f32,
    ) -> Control;

    /// Offered a predicted contact. Returning `true` takes ownership of the character.
    fn on_contact(
        &mut self,
        _ctx: &mut AbilityContext,
        _contact: AffineTransform,
        _delta_time: f32,
    ) -> bool {
        false
    }

    /// Offered a predicted drop off the ground. Returning `true` takes ownership.
    fn on_drop(&mut self, _ctx: &mut AbilityContext, _delta_time: f32) -> bool {
        false
    }
}

/// The inactive abilities, in declaration order. The active ability's own slot is empty.
pub struct Peers<'a> {
    slots: &'a mut [Option<Box<dyn Ability>>],
}

impl Peers<'_> {
    /// Offers `contact` to every enabled peer in order and returns the first that accepts.
    pub fn offer_contact(
        &mut self,
        ctx: &mut AbilityContext,
        contact: AffineTransform,
        delta_time: f32,
    ) -> Option<AbilityId> {
        self.slots.iter_mut().enumerate().find_map(|(index, slot)| {
            let ability = slot.as_mut().filter(|ability| ability.is_enabled())?;
            ability
                .on_contact(ctx, contact, delta_time)
                .then_some(AbilityId(index))
        })
    }

    /// Offers a drop to every enabled peer in order and returns the first that accepts.
    pub fn offer_drop(&mut self, ctx: &mut AbilityContext, delta_time: f32) -> Option<AbilityId> {
        self.slots.iter_mut().enumerate().find_map(|(index, slot)| {
            let ability = slot.as_mut().filter(|ability| ability.is_enabled())?;
            ability.on_drop(ctx, delta_time).then_some(AbilityId(index))
        })
    }
}

/// Ordered abilities of one character. The first one pushed is the default, which is active
/// initially and receives control whenever another ability yields.
#[derive(Default)]
pub struct Abilities {
    slots: Vec<Option<Box<dyn Ability>>>,
    active: AbilityId,
}

impl Default for AbilityId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl AbilityId {
    pub const DEFAULT: Self = Self(0);
}

impl Abilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locomotion, climbing and parkour, in that order.
    pub fn standard(
        locomotion: LocomotionConfig,
        climbing: ClimbingConfig,
        parkour: ParkourConfig,
    ) -> Self {
        Self::new()
            .with(LocomotionAbility::new(locomotion))
            .with(ClimbingAbility::new(climbing))
            .with(ParkourAbility::new(parkour))
    }

    pub fn with(mut self, ability: impl Ability) -> Self {
        self.push(Box::new(ability));
        self
    }

    pub fn push(&mut self, ability: Box<dyn Ability>) -> AbilityId {
        self.slots.push(Some(ability));
        AbilityId(self.slots.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn active(&self) -> AbilityId {
        self.active
    }

    pub fn active_name(&self) -> Option<&'static str> {
        self.name_of(self.active)
    }

    pub fn name_of(&self, id: AbilityId) -> Option<&'static str> {
        self.slots
            .get(id.0)
            .and_then(Option::as_deref)
            .map(Ability::name)
    }

    /// Forces `id` to be the active ability.
    pub fn set_active(&mut self, id: AbilityId) {
        if id.0 < self.slots.len() {
            self.active = id;
        }
    }

    pub fn id_of<T: Ability>(&self) -> Option<AbilityId> {
        self.slots.iter().position(|slot| {
            slot.as_deref().is_some_and(|ability| {
                let ability: &dyn Any = ability;
                ability.is::<T>()
            })
        })
        .map(AbilityId)
    }

    pub fn get<T: Ability>(&self) -> Option<&T> {
        self.slots.iter().flatten().find_map(|ability| {
            let ability: &dyn Ability = &**ability;
            let ability: &dyn Any = ability;
            ability.downcast_ref::<T>()
        })
    }

    pub fn get_mut<T: Ability>(&mut self) -> Option<&mut T> {
        self.slots.iter_mut().flatten().find_map(|ability| {
            let ability: &mut dyn Ability = &mut **ability;
            let ability: &mut dyn Any = ability;
            ability.downcast_mut::<T>()
        })
    }

    /// Runs the active ability's frame update.
    pub fn update(&mut self, ctx: &mut AbilityContext, delta_time: f32) {
        let Some(mut ability) = self.take_active() else {
            return;
        };
        let control = ability.on_update(ctx, delta_time);
        self.slots[self.active.0] = Some(ability);
        self.apply(control);
    }

    /// Runs the active ability's fixed update and applies the control it asks for.
    pub fn fixed_update(&mut self, ctx: &mut AbilityContext, delta_time: f32) {
        let Some(mut ability) = self.take_active() else {
            return;
        };
        let control = {
            let mut peers = Peers {
                slots: &mut self.slots,
            };
            ability.on_fixed_update(ctx, &mut peers, delta_time)
        };
        self.slots[self.active.0] = Some(ability);
        self.apply(control);
    }

    fn take_active(&mut self) -> Option<Box<dyn Ability>> {
        if self.slots.is_empty() {
            return None;
        }
        let enabled = self
            .slots
            .get(self.active.0)
            .and_then(Option::as_deref)
            .is_some_and(Ability::is_enabled);
        if !enabled && self.active != AbilityId::DEFAULT {
            debug!(
                from = self.active_name(),
                "Active ability disabled, falling back to the default"
            );
            self.active = AbilityId::DEFAULT;
        }
        let ability = self.slots.get_mut(self.active.0).and_then(Option::take);
        if ability.is_none() {
            error!(index = self.active.0, "Active ability slot is empty");
        }
        ability
    }

    fn apply(&mut self, control: Control) {
        let next = match control {
            Control::Retain => return,
            Control::Yield => AbilityId::DEFAULT,
            Control::Handoff(id) => id,
        };
        if next == self.active || next.0 >= self.slots.len() {
            return;
        }
        debug!(
            from = self.active_name(),
            to = self.name_of(next),
            "Ability handoff"
        );
        self.active = next;
    }
}
