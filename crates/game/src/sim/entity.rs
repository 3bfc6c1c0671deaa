use std::fmt;

use bitflags::bitflags;
use glam::Vec2;
use rkyv::{Archive, Deserialize, Serialize};
use uuid::Uuid;

use super::build::{BuildStatus, PillboxState};
use super::tank::TankState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct EntityId(pub u128);

impl EntityId {
    pub fn random() -> Self {
        Self(Uuid::new_v4().as_u128())
    }

    pub fn as_uuid(self) -> Uuid {
        Uuid::from_u128(self.0)
    }
}

impl From<Uuid> for EntityId {
    fn from(value: Uuid) -> Self {
        Self(value.as_u128())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_uuid())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum EntityKind {
    Tank,
    Pillbox,
    Base,
    Mine,
    Bullet,
    Tree,
    Wall,
    Grass,
    Road,
    Water,
}

impl EntityKind {
    /// Actors can be owned by a tank.
    pub fn is_actor(self) -> bool {
        matches!(
            self,
            Self::Tank | Self::Pillbox | Self::Base | Self::Mine | Self::Bullet
        )
    }

    pub fn is_terrain(self) -> bool {
        matches!(self, Self::Grass | Self::Road | Self::Water)
    }

    pub fn max_hit_points(self) -> f32 {
        match self {
            Self::Tank => 100.0,
            Self::Pillbox => 20.0,
            Self::Base => 100.0,
            Self::Wall => 20.0,
            Self::Tree => 10.0,
            Self::Mine | Self::Bullet | Self::Grass | Self::Road | Self::Water => 1.0,
        }
    }

    fn solid_by_default(self) -> bool {
        matches!(
            self,
            Self::Tank | Self::Pillbox | Self::Base | Self::Wall | Self::Tree
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tank => "tank",
            Self::Pillbox => "pillbox",
            Self::Base => "base",
            Self::Mine => "mine",
            Self::Bullet => "bullet",
            Self::Tree => "tree",
            Self::Wall => "wall",
            Self::Grass => "grass",
            Self::Road => "road",
            Self::Water => "water",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ControllerKind {
    #[default]
    Local,
    Network,
    AiTree,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EntityFlags: u8 {
        const SOLID = 1 << 0;
        const DROWNED = 1 << 1;
        const DEAD = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstructionArgs {
    pub id: EntityId,
    pub position: Vec2,
    pub rotation: f32,
}

impl ConstructionArgs {
    pub fn new(id: EntityId, x: f32, y: f32, rotation: f32) -> Self {
        Self {
            id,
            position: Vec2::new(x, y),
            rotation,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub position: Vec2,
    pub rotation: f32,
    pub hit_points: f32,
    pub flags: EntityFlags,
    pub controller: Option<ControllerKind>,
    owner: Option<EntityId>,
    tank: Option<TankState>,
    pillbox: Option<PillboxState>,
}

impl Entity {
    pub fn new(kind: EntityKind, args: ConstructionArgs) -> Self {
        let mut flags = EntityFlags::empty();
        flags.set(EntityFlags::SOLID, kind.solid_by_default());

        Self {
            id: args.id,
            kind,
            position: args.position,
            rotation: args.rotation,
            hit_points: kind.max_hit_points(),
            flags,
            controller: None,
            owner: None,
            tank: (kind == EntityKind::Tank).then(TankState::default),
            pillbox: (kind == EntityKind::Pillbox).then(PillboxState::built),
        }
    }

    pub fn owner(&self) -> Option<EntityId> {
        self.owner
    }

    /// Returns true when the owner actually changed. A pillbox taken by a new
    /// owner is rebuilt in place with fresh hit points.
    pub fn set_owner(&mut self, owner: Option<EntityId>) -> bool {
        if self.owner == owner {
            return false;
        }
        self.owner = owner;

        if owner.is_some() && self.kind == EntityKind::Pillbox {
            self.hit_points = 5.0;
            self.update_pillbox(|state| state.apply_remote(BuildStatus::Built, 1.0));
        }
        true
    }

    pub fn tank(&self) -> Option<&TankState> {
        self.tank.as_ref()
    }

    pub fn tank_mut(&mut self) -> Option<&mut TankState> {
        self.tank.as_mut()
    }

    pub fn pillbox(&self) -> Option<&PillboxState> {
        self.pillbox.as_ref()
    }

    /// Runs `f` on the pillbox state and keeps the solid flag in step with it.
    pub fn update_pillbox<R>(&mut self, f: impl FnOnce(&mut PillboxState) -> R) -> Option<R> {
        let state = self.pillbox.as_mut()?;
        let result = f(state);
        let solid = state.is_solid();
        self.flags.set(EntityFlags::SOLID, solid);
        Some(result)
    }

    pub fn is_solid(&self) -> bool {
        self.flags.contains(EntityFlags::SOLID)
    }

    pub fn is_dead(&self) -> bool {
        self.flags.contains(EntityFlags::DEAD)
    }

    pub fn is_drowned(&self) -> bool {
        self.flags.contains(EntityFlags::DROWNED)
    }

    pub fn player_name(&self) -> Option<&str> {
        self.tank
            .as_ref()
            .and_then(|tank| tank.player.as_ref())
            .map(|player| player.name.as_str())
    }
}
