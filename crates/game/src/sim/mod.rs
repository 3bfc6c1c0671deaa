mod build;
mod entity;
mod tank;
mod world;

pub use build::{BUILD_TIME_SECS, BuildStatus, PillboxState};
pub use entity::{ConstructionArgs, ControllerKind, Entity, EntityFlags, EntityId, EntityKind};
pub use tank::TankState;
pub use world::{TILE_SIZE, Tile, World, WorldError, WorldEvent};
