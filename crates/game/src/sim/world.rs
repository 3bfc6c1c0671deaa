use std::collections::HashMap;

use glam::Vec2;

use crate::command::{Command, WorldCommand};

use super::build::BuildStatus;
use super::entity::{ConstructionArgs, ControllerKind, Entity, EntityId, EntityKind};
use super::tank::TankState;

pub const TILE_SIZE: f32 = 32.0;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    #[error("entity {0} not found")]
    NotFound(EntityId),
    #[error("entity {0} already exists")]
    Duplicate(EntityId),
    #[error("entity {id} is a {actual}, expected a {expected}")]
    WrongKind {
        id: EntityId,
        expected: EntityKind,
        actual: EntityKind,
    },
    #[error("tile ({column}, {row}) is outside the map")]
    OutOfBounds { column: i32, row: i32 },
    #[error("tile ({column}, {row}) is already occupied by {occupant}")]
    TileOccupied {
        column: u16,
        row: u16,
        occupant: EntityId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    MapLoaded {
        columns: u16,
        rows: u16,
        entities: usize,
    },
    EntityCaptured {
        entity: EntityId,
        owner: EntityId,
    },
    TankKilled {
        tank: EntityId,
        killer: EntityKind,
        killer_name: Option<String>,
    },
    AllianceRequested {
        requester: EntityId,
        requester_name: String,
    },
    AllianceAccepted {
        requester: EntityId,
        accepter_name: String,
    },
    AllianceRejected {
        rejecter_name: String,
    },
    AllianceEnded {
        ended_by: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    pub column: u16,
    pub row: u16,
}

impl Tile {
    pub fn center(self) -> Vec2 {
        Vec2::new(
            (self.column as f32 + 0.5) * TILE_SIZE,
            (self.row as f32 + 0.5) * TILE_SIZE,
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct World {
    columns: u16,
    rows: u16,
    entities: HashMap<EntityId, Entity>,
    occupied: HashMap<Tile, EntityId>,
    local_tank: Option<EntityId>,
    events: Vec<WorldEvent>,
}

impl World {
    pub fn new(columns: u16, rows: u16) -> Self {
        Self {
            columns,
            rows,
            ..Self::default()
        }
    }

    pub fn columns(&self) -> u16 {
        self.columns
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn get_entity(&self, id: EntityId) -> Result<&Entity, WorldError> {
        self.entities.get(&id).ok_or(WorldError::NotFound(id))
    }

    pub fn get_entity_mut(&mut self, id: EntityId) -> Result<&mut Entity, WorldError> {
        self.entities.get_mut(&id).ok_or(WorldError::NotFound(id))
    }

    pub fn get_entity_or_null(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_kind_mut(
        &mut self,
        id: EntityId,
        expected: EntityKind,
    ) -> Result<&mut Entity, WorldError> {
        let entity = self.get_entity_mut(id)?;
        if entity.kind != expected {
            return Err(WorldError::WrongKind {
                id,
                expected,
                actual: entity.kind,
            });
        }
        Ok(entity)
    }

    pub fn tank(&self, id: EntityId) -> Result<&TankState, WorldError> {
        let entity = self.get_entity(id)?;
        entity.tank().ok_or(WorldError::WrongKind {
            id,
            expected: EntityKind::Tank,
            actual: entity.kind,
        })
    }

    pub fn tank_mut(&mut self, id: EntityId) -> Result<&mut TankState, WorldError> {
        let entity = self.get_kind_mut(id, EntityKind::Tank)?;
        let kind = entity.kind;
        entity.tank_mut().ok_or(WorldError::WrongKind {
            id,
            expected: EntityKind::Tank,
            actual: kind,
        })
    }

    pub fn add_entity(
        &mut self,
        kind: EntityKind,
        args: ConstructionArgs,
        controller: Option<ControllerKind>,
    ) -> Result<&mut Entity, WorldError> {
        if self.entities.contains_key(&args.id) {
            return Err(WorldError::Duplicate(args.id));
        }

        if kind == EntityKind::Pillbox {
            let tile = self.tile_at(args.position)?;
            self.occupy(tile, args.id)?;
        }

        let mut entity = Entity::new(kind, args);
        entity.controller = controller;
        Ok(self.entities.entry(args.id).or_insert(entity))
    }

    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(&id)?;
        self.occupied.retain(|_, occupant| *occupant != id);
        if self.local_tank == Some(id) {
            self.local_tank = None;
        }
        Some(entity)
    }

    /// Drops every entity and resizes the map.
    pub fn reset(&mut self, columns: u16, rows: u16) {
        self.columns = columns;
        self.rows = rows;
        self.entities.clear();
        self.occupied.clear();
        self.local_tank = None;
    }

    pub fn set_local_tank(&mut self, id: EntityId) -> Result<(), WorldError> {
        self.get_kind_mut(id, EntityKind::Tank)?.controller = Some(ControllerKind::Local);
        self.local_tank = Some(id);
        Ok(())
    }

    pub fn local_tank(&self) -> Option<EntityId> {
        self.local_tank
    }

    pub fn is_local(&self, id: EntityId) -> bool {
        self.local_tank == Some(id)
    }

    pub fn set_owner(&mut self, id: EntityId, owner: Option<EntityId>) -> Result<bool, WorldError> {
        if let Some(owner) = owner {
            self.get_entity(owner)?;
        }
        Ok(self.get_entity_mut(id)?.set_owner(owner))
    }

    pub fn tile_at(&self, position: Vec2) -> Result<Tile, WorldError> {
        let column = (position.x / TILE_SIZE).floor() as i32;
        let row = (position.y / TILE_SIZE).floor() as i32;
        self.tile(column, row)
    }

    pub fn tile(&self, column: i32, row: i32) -> Result<Tile, WorldError> {
        if column < 0 || row < 0 || column >= self.columns as i32 || row >= self.rows as i32 {
            return Err(WorldError::OutOfBounds { column, row });
        }
        Ok(Tile {
            column: column as u16,
            row: row as u16,
        })
    }

    pub fn occupant(&self, tile: Tile) -> Option<EntityId> {
        self.occupied.get(&tile).copied()
    }

    fn occupy(&mut self, tile: Tile, id: EntityId) -> Result<(), WorldError> {
        match self.occupied.get(&tile) {
            Some(occupant) if *occupant != id => Err(WorldError::TileOccupied {
                column: tile.column,
                row: tile.row,
                occupant: *occupant,
            }),
            _ => {
                self.occupied.insert(tile, id);
                Ok(())
            }
        }
    }

    pub fn move_pillbox_off_tile_map(&mut self, id: EntityId) -> Result<(), WorldError> {
        self.get_kind_mut(id, EntityKind::Pillbox)?;
        self.occupied.retain(|_, occupant| *occupant != id);
        Ok(())
    }

    pub fn move_pillbox_onto_tile_map(
        &mut self,
        id: EntityId,
        column: i32,
        row: i32,
    ) -> Result<(), WorldError> {
        let tile = self.tile(column, row)?;
        self.get_kind_mut(id, EntityKind::Pillbox)?;
        self.occupied.retain(|_, occupant| *occupant != id);
        self.occupy(tile, id)?;
        self.get_entity_mut(id)?.position = tile.center();
        Ok(())
    }

    /// Applies a pillbox snapshot. Owner is applied before the build state so
    /// the snapshot's status is what remains.
    pub fn apply_pillbox_attributes(
        &mut self,
        id: EntityId,
        position: Vec2,
        status: BuildStatus,
        built_pct: f32,
        owner: Option<EntityId>,
    ) -> Result<(), WorldError> {
        self.get_kind_mut(id, EntityKind::Pillbox)?;
        if owner.is_some() {
            self.set_owner(id, owner)?;
        }

        let pillbox = self.get_entity_mut(id)?;
        pillbox.position = position;
        pillbox.update_pillbox(|state| state.apply_remote(status, built_pct));

        if status == BuildStatus::Carried {
            self.move_pillbox_off_tile_map(id)
        } else if !self.occupied.values().any(|occupant| *occupant == id) {
            let tile = self.tile_at(position)?;
            self.occupy(tile, id)
        } else {
            Ok(())
        }
    }

    pub fn push_event(&mut self, event: WorldEvent) {
        log::debug!("world event: {event:?}");
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn move_entity(
        &mut self,
        id: EntityId,
        position: Vec2,
        rotation: f32,
    ) -> Result<Command, WorldError> {
        let entity = self.get_entity_mut(id)?;
        entity.position = position;
        entity.rotation = rotation;
        Ok(WorldCommand::move_entity(entity).into())
    }

    pub fn change_owner(
        &mut self,
        id: EntityId,
        owner: Option<EntityId>,
    ) -> Result<Command, WorldError> {
        self.set_owner(id, owner)?;
        Ok(WorldCommand::change_owner(self.get_entity(id)?).into())
    }

    pub fn pack_pillbox(&mut self, id: EntityId, step: f32) -> Result<Command, WorldError> {
        let pillbox = self.get_kind_mut(id, EntityKind::Pillbox)?;
        let status = pillbox.update_pillbox(|state| state.pack_step(step));
        if status == Some(BuildStatus::Carried) {
            self.move_pillbox_off_tile_map(id)?;
        }
        self.pillbox_snapshot(id)
    }

    pub fn unpack_pillbox(
        &mut self,
        id: EntityId,
        column: i32,
        row: i32,
        step: f32,
    ) -> Result<Command, WorldError> {
        let carried = self
            .get_kind_mut(id, EntityKind::Pillbox)?
            .pillbox()
            .is_some_and(|state| state.is_carried());
        if carried {
            self.move_pillbox_onto_tile_map(id, column, row)?;
        }
        self.get_entity_mut(id)?
            .update_pillbox(|state| state.unpack_step(step));
        self.pillbox_snapshot(id)
    }

    fn pillbox_snapshot(&self, id: EntityId) -> Result<Command, WorldError> {
        let pillbox = self.get_entity(id)?;
        WorldCommand::update_pillbox(pillbox)
            .map(Command::from)
            .ok_or(WorldError::WrongKind {
                id,
                expected: EntityKind::Pillbox,
                actual: pillbox.kind,
            })
    }
}
