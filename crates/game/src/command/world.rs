use glam::Vec2;
use rkyv::{Archive, Deserialize, Serialize};

use crate::net::{PlayerColor, PlayerIdentity};
use crate::sim::{
    BuildStatus, ConstructionArgs, ControllerKind, Entity, EntityFlags, EntityId, EntityKind,
    World, WorldError, WorldEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct EntitySnapshot {
    pub kind: EntityKind,
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub owner: Option<EntityId>,
}

impl EntitySnapshot {
    pub fn of(entity: &Entity) -> Self {
        Self {
            kind: entity.kind,
            id: entity.id,
            x: entity.position.x,
            y: entity.position.y,
            rotation: entity.rotation,
            owner: entity.owner(),
        }
    }

    fn args(&self) -> ConstructionArgs {
        ConstructionArgs::new(self.id, self.x, self.y, self.rotation)
    }
}

/// Commands that mutate the simulation. Each one is self-contained so it
/// can be applied in isolation on any machine.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum WorldCommand {
    CreateEntity {
        kind: EntityKind,
        id: EntityId,
        x: f32,
        y: f32,
        rotation: f32,
    },
    CreateActor {
        kind: EntityKind,
        id: EntityId,
        x: f32,
        y: f32,
        rotation: f32,
        owner: EntityId,
    },
    CreateTank {
        id: EntityId,
        x: f32,
        y: f32,
        rotation: f32,
        player_name: String,
        color: PlayerColor,
    },
    CreateBullet {
        id: EntityId,
        x: f32,
        y: f32,
        rotation: f32,
        parent: EntityId,
    },
    DestroyEntity {
        id: EntityId,
    },
    MoveEntity {
        id: EntityId,
        x: f32,
        y: f32,
        rotation: f32,
    },
    MoveTank {
        id: EntityId,
        speed: f32,
        x: f32,
        y: f32,
        rotation: f32,
    },
    UpdateTankAttributes {
        id: EntityId,
        speed: f32,
        x: f32,
        y: f32,
        rotation: f32,
        hit_points: f32,
        drowned: bool,
    },
    ChangeOwner {
        id: EntityId,
        owner: Option<EntityId>,
    },
    ActorEntityCaptured {
        id: EntityId,
        owner: EntityId,
    },
    UpdatePillboxAttributes {
        id: EntityId,
        x: f32,
        y: f32,
        built_pct: f32,
        status: BuildStatus,
        owner: Option<EntityId>,
    },
    MovePillboxOffTileMap {
        id: EntityId,
    },
    MovePillboxOntoTileMap {
        id: EntityId,
        column: i32,
        row: i32,
    },
    TankDeath {
        tank: EntityId,
        killer: EntityKind,
        killer_name: Option<String>,
    },
    RequestAlliance {
        target: EntityId,
        requester: EntityId,
    },
    AcceptAllianceRequest {
        requester: EntityId,
        accepter: EntityId,
    },
    RejectAllianceRequest {
        requester: EntityId,
        rejecter: EntityId,
    },
    EndAlliance {
        ender: EntityId,
        ally: EntityId,
    },
    SendMap {
        columns: u16,
        rows: u16,
        entities: Vec<EntitySnapshot>,
    },
}

impl WorldCommand {
    pub fn create_entity(entity: &Entity) -> Self {
        Self::CreateEntity {
            kind: entity.kind,
            id: entity.id,
            x: entity.position.x,
            y: entity.position.y,
            rotation: entity.rotation,
        }
    }

    /// Builds the creation command for a tank controlled by `player`.
    pub fn create_tank(entity: &Entity, player: &PlayerIdentity) -> Self {
        Self::CreateTank {
            id: entity.id,
            x: entity.position.x,
            y: entity.position.y,
            rotation: entity.rotation,
            player_name: player.name.clone(),
            color: player.color,
        }
    }

    pub fn move_entity(entity: &Entity) -> Self {
        Self::MoveEntity {
            id: entity.id,
            x: entity.position.x,
            y: entity.position.y,
            rotation: entity.rotation,
        }
    }

    pub fn update_tank(entity: &Entity) -> Option<Self> {
        let tank = entity.tank()?;
        Some(Self::UpdateTankAttributes {
            id: entity.id,
            speed: tank.speed,
            x: entity.position.x,
            y: entity.position.y,
            rotation: entity.rotation,
            hit_points: entity.hit_points,
            drowned: entity.is_drowned(),
        })
    }

    pub fn update_pillbox(entity: &Entity) -> Option<Self> {
        let pillbox = entity.pillbox()?;
        Some(Self::UpdatePillboxAttributes {
            id: entity.id,
            x: entity.position.x,
            y: entity.position.y,
            built_pct: pillbox.built_pct(),
            status: pillbox.status(),
            owner: entity.owner(),
        })
    }

    pub fn change_owner(entity: &Entity) -> Self {
        Self::ChangeOwner {
            id: entity.id,
            owner: entity.owner(),
        }
    }

    pub fn send_map(world: &World) -> Self {
        Self::SendMap {
            columns: world.columns(),
            rows: world.rows(),
            entities: world.entities().map(EntitySnapshot::of).collect(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateEntity { .. } => "CreateEntity",
            Self::CreateActor { .. } => "CreateActor",
            Self::CreateTank { .. } => "CreateTank",
            Self::CreateBullet { .. } => "CreateBullet",
            Self::DestroyEntity { .. } => "DestroyEntity",
            Self::MoveEntity { .. } => "MoveEntity",
            Self::MoveTank { .. } => "MoveTank",
            Self::UpdateTankAttributes { .. } => "UpdateTankAttributes",
            Self::ChangeOwner { .. } => "ChangeOwner",
            Self::ActorEntityCaptured { .. } => "ActorEntityCaptured",
            Self::UpdatePillboxAttributes { .. } => "UpdatePillboxAttributes",
            Self::MovePillboxOffTileMap { .. } => "MovePillboxOffTileMap",
            Self::MovePillboxOntoTileMap { .. } => "MovePillboxOntoTileMap",
            Self::TankDeath { .. } => "TankDeath",
            Self::RequestAlliance { .. } => "RequestAlliance",
            Self::AcceptAllianceRequest { .. } => "AcceptAllianceRequest",
            Self::RejectAllianceRequest { .. } => "RejectAllianceRequest",
            Self::EndAlliance { .. } => "EndAlliance",
            Self::SendMap { .. } => "SendMap",
        }
    }

    /// The entity the command is about, if it names exactly one.
    pub fn target(&self) -> Option<EntityId> {
        match self {
            Self::CreateEntity { id, .. }
            | Self::CreateActor { id, .. }
            | Self::CreateTank { id, .. }
            | Self::CreateBullet { id, .. }
            | Self::DestroyEntity { id }
            | Self::MoveEntity { id, .. }
            | Self::MoveTank { id, .. }
            | Self::UpdateTankAttributes { id, .. }
            | Self::ChangeOwner { id, .. }
            | Self::ActorEntityCaptured { id, .. }
            | Self::UpdatePillboxAttributes { id, .. }
            | Self::MovePillboxOffTileMap { id }
            | Self::MovePillboxOntoTileMap { id, .. } => Some(*id),
            Self::TankDeath { tank, .. } => Some(*tank),
            Self::RequestAlliance { target, .. } => Some(*target),
            Self::AcceptAllianceRequest { requester, .. }
            | Self::RejectAllianceRequest { requester, .. } => Some(*requester),
            Self::EndAlliance { ally, .. } => Some(*ally),
            Self::SendMap { .. } => None,
        }
    }

    /// Applies the command. Commands naming entities this world does not know
    /// about are logged and dropped.
    pub fn execute(self, world: &mut World) {
        let name = self.name();
        if let Err(e) = self.apply(world) {
            log::warn!("{name} dropped: {e}");
        }
    }

    fn apply(self, world: &mut World) -> Result<(), WorldError> {
        match self {
            Self::CreateEntity {
                kind,
                id,
                x,
                y,
                rotation,
            } => {
                world.add_entity(kind, ConstructionArgs::new(id, x, y, rotation), None)?;
            }
            Self::CreateActor {
                kind,
                id,
                x,
                y,
                rotation,
                owner,
            } => {
                world.add_entity(kind, ConstructionArgs::new(id, x, y, rotation), None)?;
                world.set_owner(id, Some(owner))?;
            }
            Self::CreateTank {
                id,
                x,
                y,
                rotation,
                player_name,
                color,
            } => {
                let args = ConstructionArgs::new(id, x, y, rotation);
                world.add_entity(EntityKind::Tank, args, Some(ControllerKind::Network))?;
                world.tank_mut(id)?.player = Some(PlayerIdentity::new(player_name, color));
            }
            Self::CreateBullet {
                id,
                x,
                y,
                rotation,
                parent,
            } => {
                let args = ConstructionArgs::new(id, x, y, rotation);
                world.add_entity(EntityKind::Bullet, args, Some(ControllerKind::Network))?;
                world.set_owner(id, Some(parent))?;
            }
            Self::DestroyEntity { id } => {
                if world.remove_entity(id).is_none() {
                    log::debug!("DestroyEntity: {id} already gone");
                }
            }
            Self::MoveEntity { id, x, y, rotation } => {
                let entity = world.get_entity_mut(id)?;
                entity.position = Vec2::new(x, y);
                entity.rotation = rotation;
            }
            Self::MoveTank {
                id,
                speed,
                x,
                y,
                rotation,
            } => {
                world.tank_mut(id)?.speed = speed;
                let tank = world.get_entity_mut(id)?;
                tank.position = Vec2::new(x, y);
                tank.rotation = rotation;
            }
            Self::UpdateTankAttributes {
                id,
                speed,
                x,
                y,
                rotation,
                hit_points,
                drowned,
            } => {
                world.tank_mut(id)?.speed = speed;
                let tank = world.get_entity_mut(id)?;
                tank.position = Vec2::new(x, y);
                tank.rotation = rotation;
                tank.hit_points = hit_points;
                tank.flags.set(EntityFlags::DROWNED, drowned);
            }
            Self::ChangeOwner { id, owner } => {
                world.set_owner(id, owner)?;
            }
            Self::ActorEntityCaptured { id, owner } => {
                if world.set_owner(id, Some(owner))? {
                    world.push_event(WorldEvent::EntityCaptured { entity: id, owner });
                }
            }
            Self::UpdatePillboxAttributes {
                id,
                x,
                y,
                built_pct,
                status,
                owner,
            } => {
                world.apply_pillbox_attributes(id, Vec2::new(x, y), status, built_pct, owner)?;
            }
            Self::MovePillboxOffTileMap { id } => world.move_pillbox_off_tile_map(id)?,
            Self::MovePillboxOntoTileMap { id, column, row } => {
                world.move_pillbox_onto_tile_map(id, column, row)?
            }
            Self::TankDeath {
                tank,
                killer,
                killer_name,
            } => {
                if world.is_local(tank) {
                    log::warn!("TankDeath for the local tank {tank} ignored");
                    return Ok(());
                }
                world.tank(tank)?;
                let entity = world.get_entity_mut(tank)?;
                entity.hit_points = 0.0;
                entity.flags.insert(EntityFlags::DEAD);
                world.push_event(WorldEvent::TankKilled {
                    tank,
                    killer,
                    killer_name,
                });
            }
            Self::RequestAlliance { target, requester } => {
                if !world.is_local(target) {
                    return Ok(());
                }
                let requester_name = player_name(world, requester)?;
                if world.tank_mut(target)?.add_request(requester) {
                    world.push_event(WorldEvent::AllianceRequested {
                        requester,
                        requester_name,
                    });
                }
            }
            Self::AcceptAllianceRequest {
                requester,
                accepter,
            } => {
                let accepter_name = player_name(world, accepter)?;
                world.tank(requester)?;
                let accepting = world.tank_mut(accepter)?;
                accepting.remove_request(requester);
                accepting.add_ally(requester);
                world.tank_mut(requester)?.add_ally(accepter);
                if world.is_local(requester) {
                    world.push_event(WorldEvent::AllianceAccepted {
                        requester,
                        accepter_name,
                    });
                }
            }
            Self::RejectAllianceRequest {
                requester,
                rejecter,
            } => {
                if !world.is_local(requester) {
                    return Ok(());
                }
                let rejecter_name = player_name(world, rejecter)?;
                world.push_event(WorldEvent::AllianceRejected { rejecter_name });
            }
            Self::EndAlliance { ender, ally } => {
                let ended_by = player_name(world, ender)?;
                world.tank(ally)?;
                world.tank_mut(ender)?.remove_ally(ally);
                world.tank_mut(ally)?.remove_ally(ender);
                if world.is_local(ally) {
                    world.push_event(WorldEvent::AllianceEnded { ended_by });
                }
            }
            Self::SendMap {
                columns,
                rows,
                entities,
            } => load_map(world, columns, rows, &entities),
        }
        Ok(())
    }
}

fn player_name(world: &World, tank: EntityId) -> Result<String, WorldError> {
    Ok(world
        .tank(tank)?
        .player
        .as_ref()
        .map(|player| player.name.clone())
        .unwrap_or_else(|| "Unknown player".to_string()))
}

fn load_map(world: &mut World, columns: u16, rows: u16, entities: &[EntitySnapshot]) {
    world.reset(columns, rows);

    for snapshot in entities {
        if let Err(e) = world.add_entity(snapshot.kind, snapshot.args(), None) {
            log::warn!("SendMap: skipping {} {}: {e}", snapshot.kind, snapshot.id);
        }
    }
    // Owners may appear later in the list than what they own.
    for snapshot in entities {
        if let Some(owner) = snapshot.owner
            && let Err(e) = world.set_owner(snapshot.id, Some(owner))
        {
            log::warn!("SendMap: owner of {} not applied: {e}", snapshot.id);
        }
    }

    world.push_event(WorldEvent::MapLoaded {
        columns,
        rows,
        entities: world.entity_count(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tank_command(id: EntityId, name: &str) -> WorldCommand {
        WorldCommand::CreateTank {
            id,
            x: 10.0,
            y: 20.0,
            rotation: 0.0,
            player_name: name.to_string(),
            color: PlayerColor::Blue,
        }
    }

    #[test]
    fn create_tank_registers_player() {
        let mut world = World::new(8, 8);
        let id = EntityId::random();
        tank_command(id, "Alice").execute(&mut world);

        let tank = world.get_entity(id).unwrap();
        assert_eq!(tank.kind, EntityKind::Tank);
        assert_eq!(tank.position, Vec2::new(10.0, 20.0));
        assert_eq!(tank.controller, Some(ControllerKind::Network));
        assert_eq!(tank.player_name(), Some("Alice"));
    }

    #[test]
    fn unknown_targets_are_dropped() {
        let mut world = World::new(8, 8);
        let ghost = EntityId::random();

        WorldCommand::MoveEntity {
            id: ghost,
            x: 1.0,
            y: 2.0,
            rotation: 0.0,
        }
        .execute(&mut world);
        WorldCommand::ChangeOwner {
            id: ghost,
            owner: None,
        }
        .execute(&mut world);
        WorldCommand::DestroyEntity { id: ghost }.execute(&mut world);

        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn change_owner_is_idempotent() {
        let mut world = World::new(8, 8);
        let tank = EntityId::random();
        tank_command(tank, "Alice").execute(&mut world);
        let base = EntityId::random();
        WorldCommand::CreateEntity {
            kind: EntityKind::Base,
            id: base,
            x: 64.0,
            y: 64.0,
            rotation: 0.0,
        }
        .execute(&mut world);

        let command = WorldCommand::ChangeOwner {
            id: base,
            owner: Some(tank),
        };
        command.clone().execute(&mut world);
        let once = world.get_entity(base).unwrap().owner();
        command.execute(&mut world);
        assert_eq!(world.get_entity(base).unwrap().owner(), once);
        assert_eq!(once, Some(tank));
    }

    #[test]
    fn tank_death_ignored_for_local_tank() {
        let mut world = World::new(8, 8);
        let tank = EntityId::random();
        tank_command(tank, "Alice").execute(&mut world);
        world.set_local_tank(tank).unwrap();

        WorldCommand::TankDeath {
            tank,
            killer: EntityKind::Pillbox,
            killer_name: None,
        }
        .execute(&mut world);

        assert!(!world.get_entity(tank).unwrap().is_dead());
        assert!(world.drain_events().is_empty());
    }

    #[test]
    fn alliance_request_only_reaches_target() {
        let mut world = World::new(8, 8);
        let alice = EntityId::random();
        let bob = EntityId::random();
        tank_command(alice, "Alice").execute(&mut world);
        tank_command(bob, "Bob").execute(&mut world);

        let request = WorldCommand::RequestAlliance {
            target: bob,
            requester: alice,
        };
        request.clone().execute(&mut world);
        assert!(world.tank(bob).unwrap().pending_requests().is_empty());

        world.set_local_tank(bob).unwrap();
        request.execute(&mut world);
        assert_eq!(world.tank(bob).unwrap().pending_requests(), &[alice]);
        assert_eq!(
            world.drain_events(),
            vec![WorldEvent::AllianceRequested {
                requester: alice,
                requester_name: "Alice".to_string(),
            }]
        );

        WorldCommand::AcceptAllianceRequest {
            requester: alice,
            accepter: bob,
        }
        .execute(&mut world);
        assert!(world.tank(alice).unwrap().is_allied_with(bob));
        assert!(world.tank(bob).unwrap().is_allied_with(alice));
        assert!(world.tank(bob).unwrap().pending_requests().is_empty());
    }

    #[test]
    fn send_map_replaces_world() {
        let mut source = World::new(4, 3);
        let tank = EntityId::random();
        let base = EntityId::random();
        source
            .add_entity(EntityKind::Tank, ConstructionArgs::new(tank, 5.0, 5.0, 0.0), None)
            .unwrap();
        source
            .add_entity(EntityKind::Base, ConstructionArgs::new(base, 70.0, 40.0, 0.0), None)
            .unwrap();
        source.set_owner(base, Some(tank)).unwrap();
        source
            .add_entity(
                EntityKind::Pillbox,
                ConstructionArgs::new(EntityId::random(), 40.0, 40.0, 0.0),
                None,
            )
            .unwrap();

        let mut target = World::new(1, 1);
        WorldCommand::CreateEntity {
            kind: EntityKind::Tree,
            id: EntityId::random(),
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
        }
        .execute(&mut target);

        WorldCommand::send_map(&source).execute(&mut target);

        assert_eq!((target.columns(), target.rows()), (4, 3));
        assert_eq!(target.entity_count(), 3);
        assert_eq!(target.get_entity(base).unwrap().owner(), Some(tank));
        assert_eq!(
            target.drain_events(),
            vec![WorldEvent::MapLoaded {
                columns: 4,
                rows: 3,
                entities: 3,
            }]
        );
    }

    #[test]
    fn pillbox_snapshot_keeps_status_after_capture() {
        let mut world = World::new(8, 8);
        let tank = EntityId::random();
        tank_command(tank, "Alice").execute(&mut world);
        let pillbox = EntityId::random();
        WorldCommand::CreateEntity {
            kind: EntityKind::Pillbox,
            id: pillbox,
            x: 48.0,
            y: 48.0,
            rotation: 0.0,
        }
        .execute(&mut world);

        WorldCommand::UpdatePillboxAttributes {
            id: pillbox,
            x: 48.0,
            y: 48.0,
            built_pct: 0.0,
            status: BuildStatus::Carried,
            owner: Some(tank),
        }
        .execute(&mut world);

        let entity = world.get_entity(pillbox).unwrap();
        assert_eq!(entity.owner(), Some(tank));
        assert_eq!(entity.pillbox().unwrap().status(), BuildStatus::Carried);
        assert!(!entity.is_solid());
        assert_eq!(world.occupant(world.tile(1, 1).unwrap()), None);
    }
}
