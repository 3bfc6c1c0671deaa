use glam::Vec2;

use crate::sim::{EntityKind, Tile, World, WorldError};

use super::MapObject;

/// A small hand-built map: walled border, a river, a copse of trees and a
/// few neutral pillboxes and bases to fight over.
pub struct TestingGround {
    objects: Vec<MapObject>,
}

impl Default for TestingGround {
    fn default() -> Self {
        Self::new()
    }
}

impl TestingGround {
    pub const NAME: &'static str = "Testing Ground";
    pub const COLUMNS: u16 = 24;
    pub const ROWS: u16 = 16;

    const RIVER_COLUMN: u16 = 12;

    pub fn new() -> Self {
        let mut objects = Vec::new();

        Self::add_terrain(&mut objects);
        Self::add_walls(&mut objects);
        Self::add_trees(&mut objects);
        Self::add_structures(&mut objects);

        Self { objects }
    }

    fn add_terrain(objects: &mut Vec<MapObject>) {
        for row in 0..Self::ROWS {
            for column in 0..Self::COLUMNS {
                let kind = if column == Self::RIVER_COLUMN {
                    if row == Self::ROWS / 2 {
                        EntityKind::Road
                    } else {
                        EntityKind::Water
                    }
                } else {
                    EntityKind::Grass
                };
                objects.push(MapObject::at(kind, column, row));
            }
        }
    }

    fn add_walls(objects: &mut Vec<MapObject>) {
        for column in 0..Self::COLUMNS {
            objects.push(MapObject::at(EntityKind::Wall, column, 0));
            objects.push(MapObject::at(EntityKind::Wall, column, Self::ROWS - 1));
        }
        for row in 1..Self::ROWS - 1 {
            objects.push(MapObject::at(EntityKind::Wall, 0, row));
            objects.push(MapObject::at(EntityKind::Wall, Self::COLUMNS - 1, row));
        }
    }

    fn add_trees(objects: &mut Vec<MapObject>) {
        for (column, row) in [(4, 3), (5, 3), (4, 4), (18, 11), (19, 11), (19, 12)] {
            objects.push(MapObject::at(EntityKind::Tree, column, row));
        }
    }

    fn add_structures(objects: &mut Vec<MapObject>) {
        for (column, row) in [(6, 6), (6, 9), (17, 6), (17, 9)] {
            objects.push(MapObject::at(EntityKind::Pillbox, column, row));
        }
        objects.push(MapObject::at(EntityKind::Base, 3, 8));
        objects.push(MapObject::at(EntityKind::Base, 20, 8));
        objects.push(MapObject::at(EntityKind::Mine, 10, 8));
    }

    pub fn objects(&self) -> &[MapObject] {
        &self.objects
    }

    pub fn build(&self) -> Result<World, WorldError> {
        let mut world = World::new(Self::COLUMNS, Self::ROWS);
        for object in &self.objects {
            world.add_entity(object.kind, object.args(), None)?;
        }
        Ok(world)
    }

    /// Tank spawn for the `index`-th player, alternating sides of the river.
    pub fn spawn_point(index: usize) -> Vec2 {
        let row = 2 + (index / 2 % (Self::ROWS as usize - 4)) as u16;
        let column = if index % 2 == 0 { 2 } else { Self::COLUMNS - 3 };
        Tile { column, row }.center()
    }
}
