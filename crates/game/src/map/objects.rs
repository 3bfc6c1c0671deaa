use crate::sim::{ConstructionArgs, EntityId, EntityKind, Tile};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapObject {
    pub kind: EntityKind,
    pub tile: Tile,
    pub rotation: f32,
}

impl MapObject {
    pub fn at(kind: EntityKind, column: u16, row: u16) -> Self {
        Self {
            kind,
            tile: Tile { column, row },
            rotation: 0.0,
        }
    }

    /// Fresh construction arguments centered on the object's tile.
    pub fn args(&self) -> ConstructionArgs {
        let center = self.tile.center();
        ConstructionArgs::new(EntityId::random(), center.x, center.y, self.rotation)
    }
}
