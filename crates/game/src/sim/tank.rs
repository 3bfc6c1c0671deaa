use std::collections::BTreeSet;

use crate::net::PlayerIdentity;

use super::entity::EntityId;

#[derive(Debug, Clone, Default)]
pub struct TankState {
    pub player: Option<PlayerIdentity>,
    pub speed: f32,
    allies: BTreeSet<EntityId>,
    alliance_requests: Vec<EntityId>,
}

impl TankState {
    pub fn allies(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.allies.iter().copied()
    }

    pub fn is_allied_with(&self, tank: EntityId) -> bool {
        self.allies.contains(&tank)
    }

    pub fn add_ally(&mut self, tank: EntityId) -> bool {
        self.allies.insert(tank)
    }

    pub fn remove_ally(&mut self, tank: EntityId) -> bool {
        self.allies.remove(&tank)
    }

    pub fn pending_requests(&self) -> &[EntityId] {
        &self.alliance_requests
    }

    pub fn add_request(&mut self, requester: EntityId) -> bool {
        if self.alliance_requests.contains(&requester) || self.allies.contains(&requester) {
            return false;
        }
        self.alliance_requests.push(requester);
        true
    }

    pub fn remove_request(&mut self, requester: EntityId) -> bool {
        let before = self.alliance_requests.len();
        self.alliance_requests.retain(|id| *id != requester);
        before != self.alliance_requests.len()
    }
}
