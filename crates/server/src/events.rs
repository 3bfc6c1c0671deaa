use treads::{NetworkEvent, WorldEvent};

#[derive(Debug, Clone)]
pub enum HostEvent {
    PlayerJoined { name: String },
    PlayerLeft { name: String },
    PlayerReady { name: String },
    Chat { text: String },
    GameStarting { seconds: u32 },
    World { summary: String },
    Error { message: String },
}

impl HostEvent {
    pub fn is_error(&self) -> bool {
        matches!(self, HostEvent::Error { .. })
    }

    pub fn describe(&self) -> String {
        match self {
            HostEvent::PlayerJoined { name } => format!("{name} joined"),
            HostEvent::PlayerLeft { name } => format!("{name} left"),
            HostEvent::PlayerReady { name } => format!("{name} has the map"),
            HostEvent::Chat { text } => text.clone(),
            HostEvent::GameStarting { seconds } => format!("Game starts in {seconds}s"),
            HostEvent::World { summary } => summary.clone(),
            HostEvent::Error { message } => message.clone(),
        }
    }
}

impl From<NetworkEvent> for HostEvent {
    fn from(event: NetworkEvent) -> Self {
        match event {
            NetworkEvent::Connected { client_name, .. }
            | NetworkEvent::ClientConnected(client_name) => {
                HostEvent::PlayerJoined { name: client_name }
            }
            NetworkEvent::ClientDisconnected(name) => HostEvent::PlayerLeft { name },
            NetworkEvent::ClientReady(name) => HostEvent::PlayerReady { name },
            NetworkEvent::GameStart(seconds) => HostEvent::GameStarting { seconds },
            NetworkEvent::Message { text, .. } => HostEvent::Chat { text },
        }
    }
}

impl From<WorldEvent> for HostEvent {
    fn from(event: WorldEvent) -> Self {
        let summary = match event {
            WorldEvent::MapLoaded {
                columns,
                rows,
                entities,
            } => format!("Map loaded: {columns}x{rows}, {entities} entities"),
            WorldEvent::EntityCaptured { entity, owner } => format!("{entity} captured by {owner}"),
            WorldEvent::TankKilled {
                tank, killer_name, ..
            } => match killer_name {
                Some(killer) => format!("Tank {tank} destroyed by {killer}"),
                None => format!("Tank {tank} destroyed"),
            },
            WorldEvent::AllianceRequested { requester_name, .. } => {
                format!("{requester_name} requests an alliance")
            }
            WorldEvent::AllianceAccepted { accepter_name, .. } => {
                format!("{accepter_name} accepted the alliance")
            }
            WorldEvent::AllianceRejected { rejecter_name } => {
                format!("{rejecter_name} rejected the alliance")
            }
            WorldEvent::AllianceEnded { ended_by } => format!("{ended_by} ended the alliance"),
        };
        HostEvent::World { summary }
    }
}
