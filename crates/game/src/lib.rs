pub mod command;
pub mod lobby;
pub mod map;
pub mod net;
pub mod sim;

pub use command::{
    Application, ApplicationCommand, Command, EntitySnapshot, ExecutionContext, MessageKind,
    TransportCommand, WorldCommand,
};
pub use lobby::{Lobby, LobbyPlayer, LobbyState};
pub use map::{MapObject, TestingGround};
pub use net::{
    AdvertFilter, Client, CommandInbox, Connection, ConnectionState, DEFAULT_DISCOVERY_PORT,
    DEFAULT_PORT, DiscoveryBeacon, DiscoveryListener, DiscoveryObserver, EventLog, Inbound,
    NetworkConfig, NetworkError, NetworkEvent, NetworkObserver, NetworkRole, NetworkStats,
    NetworkSystem, ObserverId, ObserverRegistry, Origin, PeerId, PeerInfo, PlayerColor,
    PlayerIdentity, Server, ServerAdvert, TICKS_PER_SECOND, tick_interval,
};
pub use sim::{
    BuildStatus, ConstructionArgs, ControllerKind, Entity, EntityFlags, EntityId, EntityKind,
    PillboxState, TankState, Tile, World, WorldError, WorldEvent,
};
