mod client;
mod config;
mod connection;
mod discovery;
mod error;
mod framing;
mod identity;
mod inbox;
mod observer;
pub(crate) mod protocol;
mod role;
mod server;
mod stats;
mod system;

pub use client::Client;
pub use config::NetworkConfig;
pub use connection::{Connection, ConnectionState, Frame};
pub use discovery::{
    ADVERT_DELIMITER, AdvertFilter, DiscoveryBeacon, DiscoveryListener, DiscoveryObserver,
    MAX_ADVERT_SIZE, ServerAdvert,
};
pub use error::NetworkError;
pub use framing::{MAX_FRAME_SIZE, read_frame, write_frame};
pub use identity::{PeerId, PlayerColor, PlayerIdentity};
pub use inbox::{CommandInbox, Inbound, Origin};
pub use observer::{EventLog, NetworkEvent, NetworkObserver, ObserverId, ObserverRegistry};
pub use protocol::{DEFAULT_DISCOVERY_PORT, DEFAULT_PORT, TICKS_PER_SECOND, tick_interval};
pub use role::NetworkRole;
pub use server::{PeerInfo, Server};
pub use stats::{ConnectionStats, NetworkStats};
pub use system::NetworkSystem;
