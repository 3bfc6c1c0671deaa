use rkyv::{Archive, Deserialize, Serialize};

use crate::net::PeerId;

/// Commands handled by the network system itself.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum TransportCommand {
    MapDownloadComplete { player_name: String },
    ConnectionLost { peer: PeerId },
}

impl TransportCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MapDownloadComplete { .. } => "MapDownloadComplete",
            Self::ConnectionLost { .. } => "ConnectionLost",
        }
    }
}
