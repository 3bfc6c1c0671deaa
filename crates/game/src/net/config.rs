use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::protocol::{DEFAULT_DISCOVERY_PORT, DEFAULT_PORT};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    pub nodelay: bool,
    pub connect_timeout: Duration,
    pub multicast_group: Ipv4Addr,
    pub discovery_port: u16,
    pub beacon_interval: Duration,
    pub listener_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            nodelay: true,
            connect_timeout: Duration::from_secs(5),
            multicast_group: Ipv4Addr::new(239, 255, 19, 14),
            discovery_port: DEFAULT_DISCOVERY_PORT,
            beacon_interval: Duration::from_secs(1),
            listener_timeout: Duration::from_millis(2500),
        }
    }
}

impl NetworkConfig {
    /// Loopback on an OS-assigned port.
    pub fn local() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            ..Self::default()
        }
    }
}
