use std::net::IpAddr;

use treads::NetworkConfig;

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub name: String,
    pub network: NetworkConfig,
    pub countdown_secs: u32,
    pub advertise: bool,
    pub advertised_address: Option<IpAddr>,
    pub auto_start: Option<usize>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            name: String::from("Host"),
            network: NetworkConfig::default(),
            countdown_secs: 5,
            advertise: true,
            advertised_address: None,
            auto_start: None,
        }
    }
}
