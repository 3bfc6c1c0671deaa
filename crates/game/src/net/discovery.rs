use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddrV4, UdpSocket};
use std::str;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};

use super::{NetworkConfig, NetworkError};

pub const ADVERT_DELIMITER: &str = "|~|";
pub const MAX_ADVERT_SIZE: usize = 256;

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What a hosting server announces on the LAN.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerAdvert {
    pub address: IpAddr,
    pub server_name: String,
    pub map_name: String,
}

impl ServerAdvert {
    pub fn new(address: IpAddr, server_name: &str, map_name: &str) -> Self {
        Self {
            address,
            server_name: server_name.to_string(),
            map_name: map_name.to_string(),
        }
    }

    /// `address|~|server|~|map` as UTF-8, rejected when a field contains the
    /// delimiter or the result does not fit one datagram.
    pub fn encode(&self) -> Result<Vec<u8>, NetworkError> {
        for field in [&self.server_name, &self.map_name] {
            if field.contains(ADVERT_DELIMITER) {
                return Err(NetworkError::InvalidAdvert(format!(
                    "'{field}' contains the delimiter {ADVERT_DELIMITER}"
                )));
            }
        }
        let text = [self.address.to_string(), self.server_name.clone(), self.map_name.clone()]
            .join(ADVERT_DELIMITER);
        if text.len() > MAX_ADVERT_SIZE {
            return Err(NetworkError::InvalidAdvert(format!(
                "{} bytes exceeds the {MAX_ADVERT_SIZE} byte limit",
                text.len()
            )));
        }
        Ok(text.into_bytes())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, NetworkError> {
        let text = str::from_utf8(bytes).map_err(|e| NetworkError::InvalidAdvert(e.to_string()))?;
        let fields: Vec<&str> = text.split(ADVERT_DELIMITER).collect();
        let [address, server_name, map_name] = fields.as_slice() else {
            return Err(NetworkError::InvalidAdvert(format!(
                "expected 3 fields, got {}",
                fields.len()
            )));
        };
        let address = address
            .parse()
            .map_err(|e| NetworkError::InvalidAdvert(format!("bad address '{address}': {e}")))?;
        Ok(Self::new(address, server_name, map_name))
    }
}

pub trait DiscoveryObserver: Send + 'static {
    fn on_server_found(&mut self, advert: ServerAdvert);
}

impl<F> DiscoveryObserver for F
where
    F: FnMut(ServerAdvert) + Send + 'static,
{
    fn on_server_found(&mut self, advert: ServerAdvert) {
        self(advert)
    }
}

/// Suppresses repeats: a source is reported again only when its advert
/// changes.
#[derive(Debug, Default)]
pub struct AdvertFilter {
    seen: HashMap<IpAddr, Vec<u8>>,
}

impl AdvertFilter {
    pub fn is_new(&mut self, source: IpAddr, payload: &[u8]) -> bool {
        if self.seen.get(&source).is_some_and(|known| known == payload) {
            return false;
        }
        self.seen.insert(source, payload.to_vec());
        true
    }
}

/// Broadcasts a server advert to the discovery group until stopped.
#[derive(Debug)]
pub struct DiscoveryBeacon {
    keep_running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DiscoveryBeacon {
    pub fn start(advert: &ServerAdvert, config: &NetworkConfig) -> Result<Self, NetworkError> {
        let payload = advert.encode()?;
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.set_multicast_ttl_v4(1)?;
        let target = SocketAddrV4::new(config.multicast_group, config.discovery_port);
        let interval = config.beacon_interval;

        let keep_running = Arc::new(AtomicBool::new(true));
        let thread = thread::Builder::new().name("beacon".into()).spawn({
            let keep_running = Arc::clone(&keep_running);
            move || {
                while keep_running.load(Ordering::SeqCst) {
                    if let Err(e) = socket.send_to(&payload, target) {
                        log::debug!("beacon send to {target} failed: {e}");
                    }
                    let next = Instant::now() + interval;
                    while keep_running.load(Ordering::SeqCst) && Instant::now() < next {
                        thread::sleep(STOP_POLL_INTERVAL.min(interval));
                    }
                }
            }
        })?;

        log::info!(
            "advertising '{}' on {target} every {interval:?}",
            advert.server_name
        );

        Ok(Self {
            keep_running,
            thread: Some(thread),
        })
    }

    pub fn stop(&mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take()
            && handle.join().is_err()
        {
            log::error!("beacon thread panicked");
        }
    }
}

impl Drop for DiscoveryBeacon {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Listens for server adverts on the discovery group and reports each
/// distinct one to an observer on a background thread.
#[derive(Debug)]
pub struct DiscoveryListener {
    keep_running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DiscoveryListener {
    pub fn start(
        interface: Ipv4Addr,
        config: &NetworkConfig,
        mut observer: impl DiscoveryObserver,
    ) -> Result<Self, NetworkError> {
        let socket = bind_multicast(config.multicast_group, config.discovery_port, interface)?;
        socket.set_read_timeout(Some(config.listener_timeout))?;

        let keep_running = Arc::new(AtomicBool::new(true));
        let thread = thread::Builder::new().name("discovery".into()).spawn({
            let keep_running = Arc::clone(&keep_running);
            move || {
                let mut filter = AdvertFilter::default();
                let mut buf = [0u8; MAX_ADVERT_SIZE];
                while keep_running.load(Ordering::SeqCst) {
                    let (len, source) = match socket.recv_from(&mut buf) {
                        Ok(received) => received,
                        Err(e)
                            if matches!(
                                e.kind(),
                                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                            ) =>
                        {
                            continue;
                        }
                        Err(e) => {
                            log::warn!("discovery receive failed: {e}");
                            break;
                        }
                    };
                    let payload = &buf[..len];
                    if !filter.is_new(source.ip(), payload) {
                        continue;
                    }
                    match ServerAdvert::decode(payload) {
                        Ok(advert) => {
                            log::debug!(
                                "found server '{}' at {}",
                                advert.server_name,
                                advert.address
                            );
                            observer.on_server_found(advert);
                        }
                        Err(e) => log::debug!("ignoring datagram from {source}: {e}"),
                    }
                }
            }
        })?;

        Ok(Self {
            keep_running,
            thread: Some(thread),
        })
    }

    /// Asks the listener to stop. A receive already in progress runs until
    /// its timeout.
    pub fn shut_down(&self) {
        self.keep_running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for DiscoveryListener {
    fn drop(&mut self) {
        self.shut_down();
    }
}

fn bind_multicast(group: Ipv4Addr, port: u16, interface: Ipv4Addr) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    socket.set_reuse_port(true)?;
    socket.bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port).into())?;
    socket.join_multicast_v4(&group, &interface)?;
    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn advert() -> ServerAdvert {
        ServerAdvert::new("192.168.1.20".parse().unwrap(), "Host", "Testing Ground")
    }

    #[test]
    fn advert_wire_format() {
        let bytes = advert().encode().unwrap();
        assert_eq!(bytes, b"192.168.1.20|~|Host|~|Testing Ground");
        assert_eq!(ServerAdvert::decode(&bytes).unwrap(), advert());
    }

    #[test]
    fn delimiter_in_name_is_rejected() {
        let mut advert = advert();
        advert.server_name = "a|~|b".to_string();
        assert!(matches!(advert.encode(), Err(NetworkError::InvalidAdvert(_))));
    }

    #[test]
    fn oversized_advert_is_rejected() {
        let mut advert = advert();
        advert.map_name = "m".repeat(MAX_ADVERT_SIZE);
        assert!(matches!(advert.encode(), Err(NetworkError::InvalidAdvert(_))));
    }

    #[test]
    fn malformed_adverts() {
        assert!(ServerAdvert::decode(b"10.0.0.1|~|only-two").is_err());
        assert!(ServerAdvert::decode(b"not-an-ip|~|a|~|b").is_err());
        assert!(ServerAdvert::decode(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn filter_reports_changes_only() {
        let mut filter = AdvertFilter::default();
        let source: IpAddr = "10.0.0.7".parse().unwrap();
        let other: IpAddr = "10.0.0.8".parse().unwrap();

        assert!(filter.is_new(source, b"a"));
        assert!(!filter.is_new(source, b"a"));
        assert!(filter.is_new(other, b"a"));
        assert!(filter.is_new(source, b"b"));
    }

    #[test]
    #[ignore = "needs a multicast-capable interface"]
    fn beacon_reaches_listener() {
        let config = NetworkConfig {
            discovery_port: 19115,
            beacon_interval: Duration::from_millis(100),
            ..NetworkConfig::default()
        };
        let (tx, rx) = mpsc::channel();
        let found_server = move |advert: ServerAdvert| {
            let _ = tx.send(advert);
        };
        let listener =
            DiscoveryListener::start(Ipv4Addr::UNSPECIFIED, &config, found_server).unwrap();
        let _beacon = DiscoveryBeacon::start(&advert(), &config).unwrap();

        let found = rx.recv_timeout(Duration::from_secs(3)).unwrap();
        assert_eq!(found, advert());
        listener.shut_down();
    }
}
