use std::net::Ipv4Addr;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use treads::{DiscoveryListener, NetworkConfig, ServerAdvert};

/// Listens for LAN games until `wait` runs out and returns everything heard.
pub fn find_servers(
    interface: Ipv4Addr,
    config: &NetworkConfig,
    wait: Duration,
) -> anyhow::Result<Vec<ServerAdvert>> {
    let (tx, rx) = mpsc::channel();
    let listener = DiscoveryListener::start(interface, config, move |advert: ServerAdvert| {
        let _ = tx.send(advert);
    })?;

    let deadline = Instant::now() + wait;
    let mut found: Vec<ServerAdvert> = Vec::new();
    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        match rx.recv_timeout(left) {
            Ok(advert) => {
                log::info!(
                    "found '{}' at {} playing {}",
                    advert.server_name,
                    advert.address,
                    advert.map_name
                );
                found.retain(|known| known.address != advert.address);
                found.push(advert);
            }
            Err(mpsc::RecvTimeoutError::Timeout) => break,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    listener.shut_down();
    Ok(found)
}
