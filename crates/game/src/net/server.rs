use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::command::Command;

use super::connection::{Connection, Frame};
use super::{
    CommandInbox, NetworkConfig, NetworkError, NetworkStats, PeerId, PlayerColor, PlayerIdentity,
};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq)]
pub struct PeerInfo {
    pub peer: PeerId,
    pub remote_addr: SocketAddr,
    pub identity: Option<PlayerIdentity>,
    pub open: bool,
    pub stats: NetworkStats,
}

#[derive(Debug)]
struct PeerSlot {
    connection: Connection,
    identity: Option<PlayerIdentity>,
}

/// Connections in join order. Slots are never removed, so a peer's index
/// stays valid for the whole session.
#[derive(Debug, Default)]
struct PeerTable {
    slots: Vec<PeerSlot>,
}

impl PeerTable {
    fn open_slots(&self) -> impl Iterator<Item = &PeerSlot> {
        self.slots.iter().filter(|slot| slot.connection.is_open())
    }
}

/// Host role: accepts clients on a background thread and fans commands out
/// to every open connection.
#[derive(Debug)]
pub struct Server {
    name: String,
    local_addr: SocketAddr,
    peers: Arc<Mutex<PeerTable>>,
    keep_running: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
}

impl Server {
    pub fn start(
        name: &str,
        config: &NetworkConfig,
        inbox: CommandInbox,
    ) -> Result<Self, NetworkError> {
        let listener = TcpListener::bind((config.bind_address, config.port))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let peers = Arc::new(Mutex::new(PeerTable::default()));
        let keep_running = Arc::new(AtomicBool::new(true));

        let accept_thread = thread::Builder::new().name("accept".into()).spawn({
            let peers = Arc::clone(&peers);
            let keep_running = Arc::clone(&keep_running);
            let nodelay = config.nodelay;
            move || accept_loop(listener, peers, inbox, keep_running, nodelay)
        })?;

        log::info!("server '{name}' listening on {local_addr}");

        Ok(Self {
            name: name.to_string(),
            local_addr,
            peers,
            keep_running,
            accept_thread: Some(accept_thread),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Sends to every open connection. The command is encoded once.
    pub fn send(&self, command: &Command) -> Result<(), NetworkError> {
        let frame: Frame = command.encode()?.into();
        for slot in self.peers().open_slots() {
            slot.connection.send_frame(Arc::clone(&frame));
        }
        Ok(())
    }

    pub fn send_except(&self, excluded: PeerId, command: &Command) -> Result<(), NetworkError> {
        let frame: Frame = command.encode()?.into();
        for slot in self.peers().open_slots() {
            if slot.connection.peer() != excluded {
                slot.connection.send_frame(Arc::clone(&frame));
            }
        }
        Ok(())
    }

    pub fn send_to_peer(&self, index: usize, command: &Command) -> Result<(), NetworkError> {
        let peers = self.peers();
        let slot = peers.slots.get(index).ok_or(NetworkError::UnknownPeer(index))?;
        slot.connection.send(command)
    }

    /// Records who is behind `peer`. The color follows join order, with the
    /// server holding the first one.
    pub fn register_identity(&self, peer: PeerId, name: &str) -> Option<PlayerIdentity> {
        let mut peers = self.peers();
        let slot = peers.slots.get_mut(peer.index())?;
        let identity = PlayerIdentity::new(name, PlayerColor::for_index(peer.index() + 1))
            .with_address(slot.connection.remote_addr().ip());
        slot.identity = Some(identity.clone());
        Some(identity)
    }

    pub fn identity(&self, peer: PeerId) -> Option<PlayerIdentity> {
        self.peers()
            .slots
            .get(peer.index())
            .and_then(|slot| slot.identity.clone())
    }

    /// The host followed by every connected player that has announced itself.
    pub fn players(&self) -> Vec<PlayerIdentity> {
        self.roster(None)
    }

    pub fn players_except(&self, peer: PeerId) -> Vec<PlayerIdentity> {
        self.roster(Some(peer))
    }

    fn roster(&self, excluded: Option<PeerId>) -> Vec<PlayerIdentity> {
        let mut players = vec![PlayerIdentity::new(&self.name, PlayerColor::for_index(0))];
        players.extend(
            self.peers()
                .open_slots()
                .filter(|slot| Some(slot.connection.peer()) != excluded)
                .filter_map(|slot| slot.identity.clone()),
        );
        players
    }

    pub fn connected_count(&self) -> usize {
        self.peers().open_slots().count()
    }

    pub fn peer_info(&self) -> Vec<PeerInfo> {
        self.peers()
            .slots
            .iter()
            .map(|slot| PeerInfo {
                peer: slot.connection.peer(),
                remote_addr: slot.connection.remote_addr(),
                identity: slot.identity.clone(),
                open: slot.connection.is_open(),
                stats: slot.connection.stats(),
            })
            .collect()
    }

    /// Tears down a peer's connection and forgets its identity.
    pub fn drop_peer(&self, peer: PeerId) -> Option<PlayerIdentity> {
        let mut peers = self.peers();
        let slot = peers.slots.get_mut(peer.index())?;
        slot.connection.dispose();
        slot.identity.take()
    }

    pub fn dispose(&mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.accept_thread.take()
            && handle.join().is_err()
        {
            log::error!("accept thread panicked");
        }
        for slot in self.peers().slots.iter_mut() {
            slot.connection.dispose();
        }
    }

    fn peers(&self) -> MutexGuard<'_, PeerTable> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn accept_loop(
    listener: TcpListener,
    peers: Arc<Mutex<PeerTable>>,
    inbox: CommandInbox,
    keep_running: Arc<AtomicBool>,
    nodelay: bool,
) {
    while keep_running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, addr)) => {
                if let Err(e) = stream.set_nonblocking(false) {
                    log::warn!("rejecting {addr}: {e}");
                    continue;
                }
                let mut table = peers.lock().unwrap_or_else(PoisonError::into_inner);
                let peer = PeerId(table.slots.len() as u32);
                match Connection::open(peer, stream, inbox.clone(), nodelay) {
                    Ok(connection) => {
                        log::info!("{peer} accepted from {addr}");
                        table.slots.push(PeerSlot {
                            connection,
                            identity: None,
                        });
                    }
                    Err(e) => log::warn!("failed to set up connection from {addr}: {e}"),
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) if is_transient(e.kind()) => {
                log::warn!("accept failed, still listening: {e}");
            }
            Err(e) => {
                log::error!("accept failed: {e}");
                break;
            }
        }
    }
    log::debug!("accept loop stopped");
}

/// Accept failures caused by one misbehaving client rather than the listener.
fn is_transient(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use std::net::TcpStream;

    use super::*;

    #[test]
    fn client_side_accept_failures_keep_listening() {
        for kind in [
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::Interrupted,
        ] {
            assert!(is_transient(kind), "{kind:?}");
        }
        assert!(!is_transient(io::ErrorKind::InvalidInput));
        assert!(!is_transient(io::ErrorKind::PermissionDenied));
    }

    #[test]
    fn peer_indices_are_never_reused() {
        let inbox = CommandInbox::new();
        let server = Server::start("Host", &NetworkConfig::local(), inbox).unwrap();
        let addr = server.local_addr();

        let first = TcpStream::connect(addr).unwrap();
        let start = std::time::Instant::now();
        while server.peer_info().is_empty() && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(5));
        }
        drop(first);
        let _second = TcpStream::connect(addr).unwrap();
        while server.peer_info().len() < 2 && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(5));
        }

        let indices: Vec<_> = server.peer_info().iter().map(|p| p.peer.index()).collect();
        assert_eq!(indices, [0, 1]);
    }
}
