use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use treads::{
    DiscoveryBeacon, EventLog, Lobby, LobbyState, NetworkError, NetworkStats, NetworkSystem,
    PeerInfo, ServerAdvert, TestingGround, World, tick_interval,
};

use crate::config::HostConfig;
use crate::events::HostEvent;

#[derive(Debug, Clone)]
pub struct HostStats {
    pub uptime_secs: u64,
    pub tick: u64,
    pub client_count: usize,
    pub entity_count: usize,
    pub lobby_state: LobbyState,
    pub countdown: Option<Duration>,
    pub network_stats: NetworkStats,
}

pub struct GameHost {
    config: HostConfig,
    net: NetworkSystem,
    world: World,
    lobby: Lobby,
    log: EventLog,
    beacon: Option<DiscoveryBeacon>,
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    started_at: Instant,
    next_tick: Instant,
    tick: u64,
    events: Vec<HostEvent>,
}

impl GameHost {
    pub fn new(config: HostConfig) -> anyhow::Result<Self> {
        let world = TestingGround::new().build()?;
        let mut net = NetworkSystem::new(config.network.clone());
        let log = EventLog::new();
        net.add_observer(Box::new(log.clone()));
        let local_addr = net.start_server(&config.name)?;

        let beacon = if config.advertise {
            let address = config
                .advertised_address
                .unwrap_or_else(|| outbound_address(&config));
            let advert = ServerAdvert::new(address, &config.name, TestingGround::NAME);
            Some(DiscoveryBeacon::start(&advert, &config.network)?)
        } else {
            None
        };

        let mut lobby = Lobby::new(&config.name);
        lobby.mark_ready(&config.name);

        Ok(Self {
            config,
            net,
            world,
            lobby,
            log,
            beacon,
            local_addr,
            running: Arc::new(AtomicBool::new(true)),
            started_at: Instant::now(),
            next_tick: Instant::now(),
            tick: 0,
            events: Vec::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = HostEvent> + '_ {
        self.events.drain(..)
    }

    pub fn run(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            self.tick_once();
            std::thread::sleep(Duration::from_millis(1));
        }
        self.shutdown();
    }

    /// Runs a game tick if one is due.
    pub fn tick_once(&mut self) {
        let now = Instant::now();
        if now < self.next_tick {
            return;
        }
        self.next_tick = now + tick_interval();
        self.tick += 1;

        self.net.update(&mut self.world, &mut self.lobby);
        for event in self.log.drain() {
            self.lobby.apply(&event);
            self.events.push(event.into());
        }
        self.events
            .extend(self.world.drain_events().into_iter().map(HostEvent::from));

        if self.lobby.update() {
            log::info!("game started");
        }
        if let Some(wanted) = self.config.auto_start
            && self.lobby.state() == LobbyState::Waiting
            && self.client_count() >= wanted
        {
            self.start_game();
        }
    }

    pub fn start_game(&mut self) {
        if self.lobby.state() != LobbyState::Waiting {
            return;
        }
        let countdown = self.config.countdown_secs;
        match self.net.start_game(&self.world, &mut self.lobby, countdown) {
            Ok(()) => {
                if let Some(beacon) = self.beacon.as_mut() {
                    beacon.stop();
                }
            }
            Err(NetworkError::NoClients) => self.events.push(HostEvent::Error {
                message: "Nobody has joined yet".to_string(),
            }),
            Err(e) => {
                log::error!("failed to start game: {e}");
                self.events.push(HostEvent::Error {
                    message: format!("Failed to start game: {e}"),
                });
            }
        }
        for event in self.log.drain() {
            self.events.push(event.into());
        }
    }

    pub fn send_chat(&mut self, text: &str) {
        if let Err(e) = self.net.send_chat(text) {
            log::warn!("chat failed: {e}");
        }
        for event in self.log.drain() {
            self.lobby.apply(&event);
            self.events.push(event.into());
        }
    }

    pub fn shutdown(&mut self) {
        if let Some(mut beacon) = self.beacon.take() {
            beacon.stop();
        }
        self.net.dispose();
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn client_count(&self) -> usize {
        self.net.peer_info().iter().filter(|peer| peer.open).count()
    }

    pub fn peers(&self) -> Vec<PeerInfo> {
        self.net.peer_info()
    }

    pub fn lobby(&self) -> &Lobby {
        &self.lobby
    }

    pub fn stats(&self) -> HostStats {
        let mut network_stats = NetworkStats::default();
        for peer in self.net.peer_info() {
            network_stats.merge(&peer.stats);
        }
        HostStats {
            uptime_secs: self.started_at.elapsed().as_secs(),
            tick: self.tick,
            client_count: self.client_count(),
            entity_count: self.world.entity_count(),
            lobby_state: self.lobby.state(),
            countdown: self.lobby.countdown_remaining(),
            network_stats,
        }
    }
}

/// Address other machines on the LAN can reach us at: whatever interface
/// the OS would route discovery traffic through.
fn outbound_address(config: &HostConfig) -> IpAddr {
    let route = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect((config.network.multicast_group, config.network.discovery_port))?;
        Ok(socket.local_addr()?.ip())
    };
    match route() {
        Ok(address) if !address.is_unspecified() => address,
        Ok(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
        Err(e) => {
            log::warn!("could not determine LAN address, advertising loopback: {e}");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}
