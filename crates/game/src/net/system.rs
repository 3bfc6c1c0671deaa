use std::net::SocketAddr;

use crate::command::{
    Application, ApplicationCommand, Command, ExecutionContext, TransportCommand, WorldCommand,
};
use crate::sim::World;

use super::observer::{NetworkObserver, ObserverId, ObserverRegistry};
use super::server::PeerInfo;
use super::{
    Client, CommandInbox, Inbound, NetworkConfig, NetworkError, NetworkRole, Origin, PeerId, Server,
};

/// The game's single entry point to networking. Lives on the game thread;
/// background threads only ever touch the inbox.
pub struct NetworkSystem {
    config: NetworkConfig,
    role: NetworkRole,
    inbox: CommandInbox,
    observers: ObserverRegistry,
    player_name: Option<String>,
}

impl Default for NetworkSystem {
    fn default() -> Self {
        Self::new(NetworkConfig::default())
    }
}

impl NetworkSystem {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            role: NetworkRole::Null,
            inbox: CommandInbox::new(),
            observers: ObserverRegistry::default(),
            player_name: None,
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn role(&self) -> &NetworkRole {
        &self.role
    }

    pub fn is_server(&self) -> bool {
        self.role.is_server()
    }

    pub fn player_name(&self) -> Option<&str> {
        self.player_name.as_deref()
    }

    pub fn server_name(&self) -> Option<&str> {
        match &self.role {
            NetworkRole::Server(server) => Some(server.name()),
            NetworkRole::Client(client) => client.server_name(),
            NetworkRole::Null => None,
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.role.server().map(Server::local_addr)
    }

    pub fn peer_info(&self) -> Vec<PeerInfo> {
        self.role.server().map(Server::peer_info).unwrap_or_default()
    }

    pub fn start_server(&mut self, name: &str) -> Result<SocketAddr, NetworkError> {
        if self.role.is_started() {
            return Err(NetworkError::AlreadyStarted);
        }
        let server = Server::start(name, &self.config, self.inbox.clone())?;
        let addr = server.local_addr();
        self.role = NetworkRole::Server(server);
        self.player_name = Some(name.to_string());
        Ok(addr)
    }

    pub fn connect(&mut self, addr: SocketAddr, name: &str) -> Result<(), NetworkError> {
        if self.role.is_started() {
            return Err(NetworkError::AlreadyStarted);
        }
        let client = Client::connect(addr, name, &self.config, self.inbox.clone())?;
        self.role = NetworkRole::Client(client);
        self.player_name = Some(name.to_string());
        Ok(())
    }

    /// Servers send to every client, clients to the server. Without a role
    /// this does nothing.
    pub fn send(&self, command: impl Into<Command>) -> Result<(), NetworkError> {
        self.role.send(&command.into())
    }

    pub fn send_to_peer(
        &self,
        index: usize,
        command: impl Into<Command>,
    ) -> Result<(), NetworkError> {
        let server = self.role.server().ok_or(NetworkError::NotServer)?;
        server.send_to_peer(index, &command.into())
    }

    /// Sends a chat line as this player and shows it locally.
    pub fn send_chat(&mut self, text: &str) -> Result<(), NetworkError> {
        let sender = self.player_name.as_deref().unwrap_or("Player");
        let command = ApplicationCommand::chat(sender, text);
        self.send(command.clone())?;
        if let ApplicationCommand::SendMessage { kind, text } = command {
            self.observers.notify_message_received(kind, &text);
        }
        Ok(())
    }

    /// Ships the map to every client and starts the countdown everywhere,
    /// this machine included.
    pub fn start_game(
        &mut self,
        world: &World,
        app: &mut dyn Application,
        seconds_until_start: u32,
    ) -> Result<(), NetworkError> {
        let server = self.role.server().ok_or(NetworkError::NotServer)?;
        if server.connected_count() == 0 {
            return Err(NetworkError::NoClients);
        }
        server.send(&WorldCommand::send_map(world).into())?;
        let start = ApplicationCommand::StartGame {
            seconds_until_start,
        };
        server.send(&start.clone().into())?;
        log::info!("game starts in {seconds_until_start}s");

        start.execute(app, &mut self.observers);
        Ok(())
    }

    pub fn post_to_game_thread(&self, command: impl Into<Command>) {
        self.inbox.post(command);
    }

    pub fn inbox(&self) -> CommandInbox {
        self.inbox.clone()
    }

    pub fn add_observer(&mut self, observer: Box<dyn NetworkObserver>) -> ObserverId {
        self.observers.add(observer)
    }

    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    /// Runs everything queued before the call, in arrival order. Commands
    /// that arrive meanwhile wait for the next tick.
    pub fn update(&mut self, world: &mut World, app: &mut dyn Application) {
        for Inbound { origin, command } in self.inbox.drain() {
            if let Origin::Peer(peer) = origin {
                self.forward(peer, &command);
            }
            match command {
                Command::World(command) => self.execute_world(command, world),
                Command::Application(command) => self.execute_application(origin, command, app),
                Command::Transport(command) => self.execute_transport(origin, command, app),
            }
        }
    }

    pub fn dispose(&mut self) {
        if !self.role.is_started() {
            return;
        }
        self.role.dispose();
        self.role = NetworkRole::Null;
        self.inbox.clear();
        log::info!("network system disposed");
    }

    fn forward(&self, from: PeerId, command: &Command) {
        let Some(server) = self.role.server() else {
            return;
        };
        if command.context() == ExecutionContext::Transport {
            return;
        }
        if let Err(e) = server.send_except(from, command) {
            log::warn!("failed to relay {} from {from}: {e}", command.name());
        }
    }

    fn execute_world(&mut self, command: WorldCommand, world: &mut World) {
        let loads_map = matches!(command, WorldCommand::SendMap { .. });
        command.execute(world);
        if loads_map {
            self.map_loaded();
        }
    }

    fn map_loaded(&mut self) {
        let name = self.player_name.clone().unwrap_or_default();
        let ready = TransportCommand::MapDownloadComplete {
            player_name: name.clone(),
        };
        if let Err(e) = self.send(ready) {
            log::warn!("failed to report map download: {e}");
        }
        self.observers.notify_client_ready(&name);
    }

    fn execute_application(
        &mut self,
        origin: Origin,
        command: ApplicationCommand,
        app: &mut dyn Application,
    ) {
        match (&mut self.role, origin, &command) {
            (
                NetworkRole::Server(server),
                Origin::Peer(peer),
                ApplicationCommand::ClientConnected { player_name },
            ) => {
                welcome(server, peer, player_name, &app.message_history());
            }
            (
                NetworkRole::Client(client),
                _,
                ApplicationCommand::ConnectedToServer { server_name, .. },
            ) => {
                client.set_server_name(server_name);
            }
            _ => {}
        }
        command.execute(app, &mut self.observers);
    }

    fn execute_transport(
        &mut self,
        origin: Origin,
        command: TransportCommand,
        app: &mut dyn Application,
    ) {
        match command {
            TransportCommand::MapDownloadComplete { player_name } => {
                self.observers.notify_client_ready(&player_name);
            }
            TransportCommand::ConnectionLost { peer } if !origin.may_report_loss_of(peer) => {
                log::warn!("ignoring ConnectionLost for {peer} sent by {origin}");
            }
            TransportCommand::ConnectionLost { peer } => match &self.role {
                NetworkRole::Server(server) => {
                    let Some(identity) = server.drop_peer(peer) else {
                        log::info!("{peer} left before announcing itself");
                        return;
                    };
                    log::info!("{} ({peer}) disconnected", identity.name);
                    let notice = ApplicationCommand::ClientDisconnected {
                        player_name: Some(identity.name),
                    };
                    if let Err(e) = server.send(&notice.clone().into()) {
                        log::warn!("failed to announce disconnect: {e}");
                    }
                    notice.execute(app, &mut self.observers);
                }
                NetworkRole::Client(client) => {
                    let server_name = client.server_name().unwrap_or("server").to_string();
                    log::warn!("lost connection to {server_name}");
                    app.post_status("Disconnected from server");
                    self.observers.notify_client_disconnected(&server_name);
                }
                NetworkRole::Null => log::debug!("ConnectionLost for {peer} with no role"),
            },
        }
    }
}

impl Drop for NetworkSystem {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Greets a newly announced client: confirms the connection, tells it who is
/// already in the session and replays the lobby chat so far.
fn welcome(server: &Server, peer: PeerId, player_name: &str, history: &[String]) {
    if server.register_identity(peer, player_name).is_none() {
        log::warn!("{peer} announced itself as '{player_name}' but is not connected");
        return;
    }
    log::info!("{peer} is '{player_name}'");

    let mut greeting: Vec<Command> = vec![
        ApplicationCommand::ConnectedToServer {
            client_name: player_name.to_string(),
            server_name: server.name().to_string(),
        }
        .into(),
    ];
    greeting.extend(server.players_except(peer).into_iter().map(|player| {
        Command::from(ApplicationCommand::ClientConnected {
            player_name: player.name,
        })
    }));
    if !history.is_empty() {
        greeting.push(ApplicationCommand::history(history).into());
    }

    for command in &greeting {
        if let Err(e) = server.send_to_peer(peer.index(), command) {
            log::warn!("failed to greet {peer}: {e}");
            return;
        }
    }
}
