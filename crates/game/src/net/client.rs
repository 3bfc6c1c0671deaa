use std::net::{SocketAddr, TcpStream};

use crate::command::{ApplicationCommand, Command};

use super::connection::Connection;
use super::{CommandInbox, NetworkConfig, NetworkError, NetworkStats, PeerId};

/// Player role: a single connection to the server.
#[derive(Debug)]
pub struct Client {
    name: String,
    server_name: Option<String>,
    connection: Connection,
}

impl Client {
    /// Connects and announces `name` to the server.
    pub fn connect(
        addr: SocketAddr,
        name: &str,
        config: &NetworkConfig,
        inbox: CommandInbox,
    ) -> Result<Self, NetworkError> {
        let stream = TcpStream::connect_timeout(&addr, config.connect_timeout)?;
        let connection = Connection::open(PeerId::SERVER, stream, inbox, config.nodelay)?;
        connection.send(
            &ApplicationCommand::ClientConnected {
                player_name: name.to_string(),
            }
            .into(),
        )?;

        log::info!("connected to {addr} as '{name}'");

        Ok(Self {
            name: name.to_string(),
            server_name: None,
            connection,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    pub fn set_server_name(&mut self, server_name: &str) {
        self.server_name = Some(server_name.to_string());
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.connection.remote_addr()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_open()
    }

    pub fn stats(&self) -> NetworkStats {
        self.connection.stats()
    }

    pub fn send(&self, command: &Command) -> Result<(), NetworkError> {
        self.connection.send(command)
    }

    pub fn dispose(&mut self) {
        self.connection.dispose();
    }
}
