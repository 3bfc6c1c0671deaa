use crate::command::Command;

use super::{Client, NetworkError, Server};

/// What this machine is in the session. `Null` discards everything sent
/// through it, which is what single-player runs on.
#[derive(Debug, Default)]
pub enum NetworkRole {
    #[default]
    Null,
    Server(Server),
    Client(Client),
}

impl NetworkRole {
    pub fn is_started(&self) -> bool {
        !matches!(self, Self::Null)
    }

    pub fn is_server(&self) -> bool {
        matches!(self, Self::Server(_))
    }

    pub fn server(&self) -> Option<&Server> {
        match self {
            Self::Server(server) => Some(server),
            Self::Null | Self::Client(_) => None,
        }
    }

    pub fn client(&self) -> Option<&Client> {
        match self {
            Self::Client(client) => Some(client),
            Self::Null | Self::Server(_) => None,
        }
    }

    pub fn send(&self, command: &Command) -> Result<(), NetworkError> {
        match self {
            Self::Null => Ok(()),
            Self::Server(server) => server.send(command),
            Self::Client(client) => client.send(command),
        }
    }

    pub fn dispose(&mut self) {
        match self {
            Self::Null => {}
            Self::Server(server) => server.dispose(),
            Self::Client(client) => client.dispose(),
        }
    }
}
