mod application;
mod transport;
mod world;

pub use application::{Application, ApplicationCommand, HISTORY_SEPARATOR, MessageKind};
pub use transport::TransportCommand;
pub use world::{EntitySnapshot, WorldCommand};

use rkyv::{Archive, Deserialize, Serialize};

use crate::net::{NetworkError, protocol};
use crate::sim::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionContext {
    World,
    Application,
    Transport,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum Command {
    World(WorldCommand),
    Application(ApplicationCommand),
    Transport(TransportCommand),
}

impl Command {
    pub fn context(&self) -> ExecutionContext {
        match self {
            Self::World(_) => ExecutionContext::World,
            Self::Application(_) => ExecutionContext::Application,
            Self::Transport(_) => ExecutionContext::Transport,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::World(command) => command.name(),
            Self::Application(command) => command.name(),
            Self::Transport(command) => command.name(),
        }
    }

    pub fn target(&self) -> Option<EntityId> {
        match self {
            Self::World(command) => command.target(),
            Self::Application(_) | Self::Transport(_) => None,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, NetworkError> {
        protocol::encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, NetworkError> {
        protocol::decode(bytes)
    }
}

impl From<WorldCommand> for Command {
    fn from(command: WorldCommand) -> Self {
        Self::World(command)
    }
}

impl From<ApplicationCommand> for Command {
    fn from(command: ApplicationCommand) -> Self {
        Self::Application(command)
    }
}

impl From<TransportCommand> for Command {
    fn from(command: TransportCommand) -> Self {
        Self::Transport(command)
    }
}
