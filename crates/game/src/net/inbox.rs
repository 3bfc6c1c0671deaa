use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::command::Command;

use super::PeerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Local,
    Peer(PeerId),
}

impl Origin {
    /// Only this process, or the link itself, can say a link is gone. A
    /// peer never gets to drop somebody else.
    pub fn may_report_loss_of(self, peer: PeerId) -> bool {
        match self {
            Self::Local => true,
            Self::Peer(origin) => origin == peer,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Peer(peer) => write!(f, "{peer}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub origin: Origin,
    pub command: Command,
}

/// Thread-safe FIFO of commands waiting for the game thread. Cloning shares
/// the same queue.
#[derive(Debug, Clone, Default)]
pub struct CommandInbox {
    queue: Arc<Mutex<VecDeque<Inbound>>>,
}

impl CommandInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self, command: impl Into<Command>) {
        self.push(Origin::Local, command.into());
    }

    pub fn post_from(&self, peer: PeerId, command: impl Into<Command>) {
        self.push(Origin::Peer(peer), command.into());
    }

    fn push(&self, origin: Origin, command: Command) {
        self.lock().push_back(Inbound { origin, command });
    }

    /// Takes everything queued so far. Commands posted while the caller works
    /// through the batch wait for the next drain.
    pub fn drain(&self) -> VecDeque<Inbound> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Inbound>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
