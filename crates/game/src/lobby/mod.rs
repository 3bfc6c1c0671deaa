use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::command::{Application, HISTORY_SEPARATOR, MessageKind};
use crate::net::NetworkEvent;

const CHAT_HISTORY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LobbyState {
    Waiting,
    Countdown,
    InGame,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyPlayer {
    pub name: String,
    pub ready: bool,
}

/// Pre-game room: who is here, who has the map, the chat, and the countdown
/// to the first tick.
#[derive(Debug)]
pub struct Lobby {
    local_name: String,
    state: LobbyState,
    players: Vec<LobbyPlayer>,
    chat: VecDeque<String>,
    history_received: bool,
    countdown: Duration,
    countdown_start: Option<Instant>,
}

impl Lobby {
    pub fn new(local_name: &str) -> Self {
        let mut lobby = Self {
            local_name: local_name.to_string(),
            state: LobbyState::Waiting,
            players: Vec::new(),
            chat: VecDeque::new(),
            history_received: false,
            countdown: Duration::ZERO,
            countdown_start: None,
        };
        lobby.add_player(local_name);
        lobby
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn state(&self) -> LobbyState {
        self.state
    }

    pub fn players(&self) -> &[LobbyPlayer] {
        &self.players
    }

    pub fn chat(&self) -> impl Iterator<Item = &str> {
        self.chat.iter().map(String::as_str)
    }

    pub fn add_player(&mut self, name: &str) -> bool {
        if self.players.iter().any(|p| p.name == name) {
            return false;
        }
        self.players.push(LobbyPlayer {
            name: name.to_string(),
            ready: false,
        });
        true
    }

    pub fn remove_player(&mut self, name: &str) -> bool {
        let before = self.players.len();
        self.players.retain(|p| p.name != name);
        before != self.players.len()
    }

    pub fn mark_ready(&mut self, name: &str) {
        if let Some(player) = self.players.iter_mut().find(|p| p.name == name) {
            player.ready = true;
        }
    }

    pub fn all_ready(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.ready)
    }

    pub fn push_chat(&mut self, line: &str) {
        if self.chat.len() == CHAT_HISTORY {
            self.chat.pop_front();
        }
        self.chat.push_back(line.to_string());
    }

    /// Puts the lobby's earlier chat ahead of everything seen locally. Only
    /// the first history is taken; later ones return false.
    pub fn receive_history(&mut self, history: &str) -> bool {
        if self.history_received {
            return false;
        }
        self.history_received = true;

        let mut chat: VecDeque<String> = history
            .split(HISTORY_SEPARATOR)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        chat.append(&mut self.chat);
        while chat.len() > CHAT_HISTORY {
            chat.pop_front();
        }
        self.chat = chat;
        true
    }

    pub fn start_countdown(&mut self, seconds: u32) {
        if self.state == LobbyState::Waiting {
            self.state = LobbyState::Countdown;
            self.countdown = Duration::from_secs(seconds.into());
            self.countdown_start = Some(Instant::now());
        }
    }

    pub fn countdown_remaining(&self) -> Option<Duration> {
        match (self.state, self.countdown_start) {
            (LobbyState::Countdown, Some(start)) => {
                Some(self.countdown.saturating_sub(start.elapsed()))
            }
            _ => None,
        }
    }

    /// Moves into the game once the countdown has run out. Returns true on
    /// the tick that happens.
    pub fn update(&mut self) -> bool {
        if self.countdown_remaining() == Some(Duration::ZERO) {
            self.state = LobbyState::InGame;
            self.countdown_start = None;
            return true;
        }
        false
    }

    pub fn apply(&mut self, event: &NetworkEvent) {
        match event {
            NetworkEvent::Connected {
                client_name,
                server_name,
            } => {
                self.add_player(server_name);
                self.add_player(client_name);
            }
            NetworkEvent::ClientConnected(name) => {
                self.add_player(name);
            }
            NetworkEvent::ClientDisconnected(name) => {
                self.remove_player(name);
            }
            NetworkEvent::ClientReady(name) => self.mark_ready(name),
            NetworkEvent::Message {
                kind: MessageKind::LobbyMessageHistory,
                text,
            } => {
                self.receive_history(text);
            }
            NetworkEvent::Message {
                kind: MessageKind::Message,
                text,
            } => self.push_chat(text),
            NetworkEvent::GameStart(_) => {}
        }
    }
}

impl Application for Lobby {
    fn post_status(&mut self, line: &str) {
        log::info!("{line}");
        self.push_chat(line);
    }

    fn start_game(&mut self, seconds_until_start: u32) {
        self.start_countdown(seconds_until_start);
    }

    fn message_history(&self) -> Vec<String> {
        self.chat.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_follows_events() {
        let mut lobby = Lobby::new("Bob");
        lobby.apply(&NetworkEvent::Connected {
            client_name: "Bob".to_string(),
            server_name: "Host".to_string(),
        });
        lobby.apply(&NetworkEvent::ClientConnected("Carol".to_string()));
        lobby.apply(&NetworkEvent::ClientConnected("Carol".to_string()));

        let names: Vec<_> = lobby.players().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Bob", "Host", "Carol"]);

        lobby.apply(&NetworkEvent::ClientDisconnected("Host".to_string()));
        assert_eq!(lobby.players().len(), 2);
    }

    #[test]
    fn ready_when_everyone_has_the_map() {
        let mut lobby = Lobby::new("Host");
        lobby.add_player("Alice");
        lobby.mark_ready("Host");
        assert!(!lobby.all_ready());
        lobby.apply(&NetworkEvent::ClientReady("Alice".to_string()));
        assert!(lobby.all_ready());
    }

    #[test]
    fn chat_history_is_bounded() {
        let mut lobby = Lobby::new("Host");
        for n in 0..CHAT_HISTORY + 5 {
            lobby.apply(&NetworkEvent::Message {
                kind: MessageKind::Message,
                text: format!("line {n}"),
            });
        }
        assert_eq!(lobby.chat().count(), CHAT_HISTORY);
        assert_eq!(lobby.chat().next(), Some("line 5"));
    }

    #[test]
    fn history_is_taken_once_ahead_of_live_chat() {
        let mut lobby = Lobby::new("Carol");
        lobby.post_status("Connected to Host");
        lobby.apply(&NetworkEvent::Message {
            kind: MessageKind::LobbyMessageHistory,
            text: "Bob joined the game\nBob: hi".to_string(),
        });
        lobby.apply(&NetworkEvent::Message {
            kind: MessageKind::LobbyMessageHistory,
            text: "stale".to_string(),
        });
        lobby.apply(&NetworkEvent::Message {
            kind: MessageKind::Message,
            text: "Bob: welcome".to_string(),
        });

        let chat: Vec<_> = lobby.chat().collect();
        assert_eq!(
            chat,
            ["Bob joined the game", "Bob: hi", "Connected to Host", "Bob: welcome"]
        );
        assert_eq!(lobby.message_history().len(), 4);
    }

    #[test]
    fn zero_second_countdown_enters_game() {
        let mut lobby = Lobby::new("Host");
        lobby.start_game(0);
        assert_eq!(lobby.state(), LobbyState::Countdown);
        assert!(lobby.update());
        assert_eq!(lobby.state(), LobbyState::InGame);
        assert!(!lobby.update());
    }

    #[test]
    fn countdown_waits() {
        let mut lobby = Lobby::new("Host");
        lobby.start_countdown(30);
        assert!(!lobby.update());
        assert!(lobby.countdown_remaining().unwrap() > Duration::from_secs(25));
    }
}
