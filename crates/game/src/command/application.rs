use rkyv::{Archive, Deserialize, Serialize};

use crate::net::ObserverRegistry;

/// The game's application surface as seen by commands.
pub trait Application {
    fn post_status(&mut self, line: &str);
    fn start_game(&mut self, seconds_until_start: u32);

    /// Chat lines a joining player should see, oldest first.
    fn message_history(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Separates lines inside a `LobbyMessageHistory` message.
pub const HISTORY_SEPARATOR: &str = "\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum MessageKind {
    LobbyMessageHistory,
    Message,
}

#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum ApplicationCommand {
    ClientConnected {
        player_name: String,
    },
    ConnectedToServer {
        client_name: String,
        server_name: String,
    },
    ClientDisconnected {
        player_name: Option<String>,
    },
    SendMessage {
        kind: MessageKind,
        text: String,
    },
    StartGame {
        seconds_until_start: u32,
    },
}

impl ApplicationCommand {
    pub fn chat(sender: &str, text: &str) -> Self {
        Self::SendMessage {
            kind: MessageKind::Message,
            text: format!("{sender}: {text}"),
        }
    }

    pub fn history(lines: &[String]) -> Self {
        Self::SendMessage {
            kind: MessageKind::LobbyMessageHistory,
            text: lines.join(HISTORY_SEPARATOR),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ClientConnected { .. } => "ClientConnected",
            Self::ConnectedToServer { .. } => "ConnectedToServer",
            Self::ClientDisconnected { .. } => "ClientDisconnected",
            Self::SendMessage { .. } => "SendMessage",
            Self::StartGame { .. } => "StartGame",
        }
    }

    pub fn execute(self, app: &mut dyn Application, observers: &mut ObserverRegistry) {
        match self {
            Self::ClientConnected { player_name } => {
                app.post_status(&format!("{player_name} joined the game"));
                observers.notify_client_connected(&player_name);
            }
            Self::ConnectedToServer {
                client_name,
                server_name,
            } => {
                app.post_status(&format!("Connected to {server_name}"));
                observers.notify_connect(&client_name, &server_name);
            }
            Self::ClientDisconnected { player_name } => {
                let name = player_name.as_deref().unwrap_or("A player");
                app.post_status(&format!("{name} disconnected"));
                observers.notify_client_disconnected(name);
            }
            Self::SendMessage { kind, text } => {
                observers.notify_message_received(kind, &text);
            }
            Self::StartGame {
                seconds_until_start,
            } => {
                app.start_game(seconds_until_start);
                observers.notify_game_start(seconds_until_start);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{EventLog, NetworkEvent};

    #[derive(Default)]
    struct Recorder {
        status: Vec<String>,
        started: Option<u32>,
    }

    impl Application for Recorder {
        fn post_status(&mut self, line: &str) {
            self.status.push(line.to_string());
        }

        fn start_game(&mut self, seconds_until_start: u32) {
            self.started = Some(seconds_until_start);
        }
    }

    #[test]
    fn chat_prefixes_sender() {
        assert_eq!(
            ApplicationCommand::chat("Alice", "hello"),
            ApplicationCommand::SendMessage {
                kind: MessageKind::Message,
                text: "Alice: hello".to_string(),
            }
        );
    }

    #[test]
    fn start_game_reaches_app_and_observers() {
        let mut app = Recorder::default();
        let mut observers = ObserverRegistry::default();
        let log = EventLog::new();
        observers.add(Box::new(log.clone()));

        ApplicationCommand::StartGame {
            seconds_until_start: 5,
        }
        .execute(&mut app, &mut observers);

        assert_eq!(app.started, Some(5));
        assert_eq!(log.drain(), vec![NetworkEvent::GameStart(5)]);
    }

    #[test]
    fn anonymous_disconnect() {
        let mut app = Recorder::default();
        let mut observers = ObserverRegistry::default();
        let log = EventLog::new();
        observers.add(Box::new(log.clone()));

        ApplicationCommand::ClientDisconnected { player_name: None }
            .execute(&mut app, &mut observers);

        assert_eq!(app.status, vec!["A player disconnected".to_string()]);
        assert_eq!(
            log.drain(),
            vec![NetworkEvent::ClientDisconnected("A player".to_string())]
        );
    }
}
