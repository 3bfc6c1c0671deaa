use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::command::MessageKind;

/// Receives lobby-level network notifications on the game thread. Every
/// method has an empty default so observers implement only what they need.
pub trait NetworkObserver {
    fn on_connect(&mut self, _client_name: &str, _server_name: &str) {}
    fn on_client_connected(&mut self, _client_name: &str) {}
    fn on_client_disconnected(&mut self, _client_name: &str) {}
    fn on_client_ready(&mut self, _client_name: &str) {}
    fn on_game_start(&mut self, _seconds_until_start: u32) {}
    fn on_message_received(&mut self, _kind: MessageKind, _text: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

#[derive(Default)]
pub struct ObserverRegistry {
    next_id: u64,
    observers: Vec<(ObserverId, Box<dyn NetworkObserver>)>,
}

impl ObserverRegistry {
    pub fn add(&mut self, observer: Box<dyn NetworkObserver>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, observer));
        id
    }

    pub fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        before != self.observers.len()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }

    fn each(&mut self, mut f: impl FnMut(&mut dyn NetworkObserver)) {
        for (_, observer) in &mut self.observers {
            f(observer.as_mut());
        }
    }

    pub fn notify_connect(&mut self, client_name: &str, server_name: &str) {
        self.each(|observer| observer.on_connect(client_name, server_name));
    }

    pub fn notify_client_connected(&mut self, client_name: &str) {
        self.each(|observer| observer.on_client_connected(client_name));
    }

    pub fn notify_client_disconnected(&mut self, client_name: &str) {
        self.each(|observer| observer.on_client_disconnected(client_name));
    }

    pub fn notify_client_ready(&mut self, client_name: &str) {
        self.each(|observer| observer.on_client_ready(client_name));
    }

    pub fn notify_game_start(&mut self, seconds_until_start: u32) {
        self.each(|observer| observer.on_game_start(seconds_until_start));
    }

    pub fn notify_message_received(&mut self, kind: MessageKind, text: &str) {
        self.each(|observer| observer.on_message_received(kind, text));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    Connected {
        client_name: String,
        server_name: String,
    },
    ClientConnected(String),
    ClientDisconnected(String),
    ClientReady(String),
    GameStart(u32),
    Message {
        kind: MessageKind,
        text: String,
    },
}

/// Observer that queues every notification as a `NetworkEvent`. Clones share
/// the queue, so one clone can be registered while another is polled.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<VecDeque<NetworkEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<NetworkEvent> {
        self.events.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    fn push(&self, event: NetworkEvent) {
        self.events.borrow_mut().push_back(event);
    }
}

impl NetworkObserver for EventLog {
    fn on_connect(&mut self, client_name: &str, server_name: &str) {
        self.push(NetworkEvent::Connected {
            client_name: client_name.to_string(),
            server_name: server_name.to_string(),
        });
    }

    fn on_client_connected(&mut self, client_name: &str) {
        self.push(NetworkEvent::ClientConnected(client_name.to_string()));
    }

    fn on_client_disconnected(&mut self, client_name: &str) {
        self.push(NetworkEvent::ClientDisconnected(client_name.to_string()));
    }

    fn on_client_ready(&mut self, client_name: &str) {
        self.push(NetworkEvent::ClientReady(client_name.to_string()));
    }

    fn on_game_start(&mut self, seconds_until_start: u32) {
        self.push(NetworkEvent::GameStart(seconds_until_start));
    }

    fn on_message_received(&mut self, kind: MessageKind, text: &str) {
        self.push(NetworkEvent::Message {
            kind,
            text: text.to_string(),
        });
    }
}
