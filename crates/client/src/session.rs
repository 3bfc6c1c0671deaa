use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Instant;

use glam::Vec2;
use treads::{
    ConstructionArgs, EntityId, EntityKind, EventLog, Lobby, LobbyState, NetworkEvent,
    NetworkSystem, PlayerColor, PlayerIdentity, TestingGround, World, WorldCommand, tick_interval,
};

enum Input {
    Chat(String),
    Move { x: f32, y: f32 },
    Players,
    Quit,
}

impl Input {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let mut words = line.split_whitespace();
        match words.next() {
            Some("/quit") => Some(Input::Quit),
            Some("/players") => Some(Input::Players),
            Some("/move") => {
                let x = words.next()?.parse().ok()?;
                let y = words.next()?.parse().ok()?;
                Some(Input::Move { x, y })
            }
            _ => Some(Input::Chat(line.to_string())),
        }
    }
}

/// A connected player: pumps the network at the game tick rate, prints what
/// happens, and turns stdin lines into chat and tank moves.
pub struct PlayerSession {
    net: NetworkSystem,
    world: World,
    lobby: Lobby,
    log: EventLog,
    input: Receiver<String>,
    tank: Option<EntityId>,
}

impl PlayerSession {
    pub fn new(mut net: NetworkSystem, name: &str) -> Self {
        let log = EventLog::new();
        net.add_observer(Box::new(log.clone()));

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        Self {
            net,
            world: World::new(TestingGround::COLUMNS, TestingGround::ROWS),
            lobby: Lobby::new(name),
            log,
            input: rx,
            tank: None,
        }
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        println!("Type to chat. /players, /move <x> <y>, /quit");
        let mut next_tick = Instant::now();

        loop {
            let now = Instant::now();
            if now < next_tick {
                thread::sleep(next_tick - now);
            }
            next_tick += tick_interval();

            self.net.update(&mut self.world, &mut self.lobby);
            for event in self.log.drain() {
                self.lobby.apply(&event);
                print_event(&event);
                if let NetworkEvent::ClientDisconnected(name) = &event
                    && Some(name.as_str()) == self.net.server_name()
                {
                    return Ok(());
                }
            }
            for event in self.world.drain_events() {
                println!("* {event:?}");
            }

            if self.lobby.update() {
                println!("* The game has started");
                self.spawn_tank()?;
            }

            match self.input.try_recv() {
                Ok(line) => match Input::parse(&line) {
                    Some(Input::Quit) => break,
                    Some(input) => self.handle(input)?,
                    None => {}
                },
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => break,
            }
        }

        self.net.dispose();
        Ok(())
    }

    fn handle(&mut self, input: Input) -> anyhow::Result<()> {
        match input {
            Input::Chat(text) => self.net.send_chat(&text)?,
            Input::Players => {
                for player in self.lobby.players() {
                    let ready = if player.ready { " (ready)" } else { "" };
                    println!("  {}{ready}", player.name);
                }
            }
            Input::Move { x, y } => {
                let Some(tank) = self.tank else {
                    println!("* No tank yet");
                    return Ok(());
                };
                let command = self.world.move_entity(tank, Vec2::new(x, y), 0.0)?;
                self.net.send(command)?;
            }
            Input::Quit => {}
        }
        Ok(())
    }

    fn spawn_tank(&mut self) -> anyhow::Result<()> {
        if self.lobby.state() != LobbyState::InGame || self.tank.is_some() {
            return Ok(());
        }
        let index = self
            .lobby
            .players()
            .iter()
            .position(|player| player.name == self.lobby.local_name())
            .unwrap_or(0);
        let spawn = TestingGround::spawn_point(index);
        let id = EntityId::random();
        let player = PlayerIdentity::new(self.lobby.local_name(), PlayerColor::for_index(index));

        let tank = self.world.add_entity(
            EntityKind::Tank,
            ConstructionArgs::new(id, spawn.x, spawn.y, 0.0),
            None,
        )?;
        if let Some(state) = tank.tank_mut() {
            state.player = Some(player.clone());
        }
        let command = WorldCommand::create_tank(tank, &player);
        self.world.set_local_tank(id)?;
        self.net.send(command)?;
        self.tank = Some(id);
        println!("* Spawned at ({:.0}, {:.0})", spawn.x, spawn.y);
        Ok(())
    }
}

fn print_event(event: &NetworkEvent) {
    match event {
        NetworkEvent::Connected { server_name, .. } => println!("* Connected to {server_name}"),
        NetworkEvent::ClientConnected(name) => println!("* {name} is here"),
        NetworkEvent::ClientDisconnected(name) => println!("* {name} disconnected"),
        NetworkEvent::ClientReady(name) => println!("* {name} has the map"),
        NetworkEvent::GameStart(seconds) => println!("* Game starts in {seconds}s"),
        NetworkEvent::Message { text, .. } => println!("{text}"),
    }
}
