use std::io::Read;
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use treads::net::write_frame;
use treads::{
    ApplicationCommand, Command, EntityId, EntityKind, EventLog, Lobby, LobbyState, MessageKind,
    NetworkConfig, NetworkError, NetworkEvent, NetworkSystem, PeerId, TestingGround,
    TransportCommand, World, WorldCommand,
};

const TIMEOUT: Duration = Duration::from_secs(5);

struct Node {
    net: NetworkSystem,
    world: World,
    lobby: Lobby,
    log: EventLog,
    seen: Vec<NetworkEvent>,
}

impl Node {
    fn new(name: &str) -> Self {
        let mut net = NetworkSystem::new(NetworkConfig::local());
        let log = EventLog::new();
        net.add_observer(Box::new(log.clone()));
        Self {
            net,
            world: World::new(8, 8),
            lobby: Lobby::new(name),
            log,
            seen: Vec::new(),
        }
    }

    fn host(name: &str) -> (Self, SocketAddr) {
        let mut node = Self::new(name);
        let addr = node.net.start_server(name).unwrap();
        (node, addr)
    }

    fn join(addr: SocketAddr, name: &str) -> Self {
        let mut node = Self::new(name);
        node.net.connect(addr, name).unwrap();
        node
    }

    fn tick(&mut self) {
        self.net.update(&mut self.world, &mut self.lobby);
        for event in self.log.drain() {
            self.lobby.apply(&event);
            self.seen.push(event);
        }
    }

    fn count(&self, event: &NetworkEvent) -> usize {
        self.seen.iter().filter(|seen| *seen == event).count()
    }

    fn messages(&self) -> Vec<String> {
        self.seen
            .iter()
            .filter_map(|event| match event {
                NetworkEvent::Message { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

fn wait_until(nodes: &mut [&mut Node], mut done: impl FnMut(&[&mut Node]) -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < TIMEOUT {
        for node in nodes.iter_mut() {
            node.tick();
        }
        if done(nodes) {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

fn settle(nodes: &mut [&mut Node]) {
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(200) {
        for node in nodes.iter_mut() {
            node.tick();
        }
        thread::sleep(Duration::from_millis(5));
    }
}

fn connected(name: &str) -> NetworkEvent {
    NetworkEvent::ClientConnected(name.to_string())
}

fn disconnected(name: &str) -> NetworkEvent {
    NetworkEvent::ClientDisconnected(name.to_string())
}

fn frames_sent(host: &Node) -> Vec<u64> {
    host.net.peer_info().iter().map(|p| p.stats.frames_sent).collect()
}

#[test]
fn client_announces_itself_once() {
    let (mut host, addr) = Node::host("Host");
    let mut alice = Node::join(addr, "Alice");

    assert!(wait_until(&mut [&mut host, &mut alice], |nodes| {
        nodes[0].count(&connected("Alice")) == 1
            && nodes[1].seen.contains(&NetworkEvent::Connected {
                client_name: "Alice".to_string(),
                server_name: "Host".to_string(),
            })
    }));
    settle(&mut [&mut host, &mut alice]);

    assert_eq!(host.count(&connected("Alice")), 1);
    let peers = host.net.peer_info();
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0].peer.index(), 0);
    assert_eq!(peers[0].identity.as_ref().map(|p| p.name.as_str()), Some("Alice"));
    assert_eq!(alice.net.server_name(), Some("Host"));
    assert!(alice.seen.contains(&connected("Host")));
}

#[test]
fn late_joiner_learns_the_roster() {
    let (mut host, addr) = Node::host("Host");
    let mut bob = Node::join(addr, "Bob");
    assert!(wait_until(&mut [&mut host, &mut bob], |nodes| {
        nodes[0].count(&connected("Bob")) == 1
    }));

    let mut carol = Node::join(addr, "Carol");
    assert!(wait_until(&mut [&mut host, &mut bob, &mut carol], |nodes| {
        nodes[2].count(&connected("Host")) == 1
            && nodes[2].count(&connected("Bob")) == 1
            && nodes[1].count(&connected("Carol")) == 1
    }));

    let names: Vec<_> = carol.lobby.players().iter().map(|p| p.name.clone()).collect();
    for name in ["Carol", "Host", "Bob"] {
        assert!(names.iter().any(|n| n == name), "{name} missing from {names:?}");
    }
}

#[test]
fn server_commands_reach_every_client() {
    let (mut host, addr) = Node::host("Host");
    let mut bob = Node::join(addr, "Bob");
    let mut carol = Node::join(addr, "Carol");
    assert!(wait_until(&mut [&mut host, &mut bob, &mut carol], |nodes| {
        nodes[0].count(&connected("Bob")) == 1 && nodes[0].count(&connected("Carol")) == 1
    }));
    settle(&mut [&mut host, &mut bob, &mut carol]);
    let before = frames_sent(&host);

    let tank = EntityId::random();
    let create = WorldCommand::CreateTank {
        id: tank,
        x: 10.0,
        y: 20.0,
        rotation: 0.0,
        player_name: "Host".to_string(),
        color: treads::PlayerColor::Blue,
    };
    host.net.send(create.clone()).unwrap();
    create.execute(&mut host.world);

    assert!(wait_until(&mut [&mut host, &mut bob, &mut carol], |nodes| {
        nodes[1..].iter().all(|node| node.world.contains(tank))
    }));
    settle(&mut [&mut host, &mut bob, &mut carol]);
    for node in [&bob, &carol] {
        let entity = node.world.get_entity(tank).unwrap();
        assert_eq!((entity.position.x, entity.position.y), (10.0, 20.0));
        assert_eq!(entity.player_name(), Some("Host"));
        assert_eq!(node.world.entity_count(), 1);
    }
    let after = frames_sent(&host);
    assert_eq!(after.len(), 2);
    for (before, after) in before.iter().zip(&after) {
        assert_eq!(after - before, 1);
    }
}

#[test]
fn client_commands_are_relayed_to_other_clients() {
    let (mut host, addr) = Node::host("Host");
    let mut bob = Node::join(addr, "Bob");
    let mut carol = Node::join(addr, "Carol");
    assert!(wait_until(&mut [&mut host, &mut bob, &mut carol], |nodes| {
        nodes[0].count(&connected("Bob")) == 1 && nodes[0].count(&connected("Carol")) == 1
    }));

    let tank = EntityId::random();
    let mine = EntityId::random();
    let commands = [
        WorldCommand::CreateTank {
            id: tank,
            x: 40.0,
            y: 40.0,
            rotation: 0.0,
            player_name: "Bob".to_string(),
            color: treads::PlayerColor::Red,
        },
        WorldCommand::CreateActor {
            kind: EntityKind::Mine,
            id: mine,
            x: 64.0,
            y: 40.0,
            rotation: 0.0,
            owner: tank,
        },
    ];
    for command in commands {
        bob.net.send(command.clone()).unwrap();
        command.execute(&mut bob.world);
    }

    assert!(wait_until(&mut [&mut host, &mut bob, &mut carol], |nodes| {
        [0, 2].iter().all(|&i| nodes[i].world.contains(mine))
    }));
    for node in [&host, &carol] {
        assert_eq!(node.world.get_entity(mine).unwrap().owner(), Some(tank));
    }
    assert_eq!(bob.world.entity_count(), 2);
}

#[test]
fn commands_arrive_in_send_order() {
    let (mut host, addr) = Node::host("Host");
    let mut alice = Node::join(addr, "Alice");
    assert!(wait_until(&mut [&mut host, &mut alice], |nodes| {
        nodes[0].count(&connected("Alice")) == 1
    }));

    let expected: Vec<String> = (0..50).map(|n| format!("Host: {n}")).collect();
    for n in 0..50 {
        host.net.send(ApplicationCommand::chat("Host", &n.to_string())).unwrap();
    }

    assert!(wait_until(&mut [&mut host, &mut alice], |nodes| {
        nodes[1].messages().len() == 50
    }));
    assert_eq!(alice.messages(), expected);
}

#[test]
fn chat_is_echoed_locally_and_relayed() {
    let (mut host, addr) = Node::host("Host");
    let mut bob = Node::join(addr, "Bob");
    let mut carol = Node::join(addr, "Carol");
    assert!(wait_until(&mut [&mut host, &mut bob, &mut carol], |nodes| {
        nodes[0].count(&connected("Bob")) == 1 && nodes[0].count(&connected("Carol")) == 1
    }));

    bob.net.send_chat("hello").unwrap();
    let line = NetworkEvent::Message {
        kind: MessageKind::Message,
        text: "Bob: hello".to_string(),
    };
    assert!(wait_until(&mut [&mut host, &mut bob, &mut carol], |nodes| {
        nodes.iter().all(|node| node.count(&line) == 1)
    }));
    settle(&mut [&mut host, &mut bob, &mut carol]);
    assert_eq!(bob.count(&line), 1);
}

#[test]
fn lost_client_is_reported_once() {
    let (mut host, addr) = Node::host("Host");
    let mut alice = Node::join(addr, "Alice");
    let mut bob = Node::join(addr, "Bob");
    assert!(wait_until(&mut [&mut host, &mut alice, &mut bob], |nodes| {
        nodes[0].count(&connected("Alice")) == 1 && nodes[0].count(&connected("Bob")) == 1
    }));

    alice.net.dispose();
    alice.net.dispose();

    let gone = disconnected("Alice");
    assert!(wait_until(&mut [&mut host, &mut bob], |nodes| {
        nodes[0].count(&gone) == 1 && nodes[1].count(&gone) == 1
    }));
    settle(&mut [&mut host, &mut bob]);
    assert_eq!(host.count(&gone), 1);

    host.net.send(ApplicationCommand::chat("Host", "still here")).unwrap();
    host.net.send_to_peer(0, ApplicationCommand::chat("Host", "anyone?")).unwrap();
    assert!(matches!(
        host.net.send_to_peer(7, ApplicationCommand::chat("Host", "?")),
        Err(NetworkError::UnknownPeer(7))
    ));
    assert!(wait_until(&mut [&mut host, &mut bob], |nodes| {
        nodes[1].messages().contains(&"Host: still here".to_string())
    }));
}

#[test]
fn client_notices_server_going_away() {
    let (mut host, addr) = Node::host("Host");
    let mut alice = Node::join(addr, "Alice");
    assert!(wait_until(&mut [&mut host, &mut alice], |nodes| {
        nodes[1].net.server_name() == Some("Host")
    }));

    host.net.dispose();

    let gone = NetworkEvent::ClientDisconnected("Host".to_string());
    assert!(wait_until(&mut [&mut alice], |nodes| nodes[0].count(&gone) == 1));
    settle(&mut [&mut alice]);
    assert_eq!(alice.count(&gone), 1);
    assert!(alice.lobby.chat().any(|line| line == "Disconnected from server"));

    alice.net.send(ApplicationCommand::chat("Alice", "hello?")).unwrap();
}

#[test]
fn start_game_ships_the_map() {
    let (mut host, addr) = Node::host("Host");
    host.world = TestingGround::new().build().unwrap();
    let mut alice = Node::join(addr, "Alice");
    assert!(wait_until(&mut [&mut host, &mut alice], |nodes| {
        nodes[0].count(&connected("Alice")) == 1
    }));

    let world = host.world.clone();
    host.net.start_game(&world, &mut host.lobby, 3).unwrap();
    assert_eq!(host.lobby.state(), LobbyState::Countdown);

    let ready = NetworkEvent::ClientReady("Alice".to_string());
    assert!(wait_until(&mut [&mut host, &mut alice], |nodes| {
        nodes[0].count(&ready) == 1 && nodes[1].count(&NetworkEvent::GameStart(3)) == 1
    }));
    assert_eq!(alice.world.entity_count(), world.entity_count());
    assert_eq!(alice.world.columns(), TestingGround::COLUMNS);
    assert_eq!(alice.lobby.state(), LobbyState::Countdown);
    assert_eq!(alice.count(&ready), 1);
}

#[test]
fn misuse_is_reported() {
    let (mut host, addr) = Node::host("Host");
    let world = World::new(4, 4);

    assert!(matches!(
        host.net.start_game(&world, &mut host.lobby, 3),
        Err(NetworkError::NoClients)
    ));
    assert!(matches!(host.net.start_server("Again"), Err(NetworkError::AlreadyStarted)));
    assert!(matches!(
        host.net.connect(addr, "Self"),
        Err(NetworkError::AlreadyStarted)
    ));

    let mut alice = Node::join(addr, "Alice");
    assert!(matches!(
        alice.net.start_game(&world, &mut alice.lobby, 3),
        Err(NetworkError::NotServer)
    ));
    assert!(matches!(
        alice.net.send_to_peer(0, ApplicationCommand::chat("Alice", "hi")),
        Err(NetworkError::NotServer)
    ));
}

#[test]
fn offline_system_runs_posted_commands() {
    let mut node = Node::new("Solo");
    let tree = EntityId::random();

    node.net
        .send(WorldCommand::DestroyEntity { id: tree })
        .unwrap();
    node.net.post_to_game_thread(WorldCommand::CreateEntity {
        kind: EntityKind::Tree,
        id: tree,
        x: 16.0,
        y: 16.0,
        rotation: 0.0,
    });
    node.net.post_to_game_thread(WorldCommand::MoveEntity {
        id: EntityId::random(),
        x: 0.0,
        y: 0.0,
        rotation: 0.0,
    });
    node.tick();

    assert!(node.world.contains(tree));
    assert!(node.net.inbox().is_empty());
}

#[test]
fn dispose_clears_pending_commands() {
    let (mut host, _addr) = Node::host("Host");
    host.net.post_to_game_thread(ApplicationCommand::StartGame {
        seconds_until_start: 1,
    });
    host.net.dispose();
    host.tick();

    assert_eq!(host.lobby.state(), LobbyState::Waiting);
    assert!(host.net.start_server("Host").is_ok());
}

#[test]
fn peers_cannot_drop_each_other() {
    let (mut host, addr) = Node::host("Host");
    let mut alice = Node::join(addr, "Alice");
    assert!(wait_until(&mut [&mut host, &mut alice], |nodes| {
        nodes[0].count(&connected("Alice")) == 1
    }));
    let mut bob = Node::join(addr, "Bob");
    assert!(wait_until(&mut [&mut host, &mut alice, &mut bob], |nodes| {
        nodes[0].count(&connected("Bob")) == 1
    }));
    let alice_peer = host.net.peer_info()[0].peer;
    assert_eq!(alice_peer, PeerId(0));

    bob.net
        .send(TransportCommand::ConnectionLost { peer: alice_peer })
        .unwrap();
    settle(&mut [&mut host, &mut alice, &mut bob]);

    assert_eq!(host.count(&disconnected("Alice")), 0);
    assert_eq!(bob.count(&disconnected("Alice")), 0);
    assert!(host.net.peer_info().iter().all(|p| p.open));

    alice.net.send_chat("still here").unwrap();
    assert!(wait_until(&mut [&mut host, &mut alice, &mut bob], |nodes| {
        nodes[2].messages().contains(&"Alice: still here".to_string())
    }));
}

#[test]
fn late_joiner_gets_earlier_chat() {
    let (mut host, addr) = Node::host("Host");
    let mut alice = Node::join(addr, "Alice");
    assert!(wait_until(&mut [&mut host, &mut alice], |nodes| {
        nodes[0].count(&connected("Alice")) == 1
    }));
    alice.net.send_chat("anyone for a game?").unwrap();
    host.net.send_chat("give me a minute").unwrap();
    assert!(wait_until(&mut [&mut host, &mut alice], |nodes| {
        nodes[0].messages().contains(&"Alice: anyone for a game?".to_string())
    }));

    let mut carol = Node::join(addr, "Carol");
    assert!(wait_until(&mut [&mut host, &mut alice, &mut carol], |nodes| {
        nodes[2].lobby.chat().any(|line| line == "Host: give me a minute")
    }));
    settle(&mut [&mut host, &mut alice, &mut carol]);

    let chat: Vec<_> = carol.lobby.chat().collect();
    let asked = chat.iter().position(|line| *line == "Alice: anyone for a game?");
    let answered = chat.iter().position(|line| *line == "Host: give me a minute");
    assert!(asked.is_some() && asked < answered, "{chat:?}");

    let is_history = |event: &NetworkEvent| {
        matches!(
            event,
            NetworkEvent::Message {
                kind: MessageKind::LobbyMessageHistory,
                ..
            }
        )
    };
    assert_eq!(carol.seen.iter().filter(|&event| is_history(event)).count(), 1);
    assert!(!alice.seen.iter().any(is_history));
}

#[test]
fn unreadable_frame_drops_only_that_peer() {
    let (mut host, addr) = Node::host("Host");
    let mut bob = Node::join(addr, "Bob");
    assert!(wait_until(&mut [&mut host, &mut bob], |nodes| {
        nodes[0].count(&connected("Bob")) == 1
    }));

    let mut raw = TcpStream::connect(addr).unwrap();
    let hello: Command = ApplicationCommand::ClientConnected {
        player_name: "Mallory".to_string(),
    }
    .into();
    write_frame(&mut raw, &hello.encode().unwrap()).unwrap();
    assert!(wait_until(&mut [&mut host, &mut bob], |nodes| {
        nodes[0].count(&connected("Mallory")) == 1
    }));

    write_frame(&mut raw, &[0xff; 3]).unwrap();
    assert!(wait_until(&mut [&mut host, &mut bob], |nodes| {
        nodes[0].count(&disconnected("Mallory")) == 1
            && nodes[1].count(&disconnected("Mallory")) == 1
    }));
    settle(&mut [&mut host, &mut bob]);
    assert_eq!(host.count(&disconnected("Mallory")), 1);
    assert_eq!(bob.count(&disconnected("Mallory")), 1);

    let peers = host.net.peer_info();
    assert_eq!(peers.iter().map(|p| p.open).collect::<Vec<_>>(), [true, false]);

    raw.set_read_timeout(Some(TIMEOUT)).unwrap();
    let mut rest = Vec::new();
    let _ = raw.read_to_end(&mut rest);

    bob.net.send_chat("who was that?").unwrap();
    assert!(wait_until(&mut [&mut host, &mut bob], |nodes| {
        nodes[0].messages().contains(&"Bob: who was that?".to_string())
    }));
}
