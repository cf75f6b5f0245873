//! Server network layer handling UDP communications and game loop coordination

use crate::broadcast::Broadcaster;
use crate::client_manager::ClientManager;
use crate::clock::{Clock, SystemClock};
use crate::config::ServerConfig;
use crate::error::GameError;
use crate::game::{GameServices, GameState};
use crate::ids::SequentialIds;
use crate::monster::MonsterCatalog;
use crate::world::World;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{validate_player_name, ConnectionId, Packet, MAX_PACKET_SIZE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Large enough for an init packet carrying the whole map.
pub const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: ConnectionId },
    Shutdown,
}

/// Messages sent from the game loop to the network sender task
#[derive(Debug)]
pub enum GameMessage {
    /// To a raw address, for replies to endpoints that never joined.
    SendPacket { packet: Packet, addr: SocketAddr },
    SendToConnection {
        packet: Packet,
        connection: ConnectionId,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<ConnectionId>,
    },
}

/// Publishes engine facts onto the sender task's queue.
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    game_tx: mpsc::UnboundedSender<GameMessage>,
}

impl ChannelBroadcaster {
    pub fn new(game_tx: mpsc::UnboundedSender<GameMessage>) -> Self {
        Self { game_tx }
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn send_to(&self, connection: ConnectionId, packet: Packet) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::SendToConnection { packet, connection })
        {
            error!("Failed to queue packet for connection {}: {}", connection, e);
        }
    }

    fn broadcast(&self, packet: Packet, exclude: Option<ConnectionId>) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastPacket { packet, exclude })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }
}

/// Main server coordinating networking and the game engine
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game: GameState,
    sync_interval: Duration,
    ai_interval: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    /// Binds the socket and builds the engine with its configured monsters.
    pub async fn new(
        config: &ServerConfig,
        world: World,
        catalog: MonsterCatalog,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_clock(config, world, catalog, Box::new(SystemClock)).await
    }

    /// Like `new`, but the engine reads time from `clock`.
    pub async fn with_clock(
        config: &ServerConfig,
        world: World,
        catalog: MonsterCatalog,
        clock: Box<dyn Clock>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(config.bind_addr()).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        let mut game = GameState::new(
            world,
            catalog,
            GameServices {
                clock,
                ids: Box::new(SequentialIds::new()),
                broadcaster: Box::new(ChannelBroadcaster::new(game_tx.clone())),
                rng: config.rng(),
            },
        );
        let spawned = game.spawn_configured_monsters()?;
        info!("World ready with {} monsters", spawned);

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(
                config.max_clients,
                config.client_timeout(),
            ))),
            game,
            sync_interval: config.sync_interval(),
            ai_interval: config.ai_interval(),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Sender for injecting messages into the main loop, e.g. `Shutdown`.
    pub fn control_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match deserialize::<Packet>(&buffer[..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Failed to deserialize packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        })
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::SendToConnection { packet, connection } => {
                        let addr = clients.read().await.addr_of(connection);
                        let Some(addr) = addr else {
                            debug!("Dropping packet for departed connection {}", connection);
                            continue;
                        };
                        if let Err(e) = send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send to client {}: {}", connection, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = clients.read().await.get_client_addrs();

                        // Encode once for every recipient.
                        let data = match encode(&packet) {
                            Ok(data) => data,
                            Err(e) => {
                                error!("Failed to encode broadcast packet: {}", e);
                                continue;
                            }
                        };

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }
                            if let Err(e) = socket.send_to(&data, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        })
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) -> JoinHandle<()> {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = clients.write().await.check_timeouts();

                for client_id in timed_out {
                    warn!("Client {} timed out", client_id);
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        })
    }

    fn send_error(&self, addr: SocketAddr, message: String) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket {
            packet: Packet::Error { message },
            addr,
        }) {
            error!("Failed to queue error packet: {}", e);
        }
    }

    fn reject(&self, connection: ConnectionId, addr: SocketAddr, err: GameError) {
        debug!("Rejected intent from connection {}: {}", connection, err);
        // The approach step already tells the client what happened.
        if err != GameError::OutOfRange {
            self.send_error(addr, err.to_string());
        }
    }

    /// Turns one client intent into engine calls
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        if let Packet::Join { name } = &packet {
            self.handle_join(name, addr).await;
            return;
        }

        let connection = {
            let mut clients = self.clients.write().await;
            let connection = clients.find_client_by_addr(addr);
            if let Some(id) = connection {
                clients.touch(id);
            }
            connection
        };

        let Some(connection) = connection else {
            debug!("Packet from {} before join", addr);
            if packet.is_intent() && !matches!(packet, Packet::Heartbeat | Packet::Leave) {
                self.send_error(addr, "join first".to_string());
            }
            return;
        };

        match packet {
            Packet::Move { direction, .. } => {
                if let Err(e) = self.game.move_player(connection, direction) {
                    self.reject(connection, addr, e);
                }
            }
            Packet::Attack { target_id } => {
                if let Err(e) = self.game.attack_target(connection, target_id) {
                    self.reject(connection, addr, e);
                }
            }
            Packet::Heartbeat => {}
            Packet::Leave => {
                self.game.leave(connection);
                self.clients.write().await.remove_client(connection);
            }
            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    async fn handle_join(&mut self, name: &str, addr: SocketAddr) {
        if let Err(reason) = validate_player_name(name) {
            self.send_error(addr, GameError::InvalidIntent(reason).to_string());
            return;
        }

        // A repeated join from the same address keeps its connection id.
        let connection = {
            let mut clients = self.clients.write().await;
            match clients.find_client_by_addr(addr) {
                Some(id) => {
                    clients.touch(id);
                    Some(id)
                }
                None => clients.add_client(addr),
            }
        };

        match connection {
            Some(connection) => {
                info!("Join from {} as '{}'", addr, name.trim());
                self.game.join(connection, name);
            }
            None => {
                warn!("Rejecting {}: server full", addr);
                self.send_error(addr, "server full".to_string());
            }
        }
    }

    fn sync_tick(&mut self) {
        let now = self.game.now();
        self.game.process_respawns(now);

        if self.game.player_count() > 0 {
            self.game.broadcast_state();
        }
    }

    fn ai_tick(&mut self) {
        let now = self.game.now();
        let events = self.game.tick_monster_ai(now);
        if !events.is_empty() {
            debug!("AI tick: {} monster attacks", events.len());
        }
    }

    /// Main server loop. Every engine mutation happens on this task.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let tasks = [
            self.spawn_network_receiver(),
            self.spawn_network_sender(),
            self.spawn_timeout_checker(),
        ];

        let mut sync_interval = interval(self.sync_interval);
        sync_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ai_interval = interval(self.ai_interval);
        ai_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            self.game.leave(client_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = sync_interval.tick() => self.sync_tick(),

                _ = ai_interval.tick() => self.ai_tick(),
            }
        }

        for task in &tasks {
            task.abort();
        }
        for task in tasks {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    error!("Network task failed: {}", e);
                }
            }
        }

        Ok(())
    }
}

/// Serializes a packet, refusing anything that cannot travel in one datagram.
fn encode(packet: &Packet) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let data = serialize(packet)?;
    if data.len() > MAX_PACKET_SIZE {
        return Err(format!(
            "packet of {} bytes exceeds the {} byte datagram limit",
            data.len(),
            MAX_PACKET_SIZE
        )
        .into());
    }
    Ok(data)
}

async fn send_packet_impl(
    socket: &UdpSocket,
    packet: &Packet,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = encode(packet)?;
    socket.send_to(&data, addr).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use shared::{Direction, EntityId, MapData, MonsterSpawn, TileData, TILE_SIZE};
    use std::net::{IpAddr, Ipv4Addr};

    fn test_config() -> ServerConfig {
        ServerConfig {
            port: 0,
            seed: Some(1),
            ..ServerConfig::default()
        }
    }

    async fn test_server() -> Server {
        Server::new(&test_config(), World::starter_town(), MonsterCatalog::default())
            .await
            .unwrap()
    }

    fn test_addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 40_001)
    }

    /// Open 8x8 field with a rat one tile east of the spawn point.
    fn duel_world() -> World {
        let grass = TileData {
            sprite_id: 0,
            walkable: true,
            transparent: true,
        };
        World::new(MapData {
            version: "1.0.0".to_string(),
            name: "Duel".to_string(),
            width: 8,
            height: 8,
            spawn_x: 2,
            spawn_y: 2,
            tiles: vec![vec![vec![grass; 8]; 8]],
            monster_spawns: vec![MonsterSpawn {
                monster_type: "rat".to_string(),
                x: 3,
                y: 2,
            }],
        })
        .unwrap()
    }

    async fn duel_server(clock: &ManualClock) -> Server {
        let mut server = Server::with_clock(
            &test_config(),
            duel_world(),
            MonsterCatalog::default(),
            Box::new(clock.clone()),
        )
        .await
        .unwrap();
        let join = Packet::Join {
            name: "Hunter".to_string(),
        };
        server.handle_packet(join, test_addr()).await;
        drain(&mut server);
        server
    }

    fn drain(server: &mut Server) -> Vec<GameMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = server.game_rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    #[test]
    fn test_channel_broadcaster_routes_messages() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let broadcaster = ChannelBroadcaster::new(tx);

        broadcaster.send_to(3, Packet::Heartbeat);
        broadcaster.broadcast(Packet::Leave, Some(4));

        match tokio_test::block_on(rx.recv()) {
            Some(GameMessage::SendToConnection {
                packet: Packet::Heartbeat,
                connection: 3,
            }) => {}
            other => panic!("Unexpected message: {:?}", other),
        }
        match tokio_test::block_on(rx.recv()) {
            Some(GameMessage::BroadcastPacket {
                packet: Packet::Leave,
                exclude: Some(4),
            }) => {}
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_channel_broadcaster_survives_closed_channel() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        ChannelBroadcaster::new(tx).broadcast(Packet::Heartbeat, None);
    }

    #[tokio::test]
    async fn test_server_spawns_configured_monsters() {
        let server = test_server().await;
        assert_eq!(server.game().monster_count(), 4);
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_join_registers_connection() {
        let mut server = test_server().await;
        server
            .handle_packet(
                Packet::Join {
                    name: "Alice".to_string(),
                },
                test_addr(),
            )
            .await;

        assert_eq!(server.game().player_count(), 1);
        assert_eq!(server.clients.read().await.len(), 1);

        // Init to the joiner, then the announcement.
        match server.game_rx.try_recv() {
            Ok(GameMessage::SendToConnection {
                packet: Packet::Init { .. },
                connection: 1,
            }) => {}
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_join_with_bad_name_is_rejected() {
        let mut server = test_server().await;
        server
            .handle_packet(
                Packet::Join {
                    name: "Al".to_string(),
                },
                test_addr(),
            )
            .await;

        assert_eq!(server.game().player_count(), 0);
        match server.game_rx.try_recv() {
            Ok(GameMessage::SendPacket {
                packet: Packet::Error { message },
                addr,
            }) => {
                assert_eq!(addr, test_addr());
                assert!(message.starts_with("invalid intent"));
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_server_full() {
        let config = ServerConfig {
            max_clients: 1,
            ..test_config()
        };
        let mut server = Server::new(&config, World::starter_town(), MonsterCatalog::default())
            .await
            .unwrap();
        let other: SocketAddr = "127.0.0.1:40002".parse().unwrap();

        for addr in [test_addr(), other] {
            server
                .handle_packet(
                    Packet::Join {
                        name: "Player".to_string(),
                    },
                    addr,
                )
                .await;
        }

        assert_eq!(server.game().player_count(), 1);
        let mut saw_full = false;
        while let Ok(message) = server.game_rx.try_recv() {
            if let GameMessage::SendPacket {
                packet: Packet::Error { message },
                addr,
            } = message
            {
                assert_eq!(addr, other);
                assert_eq!(message, "server full");
                saw_full = true;
            }
        }
        assert!(saw_full);
    }

    #[tokio::test]
    async fn test_move_before_join_is_rejected() {
        let mut server = test_server().await;
        server
            .handle_packet(
                Packet::Move {
                    direction: Direction::North,
                    timestamp: 0,
                },
                test_addr(),
            )
            .await;

        assert!(matches!(
            server.game_rx.try_recv(),
            Ok(GameMessage::SendPacket {
                packet: Packet::Error { .. },
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_move_and_leave() {
        let mut server = test_server().await;
        let join = Packet::Join {
            name: "Alice".to_string(),
        };
        server.handle_packet(join, test_addr()).await;
        server
            .handle_packet(
                Packet::Move {
                    direction: Direction::West,
                    timestamp: 1,
                },
                test_addr(),
            )
            .await;

        assert_eq!(server.game().player(1).unwrap().position(), (288, 320));

        server.handle_packet(Packet::Leave, test_addr()).await;
        assert_eq!(server.game().player_count(), 0);
        assert!(server.clients.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_attack_unknown_monster_reports_error() {
        let mut server = test_server().await;
        let join = Packet::Join {
            name: "Alice".to_string(),
        };
        server.handle_packet(join, test_addr()).await;
        while server.game_rx.try_recv().is_ok() {}

        server
            .handle_packet(
                Packet::Attack {
                    target_id: EntityId(999),
                },
                test_addr(),
            )
            .await;

        match server.game_rx.try_recv() {
            Ok(GameMessage::SendPacket {
                packet: Packet::Error { message },
                ..
            }) => assert_eq!(message, "unknown monster 999"),
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sync_tick_publishes_due_respawn() {
        let clock = ManualClock::new(100_000);
        let mut server = duel_server(&clock).await;
        let rat = EntityId(1);

        while server.game().monster(rat).unwrap().is_alive {
            server
                .handle_packet(Packet::Attack { target_id: rat }, test_addr())
                .await;
            clock.advance(1_000);
        }
        drain(&mut server);

        // Killed 1000 ms ago; rats come back after 10000 ms.
        clock.advance(8_999);
        server.sync_tick();
        let messages = drain(&mut server);
        assert_eq!(messages.len(), 1);
        assert!(matches!(
            messages[0],
            GameMessage::BroadcastPacket {
                packet: Packet::GameState { .. },
                exclude: None,
            }
        ));

        clock.advance(1);
        server.sync_tick();
        let messages = drain(&mut server);
        assert_eq!(messages.len(), 2);
        match &messages[0] {
            GameMessage::BroadcastPacket {
                packet: Packet::MonsterRespawned(state),
                exclude: None,
            } => {
                assert_eq!(state.id, rat);
                assert!(state.is_alive);
                assert_eq!(state.health, 20);
                assert_eq!((state.x, state.y), (3 * TILE_SIZE, 2 * TILE_SIZE));
            }
            other => panic!("Unexpected message: {:?}", other),
        }
        match &messages[1] {
            GameMessage::BroadcastPacket {
                packet: Packet::GameState { monsters, .. },
                ..
            } => assert!(monsters[0].is_alive),
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ai_tick_attacks_adjacent_player() {
        let clock = ManualClock::new(100_000);
        let mut server = duel_server(&clock).await;

        server.ai_tick();

        let messages = drain(&mut server);
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            GameMessage::BroadcastPacket {
                packet: Packet::CombatDamage(event),
                exclude: None,
            } => {
                assert_eq!(event.attacker_id, EntityId(1));
                assert_eq!(event.target_id, EntityId(2));
                assert_eq!(event.target_health, 100 - event.damage);
            }
            other => panic!("Unexpected message: {:?}", other),
        }
        assert!(server.game().player(1).unwrap().health < 100);

        // Still on cooldown half a second later.
        clock.advance(500);
        server.ai_tick();
        assert!(drain(&mut server).is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_message_stops_loop() {
        let mut server = test_server().await;
        let control = server.control_handle();
        control.send(ServerMessage::Shutdown).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), server.run()).await;
        assert!(matches!(result, Ok(Ok(()))));

        // Network tasks are gone and no longer hold the socket or sessions.
        assert_eq!(Arc::strong_count(&server.socket), 1);
        assert_eq!(Arc::strong_count(&server.clients), 1);
    }
}
