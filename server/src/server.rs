//! Authoritative tick loop

use crate::config::ServerConfig;
use crate::peers::PeerRegistry;
use crate::transport::{ConnectionId, Transport, TransportError, UdpTransport};
use log::{debug, error, info, warn};
use shared::frame::TickReport;
use shared::packets::{
    encode_bounded, truncate_name, ActionsPacket, BlockChunkPacket, ClientMessage,
    GameUpdatePacket, InitPacket, Packet, PacketError,
};
use shared::{Frame, NO_PLAYER_ID};
use tokio::time::{interval, MissedTickBehavior};

/// How often the run loop logs tick statistics
const STATS_EVERY_TICKS: u64 = 25;

/// What one call to [`GameServer::tick`] did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickStats {
    pub tick: u64,
    pub peers: usize,
    pub players: usize,
    pub packets_sent: usize,
    pub packets_skipped: usize,
    pub report: TickReport,
}

pub struct GameServer<T: Transport> {
    transport: T,
    peers: PeerRegistry,
    frame: Frame,
    config: ServerConfig,
    tick: u64,
}

impl GameServer<UdpTransport> {
    /// Binds a UDP transport on the configured address.
    pub async fn bind(config: ServerConfig) -> Result<Self, TransportError> {
        let transport = UdpTransport::bind(&config.address()).await?;
        Ok(Self::new(transport, config))
    }
}

impl<T: Transport> GameServer<T> {
    pub fn new(transport: T, config: ServerConfig) -> Self {
        info!(
            "Generating course with seed {} and {} sheep",
            config.seed, config.sheep
        );
        let frame = Frame::generate(config.seed, config.sheep);
        info!("Course has {} blocks", frame.blocks.len());

        Self {
            transport,
            peers: PeerRegistry::new(config.max_players),
            frame,
            config,
            tick: 0,
        }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn frame_mut(&mut self) -> &mut Frame {
        &mut self.frame
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn map_seed(&self) -> u32 {
        self.config.seed
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Runs one full server cycle: accept, drain, prune, simulate, broadcast.
    pub fn tick(&mut self) -> TickStats {
        self.tick += 1;

        for connection in self.transport.accept() {
            debug!("Accepted {:?}", connection);
            self.peers.add_peer(connection, self.tick);
        }

        self.drain_messages();
        self.drop_stale_peers();

        let report = self.frame.tick();

        let (packets_sent, packets_skipped) = self.broadcast_game_update();
        self.frame.blocks.clear_diff();

        TickStats {
            tick: self.tick,
            peers: self.peers.len(),
            players: self.frame.players.len(),
            packets_sent,
            packets_skipped,
            report,
        }
    }

    /// Drives [`tick`](Self::tick) at the configured rate until Ctrl-C.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut tick_interval = interval(self.config.tick);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        info!("Server started, ticking every {:?}", self.config.tick);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    let stats = self.tick();
                    if stats.tick % STATS_EVERY_TICKS == 0 {
                        debug!(
                            "Tick {}: {} peers, {} players, {} sent, {} skipped",
                            stats.tick, stats.peers, stats.players,
                            stats.packets_sent, stats.packets_skipped
                        );
                    }
                }
                result = &mut shutdown => {
                    result?;
                    info!("Received Ctrl+C, shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    fn drain_messages(&mut self) {
        for connection in self.peers.connections() {
            let messages = self.transport.receive(connection);
            if messages.is_empty() {
                continue;
            }
            self.peers.touch(connection, self.tick);

            for bytes in messages {
                if self.peers.is_disconnected(connection) {
                    break;
                }
                self.handle_message(connection, &bytes);
            }
        }
    }

    fn drop_stale_peers(&mut self) {
        for connection in self.transport.take_disconnected() {
            info!("Transport closed {:?}", connection);
            self.peers.mark_disconnected(connection);
        }
        self.peers.expire_idle(self.tick, self.config.timeout_ticks());

        for (connection, player_id) in self.peers.prune() {
            if let Some(player_id) = player_id {
                if let Some(player) = self.frame.remove_player(player_id) {
                    info!("Player \"{}\" ({}) left", player.name(), player_id);
                }
            }
            self.transport.disconnect(connection);
        }
    }

    fn handle_message(&mut self, connection: ConnectionId, bytes: &[u8]) {
        match ClientMessage::decode(bytes) {
            Ok(ClientMessage::Login(login)) => self.handle_login(connection, &login.name),
            Ok(ClientMessage::Logout(_)) => self.handle_logout(connection),
            Ok(ClientMessage::Actions(actions)) => self.handle_actions(connection, actions),
            Err(e) => warn!("Discarding message from {:?}: {}", connection, e),
        }
    }

    fn handle_login(&mut self, connection: ConnectionId, name: &str) {
        let name = truncate_name(name);

        let player_id = match self.peers.player_id(connection) {
            Some(player_id) => {
                if let Some(player) = self.frame.get_player_mut(player_id) {
                    player.set_name(name.as_str());
                }
                player_id
            }
            None => match self.peers.assign_player(connection) {
                Some(player_id) => {
                    self.frame.add_player(player_id, &name);
                    info!("Player \"{}\" joined as {}", name, player_id);
                    player_id
                }
                None => {
                    warn!(
                        "Server full ({} players), refusing \"{}\"",
                        self.peers.max_players(),
                        name
                    );
                    self.peers.mark_disconnected(connection);
                    return;
                }
            },
        };

        self.send_init(connection, player_id);
        self.send_world(connection);
    }

    fn handle_logout(&mut self, connection: ConnectionId) {
        match self.peers.release_player(connection) {
            Some(player_id) => {
                if let Some(player) = self.frame.remove_player(player_id) {
                    info!("Player \"{}\" ({}) logged out", player.name(), player_id);
                }
            }
            None => warn!("Logout from {:?} without a player", connection),
        }
        self.peers.mark_disconnected(connection);
    }

    fn handle_actions(&mut self, connection: ConnectionId, packet: ActionsPacket) {
        if !packet.mouse_changes.is_finite() {
            warn!(
                "Discarding actions from {:?}: mouse movement {} is not finite",
                connection, packet.mouse_changes
            );
            return;
        }
        let Some(player_id) = self.peers.player_id(connection) else {
            warn!("Actions from {:?} without a player", connection);
            return;
        };
        let Some(player) = self.frame.get_player_mut(player_id) else {
            warn!("Actions for unknown player {}", player_id);
            return;
        };

        player.set_actions(packet.actions);
        player.update_direction(packet.mouse_changes);
    }

    fn send_init(&mut self, connection: ConnectionId, player_id: u8) {
        let init = InitPacket {
            player_id,
            map_seed: self.config.seed,
        };

        let result = init
            .encode()
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                self.transport
                    .send(connection, &bytes)
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = result {
            error!("Failed to send init to {:?}: {}", connection, e);
        }
    }

    /// Pushes the whole block container to a freshly joined peer.
    fn send_world(&mut self, connection: ConnectionId) {
        let mut chunks = self.frame.blocks.chunks(BlockChunkPacket::MAX_BLOCKS);
        // An empty world still gets one chunk so the client knows it is complete
        if chunks.is_empty() {
            chunks.push(Vec::new());
        }
        let count = chunks.len();
        let Ok(total) = u16::try_from(count) else {
            error!("World needs {} chunks, more than a push can number", count);
            return;
        };

        for (index, blocks) in (0..total).zip(chunks) {
            let packet = BlockChunkPacket {
                index,
                total,
                blocks,
            };
            match encode_bounded(&packet, self.config.buffer_size) {
                Ok(bytes) => self.transport.async_send(connection, bytes),
                Err(e) => error!("Skipping block chunk for {:?}: {}", connection, e),
            }
        }
        debug!("Sent world to {:?} in {} chunks", connection, count);
    }

    /// Sends every peer the current frame with its own local player id.
    /// Returns how many packets were sent and skipped.
    fn broadcast_game_update(&mut self) -> (usize, usize) {
        if self.peers.is_empty() {
            return (0, 0);
        }

        let mut packet = GameUpdatePacket::from_frame(&self.frame, None);
        let mut sent = 0;
        let mut skipped = 0;

        for (connection, peer) in self.peers.iter() {
            packet.local_player_id = peer.player_id.unwrap_or(NO_PLAYER_ID);

            match encode_bounded(&packet, self.config.buffer_size) {
                Ok(bytes) => {
                    self.transport.async_send(connection, bytes);
                    sent += 1;
                }
                Err(PacketError::Oversized { size, capacity }) => {
                    error!(
                        "Game update for {:?} is {} bytes, buffer is {}; not sent",
                        connection, size, capacity
                    );
                    skipped += 1;
                }
                Err(e) => {
                    error!("Failed to encode game update: {}", e);
                    skipped += 1;
                }
            }
        }

        (sent, skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemoryPeer, MemoryTransport};
    use assert_approx_eq::assert_approx_eq;
    use glam::{IVec3, Vec2};
    use shared::packets::{LoginPacket, LogoutPacket, PacketId, ServerMessage};
    use shared::{Actions, BlockType};
    use std::time::Duration;

    fn test_server() -> GameServer<MemoryTransport> {
        let config = ServerConfig {
            seed: 42,
            sheep: 2,
            max_players: 4,
            ..ServerConfig::default()
        };
        GameServer::new(MemoryTransport::new(), config)
    }

    fn login(peer: &MemoryPeer, name: &str) {
        peer.send(
            LoginPacket {
                name: name.to_owned(),
            }
            .encode()
            .unwrap(),
        );
    }

    fn decode_all(peer: &MemoryPeer) -> Vec<ServerMessage> {
        peer.receive()
            .iter()
            .map(|bytes| ServerMessage::decode(bytes).unwrap())
            .collect()
    }

    fn last_update(messages: &[ServerMessage]) -> GameUpdatePacket {
        messages
            .iter()
            .rev()
            .find_map(|m| match m {
                ServerMessage::GameUpdate(update) => Some(update.clone()),
                _ => None,
            })
            .expect("no game update received")
    }

    #[test]
    fn test_login_sends_init_then_world() {
        let mut server = test_server();
        let peer = server.transport().connect();
        login(&peer, "peter");

        let stats = server.tick();
        assert_eq!(stats.players, 1);

        let messages = decode_all(&peer);
        let ServerMessage::Init(init) = &messages[0] else {
            panic!("first message should be init, got {:?}", messages[0]);
        };
        assert_eq!(init.map_seed, 42);
        assert_eq!(
            server.frame().get_player(init.player_id).map(|p| p.name()),
            Some("peter")
        );

        let chunked: usize = messages
            .iter()
            .filter_map(|m| match m {
                ServerMessage::BlockChunk(chunk) => Some(chunk.blocks.len()),
                _ => None,
            })
            .sum();
        assert_eq!(chunked, server.frame().blocks.len());

        let numbering: Vec<(u16, u16)> = messages
            .iter()
            .filter_map(|m| match m {
                ServerMessage::BlockChunk(chunk) => Some((chunk.index, chunk.total)),
                _ => None,
            })
            .collect();
        let total = numbering.len() as u16;
        assert!(total >= 1);
        assert!(numbering
            .iter()
            .enumerate()
            .all(|(i, &(index, t))| index == i as u16 && t == total));

        let update = last_update(&messages);
        assert_eq!(update.local_player(), Some(init.player_id));
        assert_eq!(update.players[0].name, "peter");
    }

    #[test]
    fn test_logout_removes_player_from_broadcasts() {
        let mut server = test_server();
        let peter = server.transport().connect();
        let watcher = server.transport().connect();
        login(&peter, "peter");
        login(&watcher, "watcher");
        server.tick();
        peter.receive();
        watcher.receive();

        peter.send(LogoutPacket.encode().unwrap());
        server.tick();

        assert!(peter.is_closed());
        assert_eq!(server.peers().len(), 1);
        let update = last_update(&decode_all(&watcher));
        let names: Vec<&str> = update.players.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["watcher"]);
    }

    #[test]
    fn test_malformed_message_keeps_connection() {
        let mut server = test_server();
        let peer = server.transport().connect();
        peer.send(vec![]);
        peer.send(vec![PacketId::Login as u8, 0xff]);
        peer.send(vec![77]);
        login(&peer, "peter");

        server.tick();
        assert_eq!(server.frame().players.len(), 1);
        assert!(!peer.is_closed());
    }

    #[test]
    fn test_actions_without_player_are_ignored() {
        let mut server = test_server();
        let peer = server.transport().connect();
        peer.send(
            ActionsPacket {
                actions: Actions::FORWARD,
                mouse_changes: Vec2::new(10.0, 0.0),
            }
            .encode()
            .unwrap(),
        );
        peer.send(LogoutPacket.encode().unwrap());

        let stats = server.tick();
        assert_eq!(stats.players, 0);
        assert_eq!(server.peers().len(), 0);
    }

    #[test]
    fn test_actions_drive_player() {
        let mut server = test_server();
        let peer = server.transport().connect();
        login(&peer, "runner");
        server.tick();
        let player_id = server.peers().player_id(peer.connection()).unwrap();
        for _ in 0..5 {
            server.tick();
        }
        let start = server.frame().get_player(player_id).unwrap().position();

        peer.send(
            ActionsPacket {
                actions: Actions::FORWARD,
                mouse_changes: Vec2::ZERO,
            }
            .encode()
            .unwrap(),
        );
        for _ in 0..5 {
            server.tick();
        }

        let player = server.frame().get_player(player_id).unwrap();
        assert_eq!(player.actions(), Actions::FORWARD);
        assert!(player.position().x > start.x);
        assert_approx_eq!(player.position().z, start.z, 1e-4);
    }

    #[test]
    fn test_non_finite_mouse_actions_are_discarded() {
        let mut server = test_server();
        let peer = server.transport().connect();
        login(&peer, "glitch");
        server.tick();
        let player_id = server.peers().player_id(peer.connection()).unwrap();

        peer.send(
            ActionsPacket {
                actions: Actions::FORWARD,
                mouse_changes: Vec2::new(f32::NAN, 0.0),
            }
            .encode()
            .unwrap(),
        );
        for _ in 0..50 {
            server.tick();
        }

        let player = server.frame().get_player(player_id).unwrap();
        assert!(player.position().is_finite());
        assert!(player.view_angles().is_finite());
        assert_eq!(player.actions(), Actions::NONE);
        assert!(!peer.is_closed());

        let update = last_update(&decode_all(&peer));
        assert!(update.players.iter().all(|p| p.position.is_finite()));
    }

    #[test]
    fn test_full_server_refuses_login() {
        let config = ServerConfig {
            max_players: 1,
            sheep: 0,
            ..ServerConfig::default()
        };
        let mut server = GameServer::new(MemoryTransport::new(), config);
        let first = server.transport().connect();
        let second = server.transport().connect();
        login(&first, "first");
        login(&second, "second");

        server.tick();
        assert_eq!(server.frame().players.len(), 1);
        assert!(second.is_closed());
        assert!(decode_all(&second).is_empty());
        assert!(!first.is_closed());
    }

    #[test]
    fn test_relogin_renames_and_resends_init() {
        let mut server = test_server();
        let peer = server.transport().connect();
        login(&peer, "peter");
        server.tick();
        peer.receive();

        login(&peer, "pete");
        server.tick();

        assert_eq!(server.frame().players.len(), 1);
        let messages = decode_all(&peer);
        assert!(matches!(messages[0], ServerMessage::Init(_)));
        assert_eq!(last_update(&messages).players[0].name, "pete");
    }

    #[test]
    fn test_idle_peer_expires() {
        let config = ServerConfig {
            tick: Duration::from_millis(40),
            peer_timeout: Duration::from_millis(200),
            sheep: 0,
            ..ServerConfig::default()
        };
        let mut server = GameServer::new(MemoryTransport::new(), config);
        let peer = server.transport().connect();
        login(&peer, "sleepy");
        server.tick();

        for _ in 0..5 {
            server.tick();
        }
        assert_eq!(server.frame().players.len(), 1);

        server.tick();
        assert!(server.frame().players.is_empty());
        assert!(peer.is_closed());
    }

    #[test]
    fn test_transport_disconnect_removes_player() {
        let mut server = test_server();
        let peer = server.transport().connect();
        login(&peer, "peter");
        server.tick();

        peer.close();
        let stats = server.tick();
        assert_eq!(stats.players, 0);
        assert_eq!(stats.peers, 0);
    }

    #[test]
    fn test_oversized_update_is_skipped_and_diff_cleared() {
        let config = ServerConfig {
            sheep: 0,
            buffer_size: 64,
            ..ServerConfig::default()
        };
        let mut server = GameServer::new(MemoryTransport::new(), config);
        let peer = server.transport().connect();
        login(&peer, "a_rather_long_name");
        server.tick();
        peer.receive();

        server
            .frame_mut()
            .blocks
            .add_block(IVec3::new(0, 40, 0), BlockType::Platform);
        let stats = server.tick();

        assert_eq!(stats.packets_sent, 0);
        assert_eq!(stats.packets_skipped, 1);
        assert!(server.frame().blocks.block_additions().is_empty());
        assert!(peer.receive().is_empty());
    }

    #[test]
    fn test_empty_world_sends_one_empty_chunk() {
        let mut server = test_server();
        let cells: Vec<IVec3> = server.frame().blocks.iter().map(|b| b.position).collect();
        for position in cells {
            server.frame_mut().blocks.remove_block(position);
        }
        let peer = server.transport().connect();
        login(&peer, "void");
        server.tick();

        let chunks: Vec<BlockChunkPacket> = decode_all(&peer)
            .into_iter()
            .filter_map(|m| match m {
                ServerMessage::BlockChunk(chunk) => Some(chunk),
                _ => None,
            })
            .collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!((chunks[0].index, chunks[0].total), (0, 1));
        assert!(chunks[0].blocks.is_empty());
    }

    #[test]
    fn test_largest_accepted_config_never_skips_updates() {
        let config = ServerConfig {
            seed: 5,
            ..ServerConfig::default()
        };
        let config = ServerConfig {
            max_players: config.player_capacity(),
            ..config
        };
        assert_eq!(config.validate(), Ok(()));
        let players = config.max_players;

        let mut server = GameServer::new(MemoryTransport::new(), config);
        let peers: Vec<MemoryPeer> = (0..players)
            .map(|i| {
                let peer = server.transport().connect();
                login(&peer, &format!("{:0>16}", i));
                peer
            })
            .collect();
        for i in 0..players as i32 {
            server
                .frame_mut()
                .blocks
                .add_block(IVec3::new(i, 201, 0), BlockType::Platform);
        }
        let stats = server.tick();
        assert_eq!(stats.players, players);
        for peer in &peers {
            peer.receive();
        }

        // One removal and one addition per player on top of every player and sheep
        for i in 0..players as i32 {
            let blocks = &mut server.frame_mut().blocks;
            blocks.remove_block(IVec3::new(i, 201, 0));
            blocks.add_block(IVec3::new(i, 200, 0), BlockType::Platform);
        }
        let stats = server.tick();

        assert_eq!(stats.packets_skipped, 0);
        assert_eq!(stats.packets_sent, players);
        let update = last_update(&decode_all(&peers[0]));
        assert_eq!(update.players.len(), players);
        assert_eq!(update.block_removes.len(), players);
        assert_eq!(update.block_additions.len(), players);
    }

    #[test]
    fn test_block_edits_reach_every_peer() {
        let mut server = test_server();
        let a = server.transport().connect();
        let b = server.transport().connect();
        login(&a, "a");
        login(&b, "b");
        server.tick();
        a.receive();
        b.receive();

        server.frame_mut().blocks.remove_block(IVec3::new(0, 0, 0));
        server.tick();

        for peer in [&a, &b] {
            let update = last_update(&decode_all(peer));
            assert_eq!(update.block_removes, vec![IVec3::new(0, 0, 0)]);
        }

        server.tick();
        let update = last_update(&decode_all(&a));
        assert!(update.block_removes.is_empty());
    }
}
