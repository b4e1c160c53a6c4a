//! Client-side mirror of the server frame
//!
//! The client never simulates. Its [`Frame`] only changes when a server
//! message is applied through [`ClientSession::handle_message`], with one
//! exception: the local player's view angles, which follow the mouse
//! immediately so the camera does not wait a round trip.
//!
//! Joining is driven by the session too. Until the server has assigned a
//! player and every chunk of the world push has arrived, [`ClientSession::login_due`]
//! asks for the login to be sent again every [`ClientSession::LOGIN_RETRY`].

use glam::Vec2;
use log::{debug, info, warn};
use shared::packets::{
    BlockChunkPacket, GameUpdatePacket, InitPacket, PacketError, ServerMessage,
};
use shared::{Frame, Player, Sheep};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct ClientSession {
    frame: Frame,
    local_player_id: Option<u8>,
    map_seed: Option<u32>,
    updates_received: u64,
    chunks_expected: Option<u16>,
    chunks_received: BTreeSet<u16>,
    last_login: Option<Instant>,
}

impl ClientSession {
    /// Time to wait for the server before sending the login again
    pub const LOGIN_RETRY: Duration = Duration::from_millis(500);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn local_player_id(&self) -> Option<u8> {
        self.local_player_id
    }

    pub fn local_player(&self) -> Option<&Player> {
        self.local_player_id
            .and_then(|id| self.frame.get_player(id))
    }

    pub fn map_seed(&self) -> Option<u32> {
        self.map_seed
    }

    pub fn updates_received(&self) -> u64 {
        self.updates_received
    }

    /// True once the server has assigned us a player
    pub fn is_joined(&self) -> bool {
        self.local_player_id.is_some()
    }

    /// True once every chunk of the latest world push has arrived
    pub fn is_world_loaded(&self) -> bool {
        self.chunks_expected
            .is_some_and(|total| self.chunks_received.len() == usize::from(total))
    }

    /// Joined with the whole world in the mirror
    pub fn is_synced(&self) -> bool {
        self.is_joined() && self.is_world_loaded()
    }

    /// Whether a login should go out at `now`.
    pub fn login_due(&self, now: Instant) -> bool {
        if self.is_synced() {
            return false;
        }
        self.last_login
            .map_or(true, |sent| now.saturating_duration_since(sent) >= Self::LOGIN_RETRY)
    }

    pub fn mark_login_sent(&mut self, now: Instant) {
        self.last_login = Some(now);
    }

    /// Decodes one server datagram and applies it to the mirror.
    pub fn handle_message(&mut self, bytes: &[u8]) -> Result<(), PacketError> {
        match ServerMessage::decode(bytes)? {
            ServerMessage::Init(init) => self.apply_init(init),
            ServerMessage::GameUpdate(update) => self.apply_game_update(update),
            ServerMessage::BlockChunk(chunk) => self.apply_block_chunk(chunk),
        }
        Ok(())
    }

    /// Turns the local camera by a mouse movement.
    pub fn look(&mut self, mouse_changes: Vec2) {
        if let Some(id) = self.local_player_id {
            if let Some(player) = self.frame.get_player_mut(id) {
                player.update_direction(mouse_changes);
            }
        }
    }

    fn apply_init(&mut self, init: InitPacket) {
        info!(
            "Joined as player {} on map seed {}",
            init.player_id, init.map_seed
        );
        self.local_player_id = Some(init.player_id);
        self.map_seed = Some(init.map_seed);
    }

    fn apply_game_update(&mut self, update: GameUpdatePacket) {
        self.updates_received += 1;
        match update.local_player() {
            Some(id) => self.local_player_id = Some(id),
            None => {
                if let Some(id) = self.local_player_id.take() {
                    warn!("Server no longer knows player {}, joining again", id);
                }
            }
        }

        let mut present = BTreeSet::new();
        for info in update.players {
            present.insert(info.id);
            match self.frame.get_player_mut(info.id) {
                Some(player) => {
                    player.set_position(info.position);
                    if player.name() != info.name {
                        player.set_name(info.name);
                    }
                }
                None => {
                    debug!("Player \"{}\" ({}) appeared", info.name, info.id);
                    self.frame
                        .add_player(info.id, &info.name)
                        .set_position(info.position);
                }
            }
        }
        self.frame.players.retain(|id, _| present.contains(id));

        self.frame.sheep = update
            .sheep
            .iter()
            .map(|s| Sheep::new(s.position, s.yaw))
            .collect();

        self.frame
            .blocks
            .apply_remote_diff(&update.block_removes, &update.block_additions);
    }

    fn apply_block_chunk(&mut self, chunk: BlockChunkPacket) {
        debug!(
            "Received chunk {}/{} with {} blocks",
            chunk.index + 1,
            chunk.total,
            chunk.blocks.len()
        );
        if self.chunks_expected != Some(chunk.total) {
            self.chunks_expected = Some(chunk.total);
            self.chunks_received.clear();
        }
        if chunk.index < chunk.total {
            self.chunks_received.insert(chunk.index);
        }
        self.frame.blocks.apply_remote_diff(&[], &chunk.blocks);
    }
}
