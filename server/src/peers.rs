//! Connection bookkeeping for the game server
//!
//! The registry maps transport connections to the player they control. Game
//! state never holds a connection and the transport never holds a player;
//! this table is the only link between the two.

use crate::transport::ConnectionId;
use log::info;
use shared::NO_PLAYER_ID;
use std::collections::BTreeMap;

/// State the server keeps for one connected peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEntry {
    /// Player controlled by this peer, `None` until it logs in
    pub player_id: Option<u8>,
    /// Set on logout, timeout or transport disconnect; the entry is removed
    /// by the next [`PeerRegistry::prune`]
    pub disconnected: bool,
    /// Last tick a message arrived from this peer
    pub last_seen_tick: u64,
}

impl PeerEntry {
    pub fn new(tick: u64) -> Self {
        Self {
            player_id: None,
            disconnected: false,
            last_seen_tick: tick,
        }
    }

    /// Returns true if nothing arrived for more than `timeout_ticks`.
    pub fn is_timed_out(&self, now: u64, timeout_ticks: u64) -> bool {
        now.saturating_sub(self.last_seen_tick) > timeout_ticks
    }
}

/// Tracks connected peers and hands out player ids
///
/// Ids are assigned monotonically and wrap around, skipping ids still in
/// use. [`NO_PLAYER_ID`] is never assigned since it marks "no player" on
/// the wire.
pub struct PeerRegistry {
    peers: BTreeMap<ConnectionId, PeerEntry>,
    next_player_id: u8,
    max_players: usize,
}

impl PeerRegistry {
    pub fn new(max_players: usize) -> Self {
        Self {
            peers: BTreeMap::new(),
            next_player_id: 0,
            max_players: max_players.min(NO_PLAYER_ID as usize),
        }
    }

    pub fn add_peer(&mut self, connection: ConnectionId, tick: u64) {
        self.peers.insert(connection, PeerEntry::new(tick));
    }

    pub fn get(&self, connection: ConnectionId) -> Option<&PeerEntry> {
        self.peers.get(&connection)
    }

    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.peers.contains_key(&connection)
    }

    pub fn player_id(&self, connection: ConnectionId) -> Option<u8> {
        self.peers.get(&connection).and_then(|p| p.player_id)
    }

    pub fn is_disconnected(&self, connection: ConnectionId) -> bool {
        self.peers.get(&connection).map_or(true, |p| p.disconnected)
    }

    /// Records activity from a peer
    pub fn touch(&mut self, connection: ConnectionId, tick: u64) {
        if let Some(peer) = self.peers.get_mut(&connection) {
            peer.last_seen_tick = tick;
        }
    }

    /// Gives the peer a fresh player id.
    ///
    /// Returns `None` if the peer is unknown or the server is full.
    pub fn assign_player(&mut self, connection: ConnectionId) -> Option<u8> {
        if !self.peers.contains_key(&connection) || self.player_count() >= self.max_players {
            return None;
        }

        let mut candidate = self.next_player_id;
        let player_id = loop {
            if candidate != NO_PLAYER_ID && !self.is_player_id_in_use(candidate) {
                break candidate;
            }
            candidate = candidate.wrapping_add(1);
        };
        self.next_player_id = player_id.wrapping_add(1);

        let peer = self.peers.get_mut(&connection)?;
        peer.player_id = Some(player_id);
        Some(player_id)
    }

    /// Detaches the player from its peer and returns its id.
    pub fn release_player(&mut self, connection: ConnectionId) -> Option<u8> {
        self.peers.get_mut(&connection)?.player_id.take()
    }

    pub fn mark_disconnected(&mut self, connection: ConnectionId) {
        if let Some(peer) = self.peers.get_mut(&connection) {
            peer.disconnected = true;
        }
    }

    /// Marks every peer silent for longer than `timeout_ticks` as
    /// disconnected and returns them.
    pub fn expire_idle(&mut self, now: u64, timeout_ticks: u64) -> Vec<ConnectionId> {
        let mut expired = Vec::new();
        for (&connection, peer) in self.peers.iter_mut() {
            if !peer.disconnected && peer.is_timed_out(now, timeout_ticks) {
                info!("Peer {:?} timed out", connection);
                peer.disconnected = true;
                expired.push(connection);
            }
        }
        expired
    }

    /// Removes disconnected peers, returning each one with the player it
    /// still owned.
    pub fn prune(&mut self) -> Vec<(ConnectionId, Option<u8>)> {
        let disconnected: Vec<ConnectionId> = self
            .peers
            .iter()
            .filter(|(_, peer)| peer.disconnected)
            .map(|(&connection, _)| connection)
            .collect();

        disconnected
            .into_iter()
            .filter_map(|connection| {
                self.peers
                    .remove(&connection)
                    .map(|peer| (connection, peer.player_id))
            })
            .collect()
    }

    /// Connections in ascending order
    pub fn connections(&self) -> Vec<ConnectionId> {
        self.peers.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConnectionId, &PeerEntry)> {
        self.peers.iter().map(|(&connection, peer)| (connection, peer))
    }

    fn is_player_id_in_use(&self, player_id: u8) -> bool {
        self.peers
            .values()
            .any(|peer| peer.player_id == Some(player_id))
    }

    pub fn player_count(&self) -> usize {
        self.peers
            .values()
            .filter(|peer| peer.player_id.is_some())
            .count()
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
