use shared::packets::{BlockChunkPacket, GameUpdatePacket};
use shared::{BUFFER_SIZE, DEFAULT_PORT, NO_PLAYER_ID, TICK_MS};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at most {limit} players can be addressed, {requested} requested")]
    TooManyPlayers { requested: usize, limit: usize },
    #[error(
        "a game update for {players} players and {sheep} sheep can reach {size} bytes, \
         buffer is {capacity} bytes (at most {capacity_players} players fit)"
    )]
    UpdateTooLarge {
        players: usize,
        sheep: usize,
        size: usize,
        capacity: usize,
        capacity_players: usize,
    },
    #[error("block chunks need {size} bytes, buffer is {capacity} bytes")]
    BufferTooSmall { size: usize, capacity: usize },
}

/// Runtime settings for a [`GameServer`](crate::server::GameServer)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Wall-clock length of one simulation tick
    pub tick: Duration,
    /// Seed for course generation and sheep wandering
    pub seed: u32,
    pub sheep: usize,
    pub max_players: usize,
    /// Peers silent for longer than this are dropped
    pub peer_timeout: Duration,
    /// Largest datagram the server will send
    pub buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: DEFAULT_PORT,
            tick: Duration::from_millis(TICK_MS),
            seed: 0,
            sheep: 40,
            max_players: 64,
            peer_timeout: Duration::from_secs(5),
            buffer_size: BUFFER_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// How many players fit in one game update next to the configured
    /// sheep, never more than the id space allows
    pub fn player_capacity(&self) -> usize {
        let fixed = GameUpdatePacket::max_encoded_size(0, self.sheep);
        let per_player =
            GameUpdatePacket::max_encoded_size(1, 0) - GameUpdatePacket::max_encoded_size(0, 0);
        let fitting = self.buffer_size.saturating_sub(fixed) / per_player;
        fitting.min(NO_PLAYER_ID as usize)
    }

    /// Checks that every packet the server can produce fits the buffer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_players > NO_PLAYER_ID as usize {
            return Err(ConfigError::TooManyPlayers {
                requested: self.max_players,
                limit: NO_PLAYER_ID as usize,
            });
        }

        let size = GameUpdatePacket::max_encoded_size(self.max_players, self.sheep);
        if size > self.buffer_size {
            return Err(ConfigError::UpdateTooLarge {
                players: self.max_players,
                sheep: self.sheep,
                size,
                capacity: self.buffer_size,
                capacity_players: self.player_capacity(),
            });
        }

        let size = BlockChunkPacket::max_encoded_size();
        if size > self.buffer_size {
            return Err(ConfigError::BufferTooSmall {
                size,
                capacity: self.buffer_size,
            });
        }
        Ok(())
    }

    /// The peer timeout expressed in whole ticks, at least one
    pub fn timeout_ticks(&self) -> u64 {
        let tick = self.tick.as_millis().max(1);
        ((self.peer_timeout.as_millis() / tick) as u64).max(1)
    }
}
