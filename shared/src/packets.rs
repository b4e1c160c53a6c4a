//! Wire protocol
//!
//! Every datagram is a one-byte [`PacketId`] followed by a bincode body
//! (fixed-width little-endian integers, `u64` length prefixes for strings and
//! lists). One datagram carries exactly one packet and must fit in
//! [`BUFFER_SIZE`](crate::BUFFER_SIZE).

use crate::blocks::BlockAddition;
use crate::frame::Frame;
use crate::player::Actions;
use crate::{MAX_NAME_LEN, NO_PLAYER_ID};
use bincode::Options;
use glam::{IVec3, Vec2, Vec3};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Encoded sizes of the fixed-width parts of a body
const LIST_PREFIX_SIZE: usize = 8;
const PLAYER_INFO_MAX_SIZE: usize = 1 + 12 + LIST_PREFIX_SIZE + MAX_NAME_LEN;
const SHEEP_INFO_SIZE: usize = 12 + 4;
const BLOCK_REMOVE_SIZE: usize = 12;
const BLOCK_ADDITION_SIZE: usize = 12 + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketId {
    Login = 0,
    Logout = 1,
    Actions = 2,
    Init = 3,
    GameUpdate = 4,
    BlockChunk = 5,
}

impl TryFrom<u8> for PacketId {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PacketId::Login),
            1 => Ok(PacketId::Logout),
            2 => Ok(PacketId::Actions),
            3 => Ok(PacketId::Init),
            4 => Ok(PacketId::GameUpdate),
            5 => Ok(PacketId::BlockChunk),
            other => Err(PacketError::UnknownId(other)),
        }
    }
}

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("empty message")]
    Empty,
    #[error("unknown packet id {0}")]
    UnknownId(u8),
    #[error("expected {expected:?} packet, got {found:?}")]
    WrongId { expected: PacketId, found: PacketId },
    #[error("{0:?} packet is not valid in this direction")]
    Unexpected(PacketId),
    #[error("malformed packet body: {0}")]
    Malformed(#[from] bincode::Error),
    #[error("packet of {size} bytes exceeds buffer of {capacity} bytes")]
    Oversized { size: usize, capacity: usize },
}

/// Reads the tag of a raw message without decoding the body.
pub fn peek_id(bytes: &[u8]) -> Result<PacketId, PacketError> {
    let tag = bytes.first().ok_or(PacketError::Empty)?;
    PacketId::try_from(*tag)
}

fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, PacketError> {
    let value = bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(body.len() as u64)
        .reject_trailing_bytes()
        .deserialize(body)?;
    Ok(value)
}

pub trait Packet: Serialize + DeserializeOwned {
    const ID: PacketId;

    fn write_to(&self, out: &mut Vec<u8>) -> Result<(), PacketError> {
        out.push(Self::ID as u8);
        bincode::serialize_into(&mut *out, self)?;
        Ok(())
    }

    fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Size of the encoded packet including the tag
    fn encoded_size(&self) -> Result<usize, PacketError> {
        Ok(1 + bincode::serialized_size(self)? as usize)
    }

    fn from_message(bytes: &[u8]) -> Result<Self, PacketError> {
        let found = peek_id(bytes)?;
        if found != Self::ID {
            return Err(PacketError::WrongId {
                expected: Self::ID,
                found,
            });
        }
        decode_body(&bytes[1..])
    }
}

/// Encodes `packet`, refusing to produce anything larger than `capacity`.
pub fn encode_bounded<P: Packet>(packet: &P, capacity: usize) -> Result<Vec<u8>, PacketError> {
    let size = packet.encoded_size()?;
    if size > capacity {
        return Err(PacketError::Oversized { size, capacity });
    }
    packet.encode()
}

/// Cuts a display name down to [`MAX_NAME_LEN`] bytes without splitting a
/// character.
pub fn truncate_name(name: &str) -> String {
    let mut end = name.len().min(MAX_NAME_LEN);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_owned()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginPacket {
    pub name: String,
}

impl Packet for LoginPacket {
    const ID: PacketId = PacketId::Login;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutPacket;

impl Packet for LogoutPacket {
    const ID: PacketId = PacketId::Logout;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionsPacket {
    pub actions: Actions,
    pub mouse_changes: Vec2,
}

impl Packet for ActionsPacket {
    const ID: PacketId = PacketId::Actions;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitPacket {
    pub player_id: u8,
    pub map_seed: u32,
}

impl Packet for InitPacket {
    const ID: PacketId = PacketId::Init;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: u8,
    pub position: Vec3,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SheepInfo {
    pub position: Vec3,
    pub yaw: f32,
}

/// Authoritative snapshot broadcast once per tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameUpdatePacket {
    pub players: Vec<PlayerInfo>,
    /// Id of the receiving peer's player, [`NO_PLAYER_ID`] if it has none
    pub local_player_id: u8,
    pub sheep: Vec<SheepInfo>,
    pub block_removes: Vec<IVec3>,
    pub block_additions: Vec<BlockAddition>,
}

impl Packet for GameUpdatePacket {
    const ID: PacketId = PacketId::GameUpdate;
}

impl GameUpdatePacket {
    pub fn from_frame(frame: &Frame, local_player_id: Option<u8>) -> Self {
        Self {
            players: frame
                .players
                .values()
                .map(|p| PlayerInfo {
                    id: p.id(),
                    position: p.position(),
                    name: p.name().to_owned(),
                })
                .collect(),
            local_player_id: local_player_id.unwrap_or(NO_PLAYER_ID),
            sheep: frame
                .sheep
                .iter()
                .map(|s| SheepInfo {
                    position: s.position(),
                    yaw: s.yaw(),
                })
                .collect(),
            block_removes: frame.blocks.block_removes().to_vec(),
            block_additions: frame.blocks.block_additions().to_vec(),
        }
    }

    pub fn local_player(&self) -> Option<u8> {
        (self.local_player_id != NO_PLAYER_ID).then_some(self.local_player_id)
    }

    /// Largest encoding an update can reach with this many players and
    /// sheep. Names are at most [`MAX_NAME_LEN`] bytes and every player
    /// removes and places at most one block per tick.
    pub fn max_encoded_size(players: usize, sheep: usize) -> usize {
        let per_player = PLAYER_INFO_MAX_SIZE + BLOCK_REMOVE_SIZE + BLOCK_ADDITION_SIZE;
        1 + 4 * LIST_PREFIX_SIZE + 1 + players * per_player + sheep * SHEEP_INFO_SIZE
    }
}

/// Part of the world pushed to a client right after it joins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockChunkPacket {
    /// Position of this chunk within its push, from 0
    pub index: u16,
    /// Number of chunks in the push
    pub total: u16,
    pub blocks: Vec<BlockAddition>,
}

impl Packet for BlockChunkPacket {
    const ID: PacketId = PacketId::BlockChunk;
}

impl BlockChunkPacket {
    /// Blocks per chunk; 13 bytes each keeps a full chunk inside one datagram
    pub const MAX_BLOCKS: usize = 600;

    pub fn max_encoded_size() -> usize {
        1 + 2 + 2 + LIST_PREFIX_SIZE + Self::MAX_BLOCKS * BLOCK_ADDITION_SIZE
    }
}

/// Anything a client may send
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Login(LoginPacket),
    Logout(LogoutPacket),
    Actions(ActionsPacket),
}

impl ClientMessage {
    pub fn decode(bytes: &[u8]) -> Result<Self, PacketError> {
        match peek_id(bytes)? {
            PacketId::Login => LoginPacket::from_message(bytes).map(ClientMessage::Login),
            PacketId::Logout => LogoutPacket::from_message(bytes).map(ClientMessage::Logout),
            PacketId::Actions => ActionsPacket::from_message(bytes).map(ClientMessage::Actions),
            other => Err(PacketError::Unexpected(other)),
        }
    }
}

/// Anything a server may send
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Init(InitPacket),
    GameUpdate(GameUpdatePacket),
    BlockChunk(BlockChunkPacket),
}

impl ServerMessage {
    pub fn decode(bytes: &[u8]) -> Result<Self, PacketError> {
        match peek_id(bytes)? {
            PacketId::Init => InitPacket::from_message(bytes).map(ServerMessage::Init),
            PacketId::GameUpdate => {
                GameUpdatePacket::from_message(bytes).map(ServerMessage::GameUpdate)
            }
            PacketId::BlockChunk => {
                BlockChunkPacket::from_message(bytes).map(ServerMessage::BlockChunk)
            }
            other => Err(PacketError::Unexpected(other)),
        }
    }
}
