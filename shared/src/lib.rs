//! # Shared simulation and protocol
//!
//! Everything the server and the client must agree on lives here: the block
//! world, entity physics, the frame aggregate and the binary packet codec.
//! Nothing in this crate does I/O; the server drives [`frame::Frame::tick`]
//! and the client only decodes packets into its own [`frame::Frame`] mirror.
//!
//! All physics constants are expressed per tick, not per second. The server
//! ticks every [`TICK_MS`] milliseconds.

pub mod blocks;
pub mod body;
pub mod cuboid;
pub mod frame;
pub mod generation;
pub mod hook;
pub mod packets;
pub mod player;
pub mod sheep;

pub use blocks::{BlockAddition, BlockContainer, BlockType, WorldBlock};
pub use cuboid::Cuboid;
pub use frame::Frame;
pub use hook::HookState;
pub use packets::PacketError;
pub use player::{Actions, Player};
pub use sheep::Sheep;

use glam::Vec3;

// Networking
pub const DEFAULT_PORT: u16 = 1350;
pub const TICK_MS: u64 = 40;
/// Capacity of one datagram; larger packets are never sent
pub const BUFFER_SIZE: usize = 8192;
pub const MAX_NAME_LEN: usize = 16;
/// Wire value for "no player assigned"; never handed out as an id
pub const NO_PLAYER_ID: u8 = u8::MAX;

// Movement
pub const GRAVITY: f32 = 0.04;
pub const MAX_FALL_SPEED: f32 = 0.9;
pub const PLAYER_JUMP_SPEED: f32 = 0.28;
pub const PLAYER_ACCELERATION: f32 = 0.1;
pub const PLAYER_DRAG: f32 = 0.03;
pub const MAX_PLAYER_SPEED: f32 = 0.2;
pub const PLAYER_ROTATE_SPEED: f32 = 0.05;
pub const MAX_PITCH: f32 = 89.0;
pub const CAMERA_OFFSET: Vec3 = Vec3::new(0.0, 0.4, 0.0);

// Bodies and colliders
pub const BODY_HALF_SIZE: f32 = 0.5;
pub const COLLIDER_OFFSET: f32 = 0.4;
pub const COLLIDER_THICKNESS: f32 = 0.1;
pub const COLLIDER_DIMENSION: f32 = 0.2;
/// Distance from a resolved block center to the body center after a snap
pub const SNAP_DISTANCE: f32 = 0.99;
/// Bodies this far below the lowest block are respawned
pub const VOID_DEPTH: f32 = 100.0;

// Hook
pub const HOOK_RANGE: f32 = 15.0;
pub const HOOK_SPEED: f32 = 2.5;
pub const HOOK_ACCELERATION: f32 = 0.05;
pub const HOOK_DRAG: f32 = 0.1;

// Block editing
pub const EDIT_REACH: f32 = 5.0;

// Sheep
pub const SHEEP_SPEED: f32 = 0.03;
pub const SHEEP_TURN_DEGREES: f32 = 8.0;
