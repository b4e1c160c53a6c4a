//! # Game Client Library
//!
//! Client side of the cube platformer. The client is a thin terminal: it sends
//! its key and mouse state to the server every frame and draws whatever the
//! server last reported. No physics runs here.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! [`game::ClientSession`] owns a mirror of the server frame and applies the
//! INIT, GAME_UPDATE and BLOCK_CHUNK messages to it. The only local change is
//! the view direction of the local player, which follows the mouse right away.
//!
//! ### Input Module (`input`)
//! Samples keyboard and mouse once per frame into the action bitmask and the
//! mouse movement carried by ACTIONS packets.
//!
//! ### Network Module (`network`)
//! A UDP socket served by a background thread so the render loop never waits
//! on the network.
//!
//! ### Rendering Module (`rendering`)
//! First person 3D view of blocks, players and sheep, plus a small HUD.
//!
//! ## Usage Example
//!
//! ```no_run
//! use client::game::ClientSession;
//! use client::network::NetworkClient;
//! use shared::packets::{LoginPacket, Packet};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut network = NetworkClient::connect("127.0.0.1:1350")?;
//! let mut session = ClientSession::new();
//!
//! network.send(&LoginPacket { name: "peter".to_owned() }.encode()?)?;
//! for message in network.messages() {
//!     session.handle_message(&message)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
