//! # Game Server Library
//!
//! Authoritative server for the cube racing game. The server owns the only
//! real copy of the world: every player moves, every block changes and every
//! sheep wanders inside [`server::GameServer::tick`], and clients only ever
//! see the result through game update packets.
//!
//! ## Tick Cycle
//!
//! Each tick runs the same fixed sequence on a single task:
//!
//! 1. Accept connections the transport saw since the last tick.
//! 2. Drain every peer's inbound queue in arrival order and dispatch login,
//!    logout and action packets. Malformed packets are logged and dropped
//!    without touching the connection.
//! 3. Drop peers that logged out, went silent for longer than the configured
//!    timeout or were closed by the transport, together with their players.
//! 4. Advance the frame by one physics step.
//! 5. Encode one game update per peer, carrying that peer's own player id,
//!    and queue it. Updates that do not fit the datagram buffer are skipped.
//! 6. Clear the block diff so the next update only carries new edits.
//!
//! All actions received during a tick are applied before that tick's
//! broadcast, so a client never sees its input half a tick late.
//!
//! ## Module Organization
//!
//! ### Transport Module (`transport`)
//! The [`transport::Transport`] trait and its UDP and in-memory
//! implementations. The UDP transport receives and sends on background
//! tokio tasks; the tick loop only touches queues.
//!
//! ### Peers Module (`peers`)
//! Maps connections to player ids, assigns ids and tracks idle time.
//!
//! ### Server Module (`server`)
//! The tick loop itself and its message handlers.
//!
//! ### Config Module (`config`)
//! Runtime settings, filled from the command line by the binary.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::server::GameServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         seed: 1234,
//!         ..ServerConfig::default()
//!     };
//!
//!     // Binds 0.0.0.0:1350 and ticks every 40ms until Ctrl+C
//!     let mut server = GameServer::bind(config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod peers;
pub mod server;
pub mod transport;

pub use config::{ConfigError, ServerConfig};
pub use server::{GameServer, TickStats};
