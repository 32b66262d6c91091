//! # Runner Match Server Library
//!
//! This library provides the authoritative server for a two-player side-scrolling
//! runner. Two clients share one world: both characters stand at the same x
//! position, obstacles scroll toward them, and each player jumps or crouches to
//! survive. The last survivor wins, or the match is a draw if both fall in the
//! same step.
//!
//! ## Core Responsibilities
//!
//! ### Lobby and Handshakes
//! The first two endpoints to send `Conexion` get a seat and receive `OK`. Any
//! other endpoint receives `Full`. Once both seats have sent `Listo` the match
//! starts and `Empieza` is broadcast. After a match ends, both seats must send
//! `RESET` before the next one begins.
//!
//! ### Authoritative Simulation
//! The server runs the only copy of the world. Clients report inputs as
//! `INPUT;<jump>;<crouch>` and receive a full `SNAP;...` snapshot every tick.
//!
//! ## Architecture Design
//!
//! ### Single-Task Event Loop
//! One task owns the socket and all game state. It alternates between a short
//! bounded receive and a fixed-step simulation tick, so no state is ever shared
//! across tasks. Debug consumers read a cloned [`status::ServerStatus`] from a
//! watch channel instead.
//!
//! ### Text Datagrams over UDP
//! Every message is one small ASCII datagram. Snapshots carry the whole visible
//! state, so a lost datagram is simply superseded by the next one.
//!
//! ## Module Organization
//!
//! - `client_manager`: the two player seats, their handshake flags and buffered input
//! - `game`: match state and the fixed-step simulation
//! - `physics`: rectangles, hitboxes and vertical motion
//! - `session`: message dispatch and the tick, free of any IO
//! - `network`: socket, server loop and shutdown
//! - `status`: read-only debug view
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(ServerConfig::default()).await?;
//!
//!     let shutdown = server.shutdown_handle();
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         shutdown.shutdown();
//!     });
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Security Considerations
//!
//! Seats are bound to source address and port only. There is no authentication,
//! so anyone able to spoof a seated endpoint can act for that player.

pub mod client_manager;
pub mod game;
pub mod network;
pub mod physics;
pub mod session;
pub mod status;
