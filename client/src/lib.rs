//! # Runner Bot Client Library
//!
//! Headless client for the two-player runner server. It performs the same
//! handshakes as a human client and then lets an autopilot steer from the
//! snapshots it receives. Useful for load testing, soak runs and for filling a
//! seat when only one person wants to play.
//!
//! ## Module Organization
//!
//! ### Bot Module (`bot`)
//! Decides jump and crouch from the obstacles in a snapshot:
//! - Jump over ground hazards and low flyers
//! - Crouch under mid-altitude flyers
//! - Look-ahead scaled with the current world speed
//!
//! ### Network Module (`network`)
//! Talks to the server over UDP:
//! - `Conexion` and `Listo` repeated until answered
//! - One `INPUT` datagram per tick while a match runs
//! - `RESET` after each finished match, unless disabled
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{Client, ClientOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new(ClientOptions {
//!         max_matches: 3,
//!         ..ClientOptions::default()
//!     })
//!     .await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod network;
