//! # Option Sync Server Library
//!
//! This library provides the authoritative server side of lobby option
//! synchronization. A lobby ("room") exposes a set of typed options (map,
//! player speed, task counts, role probabilities, ...) that every connected
//! client mirrors. The server owns the canonical values, validates proposed
//! changes and keeps every mirror in step with ordered, idempotent updates.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Option Store
//! The server holds the single source of truth for the options of a room.
//! Clients only ever propose changes; the result of a proposal is decided
//! here and broadcast to everyone who needs to see it.
//!
//! ### Schema Transitions
//! The set of options is not fixed. The active game mode declares a base
//! schema and its contributors (for example role modules) add options that
//! depend on current values, such as per-role settings that only exist while
//! the role can be rolled. After every change the schema is rebuilt and diffed
//! against the live options until it settles.
//!
//! ### Value Memory
//! Values are remembered per `category.key` even after their option leaves
//! the schema. A rebuilt schema picks them up again, and the room creator's
//! values are saved when they leave and restored when they open a new room.
//!
//! ## Architecture Design
//!
//! ### Single Event Loop Per Room
//! The server processes network events, timeouts and resync ticks one at a
//! time in a `tokio::select!` loop that owns the [`room::Room`]. Engine code is
//! synchronous; sends are queued on an unbounded channel in the order the room
//! committed its state, so chunked updates arrive in order per client.
//!
//! ### UDP-Based Communication
//! Packets are bincode-encoded [`shared::Packet`] datagrams. Large option
//! updates are split into chunks that each fit in one datagram, and an
//! optional periodic full resync repairs mirrors after packet loss.
//!
//! ## Module Organization
//!
//! - `option_store`: live options, the value cache, diffing and applying
//! - `schema`: game mode and contributor traits, schema building, transitions
//! - `validator`: proposal handling with listener veto and revert
//! - `transport`: the delivery seam between the engine and connections
//! - `room`: per-room orchestration of joins, leaves and changes
//! - `gamemode`: the built-in game modes and their contributors
//! - `settings`: typed view of the standard options for game logic
//! - `profile`: saved option preferences per user
//! - `client_manager`: connection tracking and timeouts
//! - `network`: the UDP server loop
//! - `error`: error types
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//! use server::profile::MemoryProfileStore;
//! use server::room::{Room, RoomConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let room = Room::with_builtin_gamemodes(
//!         RoomConfig::default(),
//!         Box::new(MemoryProfileStore::new()),
//!     );
//!
//!     let config = ServerConfig {
//!         bind_addr: "127.0.0.1:8080".to_string(),
//!         ..ServerConfig::default()
//!     };
//!     let mut server = Server::new(config, room).await?;
//!
//!     // Runs until a Shutdown message arrives on the control handle
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! The server uses internal async tasks that handle:
//! - **Network Receiver**: Continuously listens for incoming packets
//! - **Network Sender**: Drains the outgoing queue and fans broadcasts out
//! - **Timeout Checker**: Removes clients that stopped sending heartbeats
//! - **Main Loop**: Feeds joins, leaves and proposals into the room

pub mod client_manager;
pub mod error;
pub mod gamemode;
pub mod network;
pub mod option_store;
pub mod profile;
pub mod room;
pub mod schema;
pub mod settings;
pub mod transport;
pub mod validator;
