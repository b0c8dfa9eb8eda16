//! # Option Sync Client Library
//!
//! This library provides the client side of lobby option synchronization: a
//! headless connection that joins a room, mirrors its options and proposes
//! changes on behalf of the user.
//!
//! ## Architecture Overview
//!
//! ### Server Authority
//! The client never decides an option's value. It keeps a mirror that is
//! driven entirely by the `Options` packets the server sends, applying each
//! `Set` and `Delete` operation in arrival order.
//!
//! ### Optimistic Proposals
//! A local change is conformed to the mirrored option's bounds and applied to
//! the mirror immediately, then sent as a `SetOption` proposal. If the server
//! clamps the value further or rejects the change, it answers this connection
//! with a correcting `Set`, which simply overwrites the optimistic value.
//!
//! ### Loss Tolerance
//! Every operation is idempotent. Duplicated chunks, retransmissions and the
//! server's periodic full resync can be applied blindly without corrupting
//! the mirror.
//!
//! ## Module Organization
//!
//! ### Mirror Module (`mirror`)
//! - Applying option operations
//! - Optimistic proposals
//! - Display and parsing of option values
//!
//! ### Network Module (`network`)
//! - UDP socket management and the connect handshake
//! - Heartbeats to keep the connection alive
//! - Sending queued proposals once their options become visible
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let proposals = vec![("Map".to_string(), "Polus".to_string())];
//!     let mut client =
//!         Client::new("127.0.0.1:8080", Some("host".to_string()), proposals, 0).await?;
//!
//!     // Runs until the server disconnects us or Ctrl+C
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod mirror;
pub mod network;
