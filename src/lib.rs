//! # world-session
//!
//! Server-authoritative core for a shared multiplayer world: an account
//! handshake, a named length-delimited packet protocol, chunked transfer of
//! world snapshots, and a per-tile authority over persisted world objects.
//!
//! ## Layout
//! - [`core`]: packet framing, codec and payload serialization
//! - [`protocol`]: payload types, the dispatch table and the account handshake
//! - [`session`]: one connected peer, its send queue and the reader/writer loops
//! - [`transfer`]: upload/download managers for snapshot parts
//! - [`accounts`]: user and faction records and the user store
//! - [`world`]: world-object records, the per-tile lock table and the authority
//! - [`server`] / [`client`]: the two process roles
//! - [`utils`]: compression, logging, metrics and timeouts

pub mod accounts;
pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transfer;
pub mod utils;
pub mod world;

pub use crate::core::packet::Packet;
pub use crate::error::{ProtocolError, Result};
