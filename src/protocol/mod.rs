//! # Protocol Layer
//!
//! Packet names and payloads, the name-based dispatcher, and the account
//! handshake.
//!
//! ## Handshake
//! A client opens with either `RegisterPacket` or `LoginPacket`. The server
//! answers with a single `LoginResponsePacket`; anything but
//! `LoginResponse::Login` is followed by a disconnect.
//!
//! ## Snapshot exchange
//! ```text
//! sender                                 receiver
//!   | ReceiveSavePartPacket (part 1)  ->   |
//!   | <-  RequestSavePartPacket            |
//!   | ReceiveSavePartPacket (part 2)  ->   |
//!   |            ...                       |
//!   | ReceiveSavePartPacket (last)    ->   |  promote
//! ```

pub mod dispatcher;
pub mod handshake;
pub mod message;
