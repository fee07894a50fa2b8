//! # Error Types
//!
//! Error handling for sessions, transfers and the world-object authority.
//!
//! ## Error Categories
//! - **Protocol violations**: malformed frames, out-of-order or corrupted transfer
//!   parts. Fatal to the connection that produced them.
//! - **Rejections**: authorization denials and resource conflicts raised by the
//!   world-object authority. Reported to the requester, connection stays open.
//! - **Unexpected**: disk I/O, serialization and compression failures. Logged at
//!   the task boundary, never crash the owning loop.
//!
//! ## Example Usage
//! ```rust
//! use world_session::error::{ProtocolError, Result};
//! use std::fs::File;
//! use std::io::Read;
//! use tracing::{info, error};
//!
//! fn read_file(path: &str) -> Result<String> {
//!     let mut file = File::open(path).map_err(ProtocolError::Io)?;
//!     let mut contents = String::new();
//!     file.read_to_string(&mut contents).map_err(ProtocolError::Io)?;
//!     Ok(contents)
//! }
//!
//! fn main() {
//!     match read_file("example.txt") {
//!         Ok(contents) => info!(contents, "Successfully read file"),
//!         Err(e) => error!(error=%e, "Error reading file"),
//!     }
//! }
//! ```

use crate::protocol::message::Rejection;
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Framing errors
    pub const ERR_INVALID_HEADER: &str = "Invalid protocol header";
    pub const ERR_OVERSIZED_PACKET: &str = "Packet exceeds maximum size";
    pub const ERR_INVALID_TYPE_NAME: &str = "Packet type name is not valid UTF-8";

    /// Connection errors
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";
    pub const ERR_CONNECTION_TIMEOUT: &str = "Connection timed out (no activity)";
    pub const ERR_TIMEOUT: &str = "Operation timed out";

    /// Compression errors
    pub const ERR_COMPRESSION_FAILED: &str = "Compression failed";
    pub const ERR_DECOMPRESSION_FAILED: &str = "Decompression failed";

    /// Transfer errors
    pub const ERR_PART_BEYOND_TOTAL: &str = "Transfer part index exceeds announced part count";
    pub const ERR_PART_COUNT_CHANGED: &str = "Announced part count changed mid-transfer";
    pub const ERR_LAST_PART_MISMATCH: &str = "Last-part flag does not match part position";
    pub const ERR_SIZE_EXCEEDED: &str = "Received more bytes than announced";
    pub const ERR_SIZE_CHANGED: &str = "Announced file size changed mid-transfer";
    pub const ERR_SIZE_MISMATCH: &str = "Received byte count does not match announced size";
    pub const ERR_NEGATIVE_SIZE: &str = "Announced file size or part count is not positive";

    /// Session errors
    pub const ERR_NOT_AUTHENTICATED: &str = "Packet requires an authenticated session";
}

/// ProtocolError is the primary error type for all crate operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Deserialize error: {0}")]
    DeserializeError(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid protocol header")]
    InvalidHeader,

    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Unknown packet type: {0}")]
    UnknownPacketType(String),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("No active transfer")]
    NoActiveTransfer,

    #[error("A transfer is already in progress in this direction")]
    TransferInProgress,

    #[error("Request rejected: {0}")]
    Rejected(Rejection),

    #[error("Compression failed")]
    CompressionFailure,

    #[error("Decompression failed")]
    DecompressionFailure,

    #[error("Timeout occurred")]
    Timeout,

    #[error("Connection timed out (no activity)")]
    ConnectionTimeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// Whether this error must terminate the connection that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::ProtocolViolation(_)
                | ProtocolError::InvalidHeader
                | ProtocolError::UnsupportedVersion(_)
                | ProtocolError::OversizedPacket(_)
                | ProtocolError::ConnectionClosed
                | ProtocolError::ConnectionTimeout
        )
    }

    /// Shorthand for a protocol violation carrying a static message.
    pub fn violation(msg: impl Into<String>) -> Self {
        ProtocolError::ProtocolViolation(msg.into())
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::RejectionKind;

    #[test]
    fn test_fatality_classification() {
        assert!(ProtocolError::violation("bad part").is_fatal());
        assert!(ProtocolError::InvalidHeader.is_fatal());
        assert!(!ProtocolError::UnknownPacketType("Nope".into()).is_fatal());
        assert!(!ProtocolError::NoActiveTransfer.is_fatal());
        assert!(!ProtocolError::Rejected(Rejection::new(RejectionKind::SlotEmpty, "empty")).is_fatal());
        assert!(!ProtocolError::Io(io::Error::other("disk")).is_fatal());
    }

    #[test]
    fn test_display_includes_detail() {
        let err = ProtocolError::UnknownPacketType("MysteryPacket".into());
        assert_eq!(err.to_string(), "Unknown packet type: MysteryPacket");
    }
}
