//! # Core Protocol Components
//!
//! Packet framing, the stream codec and payload serialization.
//!
//! ## Components
//! - **Packet**: a type name plus an opaque payload
//! - **Codec**: Tokio codec for framing packets over byte streams
//! - **Serialization**: formats for payloads and persisted records
//! - **Store**: file-per-record persistence with atomic replace
//!
//! ## Wire Format
//! ```text
//! [Magic(4)] [Version(1)] [NameLen(2)] [BodyLen(4)] [TypeName] [Contents]
//! ```
//!
//! ## Limits
//! - Maximum body size: 16MB
//! - Maximum type name: 128 bytes
//! - Lengths are validated before any allocation

pub mod codec;
pub mod packet;
pub mod serialization;
pub mod store;
