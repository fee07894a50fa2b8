//! # Serialization Formats
//!
//! Abstraction over the formats used for packet payloads and persisted records.
//! Payloads travel as bincode; records on disk default to JSON so operators can
//! read them, with MessagePack available for compact stores.
//!
//! ## Usage
//! ```ignore
//! use world_session::core::serialization::{MultiFormat, SerializationFormat};
//!
//! let bytes = record.serialize_format(SerializationFormat::Json)?;
//! let back = WorldObjectRecord::deserialize_format(&bytes, SerializationFormat::Json)?;
//! ```

use serde::{Deserialize, Serialize};

/// Supported serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    /// Binary compact format (default, fastest)
    #[default]
    Bincode,
    /// Human-readable JSON format
    Json,
    /// Compact binary format (MessagePack)
    #[serde(rename = "messagepack")]
    MessagePack,
}

impl SerializationFormat {
    /// Get the format identifier byte
    pub fn format_byte(self) -> u8 {
        match self {
            SerializationFormat::Bincode => 0x01,
            SerializationFormat::Json => 0x02,
            SerializationFormat::MessagePack => 0x03,
        }
    }

    /// Detect format from identifier byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(SerializationFormat::Bincode),
            0x02 => Some(SerializationFormat::Json),
            0x03 => Some(SerializationFormat::MessagePack),
            _ => None,
        }
    }

    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            SerializationFormat::Bincode => "Bincode",
            SerializationFormat::Json => "JSON",
            SerializationFormat::MessagePack => "MessagePack",
        }
    }
}

/// Trait for types that support multiple serialization formats
pub trait MultiFormat: Serialize + for<'de> Deserialize<'de> + Sized {
    /// Serialize to bytes using the specified format
    fn serialize_format(&self, format: SerializationFormat) -> crate::error::Result<Vec<u8>> {
        match format {
            SerializationFormat::Bincode => bincode::serialize(self)
                .map_err(|e| crate::error::ProtocolError::SerializeError(e.to_string())),
            SerializationFormat::Json => serde_json::to_vec_pretty(self)
                .map_err(|e| crate::error::ProtocolError::SerializeError(e.to_string())),
            SerializationFormat::MessagePack => rmp_serde::to_vec_named(self)
                .map_err(|e| crate::error::ProtocolError::SerializeError(e.to_string())),
        }
    }

    /// Deserialize from bytes using the specified format
    fn deserialize_format(data: &[u8], format: SerializationFormat) -> crate::error::Result<Self> {
        match format {
            SerializationFormat::Bincode => bincode::deserialize(data)
                .map_err(|e| crate::error::ProtocolError::DeserializeError(e.to_string())),
            SerializationFormat::Json => serde_json::from_slice(data)
                .map_err(|e| crate::error::ProtocolError::DeserializeError(e.to_string())),
            SerializationFormat::MessagePack => rmp_serde::from_slice(data)
                .map_err(|e| crate::error::ProtocolError::DeserializeError(e.to_string())),
        }
    }
}
