//! Named packets and their wire representation.
//!
//! ```text
//! [Magic(4)] [Version(1)] [NameLen(2)] [BodyLen(4)] [TypeName(NameLen)] [Contents(BodyLen)]
//! ```
//!
//! Lengths are big-endian. The type name selects the handler on the receiving
//! side; the contents are an opaque payload owned by that handler.

use crate::config::{MAGIC_BYTES, MAX_PAYLOAD_SIZE, MAX_TYPE_NAME_LEN, PROTOCOL_VERSION};
use crate::error::{ProtocolError, Result};
use bytes::{BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Fixed header length preceding the type name
pub const HEADER_SIZE: usize = 11;

/// A typed, named message with an opaque payload. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    type_name: String,
    contents: Vec<u8>,
}

/// Lengths announced by a frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameHeader {
    pub name_len: usize,
    pub body_len: usize,
}

impl FrameHeader {
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.name_len + self.body_len
    }
}

impl Packet {
    pub fn new(type_name: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            type_name: type_name.into(),
            contents,
        }
    }

    /// A packet whose meaning is carried by its name alone
    pub fn signal(type_name: impl Into<String>) -> Self {
        Self::new(type_name, Vec::new())
    }

    /// Serialize `payload` with bincode into a packet named `type_name`
    pub fn from_payload<T: Serialize>(type_name: &str, payload: &T) -> Result<Self> {
        Ok(Self::new(type_name, bincode::serialize(payload)?))
    }

    /// Deserialize the contents as `T`
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(bincode::deserialize(&self.contents)?)
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn into_contents(self) -> Vec<u8> {
        self.contents
    }

    /// Total encoded size of this packet on the wire
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.type_name.len() + self.contents.len()
    }

    /// Check that this packet can be framed
    pub fn validate(&self) -> Result<()> {
        if self.type_name.is_empty() || self.type_name.len() > MAX_TYPE_NAME_LEN {
            return Err(ProtocolError::InvalidHeader);
        }
        if self.contents.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::OversizedPacket(self.contents.len()));
        }
        Ok(())
    }

    /// Append the framed packet to `dst`. Callers validate first.
    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        dst.put_slice(&MAGIC_BYTES);
        dst.put_u8(PROTOCOL_VERSION);
        dst.put_u16(self.type_name.len() as u16);
        dst.put_u32(self.contents.len() as u32);
        dst.put_slice(self.type_name.as_bytes());
        dst.put_slice(&self.contents);
    }

    /// Encode into a standalone frame
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_to(&mut buf);
        buf.to_vec()
    }

    /// Decode one complete frame
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        let header = parse_header(buf)?.ok_or(ProtocolError::InvalidHeader)?;
        if buf.len() < header.frame_len() {
            return Err(ProtocolError::InvalidHeader);
        }
        Self::from_frame(buf, header)
    }

    pub(crate) fn from_frame(frame: &[u8], header: FrameHeader) -> Result<Self> {
        let name_end = HEADER_SIZE + header.name_len;
        let type_name = std::str::from_utf8(&frame[HEADER_SIZE..name_end])
            .map_err(|_| ProtocolError::InvalidHeader)?
            .to_string();
        let contents = frame[name_end..name_end + header.body_len].to_vec();
        Ok(Self {
            type_name,
            contents,
        })
    }
}

/// Parse the fixed header. `Ok(None)` means more bytes are needed.
pub(crate) fn parse_header(buf: &[u8]) -> Result<Option<FrameHeader>> {
    if buf.len() < HEADER_SIZE {
        return Ok(None);
    }

    if buf[0..4] != MAGIC_BYTES {
        return Err(ProtocolError::InvalidHeader);
    }

    let version = buf[4];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    let name_len = u16::from_be_bytes([buf[5], buf[6]]) as usize;
    if name_len == 0 || name_len > MAX_TYPE_NAME_LEN {
        return Err(ProtocolError::InvalidHeader);
    }

    let body_len = u32::from_be_bytes([buf[7], buf[8], buf[9], buf[10]]) as usize;
    if body_len > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::OversizedPacket(body_len));
    }

    Ok(Some(FrameHeader { name_len, body_len }))
}
