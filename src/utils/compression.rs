//! Snapshot compression.
//!
//! Snapshots are compressed once into a temporary artifact before they are cut
//! into transfer parts, and decompressed once after the last part arrives.

use crate::config::MAX_PAYLOAD_SIZE;
use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionKind {
    /// Bytes pass through untouched
    None,
    Lz4,
    #[default]
    Zstd,
}

impl CompressionKind {
    pub fn name(self) -> &'static str {
        match self {
            CompressionKind::None => "none",
            CompressionKind::Lz4 => "lz4",
            CompressionKind::Zstd => "zstd",
        }
    }
}

/// Compresses data using the specified compression algorithm
///
/// # Errors
/// Returns `ProtocolError::CompressionFailure` if compression fails
pub fn compress(data: &[u8], kind: &CompressionKind) -> Result<Vec<u8>> {
    match kind {
        CompressionKind::None => Ok(data.to_vec()),
        CompressionKind::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
        CompressionKind::Zstd => {
            let mut out = Vec::new();
            zstd::stream::copy_encode(data, &mut out, 3)
                .map_err(|_| ProtocolError::CompressionFailure)?;
            Ok(out)
        }
    }
}

/// Decompresses data bounded by [`MAX_PAYLOAD_SIZE`].
pub fn decompress(data: &[u8], kind: &CompressionKind) -> Result<Vec<u8>> {
    decompress_with_limit(data, kind, MAX_PAYLOAD_SIZE)
}

/// Decompresses data, refusing to produce more than `limit` bytes.
///
/// # Errors
/// Returns `ProtocolError::DecompressionFailure` if the input is malformed or the
/// output would exceed `limit`.
pub fn decompress_with_limit(data: &[u8], kind: &CompressionKind, limit: usize) -> Result<Vec<u8>> {
    match *kind {
        CompressionKind::None => {
            if data.len() > limit {
                return Err(ProtocolError::DecompressionFailure);
            }
            Ok(data.to_vec())
        }
        CompressionKind::Lz4 => {
            if data.len() < 4 {
                return Err(ProtocolError::DecompressionFailure);
            }

            // lz4_flex prepends the uncompressed size as 4 little-endian bytes
            let claimed_size = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
            if claimed_size > limit {
                return Err(ProtocolError::DecompressionFailure);
            }

            lz4_flex::decompress_size_prepended(data)
                .map_err(|_| ProtocolError::DecompressionFailure)
        }
        CompressionKind::Zstd => {
            let mut reader = zstd::stream::Decoder::new(data)
                .map_err(|_| ProtocolError::DecompressionFailure)?;

            let mut out = Vec::new();
            let mut buffer = [0u8; 8192];
            loop {
                match reader.read(&mut buffer) {
                    Ok(0) => break,
                    Ok(n) => {
                        out.extend_from_slice(&buffer[..n]);
                        if out.len() > limit {
                            return Err(ProtocolError::DecompressionFailure);
                        }
                    }
                    Err(_) => return Err(ProtocolError::DecompressionFailure),
                }
            }
            Ok(out)
        }
    }
}
