use crate::error::{ProtocolError, Result};
use crate::protocol::message::{FileTransferData, SaveMode};
use crate::session::SessionId;
use crate::transfer::state::TransferState;
use crate::transfer::{scratch_path, TransferSettings};
use crate::utils::compression::compress;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// Sending half of a snapshot transfer.
///
/// The source file is compressed into a sibling `.temp` artifact owned by the
/// uploading session, which is then read back one part per request.
#[derive(Debug)]
pub struct UploadManager {
    state: TransferState,
    file: tokio::fs::File,
    mode: SaveMode,
}

impl UploadManager {
    pub async fn prepare(
        source: &Path,
        session: SessionId,
        settings: &TransferSettings,
        mode: SaveMode,
    ) -> Result<Self> {
        let raw = tokio::fs::read(source).await?;
        if raw.len() > settings.max_snapshot_size {
            return Err(ProtocolError::Custom(format!(
                "snapshot of {} bytes exceeds the {} byte limit",
                raw.len(),
                settings.max_snapshot_size
            )));
        }

        let compressed = compress(&raw, &settings.compression)?;
        let artifact = scratch_path(source, session, ".temp");
        tokio::fs::write(&artifact, &compressed).await?;

        let file = tokio::fs::File::open(&artifact).await?;
        let state = TransferState::for_artifact(&artifact, compressed.len() as u64, settings.part_size);
        debug!(
            source = %source.display(),
            raw = raw.len(),
            compressed = compressed.len(),
            parts = state.total_parts(),
            "Prepared upload"
        );

        Ok(Self { state, file, mode })
    }

    /// Read the next slice of the artifact and package it
    pub async fn next_part(&mut self) -> Result<FileTransferData> {
        if !self.state.advance() {
            return Err(ProtocolError::NoActiveTransfer);
        }

        let mut bytes = vec![0u8; self.state.current_part_len()];
        self.file.read_exact(&mut bytes).await?;

        Ok(FileTransferData {
            file_size: self.state.total_size_bytes() as i64,
            file_parts: i32::try_from(self.state.total_parts()).unwrap_or(i32::MAX),
            file_bytes: bytes,
            is_last_part: self.state.is_last_part(),
            additional_instructions: self.mode.as_instruction(),
        })
    }

    pub fn state(&self) -> &TransferState {
        &self.state
    }

    pub fn mode(&self) -> SaveMode {
        self.mode
    }

    /// Close the artifact and delete it
    pub async fn discard(self) {
        let Self { state, file, .. } = self;
        drop(file);
        if let Err(e) = tokio::fs::remove_file(state.file_path()).await {
            warn!(path = %state.file_path().display(), error = %e, "Failed to remove upload artifact");
        }
    }
}
