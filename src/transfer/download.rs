use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::{FileTransferData, SaveMode};
use crate::session::SessionId;
use crate::transfer::state::TransferState;
use crate::transfer::{scratch_path, TransferSettings};
use crate::utils::compression::decompress_with_limit;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Receiving half of a snapshot transfer.
///
/// Parts are appended to a `.part` sibling of `destination` owned by the
/// receiving session. Once the last part arrives the artifact is decompressed
/// and atomically renamed over `destination`.
#[derive(Debug)]
pub struct DownloadManager {
    state: TransferState,
    destination: PathBuf,
    file: tokio::fs::File,
    received: u64,
    mode: SaveMode,
}

impl DownloadManager {
    /// Allocate state from the first part's announced size and part count
    pub async fn prepare(
        destination: &Path,
        session: SessionId,
        first: &FileTransferData,
        settings: &TransferSettings,
    ) -> Result<Self> {
        if first.file_size < 0 || first.file_parts <= 0 {
            return Err(ProtocolError::violation(constants::ERR_NEGATIVE_SIZE));
        }
        if first.file_size as u64 > settings.max_snapshot_size as u64 {
            return Err(ProtocolError::violation(constants::ERR_SIZE_EXCEEDED));
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp = scratch_path(destination, session, ".part");
        let file = tokio::fs::File::create(&temp).await?;

        let state = TransferState::with_parts(
            &temp,
            first.file_size as u64,
            first.file_parts as u32,
            settings.part_size,
        );
        debug!(
            destination = %destination.display(),
            size = first.file_size,
            parts = first.file_parts,
            "Prepared download"
        );

        Ok(Self {
            state,
            destination: destination.to_path_buf(),
            file,
            received: 0,
            mode: first.save_mode(),
        })
    }

    /// Validate `part` against the transfer so far and append its bytes
    pub async fn write_part(&mut self, part: &FileTransferData) -> Result<()> {
        if part.file_size < 0 || part.file_parts <= 0 {
            return Err(ProtocolError::violation(constants::ERR_NEGATIVE_SIZE));
        }
        if part.file_parts as u32 != self.state.total_parts() {
            return Err(ProtocolError::violation(constants::ERR_PART_COUNT_CHANGED));
        }
        if part.file_size as u64 != self.state.total_size_bytes() {
            return Err(ProtocolError::violation(constants::ERR_SIZE_CHANGED));
        }
        if !self.state.advance() {
            return Err(ProtocolError::violation(constants::ERR_PART_BEYOND_TOTAL));
        }
        if part.is_last_part != self.state.is_last_part() {
            return Err(ProtocolError::violation(constants::ERR_LAST_PART_MISMATCH));
        }

        let received = self.received + part.file_bytes.len() as u64;
        if received > self.state.total_size_bytes() {
            return Err(ProtocolError::violation(constants::ERR_SIZE_EXCEEDED));
        }
        if part.is_last_part && received != self.state.total_size_bytes() {
            return Err(ProtocolError::violation(constants::ERR_SIZE_MISMATCH));
        }

        self.file.write_all(&part.file_bytes).await?;
        self.received = received;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.state.is_last_part()
    }

    pub fn state(&self) -> &TransferState {
        &self.state
    }

    pub fn mode(&self) -> SaveMode {
        self.mode
    }

    /// Decompress the received artifact and promote it to the destination
    ///
    /// On failure every scratch file is removed and the destination keeps
    /// its previous contents.
    pub async fn finish(mut self, session: SessionId, settings: &TransferSettings) -> Result<PathBuf> {
        let promoted = self.promote(session, settings).await;
        match promoted {
            Ok(bytes) => {
                debug!(destination = %self.destination.display(), bytes, "Promoted snapshot");
                let destination = self.destination.clone();
                self.discard().await;
                Ok(destination)
            }
            Err(e) => {
                self.discard().await;
                Err(e)
            }
        }
    }

    async fn promote(&mut self, session: SessionId, settings: &TransferSettings) -> Result<usize> {
        self.file.flush().await?;

        let compressed = tokio::fs::read(self.state.file_path()).await?;
        let snapshot = decompress_with_limit(&compressed, &settings.compression, settings.max_snapshot_size)?;

        let staging = scratch_path(&self.destination, session, ".tmp");
        if let Err(e) = write_and_rename(&staging, &self.destination, &snapshot).await {
            if let Err(cleanup) = tokio::fs::remove_file(&staging).await {
                debug!(path = %staging.display(), error = %cleanup, "No staging file to remove");
            }
            return Err(e);
        }
        Ok(snapshot.len())
    }

    /// Drop the partial artifact. The destination is left untouched.
    pub async fn discard(self) {
        let Self { state, file, .. } = self;
        drop(file);
        if let Err(e) = tokio::fs::remove_file(state.file_path()).await {
            warn!(path = %state.file_path().display(), error = %e, "Failed to remove partial download");
        }
    }
}

async fn write_and_rename(staging: &Path, destination: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(staging, bytes).await?;
    tokio::fs::rename(staging, destination).await?;
    Ok(())
}
