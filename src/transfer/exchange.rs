//! Drives the transfer slots of a [`Session`] from packet handlers.

use crate::core::packet::Packet;
use crate::error::{ProtocolError, Result};
use crate::protocol::message::{packet_names, FileTransferData, SaveMode};
use crate::session::Session;
use crate::transfer::download::DownloadManager;
use crate::transfer::sink::ReceivedSnapshot;
use crate::transfer::upload::UploadManager;
use crate::transfer::{TransferSettings, Transfers};
use std::path::Path;
use tracing::{debug, info, warn};

/// What happened to the upload after queueing a part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartProgress {
    Sent,
    /// The last part was queued and the upload slot is free again
    Finished(SaveMode),
}

/// Compress `source` and queue its first part
pub async fn start_upload(
    session: &Session,
    source: &Path,
    settings: &TransferSettings,
    mode: SaveMode,
) -> Result<PartProgress> {
    let mut transfers = session.transfers().lock().await;
    if transfers.upload.is_some() {
        return Err(ProtocolError::TransferInProgress);
    }

    let upload = UploadManager::prepare(source, session.id(), settings, mode).await?;
    info!(
        session = session.id(),
        parts = upload.state().total_parts(),
        bytes = upload.state().total_size_bytes(),
        mode = ?mode,
        "Starting snapshot upload"
    );
    session.metrics().transfer_started();
    transfers.upload = Some(upload);

    send_part(session, &mut transfers).await
}

/// Answer a `RequestSavePartPacket`
pub async fn send_next_part(session: &Session) -> Result<PartProgress> {
    let mut transfers = session.transfers().lock().await;
    send_part(session, &mut transfers).await
}

async fn send_part(session: &Session, transfers: &mut Transfers) -> Result<PartProgress> {
    let upload = transfers
        .upload
        .as_mut()
        .ok_or(ProtocolError::NoActiveTransfer)?;
    let mode = upload.mode();
    let part = match upload.next_part().await {
        Ok(part) => part,
        Err(e) => {
            if let Some(upload) = transfers.upload.take() {
                upload.discard().await;
            }
            return Err(e);
        }
    };

    let is_last = part.is_last_part;
    session.send_payload(packet_names::RECEIVE_SAVE_PART, &part)?;
    if !is_last {
        return Ok(PartProgress::Sent);
    }

    if let Some(upload) = transfers.upload.take() {
        upload.discard().await;
    }
    session.metrics().transfer_completed();
    info!(session = session.id(), "Snapshot upload queued in full");
    Ok(PartProgress::Finished(mode))
}

/// Handle one inbound part. Returns the promoted snapshot after the last one.
pub async fn receive_part(
    session: &Session,
    part: FileTransferData,
    destination: &Path,
    settings: &TransferSettings,
) -> Result<Option<ReceivedSnapshot>> {
    let mut transfers = session.transfers().lock().await;
    if transfers.download.is_none() {
        let download = DownloadManager::prepare(destination, session.id(), &part, settings).await?;
        info!(
            session = session.id(),
            parts = part.file_parts,
            bytes = part.file_size,
            "Receiving snapshot"
        );
        session.metrics().transfer_started();
        transfers.download = Some(download);
    }

    let Some(download) = transfers.download.as_mut() else {
        return Err(ProtocolError::NoActiveTransfer);
    };
    let written = download.write_part(&part).await;
    let complete = download.is_complete();
    debug!(
        session = session.id(),
        part = download.state().current_part(),
        of = download.state().total_parts(),
        "Received snapshot part"
    );

    if let Err(e) = written {
        if let Some(download) = transfers.download.take() {
            download.discard().await;
        }
        return Err(e);
    }

    if !complete {
        session.send(Packet::signal(packet_names::REQUEST_SAVE_PART))?;
        return Ok(None);
    }

    let Some(download) = transfers.download.take() else {
        return Err(ProtocolError::NoActiveTransfer);
    };
    let mode = download.mode();
    let path = download.finish(session.id(), settings).await?;
    session.metrics().transfer_completed();
    info!(session = session.id(), path = %path.display(), "Snapshot received");

    Ok(Some(ReceivedSnapshot {
        owner: session.username(),
        path,
        mode,
    }))
}

/// Drop any in-flight transfer. Only this session's scratch files are touched.
pub async fn abandon(session: &Session) {
    let mut transfers = session.transfers().lock().await;
    if let Some(upload) = transfers.upload.take() {
        warn!(session = session.id(), "Abandoning snapshot upload");
        upload.discard().await;
    }
    if let Some(download) = transfers.download.take() {
        warn!(session = session.id(), "Abandoning snapshot download");
        download.discard().await;
    }
}
