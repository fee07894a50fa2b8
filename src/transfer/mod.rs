//! # Snapshot Transfer
//!
//! Moves large world snapshots as a sequence of bounded parts over the packet
//! channel. Each session holds at most one upload and one download.
//!
//! ```text
//! Idle -> Preparing -> Transferring -> Finalizing -> Idle
//! ```
//!
//! The sender pushes the first part unprompted; every later part is pulled by
//! a `RequestSavePartPacket` from the receiver, so exactly one part is in
//! flight per direction. The sender forgets its upload as soon as the last
//! part is queued. It does not wait for the receiver to confirm.

pub mod download;
pub mod exchange;
pub mod sink;
pub mod state;
pub mod upload;

pub use download::DownloadManager;
pub use exchange::{abandon, receive_part, send_next_part, start_upload, PartProgress};
pub use sink::{ApplyOutcome, ReceivedSnapshot, RetainSnapshot, SnapshotSink};
pub use state::TransferState;
pub use upload::UploadManager;

use crate::config::TransferConfig;
use crate::session::SessionId;
use crate::utils::compression::CompressionKind;
use std::path::{Path, PathBuf};

/// Transfer parameters shared by both directions
#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub part_size: usize,
    pub compression: CompressionKind,
    pub max_snapshot_size: usize,
}

impl From<&TransferConfig> for TransferSettings {
    fn from(config: &TransferConfig) -> Self {
        Self {
            part_size: config.part_size_bytes,
            compression: config.compression,
            max_snapshot_size: config.max_snapshot_size,
        }
    }
}

/// Sibling of `path` private to one transfer of one session.
///
/// Two sessions moving the same snapshot (an evicted login and its
/// replacement) never share scratch files, so either may discard its own.
pub(crate) fn scratch_path(path: &Path, session: SessionId, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{session}-{:08x}{suffix}", rand::random::<u32>()));
    PathBuf::from(name)
}

/// Per-session transfer slots
#[derive(Debug, Default)]
pub struct Transfers {
    pub upload: Option<UploadManager>,
    pub download: Option<DownloadManager>,
}

impl Transfers {
    pub fn is_idle(&self) -> bool {
        self.upload.is_none() && self.download.is_none()
    }
}
