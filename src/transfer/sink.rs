use crate::protocol::message::SaveMode;
use std::path::PathBuf;
use tracing::info;

/// A snapshot that finished downloading and was promoted to `path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedSnapshot {
    /// Authenticated user of the session that delivered it, if any
    pub owner: Option<String>,
    pub path: PathBuf,
    pub mode: SaveMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Kept on disk; the host will pick it up later
    Deferred,
    Refused(String),
}

/// Host-side consumer of received snapshots
pub trait SnapshotSink: Send + Sync {
    fn try_apply(&self, snapshot: &ReceivedSnapshot) -> ApplyOutcome;
}

/// Leaves the promoted file where it is
#[derive(Debug, Default, Clone, Copy)]
pub struct RetainSnapshot;

impl SnapshotSink for RetainSnapshot {
    fn try_apply(&self, snapshot: &ReceivedSnapshot) -> ApplyOutcome {
        info!(
            owner = snapshot.owner.as_deref().unwrap_or("-"),
            path = %snapshot.path.display(),
            mode = ?snapshot.mode,
            "Snapshot stored"
        );
        ApplyOutcome::Deferred
    }
}
