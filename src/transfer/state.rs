use std::path::{Path, PathBuf};

/// Progress of one chunked transfer in one direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferState {
    file_path: PathBuf,
    total_parts: u32,
    current_part: u32,
    part_size_bytes: usize,
    total_size_bytes: u64,
    is_last_part: bool,
}

impl TransferState {
    /// State for an artifact of `total_size_bytes` split into `part_size_bytes`
    /// slices. An empty artifact still travels as a single empty part.
    pub fn for_artifact(file_path: impl Into<PathBuf>, total_size_bytes: u64, part_size_bytes: usize) -> Self {
        let part = part_size_bytes.max(1) as u64;
        let parts = total_size_bytes.div_ceil(part).max(1);
        Self::with_parts(
            file_path,
            total_size_bytes,
            u32::try_from(parts).unwrap_or(u32::MAX),
            part_size_bytes,
        )
    }

    /// State sized from a part count announced by the peer
    pub fn with_parts(
        file_path: impl Into<PathBuf>,
        total_size_bytes: u64,
        total_parts: u32,
        part_size_bytes: usize,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            total_parts,
            current_part: 0,
            part_size_bytes,
            total_size_bytes,
            is_last_part: false,
        }
    }

    /// Move to the next part. Returns `false` once every part was exchanged.
    pub fn advance(&mut self) -> bool {
        if self.current_part >= self.total_parts {
            return false;
        }
        self.current_part += 1;
        self.is_last_part = self.current_part == self.total_parts;
        true
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn total_parts(&self) -> u32 {
        self.total_parts
    }

    pub fn current_part(&self) -> u32 {
        self.current_part
    }

    pub fn part_size_bytes(&self) -> usize {
        self.part_size_bytes
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.total_size_bytes
    }

    pub fn is_last_part(&self) -> bool {
        self.is_last_part
    }

    /// Byte length of the part `advance` just moved to
    pub fn current_part_len(&self) -> usize {
        if self.current_part == 0 {
            return 0;
        }
        let offset = u64::from(self.current_part - 1) * self.part_size_bytes as u64;
        let remaining = self.total_size_bytes.saturating_sub(offset);
        remaining.min(self.part_size_bytes as u64) as usize
    }
}
