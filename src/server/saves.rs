use crate::error::Result;
use std::path::{Path, PathBuf};

const SAVE_EXTENSION: &str = ".mpsave";

/// One stored world snapshot per user: `<dir>/<username>.mpsave`
#[derive(Debug, Clone)]
pub struct SaveStore {
    dir: PathBuf,
}

impl SaveStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, username: &str) -> PathBuf {
        self.dir.join(format!("{username}{SAVE_EXTENSION}"))
    }

    pub async fn exists(&self, username: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.path_for(username)).await?)
    }

    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }
}
