//! File-per-record persistence.
//!
//! Each record lives in its own file named `<key><extension>` inside a fixed
//! directory. Writes go to a sibling temp file first and are renamed into
//! place, so a reader never observes a half-written record. Directory scans
//! skip anything without the store's extension before deserializing.

use crate::core::serialization::{MultiFormat, SerializationFormat};
use crate::error::Result;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A record that can be kept in a [`RecordStore`]
pub trait StoredRecord: MultiFormat + Send + Sync {
    /// File extension, including the leading dot
    const EXTENSION: &'static str;

    /// File stem that uniquely identifies this record
    fn key(&self) -> String;
}

/// Directory of records of a single type
#[derive(Debug, Clone)]
pub struct RecordStore<T> {
    dir: PathBuf,
    format: SerializationFormat,
    _marker: PhantomData<fn() -> T>,
}

impl<T: StoredRecord> RecordStore<T> {
    pub fn new(dir: impl Into<PathBuf>, format: SerializationFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
            _marker: PhantomData,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}{}", T::EXTENSION))
    }

    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Persist `record`, replacing any previous version atomically
    pub async fn save(&self, record: &T) -> Result<()> {
        self.ensure_dir().await?;
        let path = self.path_for(&record.key());
        // Unique per write so concurrent saves of one key never share a temp file
        let temp = self
            .dir
            .join(format!("{}{}.{:016x}.tmp", record.key(), T::EXTENSION, rand::random::<u64>()));
        let bytes = record.serialize_format(self.format)?;

        tokio::fs::write(&temp, &bytes).await?;
        tokio::fs::rename(&temp, &path).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Saved record");
        Ok(())
    }

    pub async fn load(&self, key: &str) -> Result<Option<T>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(T::deserialize_format(&bytes, self.format)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.path_for(key)).await?)
    }

    /// Remove the record. Returns whether a file was deleted.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Scan the directory and load every record with this store's extension.
    /// Unreadable files are logged and skipped.
    pub async fn load_all(&self) -> Result<Vec<T>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let matches = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(T::EXTENSION));
            if !matches {
                continue;
            }

            let bytes = tokio::fs::read(&path).await?;
            match T::deserialize_format(&bytes, self.format) {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable record"),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Marker {
        id: u32,
        label: String,
    }

    impl MultiFormat for Marker {}

    impl StoredRecord for Marker {
        const EXTENSION: &'static str = ".marker";

        fn key(&self) -> String {
            self.id.to_string()
        }
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn test_save_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::<Marker>::new(dir.path(), SerializationFormat::Json);
        let marker = Marker {
            id: 3,
            label: "north".into(),
        };

        store.save(&marker).await.unwrap();
        assert!(store.exists("3").await.unwrap());
        assert_eq!(store.load("3").await.unwrap(), Some(marker));

        assert!(store.delete("3").await.unwrap());
        assert!(!store.delete("3").await.unwrap());
        assert_eq!(store.load("3").await.unwrap(), None);
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn test_scan_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::<Marker>::new(dir.path(), SerializationFormat::MessagePack);
        for id in 0..3 {
            store
                .save(&Marker {
                    id,
                    label: format!("m{id}"),
                })
                .await
                .unwrap();
        }
        tokio::fs::write(dir.path().join("notes.txt"), b"not a record")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("broken.marker"), b"\xff\xff")
            .await
            .unwrap();

        let mut all = store.load_all().await.unwrap();
        all.sort_by_key(|m| m.id);
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].label, "m2");
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn test_missing_directory_scans_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::<Marker>::new(dir.path().join("absent"), SerializationFormat::Json);
        assert!(store.load_all().await.unwrap().is_empty());
    }
}
