//! services/planner/src/adapters/file_storage.rs
//!
//! Key-value storage backed by one JSON file per key. Implements the
//! `KeyValueStorage` port from the `core` crate.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use trip_planner_core::ports::{KeyValueStorage, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Creates a storage rooted at `base_path`. The directory is created on first write.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn item_path(&self, key: &str) -> PortResult<PathBuf> {
        Self::validate_key(key)?;
        Ok(self.base_path.join(format!("{}.json", key)))
    }

    /// Rejects keys that are not safe to use as a file name.
    fn validate_key(key: &str) -> PortResult<()> {
        if key.is_empty() {
            return Err(PortError::Storage("storage key cannot be empty".to_string()));
        }
        if key.contains('/') || key.contains('\\') || key.contains("..") {
            return Err(PortError::Storage(format!(
                "storage key contains invalid characters: {key:?}"
            )));
        }
        if key.chars().any(|c| c.is_control()) {
            return Err(PortError::Storage(format!(
                "storage key contains control characters: {key:?}"
            )));
        }
        Ok(())
    }
}

fn io_error(e: std::io::Error) -> PortError {
    PortError::Storage(e.to_string())
}

//=========================================================================================
// `KeyValueStorage` Trait Implementation
//=========================================================================================

#[async_trait]
impl KeyValueStorage for FileStorage {
    async fn get_item(&self, key: &str) -> PortResult<Option<String>> {
        let path = self.item_path(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(e)),
        }
    }

    /// Writes through a temp file and a rename so a crash never leaves a
    /// half-written value behind.
    async fn set_item(&self, key: &str, value: &str) -> PortResult<()> {
        let path = self.item_path(key)?;
        tokio::fs::create_dir_all(&self.base_path)
            .await
            .map_err(io_error)?;

        let tmp_path = self
            .base_path
            .join(format!(".{}.{}.tmp", key, uuid::Uuid::new_v4().simple()));

        let write_result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(value.as_bytes()).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            match tokio::fs::rename(&tmp_path, &path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    tokio::fs::remove_file(&path).await?;
                    tokio::fs::rename(&tmp_path, &path).await
                }
                Err(e) => Err(e),
            }
        }
        .await;

        if let Err(e) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(io_error(e));
        }
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> PortResult<()> {
        let path = self.item_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        assert_eq!(storage.get_item("@app_trips").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_then_get_roundtrips_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"));
        storage.set_item("@app_trips", "[1]").await.unwrap();
        storage.set_item("@app_trips", "[1,2]").await.unwrap();
        assert_eq!(
            storage.get_item("@app_trips").await.unwrap().as_deref(),
            Some("[1,2]")
        );

        let mut entries = tokio::fs::read_dir(dir.path().join("nested")).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, ["@app_trips.json"]);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.set_item("k", "v").await.unwrap();
        storage.remove_item("k").await.unwrap();
        storage.remove_item("k").await.unwrap();
        assert_eq!(storage.get_item("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn unsafe_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        for key in ["", "../escape", "a/b", "bad\u{0}key"] {
            assert!(storage.set_item(key, "v").await.is_err(), "{key:?}");
        }
    }
}
