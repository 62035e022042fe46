//! Filesystem storage engine

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;

use crate::engine::{prefix_key, StorageEngine};
use crate::error::StorageError;

/// Filesystem storage engine: one JSON file per key under a directory.
///
/// Persistent across restarts; the durable analogue of a browser's
/// IndexedDB store. Keys are percent-encoded into filenames, so arbitrary
/// key strings round-trip losslessly.
#[derive(Clone)]
pub struct FileStorageEngine {
    prefix: String,
    dir: PathBuf,
}

impl FileStorageEngine {
    /// Creates the engine, ensuring the backing directory exists.
    pub async fn new(
        dir: impl AsRef<Path>,
        prefix: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            prefix: prefix.into(),
            dir,
        })
    }

    fn key_to_path(&self, key: &str) -> PathBuf {
        let full = prefix_key(&self.prefix, key);
        self.dir
            .join(format!("{}.json", urlencoding::encode(&full)))
    }

    fn path_to_key(path: &Path) -> Option<String> {
        let stem = path.file_stem()?.to_str()?;
        urlencoding::decode(stem).ok().map(|k| k.into_owned())
    }
}

#[async_trait]
impl StorageEngine for FileStorageEngine {
    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(key) = Self::path_to_key(&path) {
                if key.starts_with(&format!("{}:", self.prefix)) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let path = self.key_to_path(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn get_all(&self) -> Result<Vec<Value>, StorageError> {
        let mut values = Vec::new();
        for key in self.keys().await? {
            if let Some(value) = self.get(&key).await? {
                values.push(value);
            }
        }
        Ok(values)
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let path = self.key_to_path(key);
        let bytes = serde_json::to_vec(&value)?;
        fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.key_to_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn clear(&self) -> Result<(), StorageError> {
        for key in self.keys().await? {
            self.delete(&key).await?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn scratch_engine() -> FileStorageEngine {
        let dir = std::env::temp_dir()
            .join("waymark-storage-tests")
            .join(uuid::Uuid::new_v4().simple().to_string());
        FileStorageEngine::new(&dir, "test").await.unwrap()
    }

    #[tokio::test]
    async fn test_file_engine_round_trip() {
        let engine = scratch_engine().await;

        engine
            .set("a", json!({"name": "one", "favorite": true}))
            .await
            .unwrap();
        let value = engine.get("a").await.unwrap().unwrap();
        assert_eq!(value["name"], "one");
        assert_eq!(value["favorite"], true);

        assert!(engine.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_engine_keys_and_clear() {
        let engine = scratch_engine().await;
        engine.set("a", json!(1)).await.unwrap();
        engine.set("b", json!(2)).await.unwrap();

        let keys = engine.keys().await.unwrap();
        assert_eq!(keys, vec!["test:a".to_string(), "test:b".to_string()]);

        engine.clear().await.unwrap();
        assert!(engine.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_engine_awkward_keys_round_trip() {
        let engine = scratch_engine().await;
        engine.set("id/with:odd chars", json!("v")).await.unwrap();

        assert_eq!(
            engine.get("id/with:odd chars").await.unwrap(),
            Some(json!("v"))
        );
        assert_eq!(
            engine.keys().await.unwrap(),
            vec!["test:id/with:odd chars".to_string()]
        );
    }

    #[tokio::test]
    async fn test_file_engine_delete_missing_is_ok() {
        let engine = scratch_engine().await;
        engine.delete("never-existed").await.unwrap();
    }
}
