//! In-memory storage engine

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::engine::{prefix_key, StorageEngine};
use crate::error::StorageError;

/// In-memory storage engine.
///
/// Fast but non-persistent; also the stand-in for browser-local storage in
/// headless environments. Cloning shares the underlying map.
#[derive(Clone)]
pub struct MemoryStorageEngine {
    prefix: String,
    entries: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryStorageEngine {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl StorageEngine for MemoryStorageEngine {
    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        let entries = self.entries.read().await;
        Ok(entries.keys().cloned().collect())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&prefix_key(&self.prefix, key)).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Value>, StorageError> {
        let entries = self.entries.read().await;
        Ok(entries.values().cloned().collect())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut entries = self.entries.write().await;
        entries.insert(prefix_key(&self.prefix, key), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().await;
        entries.remove(&prefix_key(&self.prefix, key));
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let mut entries = self.entries.write().await;
        entries.clear();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
