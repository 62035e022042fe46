//! Storage engine abstraction and backends

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;

pub mod filesystem;
pub mod memory;

pub use filesystem::FileStorageEngine;
pub use memory::MemoryStorageEngine;

/// A generic async key-value engine.
///
/// Values are JSON documents; typed access lives a layer up in
/// [`crate::Collection`]. Engines namespace their keys with a prefix so
/// multiple collections can share one physical store.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// All keys in this engine's namespace.
    async fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// The value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Every stored value.
    async fn get_all(&self) -> Result<Vec<Value>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Removes `key`; removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Removes every key in the namespace.
    async fn clear(&self) -> Result<(), StorageError>;

    /// Backend name, for logs.
    fn name(&self) -> &'static str;
}

/// Namespaces a key under a prefix, idempotently.
///
/// # Examples
///
/// ```
/// use waymark_storage::engine::prefix_key;
///
/// assert_eq!(prefix_key("contacts", "4j1use5"), "contacts:4j1use5");
/// assert_eq!(prefix_key("contacts", "contacts:4j1use5"), "contacts:4j1use5");
/// ```
pub fn prefix_key(prefix: &str, key: &str) -> String {
    if key.starts_with(&format!("{prefix}:")) {
        key.to_string()
    } else {
        format!("{prefix}:{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_key_idempotent() {
        assert_eq!(prefix_key("p", "k"), "p:k");
        assert_eq!(prefix_key("p", "p:k"), "p:k");
        // A different prefix is not stripped.
        assert_eq!(prefix_key("p", "q:k"), "p:q:k");
    }
}
