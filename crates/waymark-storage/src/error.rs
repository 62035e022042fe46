use thiserror::Error;

/// Failures at the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored value could not be (de)serialized: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn backend(message: impl Into<String>) -> Self {
        StorageError::Backend(message.into())
    }
}
