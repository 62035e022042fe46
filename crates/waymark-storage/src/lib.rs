//! # Waymark Storage
//!
//! Generic async key-value storage engines and the [`Collection`] item
//! cache used by waymark demo apps.
//!
//! An engine is a flat JSON document store (`keys`/`get`/`set`/`delete`/
//! `clear`) behind the [`engine::StorageEngine`] trait; two backends ship
//! here (in-memory and one-file-per-key filesystem). [`Collection`] layers
//! typed items, id-based deduplication, and change notification on top.
//!
//! ## Example
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use waymark_storage::{Collection, CollectionOptions, MemoryStorageEngine};
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Task {
//!     id: String,
//!     name: String,
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), waymark_storage::StorageError> {
//! let collection = Collection::open(
//!     CollectionOptions::new(MemoryStorageEngine::new("tasks"), |task: &Task| {
//!         task.id.clone()
//!     }),
//! )
//! .await?;
//!
//! collection
//!     .add(Task { id: "1".into(), name: "write docs".into() })
//!     .await?;
//! assert_eq!(collection.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod collection;
pub mod engine;
pub mod error;

pub use collection::{Collection, CollectionOptions};
pub use engine::{FileStorageEngine, MemoryStorageEngine, StorageEngine};
pub use error::StorageError;
