// File: src/collection.rs
// Purpose: Keyed item cache over a storage engine with change notification

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;
use waymark_reactive::{Observable, Subscription};

use crate::engine::StorageEngine;
use crate::error::StorageError;

type IdOf<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// Options for opening a [`Collection`].
pub struct CollectionOptions<T> {
    engine: Arc<dyn StorageEngine>,
    id_of: IdOf<T>,
    initial_value: Option<Vec<T>>,
}

impl<T> CollectionOptions<T> {
    /// A collection over `engine`, identifying items with `id_of`.
    pub fn new(
        engine: impl StorageEngine + 'static,
        id_of: impl Fn(&T) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            engine: Arc::new(engine),
            id_of: Arc::new(id_of),
            initial_value: None,
        }
    }

    /// Seed items written only when the underlying store is empty.
    pub fn with_initial_value(mut self, items: Vec<T>) -> Self {
        self.initial_value = Some(items);
        self
    }
}

/// A keyed item cache over a [`StorageEngine`].
///
/// Items are deduplicated by id; adds persist only the items passed in (not
/// a full rewrite), and every mutation publishes the new item list to
/// subscribers. Cloning shares the same cache.
#[derive(Clone)]
pub struct Collection<T> {
    engine: Arc<dyn StorageEngine>,
    items: Observable<Vec<T>>,
    id_of: IdOf<T>,
}

impl<T> Collection<T>
where
    T: Clone + Send + Serialize + DeserializeOwned + 'static,
{
    /// Opens the collection: hydrates from existing storage, then writes the
    /// seed items if the store was empty.
    pub async fn open(options: CollectionOptions<T>) -> Result<Self, StorageError> {
        let collection = Collection {
            engine: options.engine,
            items: Observable::new(Vec::new()),
            id_of: options.id_of,
        };

        let mut existing = Vec::new();
        for value in collection.engine.get_all().await? {
            match serde_json::from_value::<T>(value) {
                Ok(item) => existing.push(item),
                // A single corrupt record should not poison the cache.
                Err(err) => warn!(engine = collection.engine.name(), %err, "skipping undecodable record"),
            }
        }
        collection.items.set_silent(existing);

        if let Some(seed) = options.initial_value {
            if collection.is_empty() {
                collection.add_all(seed).await?;
            }
        }

        Ok(collection)
    }

    /// Snapshot of the current items.
    pub fn items(&self) -> Vec<T> {
        self.items.get()
    }

    pub fn is_empty(&self) -> bool {
        self.items.with(|items| items.is_empty())
    }

    pub fn len(&self) -> usize {
        self.items.with(|items| items.len())
    }

    /// A handle to the observable item list, for manual wiring into a
    /// rendering layer.
    pub fn observe(&self) -> Observable<Vec<T>> {
        self.items.clone()
    }

    /// Subscribes to item-list changes.
    pub fn subscribe(&self, callback: impl FnMut(&Vec<T>) + Send + 'static) -> Subscription {
        self.items.subscribe(callback)
    }

    /// Adds (or replaces, by id) a single item.
    pub async fn add(&self, item: T) -> Result<(), StorageError> {
        let id = (self.id_of)(&item);
        self.engine.set(&id, serde_json::to_value(&item)?).await?;
        let id_of = self.id_of.clone();
        self.items
            .update(move |items| merge_by_id(items, vec![item], &id_of));
        Ok(())
    }

    /// Adds (or replaces) a batch, deduplicated by id; persists only the
    /// incoming items.
    pub async fn add_all(&self, incoming: Vec<T>) -> Result<(), StorageError> {
        // Later duplicates in the batch win, and we persist each id once.
        let mut deduped: Vec<T> = Vec::new();
        for item in incoming {
            let id = (self.id_of)(&item);
            deduped.retain(|existing| (self.id_of)(existing) != id);
            deduped.push(item);
        }
        for item in &deduped {
            let id = (self.id_of)(item);
            self.engine.set(&id, serde_json::to_value(item)?).await?;
        }
        let id_of = self.id_of.clone();
        self.items
            .update(move |items| merge_by_id(items, deduped, &id_of));
        Ok(())
    }

    /// Removes an item by identity.
    pub async fn delete(&self, item: &T) -> Result<(), StorageError> {
        let id = (self.id_of)(item);
        self.engine.delete(&id).await?;
        let id_of = self.id_of.clone();
        self.items
            .update(move |items| items.retain(|existing| id_of(existing) != id));
        Ok(())
    }

    /// Removes every item.
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.engine.clear().await?;
        self.items.set(Vec::new());
        Ok(())
    }

    /// The item with the given id, if present.
    pub fn find(&self, id: &str) -> Option<T> {
        let id_of = self.id_of.clone();
        self.items
            .with(|items| items.iter().find(|item| id_of(item) == id).cloned())
    }

}

fn merge_by_id<T>(items: &mut Vec<T>, incoming: Vec<T>, id_of: &IdOf<T>) {
    for item in incoming {
        let id = id_of(&item);
        match items.iter().position(|existing| id_of(existing) == id) {
            // Replacing keeps the item's position.
            Some(position) => items[position] = item,
            None => items.push(item),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryStorageEngine;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Task {
        id: String,
        name: String,
    }

    fn task(id: &str, name: &str) -> Task {
        Task {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn options(engine: MemoryStorageEngine) -> CollectionOptions<Task> {
        CollectionOptions::new(engine, |task: &Task| task.id.clone())
    }

    #[tokio::test]
    async fn test_add_and_find() {
        let collection = Collection::open(options(MemoryStorageEngine::new("tasks")))
            .await
            .unwrap();

        collection.add(task("1", "write tests")).await.unwrap();
        collection.add(task("2", "ship")).await.unwrap();

        assert_eq!(collection.len(), 2);
        assert_eq!(collection.find("1").unwrap().name, "write tests");
        assert!(collection.find("9").is_none());
    }

    #[tokio::test]
    async fn test_add_deduplicates_by_id_in_place() {
        let collection = Collection::open(options(MemoryStorageEngine::new("tasks")))
            .await
            .unwrap();

        collection.add(task("1", "first")).await.unwrap();
        collection.add(task("2", "second")).await.unwrap();
        collection.add(task("1", "first-renamed")).await.unwrap();

        let items = collection.items();
        assert_eq!(items.len(), 2);
        // Replacement keeps position.
        assert_eq!(items[0].name, "first-renamed");
        assert_eq!(items[1].name, "second");
    }

    #[tokio::test]
    async fn test_add_all_batch_dedup() {
        let collection = Collection::open(options(MemoryStorageEngine::new("tasks")))
            .await
            .unwrap();

        collection
            .add_all(vec![task("1", "a"), task("2", "b"), task("1", "a2")])
            .await
            .unwrap();

        assert_eq!(collection.len(), 2);
        assert_eq!(collection.find("1").unwrap().name, "a2");
    }

    #[tokio::test]
    async fn test_delete_removes_item_and_persisted_record() {
        let engine = MemoryStorageEngine::new("tasks");
        let collection = Collection::open(options(engine.clone())).await.unwrap();

        let t = task("1", "doomed");
        collection.add(t.clone()).await.unwrap();
        collection.delete(&t).await.unwrap();

        assert!(collection.is_empty());
        assert!(engine.get("1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_hydrates_from_existing_storage() {
        let engine = MemoryStorageEngine::new("tasks");
        engine
            .set("1", serde_json::to_value(task("1", "persisted")).unwrap())
            .await
            .unwrap();

        let collection = Collection::open(
            options(engine).with_initial_value(vec![task("9", "seed")]),
        )
        .await
        .unwrap();

        // Existing data wins; the seed is not applied.
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.find("1").unwrap().name, "persisted");
        assert!(collection.find("9").is_none());
    }

    #[tokio::test]
    async fn test_seeds_empty_storage() {
        let engine = MemoryStorageEngine::new("tasks");
        let collection = Collection::open(
            options(engine.clone()).with_initial_value(vec![task("1", "seed")]),
        )
        .await
        .unwrap();

        assert_eq!(collection.len(), 1);
        // The seed was persisted, not just cached.
        assert!(engine.get("1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_changes_notify_subscribers() {
        let collection = Collection::open(options(MemoryStorageEngine::new("tasks")))
            .await
            .unwrap();
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let _sub = collection.subscribe(move |items: &Vec<Task>| {
            sink.lock().unwrap().push(items.len());
        });

        collection.add(task("1", "a")).await.unwrap();
        collection.add(task("2", "b")).await.unwrap();
        collection.clear().await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 0]);
    }

    #[tokio::test]
    async fn test_skips_undecodable_records() {
        let engine = MemoryStorageEngine::new("tasks");
        engine
            .set("good", serde_json::to_value(task("good", "ok")).unwrap())
            .await
            .unwrap();
        engine
            .set("bad", serde_json::json!({ "not": "a task" }))
            .await
            .unwrap();

        let collection = Collection::open(options(engine)).await.unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.find("good").unwrap().name, "ok");
    }
}
