// File: src/tasks/mod.rs
// Purpose: Task list demo - model, data layer, and route tree

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use waymark_router::{redirect, Route, RouteError, RouteOutcome};
use waymark_storage::{Collection, CollectionOptions, StorageEngine, StorageError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
}

/// Seed list written when the backing store is empty.
pub fn default_tasks(count: usize) -> Vec<Task> {
    (1..=count)
        .map(|n| Task {
            id: n.to_string(),
            name: format!("Task #{n}"),
        })
        .collect()
}

/// Collection-backed task data layer.
pub struct TaskStore {
    collection: Collection<Task>,
}

impl TaskStore {
    /// Opens the store, seeding twenty numbered tasks when empty.
    pub async fn open(engine: impl StorageEngine + 'static) -> Result<Self, StorageError> {
        let collection = Collection::open(
            CollectionOptions::new(engine, |task: &Task| task.id.clone())
                .with_initial_value(default_tasks(20)),
        )
        .await?;
        Ok(Self { collection })
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.collection.items()
    }

    pub async fn add(&self, name: &str) -> Result<Task, StorageError> {
        let task = Task {
            id: uuid::Uuid::new_v4().simple().to_string()[..8].to_string(),
            name: name.to_string(),
        };
        self.collection.add(task.clone()).await?;
        debug!(id = %task.id, "task added");
        Ok(task)
    }

    pub async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let Some(task) = self.collection.items().into_iter().find(|t| t.id == id) else {
            return Ok(false);
        };
        self.collection.delete(&task).await?;
        debug!(id, "task deleted");
        Ok(true)
    }
}

/// The task app's route tree: one root route whose loader lists tasks and
/// whose action serves both forms - `newTask` submissions add and redirect
/// back to the list (302), `taskId` submissions (sent through per-item
/// fetchers) delete in place.
pub fn task_routes(store: Arc<TaskStore>) -> Vec<Route> {
    let list_store = store.clone();
    let mutate_store = store;

    vec![Route::new("/")
        .with_id("tasks")
        .with_error_boundary()
        .with_loader(move |_args| {
            let store = list_store.clone();
            async move { RouteOutcome::data(json!({ "tasks": store.tasks() })) }
        })
        .with_action(move |args| {
            let store = mutate_store.clone();
            async move {
                let field = |name: &str| args.request.form_data().and_then(|b| b.field(name));

                if let Some(task_id) = field("taskId") {
                    let existed = store
                        .delete(&task_id)
                        .await
                        .map_err(|err| RouteError::exception(err.to_string()))?;
                    return RouteOutcome::data(json!({ "deleted": existed, "taskId": task_id }));
                }

                if let Some(name) = field("newTask").filter(|name| !name.trim().is_empty()) {
                    store
                        .add(name.trim())
                        .await
                        .map_err(|err| RouteError::exception(err.to_string()))?;
                    return Ok(redirect("/"));
                }

                Err(RouteError::response(400, "Bad Request")
                    .with_data(json!({ "message": "expected a newTask or taskId field" })))
            }
        })
        .with_child(Route::index().with_id("list"))]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use waymark_storage::MemoryStorageEngine;

    #[tokio::test]
    async fn test_open_seeds_twenty_tasks() {
        let store = TaskStore::open(MemoryStorageEngine::new("tasks"))
            .await
            .unwrap();
        assert_eq!(store.tasks().len(), 20);
        assert_eq!(store.tasks()[0].name, "Task #1");
    }

    #[tokio::test]
    async fn test_add_and_delete() {
        let store = TaskStore::open(MemoryStorageEngine::new("tasks"))
            .await
            .unwrap();

        let task = store.add("water the plants").await.unwrap();
        assert_eq!(store.tasks().len(), 21);

        assert!(store.delete(&task.id).await.unwrap());
        assert_eq!(store.tasks().len(), 20);
        assert!(!store.delete(&task.id).await.unwrap());
    }
}
