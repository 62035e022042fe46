// File: src/contacts/mod.rs
// Purpose: Contact manager demo - model, data layer, and route tree

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use waymark_router::{redirect, Route, RouteError, RouteOutcome};
use waymark_storage::{Collection, CollectionOptions, StorageEngine, StorageError};

/// A single address-book entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    #[serde(default)]
    pub first: Option<String>,
    #[serde(default)]
    pub last: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub favorite: bool,
    #[serde(default)]
    pub created_at: i64,
}

impl Contact {
    fn blank(id: String) -> Self {
        Contact {
            id,
            first: None,
            last: None,
            avatar: None,
            handle: None,
            notes: None,
            favorite: false,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Field updates from the edit form; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ContactUpdate {
    pub first: Option<String>,
    pub last: Option<String>,
    pub avatar: Option<String>,
    pub handle: Option<String>,
    pub notes: Option<String>,
    pub favorite: Option<bool>,
}

/// Seed data written when the backing store is empty.
pub fn default_contacts() -> Vec<Contact> {
    let now = chrono::Utc::now().timestamp_millis();
    let seed = |id: &str, first: &str, last: &str, handle: &str, favorite: bool| Contact {
        id: id.to_string(),
        first: Some(first.to_string()),
        last: Some(last.to_string()),
        avatar: None,
        handle: Some(handle.to_string()),
        notes: None,
        favorite,
        created_at: now,
    };
    vec![
        seed("m4k2rd0", "Maren", "Kowalczyk", "@maren", true),
        seed("b7hq1sz", "Bela", "Horvat", "@bela", false),
        seed("t9vx3lp", "Tomas", "Iversen", "@tomas", false),
        seed("r2cn8we", "Rina", "Okafor", "@rina", true),
        seed("j5dm6qa", "Jonas", "Petrauskas", "@jonas", false),
    ]
}

/// Collection-backed contact data layer with a memoized fake-latency shim,
/// so demos show pending navigation states without a real backend.
pub struct ContactStore {
    collection: Collection<Contact>,
    latency: Duration,
    seen: Mutex<HashSet<String>>,
}

impl ContactStore {
    /// Opens the store over `engine`, seeding [`default_contacts`] when the
    /// store is empty. Latency defaults to zero; demos opt in with
    /// [`ContactStore::with_latency`].
    pub async fn open(engine: impl StorageEngine + 'static) -> Result<Self, StorageError> {
        let collection = Collection::open(
            CollectionOptions::new(engine, |contact: &Contact| contact.id.clone())
                .with_initial_value(default_contacts()),
        )
        .await?;

        Ok(Self {
            collection,
            latency: Duration::ZERO,
            seen: Mutex::new(HashSet::new()),
        })
    }

    /// Adds an artificial delay to uncached reads.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Simulates a network hop: repeated reads with the same key return
    /// instantly, and mutations (no key) invalidate the memo.
    async fn fake_network(&self, key: Option<&str>) {
        match key {
            None => {
                self.seen.lock().expect("latency memo poisoned").clear();
            }
            Some(key) => {
                let first_hit = self
                    .seen
                    .lock()
                    .expect("latency memo poisoned")
                    .insert(key.to_string());
                if !first_hit {
                    return;
                }
            }
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    /// Lists contacts, optionally filtered by a case-insensitive substring
    /// of name or handle, sorted by last then first name.
    pub async fn list(&self, query: Option<&str>) -> Vec<Contact> {
        self.fake_network(Some(&format!("list:{}", query.unwrap_or_default())))
            .await;

        let mut contacts = self.collection.items();
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            let needle = query.to_lowercase();
            contacts.retain(|contact| {
                [&contact.first, &contact.last, &contact.handle]
                    .into_iter()
                    .flatten()
                    .any(|field| field.to_lowercase().contains(&needle))
            });
        }
        contacts.sort_by(|a, b| {
            (a.last.as_deref(), a.first.as_deref()).cmp(&(b.last.as_deref(), b.first.as_deref()))
        });
        contacts
    }

    /// Creates a blank contact with a generated id.
    pub async fn create(&self) -> Result<Contact, StorageError> {
        self.fake_network(None).await;
        let id = uuid::Uuid::new_v4().simple().to_string()[..7].to_string();
        let contact = Contact::blank(id);
        self.collection.add(contact.clone()).await?;
        debug!(id = %contact.id, "contact created");
        Ok(contact)
    }

    pub async fn get(&self, id: &str) -> Option<Contact> {
        self.fake_network(Some(&format!("contact:{id}"))).await;
        self.collection.find(id)
    }

    /// Applies updates to an existing contact.
    pub async fn update(&self, id: &str, updates: ContactUpdate) -> Result<Contact> {
        self.fake_network(None).await;
        let mut contact = self
            .collection
            .find(id)
            .ok_or_else(|| anyhow!("no contact found for {id}"))?;

        if let Some(first) = updates.first {
            contact.first = Some(first);
        }
        if let Some(last) = updates.last {
            contact.last = Some(last);
        }
        if let Some(avatar) = updates.avatar {
            contact.avatar = Some(avatar);
        }
        if let Some(handle) = updates.handle {
            contact.handle = Some(handle);
        }
        if let Some(notes) = updates.notes {
            contact.notes = Some(notes);
        }
        if let Some(favorite) = updates.favorite {
            contact.favorite = favorite;
        }

        self.collection.add(contact.clone()).await?;
        Ok(contact)
    }

    /// Deletes a contact; returns whether it existed.
    pub async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        self.fake_network(None).await;
        match self.collection.find(id) {
            Some(contact) => {
                self.collection.delete(&contact).await?;
                debug!(id, "contact deleted");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn contacts(&self) -> Vec<Contact> {
        self.collection.items()
    }
}

fn missing_contact(id: &str) -> RouteError {
    RouteError::response(404, "Not Found")
        .with_data(json!({ "message": format!("no contact found for {id}") }))
}

/// The contact app's route tree, in the shape a rendering layer mounts:
///
/// - `/` (root layout): loader lists contacts (honoring `?q=`), action
///   creates a blank contact
///   - index: the splash panel
///   - `contact/:contactId`: loader fetches the record, action toggles
///     favorite
///   - `contact/:contactId/edit`: loader as above, action applies the form
///     and redirects to the detail page
///   - `contact/:contactId/destroy`: action deletes and redirects home;
///     has its own error boundary
pub fn contact_routes(store: Arc<ContactStore>) -> Vec<Route> {
    let list_store = store.clone();
    let create_store = store.clone();
    let detail_store = store.clone();
    let favorite_store = store.clone();
    let edit_view_store = store.clone();
    let edit_store = store.clone();
    let destroy_store = store;

    vec![Route::new("/")
        .with_id("root")
        .with_error_boundary()
        .with_loader(move |args| {
            let store = list_store.clone();
            async move {
                let q = args.request.query_param("q");
                let contacts = store.list(q.as_deref()).await;
                RouteOutcome::data(json!({ "contacts": contacts, "q": q }))
            }
        })
        .with_action(move |_args| {
            let store = create_store.clone();
            async move {
                let contact = store
                    .create()
                    .await
                    .map_err(|err| RouteError::exception(err.to_string()))?;
                RouteOutcome::data(json!({ "contact": contact }))
            }
        })
        .with_child(Route::index().with_id("index"))
        .with_child(
            Route::new("contact/:contactId")
                .with_id("contact")
                .with_loader(move |args| {
                    let store = detail_store.clone();
                    async move {
                        let id = args.params.get("contactId").unwrap_or_default().to_string();
                        match store.get(&id).await {
                            Some(contact) => RouteOutcome::data(contact),
                            None => Err(missing_contact(&id)),
                        }
                    }
                })
                .with_action(move |args| {
                    let store = favorite_store.clone();
                    async move {
                        let id = args.params.get("contactId").unwrap_or_default().to_string();
                        let favorite = args
                            .request
                            .form_data()
                            .and_then(|body| body.field("favorite"))
                            .map(|value| value == "true")
                            .unwrap_or(false);
                        let contact = store
                            .update(
                                &id,
                                ContactUpdate {
                                    favorite: Some(favorite),
                                    ..ContactUpdate::default()
                                },
                            )
                            .await
                            .map_err(|err| RouteError::exception(err.to_string()))?;
                        RouteOutcome::data(contact)
                    }
                }),
        )
        .with_child(
            Route::new("contact/:contactId/edit")
                .with_id("edit")
                .with_loader(move |args| {
                    let store = edit_view_store.clone();
                    async move {
                        let id = args.params.get("contactId").unwrap_or_default().to_string();
                        match store.get(&id).await {
                            Some(contact) => RouteOutcome::data(contact),
                            None => Err(missing_contact(&id)),
                        }
                    }
                })
                .with_action(move |args| {
                    let store = edit_store.clone();
                    async move {
                        let id = args.params.get("contactId").unwrap_or_default().to_string();
                        let field = |name: &str| {
                            args.request.form_data().and_then(|body| body.field(name))
                        };
                        store
                            .update(
                                &id,
                                ContactUpdate {
                                    first: field("first"),
                                    last: field("last"),
                                    avatar: field("avatar"),
                                    handle: field("handle"),
                                    notes: field("notes"),
                                    favorite: None,
                                },
                            )
                            .await
                            .map_err(|err| RouteError::exception(err.to_string()))?;
                        Ok(redirect(format!("/contact/{id}")))
                    }
                }),
        )
        .with_child(
            Route::new("contact/:contactId/destroy")
                .with_id("destroy")
                .with_error_boundary()
                .with_action(move |args| {
                    let store = destroy_store.clone();
                    async move {
                        let id = args.params.get("contactId").unwrap_or_default().to_string();
                        let existed = store
                            .delete(&id)
                            .await
                            .map_err(|err| RouteError::exception(err.to_string()))?;
                        if !existed {
                            return Err(RouteError::exception(format!(
                                "cannot destroy missing contact {id}"
                            )));
                        }
                        Ok(redirect("/"))
                    }
                }),
        )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use waymark_storage::MemoryStorageEngine;

    async fn store() -> ContactStore {
        ContactStore::open(MemoryStorageEngine::new("contacts"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_seeds_defaults() {
        let store = store().await;
        assert_eq!(store.contacts().len(), default_contacts().len());
    }

    #[tokio::test]
    async fn test_list_sorts_by_last_name() {
        let store = store().await;
        let all = store.list(None).await;
        let lasts: Vec<&str> = all.iter().filter_map(|c| c.last.as_deref()).collect();
        let mut sorted = lasts.clone();
        sorted.sort();
        assert_eq!(lasts, sorted);
    }

    #[tokio::test]
    async fn test_list_filters_by_query() {
        let store = store().await;
        let hits = store.list(Some("maren")).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].first.as_deref(), Some("Maren"));

        let by_handle = store.list(Some("@rina")).await;
        assert_eq!(by_handle.len(), 1);

        assert!(store.list(Some("zzz")).await.is_empty());
    }

    #[tokio::test]
    async fn test_create_update_delete_round_trip() {
        let store = store().await;

        let created = store.create().await.unwrap();
        assert!(store.get(&created.id).await.is_some());

        let updated = store
            .update(
                &created.id,
                ContactUpdate {
                    first: Some("Nadia".into()),
                    last: Some("Rahal".into()),
                    ..ContactUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.first.as_deref(), Some("Nadia"));

        assert!(store.delete(&created.id).await.unwrap());
        assert!(store.get(&created.id).await.is_none());
        assert!(!store.delete(&created.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_missing_contact_errors() {
        let store = store().await;
        let err = store
            .update("nope", ContactUpdate::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no contact found"));
    }
}
