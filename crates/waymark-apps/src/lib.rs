//! # Waymark Apps
//!
//! Two small CRUD apps - a contact manager and a task list - built on the
//! waymark router and storage layers. They are the reference consumers of
//! the router: declarative route trees whose loaders and actions read and
//! mutate a [`waymark_storage::Collection`], driven entirely through
//! [`waymark_router::Router`] navigations, submissions, and fetchers.
//!
//! A rendering layer would subscribe to router state and walk outlets; the
//! apps here are headless, which is also what makes them end-to-end
//! testable.

pub mod contacts;
pub mod tasks;
