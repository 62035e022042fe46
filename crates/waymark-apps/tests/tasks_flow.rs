//! End-to-end task app flows: listing, adding with a redirect back to the
//! list, and per-item deletion through fetchers.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use waymark_apps::tasks::{task_routes, TaskStore};
use waymark_router::{
    FormSnapshot, NavigateOptions, RouteError, Router, RouterBuilder, SubmitOptions, SubmitTarget,
};
use waymark_storage::MemoryStorageEngine;

async fn tasks_app() -> (Router, Arc<TaskStore>) {
    let store = Arc::new(
        TaskStore::open(MemoryStorageEngine::new("tasks"))
            .await
            .unwrap(),
    );
    let router = RouterBuilder::new(task_routes(store.clone()))
        .build()
        .unwrap();
    router.initialize().await.unwrap();
    (router, store)
}

#[tokio::test]
async fn initial_load_lists_seeded_tasks() {
    let (router, _store) = tasks_app().await;

    let state = router.state();
    let tasks = state.loader_data["tasks"]["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 20);
    assert_eq!(tasks[0]["name"], "Task #1");
}

#[tokio::test]
async fn add_task_redirects_back_to_the_list() {
    let (router, store) = tasks_app().await;

    router
        .submit(
            "/",
            SubmitTarget::Form(
                FormSnapshot::new()
                    .with_method("post")
                    .with_field("newTask", "buy oat milk"),
            ),
            SubmitOptions::new(),
        )
        .await
        .unwrap();

    let state = router.state();
    assert_eq!(state.location.pathname, "/");
    assert!(state.navigation.state.is_idle());
    // The redirect cleared action data and the list reloaded with 21 items.
    assert!(state.action_data.is_none());
    let tasks = state.loader_data["tasks"]["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 21);
    assert!(store.tasks().iter().any(|t| t.name == "buy oat milk"));
}

#[tokio::test]
async fn delete_task_through_a_fetcher() {
    let (router, store) = tasks_app().await;
    let doomed = store.tasks()[0].clone();
    let location_before = router.state().location.clone();

    // A per-item delete form: the submitter button carries the task id.
    router
        .fetch(
            &format!("delete-{}", doomed.id),
            "list",
            "/",
            Some(SubmitTarget::Form(
                FormSnapshot::new()
                    .with_method("post")
                    .with_submitter("taskId", &doomed.id),
            )),
            SubmitOptions::new(),
        )
        .await
        .unwrap();

    let state = router.state();
    // Fetcher isolation: the navigation and location were untouched.
    assert_eq!(state.location, location_before);
    assert!(state.navigation.state.is_idle());

    let fetcher = state.fetcher(&format!("delete-{}", doomed.id)).unwrap();
    assert_eq!(fetcher.data.as_ref().unwrap()["deleted"], true);
    assert_eq!(fetcher.data.as_ref().unwrap()["taskId"], doomed.id);

    // The submission revalidated the list loader.
    let tasks = state.loader_data["tasks"]["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 19);
    assert!(store.tasks().iter().all(|t| t.id != doomed.id));
}

#[tokio::test]
async fn two_deletes_in_parallel_settle_independently() {
    let (router, store) = tasks_app().await;
    let first = store.tasks()[0].clone();
    let second = store.tasks()[1].clone();

    let (a, b) = tokio::join!(
        router.fetch(
            "delete-a",
            "list",
            "/",
            Some(SubmitTarget::Fields(vec![("taskId".into(), first.id.clone())])),
            SubmitOptions::new().with_method("post"),
        ),
        router.fetch(
            "delete-b",
            "list",
            "/",
            Some(SubmitTarget::Fields(vec![("taskId".into(), second.id.clone())])),
            SubmitOptions::new().with_method("post"),
        ),
    );
    a.unwrap();
    b.unwrap();

    let state = router.state();
    assert_eq!(state.fetcher("delete-a").unwrap().data.as_ref().unwrap()["deleted"], true);
    assert_eq!(state.fetcher("delete-b").unwrap().data.as_ref().unwrap()["deleted"], true);
    assert_eq!(store.tasks().len(), 18);
}

#[tokio::test]
async fn empty_submission_surfaces_bad_request() {
    let (router, _store) = tasks_app().await;

    router
        .submit(
            "/",
            SubmitTarget::Fields(Vec::new()),
            SubmitOptions::new().with_method("post"),
        )
        .await
        .unwrap();

    let state = router.state();
    let errors = state.errors.as_ref().unwrap();
    assert_eq!(errors["tasks"].status(), Some(400));
}

#[tokio::test]
async fn navigating_elsewhere_404s_but_keeps_the_app_alive() {
    let (router, _store) = tasks_app().await;

    router
        .navigate("/settings", NavigateOptions::new())
        .await
        .unwrap();
    let state = router.state();
    assert!(matches!(
        state.errors.as_ref().unwrap()["tasks"],
        RouteError::NotFound { .. }
    ));

    // The app recovers on the next good navigation.
    router.navigate("/", NavigateOptions::new()).await.unwrap();
    let state = router.state();
    assert!(state.errors.is_none());
    assert_eq!(
        state.loader_data["tasks"]["tasks"].as_array().unwrap().len(),
        20
    );
}
