// File: src/machine.rs
// Purpose: The navigation state machine - owns RouterState, runs
// loaders/actions, publishes immutable snapshots

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{join_all, BoxFuture};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::error::{RouteError, RouterError};
use crate::history::{
    random_key, History, HistoryAction, HistoryEvent, Location, MemoryHistory,
};
use crate::matcher::{deepest_partial_match, match_routes, RouteMatch};
use crate::path::{parse_search, resolve_to, split_path, PathParts};
use crate::route::{Redirect, Route, RouteArgs, RouteOutcome, RouteRequest, RouteTree};
use crate::state::{FetcherState, Navigation, RouterState};
use crate::submission::{encode_submission, FormMethod, Submission, SubmitOptions, SubmitTarget};

/// Redirect chains deeper than this are treated as loops.
const MAX_REDIRECTS: u8 = 5;

/// Navigation target: a path (absolute or relative to the active match
/// chain) or a history delta (back/forward).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum To {
    Path(String),
    Delta(isize),
}

impl From<&str> for To {
    fn from(path: &str) -> Self {
        To::Path(path.to_string())
    }
}

impl From<String> for To {
    fn from(path: String) -> Self {
        To::Path(path)
    }
}

impl From<isize> for To {
    fn from(delta: isize) -> Self {
        To::Delta(delta)
    }
}

/// Options for a plain (non-submission) navigation.
#[derive(Debug, Clone, Default)]
pub struct NavigateOptions {
    /// Replace the current history entry instead of pushing a new one.
    pub replace: bool,
    /// Opaque state to carry on the new location.
    pub state: Option<Value>,
}

impl NavigateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replace(mut self) -> Self {
        self.replace = true;
        self
    }

    pub fn with_state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }
}

/// Builder for a [`Router`].
pub struct RouterBuilder {
    routes: Vec<Route>,
    history: Option<Box<dyn History>>,
    hydration_data: Option<HashMap<String, Value>>,
}

impl RouterBuilder {
    pub fn new(routes: Vec<Route>) -> Self {
        Self {
            routes,
            history: None,
            hydration_data: None,
        }
    }

    /// Uses the given history source; defaults to a fresh [`MemoryHistory`].
    pub fn with_history(mut self, history: impl History + 'static) -> Self {
        self.history = Some(Box::new(history));
        self
    }

    /// Pre-populates loader data so [`Router::initialize`] can skip loaders
    /// whose data is already known.
    pub fn with_hydration_data(mut self, data: HashMap<String, Value>) -> Self {
        self.hydration_data = Some(data);
        self
    }

    /// Validates the route configuration and builds the router.
    ///
    /// Configuration mistakes (duplicate ids, index routes with children,
    /// malformed patterns) fail fast here.
    pub fn build(self) -> Result<Router, RouterError> {
        let tree = RouteTree::new(self.routes)?;
        let history = self
            .history
            .unwrap_or_else(|| Box::new(MemoryHistory::new()));

        let location = history.location();
        let history_action = history.action();
        let mut state = RouterState::initial(location, history_action);
        if let Some(data) = self.hydration_data {
            state.loader_data = data;
        }

        Ok(Router {
            inner: Arc::new(Inner {
                tree,
                history: Mutex::new(history),
                state: Mutex::new(Arc::new(state)),
                subscribers: Mutex::new(Vec::new()),
                nav_seq: AtomicU64::new(0),
                fetch_seqs: Mutex::new(HashMap::new()),
                next_fetch_seq: AtomicU64::new(0),
                disposed: AtomicBool::new(false),
            }),
        })
    }
}

struct Subscriber {
    active: Arc<AtomicBool>,
    callback: Arc<dyn Fn(Arc<RouterState>) + Send + Sync>,
}

/// Guard for an active router subscription; detaches on drop or
/// [`RouterSubscription::unsubscribe`].
#[must_use = "dropping a RouterSubscription detaches it immediately"]
pub struct RouterSubscription {
    active: Arc<AtomicBool>,
}

impl RouterSubscription {
    pub fn unsubscribe(self) {}

    /// Keeps the subscription alive for the router's lifetime.
    pub fn forget(self) {
        std::mem::forget(self);
    }
}

impl Drop for RouterSubscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

struct Inner {
    tree: RouteTree,
    history: Mutex<Box<dyn History>>,
    state: Mutex<Arc<RouterState>>,
    subscribers: Mutex<Vec<Subscriber>>,
    /// Monotonic sequence for navigations; a transition's results apply
    /// only while its number is still current.
    nav_seq: AtomicU64,
    /// Per-fetcher-key sequence numbers, same discipline as `nav_seq`.
    fetch_seqs: Mutex<HashMap<String, u64>>,
    next_fetch_seq: AtomicU64,
    disposed: AtomicBool,
}

#[derive(Clone)]
struct NavigationPlan {
    location: Location,
    history_action: HistoryAction,
    replace: bool,
    submission: Option<Submission>,
    redirects_followed: u8,
    force_revalidate: bool,
}

impl NavigationPlan {
    fn load(location: Location, history_action: HistoryAction) -> Self {
        Self {
            location,
            history_action,
            replace: false,
            submission: None,
            redirects_followed: 0,
            force_revalidate: false,
        }
    }
}

/// The navigation state machine.
///
/// Owns the current [`RouterState`] and is the only code allowed to mutate
/// it, always by whole-object replacement published to subscribers. Cloning
/// a `Router` clones the handle; all clones drive the same machine.
#[derive(Clone)]
pub struct Router {
    inner: Arc<Inner>,
}

impl Router {
    /// The current state snapshot.
    pub fn state(&self) -> Arc<RouterState> {
        self.inner.state.lock().expect("router state poisoned").clone()
    }

    /// Registers a listener for state snapshots. The listener runs
    /// synchronously after each published transition step: at minimum once
    /// when a transition starts and once when it settles.
    pub fn subscribe(
        &self,
        callback: impl Fn(Arc<RouterState>) + Send + Sync + 'static,
    ) -> RouterSubscription {
        let active = Arc::new(AtomicBool::new(true));
        self.inner
            .subscribers
            .lock()
            .expect("subscriber list poisoned")
            .push(Subscriber {
                active: Arc::clone(&active),
                callback: Arc::new(callback),
            });
        RouterSubscription { active }
    }

    /// Runs the initial location's loaders. `state().initialized` flips to
    /// true once they settle.
    pub async fn initialize(&self) -> Result<(), RouterError> {
        self.register_history_listener();
        let (location, history_action) = {
            let history = self.inner.history.lock().expect("history poisoned");
            (history.location(), history.action())
        };
        self.run_navigation(NavigationPlan::load(location, history_action))
            .await
    }

    /// Navigates to a path (absolute, or relative to the active match
    /// chain) or traverses history by a delta.
    pub async fn navigate(
        &self,
        to: impl Into<To>,
        options: NavigateOptions,
    ) -> Result<(), RouterError> {
        match to.into() {
            To::Delta(delta) => {
                let location = {
                    let mut history = self.inner.history.lock().expect("history poisoned");
                    history.go(delta)?
                };
                self.run_navigation(NavigationPlan::load(location, HistoryAction::Pop))
                    .await
            }
            To::Path(path) => {
                let parts = self.resolve(&path);
                let location = Location {
                    pathname: parts.pathname,
                    search: parts.search,
                    hash: parts.hash,
                    state: options.state,
                    key: random_key(),
                };
                let mut plan = NavigationPlan::load(location, HistoryAction::Push);
                plan.replace = options.replace;
                self.run_navigation(plan).await
            }
        }
    }

    /// Submission navigation: encodes the target, runs the matched action
    /// (for body-bearing methods), then revalidates loaders.
    pub async fn submit(
        &self,
        to: &str,
        target: SubmitTarget,
        options: SubmitOptions,
    ) -> Result<(), RouterError> {
        let default_action = self.resolve(to).to_path();
        let submission = encode_submission(&target, &default_action, &options)
            .map_err(|err| RouterError::config(format!("invalid submission: {err}")))?;

        let location = Location::from_path(&submission.url, None);
        let mut plan = NavigationPlan::load(location, HistoryAction::Push);
        plan.replace = options.replace;
        plan.submission = Some(submission);
        self.run_navigation(plan).await
    }

    /// Starts an independent fetcher transition scoped to one route's
    /// action/loader. Never touches `state.location` or `state.navigation`;
    /// only `state.fetchers[key]` (plus, after a successful submission, a
    /// background revalidation of the matched loaders).
    pub async fn fetch(
        &self,
        key: &str,
        owner_route_id: &str,
        href: &str,
        target: Option<SubmitTarget>,
        options: SubmitOptions,
    ) -> Result<(), RouterError> {
        if self.inner.disposed.load(Ordering::SeqCst) {
            return Ok(());
        }

        let seq = self.inner.next_fetch_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner
            .fetch_seqs
            .lock()
            .expect("fetcher sequences poisoned")
            .insert(key.to_string(), seq);
        let fetcher_current = || {
            self.inner
                .fetch_seqs
                .lock()
                .expect("fetcher sequences poisoned")
                .get(key)
                .copied()
                == Some(seq)
        };

        let parts = self.resolve(href);
        let submission = match &target {
            Some(target) => Some(
                encode_submission(target, &parts.to_path(), &options)
                    .map_err(|err| RouterError::config(format!("invalid submission: {err}")))?,
            ),
            None => None,
        };
        let url = submission
            .as_ref()
            .map(|s| s.url.clone())
            .unwrap_or_else(|| parts.to_path());
        let url_parts = split_path(&url);

        let Some(matches) = match_routes(&self.inner.tree, &url_parts.pathname) else {
            trace!(key, url = %url, "fetcher target did not match; capturing 404");
            let state = self.state();
            let boundary = boundary_for_route(&state.matches, owner_route_id)
                .unwrap_or_else(|| self.inner.tree.first_root_id().to_string());
            let mut next = (*state).clone();
            next.fetchers.insert(key.to_string(), FetcherState::idle());
            next.errors
                .get_or_insert_with(HashMap::new)
                .insert(boundary, RouteError::not_found(url_parts.pathname.clone()));
            self.publish(next);
            return Ok(());
        };

        let target_index = target_match_index(&matches, &url_parts.search);
        let target_match = matches[target_index].clone();
        let node = self
            .inner
            .tree
            .node(&target_match.route_id)
            .expect("matched node exists")
            .clone();
        let mutating = submission
            .as_ref()
            .map(|s| s.method.has_body())
            .unwrap_or(false);

        debug!(key, route = %target_match.route_id, mutating, "fetcher started");

        // Announce the in-flight fetcher, keeping previously loaded data.
        {
            let mut next = (*self.state()).clone();
            let prior_data = next.fetchers.get(key).and_then(|f| f.data.clone());
            next.fetchers.insert(
                key.to_string(),
                FetcherState::in_flight(submission.as_ref(), prior_data),
            );
            self.publish(next);
        }

        let args = RouteArgs {
            params: target_match.params.clone(),
            request: RouteRequest {
                method: submission
                    .as_ref()
                    .map(|s| s.method)
                    .unwrap_or(FormMethod::Get),
                url: url.clone(),
                body: submission.as_ref().and_then(|s| s.body.clone()),
            },
        };

        let result = if mutating {
            match node.action.clone() {
                Some(action) => action(args).await,
                None => Err(RouteError::response(405, "Method Not Allowed")),
            }
        } else {
            match node.loader.clone() {
                Some(loader) => loader(args).await,
                None => Err(RouteError::response(404, "Not Found")),
            }
        };

        if !fetcher_current() {
            trace!(key, "fetcher result discarded; deleted or superseded");
            return Ok(());
        }

        match result {
            Ok(RouteOutcome::Redirect(redirect)) => {
                {
                    let mut next = (*self.state()).clone();
                    next.fetchers.insert(key.to_string(), FetcherState::idle());
                    self.publish(next);
                }
                let carried = if redirect.preserves_method() {
                    submission
                } else {
                    None
                };
                let target = absolutize(&redirect.location, &url_parts.pathname);
                let mut plan =
                    NavigationPlan::load(Location::from_path(&target, None), HistoryAction::Push);
                plan.submission = carried;
                plan.redirects_followed = 1;
                plan.force_revalidate = true;
                self.run_navigation(plan).await
            }
            Ok(RouteOutcome::Data(value)) => {
                debug!(key, "fetcher settled");
                {
                    let mut next = (*self.state()).clone();
                    next.fetchers
                        .insert(key.to_string(), FetcherState::idle_with_data(Some(value)));
                    self.publish(next);
                }
                if mutating {
                    // A successful submission may have invalidated anything:
                    // revalidate every matched loader, leaving the location
                    // and navigation untouched.
                    self.revalidate_matches().await;
                }
                Ok(())
            }
            Err(error) => {
                debug!(key, %error, "fetcher failed");
                let state = self.state();
                let boundary = boundary_for_route(&state.matches, &target_match.route_id)
                    .or_else(|| boundary_for_route(&state.matches, owner_route_id))
                    .unwrap_or_else(|| {
                        state
                            .matches
                            .first()
                            .map(|m| m.route_id.clone())
                            .unwrap_or_else(|| self.inner.tree.first_root_id().to_string())
                    });
                let mut next = (*state).clone();
                next.fetchers.insert(key.to_string(), FetcherState::idle());
                next.errors
                    .get_or_insert_with(HashMap::new)
                    .insert(boundary, error);
                self.publish(next);
                Ok(())
            }
        }
    }

    /// The fetcher state for `key`, auto-creating an idle entry if absent.
    /// The silent insert does not notify subscribers.
    pub fn get_fetcher(&self, key: &str) -> FetcherState {
        let mut guard = self.inner.state.lock().expect("router state poisoned");
        if let Some(fetcher) = guard.fetchers.get(key) {
            return fetcher.clone();
        }
        let mut next = (**guard).clone();
        next.fetchers.insert(key.to_string(), FetcherState::idle());
        *guard = Arc::new(next);
        FetcherState::idle()
    }

    /// Drops a fetcher's state. Safe to call mid-flight; the in-flight
    /// result is discarded on arrival.
    pub fn delete_fetcher(&self, key: &str) {
        self.inner
            .fetch_seqs
            .lock()
            .expect("fetcher sequences poisoned")
            .remove(key);
        let mut next = (*self.state()).clone();
        if next.fetchers.remove(key).is_some() {
            trace!(key, "fetcher deleted");
            self.publish(next);
        }
    }

    /// Re-runs every matched route's loader against the current location.
    pub async fn revalidate(&self) {
        self.revalidate_matches().await;
    }

    /// Resolves a `to` value against the active match chain, for link hrefs.
    pub fn resolve_href(&self, to: &str) -> String {
        self.resolve(to).to_path()
    }

    /// Whether `to` is the current location, exactly or as an ancestor path
    /// on a segment boundary. Drives active-link styling.
    pub fn is_active(&self, to: &str) -> bool {
        let to_pathname = self.resolve(to).pathname;
        let current = self.state().location.pathname.clone();
        current == to_pathname
            || (current.starts_with(&to_pathname)
                && current.as_bytes().get(to_pathname.len()) == Some(&b'/'))
    }

    /// Whether an in-flight navigation is headed to `to`.
    pub fn is_pending(&self, to: &str) -> bool {
        let to_pathname = self.resolve(to).pathname;
        let state = self.state();
        match &state.navigation.location {
            Some(next) => {
                next.pathname == to_pathname
                    || (next.pathname.starts_with(&to_pathname)
                        && next.pathname.as_bytes().get(to_pathname.len()) == Some(&b'/'))
            }
            None => false,
        }
    }

    /// Tears the router down: cancels in-flight work and unsubscribes all
    /// listeners. Further navigations are ignored.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        self.inner.nav_seq.fetch_add(1, Ordering::SeqCst);
        self.inner
            .subscribers
            .lock()
            .expect("subscriber list poisoned")
            .clear();
        self.inner
            .fetch_seqs
            .lock()
            .expect("fetcher sequences poisoned")
            .clear();
        debug!("router disposed");
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn resolve(&self, to: &str) -> PathParts {
        let state = self.state();
        let bases = path_contributing_bases(&state.matches);
        resolve_to(to, &bases, &state.location.pathname)
    }

    fn publish(&self, state: RouterState) -> Arc<RouterState> {
        let snapshot = Arc::new(state);
        *self.inner.state.lock().expect("router state poisoned") = snapshot.clone();

        let callbacks: Vec<Arc<dyn Fn(Arc<RouterState>) + Send + Sync>> = {
            let mut subscribers = self
                .inner
                .subscribers
                .lock()
                .expect("subscriber list poisoned");
            subscribers.retain(|s| s.active.load(Ordering::SeqCst));
            subscribers.iter().map(|s| s.callback.clone()).collect()
        };
        for callback in callbacks {
            callback(snapshot.clone());
        }
        snapshot
    }

    fn register_history_listener(&self) {
        let weak = Arc::downgrade(&self.inner);
        let mut history = self.inner.history.lock().expect("history poisoned");
        history.listen(Box::new(move |event: HistoryEvent| {
            if let Some(inner) = weak.upgrade() {
                let router = Router { inner };
                tokio::spawn(async move {
                    let plan = NavigationPlan::load(event.location, event.action);
                    if let Err(err) = router.run_navigation(plan).await {
                        warn!(%err, "adapter-originated navigation failed");
                    }
                });
            }
        }));
    }

    fn run_navigation(&self, plan: NavigationPlan) -> BoxFuture<'_, Result<(), RouterError>> {
        Box::pin(async move {
            if self.inner.disposed.load(Ordering::SeqCst) {
                warn!("navigation after dispose ignored");
                return Ok(());
            }

            let seq = self.inner.nav_seq.fetch_add(1, Ordering::SeqCst) + 1;
            let is_current = || self.inner.nav_seq.load(Ordering::SeqCst) == seq;

            let prev = self.state();
            debug!(pathname = %plan.location.pathname, seq, "navigation started");

            let Some(matches) = match_routes(&self.inner.tree, &plan.location.pathname) else {
                trace!(pathname = %plan.location.pathname, "no match; synthesizing 404");
                self.commit_history(&plan)?;
                let state = self.not_found_state(&prev, &plan);
                self.publish(state);
                return Ok(());
            };

            // Publish the transition start.
            {
                let mut loading = (*prev).clone();
                loading.navigation =
                    Navigation::in_flight(plan.location.clone(), plan.submission.as_ref());
                self.publish(loading);
            }

            // --- Action phase ---------------------------------------------
            let mut action_data: Option<HashMap<String, Value>> = None;
            let mut errors: Option<HashMap<String, RouteError>> = None;
            let mut boundary_cut: Option<usize> = None;

            if let Some(submission) = plan.submission.as_ref().filter(|s| s.method.has_body()) {
                let target_index = target_match_index(&matches, &plan.location.search);
                let target = &matches[target_index];
                let node = self
                    .inner
                    .tree
                    .node(&target.route_id)
                    .expect("matched node exists");

                let result = match node.action.clone() {
                    Some(action) => {
                        let args = RouteArgs {
                            params: target.params.clone(),
                            request: RouteRequest {
                                method: submission.method,
                                url: request_url(&plan.location),
                                body: submission.body.clone(),
                            },
                        };
                        action(args).await
                    }
                    None => Err(RouteError::response(405, "Method Not Allowed")),
                };

                if !is_current() {
                    trace!(seq, "action result discarded; navigation superseded");
                    return Ok(());
                }

                match result {
                    Ok(RouteOutcome::Redirect(redirect)) => {
                        return self.follow_redirect(plan, redirect).await;
                    }
                    Ok(RouteOutcome::Data(value)) => {
                        let mut data = HashMap::new();
                        data.insert(target.route_id.clone(), value);
                        action_data = Some(data);
                    }
                    Err(error) => {
                        let boundary = boundary_index_for(&matches, target_index);
                        debug!(
                            route = %target.route_id,
                            boundary = %matches[boundary].route_id,
                            %error,
                            "action failed"
                        );
                        let mut map = HashMap::new();
                        map.insert(matches[boundary].route_id.clone(), error);
                        errors = Some(map);
                        boundary_cut = Some(boundary);
                    }
                }
            }

            // --- Loader phase ---------------------------------------------
            // After an action error, only routes above the boundary load;
            // everything at or below it is shadowed by the error.
            let loadable = match boundary_cut {
                Some(cut) => &matches[..cut],
                None => &matches[..],
            };
            let had_submission = plan
                .submission
                .as_ref()
                .map(|s| s.method.has_body())
                .unwrap_or(false);
            let search_changed = prev.location.search != plan.location.search;

            let to_load: Vec<RouteMatch> = loadable
                .iter()
                .filter(|m| {
                    let node = self
                        .inner
                        .tree
                        .node(&m.route_id)
                        .expect("matched node exists");
                    if node.loader.is_none() {
                        return false;
                    }
                    if plan.force_revalidate || had_submission || search_changed {
                        return true;
                    }
                    needs_revalidation(&prev, m)
                })
                .cloned()
                .collect();

            trace!(
                count = to_load.len(),
                routes = ?to_load.iter().map(|m| m.route_id.as_str()).collect::<Vec<_>>(),
                "running loaders"
            );
            let loader_results = self.call_loaders(&to_load, &plan.location).await;

            if !is_current() {
                trace!(seq, "loader results discarded; navigation superseded");
                return Ok(());
            }

            // Redirect short-circuit: the shallowest redirecting loader wins
            // and the intermediate state is never published.
            for (route_id, result) in &loader_results {
                if let Ok(RouteOutcome::Redirect(redirect)) = result {
                    trace!(route = %route_id, to = %redirect.location, "loader redirected");
                    return self.follow_redirect(plan, redirect.clone()).await;
                }
            }

            // Reuse unchanged entries, merge fresh results, capture errors
            // at their boundaries.
            let mut loader_data: HashMap<String, Value> = HashMap::new();
            for m in &matches {
                if let Some(value) = prev.loader_data.get(&m.route_id) {
                    loader_data.insert(m.route_id.clone(), value.clone());
                }
            }
            for (route_id, result) in loader_results {
                match result {
                    Ok(RouteOutcome::Data(value)) => {
                        loader_data.insert(route_id, value);
                    }
                    Ok(RouteOutcome::Redirect(_)) => {
                        unreachable!("redirects were followed above")
                    }
                    Err(error) => {
                        let index = matches
                            .iter()
                            .position(|m| m.route_id == route_id)
                            .expect("loader match exists");
                        let boundary = boundary_index_for(&matches, index);
                        debug!(
                            route = %route_id,
                            boundary = %matches[boundary].route_id,
                            %error,
                            "loader failed"
                        );
                        errors
                            .get_or_insert_with(HashMap::new)
                            .entry(matches[boundary].route_id.clone())
                            .or_insert(error);
                    }
                }
            }

            // Loader data at or below an error boundary is shadowed.
            if let Some(errs) = &errors {
                if let Some(first) = matches.iter().position(|m| errs.contains_key(&m.route_id)) {
                    for m in &matches[first..] {
                        loader_data.remove(&m.route_id);
                    }
                }
            }

            if let Err(err) = self.commit_history(&plan) {
                // Fatal to this navigation only: settle back to idle at the
                // previous location.
                warn!(%err, "history commit failed; navigation aborted");
                let mut reverted = (*prev).clone();
                reverted.navigation = Navigation::idle();
                self.publish(reverted);
                return Err(err);
            }

            let fetchers = self.state().fetchers.clone();
            let settled = RouterState {
                location: plan.location.clone(),
                matches,
                loader_data,
                action_data,
                errors,
                navigation: Navigation::idle(),
                history_action: effective_action(&plan),
                initialized: true,
                fetchers,
            };
            debug!(pathname = %plan.location.pathname, seq, "navigation settled");
            self.publish(settled);
            Ok(())
        })
    }

    async fn follow_redirect(
        &self,
        plan: NavigationPlan,
        redirect: Redirect,
    ) -> Result<(), RouterError> {
        if plan.redirects_followed >= MAX_REDIRECTS {
            warn!(to = %redirect.location, "redirect cap exceeded; surfacing as error");
            let prev = self.state();
            let mut state = (*prev).clone();
            state.navigation = Navigation::idle();
            state.initialized = true;
            state.errors.get_or_insert_with(HashMap::new).insert(
                self.inner.tree.first_root_id().to_string(),
                RouteError::exception(format!(
                    "redirect loop detected after {MAX_REDIRECTS} redirects: {}",
                    redirect.location
                )),
            );
            self.publish(state);
            return Ok(());
        }

        let target = absolutize(&redirect.location, &plan.location.pathname);
        // 307/308 re-submit the original method and body; everything else
        // degrades to a plain GET navigation (303 semantics).
        let submission = if redirect.preserves_method() {
            plan.submission.clone()
        } else {
            None
        };

        trace!(status = redirect.status, to = %target, "following redirect");
        let mut next = NavigationPlan::load(Location::from_path(&target, None), plan.history_action);
        next.replace = plan.replace;
        next.submission = submission;
        next.redirects_followed = plan.redirects_followed + 1;
        next.force_revalidate = true;
        self.run_navigation(next).await
    }

    async fn call_loaders(
        &self,
        to_load: &[RouteMatch],
        location: &Location,
    ) -> Vec<(String, Result<RouteOutcome, RouteError>)> {
        let url = request_url(location);
        let futures: Vec<_> = to_load
            .iter()
            .map(|m| {
                let node = self
                    .inner
                    .tree
                    .node(&m.route_id)
                    .expect("matched node exists");
                let loader = node.loader.clone().expect("filtered to loader routes");
                let args = RouteArgs {
                    params: m.params.clone(),
                    request: RouteRequest::get(url.clone()),
                };
                let route_id = m.route_id.clone();
                async move { (route_id, loader(args).await) }
            })
            .collect();
        join_all(futures).await
    }

    async fn revalidate_matches(&self) {
        let nav_seq_before = self.inner.nav_seq.load(Ordering::SeqCst);
        let state = self.state();
        if !state.navigation.state.is_idle() {
            // An in-flight navigation will load fresh data anyway.
            return;
        }

        let to_load: Vec<RouteMatch> = state
            .matches
            .iter()
            .filter(|m| {
                self.inner
                    .tree
                    .node(&m.route_id)
                    .map(|n| n.loader.is_some())
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        if to_load.is_empty() {
            return;
        }

        trace!(count = to_load.len(), "revalidating matched loaders");
        let results = self.call_loaders(&to_load, &state.location).await;

        if self.inner.nav_seq.load(Ordering::SeqCst) != nav_seq_before {
            trace!("revalidation superseded by a navigation; discarding");
            return;
        }

        let mut next = (*self.state()).clone();
        for (route_id, result) in results {
            match result {
                Ok(RouteOutcome::Data(value)) => {
                    next.loader_data.insert(route_id, value);
                }
                Ok(RouteOutcome::Redirect(_)) => {
                    // Background revalidation never redirects the user.
                }
                Err(error) => {
                    let boundary = boundary_for_route(&next.matches, &route_id)
                        .unwrap_or_else(|| self.inner.tree.first_root_id().to_string());
                    next.errors
                        .get_or_insert_with(HashMap::new)
                        .entry(boundary)
                        .or_insert(error);
                }
            }
        }
        self.publish(next);
    }

    fn commit_history(&self, plan: &NavigationPlan) -> Result<(), RouterError> {
        let mut history = self.inner.history.lock().expect("history poisoned");
        match plan.history_action {
            // A pop already moved the stack pointer.
            HistoryAction::Pop => Ok(()),
            HistoryAction::Replace => history.replace(plan.location.clone()),
            HistoryAction::Push if plan.replace => history.replace(plan.location.clone()),
            HistoryAction::Push => history.push(plan.location.clone()),
        }
    }

    fn not_found_state(&self, prev: &RouterState, plan: &NavigationPlan) -> RouterState {
        let partial =
            deepest_partial_match(&self.inner.tree, &plan.location.pathname).unwrap_or_default();
        let boundary = partial
            .iter()
            .rev()
            .find(|m| m.has_error_boundary)
            .or_else(|| partial.first())
            .map(|m| m.route_id.clone())
            .unwrap_or_else(|| self.inner.tree.first_root_id().to_string());

        let mut loader_data = HashMap::new();
        for m in &partial {
            if let Some(value) = prev.loader_data.get(&m.route_id) {
                loader_data.insert(m.route_id.clone(), value.clone());
            }
        }

        let mut errors = HashMap::new();
        errors.insert(boundary, RouteError::not_found(plan.location.href()));

        RouterState {
            location: plan.location.clone(),
            matches: partial,
            loader_data,
            action_data: None,
            errors: Some(errors),
            navigation: Navigation::idle(),
            history_action: effective_action(plan),
            initialized: true,
            fetchers: self.state().fetchers.clone(),
        }
    }
}

fn effective_action(plan: &NavigationPlan) -> HistoryAction {
    match plan.history_action {
        HistoryAction::Push if plan.replace => HistoryAction::Replace,
        action => action,
    }
}

fn request_url(location: &Location) -> String {
    format!("{}{}", location.pathname, location.search)
}

/// Resolves a redirect target: absolute paths pass through, relative ones
/// resolve against the pathname that issued the redirect.
fn absolutize(target: &str, from_pathname: &str) -> String {
    if target.starts_with('/') {
        return target.to_string();
    }
    let parts = split_path(target);
    let pathname = crate::path::resolve_pathname(&parts.pathname, from_pathname);
    PathParts {
        pathname,
        search: parts.search,
        hash: parts.hash,
    }
    .to_path()
}

/// The matches that contribute to relative path resolution: index routes
/// and pathless layouts are transparent.
fn path_contributing_bases(matches: &[RouteMatch]) -> Vec<String> {
    matches
        .iter()
        .enumerate()
        .filter(|(i, m)| {
            *i == 0 || (!m.index && m.pathname_base != matches[*i - 1].pathname_base)
        })
        .map(|(_, m)| m.pathname_base.clone())
        .collect()
}

/// The match whose loader/action a submission or fetcher addresses: the
/// deepest path-contributing match, unless an `index` query param addresses
/// the index route itself.
fn target_match_index(matches: &[RouteMatch], search: &str) -> usize {
    let wants_index = parse_search(search).iter().any(|(key, _)| key == "index");
    if wants_index {
        return matches.len() - 1;
    }
    let mut target = 0;
    for (i, m) in matches.iter().enumerate().skip(1) {
        if !m.index && m.pathname_base != matches[i - 1].pathname_base {
            target = i;
        }
    }
    target
}

/// Index of the nearest error boundary at or above `from`; the root-most
/// match is the boundary of last resort.
fn boundary_index_for(matches: &[RouteMatch], from: usize) -> usize {
    matches[..=from]
        .iter()
        .rposition(|m| m.has_error_boundary)
        .unwrap_or(0)
}

fn boundary_for_route(matches: &[RouteMatch], route_id: &str) -> Option<String> {
    let index = matches.iter().position(|m| m.route_id == route_id)?;
    Some(matches[boundary_index_for(matches, index)].route_id.clone())
}

/// Whether a match's loader must re-run: new or changed matches always do;
/// unchanged ancestors reuse their prior data.
fn needs_revalidation(prev: &RouterState, m: &RouteMatch) -> bool {
    if !prev.loader_data.contains_key(&m.route_id) {
        return true;
    }
    match prev.matches.iter().find(|p| p.route_id == m.route_id) {
        // Hydrated data for a route we never matched: trust it.
        None => false,
        Some(p) => p.pathname != m.pathname || p.params != m.params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Params;

    fn make_match(id: &str, base: &str, index: bool, boundary: bool) -> RouteMatch {
        RouteMatch {
            route_id: id.to_string(),
            pathname: base.to_string(),
            pathname_base: base.to_string(),
            params: Params::new(),
            index,
            has_error_boundary: boundary,
        }
    }

    #[test]
    fn test_path_contributing_bases_skips_index_and_pathless() {
        let matches = vec![
            make_match("root", "/", false, true),
            make_match("layout", "/", false, false),
            make_match("contacts", "/contacts", false, false),
            make_match("index", "/contacts", true, false),
        ];
        assert_eq!(
            path_contributing_bases(&matches),
            vec!["/".to_string(), "/contacts".to_string()]
        );
    }

    #[test]
    fn test_target_match_index_prefers_path_contributor() {
        let matches = vec![
            make_match("root", "/", false, true),
            make_match("index", "/", true, false),
        ];
        assert_eq!(target_match_index(&matches, ""), 0);
        assert_eq!(target_match_index(&matches, "?index"), 1);
    }

    #[test]
    fn test_boundary_index_walks_up() {
        let matches = vec![
            make_match("root", "/", false, true),
            make_match("mid", "/mid", false, false),
            make_match("leaf", "/mid/leaf", false, false),
        ];
        assert_eq!(boundary_index_for(&matches, 2), 0);

        let matches = vec![
            make_match("root", "/", false, true),
            make_match("mid", "/mid", false, true),
            make_match("leaf", "/mid/leaf", false, false),
        ];
        assert_eq!(boundary_index_for(&matches, 2), 1);
        assert_eq!(boundary_index_for(&matches, 0), 0);
    }

    #[test]
    fn test_absolutize() {
        assert_eq!(absolutize("/contacts/5", "/anything"), "/contacts/5");
        assert_eq!(absolutize("edit", "/contacts/5"), "/contacts/5/edit");
        assert_eq!(absolutize("../6?x=1", "/contacts/5"), "/contacts/6?x=1");
    }
}
