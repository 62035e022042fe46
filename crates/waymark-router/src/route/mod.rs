// File: src/route/mod.rs
// Purpose: Declarative route configuration and the normalized route tree

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::{RouteError, RouterError};
use crate::matcher::{flatten_branches, Branch};
use crate::path::parse_search;
use crate::submission::{FormMethod, SubmissionBody};

pub mod pattern;

// ============================================================================
// Loader / action plumbing
// ============================================================================

/// Successful completion of a loader or action: either data for the route,
/// or a redirect signal that short-circuits the navigation.
///
/// Redirects are a distinct variant, never inferred from the shape of data,
/// and never conflated with errors.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Data(Value),
    Redirect(Redirect),
}

impl RouteOutcome {
    /// Serializes any `Serialize` value into a data outcome.
    pub fn data<T: serde::Serialize>(value: T) -> Result<Self, RouteError> {
        Ok(RouteOutcome::Data(serde_json::to_value(value)?))
    }
}

impl From<Redirect> for RouteOutcome {
    fn from(redirect: Redirect) -> Self {
        RouteOutcome::Redirect(redirect)
    }
}

/// A redirect signal returned from a loader or action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub location: String,
    pub status: u16,
}

impl Redirect {
    /// A `302 Found` redirect.
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            status: 302,
        }
    }

    /// A `303 See Other` redirect; always degrades the follow-up to `GET`.
    pub fn see_other(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            status: 303,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// `307`/`308` redirects re-submit the original method and body; all
    /// others degrade to a `GET` navigation.
    pub fn preserves_method(&self) -> bool {
        matches!(self.status, 307 | 308)
    }
}

/// Convenience constructor matching the shape loaders/actions want to write:
/// `return Ok(redirect("/contacts"))`.
pub fn redirect(location: impl Into<String>) -> RouteOutcome {
    RouteOutcome::Redirect(Redirect::to(location))
}

/// Path parameters extracted by the matcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(HashMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Parses a parameter into any `FromStr` type.
    pub fn get_as<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        self.0.get(name)?.parse().ok()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = (String, String)>) {
        self.0.extend(other);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Params(iter.into_iter().collect())
    }
}

/// The request handed to a loader or action: method, URL, and (for
/// body-bearing methods) the encoded submission body.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub method: FormMethod,
    /// Pathname plus search, e.g. `/contacts?q=viv`.
    pub url: String,
    pub body: Option<SubmissionBody>,
}

impl RouteRequest {
    /// A body-less `GET` request for a loader invocation.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: FormMethod::Get,
            url: url.into(),
            body: None,
        }
    }

    pub fn pathname(&self) -> &str {
        self.url.split(['?', '#']).next().unwrap_or(&self.url)
    }

    pub fn search(&self) -> &str {
        match self.url.find('?') {
            Some(idx) => &self.url[idx..],
            None => "",
        }
    }

    /// Decoded value of a query parameter, if present.
    pub fn query_param(&self, name: &str) -> Option<String> {
        parse_search(self.search())
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// The submission body, when one was encoded.
    pub fn form_data(&self) -> Option<&SubmissionBody> {
        self.body.as_ref()
    }
}

/// Arguments passed to loaders and actions.
#[derive(Debug, Clone)]
pub struct RouteArgs {
    pub params: Params,
    pub request: RouteRequest,
}

pub type LoaderArgs = RouteArgs;
pub type ActionArgs = RouteArgs;

pub type RouteFuture = BoxFuture<'static, Result<RouteOutcome, RouteError>>;

/// Read-side data function bound to a route, invoked on navigation.
pub type Loader = Arc<dyn Fn(LoaderArgs) -> RouteFuture + Send + Sync>;

/// Write-side function bound to a route, invoked on submission.
pub type Action = Arc<dyn Fn(ActionArgs) -> RouteFuture + Send + Sync>;

// ============================================================================
// Declarative route configuration
// ============================================================================

/// One node of the caller-supplied route declaration.
///
/// Built with consuming `with_*` methods and normalized into a [`RouteTree`]
/// by the router. Exactly one of `index` or `children` may be set; index
/// routes are leaves.
///
/// # Examples
///
/// ```
/// use waymark_router::route::Route;
///
/// let routes = vec![Route::new("/")
///     .with_error_boundary()
///     .with_child(Route::index())
///     .with_child(Route::new("contact/:contactId"))];
/// ```
#[derive(Clone, Default)]
pub struct Route {
    pub id: Option<String>,
    pub path: Option<String>,
    pub index: bool,
    pub case_sensitive: bool,
    pub has_error_boundary: bool,
    pub loader: Option<Loader>,
    pub action: Option<Action>,
    pub children: Vec<Route>,
}

impl Route {
    /// A route matched at `path` (relative to its parent).
    pub fn new(path: impl Into<String>) -> Self {
        Route {
            path: Some(path.into()),
            ..Route::default()
        }
    }

    /// An index route: matched when its parent's path is matched exactly.
    pub fn index() -> Self {
        Route {
            index: true,
            ..Route::default()
        }
    }

    /// A pathless layout route, matched whenever a descendant matches.
    pub fn layout() -> Self {
        Route::default()
    }

    /// Stable explicit id; defaults to the route's tree position.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_loader<F, Fut>(mut self, loader: F) -> Self
    where
        F: Fn(LoaderArgs) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<RouteOutcome, RouteError>> + Send + 'static,
    {
        self.loader = Some(Arc::new(move |args| Box::pin(loader(args))));
        self
    }

    pub fn with_action<F, Fut>(mut self, action: F) -> Self
    where
        F: Fn(ActionArgs) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<RouteOutcome, RouteError>> + Send + 'static,
    {
        self.action = Some(Arc::new(move |args| Box::pin(action(args))));
        self
    }

    /// Marks this route as owning an error boundary: errors thrown by it or
    /// bubbled from boundary-less descendants land here.
    pub fn with_error_boundary(mut self) -> Self {
        self.has_error_boundary = true;
        self
    }

    /// Makes path matching honor case. Matching is case-insensitive by
    /// default.
    pub fn with_case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }

    pub fn with_child(mut self, child: Route) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = Route>,
    {
        self.children.extend(children);
        self
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("index", &self.index)
            .field("children", &self.children.len())
            .finish()
    }
}

// ============================================================================
// Normalized route tree
// ============================================================================

/// A normalized route with assigned id and parent/child links.
#[derive(Clone)]
pub struct RouteNode {
    pub id: String,
    pub path: Option<String>,
    pub index: bool,
    pub case_sensitive: bool,
    pub has_error_boundary: bool,
    pub loader: Option<Loader>,
    pub action: Option<Action>,
    pub parent: Option<String>,
    pub children: Vec<String>,
}

impl std::fmt::Debug for RouteNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteNode")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("index", &self.index)
            .field("has_error_boundary", &self.has_error_boundary)
            .finish()
    }
}

/// The static, read-only route tree shared by every transition.
///
/// Construction validates the configuration and fails fast on programmer
/// misuse: duplicate ids, index routes with children, malformed patterns.
pub struct RouteTree {
    nodes: HashMap<String, Arc<RouteNode>>,
    root_ids: Vec<String>,
    branches: Vec<Branch>,
}

impl RouteTree {
    pub fn new(routes: Vec<Route>) -> Result<Self, RouterError> {
        if routes.is_empty() {
            return Err(RouterError::config("at least one route is required"));
        }

        let mut nodes = HashMap::new();
        let mut root_ids = Vec::new();

        for (index, route) in routes.into_iter().enumerate() {
            let id = Self::insert(&mut nodes, route, None, index)?;
            root_ids.push(id);
        }

        let branches = flatten_branches(&nodes, &root_ids);

        Ok(Self {
            nodes,
            root_ids,
            branches,
        })
    }

    fn insert(
        nodes: &mut HashMap<String, Arc<RouteNode>>,
        route: Route,
        parent: Option<&str>,
        position: usize,
    ) -> Result<String, RouterError> {
        if route.index && !route.children.is_empty() {
            return Err(RouterError::config(
                "index routes may not have children; they are leaves",
            ));
        }
        if let Some(path) = &route.path {
            pattern::validate_pattern(path)?;
        }

        let id = route.id.clone().unwrap_or_else(|| match parent {
            Some(parent_id) => format!("{parent_id}-{position}"),
            None => position.to_string(),
        });
        if nodes.contains_key(&id) {
            return Err(RouterError::config(format!(
                "duplicate route id {id:?}; ids must be unique across the tree"
            )));
        }

        // Reserve the slot before recursing so children see the id taken.
        nodes.insert(
            id.clone(),
            Arc::new(RouteNode {
                id: id.clone(),
                path: None,
                index: false,
                case_sensitive: false,
                has_error_boundary: false,
                loader: None,
                action: None,
                parent: None,
                children: Vec::new(),
            }),
        );

        let mut child_ids = Vec::with_capacity(route.children.len());
        for (child_position, child) in route.children.into_iter().enumerate() {
            child_ids.push(Self::insert(nodes, child, Some(&id), child_position)?);
        }

        nodes.insert(
            id.clone(),
            Arc::new(RouteNode {
                id: id.clone(),
                path: route.path.map(|p| p.trim_matches('/').to_string()),
                index: route.index,
                case_sensitive: route.case_sensitive,
                has_error_boundary: route.has_error_boundary,
                loader: route.loader,
                action: route.action,
                parent: parent.map(str::to_string),
                children: child_ids,
            }),
        );

        Ok(id)
    }

    pub fn node(&self, id: &str) -> Option<&Arc<RouteNode>> {
        self.nodes.get(id)
    }

    pub fn root_ids(&self) -> &[String] {
        &self.root_ids
    }

    /// The first root route's id; the fallback owner for errors that have
    /// nowhere else to land.
    pub fn first_root_id(&self) -> &str {
        &self.root_ids[0]
    }

    pub(crate) fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl std::fmt::Debug for RouteTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTree")
            .field("routes", &self.nodes.len())
            .field("branches", &self.branches.len())
            .finish()
    }
}
