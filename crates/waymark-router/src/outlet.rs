// File: src/outlet.rs
// Purpose: Outlet resolution - which match renders next inside a boundary

use serde_json::Value;

use crate::error::{RouteError, RouterError};
use crate::matcher::RouteMatch;
use crate::state::RouterState;

/// Identifies the rendering boundary asking for its next match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutletId<'a> {
    /// The top-level provider, above the first match.
    Root,
    /// A boundary owned by the route with this id.
    Route(&'a str),
}

/// The next match to render inside a boundary, with its ambient data and
/// error context.
#[derive(Debug, Clone)]
pub struct OutletMatch {
    pub route_match: RouteMatch,
    /// Loader data for the matched route, when present.
    pub data: Option<Value>,
    /// The error captured for (or bubbled to) this route, when present.
    pub error: Option<RouteError>,
    /// Whether this boundary is the one responsible for displaying the
    /// error: the matched route declares an error boundary, or it is the
    /// root.
    pub is_error_boundary: bool,
}

/// Computes the next match to render below `current`.
///
/// Returns `Ok(None)` when the chain is exhausted (render nothing). A
/// non-root id absent from the active chain is a configuration error: the
/// boundary was mounted outside its route's active chain.
pub fn resolve_outlet(
    state: &RouterState,
    current: OutletId<'_>,
) -> Result<Option<OutletMatch>, RouterError> {
    let index = match current {
        OutletId::Root => None,
        OutletId::Route(id) => Some(
            state
                .matches
                .iter()
                .position(|m| m.route_id == id)
                .ok_or_else(|| {
                    RouterError::config(format!(
                        "outlet for route {id:?} resolved outside its active match chain"
                    ))
                })?,
        ),
    };

    let next_index = index.map(|i| i + 1).unwrap_or(0);
    let Some(next) = state.matches.get(next_index) else {
        return Ok(None);
    };

    let error = state
        .errors
        .as_ref()
        .and_then(|errors| errors.get(&next.route_id))
        .cloned();

    Ok(Some(OutletMatch {
        data: state.loader_data.get(&next.route_id).cloned(),
        error,
        is_error_boundary: next.has_error_boundary || next_index == 0,
        route_match: next.clone(),
    }))
}

/// The chain of matches from the root through the given route id, for
/// boundaries that need their ancestry (e.g. relative link resolution).
pub fn matches_through<'a>(state: &'a RouterState, route_id: &str) -> &'a [RouteMatch] {
    match state.matches.iter().position(|m| m.route_id == route_id) {
        Some(index) => &state.matches[..=index],
        None => &[],
    }
}
