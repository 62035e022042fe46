// File: src/state.rs
// Purpose: Published router state - immutable snapshots, navigation and
// fetcher descriptors

use std::collections::HashMap;

use serde_json::Value;

use crate::error::RouteError;
use crate::history::{HistoryAction, Location};
use crate::matcher::RouteMatch;
use crate::submission::{FormMethod, Submission, SubmissionBody};

/// Lifecycle of an in-flight transition, shared by the main navigation and
/// each fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionState {
    #[default]
    Idle,
    Loading,
    Submitting,
}

impl TransitionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, TransitionState::Idle)
    }
}

impl std::fmt::Display for TransitionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TransitionState::Idle => "idle",
            TransitionState::Loading => "loading",
            TransitionState::Submitting => "submitting",
        })
    }
}

/// Describes the in-flight navigation; `Idle` is the resting state.
#[derive(Debug, Clone, PartialEq)]
pub struct Navigation {
    pub state: TransitionState,
    /// Where the navigation is headed, while in flight.
    pub location: Option<Location>,
    pub form_method: Option<FormMethod>,
    pub form_action: Option<String>,
    pub form_data: Option<SubmissionBody>,
}

impl Navigation {
    pub fn idle() -> Self {
        Navigation {
            state: TransitionState::Idle,
            location: None,
            form_method: None,
            form_action: None,
            form_data: None,
        }
    }

    /// The in-flight descriptor for a navigation, carrying submission
    /// details when one is present.
    pub(crate) fn in_flight(location: Location, submission: Option<&Submission>) -> Self {
        let state = match submission {
            Some(submission) if submission.method.has_body() => TransitionState::Submitting,
            _ => TransitionState::Loading,
        };
        Navigation {
            state,
            location: Some(location),
            form_method: submission.map(|s| s.method),
            form_action: submission.map(|s| s.url.clone()),
            form_data: submission.and_then(|s| s.body.clone()),
        }
    }
}

impl Default for Navigation {
    fn default() -> Self {
        Navigation::idle()
    }
}

/// State of one keyed fetcher.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FetcherState {
    pub state: TransitionState,
    pub form_method: Option<FormMethod>,
    pub form_action: Option<String>,
    pub form_data: Option<SubmissionBody>,
    /// Data from the fetcher's last completed load or action.
    pub data: Option<Value>,
}

impl FetcherState {
    pub fn idle() -> Self {
        FetcherState::default()
    }

    pub(crate) fn in_flight(submission: Option<&Submission>, data: Option<Value>) -> Self {
        let state = match submission {
            Some(submission) if submission.method.has_body() => TransitionState::Submitting,
            _ => TransitionState::Loading,
        };
        FetcherState {
            state,
            form_method: submission.map(|s| s.method),
            form_action: submission.map(|s| s.url.clone()),
            form_data: submission.and_then(|s| s.body.clone()),
            data,
        }
    }

    pub(crate) fn idle_with_data(data: Option<Value>) -> Self {
        FetcherState {
            data,
            ..FetcherState::idle()
        }
    }
}

/// The full router state, owned exclusively by the navigation state machine
/// and published to subscribers as a whole-object replacement after every
/// transition step. No partial mutation is ever visible outside the machine.
#[derive(Debug, Clone)]
pub struct RouterState {
    pub location: Location,
    /// Root-to-leaf chain of matches for `location`.
    pub matches: Vec<RouteMatch>,
    /// Loader data keyed by route id.
    pub loader_data: HashMap<String, Value>,
    /// Action data keyed by route id; present only after a submission.
    pub action_data: Option<HashMap<String, Value>>,
    /// Captured loader/action errors keyed by the boundary route id they
    /// bubbled to.
    pub errors: Option<HashMap<String, RouteError>>,
    pub navigation: Navigation,
    pub history_action: HistoryAction,
    /// False until the initial location's loaders have settled.
    pub initialized: bool,
    pub fetchers: HashMap<String, FetcherState>,
}

impl RouterState {
    pub(crate) fn initial(location: Location, history_action: HistoryAction) -> Self {
        RouterState {
            location,
            matches: Vec::new(),
            loader_data: HashMap::new(),
            action_data: None,
            errors: None,
            navigation: Navigation::idle(),
            history_action,
            initialized: false,
            fetchers: HashMap::new(),
        }
    }

    pub fn loader_data_for(&self, route_id: &str) -> Option<&Value> {
        self.loader_data.get(route_id)
    }

    pub fn action_data_for(&self, route_id: &str) -> Option<&Value> {
        self.action_data.as_ref()?.get(route_id)
    }

    pub fn error_for(&self, route_id: &str) -> Option<&RouteError> {
        self.errors.as_ref()?.get(route_id)
    }

    pub fn fetcher(&self, key: &str) -> Option<&FetcherState> {
        self.fetchers.get(key)
    }

    /// The match for a given route id, if it is in the active chain.
    pub fn match_for(&self, route_id: &str) -> Option<&RouteMatch> {
        self.matches.iter().find(|m| m.route_id == route_id)
    }
}
