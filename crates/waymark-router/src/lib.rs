//! # Waymark Router
//!
//! A headless, data-first client router: a nested route tree with loaders
//! and actions, a navigation state machine publishing immutable state
//! snapshots, keyed fetchers for background submissions, and a submission
//! encoder that normalizes heterogeneous form inputs.
//!
//! The router owns no rendering. A UI layer subscribes to state snapshots,
//! asks [`outlet::resolve_outlet`] which match to render next, and calls
//! [`Router::navigate`]/[`Router::submit`]/[`Router::fetch`] from its links
//! and forms.
//!
//! ## Shape of a transition
//!
//! 1. A navigation resolves its target against the active match chain and
//!    re-matches the route tree.
//! 2. The matched chain's action (for submissions) and loaders run
//!    concurrently; unchanged ancestors reuse their prior data.
//! 3. Redirect outcomes short-circuit into a fresh navigation; errors are
//!    captured per-route and bubble to the nearest error boundary.
//! 4. The machine publishes the settled [`RouterState`] to subscribers as a
//!    whole-object replacement.
//!
//! Starting a navigation while another is in flight cancels the older one:
//! its results are discarded when they eventually resolve.
//!
//! ## Example
//!
//! ```
//! use waymark_router::{Route, RouteOutcome, RouterBuilder};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), waymark_router::RouterError> {
//! let routes = vec![Route::new("/")
//!     .with_id("root")
//!     .with_error_boundary()
//!     .with_child(Route::index().with_id("home"))
//!     .with_child(
//!         Route::new("contact/:contactId")
//!             .with_id("contact")
//!             .with_loader(|args| async move {
//!                 let id = args.params.get("contactId").unwrap_or_default().to_string();
//!                 RouteOutcome::data(serde_json::json!({ "id": id }))
//!             }),
//!     )];
//!
//! let router = RouterBuilder::new(routes).build()?;
//! router.initialize().await?;
//! router.navigate("/contact/5", Default::default()).await?;
//!
//! let state = router.state();
//! assert_eq!(state.location.pathname, "/contact/5");
//! assert_eq!(state.loader_data["contact"]["id"], "5");
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Module Declarations
// ============================================================================

pub mod error;
pub mod history;
pub mod machine;
pub mod matcher;
pub mod outlet;
pub mod path;
pub mod route;
pub mod state;
pub mod submission;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{RouteError, RouterError, SubmissionError};
pub use history::{
    format_hash_href, parse_hash_href, HashHistory, History, HistoryAction, HistoryEvent,
    HistoryListener, Location, MemoryHistory,
};
pub use machine::{NavigateOptions, Router, RouterBuilder, RouterSubscription, To};
pub use matcher::{deepest_partial_match, match_routes, RouteMatch};
pub use outlet::{matches_through, resolve_outlet, OutletId, OutletMatch};
pub use route::{
    redirect, Action, ActionArgs, Loader, LoaderArgs, Params, Redirect, Route, RouteArgs,
    RouteOutcome, RouteRequest, RouteTree,
};
pub use state::{FetcherState, Navigation, RouterState, TransitionState};
pub use submission::{
    encode_submission, EncType, FormMethod, FormSnapshot, SubmitOptions, SubmitTarget, Submission,
    SubmissionBody,
};
