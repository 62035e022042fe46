// File: src/error.rs
// Purpose: Error taxonomy for the router core

use thiserror::Error;

/// Fail-fast errors surfaced directly to the caller.
///
/// These are never absorbed into `RouterState::errors`: configuration
/// mistakes indicate programmer misuse and history failures are fatal to the
/// single `navigate()` call that hit them.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Invalid route configuration or an outlet resolved outside its active
    /// match chain.
    #[error("router configuration error: {0}")]
    Config(String),

    /// The history adapter refused or failed a traversal.
    #[error("history error: {0}")]
    History(String),
}

impl RouterError {
    pub fn config(message: impl Into<String>) -> Self {
        RouterError::Config(message.into())
    }

    pub fn history(message: impl Into<String>) -> Self {
        RouterError::History(message.into())
    }
}

/// Errors raised while encoding a submission.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("unsupported form method: {0}")]
    UnsupportedMethod(String),

    #[error("unsupported form encoding: {0}")]
    UnsupportedEncType(String),

    #[error("submission body could not be encoded: {0}")]
    Encode(String),
}

/// An error captured per-route in `RouterState::errors`.
///
/// Loader and action failures never escape `navigate()`/`fetch()`; they are
/// recovered into the state machine's error map and bubbled to the nearest
/// ancestor route with an error boundary. The rendering layer reads the map
/// and substitutes fallback content.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteError {
    /// No route matched the pathname; synthesized by the state machine.
    NotFound { pathname: String },

    /// A Response-like value thrown by a loader or action.
    ErrorResponse {
        status: u16,
        status_text: String,
        data: Option<serde_json::Value>,
    },

    /// Any other loader/action failure, stringified.
    Exception(String),
}

impl RouteError {
    pub fn not_found(pathname: impl Into<String>) -> Self {
        RouteError::NotFound {
            pathname: pathname.into(),
        }
    }

    pub fn response(status: u16, status_text: impl Into<String>) -> Self {
        RouteError::ErrorResponse {
            status,
            status_text: status_text.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        if let RouteError::ErrorResponse { data: slot, .. } = &mut self {
            *slot = Some(data);
        }
        self
    }

    pub fn exception(message: impl Into<String>) -> Self {
        RouteError::Exception(message.into())
    }

    /// HTTP-ish status for this error, when one applies.
    pub fn status(&self) -> Option<u16> {
        match self {
            RouteError::NotFound { .. } => Some(404),
            RouteError::ErrorResponse { status, .. } => Some(*status),
            RouteError::Exception(_) => None,
        }
    }
}

impl std::fmt::Display for RouteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteError::NotFound { pathname } => {
                write!(f, "404 Not Found: {pathname}")
            }
            RouteError::ErrorResponse {
                status,
                status_text,
                ..
            } => write!(f, "{status} {status_text}"),
            RouteError::Exception(message) => write!(f, "{message}"),
        }
    }
}

impl From<serde_json::Error> for RouteError {
    fn from(err: serde_json::Error) -> Self {
        RouteError::Exception(err.to_string())
    }
}
