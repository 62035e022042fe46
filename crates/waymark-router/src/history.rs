// File: src/history.rs
// Purpose: History abstraction - locations, actions, memory and hash variants

use serde_json::Value;

use crate::error::RouterError;
use crate::path::{split_path, PathParts};

/// An immutable snapshot of "where we are".
///
/// Produced by a history adapter; never mutated, always replaced wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub pathname: String,
    pub search: String,
    pub hash: String,
    /// Opaque caller state carried with the entry.
    pub state: Option<Value>,
    /// Unique key for this entry, stable across revisits via `go`.
    pub key: String,
}

impl Location {
    /// Parses a path string (`/contacts?q=viv#top`) into a location with a
    /// fresh key.
    pub fn from_path(path: &str, state: Option<Value>) -> Self {
        let parts = split_path(path);
        Location {
            pathname: if parts.pathname.is_empty() {
                "/".to_string()
            } else {
                parts.pathname
            },
            search: parts.search,
            hash: parts.hash,
            state,
            key: random_key(),
        }
    }

    /// Serializes pathname + search + hash back into a path string.
    pub fn href(&self) -> String {
        PathParts {
            pathname: self.pathname.clone(),
            search: self.search.clone(),
            hash: self.hash.clone(),
        }
        .to_path()
    }
}

pub(crate) fn random_key() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// How the current location was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryAction {
    /// A new entry was appended.
    Push,
    /// The current entry was replaced in place.
    Replace,
    /// The stack pointer moved to an existing entry (back/forward).
    Pop,
}

/// A location-change notification from a history adapter.
#[derive(Debug, Clone)]
pub struct HistoryEvent {
    pub action: HistoryAction,
    pub location: Location,
}

pub type HistoryListener = Box<dyn Fn(HistoryEvent) + Send + Sync>;

/// Abstraction over history backends.
///
/// Two in-process variants ship here (memory and hash); a browser-backed
/// adapter implements the same trait from a wasm layer. In-process variants
/// report the result of `go` directly from the call; the listener hook
/// exists for adapter-originated changes (e.g. a popstate event fed in from
/// outside), which in-process variants never produce themselves.
pub trait History: Send {
    /// The current location.
    fn location(&self) -> Location;

    /// How the current location was reached.
    fn action(&self) -> HistoryAction;

    /// Appends a new entry, dropping any forward entries.
    fn push(&mut self, location: Location) -> Result<(), RouterError>;

    /// Replaces the current entry.
    fn replace(&mut self, location: Location) -> Result<(), RouterError>;

    /// Moves the stack pointer by `delta` and returns the location landed
    /// on. A traversal outside the stack bounds is an error and leaves the
    /// pointer unchanged.
    fn go(&mut self, delta: isize) -> Result<Location, RouterError>;

    /// Registers the listener for adapter-originated location changes.
    fn listen(&mut self, listener: HistoryListener);
}

// ============================================================================
// Memory history
// ============================================================================

/// Array-backed history for non-browser environments and tests.
pub struct MemoryHistory {
    entries: Vec<Location>,
    index: usize,
    action: HistoryAction,
    listener: Option<HistoryListener>,
}

impl MemoryHistory {
    /// A history with a single `/` entry.
    pub fn new() -> Self {
        Self::with_entries(["/"], None)
    }

    /// A history seeded with `initial_entries`; the current entry defaults
    /// to the last one.
    pub fn with_entries<I, S>(initial_entries: I, initial_index: Option<usize>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries: Vec<Location> = initial_entries
            .into_iter()
            .map(|path| Location::from_path(path.as_ref(), None))
            .collect();
        if entries.is_empty() {
            entries.push(Location::from_path("/", None));
        }
        let index = initial_index
            .unwrap_or(entries.len() - 1)
            .min(entries.len() - 1);

        Self {
            entries,
            index,
            action: HistoryAction::Pop,
            listener: None,
        }
    }

    /// Number of entries currently on the stack.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position of the current entry.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl History for MemoryHistory {
    fn location(&self) -> Location {
        self.entries[self.index].clone()
    }

    fn action(&self) -> HistoryAction {
        self.action
    }

    fn push(&mut self, location: Location) -> Result<(), RouterError> {
        self.entries.truncate(self.index + 1);
        self.entries.push(location);
        self.index += 1;
        self.action = HistoryAction::Push;
        Ok(())
    }

    fn replace(&mut self, location: Location) -> Result<(), RouterError> {
        self.entries[self.index] = location;
        self.action = HistoryAction::Replace;
        Ok(())
    }

    fn go(&mut self, delta: isize) -> Result<Location, RouterError> {
        let target = self.index as isize + delta;
        if target < 0 || target as usize >= self.entries.len() {
            return Err(RouterError::history(format!(
                "cannot traverse by {delta}: index {} of {} entries",
                self.index,
                self.entries.len()
            )));
        }
        self.index = target as usize;
        self.action = HistoryAction::Pop;
        Ok(self.entries[self.index].clone())
    }

    fn listen(&mut self, listener: HistoryListener) {
        self.listener = Some(listener);
    }
}

// ============================================================================
// Hash history
// ============================================================================

/// Parses a fragment-encoded href (`#/contacts?q=viv`) into a location.
pub fn parse_hash_href(href: &str) -> Location {
    let fragment = href.strip_prefix('#').unwrap_or(href);
    let path = if fragment.starts_with('/') {
        fragment.to_string()
    } else {
        format!("/{fragment}")
    };
    Location::from_path(&path, None)
}

/// Serializes a location into a fragment-encoded href.
pub fn format_hash_href(location: &Location) -> String {
    format!("#{}", location.href())
}

/// Fragment-encoded history: pathname, search, and hashless state live in
/// the URL fragment. Entry semantics are identical to [`MemoryHistory`];
/// only the external href representation differs.
pub struct HashHistory {
    inner: MemoryHistory,
}

impl HashHistory {
    pub fn new() -> Self {
        Self {
            inner: MemoryHistory::new(),
        }
    }

    /// A history seeded from a fragment href, e.g. `#/contacts?q=viv`.
    pub fn from_href(href: &str) -> Self {
        let location = parse_hash_href(href);
        let mut inner = MemoryHistory::with_entries([location.href().as_str()], None);
        // Keep the parsed state/key rather than re-deriving.
        let _ = inner.replace(location);
        Self { inner }
    }

    /// The current fragment-encoded href.
    pub fn href(&self) -> String {
        format_hash_href(&self.inner.location())
    }
}

impl Default for HashHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl History for HashHistory {
    fn location(&self) -> Location {
        self.inner.location()
    }

    fn action(&self) -> HistoryAction {
        self.inner.action()
    }

    fn push(&mut self, location: Location) -> Result<(), RouterError> {
        self.inner.push(location)
    }

    fn replace(&mut self, location: Location) -> Result<(), RouterError> {
        self.inner.replace(location)
    }

    fn go(&mut self, delta: isize) -> Result<Location, RouterError> {
        self.inner.go(delta)
    }

    fn listen(&mut self, listener: HistoryListener) {
        self.inner.listen(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_location_from_path() {
        let location = Location::from_path("/contacts?q=viv#top", None);
        assert_eq!(location.pathname, "/contacts");
        assert_eq!(location.search, "?q=viv");
        assert_eq!(location.hash, "#top");
        assert_eq!(location.href(), "/contacts?q=viv#top");
        assert_eq!(location.key.len(), 8);
    }

    #[test]
    fn test_memory_history_push_and_go() {
        let mut history = MemoryHistory::new();
        history.push(Location::from_path("/a", None)).unwrap();
        history.push(Location::from_path("/b", None)).unwrap();
        assert_eq!(history.location().pathname, "/b");
        assert_eq!(history.action(), HistoryAction::Push);

        let back = history.go(-2).unwrap();
        assert_eq!(back.pathname, "/");
        assert_eq!(history.action(), HistoryAction::Pop);

        let forward = history.go(1).unwrap();
        assert_eq!(forward.pathname, "/a");
    }

    #[test]
    fn test_memory_history_push_truncates_forward_entries() {
        let mut history = MemoryHistory::new();
        history.push(Location::from_path("/a", None)).unwrap();
        history.push(Location::from_path("/b", None)).unwrap();
        history.go(-1).unwrap();
        history.push(Location::from_path("/c", None)).unwrap();

        assert_eq!(history.len(), 3);
        assert!(history.go(1).is_err());
        assert_eq!(history.location().pathname, "/c");
    }

    #[test]
    fn test_memory_history_go_out_of_bounds_errors() {
        let mut history = MemoryHistory::new();
        let err = history.go(-1).unwrap_err();
        assert!(matches!(err, RouterError::History(_)));
        // Pointer unchanged.
        assert_eq!(history.location().pathname, "/");
    }

    #[test]
    fn test_memory_history_replace_keeps_length() {
        let mut history = MemoryHistory::new();
        history.push(Location::from_path("/a", None)).unwrap();
        history
            .replace(Location::from_path("/a2", None))
            .unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history.location().pathname, "/a2");
        assert_eq!(history.action(), HistoryAction::Replace);
    }

    #[test]
    fn test_with_entries_and_initial_index() {
        let history = MemoryHistory::with_entries(["/", "/a", "/b"], Some(1));
        assert_eq!(history.location().pathname, "/a");
    }

    #[test]
    fn test_hash_href_round_trip() {
        let location = parse_hash_href("#/contacts?q=viv");
        assert_eq!(location.pathname, "/contacts");
        assert_eq!(location.search, "?q=viv");
        assert_eq!(format_hash_href(&location), "#/contacts?q=viv");

        // A bare fragment gets a leading slash.
        assert_eq!(parse_hash_href("#contacts").pathname, "/contacts");
    }

    #[test]
    fn test_hash_history_parity_with_memory() {
        let mut memory = MemoryHistory::new();
        let mut hash = HashHistory::new();

        for history in [&mut memory as &mut dyn History, &mut hash as &mut dyn History] {
            history.push(Location::from_path("/a?x=1", None)).unwrap();
            history.push(Location::from_path("/b", None)).unwrap();
            history.go(-1).unwrap();
        }

        assert_eq!(memory.location().pathname, hash.location().pathname);
        assert_eq!(memory.location().search, hash.location().search);
        assert_eq!(hash.href(), "#/a?x=1");
    }
}
