/// Path utilities: normalization, splitting, and relative resolution
///
/// All functions are **pure**: given same input, always produce same output
/// with no side effects.
use std::borrow::Cow;

/// Validates that a pathname is in canonical form.
///
/// # Rules
///
/// - Must start with `/`
/// - Must not contain `//`
/// - Must not end with `/` (except root `/`)
/// - Must not be empty
///
/// # Examples
///
/// ```
/// use waymark_router::path::is_canonical_pathname;
///
/// assert!(is_canonical_pathname("/"));
/// assert!(is_canonical_pathname("/contacts/123"));
///
/// assert!(!is_canonical_pathname(""));
/// assert!(!is_canonical_pathname("contacts"));
/// assert!(!is_canonical_pathname("/contacts/"));
/// assert!(!is_canonical_pathname("/contacts//123"));
/// ```
pub fn is_canonical_pathname(pathname: &str) -> bool {
    if pathname.is_empty() || !pathname.starts_with('/') {
        return false;
    }
    if pathname.contains("//") {
        return false;
    }
    if pathname == "/" {
        return true;
    }
    !pathname.ends_with('/')
}

/// Normalizes a pathname to canonical form.
///
/// Zero-copy when the input is already canonical (`Cow::Borrowed`); a single
/// allocation otherwise. Trailing slashes, repeated slashes, and a missing
/// leading slash are all repaired.
///
/// # Examples
///
/// ```
/// use waymark_router::path::normalize_pathname;
///
/// assert_eq!(normalize_pathname("/about"), "/about");
/// assert_eq!(normalize_pathname("/about/"), "/about");
/// assert_eq!(normalize_pathname("/a//b///c"), "/a/b/c");
/// assert_eq!(normalize_pathname(""), "/");
/// ```
pub fn normalize_pathname(pathname: &str) -> Cow<'_, str> {
    if is_canonical_pathname(pathname) {
        return Cow::Borrowed(pathname);
    }

    let normalized = pathname
        .split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    if normalized.is_empty() {
        Cow::Borrowed("/")
    } else {
        Cow::Owned(format!("/{}", normalized))
    }
}

/// Joins two path fragments with exactly one separator between them.
pub fn join_paths(base: &str, rest: &str) -> String {
    let joined = format!("{}/{}", base, rest);
    let collapsed = joined
        .split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    if collapsed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", collapsed)
    }
}

/// The three addressable components of a path string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParts {
    pub pathname: String,
    pub search: String,
    pub hash: String,
}

impl PathParts {
    /// Serializes back into a single path string.
    pub fn to_path(&self) -> String {
        let mut path = self.pathname.clone();
        if !self.search.is_empty() && self.search != "?" {
            if self.search.starts_with('?') {
                path.push_str(&self.search);
            } else {
                path.push('?');
                path.push_str(&self.search);
            }
        }
        if !self.hash.is_empty() && self.hash != "#" {
            if self.hash.starts_with('#') {
                path.push_str(&self.hash);
            } else {
                path.push('#');
                path.push_str(&self.hash);
            }
        }
        path
    }
}

/// Splits a path string into pathname, search, and hash.
///
/// # Examples
///
/// ```
/// use waymark_router::path::split_path;
///
/// let parts = split_path("/contacts?q=viv#top");
/// assert_eq!(parts.pathname, "/contacts");
/// assert_eq!(parts.search, "?q=viv");
/// assert_eq!(parts.hash, "#top");
/// ```
pub fn split_path(path: &str) -> PathParts {
    let mut pathname = path;
    let mut search = "";
    let mut hash = "";

    if let Some(idx) = pathname.find('#') {
        hash = &pathname[idx..];
        pathname = &pathname[..idx];
    }
    if let Some(idx) = pathname.find('?') {
        search = &pathname[idx..];
        pathname = &pathname[..idx];
    }

    PathParts {
        pathname: pathname.to_string(),
        search: if search == "?" { String::new() } else { search.to_string() },
        hash: if hash == "#" { String::new() } else { hash.to_string() },
    }
}

/// Resolves a relative pathname against a base pathname, honoring `.` and
/// `..` segments.
pub fn resolve_pathname(relative: &str, from: &str) -> String {
    let mut segments: Vec<&str> = from.split('/').filter(|s| !s.is_empty()).collect();

    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Resolves a `to` value against the active match chain's base paths.
///
/// `bases` are the pathname bases contributed by the current match chain,
/// root first. A leading `/` makes `to` absolute; `..` segments climb the
/// route hierarchy (one base per `..`), and everything else resolves against
/// the deepest base. An empty `to` pathname keeps the current location's
/// pathname (useful for search-only navigations like `?q=x`).
///
/// # Examples
///
/// ```
/// use waymark_router::path::resolve_to;
///
/// let bases = vec!["/".to_string(), "/contacts".to_string()];
/// assert_eq!(resolve_to("5", &bases, "/contacts/2").pathname, "/contacts/5");
/// assert_eq!(resolve_to("../archive", &bases, "/contacts/2").pathname, "/archive");
/// assert_eq!(resolve_to("/tasks", &bases, "/contacts/2").pathname, "/tasks");
/// assert_eq!(resolve_to("?q=viv", &bases, "/contacts").pathname, "/contacts");
/// ```
pub fn resolve_to(to: &str, bases: &[String], location_pathname: &str) -> PathParts {
    let parts = split_path(to);

    let pathname = if parts.pathname.is_empty() {
        location_pathname.to_string()
    } else if parts.pathname.starts_with('/') {
        normalize_pathname(&parts.pathname).into_owned()
    } else {
        let mut segments: Vec<&str> = parts
            .pathname
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let mut base_index = bases.len() as isize - 1;
        while segments.first() == Some(&"..") {
            segments.remove(0);
            base_index -= 1;
        }
        let from = if base_index >= 0 {
            bases[base_index as usize].as_str()
        } else {
            "/"
        };
        resolve_pathname(&segments.join("/"), from)
    };

    PathParts {
        pathname,
        search: parts.search,
        hash: parts.hash,
    }
}

/// Parses a search string into decoded key/value pairs.
///
/// Accepts the string with or without its leading `?`. Keys without `=` get
/// an empty value.
pub fn parse_search(search: &str) -> Vec<(String, String)> {
    let raw = search.strip_prefix('?').unwrap_or(search);
    if raw.is_empty() {
        return Vec::new();
    }

    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

/// Serializes key/value pairs into a search string (no leading `?`).
pub fn encode_search(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

pub(crate) fn decode_component(raw: &str) -> String {
    let unplussed = raw.replace('+', " ");
    match urlencoding::decode(&unplussed) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => {
            tracing::warn!(component = raw, "failed to percent-decode component");
            unplussed
        }
    }
}

/// Lazy iterator over a pathname and its ancestors.
///
/// For `/a/b/c`, yields `/a/b/c` → `/a/b` → `/a` → `/`. Used to find the
/// deepest still-matchable ancestor when a full match fails.
pub struct PathAncestors<'a> {
    current: Option<&'a str>,
}

impl<'a> PathAncestors<'a> {
    pub fn new(pathname: &'a str) -> Self {
        Self {
            current: Some(pathname),
        }
    }
}

impl<'a> Iterator for PathAncestors<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;

        self.current = if current == "/" {
            None
        } else if let Some(slash) = current.rfind('/') {
            if slash == 0 {
                Some("/")
            } else {
                Some(&current[..slash])
            }
        } else {
            None
        };

        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_pathname() {
        assert!(matches!(normalize_pathname("/about"), Cow::Borrowed("/about")));
        assert_eq!(normalize_pathname("/about/"), "/about");
        assert_eq!(normalize_pathname("about"), "/about");
        assert_eq!(normalize_pathname("/a//b/"), "/a/b");
        assert_eq!(normalize_pathname("/"), "/");
        assert_eq!(normalize_pathname(""), "/");
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("/", "contacts"), "/contacts");
        assert_eq!(join_paths("/contacts", ":id"), "/contacts/:id");
        assert_eq!(join_paths("/", ""), "/");
        assert_eq!(join_paths("/a/", "/b"), "/a/b");
    }

    #[test]
    fn test_split_path() {
        assert_eq!(
            split_path("/a?x=1#frag"),
            PathParts {
                pathname: "/a".into(),
                search: "?x=1".into(),
                hash: "#frag".into(),
            }
        );
        assert_eq!(split_path("/a").search, "");
        assert_eq!(split_path("?q=1").pathname, "");
        assert_eq!(split_path("/a?").search, "");
    }

    #[test]
    fn test_path_parts_round_trip() {
        let parts = split_path("/contacts?q=viv#top");
        assert_eq!(parts.to_path(), "/contacts?q=viv#top");

        let bare = split_path("/contacts");
        assert_eq!(bare.to_path(), "/contacts");
    }

    #[test]
    fn test_resolve_pathname() {
        assert_eq!(resolve_pathname("5", "/contacts"), "/contacts/5");
        assert_eq!(resolve_pathname("../b", "/a/x"), "/a/b");
        assert_eq!(resolve_pathname(".", "/a/b"), "/a/b");
        assert_eq!(resolve_pathname("../../..", "/a/b"), "/");
    }

    #[test]
    fn test_resolve_to_relative_semantics() {
        let bases = vec!["/".to_string(), "/contacts".to_string()];

        // Sibling route relative to the deepest base.
        assert_eq!(resolve_to("new", &bases, "/contacts/5").pathname, "/contacts/new");
        // `..` climbs one route level, not one URL segment.
        assert_eq!(resolve_to("..", &bases, "/contacts/5").pathname, "/");
        // Absolute paths pass through.
        assert_eq!(resolve_to("/tasks/9", &bases, "/contacts").pathname, "/tasks/9");
        // Search-only keeps the pathname.
        let resolved = resolve_to("?q=x", &bases, "/contacts");
        assert_eq!(resolved.pathname, "/contacts");
        assert_eq!(resolved.search, "?q=x");
    }

    #[test]
    fn test_parse_search() {
        assert_eq!(
            parse_search("?q=viv&page=2"),
            vec![
                ("q".to_string(), "viv".to_string()),
                ("page".to_string(), "2".to_string()),
            ]
        );
        assert_eq!(
            parse_search("index"),
            vec![("index".to_string(), String::new())]
        );
        assert_eq!(parse_search("?a=hello%20world")[0].1, "hello world");
        assert_eq!(parse_search("?a=1+2")[0].1, "1 2");
        assert!(parse_search("").is_empty());
        assert!(parse_search("?").is_empty());
    }

    #[test]
    fn test_encode_search() {
        let pairs = vec![("q".to_string(), "hello world".to_string())];
        assert_eq!(encode_search(&pairs), "q=hello%20world");
    }

    #[test]
    fn test_path_ancestors() {
        let all: Vec<&str> = PathAncestors::new("/a/b/c").collect();
        assert_eq!(all, vec!["/a/b/c", "/a/b", "/a", "/"]);

        let root: Vec<&str> = PathAncestors::new("/").collect();
        assert_eq!(root, vec!["/"]);
    }
}
