/// Pattern parsing and scoring for route path segments
///
/// Pure functional parsing of `:param`/splat patterns into typed segments.
/// All functions are **pure**: same input → same output, no side effects.
use crate::error::RouterError;

const STATIC_SEGMENT_VALUE: i64 = 10;
const DYNAMIC_SEGMENT_VALUE: i64 = 3;
const EMPTY_SEGMENT_VALUE: i64 = 1;
const INDEX_ROUTE_VALUE: i64 = 2;
const SPLAT_PENALTY: i64 = -2;

/// Typed view of one route pattern segment.
///
/// # Examples
///
/// ```
/// use waymark_router::route::pattern::{classify_segment, PatternSegment};
///
/// assert_eq!(classify_segment("contacts"), PatternSegment::Static("contacts".into()));
/// assert_eq!(classify_segment(":contactId"), PatternSegment::Param("contactId".into()));
/// assert_eq!(classify_segment("*"), PatternSegment::Splat);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSegment {
    /// Literal text matched verbatim.
    Static(String),
    /// `:name` dynamic segment capturing one pathname segment.
    Param(String),
    /// Trailing `*` capturing the pathname remainder.
    Splat,
}

/// Classifies a single pattern segment (pure function).
pub fn classify_segment(segment: &str) -> PatternSegment {
    if segment == "*" {
        return PatternSegment::Splat;
    }
    match segment.strip_prefix(':') {
        Some(name) => PatternSegment::Param(name.to_string()),
        None => PatternSegment::Static(segment.to_string()),
    }
}

/// Parses a route path pattern into its typed segments.
///
/// Empty segments are dropped, so `/contact/:id` and `contact/:id` parse
/// identically.
pub fn pattern_segments(path: &str) -> Vec<PatternSegment> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(classify_segment)
        .collect()
}

/// Validates a route path pattern for tree construction.
///
/// The splat is only legal as the final segment, and params must carry a
/// name. Violations are configuration errors and fail fast.
pub fn validate_pattern(path: &str) -> Result<(), RouterError> {
    let segments = pattern_segments(path);
    for (index, segment) in segments.iter().enumerate() {
        match segment {
            PatternSegment::Splat if index + 1 != segments.len() => {
                return Err(RouterError::config(format!(
                    "route pattern {path:?}: splat must be the final segment"
                )));
            }
            PatternSegment::Param(name) if name.is_empty() => {
                return Err(RouterError::config(format!(
                    "route pattern {path:?}: param segment is missing a name"
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Scores a full branch path for specificity ranking (pure function).
///
/// Static segments outrank dynamic segments, which outrank a splat; an
/// index route outranks its bare parent. Branches are matched in
/// descending score order, so with `/users/new` and `/users/:id` both
/// registered, `/users/new` wins for the pathname `/users/new`.
pub fn compute_score(path: &str, index: bool) -> i64 {
    let segments: Vec<&str> = path.split('/').collect();

    let mut score = segments.len() as i64;
    if segments.iter().any(|s| *s == "*") {
        score += SPLAT_PENALTY;
    }
    if index {
        score += INDEX_ROUTE_VALUE;
    }

    segments
        .iter()
        .filter(|s| **s != "*")
        .fold(score, |score, segment| {
            score
                + if segment.starts_with(':') {
                    DYNAMIC_SEGMENT_VALUE
                } else if segment.is_empty() {
                    EMPTY_SEGMENT_VALUE
                } else {
                    STATIC_SEGMENT_VALUE
                }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classify_static() {
        assert_eq!(
            classify_segment("about"),
            PatternSegment::Static("about".to_string())
        );
    }

    #[test]
    fn test_classify_param() {
        assert_eq!(
            classify_segment(":contactId"),
            PatternSegment::Param("contactId".to_string())
        );
    }

    #[test]
    fn test_classify_splat() {
        assert_eq!(classify_segment("*"), PatternSegment::Splat);
    }

    #[test]
    fn test_pattern_segments_drops_empty() {
        assert_eq!(
            pattern_segments("/contact/:id"),
            vec![
                PatternSegment::Static("contact".to_string()),
                PatternSegment::Param("id".to_string()),
            ]
        );
        assert_eq!(pattern_segments("/"), vec![]);
    }

    #[test]
    fn test_validate_pattern_rejects_interior_splat() {
        assert!(validate_pattern("docs/*/extra").is_err());
        assert!(validate_pattern("docs/*").is_ok());
        assert!(validate_pattern("*").is_ok());
    }

    #[test]
    fn test_validate_pattern_rejects_unnamed_param() {
        assert!(validate_pattern("users/:").is_err());
        assert!(validate_pattern("users/:id").is_ok());
    }

    #[test]
    fn test_static_outranks_dynamic() {
        assert!(compute_score("/users/new", false) > compute_score("/users/:id", false));
    }

    #[test]
    fn test_dynamic_outranks_splat() {
        assert!(compute_score("/docs/:page", false) > compute_score("/docs/*", false));
    }

    #[test]
    fn test_index_outranks_bare_parent() {
        assert!(compute_score("/users", true) > compute_score("/users", false));
    }

    #[test]
    fn test_longer_static_prefix_wins() {
        assert!(compute_score("/a/b/c", false) > compute_score("/a/:x/c", false));
    }
}
