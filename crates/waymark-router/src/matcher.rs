// File: src/matcher.rs
// Purpose: Pure route matching - ranked branches, match chains, params

use std::collections::HashMap;
use std::sync::Arc;

use crate::path::{decode_component, join_paths, normalize_pathname, PathAncestors};
use crate::route::pattern::{compute_score, pattern_segments, PatternSegment};
use crate::route::{Params, RouteNode, RouteTree};

/// One route's contribution to a matched chain.
///
/// Invariant: in a chain produced by [`match_routes`], every match's
/// `pathname_base` is a prefix of the next match's `pathname`.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch {
    pub route_id: String,
    /// The portion of the pathname this match consumed, from the root.
    pub pathname: String,
    /// The portion usable as a relative base for descendants (excludes any
    /// splat remainder).
    pub pathname_base: String,
    pub params: Params,
    pub index: bool,
    pub has_error_boundary: bool,
}

/// A flattened leaf-to-root candidate, precomputed at tree construction and
/// ranked by specificity.
#[derive(Debug, Clone)]
pub(crate) struct Branch {
    pub path: String,
    pub score: i64,
    pub levels: Vec<BranchLevel>,
}

#[derive(Debug, Clone)]
pub(crate) struct BranchLevel {
    pub route_id: String,
    pub relative_path: String,
    pub case_sensitive: bool,
}

/// Flattens the route tree into ranked branches (pure function).
///
/// Every route that carries a path (or is an index route) yields a branch;
/// pathless layout routes only appear as intermediate levels. Branches are
/// sorted by descending specificity score, declaration order breaking ties.
pub(crate) fn flatten_branches(
    nodes: &HashMap<String, Arc<RouteNode>>,
    root_ids: &[String],
) -> Vec<Branch> {
    fn recurse(
        nodes: &HashMap<String, Arc<RouteNode>>,
        id: &str,
        parent_path: &str,
        parent_levels: &[BranchLevel],
        branches: &mut Vec<Branch>,
    ) {
        let node = &nodes[id];
        let relative = node.path.clone().unwrap_or_default();
        let full = if relative.is_empty() {
            if parent_path.is_empty() {
                "/".to_string()
            } else {
                parent_path.to_string()
            }
        } else {
            join_paths(parent_path, &relative)
        };

        let mut levels = parent_levels.to_vec();
        levels.push(BranchLevel {
            route_id: node.id.clone(),
            relative_path: relative,
            case_sensitive: node.case_sensitive,
        });

        for child in &node.children {
            recurse(nodes, child, &full, &levels, branches);
        }

        if node.path.is_some() || node.index {
            branches.push(Branch {
                score: compute_score(&full, node.index),
                path: full,
                levels,
            });
        }
    }

    let mut branches = Vec::new();
    for id in root_ids {
        recurse(nodes, id, "", &[], &mut branches);
    }
    // Stable sort: equal scores keep declaration order.
    branches.sort_by(|a, b| b.score.cmp(&a.score));
    branches
}

pub(crate) struct PathMatch {
    params: Vec<(String, String)>,
    pathname: String,
    pathname_base: String,
}

/// Matches one pattern level against a (remaining) pathname.
///
/// With `end` set the pattern must consume the entire pathname; otherwise a
/// segment-boundary prefix suffices. A trailing splat captures the decoded
/// remainder (possibly empty) under the `*` param.
pub(crate) fn match_path(
    pattern: &str,
    pathname: &str,
    end: bool,
    case_sensitive: bool,
) -> Option<PathMatch> {
    let pattern_segs = pattern_segments(pattern);
    let path_segs: Vec<&str> = pathname.split('/').filter(|s| !s.is_empty()).collect();

    let has_splat = matches!(pattern_segs.last(), Some(PatternSegment::Splat));
    let base_len = if has_splat {
        pattern_segs.len() - 1
    } else {
        pattern_segs.len()
    };

    if path_segs.len() < base_len {
        return None;
    }
    if !has_splat && end && path_segs.len() != base_len {
        return None;
    }

    let mut params = Vec::new();
    for (i, segment) in pattern_segs[..base_len].iter().enumerate() {
        match segment {
            PatternSegment::Static(text) => {
                let candidate = path_segs[i];
                let matched = if case_sensitive {
                    text == candidate
                } else {
                    text.eq_ignore_ascii_case(candidate)
                };
                if !matched {
                    return None;
                }
            }
            PatternSegment::Param(name) => {
                params.push((name.clone(), decode_component(path_segs[i])));
            }
            PatternSegment::Splat => unreachable!("splat is validated to be trailing"),
        }
    }

    let base = if base_len == 0 {
        "/".to_string()
    } else {
        format!("/{}", path_segs[..base_len].join("/"))
    };

    if has_splat {
        let remainder: Vec<String> = path_segs[base_len..]
            .iter()
            .map(|s| decode_component(s))
            .collect();
        params.push(("*".to_string(), remainder.join("/")));
        let full = if path_segs.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", path_segs.join("/"))
        };
        return Some(PathMatch {
            params,
            pathname: full,
            pathname_base: base,
        });
    }

    Some(PathMatch {
        params,
        pathname: base.clone(),
        pathname_base: base,
    })
}

fn match_branch(tree: &RouteTree, branch: &Branch, pathname: &str) -> Option<Vec<RouteMatch>> {
    let mut matched_params: Vec<(String, String)> = Vec::new();
    let mut matched_pathname = String::from("/");
    let mut matches = Vec::with_capacity(branch.levels.len());

    for (i, level) in branch.levels.iter().enumerate() {
        let end = i == branch.levels.len() - 1;
        let remaining = if matched_pathname == "/" {
            pathname
        } else {
            let rest = &pathname[matched_pathname.len()..];
            if rest.is_empty() {
                "/"
            } else {
                rest
            }
        };

        let m = match_path(&level.relative_path, remaining, end, level.case_sensitive)?;
        matched_params.extend(m.params.iter().cloned());

        let node = tree.node(&level.route_id)?;
        let full_pathname = join_paths(&matched_pathname, &m.pathname);
        let full_base = normalize_pathname(&join_paths(&matched_pathname, &m.pathname_base)).into_owned();

        matches.push(RouteMatch {
            route_id: level.route_id.clone(),
            pathname: full_pathname,
            pathname_base: full_base.clone(),
            // Ancestor params first; a repeated name is overridden by the
            // deeper match (last wins).
            params: matched_params.iter().cloned().collect(),
            index: node.index,
            has_error_boundary: node.has_error_boundary,
        });

        if m.pathname_base != "/" {
            matched_pathname = full_base;
        }
    }

    Some(matches)
}

/// Finds the highest-ranked chain of routes covering `pathname`.
///
/// Pure and deterministic: the same `(tree, pathname)` always yields a
/// structurally identical chain. Returns `None` when no ranked branch
/// consumes the entire pathname.
pub fn match_routes(tree: &RouteTree, pathname: &str) -> Option<Vec<RouteMatch>> {
    let normalized = normalize_pathname(pathname);
    tree.branches()
        .iter()
        .find_map(|branch| match_branch(tree, branch, &normalized))
}

/// Finds the match chain for the deepest still-matchable ancestor of
/// `pathname`. Used to decide which route's error map receives a synthetic
/// 404 when the full pathname has no cover.
pub fn deepest_partial_match(tree: &RouteTree, pathname: &str) -> Option<Vec<RouteMatch>> {
    let normalized = normalize_pathname(pathname);
    PathAncestors::new(&normalized).find_map(|ancestor| match_routes(tree, ancestor))
}
