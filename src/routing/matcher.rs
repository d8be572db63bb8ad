//! Request path matching.

use std::sync::Arc;

use log::{debug, warn};

use crate::routing::registry::PathValue;
use crate::routing::table::{Route, RouteSnapshot, RouteTarget};

/// Variables parsed out of a request path, in template order.
#[derive(Debug, Default)]
pub struct PathVariables {
    raw: Vec<String>,
    values: Vec<PathValue>,
}

impl PathVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            raw: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, raw: String, value: PathValue) {
        self.raw.push(raw);
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The percent-decoded text of variable `index`.
    pub fn raw(&self, index: usize) -> Option<&str> {
        self.raw.get(index).map(String::as_str)
    }

    /// The parsed value of variable `index`, if it was produced as a `T`.
    pub fn get<T: 'static>(&self, index: usize) -> Option<&T> {
        self.values.get(index).and_then(PathValue::downcast_ref::<T>)
    }

    /// Shortcut for variables parsed by the built-in `string` parser.
    pub fn str(&self, index: usize) -> Option<&str> {
        self.get::<String>(index).map(String::as_str)
    }
}

/// Outcome of matching one request path against a route table.
#[derive(Debug)]
pub enum MatchResult<H> {
    NoMatch,
    Unique {
        route: Arc<Route<H>>,
        variables: PathVariables,
    },
    /// Two or more distinct templates accepted the path. Callers treat this
    /// like [`MatchResult::NoMatch`]; it has already been logged.
    Ambiguous {
        patterns: Vec<String>,
    },
}

impl<H> MatchResult<H> {
    pub fn is_unique(&self) -> bool {
        matches!(self, MatchResult::Unique { .. })
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, MatchResult::Ambiguous { .. })
    }
}

/// Match `path` against every route in `snapshot`.
pub fn match_path<H: RouteTarget>(snapshot: &RouteSnapshot<H>, path: &str) -> MatchResult<H> {
    match_path_where(snapshot, path, |_| true)
}

/// Match `path` against the routes of `snapshot` whose target passes
/// `accept`.
///
/// Every route is tried. A route bound to a template identical to a newer
/// route's template is hidden when the newer target shadows it; any other
/// pair of successful routes makes the result ambiguous.
pub fn match_path_where<H, F>(snapshot: &RouteSnapshot<H>, path: &str, accept: F) -> MatchResult<H>
where
    H: RouteTarget,
    F: Fn(&H) -> bool,
{
    let Some(segments) = split_path(path) else {
        debug!("Request path {path} could not be decoded");
        return MatchResult::NoMatch;
    };

    let mut candidates: Vec<(Arc<Route<H>>, PathVariables)> = Vec::new();
    for route in snapshot.iter() {
        if !accept(&route.target) {
            continue;
        }
        let Some(variables) = route.template.apply(&segments) else {
            continue;
        };
        let shadowed = candidates
            .iter()
            .any(|(newer, _)| newer.template == route.template && newer.target.shadows(&route.target));
        if shadowed {
            debug!("Route {template} is shadowed by a newer registration", template = route.template);
            continue;
        }
        candidates.push((Arc::clone(route), variables));
    }

    if candidates.len() > 1 {
        let patterns: Vec<String> = candidates
            .iter()
            .map(|(route, _)| route.template.pattern().to_string())
            .collect();
        warn!(
            "Ambiguous routes for {path}: {patterns}; treating as not found",
            patterns = patterns.join(", ")
        );
        return MatchResult::Ambiguous { patterns };
    }

    match candidates.pop() {
        Some((route, variables)) => MatchResult::Unique { route, variables },
        None => MatchResult::NoMatch,
    }
}

/// Split a request path into percent-decoded segments.
///
/// The query string is dropped and the leading `/` discarded. A trailing
/// empty segment is kept, so `/a/` yields `["a", ""]`. Returns `None` for
/// paths that do not start with `/` or that hold invalid percent escapes or
/// non UTF-8 data.
pub fn split_path(path: &str) -> Option<Vec<String>> {
    let path = path.split_once('?').map_or(path, |(path, _)| path);
    path.strip_prefix('/')?.split('/').map(percent_decode).collect()
}

/// Decode `%XX` escapes. `+` is left alone, as it is literal in a path.
pub fn percent_decode(s: &str) -> Option<String> {
    if !s.contains('%') {
        return Some(s.to_string());
    }

    let mut result = Vec::with_capacity(s.len());
    let mut bytes = s.bytes();
    while let Some(byte) = bytes.next() {
        if byte == b'%' {
            let hi = char::from(bytes.next()?).to_digit(16)?;
            let lo = char::from(bytes.next()?).to_digit(16)?;
            result.push((hi * 16 + lo) as u8);
        } else {
            result.push(byte);
        }
    }

    String::from_utf8(result).ok()
}
