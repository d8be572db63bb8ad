//! Path template compilation.

use std::fmt;
use std::sync::Arc;

use crate::routing::error::RouteError;
use crate::routing::matcher::PathVariables;
use crate::routing::registry::{ParserRegistry, PathParser};

/// One compiled component of a [`PathTemplate`].
#[derive(Clone)]
pub enum Segment {
    /// Matches a decoded segment by exact string equality.
    Constant(String),
    /// Hands the decoded segment to the named parser.
    Variable {
        name: String,
        parser: Arc<dyn PathParser>,
    },
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Segment::Constant(a), Segment::Constant(b)) => a == b,
            (Segment::Variable { name: a, .. }, Segment::Variable { name: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for Segment {}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Constant(text) => f.debug_tuple("Constant").field(text).finish(),
            Segment::Variable { name, .. } => f.debug_tuple("Variable").field(name).finish(),
        }
    }
}

/// A compiled path pattern such as `/users/{int}/files/{string}`.
///
/// Templates are immutable once compiled. Every variable's parser is resolved
/// at compile time, so an unknown type name fails registration rather than a
/// later request.
#[derive(Clone, Debug)]
pub struct PathTemplate {
    pattern: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Compile `pattern` against the parsers currently in `registry`.
    pub fn compile(pattern: &str, registry: &ParserRegistry) -> Result<Self, RouteError> {
        let rest = match pattern.strip_prefix('/') {
            Some(rest) if !pattern.ends_with('/') => rest,
            _ => return Err(RouteError::MalformedPattern(pattern.to_string())),
        };

        let segments = rest
            .split('/')
            .map(|component| compile_segment(pattern, component, registry))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            pattern: pattern.to_string(),
            segments,
        })
    }

    /// The pattern text this template was compiled from.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments a request path must have to match.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of variable segments.
    pub fn variable_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| matches!(segment, Segment::Variable { .. }))
            .count()
    }

    /// Apply this template to already split and percent-decoded segments.
    ///
    /// Returns the parsed variables in order, or `None` if the segment count
    /// differs, a constant differs, or a parser rejects its segment.
    pub fn apply(&self, segments: &[String]) -> Option<PathVariables> {
        if segments.len() != self.segments.len() {
            return None;
        }

        let mut variables = PathVariables::with_capacity(self.variable_count());
        for (expected, actual) in self.segments.iter().zip(segments) {
            match expected {
                Segment::Constant(text) => {
                    if text != actual {
                        return None;
                    }
                }
                Segment::Variable { parser, .. } => {
                    let value = parser.parse(actual)?;
                    variables.push(actual.clone(), value);
                }
            }
        }
        Some(variables)
    }

    /// Whether some concrete path could satisfy both templates.
    ///
    /// Parsers are opaque, so any variable is assumed to accept anything; a
    /// `true` result means "possibly overlapping".
    pub fn may_overlap(&self, other: &PathTemplate) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Constant(a), Segment::Constant(b)) => a == b,
                    _ => true,
                })
    }
}

impl PartialEq for PathTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for PathTemplate {}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

fn compile_segment(pattern: &str, component: &str, registry: &ParserRegistry) -> Result<Segment, RouteError> {
    if !component.contains(['{', '}']) {
        return Ok(Segment::Constant(component.to_string()));
    }

    let name = component
        .strip_prefix('{')
        .and_then(|inner| inner.strip_suffix('}'))
        .filter(|name| !name.is_empty() && !name.contains(['{', '}']))
        .ok_or_else(|| RouteError::MalformedPattern(pattern.to_string()))?;

    let parser = registry
        .get(name)
        .ok_or_else(|| RouteError::UnknownParser(name.to_string()))?;

    Ok(Segment::Variable {
        name: name.to_string(),
        parser,
    })
}
