//! Named path variable parsers.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;

use crate::routing::error::RouteError;

/// Name of the built-in parser which accepts any segment as a `String`.
pub const STRING_PARSER: &str = "string";

/// A typed value produced by a [`PathParser`].
pub struct PathValue(Box<dyn Any + Send + Sync>);

impl PathValue {
    /// Wrap a parsed value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Box::new(value))
    }

    /// Borrow the value as `T`, if that is the type the parser produced.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for PathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PathValue(..)")
    }
}

/// Converts one decoded path segment into a typed value.
///
/// Returning `None` means the segment does not satisfy this variable type,
/// which rejects the route for the current request only.
pub trait PathParser: Send + Sync {
    fn parse(&self, raw: &str) -> Option<PathValue>;
}

impl<F> PathParser for F
where
    F: Fn(&str) -> Option<PathValue> + Send + Sync,
{
    fn parse(&self, raw: &str) -> Option<PathValue> {
        self(raw)
    }
}

/// The built-in parser: every segment is accepted as a `String`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringParser;

impl PathParser for StringParser {
    fn parse(&self, raw: &str) -> Option<PathValue> {
        Some(PathValue::new(raw.to_string()))
    }
}

/// Registry of path variable parsers keyed by type name.
///
/// Seeded with [`STRING_PARSER`]. A name can only be bound once; templates
/// resolve their parsers when they are compiled, so a lookup never happens
/// on the request path.
pub struct ParserRegistry {
    parsers: DashMap<String, Arc<dyn PathParser>>,
}

impl ParserRegistry {
    /// Create a registry containing only the built-in `string` parser.
    pub fn new() -> Self {
        let parsers: DashMap<String, Arc<dyn PathParser>> = DashMap::new();
        parsers.insert(STRING_PARSER.to_string(), Arc::new(StringParser));
        Self { parsers }
    }

    /// Bind `parser` to `name`.
    pub fn register(&self, name: impl Into<String>, parser: impl PathParser + 'static) -> Result<(), RouteError> {
        let name = name.into();
        if name.is_empty() || name.contains(['{', '}', '/']) {
            return Err(RouteError::MalformedPattern(format!("invalid variable type name '{name}'")));
        }
        match self.parsers.entry(name) {
            Entry::Occupied(entry) => Err(RouteError::DuplicateParserName(entry.key().clone())),
            Entry::Vacant(entry) => {
                debug!("Registered path variable type '{name}'", name = entry.key());
                entry.insert(Arc::new(parser));
                Ok(())
            }
        }
    }

    /// Look up the parser bound to `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn PathParser>> {
        self.parsers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Check whether `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.parsers.contains_key(name)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.parsers.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        f.debug_struct("ParserRegistry").field("parsers", &names).finish()
    }
}
