//! Error types for route registration.

use thiserror::Error;

/// Errors raised while compiling path templates or registering parsers.
///
/// These are configuration errors: they surface synchronously to whoever is
/// registering a route and never reach a client.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    /// The pattern is empty, does not start with `/`, ends with `/`, or uses
    /// braces outside of a whole `{name}` segment.
    #[error("Malformed path pattern: {0}")]
    MalformedPattern(String),

    /// A `{name}` segment refers to a parser that is not registered.
    #[error("Unknown path variable type: {0}")]
    UnknownParser(String),

    /// A parser with this name is already registered.
    #[error("Path variable type already registered: {0}")]
    DuplicateParserName(String),
}
