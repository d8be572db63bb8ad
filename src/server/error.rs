//! Error types for the HTTP server.

use thiserror::Error;

use crate::body::BodyError;
use crate::parser::{Error as ParserError, Method};
use crate::routing::RouteError;
use crate::websocket::Error as WebSocketError;

/// Errors from route registration and request handling.
#[derive(Debug, Error)]
pub enum Error {
    /// Error parsing an HTTP request.
    #[error("Parse error: {0}")]
    ParseError(#[from] ParserError),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A route could not be registered.
    #[error("Route error: {0}")]
    Route(#[from] RouteError),

    /// The request body could not be decoded.
    #[error("Body error: {0}")]
    Body(#[from] BodyError),

    /// An open WebSocket failed.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WebSocketError),

    /// No single route matched the request.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The method has no route tables.
    #[error("Method {0} not allowed for path: {1}")]
    MethodNotAllowed(Method, String),

    /// An upgrade matched an endpoint whose factory declined it.
    #[error("WebSocket upgrade rejected for path: {0}")]
    UpgradeRejected(String),

    /// The request head did not arrive within the read timeout.
    #[error("Timed out reading request")]
    TimedOut,

    /// The request head exceeded the read buffer size.
    #[error("Request head larger than {0} bytes")]
    RequestTooLarge(usize),

    /// The request uses a feature the server does not implement.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Internal server error.
    #[error("Internal server error: {0}")]
    InternalError(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
