//! Error types for the HTTP parser.

use thiserror::Error;

/// Errors that can occur while parsing a request head.
#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP method in the request is not recognized.
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// The request target is not an absolute path.
    #[error("Invalid HTTP path")]
    InvalidPath,

    /// The request line is malformed (wrong format or missing components).
    #[error("Malformed request line: {0}")]
    MalformedRequestLine(String),

    /// The HTTP version in the request is not supported.
    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    /// A required header is missing from the request.
    #[error("Required header is missing: {0}")]
    MissingHeader(String),

    /// A header line has no `:` separator.
    #[error("Invalid header format")]
    InvalidHeaderFormat,

    /// `Content-Length` is not a non-negative integer.
    #[error("Invalid Content-Length: {0}")]
    InvalidContentLength(String),

    /// The request is empty.
    #[error("Empty request")]
    EmptyRequest,
}
