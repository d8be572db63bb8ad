//! HTTP request head parser.
//!
//! Produces the request descriptor the router works from: method, target
//! path, version, headers and decoded query parameters. Bodies are left on
//! the transport for the body decoder.

mod request;
mod method;
mod version;
mod error;

// Re-export public items
pub use request::{find_head_end, parse_request, HttpRequest};
pub use method::Method;
pub use version::HttpVersion;
pub use error::Error;
