//! The REST and WebSocket server.
//!
//! [`HttpServer`] owns a [`Router`] and serves one request per connection:
//! it reads the request head, selects a route, decodes the body for the
//! route's kind and writes the handler's [`HttpResponse`]. Upgrade requests
//! are negotiated against the WebSocket endpoints instead and then stay open
//! until either side closes them.

mod response;
mod config;
mod error;
mod handler;
mod http_server;
mod router;

// Re-export public items
pub use response::{HttpResponse, StatusCode};
pub use config::ServerConfig;
pub use error::Error;
pub use handler::{HandlerFn, HandlerFuture, HttpEndpoint, RouteKind, RoutedRequest};
pub use http_server::HttpServer;
pub use router::Router;
