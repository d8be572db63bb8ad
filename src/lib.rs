//! A small REST and WebSocket server with typed path templates and bounded
//! body decoding.
//!
//! # Features
//!
//! - Path templates such as `/users/{int}/files/{string}` whose variables are
//!   parsed by named, pluggable parsers
//! - Route tables that accept new routes while requests are being served
//! - Deterministic matching: a request that two distinct templates accept is
//!   rejected as ambiguous instead of being routed arbitrarily
//! - Raw, url-encoded and multipart body decoding with fixed size and
//!   variable-count ceilings
//! - WebSocket endpoints selected by path and sub-protocol
//!
//! # Examples
//!
//! ## Routing with typed variables
//!
//! ```no_run
//! use breakwater::{HttpResponse, HttpServer, PathValue, ServerConfig, StatusCode};
//!
//! # async fn run() -> Result<(), breakwater::ServerError> {
//! let server = HttpServer::new(ServerConfig::default());
//! server.register_path_variable_type("int", |raw: &str| raw.parse::<i64>().ok().map(PathValue::new))?;
//!
//! server.add_get("/users/{int}", |req| async move {
//!     let id = req.variables.get::<i64>(0).copied().unwrap_or_default();
//!     Ok(HttpResponse::text(StatusCode::Ok, format!("user {id}")))
//! })?;
//!
//! server.start().await
//! # }
//! ```
//!
//! ## Matching without a server
//!
//! ```
//! use breakwater::routing::{match_path, ParserRegistry, PathTemplate, Route, RouteTable, RouteTarget};
//!
//! struct Name(&'static str);
//! impl RouteTarget for Name {}
//!
//! let registry = ParserRegistry::new();
//! let table = RouteTable::new();
//! table.add(Route::new(PathTemplate::compile("/files/{string}", &registry).unwrap(), Name("files")));
//!
//! let result = match_path(&table.snapshot(), "/files/a%20b");
//! assert!(result.is_unique());
//! ```

pub mod body;
pub mod parser;
pub mod routing;
pub mod server;
pub mod websocket;

// Re-export commonly used items for convenience
pub use body::{BodyKind, DecodedBody, StringMultiMap};
pub use parser::{parse_request, Error as ParserError, HttpRequest, HttpVersion, Method};
pub use routing::{PathParser, PathValue, PathVariables, RouteError};
pub use server::{
    Error as ServerError, HttpResponse, HttpServer, RouteKind, RoutedRequest, Router, ServerConfig, StatusCode,
};
pub use websocket::{WebSocketHandler, WebSocketSession};
