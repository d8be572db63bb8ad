//! HTTP request handlers.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::body::{BodyKind, DecodedBody};
use crate::parser::HttpRequest;
use crate::routing::{PathVariables, RouteTarget};
use crate::server::{Error, HttpResponse};

/// Type alias for a boxed future that returns a Result<HttpResponse, Error>.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>>;

/// Type alias for a handler function that takes a RoutedRequest and returns a HandlerFuture.
pub type HandlerFn = Arc<dyn Fn(RoutedRequest) -> HandlerFuture + Send + Sync>;

/// Box a handler closure into a [`HandlerFn`].
pub(crate) fn handler_fn<F, Fut>(handler: F) -> HandlerFn
where
    F: Fn(RoutedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
{
    Arc::new(move |req: RoutedRequest| -> HandlerFuture { Box::pin(handler(req)) })
}

/// Everything a handler receives for one request.
#[derive(Debug)]
pub struct RoutedRequest {
    /// The parsed request head.
    pub request: HttpRequest,
    /// Typed path variables, in template order.
    pub variables: PathVariables,
    /// The decoded body; [`DecodedBody::None`] for GET and DELETE.
    pub body: DecodedBody,
}

/// Which route table a handler is registered in.
///
/// POST requests are split by body kind, so a multipart upload never
/// reaches a handler registered for url-encoded forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    Get,
    Put,
    Delete,
    Post(BodyKind),
}

impl RouteKind {
    pub const ALL: [RouteKind; 6] = [
        RouteKind::Get,
        RouteKind::Put,
        RouteKind::Delete,
        RouteKind::Post(BodyKind::Raw),
        RouteKind::Post(BodyKind::Form),
        RouteKind::Post(BodyKind::Multipart),
    ];
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteKind::Get => f.write_str("GET"),
            RouteKind::Put => f.write_str("PUT"),
            RouteKind::Delete => f.write_str("DELETE"),
            RouteKind::Post(BodyKind::Raw) => f.write_str("POST (raw)"),
            RouteKind::Post(BodyKind::Form) => f.write_str("POST (form)"),
            RouteKind::Post(BodyKind::Multipart) => f.write_str("POST (multipart)"),
        }
    }
}

/// The target of an HTTP route.
#[derive(Clone)]
pub struct HttpEndpoint {
    pub handler: HandlerFn,
}

impl fmt::Debug for HttpEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HttpEndpoint")
    }
}

impl RouteTarget for HttpEndpoint {}
