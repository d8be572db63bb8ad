//! Path and sub-protocol negotiation for upgrade requests.

use std::fmt;
use std::sync::Arc;

use crate::parser::HttpRequest;
use crate::routing::{match_path_where, MatchResult, PathVariables, RouteSnapshot, RouteTarget};
use crate::websocket::WebSocketHandler;

/// Builds the handler for an accepted upgrade.
///
/// Returning `None` declines the connection after negotiation succeeded;
/// the client then receives `403 Forbidden`.
pub trait WebSocketFactory: Send + Sync {
    fn create(&self, request: &HttpRequest, variables: PathVariables) -> Option<Box<dyn WebSocketHandler>>;
}

impl<F> WebSocketFactory for F
where
    F: Fn(&HttpRequest, PathVariables) -> Option<Box<dyn WebSocketHandler>> + Send + Sync,
{
    fn create(&self, request: &HttpRequest, variables: PathVariables) -> Option<Box<dyn WebSocketHandler>> {
        self(request, variables)
    }
}

/// A factory registered for one path template and one sub-protocol.
#[derive(Clone)]
pub struct WebSocketEndpoint {
    protocol: String,
    factory: Arc<dyn WebSocketFactory>,
}

impl WebSocketEndpoint {
    pub fn new(protocol: impl Into<String>, factory: Arc<dyn WebSocketFactory>) -> Self {
        Self {
            protocol: protocol.into(),
            factory,
        }
    }

    /// The single sub-protocol this endpoint speaks.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn factory(&self) -> &Arc<dyn WebSocketFactory> {
        &self.factory
    }
}

impl fmt::Debug for WebSocketEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketEndpoint")
            .field("protocol", &self.protocol)
            .finish_non_exhaustive()
    }
}

impl RouteTarget for WebSocketEndpoint {
    /// A newer registration only replaces one for the same sub-protocol.
    fn shadows(&self, older: &Self) -> bool {
        self.protocol == older.protocol
    }
}

/// Pick the endpoint for `path` among those speaking an offered protocol.
///
/// Only a [`MatchResult::Unique`] result may be accepted. Endpoints whose
/// protocol was not offered are ignored before ambiguity is judged, so two
/// endpoints on one path with disjoint protocols never conflict.
pub fn negotiate(
    snapshot: &RouteSnapshot<WebSocketEndpoint>,
    path: &str,
    offered: &[String],
) -> MatchResult<WebSocketEndpoint> {
    match_path_where(snapshot, path, |endpoint| {
        offered.iter().any(|protocol| *protocol == endpoint.protocol)
    })
}

/// Split a `Sec-WebSocket-Protocol` header into protocol names.
pub fn offered_protocols(header: Option<&str>) -> Vec<String> {
    header
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
