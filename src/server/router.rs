//! Route registration and lookup for every request kind.

use std::future::Future;
use std::sync::Arc;

use log::{info, warn};

use crate::body::BodyKind;
use crate::routing::{
    MatchResult, ParserRegistry, PathParser, PathTemplate, Route, RouteError, RouteTable, RouteTarget,
};
use crate::server::handler::{handler_fn, HandlerFn, HttpEndpoint, RouteKind, RoutedRequest};
use crate::server::{Error, HttpResponse};
use crate::websocket::{self, WebSocketEndpoint, WebSocketFactory};

/// The parser registry plus one route table per [`RouteKind`] and one for
/// WebSocket endpoints.
///
/// All methods take `&self`; registration may happen at any time, including
/// from inside a handler that is currently being served.
#[derive(Default)]
pub struct Router {
    registry: ParserRegistry,
    get: RouteTable<HttpEndpoint>,
    put: RouteTable<HttpEndpoint>,
    delete: RouteTable<HttpEndpoint>,
    post_raw: RouteTable<HttpEndpoint>,
    post_form: RouteTable<HttpEndpoint>,
    post_multipart: RouteTable<HttpEndpoint>,
    websocket: RouteTable<WebSocketEndpoint>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    /// Bind a parser to a variable type name usable as `{name}` in patterns.
    ///
    /// Only patterns compiled afterwards can use the new type.
    pub fn register_path_variable_type(
        &self,
        name: impl Into<String>,
        parser: impl PathParser + 'static,
    ) -> Result<(), RouteError> {
        self.registry.register(name, parser)
    }

    fn table(&self, kind: RouteKind) -> &RouteTable<HttpEndpoint> {
        match kind {
            RouteKind::Get => &self.get,
            RouteKind::Put => &self.put,
            RouteKind::Delete => &self.delete,
            RouteKind::Post(BodyKind::Raw) => &self.post_raw,
            RouteKind::Post(BodyKind::Form) => &self.post_form,
            RouteKind::Post(BodyKind::Multipart) => &self.post_multipart,
        }
    }

    /// Compile `pattern` and append a handler to the table for `kind`.
    pub fn add_route<F, Fut>(&self, kind: RouteKind, pattern: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(RoutedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.add_endpoint(kind, pattern, handler_fn(handler))
    }

    /// Append an already boxed handler to the table for `kind`.
    pub fn add_endpoint(&self, kind: RouteKind, pattern: &str, handler: HandlerFn) -> Result<(), RouteError> {
        let template = PathTemplate::compile(pattern, &self.registry)?;
        let endpoint = HttpEndpoint { handler };
        let table = self.table(kind);
        report_overlaps(table, &template, &endpoint, &kind.to_string());
        table.add(Route::new(template, endpoint));
        Ok(())
    }

    /// Register a WebSocket factory for `pattern` speaking `protocol`.
    pub fn add_websocket_route(
        &self,
        pattern: &str,
        protocol: &str,
        factory: Arc<dyn WebSocketFactory>,
    ) -> Result<(), RouteError> {
        if protocol.is_empty() || protocol.contains([',', ' ']) {
            return Err(RouteError::MalformedPattern(format!("invalid sub-protocol name '{protocol}'")));
        }
        let template = PathTemplate::compile(pattern, &self.registry)?;
        let endpoint = WebSocketEndpoint::new(protocol, factory);
        report_overlaps(&self.websocket, &template, &endpoint, &format!("WebSocket ({protocol})"));
        self.websocket.add(Route::new(template, endpoint));
        Ok(())
    }

    /// Match `path` against the routes of `kind`.
    pub fn match_route(&self, kind: RouteKind, path: &str) -> MatchResult<HttpEndpoint> {
        crate::routing::match_path(&self.table(kind).snapshot(), path)
    }

    /// Pick the WebSocket endpoint for `path` and the offered sub-protocols.
    pub fn negotiate(&self, path: &str, offered: &[String]) -> MatchResult<WebSocketEndpoint> {
        websocket::negotiate(&self.websocket.snapshot(), path, offered)
    }

    /// One line per registered endpoint, oldest first within each kind.
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for kind in RouteKind::ALL {
            let snapshot = self.table(kind).snapshot();
            let mut routes: Vec<String> = snapshot
                .iter()
                .map(|route| format!("{kind} {}", route.template))
                .collect();
            routes.reverse();
            lines.extend(routes);
        }
        let snapshot = self.websocket.snapshot();
        let mut routes: Vec<String> = snapshot
            .iter()
            .map(|route| format!("WebSocket {} ({})", route.template, route.target.protocol()))
            .collect();
        routes.reverse();
        lines.extend(routes);
        lines
    }
}

/// Log how `template` relates to the routes already in `table`.
fn report_overlaps<H: RouteTarget>(table: &RouteTable<H>, template: &PathTemplate, target: &H, label: &str) {
    for existing in table.snapshot().iter() {
        if existing.template == *template && target.shadows(&existing.target) {
            info!("{label} route {template} replaces an earlier registration");
            return;
        }
    }
    for existing in table.snapshot().iter() {
        if existing.template != *template && template.may_overlap(&existing.template) {
            warn!(
                "{label} route {template} may overlap {existing}; requests matching both will be rejected as ambiguous",
                existing = existing.template
            );
        }
    }
}
