//! HTTP server implementation.

use std::future::Future;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::WebSocketStream;

use crate::body::{self, BodyError, BodyKind, DecodedBody};
use crate::parser::{find_head_end, parse_request, HttpRequest, Method};
use crate::routing::{MatchResult, PathParser, PathVariables};
use crate::server::config::ServerConfig;
use crate::server::error::Error;
use crate::server::handler::{RouteKind, RoutedRequest};
use crate::server::response::{HttpResponse, StatusCode};
use crate::server::router::Router;
use crate::websocket::{offered_protocols, WebSocketConnection, WebSocketHandler};

/// An HTTP and WebSocket server.
pub struct HttpServer {
    /// The server configuration.
    pub config: ServerConfig,
    router: Arc<Router>,
}

impl HttpServer {
    /// Create a new server with no routes.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            router: Arc::new(Router::new()),
        }
    }

    /// The shared router. Clone it into handlers that register routes
    /// while serving.
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Bind a parser to a path variable type name.
    pub fn register_path_variable_type(
        &self,
        name: impl Into<String>,
        parser: impl PathParser + 'static,
    ) -> Result<(), Error> {
        Ok(self.router.register_path_variable_type(name, parser)?)
    }

    /// Add a handler to the route table for `kind`.
    pub fn add_route<F, Fut>(&self, kind: RouteKind, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(RoutedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        Ok(self.router.add_route(kind, pattern, handler)?)
    }

    pub fn add_get<F, Fut>(&self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(RoutedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.add_route(RouteKind::Get, pattern, handler)
    }

    /// The handler receives the raw body, truncated at
    /// [`MAX_POST_SIZE`](crate::body::MAX_POST_SIZE) bytes.
    pub fn add_put<F, Fut>(&self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(RoutedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.add_route(RouteKind::Put, pattern, handler)
    }

    pub fn add_delete<F, Fut>(&self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(RoutedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.add_route(RouteKind::Delete, pattern, handler)
    }

    /// POST with any content type other than a form or multipart body.
    ///
    /// The body is read up to `Content-Length` and never past
    /// [`MAX_POST_SIZE`](crate::body::MAX_POST_SIZE). A request without a
    /// `Content-Length` header reaches the handler with an empty body.
    pub fn add_post_raw<F, Fut>(&self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(RoutedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.add_route(RouteKind::Post(BodyKind::Raw), pattern, handler)
    }

    /// POST with `application/x-www-form-urlencoded` bodies.
    pub fn add_post_form<F, Fut>(&self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(RoutedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.add_route(RouteKind::Post(BodyKind::Form), pattern, handler)
    }

    /// POST with `multipart/form-data` bodies.
    pub fn add_post_multipart<F, Fut>(&self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(RoutedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.add_route(RouteKind::Post(BodyKind::Multipart), pattern, handler)
    }

    /// Accept WebSocket upgrades on `pattern` for clients offering
    /// `protocol`. The factory may decline by returning `None`.
    pub fn add_websocket_route<F>(&self, pattern: &str, protocol: &str, factory: F) -> Result<(), Error>
    where
        F: Fn(&HttpRequest, PathVariables) -> Option<Box<dyn WebSocketHandler>> + Send + Sync + 'static,
    {
        Ok(self.router.add_websocket_route(pattern, protocol, Arc::new(factory))?)
    }

    /// Log the registered endpoints.
    fn display_server_info(&self) {
        info!("Registered endpoints:");
        for line in self.router.describe() {
            info!("  {line}");
        }
    }

    /// Set up the TCP listener.
    async fn setup_listener(&self) -> Result<TcpListener, Error> {
        let listener = TcpListener::bind(&self.config.addr).await?;
        info!("Server listening on http://{addr}", addr = self.config.addr);
        Ok(listener)
    }

    /// Set up a Ctrl+C handler for graceful shutdown.
    fn setup_ctrl_c_handler(shutdown_tx: mpsc::Sender<()>, tasks: &mut JoinSet<()>) {
        tasks.spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C, initiating graceful shutdown");
                    let _ = shutdown_tx.send(()).await;
                }
                Err(e) => {
                    error!("Error setting up Ctrl+C handler: {e}");
                }
            }
        });
    }

    /// Spawn a task for a new connection, or refuse it when at capacity.
    async fn handle_new_connection(
        mut socket: tokio::net::TcpStream,
        addr: SocketAddr,
        semaphore: Arc<Semaphore>,
        router: Arc<Router>,
        config: ServerConfig,
        tasks: &mut JoinSet<()>,
    ) {
        let permit = match semaphore.try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("Connection limit reached, rejecting connection from {addr}");
                let response = HttpResponse::text(
                    StatusCode::ServiceUnavailable,
                    "Server is at capacity, please try again later",
                );
                let _ = socket.write_all(&response.to_bytes()).await;
                return;
            }
        };

        tasks.spawn(async move {
            // Held until the connection is done.
            let _permit = permit;

            match Self::handle_connection(&mut socket, router, &config).await {
                Ok(()) => {}
                Err(e @ (Error::NotFound(_) | Error::MethodNotAllowed(..) | Error::UpgradeRejected(_))) => {
                    debug!("Request from {addr} not served: {e}");
                }
                Err(e) => warn!("Error handling connection from {addr}: {e}"),
            }
        });
    }

    /// Handle connection errors.
    async fn handle_connection_error(e: std::io::Error) -> bool {
        error!("Error accepting connection: {e}");

        if e.kind() == std::io::ErrorKind::BrokenPipe {
            error!("Critical error accepting connection, shutting down");
            return true;
        }

        // For other errors, wait a bit before retrying
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        false
    }

    /// Perform graceful shutdown.
    async fn perform_shutdown(tasks: &mut JoinSet<()>) {
        info!("Waiting for {len} active connections to complete...", len = tasks.len());
        let shutdown_timeout = tokio::time::Duration::from_secs(30);
        let _ = tokio::time::timeout(shutdown_timeout, async {
            while let Some(res) = tasks.join_next().await {
                if let Err(e) = res {
                    error!("Task failed during shutdown: {e}");
                }
            }
        })
        .await;

        info!("Server shutdown complete");
    }

    /// Start the server and listen for incoming connections.
    pub async fn start(&self) -> Result<(), Error> {
        self.display_server_info();

        let listener = self.setup_listener().await?;
        let semaphore = Arc::new(Semaphore::new(self.config.max_connections));

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let mut tasks = JoinSet::new();
        Self::setup_ctrl_c_handler(shutdown_tx, &mut tasks);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutting down server...");
                    break;
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((socket, addr)) => {
                            Self::handle_new_connection(
                                socket,
                                addr,
                                Arc::clone(&semaphore),
                                Arc::clone(&self.router),
                                self.config.clone(),
                                &mut tasks,
                            ).await;
                        },
                        Err(e) => {
                            if Self::handle_connection_error(e).await {
                                break;
                            }
                        }
                    }
                }
            }
        }

        Self::perform_shutdown(&mut tasks).await;

        Ok(())
    }

    /// Serve one request, or one WebSocket session, on `socket`.
    ///
    /// The returned error describes why the request was not served; the
    /// matching response has already been written when one applies.
    pub async fn handle_connection(
        socket: &mut (impl AsyncRead + AsyncWrite + Unpin),
        router: Arc<Router>,
        config: &ServerConfig,
    ) -> Result<(), Error> {
        let Some((request, leftover)) = Self::read_request(socket, config).await? else {
            return Ok(()); // Connection closed
        };

        if request.is_websocket_upgrade() {
            return Self::upgrade(socket, request, leftover, &router, config).await;
        }

        if !request.method.is_routed() {
            let response = HttpResponse::text(
                StatusCode::MethodNotAllowed,
                format!(
                    "Method {method} not allowed for path: {path}",
                    method = request.method,
                    path = request.path
                ),
            )
            .with_header("Allow", Method::allow_header());
            send(socket, response).await?;
            return Err(Error::MethodNotAllowed(request.method, request.path));
        }

        if request.is_chunked() {
            let response = HttpResponse::text(StatusCode::NotImplemented, "Chunked request bodies are not supported");
            send(socket, response).await?;
            return Err(Error::NotImplemented("chunked transfer encoding".to_string()));
        }

        let kind = match request.method {
            Method::GET => RouteKind::Get,
            Method::PUT => RouteKind::Put,
            Method::DELETE => RouteKind::Delete,
            _ => RouteKind::Post(BodyKind::from_content_type(request.content_type())),
        };

        let (route, variables) = match router.match_route(kind, request.route_path()) {
            MatchResult::Unique { route, variables } => (route, variables),
            MatchResult::NoMatch | MatchResult::Ambiguous { .. } => {
                return Self::not_found(socket, request.path).await;
            }
        };

        let content_length = match request.content_length() {
            Ok(length) => length.unwrap_or(0),
            Err(e) => {
                let response = HttpResponse::text(StatusCode::BadRequest, format!("Error parsing request: {e}"));
                send(socket, response).await?;
                return Err(Error::ParseError(e));
            }
        };

        let body = match kind {
            RouteKind::Get | RouteKind::Delete => Ok(DecodedBody::None),
            RouteKind::Put => Self::read_body(socket, BodyKind::Raw, &request, leftover, content_length, config).await,
            RouteKind::Post(body_kind) => {
                Self::read_body(socket, body_kind, &request, leftover, content_length, config).await
            }
        };
        let body = match body {
            Ok(body) => body,
            Err(e) => return Self::reject_body(socket, e).await,
        };

        let routed = RoutedRequest {
            request,
            variables,
            body,
        };
        let response = match (route.target.handler)(routed).await {
            Ok(response) => response,
            Err(e) => {
                let response = HttpResponse::text(StatusCode::InternalServerError, format!("Internal server error: {e}"));
                send(socket, response).await?;
                return Err(e);
            }
        };

        send(socket, response).await?;
        Ok(())
    }

    /// Read and parse a request head.
    ///
    /// Returns the request and any body bytes read past the head, or `None`
    /// if the peer closed the connection without sending anything.
    async fn read_request(
        socket: &mut (impl AsyncRead + AsyncWrite + Unpin),
        config: &ServerConfig,
    ) -> Result<Option<(HttpRequest, Vec<u8>)>, Error> {
        let mut buf = Vec::with_capacity(config.read_buffer_size);
        let mut chunk = vec![0; config.read_buffer_size];

        let head_end = loop {
            if let Some(end) = find_head_end(&buf) {
                break end;
            }
            if buf.len() >= config.read_buffer_size {
                let response = HttpResponse::text(StatusCode::RequestHeaderFieldsTooLarge, "Request head too large");
                send(socket, response).await?;
                return Err(Error::RequestTooLarge(config.read_buffer_size));
            }

            let n = match tokio::time::timeout(config.read_timeout, socket.read(&mut chunk)).await {
                Ok(read) => read?,
                Err(_) => return Err(Error::TimedOut),
            };
            if n == 0 {
                if buf.is_empty() {
                    return Ok(None);
                }
                // Parse whatever arrived; an incomplete head fails below.
                break buf.len();
            }
            buf.extend_from_slice(&chunk[..n]);
        };

        let request = match parse_request(&buf[..head_end]) {
            Ok(request) => request,
            Err(e) => {
                let response = HttpResponse::text(StatusCode::BadRequest, format!("Error parsing request: {e}"));
                send(socket, response).await?;
                return Err(Error::ParseError(e));
            }
        };

        debug!("{method} {path}", method = request.method, path = request.path);
        Ok(Some((request, buf.split_off(head_end))))
    }

    /// Decode the body of `request`, starting with the bytes already read
    /// past the head and continuing on the socket up to `content_length`.
    async fn read_body(
        socket: &mut (impl AsyncRead + AsyncWrite + Unpin),
        kind: BodyKind,
        request: &HttpRequest,
        leftover: Vec<u8>,
        content_length: u64,
        config: &ServerConfig,
    ) -> Result<DecodedBody, BodyError> {
        let mut reader = Cursor::new(leftover).chain(&mut *socket).take(content_length);
        body::decode_as(kind, request.content_type(), &mut reader, config.read_timeout).await
    }

    /// Answer a body that could not be decoded.
    async fn reject_body(socket: &mut (impl AsyncRead + AsyncWrite + Unpin), e: BodyError) -> Result<(), Error> {
        let status = match &e {
            BodyError::PartTooLarge { .. } => StatusCode::PayloadTooLarge,
            BodyError::MissingBoundary | BodyError::Malformed(_) => StatusCode::BadRequest,
            // The transport is gone or stalled; drop the connection.
            BodyError::Io(_) | BodyError::TimedOut => return Err(Error::Body(e)),
        };
        send(socket, HttpResponse::text(status, e.to_string())).await?;
        Err(Error::Body(e))
    }

    async fn not_found(socket: &mut (impl AsyncRead + AsyncWrite + Unpin), path: String) -> Result<(), Error> {
        let response = HttpResponse::text(StatusCode::NotFound, format!("Not found: {path}"));
        send(socket, response).await?;
        Err(Error::NotFound(path))
    }

    /// Negotiate a WebSocket upgrade and run the connection to completion.
    async fn upgrade(
        socket: &mut (impl AsyncRead + AsyncWrite + Unpin),
        request: HttpRequest,
        leftover: Vec<u8>,
        router: &Router,
        config: &ServerConfig,
    ) -> Result<(), Error> {
        let Some(key) = request.get_header("Sec-WebSocket-Key").map(|key| key.trim().to_string()) else {
            let response = HttpResponse::text(StatusCode::BadRequest, "Missing Sec-WebSocket-Key");
            send(socket, response).await?;
            return Err(Error::ParseError(crate::parser::Error::MissingHeader(
                "Sec-WebSocket-Key".to_string(),
            )));
        };

        let offered = offered_protocols(request.get_header("Sec-WebSocket-Protocol").map(String::as_str));
        let (route, variables) = match router.negotiate(request.route_path(), &offered) {
            MatchResult::Unique { route, variables } => (route, variables),
            MatchResult::NoMatch | MatchResult::Ambiguous { .. } => {
                debug!("No WebSocket endpoint for {path} with protocols {offered:?}", path = request.path);
                return Self::not_found(socket, request.path).await;
            }
        };

        let protocol = route.target.protocol().to_string();
        let Some(handler) = route.target.factory().create(&request, variables) else {
            let response = HttpResponse::text(StatusCode::Forbidden, format!("Upgrade rejected: {}", request.path));
            send(socket, response).await?;
            return Err(Error::UpgradeRejected(request.path));
        };

        let response = HttpResponse::new(StatusCode::SwitchingProtocols)
            .with_header("Upgrade", "websocket")
            .with_header("Connection", "Upgrade")
            .with_header("Sec-WebSocket-Accept", derive_accept_key(key.as_bytes()))
            .with_header("Sec-WebSocket-Protocol", &protocol);
        socket.write_all(&response.to_bytes()).await?;
        socket.flush().await?;
        info!("WebSocket opened on {path} ({protocol})", path = request.path);

        let stream = WebSocketStream::from_partially_read(&mut *socket, leftover, Role::Server, None).await;
        WebSocketConnection::new(handler, &protocol)
            .run(stream, config.websocket_idle_timeout)
            .await;
        Ok(())
    }
}

/// Write `response` and mark the connection as done.
async fn send(socket: &mut (impl AsyncWrite + Unpin), response: HttpResponse) -> Result<(), Error> {
    let response = response.with_header("Connection", "close");
    socket.write_all(&response.to_bytes()).await?;
    socket.flush().await?;
    Ok(())
}
