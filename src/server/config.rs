//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The address to bind to.
    pub addr: SocketAddr,
    /// The maximum number of concurrent connections.
    pub max_connections: usize,
    /// Initial read buffer size, and the ceiling on a request head.
    pub read_buffer_size: usize,
    /// Bound on every transport read while reading a request.
    pub read_timeout: Duration,
    /// Bound on every read from an open WebSocket.
    pub websocket_idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_connections: 1024,
            read_buffer_size: 8192,
            read_timeout: Duration::from_secs(30),
            websocket_idle_timeout: Duration::from_secs(10),
        }
    }
}
