//! WebSocket upgrade negotiation and connection driving.
//!
//! An upgrade request is accepted only when exactly one registered
//! [`WebSocketEndpoint`] matches both the request path and one of the
//! sub-protocols the client offered. The endpoint's factory then builds a
//! [`WebSocketHandler`], which a [`WebSocketConnection`] drives until the
//! connection closes.

mod connection;
mod negotiate;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

pub use connection::{
    ConnectionState, WebSocketConnection, WebSocketHandler, WebSocketSession, SEND_QUEUE_CAPACITY,
};
pub use negotiate::{negotiate, offered_protocols, WebSocketEndpoint, WebSocketFactory};

/// Errors raised while a WebSocket connection is open.
#[derive(Debug, Error)]
pub enum Error {
    /// The frame layer failed.
    #[error("WebSocket transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    /// No frame arrived within the idle timeout.
    #[error("WebSocket connection idle for too long")]
    TimedOut,

    /// A send was attempted after the connection closed.
    #[error("WebSocket session is closed")]
    SessionClosed,

    /// The peer is not reading fast enough to drain the send queue.
    #[error("WebSocket send queue is full")]
    QueueFull,
}
