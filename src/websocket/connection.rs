//! The server side of an accepted WebSocket connection.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::websocket::Error;

/// Frames a session may queue before sends fail with [`Error::QueueFull`].
pub const SEND_QUEUE_CAPACITY: usize = 256;

/// Callbacks for one WebSocket connection.
///
/// Every method has an empty default, so a handler only implements the
/// events it cares about. Callbacks run on the connection's task and must
/// not block.
pub trait WebSocketHandler: Send {
    /// The handshake completed. `session` stays valid until the connection
    /// closes and may be cloned and moved to other tasks.
    fn on_open(&mut self, _session: WebSocketSession) {}

    fn on_text(&mut self, _text: &str) {}

    fn on_binary(&mut self, _data: &[u8]) {}

    /// The connection closed, either by a close frame or end of stream.
    fn on_close(&mut self, _code: Option<u16>, _reason: &str) {}

    /// The connection failed. No further callbacks follow.
    fn on_error(&mut self, _error: &Error) {}
}

/// Lifecycle of a [`WebSocketConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Created,
    Open,
    Closed,
}

/// Sends frames to the peer of an open connection.
#[derive(Debug, Clone)]
pub struct WebSocketSession {
    protocol: Arc<str>,
    outgoing: mpsc::Sender<Message>,
}

impl WebSocketSession {
    /// The negotiated sub-protocol.
    pub fn sub_protocol(&self) -> &str {
        &self.protocol
    }

    pub fn send_text(&self, text: impl Into<String>) -> Result<(), Error> {
        self.send(Message::text(text.into()))
    }

    pub fn send_binary(&self, data: impl Into<Vec<u8>>) -> Result<(), Error> {
        self.send(Message::binary(data.into()))
    }

    /// Start the closing handshake.
    pub fn close(&self) -> Result<(), Error> {
        self.send(Message::Close(None))
    }

    fn send(&self, message: Message) -> Result<(), Error> {
        self.outgoing.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => Error::QueueFull,
            TrySendError::Closed(_) => Error::SessionClosed,
        })
    }
}

/// Drives a [`WebSocketHandler`] through `Created → Open → Closed`.
///
/// Transitions are idempotent, and messages reach the handler only while
/// the connection is open.
pub struct WebSocketConnection {
    handler: Box<dyn WebSocketHandler>,
    session: WebSocketSession,
    outgoing: Option<mpsc::Receiver<Message>>,
    state: ConnectionState,
}

impl WebSocketConnection {
    pub fn new(handler: Box<dyn WebSocketHandler>, protocol: &str) -> Self {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_CAPACITY);
        Self {
            handler,
            session: WebSocketSession {
                protocol: Arc::from(protocol),
                outgoing: tx,
            },
            outgoing: Some(rx),
            state: ConnectionState::Created,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session(&self) -> &WebSocketSession {
        &self.session
    }

    pub fn open(&mut self) {
        if self.state != ConnectionState::Created {
            return;
        }
        self.state = ConnectionState::Open;
        self.handler.on_open(self.session.clone());
    }

    pub fn deliver_text(&mut self, text: &str) {
        if self.state == ConnectionState::Open {
            self.handler.on_text(text);
        }
    }

    pub fn deliver_binary(&mut self, data: &[u8]) {
        if self.state == ConnectionState::Open {
            self.handler.on_binary(data);
        }
    }

    pub fn close(&mut self, code: Option<u16>, reason: &str) {
        if self.state == ConnectionState::Closed {
            return;
        }
        let was_open = self.state == ConnectionState::Open;
        self.state = ConnectionState::Closed;
        if was_open {
            self.handler.on_close(code, reason);
        }
    }

    pub fn fail(&mut self, error: Error) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::Closed;
        self.handler.on_error(&error);
    }

    /// Run the connection over `stream` until either side closes it.
    ///
    /// The connection fails with [`Error::TimedOut`] once no frame has
    /// arrived from the peer for `idle_timeout`. Outgoing frames do not
    /// extend that deadline.
    pub async fn run<S>(mut self, stream: WebSocketStream<S>, idle_timeout: Duration)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let Some(mut outgoing) = self.outgoing.take() else {
            warn!("WebSocket connection was already run");
            return;
        };
        let (mut sink, mut source) = stream.split();

        self.open();
        let mut deadline = Instant::now() + idle_timeout;
        while self.state == ConnectionState::Open {
            tokio::select! {
                () = tokio::time::sleep_until(deadline) => self.fail(Error::TimedOut),
                incoming = source.next() => match incoming {
                    None => self.close(None, ""),
                    Some(Err(e)) => self.fail(Error::Transport(e)),
                    Some(Ok(message)) => {
                        deadline = Instant::now() + idle_timeout;
                        self.receive(message);
                    }
                },
                Some(message) = outgoing.recv() => {
                    match tokio::time::timeout_at(deadline, sink.send(message)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => self.fail(Error::Transport(e)),
                        Err(_) => self.fail(Error::TimedOut),
                    }
                }
            }
        }

        debug!("WebSocket connection ({protocol}) closed", protocol = self.session.protocol);
        match tokio::time::timeout(idle_timeout, sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Error closing WebSocket sink: {e}"),
            Err(_) => debug!("WebSocket peer did not accept the close frame in time"),
        }
    }

    fn receive(&mut self, message: Message) {
        match message {
            Message::Text(text) => self.deliver_text(text.as_str()),
            Message::Binary(data) => self.deliver_binary(&data),
            Message::Close(frame) => match frame {
                Some(frame) => self.close(Some(u16::from(frame.code)), frame.reason.as_str()),
                None => self.close(None, ""),
            },
            // Pongs are queued by the frame layer itself.
            _ => {}
        }
    }
}
