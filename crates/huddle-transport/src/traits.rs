//! The seam between the chat session and the socket underneath it.
//!
//! A [`Transport`] dials the bus; the [`Connection`] it hands back speaks
//! whole STOMP frames in both directions.

use async_trait::async_trait;
use bytes::Bytes;
use huddle_protocol::{Frame, ProtocolError};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

/// Process-unique label for one opened connection, used in logs and bus events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Allocate the next id, tagged with the transport that opened it.
    #[must_use]
    pub fn next(transport: &str) -> Self {
        let seq = NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed);
        Self(format!("{transport}-{seq}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failures below the STOMP session.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection timed out")]
    Timeout,

    /// The endpoint could not be reached or refused the upgrade.
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Bytes arrived that do not form a STOMP frame.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("{0}")]
    Other(String),
}

/// Something that can open connections to the bus.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a new connection.
    ///
    /// Nothing has been written when this returns; the caller owns the
    /// CONNECT handshake.
    async fn open(&self) -> Result<Box<dyn Connection>, TransportError>;

    /// Short name for logs ("websocket", "memory", "fallback").
    fn name(&self) -> &'static str;

    /// Whether `open` is worth attempting right now.
    fn is_healthy(&self) -> bool {
        true
    }
}

/// One open connection to the bus.
#[async_trait]
pub trait Connection: Send + Sync {
    fn id(&self) -> &ConnectionId;

    /// Next decoded frame, or `None` once the peer has closed.
    ///
    /// Heart-beat EOLs are swallowed here and never surface as frames.
    async fn recv(&mut self) -> Result<Option<Frame>, TransportError>;

    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Write bytes that are already STOMP-encoded.
    async fn send_raw(&mut self, data: Bytes) -> Result<(), TransportError>;

    /// Write a single heart-beat EOL.
    async fn send_heartbeat(&mut self) -> Result<(), TransportError> {
        self.send_raw(Bytes::from_static(b"\n")).await
    }

    async fn close(&mut self) -> Result<(), TransportError>;

    /// Endpoint this connection was dialed to, when there is one.
    fn endpoint(&self) -> Option<&str> {
        None
    }

    fn is_open(&self) -> bool;
}
