//! STOMP over WebSocket.
//!
//! Frames travel as text messages. The broker may pack several frames, or a
//! bare heart-beat, into a single message, so every connection keeps its own
//! [`FrameCodec`] and drains it before reading the socket again.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use huddle_protocol::{Frame, FrameCodec, ProtocolError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};

use crate::traits::{Connection, ConnectionId, Transport, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Where and how to dial.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// `ws://` or `wss://` endpoint.
    pub url: String,
    /// Largest single message accepted from the bus.
    pub max_message_size: usize,
    /// Bound on TCP connect, TLS and the HTTP upgrade together.
    pub connect_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:5000/ws/websocket".to_string(),
            max_message_size: 64 * 1024,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Dials one WebSocket endpoint per `open`.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    config: WebSocketConfig,
}

impl WebSocketTransport {
    #[must_use]
    pub fn new(config: WebSocketConfig) -> Self {
        Self { config }
    }

    /// Transport for `url` with default limits.
    #[must_use]
    pub fn connect_to(url: impl Into<String>) -> Self {
        Self::new(WebSocketConfig {
            url: url.into(),
            ..Default::default()
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.config.url
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self) -> Result<Box<dyn Connection>, TransportError> {
        let url = self.config.url.as_str();
        debug!(url = %url, "Dialing bus");

        let upgrade = tokio::time::timeout(self.config.connect_timeout, connect_async(url))
            .await
            .map_err(|_| TransportError::Timeout)?;
        let (stream, _response) = upgrade.map_err(|e| {
            warn!(url = %url, error = %e, "WebSocket upgrade failed");
            TransportError::ConnectFailed(e.to_string())
        })?;

        Ok(Box::new(WebSocketConnection {
            id: ConnectionId::next(self.name()),
            url: self.config.url.clone(),
            stream: Mutex::new(stream),
            codec: FrameCodec::with_max_frame_size(self.config.max_message_size),
            limit: self.config.max_message_size,
            open: true,
        }))
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

/// What one socket read amounted to.
enum Read {
    Data(Vec<u8>),
    Ping(Vec<u8>),
    Nothing,
    Closed,
}

impl Read {
    fn classify(next: Option<Result<Message, WsError>>) -> Result<Self, TransportError> {
        Ok(match next {
            Some(Ok(Message::Text(text))) => Read::Data(text.into_bytes()),
            Some(Ok(Message::Binary(data))) => Read::Data(data),
            Some(Ok(Message::Ping(data))) => Read::Ping(data),
            Some(Ok(Message::Pong(_) | Message::Frame(_))) => Read::Nothing,
            Some(Ok(Message::Close(_))) | Some(Err(WsError::ConnectionClosed)) | None => {
                Read::Closed
            }
            Some(Err(e)) => return Err(TransportError::ReceiveFailed(e.to_string())),
        })
    }
}

/// A live WebSocket to the bus.
pub struct WebSocketConnection {
    id: ConnectionId,
    url: String,
    stream: Mutex<WsStream>,
    codec: FrameCodec,
    limit: usize,
    open: bool,
}

impl WebSocketConnection {
    async fn write(&mut self, message: Message) -> Result<(), TransportError> {
        self.stream
            .get_mut()
            .send(message)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

#[async_trait]
impl Connection for WebSocketConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    async fn recv(&mut self) -> Result<Option<Frame>, TransportError> {
        loop {
            if let Some(frame) = self.codec.next_frame()? {
                return Ok(Some(frame));
            }
            if !self.open {
                return Ok(None);
            }

            let next = self.stream.get_mut().next().await;
            let read = match Read::classify(next) {
                Ok(read) => read,
                Err(e) => {
                    warn!(connection = %self.id, error = %e, "WebSocket read failed");
                    self.open = false;
                    return Err(e);
                }
            };

            match read {
                Read::Data(data) if data.len() > self.limit => {
                    return Err(ProtocolError::FrameTooLarge(data.len()).into());
                }
                Read::Data(data) => self.codec.feed(&data),
                Read::Ping(payload) => {
                    if let Err(e) = self.write(Message::Pong(payload)).await {
                        debug!(connection = %self.id, error = %e, "Pong not sent");
                    }
                }
                Read::Nothing => {}
                Read::Closed => {
                    debug!(connection = %self.id, "Bus closed the socket");
                    self.open = false;
                }
            }
        }
    }

    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let data = self.codec.encode(&frame)?;
        self.send_raw(data).await
    }

    async fn send_raw(&mut self, data: Bytes) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::ConnectionClosed);
        }
        let text = String::from_utf8(data.to_vec())
            .map_err(|_| TransportError::SendFailed("frame is not valid UTF-8".into()))?;
        self.write(Message::Text(text)).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !std::mem::replace(&mut self.open, false) {
            return Ok(());
        }
        self.stream
            .get_mut()
            .close(None)
            .await
            .map_err(|e| TransportError::Other(format!("close failed: {e}")))
    }

    fn endpoint(&self) -> Option<&str> {
        Some(&self.url)
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let config = WebSocketConfig::default();
        assert!(config.url.ends_with("/ws/websocket"));
        assert_eq!(config.max_message_size, 64 * 1024);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_connect_to_keeps_url() {
        let transport = WebSocketTransport::connect_to("wss://bus.example:10/ws/websocket");
        assert_eq!(transport.url(), "wss://bus.example:10/ws/websocket");
        assert_eq!(transport.name(), "websocket");
    }

    #[test]
    fn test_close_and_errors_classify_as_closed() {
        assert!(matches!(Read::classify(None), Ok(Read::Closed)));
        assert!(matches!(
            Read::classify(Some(Ok(Message::Close(None)))),
            Ok(Read::Closed)
        ));
        assert!(matches!(
            Read::classify(Some(Ok(Message::Text("\n".into())))),
            Ok(Read::Data(data)) if data == b"\n"
        ));
        assert!(matches!(
            Read::classify(Some(Err(WsError::AlreadyClosed))),
            Err(TransportError::ReceiveFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_open_unreachable_endpoint_fails() {
        let transport = WebSocketTransport::new(WebSocketConfig {
            url: "ws://127.0.0.1:1/ws".to_string(),
            connect_timeout: Duration::from_secs(2),
            ..Default::default()
        });
        assert!(transport.open().await.is_err());
    }
}
